//! HTTP route modules, one per service (§4).

pub mod health;
pub mod identity;
pub mod keys;
