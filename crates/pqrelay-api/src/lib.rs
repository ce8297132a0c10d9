//! # pqrelay-api
//!
//! The HTTP half of the directory: the request authenticator (C4), the
//! identity service (C5), the prekey bundle service (C6), and the ambient
//! `/healthz` probe. The WebSocket relay (C7) lives in `pqrelay-gateway`;
//! this crate only builds the `Router` the host mounts it alongside.

pub mod middleware;
pub mod protobuf;
pub mod routes;

use axum::Router;
use pqrelay_store::Store;

/// Builds the complete HTTP router: unsigned registration, signed
/// identity/bundle routes behind the request authenticator, and the
/// unauthenticated health probe. State-erased so the host can `.merge()`
/// it with the WebSocket route, which carries its own state.
///
/// Paths under `/api/` that match none of these routes are the host's
/// responsibility to 404 rather than fall through to static file serving
/// (§4.8) — see `pqrelay_server::is_reserved_backend_path`.
pub fn build_router(store: Store) -> Router {
    let authed = Router::new()
        .merge(routes::identity::authed_router())
        .merge(routes::keys::router())
        .route_layer(axum::middleware::from_fn_with_state(store.clone(), middleware::verify_request));

    Router::new()
        .merge(routes::identity::public_router())
        .merge(authed)
        .merge(routes::health::router())
        .with_state(store)
}
