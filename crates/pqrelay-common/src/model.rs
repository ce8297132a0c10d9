//! Small cross-crate domain types that don't belong to either the wire codec
//! or the store's row representations, but are passed between them.

/// An identity resolved by handle, with just enough to verify a signature
/// under its `ik` and to know which row it is. Returned by the request
/// authenticator (C4) and by the WebSocket handshake (C7) — both do the same
/// "look up by handle, verify a signature under ik" step.
#[derive(Debug, Clone)]
pub struct ResolvedIdentity {
    pub id: i64,
    pub handle: String,
    pub ik: [u8; 32],
}
