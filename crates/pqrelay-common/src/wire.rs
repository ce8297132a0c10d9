//! Generated protobuf codec plus the small amount of glue the rest of the
//! crate needs: fixed-length range checks on key/signature fields (the wire
//! codec itself only enforces types and tags, never exact lengths) and the
//! canonical signed-request message construction shared by every
//! identity-mutating endpoint.

include!(concat!(env!("OUT_DIR"), "/messages.rs"));

/// Byte length of a Curve25519 public key.
pub const KEY_LEN: usize = 32;
/// Byte length of an XEdDSA signature.
pub const SIG_LEN: usize = 64;
/// Byte length of the WebSocket handshake nonce.
pub const NONCE_LEN: usize = 32;

/// Builds the exact byte string `verify_request` and the handshake sign over:
/// `method || uri || query || body` with no separators, or `nonce` alone.
/// Centralized here so every caller constructs the signed message identically —
/// no normalisation, no case-folding, no URL-decoding.
pub fn canonical_request_message(method: &str, uri: &str, query: &str, body: &[u8]) -> Vec<u8> {
    let mut msg = Vec::with_capacity(method.len() + uri.len() + query.len() + body.len());
    msg.extend_from_slice(method.as_bytes());
    msg.extend_from_slice(uri.as_bytes());
    msg.extend_from_slice(query.as_bytes());
    msg.extend_from_slice(body);
    msg
}

impl SignedPrekey {
    /// `true` iff `key` and `sig` are exactly the lengths the wire format requires.
    pub fn has_valid_lengths(&self) -> bool {
        self.key.len() == KEY_LEN && self.sig.len() == SIG_LEN
    }

    /// Signed one-time pqkem prekeys only constrain the signature length —
    /// the post-quantum key itself is not a fixed 32 bytes.
    pub fn has_valid_sig_length(&self) -> bool {
        self.sig.len() == SIG_LEN
    }
}

impl Prekey {
    pub fn has_valid_key_length(&self) -> bool {
        self.key.len() == KEY_LEN
    }
}
