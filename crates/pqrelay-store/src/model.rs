//! Domain types passed across the store's public functions. Byte fields are
//! `Vec<u8>` even where the wire format fixes a length (32/64 bytes) because
//! length validation is the API layer's job (§4.3) — by the time a value
//! reaches the store it has already been checked.

/// A classical one-time prekey ready to insert.
pub struct NewPrekey {
    pub id: i64,
    pub key: Vec<u8>,
}

/// A signed one-time post-quantum prekey ready to insert.
pub struct NewSignedPrekey {
    pub id: i64,
    pub key: Vec<u8>,
    pub sig: Vec<u8>,
}

/// Everything `register` needs to insert one identity and its prekey pools.
pub struct NewIdentity {
    pub handle: String,
    pub ik: Vec<u8>,
    pub spk: NewSignedPrekey,
    pub pqspk: NewSignedPrekey,
    pub one_time_prekeys: Vec<NewPrekey>,
    pub one_time_pqkem_prekeys: Vec<NewSignedPrekey>,
}

/// Everything `patch` may change. `None` fields are left untouched.
#[derive(Default)]
pub struct IdentityPatch {
    pub spk: Option<NewSignedPrekey>,
    pub pqspk: Option<NewSignedPrekey>,
    pub one_time_prekeys: Vec<NewPrekey>,
    pub one_time_pqkem_prekeys: Vec<NewSignedPrekey>,
}

/// Minimal projection used by the request authenticator (C4) and the
/// WebSocket handshake (C7): both need only `(id, ik)` resolved by handle.
pub struct AuthIdentity {
    pub id: i64,
    pub ik: Vec<u8>,
}

/// Response shape for `GET /api/identity?handle=H`.
pub struct PublicIdentity {
    pub handle: String,
    pub id_key: Vec<u8>,
}

/// One slot of the assembled PQXDH bundle (C6).
pub struct BundleSignedPrekey {
    pub id: i64,
    pub key: Vec<u8>,
    pub sig: Vec<u8>,
}

pub struct BundlePrekey {
    pub id: i64,
    pub key: Vec<u8>,
}

/// The result of one bundle fetch, already reflecting whatever was consumed.
pub struct Bundle {
    pub id_key: Vec<u8>,
    pub prekey: Option<BundleSignedPrekey>,
    pub pqkem_prekey: Option<BundleSignedPrekey>,
    pub one_time_prekey: Option<BundlePrekey>,
}
