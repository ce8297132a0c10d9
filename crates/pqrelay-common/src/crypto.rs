//! The crypto adapter (C2): a thin, pure contract over XEdDSA verification.
//!
//! The server only ever verifies signatures — it never signs and never holds
//! private key material. XEdDSA lets a Curve25519 (Montgomery) public key
//! verify a signature without the signer ever deriving a dedicated Edwards
//! key pair. Verification reduces to the ordinary Ed25519 verification
//! equation once the Montgomery u-coordinate is converted to its
//! corresponding Edwards point with the sign bit cleared, so this adapter
//! is built on two maintained, widely used curve crates rather than
//! hand-rolled field/point arithmetic: `curve25519-dalek` for the Montgomery
//! → Edwards conversion, `ed25519-dalek` for the constant-time signature
//! check itself.

use curve25519_dalek::montgomery::MontgomeryPoint;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use rand::RngCore;

/// Verify a 64-byte XEdDSA signature over `msg` under the 32-byte Curve25519
/// public key `pk`. Returns `false` — never panics or errors — on any
/// ill-formed input: wrong lengths, a public key that doesn't correspond to
/// a valid curve point, or a signature that fails to verify.
pub fn verify(pk: &[u8], msg: &[u8], sig: &[u8]) -> bool {
    let Ok(pk): Result<[u8; 32], _> = pk.try_into() else {
        return false;
    };
    let Ok(sig_bytes): Result<[u8; 64], _> = sig.try_into() else {
        return false;
    };

    let Some(edwards) = MontgomeryPoint(pk).to_edwards(0) else {
        return false;
    };
    let Ok(verifying_key) = VerifyingKey::from_bytes(&edwards.compress().to_bytes()) else {
        return false;
    };

    verifying_key
        .verify(msg, &Signature::from_bytes(&sig_bytes))
        .is_ok()
}

/// Generate the 32-byte random nonce the server sends as its side of the
/// WebSocket handshake (§4.7).
pub fn generate_nonce() -> [u8; 32] {
    let mut nonce = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut nonce);
    nonce
}

/// A from-scratch XEdDSA signer for test fixtures, shared by this crate's
/// own tests and by the other crates' integration tests (registration,
/// request signing, the WebSocket handshake) — nobody downstream hand-rolls
/// a second one. Never compiled into a release binary: gated behind the
/// `testing` feature (always on under `cfg(test)`).
#[cfg(any(test, feature = "testing"))]
pub mod testing {
    use curve25519_dalek::constants::ED25519_BASEPOINT_POINT;
    use curve25519_dalek::edwards::CompressedEdwardsY;
    use curve25519_dalek::scalar::Scalar;
    use sha2::{Digest, Sha512};

    /// An identity keypair derived from a 32-byte seed, exposing the
    /// Montgomery public key `verify` expects and a `sign` method that
    /// mirrors XEdDSA's "ignore sign bit" convention: the scalar is negated
    /// if needed so the public point's sign bit is 0, matching what
    /// `MontgomeryPoint::to_edwards(0)` reconstructs from the bare
    /// u-coordinate on the wire.
    pub struct TestIdentity {
        a: Scalar,
        prefix: [u8; 32],
        pub public: [u8; 32],
    }

    impl TestIdentity {
        pub fn from_seed(seed: [u8; 32]) -> Self {
            let h = Sha512::digest(seed);
            let mut scalar_bytes = [0u8; 32];
            scalar_bytes.copy_from_slice(&h[0..32]);
            scalar_bytes[0] &= 248;
            scalar_bytes[31] &= 127;
            scalar_bytes[31] |= 64;
            let mut a = Scalar::from_bytes_mod_order(scalar_bytes);
            let mut big_a = (a * ED25519_BASEPOINT_POINT).compress();
            if big_a.to_bytes()[31] & 0x80 != 0 {
                a = -a;
                big_a = (a * ED25519_BASEPOINT_POINT).compress();
            }
            let mut prefix = [0u8; 32];
            prefix.copy_from_slice(&h[32..64]);

            let public = CompressedEdwardsY(big_a.to_bytes())
                .decompress()
                .expect("valid test point")
                .to_montgomery()
                .to_bytes();

            Self { a, prefix, public }
        }

        pub fn sign(&self, msg: &[u8]) -> [u8; 64] {
            let big_a = (self.a * ED25519_BASEPOINT_POINT).compress();

            let r_hash = Sha512::new().chain_update(self.prefix).chain_update(msg).finalize();
            let mut r_wide = [0u8; 64];
            r_wide.copy_from_slice(&r_hash);
            let r_scalar = Scalar::from_bytes_mod_order_wide(&r_wide);
            let big_r = (r_scalar * ED25519_BASEPOINT_POINT).compress();

            let k_hash = Sha512::new()
                .chain_update(big_r.as_bytes())
                .chain_update(big_a.as_bytes())
                .chain_update(msg)
                .finalize();
            let mut k_wide = [0u8; 64];
            k_wide.copy_from_slice(&k_hash);
            let k = Scalar::from_bytes_mod_order_wide(&k_wide);
            let s = r_scalar + k * self.a;

            let mut sig = [0u8; 64];
            sig[..32].copy_from_slice(big_r.as_bytes());
            sig[32..].copy_from_slice(s.as_bytes());
            sig
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::TestIdentity;
    use super::*;

    #[test]
    fn verify_accepts_matching_signature() {
        let msg = b"PQXDH bundle fetch";
        let identity = TestIdentity::from_seed([7u8; 32]);
        let sig = identity.sign(msg);
        assert!(verify(&identity.public, msg, &sig));
    }

    #[test]
    fn verify_rejects_wrong_message() {
        let identity = TestIdentity::from_seed([7u8; 32]);
        let sig = identity.sign(b"original");
        assert!(!verify(&identity.public, b"tampered", &sig));
    }

    #[test]
    fn verify_rejects_wrong_key() {
        let msg = b"PQXDH bundle fetch";
        let identity = TestIdentity::from_seed([7u8; 32]);
        let sig = identity.sign(msg);
        let other = TestIdentity::from_seed([9u8; 32]);
        assert!(!verify(&other.public, msg, &sig));
    }

    #[test]
    fn verify_rejects_bad_lengths() {
        assert!(!verify(&[0u8; 31], b"m", &[0u8; 64]));
        assert!(!verify(&[0u8; 32], b"m", &[0u8; 63]));
    }

    #[test]
    fn nonce_has_correct_length_and_is_not_all_zero() {
        let nonce = generate_nonce();
        assert_eq!(nonce.len(), 32);
        assert_ne!(nonce, [0u8; 32]);
    }
}
