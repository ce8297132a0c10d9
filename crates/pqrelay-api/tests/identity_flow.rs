//! End-to-end HTTP coverage for the identity service (C5) and the prekey
//! bundle service (C6), driven through the real router with an in-memory
//! store — no mocked signatures, no mocked handlers.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use base64::Engine;
use pqrelay_api::build_router;
use pqrelay_common::crypto::testing::TestIdentity;
use pqrelay_common::wire::{self, canonical_request_message};
use pqrelay_store::Store;
use prost::Message as _;
use tower::ServiceExt;

const MIN_PREKEYS: i64 = 10;

fn sample_identity(handle: &str, identity: &TestIdentity) -> wire::Identity {
    let spk_key = vec![2u8; 32];
    let spk_sig = identity.sign(&spk_key).to_vec();
    let pqspk_key = vec![3u8; 48];
    let pqspk_sig = identity.sign(&pqspk_key).to_vec();

    let one_time_prekeys = (0..MIN_PREKEYS)
        .map(|i| wire::Prekey { id: i, key: vec![i as u8; 32] })
        .collect();
    let one_time_pqkem_prekeys = (0..MIN_PREKEYS)
        .map(|i| {
            let key = vec![(100 + i) as u8; 48];
            let sig = identity.sign(&key).to_vec();
            wire::SignedPrekey { id: i, key, sig }
        })
        .collect();

    wire::Identity {
        handle: handle.to_string(),
        id_key: identity.public.to_vec(),
        prekey: Some(wire::SignedPrekey { id: 1, key: spk_key, sig: spk_sig }),
        pqkem_prekey: Some(wire::SignedPrekey { id: 1, key: pqspk_key, sig: pqspk_sig }),
        one_time_prekeys,
        one_time_pqkem_prekeys,
    }
}

fn signed_request(method: &str, uri: &str, handle: &str, identity: &TestIdentity, body: Vec<u8>) -> Request<Body> {
    let (path, query) = uri.split_once('?').unwrap_or((uri, ""));
    let message = canonical_request_message(method, path, query, &body);
    let sig = identity.sign(&message);
    let sig_b64 = base64::engine::general_purpose::STANDARD.encode(sig);

    Request::builder()
        .method(method)
        .uri(uri)
        .header("X-Identity", handle)
        .header("X-Signature", sig_b64)
        .body(Body::from(body))
        .unwrap()
}

async fn register(app: &axum::Router, handle: &str, identity: &TestIdentity) -> StatusCode {
    let body = sample_identity(handle, identity).encode_to_vec();
    let request = Request::builder()
        .method("POST")
        .uri("/api/identity")
        .body(Body::from(body))
        .unwrap();
    app.clone().oneshot(request).await.unwrap().status()
}

#[tokio::test]
async fn register_then_fetch_bundle_consumes_one_time_prekeys() {
    let store = Store::open_in_memory().await.unwrap();
    let app = build_router(store.clone());
    let alice = TestIdentity::from_seed([1u8; 32]);

    assert_eq!(register(&app, "alice", &alice).await, StatusCode::CREATED);

    let request = signed_request("GET", "/api/keys/alice/bundle", "alice", &alice, Vec::new());
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), 1 << 20).await.unwrap();
    let bundle = wire::PQXDHKeyBundle::decode(bytes).unwrap();
    assert_eq!(bundle.id_key, alice.public.to_vec());
    assert!(bundle.prekey.is_some());
    assert!(bundle.pqkem_prekey.is_some());
    assert!(bundle.one_time_prekey.is_some());
}

#[tokio::test]
async fn dry_run_bundle_exposes_only_id_key() {
    let store = Store::open_in_memory().await.unwrap();
    let app = build_router(store.clone());
    let alice = TestIdentity::from_seed([1u8; 32]);
    register(&app, "alice", &alice).await;

    let request = signed_request("GET", "/api/keys/alice/bundle?dryRun=1", "alice", &alice, Vec::new());
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), 1 << 20).await.unwrap();
    let bundle = wire::PQXDHKeyBundle::decode(bytes).unwrap();
    assert!(bundle.prekey.is_none());
    assert!(bundle.pqkem_prekey.is_none());
    assert!(bundle.one_time_prekey.is_none());
}

#[tokio::test]
async fn duplicate_handle_registration_is_rejected() {
    let store = Store::open_in_memory().await.unwrap();
    let app = build_router(store.clone());
    let alice = TestIdentity::from_seed([1u8; 32]);
    let impostor = TestIdentity::from_seed([2u8; 32]);

    assert_eq!(register(&app, "alice", &alice).await, StatusCode::CREATED);
    assert_eq!(register(&app, "alice", &impostor).await, StatusCode::CONFLICT);
}

#[tokio::test]
async fn registration_rejects_an_unsigned_prekey() {
    let store = Store::open_in_memory().await.unwrap();
    let app = build_router(store.clone());
    let alice = TestIdentity::from_seed([1u8; 32]);

    let mut payload = sample_identity("alice", &alice);
    payload.prekey.as_mut().unwrap().sig = vec![0u8; 64];
    let body = payload.encode_to_vec();

    let request = Request::builder()
        .method("POST")
        .uri("/api/identity")
        .body(Body::from(body))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn patch_rotates_the_signed_prekey_without_touching_one_time_pools() {
    let store = Store::open_in_memory().await.unwrap();
    let app = build_router(store.clone());
    let alice = TestIdentity::from_seed([1u8; 32]);
    register(&app, "alice", &alice).await;

    let new_spk_key = vec![9u8; 32];
    let new_spk_sig = alice.sign(&new_spk_key).to_vec();
    let patch = wire::IdentityPatch {
        prekey: Some(wire::SignedPrekey { id: 2, key: new_spk_key, sig: new_spk_sig }),
        pqkem_prekey: None,
        one_time_prekeys: vec![],
        one_time_pqkem_prekeys: vec![],
    };
    let body = patch.encode_to_vec();

    let request = signed_request("PATCH", "/api/identity", "alice", &alice, body);
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Fetching a dry-run bundle doesn't expose the rotated spk, but we can
    // confirm the one-time pool survived the patch by fetching a full bundle.
    let request = signed_request("GET", "/api/keys/alice/bundle", "alice", &alice, Vec::new());
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), 1 << 20).await.unwrap();
    let bundle = wire::PQXDHKeyBundle::decode(bytes).unwrap();
    assert_eq!(bundle.prekey.unwrap().key, vec![9u8; 32]);
    assert!(bundle.one_time_prekey.is_some(), "patch must not delete existing one-time prekeys");
}

#[tokio::test]
async fn empty_patch_is_accepted_as_a_no_op() {
    let store = Store::open_in_memory().await.unwrap();
    let app = build_router(store.clone());
    let alice = TestIdentity::from_seed([1u8; 32]);
    register(&app, "alice", &alice).await;

    let body = wire::IdentityPatch::default().encode_to_vec();
    let request = signed_request("PATCH", "/api/identity", "alice", &alice, body);
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn delete_removes_the_identity() {
    let store = Store::open_in_memory().await.unwrap();
    let app = build_router(store.clone());
    let alice = TestIdentity::from_seed([1u8; 32]);
    register(&app, "alice", &alice).await;

    let request = signed_request("DELETE", "/api/identity", "alice", &alice, Vec::new());
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let request = signed_request("GET", "/api/keys/alice/bundle", "alice", &alice, Vec::new());
    let response = app.oneshot(request).await.unwrap();
    // alice no longer exists to sign the follow-up request as herself, but
    // the request authenticator rejects unknown handles before it ever gets
    // to the bundle lookup.
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn public_directory_lookup_returns_handle_and_id_key() {
    let store = Store::open_in_memory().await.unwrap();
    let app = build_router(store.clone());
    let alice = TestIdentity::from_seed([1u8; 32]);
    let bob = TestIdentity::from_seed([2u8; 32]);
    register(&app, "alice", &alice).await;
    register(&app, "bob", &bob).await;

    let request = signed_request("GET", "/api/identity?handle=alice", "bob", &bob, Vec::new());
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), 1 << 20).await.unwrap();
    let found = wire::PublicIdentity::decode(bytes).unwrap();
    assert_eq!(found.handle, "alice");
    assert_eq!(found.id_key, alice.public.to_vec());

    let request = signed_request("GET", "/api/identity?handle=nobody", "bob", &bob, Vec::new());
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unsigned_request_to_an_authenticated_route_is_rejected() {
    let store = Store::open_in_memory().await.unwrap();
    let app = build_router(store.clone());
    let alice = TestIdentity::from_seed([1u8; 32]);
    register(&app, "alice", &alice).await;

    let request = Request::builder()
        .method("GET")
        .uri("/api/keys/alice/bundle")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn replay_defense_rejects_a_signature_replayed_against_a_different_path() {
    let store = Store::open_in_memory().await.unwrap();
    let app = build_router(store.clone());
    let alice = TestIdentity::from_seed([1u8; 32]);
    register(&app, "alice", &alice).await;

    // A valid signature over `GET /api/keys/alice/bundle`, replayed verbatim
    // against `GET /api/identity?handle=alice`. The path differs so the
    // canonical signed message differs; the signature must not verify.
    let message = canonical_request_message("GET", "/api/keys/alice/bundle", "", &[]);
    let sig = alice.sign(&message);
    let sig_b64 = base64::engine::general_purpose::STANDARD.encode(sig);

    let request = Request::builder()
        .method("GET")
        .uri("/api/identity?handle=alice")
        .header("X-Identity", "alice")
        .header("X-Signature", sig_b64)
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
