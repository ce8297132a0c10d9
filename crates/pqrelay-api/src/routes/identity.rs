//! Identity service (C5): registration, authenticated rotation/top-up,
//! deletion, and the public directory lookup.

use axum::body::Bytes;
use axum::extract::{Extension, Query, State};
use axum::routing::{get, post};
use axum::Router;
use pqrelay_common::crypto::verify;
use pqrelay_common::error::ApiError;
use pqrelay_common::model::ResolvedIdentity;
use pqrelay_common::validation::{is_valid_handle, MIN_ONE_TIME_PREKEYS};
use pqrelay_common::wire::{self, KEY_LEN};
use pqrelay_store::model::{IdentityPatch, NewIdentity, NewPrekey, NewSignedPrekey};
use pqrelay_store::{identity, Store, StoreError};
use std::collections::HashMap;

use crate::protobuf;

pub fn public_router() -> Router<Store> {
    Router::new().route("/api/identity", post(register))
}

pub fn authed_router() -> Router<Store> {
    Router::new().route(
        "/api/identity",
        get(get_identity).patch(patch_identity).delete(delete_identity),
    )
}

fn wire_prekey(p: &wire::Prekey) -> NewPrekey {
    NewPrekey { id: p.id, key: p.key.clone() }
}

fn wire_signed_prekey(p: &wire::SignedPrekey) -> NewSignedPrekey {
    NewSignedPrekey { id: p.id, key: p.key.clone(), sig: p.sig.clone() }
}

async fn register(State(store): State<Store>, body: Bytes) -> Result<impl axum::response::IntoResponse, ApiError> {
    let payload: wire::Identity = protobuf::decode(&body)?;

    if !is_valid_handle(&payload.handle) {
        return Err(ApiError::BadRequest("invalid handle".into()));
    }
    if payload.id_key.len() != KEY_LEN {
        return Err(ApiError::BadRequest("id_key must be 32 bytes".into()));
    }

    let prekey = payload
        .prekey
        .as_ref()
        .ok_or_else(|| ApiError::BadRequest("prekey is required".into()))?;
    let pqkem_prekey = payload
        .pqkem_prekey
        .as_ref()
        .ok_or_else(|| ApiError::BadRequest("pqkem_prekey is required".into()))?;

    if !prekey.has_valid_lengths() {
        return Err(ApiError::BadRequest("prekey has the wrong key or signature length".into()));
    }
    if !pqkem_prekey.has_valid_sig_length() {
        return Err(ApiError::BadRequest("pqkem_prekey signature must be 64 bytes".into()));
    }
    if !verify(&payload.id_key, &prekey.key, &prekey.sig) {
        return Err(ApiError::BadRequest("prekey signature does not verify".into()));
    }
    if !verify(&payload.id_key, &pqkem_prekey.key, &pqkem_prekey.sig) {
        return Err(ApiError::BadRequest("pqkem_prekey signature does not verify".into()));
    }

    for pqopk in &payload.one_time_pqkem_prekeys {
        if !pqopk.has_valid_sig_length() {
            return Err(ApiError::BadRequest("one-time pqkem prekey signature must be 64 bytes".into()));
        }
        if !verify(&payload.id_key, &pqopk.key, &pqopk.sig) {
            return Err(ApiError::BadRequest("one-time pqkem prekey signature does not verify".into()));
        }
    }

    if payload.one_time_prekeys.len() < MIN_ONE_TIME_PREKEYS {
        return Err(ApiError::BadRequest(format!(
            "at least {MIN_ONE_TIME_PREKEYS} one-time prekeys are required"
        )));
    }
    if payload.one_time_pqkem_prekeys.len() < MIN_ONE_TIME_PREKEYS {
        return Err(ApiError::BadRequest(format!(
            "at least {MIN_ONE_TIME_PREKEYS} one-time pqkem prekeys are required"
        )));
    }

    let new_identity = NewIdentity {
        handle: payload.handle.clone(),
        ik: payload.id_key.clone(),
        spk: wire_signed_prekey(prekey),
        pqspk: wire_signed_prekey(pqkem_prekey),
        one_time_prekeys: payload.one_time_prekeys.iter().map(wire_prekey).collect(),
        one_time_pqkem_prekeys: payload.one_time_pqkem_prekeys.iter().map(wire_signed_prekey).collect(),
    };

    match identity::register(store.pool(), new_identity).await {
        Ok(_) => Ok(axum::http::StatusCode::CREATED),
        Err(StoreError::Conflict) => Err(ApiError::Conflict),
        Err(err) => Err(ApiError::Internal(err.into())),
    }
}

async fn patch_identity(
    State(store): State<Store>,
    Extension(caller): Extension<ResolvedIdentity>,
    body: Bytes,
) -> Result<axum::http::StatusCode, ApiError> {
    let payload: wire::IdentityPatch = protobuf::decode(&body)?;

    if let Some(prekey) = &payload.prekey {
        if prekey.key.len() != KEY_LEN || prekey.sig.len() != wire::SIG_LEN {
            return Err(ApiError::BadRequest("prekey has the wrong key or signature length".into()));
        }
        if !verify(&caller.ik, &prekey.key, &prekey.sig) {
            return Err(ApiError::BadRequest("prekey signature does not verify".into()));
        }
    }
    if let Some(pqkem_prekey) = &payload.pqkem_prekey {
        if !pqkem_prekey.has_valid_sig_length() {
            return Err(ApiError::BadRequest("pqkem_prekey signature must be 64 bytes".into()));
        }
        if !verify(&caller.ik, &pqkem_prekey.key, &pqkem_prekey.sig) {
            return Err(ApiError::BadRequest("pqkem_prekey signature does not verify".into()));
        }
    }
    for pqopk in &payload.one_time_pqkem_prekeys {
        if !pqopk.has_valid_sig_length() {
            return Err(ApiError::BadRequest("one-time pqkem prekey signature must be 64 bytes".into()));
        }
        if !verify(&caller.ik, &pqopk.key, &pqopk.sig) {
            return Err(ApiError::BadRequest("one-time pqkem prekey signature does not verify".into()));
        }
    }

    let patch = IdentityPatch {
        spk: payload.prekey.as_ref().map(wire_signed_prekey),
        pqspk: payload.pqkem_prekey.as_ref().map(wire_signed_prekey),
        one_time_prekeys: payload.one_time_prekeys.iter().map(wire_prekey).collect(),
        one_time_pqkem_prekeys: payload.one_time_pqkem_prekeys.iter().map(wire_signed_prekey).collect(),
    };

    identity::patch(store.pool(), caller.id, patch)
        .await
        .map_err(|err| ApiError::Internal(err.into()))?;

    Ok(axum::http::StatusCode::OK)
}

async fn delete_identity(
    State(store): State<Store>,
    Extension(caller): Extension<ResolvedIdentity>,
) -> Result<axum::http::StatusCode, ApiError> {
    identity::delete(store.pool(), caller.id)
        .await
        .map_err(|err| ApiError::Internal(err.into()))?;
    Ok(axum::http::StatusCode::OK)
}

async fn get_identity(
    State(store): State<Store>,
    Extension(_caller): Extension<ResolvedIdentity>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let handle = params
        .get("handle")
        .ok_or_else(|| ApiError::BadRequest("missing handle query parameter".into()))?;

    let found = identity::get_public(store.pool(), handle)
        .await
        .map_err(|err| ApiError::Internal(err.into()))?
        .ok_or(ApiError::NotFound)?;

    let wire = wire::PublicIdentity { handle: found.handle, id_key: found.id_key };
    Ok(protobuf::respond(&wire, "PublicIdentity", Some("private, max-age=60")))
}
