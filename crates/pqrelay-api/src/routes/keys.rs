//! Prekey bundle service (C6): `GET /api/keys/{handle}/bundle[?dryRun=1]`.

use axum::extract::{Extension, Path, Query, State};
use axum::routing::get;
use axum::Router;
use pqrelay_common::error::ApiError;
use pqrelay_common::model::ResolvedIdentity;
use pqrelay_common::wire::{self, PQXDHKeyBundle};
use pqrelay_store::{prekey, Store};
use std::collections::HashMap;

use crate::protobuf;

pub fn router() -> Router<Store> {
    Router::new().route("/api/keys/{handle}/bundle", get(get_bundle))
}

async fn get_bundle(
    State(store): State<Store>,
    Extension(_caller): Extension<ResolvedIdentity>,
    Path(handle): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let dry_run = params.get("dryRun").map(|v| v == "1").unwrap_or(false);

    let bundle = prekey::fetch_bundle(store.pool(), &handle, dry_run)
        .await
        .map_err(|err| ApiError::Internal(err.into()))?
        .ok_or(ApiError::NotFound)?;

    let wire = PQXDHKeyBundle {
        id_key: bundle.id_key,
        prekey: bundle.prekey.map(|p| wire::SignedPrekey { id: p.id, key: p.key, sig: p.sig }),
        pqkem_prekey: bundle.pqkem_prekey.map(|p| wire::SignedPrekey { id: p.id, key: p.key, sig: p.sig }),
        one_time_prekey: bundle.one_time_prekey.map(|p| wire::Prekey { id: p.id, key: p.key }),
    };

    Ok(protobuf::respond(&wire, "PQXDHKeyBundle", Some("private, max-age=60")))
}
