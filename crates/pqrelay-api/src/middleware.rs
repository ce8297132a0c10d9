//! The request authenticator (C4): an axum middleware that runs ahead of
//! every identity-mutating route, verifies the `X-Identity`/`X-Signature`
//! headers against the exact bytes the client sent, and hands the route its
//! resolved identity through a request extension — mirroring the
//! extract-then-insert-into-extensions shape used for auth context
//! elsewhere in this stack, just keyed by a signature instead of a JWT.

use axum::body::{Body, Bytes};
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use base64::Engine;
use pqrelay_common::error::ApiError;
use pqrelay_common::model::ResolvedIdentity;
use pqrelay_common::wire::{canonical_request_message, SIG_LEN};
use pqrelay_store::Store;

/// Generous enough for a registration payload (identity key, two signed
/// prekeys, and 2x10 one-time prekeys) with headroom; still bounded so a
/// client can't force the server to buffer an unbounded body before the
/// signature is even checked.
const MAX_BODY_BYTES: usize = 1 << 20;

/// Verifies the request, then forwards it to `next` with a [`ResolvedIdentity`]
/// extension attached. The raw body bytes are restored onto the forwarded
/// request so the route handler can still decode its protobuf payload.
pub async fn verify_request(State(store): State<Store>, request: Request, next: Next) -> Result<Response, ApiError> {
    let (parts, body) = request.into_parts();

    let handle = parts
        .headers
        .get("x-identity")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::BadRequest("missing X-Identity header".into()))?
        .to_string();

    let signature_b64 = parts
        .headers
        .get("x-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::BadRequest("missing X-Signature header".into()))?;

    let signature = base64::engine::general_purpose::STANDARD
        .decode(signature_b64)
        .map_err(|_| ApiError::BadRequest("X-Signature is not valid base64".into()))?;

    if signature.len() != SIG_LEN {
        return Err(ApiError::BadRequest("X-Signature must decode to 64 bytes".into()));
    }

    let body_bytes: Bytes = axum::body::to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|_| ApiError::BadRequest("body missing or too large".into()))?;

    let identity = pqrelay_store::identity::resolve_for_auth(store.pool(), &handle)
        .await
        .map_err(|err| ApiError::Internal(err.into()))?
        .ok_or(ApiError::Unauthorized)?;

    let query = parts.uri.query().unwrap_or("");
    let message = canonical_request_message(parts.method.as_str(), parts.uri.path(), query, &body_bytes);

    if !pqrelay_common::crypto::verify(&identity.ik, &message, &signature) {
        return Err(ApiError::Unauthorized);
    }

    let ik: [u8; 32] = identity
        .ik
        .try_into()
        .map_err(|_| ApiError::Internal(anyhow::anyhow!("stored ik is not 32 bytes")))?;

    let mut request = Request::from_parts(parts, Body::from(body_bytes));
    request.extensions_mut().insert(ResolvedIdentity { id: identity.id, handle, ik });

    Ok(next.run(request).await)
}
