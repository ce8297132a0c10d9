//! Tiny glue for handlers that speak protobuf directly rather than going
//! through axum's `Json` extractor: decode a request body, encode a
//! response body with the matching `proto=` content-type parameter.

use axum::body::Bytes;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use pqrelay_common::error::ApiError;
use prost::Message;

pub fn decode<T: Message + Default>(body: &[u8]) -> Result<T, ApiError> {
    T::decode(body).map_err(|err| ApiError::BadRequest(format!("malformed request body: {err}")))
}

/// Wraps an encoded protobuf message with `Content-Type: application/protobuf;
/// proto=messages.<name>` (§6.2). `cache` is an optional `Cache-Control` value.
pub fn respond<T: Message>(message: &T, proto_name: &str, cache: Option<&str>) -> Response {
    let body = message.encode_to_vec();
    let content_type = format!("application/protobuf; proto=messages.{proto_name}");
    let mut response = (
        [(header::CONTENT_TYPE, content_type)],
        body,
    )
        .into_response();
    if let Some(cache) = cache {
        response
            .headers_mut()
            .insert(header::CACHE_CONTROL, cache.parse().expect("static cache-control value is valid"));
    }
    response
}
