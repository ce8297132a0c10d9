//! `/healthz` (ambient stack, §6.2): a liveness probe reporting whether the
//! store is reachable, in the style every long-running service in this
//! corpus carries regardless of what else is in scope.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use pqrelay_store::Store;
use serde::Serialize;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

pub fn router() -> Router<Store> {
    Router::new().route("/healthz", get(health_check))
}

async fn health_check(State(store): State<Store>) -> Json<HealthResponse> {
    let reachable = sqlx::query("SELECT 1").execute(store.pool()).await.is_ok();

    Json(HealthResponse {
        status: if reachable { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
    })
}
