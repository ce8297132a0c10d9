//! # pqrelay-server
//!
//! The host (C9) and router (C8): resolves configuration, opens the
//! store, builds the combined HTTP/WebSocket router plus static file
//! serving for the client app, and runs until SIGINT/SIGTERM.

use axum::body::Body;
use axum::extract::Request;
use axum::http::{header, HeaderValue, Method, StatusCode, Uri};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::Router;
use pqrelay_common::config::Config;
use pqrelay_gateway::connections::ConnectionTable;
use pqrelay_store::Store;
use tower::Service;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    if let Err(err) = run().await {
        tracing::error!(error = %err, "startup failed");
        std::process::exit(1);
    }

    Ok(())
}

async fn run() -> anyhow::Result<()> {
    let config = Config::resolve();

    let store = Store::open(&config.db_path).await?;
    let connections = ConnectionTable::new();

    let app = Router::new()
        .merge(pqrelay_api::build_router(store.clone()))
        .merge(pqrelay_gateway::build_router(store.clone(), connections))
        .fallback(static_or_not_found)
        .layer(middleware::from_fn(cors_and_preflight))
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&config.listen).await?;
    tracing::info!(listen = %config.listen, db = %config.db_path, "pqrelay-server listening");

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    store.pool().close().await;
    tracing::info!("store closed, clean shutdown");
    Ok(())
}

/// Anything unmatched under `/api/` is a 404; everything else falls
/// through to the client app's static files, with `index.html` as the SPA
/// fallback for client-side routes (§4.8).
pub fn is_reserved_backend_path(path: &str) -> bool {
    let first_segment = path.trim_start_matches('/').split('/').next().unwrap_or("");
    first_segment == "api" || path == "/healthz"
}

async fn static_or_not_found(request: Request) -> Response {
    if is_reserved_backend_path(request.uri().path()) {
        return StatusCode::NOT_FOUND.into_response();
    }

    let mut service = ServeDir::new("./public").fallback(ServeFile::new("./public/index.html"));
    match service.call(request).await {
        Ok(response) => response.into_response(),
        Err(err) => {
            tracing::error!(%err, "static file service failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received SIGINT"),
        _ = terminate => tracing::info!("received SIGTERM"),
    }
}

/// Handles `OPTIONS *` with a bare 204 (§4.8) and, in debug builds only,
/// decorates every response with a permissive `Access-Control-Allow-Origin`
/// so the client app can be served from a different origin during
/// development without a reverse proxy.
async fn cors_and_preflight(request: Request<Body>, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        let mut response = StatusCode::NO_CONTENT.into_response();
        apply_debug_cors_header(&mut response);
        return response;
    }

    let mut response = next.run(request).await;
    apply_debug_cors_header(&mut response);
    response
}

fn apply_debug_cors_header(response: &mut Response) {
    if cfg!(debug_assertions) {
        response
            .headers_mut()
            .insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    }
}
