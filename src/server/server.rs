use anyhow::Result;
use std::time::Duration;

use crate::blob_store::GuardedBlobStore;
use tracing::info;

use axum::{
    extract::State,
    middleware,
    routing::get,
    Json, Router,
};
use serde::Serialize;

use super::manifest_routes::get_manifest;
use super::metrics::metrics_handler;
use super::{log_requests, state::*, RequestsLoggingLevel, ServerConfig};

#[derive(Serialize)]
struct ServerStats {
    pub uptime: String,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

async fn home(State(state): State<ServerState>) -> Json<ServerStats> {
    Json(ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
    })
}

pub fn make_app(config: ServerConfig, store: GuardedBlobStore) -> Router {
    let state = ServerState::new(config, store);

    // Registry-internal endpoints live under `/-/`, which can never collide
    // with a package name.
    let mut app: Router = Router::new()
        .route("/", get(home))
        .route("/-/metrics", get(metrics_handler))
        .route("/{*path}", get(get_manifest))
        .with_state(state.clone());

    app = app.layer(middleware::from_fn_with_state(state, log_requests));
    app
}

pub async fn run_server(
    store: GuardedBlobStore,
    requests_logging_level: RequestsLoggingLevel,
    port: u16,
) -> Result<()> {
    let config = ServerConfig {
        port,
        requests_logging_level,
    };
    let app = make_app(config, store);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    info!("serving manifests on port {}", port);

    Ok(axum::serve(listener, app).await?)
}
