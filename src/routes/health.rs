use axum::{extract::State, routing::get, Json, Router};

use crate::models::HealthResponse;
use crate::routes::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/health", get(health_check))
        .with_state(state)
}

/// Health check dell'API
#[utoipa::path(
    get,
    path = "/api/v1/health",
    responses(
        (status = 200, description = "API funzionante", body = HealthResponse),
    ),
    tag = "Sistema"
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let queue_reachable = match state.queue.ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("Health check: coda non raggiungibile: {}", e);
            false
        }
    };

    Json(HealthResponse {
        status: if queue_reachable { "ok" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        queue_backend: state.queue.backend().to_string(),
        queue_reachable,
        stored_jobs: state.store.count().await,
        inbox_entries: state.inbox.len().await,
    })
}
