//! Inbound webhook receiver and viewer

use axum::{
    body::Bytes,
    extract::{Path, State},
    response::Html,
    routing::{get, post},
    Json, Router,
};

use crate::error::{AppError, Result};
use crate::models::WebhookAck;
use crate::routes::AppState;
use crate::services::inbox::WebhookEntry;
use crate::utils::html::render_viewer;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/dashboard_webhook_receiver", post(receive_webhook))
        .route("/view_webhook/:job_id", get(view_webhook))
        .route("/api/v1/webhooks/:job_id", get(get_webhook))
        .with_state(state)
}

/// Riceve l'esito di un job; risponde sempre 200
#[utoipa::path(
    post,
    path = "/dashboard_webhook_receiver",
    tag = "Webhook",
    request_body(content = serde_json::Value, description = "Payload JSON con campo job_id"),
    responses(
        (status = 200, description = "Webhook ricevuto", body = WebhookAck),
    )
)]
pub async fn receive_webhook(State(state): State<AppState>, body: Bytes) -> Json<WebhookAck> {
    match serde_json::from_slice::<serde_json::Value>(&body) {
        Ok(value) => match state.inbox.accept(value).await {
            Some(job_id) => tracing::info!("Webhook ricevuto per job {}", job_id),
            None => tracing::warn!("Webhook ricevuto senza job_id, ignorato"),
        },
        Err(e) => tracing::warn!("Webhook con corpo non JSON ignorato: {}", e),
    }

    Json(WebhookAck::default())
}

/// Pagina HTML con l'ultimo webhook ricevuto per il job
#[utoipa::path(
    get,
    path = "/view_webhook/{job_id}",
    tag = "Webhook",
    params(
        ("job_id" = String, Path, description = "ID del job")
    ),
    responses(
        (status = 200, description = "Pagina del viewer", body = String, content_type = "text/html"),
    )
)]
pub async fn view_webhook(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Html<String> {
    let entry = state.inbox.peek(&job_id).await;
    Html(render_viewer(&job_id, entry.as_ref()))
}

/// Ultimo webhook ricevuto per il job, in JSON
#[utoipa::path(
    get,
    path = "/api/v1/webhooks/{job_id}",
    tag = "Webhook",
    params(
        ("job_id" = String, Path, description = "ID del job")
    ),
    responses(
        (status = 200, description = "Webhook ricevuto", body = WebhookEntry),
        (status = 404, description = "Nessun webhook per questo job"),
    )
)]
pub async fn get_webhook(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<WebhookEntry>> {
    match state.inbox.peek(&job_id).await {
        Some(entry) => Ok(Json(entry)),
        None => Err(AppError::JobNotFound(job_id)),
    }
}
