use axum::{extract::State, http::StatusCode, Json};

use crate::error::{AppError, Result};
use crate::models::{SubmitRequest, SubmitResponse};
use crate::routes::AppState;
use crate::services::queue::QueuedJob;

/// Mette in coda un nuovo job e risponde subito
#[utoipa::path(
    post,
    path = "/submit",
    tag = "Jobs",
    request_body = SubmitRequest,
    responses(
        (status = 202, description = "Job accettato", body = SubmitResponse),
        (status = 400, description = "Callback URL non valido"),
        (status = 401, description = "Token mancante o non valido"),
        (status = 429, description = "Troppe richieste"),
        (status = 500, description = "Webhook richiesto ma URL pubblico non configurato"),
        (status = 503, description = "Coda non raggiungibile"),
    )
)]
pub async fn submit_job(
    State(state): State<AppState>,
    Json(req): Json<SubmitRequest>,
) -> Result<(StatusCode, Json<SubmitResponse>)> {
    // L'inbox interna riceve l'esito solo se il client non ha indicato un suo callback
    let use_inbox = req.create_webhook && req.callback_url.is_none();

    let callback_url = match req.callback_url {
        Some(url) => Some(validate_callback_url(url)?),
        None if use_inbox => Some(state.config.receiver_url().ok_or_else(|| {
            AppError::WebhookUnavailable("TASKGATE_PUBLIC_URL non configurato".to_string())
        })?),
        None => None,
    };

    let job = QueuedJob::new(req.payload, callback_url);
    let job_id = job.job_id.to_string();

    state.queue.enqueue(job).await?;
    tracing::info!("Job {} messo in coda", job_id);

    let webhook_viewer_url = if use_inbox {
        state.config.viewer_url(&job_id)
    } else {
        None
    };

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitResponse {
            message: "Job inviato correttamente.".to_string(),
            status_url: format!("/status/{}", job_id),
            job_id,
            webhook_viewer_url,
        }),
    ))
}

fn validate_callback_url(url: String) -> Result<String> {
    let parsed = reqwest::Url::parse(&url)
        .map_err(|e| AppError::BadRequest(format!("callback_url non valido: {}", e)))?;

    match parsed.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(AppError::BadRequest(format!(
            "callback_url deve essere http o https, non {}",
            scheme
        ))),
    }
}
