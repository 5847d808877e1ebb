use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::models::{StatusKind, StatusResponse};
use crate::routes::AppState;

/// Stato di un job: archivio risultati, poi coda, poi registry
#[utoipa::path(
    get,
    path = "/status/{job_id}",
    tag = "Jobs",
    params(
        ("job_id" = String, Path, description = "ID del job")
    ),
    responses(
        (status = 200, description = "Job terminato (completed o failed)", body = StatusResponse),
        (status = 202, description = "Job in coda o in esecuzione", body = StatusResponse),
        (status = 404, description = "Job scaduto o sconosciuto", body = StatusResponse),
    )
)]
pub async fn get_job_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> (StatusCode, Json<StatusResponse>) {
    let job_state = state.resolver.resolve(&job_id).await;

    let code = match job_state.kind() {
        StatusKind::Completed | StatusKind::Failed => StatusCode::OK,
        StatusKind::Pending | StatusKind::Processing => StatusCode::ACCEPTED,
        StatusKind::ExpiredOrNotFound => StatusCode::NOT_FOUND,
    };

    (code, Json(StatusResponse::from_state(&job_id, job_state)))
}
