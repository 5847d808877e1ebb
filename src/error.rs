use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::services::queue::QueueError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Job non trovato: {0}")]
    JobNotFound(String),

    #[error("Coda non raggiungibile: {0}")]
    QueueUnavailable(String),

    #[error("Impossibile creare il webhook: {0}")]
    WebhookUnavailable(String),

    #[error("Non autorizzato: {0}")]
    Unauthorized(String),

    #[error("Troppe richieste: {0}")]
    RateLimited(String),

    #[error("Richiesta non valida: {0}")]
    BadRequest(String),

    #[error("Errore interno: {0}")]
    Internal(String),
}

impl From<QueueError> for AppError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::Unavailable(msg) => AppError::QueueUnavailable(msg),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::JobNotFound(_) => StatusCode::NOT_FOUND,
            AppError::QueueUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::WebhookUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!("{}", self);
        }

        let body = Json(json!({
            "error": self.to_string(),
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
