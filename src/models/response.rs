use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use super::{JobState, StatusKind};

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Stato dell'API
    pub status: String,
    /// Versione dell'API
    pub version: String,
    /// Backend della coda (memory, redis)
    pub queue_backend: String,
    /// La coda risponde alle query di appartenenza
    pub queue_reachable: bool,
    /// Record presenti nell'archivio risultati
    pub stored_jobs: usize,
    /// Webhook presenti nell'inbox
    pub inbox_entries: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SubmitResponse {
    pub message: String,
    pub job_id: String,
    pub status_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_viewer_url: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StatusResponse {
    pub job_id: String,
    pub status: StatusKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl StatusResponse {
    pub fn from_state(job_id: &str, state: JobState) -> Self {
        let status = state.kind();
        match state {
            JobState::Finished(record) => Self {
                job_id: job_id.to_string(),
                status,
                result: record.result,
                message: None,
                timestamp: Some(record.timestamp),
            },
            JobState::Pending => Self {
                job_id: job_id.to_string(),
                status,
                result: None,
                message: Some("Job in coda, in attesa di un worker.".to_string()),
                timestamp: None,
            },
            JobState::Processing => Self {
                job_id: job_id.to_string(),
                status,
                result: None,
                message: Some("Job in esecuzione su un worker.".to_string()),
                timestamp: None,
            },
            JobState::ExpiredOrNotFound => Self {
                job_id: job_id.to_string(),
                status,
                result: None,
                message: Some(
                    "Risultato scaduto o ID non valido. Inviare un nuovo job.".to_string(),
                ),
                timestamp: None,
            },
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WebhookAck {
    pub status: String,
}

impl Default for WebhookAck {
    fn default() -> Self {
        Self {
            status: "webhook received".to_string(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub status: u16,
}
