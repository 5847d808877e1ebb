use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Stato persistito di un job nell'archivio risultati
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    /// `completed` e `failed` non ammettono ulteriori transizioni
    pub fn is_terminal(self) -> bool {
        !matches!(self, JobStatus::Processing)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Processing => write!(f, "processing"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Record di un job nell'archivio risultati
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct JobRecord {
    pub status: JobStatus,
    /// Corpo della risposta del servizio esterno, o descrizione dell'errore
    #[schema(value_type = Option<Object>)]
    pub result: Option<serde_json::Value>,
    /// Ultima scrittura, usato solo per la scadenza
    #[schema(value_type = String)]
    pub timestamp: DateTime<Utc>,
}

impl JobRecord {
    /// Record iniziale scritto dall'executor appena prende in carico il job
    pub fn processing() -> Self {
        Self {
            status: JobStatus::Processing,
            result: None,
            timestamp: Utc::now(),
        }
    }

    pub fn completed(result: serde_json::Value) -> Self {
        Self {
            status: JobStatus::Completed,
            result: Some(result),
            timestamp: Utc::now(),
        }
    }

    pub fn failed(result: serde_json::Value) -> Self {
        Self {
            status: JobStatus::Failed,
            result: Some(result),
            timestamp: Utc::now(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Stato riportato al client, come visto dal resolver
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub enum StatusKind {
    #[serde(rename = "pending")]
    Pending,
    #[serde(rename = "processing")]
    Processing,
    #[serde(rename = "completed")]
    Completed,
    #[serde(rename = "failed")]
    Failed,
    #[serde(rename = "expired or not found")]
    ExpiredOrNotFound,
}

impl std::fmt::Display for StatusKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatusKind::Pending => write!(f, "pending"),
            StatusKind::Processing => write!(f, "processing"),
            StatusKind::Completed => write!(f, "completed"),
            StatusKind::Failed => write!(f, "failed"),
            StatusKind::ExpiredOrNotFound => write!(f, "expired or not found"),
        }
    }
}

/// Risultato della riconciliazione tra archivio, coda e registry
#[derive(Debug, Clone, PartialEq)]
pub enum JobState {
    /// In coda, non ancora preso da un worker
    Pending,
    /// Presente nel registry dei job in esecuzione
    Processing,
    /// Record terminale dall'archivio
    Finished(JobRecord),
    /// Sconosciuto, oppure scaduto dopo la finestra di retention
    ExpiredOrNotFound,
}

impl JobState {
    pub fn kind(&self) -> StatusKind {
        match self {
            JobState::Pending => StatusKind::Pending,
            JobState::Processing => StatusKind::Processing,
            JobState::Finished(record) => match record.status {
                JobStatus::Completed => StatusKind::Completed,
                JobStatus::Failed => StatusKind::Failed,
                // Il resolver non produce mai Finished con un record non terminale
                JobStatus::Processing => StatusKind::Processing,
            },
            JobState::ExpiredOrNotFound => StatusKind::ExpiredOrNotFound,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_statuses() {
        assert!(!JobStatus::Processing.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }

    #[test]
    fn test_status_kind_wire_names() {
        assert_eq!(
            serde_json::to_value(StatusKind::ExpiredOrNotFound).unwrap(),
            serde_json::json!("expired or not found")
        );
        assert_eq!(
            serde_json::to_value(StatusKind::Pending).unwrap(),
            serde_json::json!("pending")
        );
    }

    #[test]
    fn test_state_kind_follows_record() {
        let state = JobState::Finished(JobRecord::failed(serde_json::json!({"error": "x"})));
        assert_eq!(state.kind(), StatusKind::Failed);

        let state = JobState::Finished(JobRecord::completed(serde_json::json!({"ok": true})));
        assert_eq!(state.kind(), StatusKind::Completed);
    }
}
