//! In-memory inbox for inbound webhooks
//!
//! Holds the last callback payload received for each job, for the viewer
//! page. Entries live for the retention window and are removed by a periodic
//! sweep task that stops on the shutdown signal.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use utoipa::ToSchema;

/// Ultimo webhook ricevuto per un job
#[derive(Debug, Clone, Serialize, PartialEq, ToSchema)]
pub struct WebhookEntry {
    pub job_id: String,
    #[schema(value_type = Object)]
    pub payload: serde_json::Value,
    #[schema(value_type = String)]
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct WebhookInbox {
    entries: Arc<Mutex<HashMap<String, WebhookEntry>>>,
    retention: chrono::Duration,
}

impl WebhookInbox {
    pub fn new(retention: Duration) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            retention: chrono::Duration::from_std(retention)
                .unwrap_or_else(|_| chrono::Duration::weeks(52 * 100)),
        }
    }

    /// Salva il payload per il job, sostituendo quello precedente
    pub async fn record(&self, job_id: impl Into<String>, payload: serde_json::Value) {
        self.record_at(job_id, payload, Utc::now()).await;
    }

    pub(crate) async fn record_at(
        &self,
        job_id: impl Into<String>,
        payload: serde_json::Value,
        now: DateTime<Utc>,
    ) {
        let job_id = job_id.into();
        let entry = WebhookEntry {
            job_id: job_id.clone(),
            payload,
            received_at: now,
        };

        let mut entries = self.entries.lock().await;
        if entries.insert(job_id.clone(), entry).is_some() {
            tracing::debug!("Webhook per job {} sovrascritto", job_id);
        }
    }

    /// Registra un webhook in arrivo. Restituisce il job id se il payload ne
    /// conteneva uno, altrimenti non salva nulla.
    pub async fn accept(&self, body: serde_json::Value) -> Option<String> {
        let (job_id, payload) = split_job_id(body)?;
        self.record(job_id.clone(), payload).await;
        Some(job_id)
    }

    pub async fn peek(&self, job_id: &str) -> Option<WebhookEntry> {
        let now = Utc::now();
        let entries = self.entries.lock().await;
        entries
            .get(job_id)
            .filter(|entry| !self.is_expired(entry, now))
            .cloned()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Rimuove le voci più vecchie della finestra di retention
    pub async fn sweep(&self) -> usize {
        self.sweep_at(Utc::now()).await
    }

    pub(crate) async fn sweep_at(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, entry| !self.is_expired(entry, now));
        before - entries.len()
    }

    /// Avvia il task di pulizia periodica, attivo fino al segnale di shutdown
    pub fn spawn_sweeper(
        &self,
        every: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let inbox = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            // Il primo tick è immediato
            ticker.tick().await;

            loop {
                tokio::select! {
                    changed = shutdown.changed() => {
                        // Sender chiuso: equivale allo shutdown
                        if changed.is_err() || *shutdown.borrow() {
                            tracing::debug!("Pulizia inbox webhook terminata");
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        let removed = inbox.sweep().await;
                        if removed > 0 {
                            tracing::info!("Pulizia inbox: {} webhook scaduti rimossi", removed);
                        }
                    }
                }
            }
        })
    }

    fn is_expired(&self, entry: &WebhookEntry, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(entry.received_at) > self.retention
    }
}

/// Separa il `job_id` dal resto del payload
fn split_job_id(body: serde_json::Value) -> Option<(String, serde_json::Value)> {
    let serde_json::Value::Object(mut map) = body else {
        return None;
    };

    let job_id = match map.remove("job_id")? {
        serde_json::Value::String(s) if !s.trim().is_empty() => s,
        serde_json::Value::Number(n) => n.to_string(),
        _ => return None,
    };

    Some((job_id, serde_json::Value::Object(map)))
}
