//! Job execution
//!
//! One run per dequeued job: a `processing` record, the downstream call, one
//! terminal record, then an optional best-effort forward of the outcome.

use std::time::Duration;

use serde_json::json;

use crate::models::JobRecord;
use crate::services::queue::QueuedJob;
use crate::services::store::{ResultStore, StoreError};

const FAILURE_DETAILS: &str = "Failed to get response from external service.";

#[derive(Debug, Clone)]
pub struct Executor {
    store: ResultStore,
    downstream_url: String,
    client: reqwest::Client,
    forward_client: reqwest::Client,
}

impl Executor {
    pub fn new(
        store: ResultStore,
        downstream_url: impl Into<String>,
        downstream_timeout: Duration,
        forward_timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(downstream_timeout)
            .build()?;
        let forward_client = reqwest::Client::builder()
            .timeout(forward_timeout)
            .build()?;

        Ok(Self {
            store,
            downstream_url: downstream_url.into(),
            client,
            forward_client,
        })
    }

    pub fn store(&self) -> &ResultStore {
        &self.store
    }

    /// Esegue il job e restituisce il record terminale salvato.
    ///
    /// Gli errori del servizio esterno diventano un record `failed`. Se
    /// l'archivio non accetta le scritture il job viene comunque eseguito e
    /// l'esito inoltrato al callback, poi l'errore risale al chiamante.
    /// Un job con record terminale già presente non viene rieseguito.
    pub async fn run(&self, job: &QueuedJob) -> Result<JobRecord, StoreError> {
        let job_id = job.job_id.to_string();
        tracing::info!("Worker elabora job {}", job_id);

        match self.store.save(&job_id, JobRecord::processing()).await {
            Ok(_) => {}
            Err(e @ StoreError::TerminalRecord(_)) => return Err(e),
            Err(e) => {
                tracing::warn!("Record processing non salvato per job {}: {}", job_id, e);
            }
        }

        let record = match self.call_downstream(&job.payload).await {
            Ok(body) => JobRecord::completed(body),
            Err(e) => {
                tracing::warn!("Chiamata al servizio esterno fallita per job {}: {}", job_id, e);
                JobRecord::failed(json!({
                    "error": e,
                    "details": FAILURE_DETAILS,
                }))
            }
        };

        let saved = self.store.save(&job_id, record.clone()).await;
        let outcome = match saved {
            Ok(ref stored) => {
                tracing::info!("Job {} terminato con stato {}", job_id, stored.status);
                stored
            }
            Err(ref e) => {
                tracing::error!("Esito del job {} non salvato nell'archivio: {}", job_id, e);
                &record
            }
        };

        if let Some(ref url) = job.callback_url {
            self.forward(url, &job_id, outcome).await;
        }

        saved
    }

    async fn call_downstream(&self, payload: &serde_json::Value) -> Result<serde_json::Value, String> {
        tracing::debug!("Chiamata al servizio esterno: {}", self.downstream_url);

        let response = self
            .client
            .post(&self.downstream_url)
            .json(payload)
            .send()
            .await
            .map_err(describe)?
            .error_for_status()
            .map_err(describe)?;

        let text = response.text().await.map_err(describe)?;

        // Un corpo non JSON viene conservato come stringa
        Ok(serde_json::from_str(&text).unwrap_or(serde_json::Value::String(text)))
    }

    /// Inoltra l'esito al callback. Gli errori vengono solo loggati.
    pub async fn forward(&self, url: &str, job_id: &str, record: &JobRecord) {
        tracing::info!("Inoltro risultato del job {} a {}", job_id, url);

        let payload = json!({
            "job_id": job_id,
            "status": record.status,
            "result": record.result,
        });

        match self.forward_client.post(url).json(&payload).send().await {
            Ok(response) => {
                if response.status().is_success() {
                    tracing::info!("Webhook inoltrato con successo per job {}", job_id);
                } else {
                    tracing::warn!(
                        "Webhook per job {} ha ritornato status {}",
                        job_id,
                        response.status()
                    );
                }
            }
            Err(e) => {
                tracing::error!("Inoltro webhook fallito per job {}: {}", job_id, e);
            }
        }
    }
}

fn describe(e: reqwest::Error) -> String {
    if e.is_timeout() {
        format!("timeout: {}", e)
    } else if let Some(status) = e.status() {
        format!("HTTP {}: {}", status.as_u16(), e)
    } else {
        e.to_string()
    }
}
