//! Job status reconciliation
//!
//! The result store is authoritative for finished jobs, the queue and the
//! registry are authoritative for live ones. [`reconcile`] merges the three
//! lookups; [`StatusResolver`] performs them in precedence order.

use crate::models::{JobRecord, JobState};
use crate::services::queue::{QueueError, SharedQueue};
use crate::services::store::ResultStore;

/// Esito di una query di appartenenza alla coda o al registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    Present,
    Absent,
    /// Backend non raggiungibile
    Unreachable,
    /// Non interrogato, una fonte precedente ha già risposto
    Skipped,
}

impl From<Result<bool, QueueError>> for Probe {
    fn from(result: Result<bool, QueueError>) -> Self {
        match result {
            Ok(true) => Probe::Present,
            Ok(false) => Probe::Absent,
            Err(_) => Probe::Unreachable,
        }
    }
}

/// Stato del job a partire dalle tre fonti.
///
/// Un record `processing` da solo non basta: un worker terminato a metà lo
/// lascerebbe per sempre, quindi conta solo se la coda o il registry
/// confermano che il job è vivo.
pub fn reconcile(stored: Option<&JobRecord>, queued: Probe, started: Probe) -> JobState {
    if let Some(record) = stored.filter(|r| r.is_terminal()) {
        return JobState::Finished(record.clone());
    }

    match (queued, started) {
        (Probe::Present, _) => JobState::Pending,
        (Probe::Absent, Probe::Present) => JobState::Processing,
        _ => JobState::ExpiredOrNotFound,
    }
}

#[derive(Debug, Clone)]
pub struct StatusResolver {
    store: ResultStore,
    queue: SharedQueue,
}

impl StatusResolver {
    pub fn new(store: ResultStore, queue: SharedQueue) -> Self {
        Self { store, queue }
    }

    pub async fn resolve(&self, job_id: &str) -> JobState {
        let stored = self.store.fetch(job_id).await;
        if stored.as_ref().is_some_and(JobRecord::is_terminal) {
            return reconcile(stored.as_ref(), Probe::Skipped, Probe::Skipped);
        }

        let queued = self.probe(job_id, "coda", self.queue.is_pending(job_id).await);
        let started = match queued {
            Probe::Absent => self.probe(job_id, "registry", self.queue.is_started(job_id).await),
            _ => Probe::Skipped,
        };

        let state = reconcile(stored.as_ref(), queued, started);

        // Il record terminale viene scritto prima della rimozione dal registry:
        // se entrambe le fonti live dicono "assente" il job potrebbe essere
        // appena terminato, quindi si rilegge l'archivio una volta
        if state == JobState::ExpiredOrNotFound && started == Probe::Absent {
            if let Some(record) = self.store.fetch(job_id).await.filter(JobRecord::is_terminal) {
                return JobState::Finished(record);
            }
        }

        state
    }

    fn probe(&self, job_id: &str, source: &str, result: Result<bool, QueueError>) -> Probe {
        if let Err(ref e) = result {
            tracing::error!(
                "Errore interrogando {} per lo stato del job {}: {}",
                source,
                job_id,
                e
            );
        }
        result.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::queue::{MemoryQueue, QueuedJob, WorkQueue};
    use async_trait::async_trait;
    use chrono::Utc;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn processing() -> JobRecord {
        JobRecord::processing()
    }

    fn completed() -> JobRecord {
        JobRecord::completed(json!({"ok": true}))
    }

    #[test]
    fn test_unknown_job() {
        assert_eq!(
            reconcile(None, Probe::Absent, Probe::Absent),
            JobState::ExpiredOrNotFound
        );
    }

    #[test]
    fn test_terminal_record_wins() {
        let record = completed();
        for (queued, started) in [
            (Probe::Present, Probe::Absent),
            (Probe::Absent, Probe::Present),
            (Probe::Unreachable, Probe::Skipped),
            (Probe::Skipped, Probe::Skipped),
        ] {
            assert_eq!(
                reconcile(Some(&record), queued, started),
                JobState::Finished(record.clone())
            );
        }
    }

    #[test]
    fn test_queue_then_registry() {
        assert_eq!(reconcile(None, Probe::Present, Probe::Skipped), JobState::Pending);
        assert_eq!(reconcile(None, Probe::Absent, Probe::Present), JobState::Processing);
        assert_eq!(
            reconcile(Some(&processing()), Probe::Absent, Probe::Present),
            JobState::Processing
        );
    }

    #[test]
    fn test_orphaned_processing_record_is_not_trusted() {
        assert_eq!(
            reconcile(Some(&processing()), Probe::Absent, Probe::Absent),
            JobState::ExpiredOrNotFound
        );
    }

    #[test]
    fn test_unreachable_degrades_to_not_found() {
        assert_eq!(
            reconcile(None, Probe::Unreachable, Probe::Skipped),
            JobState::ExpiredOrNotFound
        );
        assert_eq!(
            reconcile(Some(&processing()), Probe::Absent, Probe::Unreachable),
            JobState::ExpiredOrNotFound
        );
    }

    /// Coda che fallisce ogni query, come un Redis irraggiungibile
    #[derive(Debug)]
    struct DownQueue;

    #[async_trait]
    impl WorkQueue for DownQueue {
        fn backend(&self) -> &'static str {
            "down"
        }
        async fn enqueue(&self, _job: QueuedJob) -> Result<(), QueueError> {
            Err(QueueError::Unavailable("connection refused".to_string()))
        }
        async fn dequeue(&self) -> Result<Option<QueuedJob>, QueueError> {
            Err(QueueError::Unavailable("connection refused".to_string()))
        }
        async fn finish(&self, _job_id: &str) -> Result<(), QueueError> {
            Err(QueueError::Unavailable("connection refused".to_string()))
        }
        async fn is_pending(&self, _job_id: &str) -> Result<bool, QueueError> {
            Err(QueueError::Unavailable("connection refused".to_string()))
        }
        async fn is_started(&self, _job_id: &str) -> Result<bool, QueueError> {
            Err(QueueError::Unavailable("connection refused".to_string()))
        }
        async fn ping(&self) -> Result<(), QueueError> {
            Err(QueueError::Unavailable("connection refused".to_string()))
        }
    }

    fn store_in(dir: &tempfile::TempDir) -> ResultStore {
        ResultStore::new(dir.path().join("job_results.json"), Duration::from_secs(600))
    }

    #[tokio::test]
    async fn test_resolver_follows_job_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let queue = Arc::new(MemoryQueue::new());
        let resolver = StatusResolver::new(store.clone(), queue.clone());

        let job = QueuedJob::new(json!({"x": 1}), None);
        let id = job.job_id.to_string();
        assert_eq!(resolver.resolve(&id).await, JobState::ExpiredOrNotFound);

        queue.enqueue(job).await.unwrap();
        assert_eq!(resolver.resolve(&id).await, JobState::Pending);

        queue.dequeue().await.unwrap().unwrap();
        assert_eq!(resolver.resolve(&id).await, JobState::Processing);

        store.upsert(&id, processing()).unwrap();
        assert_eq!(resolver.resolve(&id).await, JobState::Processing);

        let saved = store.upsert(&id, completed()).unwrap();
        queue.finish(&id).await.unwrap();
        assert_eq!(resolver.resolve(&id).await, JobState::Finished(saved.clone()));
        // Query ripetute restituiscono lo stesso record
        assert_eq!(resolver.resolve(&id).await, JobState::Finished(saved));
    }

    #[tokio::test]
    async fn test_resolver_ignores_orphaned_processing() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let resolver = StatusResolver::new(store.clone(), Arc::new(MemoryQueue::new()));

        store.upsert("orphan", processing()).unwrap();
        assert_eq!(resolver.resolve("orphan").await, JobState::ExpiredOrNotFound);
    }

    #[tokio::test]
    async fn test_abandoned_job_expires_after_retention() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let queue = Arc::new(MemoryQueue::with_lease(Duration::from_millis(30)));
        let resolver = StatusResolver::new(store.clone(), queue.clone());

        let job = QueuedJob::new(json!({}), None);
        let id = job.job_id.to_string();
        queue.enqueue(job).await.unwrap();
        queue.dequeue().await.unwrap().unwrap();

        // Il worker ha scritto l'esito ed è morto prima di `finish`
        let long_ago = Utc::now() - chrono::Duration::minutes(11);
        store.upsert_at(&id, processing(), long_ago).unwrap();
        store.upsert_at(&id, completed(), long_ago).unwrap();

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(resolver.resolve(&id).await, JobState::ExpiredOrNotFound);
    }

    #[tokio::test]
    async fn test_resolver_degrades_when_queue_is_down() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let resolver = StatusResolver::new(store.clone(), Arc::new(DownQueue));

        store.upsert("running", processing()).unwrap();
        assert_eq!(resolver.resolve("running").await, JobState::ExpiredOrNotFound);

        // I record terminali non richiedono la coda
        let saved = store.upsert("done", completed()).unwrap();
        assert_eq!(resolver.resolve("done").await, JobState::Finished(saved));
    }
}
