//! File-backed result store
//!
//! One JSON document maps job id to [`JobRecord`]. Every write rewrites the
//! whole file through a temp file + rename and drops records older than the
//! retention window on the way. Reads never fail: a missing or corrupt file is
//! an empty store.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::models::JobRecord;

pub type Snapshot = HashMap<String, JobRecord>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("errore I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("errore di serializzazione: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("il job {0} ha già un record terminale")]
    TerminalRecord(String),

    #[error("task di I/O interrotto: {0}")]
    Task(String),
}

#[derive(Debug, Clone)]
pub struct ResultStore {
    inner: Arc<StoreInner>,
}

#[derive(Debug)]
struct StoreInner {
    path: PathBuf,
    retention: chrono::Duration,
    // Serializza le read-modify-write dei worker di questo processo
    write_lock: Mutex<()>,
}

impl ResultStore {
    pub fn new(path: impl Into<PathBuf>, retention: Duration) -> Self {
        let retention = chrono::Duration::from_std(retention)
            .unwrap_or_else(|_| chrono::Duration::weeks(52 * 100));
        Self {
            inner: Arc::new(StoreInner {
                path: path.into(),
                retention,
                write_lock: Mutex::new(()),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Crea il file vuoto se non esiste ancora
    pub fn ensure_exists(&self) -> Result<(), StoreError> {
        if !self.inner.path.exists() {
            let _guard = self
                .inner
                .write_lock
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            self.persist(&Snapshot::new())?;
        }
        Ok(())
    }

    /// Snapshot corrente su disco, vuoto se il file manca o è corrotto
    pub fn load(&self) -> Snapshot {
        let path = &self.inner.path;
        if !path.exists() {
            return Snapshot::new();
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!("Lettura archivio {} fallita: {}", path.display(), e);
                return Snapshot::new();
            }
        };

        match serde_json::from_str(&content) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(
                    "Archivio {} corrotto, trattato come vuoto: {}",
                    path.display(),
                    e
                );
                Snapshot::new()
            }
        }
    }

    /// Record del job, se presente e ancora entro la finestra di retention
    pub fn get(&self, job_id: &str) -> Option<JobRecord> {
        self.get_at(job_id, Utc::now())
    }

    pub(crate) fn get_at(&self, job_id: &str, now: DateTime<Utc>) -> Option<JobRecord> {
        self.load()
            .remove(job_id)
            .filter(|record| !self.is_expired(record, now))
    }

    /// Numero di record non scaduti
    pub fn len(&self) -> usize {
        let now = Utc::now();
        self.load()
            .values()
            .filter(|record| !self.is_expired(record, now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// [`get`](Self::get) su un thread bloccante, per i chiamanti async
    pub async fn fetch(&self, job_id: &str) -> Option<JobRecord> {
        let store = self.clone();
        let job_id = job_id.to_string();
        match tokio::task::spawn_blocking(move || store.get(&job_id)).await {
            Ok(record) => record,
            Err(e) => {
                tracing::error!("Lettura archivio interrotta: {}", e);
                None
            }
        }
    }

    /// [`upsert`](Self::upsert) su un thread bloccante
    pub async fn save(&self, job_id: &str, record: JobRecord) -> Result<JobRecord, StoreError> {
        let store = self.clone();
        let job_id = job_id.to_string();
        tokio::task::spawn_blocking(move || store.upsert(&job_id, record))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))?
    }

    /// [`len`](Self::len) su un thread bloccante
    pub async fn count(&self) -> usize {
        let store = self.clone();
        match tokio::task::spawn_blocking(move || store.len()).await {
            Ok(n) => n,
            Err(e) => {
                tracing::error!("Lettura archivio interrotta: {}", e);
                0
            }
        }
    }

    /// Inserisce o sovrascrive il record, ripulendo i record scaduti.
    ///
    /// Restituisce il record così come è stato salvato (con il timestamp
    /// aggiornato). Un record terminale non viene mai sovrascritto.
    pub fn upsert(&self, job_id: &str, record: JobRecord) -> Result<JobRecord, StoreError> {
        self.upsert_at(job_id, record, Utc::now())
    }

    pub(crate) fn upsert_at(
        &self,
        job_id: &str,
        mut record: JobRecord,
        now: DateTime<Utc>,
    ) -> Result<JobRecord, StoreError> {
        let _guard = self
            .inner
            .write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let mut snapshot = self.load();
        let before = snapshot.len();
        snapshot.retain(|_, existing| !self.is_expired(existing, now));

        let evicted = before - snapshot.len();
        if evicted > 0 {
            tracing::debug!("Rimossi {} record scaduti dall'archivio", evicted);
        }

        if snapshot.get(job_id).is_some_and(JobRecord::is_terminal) {
            return Err(StoreError::TerminalRecord(job_id.to_string()));
        }

        record.timestamp = now;
        snapshot.insert(job_id.to_string(), record.clone());
        self.persist(&snapshot)?;

        Ok(record)
    }

    fn is_expired(&self, record: &JobRecord, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(record.timestamp) >= self.inner.retention
    }

    // Scrive su un file temporaneo nella stessa directory e lo rinomina,
    // così un lettore vede sempre il vecchio o il nuovo snapshot completo
    fn persist(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        let dir = match self.inner.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        let mut tmp = NamedTempFile::new_in(&dir)?;
        serde_json::to_writer_pretty(tmp.as_file_mut(), snapshot)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.inner.path).map_err(|e| e.error)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const RETENTION: Duration = Duration::from_secs(600);

    fn store_in(dir: &tempfile::TempDir) -> ResultStore {
        ResultStore::new(dir.path().join("job_results.json"), RETENTION)
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        assert!(store.load().is_empty());
        assert!(store.get("nope").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_corrupt_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        std::fs::write(store.path(), "{ not json").unwrap();
        assert!(store.load().is_empty());

        // Una scrittura successiva ricostruisce il file
        store.upsert("a", JobRecord::processing()).unwrap();
        assert_eq!(store.load().len(), 1);
    }

    #[test]
    fn test_ensure_exists_writes_empty_mapping() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.ensure_exists().unwrap();
        let content = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(serde_json::from_str::<serde_json::Value>(&content).unwrap(), json!({}));
    }

    #[test]
    fn test_processing_then_terminal() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        store.upsert("job", JobRecord::processing()).unwrap();
        let record = store.get("job").unwrap();
        assert!(!record.is_terminal());
        assert!(record.result.is_none());

        store
            .upsert("job", JobRecord::completed(json!({"ok": true})))
            .unwrap();
        let record = store.get("job").unwrap();
        assert!(record.is_terminal());
        assert_eq!(record.result, Some(json!({"ok": true})));
    }

    #[test]
    fn test_terminal_record_is_never_revised() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        store
            .upsert("job", JobRecord::failed(json!({"error": "boom"})))
            .unwrap();

        let err = store.upsert("job", JobRecord::processing()).unwrap_err();
        assert!(matches!(err, StoreError::TerminalRecord(id) if id == "job"));

        let err = store
            .upsert("job", JobRecord::completed(json!({"ok": true})))
            .unwrap_err();
        assert!(matches!(err, StoreError::TerminalRecord(_)));

        assert_eq!(store.get("job").unwrap().result, Some(json!({"error": "boom"})));
    }

    #[test]
    fn test_write_sets_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let t0 = Utc::now() - chrono::Duration::seconds(30);

        let mut record = JobRecord::processing();
        record.timestamp = t0 - chrono::Duration::days(1);
        let saved = store.upsert_at("job", record, t0).unwrap();
        assert_eq!(saved.timestamp, t0);
        assert_eq!(store.load()["job"].timestamp, t0);
    }

    #[test]
    fn test_retention_window_on_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let t = Utc::now();
        let window = chrono::Duration::from_std(RETENTION).unwrap();
        let eps = chrono::Duration::seconds(1);

        store
            .upsert_at("job", JobRecord::completed(json!(1)), t)
            .unwrap();

        assert!(store.get_at("job", t + window - eps).is_some());
        assert!(store.get_at("job", t + window + eps).is_none());
    }

    #[test]
    fn test_write_evicts_expired_records() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let t = Utc::now() - chrono::Duration::hours(1);

        store.upsert_at("old", JobRecord::completed(json!(1)), t).unwrap();
        store
            .upsert_at("fresh", JobRecord::completed(json!(2)), t + chrono::Duration::minutes(55))
            .unwrap();

        // Scrittura dopo la scadenza di "old" ma non di "fresh"
        store
            .upsert_at("new", JobRecord::processing(), t + chrono::Duration::minutes(11))
            .unwrap();

        let snapshot = store.load();
        assert!(!snapshot.contains_key("old"));
        assert!(snapshot.contains_key("fresh"));
        assert!(snapshot.contains_key("new"));
    }

    #[test]
    fn test_expired_terminal_can_be_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let t = Utc::now() - chrono::Duration::hours(1);

        store.upsert_at("job", JobRecord::completed(json!(1)), t).unwrap();
        // Il vecchio record viene prima rimosso dalla pulizia, poi riscritto
        store.upsert("job", JobRecord::processing()).unwrap();
        assert!(!store.get("job").unwrap().is_terminal());
    }

    #[tokio::test]
    async fn test_async_access_matches_sync() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let saved = store
            .save("job", JobRecord::completed(json!({"ok": true})))
            .await
            .unwrap();
        assert_eq!(store.fetch("job").await, Some(saved));
        assert_eq!(store.count().await, 1);
        assert!(store.fetch("missing").await.is_none());

        let err = store.save("job", JobRecord::processing()).await.unwrap_err();
        assert!(matches!(err, StoreError::TerminalRecord(_)));
    }
}
