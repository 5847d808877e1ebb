//! Work queue and in-progress registry
//!
//! The dispatch backend exposes two sets of job ids: the pending queue and the
//! registry of jobs a worker has taken. `dequeue` moves an id from the first
//! to the second atomically, `finish` removes it from the registry.
//!
//! Registry entries carry a lease deadline. A worker that dies before calling
//! `finish` leaves an entry that stops counting once the lease runs out and is
//! pruned by a later `dequeue`.

mod memory;
#[cfg(feature = "redis-queue")]
mod redis_queue;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use memory::MemoryQueue;
#[cfg(feature = "redis-queue")]
pub use redis_queue::RedisQueue;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("backend non raggiungibile: {0}")]
    Unavailable(String),

    #[error("job non decodificabile: {0}")]
    Codec(String),
}

/// Job in attesa di un worker
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueuedJob {
    pub job_id: Uuid,
    pub payload: serde_json::Value,
    /// URL a cui inoltrare l'esito, se richiesto al submit
    pub callback_url: Option<String>,
    pub enqueued_at: DateTime<Utc>,
}

impl QueuedJob {
    pub fn new(payload: serde_json::Value, callback_url: Option<String>) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            payload,
            callback_url,
            enqueued_at: Utc::now(),
        }
    }
}

#[async_trait]
pub trait WorkQueue: Send + Sync + std::fmt::Debug {
    /// Nome del backend, per log e health check
    fn backend(&self) -> &'static str;

    async fn enqueue(&self, job: QueuedJob) -> Result<(), QueueError>;

    /// Prende il prossimo job e lo registra come in esecuzione
    async fn dequeue(&self) -> Result<Option<QueuedJob>, QueueError>;

    /// Rimuove il job dal registry dei job in esecuzione
    async fn finish(&self, job_id: &str) -> Result<(), QueueError>;

    async fn is_pending(&self, job_id: &str) -> Result<bool, QueueError>;

    async fn is_started(&self, job_id: &str) -> Result<bool, QueueError>;

    async fn ping(&self) -> Result<(), QueueError>;
}

pub type SharedQueue = Arc<dyn WorkQueue>;

/// Lease di default: timeout a valle (600s) + inoltro (10s) + margine
pub const DEFAULT_LEASE: Duration = Duration::from_secs(600 + 10 + 30);

/// Scadenza del lease per un job preso in carico a `now`
pub(crate) fn lease_deadline(now: DateTime<Utc>, lease: Duration) -> DateTime<Utc> {
    let lease = chrono::Duration::from_std(lease).unwrap_or_else(|_| chrono::Duration::weeks(52));
    now + lease
}

/// Backend Redis se configurato, altrimenti coda in memoria
pub async fn connect(redis_url: Option<&str>, lease: Duration) -> Result<SharedQueue, QueueError> {
    match redis_url {
        #[cfg(feature = "redis-queue")]
        Some(url) => Ok(Arc::new(RedisQueue::connect(url, lease).await?)),
        #[cfg(not(feature = "redis-queue"))]
        Some(_) => {
            tracing::warn!("REDIS_URL impostato ma feature redis-queue non attiva, uso coda in memoria");
            Ok(Arc::new(MemoryQueue::with_lease(lease)))
        }
        None => Ok(Arc::new(MemoryQueue::with_lease(lease))),
    }
}
