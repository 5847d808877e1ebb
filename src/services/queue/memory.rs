//! In-process queue backend

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{lease_deadline, QueueError, QueuedJob, WorkQueue, DEFAULT_LEASE};

#[derive(Debug)]
pub struct MemoryQueue {
    state: Mutex<MemoryState>,
    lease: Duration,
}

#[derive(Debug, Default)]
struct MemoryState {
    pending: VecDeque<QueuedJob>,
    /// Job in esecuzione con la scadenza del lease
    started: HashMap<String, DateTime<Utc>>,
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::with_lease(DEFAULT_LEASE)
    }
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Un job preso da un worker resta nel registry al massimo per `lease`
    pub fn with_lease(lease: Duration) -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            lease,
        }
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl WorkQueue for MemoryQueue {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn enqueue(&self, job: QueuedJob) -> Result<(), QueueError> {
        self.state().pending.push_back(job);
        Ok(())
    }

    async fn dequeue(&self) -> Result<Option<QueuedJob>, QueueError> {
        // Pending -> started sotto lo stesso lock
        let now = Utc::now();
        let mut state = self.state();

        let before = state.started.len();
        state.started.retain(|_, deadline| *deadline > now);
        let pruned = before - state.started.len();
        if pruned > 0 {
            tracing::warn!("Rimossi {} job con lease scaduto dal registry", pruned);
        }

        let job = state.pending.pop_front();
        if let Some(ref job) = job {
            state
                .started
                .insert(job.job_id.to_string(), lease_deadline(now, self.lease));
        }
        Ok(job)
    }

    async fn finish(&self, job_id: &str) -> Result<(), QueueError> {
        self.state().started.remove(job_id);
        Ok(())
    }

    async fn is_pending(&self, job_id: &str) -> Result<bool, QueueError> {
        Ok(self
            .state()
            .pending
            .iter()
            .any(|job| job.job_id.to_string() == job_id))
    }

    async fn is_started(&self, job_id: &str) -> Result<bool, QueueError> {
        let now = Utc::now();
        Ok(self
            .state()
            .started
            .get(job_id)
            .is_some_and(|deadline| *deadline > now))
    }

    async fn ping(&self) -> Result<(), QueueError> {
        Ok(())
    }
}
