//! Worker pool: polls the queue and runs the executor for each job.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;

use crate::services::executor::Executor;
use crate::services::queue::{QueuedJob, SharedQueue};

/// Attesa massima per i job in corso allo shutdown
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct WorkerPool {
    queue: SharedQueue,
    executor: Arc<Executor>,
    concurrency: usize,
    poll_interval: Duration,
}

impl WorkerPool {
    pub fn new(
        queue: SharedQueue,
        executor: Arc<Executor>,
        concurrency: usize,
        poll_interval: Duration,
    ) -> Self {
        Self {
            queue,
            executor,
            concurrency: concurrency.max(1),
            poll_interval,
        }
    }

    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(shutdown).await })
    }

    /// Ciclo principale, attivo fino al segnale di shutdown
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            "Worker avviati: backend={}, concorrenza={}, poll={}ms",
            self.queue.backend(),
            self.concurrency,
            self.poll_interval.as_millis()
        );

        let semaphore = Arc::new(Semaphore::new(self.concurrency));

        loop {
            if *shutdown.borrow() {
                break;
            }

            // Attendi uno slot libero prima di prendere un job dalla coda
            let permit = tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
                permit = semaphore.clone().acquire_owned() => match permit {
                    Ok(p) => p,
                    Err(_) => break,
                },
            };

            let idle = match self.queue.dequeue().await {
                Ok(Some(job)) => {
                    self.dispatch(job, permit);
                    false
                }
                Ok(None) => true,
                Err(e) => {
                    tracing::error!("Errore lettura coda: {}", e);
                    true
                }
            };

            if idle {
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                    _ = tokio::time::sleep(self.poll_interval) => {}
                }
            }
        }

        tracing::info!("Worker in chiusura, attesa dei job in corso...");

        let permits = u32::try_from(self.concurrency).unwrap_or(u32::MAX);
        if tokio::time::timeout(DRAIN_TIMEOUT, semaphore.acquire_many(permits))
            .await
            .is_err()
        {
            tracing::warn!("Timeout in attesa dei job in corso");
        }

        tracing::info!("Worker terminati");
    }

    fn dispatch(&self, job: QueuedJob, permit: OwnedSemaphorePermit) {
        let queue = self.queue.clone();
        let executor = self.executor.clone();

        tokio::spawn(async move {
            let _permit = permit;
            let job_id = job.job_id.to_string();

            if let Err(e) = executor.run(&job).await {
                tracing::error!("Job {} non registrato nell'archivio: {}", job_id, e);
            }

            // Dopo la scrittura terminale: il job resta sempre visibile
            // in almeno una delle fonti
            if let Err(e) = queue.finish(&job_id).await {
                tracing::error!("Impossibile rimuovere il job {} dal registry: {}", job_id, e);
            }
        });
    }
}
