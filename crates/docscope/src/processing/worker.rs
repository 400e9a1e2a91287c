//! Background worker that runs queued submissions

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;

use super::job_queue::Submission;
use super::job_store::JobStore;
use super::pipeline::PipelineController;

/// Pulls submissions off the queue and runs each pipeline as its own task
pub struct PipelineWorker {
    controller: Arc<PipelineController>,
    max_concurrent: usize,
}

impl PipelineWorker {
    pub fn new(controller: Arc<PipelineController>, max_concurrent: usize) -> Self {
        Self {
            controller,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Start processing submissions until the queue closes
    pub async fn run(self, mut receiver: mpsc::Receiver<Submission>) {
        tracing::info!(
            "Pipeline worker started: {} concurrent jobs",
            self.max_concurrent
        );

        // Limits pipelines in flight; later submissions stay pending
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));

        while let Some(submission) = receiver.recv().await {
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    tracing::error!("Worker semaphore closed: {}", e);
                    break;
                }
            };

            let controller = self.controller.clone();
            tokio::spawn(async move {
                let _permit = permit;
                controller.run(submission).await;
            });
        }

        tracing::info!("Pipeline worker stopped");
    }
}

/// Periodically evict expired terminal jobs.
///
/// Returns `None` when retention is disabled (zero).
pub fn spawn_sweeper(
    store: JobStore,
    retention: Duration,
    interval: Duration,
) -> Option<JoinHandle<()>> {
    if retention.is_zero() {
        tracing::info!("Job retention disabled; terminal jobs are kept until restart");
        return None;
    }

    let interval = interval.max(Duration::from_secs(1));
    tracing::info!(
        retention_secs = retention.as_secs(),
        interval_secs = interval.as_secs(),
        "Job sweeper started"
    );

    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            store.evict_expired(retention);
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sweeper_disabled_with_zero_retention() {
        assert!(spawn_sweeper(JobStore::new(), Duration::ZERO, Duration::from_secs(1)).is_none());
    }

    #[tokio::test]
    async fn test_sweeper_evicts_terminal_jobs() {
        let store = JobStore::new();
        let job_id = store.create("doc");
        store.fail(&job_id, "boom");
        tokio::time::sleep(Duration::from_millis(20)).await;

        let handle = spawn_sweeper(
            store.clone(),
            Duration::from_millis(10),
            Duration::from_secs(1),
        )
        .unwrap();

        // first tick fires immediately
        for _ in 0..50 {
            if store.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        handle.abort();
        assert!(store.is_empty());
    }
}
