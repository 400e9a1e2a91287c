//! Submission queue feeding the pipeline worker

use serde::Serialize;
use std::path::PathBuf;
use tokio::sync::mpsc;

use super::job_store::{JobStats, JobStore};
use crate::error::Result;
use crate::types::{DocumentContext, PipelineJob};

/// One queued analysis: every file staged for a single document
#[derive(Debug, Clone)]
pub struct Submission {
    pub job_id: String,
    pub context: DocumentContext,
    /// Staged files, extracted in this order
    pub files: Vec<PathBuf>,
}

/// Job queue for handing submissions to the worker
pub struct JobQueue {
    /// Job records shared with the worker and the routes
    store: JobStore,
    /// Channel for sending submissions to the worker
    sender: mpsc::Sender<Submission>,
    /// Concurrent pipeline runs
    worker_count: usize,
}

impl JobQueue {
    pub fn new(store: JobStore, worker_count: usize) -> (Self, mpsc::Receiver<Submission>) {
        let (sender, receiver) = mpsc::channel(1000);

        let queue = Self {
            store,
            sender,
            worker_count,
        };

        (queue, receiver)
    }

    /// Create a job for `context` and queue its files.
    ///
    /// Returns the job as first recorded. If the worker is gone the job
    /// is marked failed instead of queued.
    pub async fn submit(
        &self,
        context: DocumentContext,
        files: Vec<PathBuf>,
    ) -> Result<PipelineJob> {
        let job_id = self.store.create_for(&context);
        let snapshot = self.store.get(&job_id)?;

        tracing::info!(
            job_id = %job_id,
            document_id = %context.document_id,
            files = files.len(),
            "Job queued"
        );

        let submission = Submission {
            job_id: job_id.clone(),
            context,
            files,
        };

        if let Err(e) = self.sender.send(submission).await {
            tracing::error!(job_id = %job_id, "Failed to submit job: {}", e);
            self.store.fail(&job_id, "Job queue is closed");
            return self.store.get(&job_id);
        }

        Ok(snapshot)
    }

    pub fn store(&self) -> &JobStore {
        &self.store
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            jobs: self.store.stats(),
            worker_count: self.worker_count,
        }
    }
}

/// Queue statistics
#[derive(Debug, Clone, Serialize)]
pub struct QueueStats {
    #[serde(flatten)]
    pub jobs: JobStats,
    pub worker_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::JobStatus;

    #[tokio::test]
    async fn test_submit_queues_pending_job() {
        let (queue, mut receiver) = JobQueue::new(JobStore::new(), 2);
        let ctx = DocumentContext::new("doc-1", "user-1");

        let job = queue
            .submit(ctx, vec![PathBuf::from("/tmp/a.txt"), PathBuf::from("/tmp/b.csv")])
            .await
            .unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.document_id, "doc-1");

        let submission = receiver.recv().await.unwrap();
        assert_eq!(submission.job_id, job.job_id);
        assert_eq!(submission.files.len(), 2);
        assert_eq!(submission.files[0], PathBuf::from("/tmp/a.txt"));
    }

    #[tokio::test]
    async fn test_closed_queue_fails_job() {
        let (queue, receiver) = JobQueue::new(JobStore::new(), 1);
        drop(receiver);

        let job = queue
            .submit(DocumentContext::new("doc-1", "user-1"), vec![])
            .await
            .unwrap();
        assert_eq!(job.status, JobStatus::Error);
        assert_eq!(queue.stats().jobs.failed, 1);
    }
}
