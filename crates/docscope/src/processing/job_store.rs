//! In-memory job records with lookup by job id and by document id

use chrono::Utc;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::{AnalysisResult, DocumentContext, JobStatus, PipelineJob, PipelineStage};

/// Shared store of pipeline jobs.
///
/// Every mutation goes through the record's guarded transitions, so a
/// terminal job never changes and stage/progress never move backwards.
/// Updates that a record rejects are logged and dropped.
#[derive(Clone, Default)]
pub struct JobStore {
    jobs: Arc<DashMap<String, PipelineJob>>,
    /// document id -> job id
    by_document: Arc<DashMap<String, String>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pending job for `document_id` and return its id
    pub fn create(&self, document_id: &str) -> String {
        self.insert(PipelineJob::new(Uuid::new_v4().to_string(), document_id))
    }

    /// Register a pending job owned by the context's user
    pub fn create_for(&self, context: &DocumentContext) -> String {
        let mut job =
            PipelineJob::new(Uuid::new_v4().to_string(), context.document_id.as_str());
        job.user_id = Some(context.user_id.clone());
        self.insert(job)
    }

    fn insert(&self, job: PipelineJob) -> String {
        let job_id = job.job_id.clone();
        let document_id = job.document_id.clone();
        self.jobs.insert(job_id.clone(), job);
        self.by_document.insert(document_id.clone(), job_id.clone());

        tracing::debug!(job_id = %job_id, document_id = %document_id, "Job created");
        job_id
    }

    /// Snapshot of a job
    pub fn get(&self, job_id: &str) -> Result<PipelineJob> {
        self.jobs
            .get(job_id)
            .map(|job| job.clone())
            .ok_or_else(|| Error::NotFound(format!("job {}", job_id)))
    }

    /// The completed job for a document; anything still running or failed
    /// is reported as not found
    pub fn get_by_document(&self, document_id: &str) -> Result<PipelineJob> {
        let not_found =
            || Error::NotFound(format!("completed analysis for document {}", document_id));

        let job_id = self
            .by_document
            .get(document_id)
            .map(|id| id.clone())
            .ok_or_else(not_found)?;

        match self.jobs.get(&job_id) {
            Some(job) if job.status == JobStatus::Completed => Ok(job.clone()),
            _ => Err(not_found()),
        }
    }

    pub fn enter_stage(&self, job_id: &str, stage: PipelineStage) -> bool {
        self.mutate(job_id, "enter_stage", |job| job.enter_stage(stage))
    }

    pub fn set_progress(&self, job_id: &str, stage: PipelineStage, percent: u8) -> bool {
        self.mutate(job_id, "set_progress", |job| job.advance(stage, percent))
    }

    pub fn complete(&self, job_id: &str, result: AnalysisResult) -> bool {
        self.mutate(job_id, "complete", move |job| job.complete(result))
    }

    pub fn fail(&self, job_id: &str, message: impl Into<String>) -> bool {
        let message = message.into();
        self.mutate(job_id, "fail", move |job| job.fail(message))
    }

    fn mutate<F>(&self, job_id: &str, op: &str, f: F) -> bool
    where
        F: FnOnce(&mut PipelineJob) -> bool,
    {
        let Some(mut job) = self.jobs.get_mut(job_id) else {
            tracing::warn!(job_id = %job_id, op, "Update for unknown job ignored");
            return false;
        };

        let applied = f(job.value_mut());
        if !applied {
            tracing::debug!(
                job_id = %job_id,
                op,
                status = ?job.status,
                stage = job.current_stage,
                progress = job.stage_progress,
                "Rejected job update"
            );
        }
        applied
    }

    /// All jobs, newest first
    pub fn list(&self) -> Vec<PipelineJob> {
        self.collect(|_| true)
    }

    /// Jobs submitted by `user_id`, newest first
    pub fn list_for_user(&self, user_id: &str) -> Vec<PipelineJob> {
        self.collect(|job| job.user_id.as_deref() == Some(user_id))
    }

    fn collect(&self, keep: impl Fn(&PipelineJob) -> bool) -> Vec<PipelineJob> {
        let mut jobs: Vec<PipelineJob> = self
            .jobs
            .iter()
            .filter(|e| keep(e.value()))
            .map(|e| e.value().clone())
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs
    }

    pub fn stats(&self) -> JobStats {
        let mut stats = JobStats::default();
        for job in self.jobs.iter() {
            stats.total += 1;
            match job.status {
                JobStatus::Pending => stats.pending += 1,
                JobStatus::InProgress => stats.in_progress += 1,
                JobStatus::Completed => stats.completed += 1,
                JobStatus::Error => stats.failed += 1,
            }
        }
        stats
    }

    /// Drop terminal jobs last updated more than `retention` ago.
    /// Returns the number removed.
    pub fn evict_expired(&self, retention: Duration) -> usize {
        let Ok(retention) = chrono::Duration::from_std(retention) else {
            return 0;
        };
        let cutoff = Utc::now() - retention;

        let expired: Vec<(String, String)> = self
            .jobs
            .iter()
            .filter(|e| e.is_terminal() && e.updated_at <= cutoff)
            .map(|e| (e.job_id.clone(), e.document_id.clone()))
            .collect();

        for (job_id, document_id) in &expired {
            self.jobs.remove(job_id);
            self.by_document
                .remove_if(document_id, |_, indexed| indexed == job_id);
        }

        if !expired.is_empty() {
            tracing::info!(evicted = expired.len(), "Evicted expired jobs");
        }
        expired.len()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

/// Job counts by status
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct JobStats {
    pub total: usize,
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub failed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReportFormat;
    use crate::types::{Ambiguities, ReportArtifact};
    use serde_json::json;
    use std::path::PathBuf;

    fn result_for(document_id: &str) -> AnalysisResult {
        AnalysisResult {
            document_id: document_id.to_string(),
            requirements: json!({"Title": "T"}),
            ambiguities: Ambiguities::default(),
            tech_stack: json!({}),
            report: ReportArtifact {
                document_id: document_id.to_string(),
                path: PathBuf::from("/tmp/report.md"),
                format: ReportFormat::Markdown,
            },
        }
    }

    #[test]
    fn test_create_and_get() {
        let store = JobStore::new();
        let job_id = store.create("doc-1");
        let job = store.get(&job_id).unwrap();
        assert_eq!(job.document_id, "doc-1");
        assert_eq!(job.status, JobStatus::Pending);
        assert!(matches!(store.get("missing"), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_document_lookup_only_when_completed() {
        let store = JobStore::new();
        let job_id = store.create("doc-1");
        assert!(store.get_by_document("doc-1").is_err());

        store.enter_stage(&job_id, PipelineStage::Extract);
        assert!(store.get_by_document("doc-1").is_err());

        assert!(store.complete(&job_id, result_for("doc-1")));
        let job = store.get_by_document("doc-1").unwrap();
        assert_eq!(job.job_id, job_id);
        assert!(store.get_by_document("doc-2").is_err());
    }

    #[test]
    fn test_failed_document_not_found() {
        let store = JobStore::new();
        let job_id = store.create("doc-1");
        store.fail(&job_id, "Unsupported format: .xyz");
        assert!(matches!(store.get_by_document("doc-1"), Err(Error::NotFound(_))));
        assert_eq!(store.get(&job_id).unwrap().message, "Unsupported format: .xyz");
    }

    #[test]
    fn test_terminal_job_ignores_updates() {
        let store = JobStore::new();
        let job_id = store.create("doc-1");
        store.complete(&job_id, result_for("doc-1"));
        let before = store.get(&job_id).unwrap();

        assert!(!store.fail(&job_id, "late failure"));
        assert!(!store.enter_stage(&job_id, PipelineStage::Extract));
        assert!(!store.set_progress(&job_id, PipelineStage::RecommendAndReport, 50));
        assert_eq!(store.get(&job_id).unwrap(), before);
    }

    #[test]
    fn test_unknown_job_updates_ignored() {
        let store = JobStore::new();
        assert!(!store.enter_stage("nope", PipelineStage::Extract));
        assert!(!store.fail("nope", "x"));
    }

    #[test]
    fn test_stats_and_list() {
        let store = JobStore::new();
        let a = store.create("a");
        let b = store.create("b");
        store.create("c");
        store.enter_stage(&a, PipelineStage::Extract);
        store.fail(&b, "boom");

        let stats = store.stats();
        assert_eq!(
            stats,
            JobStats {
                total: 3,
                pending: 1,
                in_progress: 1,
                completed: 0,
                failed: 1
            }
        );
        assert_eq!(store.list().len(), 3);
    }

    #[test]
    fn test_listing_scoped_to_owner() {
        let store = JobStore::new();
        let alice = store.create_for(&DocumentContext::new("doc-a", "alice"));
        let bob = store.create_for(&DocumentContext::new("doc-b", "bob"));
        store.create("anonymous");

        let listed: Vec<String> = store
            .list_for_user("alice")
            .into_iter()
            .map(|job| job.job_id)
            .collect();
        assert_eq!(listed, vec![alice.clone()]);
        assert_eq!(store.list_for_user("bob")[0].job_id, bob);
        assert!(store.list_for_user("carol").is_empty());

        let json = serde_json::to_value(store.get(&alice).unwrap()).unwrap();
        assert!(json.get("user_id").is_none());
    }

    #[test]
    fn test_evict_expired_keeps_running_jobs() {
        let store = JobStore::new();
        let done = store.create("done");
        let running = store.create("running");
        store.fail(&done, "boom");
        store.enter_stage(&running, PipelineStage::Extract);

        assert_eq!(store.evict_expired(Duration::from_secs(3600)), 0);
        assert_eq!(store.evict_expired(Duration::ZERO), 1);
        assert!(store.get(&done).is_err());
        assert!(store.get(&running).is_ok());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_resubmitted_document_points_at_latest_job() {
        let store = JobStore::new();
        let first = store.create("doc");
        store.complete(&first, result_for("doc"));
        let second = store.create("doc");

        assert!(store.get_by_document("doc").is_err());
        store.complete(&second, result_for("doc"));
        assert_eq!(store.get_by_document("doc").unwrap().job_id, second);

        // evicting the older job leaves the index on the newer one
        store.jobs.get_mut(&first).unwrap().updated_at = Utc::now() - chrono::Duration::hours(2);
        assert_eq!(store.evict_expired(Duration::from_secs(3600)), 1);
        assert_eq!(store.get_by_document("doc").unwrap().job_id, second);
    }
}
