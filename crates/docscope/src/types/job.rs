//! Pipeline job records as seen by pollers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::analysis::AnalysisResult;

/// Job status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    InProgress,
    Completed,
    Error,
}

impl JobStatus {
    /// Completed and errored jobs never change again
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

/// The five pipeline stages, in execution order
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Extract = 0,
    Combine = 1,
    Analyze = 2,
    IdentifyAmbiguities = 3,
    RecommendAndReport = 4,
}

impl PipelineStage {
    pub const ALL: [PipelineStage; 5] = [
        Self::Extract,
        Self::Combine,
        Self::Analyze,
        Self::IdentifyAmbiguities,
        Self::RecommendAndReport,
    ];

    /// Numeric stage index reported to pollers
    pub fn index(&self) -> u8 {
        *self as u8
    }

    /// Human-readable label used as the job message while the stage runs
    pub fn label(&self) -> &'static str {
        match self {
            Self::Extract => "Extracting document content",
            Self::Combine => "Combining extracted content",
            Self::Analyze => "Analyzing requirements",
            Self::IdentifyAmbiguities => "Identifying ambiguities",
            Self::RecommendAndReport => "Recommending tech stack and generating report",
        }
    }
}

/// Progress and outcome of one pipeline run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineJob {
    pub job_id: String,
    pub document_id: String,
    /// Submitting user; kept out of responses
    #[serde(skip)]
    pub user_id: Option<String>,
    pub status: JobStatus,
    /// Stage index, 0..=4
    pub current_stage: u8,
    /// Percent of the current stage done, 0..=100
    pub stage_progress: u8,
    pub message: String,
    pub result: Option<AnalysisResult>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PipelineJob {
    pub fn new(job_id: impl Into<String>, document_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            job_id: job_id.into(),
            document_id: document_id.into(),
            user_id: None,
            status: JobStatus::Pending,
            current_stage: PipelineStage::Extract.index(),
            stage_progress: 0,
            message: "Queued".to_string(),
            result: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Move into `stage` at 0%.
    ///
    /// Returns `false` if the record is terminal or the stage would go backwards.
    pub(crate) fn enter_stage(&mut self, stage: PipelineStage) -> bool {
        if self.is_terminal() || stage.index() < self.current_stage {
            return false;
        }
        if self.status == JobStatus::InProgress
            && stage.index() == self.current_stage
            && self.stage_progress > 0
        {
            return false;
        }
        self.status = JobStatus::InProgress;
        self.current_stage = stage.index();
        self.stage_progress = 0;
        self.message = stage.label().to_string();
        self.touch();
        true
    }

    /// Raise progress within the current stage; no-op on equal values
    pub(crate) fn advance(&mut self, stage: PipelineStage, percent: u8) -> bool {
        let percent = percent.min(100);
        if self.is_terminal()
            || self.status != JobStatus::InProgress
            || stage.index() != self.current_stage
            || percent <= self.stage_progress
        {
            return false;
        }
        self.stage_progress = percent;
        self.touch();
        true
    }

    pub(crate) fn complete(&mut self, result: AnalysisResult) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.status = JobStatus::Completed;
        self.current_stage = PipelineStage::RecommendAndReport.index();
        self.stage_progress = 100;
        self.message = "Analysis complete".to_string();
        self.result = Some(result);
        self.touch();
        true
    }

    pub(crate) fn fail(&mut self, message: impl Into<String>) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.status = JobStatus::Error;
        self.message = message.into();
        self.result = None;
        self.touch();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_job_is_pending() {
        let job = PipelineJob::new("j1", "d1");
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.current_stage, 0);
        assert_eq!(job.stage_progress, 0);
        assert!(job.result.is_none());
    }

    #[test]
    fn test_stage_indices_and_labels() {
        let indices: Vec<u8> = PipelineStage::ALL.iter().map(|s| s.index()).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4]);
        assert_eq!(PipelineStage::Analyze.label(), "Analyzing requirements");
    }

    #[test]
    fn test_stage_regression_rejected() {
        let mut job = PipelineJob::new("j1", "d1");
        assert!(job.enter_stage(PipelineStage::Extract));
        assert!(job.advance(PipelineStage::Extract, 100));
        assert!(job.enter_stage(PipelineStage::Analyze));
        assert!(!job.enter_stage(PipelineStage::Combine));
        assert_eq!(job.current_stage, 2);
    }

    #[test]
    fn test_progress_never_decreases() {
        let mut job = PipelineJob::new("j1", "d1");
        job.enter_stage(PipelineStage::Extract);
        assert!(job.advance(PipelineStage::Extract, 40));
        assert!(!job.advance(PipelineStage::Extract, 20));
        assert!(!job.advance(PipelineStage::Extract, 40));
        assert!(!job.advance(PipelineStage::Combine, 80));
        assert_eq!(job.stage_progress, 40);
    }

    #[test]
    fn test_terminal_record_is_frozen() {
        let mut job = PipelineJob::new("j1", "d1");
        job.enter_stage(PipelineStage::Extract);
        assert!(job.fail("Unsupported format: xyz"));
        let frozen = job.clone();

        assert!(!job.enter_stage(PipelineStage::Combine));
        assert!(!job.advance(PipelineStage::Extract, 90));
        assert!(!job.fail("again"));
        assert_eq!(job, frozen);
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&JobStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
    }
}
