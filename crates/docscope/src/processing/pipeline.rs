//! Five-stage pipeline run for one submission

use std::sync::Arc;

use super::annotate::annotate_images;
use super::job_queue::Submission;
use super::job_store::JobStore;
use crate::error::{Error, Result};
use crate::ingestion::DocumentParser;
use crate::providers::{AnalysisProvider, ImageSummarizer, ReportInput, ReportRenderer};
use crate::types::{AnalysisResult, ExtractionResult, JobStatus, PipelineStage};

/// Share of Extract progress given to parsing; captioning fills the rest
const PARSE_SHARE: usize = 50;
/// Highest progress reported inside Extract before the stage exits
const EXTRACT_CAP: usize = 99;

/// Drives a submission through extract, combine, analyze,
/// identify-ambiguities and recommend-and-report, recording every
/// transition in the job store
pub struct PipelineController {
    parser: DocumentParser,
    summarizer: Arc<dyn ImageSummarizer>,
    analyst: Arc<dyn AnalysisProvider>,
    renderer: Arc<dyn ReportRenderer>,
    store: JobStore,
}

impl PipelineController {
    pub fn new(
        parser: DocumentParser,
        summarizer: Arc<dyn ImageSummarizer>,
        analyst: Arc<dyn AnalysisProvider>,
        renderer: Arc<dyn ReportRenderer>,
        store: JobStore,
    ) -> Self {
        Self {
            parser,
            summarizer,
            analyst,
            renderer,
            store,
        }
    }

    pub fn store(&self) -> &JobStore {
        &self.store
    }

    /// Run a submission to a terminal state and return that state
    pub async fn run(&self, submission: Submission) -> JobStatus {
        let job_id = submission.job_id.clone();
        let started = std::time::Instant::now();

        match self.execute(&submission).await {
            Ok(result) => {
                self.store.complete(&job_id, result);
                tracing::info!(
                    job_id = %job_id,
                    document_id = %submission.context.document_id,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Job completed"
                );
                JobStatus::Completed
            }
            Err(e) => {
                let stage = self.store.get(&job_id).map(|j| j.current_stage).ok();
                tracing::error!(
                    job_id = %job_id,
                    stage = ?stage,
                    error = %e,
                    "Job failed"
                );
                self.store.fail(&job_id, e.to_string());
                JobStatus::Error
            }
        }
    }

    async fn execute(&self, submission: &Submission) -> Result<AnalysisResult> {
        let job_id = submission.job_id.as_str();
        let document_id = submission.context.document_id.clone();

        self.begin(job_id, PipelineStage::Extract);
        let extraction = self.extract(submission).await?;
        self.finish(job_id, PipelineStage::Extract);

        self.begin(job_id, PipelineStage::Combine);
        let corpus = extraction.combine();
        drop(extraction);
        tracing::debug!(job_id = %job_id, corpus_chars = corpus.len(), "Corpus combined");
        self.finish(job_id, PipelineStage::Combine);

        self.begin(job_id, PipelineStage::Analyze);
        let requirements = self.analyst.analyze_requirements(&corpus).await?;
        drop(corpus);
        self.finish(job_id, PipelineStage::Analyze);

        self.begin(job_id, PipelineStage::IdentifyAmbiguities);
        let ambiguities = self.analyst.identify_ambiguities(&requirements).await?;
        tracing::debug!(job_id = %job_id, questions = ambiguities.questions.len(), "Ambiguities identified");
        self.finish(job_id, PipelineStage::IdentifyAmbiguities);

        self.begin(job_id, PipelineStage::RecommendAndReport);
        let tech_stack = self.analyst.recommend_tech_stack(&requirements).await?;
        self.store
            .set_progress(job_id, PipelineStage::RecommendAndReport, 50);
        let report = self
            .renderer
            .render(&ReportInput {
                document_id: &document_id,
                requirements: &requirements,
                ambiguities: &ambiguities,
                tech_stack: &tech_stack,
            })
            .await?;
        self.finish(job_id, PipelineStage::RecommendAndReport);

        Ok(AnalysisResult {
            document_id,
            requirements,
            ambiguities,
            tech_stack,
            report,
        })
    }

    /// Parse every staged file in order, then caption the images
    async fn extract(&self, submission: &Submission) -> Result<ExtractionResult> {
        let job_id = submission.job_id.as_str();
        let total_files = submission.files.len();
        let mut combined = ExtractionResult::default();

        for (i, path) in submission.files.iter().enumerate() {
            let parser = self.parser.clone();
            let path = path.clone();
            let ctx = submission.context.clone();

            // Extractors are synchronous and may stall on large PDFs
            let result = tokio::task::spawn_blocking(move || parser.parse(&path, &ctx))
                .await
                .map_err(|e| Error::internal(format!("Extraction task failed: {}", e)))??;

            if i == 0 {
                combined = result;
            } else {
                combined.extend(result);
            }

            let percent = PARSE_SHARE * (i + 1) / total_files;
            self.store
                .set_progress(job_id, PipelineStage::Extract, percent as u8);
        }

        let store = &self.store;
        annotate_images(&mut combined, self.summarizer.as_ref(), |done, total| {
            let percent = PARSE_SHARE + (EXTRACT_CAP - PARSE_SHARE) * done / total;
            store.set_progress(job_id, PipelineStage::Extract, percent as u8);
        })
        .await;

        Ok(combined)
    }

    fn begin(&self, job_id: &str, stage: PipelineStage) {
        tracing::info!(job_id = %job_id, stage = stage.index(), "{}", stage.label());
        self.store.enter_stage(job_id, stage);
    }

    fn finish(&self, job_id: &str, stage: PipelineStage) {
        self.store.set_progress(job_id, stage, 100);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReportFormat;
    use crate::ingestion::AssetStore;
    use crate::providers::FileReportRenderer;
    use crate::types::{Ambiguities, DocumentContext};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct EchoSummarizer;

    #[async_trait]
    impl ImageSummarizer for EchoSummarizer {
        async fn summarize_image(&self, _path: &Path) -> Result<String> {
            Ok("caption".to_string())
        }

        fn name(&self) -> &str {
            "echo"
        }
    }

    /// Records the corpus it was given; fails the stage named in `fail_at`
    struct ScriptedAnalyst {
        fail_at: Option<PipelineStage>,
        seen_corpus: Mutex<Option<String>>,
    }

    impl ScriptedAnalyst {
        fn new(fail_at: Option<PipelineStage>) -> Self {
            Self {
                fail_at,
                seen_corpus: Mutex::new(None),
            }
        }

        fn check(&self, stage: PipelineStage) -> Result<()> {
            if self.fail_at == Some(stage) {
                return Err(Error::collaborator(format!("{} unavailable", stage.label())));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl AnalysisProvider for ScriptedAnalyst {
        async fn analyze_requirements(&self, corpus: &str) -> Result<Value> {
            *self.seen_corpus.lock().unwrap() = Some(corpus.to_string());
            self.check(PipelineStage::Analyze)?;
            Ok(json!({"Title": "Portal", "project_statement": corpus}))
        }

        async fn identify_ambiguities(&self, _requirements: &Value) -> Result<Ambiguities> {
            self.check(PipelineStage::IdentifyAmbiguities)?;
            Ok(Ambiguities::new(vec!["Who hosts it?".to_string()]))
        }

        async fn recommend_tech_stack(&self, _requirements: &Value) -> Result<Value> {
            self.check(PipelineStage::RecommendAndReport)?;
            Ok(json!({"primary_stack": {"cloud": ["AWS"]}}))
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    struct Fixture {
        _tmp: TempDir,
        uploads: PathBuf,
        controller: PipelineController,
        analyst: Arc<ScriptedAnalyst>,
    }

    fn fixture(fail_at: Option<PipelineStage>) -> Fixture {
        let tmp = TempDir::new().unwrap();
        let uploads = tmp.path().join("uploads");
        std::fs::create_dir_all(&uploads).unwrap();

        let analyst = Arc::new(ScriptedAnalyst::new(fail_at));
        let controller = PipelineController::new(
            DocumentParser::new(AssetStore::new(tmp.path().join("work"))),
            Arc::new(EchoSummarizer),
            analyst.clone(),
            Arc::new(FileReportRenderer::new(tmp.path().join("reports"), ReportFormat::Markdown)),
            JobStore::new(),
        );

        Fixture {
            _tmp: tmp,
            uploads,
            controller,
            analyst,
        }
    }

    fn submission(store: &JobStore, files: Vec<PathBuf>) -> Submission {
        let context = DocumentContext::new("doc-1", "user-1");
        let job_id = store.create(&context.document_id);
        Submission {
            job_id,
            context,
            files,
        }
    }

    #[tokio::test]
    async fn test_successful_run_completes() {
        let fx = fixture(None);
        let txt = fx.uploads.join("brief.txt");
        let csv = fx.uploads.join("data.csv");
        std::fs::write(&txt, "Build a ticketing portal").unwrap();
        std::fs::write(&csv, "a,b\n1,2\n").unwrap();

        let sub = submission(fx.controller.store(), vec![txt, csv]);
        let job_id = sub.job_id.clone();
        assert_eq!(fx.controller.run(sub).await, JobStatus::Completed);

        let job = fx.controller.store().get(&job_id).unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.current_stage, 4);
        assert_eq!(job.stage_progress, 100);

        let result = job.result.unwrap();
        assert_eq!(result.ambiguities.questions, vec!["Who hosts it?"]);
        assert!(result.report.path.exists());

        let corpus = fx.analyst.seen_corpus.lock().unwrap().clone().unwrap();
        assert_eq!(corpus, "Build a ticketing portal\na | b\n1 | 2");
    }

    #[tokio::test]
    async fn test_unsupported_file_fails_in_extract() {
        let fx = fixture(None);
        let path = fx.uploads.join("report.xyz");
        std::fs::write(&path, "data").unwrap();

        let sub = submission(fx.controller.store(), vec![path]);
        let job_id = sub.job_id.clone();
        assert_eq!(fx.controller.run(sub).await, JobStatus::Error);

        let job = fx.controller.store().get(&job_id).unwrap();
        assert_eq!(job.current_stage, 0);
        assert!(job.message.contains("Unsupported format: .xyz"));
        assert!(fx.analyst.seen_corpus.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_each_collaborator_failure_is_fatal_at_its_stage() {
        for stage in [
            PipelineStage::Analyze,
            PipelineStage::IdentifyAmbiguities,
            PipelineStage::RecommendAndReport,
        ] {
            let fx = fixture(Some(stage));
            let path = fx.uploads.join("brief.txt");
            std::fs::write(&path, "Build a portal").unwrap();

            let sub = submission(fx.controller.store(), vec![path]);
            let job_id = sub.job_id.clone();
            assert_eq!(fx.controller.run(sub).await, JobStatus::Error);

            let job = fx.controller.store().get(&job_id).unwrap();
            assert_eq!(job.current_stage, stage.index());
            assert!(job.result.is_none());
            assert!(job.message.contains("unavailable"));
        }
    }

    #[tokio::test]
    async fn test_empty_document_is_valid_input() {
        let fx = fixture(None);
        let path = fx.uploads.join("blank.txt");
        std::fs::write(&path, "   \n").unwrap();

        let sub = submission(fx.controller.store(), vec![path]);
        assert_eq!(fx.controller.run(sub).await, JobStatus::Completed);
        assert_eq!(fx.analyst.seen_corpus.lock().unwrap().as_deref(), Some(""));
    }
}
