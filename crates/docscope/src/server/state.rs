//! Application state for the docscope server

use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;

use crate::config::DocscopeConfig;
use crate::error::Result;
use crate::ingestion::{AssetStore, DocumentParser};
use crate::processing::{spawn_sweeper, JobQueue, JobStore, PipelineController, PipelineWorker};
use crate::providers::{
    AnalysisProvider, FileReportRenderer, ImageSummarizer, OllamaAnalyst, OllamaClient,
    OllamaVision, ReportRenderer,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Configuration
    config: DocscopeConfig,
    /// Staging and asset directories
    assets: AssetStore,
    /// Job queue for async processing
    job_queue: Arc<JobQueue>,
    /// Ready state
    ready: RwLock<bool>,
}

impl AppState {
    /// Create state backed by Ollama and file reports, and start the worker
    pub async fn new(config: DocscopeConfig) -> Result<Self> {
        tracing::info!("Initializing docscope application state...");

        let ollama = Arc::new(OllamaClient::new(&config.llm)?);
        tracing::info!(
            "Ollama client initialized (analysis: {}, vision: {})",
            config.llm.analysis_model,
            config.llm.vision_model
        );

        let summarizer: Arc<dyn ImageSummarizer> =
            Arc::new(OllamaVision::from_client(ollama.clone()));
        let analyst: Arc<dyn AnalysisProvider> = Arc::new(OllamaAnalyst::from_client(ollama));
        let renderer: Arc<dyn ReportRenderer> =
            Arc::new(FileReportRenderer::from_config(&config.report));
        let parser = DocumentParser::from_config(&config.ingestion);

        Ok(Self::with_collaborators(config, parser, summarizer, analyst, renderer))
    }

    /// Create state with explicit collaborators and start the worker.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn with_collaborators(
        config: DocscopeConfig,
        parser: DocumentParser,
        summarizer: Arc<dyn ImageSummarizer>,
        analyst: Arc<dyn AnalysisProvider>,
        renderer: Arc<dyn ReportRenderer>,
    ) -> Self {
        let store = JobStore::new();
        let worker_count = config.jobs.max_concurrent;
        let (job_queue, receiver) = JobQueue::new(store.clone(), worker_count);
        tracing::info!("Job queue initialized with {} workers", worker_count);

        let assets = parser.assets().clone();
        let controller = Arc::new(PipelineController::new(
            parser,
            summarizer,
            analyst,
            renderer,
            store.clone(),
        ));

        let worker = PipelineWorker::new(controller, worker_count);
        tokio::spawn(async move {
            worker.run(receiver).await;
        });

        spawn_sweeper(
            store,
            Duration::from_secs(config.jobs.retention_secs),
            Duration::from_secs(config.jobs.sweep_interval_secs),
        );

        Self {
            inner: Arc::new(AppStateInner {
                config,
                assets,
                job_queue: Arc::new(job_queue),
                ready: RwLock::new(true),
            }),
        }
    }

    /// Get configuration
    pub fn config(&self) -> &DocscopeConfig {
        &self.inner.config
    }

    /// Get job queue
    pub fn job_queue(&self) -> &Arc<JobQueue> {
        &self.inner.job_queue
    }

    /// Get job store
    pub fn jobs(&self) -> &JobStore {
        self.inner.job_queue.store()
    }

    /// Get asset store
    pub fn assets(&self) -> &AssetStore {
        &self.inner.assets
    }

    /// Check if ready
    pub fn is_ready(&self) -> bool {
        *self.inner.ready.read()
    }

    /// Set ready state
    pub fn set_ready(&self, ready: bool) {
        *self.inner.ready.write() = ready;
    }
}
