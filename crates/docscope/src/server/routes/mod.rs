//! API routes for the docscope server

pub mod jobs;
pub mod submit;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::server::state::AppState;

/// Room for multipart framing on top of the file payload ceiling
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Build all API routes
pub fn api_routes(max_upload_size: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/analyze",
            post(submit::submit_analysis)
                .layer(DefaultBodyLimit::max(max_upload_size.saturating_add(MULTIPART_OVERHEAD))),
        )
        .route("/jobs", get(jobs::list_jobs))
        .route("/jobs/:job_id", get(jobs::get_job))
        .route("/documents/:document_id/job", get(jobs::get_document_job))
        .route("/info", get(info))
}

/// API info endpoint
async fn info() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "name": "docscope",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Document ingestion and staged requirement analysis",
        "formats": ["docx", "pdf", "pptx", "xlsx", "csv", "txt"],
        "endpoints": {
            "POST /api/analyze": "Upload documents and start an analysis job",
            "GET /api/jobs": "List all jobs and queue stats",
            "GET /api/jobs/:job_id": "Get job status",
            "GET /api/documents/:document_id/job": "Get the completed job for a document"
        }
    }))
}
