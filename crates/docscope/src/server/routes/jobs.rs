//! Job status endpoints

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use serde::Serialize;

use super::submit::USER_ID_HEADER;
use crate::error::Result;
use crate::processing::QueueStats;
use crate::server::state::AppState;
use crate::types::PipelineJob;

/// Response for the job listing
#[derive(Debug, Serialize)]
pub struct JobListResponse {
    pub stats: QueueStats,
    pub jobs: Vec<PipelineJob>,
}

/// GET /api/jobs/:job_id - Current snapshot of a job
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<PipelineJob>> {
    Ok(Json(state.jobs().get(&job_id)?))
}

/// GET /api/documents/:document_id/job - Completed job for a document
pub async fn get_document_job(
    State(state): State<AppState>,
    Path(document_id): Path<String>,
) -> Result<Json<PipelineJob>> {
    Ok(Json(state.jobs().get_by_document(&document_id)?))
}

/// GET /api/jobs - Queue statistics plus the caller's own jobs.
///
/// Jobs are listed only for the user named in `x-user-id`; without it the
/// listing is empty.
pub async fn list_jobs(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Json<JobListResponse> {
    let jobs = headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|user| !user.is_empty())
        .map(|user| state.jobs().list_for_user(user))
        .unwrap_or_default();

    Json(JobListResponse {
        stats: state.job_queue().stats(),
        jobs,
    })
}
