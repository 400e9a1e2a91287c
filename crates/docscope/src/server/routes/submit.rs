//! Document submission endpoint

use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use bytes::Bytes;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::DocumentContext;

/// Header carrying the caller identity when no `user_id` part is sent
pub const USER_ID_HEADER: &str = "x-user-id";

/// Response from a submission
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub job_id: String,
    pub document_id: String,
    pub files_queued: usize,
    pub message: String,
}

struct UploadedFile {
    filename: String,
    data: Bytes,
}

/// POST /api/analyze - Upload documents and queue one analysis job
pub async fn submit_analysis(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<SubmitResponse>> {
    let limit = state.config().server.max_upload_size;
    let mut user_id = headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string());
    let mut files = Vec::new();
    let mut total_size = 0usize;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, total_size, limit))?
    {
        let name = field.name().unwrap_or("").to_string();

        if name == "user_id" {
            let value = field
                .text()
                .await
                .map_err(|e| multipart_error(e, total_size, limit))?;
            user_id = Some(value.trim().to_string());
            continue;
        }

        let Some(filename) = field.file_name().map(|s| s.to_string()) else {
            tracing::debug!("Ignoring multipart field without filename: {}", name);
            continue;
        };

        let data = field
            .bytes()
            .await
            .map_err(|e| multipart_error(e, total_size, limit))?;

        total_size = total_size.saturating_add(data.len());
        if total_size > limit {
            return Err(Error::PayloadTooLarge {
                size: total_size,
                limit,
            });
        }

        if data.is_empty() {
            tracing::warn!("Skipping empty upload: {}", filename);
            continue;
        }

        files.push(UploadedFile { filename, data });
    }

    let user_id = user_id
        .filter(|u| !u.is_empty())
        .ok_or_else(|| Error::BadRequest("A user_id is required".to_string()))?;

    if files.is_empty() {
        return Err(Error::BadRequest("No non-empty files provided".to_string()));
    }

    let context = DocumentContext::for_user(user_id);
    let upload_dir = state.assets().upload_dir(&context);
    let staged = stage_files(&upload_dir, &files).await?;

    let files_queued = staged.len();
    let job = state.job_queue().submit(context, staged).await?;

    tracing::info!(
        job_id = %job.job_id,
        document_id = %job.document_id,
        files = files_queued,
        bytes = total_size,
        "Submission accepted"
    );

    Ok(Json(SubmitResponse {
        message: format!(
            "Job queued successfully. Use /api/jobs/{} to check progress.",
            job.job_id
        ),
        job_id: job.job_id,
        document_id: job.document_id,
        files_queued,
    }))
}

fn multipart_error(e: MultipartError, received: usize, limit: usize) -> Error {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        Error::PayloadTooLarge {
            size: received.max(limit.saturating_add(1)),
            limit,
        }
    } else {
        Error::BadRequest(format!("Failed to read multipart field: {}", e.body_text()))
    }
}

/// Write uploads under `dir`, prefixed with their upload position so
/// extraction order follows upload order
async fn stage_files(dir: &Path, files: &[UploadedFile]) -> Result<Vec<PathBuf>> {
    tokio::fs::create_dir_all(dir).await.map_err(|e| {
        Error::storage(format!("Failed to create upload dir {}: {}", dir.display(), e))
    })?;

    let mut staged = Vec::with_capacity(files.len());
    for (i, file) in files.iter().enumerate() {
        let path = dir.join(format!("{:03}_{}", i, safe_filename(&file.filename)));
        tokio::fs::write(&path, &file.data).await.map_err(|e| {
            Error::storage(format!("Failed to stage {}: {}", file.filename, e))
        })?;
        tracing::debug!("Staged {} ({} bytes)", path.display(), file.data.len());
        staged.push(path);
    }
    Ok(staged)
}

/// Last path component of a client filename, reduced to safe characters.
/// The extension is kept since it selects the extractor.
fn safe_filename(name: &str) -> String {
    let base = name.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}
