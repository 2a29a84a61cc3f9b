//! API handlers for the PDF merge server
//!
//! Provides endpoints for:
//! - Job submission (multipart upload)
//! - Status polling and result download
//! - Server load introspection

use std::collections::HashMap;

use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use pdfmerge_core::{FileOptions, Orientation};
use pdfmerge_jobs::{Capacity, JobId, Upload};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::error::ServerError;
use crate::AppState;

/// Multipart field carrying the uploaded files, in merge order.
const FILES_FIELD: &str = "files";

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// Handler: GET /health
pub async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "pdfmerge-server",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Handler: GET /
pub async fn handle_index() -> Html<&'static str> {
    Html(include_str!("../static/index.html"))
}

#[derive(Serialize)]
pub struct StartMergeResponse {
    pub job_id: String,
}

/// Handler: POST /start-merge
///
/// Expects `files` parts plus optional `orientation_{i}`, `pages_{i}` and
/// `password_{i}` fields, where `i` is the zero-based position of the file.
pub async fn handle_start_merge(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<StartMergeResponse>, ServerError> {
    // Options are keyed by the file's position among all `files` parts
    let mut files: Vec<(usize, String, Option<String>, Vec<u8>)> = Vec::new();
    let mut fields: HashMap<String, String> = HashMap::new();
    let mut position = 0;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::InvalidRequest(format!("Malformed upload: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();

        if name == FILES_FIELD {
            let index = position;
            position += 1;

            let file_name = field.file_name().unwrap_or_default().to_string();
            let content_type = field.content_type().map(str::to_string);
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ServerError::InvalidRequest(format!("Malformed upload: {}", e)))?;

            // Browsers send one empty part when no file was chosen
            if file_name.is_empty() && bytes.is_empty() {
                continue;
            }
            files.push((index, file_name, content_type, bytes.to_vec()));
        } else {
            let value = field
                .text()
                .await
                .map_err(|e| ServerError::InvalidRequest(format!("Malformed upload: {}", e)))?;
            fields.insert(name, value);
        }
    }

    debug!(files = files.len(), parts = position, "Received merge submission");

    let uploads = files
        .into_iter()
        .map(|(index, file_name, content_type, bytes)| Upload {
            options: file_options(&fields, index),
            file_name,
            content_type,
            bytes,
        })
        .collect();

    let job_id = state.scheduler.submit(uploads).await?;

    Ok(Json(StartMergeResponse {
        job_id: job_id.to_string(),
    }))
}

/// Per-file options from the `*_{index}` form fields. Blank values are absent.
fn file_options(fields: &HashMap<String, String>, index: usize) -> FileOptions {
    FileOptions {
        orientation: Orientation::from_form_value(trimmed_field(fields, "orientation", index)),
        pages: trimmed_field(fields, "pages", index).map(str::to_string),
        // Passwords are used verbatim
        password: fields
            .get(&format!("password_{}", index))
            .filter(|v| !v.is_empty())
            .cloned(),
    }
}

fn trimmed_field<'a>(
    fields: &'a HashMap<String, String>,
    prefix: &str,
    index: usize,
) -> Option<&'a str> {
    fields
        .get(&format!("{}_{}", prefix, index))
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Handler: GET /status/:job_id
pub async fn handle_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> (StatusCode, Json<StatusResponse>) {
    let job = parse_job_id(&job_id).and_then(|id| state.scheduler.status(id).ok());

    match job {
        Some(job) => (
            StatusCode::OK,
            Json(StatusResponse {
                status: job.status.as_str(),
                log: Some(job.log),
                message: job.message,
            }),
        ),
        None => (
            StatusCode::NOT_FOUND,
            Json(StatusResponse {
                status: "not_found",
                log: None,
                message: None,
            }),
        ),
    }
}

/// Handler: GET /download/:job_id
pub async fn handle_download(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Response, ServerError> {
    let job_id = parse_job_id(&job_id).ok_or(ServerError::ResultNotAvailable)?;
    let artifact = state.scheduler.take_result(job_id)?;

    // The artifact can disappear if the job was evicted in between
    let bytes = tokio::fs::read(&artifact)
        .await
        .map_err(|_| ServerError::ResultNotAvailable)?;

    let file_name = artifact
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "merged.pdf".to_string());

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        bytes,
    )
        .into_response())
}

/// Handler: GET /server-load
pub async fn handle_server_load(State(state): State<AppState>) -> Json<Capacity> {
    Json(state.scheduler.capacity())
}

fn parse_job_id(raw: &str) -> Option<JobId> {
    Uuid::parse_str(raw).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_file_options_defaults() {
        let options = file_options(&HashMap::new(), 0);
        assert_eq!(options, FileOptions::default());
    }

    #[test]
    fn test_file_options_by_index() {
        let fields: HashMap<String, String> = [
            ("orientation_1", "landscape"),
            ("pages_1", " 1-3, 5 "),
            ("password_1", " secret"),
            ("pages_0", "   "),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let first = file_options(&fields, 0);
        assert_eq!(first.pages, None);
        assert_eq!(first.orientation, Orientation::Portrait);

        let second = file_options(&fields, 1);
        assert_eq!(second.orientation, Orientation::Landscape);
        assert_eq!(second.pages.as_deref(), Some("1-3, 5"));
        assert_eq!(second.password.as_deref(), Some(" secret"));
    }
}
