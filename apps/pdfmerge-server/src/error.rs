//! Error types for the PDF merge server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use pdfmerge_jobs::JobError;
use serde::Serialize;
use thiserror::Error;

/// Server error types
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Server busy, please try another server")]
    ServerBusy,

    #[error("Result not available")]
    ResultNotAvailable,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
    code: String,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ServerError::ServerBusy => (StatusCode::SERVICE_UNAVAILABLE, "SERVER_BUSY"),
            ServerError::ResultNotAvailable => (StatusCode::NOT_FOUND, "RESULT_NOT_AVAILABLE"),
            ServerError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
            ServerError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        let message = match self {
            ServerError::InvalidRequest(msg) | ServerError::Internal(msg) => msg,
            other => other.to_string(),
        };

        let body = ErrorResponse {
            success: false,
            error: message,
            code: code.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<JobError> for ServerError {
    fn from(err: JobError) -> Self {
        match err {
            JobError::CapacityExceeded { .. } => ServerError::ServerBusy,
            JobError::JobNotFound(_) | JobError::ResultNotReady(_) => {
                ServerError::ResultNotAvailable
            }
            JobError::NoFiles => ServerError::InvalidRequest("No files uploaded".to_string()),
            JobError::Storage(e) => ServerError::Internal(format!("Failed to save uploads: {}", e)),
            other => ServerError::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_job_errors_map_to_status_codes() {
        let cases = [
            (
                JobError::CapacityExceeded { active: 3, max: 3 },
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (JobError::JobNotFound(Uuid::new_v4()), StatusCode::NOT_FOUND),
            (JobError::ResultNotReady(Uuid::new_v4()), StatusCode::NOT_FOUND),
            (JobError::NoFiles, StatusCode::BAD_REQUEST),
            (
                JobError::Storage(std::io::Error::other("disk full")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            let response = ServerError::from(err).into_response();
            assert_eq!(response.status(), expected);
        }
    }
}
