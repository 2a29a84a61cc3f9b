//! Types for merge jobs.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use uuid::Uuid;

/// Unique identifier for a merge job.
pub type JobId = Uuid;

/// Status of a merge job. `Done` and `Error` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Processing,
    Done,
    Error,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, JobStatus::Processing)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Processing => "processing",
            JobStatus::Done => "done",
            JobStatus::Error => "error",
        }
    }
}

/// Snapshot of one merge request's lifecycle.
#[derive(Debug, Clone)]
pub struct MergeJob {
    pub id: JobId,
    pub status: JobStatus,
    /// Human-readable progress lines, oldest first.
    pub log: Vec<String>,
    /// Output artifact; set iff `status == Done`.
    pub result: Option<PathBuf>,
    /// Failure message; set iff `status == Error`.
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl MergeJob {
    pub(crate) fn new(id: JobId) -> Self {
        Self {
            id,
            status: JobStatus::Processing,
            log: Vec::new(),
            result: None,
            message: None,
            created_at: Utc::now(),
            finished_at: None,
        }
    }
}

/// Processing-job count against the admission ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Capacity {
    pub active_jobs: usize,
    pub max_jobs: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&JobStatus::Processing).unwrap(),
            "\"processing\""
        );
        assert_eq!(serde_json::to_string(&JobStatus::Done).unwrap(), "\"done\"");
        assert_eq!(JobStatus::Error.as_str(), "error");
    }

    #[test]
    fn test_terminal_states() {
        assert!(!JobStatus::Processing.is_terminal());
        assert!(JobStatus::Done.is_terminal());
        assert!(JobStatus::Error.is_terminal());
    }

    #[test]
    fn test_new_job_is_processing() {
        let job = MergeJob::new(Uuid::new_v4());
        assert_eq!(job.status, JobStatus::Processing);
        assert!(job.log.is_empty());
        assert!(job.result.is_none() && job.message.is_none() && job.finished_at.is_none());
    }

    #[test]
    fn test_capacity_serialize() {
        let json = serde_json::to_string(&Capacity {
            active_jobs: 1,
            max_jobs: 3,
        })
        .unwrap();
        assert_eq!(json, r#"{"active_jobs":1,"max_jobs":3}"#);
    }
}
