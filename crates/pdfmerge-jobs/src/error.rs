use pdfmerge_core::PdfMergeError;
use thiserror::Error;

use crate::job::JobId;

#[derive(Error, Debug)]
pub enum JobError {
    #[error("Server busy: {active} of {max} merge jobs running")]
    CapacityExceeded { active: usize, max: usize },

    #[error("Job not found: {0}")]
    JobNotFound(JobId),

    #[error("Result not available for job {0}")]
    ResultNotReady(JobId),

    #[error("No files submitted")]
    NoFiles,

    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error(transparent)]
    Merge(#[from] PdfMergeError),

    #[error("Merge task failed: {0}")]
    TaskFailed(String),
}
