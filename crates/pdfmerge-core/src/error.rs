use thiserror::Error;

#[derive(Error, Debug)]
pub enum PdfMergeError {
    #[error("Invalid page range: {0}")]
    InvalidRangeFormat(String),

    #[error("Unreadable document: {0}")]
    UnreadableDocument(String),

    #[error("PDF operation failed: {0}")]
    OperationError(String),
}
