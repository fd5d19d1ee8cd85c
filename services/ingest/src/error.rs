//! Failure taxonomy for the ingestion pipeline.
//!
//! Every failure is surfaced to the caller with a stable kind and, where it
//! applies, the CSV line of the offending row. Nothing is retried here:
//! re-running a whole request is safe because the upsert is keyed by
//! complaint id.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    /// The complaints CSV is not on disk yet.
    #[error("source file {path} not found; run the download step first")]
    SourceUnavailable { path: PathBuf },

    /// Requested batch/page size outside the allowed bounds.
    #[error("batch size {0} outside the allowed range 1..=1000")]
    InvalidBatchSize(usize),

    /// A row that cannot be normalized; aborts the current batch.
    #[error("malformed record at line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },

    /// Writing into the staging table failed; fatal to the request.
    #[error("staging write failed: {0}")]
    StorageWrite(#[source] sqlx::Error),

    /// The merge into the permanent table failed; transaction rolled back.
    #[error("upsert merge failed: {0}")]
    UpsertConflict(#[source] sqlx::Error),

    /// Fetching or extracting the Kaggle archive failed.
    #[error("dataset download failed: {0}")]
    DownloadFailed(String),
}

impl IngestError {
    /// Stable machine-readable kind for error payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            IngestError::SourceUnavailable { .. } => "source_unavailable",
            IngestError::InvalidBatchSize(_) => "invalid_batch_size",
            IngestError::MalformedRecord { .. } => "malformed_record",
            IngestError::StorageWrite(_) => "storage_write_error",
            IngestError::UpsertConflict(_) => "upsert_conflict",
            IngestError::DownloadFailed(_) => "download_failed",
        }
    }

    /// CSV line of the offending row, when the failure is tied to one.
    pub fn line(&self) -> Option<usize> {
        match self {
            IngestError::MalformedRecord { line, .. } => Some(*line),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_is_stable_per_variant() {
        let err = IngestError::SourceUnavailable {
            path: PathBuf::from("./data/complaints.csv"),
        };
        assert_eq!(err.kind(), "source_unavailable");
        assert_eq!(IngestError::InvalidBatchSize(0).kind(), "invalid_batch_size");
    }

    #[test]
    fn line_reported_only_for_malformed_records() {
        let err = IngestError::MalformedRecord {
            line: 42,
            reason: "empty Complaint ID field".into(),
        };
        assert_eq!(err.line(), Some(42));
        assert_eq!(IngestError::InvalidBatchSize(1001).line(), None);
    }
}
