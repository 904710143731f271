//! Shared error types for the services crate.

use thiserror::Error;

use progress_core::model::{ConfirmationStatus, TaskStatus};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by `TaskProgressService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TaskProgressError {
    #[error("submission requires a non-empty artifact url")]
    EmptyArtifact,
    #[error("artifact url is not valid: {0}")]
    InvalidArtifact(String),
    #[error("caller identity does not match the record's user")]
    IdentityMismatch,
    #[error("submission was already accepted")]
    AlreadyAccepted,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `ConfirmationWorkflow`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfirmationError {
    #[error("a review decision requires a comment")]
    EmptyComment,
    #[error("record is not awaiting review (status {status}, confirmation {confirmation})")]
    NotReviewable {
        status: TaskStatus,
        confirmation: ConfirmationStatus,
    },
    #[error("record was reviewed or resubmitted since it was last seen")]
    StaleRecord,
    #[error("submission record not found")]
    NotFound,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `ProgressAggregator`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AggregationError {
    #[error("unknown program")]
    UnknownProgram,
    #[error("certificate requires every task to be completed and accepted")]
    NotEligible,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `EnrollmentClient`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EnrollmentError {
    #[error("enrollment service is not configured")]
    Disabled,
    #[error("enrollment request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
