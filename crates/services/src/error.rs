//! Shared error types for the services crate.

use std::time::Duration;

use thiserror::Error;

use practice_core::model::ExerciseId;
use practice_core::session::SessionError;
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by progress reporters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReportError {
    #[error("progress reporting is not configured")]
    Disabled,
    #[error("invalid reporting endpoint: {0}")]
    InvalidUrl(String),
    #[error("progress report failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error("progress report timed out after {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while driving a live session.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LiveSessionError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("session belongs to exercise {expected}, got {actual}")]
    ExerciseMismatch {
        expected: ExerciseId,
        actual: ExerciseId,
    },
    #[error("exercise has no item at index {index}")]
    MissingItem { index: usize },
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
