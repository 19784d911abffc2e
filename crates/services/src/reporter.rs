//! Progress reporting: where completion events go once a session ends.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use practice_core::session::CompletionRecord;
use storage::repository::ProgressRepository;
use tracing::{info, warn};

use crate::error::ReportError;

/// Receives the completion of an exercise in a package.
///
/// Called at most once per session, after the terminal state is committed.
#[async_trait]
pub trait ProgressReporter: Send + Sync {
    /// Mark `record.exercise_id` in `record.package_id` as complete with
    /// `record.result`.
    ///
    /// # Errors
    ///
    /// Returns `ReportError` if the completion could not be delivered.
    async fn mark_complete(&self, record: &CompletionRecord) -> Result<(), ReportError>;
}

/// Outcome of handing a completion to the reporter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportStatus {
    /// The reporter accepted the completion.
    Reported,
    /// The reporter failed; the failure was logged and the session is unaffected.
    Failed,
    /// The completion was handed out earlier.
    AlreadyReported,
    /// The session is still active.
    Pending,
}

/// Upper bound on a single delivery, whatever the reporter.
pub const DELIVERY_TIMEOUT: Duration = Duration::from_secs(15);

/// Send `record` to `reporter`, logging instead of propagating failures.
///
/// A reporter that has not answered within [`DELIVERY_TIMEOUT`] counts as
/// failed, so ending a session never waits on a stalled backend.
pub async fn deliver(reporter: &dyn ProgressReporter, record: &CompletionRecord) -> ReportStatus {
    let outcome = tokio::time::timeout(DELIVERY_TIMEOUT, reporter.mark_complete(record))
        .await
        .unwrap_or(Err(ReportError::Timeout(DELIVERY_TIMEOUT)));
    match outcome {
        Ok(()) => {
            info!(
                session = %record.session_id,
                exercise = %record.exercise_id,
                package = %record.package_id,
                score = record.result.score_percentage,
                time_spent = record.result.time_spent_seconds,
                "completion reported"
            );
            ReportStatus::Reported
        }
        Err(err) => {
            warn!(
                session = %record.session_id,
                exercise = %record.exercise_id,
                error = %err,
                "failed to report completion"
            );
            ReportStatus::Failed
        }
    }
}

//
// ─── REPOSITORY-BACKED ─────────────────────────────────────────────────────────
//

/// Stores completions in the local progress history.
#[derive(Clone)]
pub struct RepositoryReporter {
    progress: Arc<dyn ProgressRepository>,
}

impl RepositoryReporter {
    #[must_use]
    pub fn new(progress: Arc<dyn ProgressRepository>) -> Self {
        Self { progress }
    }
}

#[async_trait]
impl ProgressReporter for RepositoryReporter {
    async fn mark_complete(&self, record: &CompletionRecord) -> Result<(), ReportError> {
        self.progress.append_completion(record).await?;
        Ok(())
    }
}

//
// ─── FAN-OUT ───────────────────────────────────────────────────────────────────
//

/// Forwards each completion to every inner reporter.
///
/// All reporters are tried; the first error is returned.
#[derive(Clone, Default)]
pub struct CompositeReporter {
    reporters: Vec<Arc<dyn ProgressReporter>>,
}

impl CompositeReporter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporters.push(reporter);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.reporters.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reporters.is_empty()
    }
}

#[async_trait]
impl ProgressReporter for CompositeReporter {
    async fn mark_complete(&self, record: &CompletionRecord) -> Result<(), ReportError> {
        let mut first_error = None;
        for reporter in &self.reporters {
            if let Err(err) = reporter.mark_complete(record).await {
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
