use std::sync::Arc;

use practice_core::model::SessionSettings;
use storage::repository::{ProgressRepository, Storage};
use tracing::info;

use crate::Clock;
use crate::error::AppServicesError;
use crate::http_reporter::HttpProgressReporter;
use crate::reporter::{CompositeReporter, ProgressReporter, RepositoryReporter};
use crate::sessions::ExerciseSessionService;

/// Assembles app-facing services over one storage backend.
///
/// Completions always land in the local history; they are also posted to the
/// remote API when one is configured.
#[derive(Clone)]
pub struct AppServices {
    sessions: Arc<ExerciseSessionService>,
    history: Arc<dyn ProgressRepository>,
    remote_reporting: bool,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        settings: SessionSettings,
        remote: HttpProgressReporter,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_storage(&storage, clock, settings, remote))
    }

    /// Build services over in-memory storage.
    #[must_use]
    pub fn in_memory(clock: Clock, settings: SessionSettings, remote: HttpProgressReporter) -> Self {
        Self::from_storage(&Storage::in_memory(), clock, settings, remote)
    }

    fn from_storage(
        storage: &Storage,
        clock: Clock,
        settings: SessionSettings,
        remote: HttpProgressReporter,
    ) -> Self {
        let remote_reporting = remote.enabled();
        let mut reporter =
            CompositeReporter::new().with(Arc::new(RepositoryReporter::new(Arc::clone(
                &storage.progress,
            ))));
        if remote_reporting {
            reporter = reporter.with(Arc::new(remote));
        }
        info!(
            reporters = reporter.len(),
            remote = remote_reporting,
            "progress reporting configured"
        );

        let reporter: Arc<dyn ProgressReporter> = Arc::new(reporter);
        let sessions = Arc::new(ExerciseSessionService::new(clock, reporter).with_settings(settings));

        Self {
            sessions,
            history: Arc::clone(&storage.progress),
            remote_reporting,
        }
    }

    #[must_use]
    pub fn sessions(&self) -> Arc<ExerciseSessionService> {
        Arc::clone(&self.sessions)
    }

    #[must_use]
    pub fn history(&self) -> Arc<dyn ProgressRepository> {
        Arc::clone(&self.history)
    }

    #[must_use]
    pub fn remote_reporting(&self) -> bool {
        self.remote_reporting
    }
}
