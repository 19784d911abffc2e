use async_trait::async_trait;
use practice_core::model::{ExerciseId, PackageId, SessionId};
use practice_core::session::CompletionRecord;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Completion history for exercises.
///
/// Records are keyed by session id; a session completes at most once, so a
/// second append for the same id is a `Conflict`.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Persist a completion record.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the session already has a record,
    /// or other storage errors.
    async fn append_completion(&self, record: &CompletionRecord) -> Result<(), StorageError>;

    /// Fetch the completion of one session.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_completion(&self, session_id: SessionId)
    -> Result<CompletionRecord, StorageError>;

    /// Most recent completions for an exercise, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    async fn list_completions(
        &self,
        exercise_id: &ExerciseId,
        limit: u32,
    ) -> Result<Vec<CompletionRecord>, StorageError>;

    /// Most recent completions across a package, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    async fn list_package_completions(
        &self,
        package_id: &PackageId,
        limit: u32,
    ) -> Result<Vec<CompletionRecord>, StorageError>;

    /// Highest score recorded for an exercise, `None` if never completed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    async fn best_score(&self, exercise_id: &ExerciseId) -> Result<Option<u8>, StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    completions: Arc<Mutex<HashMap<SessionId, CompletionRecord>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self {
            completions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn newest_first<F>(&self, keep: F, limit: u32) -> Result<Vec<CompletionRecord>, StorageError>
    where
        F: Fn(&CompletionRecord) -> bool,
    {
        let guard = self
            .completions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut found: Vec<CompletionRecord> =
            guard.values().filter(|r| keep(r)).cloned().collect();
        found.sort_by(|a, b| {
            b.result
                .completed_at
                .cmp(&a.result.completed_at)
                .then_with(|| b.session_id.cmp(&a.session_id))
        });
        found.truncate(limit as usize);
        Ok(found)
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn append_completion(&self, record: &CompletionRecord) -> Result<(), StorageError> {
        let mut guard = self
            .completions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        if guard.contains_key(&record.session_id) {
            return Err(StorageError::Conflict);
        }
        guard.insert(record.session_id, record.clone());
        Ok(())
    }

    async fn get_completion(
        &self,
        session_id: SessionId,
    ) -> Result<CompletionRecord, StorageError> {
        let guard = self
            .completions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.get(&session_id).cloned().ok_or(StorageError::NotFound)
    }

    async fn list_completions(
        &self,
        exercise_id: &ExerciseId,
        limit: u32,
    ) -> Result<Vec<CompletionRecord>, StorageError> {
        self.newest_first(|r| &r.exercise_id == exercise_id, limit)
    }

    async fn list_package_completions(
        &self,
        package_id: &PackageId,
        limit: u32,
    ) -> Result<Vec<CompletionRecord>, StorageError> {
        self.newest_first(|r| &r.package_id == package_id, limit)
    }

    async fn best_score(&self, exercise_id: &ExerciseId) -> Result<Option<u8>, StorageError> {
        let guard = self
            .completions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard
            .values()
            .filter(|r| &r.exercise_id == exercise_id)
            .map(|r| r.result.score_percentage)
            .max())
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub progress: Arc<dyn ProgressRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let progress: Arc<dyn ProgressRepository> = Arc::new(InMemoryRepository::new());
        Self { progress }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use practice_core::session::{CompletionResult, EndReason, SessionState};
    use practice_core::time::fixed_now;

    fn record(exercise: &str, score: u8, offset_secs: i64) -> CompletionRecord {
        CompletionRecord {
            session_id: SessionId::generate(),
            exercise_id: ExerciseId::new(exercise).unwrap(),
            package_id: PackageId::new("pkg").unwrap(),
            state: SessionState::Completed,
            end_reason: EndReason::Finished,
            result: CompletionResult {
                score_percentage: score,
                time_spent_seconds: 30,
                completed_at: fixed_now() + chrono::Duration::seconds(offset_secs),
            },
        }
    }

    #[tokio::test]
    async fn duplicate_session_is_a_conflict() {
        let repo = InMemoryRepository::new();
        let rec = record("ex", 80, 0);
        repo.append_completion(&rec).await.unwrap();
        let err = repo.append_completion(&rec).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict));
        assert_eq!(repo.get_completion(rec.session_id).await.unwrap(), rec);
    }

    #[tokio::test]
    async fn lists_newest_first_and_tracks_best() {
        let repo = InMemoryRepository::new();
        repo.append_completion(&record("ex", 40, 0)).await.unwrap();
        repo.append_completion(&record("ex", 90, 10)).await.unwrap();
        repo.append_completion(&record("ex", 70, 20)).await.unwrap();
        repo.append_completion(&record("other", 100, 30))
            .await
            .unwrap();

        let ex = ExerciseId::new("ex").unwrap();
        let listed = repo.list_completions(&ex, 2).await.unwrap();
        let scores: Vec<u8> = listed.iter().map(|r| r.result.score_percentage).collect();
        assert_eq!(scores, vec![70, 90]);
        assert_eq!(repo.best_score(&ex).await.unwrap(), Some(90));

        let none = ExerciseId::new("never").unwrap();
        assert_eq!(repo.best_score(&none).await.unwrap(), None);

        let pkg = PackageId::new("pkg").unwrap();
        assert_eq!(repo.list_package_completions(&pkg, 10).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn missing_session_is_not_found() {
        let repo = Storage::in_memory();
        let err = repo
            .progress
            .get_completion(SessionId::generate())
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound));
    }
}
