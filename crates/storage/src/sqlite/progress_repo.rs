use practice_core::model::{ExerciseId, PackageId, SessionId};
use practice_core::session::CompletionRecord;
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{map_completion_row, score_from_i64, seconds_to_i64, ser};
use crate::repository::{ProgressRepository, StorageError};

const SELECT_COLUMNS: &str = r"
    SELECT
        session_id, exercise_id, package_id, state, end_reason,
        score_percentage, time_spent_seconds, completed_at
    FROM completions
";

impl SqliteRepository {
    async fn list_where(
        &self,
        column: &'static str,
        key: &str,
        limit: u32,
    ) -> Result<Vec<CompletionRecord>, StorageError> {
        let sql = format!(
            "{SELECT_COLUMNS} WHERE {column} = ?1 ORDER BY completed_at DESC, session_id DESC LIMIT ?2"
        );
        let rows = sqlx::query(&sql)
            .bind(key)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_completion_row(&row)?);
        }
        Ok(out)
    }
}

#[async_trait::async_trait]
impl ProgressRepository for SqliteRepository {
    async fn append_completion(&self, record: &CompletionRecord) -> Result<(), StorageError> {
        let res = sqlx::query(
            r"
                INSERT INTO completions (
                    session_id, exercise_id, package_id, state, end_reason,
                    score_percentage, time_spent_seconds, completed_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                ON CONFLICT(session_id) DO NOTHING
            ",
        )
        .bind(record.session_id.to_string())
        .bind(record.exercise_id.as_str())
        .bind(record.package_id.as_str())
        .bind(record.state.as_str())
        .bind(record.end_reason.as_str())
        .bind(i64::from(record.result.score_percentage))
        .bind(seconds_to_i64(record.result.time_spent_seconds)?)
        .bind(record.result.completed_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        if res.rows_affected() == 0 {
            return Err(StorageError::Conflict);
        }
        Ok(())
    }

    async fn get_completion(
        &self,
        session_id: SessionId,
    ) -> Result<CompletionRecord, StorageError> {
        let sql = format!("{SELECT_COLUMNS} WHERE session_id = ?1");
        let row = sqlx::query(&sql)
            .bind(session_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?
            .ok_or(StorageError::NotFound)?;

        map_completion_row(&row)
    }

    async fn list_completions(
        &self,
        exercise_id: &ExerciseId,
        limit: u32,
    ) -> Result<Vec<CompletionRecord>, StorageError> {
        self.list_where("exercise_id", exercise_id.as_str(), limit)
            .await
    }

    async fn list_package_completions(
        &self,
        package_id: &PackageId,
        limit: u32,
    ) -> Result<Vec<CompletionRecord>, StorageError> {
        self.list_where("package_id", package_id.as_str(), limit)
            .await
    }

    async fn best_score(&self, exercise_id: &ExerciseId) -> Result<Option<u8>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT MAX(score_percentage) AS best
                FROM completions
                WHERE exercise_id = ?1
            ",
        )
        .bind(exercise_id.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        row.try_get::<Option<i64>, _>("best")
            .map_err(ser)?
            .map(score_from_i64)
            .transpose()
    }
}
