use practice_core::model::{ExerciseId, PackageId, SessionId};
use practice_core::session::{CompletionRecord, CompletionResult, EndReason, SessionState};
use sqlx::Row;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn parse_session_state(s: &str) -> Result<SessionState, StorageError> {
    match s {
        "completed" => Ok(SessionState::Completed),
        "aborted" => Ok(SessionState::Aborted),
        _ => Err(StorageError::Serialization(format!("invalid state: {s}"))),
    }
}

pub(crate) fn parse_end_reason(s: &str) -> Result<EndReason, StorageError> {
    match s {
        "finished" => Ok(EndReason::Finished),
        "lives_exhausted" => Ok(EndReason::LivesExhausted),
        "student_exit" => Ok(EndReason::StudentExit),
        "time_up" => Ok(EndReason::TimeUp),
        _ => Err(StorageError::Serialization(format!(
            "invalid end reason: {s}"
        ))),
    }
}

pub(crate) fn score_from_i64(v: i64) -> Result<u8, StorageError> {
    u8::try_from(v)
        .ok()
        .filter(|s| *s <= 100)
        .ok_or_else(|| StorageError::Serialization(format!("invalid score_percentage: {v}")))
}

pub(crate) fn seconds_to_i64(v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization("time_spent_seconds overflow".into()))
}

pub(crate) fn map_completion_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<CompletionRecord, StorageError> {
    let session_id: SessionId = row
        .try_get::<String, _>("session_id")
        .map_err(ser)?
        .parse()
        .map_err(ser)?;
    let exercise_id = ExerciseId::new(row.try_get::<String, _>("exercise_id").map_err(ser)?)
        .map_err(ser)?;
    let package_id =
        PackageId::new(row.try_get::<String, _>("package_id").map_err(ser)?).map_err(ser)?;

    let state_str: String = row.try_get("state").map_err(ser)?;
    let reason_str: String = row.try_get("end_reason").map_err(ser)?;

    let time_spent: i64 = row.try_get("time_spent_seconds").map_err(ser)?;
    let time_spent_seconds = u64::try_from(time_spent).map_err(|_| {
        StorageError::Serialization(format!("invalid time_spent_seconds: {time_spent}"))
    })?;

    Ok(CompletionRecord {
        session_id,
        exercise_id,
        package_id,
        state: parse_session_state(&state_str)?,
        end_reason: parse_end_reason(&reason_str)?,
        result: CompletionResult {
            score_percentage: score_from_i64(row.try_get("score_percentage").map_err(ser)?)?,
            time_spent_seconds,
            completed_at: row.try_get("completed_at").map_err(ser)?,
        },
    })
}
