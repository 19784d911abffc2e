use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::{EndReason, SessionState};
use crate::model::{ExerciseId, PackageId, SessionId};

/// Payload handed to the progress reporter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionResult {
    pub score_percentage: u8,
    pub time_spent_seconds: u64,
    pub completed_at: DateTime<Utc>,
}

impl CompletionResult {
    /// `completed_at` as an RFC 3339 string with millisecond precision.
    #[must_use]
    pub fn completed_at_rfc3339(&self) -> String {
        self.completed_at.to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

/// The single completion event produced by a finished session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRecord {
    pub session_id: SessionId,
    pub exercise_id: ExerciseId,
    pub package_id: PackageId,
    pub state: SessionState,
    pub end_reason: EndReason,
    pub result: CompletionResult,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn result_serializes_camel_case() {
        let result = CompletionResult {
            score_percentage: 75,
            time_spent_seconds: 42,
            completed_at: fixed_now(),
        };
        let json = serde_json::to_value(result).unwrap();
        assert_eq!(json["scorePercentage"], 75);
        assert_eq!(json["timeSpentSeconds"], 42);
        assert_eq!(result.completed_at_rfc3339(), "2023-11-14T22:13:20.000Z");
    }
}
