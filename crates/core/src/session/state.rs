use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::model::{Answer, ContentError, ExerciseKind};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// Rejected session operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionError {
    #[error("session is already {state}")]
    Terminal { state: SessionState },

    #[error("{kind} items cannot be skipped")]
    SkipNotAllowed { kind: ExerciseKind },

    #[error("skipping is disabled for this session")]
    SkipDisabled,

    #[error("skip allowance of {max} used up")]
    SkipLimitReached { max: u32 },

    #[error("hint allowance of {max} used up")]
    HintLimitReached { max: u32 },

    #[error(transparent)]
    Content(#[from] ContentError),
}

//
// ─── STATE ─────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Active,
    Completed,
    Aborted,
}

impl SessionState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, SessionState::Active)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Active => "active",
            SessionState::Completed => "completed",
            SessionState::Aborted => "aborted",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a session left the Active state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// Every item was answered or skipped.
    Finished,
    /// The lives pool ran dry.
    LivesExhausted,
    /// The student asked for results early or left.
    StudentExit,
    /// The time limit elapsed.
    TimeUp,
}

impl EndReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            EndReason::Finished => "finished",
            EndReason::LivesExhausted => "lives_exhausted",
            EndReason::StudentExit => "student_exit",
            EndReason::TimeUp => "time_up",
        }
    }
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//
// ─── OUTCOMES ──────────────────────────────────────────────────────────────────
//

/// Recorded result of answering one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemOutcome {
    pub item_index: usize,
    pub answer: Answer,
    pub is_correct: bool,
    pub answered_at: DateTime<Utc>,
}

/// What a successful operation did to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Still active; `position` is the new 0-based position in the sequence.
    Advanced { position: usize },
    Completed,
    Aborted,
}

impl Transition {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Transition::Advanced { .. })
    }
}

/// Aggregated view of session progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionProgress {
    pub total: usize,
    pub position: usize,
    pub answered: usize,
    pub skipped: usize,
    pub remaining: usize,
    pub lives_remaining: Option<u32>,
    pub state: SessionState,
}
