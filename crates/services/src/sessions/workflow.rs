use std::sync::Arc;

use practice_core::Clock;
use practice_core::model::{Answer, Exercise, SessionSettings};
use practice_core::session::{
    EndReason, ExerciseSession, SessionError, SessionProgress, Transition,
};

use super::live::LiveSession;
use crate::reporter::{ProgressReporter, ReportStatus, deliver};

/// Result of one step taken on a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionStep {
    pub transition: Transition,
    pub progress: SessionProgress,
    /// Set when this step ended the session.
    pub report: Option<ReportStatus>,
}

/// Orchestrates session start, answering and completion reporting.
#[derive(Clone)]
pub struct ExerciseSessionService {
    clock: Clock,
    settings: SessionSettings,
    reporter: Arc<dyn ProgressReporter>,
}

impl ExerciseSessionService {
    #[must_use]
    pub fn new(clock: Clock, reporter: Arc<dyn ProgressReporter>) -> Self {
        Self {
            clock,
            settings: SessionSettings::default(),
            reporter,
        }
    }

    #[must_use]
    pub fn with_settings(mut self, settings: SessionSettings) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    #[must_use]
    pub fn clock(&self) -> Clock {
        self.clock
    }

    /// Start a session on `exercise` with the service settings.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Content` if the exercise cannot be practiced.
    pub fn start(&self, exercise: &Exercise) -> Result<ExerciseSession, SessionError> {
        ExerciseSession::start(exercise, self.settings.clone(), self.clock.now())
    }

    /// Start a session shared with a timer task.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Content` if the exercise cannot be practiced.
    pub fn start_live(&self, exercise: &Exercise) -> Result<LiveSession, SessionError> {
        let session = self.start(exercise)?;
        Ok(LiveSession::start(
            session,
            self.clock,
            Arc::clone(&self.reporter),
        ))
    }

    /// A fresh session for the same exercise; `previous` is left as is.
    #[must_use]
    pub fn restart(&self, previous: &ExerciseSession) -> ExerciseSession {
        previous.restart(self.clock.now())
    }

    /// Record the presenter's verdict and report if the session ended.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Terminal` if the session already ended.
    pub async fn submit_answer(
        &self,
        session: &mut ExerciseSession,
        answer: Answer,
        is_correct: bool,
    ) -> Result<SessionStep, SessionError> {
        let transition = session.submit_answer(answer, is_correct, self.clock.now())?;
        Ok(self.after(session, transition).await)
    }

    /// # Errors
    ///
    /// Returns `SessionError` if the current item cannot be skipped.
    pub async fn skip(&self, session: &mut ExerciseSession) -> Result<SessionStep, SessionError> {
        let transition = session.skip(self.clock.now())?;
        Ok(self.after(session, transition).await)
    }

    /// # Errors
    ///
    /// Returns `SessionError` if no hint may be used.
    pub fn use_hint(&self, session: &mut ExerciseSession) -> Result<u32, SessionError> {
        session.use_hint()
    }

    /// # Errors
    ///
    /// Returns `SessionError::Terminal` if the session already ended.
    pub async fn force_complete(
        &self,
        session: &mut ExerciseSession,
        reason: EndReason,
    ) -> Result<SessionStep, SessionError> {
        let transition = session.force_complete(reason, self.clock.now())?;
        Ok(self.after(session, transition).await)
    }

    /// Report the completion if nobody has yet.
    pub async fn finalize(&self, session: &mut ExerciseSession) -> ReportStatus {
        if session.is_active() {
            return ReportStatus::Pending;
        }
        match session.take_completion() {
            Some(record) => deliver(self.reporter.as_ref(), &record).await,
            None => ReportStatus::AlreadyReported,
        }
    }

    async fn after(&self, session: &mut ExerciseSession, transition: Transition) -> SessionStep {
        let report = if transition.is_terminal() {
            Some(self.finalize(session).await)
        } else {
            None
        };
        SessionStep {
            transition,
            progress: session.progress(),
            report,
        }
    }
}
