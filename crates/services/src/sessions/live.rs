use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use practice_core::Clock;
use practice_core::model::Answer;
use practice_core::scoring::SessionResults;
use practice_core::session::{
    EndReason, ExerciseSession, SessionError, SessionProgress, SessionState, Transition,
};
use tokio::sync::Mutex;

use super::timer::SessionTimer;
use crate::error::LiveSessionError;
use crate::reporter::{ProgressReporter, ReportStatus, deliver};

/// A session shared between the presentation layer and its timer.
///
/// Each operation runs under one lock acquisition. Completion is reported
/// after the lock is released, and the timer is stopped on the first
/// terminal transition.
pub struct LiveSession {
    session: Arc<Mutex<ExerciseSession>>,
    reporter: Arc<dyn ProgressReporter>,
    clock: Clock,
    timer: Option<SessionTimer>,
}

impl LiveSession {
    /// Wrap `session`; spawns the timer task when the settings enable one.
    ///
    /// Must be called inside a tokio runtime.
    #[must_use]
    pub fn start(
        session: ExerciseSession,
        clock: Clock,
        reporter: Arc<dyn ProgressReporter>,
    ) -> Self {
        let timer_settings = session.settings().timer();
        let session = Arc::new(Mutex::new(session));
        let timer = timer_settings.map(|t| {
            SessionTimer::spawn(
                Arc::clone(&session),
                t.tick_interval(),
                clock,
                Arc::clone(&reporter),
            )
        });
        Self {
            session,
            reporter,
            clock,
            timer,
        }
    }

    /// # Errors
    ///
    /// Returns `LiveSessionError::Session` if the session already ended.
    pub async fn submit_answer(
        &self,
        answer: Answer,
        is_correct: bool,
    ) -> Result<Transition, LiveSessionError> {
        self.apply(|s, now| s.submit_answer(answer, is_correct, now))
            .await
    }

    /// # Errors
    ///
    /// Returns `LiveSessionError::Session` if skipping is refused.
    pub async fn skip(&self) -> Result<Transition, LiveSessionError> {
        self.apply(ExerciseSession::skip).await
    }

    /// # Errors
    ///
    /// Returns `LiveSessionError::Session` if the hint is refused.
    pub async fn use_hint(&self) -> Result<u32, LiveSessionError> {
        let mut guard = self.session.lock().await;
        Ok(guard.use_hint()?)
    }

    /// End the session early at the student's request.
    ///
    /// # Errors
    ///
    /// Returns `LiveSessionError::Session` if the session already ended.
    pub async fn exit(&self) -> Result<Transition, LiveSessionError> {
        self.force_complete(EndReason::StudentExit).await
    }

    /// # Errors
    ///
    /// Returns `LiveSessionError::Session` if the session already ended.
    pub async fn force_complete(&self, reason: EndReason) -> Result<Transition, LiveSessionError> {
        self.apply(|s, now| s.force_complete(reason, now)).await
    }

    async fn apply<F>(&self, op: F) -> Result<Transition, LiveSessionError>
    where
        F: FnOnce(&mut ExerciseSession, DateTime<Utc>) -> Result<Transition, SessionError>,
    {
        let (transition, completion) = {
            let mut guard = self.session.lock().await;
            let transition = op(&mut *guard, self.clock.now())?;
            let completion = if transition.is_terminal() {
                guard.take_completion()
            } else {
                None
            };
            (transition, completion)
        };

        if transition.is_terminal() {
            self.stop_timer();
        }
        if let Some(record) = completion {
            deliver(self.reporter.as_ref(), &record).await;
        }
        Ok(transition)
    }

    /// Hand out any completion not yet reported.
    pub async fn finalize(&self) -> ReportStatus {
        let completion = {
            let mut guard = self.session.lock().await;
            if guard.is_active() {
                return ReportStatus::Pending;
            }
            guard.take_completion()
        };
        match completion {
            Some(record) => deliver(self.reporter.as_ref(), &record).await,
            None => ReportStatus::AlreadyReported,
        }
    }

    /// Stop the timer and report any pending completion.
    ///
    /// A timer that already ended the session is allowed to finish its own
    /// report first.
    pub async fn close(mut self) -> ReportStatus {
        if let Some(timer) = self.timer.as_mut() {
            {
                let guard = self.session.lock().await;
                if guard.is_active() {
                    timer.stop();
                }
            }
            timer.join().await;
        }
        self.finalize().await
    }

    fn stop_timer(&self) {
        if let Some(timer) = &self.timer {
            timer.stop();
        }
    }

    /// True while a timer task is attached and still running.
    #[must_use]
    pub fn timer_running(&self) -> bool {
        self.timer.as_ref().is_some_and(SessionTimer::is_running)
    }

    /// Read the session under the lock.
    pub async fn inspect<T>(&self, f: impl FnOnce(&ExerciseSession) -> T) -> T {
        let guard = self.session.lock().await;
        f(&*guard)
    }

    pub async fn state(&self) -> SessionState {
        self.inspect(ExerciseSession::state).await
    }

    pub async fn progress(&self) -> SessionProgress {
        self.inspect(ExerciseSession::progress).await
    }

    /// Content index and progress of the item to present next.
    pub async fn current(&self) -> Option<(usize, SessionProgress)> {
        self.inspect(|s| s.current_item_index().map(|i| (i, s.progress())))
            .await
    }

    pub async fn remaining_time(&self) -> Option<Duration> {
        self.inspect(ExerciseSession::remaining_time).await
    }

    pub async fn results(&self) -> Option<SessionResults> {
        self.inspect(ExerciseSession::results).await
    }
}

impl Drop for LiveSession {
    fn drop(&mut self) {
        self.stop_timer();
    }
}
