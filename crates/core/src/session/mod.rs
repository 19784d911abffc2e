//! Session state machine for one attempt at one exercise.
//!
//! An `ExerciseSession` is created Active and ends either Completed or
//! Aborted. Every mutating method takes `&mut self` and a caller-supplied
//! timestamp; nothing here reads the system clock or performs I/O.

mod completion;
mod state;

pub use completion::{CompletionRecord, CompletionResult};
pub use state::{EndReason, ItemOutcome, SessionError, SessionProgress, SessionState, Transition};

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use rand::seq::SliceRandom;
use std::fmt;
use std::num::NonZeroUsize;
use std::time::Duration as StdDuration;
use tracing::debug;

use crate::model::{
    Answer, Exercise, ExerciseId, ExerciseKind, PackageId, SessionId, SessionSettings,
};
use crate::scoring::{self, SessionResults};

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

pub struct ExerciseSession {
    id: SessionId,
    exercise_id: ExerciseId,
    package_id: PackageId,
    kind: ExerciseKind,
    item_count: NonZeroUsize,
    item_order: Vec<usize>,
    settings: SessionSettings,

    state: SessionState,
    end_reason: Option<EndReason>,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,

    position: usize,
    lives_remaining: Option<u32>,
    outcomes: Vec<ItemOutcome>,
    skipped: Vec<usize>,
    hints_used: u32,

    time_samples: Vec<Duration>,
    last_advance_at: DateTime<Utc>,
    elapsed: StdDuration,

    completion: Option<CompletionRecord>,
    completion_taken: bool,
}

impl ExerciseSession {
    /// Start a session on `exercise`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Content` if the exercise fails validation,
    /// including when it has no items. No session is created in that case.
    pub fn start(
        exercise: &Exercise,
        settings: SessionSettings,
        now: DateTime<Utc>,
    ) -> Result<Self, SessionError> {
        Self::start_with_rng(exercise, settings, now, &mut rand::rng())
    }

    /// Like [`ExerciseSession::start`] with an explicit RNG for item shuffling.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Content` if the exercise fails validation.
    pub fn start_with_rng<R: Rng + ?Sized>(
        exercise: &Exercise,
        settings: SessionSettings,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Result<Self, SessionError> {
        let item_count = exercise.validate()?;
        Ok(Self::fresh(
            exercise.id.clone(),
            exercise.package_id.clone(),
            exercise.kind(),
            item_count,
            settings,
            now,
            rng,
        ))
    }

    /// A brand-new session for the same exercise and settings.
    ///
    /// `self` is left untouched.
    #[must_use]
    pub fn restart(&self, now: DateTime<Utc>) -> Self {
        self.restart_with_rng(now, &mut rand::rng())
    }

    #[must_use]
    pub fn restart_with_rng<R: Rng + ?Sized>(&self, now: DateTime<Utc>, rng: &mut R) -> Self {
        Self::fresh(
            self.exercise_id.clone(),
            self.package_id.clone(),
            self.kind,
            self.item_count,
            self.settings.clone(),
            now,
            rng,
        )
    }

    fn fresh<R: Rng + ?Sized>(
        exercise_id: ExerciseId,
        package_id: PackageId,
        kind: ExerciseKind,
        item_count: NonZeroUsize,
        settings: SessionSettings,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Self {
        let mut item_order: Vec<usize> = (0..item_count.get()).collect();
        if settings.shuffle_items() {
            item_order.shuffle(rng);
        }
        let id = SessionId::generate();
        debug!(session = %id, exercise = %exercise_id, %kind, items = item_count.get(), "session started");

        Self {
            id,
            exercise_id,
            package_id,
            kind,
            item_count,
            item_order,
            lives_remaining: settings.lives(),
            settings,
            state: SessionState::Active,
            end_reason: None,
            started_at: now,
            ended_at: None,
            position: 0,
            outcomes: Vec::new(),
            skipped: Vec::new(),
            hints_used: 0,
            time_samples: Vec::new(),
            last_advance_at: now,
            elapsed: StdDuration::ZERO,
            completion: None,
            completion_taken: false,
        }
    }

    //
    // ─── TRANSITIONS ───────────────────────────────────────────────────────────
    //

    /// Record the presenter's verdict for the current item.
    ///
    /// A wrong answer costs a life when lives are enabled. Running out of
    /// lives aborts the session even on the last item.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Terminal` if the session already ended.
    pub fn submit_answer(
        &mut self,
        answer: Answer,
        is_correct: bool,
        now: DateTime<Utc>,
    ) -> Result<Transition, SessionError> {
        self.ensure_active()?;
        let item_index = self.item_order[self.position];
        self.record_sample(now);
        self.outcomes.push(ItemOutcome {
            item_index,
            answer,
            is_correct,
            answered_at: now,
        });

        if !is_correct {
            if let Some(lives) = self.lives_remaining.as_mut() {
                *lives = lives.saturating_sub(1);
                if *lives == 0 {
                    self.finish(SessionState::Aborted, EndReason::LivesExhausted, now);
                    return Ok(Transition::Aborted);
                }
            }
        }

        Ok(self.advance(now))
    }

    /// Skip the current item without recording an outcome.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Terminal` after the session ended,
    /// `SkipNotAllowed` for compound shapes, `SkipDisabled` when settings
    /// forbid skipping, and `SkipLimitReached` once the allowance is used.
    pub fn skip(&mut self, now: DateTime<Utc>) -> Result<Transition, SessionError> {
        self.ensure_active()?;
        if !self.kind.is_skippable() {
            return Err(SessionError::SkipNotAllowed { kind: self.kind });
        }
        if !self.settings.skip_enabled() {
            return Err(SessionError::SkipDisabled);
        }
        if let Some(max) = self.settings.max_skips() {
            if self.skipped_count() >= max as usize {
                return Err(SessionError::SkipLimitReached { max });
            }
        }

        let item_index = self.item_order[self.position];
        self.record_sample(now);
        self.skipped.push(item_index);
        Ok(self.advance(now))
    }

    /// Count a hint. Never moves the session.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Terminal` after the session ended and
    /// `HintLimitReached` once the allowance is used.
    pub fn use_hint(&mut self) -> Result<u32, SessionError> {
        self.ensure_active()?;
        if let Some(max) = self.settings.max_hints() {
            if self.hints_used >= max {
                return Err(SessionError::HintLimitReached { max });
            }
        }
        self.hints_used += 1;
        Ok(self.hints_used)
    }

    /// End the session now as Completed with whatever has accumulated.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Terminal` if the session already ended.
    pub fn force_complete(
        &mut self,
        reason: EndReason,
        now: DateTime<Utc>,
    ) -> Result<Transition, SessionError> {
        self.ensure_active()?;
        self.finish(SessionState::Completed, reason, now);
        Ok(Transition::Completed)
    }

    /// Advance the elapsed-time accumulator by one timer tick.
    ///
    /// Returns `Some(Transition::Completed)` when the tick used up the time
    /// limit.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Terminal` once the session ended; the timer
    /// driving this must stop.
    pub fn tick(
        &mut self,
        delta: StdDuration,
        now: DateTime<Utc>,
    ) -> Result<Option<Transition>, SessionError> {
        self.ensure_active()?;
        self.elapsed = self.elapsed.saturating_add(delta);
        if let Some(limit) = self.time_limit() {
            if self.elapsed >= limit {
                self.finish(SessionState::Completed, EndReason::TimeUp, now);
                return Ok(Some(Transition::Completed));
            }
        }
        Ok(None)
    }

    /// Hand out the completion record. Returns `Some` at most once per session.
    pub fn take_completion(&mut self) -> Option<CompletionRecord> {
        let record = self.completion.take();
        if record.is_some() {
            self.completion_taken = true;
        }
        record
    }

    fn ensure_active(&self) -> Result<(), SessionError> {
        if self.state.is_terminal() {
            debug!(session = %self.id, state = %self.state, "rejected operation on ended session");
            return Err(SessionError::Terminal { state: self.state });
        }
        Ok(())
    }

    fn record_sample(&mut self, now: DateTime<Utc>) {
        let sample = (now - self.last_advance_at).max(Duration::zero());
        self.time_samples.push(sample);
        self.last_advance_at = now;
    }

    fn advance(&mut self, now: DateTime<Utc>) -> Transition {
        if self.position + 1 >= self.item_count.get() {
            self.finish(SessionState::Completed, EndReason::Finished, now);
            Transition::Completed
        } else {
            self.position += 1;
            Transition::Advanced {
                position: self.position,
            }
        }
    }

    // Only reachable through `ensure_active`, so it runs once per session.
    fn finish(&mut self, state: SessionState, reason: EndReason, now: DateTime<Utc>) {
        let ended_at = now.max(self.started_at);
        self.state = state;
        self.end_reason = Some(reason);
        self.ended_at = Some(ended_at);

        let correct = scoring::correct_count(&self.outcomes);
        let result = CompletionResult {
            score_percentage: scoring::score_percentage(correct, self.outcomes.len()),
            time_spent_seconds: scoring::total_time_seconds(self.started_at, ended_at),
            completed_at: ended_at,
        };
        debug!(
            session = %self.id,
            %state,
            %reason,
            score = result.score_percentage,
            "session ended"
        );
        self.completion = Some(CompletionRecord {
            session_id: self.id,
            exercise_id: self.exercise_id.clone(),
            package_id: self.package_id.clone(),
            state,
            end_reason: reason,
            result,
        });
    }

    //
    // ─── ACCESSORS ─────────────────────────────────────────────────────────────
    //

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn exercise_id(&self) -> &ExerciseId {
        &self.exercise_id
    }

    #[must_use]
    pub fn package_id(&self) -> &PackageId {
        &self.package_id
    }

    #[must_use]
    pub fn kind(&self) -> ExerciseKind {
        self.kind
    }

    #[must_use]
    pub fn item_count(&self) -> usize {
        self.item_count.get()
    }

    #[must_use]
    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.state.is_terminal()
    }

    #[must_use]
    pub fn end_reason(&self) -> Option<EndReason> {
        self.end_reason
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    /// 0-based position in the presentation sequence.
    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }

    /// Content index of the item to present, `None` once the session ended.
    #[must_use]
    pub fn current_item_index(&self) -> Option<usize> {
        if self.is_active() {
            self.item_order.get(self.position).copied()
        } else {
            None
        }
    }

    /// Content indices in presentation order.
    #[must_use]
    pub fn item_order(&self) -> &[usize] {
        &self.item_order
    }

    #[must_use]
    pub fn lives_remaining(&self) -> Option<u32> {
        self.lives_remaining
    }

    #[must_use]
    pub fn outcomes(&self) -> &[ItemOutcome] {
        &self.outcomes
    }

    #[must_use]
    pub fn correct_count(&self) -> usize {
        scoring::correct_count(&self.outcomes)
    }

    #[must_use]
    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    /// Content indices of skipped items.
    #[must_use]
    pub fn skipped_items(&self) -> &[usize] {
        &self.skipped
    }

    #[must_use]
    pub fn hints_used(&self) -> u32 {
        self.hints_used
    }

    /// Per-item durations between successive advances.
    #[must_use]
    pub fn time_samples(&self) -> &[Duration] {
        &self.time_samples
    }

    /// Time accumulated by timer ticks.
    #[must_use]
    pub fn elapsed(&self) -> StdDuration {
        self.elapsed
    }

    #[must_use]
    pub fn time_limit(&self) -> Option<StdDuration> {
        self.settings.timer().and_then(|t| t.time_limit())
    }

    /// Countdown value for timed sessions.
    #[must_use]
    pub fn remaining_time(&self) -> Option<StdDuration> {
        self.time_limit()
            .map(|limit| limit.saturating_sub(self.elapsed))
    }

    /// True once the completion record has been handed out.
    #[must_use]
    pub fn completion_taken(&self) -> bool {
        self.completion_taken
    }

    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        let handled = self.outcomes.len() + self.skipped.len();
        SessionProgress {
            total: self.item_count(),
            position: self.position,
            answered: self.outcomes.len(),
            skipped: self.skipped.len(),
            remaining: self.item_count().saturating_sub(handled),
            lives_remaining: self.lives_remaining,
            state: self.state,
        }
    }

    /// Final statistics, available once the session ended.
    #[must_use]
    pub fn results(&self) -> Option<SessionResults> {
        scoring::summarize(self)
    }
}

impl fmt::Debug for ExerciseSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExerciseSession")
            .field("id", &self.id)
            .field("exercise_id", &self.exercise_id)
            .field("kind", &self.kind)
            .field("item_count", &self.item_count)
            .field("state", &self.state)
            .field("position", &self.position)
            .field("outcomes_len", &self.outcomes.len())
            .field("skipped_len", &self.skipped.len())
            .field("lives_remaining", &self.lives_remaining)
            .field("started_at", &self.started_at)
            .field("ended_at", &self.ended_at)
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::content::{ChoiceQuestion, MatchPair};
    use crate::model::{ExerciseContent, TimerSettings};
    use crate::time::fixed_now;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn multiple_choice(n: usize) -> Exercise {
        let questions = (0..n)
            .map(|i| ChoiceQuestion {
                prompt: format!("Q{i}"),
                options: vec!["a".into(), "b".into()],
                correct: [0].into_iter().collect(),
            })
            .collect();
        Exercise::new(
            ExerciseId::new("mc").unwrap(),
            PackageId::new("pkg").unwrap(),
            "Quiz",
            ExerciseContent::MultipleChoice { questions },
        )
    }

    fn matching() -> Exercise {
        Exercise::new(
            ExerciseId::new("match").unwrap(),
            PackageId::new("pkg").unwrap(),
            "Pairs",
            ExerciseContent::Matching {
                pairs: vec![MatchPair {
                    left: "one".into(),
                    right: "eins".into(),
                }],
            },
        )
    }

    fn pick(i: usize) -> Answer {
        Answer::Choices([i].into_iter().collect())
    }

    #[test]
    fn start_initializes_counters() {
        let session =
            ExerciseSession::start(&multiple_choice(3), SessionSettings::default(), fixed_now())
                .unwrap();
        assert_eq!(session.state(), SessionState::Active);
        assert_eq!(session.position(), 0);
        assert_eq!(session.current_item_index(), Some(0));
        assert_eq!(session.lives_remaining(), Some(3));
        assert_eq!(session.hints_used(), 0);
        assert!(session.ended_at().is_none());
    }

    #[test]
    fn zero_item_exercise_refuses_to_start() {
        let exercise = multiple_choice(0);
        let err =
            ExerciseSession::start(&exercise, SessionSettings::default(), fixed_now()).unwrap_err();
        assert!(matches!(err, SessionError::Content(_)));
    }

    #[test]
    fn answers_advance_then_complete() {
        let settings = SessionSettings::default().without_lives();
        let mut session =
            ExerciseSession::start(&multiple_choice(2), settings, fixed_now()).unwrap();

        let t = session.submit_answer(pick(0), true, fixed_now()).unwrap();
        assert_eq!(t, Transition::Advanced { position: 1 });
        let t = session.submit_answer(pick(1), false, fixed_now()).unwrap();
        assert_eq!(t, Transition::Completed);
        assert_eq!(session.end_reason(), Some(EndReason::Finished));
        assert_eq!(session.ended_at(), Some(fixed_now()));
        assert_eq!(session.lives_remaining(), None);
    }

    #[test]
    fn lives_exhaustion_on_last_item_aborts() {
        let settings = SessionSettings::default().with_lives(1).unwrap();
        let mut session =
            ExerciseSession::start(&multiple_choice(2), settings, fixed_now()).unwrap();
        session.submit_answer(pick(0), true, fixed_now()).unwrap();
        let t = session.submit_answer(pick(1), false, fixed_now()).unwrap();
        assert_eq!(t, Transition::Aborted);
        assert_eq!(session.state(), SessionState::Aborted);
        assert_eq!(session.outcomes().len(), 2);
    }

    #[test]
    fn terminal_session_rejects_everything() {
        let mut session =
            ExerciseSession::start(&multiple_choice(1), SessionSettings::default(), fixed_now())
                .unwrap();
        session.submit_answer(pick(0), true, fixed_now()).unwrap();

        let terminal = SessionError::Terminal {
            state: SessionState::Completed,
        };
        assert_eq!(
            session.submit_answer(pick(0), true, fixed_now()),
            Err(terminal.clone())
        );
        assert_eq!(session.skip(fixed_now()), Err(terminal.clone()));
        assert_eq!(session.use_hint(), Err(terminal.clone()));
        assert_eq!(
            session.force_complete(EndReason::StudentExit, fixed_now()),
            Err(terminal.clone())
        );
        assert_eq!(
            session.tick(StdDuration::from_secs(1), fixed_now()),
            Err(terminal)
        );
        assert_eq!(session.outcomes().len(), 1);
    }

    #[test]
    fn matching_cannot_be_skipped() {
        let mut session =
            ExerciseSession::start(&matching(), SessionSettings::default(), fixed_now()).unwrap();
        assert_eq!(
            session.skip(fixed_now()),
            Err(SessionError::SkipNotAllowed {
                kind: ExerciseKind::Matching
            })
        );
        assert!(session.is_active());
    }

    #[test]
    fn skip_allowance_is_enforced() {
        let settings = SessionSettings::default().with_max_skips(Some(1));
        let mut session =
            ExerciseSession::start(&multiple_choice(3), settings, fixed_now()).unwrap();
        session.skip(fixed_now()).unwrap();
        assert_eq!(
            session.skip(fixed_now()),
            Err(SessionError::SkipLimitReached { max: 1 })
        );
        assert_eq!(session.skipped_count(), 1);
        assert_eq!(session.position(), 1);
    }

    #[test]
    fn hints_do_not_move_the_session() {
        let settings = SessionSettings::default().with_max_hints(Some(2));
        let mut session =
            ExerciseSession::start(&multiple_choice(2), settings, fixed_now()).unwrap();
        assert_eq!(session.use_hint(), Ok(1));
        assert_eq!(session.use_hint(), Ok(2));
        assert_eq!(
            session.use_hint(),
            Err(SessionError::HintLimitReached { max: 2 })
        );
        assert_eq!(session.position(), 0);
        assert!(session.is_active());
    }

    #[test]
    fn completion_is_handed_out_once() {
        let mut session =
            ExerciseSession::start(&multiple_choice(3), SessionSettings::default(), fixed_now())
                .unwrap();
        assert!(session.take_completion().is_none());

        session
            .force_complete(EndReason::StudentExit, fixed_now() + Duration::seconds(12))
            .unwrap();
        let record = session.take_completion().unwrap();
        assert_eq!(record.state, SessionState::Completed);
        assert_eq!(record.end_reason, EndReason::StudentExit);
        assert_eq!(record.result.score_percentage, 0);
        assert_eq!(record.result.time_spent_seconds, 12);
        assert!(session.take_completion().is_none());
        assert!(session.completion_taken());
    }

    #[test]
    fn tick_hits_time_limit() {
        let timer = TimerSettings::with_limit_secs(Some(2)).unwrap();
        let settings = SessionSettings::default().with_timer(timer);
        let mut session =
            ExerciseSession::start(&multiple_choice(3), settings, fixed_now()).unwrap();

        assert_eq!(session.tick(StdDuration::from_secs(1), fixed_now()), Ok(None));
        assert_eq!(session.remaining_time(), Some(StdDuration::from_secs(1)));
        assert_eq!(
            session.tick(StdDuration::from_secs(1), fixed_now()),
            Ok(Some(Transition::Completed))
        );
        assert_eq!(session.end_reason(), Some(EndReason::TimeUp));
    }

    #[test]
    fn time_samples_follow_advances() {
        let settings = SessionSettings::default().without_lives();
        let mut session =
            ExerciseSession::start(&multiple_choice(3), settings, fixed_now()).unwrap();
        session
            .submit_answer(pick(0), true, fixed_now() + Duration::seconds(4))
            .unwrap();
        session.skip(fixed_now() + Duration::seconds(10)).unwrap();
        session
            .submit_answer(pick(0), true, fixed_now() + Duration::seconds(11))
            .unwrap();
        assert_eq!(
            session.time_samples(),
            &[Duration::seconds(4), Duration::seconds(6), Duration::seconds(1)]
        );
    }

    #[test]
    fn shuffled_order_is_a_permutation() {
        let settings = SessionSettings::default().with_shuffle_items(true);
        let mut rng = StdRng::seed_from_u64(7);
        let session =
            ExerciseSession::start_with_rng(&multiple_choice(6), settings, fixed_now(), &mut rng)
                .unwrap();
        let mut order = session.item_order().to_vec();
        order.sort_unstable();
        assert_eq!(order, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn outcomes_record_content_index_under_shuffle() {
        let settings = SessionSettings::default().with_shuffle_items(true);
        let mut rng = StdRng::seed_from_u64(11);
        let mut session =
            ExerciseSession::start_with_rng(&multiple_choice(4), settings, fixed_now(), &mut rng)
                .unwrap();
        let first = session.current_item_index().unwrap();
        session.submit_answer(pick(0), true, fixed_now()).unwrap();
        assert_eq!(session.outcomes()[0].item_index, first);
    }
}
