use async_trait::async_trait;
use practice_core::model::{Answer, Exercise, ExerciseItem};
use practice_core::scoring::SessionResults;
use practice_core::session::{SessionError, SessionProgress};
use tracing::warn;

use super::live::LiveSession;
use crate::error::LiveSessionError;

/// What the student did with the presented item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenterAction {
    /// A submitted answer together with the presenter's verdict.
    Answer { answer: Answer, is_correct: bool },
    Skip,
    Hint,
    Exit,
}

/// Renders one item at a time and collects the student's action.
///
/// Implementations usually `match` on the `ExerciseItem` variant to pick a
/// rendering; `ExerciseItem::judge` is available for the verdict.
#[async_trait]
pub trait ItemPresenter: Send {
    async fn present(
        &mut self,
        item: ExerciseItem<'_>,
        progress: &SessionProgress,
    ) -> PresenterAction;

    /// Called after a hint was granted.
    async fn show_hint(&mut self, _item: ExerciseItem<'_>, _hints_used: u32) {}

    /// Called when the session refused an action, e.g. skipping a matching item.
    async fn rejected(&mut self, _error: &SessionError) {}
}

/// Drive `live` with `presenter` until the session ends.
///
/// Returns the final results, or `None` if the session is somehow still
/// active when the loop stops.
///
/// # Errors
///
/// Returns `LiveSessionError::ExerciseMismatch` if `exercise` is not the one
/// the session was started on, and `MissingItem` if the session points at an
/// index the exercise does not have.
pub async fn run_presenter<P>(
    live: &LiveSession,
    exercise: &Exercise,
    presenter: &mut P,
) -> Result<Option<SessionResults>, LiveSessionError>
where
    P: ItemPresenter + ?Sized,
{
    let session_exercise = live.inspect(|s| s.exercise_id().clone()).await;
    if session_exercise != exercise.id {
        return Err(LiveSessionError::ExerciseMismatch {
            expected: session_exercise,
            actual: exercise.id.clone(),
        });
    }

    while let Some((index, progress)) = live.current().await {
        let item = exercise
            .item(index)
            .ok_or(LiveSessionError::MissingItem { index })?;

        let outcome = match presenter.present(item, &progress).await {
            PresenterAction::Answer { answer, is_correct } => {
                live.submit_answer(answer, is_correct).await.map(drop)
            }
            PresenterAction::Skip => live.skip().await.map(drop),
            PresenterAction::Hint => match live.use_hint().await {
                Ok(used) => {
                    presenter.show_hint(item, used).await;
                    Ok(())
                }
                Err(err) => Err(err),
            },
            PresenterAction::Exit => live.exit().await.map(drop),
        };

        match outcome {
            Ok(()) => {}
            // The timer ended the session while the presenter was waiting.
            Err(LiveSessionError::Session(SessionError::Terminal { .. })) => break,
            Err(LiveSessionError::Session(err)) => {
                warn!(error = %err, "presenter action rejected");
                presenter.rejected(&err).await;
            }
            Err(err) => return Err(err),
        }
    }

    Ok(live.results().await)
}
