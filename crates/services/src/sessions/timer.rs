use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use practice_core::Clock;
use practice_core::session::ExerciseSession;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::debug;

use crate::reporter::{ProgressReporter, deliver};

/// Background task feeding timer ticks into a session.
///
/// The task ends on its own once the session is terminal and is aborted when
/// the handle is stopped or dropped.
pub struct SessionTimer {
    handle: JoinHandle<()>,
    stopped: AtomicBool,
}

impl SessionTimer {
    pub(crate) fn spawn(
        session: Arc<Mutex<ExerciseSession>>,
        period: Duration,
        clock: Clock,
        reporter: Arc<dyn ProgressReporter>,
    ) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticks = interval_at(Instant::now() + period, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticks.tick().await;
                let completion = {
                    let mut guard = session.lock().await;
                    match guard.tick(period, clock.now()) {
                        Ok(None) => continue,
                        Ok(Some(_)) => guard.take_completion(),
                        Err(_) => None,
                    }
                };
                if let Some(record) = completion {
                    debug!(session = %record.session_id, "time limit reached");
                    deliver(reporter.as_ref(), &record).await;
                }
                break;
            }
        });
        Self {
            handle,
            stopped: AtomicBool::new(false),
        }
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.handle.abort();
    }

    /// Wait for the task to end, whether it finished or was stopped.
    pub async fn join(&mut self) {
        let _ = (&mut self.handle).await;
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.stopped.load(Ordering::SeqCst) && !self.handle.is_finished()
    }
}

impl Drop for SessionTimer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
