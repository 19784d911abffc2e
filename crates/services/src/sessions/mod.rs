mod live;
mod presenter;
mod timer;
mod workflow;

// Public API of the session subsystem.
pub use live::LiveSession;
pub use presenter::{ItemPresenter, PresenterAction, run_presenter};
pub use timer::SessionTimer;
pub use workflow::{ExerciseSessionService, SessionStep};
