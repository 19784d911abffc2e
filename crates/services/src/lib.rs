#![forbid(unsafe_code)]

pub mod app_services;
pub mod error;
pub mod http_reporter;
pub mod reporter;
pub mod sessions;

pub use practice_core::Clock;

pub use app_services::AppServices;
pub use error::{AppServicesError, LiveSessionError, ReportError};
pub use http_reporter::{HttpProgressReporter, HttpReporterConfig};
pub use reporter::{CompositeReporter, ProgressReporter, RepositoryReporter, ReportStatus};

pub use sessions::{
    ExerciseSessionService, ItemPresenter, LiveSession, PresenterAction, SessionStep,
    run_presenter,
};
