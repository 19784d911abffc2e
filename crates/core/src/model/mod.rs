pub mod content;
mod exercise;
mod ids;
mod settings;

pub use content::{Answer, ContentError, ExerciseContent, ExerciseItem, ExerciseKind};
pub use exercise::Exercise;
pub use ids::{ExerciseId, PackageId, ParseIdError, SessionId};
pub use settings::{
    SessionSettings, SessionSettingsDraft, SettingsError, TierThresholds, TimerSettings,
};
