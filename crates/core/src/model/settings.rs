use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SettingsError {
    #[error("initial lives must be > 0 when lives are enabled")]
    InvalidLives,

    #[error("timer tick interval must be > 0 ms")]
    InvalidTickInterval,

    #[error("time limit must be > 0 seconds")]
    InvalidTimeLimit,

    #[error("tier thresholds must satisfy 100 >= excellent > good > okay (got {excellent}/{good}/{okay})")]
    InvalidThresholds { excellent: u8, good: u8, okay: u8 },
}

//
// ─── TIER THRESHOLDS ───────────────────────────────────────────────────────────
//

/// Score breakpoints for performance tiers and star ratings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ThresholdsDraft", into = "ThresholdsDraft")]
pub struct TierThresholds {
    excellent: u8,
    good: u8,
    okay: u8,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct ThresholdsDraft {
    excellent: u8,
    good: u8,
    okay: u8,
}

impl TierThresholds {
    /// # Errors
    ///
    /// Returns `SettingsError::InvalidThresholds` unless `100 >= excellent > good > okay`.
    pub fn new(excellent: u8, good: u8, okay: u8) -> Result<Self, SettingsError> {
        if excellent > 100 || excellent <= good || good <= okay {
            return Err(SettingsError::InvalidThresholds {
                excellent,
                good,
                okay,
            });
        }
        Ok(Self {
            excellent,
            good,
            okay,
        })
    }

    #[must_use]
    pub fn excellent(&self) -> u8 {
        self.excellent
    }

    #[must_use]
    pub fn good(&self) -> u8 {
        self.good
    }

    #[must_use]
    pub fn okay(&self) -> u8 {
        self.okay
    }
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            excellent: 90,
            good: 70,
            okay: 50,
        }
    }
}

impl TryFrom<ThresholdsDraft> for TierThresholds {
    type Error = SettingsError;

    fn try_from(d: ThresholdsDraft) -> Result<Self, Self::Error> {
        Self::new(d.excellent, d.good, d.okay)
    }
}

impl From<TierThresholds> for ThresholdsDraft {
    fn from(t: TierThresholds) -> Self {
        Self {
            excellent: t.excellent,
            good: t.good,
            okay: t.okay,
        }
    }
}

//
// ─── TIMER ─────────────────────────────────────────────────────────────────────
//

/// Countdown/elapsed timer configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TimerDraft", into = "TimerDraft")]
pub struct TimerSettings {
    tick_interval_ms: u64,
    time_limit_secs: Option<u64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct TimerDraft {
    #[serde(default = "default_tick_ms")]
    tick_interval_ms: u64,
    #[serde(default)]
    time_limit_secs: Option<u64>,
}

fn default_tick_ms() -> u64 {
    TimerSettings::DEFAULT_TICK_MS
}

impl TryFrom<TimerDraft> for TimerSettings {
    type Error = SettingsError;

    fn try_from(d: TimerDraft) -> Result<Self, Self::Error> {
        Self::new(d.tick_interval_ms, d.time_limit_secs)
    }
}

impl From<TimerSettings> for TimerDraft {
    fn from(t: TimerSettings) -> Self {
        Self {
            tick_interval_ms: t.tick_interval_ms,
            time_limit_secs: t.time_limit_secs,
        }
    }
}

impl TimerSettings {
    pub const DEFAULT_TICK_MS: u64 = 1_000;

    /// # Errors
    ///
    /// Returns `SettingsError` if the tick interval or time limit is zero.
    pub fn new(tick_interval_ms: u64, time_limit_secs: Option<u64>) -> Result<Self, SettingsError> {
        if tick_interval_ms == 0 {
            return Err(SettingsError::InvalidTickInterval);
        }
        if time_limit_secs == Some(0) {
            return Err(SettingsError::InvalidTimeLimit);
        }
        Ok(Self {
            tick_interval_ms,
            time_limit_secs,
        })
    }

    /// One-second ticks with an optional limit.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::InvalidTimeLimit` for a zero limit.
    pub fn with_limit_secs(time_limit_secs: Option<u64>) -> Result<Self, SettingsError> {
        Self::new(Self::DEFAULT_TICK_MS, time_limit_secs)
    }

    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    #[must_use]
    pub fn time_limit(&self) -> Option<Duration> {
        self.time_limit_secs.map(Duration::from_secs)
    }
}

//
// ─── SESSION SETTINGS ──────────────────────────────────────────────────────────
//

/// Game mechanics applied to a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SessionSettingsDraft", into = "SessionSettingsDraft")]
pub struct SessionSettings {
    lives: Option<u32>,
    timer: Option<TimerSettings>,
    skip_enabled: bool,
    max_skips: Option<u32>,
    max_hints: Option<u32>,
    shuffle_items: bool,
    thresholds: TierThresholds,
}

/// Unvalidated settings as read from configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettingsDraft {
    pub lives_enabled: bool,
    pub initial_lives: u32,
    pub timer: Option<TimerSettings>,
    pub skip_enabled: bool,
    pub max_skips: Option<u32>,
    pub max_hints: Option<u32>,
    pub shuffle_items: bool,
    pub thresholds: TierThresholds,
}

impl Default for SessionSettingsDraft {
    fn default() -> Self {
        SessionSettings::default().into()
    }
}

impl SessionSettings {
    pub const DEFAULT_LIVES: u32 = 3;

    /// Validate a draft into settings.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::InvalidLives` if lives are enabled with zero lives.
    pub fn from_draft(draft: SessionSettingsDraft) -> Result<Self, SettingsError> {
        let lives = if draft.lives_enabled {
            if draft.initial_lives == 0 {
                return Err(SettingsError::InvalidLives);
            }
            Some(draft.initial_lives)
        } else {
            None
        };
        Ok(Self {
            lives,
            timer: draft.timer,
            skip_enabled: draft.skip_enabled,
            max_skips: draft.max_skips,
            max_hints: draft.max_hints,
            shuffle_items: draft.shuffle_items,
            thresholds: draft.thresholds,
        })
    }

    /// Enable lives with the given pool size.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::InvalidLives` for zero.
    pub fn with_lives(mut self, lives: u32) -> Result<Self, SettingsError> {
        if lives == 0 {
            return Err(SettingsError::InvalidLives);
        }
        self.lives = Some(lives);
        Ok(self)
    }

    #[must_use]
    pub fn without_lives(mut self) -> Self {
        self.lives = None;
        self
    }

    #[must_use]
    pub fn with_timer(mut self, timer: TimerSettings) -> Self {
        self.timer = Some(timer);
        self
    }

    #[must_use]
    pub fn with_skip_enabled(mut self, enabled: bool) -> Self {
        self.skip_enabled = enabled;
        self
    }

    #[must_use]
    pub fn with_max_skips(mut self, max: Option<u32>) -> Self {
        self.max_skips = max;
        self
    }

    #[must_use]
    pub fn with_max_hints(mut self, max: Option<u32>) -> Self {
        self.max_hints = max;
        self
    }

    #[must_use]
    pub fn with_shuffle_items(mut self, shuffle: bool) -> Self {
        self.shuffle_items = shuffle;
        self
    }

    #[must_use]
    pub fn with_thresholds(mut self, thresholds: TierThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    // Accessors

    /// Initial lives, or `None` when the lives feature is off.
    #[must_use]
    pub fn lives(&self) -> Option<u32> {
        self.lives
    }

    #[must_use]
    pub fn timer(&self) -> Option<TimerSettings> {
        self.timer
    }

    #[must_use]
    pub fn skip_enabled(&self) -> bool {
        self.skip_enabled
    }

    #[must_use]
    pub fn max_skips(&self) -> Option<u32> {
        self.max_skips
    }

    #[must_use]
    pub fn max_hints(&self) -> Option<u32> {
        self.max_hints
    }

    #[must_use]
    pub fn shuffle_items(&self) -> bool {
        self.shuffle_items
    }

    #[must_use]
    pub fn thresholds(&self) -> &TierThresholds {
        &self.thresholds
    }
}

impl Default for SessionSettings {
    /// Three lives, no timer, skipping allowed, no hint or skip caps.
    fn default() -> Self {
        Self {
            lives: Some(Self::DEFAULT_LIVES),
            timer: None,
            skip_enabled: true,
            max_skips: None,
            max_hints: None,
            shuffle_items: false,
            thresholds: TierThresholds::default(),
        }
    }
}

impl TryFrom<SessionSettingsDraft> for SessionSettings {
    type Error = SettingsError;

    fn try_from(draft: SessionSettingsDraft) -> Result<Self, Self::Error> {
        Self::from_draft(draft)
    }
}

impl From<SessionSettings> for SessionSettingsDraft {
    fn from(s: SessionSettings) -> Self {
        Self {
            lives_enabled: s.lives.is_some(),
            initial_lives: s.lives.unwrap_or(SessionSettings::DEFAULT_LIVES),
            timer: s.timer,
            skip_enabled: s.skip_enabled,
            max_skips: s.max_skips,
            max_hints: s.max_hints,
            shuffle_items: s.shuffle_items,
            thresholds: s.thresholds,
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
