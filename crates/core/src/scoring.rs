//! Score, time and performance summaries for finished sessions.
//!
//! Every function here is pure. Rounding is half-up on integers.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::TierThresholds;
use crate::session::{EndReason, ExerciseSession, ItemOutcome, SessionState};

//
// ─── PERFORMANCE TIER ──────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PerformanceTier {
    Excellent,
    Good,
    Okay,
    NeedsImprovement,
}

impl PerformanceTier {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            PerformanceTier::Excellent => "excellent",
            PerformanceTier::Good => "good",
            PerformanceTier::Okay => "okay",
            PerformanceTier::NeedsImprovement => "needs-improvement",
        }
    }

    /// Star count shown for this tier (3 down to 0).
    #[must_use]
    pub fn stars(self) -> u8 {
        match self {
            PerformanceTier::Excellent => 3,
            PerformanceTier::Good => 2,
            PerformanceTier::Okay => 1,
            PerformanceTier::NeedsImprovement => 0,
        }
    }
}

impl fmt::Display for PerformanceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//
// ─── PURE HELPERS ──────────────────────────────────────────────────────────────
//

#[must_use]
pub fn correct_count(outcomes: &[ItemOutcome]) -> usize {
    outcomes.iter().filter(|o| o.is_correct).count()
}

/// `round(100 * correct / max(1, answered))`, clamped to 0..=100.
///
/// Skipped items are not part of `answered`, so they never count against
/// the score.
#[must_use]
pub fn score_percentage(correct: usize, answered: usize) -> u8 {
    let answered = answered.max(1) as u64;
    let correct = (correct as u64).min(answered);
    let pct = (200 * correct + answered) / (2 * answered);
    u8::try_from(pct.min(100)).unwrap_or(100)
}

fn non_negative_millis(d: Duration) -> u64 {
    u64::try_from(d.num_milliseconds()).unwrap_or(0)
}

/// Whole seconds between start and end, rounded; never negative.
#[must_use]
pub fn total_time_seconds(started_at: DateTime<Utc>, ended_at: DateTime<Utc>) -> u64 {
    let ms = non_negative_millis(ended_at - started_at);
    (ms + 500) / 1000
}

/// Mean of the per-item samples in whole seconds, or 0 without samples.
#[must_use]
pub fn average_time_per_item_seconds(samples: &[Duration]) -> u64 {
    if samples.is_empty() {
        return 0;
    }
    let total_ms = samples
        .iter()
        .map(|d| non_negative_millis(*d))
        .fold(0u64, u64::saturating_add);
    let n = samples.len() as u64;
    total_ms.saturating_mul(2).saturating_add(1000 * n) / (2000 * n)
}

#[must_use]
pub fn performance_tier(score: u8, thresholds: &TierThresholds) -> PerformanceTier {
    if score >= thresholds.excellent() {
        PerformanceTier::Excellent
    } else if score >= thresholds.good() {
        PerformanceTier::Good
    } else if score >= thresholds.okay() {
        PerformanceTier::Okay
    } else {
        PerformanceTier::NeedsImprovement
    }
}

#[must_use]
pub fn star_rating(score: u8, thresholds: &TierThresholds) -> u8 {
    performance_tier(score, thresholds).stars()
}

//
// ─── SESSION SUMMARY ───────────────────────────────────────────────────────────
//

/// Results screen data for an ended session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionResults {
    pub state: SessionState,
    pub end_reason: EndReason,
    pub total_items: usize,
    pub answered: usize,
    pub correct: usize,
    pub skipped: usize,
    pub hints_used: u32,
    pub score_percentage: u8,
    pub total_time_seconds: u64,
    pub average_time_per_item_seconds: u64,
    pub tier: PerformanceTier,
    pub stars: u8,
    pub lives_remaining: Option<u32>,
}

/// Summarize `session`, or `None` while it is still active.
#[must_use]
pub fn summarize(session: &ExerciseSession) -> Option<SessionResults> {
    let end_reason = session.end_reason()?;
    let ended_at = session.ended_at()?;

    let answered = session.outcomes().len();
    let correct = correct_count(session.outcomes());
    let score = score_percentage(correct, answered);
    let tier = performance_tier(score, session.settings().thresholds());

    Some(SessionResults {
        state: session.state(),
        end_reason,
        total_items: session.item_count(),
        answered,
        correct,
        skipped: session.skipped_count(),
        hints_used: session.hints_used(),
        score_percentage: score,
        total_time_seconds: total_time_seconds(session.started_at(), ended_at),
        average_time_per_item_seconds: average_time_per_item_seconds(session.time_samples()),
        tier,
        stars: tier.stars(),
        lives_remaining: session.lives_remaining(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn score_rounds_half_up() {
        assert_eq!(score_percentage(3, 4), 75);
        assert_eq!(score_percentage(2, 3), 67);
        assert_eq!(score_percentage(1, 3), 33);
        assert_eq!(score_percentage(1, 8), 13);
        assert_eq!(score_percentage(0, 0), 0);
        assert_eq!(score_percentage(5, 5), 100);
    }

    #[test]
    fn tiers_follow_thresholds() {
        let t = TierThresholds::default();
        assert_eq!(performance_tier(90, &t), PerformanceTier::Excellent);
        assert_eq!(performance_tier(89, &t), PerformanceTier::Good);
        assert_eq!(performance_tier(70, &t), PerformanceTier::Good);
        assert_eq!(performance_tier(50, &t), PerformanceTier::Okay);
        assert_eq!(performance_tier(49, &t), PerformanceTier::NeedsImprovement);
        assert_eq!(star_rating(100, &t), 3);
        assert_eq!(star_rating(0, &t), 0);
    }

    #[test]
    fn custom_thresholds_move_the_bands() {
        let t = TierThresholds::new(80, 60, 40).unwrap();
        assert_eq!(performance_tier(80, &t), PerformanceTier::Excellent);
        assert_eq!(performance_tier(45, &t), PerformanceTier::Okay);
    }

    #[test]
    fn total_time_rounds_and_clamps() {
        let start = fixed_now();
        assert_eq!(total_time_seconds(start, start + Duration::milliseconds(1499)), 1);
        assert_eq!(total_time_seconds(start, start + Duration::milliseconds(1500)), 2);
        assert_eq!(total_time_seconds(start, start - Duration::seconds(5)), 0);
    }

    #[test]
    fn average_time_handles_empty_and_rounds() {
        assert_eq!(average_time_per_item_seconds(&[]), 0);
        let samples = [Duration::seconds(4), Duration::seconds(5)];
        assert_eq!(average_time_per_item_seconds(&samples), 5);
        let samples = [Duration::seconds(4), Duration::seconds(4), Duration::seconds(5)];
        assert_eq!(average_time_per_item_seconds(&samples), 4);
    }

    #[test]
    fn tier_serializes_kebab_case() {
        let json = serde_json::to_string(&PerformanceTier::NeedsImprovement).unwrap();
        assert_eq!(json, "\"needs-improvement\"");
    }
}
