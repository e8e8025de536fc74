//! Score tiers.
//!
//! A tier is a derived display band over the score range, never persisted.
//! The five bands partition `[300, 850]` with no gaps, and integer
//! boundaries are inclusive on both ends of each band (a score of exactly
//! 800 is `Exceptional`, 799 is `VeryGood`). Anywhere a tier is shown it is
//! recomputed from the score through this one function.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::score::{SCORE_MAX, SCORE_MIN};

/// Display band for a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Scores in `[800, 850]`.
    Exceptional,
    /// Scores in `[740, 799]`.
    VeryGood,
    /// Scores in `[670, 739]`.
    Good,
    /// Scores in `[580, 669]`.
    Fair,
    /// Scores in `[300, 579]`.
    Poor,
}

/// Inclusive integer band boundaries, highest tier first.
///
/// Exposed as read-only reference data so display surfaces can render the
/// band table without hardcoding it.
pub const TIER_BOUNDARIES: &[(Tier, i64, i64)] = &[
    (Tier::Exceptional, 800, 850),
    (Tier::VeryGood, 740, 799),
    (Tier::Good, 670, 739),
    (Tier::Fair, 580, 669),
    (Tier::Poor, 300, 579),
];

impl Tier {
    /// Computes the tier for a score.
    ///
    /// The input is clamped into `[300, 850]` first, so any stored score
    /// maps to exactly one tier. Fractional scores fall into the band of
    /// their containing half-open interval, which agrees with the inclusive
    /// integer boundaries at every whole number.
    #[must_use]
    pub fn for_score(score: f64) -> Self {
        let score = score.clamp(SCORE_MIN, SCORE_MAX);
        if score >= 800.0 {
            Self::Exceptional
        } else if score >= 740.0 {
            Self::VeryGood
        } else if score >= 670.0 {
            Self::Good
        } else if score >= 580.0 {
            Self::Fair
        } else {
            Self::Poor
        }
    }

    /// Returns the snake_case name used on API surfaces.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Exceptional => "exceptional",
            Self::VeryGood => "very_good",
            Self::Good => "good",
            Self::Fair => "fair",
            Self::Poor => "poor",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
