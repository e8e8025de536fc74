//! Score range constants and clamping.
//!
//! Scores are FICO-like: bounded to `[300, 850]` with a default of 600 for
//! users that have never produced an event. Clamping is saturating, never
//! wrapping: an event that would push a score past a boundary simply stops
//! at the boundary, and the recorded delta is the clamped one.
//!
//! Scores are carried as `f64` so that fractional weights (a chat message is
//! worth +0.01) accrue instead of vanishing under integer rounding. Display
//! surfaces round; the stored value is authoritative.

/// Lowest possible score.
pub const SCORE_MIN: f64 = 300.0;

/// Highest possible score.
pub const SCORE_MAX: f64 = 850.0;

/// Score assigned to a (community, user) pair on its first event.
pub const SCORE_DEFAULT: f64 = 600.0;

/// Saturates `score` into `[SCORE_MIN, SCORE_MAX]`.
#[must_use]
pub fn clamp_score(score: f64) -> f64 {
    score.clamp(SCORE_MIN, SCORE_MAX)
}

/// Applies `delta` to `current` with saturating clamping.
///
/// Returns `(new_score, applied_delta)`. The applied delta is what actually
/// happened to the score after clamping, which is what history rows must
/// record; it differs from the nominal delta whenever a boundary was hit.
#[must_use]
pub fn apply_delta(current: f64, delta: f64) -> (f64, f64) {
    let new_score = clamp_score(current + delta);
    (new_score, new_score - current)
}
