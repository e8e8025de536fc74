//! Auto-moderation policy evaluation.
//!
//! The enforcer is a pure decision function over a community's
//! [`PolicyConfig`] and a just-updated score. It decides; it never acts.
//! Executing a ban is the job of the [`ModerationExecutor`] collaborator,
//! which keeps the threshold logic independently testable from the act of
//! banning.

use serde::{Deserialize, Serialize};

use crate::error::ReputationError;
use crate::score::{SCORE_MAX, SCORE_MIN};

/// Default width of the at-risk buffer above the auto-ban threshold.
pub const DEFAULT_AT_RISK_BUFFER: i64 = 50;

/// Per-community auto-moderation policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Whether the auto-ban action fires at all.
    #[serde(default)]
    pub auto_ban_enabled: bool,

    /// Score at or below which an enabled policy bans.
    #[serde(default = "default_threshold")]
    pub auto_ban_threshold: i64,

    /// Width of the flagged ("at-risk") zone above the threshold.
    #[serde(default = "default_buffer")]
    pub at_risk_buffer: i64,
}

const fn default_threshold() -> i64 {
    SCORE_MIN as i64
}

const fn default_buffer() -> i64 {
    DEFAULT_AT_RISK_BUFFER
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            auto_ban_enabled: false,
            auto_ban_threshold: default_threshold(),
            at_risk_buffer: default_buffer(),
        }
    }
}

impl PolicyConfig {
    /// Validates the threshold range and buffer sign.
    ///
    /// # Errors
    ///
    /// Returns [`ReputationError::ScoreOutOfRange`] for a threshold outside
    /// `[300, 850]` and [`ReputationError::InvalidConfig`] for a negative
    /// buffer.
    pub fn validate(&self) -> Result<(), ReputationError> {
        if self.auto_ban_threshold < SCORE_MIN as i64 || self.auto_ban_threshold > SCORE_MAX as i64
        {
            return Err(ReputationError::ScoreOutOfRange {
                score: self.auto_ban_threshold,
            });
        }
        if self.at_risk_buffer < 0 {
            return Err(ReputationError::InvalidConfig {
                message: format!("at_risk_buffer must be >= 0, got {}", self.at_risk_buffer),
            });
        }
        Ok(())
    }

    /// Upper edge of the flagged zone (inclusive).
    #[must_use]
    pub const fn at_risk_ceiling(&self) -> i64 {
        self.auto_ban_threshold + self.at_risk_buffer
    }
}

/// Outcome of a policy evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyAction {
    /// Score is comfortably above the policy zone, or policy is disabled.
    None,
    /// Score is within the at-risk buffer above the threshold; candidate
    /// for the admin at-risk view.
    Flagged,
    /// Score is at or below the threshold; the caller should execute a ban.
    AutoBan,
}

/// Evaluates a community's policy against a just-updated score.
///
/// Pure function, no side effects: a disabled policy always returns
/// [`PolicyAction::None`], regardless of score.
#[must_use]
pub fn evaluate(config: &PolicyConfig, score: f64) -> PolicyAction {
    if !config.auto_ban_enabled {
        return PolicyAction::None;
    }
    if score <= config.auto_ban_threshold as f64 {
        PolicyAction::AutoBan
    } else if score <= config.at_risk_ceiling() as f64 {
        PolicyAction::Flagged
    } else {
        PolicyAction::None
    }
}

/// Executes moderation actions decided by policy evaluation.
///
/// Implemented by the platform moderation collaborator; the engine only
/// invokes it. Failures never fail the adjustment that triggered them.
pub trait ModerationExecutor: Send + Sync {
    /// Bans the user on the originating platform.
    ///
    /// # Errors
    ///
    /// Implementations surface their own transport failures; the engine
    /// logs them and carries on.
    fn execute_ban(
        &self,
        community_id: &str,
        user_id: &str,
        platform: &str,
        platform_user_id: &str,
        reason: &str,
    ) -> Result<(), ReputationError>;
}

/// A moderation executor that does nothing.
///
/// For tests and deployments where bans are executed by a separate
/// consumer of the policy decision.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopModerationExecutor;

impl ModerationExecutor for NoopModerationExecutor {
    fn execute_ban(
        &self,
        _community_id: &str,
        _user_id: &str,
        _platform: &str,
        _platform_user_id: &str,
        _reason: &str,
    ) -> Result<(), ReputationError> {
        Ok(())
    }
}
