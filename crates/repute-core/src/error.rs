//! Error taxonomy for the reputation engine.
//!
//! Every fallible operation in the engine surfaces one of these variants.
//! The taxonomy splits along two axes that callers care about:
//!
//! - **Client errors** ([`ReputationError::is_client_error`]): the request
//!   itself is malformed and retrying it unchanged will fail again. These
//!   map to 4xx at an API boundary.
//! - **Transient errors** ([`ReputationError::is_retryable`]): the storage
//!   layer was unavailable or timed out. Because every adjustment commits
//!   atomically (score, global score, and history in one transaction), a
//!   failed call left no partial state and the whole logical operation is
//!   safe to retry.
//!
//! `PremiumRequired` is authorization-shaped rather than a bug: the request
//! was well-formed but the community's billing status does not permit it.

use thiserror::Error;

use crate::score::{SCORE_MAX, SCORE_MIN};

/// Errors produced by the reputation engine.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReputationError {
    /// A required event field is missing or empty.
    #[error("invalid event: missing or empty field '{field}'")]
    InvalidEvent {
        /// Name of the offending field.
        field: &'static str,
    },

    /// The event type is not in the default weight table.
    ///
    /// The default table is the authoritative set of valid event types;
    /// custom weight tables may override values but never introduce types,
    /// so an unknown type fails even when a custom table defines it.
    #[error("unknown event type: '{event_type}'")]
    UnknownEventType {
        /// The unrecognized event type string.
        event_type: String,
    },

    /// Event metadata failed validation for its event type.
    ///
    /// Per-unit event types require a positive `units` value; silently
    /// treating a missing count as zero would mask a collector bug.
    #[error("invalid metadata for event type '{event_type}': {reason}")]
    InvalidEventMetadata {
        /// The event type whose metadata was rejected.
        event_type: String,
        /// Human-readable description of the problem.
        reason: String,
    },

    /// Weight customization requires a premium community.
    #[error("community '{community_id}' requires premium status for custom weights")]
    PremiumRequired {
        /// The non-premium community that attempted the update.
        community_id: String,
    },

    /// The storage layer is unavailable or timed out.
    ///
    /// Transient: the adjustment either committed fully or not at all, so
    /// retrying the whole call is safe.
    #[error("storage unavailable: {message}")]
    StorageUnavailable {
        /// Description of the underlying failure.
        message: String,
    },

    /// The batch exceeds the configured size cap.
    ///
    /// Rejected before any element is processed; no partial effects.
    #[error("batch of {size} events exceeds the maximum of {max}")]
    BatchTooLarge {
        /// Number of events submitted.
        size: usize,
        /// Configured maximum batch size.
        max: usize,
    },

    /// A manual score override was submitted without an audit reason.
    #[error("a non-empty reason is required for manual score adjustments")]
    MissingReason,

    /// A score or threshold falls outside the valid range.
    #[error("score {score} is outside the valid range [{SCORE_MIN}, {SCORE_MAX}]")]
    ScoreOutOfRange {
        /// The out-of-range value.
        score: i64,
    },

    /// Engine configuration failed validation or parsing.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the problem.
        message: String,
    },
}

impl ReputationError {
    /// Returns `true` for client input errors that must not be retried
    /// unchanged.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidEvent { .. }
                | Self::UnknownEventType { .. }
                | Self::InvalidEventMetadata { .. }
                | Self::BatchTooLarge { .. }
                | Self::MissingReason
                | Self::ScoreOutOfRange { .. }
                | Self::InvalidConfig { .. }
        )
    }

    /// Returns `true` for transient failures where retrying the whole
    /// logical operation is safe.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::StorageUnavailable { .. })
    }

    /// Stable machine-readable code for API surfaces and batch error
    /// reporting.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidEvent { .. } => "INVALID_EVENT",
            Self::UnknownEventType { .. } => "UNKNOWN_EVENT_TYPE",
            Self::InvalidEventMetadata { .. } => "INVALID_EVENT_METADATA",
            Self::PremiumRequired { .. } => "PREMIUM_REQUIRED",
            Self::StorageUnavailable { .. } => "STORAGE_UNAVAILABLE",
            Self::BatchTooLarge { .. } => "BATCH_TOO_LARGE",
            Self::MissingReason => "MISSING_REASON",
            Self::ScoreOutOfRange { .. } => "SCORE_OUT_OF_RANGE",
            Self::InvalidConfig { .. } => "INVALID_CONFIG",
        }
    }
}
