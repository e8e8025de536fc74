//! Persistent score state and the append-only reputation event log.
//!
//! The store owns three kinds of state: per-(community, user) score
//! records, per-user global score records, and the immutable
//! `reputation_events` audit log. Its central contract is
//! [`ScoreStore::apply_adjustment`]: the score read, the clamped score
//! write, the global-score write, and the history append all happen inside
//! one transaction, so a crash can never leave a score change without its
//! audit row or vice versa, and concurrent adjustments to the same user
//! serialize without lost updates.
//!
//! Policy configurations and custom weight tables are also persisted here;
//! the store doubles as the [`CustomWeightSource`] behind the weight
//! resolver's cache.
//!
//! [`CustomWeightSource`]: repute_core::CustomWeightSource

mod sqlite;


use serde_json::{Map, Value};

pub use sqlite::SqliteScoreStore;

use repute_core::{CustomWeightTable, PolicyConfig, ReputationError};

/// Event type recorded for admin manual score overrides.
///
/// Not part of the submittable event-type set; it exists only in history
/// rows, marking out-of-band score changes with their audit reason.
pub const MANUAL_ADJUSTMENT_EVENT_TYPE: &str = "manualAdjustment";

/// A community-scoped score record.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreRecord {
    /// Community the score belongs to.
    pub community_id: String,
    /// Engine-level user identifier.
    pub user_id: String,
    /// Current score, clamped to the valid range.
    pub score: f64,
    /// Number of events that have mutated this record.
    pub total_events: u64,
    /// Timestamp of the most recent mutation, nanoseconds since epoch.
    pub last_event_at_ns: u64,
}

/// A cross-community global score record.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalScoreRecord {
    /// Engine-level user identifier.
    pub user_id: String,
    /// Current global score, clamped to the valid range.
    pub score: f64,
    /// Number of events that have mutated this record.
    pub total_events: u64,
    /// Timestamp of the most recent mutation, nanoseconds since epoch.
    pub last_event_at_ns: u64,
}

/// One row of the append-only audit log.
#[derive(Debug, Clone, PartialEq)]
pub struct ReputationEvent {
    /// Sequence ID assigned by the store on append.
    pub seq_id: u64,
    /// Community the event occurred in.
    pub community_id: String,
    /// Engine-level user identifier.
    pub user_id: String,
    /// Wire event type, or `manualAdjustment` for admin overrides.
    pub event_type: String,
    /// The delta actually applied, after clamping.
    pub score_change: f64,
    /// Score before the event.
    pub score_before: f64,
    /// Score after the event.
    pub score_after: f64,
    /// Audit reason; empty for ordinary behavioral events.
    pub reason: String,
    /// Event metadata as submitted.
    pub metadata: Map<String, Value>,
    /// When the row was written, nanoseconds since epoch.
    pub created_at_ns: u64,
}

/// An adjustment for the store to apply atomically.
#[derive(Debug, Clone)]
pub struct AdjustmentWrite {
    /// Community the event occurred in.
    pub community_id: String,
    /// Engine-level user identifier.
    pub user_id: String,
    /// Wire event type recorded in the history row.
    pub event_type: String,
    /// Nominal delta for the community score, before clamping.
    pub community_delta: f64,
    /// Nominal delta for the global score, before clamping. `None` skips
    /// the global update (moderation events excluded by configuration).
    pub global_delta: Option<f64>,
    /// Event metadata, preserved in the history row.
    pub metadata: Map<String, Value>,
}

/// The outcome of an atomically applied adjustment.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedAdjustment {
    /// Community score before the event (600 for a fresh record).
    pub score_before: f64,
    /// Community score after clamping.
    pub score_after: f64,
    /// The clamped delta; equals `score_after - score_before`.
    pub score_change: f64,
    /// Total events on the record after this one.
    pub total_events: u64,
    /// Global score after the event, if a global delta was applied.
    pub global_score_after: Option<f64>,
    /// Sequence ID of the history row this adjustment produced.
    pub event_seq_id: u64,
}

/// Aggregate store statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Total history rows.
    pub event_count: u64,
    /// Distinct (community, user) score records.
    pub score_count: u64,
    /// Distinct global score records.
    pub global_score_count: u64,
}

/// Storage contract for score state.
///
/// All methods map backend unavailability (locked database, poisoned lock,
/// I/O failure) to [`ReputationError::StorageUnavailable`], which callers
/// may safely retry because every mutation is a single commit unit.
pub trait ScoreStore: Send + Sync {
    /// Applies a behavioral adjustment: read-or-default, clamp, write
    /// score(s), append exactly one history row, all in one transaction.
    ///
    /// # Errors
    ///
    /// Returns [`ReputationError::StorageUnavailable`] on backend failure;
    /// nothing is applied in that case.
    fn apply_adjustment(&self, write: &AdjustmentWrite)
    -> Result<AppliedAdjustment, ReputationError>;

    /// Sets a user's community score to an explicit value with an audit
    /// reason, bypassing weight computation but still appending a history
    /// row in the same transaction.
    ///
    /// # Errors
    ///
    /// Returns [`ReputationError::StorageUnavailable`] on backend failure.
    fn set_score(
        &self,
        community_id: &str,
        user_id: &str,
        new_score: f64,
        reason: &str,
        set_by: &str,
    ) -> Result<AppliedAdjustment, ReputationError>;

    /// Fetches a community score record, if the user has one.
    ///
    /// # Errors
    ///
    /// Returns [`ReputationError::StorageUnavailable`] on backend failure.
    fn score(&self, community_id: &str, user_id: &str)
    -> Result<Option<ScoreRecord>, ReputationError>;

    /// Fetches a user's global score record, if one exists.
    ///
    /// # Errors
    ///
    /// Returns [`ReputationError::StorageUnavailable`] on backend failure.
    fn global_score(&self, user_id: &str) -> Result<Option<GlobalScoreRecord>, ReputationError>;

    /// Fetches a page of a user's event history, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`ReputationError::StorageUnavailable`] on backend failure.
    fn history(
        &self,
        community_id: &str,
        user_id: &str,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<ReputationEvent>, ReputationError>;

    /// Fetches a leaderboard page: score descending, ties broken by
    /// earliest `last_event_at_ns` (reaching the score first ranks higher).
    ///
    /// # Errors
    ///
    /// Returns [`ReputationError::StorageUnavailable`] on backend failure.
    fn leaderboard(
        &self,
        community_id: &str,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<ScoreRecord>, ReputationError>;

    /// Fetches all score records at or below `ceiling`, ascending.
    ///
    /// # Errors
    ///
    /// Returns [`ReputationError::StorageUnavailable`] on backend failure.
    fn scores_at_or_below(
        &self,
        community_id: &str,
        ceiling: f64,
    ) -> Result<Vec<ScoreRecord>, ReputationError>;

    /// Fetches a community's policy configuration, if set.
    ///
    /// # Errors
    ///
    /// Returns [`ReputationError::StorageUnavailable`] on backend failure.
    fn policy_config(&self, community_id: &str)
    -> Result<Option<PolicyConfig>, ReputationError>;

    /// Creates or replaces a community's policy configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ReputationError::StorageUnavailable`] on backend failure.
    fn upsert_policy_config(
        &self,
        community_id: &str,
        config: &PolicyConfig,
    ) -> Result<(), ReputationError>;

    /// Replaces a community's custom weight table wholesale.
    ///
    /// # Errors
    ///
    /// Returns [`ReputationError::StorageUnavailable`] on backend failure.
    fn replace_custom_weights(
        &self,
        table: &CustomWeightTable,
    ) -> Result<(), ReputationError>;

    /// Aggregate row counts.
    ///
    /// # Errors
    ///
    /// Returns [`ReputationError::StorageUnavailable`] on backend failure.
    fn stats(&self) -> Result<StoreStats, ReputationError>;
}
