//! repute-engine - Stateful Reputation Engine
//!
//! The stateful half of the repute reputation engine: a SQLite-backed
//! score store with an append-only audit log, the scoring service that
//! orchestrates weight resolution, clamped adjustment, tiering, and policy
//! enforcement, and a best-effort batch processor.
//!
//! # Consistency model
//!
//! Every score mutation is one SQLite transaction spanning the score read,
//! the clamped score write, the global-score write, and the history
//! append. A failed call committed nothing and is safe to retry; a
//! successful call is fully visible. Adjustments against the same
//! (community, user) serialize at the storage layer, so concurrent events
//! never lose updates.
//!
//! # Modules
//!
//! - [`store`]: persisted score state, the event ledger, leaderboards, and
//!   policy/weight persistence
//! - [`service`]: the scoring core (`adjust`, queries, admin surface)
//! - [`batch`]: per-event-isolated batch processing

pub mod batch;
pub mod service;
pub mod store;

pub use batch::{BatchEventError, BatchProcessor, BatchResult};
pub use service::{AdjustResult, AtRiskUser, LeaderboardEntry, ReputationService, ScoreView};
pub use store::{
    AdjustmentWrite, AppliedAdjustment, GlobalScoreRecord, MANUAL_ADJUSTMENT_EVENT_TYPE,
    ReputationEvent, ScoreRecord, ScoreStore, SqliteScoreStore, StoreStats,
};
