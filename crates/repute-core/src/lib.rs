//! repute-core - Reputation Engine Domain Logic
//!
//! This crate holds the pure domain logic of the repute reputation engine:
//! converting per-user behavioral events from chat/streaming platforms into
//! a bounded, FICO-like trust score and an auto-moderation decision.
//!
//! Everything here is deterministic and storage-free; the stateful engine
//! (SQLite score store, service orchestration, batching) lives in
//! `repute-engine`.
//!
//! # Modules
//!
//! - [`event`]: the closed event-type set, raw event validation, and the
//!   typed magnitude for per-unit events
//! - [`weight`]: default and custom weight tables, plus the TTL-cached
//!   per-community [`weight::WeightResolver`]
//! - [`score`]: score range constants and saturating clamping
//! - [`tier`]: the five-band tier partition over the score range
//! - [`policy`]: the pure auto-ban/at-risk decision function and the
//!   moderation collaborator trait
//! - [`config`]: TOML engine configuration with fail-closed validation
//! - [`error`]: the engine-wide error taxonomy

pub mod config;
pub mod error;
pub mod event;
pub mod policy;
pub mod score;
pub mod tier;
pub mod weight;

pub use config::EngineConfig;
pub use error::ReputationError;
pub use event::{EventMagnitude, EventType, IncomingEvent, ValidatedEvent};
pub use policy::{ModerationExecutor, NoopModerationExecutor, PolicyAction, PolicyConfig};
pub use score::{SCORE_DEFAULT, SCORE_MAX, SCORE_MIN, apply_delta, clamp_score};
pub use tier::{TIER_BOUNDARIES, Tier};
pub use weight::{
    CustomWeightSource, CustomWeightTable, NoPremium, PremiumLookup, WeightResolver,
    default_weight, default_weight_table,
};
