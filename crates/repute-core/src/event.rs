//! Behavioral event model and validation.
//!
//! Collectors on each chat platform submit raw [`IncomingEvent`]s carrying a
//! string event type and a free-form JSON metadata map. Validation turns a
//! raw event into a [`ValidatedEvent`] whose [`EventMagnitude`] statically
//! carries the unit count for per-unit event types, so downstream code never
//! reaches back into the metadata map for it.
//!
//! The set of valid event types is closed: [`EventType`] is the authoritative
//! list, and parsing any other string fails with
//! [`ReputationError::UnknownEventType`]. A zero-weight event silently
//! succeeding would mask a configuration bug, so unknown types are rejected,
//! never defaulted.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ReputationError;

/// The closed set of behavioral event types the engine scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum EventType {
    /// A chat message was sent.
    ChatMessage,
    /// A bot command was invoked.
    CommandUsage,
    /// The user entered a giveaway.
    GiveawayEntry,
    /// The user followed the channel.
    Follow,
    /// A tier-1 subscription.
    Subscription,
    /// A tier-2 subscription.
    SubscriptionTier2,
    /// A tier-3 subscription.
    SubscriptionTier3,
    /// The user gifted a subscription to someone else.
    GiftSubscription,
    /// A donation; scored per dollar via `units` metadata.
    DonationPerDollar,
    /// A cheer; scored per 100 bits via `units` metadata.
    CheerPer100Bits,
    /// The user raided the channel.
    Raid,
    /// The user boosted the community.
    Boost,
    /// A moderator warned the user.
    Warn,
    /// A moderator timed the user out.
    Timeout,
    /// A moderator kicked the user.
    Kick,
    /// A moderator banned the user.
    Ban,
}

impl EventType {
    /// Returns all event types, in default-weight-table order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::ChatMessage,
            Self::CommandUsage,
            Self::GiveawayEntry,
            Self::Follow,
            Self::Subscription,
            Self::SubscriptionTier2,
            Self::SubscriptionTier3,
            Self::GiftSubscription,
            Self::DonationPerDollar,
            Self::CheerPer100Bits,
            Self::Raid,
            Self::Boost,
            Self::Warn,
            Self::Timeout,
            Self::Kick,
            Self::Ban,
        ]
    }

    /// Returns the wire representation used by collectors and stored in
    /// history rows.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ChatMessage => "chatMessage",
            Self::CommandUsage => "commandUsage",
            Self::GiveawayEntry => "giveawayEntry",
            Self::Follow => "follow",
            Self::Subscription => "subscription",
            Self::SubscriptionTier2 => "subscriptionTier2",
            Self::SubscriptionTier3 => "subscriptionTier3",
            Self::GiftSubscription => "giftSubscription",
            Self::DonationPerDollar => "donationPerDollar",
            Self::CheerPer100Bits => "cheerPer100Bits",
            Self::Raid => "raid",
            Self::Boost => "boost",
            Self::Warn => "warn",
            Self::Timeout => "timeout",
            Self::Kick => "kick",
            Self::Ban => "ban",
        }
    }

    /// Returns `true` for event types whose delta scales with a unit count
    /// from metadata (dollars donated, bits cheered).
    #[must_use]
    pub const fn is_per_unit(&self) -> bool {
        matches!(self, Self::DonationPerDollar | Self::CheerPer100Bits)
    }

    /// Returns `true` for moderation-action event types.
    ///
    /// Moderation events may be excluded from the cross-community global
    /// score, since one community's moderation judgment does not necessarily
    /// reflect cross-community trust.
    #[must_use]
    pub const fn is_moderation(&self) -> bool {
        matches!(self, Self::Warn | Self::Timeout | Self::Kick | Self::Ban)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EventType {
    type Err = ReputationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .find(|t| t.as_str() == s)
            .copied()
            .ok_or_else(|| ReputationError::UnknownEventType {
                event_type: s.to_string(),
            })
    }
}

/// A raw event as submitted by a platform collector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingEvent {
    /// Community the event occurred in.
    pub community_id: String,

    /// Engine-level user identifier.
    pub user_id: String,

    /// Originating platform name (e.g. "twitch", "discord").
    pub platform: String,

    /// The user's identifier on the originating platform.
    pub platform_user_id: String,

    /// Wire event type string; must parse to an [`EventType`].
    pub event_type: String,

    /// Free-form event metadata. Per-unit event types require a positive
    /// numeric `units` entry.
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl IncomingEvent {
    /// Creates an event with empty metadata.
    #[must_use]
    pub fn new(
        community_id: impl Into<String>,
        user_id: impl Into<String>,
        platform: impl Into<String>,
        platform_user_id: impl Into<String>,
        event_type: impl Into<String>,
    ) -> Self {
        Self {
            community_id: community_id.into(),
            user_id: user_id.into(),
            platform: platform.into(),
            platform_user_id: platform_user_id.into(),
            event_type: event_type.into(),
            metadata: Map::new(),
        }
    }

    /// Attaches a metadata entry (builder pattern).
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Validates the event into its typed form.
    ///
    /// # Errors
    ///
    /// - [`ReputationError::InvalidEvent`] if `community_id` or `user_id`
    ///   is empty.
    /// - [`ReputationError::UnknownEventType`] if `event_type` is not in
    ///   the default table.
    /// - [`ReputationError::InvalidEventMetadata`] if a per-unit type is
    ///   missing a positive `units` value.
    pub fn validate(&self) -> Result<ValidatedEvent, ReputationError> {
        if self.community_id.trim().is_empty() {
            return Err(ReputationError::InvalidEvent {
                field: "community_id",
            });
        }
        if self.user_id.trim().is_empty() {
            return Err(ReputationError::InvalidEvent { field: "user_id" });
        }

        let event_type: EventType = self.event_type.parse()?;
        let magnitude = if event_type.is_per_unit() {
            let units = self
                .metadata
                .get("units")
                .and_then(Value::as_f64)
                .ok_or_else(|| ReputationError::InvalidEventMetadata {
                    event_type: event_type.to_string(),
                    reason: "missing numeric 'units' value".to_string(),
                })?;
            if !units.is_finite() || units <= 0.0 {
                return Err(ReputationError::InvalidEventMetadata {
                    event_type: event_type.to_string(),
                    reason: format!("'units' must be positive, got {units}"),
                });
            }
            EventMagnitude::PerUnit { units }
        } else {
            EventMagnitude::Single
        };

        Ok(ValidatedEvent {
            community_id: self.community_id.clone(),
            user_id: self.user_id.clone(),
            platform: self.platform.clone(),
            platform_user_id: self.platform_user_id.clone(),
            event_type,
            magnitude,
            metadata: self.metadata.clone(),
        })
    }
}

/// How an event's nominal weight scales into a delta.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EventMagnitude {
    /// The weight applies once.
    Single,
    /// The weight is multiplied by a unit count (dollars, bits/100).
    PerUnit {
        /// Validated positive unit count.
        units: f64,
    },
}

impl EventMagnitude {
    /// Returns the multiplier applied to the nominal weight.
    #[must_use]
    pub const fn multiplier(&self) -> f64 {
        match self {
            Self::Single => 1.0,
            Self::PerUnit { units } => *units,
        }
    }
}

/// An event that has passed validation.
///
/// The magnitude is carried in the type, so per-unit events are statically
/// guaranteed to have a unit count by the time scoring sees them.
#[derive(Debug, Clone)]
pub struct ValidatedEvent {
    /// Community the event occurred in.
    pub community_id: String,
    /// Engine-level user identifier.
    pub user_id: String,
    /// Originating platform name.
    pub platform: String,
    /// The user's identifier on the originating platform.
    pub platform_user_id: String,
    /// Parsed event type.
    pub event_type: EventType,
    /// Validated magnitude.
    pub magnitude: EventMagnitude,
    /// Original metadata, preserved for the audit row.
    pub metadata: Map<String, Value>,
}
