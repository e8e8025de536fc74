//! Weight tables and the community weight resolver.
//!
//! Every event type has a default weight (the score delta it contributes
//! before clamping). Premium communities may override individual weight
//! *values* through a [`CustomWeightTable`]; the default table remains the
//! authoritative set of valid event *types*, so customization can never
//! introduce a type the engine does not know.
//!
//! # Caching
//!
//! Custom tables live in storage and change rarely, so the resolver keeps a
//! per-community cache with a short TTL (default 300 s) behind an `RwLock`.
//! Reads take the read lock only; a miss or an expired entry takes the write
//! lock to repopulate. Admin weight updates call
//! [`WeightResolver::invalidate`] **after** their storage write commits, so
//! an intentional change is visible immediately instead of up to a TTL
//! later, and a concurrent reader can never repopulate the cache with data
//! older than the committed write.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ReputationError;
use crate::event::EventType;

/// Returns the default weight for an event type.
///
/// Per-unit types (`donationPerDollar`, `cheerPer100Bits`) return the
/// per-unit weight; the effective delta is this value times the validated
/// unit count.
#[must_use]
pub const fn default_weight(event_type: EventType) -> f64 {
    match event_type {
        EventType::ChatMessage => 0.01,
        EventType::CommandUsage => -0.1,
        EventType::GiveawayEntry => -1.0,
        EventType::Follow => 1.0,
        EventType::Subscription => 5.0,
        EventType::SubscriptionTier2 => 10.0,
        EventType::SubscriptionTier3 => 20.0,
        EventType::GiftSubscription => 3.0,
        EventType::DonationPerDollar => 1.0,
        EventType::CheerPer100Bits => 1.0,
        EventType::Raid => 2.0,
        EventType::Boost => 5.0,
        EventType::Warn => -25.0,
        EventType::Timeout => -50.0,
        EventType::Kick => -75.0,
        EventType::Ban => -200.0,
    }
}

/// Returns the full default weight table as reference data.
#[must_use]
pub fn default_weight_table() -> Vec<(EventType, f64)> {
    EventType::all()
        .iter()
        .map(|&t| (t, default_weight(t)))
        .collect()
}

/// A community's weight overrides.
///
/// Only the event types present in `weights` are overridden; everything
/// else falls through to the default table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomWeightTable {
    /// Community the overrides belong to.
    pub community_id: String,

    /// Per-type weight overrides.
    pub weights: HashMap<EventType, f64>,

    /// When the table was last updated, nanoseconds since the Unix epoch.
    pub updated_at_ns: u64,
}

impl CustomWeightTable {
    /// Returns the override for an event type, if one is set.
    #[must_use]
    pub fn weight(&self, event_type: EventType) -> Option<f64> {
        self.weights.get(&event_type).copied()
    }
}

/// Source of persisted custom weight tables, implemented by the store.
pub trait CustomWeightSource: Send + Sync {
    /// Loads the custom table for a community, or `None` if the community
    /// has never customized its weights.
    ///
    /// # Errors
    ///
    /// Returns [`ReputationError::StorageUnavailable`] if the backing store
    /// cannot be reached.
    fn custom_weights(
        &self,
        community_id: &str,
    ) -> Result<Option<CustomWeightTable>, ReputationError>;
}

impl<T: CustomWeightSource + ?Sized> CustomWeightSource for std::sync::Arc<T> {
    fn custom_weights(
        &self,
        community_id: &str,
    ) -> Result<Option<CustomWeightTable>, ReputationError> {
        (**self).custom_weights(community_id)
    }
}

/// Billing-side premium status lookup, consumed as a collaborator.
pub trait PremiumLookup: Send + Sync {
    /// Returns whether the community has premium status.
    ///
    /// # Errors
    ///
    /// Returns [`ReputationError::StorageUnavailable`] if the lookup
    /// backend cannot be reached.
    fn is_premium(&self, community_id: &str) -> Result<bool, ReputationError>;
}

impl<T: PremiumLookup + ?Sized> PremiumLookup for std::sync::Arc<T> {
    fn is_premium(&self, community_id: &str) -> Result<bool, ReputationError> {
        (**self).is_premium(community_id)
    }
}

/// A premium lookup that treats every community as non-premium.
///
/// Useful for tests and for deployments without a billing integration;
/// every community resolves to default weights.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPremium;

impl PremiumLookup for NoPremium {
    fn is_premium(&self, _community_id: &str) -> Result<bool, ReputationError> {
        Ok(false)
    }
}

struct CacheEntry {
    /// `None` means the community resolved to defaults (not premium, or no
    /// custom table on record); caching the miss avoids re-querying the
    /// store and the billing lookup on every event.
    table: Option<CustomWeightTable>,
    expires_at: Instant,
}

/// Resolves the effective event weight for a community.
pub struct WeightResolver<S, P> {
    source: S,
    premium: P,
    ttl: Duration,
    cache: RwLock<HashMap<String, CacheEntry>>,
}

impl<S: CustomWeightSource, P: PremiumLookup> WeightResolver<S, P> {
    /// Creates a resolver over a weight source and a premium lookup.
    pub fn new(source: S, premium: P, ttl: Duration) -> Self {
        Self {
            source,
            premium,
            ttl,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Resolves the effective weight for `event_type` in `community_id`.
    ///
    /// The custom table (if the community is premium and has one) overrides
    /// the value; the default table decides validity.
    ///
    /// # Errors
    ///
    /// Returns [`ReputationError::StorageUnavailable`] if a cache miss
    /// cannot be filled from the store or the premium lookup.
    pub fn effective_weight(
        &self,
        community_id: &str,
        event_type: EventType,
    ) -> Result<f64, ReputationError> {
        let fallback = default_weight(event_type);

        if let Some(weight) = self.cached_override(community_id, event_type) {
            return Ok(weight.unwrap_or(fallback));
        }

        let table = self.load_and_cache(community_id)?;
        Ok(table
            .as_ref()
            .and_then(|t| t.weight(event_type))
            .unwrap_or(fallback))
    }

    /// Drops the cached table for a community.
    ///
    /// Called by the admin weight-update path after its own write commits;
    /// the next resolution re-reads the committed table.
    pub fn invalidate(&self, community_id: &str) {
        let mut cache = match self.cache.write() {
            Ok(cache) => cache,
            // A poisoned cache lock means a panic elsewhere; dropping the
            // whole cache on next access is handled by the TTL, so just
            // take the inner value.
            Err(poisoned) => poisoned.into_inner(),
        };
        if cache.remove(community_id).is_some() {
            debug!(community_id, "invalidated custom weight cache entry");
        }
    }

    /// Removes expired entries. Optional housekeeping; correctness comes
    /// from the TTL check on read plus explicit invalidation.
    pub fn sweep_expired(&self) {
        let now = Instant::now();
        let mut cache = match self.cache.write() {
            Ok(cache) => cache,
            Err(poisoned) => poisoned.into_inner(),
        };
        cache.retain(|_, entry| entry.expires_at > now);
    }

    /// Looks up a live cache entry. The outer `Option` distinguishes
    /// hit/miss; the inner one is the override value for `event_type`.
    #[allow(clippy::option_option)]
    fn cached_override(&self, community_id: &str, event_type: EventType) -> Option<Option<f64>> {
        let cache = match self.cache.read() {
            Ok(cache) => cache,
            Err(poisoned) => poisoned.into_inner(),
        };
        let entry = cache.get(community_id)?;
        if entry.expires_at <= Instant::now() {
            return None;
        }
        Some(entry.table.as_ref().and_then(|t| t.weight(event_type)))
    }

    fn load_and_cache(
        &self,
        community_id: &str,
    ) -> Result<Option<CustomWeightTable>, ReputationError> {
        let table = if self.premium.is_premium(community_id)? {
            self.source.custom_weights(community_id)?
        } else {
            // Non-premium communities always resolve to defaults, even if a
            // stale custom table is still on record from a lapsed
            // subscription.
            None
        };

        let mut cache = match self.cache.write() {
            Ok(cache) => cache,
            Err(poisoned) => poisoned.into_inner(),
        };
        cache.insert(
            community_id.to_string(),
            CacheEntry {
                table: table.clone(),
                expires_at: Instant::now() + self.ttl,
            },
        );
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct FakeSource {
        table: Mutex<Option<CustomWeightTable>>,
        loads: AtomicUsize,
    }

    impl FakeSource {
        fn new(table: Option<CustomWeightTable>) -> Self {
            Self {
                table: Mutex::new(table),
                loads: AtomicUsize::new(0),
            }
        }

        fn set(&self, table: Option<CustomWeightTable>) {
            *self.table.lock().expect("lock") = table;
        }
    }

    impl CustomWeightSource for &FakeSource {
        fn custom_weights(
            &self,
            _community_id: &str,
        ) -> Result<Option<CustomWeightTable>, ReputationError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(self.table.lock().expect("lock").clone())
        }
    }

    struct Premium(bool);

    impl PremiumLookup for Premium {
        fn is_premium(&self, _community_id: &str) -> Result<bool, ReputationError> {
            Ok(self.0)
        }
    }

    fn custom(community_id: &str, weights: &[(EventType, f64)]) -> CustomWeightTable {
        CustomWeightTable {
            community_id: community_id.to_string(),
            weights: weights.iter().copied().collect(),
            updated_at_ns: 0,
        }
    }

    #[test]
    fn default_table_covers_all_types() {
        let table = default_weight_table();
        assert_eq!(table.len(), EventType::all().len());
        assert!(table.iter().any(|&(t, w)| t == EventType::Ban && w == -200.0));
    }

    #[test]
    fn non_premium_gets_defaults_even_with_custom_table() {
        let source = FakeSource::new(Some(custom("c1", &[(EventType::ChatMessage, 0.05)])));
        let resolver = WeightResolver::new(&source, Premium(false), Duration::from_secs(300));

        let weight = resolver
            .effective_weight("c1", EventType::ChatMessage)
            .expect("resolve");
        assert!((weight - 0.01).abs() < f64::EPSILON);
        // The store was never consulted for a non-premium community.
        assert_eq!(source.loads.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn premium_override_applies_per_key() {
        let source = FakeSource::new(Some(custom("c1", &[(EventType::ChatMessage, 0.05)])));
        let resolver = WeightResolver::new(&source, Premium(true), Duration::from_secs(300));

        let overridden = resolver
            .effective_weight("c1", EventType::ChatMessage)
            .expect("resolve");
        assert!((overridden - 0.05).abs() < f64::EPSILON);

        // Types without an override fall through to the default.
        let fallthrough = resolver
            .effective_weight("c1", EventType::Subscription)
            .expect("resolve");
        assert!((fallthrough - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn cache_serves_repeat_lookups() {
        let source = FakeSource::new(Some(custom("c1", &[(EventType::Follow, 2.0)])));
        let resolver = WeightResolver::new(&source, Premium(true), Duration::from_secs(300));

        for _ in 0..5 {
            resolver
                .effective_weight("c1", EventType::Follow)
                .expect("resolve");
        }
        assert_eq!(source.loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn invalidation_forces_reload() {
        let source = FakeSource::new(Some(custom("c1", &[(EventType::Follow, 2.0)])));
        let resolver = WeightResolver::new(&source, Premium(true), Duration::from_secs(300));

        let before = resolver
            .effective_weight("c1", EventType::Follow)
            .expect("resolve");
        assert!((before - 2.0).abs() < f64::EPSILON);

        source.set(Some(custom("c1", &[(EventType::Follow, 3.5)])));
        // Still cached until invalidated.
        let stale = resolver
            .effective_weight("c1", EventType::Follow)
            .expect("resolve");
        assert!((stale - 2.0).abs() < f64::EPSILON);

        resolver.invalidate("c1");
        let fresh = resolver
            .effective_weight("c1", EventType::Follow)
            .expect("resolve");
        assert!((fresh - 3.5).abs() < f64::EPSILON);
    }

    #[test]
    fn ttl_expiry_reloads() {
        let source = FakeSource::new(None);
        let resolver = WeightResolver::new(&source, Premium(true), Duration::from_nanos(1));

        resolver
            .effective_weight("c1", EventType::Follow)
            .expect("resolve");
        std::thread::sleep(Duration::from_millis(1));
        resolver
            .effective_weight("c1", EventType::Follow)
            .expect("resolve");
        assert_eq!(source.loads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn sweep_removes_expired_entries() {
        let source = FakeSource::new(None);
        let resolver = WeightResolver::new(&source, Premium(true), Duration::from_nanos(1));
        resolver
            .effective_weight("c1", EventType::Follow)
            .expect("resolve");
        std::thread::sleep(Duration::from_millis(1));
        resolver.sweep_expired();
        // No panic, and the next lookup repopulates.
        resolver
            .effective_weight("c1", EventType::Follow)
            .expect("resolve");
        assert_eq!(source.loads.load(Ordering::SeqCst), 2);
    }
}
