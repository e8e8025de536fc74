//! The scoring service: event adjustment, queries, and the admin surface.
//!
//! [`ReputationService`] wires the pure domain logic to the store. An
//! adjustment flows: validate the raw event, resolve the community weight
//! (custom tables override values for premium communities), scale per-unit
//! magnitudes, apply the clamped delta atomically (community score, global
//! score, and the history row commit together), then evaluate policy.
//!
//! Policy evaluation is deliberately decoupled from the adjustment result:
//! the score change has already committed by the time policy runs, so a
//! failing moderation executor is logged and surfaced in the returned
//! decision, never as a failed adjustment.

use std::sync::Arc;

use tracing::{info, warn};

use repute_core::{
    CustomWeightSource, CustomWeightTable, EngineConfig, EventType, IncomingEvent,
    ModerationExecutor, PolicyAction, PolicyConfig, PremiumLookup, ReputationError, Tier,
    ValidatedEvent, WeightResolver, default_weight, policy,
    score::SCORE_DEFAULT,
};

use crate::store::{ReputationEvent, ScoreRecord, ScoreStore};

/// Result of a single adjustment.
#[derive(Debug, Clone, PartialEq)]
pub struct AdjustResult {
    /// Community score before the event.
    pub score_before: f64,
    /// Community score after the clamped delta.
    pub score_after: f64,
    /// The delta actually applied (clamped, not nominal).
    pub score_change: f64,
    /// Tier of the new score.
    pub tier: Tier,
    /// Policy decision for the new score.
    pub policy_action: PolicyAction,
}

/// A user's current score and tier.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreView {
    /// Engine-level user identifier.
    pub user_id: String,
    /// Current score; the default 600 if the user has no record yet.
    pub score: f64,
    /// Tier of the current score.
    pub tier: Tier,
    /// Number of events behind this score.
    pub total_events: u64,
    /// Timestamp of the most recent event, 0 if none.
    pub last_event_at_ns: u64,
}

/// One leaderboard row.
#[derive(Debug, Clone, PartialEq)]
pub struct LeaderboardEntry {
    /// 1-based rank within the community.
    pub rank: u64,
    /// Engine-level user identifier.
    pub user_id: String,
    /// Current score.
    pub score: f64,
    /// Tier of the current score.
    pub tier: Tier,
    /// Timestamp of the most recent event.
    pub last_event_at_ns: u64,
}

/// A user inside the policy zone.
#[derive(Debug, Clone, PartialEq)]
pub struct AtRiskUser {
    /// Engine-level user identifier.
    pub user_id: String,
    /// Current score.
    pub score: f64,
    /// Tier of the current score.
    pub tier: Tier,
    /// What the policy would decide for this score right now.
    pub action: PolicyAction,
}

/// The scoring core.
pub struct ReputationService<S, P> {
    store: Arc<S>,
    premium: Arc<P>,
    resolver: WeightResolver<Arc<S>, Arc<P>>,
    moderation: Arc<dyn ModerationExecutor>,
    config: EngineConfig,
}

impl<S, P> ReputationService<S, P>
where
    S: ScoreStore + CustomWeightSource,
    P: PremiumLookup,
{
    /// Creates a service over a store, a premium lookup, and a moderation
    /// executor.
    pub fn new(
        store: Arc<S>,
        premium: Arc<P>,
        moderation: Arc<dyn ModerationExecutor>,
        config: EngineConfig,
    ) -> Self {
        let resolver = WeightResolver::new(
            Arc::clone(&store),
            Arc::clone(&premium),
            config.weight_cache_ttl(),
        );
        Self {
            store,
            premium,
            resolver,
            moderation,
            config,
        }
    }

    /// Engine configuration in effect.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Applies one behavioral event.
    ///
    /// Not idempotent by design: submitting the same event twice produces
    /// two score changes. Callers needing exactly-once must dedupe before
    /// calling; retrying after [`ReputationError::StorageUnavailable`] is
    /// safe because a failed call committed nothing.
    ///
    /// # Errors
    ///
    /// Client errors ([`ReputationError::InvalidEvent`],
    /// [`ReputationError::UnknownEventType`],
    /// [`ReputationError::InvalidEventMetadata`]) for malformed input;
    /// [`ReputationError::StorageUnavailable`] for transient storage
    /// failure.
    pub fn adjust(&self, event: &IncomingEvent) -> Result<AdjustResult, ReputationError> {
        let validated = event.validate()?;

        let weight = self
            .resolver
            .effective_weight(&validated.community_id, validated.event_type)?;
        let multiplier = validated.magnitude.multiplier();
        let community_delta = weight * multiplier;

        // The global score always uses the default table: customization is
        // a community-local concern and must not leak into cross-community
        // trust. Moderation events are excluded when configured off.
        let global_delta = if validated.event_type.is_moderation()
            && !self.config.global_counts_moderation
        {
            None
        } else {
            Some(default_weight(validated.event_type) * multiplier)
        };

        let applied = self.store.apply_adjustment(&crate::store::AdjustmentWrite {
            community_id: validated.community_id.clone(),
            user_id: validated.user_id.clone(),
            event_type: validated.event_type.to_string(),
            community_delta,
            global_delta,
            metadata: validated.metadata.clone(),
        })?;

        let tier = Tier::for_score(applied.score_after);
        let policy_action = self.enforce_policy(&validated, applied.score_after);

        Ok(AdjustResult {
            score_before: applied.score_before,
            score_after: applied.score_after,
            score_change: applied.score_change,
            tier,
            policy_action,
        })
    }

    /// Evaluates the community's policy against a just-committed score and
    /// triggers the moderation executor on an auto-ban decision.
    ///
    /// Failures here are logged, not propagated: the score change has
    /// already committed, and a flaky policy read or moderation backend
    /// must not make the adjustment look failed (and retried,
    /// double-applying the event).
    fn enforce_policy(&self, event: &ValidatedEvent, new_score: f64) -> PolicyAction {
        let config = match self.effective_policy(&event.community_id) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    community_id = %event.community_id,
                    error = %e,
                    "policy config unavailable; skipping policy evaluation"
                );
                return PolicyAction::None;
            }
        };
        let action = policy::evaluate(&config, new_score);

        match action {
            PolicyAction::AutoBan => {
                info!(
                    community_id = %event.community_id,
                    user_id = %event.user_id,
                    new_score,
                    threshold = config.auto_ban_threshold,
                    "auto-ban threshold crossed"
                );
                let reason = format!(
                    "reputation score {new_score:.0} at or below auto-ban threshold {}",
                    config.auto_ban_threshold
                );
                if let Err(e) = self.moderation.execute_ban(
                    &event.community_id,
                    &event.user_id,
                    &event.platform,
                    &event.platform_user_id,
                    &reason,
                ) {
                    warn!(
                        community_id = %event.community_id,
                        user_id = %event.user_id,
                        error = %e,
                        "moderation executor failed; decision stands, ban not executed"
                    );
                }
            }
            PolicyAction::Flagged => {
                info!(
                    community_id = %event.community_id,
                    user_id = %event.user_id,
                    new_score,
                    "user entered the at-risk zone"
                );
            }
            PolicyAction::None => {}
        }

        action
    }

    fn effective_policy(&self, community_id: &str) -> Result<PolicyConfig, ReputationError> {
        Ok(self
            .store
            .policy_config(community_id)?
            .unwrap_or_else(|| PolicyConfig {
                at_risk_buffer: self.config.at_risk_buffer,
                ..PolicyConfig::default()
            }))
    }

    /// Sets a user's score to an explicit value, bypassing weights.
    ///
    /// Requires a non-empty audit `reason`; the override still appends a
    /// history row and still re-evaluates policy. The moderation executor
    /// is not invoked from this path: there is no originating platform to
    /// ban on, and the admin performing the override is already acting.
    ///
    /// # Errors
    ///
    /// [`ReputationError::MissingReason`] without a reason,
    /// [`ReputationError::ScoreOutOfRange`] for a score outside the valid
    /// range, [`ReputationError::StorageUnavailable`] on storage failure.
    pub fn set_score_manual(
        &self,
        community_id: &str,
        user_id: &str,
        score: f64,
        reason: &str,
        set_by: &str,
    ) -> Result<AdjustResult, ReputationError> {
        if reason.trim().is_empty() {
            return Err(ReputationError::MissingReason);
        }
        if !(repute_core::SCORE_MIN..=repute_core::SCORE_MAX).contains(&score) {
            return Err(ReputationError::ScoreOutOfRange {
                score: score as i64,
            });
        }
        if community_id.trim().is_empty() {
            return Err(ReputationError::InvalidEvent {
                field: "community_id",
            });
        }
        if user_id.trim().is_empty() {
            return Err(ReputationError::InvalidEvent { field: "user_id" });
        }

        let applied = self
            .store
            .set_score(community_id, user_id, score, reason, set_by)?;
        let tier = Tier::for_score(applied.score_after);
        let policy_action =
            policy::evaluate(&self.effective_policy(community_id)?, applied.score_after);

        info!(
            community_id,
            user_id,
            score_before = applied.score_before,
            score_after = applied.score_after,
            set_by,
            "manual score override applied"
        );

        Ok(AdjustResult {
            score_before: applied.score_before,
            score_after: applied.score_after,
            score_change: applied.score_change,
            tier,
            policy_action,
        })
    }

    /// Current score and tier for a user in a community.
    ///
    /// Users without a record see the default score; their record is only
    /// created when their first event arrives.
    ///
    /// # Errors
    ///
    /// Returns [`ReputationError::StorageUnavailable`] on storage failure.
    pub fn score_view(
        &self,
        community_id: &str,
        user_id: &str,
    ) -> Result<ScoreView, ReputationError> {
        Ok(match self.store.score(community_id, user_id)? {
            Some(record) => ScoreView {
                user_id: record.user_id,
                score: record.score,
                tier: Tier::for_score(record.score),
                total_events: record.total_events,
                last_event_at_ns: record.last_event_at_ns,
            },
            None => ScoreView {
                user_id: user_id.to_string(),
                score: SCORE_DEFAULT,
                tier: Tier::for_score(SCORE_DEFAULT),
                total_events: 0,
                last_event_at_ns: 0,
            },
        })
    }

    /// Current global score and tier for a user.
    ///
    /// # Errors
    ///
    /// Returns [`ReputationError::StorageUnavailable`] on storage failure.
    pub fn global_score_view(&self, user_id: &str) -> Result<ScoreView, ReputationError> {
        Ok(match self.store.global_score(user_id)? {
            Some(record) => ScoreView {
                user_id: record.user_id,
                score: record.score,
                tier: Tier::for_score(record.score),
                total_events: record.total_events,
                last_event_at_ns: record.last_event_at_ns,
            },
            None => ScoreView {
                user_id: user_id.to_string(),
                score: SCORE_DEFAULT,
                tier: Tier::for_score(SCORE_DEFAULT),
                total_events: 0,
                last_event_at_ns: 0,
            },
        })
    }

    /// A page of a user's event history, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`ReputationError::StorageUnavailable`] on storage failure.
    pub fn history(
        &self,
        community_id: &str,
        user_id: &str,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<ReputationEvent>, ReputationError> {
        self.store.history(community_id, user_id, limit, offset)
    }

    /// A leaderboard page: score descending, earlier activity winning
    /// ties.
    ///
    /// # Errors
    ///
    /// Returns [`ReputationError::StorageUnavailable`] on storage failure.
    pub fn leaderboard(
        &self,
        community_id: &str,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<LeaderboardEntry>, ReputationError> {
        let records = self.store.leaderboard(community_id, limit, offset)?;
        Ok(records
            .into_iter()
            .enumerate()
            .map(|(i, record)| LeaderboardEntry {
                rank: offset + i as u64 + 1,
                user_id: record.user_id,
                score: record.score,
                tier: Tier::for_score(record.score),
                last_event_at_ns: record.last_event_at_ns,
            })
            .collect())
    }

    /// Users currently inside the community's policy zone (at or below the
    /// at-risk ceiling). Empty when the community has no enabled policy.
    ///
    /// # Errors
    ///
    /// Returns [`ReputationError::StorageUnavailable`] on storage failure.
    pub fn at_risk_users(&self, community_id: &str) -> Result<Vec<AtRiskUser>, ReputationError> {
        let config = self.effective_policy(community_id)?;
        if !config.auto_ban_enabled {
            return Ok(Vec::new());
        }
        let records: Vec<ScoreRecord> = self
            .store
            .scores_at_or_below(community_id, config.at_risk_ceiling() as f64)?;
        Ok(records
            .into_iter()
            .map(|record| AtRiskUser {
                user_id: record.user_id,
                score: record.score,
                tier: Tier::for_score(record.score),
                action: policy::evaluate(&config, record.score),
            })
            .collect())
    }

    /// The community's policy configuration (defaults if never set).
    ///
    /// # Errors
    ///
    /// Returns [`ReputationError::StorageUnavailable`] on storage failure.
    pub fn policy_config(&self, community_id: &str) -> Result<PolicyConfig, ReputationError> {
        self.effective_policy(community_id)
    }

    /// Creates or replaces the community's policy configuration.
    ///
    /// # Errors
    ///
    /// Propagates validation errors from [`PolicyConfig::validate`] and
    /// [`ReputationError::StorageUnavailable`] on storage failure.
    pub fn update_policy_config(
        &self,
        community_id: &str,
        config: &PolicyConfig,
    ) -> Result<(), ReputationError> {
        config.validate()?;
        self.store.upsert_policy_config(community_id, config)?;
        info!(
            community_id,
            enabled = config.auto_ban_enabled,
            threshold = config.auto_ban_threshold,
            "policy configuration updated"
        );
        Ok(())
    }

    /// Toggles auto-ban, preserving the rest of the policy.
    ///
    /// # Errors
    ///
    /// Returns [`ReputationError::StorageUnavailable`] on storage failure.
    pub fn set_auto_ban(&self, community_id: &str, enabled: bool) -> Result<(), ReputationError> {
        let mut config = self.effective_policy(community_id)?;
        config.auto_ban_enabled = enabled;
        self.update_policy_config(community_id, &config)
    }

    /// The community's custom weight table, if any.
    ///
    /// # Errors
    ///
    /// Returns [`ReputationError::StorageUnavailable`] on storage failure.
    pub fn custom_weight_table(
        &self,
        community_id: &str,
    ) -> Result<Option<CustomWeightTable>, ReputationError> {
        self.store.custom_weights(community_id)
    }

    /// Replaces the community's weight overrides.
    ///
    /// Premium-gated: non-premium communities fail with
    /// [`ReputationError::PremiumRequired`] and keep resolving default
    /// weights. The resolver cache is invalidated only after the storage
    /// write commits, so readers can never repopulate it with a table
    /// older than this update.
    ///
    /// # Errors
    ///
    /// [`ReputationError::PremiumRequired`] for non-premium communities;
    /// [`ReputationError::InvalidConfig`] for non-finite weight values;
    /// [`ReputationError::StorageUnavailable`] on storage failure.
    pub fn update_custom_weights(
        &self,
        community_id: &str,
        weights: std::collections::HashMap<EventType, f64>,
    ) -> Result<(), ReputationError> {
        if !self.premium.is_premium(community_id)? {
            return Err(ReputationError::PremiumRequired {
                community_id: community_id.to_string(),
            });
        }
        for (&event_type, &weight) in &weights {
            if !weight.is_finite() {
                return Err(ReputationError::InvalidConfig {
                    message: format!("weight for '{event_type}' must be finite, got {weight}"),
                });
            }
        }

        let table = CustomWeightTable {
            community_id: community_id.to_string(),
            weights,
            updated_at_ns: 0,
        };
        self.store.replace_custom_weights(&table)?;
        // Invalidate after commit, never before.
        self.resolver.invalidate(community_id);
        info!(community_id, "custom weights replaced and cache invalidated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use serde_json::json;

    use repute_core::NoopModerationExecutor;

    use crate::store::SqliteScoreStore;

    use super::*;

    struct FixedPremium(bool);

    impl PremiumLookup for FixedPremium {
        fn is_premium(&self, _community_id: &str) -> Result<bool, ReputationError> {
            Ok(self.0)
        }
    }

    #[derive(Default)]
    struct RecordingExecutor {
        bans: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    impl ModerationExecutor for RecordingExecutor {
        fn execute_ban(
            &self,
            community_id: &str,
            user_id: &str,
            _platform: &str,
            _platform_user_id: &str,
            _reason: &str,
        ) -> Result<(), ReputationError> {
            if self.fail {
                return Err(ReputationError::StorageUnavailable {
                    message: "moderation backend down".to_string(),
                });
            }
            self.bans
                .lock()
                .expect("lock")
                .push((community_id.to_string(), user_id.to_string()));
            Ok(())
        }
    }

    type TestService = ReputationService<SqliteScoreStore, FixedPremium>;

    fn service(premium: bool) -> TestService {
        service_with(premium, Arc::new(NoopModerationExecutor), EngineConfig::default())
    }

    fn service_with(
        premium: bool,
        moderation: Arc<dyn ModerationExecutor>,
        config: EngineConfig,
    ) -> TestService {
        let store = Arc::new(SqliteScoreStore::in_memory().expect("store"));
        ReputationService::new(store, Arc::new(FixedPremium(premium)), moderation, config)
    }

    fn event(community_id: &str, user_id: &str, event_type: &str) -> IncomingEvent {
        IncomingEvent::new(community_id, user_id, "twitch", "t-1", event_type)
    }

    #[test]
    fn subscription_from_default_lands_at_605_fair() {
        let service = service(false);
        let result = service.adjust(&event("c1", "u1", "subscription")).expect("adjust");

        assert!((result.score_before - 600.0).abs() < f64::EPSILON);
        assert!((result.score_after - 605.0).abs() < f64::EPSILON);
        assert!((result.score_change - 5.0).abs() < f64::EPSILON);
        assert_eq!(result.tier, Tier::Fair);
        assert_eq!(result.policy_action, PolicyAction::None);
    }

    #[test]
    fn rejects_unknown_event_type() {
        let service = service(false);
        let err = service.adjust(&event("c1", "u1", "pollVote")).unwrap_err();
        assert!(matches!(err, ReputationError::UnknownEventType { .. }));
        // Nothing was written.
        let view = service.score_view("c1", "u1").expect("view");
        assert_eq!(view.total_events, 0);
    }

    #[test]
    fn per_unit_donation_scales_by_units() {
        let service = service(false);
        let donation = event("c1", "u1", "donationPerDollar").with_metadata("units", json!(25.0));
        let result = service.adjust(&donation).expect("adjust");
        assert!((result.score_change - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn per_unit_without_units_is_rejected() {
        let service = service(false);
        let err = service
            .adjust(&event("c1", "u1", "cheerPer100Bits"))
            .unwrap_err();
        assert!(matches!(err, ReputationError::InvalidEventMetadata { .. }));
    }

    #[test]
    fn custom_weight_applies_for_premium_community() {
        let service = service(true);
        let mut weights = HashMap::new();
        weights.insert(EventType::Subscription, 7.5);
        service
            .update_custom_weights("c1", weights)
            .expect("update weights");

        let result = service.adjust(&event("c1", "u1", "subscription")).expect("adjust");
        assert!((result.score_change - 7.5).abs() < f64::EPSILON);

        // The global score is weighted by the default table, not the
        // community's custom one.
        let global = service.global_score_view("u1").expect("global");
        assert!((global.score - 605.0).abs() < f64::EPSILON);
    }

    #[test]
    fn custom_weight_update_requires_premium() {
        let service = service(false);
        let mut weights = HashMap::new();
        weights.insert(EventType::ChatMessage, 0.05);
        let err = service.update_custom_weights("c1", weights).unwrap_err();
        assert!(matches!(err, ReputationError::PremiumRequired { .. }));

        // The default weight still applies.
        let result = service.adjust(&event("c1", "u1", "chatMessage")).expect("adjust");
        assert!((result.score_change - 0.01).abs() < f64::EPSILON);
    }

    #[test]
    fn custom_weight_update_rejects_non_finite_values() {
        let service = service(true);
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let mut weights = HashMap::new();
            weights.insert(EventType::Follow, bad);
            let err = service.update_custom_weights("c1", weights).unwrap_err();
            assert!(matches!(err, ReputationError::InvalidConfig { .. }));
            // A bad weight is a client input error, not a transient storage
            // failure, so callers must not retry it unchanged.
            assert!(err.is_client_error());
            assert!(!err.is_retryable());
        }

        // Nothing was stored; the default weight still applies.
        assert!(service.custom_weight_table("c1").expect("load").is_none());
        let result = service.adjust(&event("c1", "u1", "follow")).expect("adjust");
        assert!((result.score_change - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn weight_update_is_visible_immediately() {
        let service = service(true);
        // Populate the resolver cache.
        service.adjust(&event("c1", "u1", "follow")).expect("adjust");

        let mut weights = HashMap::new();
        weights.insert(EventType::Follow, 4.0);
        service.update_custom_weights("c1", weights).expect("update");

        // No TTL wait: the cache was invalidated after the commit.
        let result = service.adjust(&event("c1", "u1", "follow")).expect("adjust");
        assert!((result.score_change - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn auto_ban_fires_below_threshold_and_invokes_executor() {
        let executor = Arc::new(RecordingExecutor::default());
        let service = service_with(false, executor.clone(), EngineConfig::default());
        service
            .update_policy_config(
                "c1",
                &PolicyConfig {
                    auto_ban_enabled: true,
                    auto_ban_threshold: 450,
                    at_risk_buffer: 50,
                },
            )
            .expect("policy");

        // 600 - 200 = 400, at or below 450.
        let mut ban = event("c1", "u1", "ban");
        ban.platform_user_id = "twitch-u1".to_string();
        let result = service.adjust(&ban).expect("adjust");

        assert_eq!(result.policy_action, PolicyAction::AutoBan);
        let bans = executor.bans.lock().expect("lock");
        assert_eq!(bans.as_slice(), &[("c1".to_string(), "u1".to_string())]);
    }

    #[test]
    fn executor_failure_does_not_fail_adjustment() {
        let executor = Arc::new(RecordingExecutor {
            fail: true,
            ..RecordingExecutor::default()
        });
        let service = service_with(false, executor, EngineConfig::default());
        service
            .update_policy_config(
                "c1",
                &PolicyConfig {
                    auto_ban_enabled: true,
                    auto_ban_threshold: 450,
                    at_risk_buffer: 50,
                },
            )
            .expect("policy");

        let result = service.adjust(&event("c1", "u1", "ban")).expect("adjust");
        assert_eq!(result.policy_action, PolicyAction::AutoBan);
        // The score change committed despite the executor failing.
        let view = service.score_view("c1", "u1").expect("view");
        assert!((view.score - 400.0).abs() < f64::EPSILON);
    }

    #[test]
    fn flagged_inside_buffer_none_above() {
        let service = service(false);
        service
            .update_policy_config(
                "c1",
                &PolicyConfig {
                    auto_ban_enabled: true,
                    auto_ban_threshold: 450,
                    at_risk_buffer: 50,
                },
            )
            .expect("policy");

        // 600 - 130 = 470: inside the buffer.
        let result = service
            .set_score_manual("c1", "u1", 470.0, "test fixture", "admin")
            .expect("set");
        assert_eq!(result.policy_action, PolicyAction::Flagged);

        let result = service
            .set_score_manual("c1", "u1", 600.0, "test fixture", "admin")
            .expect("set");
        assert_eq!(result.policy_action, PolicyAction::None);
    }

    #[test]
    fn moderation_can_be_excluded_from_global_score() {
        let config = EngineConfig {
            global_counts_moderation: false,
            ..EngineConfig::default()
        };
        let service = service_with(false, Arc::new(NoopModerationExecutor), config);

        service.adjust(&event("c1", "u1", "warn")).expect("adjust");

        // Community score took the hit; the global record was not created.
        let view = service.score_view("c1", "u1").expect("view");
        assert!((view.score - 575.0).abs() < f64::EPSILON);
        let global = service.global_score_view("u1").expect("global");
        assert!((global.score - 600.0).abs() < f64::EPSILON);
        assert_eq!(global.total_events, 0);
    }

    #[test]
    fn manual_set_requires_reason() {
        let service = service(false);
        let err = service
            .set_score_manual("c1", "u1", 500.0, "  ", "admin")
            .unwrap_err();
        assert!(matches!(err, ReputationError::MissingReason));
    }

    #[test]
    fn manual_set_rejects_out_of_range_score() {
        let service = service(false);
        let err = service
            .set_score_manual("c1", "u1", 900.0, "fixing", "admin")
            .unwrap_err();
        assert!(matches!(err, ReputationError::ScoreOutOfRange { score: 900 }));
    }

    #[test]
    fn score_view_defaults_for_unknown_user() {
        let service = service(false);
        let view = service.score_view("c1", "ghost").expect("view");
        assert!((view.score - 600.0).abs() < f64::EPSILON);
        assert_eq!(view.tier, Tier::Fair);
        assert_eq!(view.total_events, 0);
    }

    #[test]
    fn leaderboard_ranks_continue_across_pages() {
        let service = service(false);
        for (user, event_type) in [
            ("a", "subscriptionTier3"),
            ("b", "subscription"),
            ("c", "follow"),
        ] {
            service.adjust(&event("c1", user, event_type)).expect("adjust");
        }

        let page = service.leaderboard("c1", 2, 1).expect("leaderboard");
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].rank, 2);
        assert_eq!(page[0].user_id, "b");
        assert_eq!(page[1].rank, 3);
        assert_eq!(page[1].user_id, "c");
    }

    #[test]
    fn at_risk_users_reflect_policy_zone() {
        let service = service(false);
        service
            .update_policy_config(
                "c1",
                &PolicyConfig {
                    auto_ban_enabled: true,
                    auto_ban_threshold: 450,
                    at_risk_buffer: 50,
                },
            )
            .expect("policy");

        service
            .set_score_manual("c1", "deep", 400.0, "fixture", "admin")
            .expect("set");
        service
            .set_score_manual("c1", "edge", 480.0, "fixture", "admin")
            .expect("set");
        service
            .set_score_manual("c1", "safe", 700.0, "fixture", "admin")
            .expect("set");

        let at_risk = service.at_risk_users("c1").expect("at risk");
        assert_eq!(at_risk.len(), 2);
        assert_eq!(at_risk[0].user_id, "deep");
        assert_eq!(at_risk[0].action, PolicyAction::AutoBan);
        assert_eq!(at_risk[1].user_id, "edge");
        assert_eq!(at_risk[1].action, PolicyAction::Flagged);
    }

    #[test]
    fn at_risk_empty_without_enabled_policy() {
        let service = service(false);
        service
            .set_score_manual("c1", "u1", 310.0, "fixture", "admin")
            .expect("set");
        assert!(service.at_risk_users("c1").expect("at risk").is_empty());
    }

    #[test]
    fn set_auto_ban_toggles_and_preserves_threshold() {
        let service = service(false);
        service
            .update_policy_config(
                "c1",
                &PolicyConfig {
                    auto_ban_enabled: false,
                    auto_ban_threshold: 500,
                    at_risk_buffer: 25,
                },
            )
            .expect("policy");

        service.set_auto_ban("c1", true).expect("toggle");
        let config = service.policy_config("c1").expect("get");
        assert!(config.auto_ban_enabled);
        assert_eq!(config.auto_ban_threshold, 500);
        assert_eq!(config.at_risk_buffer, 25);
    }
}
