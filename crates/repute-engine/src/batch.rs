//! Best-effort batch processing.
//!
//! A batch is processed event by event; one malformed event must never
//! block reputation updates for the other users in the same submission.
//! Only two things fail a batch wholesale: exceeding the size cap (checked
//! before any element is touched) and nothing else — even total storage
//! unavailability is reported per event, since earlier events may already
//! have committed by the time storage goes away.

use std::sync::Arc;

use tracing::{info, warn};

use repute_core::{
    CustomWeightSource, IncomingEvent, PremiumLookup, ReputationError,
};

use crate::service::ReputationService;
use crate::store::ScoreStore;

/// Outcome of one failed event within a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchEventError {
    /// Position of the event in the submitted batch.
    pub index: usize,
    /// Stable error code ([`ReputationError::code`]).
    pub code: &'static str,
    /// Human-readable error message.
    pub message: String,
}

/// Summary of a processed batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchResult {
    /// Events submitted.
    pub total: usize,
    /// Events that applied successfully.
    pub processed: usize,
    /// Events rejected for client input errors (malformed, unknown type,
    /// bad metadata); resubmitting them unchanged will fail again.
    pub skipped: usize,
    /// Events that hit transient storage failures; safe to resubmit.
    pub failed: usize,
    /// Per-event failure details, in batch order.
    pub per_event_errors: Vec<BatchEventError>,
}

/// Applies the scoring service across a batch of events.
pub struct BatchProcessor<S, P> {
    service: Arc<ReputationService<S, P>>,
    max_batch_size: usize,
}

impl<S, P> BatchProcessor<S, P>
where
    S: ScoreStore + CustomWeightSource,
    P: PremiumLookup,
{
    /// Creates a processor with the service's configured batch cap.
    pub fn new(service: Arc<ReputationService<S, P>>) -> Self {
        let max_batch_size = service.config().max_batch_size;
        Self {
            service,
            max_batch_size,
        }
    }

    /// Processes a batch, isolating per-event failures.
    ///
    /// # Errors
    ///
    /// Returns [`ReputationError::BatchTooLarge`] if the batch exceeds the
    /// cap; in that case no element was processed.
    pub fn process(&self, events: &[IncomingEvent]) -> Result<BatchResult, ReputationError> {
        if events.len() > self.max_batch_size {
            return Err(ReputationError::BatchTooLarge {
                size: events.len(),
                max: self.max_batch_size,
            });
        }

        let mut result = BatchResult {
            total: events.len(),
            ..BatchResult::default()
        };

        for (index, event) in events.iter().enumerate() {
            match self.service.adjust(event) {
                Ok(_) => result.processed += 1,
                Err(e) => {
                    if e.is_client_error() {
                        result.skipped += 1;
                    } else {
                        result.failed += 1;
                    }
                    warn!(
                        index,
                        community_id = %event.community_id,
                        user_id = %event.user_id,
                        error = %e,
                        "batch event failed"
                    );
                    result.per_event_errors.push(BatchEventError {
                        index,
                        code: e.code(),
                        message: e.to_string(),
                    });
                }
            }
        }

        info!(
            total = result.total,
            processed = result.processed,
            skipped = result.skipped,
            failed = result.failed,
            "batch processed"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use repute_core::{EngineConfig, NoopModerationExecutor, NoPremium};

    use crate::store::SqliteScoreStore;

    use super::*;

    fn processor(max_batch_size: usize) -> BatchProcessor<SqliteScoreStore, NoPremium> {
        let config = EngineConfig {
            max_batch_size,
            ..EngineConfig::default()
        };
        let store = Arc::new(SqliteScoreStore::in_memory().expect("store"));
        let service = Arc::new(ReputationService::new(
            store,
            Arc::new(NoPremium),
            Arc::new(NoopModerationExecutor),
            config,
        ));
        BatchProcessor::new(service)
    }

    fn follow(user_id: &str) -> IncomingEvent {
        IncomingEvent::new("c1", user_id, "twitch", "t-1", "follow")
    }

    #[test]
    fn empty_batch_is_a_noop() {
        let processor = processor(10);
        let result = processor.process(&[]).expect("process");
        assert_eq!(result, BatchResult::default());
    }

    #[test]
    fn one_malformed_event_does_not_block_the_rest() {
        let processor = processor(100);
        let mut events: Vec<_> = (0..10).map(|i| follow(&format!("u{i}"))).collect();
        events.insert(4, IncomingEvent::new("c1", "bad", "twitch", "t-1", "pollVote"));

        let result = processor.process(&events).expect("process");
        assert_eq!(result.total, 11);
        assert_eq!(result.processed, 10);
        assert_eq!(result.skipped, 1);
        assert_eq!(result.failed, 0);
        assert_eq!(result.per_event_errors.len(), 1);
        assert_eq!(result.per_event_errors[0].index, 4);
        assert_eq!(result.per_event_errors[0].code, "UNKNOWN_EVENT_TYPE");

        // The ten valid updates are all visible.
        let service = &processor.service;
        for i in 0..10 {
            let view = service
                .score_view("c1", &format!("u{i}"))
                .expect("view");
            assert_eq!(view.total_events, 1);
        }
        let bad = service.score_view("c1", "bad").expect("view");
        assert_eq!(bad.total_events, 0);
    }

    #[test]
    fn oversized_batch_is_rejected_before_processing() {
        let processor = processor(3);
        let events: Vec<_> = (0..4).map(|i| follow(&format!("u{i}"))).collect();
        let err = processor.process(&events).unwrap_err();
        assert!(matches!(
            err,
            ReputationError::BatchTooLarge { size: 4, max: 3 }
        ));

        // No element was applied.
        let view = processor.service.score_view("c1", "u0").expect("view");
        assert_eq!(view.total_events, 0);
    }

    #[test]
    fn batch_at_cap_is_accepted() {
        let processor = processor(3);
        let events: Vec<_> = (0..3).map(|i| follow(&format!("u{i}"))).collect();
        let result = processor.process(&events).expect("process");
        assert_eq!(result.processed, 3);
    }

    #[test]
    fn duplicate_events_apply_twice() {
        // Non-idempotence is documented behavior: the engine does not
        // dedupe, callers must.
        let processor = processor(10);
        let events = vec![follow("u1"), follow("u1")];
        let result = processor.process(&events).expect("process");
        assert_eq!(result.processed, 2);

        let view = processor.service.score_view("c1", "u1").expect("view");
        assert!((view.score - 602.0).abs() < f64::EPSILON);
        assert_eq!(view.total_events, 2);
    }
}
