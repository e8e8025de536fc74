//! `SQLite`-backed score store implementation.
//!
//! Uses WAL mode for concurrent reads, an explicit immediate transaction
//! for every mutation, and a busy timeout so a contended writer surfaces as
//! a retryable `StorageUnavailable` instead of blocking forever. The
//! connection sits behind `Arc<Mutex<_>>`; clones of the store share the
//! connection, which keeps in-memory test stores coherent across threads.

// SQLite returns i64 for row IDs, counts, and timestamps; all values here
// are non-negative by construction.
#![allow(clippy::cast_sign_loss, clippy::cast_possible_wrap)]

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rusqlite::{Connection, OpenFlags, OptionalExtension, Row, TransactionBehavior, params};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use repute_core::score::{SCORE_DEFAULT, apply_delta, clamp_score};
use repute_core::{
    CustomWeightSource, CustomWeightTable, EngineConfig, EventType, PolicyConfig, ReputationError,
};

use super::{
    AdjustmentWrite, AppliedAdjustment, GlobalScoreRecord, MANUAL_ADJUSTMENT_EVENT_TYPE,
    ReputationEvent, ScoreRecord, ScoreStore, StoreStats,
};

/// Schema SQL embedded at compile time.
const SCHEMA_SQL: &str = include_str!("schema.sql");

/// Default busy timeout when none is configured.
const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// The `SQLite` score store.
#[derive(Clone)]
pub struct SqliteScoreStore {
    conn: Arc<Mutex<Connection>>,
}

fn storage_err(e: impl std::fmt::Display) -> ReputationError {
    ReputationError::StorageUnavailable {
        message: e.to_string(),
    }
}

fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

impl SqliteScoreStore {
    /// Opens or creates a score store at `path` with the default busy
    /// timeout.
    ///
    /// # Errors
    ///
    /// Returns [`ReputationError::StorageUnavailable`] if the database
    /// cannot be opened or initialized.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ReputationError> {
        Self::open_with_timeout(path, DEFAULT_BUSY_TIMEOUT)
    }

    /// Opens or creates a score store using the configured busy timeout.
    ///
    /// This is the constructor deployments should use alongside
    /// [`EngineConfig::from_file`]; `storage_busy_timeout_ms` bounds how
    /// long any storage operation waits on a contended database before the
    /// caller sees a retryable error.
    ///
    /// # Errors
    ///
    /// Returns [`ReputationError::StorageUnavailable`] if the database
    /// cannot be opened or initialized.
    pub fn open_with_config(
        path: impl AsRef<Path>,
        config: &EngineConfig,
    ) -> Result<Self, ReputationError> {
        Self::open_with_timeout(path, config.storage_busy_timeout())
    }

    /// Opens or creates a score store with an explicit busy timeout.
    ///
    /// The timeout bounds how long any single storage operation waits on a
    /// contended database before failing with a retryable error.
    ///
    /// # Errors
    ///
    /// Returns [`ReputationError::StorageUnavailable`] if the database
    /// cannot be opened or initialized.
    pub fn open_with_timeout(
        path: impl AsRef<Path>,
        busy_timeout: Duration,
    ) -> Result<Self, ReputationError> {
        let conn = Connection::open_with_flags(
            path.as_ref(),
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(storage_err)?;
        Self::initialize(conn, busy_timeout)
    }

    /// Creates an in-memory store for testing.
    ///
    /// # Errors
    ///
    /// Returns [`ReputationError::StorageUnavailable`] if the database
    /// cannot be initialized.
    pub fn in_memory() -> Result<Self, ReputationError> {
        let conn = Connection::open_in_memory().map_err(storage_err)?;
        Self::initialize(conn, DEFAULT_BUSY_TIMEOUT)
    }

    fn initialize(conn: Connection, busy_timeout: Duration) -> Result<Self, ReputationError> {
        conn.busy_timeout(busy_timeout).map_err(storage_err)?;
        conn.execute_batch(SCHEMA_SQL).map_err(storage_err)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, ReputationError> {
        self.conn
            .lock()
            .map_err(|_| storage_err("connection lock poisoned"))
    }

    fn read_score_in_tx(
        conn: &Connection,
        community_id: &str,
        user_id: &str,
    ) -> Result<Option<(f64, u64)>, rusqlite::Error> {
        conn.query_row(
            "SELECT score, total_events FROM scores WHERE community_id = ?1 AND user_id = ?2",
            params![community_id, user_id],
            |row| Ok((row.get::<_, f64>(0)?, row.get::<_, i64>(1)? as u64)),
        )
        .optional()
    }

    fn read_global_in_tx(
        conn: &Connection,
        user_id: &str,
    ) -> Result<Option<f64>, rusqlite::Error> {
        conn.query_row(
            "SELECT score FROM global_scores WHERE user_id = ?1",
            params![user_id],
            |row| row.get::<_, f64>(0),
        )
        .optional()
    }

    fn score_record_from_row(row: &Row<'_>) -> Result<ScoreRecord, rusqlite::Error> {
        Ok(ScoreRecord {
            community_id: row.get(0)?,
            user_id: row.get(1)?,
            score: row.get(2)?,
            total_events: row.get::<_, i64>(3)? as u64,
            last_event_at_ns: row.get::<_, i64>(4)? as u64,
        })
    }

    fn event_from_row(row: &Row<'_>) -> Result<ReputationEvent, rusqlite::Error> {
        let metadata_json: String = row.get(8)?;
        let metadata = parse_metadata(&metadata_json);
        Ok(ReputationEvent {
            seq_id: row.get::<_, i64>(0)? as u64,
            community_id: row.get(1)?,
            user_id: row.get(2)?,
            event_type: row.get(3)?,
            score_change: row.get(4)?,
            score_before: row.get(5)?,
            score_after: row.get(6)?,
            reason: row.get(7)?,
            metadata,
            created_at_ns: row.get::<_, i64>(9)? as u64,
        })
    }
}

fn parse_metadata(json: &str) -> Map<String, Value> {
    match serde_json::from_str(json) {
        Ok(Value::Object(map)) => map,
        _ => {
            warn!(raw = json, "unparseable event metadata in history row");
            Map::new()
        }
    }
}

fn serialize_metadata(metadata: &Map<String, Value>) -> Result<String, ReputationError> {
    serde_json::to_string(metadata).map_err(storage_err)
}

const UPSERT_SCORE_SQL: &str = "INSERT INTO scores \
     (community_id, user_id, score, total_events, last_event_at_ns) \
     VALUES (?1, ?2, ?3, 1, ?4) \
     ON CONFLICT(community_id, user_id) DO UPDATE SET \
         score = excluded.score, \
         total_events = scores.total_events + 1, \
         last_event_at_ns = excluded.last_event_at_ns";

const UPSERT_GLOBAL_SQL: &str = "INSERT INTO global_scores \
     (user_id, score, total_events, last_event_at_ns) \
     VALUES (?1, ?2, 1, ?3) \
     ON CONFLICT(user_id) DO UPDATE SET \
         score = excluded.score, \
         total_events = global_scores.total_events + 1, \
         last_event_at_ns = excluded.last_event_at_ns";

const INSERT_EVENT_SQL: &str = "INSERT INTO reputation_events \
     (community_id, user_id, event_type, score_change, score_before, score_after, \
      reason, metadata, created_at_ns) \
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)";

impl ScoreStore for SqliteScoreStore {
    fn apply_adjustment(
        &self,
        write: &AdjustmentWrite,
    ) -> Result<AppliedAdjustment, ReputationError> {
        let metadata_json = serialize_metadata(&write.metadata)?;
        let timestamp_ns = now_ns();

        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(storage_err)?;

        let (score_before, prior_events) =
            Self::read_score_in_tx(&tx, &write.community_id, &write.user_id)
                .map_err(storage_err)?
                .unwrap_or((SCORE_DEFAULT, 0));
        let (score_after, score_change) = apply_delta(score_before, write.community_delta);

        tx.execute(
            UPSERT_SCORE_SQL,
            params![
                write.community_id,
                write.user_id,
                score_after,
                timestamp_ns as i64
            ],
        )
        .map_err(storage_err)?;

        let global_score_after = match write.global_delta {
            Some(global_delta) => {
                let global_before = Self::read_global_in_tx(&tx, &write.user_id)
                    .map_err(storage_err)?
                    .unwrap_or(SCORE_DEFAULT);
                let (global_after, _) = apply_delta(global_before, global_delta);
                tx.execute(
                    UPSERT_GLOBAL_SQL,
                    params![write.user_id, global_after, timestamp_ns as i64],
                )
                .map_err(storage_err)?;
                Some(global_after)
            }
            None => None,
        };

        tx.execute(
            INSERT_EVENT_SQL,
            params![
                write.community_id,
                write.user_id,
                write.event_type,
                score_change,
                score_before,
                score_after,
                "",
                metadata_json,
                timestamp_ns as i64
            ],
        )
        .map_err(storage_err)?;
        let event_seq_id = tx.last_insert_rowid() as u64;

        tx.commit().map_err(storage_err)?;

        debug!(
            community_id = %write.community_id,
            user_id = %write.user_id,
            event_type = %write.event_type,
            score_before,
            score_after,
            "applied score adjustment"
        );

        Ok(AppliedAdjustment {
            score_before,
            score_after,
            score_change,
            total_events: prior_events + 1,
            global_score_after,
            event_seq_id,
        })
    }

    fn set_score(
        &self,
        community_id: &str,
        user_id: &str,
        new_score: f64,
        reason: &str,
        set_by: &str,
    ) -> Result<AppliedAdjustment, ReputationError> {
        let new_score = clamp_score(new_score);
        let timestamp_ns = now_ns();
        let mut metadata = Map::new();
        metadata.insert("set_by".to_string(), Value::String(set_by.to_string()));
        let metadata_json = serialize_metadata(&metadata)?;

        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(storage_err)?;

        let (score_before, prior_events) =
            Self::read_score_in_tx(&tx, community_id, user_id)
                .map_err(storage_err)?
                .unwrap_or((SCORE_DEFAULT, 0));

        tx.execute(
            UPSERT_SCORE_SQL,
            params![community_id, user_id, new_score, timestamp_ns as i64],
        )
        .map_err(storage_err)?;

        tx.execute(
            INSERT_EVENT_SQL,
            params![
                community_id,
                user_id,
                MANUAL_ADJUSTMENT_EVENT_TYPE,
                new_score - score_before,
                score_before,
                new_score,
                reason,
                metadata_json,
                timestamp_ns as i64
            ],
        )
        .map_err(storage_err)?;
        let event_seq_id = tx.last_insert_rowid() as u64;

        tx.commit().map_err(storage_err)?;

        debug!(
            community_id,
            user_id, score_before, new_score, set_by, "manual score override"
        );

        Ok(AppliedAdjustment {
            score_before,
            score_after: new_score,
            score_change: new_score - score_before,
            total_events: prior_events + 1,
            global_score_after: None,
            event_seq_id,
        })
    }

    fn score(
        &self,
        community_id: &str,
        user_id: &str,
    ) -> Result<Option<ScoreRecord>, ReputationError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT community_id, user_id, score, total_events, last_event_at_ns \
             FROM scores WHERE community_id = ?1 AND user_id = ?2",
            params![community_id, user_id],
            |row| Self::score_record_from_row(row),
        )
        .optional()
        .map_err(storage_err)
    }

    fn global_score(&self, user_id: &str) -> Result<Option<GlobalScoreRecord>, ReputationError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT user_id, score, total_events, last_event_at_ns \
             FROM global_scores WHERE user_id = ?1",
            params![user_id],
            |row| {
                Ok(GlobalScoreRecord {
                    user_id: row.get(0)?,
                    score: row.get(1)?,
                    total_events: row.get::<_, i64>(2)? as u64,
                    last_event_at_ns: row.get::<_, i64>(3)? as u64,
                })
            },
        )
        .optional()
        .map_err(storage_err)
    }

    fn history(
        &self,
        community_id: &str,
        user_id: &str,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<ReputationEvent>, ReputationError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT seq_id, community_id, user_id, event_type, score_change, \
                        score_before, score_after, reason, metadata, created_at_ns \
                 FROM reputation_events \
                 WHERE community_id = ?1 AND user_id = ?2 \
                 ORDER BY seq_id DESC \
                 LIMIT ?3 OFFSET ?4",
            )
            .map_err(storage_err)?;
        let events = stmt
            .query_map(
                params![community_id, user_id, limit as i64, offset as i64],
                |row| Self::event_from_row(row),
            )
            .map_err(storage_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(storage_err)?;
        Ok(events)
    }

    fn leaderboard(
        &self,
        community_id: &str,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<ScoreRecord>, ReputationError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT community_id, user_id, score, total_events, last_event_at_ns \
                 FROM scores \
                 WHERE community_id = ?1 \
                 ORDER BY score DESC, last_event_at_ns ASC \
                 LIMIT ?2 OFFSET ?3",
            )
            .map_err(storage_err)?;
        let records = stmt
            .query_map(params![community_id, limit as i64, offset as i64], |row| {
                Self::score_record_from_row(row)
            })
            .map_err(storage_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(storage_err)?;
        Ok(records)
    }

    fn scores_at_or_below(
        &self,
        community_id: &str,
        ceiling: f64,
    ) -> Result<Vec<ScoreRecord>, ReputationError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT community_id, user_id, score, total_events, last_event_at_ns \
                 FROM scores \
                 WHERE community_id = ?1 AND score <= ?2 \
                 ORDER BY score ASC",
            )
            .map_err(storage_err)?;
        let records = stmt
            .query_map(params![community_id, ceiling], |row| {
                Self::score_record_from_row(row)
            })
            .map_err(storage_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(storage_err)?;
        Ok(records)
    }

    fn policy_config(
        &self,
        community_id: &str,
    ) -> Result<Option<PolicyConfig>, ReputationError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT auto_ban_enabled, auto_ban_threshold, at_risk_buffer \
             FROM policy_configs WHERE community_id = ?1",
            params![community_id],
            |row| {
                Ok(PolicyConfig {
                    auto_ban_enabled: row.get::<_, i64>(0)? != 0,
                    auto_ban_threshold: row.get(1)?,
                    at_risk_buffer: row.get(2)?,
                })
            },
        )
        .optional()
        .map_err(storage_err)
    }

    fn upsert_policy_config(
        &self,
        community_id: &str,
        config: &PolicyConfig,
    ) -> Result<(), ReputationError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO policy_configs \
             (community_id, auto_ban_enabled, auto_ban_threshold, at_risk_buffer, updated_at_ns) \
             VALUES (?1, ?2, ?3, ?4, ?5) \
             ON CONFLICT(community_id) DO UPDATE SET \
                 auto_ban_enabled = excluded.auto_ban_enabled, \
                 auto_ban_threshold = excluded.auto_ban_threshold, \
                 at_risk_buffer = excluded.at_risk_buffer, \
                 updated_at_ns = excluded.updated_at_ns",
            params![
                community_id,
                i64::from(config.auto_ban_enabled),
                config.auto_ban_threshold,
                config.at_risk_buffer,
                now_ns() as i64
            ],
        )
        .map_err(storage_err)?;
        Ok(())
    }

    fn replace_custom_weights(&self, table: &CustomWeightTable) -> Result<(), ReputationError> {
        let timestamp_ns = now_ns();
        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(storage_err)?;

        tx.execute(
            "DELETE FROM custom_weights WHERE community_id = ?1",
            params![table.community_id],
        )
        .map_err(storage_err)?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO custom_weights (community_id, event_type, weight, updated_at_ns) \
                     VALUES (?1, ?2, ?3, ?4)",
                )
                .map_err(storage_err)?;
            for (&event_type, &weight) in &table.weights {
                stmt.execute(params![
                    table.community_id,
                    event_type.as_str(),
                    weight,
                    timestamp_ns as i64
                ])
                .map_err(storage_err)?;
            }
        }
        tx.commit().map_err(storage_err)?;

        debug!(
            community_id = %table.community_id,
            overrides = table.weights.len(),
            "replaced custom weight table"
        );
        Ok(())
    }

    fn stats(&self) -> Result<StoreStats, ReputationError> {
        let conn = self.lock()?;
        let event_count: i64 = conn
            .query_row("SELECT COUNT(*) FROM reputation_events", [], |row| {
                row.get(0)
            })
            .map_err(storage_err)?;
        let score_count: i64 = conn
            .query_row("SELECT COUNT(*) FROM scores", [], |row| row.get(0))
            .map_err(storage_err)?;
        let global_score_count: i64 = conn
            .query_row("SELECT COUNT(*) FROM global_scores", [], |row| row.get(0))
            .map_err(storage_err)?;
        Ok(StoreStats {
            event_count: event_count as u64,
            score_count: score_count as u64,
            global_score_count: global_score_count as u64,
        })
    }
}

impl CustomWeightSource for SqliteScoreStore {
    fn custom_weights(
        &self,
        community_id: &str,
    ) -> Result<Option<CustomWeightTable>, ReputationError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT event_type, weight, updated_at_ns \
                 FROM custom_weights WHERE community_id = ?1",
            )
            .map_err(storage_err)?;
        let rows = stmt
            .query_map(params![community_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, f64>(1)?,
                    row.get::<_, i64>(2)? as u64,
                ))
            })
            .map_err(storage_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(storage_err)?;

        if rows.is_empty() {
            return Ok(None);
        }

        let mut weights = std::collections::HashMap::new();
        let mut updated_at_ns = 0;
        for (type_str, weight, row_updated) in rows {
            match type_str.parse::<EventType>() {
                Ok(event_type) => {
                    weights.insert(event_type, weight);
                    updated_at_ns = updated_at_ns.max(row_updated);
                }
                // Rows are written through the typed API; an unknown type
                // here means a schema migration problem, not user input.
                Err(_) => warn!(community_id, event_type = %type_str,
                    "ignoring custom weight for unknown event type"),
            }
        }

        Ok(Some(CustomWeightTable {
            community_id: community_id.to_string(),
            weights,
            updated_at_ns,
        }))
    }
}
