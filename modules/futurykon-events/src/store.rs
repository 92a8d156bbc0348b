//! EventStore: append-only fact store backed by Postgres.
//!
//! Gap-free reads are guaranteed internally. Consumers never see BIGSERIAL gaps
//! from rolled-back or in-flight transactions. This is the store's job.

use anyhow::Result;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use crate::types::{AppendEvent, StoredEvent};

const SELECT_COLUMNS: &str =
    "seq, ts, event_type, stream_id, parent_seq, caused_by_seq, actor, payload, schema_v";

// ---------------------------------------------------------------------------
// EventStore
// ---------------------------------------------------------------------------

/// Append-only fact store. The single source of truth.
#[derive(Clone)]
pub struct EventStore {
    pool: PgPool,
}

impl EventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the events table and its indexes if they don't exist.
    ///
    /// There is deliberately no uniqueness constraint on (stream_id, actor):
    /// the same user predicting twice on a question is two facts.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS events (
                seq           BIGSERIAL    PRIMARY KEY,
                ts            TIMESTAMPTZ  NOT NULL DEFAULT now(),
                event_type    TEXT         NOT NULL,
                stream_id     UUID,
                parent_seq    BIGINT       REFERENCES events(seq),
                caused_by_seq BIGINT       REFERENCES events(seq),
                actor         UUID,
                payload       JSONB        NOT NULL,
                schema_v      SMALLINT     NOT NULL DEFAULT 1
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS events_stream_idx ON events (stream_id, seq)")
            .execute(&self.pool)
            .await?;

        debug!("events table ready");
        Ok(())
    }

    /// Append a root fact and return the full StoredEvent (with ts from Postgres).
    pub async fn append_and_read(&self, event: AppendEvent) -> Result<StoredEvent> {
        self.insert(None, None, event).await
    }

    /// Append a fact caused by `parent_seq`, inheriting the parent's root cause.
    pub async fn append_child_and_read(
        &self,
        parent_seq: i64,
        event: AppendEvent,
    ) -> Result<StoredEvent> {
        let parent = sqlx::query_as::<_, (Option<i64>,)>(
            "SELECT caused_by_seq FROM events WHERE seq = $1",
        )
        .bind(parent_seq)
        .fetch_optional(&self.pool)
        .await?;

        let caused_by = match parent {
            Some((Some(root),)) => root,
            Some((None,)) => parent_seq,
            None => anyhow::bail!("parent event {parent_seq} does not exist"),
        };

        self.insert(Some(parent_seq), Some(caused_by), event).await
    }

    async fn insert(
        &self,
        parent_seq: Option<i64>,
        caused_by_seq: Option<i64>,
        event: AppendEvent,
    ) -> Result<StoredEvent> {
        let sql = format!(
            r#"
            INSERT INTO events (event_type, stream_id, parent_seq, caused_by_seq, actor, payload, schema_v)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {SELECT_COLUMNS}
            "#
        );
        let stored = sqlx::query_as::<_, StoredEvent>(&sql)
            .bind(&event.event_type)
            .bind(event.stream_id)
            .bind(parent_seq)
            .bind(caused_by_seq)
            .bind(event.actor)
            .bind(&event.payload)
            .bind(event.schema_v)
            .fetch_one(&self.pool)
            .await?;

        Ok(stored)
    }

    /// Read facts in flat sequence order starting from `seq_start` (inclusive).
    ///
    /// **Gap-free guarantee:** If concurrent transactions created a momentary gap,
    /// this returns events only up to the gap boundary. The next call picks up
    /// where it left off once the gap closes. A gap left by an aborted insert
    /// never closes; readers detect it with `latest_seq` and `peek_from`.
    pub async fn read_from(&self, seq_start: i64, limit: usize) -> Result<Vec<StoredEvent>> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM events WHERE seq >= $1 ORDER BY seq ASC LIMIT $2"
        );
        let rows = sqlx::query_as::<_, StoredEvent>(&sql)
            .bind(seq_start)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        Ok(take_gap_free(rows, seq_start))
    }

    /// The first committed fact at or after `seq`, gaps included.
    ///
    /// Lets a reader stuck at a gap see what lies beyond it (and when it was
    /// written) without consuming anything.
    pub async fn peek_from(&self, seq: i64) -> Result<Option<StoredEvent>> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM events WHERE seq >= $1 ORDER BY seq ASC LIMIT 1"
        );
        let row = sqlx::query_as::<_, StoredEvent>(&sql)
            .bind(seq)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row)
    }

    /// Read every fact about one stream (e.g. one question), in sequence order.
    pub async fn read_by_stream(&self, stream_id: Uuid) -> Result<Vec<StoredEvent>> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM events WHERE stream_id = $1 ORDER BY seq ASC"
        );
        let rows = sqlx::query_as::<_, StoredEvent>(&sql)
            .bind(stream_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    /// The latest committed sequence number, or 0 if the table is empty.
    pub async fn latest_seq(&self) -> Result<i64> {
        let row = sqlx::query_as::<_, (Option<i64>,)>("SELECT MAX(seq) FROM events")
            .fetch_one(&self.pool)
            .await?;

        Ok(row.0.unwrap_or(0))
    }
}

/// Keep the contiguous prefix of `rows` starting at `seq_start`.
pub(crate) fn take_gap_free(rows: Vec<StoredEvent>, seq_start: i64) -> Vec<StoredEvent> {
    let mut result = Vec::with_capacity(rows.len());
    let mut expected_seq = seq_start;

    for row in rows {
        if row.seq != expected_seq {
            // Gap detected. An in-flight transaction hasn't committed yet
            // (or never will). Return what we have so far.
            break;
        }
        expected_seq = row.seq + 1;
        result.push(row);
    }

    result
}

// ---------------------------------------------------------------------------
// sqlx::FromRow for StoredEvent
// ---------------------------------------------------------------------------

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for StoredEvent {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> std::result::Result<Self, sqlx::Error> {
        use sqlx::Row;
        Ok(StoredEvent {
            seq: row.try_get("seq")?,
            ts: row.try_get("ts")?,
            event_type: row.try_get("event_type")?,
            stream_id: row.try_get("stream_id")?,
            parent_seq: row.try_get("parent_seq")?,
            caused_by_seq: row.try_get("caused_by_seq")?,
            actor: row.try_get("actor")?,
            payload: row.try_get("payload")?,
            schema_v: row.try_get("schema_v")?,
        })
    }
}

// ---------------------------------------------------------------------------
// Test utilities
// ---------------------------------------------------------------------------

#[cfg(feature = "test-utils")]
impl EventStore {
    /// Read all events (for tests). No gap-free enforcement.
    pub async fn read_all(&self) -> Result<Vec<StoredEvent>> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM events ORDER BY seq ASC");
        let rows = sqlx::query_as::<_, StoredEvent>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn stored(seq: i64) -> StoredEvent {
        StoredEvent {
            seq,
            ts: Utc::now(),
            event_type: "test".into(),
            stream_id: None,
            parent_seq: None,
            caused_by_seq: None,
            actor: None,
            payload: json!({}),
            schema_v: 1,
        }
    }

    #[test]
    fn gap_free_stops_at_first_gap() {
        let rows = vec![stored(3), stored(4), stored(6), stored(7)];
        let seqs: Vec<i64> = take_gap_free(rows, 3).iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![3, 4]);
    }

    #[test]
    fn gap_free_empty_when_first_row_is_ahead() {
        let rows = vec![stored(5), stored(6)];
        assert!(take_gap_free(rows, 4).is_empty());
    }

    #[test]
    fn gap_free_passes_contiguous_rows() {
        let rows = vec![stored(1), stored(2), stored(3)];
        assert_eq!(take_gap_free(rows, 1).len(), 3);
    }
}
