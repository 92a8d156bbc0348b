//! The live board: the projection plus how fresh it is.
//!
//! A failed refresh never clears what is already loaded. The previous
//! projection stays readable, the board is flagged stale with the error,
//! and the next refresh (manual or scheduled) picks up where the last
//! successful read stopped.
//!
//! Reads stop at the first sequence gap. After each catch-up the board
//! compares its watermark with the head of the log: a young gap (a write
//! still in flight) leaves the board stale until it fills, and a gap older
//! than the grace period is an aborted insert that is skipped.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

use crate::projection::{ForecastProjector, ForecastState};
use crate::retry::RetryPolicy;
use crate::traits::EventSource;

const DEFAULT_BATCH_SIZE: usize = 500;
const DEFAULT_GAP_GRACE: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BoardStatus {
    pub last_refreshed_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub stale: bool,
    /// Every fact up to here is in the projection.
    pub last_seq: i64,
    /// Head of the log as of the last refresh.
    pub log_seq: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RefreshOutcome {
    /// Caught up with the log.
    Fresh { applied: usize },
    /// The read failed after retries, or the log holds facts the board cannot
    /// reach yet. Data from earlier refreshes (and any batches applied before
    /// the failure) is still being served.
    Stale { applied: usize, error: String },
}

impl RefreshOutcome {
    pub fn is_stale(&self) -> bool {
        matches!(self, RefreshOutcome::Stale { .. })
    }
}

/// Where the watermark stands against the head of the log.
enum Head {
    CaughtUp,
    /// More facts are readable past the watermark.
    Behind,
    /// Stuck at `missing`, a sequence number that may still commit.
    Blocked { missing: i64, log_seq: i64 },
}

pub struct ForecastBoard<S: EventSource> {
    source: S,
    projector: ForecastProjector,
    policy: RetryPolicy,
    batch_size: usize,
    gap_grace: Duration,
    state: RwLock<ForecastState>,
    status: RwLock<BoardStatus>,
}

impl<S: EventSource> ForecastBoard<S> {
    pub fn new(source: S, policy: RetryPolicy) -> Self {
        Self {
            source,
            projector: ForecastProjector,
            policy,
            batch_size: DEFAULT_BATCH_SIZE,
            gap_grace: DEFAULT_GAP_GRACE,
            state: RwLock::new(ForecastState::default()),
            status: RwLock::new(BoardStatus::default()),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// How long a sequence gap may stay open before it is treated as an
    /// insert that never committed.
    pub fn with_gap_grace(mut self, grace: Duration) -> Self {
        self.gap_grace = grace;
        self
    }

    /// Shared read access to the projection.
    pub async fn read(&self) -> RwLockReadGuard<'_, ForecastState> {
        self.state.read().await
    }

    /// Exclusive access, for the dispatch path.
    pub(crate) async fn write(&self) -> RwLockWriteGuard<'_, ForecastState> {
        self.state.write().await
    }

    pub async fn status(&self) -> BoardStatus {
        let mut status = self.status.read().await.clone();
        status.last_seq = self.state.read().await.last_seq();
        status
    }

    /// Pull every fact written since the last successful read and fold it in.
    pub async fn refresh(&self) -> RefreshOutcome {
        let mut applied = 0;
        let mut stalled_at = None;

        loop {
            if let Err(e) = self.read_batches(&mut applied).await {
                let error = e.to_string();
                warn!(applied, error = %error, "Refresh failed; serving stale data");
                return self.mark_stale(applied, error).await;
            }

            match self.inspect_head().await {
                Ok(Head::CaughtUp) => break,
                Ok(Head::Behind) => {
                    let watermark = self.state.read().await.last_seq();
                    if stalled_at == Some(watermark) {
                        let error = format!("log past seq {watermark} is not readable");
                        warn!(watermark, "Refresh made no progress; serving stale data");
                        return self.mark_stale(applied, error).await;
                    }
                    stalled_at = Some(watermark);
                }
                Ok(Head::Blocked { missing, log_seq }) => {
                    let error = format!("waiting for seq {missing} to commit (log is at {log_seq})");
                    warn!(missing, log_seq, "Refresh blocked at a sequence gap; serving stale data");
                    return self.mark_stale(applied, error).await;
                }
                Err(e) => {
                    let error = e.to_string();
                    warn!(applied, error = %error, "Reading the log head failed; serving stale data");
                    return self.mark_stale(applied, error).await;
                }
            }
        }

        let mut status = self.status.write().await;
        if status.stale {
            info!(applied, "Refresh recovered");
        }
        status.stale = false;
        status.last_error = None;
        status.last_refreshed_at = Some(Utc::now());
        RefreshOutcome::Fresh { applied }
    }

    /// Apply gap-free batches until a short batch or no progress.
    async fn read_batches(&self, applied: &mut usize) -> anyhow::Result<()> {
        loop {
            let from = self.state.read().await.last_seq() + 1;
            let batch = self
                .policy
                .run("event log read", || self.source.read_from(from, self.batch_size))
                .await?;

            if batch.is_empty() {
                return Ok(());
            }

            let mut state = self.state.write().await;
            for stored in &batch {
                if let Err(e) = self.projector.apply_stored(&mut state, stored) {
                    warn!(seq = stored.seq, event_type = %stored.event_type, error = %e, "Skipping unreadable fact");
                }
            }
            *applied += batch.len();
            debug!(from, read = batch.len(), last_seq = state.last_seq(), "Applied batch");

            if batch.len() < self.batch_size || state.last_seq() < from {
                return Ok(());
            }
        }
    }

    async fn inspect_head(&self) -> anyhow::Result<Head> {
        let log_seq = self
            .policy
            .run("event log head", || self.source.latest_seq())
            .await?;
        self.status.write().await.log_seq = log_seq;

        let watermark = self.state.read().await.last_seq();
        if log_seq <= watermark {
            return Ok(Head::CaughtUp);
        }

        let missing = watermark + 1;
        let Some(next) = self
            .policy
            .run("event log peek", || self.source.peek_from(missing))
            .await?
        else {
            return Ok(Head::CaughtUp);
        };
        if next.seq == missing {
            return Ok(Head::Behind);
        }

        let age = (Utc::now() - next.ts).to_std().unwrap_or_default();
        if age < self.gap_grace {
            return Ok(Head::Blocked { missing, log_seq });
        }

        warn!(
            from = missing,
            to = next.seq - 1,
            age_secs = age.as_secs(),
            "Skipping sequence numbers that were never committed"
        );
        self.state.write().await.skip_gap(next.seq - 1);
        Ok(Head::Behind)
    }

    async fn mark_stale(&self, applied: usize, error: String) -> RefreshOutcome {
        let mut status = self.status.write().await;
        status.stale = true;
        status.last_error = Some(error.clone());
        RefreshOutcome::Stale { applied, error }
    }
}
