//! Durable request log and replay-protected payment-proof store.
//!
//! Backed by Postgres via `sqlx`. The batched logger follows a guarded-buffer,
//! swap-then-release shape: entries accumulate behind a short-held
//! `tokio::sync::Mutex`, flushed by a background task on an interval tick or batch-size
//! threshold, whichever comes first.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, QueryBuilder, Row};
use tokio::sync::Mutex;
use tokio::time::interval;
use uuid::Uuid;

const FLUSH_INTERVAL: Duration = Duration::from_secs(2);
const BATCH_SIZE: usize = 50;

/// One row of the append-only request log.
#[derive(Debug, Clone)]
pub struct RequestLogEntry {
    pub id: Uuid,
    pub service_id: String,
    pub endpoint: String,
    pub payer: Option<String>,
    pub caip2: Option<String>,
    pub amount_base_units: Option<String>,
    pub upstream_status: Option<i32>,
    pub latency_ms: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default, Clone)]
pub struct LedgerStats {
    pub total_requests: i64,
    pub requests_last_day: i64,
    pub total_used_proofs: i64,
}

/// Durable store of requests and used payment proofs.
pub struct Ledger {
    pool: PgPool,
    buffer: Arc<Mutex<Vec<RequestLogEntry>>>,
}

impl Ledger {
    pub async fn connect(database_url: &str, pool_size: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(pool_size)
            .connect(database_url)
            .await?;
        Ok(Self {
            pool,
            buffer: Arc::new(Mutex::new(Vec::with_capacity(BATCH_SIZE))),
        })
    }

    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    /// Enqueues a log entry for asynchronous batched insertion. Never fails the caller;
    /// insertion failures surface only in logs.
    pub async fn log_request(&self, entry: RequestLogEntry) {
        let mut buffer = self.buffer.lock().await;
        buffer.push(entry);
        if buffer.len() >= BATCH_SIZE {
            let batch = std::mem::take(&mut *buffer);
            drop(buffer);
            self.insert_batch(batch).await;
        }
    }

    /// Spawns the background flusher. Returns a handle the caller can await during
    /// graceful shutdown to guarantee the buffer drains before exit.
    pub fn spawn_flusher(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let ledger = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = interval(FLUSH_INTERVAL);
            loop {
                ticker.tick().await;
                ledger.flush().await;
            }
        })
    }

    /// Drains the buffer immediately. Called on each interval tick and on shutdown.
    pub async fn flush(&self) {
        let mut buffer = self.buffer.lock().await;
        if buffer.is_empty() {
            return;
        }
        let batch = std::mem::take(&mut *buffer);
        drop(buffer);
        self.insert_batch(batch).await;
    }

    async fn insert_batch(&self, batch: Vec<RequestLogEntry>) {
        if batch.is_empty() {
            return;
        }
        let mut builder = QueryBuilder::new(
            "INSERT INTO requests \
             (id, service_id, endpoint, payer, caip2, amount_base_units, upstream_status, latency_ms, created_at) ",
        );
        builder.push_values(&batch, |mut row, entry| {
            row.push_bind(entry.id)
                .push_bind(&entry.service_id)
                .push_bind(&entry.endpoint)
                .push_bind(&entry.payer)
                .push_bind(&entry.caip2)
                .push_bind(&entry.amount_base_units)
                .push_bind(entry.upstream_status)
                .push_bind(entry.latency_ms)
                .push_bind(entry.created_at);
        });
        if let Err(err) = builder.build().execute(&self.pool).await {
            tracing::warn!(error = %err, batch_len = batch.len(), "failed to persist request log batch");
        }
    }

    /// Atomic insert-or-ignore. Returns `true` iff this call performed the first
    /// insert of `proof_key` (payment accepted); `false` means a replay.
    pub async fn record_proof(
        &self,
        proof_key: &str,
        payer: &str,
        amount_base_units: alloy_primitives::U256,
        caip2: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO used_proofs (proof_key, payer, amount_base_units, caip2, accepted_at) \
             VALUES ($1, $2, $3, $4, now()) \
             ON CONFLICT (proof_key) DO NOTHING",
        )
        .bind(proof_key)
        .bind(payer)
        .bind(amount_base_units.to_string())
        .bind(caip2)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Fast-path probe. Never authoritative: two concurrent callers may both see
    /// `false` and both attempt [`Ledger::record_proof`], which is where the real
    /// atomic decision happens.
    pub async fn is_proof_used(&self, proof_key: &str) -> Result<bool, sqlx::Error> {
        let row: Option<PgRow> =
            sqlx::query("SELECT 1 FROM used_proofs WHERE proof_key = $1")
                .bind(proof_key)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.is_some())
    }

    /// Uses the storage engine's approximate row-count catalog for totals, and a
    /// bounded recent-window query for the last-24h count, avoiding sequential scans.
    pub async fn stats(&self) -> Result<LedgerStats, sqlx::Error> {
        let total_requests: (i64,) = sqlx::query_as(
            "SELECT COALESCE(reltuples, 0)::bigint FROM pg_class WHERE relname = 'requests'",
        )
        .fetch_one(&self.pool)
        .await?;
        let total_used_proofs: (i64,) = sqlx::query_as(
            "SELECT COALESCE(reltuples, 0)::bigint FROM pg_class WHERE relname = 'used_proofs'",
        )
        .fetch_one(&self.pool)
        .await?;
        let requests_last_day: (i64,) =
            sqlx::query_as("SELECT count(*) FROM requests WHERE created_at > now() - interval '1 day'")
                .fetch_one(&self.pool)
                .await?;
        Ok(LedgerStats {
            total_requests: total_requests.0,
            requests_last_day: requests_last_day.0,
            total_used_proofs: total_used_proofs.0,
        })
    }

    /// Scheduled daily. Deletes request-log rows past the retention window.
    pub async fn cleanup_old_requests(&self, days: u32) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM requests WHERE created_at < now() - ($1 || ' days')::interval",
        )
        .bind(days.to_string())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pg_url() -> Option<String> {
        std::env::var("DATABASE_URL").ok()
    }

    /// Requires a live Postgres instance; skipped in CI without `DATABASE_URL`,
    /// matching common `sqlx` test conventions.
    #[tokio::test]
    #[ignore]
    async fn record_proof_rejects_replay() {
        let Some(url) = pg_url() else { return };
        let ledger = Ledger::connect(&url, 5).await.unwrap();
        ledger.run_migrations().await.unwrap();
        let payer = "0x0000000000000000000000000000000000000000";
        let amount = alloy_primitives::U256::from(1u64);
        let first = ledger
            .record_proof("0xtest-replay", payer, amount, "eip155:4326")
            .await
            .unwrap();
        let second = ledger
            .record_proof("0xtest-replay", payer, amount, "eip155:4326")
            .await
            .unwrap();
        assert!(first);
        assert!(!second);
    }
}
