//! Source Adapter.
//!
//! Wraps the upstream Postgres pool and exposes the height/time lookups the
//! Sync Controller needs plus factory methods for each concrete cursor.
//! Queries here are wrapped in a retry policy (`tokio_retry`, exponential
//! backoff with jitter, capped attempts) since this is the one source of
//! true network-flakiness in the pipeline.

mod cursor;
mod models;
mod witness;

pub use cursor::{
    payment_key, AccountsCursor, BatchCursor, CitiesCursor, DailyBalancesCursor, HotspotsCursor,
    PaymentsCursor, RewardsCursor, WitnessesCursor,
};
pub use models::TransactionType;
pub use witness::witness_edge_key;

use crate::error::{EtlError, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;

const MAX_RETRY_ATTEMPTS: usize = 5;
const MAX_BACKOFF_MS: u64 = 30_000;

fn retry_strategy() -> impl Iterator<Item = Duration> {
    ExponentialBackoff::from_millis(200)
        .max_delay(Duration::from_millis(MAX_BACKOFF_MS))
        .map(jitter)
        .take(MAX_RETRY_ATTEMPTS)
}

pub struct SourceAdapter {
    pool: PgPool,
}

impl SourceAdapter {
    /// Opens a dedicated single-connection pool, for callers (parallel
    /// ingest workers) that must not share a connection with any other
    /// worker.
    pub async fn connect_isolated(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect(database_url)
            .await
            .map_err(|e| EtlError::ConnectFatal(e.to_string()))?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> PgPool {
        self.pool.clone()
    }

    /// Highest block height the source has observed.
    pub async fn current_height(&self) -> Result<i64> {
        let pool = self.pool.clone();
        Retry::spawn(retry_strategy(), move || {
            let pool = pool.clone();
            async move {
                sqlx::query_scalar::<_, i64>("SELECT MAX(height) FROM blocks")
                    .fetch_one(&pool)
                    .await
            }
        })
        .await
        .map_err(|e| EtlError::ConnectTransient(e))
    }

    /// Unix timestamp of a given block height.
    pub async fn time_of(&self, height: i64) -> Result<i64> {
        let pool = self.pool.clone();
        Retry::spawn(retry_strategy(), move || {
            let pool = pool.clone();
            async move {
                sqlx::query_scalar::<_, i64>("SELECT time FROM blocks WHERE height = $1")
                    .bind(height)
                    .fetch_one(&pool)
                    .await
            }
        })
        .await
        .map_err(|e| EtlError::ConnectTransient(e))
    }

    /// Lowest block height whose time is greater than or equal to
    /// `timestamp`.
    pub async fn height_at_or_after(&self, timestamp: i64) -> Result<i64> {
        let pool = self.pool.clone();
        Retry::spawn(retry_strategy(), move || {
            let pool = pool.clone();
            async move {
                sqlx::query_scalar::<_, i64>(
                    "SELECT MIN(height) FROM blocks WHERE time >= $1",
                )
                .bind(timestamp)
                .fetch_one(&pool)
                .await
            }
        })
        .await
        .map_err(|e| EtlError::ConnectTransient(e))
    }

    pub fn accounts_cursor(&self, batch_size: i64) -> AccountsCursor {
        AccountsCursor::new(self.pool.clone(), batch_size)
    }

    pub fn hotspots_cursor(&self, batch_size: i64) -> HotspotsCursor {
        HotspotsCursor::new(self.pool.clone(), batch_size)
    }

    pub fn cities_cursor(&self, batch_size: i64) -> CitiesCursor {
        CitiesCursor::new(self.pool.clone(), batch_size)
    }

    pub fn rewards_cursor(&self, batch_size: i64, min_time: i64, max_time: i64) -> RewardsCursor {
        RewardsCursor::new(self.pool.clone(), batch_size, min_time, max_time)
    }

    pub fn payments_cursor(
        &self,
        batch_size: i64,
        min_time: i64,
        max_time: i64,
    ) -> PaymentsCursor {
        PaymentsCursor::new(self.pool.clone(), batch_size, min_time, max_time)
    }

    pub fn witnesses_cursor(
        &self,
        batch_size: i64,
        min_time: i64,
        max_time: i64,
    ) -> WitnessesCursor {
        WitnessesCursor::new(self.pool.clone(), batch_size, min_time, max_time)
    }

    pub fn daily_balances_cursor(
        &self,
        batch_size: i64,
        min_time: i64,
        max_time: i64,
    ) -> DailyBalancesCursor {
        DailyBalancesCursor::new(self.pool.clone(), batch_size, min_time, max_time)
    }
}
