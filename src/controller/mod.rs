//! Sync Controller: the `INIT → INVENTORY_SYNC →
//! DYNAMIC_SYNC → FOLLOW` state machine that drives every other module on
//! a schedule. This is the only place process-wide mutable state
//! (`sync_height`) lives; everything it calls returns values rather than
//! mutating shared fields.

use crate::analytics;
use crate::config::IndexerSettings;
use crate::error::Result;
use crate::observability::Metrics;
use crate::pipeline::{self, drain};
use crate::sink::{ArangoSink, OnDuplicate};
use crate::source::{BatchCursor, SourceAdapter};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

const DYNAMIC_SYNC_WORKERS: i64 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SyncState {
    Init,
    InventorySync,
    DynamicSync,
    Follow,
}

impl SyncState {
    fn as_str(self) -> &'static str {
        match self {
            Self::Init => "INIT",
            Self::InventorySync => "INVENTORY_SYNC",
            Self::DynamicSync => "DYNAMIC_SYNC",
            Self::Follow => "FOLLOW",
        }
    }
}

pub struct SyncController {
    database_url: String,
    source: SourceAdapter,
    sink: ArangoSink,
    settings: IndexerSettings,
    metrics: Metrics,
    state: SyncState,
    sync_height: i64,
}

impl SyncController {
    pub fn new(
        database_url: String,
        source: SourceAdapter,
        sink: ArangoSink,
        settings: IndexerSettings,
        metrics: Metrics,
    ) -> Self {
        Self {
            database_url,
            source,
            sink,
            settings,
            metrics,
            state: SyncState::Init,
            sync_height: 0,
        }
    }

    /// Runs the state machine until `shutdown` fires. A fatal error from
    /// any phase aborts the loop.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        loop {
            if *shutdown.borrow() {
                info!("shutdown requested, stopping sync controller");
                return Ok(());
            }

            self.metrics.record_sync_state(self.state.as_str());
            info!(state = self.state.as_str(), sync_height = self.sync_height, "entering state");

            match self.state {
                SyncState::Init => {
                    let current = self.source.current_height().await?;
                    self.sync_height = (current - self.settings.num_historical_blocks as i64).max(0);
                    self.state = SyncState::InventorySync;
                }
                SyncState::InventorySync => {
                    self.run_inventory_sync().await?;
                    self.state = SyncState::DynamicSync;
                }
                SyncState::DynamicSync => {
                    self.run_dynamic_sync().await?;
                    self.state = SyncState::Follow;
                }
                SyncState::Follow => {
                    let current = self.source.current_height().await?;
                    if current - self.sync_height >= self.settings.min_block_diff_for_update as i64 {
                        self.state = SyncState::InventorySync;
                    } else {
                        tokio::select! {
                            _ = tokio::time::sleep(Duration::from_secs(self.settings.update_interval_sec)) => {}
                            _ = shutdown.changed() => {}
                        }
                    }
                }
            }
        }
    }

    /// Accounts, hotspots, cities, witnesses, rewards, and city analytics,
    /// in that order, before `DYNAMIC_SYNC` begins.
    async fn run_inventory_sync(&mut self) -> Result<()> {
        let batch_size = self.settings.import_batch_size as i64;

        let mut accounts = self.source.accounts_cursor(batch_size);
        let accounts_stats = drain(&mut accounts, |batch| {
            let sink = self.sink.clone();
            Box::pin(async move { sink.bulk_upsert("accounts", &batch, OnDuplicate::Update).await })
        })
        .await?;
        self.metrics.record_rows_drained(accounts_stats.created + accounts_stats.updated);
        info!(created = accounts_stats.created, updated = accounts_stats.updated, "accounts synced");

        let mut hotspots = self.source.hotspots_cursor(batch_size);
        let hotspot_stats = drain(&mut hotspots, |batch| {
            let sink = self.sink.clone();
            Box::pin(async move { sink.bulk_upsert("hotspots", &batch, OnDuplicate::Update).await })
        })
        .await?;
        self.metrics.record_rows_drained(hotspot_stats.created + hotspot_stats.updated);
        info!(created = hotspot_stats.created, updated = hotspot_stats.updated, "hotspots synced");

        let mut cities = self.source.cities_cursor(batch_size);
        drain(&mut cities, |batch| {
            let sink = self.sink.clone();
            Box::pin(async move { sink.bulk_upsert("cities", &batch, OnDuplicate::Ignore).await })
        })
        .await?;

        let cutoff_days = self.settings.recent_witness_days_cutoff as i64;
        let current = self.source.current_height().await?;
        let current_time = self.source.time_of(current).await?;
        let cutoff_time = current_time - cutoff_days * 86_400;

        let mut witnesses = self.source.witnesses_cursor(batch_size, cutoff_time, current_time);
        drain(&mut witnesses, |batch| {
            let sink = self.sink.clone();
            Box::pin(async move { sink.bulk_upsert("witnesses", &batch, OnDuplicate::Ignore).await })
        })
        .await?;

        let pruned = self.sink.delete_where_older_than("witnesses", cutoff_time).await?;
        info!(pruned, "stale witness edges pruned");

        let mut rewards = self.source.rewards_cursor(batch_size, cutoff_time, current_time);
        loop {
            let batch = rewards.next_batch().await?;
            if batch.is_empty() {
                break;
            }
            self.sink.set_rewards(&batch).await?;
            if rewards.is_complete() {
                break;
            }
        }

        let city_keys = self.sink.all_city_keys().await?;
        analytics::run_all_cities(&self.sink, &self.metrics, &city_keys, self.settings.min_city_size as usize).await?;

        Ok(())
    }

    /// `DYNAMIC_SYNC` loop. Advances `sync_height` in windows of
    /// `initial_sync_chunk_size` blocks, draining payments, witnesses, and
    /// daily balances for each window across `DYNAMIC_SYNC_WORKERS`
    /// isolated connections.
    async fn run_dynamic_sync(&mut self) -> Result<()> {
        let chunk = self.settings.initial_sync_chunk_size as i64;
        let current_height = self.source.current_height().await?;

        let mut min_time = self.source.time_of(self.sync_height).await?;
        let mut max_time = self.source.time_of((self.sync_height + chunk).min(current_height)).await?;

        while self.sync_height < current_height {
            if let Err(e) = self.parallel_drain_payments(min_time, max_time).await {
                self.metrics.record_chunk_failed();
                warn!(error = %e, min_time, max_time, "payments chunk failed, advancing anyway");
            }
            if let Err(e) = self.parallel_drain_witnesses(min_time, max_time).await {
                self.metrics.record_chunk_failed();
                warn!(error = %e, min_time, max_time, "witnesses chunk failed, advancing anyway");
            }
            if let Err(e) = self.parallel_drain_daily_balances(min_time, max_time).await {
                self.metrics.record_chunk_failed();
                warn!(error = %e, min_time, max_time, "daily balances chunk failed, advancing anyway");
            }

            self.sync_height = self.source.height_at_or_after(max_time).await?;
            min_time = max_time;
            let current_time = self.source.time_of(current_height).await?;
            let next_boundary = self.source.time_of((self.sync_height + chunk).min(current_height)).await?;
            max_time = next_boundary.min(current_time);
        }

        Ok(())
    }

    async fn parallel_drain_payments(&self, min_time: i64, max_time: i64) -> Result<()> {
        let ranges = pipeline::partition_time_range(min_time, max_time, DYNAMIC_SYNC_WORKERS);
        let mut handles = Vec::with_capacity(ranges.len());

        for (start, end) in ranges {
            let database_url = self.database_url.clone();
            let sink = self.sink.clone();
            let batch_size = self.settings.import_batch_size as i64;
            handles.push(tokio::spawn(async move {
                let source = SourceAdapter::connect_isolated(&database_url).await?;
                let mut cursor = source.payments_cursor(batch_size, start, end);
                drain(&mut cursor, |batch| {
                    let sink = sink.clone();
                    Box::pin(async move { sink.bulk_upsert("payments", &batch, OnDuplicate::Ignore).await })
                })
                .await
            }));
        }

        let mut first_error = None;
        for handle in handles {
            match handle.await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    error!(error = %e, "payments worker failed");
                    first_error.get_or_insert(e);
                }
                Err(join_err) => error!(error = %join_err, "payments worker panicked"),
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn parallel_drain_daily_balances(&self, min_time: i64, max_time: i64) -> Result<()> {
        let ranges = pipeline::partition_time_range(min_time, max_time, DYNAMIC_SYNC_WORKERS);
        let mut handles = Vec::with_capacity(ranges.len());

        for (start, end) in ranges {
            let database_url = self.database_url.clone();
            let sink = self.sink.clone();
            let batch_size = self.settings.import_batch_size as i64;
            handles.push(tokio::spawn(async move {
                let source = SourceAdapter::connect_isolated(&database_url).await?;
                let mut cursor = source.daily_balances_cursor(batch_size, start, end);
                drain(&mut cursor, |batch| {
                    let sink = sink.clone();
                    Box::pin(async move { sink.append_daily_balances(&batch).await })
                })
                .await
            }));
        }

        let mut first_error = None;
        for handle in handles {
            match handle.await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    error!(error = %e, "daily balances worker failed");
                    first_error.get_or_insert(e);
                }
                Err(join_err) => error!(error = %join_err, "daily balances worker panicked"),
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn parallel_drain_witnesses(&self, min_time: i64, max_time: i64) -> Result<()> {
        let ranges = pipeline::partition_time_range(min_time, max_time, DYNAMIC_SYNC_WORKERS);
        let mut handles = Vec::with_capacity(ranges.len());

        for (start, end) in ranges {
            let database_url = self.database_url.clone();
            let sink = self.sink.clone();
            let batch_size = self.settings.import_batch_size as i64;
            handles.push(tokio::spawn(async move {
                let source = SourceAdapter::connect_isolated(&database_url).await?;
                let mut cursor = source.witnesses_cursor(batch_size, start, end);
                drain(&mut cursor, |batch| {
                    let sink = sink.clone();
                    Box::pin(async move { sink.bulk_upsert("witnesses", &batch, OnDuplicate::Ignore).await })
                })
                .await
            }));
        }

        let mut first_error = None;
        for handle in handles {
            match handle.await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    error!(error = %e, "witnesses worker failed");
                    first_error.get_or_insert(e);
                }
                Err(join_err) => error!(error = %join_err, "witnesses worker panicked"),
            }
        }

        // The recent-edge cutoff is advisory here; stale-edge pruning
        // runs once per inventory sync, not per dynamic
        // sync window.
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
