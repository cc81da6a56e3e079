use config::{Config, ConfigError};
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub arango: ArangoSettings,
    pub application: ApplicationSettings,
    pub indexer: IndexerSettings,
}

/// Upstream relational store (`POSTGRES_URL`).
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// Target graph store (`ARANGO_URL`, `ARANGO_USERNAME`, `ARANGO_PASSWORD`).
#[derive(Debug, Clone, Deserialize)]
pub struct ArangoSettings {
    pub url: String,
    pub username: String,
    pub password: String,
    #[serde(default = "default_database_name")]
    pub database_name: String,
}

fn default_database_name() -> String {
    "helium".to_string()
}

/// Observability HTTP surface (`/healthz` and `/metrics` only).
#[derive(Debug, Clone, Deserialize)]
pub struct ApplicationSettings {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_cors_origin")]
    pub cors_allow_origin: String,
}

fn default_port() -> u16 {
    8080
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_cors_origin() -> String {
    "*".to_string()
}

/// Tuning knobs from (`ETL_*` environment variables).
#[derive(Debug, Clone, Deserialize)]
pub struct IndexerSettings {
    #[serde(default = "default_min_block_diff_for_update")]
    pub min_block_diff_for_update: i64,
    #[serde(default = "default_recent_witness_days_cutoff")]
    pub recent_witness_days_cutoff: i64,
    #[serde(default = "default_import_batch_size")]
    pub import_batch_size: i64,
    #[serde(default = "default_initial_sync_chunk_size")]
    pub initial_sync_chunk_size: i64,
    #[serde(default = "default_num_historical_blocks")]
    pub num_historical_blocks: i64,
    #[serde(default = "default_update_interval_sec")]
    pub update_interval_sec: u64,
    #[serde(default = "default_min_city_size")]
    pub min_city_size: usize,
    #[serde(default = "default_drain_timeout_sec")]
    pub drain_timeout_sec: u64,
}

fn default_min_block_diff_for_update() -> i64 {
    1000
}

fn default_recent_witness_days_cutoff() -> i64 {
    5
}

fn default_import_batch_size() -> i64 {
    1000
}

fn default_initial_sync_chunk_size() -> i64 {
    50_000
}

fn default_num_historical_blocks() -> i64 {
    1_000_000
}

fn default_update_interval_sec() -> u64 {
    300
}

fn default_min_city_size() -> usize {
    10
}

fn default_drain_timeout_sec() -> u64 {
    60
}

/// Reads an optional env var into a builder override, leaving the field's
/// serde default in place when unset.
fn overlay_env(builder: config::ConfigBuilder<config::builder::DefaultState>, key: &str, env_var: &str) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
    match env::var(env_var) {
        Ok(value) => builder.set_override(key, value),
        Err(_) => Ok(builder),
    }
}

impl Settings {
    /// Mandatory: `POSTGRES_URL`, `ARANGO_URL`, `ARANGO_USERNAME`,
    /// `ARANGO_PASSWORD`. The rest are optional tuning knobs with defaults.
    pub fn new() -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .add_source(config::File::with_name("config").required(false))
            .set_default("application.host", "0.0.0.0")?
            .set_default("application.port", 8080)?;

        builder = overlay_env(builder, "database.url", "POSTGRES_URL")?;
        builder = overlay_env(builder, "arango.url", "ARANGO_URL")?;
        builder = overlay_env(builder, "arango.username", "ARANGO_USERNAME")?;
        builder = overlay_env(builder, "arango.password", "ARANGO_PASSWORD")?;
        builder = overlay_env(builder, "arango.database_name", "ARANGO_DATABASE_NAME")?;

        builder = overlay_env(
            builder,
            "indexer.min_block_diff_for_update",
            "ETL_MIN_BLOCK_DIFF_FOR_UPDATE",
        )?;
        builder = overlay_env(
            builder,
            "indexer.recent_witness_days_cutoff",
            "ETL_RECENT_WITNESS_DAYS_CUTOFF",
        )?;
        builder = overlay_env(builder, "indexer.import_batch_size", "ETL_IMPORT_BATCH_SIZE")?;
        builder = overlay_env(
            builder,
            "indexer.initial_sync_chunk_size",
            "ETL_INITIAL_SYNC_CHUNK_SIZE",
        )?;
        builder = overlay_env(
            builder,
            "indexer.num_historical_blocks",
            "ETL_NUM_HISTORICAL_BLOCKS",
        )?;
        builder = overlay_env(builder, "indexer.update_interval_sec", "ETL_UPDATE_INTERVAL_SEC")?;
        builder = overlay_env(builder, "indexer.min_city_size", "MIN_CITY_SIZE")?;

        builder.build()?.try_deserialize()
    }
}
