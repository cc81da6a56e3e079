use crate::error::{EtlError, Result};
use std::env;

const REQUIRED_ENV_VARS: &[&str] = &["POSTGRES_URL", "ARANGO_URL", "ARANGO_USERNAME", "ARANGO_PASSWORD"];

/// Fatal configuration errors abort the process before any connection is
/// attempted.
pub fn validate_settings(settings: &super::Settings) -> Result<()> {
    for var in REQUIRED_ENV_VARS {
        if env::var(var).is_err() {
            return Err(EtlError::Config(format!(
                "required environment variable {} is not set",
                var
            )));
        }
    }

    if settings.database.max_connections < settings.database.min_connections {
        return Err(EtlError::Config(format!(
            "database.max_connections ({}) must be >= database.min_connections ({})",
            settings.database.max_connections, settings.database.min_connections
        )));
    }

    if settings.indexer.min_city_size == 0 {
        return Err(EtlError::Config(
            "indexer.min_city_size must be at least 1".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ApplicationSettings, ArangoSettings, DatabaseSettings, IndexerSettings, Settings};

    fn base_settings() -> Settings {
        Settings {
            database: DatabaseSettings {
                url: "postgres://localhost/test".into(),
                max_connections: 10,
                min_connections: 1,
            },
            arango: ArangoSettings {
                url: "http://localhost:8529".into(),
                username: "root".into(),
                password: "".into(),
                database_name: "helium".into(),
            },
            application: ApplicationSettings {
                port: 8080,
                host: "0.0.0.0".into(),
                cors_allow_origin: "*".into(),
            },
            indexer: IndexerSettings {
                min_block_diff_for_update: 1000,
                recent_witness_days_cutoff: 5,
                import_batch_size: 1000,
                initial_sync_chunk_size: 50_000,
                num_historical_blocks: 1_000_000,
                update_interval_sec: 300,
                min_city_size: 10,
                drain_timeout_sec: 60,
            },
        }
    }

    fn with_required_env_vars<T>(f: impl FnOnce() -> T) -> T {
        for var in REQUIRED_ENV_VARS {
            env::set_var(var, "set-for-test");
        }
        let result = f();
        for var in REQUIRED_ENV_VARS {
            env::remove_var(var);
        }
        result
    }

    #[test]
    fn rejects_max_less_than_min_connections() {
        with_required_env_vars(|| {
            let mut settings = base_settings();
            settings.database.max_connections = 1;
            settings.database.min_connections = 5;
            assert!(validate_settings(&settings).is_err());
        });
    }

    #[test]
    fn rejects_zero_min_city_size() {
        with_required_env_vars(|| {
            let mut settings = base_settings();
            settings.indexer.min_city_size = 0;
            assert!(validate_settings(&settings).is_err());
        });
    }

    #[test]
    fn accepts_well_formed_settings() {
        with_required_env_vars(|| {
            assert!(validate_settings(&base_settings()).is_ok());
        });
    }

    #[test]
    fn rejects_missing_required_env_var() {
        env::remove_var("ARANGO_PASSWORD");
        let settings = base_settings();
        assert!(validate_settings(&settings).is_err());
    }
}
