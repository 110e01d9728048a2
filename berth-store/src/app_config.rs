use berth_core::{AgeRules, PoolLayout, TierLimits};
use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    pub database: Option<DatabaseConfig>,
    #[serde(default)]
    pub quotas: TierLimits,
    #[serde(default)]
    pub passenger_rules: AgeRules,
    #[serde(default)]
    pub pool: PoolLayout,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Postgres,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    /// Upper bound on any single lock wait, in milliseconds. Must be
    /// positive: Postgres reads a zero `lock_timeout` as "wait forever".
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

fn default_lock_timeout_ms() -> u64 { 2_000 }

impl StoreConfig {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms.max(1))
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 { 5 }

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            // Start off by merging in the "default" configuration file
            .add_source(config::File::with_name("config/default").required(false))
            // Environment-specific overrides, e.g. config/production.toml
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides, never checked in
            .add_source(config::File::with_name("config/local").required(false))
            // Eg. `BERTH__QUOTAS__CONFIRMED=40` overrides `quotas.confirmed`
            .add_source(config::Environment::with_prefix("BERTH").prefix_separator("__").separator("__"))
            .build()?;

        let config: Self = s.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.store.lock_timeout_ms == 0 {
            return Err(config::ConfigError::Message(
                "store.lock_timeout_ms must be greater than zero".into(),
            ));
        }
        if self.store.backend == StoreBackend::Postgres && self.database.is_none() {
            return Err(config::ConfigError::Message(
                "store.backend = \"postgres\" requires a [database] section".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_sources_use_defaults() {
        let config: Config = config::Config::builder()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.store.lock_timeout(), Duration::from_millis(2_000));
        assert_eq!(config.quotas, TierLimits::default());
        assert_eq!(config.passenger_rules.child_age, 5);
        assert!(config.database.is_none());
    }

    #[test]
    fn test_toml_overrides() {
        let toml = r#"
            [store]
            backend = "postgres"
            lock_timeout_ms = 500

            [database]
            url = "postgres://localhost/berths"

            [quotas]
            confirmed = 1
        "#;
        let config: Config = config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.store.backend, StoreBackend::Postgres);
        assert_eq!(config.quotas.confirmed, 1);
        assert_eq!(config.quotas.rac, 18);
        assert!(config.validate().is_ok());
        assert_eq!(config.database.unwrap().max_connections, 5);
    }

    #[test]
    fn test_zero_lock_timeout_is_rejected() {
        let toml = r#"
            [store]
            lock_timeout_ms = 0
        "#;
        let config: Config = config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("lock_timeout_ms"));
        // A hand-built config still never yields an unbounded wait.
        assert_eq!(config.store.lock_timeout(), Duration::from_millis(1));
    }

    #[test]
    fn test_postgres_without_database_is_rejected() {
        let mut config = Config::default();
        config.store.backend = StoreBackend::Postgres;
        assert!(config.validate().is_err());
    }
}
