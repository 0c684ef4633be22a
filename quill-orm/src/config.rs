//! Connection pool configuration

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::{Error, Result};

/// Which sqlx backend a pool is opened with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Driver {
    #[default]
    Sqlite,
    Postgres,
}

/// Settings for the shared connection pool
///
/// For SQLite `database` is a file path (created when missing) or
/// `:memory:`; host, port and credentials are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub driver: Driver,
    pub host: String,
    /// Defaults to the driver's standard port
    pub port: Option<u16>,
    pub user: String,
    pub password: String,
    pub database: String,
    pub charset: String,
    /// Whether entity writes run without an explicit transaction
    pub autocommit: bool,
    pub min_size: u32,
    pub max_size: u32,
    /// How long a lease waits on a saturated pool before failing
    pub acquire_timeout_seconds: u64,
    /// Upper bound for a single statement round trip
    ///
    /// On SQLite this bounds only the caller's wait: the statement keeps
    /// running on the connection's worker thread, and the connection stays
    /// leased until it finishes.
    pub query_timeout_seconds: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            driver: Driver::Sqlite,
            host: "localhost".to_string(),
            port: None,
            user: String::new(),
            password: String::new(),
            database: "quill.db".to_string(),
            charset: "utf8".to_string(),
            autocommit: true,
            min_size: 1,
            max_size: 10,
            acquire_timeout_seconds: 30,
            query_timeout_seconds: 30,
        }
    }
}

impl PoolConfig {
    /// Parse a TOML document holding the pool table's keys
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_size == 0 {
            return Err(Error::Config("max_size must be at least 1".to_string()));
        }
        if self.min_size > self.max_size {
            return Err(Error::Config(format!(
                "min_size ({}) exceeds max_size ({})",
                self.min_size, self.max_size
            )));
        }
        if self.database.is_empty() {
            return Err(Error::Config("database must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn effective_port(&self) -> u16 {
        self.port.unwrap_or(match self.driver {
            Driver::Sqlite => 0,
            Driver::Postgres => 5432,
        })
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_seconds)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_seconds)
    }

    pub fn is_in_memory(&self) -> bool {
        self.driver == Driver::Sqlite && self.database == ":memory:"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PoolConfig::from_toml_str("").unwrap();
        assert_eq!(config, PoolConfig::default());
        assert!(config.autocommit);
        assert_eq!((config.min_size, config.max_size), (1, 10));
    }

    #[test]
    fn test_postgres_config() {
        let config = PoolConfig::from_toml_str(
            r#"
            driver = "postgres"
            host = "db.internal"
            user = "blog"
            password = "secret"
            database = "blog"
            max_size = 4
            "#,
        )
        .unwrap();

        assert_eq!(config.driver, Driver::Postgres);
        assert_eq!(config.effective_port(), 5432);
        assert_eq!(config.max_size, 4);
        assert_eq!(config.charset, "utf8");
    }

    #[test]
    fn test_rejects_bad_bounds_and_driver() {
        assert!(matches!(
            PoolConfig::from_toml_str("min_size = 5\nmax_size = 2"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            PoolConfig::from_toml_str("driver = \"oracle\""),
            Err(Error::Config(_))
        ));
    }
}
