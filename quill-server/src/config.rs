//! Server configuration
//!
//! `quill.toml` holds the defaults; the file named by `QUILL_CONFIG`
//! (`quill.override.toml` when unset) is merged over it key by key.

use quill_orm::{Error, PoolConfig, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_CONFIG_PATH: &str = "quill.toml";
pub const DEFAULT_OVERRIDE_PATH: &str = "quill.override.toml";
pub const OVERRIDE_ENV: &str = "QUILL_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:9000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: PoolConfig,
}

impl AppConfig {
    /// Load the defaults file and the override named by the environment
    pub fn load() -> Result<Self> {
        let override_path =
            std::env::var(OVERRIDE_ENV).unwrap_or_else(|_| DEFAULT_OVERRIDE_PATH.to_string());
        Self::load_from(Path::new(DEFAULT_CONFIG_PATH), Path::new(&override_path))
    }

    /// Either file may be missing; built-in defaults fill the gaps
    pub fn load_from(defaults: &Path, overrides: &Path) -> Result<Self> {
        let mut merged = toml::Value::Table(toml::Table::new());
        for path in [defaults, overrides] {
            if let Some(layer) = read_layer(path)? {
                tracing::info!(path = %path.display(), "loaded configuration layer");
                merge(&mut merged, layer);
            }
        }
        Self::from_value(merged)
    }

    pub fn from_value(value: toml::Value) -> Result<Self> {
        let config: Self = value.try_into().map_err(|e: toml::de::Error| Error::Config(e.to_string()))?;
        config.database.validate()?;
        Ok(config)
    }
}

fn read_layer(path: &Path) -> Result<Option<toml::Value>> {
    let source = match std::fs::read_to_string(path) {
        Ok(source) => source,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(error) => return Err(Error::Config(format!("{}: {}", path.display(), error))),
    };
    let table: toml::Table = source
        .parse()
        .map_err(|e: toml::de::Error| Error::Config(format!("{}: {}", path.display(), e)))?;
    Ok(Some(toml::Value::Table(table)))
}

/// Recursively overlay `layer` onto `base`; tables merge, anything else replaces
pub fn merge(base: &mut toml::Value, layer: toml::Value) {
    match (base, layer) {
        (toml::Value::Table(base), toml::Value::Table(layer)) => {
            for (key, value) in layer {
                match base.get_mut(&key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, layer) => *base = layer,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_orm::Driver;

    #[test]
    fn test_missing_files_use_defaults() {
        let directory = tempfile::tempdir().unwrap();
        let config = AppConfig::load_from(
            &directory.path().join("quill.toml"),
            &directory.path().join("override.toml"),
        )
        .unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_override_merges_per_key() {
        let directory = tempfile::tempdir().unwrap();
        let defaults = directory.path().join("quill.toml");
        let overrides = directory.path().join("override.toml");
        std::fs::write(
            &defaults,
            "[server]\nbind = \"0.0.0.0:80\"\n\n[database]\ndriver = \"postgres\"\nhost = \"db\"\nuser = \"blog\"\ndatabase = \"blog\"\n",
        )
        .unwrap();
        std::fs::write(&overrides, "[database]\nhost = \"db.internal\"\nmax_size = 20\n").unwrap();

        let config = AppConfig::load_from(&defaults, &overrides).unwrap();
        assert_eq!(config.server.bind, "0.0.0.0:80");
        assert_eq!(config.database.driver, Driver::Postgres);
        assert_eq!(config.database.host, "db.internal");
        assert_eq!(config.database.user, "blog");
        assert_eq!(config.database.max_size, 20);
        assert_eq!(config.database.min_size, 1);
    }

    #[test]
    fn test_rejects_unknown_driver() {
        let directory = tempfile::tempdir().unwrap();
        let defaults = directory.path().join("quill.toml");
        std::fs::write(&defaults, "[database]\ndriver = \"mysql\"\n").unwrap();

        let result = AppConfig::load_from(&defaults, &directory.path().join("none.toml"));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_merge_replaces_scalars() {
        let mut base: toml::Value = toml::Value::Table("a = 1\n[t]\nx = 1\ny = 2\n".parse().unwrap());
        let layer: toml::Value = toml::Value::Table("a = \"s\"\n[t]\ny = 3\n".parse().unwrap());
        merge(&mut base, layer);
        assert_eq!(base["a"].as_str(), Some("s"));
        assert_eq!(base["t"]["x"].as_integer(), Some(1));
        assert_eq!(base["t"]["y"].as_integer(), Some(3));
    }
}
