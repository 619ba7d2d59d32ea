//! Runtime configuration for the DAX data layer.
//!
//! # Responsibility
//! - Read store, pool and logging settings from `DAX_*` environment keys.
//! - Build the configured repository behind the shared contract.
//!
//! # Invariants
//! - Unset keys fall back to defaults; set but invalid keys are errors.
//! - Configuration is read once and passed explicitly, never global.

use crate::db::{open_db, DbError, PoolConfig};
use crate::logging::{default_log_level, normalize_level};
use crate::repo::memory_repo::MemoryDaxRepository;
use crate::repo::sqlite_repo::SqliteDaxRepository;
use crate::repo::DaxRepository;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::str::FromStr;

pub const ENV_STORE: &str = "DAX_STORE";
pub const ENV_DB_PATH: &str = "DAX_DB_PATH";
pub const ENV_DB_MAX_OPEN: &str = "DAX_DB_MAX_OPEN";
pub const ENV_DB_MAX_IDLE: &str = "DAX_DB_MAX_IDLE";
pub const ENV_LOG_LEVEL: &str = "DAX_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "DAX_LOG_DIR";

const DEFAULT_DB_PATH: &str = "dax.sqlite3";

#[derive(Debug)]
pub enum ConfigError {
    /// A key is set to a value that cannot be used.
    InvalidValue { key: &'static str, value: String },
    /// The configured store failed to open.
    Store(DbError),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { key, value } => {
                write!(f, "invalid value `{value}` for {key}")
            }
            Self::Store(err) => write!(f, "failed to open store: {err}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidValue { .. } => None,
            Self::Store(err) => Some(err),
        }
    }
}

impl From<DbError> for ConfigError {
    fn from(value: DbError) -> Self {
        Self::Store(value)
    }
}

/// Which repository implementation backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreKind {
    /// Durable SQLite file.
    #[default]
    Sqlite,
    /// Transient in-process map.
    Memory,
}

impl FromStr for StoreKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sqlite" | "durable" => Ok(Self::Sqlite),
            "memory" | "transient" => Ok(Self::Memory),
            other => Err(format!("unknown store `{other}`; expected sqlite|memory")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaxConfig {
    pub store: StoreKind,
    pub db_path: PathBuf,
    pub pool: PoolConfig,
    pub log_level: &'static str,
    /// File logging is enabled only when set.
    pub log_dir: Option<PathBuf>,
}

impl Default for DaxConfig {
    fn default() -> Self {
        Self {
            store: StoreKind::default(),
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            pool: PoolConfig::default(),
            log_level: default_log_level(),
            log_dir: None,
        }
    }
}

impl DaxConfig {
    /// Reads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup`; empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let mut config = Self::default();

        if let Some(value) = get(ENV_STORE) {
            config.store = value.parse().map_err(|_| invalid(ENV_STORE, &value))?;
        }
        if let Some(value) = get(ENV_DB_PATH) {
            config.db_path = PathBuf::from(value.trim());
        }
        if let Some(value) = get(ENV_DB_MAX_OPEN) {
            config.pool.max_open = parse_positive(ENV_DB_MAX_OPEN, &value)?;
        }
        if let Some(value) = get(ENV_DB_MAX_IDLE) {
            config.pool.max_idle = value
                .trim()
                .parse()
                .map_err(|_| invalid(ENV_DB_MAX_IDLE, &value))?;
        }
        if let Some(value) = get(ENV_LOG_LEVEL) {
            config.log_level = normalize_level(&value).map_err(|_| invalid(ENV_LOG_LEVEL, &value))?;
        }
        if let Some(value) = get(ENV_LOG_DIR) {
            config.log_dir = Some(PathBuf::from(value.trim()));
        }

        Ok(config)
    }
}

/// Opens the configured store behind the repository contract.
pub fn open_repository(
    config: &DaxConfig,
) -> Result<Box<dyn DaxRepository + Send + Sync>, ConfigError> {
    match config.store {
        StoreKind::Sqlite => {
            let pool = open_db(&config.db_path, &config.pool)?;
            Ok(Box::new(SqliteDaxRepository::new(pool)))
        }
        StoreKind::Memory => Ok(Box::new(MemoryDaxRepository::new())),
    }
}

fn parse_positive(key: &'static str, value: &str) -> Result<u32, ConfigError> {
    match value.trim().parse::<u32>() {
        Ok(parsed) if parsed > 0 => Ok(parsed),
        _ => Err(invalid(key, value)),
    }
}

fn invalid(key: &'static str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = DaxConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, DaxConfig::default());
        assert_eq!(config.pool.max_open, 25);
        assert_eq!(config.pool.max_idle, 5);
    }

    #[test]
    fn reads_every_key() {
        let config = DaxConfig::from_lookup(lookup(&[
            (ENV_STORE, "Memory"),
            (ENV_DB_PATH, "/tmp/dax.db"),
            (ENV_DB_MAX_OPEN, "4"),
            (ENV_DB_MAX_IDLE, "0"),
            (ENV_LOG_LEVEL, "warning"),
            (ENV_LOG_DIR, "/var/log/dax"),
        ]))
        .unwrap();

        assert_eq!(config.store, StoreKind::Memory);
        assert_eq!(config.db_path, PathBuf::from("/tmp/dax.db"));
        assert_eq!(config.pool.max_open, 4);
        assert_eq!(config.pool.max_idle, 0);
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.log_dir, Some(PathBuf::from("/var/log/dax")));
    }

    #[test]
    fn rejects_invalid_values() {
        let err = DaxConfig::from_lookup(lookup(&[(ENV_STORE, "postgres")])).unwrap_err();
        assert!(err.to_string().contains(ENV_STORE));

        let err = DaxConfig::from_lookup(lookup(&[(ENV_DB_MAX_OPEN, "0")])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                key: ENV_DB_MAX_OPEN,
                ..
            }
        ));
    }

    #[test]
    fn empty_values_count_as_unset() {
        let config = DaxConfig::from_lookup(lookup(&[(ENV_STORE, "  ")])).unwrap();
        assert_eq!(config.store, StoreKind::Sqlite);
    }

    #[test]
    fn memory_store_opens_without_io() {
        let config = DaxConfig {
            store: StoreKind::Memory,
            ..DaxConfig::default()
        };
        let repo = open_repository(&config).unwrap();
        assert_eq!(repo.count().unwrap(), 0);
    }
}
