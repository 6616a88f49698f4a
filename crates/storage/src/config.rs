//! Startup configuration for the storage gateway.
//!
//! All validation happens here, before a pool is created, so a missing
//! connection string fails the process without touching the network.

use std::time::Duration;

use crate::StorageError;

pub const DATABASE_URL: &str = "DATABASE_URL";
pub const DATABASE_MAX_CONNECTIONS: &str = "DATABASE_MAX_CONNECTIONS";
pub const DATABASE_RUN_MIGRATIONS: &str = "DATABASE_RUN_MIGRATIONS";
pub const SESSION_PRUNE_INTERVAL_SECS: &str = "SESSION_PRUNE_INTERVAL_SECS";

const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_PRUNE_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Validated connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    /// Postgres connection string.
    pub database_url: String,
    /// Pool ceiling.
    pub max_connections: u32,
    /// Apply the embedded schema migrations on connect.
    pub run_migrations: bool,
    /// How often expired sessions are deleted; `None` disables pruning.
    pub session_prune_interval: Option<Duration>,
}

impl StorageConfig {
    /// Build a config for `database_url` with default settings.
    ///
    /// Fails with [`StorageError::MissingEnv`] if the URL is empty.
    pub fn new(database_url: impl Into<String>) -> Result<Self, StorageError> {
        let database_url = database_url.into();
        if database_url.trim().is_empty() {
            return Err(StorageError::MissingEnv(DATABASE_URL));
        }
        Ok(Self {
            database_url,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            run_migrations: true,
            session_prune_interval: Some(DEFAULT_PRUNE_INTERVAL),
        })
    }

    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self, StorageError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, StorageError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup(DATABASE_URL).ok_or(StorageError::MissingEnv(DATABASE_URL))?;
        let mut config = Self::new(database_url)?;

        if let Some(raw) = lookup(DATABASE_MAX_CONNECTIONS) {
            config.max_connections = match raw.trim().parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => return Err(invalid(DATABASE_MAX_CONNECTIONS, raw)),
            };
        }

        if let Some(raw) = lookup(DATABASE_RUN_MIGRATIONS) {
            config.run_migrations = parse_bool(&raw).ok_or_else(|| invalid(DATABASE_RUN_MIGRATIONS, raw))?;
        }

        if let Some(raw) = lookup(SESSION_PRUNE_INTERVAL_SECS) {
            let secs: u64 = raw
                .trim()
                .parse()
                .map_err(|_| invalid(SESSION_PRUNE_INTERVAL_SECS, raw))?;
            config.session_prune_interval = (secs > 0).then(|| Duration::from_secs(secs));
        }

        Ok(config)
    }
}

fn invalid(var: &'static str, value: String) -> StorageError {
    StorageError::InvalidEnv { var, value }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
