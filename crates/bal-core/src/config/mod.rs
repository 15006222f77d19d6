//! Runtime configuration for the publication engine.
//!
//! Shared by the cron binary and the API server. Values come from the
//! process environment; `from_lookup` takes any lookup function so the
//! parsing is testable without touching it.

use std::collections::HashMap;
use std::env;
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::api_depot::ApiDepotConfig;
use crate::db::ReplicaConfig;
use crate::util::{is_http_url, normalize_text_option};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Periods of the recurring reconciliation tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskIntervals {
    pub detect_outdated: Duration,
    pub detect_conflict: Duration,
    pub sync_outdated: Duration,
}

impl Default for TaskIntervals {
    fn default() -> Self {
        Self {
            detect_outdated: Duration::from_secs(30),
            detect_conflict: Duration::from_secs(30),
            sync_outdated: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub api_depot: ApiDepotConfig,
    pub database_path: PathBuf,
    pub replica: Option<ReplicaConfig>,
    pub intervals: TaskIntervals,
    /// Quiet period after the last edit before SyncOutdated republishes
    pub sync_debounce: Duration,
    pub cron_lock_ttl: Duration,
}

impl EngineConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let url = required_trimmed(&lookup, "API_DEPOT_URL")?;
        if !is_http_url(&url) {
            return Err(ConfigError::Invalid(
                "API_DEPOT_URL must start with http:// or https://".to_string(),
            ));
        }
        let client_secret = required_trimmed(&lookup, "API_DEPOT_CLIENT_SECRET")?;

        let timeout_secs = ranged(&lookup, "API_DEPOT_TIMEOUT_SECS", 30, 1..=300)?;
        let max_attempts = ranged(&lookup, "API_DEPOT_MAX_ATTEMPTS", 3, 1..=10)?;
        let retry_base_ms = ranged(&lookup, "API_DEPOT_RETRY_BASE_MS", 500, 10..=60_000)?;

        let database_path = PathBuf::from(value_or_default(
            &lookup,
            "BAL_DATABASE_PATH",
            "bal.db",
        ));
        let replica = parse_replica_config(&lookup)?;

        let intervals = TaskIntervals {
            detect_outdated: Duration::from_secs(ranged(
                &lookup,
                "DETECT_OUTDATED_INTERVAL_SECS",
                30,
                1..=86_400,
            )?),
            detect_conflict: Duration::from_secs(ranged(
                &lookup,
                "DETECT_CONFLICT_INTERVAL_SECS",
                30,
                1..=86_400,
            )?),
            sync_outdated: Duration::from_secs(ranged(
                &lookup,
                "SYNC_OUTDATED_INTERVAL_SECS",
                300,
                1..=86_400,
            )?),
        };
        let sync_debounce_secs = ranged(&lookup, "SYNC_DEBOUNCE_SECS", 7_200, 0..=604_800)?;
        let cron_lock_ttl_secs = ranged(&lookup, "CRON_LOCK_TTL_SECS", 3_600, 60..=86_400)?;

        Ok(Self {
            api_depot: ApiDepotConfig {
                url: url.trim_end_matches('/').to_string(),
                client_secret,
                timeout: Duration::from_secs(timeout_secs),
                max_attempts: u32::try_from(max_attempts).unwrap_or(1),
                retry_base: Duration::from_millis(retry_base_ms),
            },
            database_path,
            replica,
            intervals,
            sync_debounce: Duration::from_secs(sync_debounce_secs),
            cron_lock_ttl: Duration::from_secs(cron_lock_ttl_secs),
        })
    }
}

fn parse_replica_config(
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Option<ReplicaConfig>, ConfigError> {
    let url = optional_trimmed(&lookup, "BAL_DATABASE_URL");
    let auth_token = optional_trimmed(&lookup, "BAL_DATABASE_AUTH_TOKEN");

    match (url, auth_token) {
        (None, None) => Ok(None),
        (Some(url), Some(auth_token)) => Ok(Some(ReplicaConfig::new(url, auth_token))),
        (Some(_), None) => Err(ConfigError::MissingVar("BAL_DATABASE_AUTH_TOKEN")),
        (None, Some(_)) => Err(ConfigError::MissingVar("BAL_DATABASE_URL")),
    }
}

fn ranged(
    lookup: impl Fn(&str) -> Option<String>,
    name: &str,
    default: u64,
    range: RangeInclusive<u64>,
) -> Result<u64, ConfigError> {
    let Some(raw) = optional_trimmed(lookup, name) else {
        return Ok(default);
    };

    let invalid = || {
        ConfigError::Invalid(format!(
            "{name} must be an integer in [{}, {}]",
            range.start(),
            range.end()
        ))
    };
    let value = raw.parse::<u64>().map_err(|_| invalid())?;
    if range.contains(&value) {
        Ok(value)
    } else {
        Err(invalid())
    }
}

/// Read a value, falling back to `default` when unset or blank
pub fn value_or_default(
    lookup: impl Fn(&str) -> Option<String>,
    name: &str,
    default: &str,
) -> String {
    optional_trimmed(lookup, name).unwrap_or_else(|| default.to_string())
}

fn required_trimmed(
    lookup: impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<String, ConfigError> {
    optional_trimmed(lookup, name).ok_or(ConfigError::MissingVar(name))
}

fn optional_trimmed(lookup: impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    normalize_text_option(lookup(name))
}
