use std::collections::HashMap;
use std::env;
use std::net::SocketAddr;

use bal_core::config::{value_or_default, ConfigError, EngineConfig};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub engine: EngineConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let raw_bind_addr = value_or_default(&lookup, "BAL_API_BIND_ADDR", "127.0.0.1:5000");
        let bind_addr = raw_bind_addr.parse().map_err(|_| {
            ConfigError::Invalid(format!(
                "BAL_API_BIND_ADDR must be a socket address, got '{raw_bind_addr}'"
            ))
        })?;

        Ok(Self {
            bind_addr,
            engine: EngineConfig::from_lookup(&lookup)?,
        })
    }
}
