//! Configuration loading for the handshake endpoints.

use anyhow::Context;
use serde::Deserialize;
use std::path::Path;

use crate::error::SimError;
use crate::handshake::DEFAULT_PORT;

const DEFAULT_ADDRESS: &str = "127.0.0.1";

/// Environment variables that override file values.
pub const ENV_LISTEN_ADDRESS: &str = "ADHOC_LISTEN_ADDRESS";
pub const ENV_LISTEN_PORT: &str = "ADHOC_LISTEN_PORT";
pub const ENV_PEER_ADDRESS: &str = "ADHOC_PEER_ADDRESS";
pub const ENV_PEER_PORT: &str = "ADHOC_PEER_PORT";

/// Where the listening side binds and where the connecting side dials.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NetworkConfig {
    #[serde(default = "default_address")]
    pub listen_address: String,
    #[serde(default = "default_port")]
    pub listen_port: u16,
    #[serde(default = "default_address")]
    pub peer_address: String,
    #[serde(default = "default_port")]
    pub peer_port: u16,
}

fn default_address() -> String {
    DEFAULT_ADDRESS.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen_address: default_address(),
            listen_port: default_port(),
            peer_address: default_address(),
            peer_port: default_port(),
        }
    }
}

impl NetworkConfig {
    /// Load configuration from a TOML file. Keys absent from the file keep their defaults.
    pub fn load(config_path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file {}", config_path.display()))?;
        Self::from_toml(&content).with_context(|| format!("Failed to parse config file {}", config_path.display()))
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply `ADHOC_*` environment overrides on top of the current values.
    pub fn apply_env(&mut self) -> Result<(), SimError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup.
    ///
    /// Unlike missing keys, a present but unparsable port is an error.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), SimError> {
        if let Some(address) = lookup(ENV_LISTEN_ADDRESS) {
            self.listen_address = address;
        }
        if let Some(port) = lookup(ENV_LISTEN_PORT) {
            self.listen_port = parse_port(ENV_LISTEN_PORT, &port)?;
        }
        if let Some(address) = lookup(ENV_PEER_ADDRESS) {
            self.peer_address = address;
        }
        if let Some(port) = lookup(ENV_PEER_PORT) {
            self.peer_port = parse_port(ENV_PEER_PORT, &port)?;
        }
        Ok(())
    }
}

fn parse_port(key: &str, value: &str) -> Result<u16, SimError> {
    value
        .trim()
        .parse::<u16>()
        .map_err(|e| SimError::InvalidConfig(format!("{}={:?} is not a port: {}", key, value, e)))
}
