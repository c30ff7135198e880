//! Listener configuration: built-in defaults, then an optional YAML/JSON/TOML file, then
//! command line flags and environment variables.

use ::config::{Config as Settings, File};
use clap::Args;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;
use strum_macros::{Display, EnumString};
use thiserror::Error as ThisError;

use crate::codec::DEFAULT_MAX_FRAME_SIZE;

#[derive(Debug, ThisError)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// The transport the listener binds. `tcp4` and `tcp6` restrict the resolved host addresses to a
/// single family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Protocol {
    #[default]
    Tcp,
    Tcp4,
    Tcp6,
}

impl Protocol {
    pub fn accepts(&self, addr: &SocketAddr) -> bool {
        match self {
            Protocol::Tcp => true,
            Protocol::Tcp4 => addr.is_ipv4(),
            Protocol::Tcp6 => addr.is_ipv6(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub protocol: Protocol,
    pub host: String,
    pub port: u16,
    /// Connections accepted at once, later ones are rejected.
    #[serde(rename = "connections")]
    pub max_connections: usize,
    /// Upper bound for the bytes buffered while decoding a single frame.
    pub max_frame_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            protocol: Protocol::Tcp,
            host: "127.0.0.1".to_string(),
            port: 6379,
            max_connections: 100,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

/// Values given on the command line or through the environment. They win over the file.
#[derive(Debug, Clone, Default, Args)]
pub struct Overrides {
    /// The transport protocol: tcp, tcp4 or tcp6
    #[arg(long, env = "MOCKREDIS_PROTOCOL")]
    pub protocol: Option<Protocol>,

    /// The host to listen on
    #[arg(long, env = "MOCKREDIS_HOST")]
    pub host: Option<String>,

    /// The port to listen on
    #[arg(short, long, env = "MOCKREDIS_PORT")]
    pub port: Option<u16>,

    /// The maximum number of simultaneous connections
    #[arg(long, env = "MOCKREDIS_MAX_CONNECTIONS")]
    pub max_connections: Option<usize>,
}

impl Config {
    pub fn load(path: Option<&Path>, overrides: &Overrides) -> Result<Config, ConfigError> {
        let mut builder = Settings::builder();

        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }

        let config: Config = builder
            .set_override_option("protocol", overrides.protocol.map(|p| p.to_string()))?
            .set_override_option("host", overrides.host.clone())?
            .set_override_option("port", overrides.port.map(u64::from))?
            .set_override_option(
                "connections",
                overrides.max_connections.map(|n| n as u64),
            )?
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Invalid("host must not be empty".to_string()));
        }
        if self.max_frame_size == 0 {
            return Err(ConfigError::Invalid(
                "max_frame_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
