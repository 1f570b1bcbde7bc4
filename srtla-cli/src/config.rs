//! Configuration file support for the SRTLA receiver

use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{IpAddr, Ipv6Addr, SocketAddr};
use std::path::Path;

/// Default SRTLA listen port
pub const DEFAULT_SRTLA_PORT: u16 = 5000;

/// Default downstream SRT host
pub const DEFAULT_SRT_HOST: &str = "127.0.0.1";

/// Receiver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiverConfig {
    /// UDP port the public SRTLA listener binds
    #[serde(default = "default_srtla_port")]
    pub srtla_port: u16,
    /// Downstream SRT server host
    #[serde(default = "default_srt_host")]
    pub srt_host: String,
    /// Downstream SRT server port
    pub srt_port: u16,
    /// Verbose logging
    #[serde(default)]
    pub verbose: bool,
}

fn default_srtla_port() -> u16 {
    DEFAULT_SRTLA_PORT
}

fn default_srt_host() -> String {
    DEFAULT_SRT_HOST.to_string()
}

impl ReceiverConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: ReceiverConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Create an example configuration
    pub fn example() -> Self {
        ReceiverConfig {
            srtla_port: DEFAULT_SRTLA_PORT,
            srt_host: DEFAULT_SRT_HOST.to_string(),
            srt_port: 4001,
            verbose: false,
        }
    }

    /// The dual-stack listen address for the configured SRTLA port
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), self.srtla_port)
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}
