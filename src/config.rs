//! Application configuration
//!
//! All sections have defaults, so an absent or partial TOML file is valid.
//!
//! ```toml
//! [relay]
//! port = 3001
//!
//! [producer]
//! server_url = "ws://192.168.1.20:3001"
//! frame_rate = 20
//! ```

use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::*;
use crate::error::ConfigError;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub relay: RelayConfig,
    pub producer: ProducerConfig,
    pub consumer: ConsumerConfig,
    pub share: ShareConfig,
}

impl AppConfig {
    /// Default config file location, e.g. `~/.config/lan-screen-relay/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "lan-screen-relay")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Load configuration.
    ///
    /// An explicit path must exist. Without one, the default location is
    /// used when present and built-in defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match Self::default_path() {
                Some(p) if p.exists() => p,
                _ => return Ok(Self::default()),
            },
        };

        let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;

        tracing::debug!("Loaded configuration from {}", path.display());
        Self::from_toml_str(&text)
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.relay.validate()?;
        self.producer.validate()?;
        Ok(())
    }
}

/// Relay server settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub bind_address: String,
    pub port: u16,
    /// Log broadcast statistics every N frames
    pub stats_interval: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            port: DEFAULT_PORT,
            stats_interval: STATS_LOG_INTERVAL,
        }
    }
}

impl RelayConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.bind_address, self.port)
            .parse()
            .map_err(|e| ConfigError::Invalid {
                field: "relay.bind_address",
                reason: format!("{}", e),
            })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.stats_interval == 0 {
            return Err(ConfigError::Invalid {
                field: "relay.stats_interval",
                reason: "must be at least 1".into(),
            });
        }
        self.socket_addr().map(|_| ())
    }
}

/// Producer runtime settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProducerConfig {
    pub server_url: String,
    pub frame_rate: u32,
    pub max_width: u32,
    pub jpeg_quality: u8,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            frame_rate: DEFAULT_FRAME_RATE,
            max_width: DEFAULT_MAX_WIDTH,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

impl ProducerConfig {
    /// Interval between capture ticks
    pub fn frame_interval(&self) -> Duration {
        Duration::from_micros(1_000_000 / self.frame_rate.max(1) as u64)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.frame_rate == 0 || self.frame_rate > 120 {
            return Err(ConfigError::Invalid {
                field: "producer.frame_rate",
                reason: format!("{} is outside 1..=120", self.frame_rate),
            });
        }
        if self.max_width == 0 {
            return Err(ConfigError::Invalid {
                field: "producer.max_width",
                reason: "must be at least 1".into(),
            });
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(ConfigError::Invalid {
                field: "producer.jpeg_quality",
                reason: format!("{} is outside 1..=100", self.jpeg_quality),
            });
        }
        Ok(())
    }
}

/// Consumer runtime settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsumerConfig {
    pub server_url: String,
    /// Log a rendered-frame line every N frames
    pub log_interval: u64,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            log_interval: STATS_LOG_INTERVAL,
        }
    }
}

/// Shareable URL settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShareConfig {
    /// Pinned LAN address; ignored unless it is a private IPv4 address
    pub local_ip: Option<Ipv4Addr>,
    pub scheme: String,
    /// Port of the page server; defaults to the relay port
    pub port: Option<u16>,
}

impl Default for ShareConfig {
    fn default() -> Self {
        Self {
            local_ip: None,
            scheme: "http".to_string(),
            port: None,
        }
    }
}
