//! Configuration module
//!
//! Handles loading and saving the bridge configuration. Files ending in
//! `.toml` are read as TOML, everything else as JSON.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::network::NetworkConfig;
use crate::protocol::DEFAULT_PORT;
use crate::serial::SerialConfig;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Bridge configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// UDP port controllers send to
    #[serde(default = "default_port")]
    pub network_port: u16,

    /// Serial device the camera is attached to
    #[serde(default = "default_serial_path")]
    pub serial_path: String,

    /// Serial line speed
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Interface to bind to
    #[serde(default = "default_bind_address")]
    pub bind_address: IpAddr,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_serial_path() -> String {
    if cfg!(windows) {
        "COM1".to_string()
    } else {
        "/dev/ttyUSB0".to_string()
    }
}

fn default_baud_rate() -> u32 {
    9600
}

fn default_bind_address() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

impl Default for Config {
    fn default() -> Self {
        Self {
            network_port: default_port(),
            serial_path: default_serial_path(),
            baud_rate: default_baud_rate(),
            bind_address: default_bind_address(),
        }
    }
}

fn is_toml(path: &Path) -> bool {
    path.extension().map_or(false, |ext| ext.eq_ignore_ascii_case("toml"))
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Config = if is_toml(path) {
            toml::from_str(&contents)?
        } else {
            serde_json::from_str(&contents)?
        };
        Ok(config)
    }

    /// Load configuration from the default location
    pub fn load_default() -> ConfigResult<Self> {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("visca-bridge/config.json")),
            Some(PathBuf::from("./visca-bridge.json")),
            Some(PathBuf::from("./config.json")),
        ];

        for path in config_paths.iter().flatten() {
            if path.exists() {
                tracing::debug!("Using configuration {}", path.display());
                return Self::load(path);
            }
        }

        // Return default config if no file found
        Ok(Self::default())
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let contents = if is_toml(path) {
            toml::to_string_pretty(self)?
        } else {
            serde_json::to_string_pretty(self)?
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Check values the gateway relies on
    pub fn validate(&self) -> ConfigResult<()> {
        if self.network_port == 0 {
            return Err(ConfigError::Invalid(
                "networkPort must be between 1 and 65535".to_string(),
            ));
        }
        if self.baud_rate == 0 {
            return Err(ConfigError::Invalid("baudRate must be positive".to_string()));
        }
        if self.serial_path.trim().is_empty() {
            return Err(ConfigError::Invalid("serialPath must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn network(&self) -> NetworkConfig {
        NetworkConfig::new(self.network_port).with_bind_address(self.bind_address)
    }

    pub fn serial(&self) -> SerialConfig {
        SerialConfig::new(self.serial_path.clone(), self.baud_rate)
    }
}

/// Generate a sample configuration
pub fn generate_sample_config() -> Config {
    Config {
        serial_path: "/dev/ttyUSB0".to_string(),
        baud_rate: 9600,
        ..Default::default()
    }
}
