//! Configuration management for diskmon
//!
//! Sampling thresholds, per-device overrides, I/O accounting control and
//! descriptor metadata, persisted as TOML.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// diskmon configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Sampling behaviour
    #[serde(default)]
    pub sampling: SamplingConfig,
    /// Per-device overrides
    #[serde(default)]
    pub devices: DeviceConfig,
    /// OS I/O accounting control
    #[serde(default)]
    pub accounting: AccountingConfig,
    /// Metadata announced with each metric
    #[serde(default)]
    pub descriptor: DescriptorConfig,
}

/// Sampling configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingConfig {
    /// Minimum seconds between OS queries for one device
    #[serde(default = "default_threshold")]
    pub threshold_secs: f64,
    /// Take a baseline sample of every device at startup
    #[serde(default = "default_true")]
    pub prime_on_start: bool,
}

/// Per-device configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Devices that always report the unavailable sentinel
    #[serde(default)]
    pub disabled: Vec<String>,
    /// Threshold overrides in seconds, by device name
    #[serde(default)]
    pub thresholds: HashMap<String, f64>,
}

/// I/O accounting configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountingConfig {
    /// Enable OS disk I/O accounting at init and restore it at cleanup
    #[serde(default = "default_true")]
    pub manage: bool,
}

/// Descriptor metadata configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescriptorConfig {
    /// Maximum seconds between value reports
    #[serde(default = "default_tmax")]
    pub tmax: u32,
    /// Grouping tag
    #[serde(default = "default_group")]
    pub group: String,
    /// printf-style display format
    #[serde(default = "default_format")]
    pub format: String,
}

// Default value functions
fn default_threshold() -> f64 {
    5.0
}

fn default_true() -> bool {
    true
}

fn default_tmax() -> u32 {
    60
}

fn default_group() -> String {
    "disk".to_string()
}

fn default_format() -> String {
    "%.1f".to_string()
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            threshold_secs: default_threshold(),
            prime_on_start: true,
        }
    }
}

impl Default for AccountingConfig {
    fn default() -> Self {
        Self { manage: true }
    }
}

impl Default for DescriptorConfig {
    fn default() -> Self {
        Self {
            tmax: default_tmax(),
            group: default_group(),
            format: default_format(),
        }
    }
}

fn valid_threshold(secs: f64) -> bool {
    secs.is_finite() && secs > 0.0
}

impl Config {
    /// Get the default configuration directory
    ///
    /// Returns `~/.config/diskmon` on Unix-like systems,
    /// or `%APPDATA%\diskmon` on Windows.
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = if cfg!(windows) {
            std::env::var("APPDATA")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("."))
        } else {
            std::env::var("HOME")
                .map(|home| PathBuf::from(home).join(".config"))
                .unwrap_or_else(|_| PathBuf::from(".config"))
        };

        Ok(config_dir.join("diskmon"))
    }

    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_file = Self::default_path()?.join("config.toml");

        if !config_file.exists() {
            return Ok(Self::default());
        }

        Self::load_from(&config_file)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default path
    pub fn save(&self) -> Result<()> {
        let config_dir = Self::default_path()?;
        std::fs::create_dir_all(&config_dir)?;
        self.save_to(&config_dir.join("config.toml"))
    }

    /// Save configuration to a specific path
    pub fn save_to(&self, path: &PathBuf) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Reject thresholds that would break throttling
    pub fn validate(&self) -> Result<()> {
        if !valid_threshold(self.sampling.threshold_secs) {
            return Err(Error::Config(format!(
                "threshold_secs must be a positive number, got {}",
                self.sampling.threshold_secs
            )));
        }

        for (name, secs) in &self.devices.thresholds {
            if !valid_threshold(*secs) {
                return Err(Error::Config(format!(
                    "threshold for {} must be a positive number, got {}",
                    name, secs
                )));
            }
        }

        Ok(())
    }

    /// Effective threshold for a device
    pub fn threshold_for(&self, device: &str) -> f64 {
        self.devices
            .thresholds
            .get(device)
            .copied()
            .unwrap_or(self.sampling.threshold_secs)
    }

    /// Whether a device is enabled
    pub fn is_enabled(&self, device: &str) -> bool {
        !self.devices.disabled.iter().any(|name| name == device)
    }
}
