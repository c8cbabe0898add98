use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// IEC 61107 device addresses are at most 32 characters
const MAX_ADDRESS_LEN: usize = 32;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Unable to read the config on {0}")]
    NotFound(String),
    #[error("Unable to read config file {path}: {source}")]
    Read { path: String, source: std::io::Error },
    #[error("Unable to parse config file: {0}")]
    Parse(#[from] serde_yml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

fn port_default() -> String { return "/dev/ttyS0".to_string() }
fn sleep_interval_default() -> u64 { return 500 }
fn counters_default() -> Vec<String> { return vec!["".to_string()] }
fn settle_delay_default() -> u64 { return 1000 }
fn cycle_pause_default() -> u64 { return 5 }

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct MeterConfig {
    #[serde(default="port_default")]
    pub port: String,
    /// Pause between a frame and its answer in milliseconds, also the read timeout
    #[serde(default="sleep_interval_default")]
    pub sleep_interval: u64,
    /// Addresses of the meters on the line
    #[serde(default="counters_default")]
    pub counters: Vec<String>,
    /// Milliseconds to wait before the line is opened
    #[serde(default="settle_delay_default")]
    pub settle_delay: u64,
    /// Seconds between two poll cycles
    #[serde(default="cycle_pause_default")]
    pub cycle_pause: u64,
}

impl Default for MeterConfig {
    fn default() -> Self {
        MeterConfig {
            port: port_default(),
            sleep_interval: sleep_interval_default(),
            counters: counters_default(),
            settle_delay: settle_delay_default(),
            cycle_pause: cycle_pause_default(),
        }
    }
}

fn httpd_listen_address_default() -> String { return "0.0.0.0:9876".to_string() }

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct HttpdConfig {
    #[serde(default="httpd_listen_address_default")]
    pub listen_address: String,
}

impl Default for HttpdConfig {
    fn default() -> Self {
        HttpdConfig { listen_address: httpd_listen_address_default() }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub httpd: HttpdConfig,
    #[serde(default)]
    pub meter: MeterConfig,
}

impl Config {
    /// Parses, fills in what was left empty and validates
    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        let mut config: Config = serde_yml::from_str(contents)?;

        /* Empty values mean the same as missing ones */
        if config.meter.port.trim().is_empty() {
            config.meter.port = port_default();
        }
        if config.meter.counters.is_empty() {
            config.meter.counters = counters_default();
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.meter.sleep_interval == 0 {
            return Err(ConfigError::Invalid("sleep_interval must be greater than 0".to_string()));
        }

        for address in self.meter.counters.iter() {
            if address.len() > MAX_ADDRESS_LEN {
                return Err(ConfigError::Invalid(format!(
                    "counter address {:?} is longer than {} characters", address, MAX_ADDRESS_LEN)));
            }
            if !address.chars().all(|c| c.is_ascii_graphic() && !matches!(c, '!' | '/' | '?')) {
                return Err(ConfigError::Invalid(format!(
                    "counter address {:?} contains characters not allowed in a sign-on frame", address)));
            }
        }

        if self.httpd.listen_address.trim().is_empty() {
            return Err(ConfigError::Invalid("httpd listen_address must not be empty".to_string()));
        }

        Ok(())
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config = Config::from_yaml(&contents)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Uses $ENERGOMERA_CONFIG if set, otherwise config/energomera.yaml or energomera.yaml
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = std::env::var("ENERGOMERA_CONFIG") {
            return Config::load_from(Path::new(&path));
        }

        let candidates = [PathBuf::from("config/energomera.yaml"), PathBuf::from("energomera.yaml")];
        for candidate in candidates.iter() {
            if candidate.exists() {
                return Config::load_from(candidate);
            }
            debug!("No config at {}", candidate.display());
        }

        Err(ConfigError::NotFound("config/energomera.yaml or energomera.yaml".to_string()))
    }
}
