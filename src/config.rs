//! Configuration module for the ledger server.
//!
//! Supports both command-line arguments and TOML configuration file.
//! CLI arguments take precedence over config file values.

use crate::ledger::DEFAULT_WITHDRAW_TIMEOUT;
use clap::{Parser, ValueEnum};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Command-line arguments for the ledger server
#[derive(Parser, Debug)]
#[command(name = "ledger-server")]
#[command(author = "ledger-server authors")]
#[command(version = "0.1.0")]
#[command(about = "A concurrent account ledger over a text protocol", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to bind to (e.g., 127.0.0.1:27015)
    #[arg(short = 'l', long)]
    pub listen: Option<String>,

    /// Protocol spoken on accepted connections
    #[arg(short = 'p', long, value_enum)]
    pub protocol: Option<ProtocolType>,

    /// Number of runtime worker threads (defaults to number of CPU cores)
    #[arg(short = 'w', long)]
    pub workers: Option<usize>,

    /// Maximum number of concurrent connections
    #[arg(long)]
    pub max_connections: Option<usize>,

    /// How long a withdrawal waits for funds, in milliseconds
    #[arg(long)]
    pub withdraw_timeout_ms: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// Protocol selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolType {
    /// Ledger commands
    #[default]
    Bank,
    /// Integer echo-increment
    Increment,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server-related configuration
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to
    #[serde(default = "default_listen")]
    pub listen: String,
    #[serde(default)]
    pub protocol: ProtocolType,
    /// Number of worker threads
    pub workers: Option<usize>,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            protocol: ProtocolType::default(),
            workers: None,
            max_connections: default_max_connections(),
        }
    }
}

/// Ledger-related configuration
#[derive(Debug, Deserialize)]
pub struct LedgerConfig {
    /// Wait window for withdrawals and transfers in milliseconds
    #[serde(default = "default_withdraw_timeout_ms")]
    pub withdraw_timeout_ms: u64,
    /// Account addressed by commands that name no account
    #[serde(default)]
    pub house: HouseAccountConfig,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            withdraw_timeout_ms: default_withdraw_timeout_ms(),
            house: HouseAccountConfig::default(),
        }
    }
}

/// Holder and opening balance of the house account
#[derive(Debug, Clone, Deserialize)]
pub struct HouseAccountConfig {
    #[serde(default = "default_house_last_name")]
    pub last_name: String,
    #[serde(default = "default_house_first_name")]
    pub first_name: String,
    #[serde(default)]
    pub credit_rating: i32,
    #[serde(default)]
    pub opening_balance: f64,
}

impl Default for HouseAccountConfig {
    fn default() -> Self {
        Self {
            last_name: default_house_last_name(),
            first_name: default_house_first_name(),
            credit_rating: 0,
            opening_balance: 0.0,
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_listen() -> String {
    "127.0.0.1:27015".to_string()
}

fn default_max_connections() -> usize {
    1024
}

fn default_withdraw_timeout_ms() -> u64 {
    DEFAULT_WITHDRAW_TIMEOUT.as_millis() as u64
}

fn default_house_last_name() -> String {
    "House".to_string()
}

fn default_house_first_name() -> String {
    "Account".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub listen: String,
    pub protocol: ProtocolType,
    pub workers: Option<usize>,
    pub max_connections: usize,
    pub withdraw_timeout: Duration,
    pub house: HouseAccountConfig,
    pub log_level: String,
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    /// CLI arguments take precedence over TOML file values.
    pub fn load() -> Result<Self, ConfigError> {
        let cli = CliArgs::parse();

        // Load TOML config if specified
        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        Self::merge(cli, toml_config)
    }

    /// Merge CLI args with TOML config (CLI takes precedence)
    pub fn merge(cli: CliArgs, toml_config: TomlConfig) -> Result<Self, ConfigError> {
        let config = Config {
            listen: cli.listen.unwrap_or(toml_config.server.listen),
            protocol: cli.protocol.unwrap_or(toml_config.server.protocol),
            workers: cli.workers.or(toml_config.server.workers),
            max_connections: cli
                .max_connections
                .unwrap_or(toml_config.server.max_connections),
            withdraw_timeout: Duration::from_millis(
                cli.withdraw_timeout_ms
                    .unwrap_or(toml_config.ledger.withdraw_timeout_ms),
            ),
            house: toml_config.ledger.house,
            log_level: if cli.log_level != "info" {
                cli.log_level
            } else {
                toml_config.logging.level
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "max_connections must be greater than zero".to_string(),
            ));
        }
        if self.workers == Some(0) {
            return Err(ConfigError::Invalid(
                "workers must be greater than zero".to_string(),
            ));
        }
        let balance = self.house.opening_balance;
        if !balance.is_finite() || balance < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "opening_balance must be a non-negative number, got {balance}"
            )));
        }
        Ok(())
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{}': {}", .0.display(), .1)]
    FileRead(PathBuf, #[source] std::io::Error),
    #[error("Failed to parse config file '{}': {}", .0.display(), .1)]
    TomlParse(PathBuf, #[source] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
