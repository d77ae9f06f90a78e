// Configuration management for the grid bot

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::exchange::SymbolFilters;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeMode {
    Live,
    Testnet,
    Paper,
}

impl ExchangeMode {
    pub fn needs_credentials(&self) -> bool {
        !matches!(self, ExchangeMode::Paper)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeConfig {
    pub symbol: String,
    pub base_asset: String,          // Trade coin, e.g. XRP
    pub quote_asset: String,         // Stake currency, e.g. BUSD
    #[serde(default = "default_mode")]
    pub mode: ExchangeMode,
    #[serde(default = "default_rest_url")]
    pub rest_url: String,
    #[serde(default = "default_testnet_url")]
    pub testnet_url: String,
    #[serde(default)]
    pub api_key_file: Option<String>,
    #[serde(default)]
    pub api_secret_file: Option<String>,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_recv_window")]
    pub recv_window_ms: u64,
}

impl ExchangeConfig {
    /// Base URL for the configured mode; paper mode reads public prices from live
    pub fn base_url(&self) -> &str {
        match self.mode {
            ExchangeMode::Testnet => &self.testnet_url,
            ExchangeMode::Live | ExchangeMode::Paper => &self.rest_url,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridSettings {
    #[serde(default = "default_grid_step")]
    pub grid_step: f64,
    #[serde(default = "default_max_open_trades")]
    pub max_open_trades: usize,
    #[serde(default = "default_tradeable_stake_fraction")]
    pub tradeable_stake_fraction: f64,
    /// Explicit stop-loss multiplier; derived from the grid when absent
    #[serde(default)]
    pub stoploss_multiplier: Option<f64>,
    #[serde(default = "default_true")]
    pub stoploss_enabled: bool,
}

impl GridSettings {
    /// Stop-loss distance from the oldest entry price, or None when disabled
    pub fn stoploss_multiplier(&self) -> Option<f64> {
        if !self.stoploss_enabled {
            return None;
        }
        Some(
            self.stoploss_multiplier
                .unwrap_or(self.grid_step * (self.max_open_trades as f64 + 1.0)),
        )
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.grid_step <= 0.0 || self.grid_step >= 1.0 {
            return Err(ConfigError::Validation("grid_step must be between 0 and 1".to_string()));
        }

        if self.max_open_trades == 0 {
            return Err(ConfigError::Validation(
                "max_open_trades must be greater than 0".to_string(),
            ));
        }

        if self.tradeable_stake_fraction <= 0.0 || self.tradeable_stake_fraction > 1.0 {
            return Err(ConfigError::Validation(
                "tradeable_stake_fraction must be in (0, 1]".to_string(),
            ));
        }

        if let Some(multiplier) = self.stoploss_multiplier() {
            if multiplier <= self.grid_step || multiplier >= 1.0 {
                return Err(ConfigError::Validation(format!(
                    "stoploss multiplier {} must exceed grid_step {} and stay below 1",
                    multiplier, self.grid_step
                )));
            }
        }

        Ok(())
    }
}

impl Default for GridSettings {
    fn default() -> Self {
        Self {
            grid_step: default_grid_step(),
            max_open_trades: default_max_open_trades(),
            tradeable_stake_fraction: default_tradeable_stake_fraction(),
            stoploss_multiplier: None,
            stoploss_enabled: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    #[serde(default = "default_cycle_delay")]
    pub cycle_delay_ms: u64,
    #[serde(default = "default_mean_price_samples")]
    pub mean_price_samples: usize,
    #[serde(default = "default_mean_price_interval")]
    pub mean_price_interval_ms: u64,
    /// Cycles between wallet audits when nothing was traded
    #[serde(default = "default_wallet_audit_every")]
    pub wallet_audit_every: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            cycle_delay_ms: default_cycle_delay(),
            mean_price_samples: default_mean_price_samples(),
            mean_price_interval_ms: default_mean_price_interval(),
            wallet_audit_every: default_wallet_audit_every(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// `{symbol}` is replaced with the traded symbol
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            db_path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperConfig {
    #[serde(default = "default_paper_stake")]
    pub stake_balance: f64,
    #[serde(default)]
    pub trade_balance: f64,
    #[serde(default = "default_paper_min_quantity")]
    pub min_quantity: f64,
    #[serde(default = "default_paper_step_size")]
    pub quantity_step_size: f64,
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self {
            stake_balance: default_paper_stake(),
            trade_balance: 0.0,
            min_quantity: default_paper_min_quantity(),
            quantity_step_size: default_paper_step_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub exchange: ExchangeConfig,
    #[serde(default)]
    pub grid: GridSettings,
    #[serde(default)]
    pub runner: RunnerConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub paper: PaperConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

// Default value functions
fn default_mode() -> ExchangeMode { ExchangeMode::Paper }
fn default_rest_url() -> String { "https://api.binance.com".to_string() }
fn default_testnet_url() -> String { "https://testnet.binance.vision".to_string() }
fn default_request_timeout() -> u64 { 10 }
fn default_recv_window() -> u64 { 5000 }
fn default_grid_step() -> f64 { 0.01 }
fn default_max_open_trades() -> usize { 5 }
fn default_tradeable_stake_fraction() -> f64 { 0.8 }
fn default_cycle_delay() -> u64 { 1500 }
fn default_mean_price_samples() -> usize { 10 }
fn default_mean_price_interval() -> u64 { 1000 }
fn default_wallet_audit_every() -> u64 { 20 }
fn default_db_path() -> String { "data/{symbol}.db".to_string() }
fn default_paper_stake() -> f64 { 1000.0 }
fn default_paper_min_quantity() -> f64 { 1.0 }
fn default_paper_step_size() -> f64 { 1.0 }
fn default_log_level() -> String { "info".to_string() }
fn default_true() -> bool { true }

impl Default for Config {
    fn default() -> Self {
        Self {
            exchange: ExchangeConfig {
                symbol: "XRPBUSD".to_string(),
                base_asset: "XRP".to_string(),
                quote_asset: "BUSD".to_string(),
                mode: default_mode(),
                rest_url: default_rest_url(),
                testnet_url: default_testnet_url(),
                api_key_file: None,
                api_secret_file: None,
                request_timeout_secs: default_request_timeout(),
                recv_window_ms: default_recv_window(),
            },
            grid: GridSettings::default(),
            runner: RunnerConfig::default(),
            telemetry: TelemetryConfig::default(),
            paper: PaperConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::FileRead(e.to_string()))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| ConfigError::Parse(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;

        fs::write(path, content)
            .map_err(|e| ConfigError::FileWrite(e.to_string()))?;

        Ok(())
    }

    /// Load configuration from file, or create default if file doesn't exist
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            let config = Self::default();
            config.to_file(&path)?;
            tracing::info!("📁 Created default config file: {}", path.as_ref().display());
            Ok(config)
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.exchange.symbol.is_empty() {
            return Err(ConfigError::Validation("symbol must not be empty".to_string()));
        }

        if self.exchange.base_asset.is_empty() || self.exchange.quote_asset.is_empty() {
            return Err(ConfigError::Validation(
                "base_asset and quote_asset must not be empty".to_string(),
            ));
        }

        if self.exchange.request_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "request_timeout_secs must be greater than 0".to_string(),
            ));
        }

        self.grid.validate()?;

        if self.runner.cycle_delay_ms == 0 {
            return Err(ConfigError::Validation("cycle_delay_ms must be greater than 0".to_string()));
        }

        if self.runner.mean_price_samples == 0 {
            return Err(ConfigError::Validation(
                "mean_price_samples must be greater than 0".to_string(),
            ));
        }

        if self.exchange.mode == ExchangeMode::Paper {
            if self.paper.stake_balance < 0.0 || self.paper.trade_balance < 0.0 {
                return Err(ConfigError::Validation("paper balances must be non-negative".to_string()));
            }
            if self.paper.quantity_step_size <= 0.0 {
                return Err(ConfigError::Validation(
                    "paper quantity_step_size must be positive".to_string(),
                ));
            }
        }

        Ok(())
    }

    pub fn stoploss_multiplier(&self) -> Option<f64> {
        self.grid.stoploss_multiplier()
    }

    pub fn telemetry_db_path(&self) -> String {
        self.telemetry.db_path.replace("{symbol}", &self.exchange.symbol)
    }
}

/// Immutable grid parameters handed to the engine at creation
#[derive(Debug, Clone, PartialEq)]
pub struct GridConfig {
    pub grid_step: f64,
    pub max_open_trades: usize,
    pub tradeable_stake_fraction: f64,
    /// None disables the stop-loss entirely
    pub stoploss_multiplier: Option<f64>,
    pub stake_asset: String,
    pub min_quantity: f64,
    pub quantity_step_size: f64,
    pub quantity_precision: u32,
}

impl GridConfig {
    pub fn new(
        settings: &GridSettings,
        stake_asset: impl Into<String>,
        filters: SymbolFilters,
    ) -> Result<Self, ConfigError> {
        settings.validate()?;

        if filters.quantity_step_size <= 0.0 || filters.min_quantity < 0.0 {
            return Err(ConfigError::Validation(format!(
                "invalid symbol filters: min_quantity={} step_size={}",
                filters.min_quantity, filters.quantity_step_size
            )));
        }

        Ok(Self {
            grid_step: settings.grid_step,
            max_open_trades: settings.max_open_trades,
            tradeable_stake_fraction: settings.tradeable_stake_fraction,
            stoploss_multiplier: settings.stoploss_multiplier(),
            stake_asset: stake_asset.into(),
            min_quantity: filters.min_quantity,
            quantity_step_size: filters.quantity_step_size,
            quantity_precision: filters.quantity_precision(),
        })
    }
}

/// API key pair read from the operator's key files
#[derive(Clone)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Each file may wrap the key over several lines; lines are trimmed and joined
    pub fn from_files<P: AsRef<Path>>(key_path: P, secret_path: P) -> Result<Self, ConfigError> {
        let api_key = read_key_file(key_path.as_ref())?;
        let api_secret = read_key_file(secret_path.as_ref())?;

        if api_key.is_empty() || api_secret.is_empty() {
            return Err(ConfigError::Validation("API key files must not be empty".to_string()));
        }

        Ok(Self { api_key, api_secret })
    }

    pub fn from_config(exchange: &ExchangeConfig) -> Result<Self, ConfigError> {
        match (&exchange.api_key_file, &exchange.api_secret_file) {
            (Some(key), Some(secret)) => Self::from_files(key, secret),
            _ => Err(ConfigError::Validation(
                "api_key_file and api_secret_file are required for live and testnet modes".to_string(),
            )),
        }
    }
}

fn read_key_file(path: &Path) -> Result<String, ConfigError> {
    let content = fs::read_to_string(path)
        .map_err(|e| ConfigError::FileRead(format!("{}: {}", path.display(), e)))?;
    Ok(content.lines().map(str::trim).collect())
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(String),

    #[error("Failed to write config file: {0}")]
    FileWrite(String),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Failed to serialize config: {0}")]
    Serialize(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}
