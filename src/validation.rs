//! Pre-flight validation module for the grid bot
//!
//! Performs checks before entering the trading loop so that a bad config,
//! missing keys or an account too small to trade are reported up front.

use std::path::Path;

use chrono::Utc;
use tracing::{error, info, warn};

use crate::config::{Config, Credentials};
use crate::core::round_to;
use crate::error::{TradingError, TradingResult};
use crate::exchange::{BinanceClient, ExchangeGateway, PriceFeed, SymbolFilters};
use crate::telemetry::SqliteTelemetry;

/// Local clock drift above which signed requests start failing
const MAX_CLOCK_DRIFT_MS: i64 = 1000;

/// Validation result with detailed findings
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub passed: bool,
    pub checks: Vec<ValidationCheck>,
}

#[derive(Debug, Clone)]
pub struct ValidationCheck {
    pub name: String,
    pub passed: bool,
    pub message: String,
    pub level: ValidationLevel,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValidationLevel {
    Critical, // Must pass for the bot to start
    Warning,  // Should pass, but the bot can still start
    Info,     // Informational only
}

impl ValidationCheck {
    fn new(name: &str, passed: bool, message: impl Into<String>, level: ValidationLevel) -> Self {
        ValidationCheck {
            name: name.to_string(),
            passed,
            message: message.into(),
            level,
        }
    }
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidationResult {
    pub fn new() -> Self {
        ValidationResult {
            passed: true,
            checks: Vec::new(),
        }
    }

    pub fn add_check(&mut self, check: ValidationCheck) {
        if !check.passed && check.level == ValidationLevel::Critical {
            self.passed = false;
        }
        self.checks.push(check);
    }

    pub fn critical_failures(&self) -> Vec<&ValidationCheck> {
        self.checks
            .iter()
            .filter(|c| !c.passed && c.level == ValidationLevel::Critical)
            .collect()
    }

    pub fn warnings(&self) -> Vec<&ValidationCheck> {
        self.checks
            .iter()
            .filter(|c| !c.passed && c.level == ValidationLevel::Warning)
            .collect()
    }

    /// Turn critical failures into a `ValidationFailed` error
    pub fn ensure_passed(&self) -> TradingResult<()> {
        if self.passed {
            return Ok(());
        }
        let reasons: Vec<String> = self
            .critical_failures()
            .iter()
            .map(|c| format!("{}: {}", c.name, c.message))
            .collect();
        Err(TradingError::ValidationFailed(reasons.join("; ")))
    }

    pub fn display(&self) {
        info!("🔍 Pre-flight Validation");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

        for check in &self.checks {
            let icon = if check.passed {
                "✅"
            } else {
                match check.level {
                    ValidationLevel::Critical => "❌",
                    ValidationLevel::Warning => "⚠️",
                    ValidationLevel::Info => "ℹ️",
                }
            };

            info!("{} {} - {}", icon, check.name, check.message);
        }

        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

        if !self.passed {
            let failures = self.critical_failures();
            error!("❌ Validation failed: {} critical issue(s)", failures.len());
            for failure in failures {
                error!("   • {}: {}", failure.name, failure.message);
            }
        } else {
            let warnings = self.warnings();
            if !warnings.is_empty() {
                warn!("⚠️  {} warning(s) detected", warnings.len());
                for warning in warnings {
                    warn!("   • {}: {}", warning.name, warning.message);
                }
            }
            info!("✅ All critical checks passed");
        }
    }
}

/// Pre-flight validator for the trading loop
pub struct PreFlightValidator {
    config: Config,
}

impl PreFlightValidator {
    pub fn new(config: Config) -> Self {
        PreFlightValidator { config }
    }

    /// Offline checks: config, credentials and the telemetry database
    pub fn validate_all(&self) -> ValidationResult {
        let mut result = ValidationResult::new();

        result.add_check(self.check_config());
        result.add_check(self.check_credentials());
        result.add_check(self.check_telemetry_database());

        result
    }

    /// Offline checks plus exchange reachability and order-size feasibility
    pub async fn validate_for_trading<F, G>(&self, feed: &F, gateway: &G) -> ValidationResult
    where
        F: PriceFeed + ?Sized,
        G: ExchangeGateway + ?Sized,
    {
        let mut result = self.validate_all();
        if !result.passed {
            return result;
        }

        let filters = match gateway.get_symbol_filters(&self.config.exchange.symbol).await {
            Ok(filters) => {
                result.add_check(ValidationCheck::new(
                    "Symbol Filters",
                    true,
                    format!(
                        "min quantity {}, step {}",
                        filters.min_quantity, filters.quantity_step_size
                    ),
                    ValidationLevel::Info,
                ));
                filters
            }
            Err(e) => {
                result.add_check(ValidationCheck::new(
                    "Symbol Filters",
                    false,
                    e.to_string(),
                    ValidationLevel::Critical,
                ));
                return result;
            }
        };

        let price = match feed.get_price().await {
            Ok(price) => price,
            Err(e) => {
                result.add_check(ValidationCheck::new(
                    "Price Feed",
                    false,
                    e.to_string(),
                    ValidationLevel::Critical,
                ));
                return result;
            }
        };

        match gateway.get_free_balance(&self.config.exchange.quote_asset).await {
            Ok(stake_balance) => {
                result.add_check(self.check_order_size(price, stake_balance, filters));
            }
            Err(e) => {
                result.add_check(ValidationCheck::new(
                    "Account",
                    false,
                    e.to_string(),
                    ValidationLevel::Critical,
                ));
            }
        }

        result
    }

    fn check_config(&self) -> ValidationCheck {
        match self.config.validate() {
            Ok(()) => ValidationCheck::new(
                "Configuration",
                true,
                format!(
                    "{} in {:?} mode, step {:.2}%, {} slots",
                    self.config.exchange.symbol,
                    self.config.exchange.mode,
                    self.config.grid.grid_step * 100.0,
                    self.config.grid.max_open_trades
                ),
                ValidationLevel::Critical,
            ),
            Err(e) => ValidationCheck::new("Configuration", false, e.to_string(), ValidationLevel::Critical),
        }
    }

    fn check_credentials(&self) -> ValidationCheck {
        if !self.config.exchange.mode.needs_credentials() {
            return ValidationCheck::new(
                "API Keys",
                true,
                "Not required in paper mode",
                ValidationLevel::Info,
            );
        }

        match Credentials::from_config(&self.config.exchange) {
            Ok(_) => ValidationCheck::new("API Keys", true, "Loaded", ValidationLevel::Critical),
            Err(e) => ValidationCheck::new("API Keys", false, e.to_string(), ValidationLevel::Critical),
        }
    }

    fn check_telemetry_database(&self) -> ValidationCheck {
        if !self.config.telemetry.enabled {
            return ValidationCheck::new("Telemetry", true, "Disabled", ValidationLevel::Info);
        }

        let db_path = self.config.telemetry_db_path();
        match SqliteTelemetry::open(Path::new(&db_path), &self.config.exchange.symbol) {
            Ok(sink) => match sink.database().health_check() {
                Ok(true) => ValidationCheck::new(
                    "Telemetry",
                    true,
                    format!("Writable at {}", db_path),
                    ValidationLevel::Warning,
                ),
                _ => ValidationCheck::new(
                    "Telemetry",
                    false,
                    "Health check failed",
                    ValidationLevel::Warning,
                ),
            },
            Err(e) => ValidationCheck::new(
                "Telemetry",
                false,
                format!("Cannot open {}: {}", db_path, e),
                ValidationLevel::Warning,
            ),
        }
    }

    /// Whether one slot of the stake buys at least the minimum quantity
    pub fn check_order_size(
        &self,
        price: f64,
        stake_balance: f64,
        filters: SymbolFilters,
    ) -> ValidationCheck {
        let grid = &self.config.grid;
        let per_position = stake_balance * grid.tradeable_stake_fraction / grid.max_open_trades as f64;
        let quantity = round_to(per_position / price, filters.quantity_precision());

        if quantity < filters.min_quantity || quantity <= 0.0 {
            ValidationCheck::new(
                "Position Size",
                false,
                format!(
                    "{:.4} {} per position buys {} at {}, below minimum {}",
                    per_position, self.config.exchange.quote_asset, quantity, price, filters.min_quantity
                ),
                ValidationLevel::Warning,
            )
        } else {
            ValidationCheck::new(
                "Position Size",
                true,
                format!(
                    "{:.4} {} per position ({} {})",
                    per_position, self.config.exchange.quote_asset, quantity, self.config.exchange.base_asset
                ),
                ValidationLevel::Info,
            )
        }
    }

    /// Compare the exchange clock with ours; signed requests need them close
    pub async fn check_clock_drift(&self, client: &BinanceClient) -> ValidationCheck {
        match client.server_time().await {
            Ok(server_ms) => {
                let drift = (Utc::now().timestamp_millis() - server_ms).abs();
                ValidationCheck::new(
                    "Clock",
                    drift <= MAX_CLOCK_DRIFT_MS,
                    format!("{} ms from exchange time", drift),
                    ValidationLevel::Warning,
                )
            }
            Err(e) => ValidationCheck::new(
                "Clock",
                false,
                format!("Cannot reach exchange: {}", e),
                ValidationLevel::Warning,
            ),
        }
    }
}
