//! Error handling for the grid bot
//!
//! Every failure is classified as transient (skip the cycle and keep going),
//! fatal (never enter or leave the trading loop) or a contract violation
//! (the engine was driven into a state its guards should have prevented).

use std::fmt;
use std::io;

use crate::config::ConfigError;

/// How the runner must react to an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Transient,
    Fatal,
    ContractViolation,
}

/// Main error type for the grid bot
#[derive(Debug)]
pub enum TradingError {
    // Exchange connectivity
    ApiConnection(String),
    ApiTimeout(String),
    ApiRateLimit(String),
    ApiResponse(String),
    ApiAuthentication(String),

    // Trading
    PriceUnavailable(String),
    InsufficientQuantity { quantity: f64, min_quantity: f64 },
    OrderRejected(String),
    SymbolFilters(String),

    // Startup
    Config(String),
    ValidationFailed(String),

    // Persistence
    Database(String),
    Telemetry(String),
    Io(String),

    // Engine guards
    ContractViolation(String),
}

impl TradingError {
    pub fn class(&self) -> ErrorClass {
        match self {
            TradingError::ApiConnection(_)
            | TradingError::ApiTimeout(_)
            | TradingError::ApiRateLimit(_)
            | TradingError::ApiResponse(_)
            | TradingError::PriceUnavailable(_)
            | TradingError::InsufficientQuantity { .. }
            | TradingError::Telemetry(_) => ErrorClass::Transient,

            // A rejection means the balance or filters disagree with the
            // engine's view; resubmitting would repeat it every cycle
            TradingError::ApiAuthentication(_)
            | TradingError::OrderRejected(_)
            | TradingError::SymbolFilters(_)
            | TradingError::Config(_)
            | TradingError::ValidationFailed(_)
            | TradingError::Database(_)
            | TradingError::Io(_) => ErrorClass::Fatal,

            TradingError::ContractViolation(_) => ErrorClass::ContractViolation,
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Transient
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            TradingError::ApiConnection(_)
            | TradingError::ApiTimeout(_)
            | TradingError::ApiRateLimit(_)
            | TradingError::ApiResponse(_)
            | TradingError::ApiAuthentication(_) => "api",

            TradingError::PriceUnavailable(_)
            | TradingError::InsufficientQuantity { .. }
            | TradingError::OrderRejected(_)
            | TradingError::SymbolFilters(_) => "trading",

            TradingError::Config(_) | TradingError::ValidationFailed(_) => "config",

            TradingError::Database(_) | TradingError::Telemetry(_) => "database",

            TradingError::Io(_) => "io",

            TradingError::ContractViolation(_) => "contract",
        }
    }

    /// Get a user-friendly error message with helpful context
    pub fn user_message(&self) -> String {
        match self {
            TradingError::ApiAuthentication(msg) => {
                format!(
                    "API authentication failed: {}\n\n\
                    💡 Check:\n\
                    - api_key_file and api_secret_file point at the right keys\n\
                    - testnet keys are only used with mode = \"testnet\"\n\
                    - the key has spot trading permission",
                    msg
                )
            }
            TradingError::SymbolFilters(msg) => {
                format!(
                    "Could not load trading filters for the symbol: {}\n\n\
                    💡 Check that [exchange].symbol is listed on the exchange",
                    msg
                )
            }
            TradingError::InsufficientQuantity { quantity, min_quantity } => {
                format!(
                    "Order quantity {} is below the exchange minimum {}\n\n\
                    💡 Either:\n\
                    - Add funds to the stake currency\n\
                    - Lower max_open_trades so each position gets a bigger slice",
                    quantity, min_quantity
                )
            }
            TradingError::ContractViolation(msg) => {
                format!(
                    "Internal contract violation: {}\n\n\
                    This is a bug. The ledger was left untouched; please report it.",
                    msg
                )
            }
            _ => self.to_string(),
        }
    }
}

impl fmt::Display for TradingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradingError::ApiConnection(msg) => write!(f, "API connection error: {}", msg),
            TradingError::ApiTimeout(msg) => write!(f, "API timeout: {}", msg),
            TradingError::ApiRateLimit(msg) => write!(f, "API rate limit exceeded: {}", msg),
            TradingError::ApiResponse(msg) => write!(f, "API response error: {}", msg),
            TradingError::ApiAuthentication(msg) => {
                write!(f, "API authentication failed: {}", msg)
            }
            TradingError::PriceUnavailable(msg) => write!(f, "Price unavailable: {}", msg),
            TradingError::InsufficientQuantity { quantity, min_quantity } => {
                write!(
                    f,
                    "Insufficient quantity: {} is below minimum {}",
                    quantity, min_quantity
                )
            }
            TradingError::OrderRejected(msg) => write!(f, "Order rejected: {}", msg),
            TradingError::SymbolFilters(msg) => write!(f, "Symbol filter error: {}", msg),
            TradingError::Config(msg) => write!(f, "Configuration error: {}", msg),
            TradingError::ValidationFailed(msg) => write!(f, "Validation failed: {}", msg),
            TradingError::Database(msg) => write!(f, "Database error: {}", msg),
            TradingError::Telemetry(msg) => write!(f, "Telemetry write failed: {}", msg),
            TradingError::Io(msg) => write!(f, "IO error: {}", msg),
            TradingError::ContractViolation(msg) => write!(f, "Contract violation: {}", msg),
        }
    }
}

impl std::error::Error for TradingError {}

impl From<io::Error> for TradingError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::TimedOut => TradingError::ApiTimeout(err.to_string()),
            io::ErrorKind::ConnectionRefused | io::ErrorKind::ConnectionReset => {
                TradingError::ApiConnection(err.to_string())
            }
            _ => TradingError::Io(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for TradingError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(_, Some(msg)) => TradingError::Database(msg),
            rusqlite::Error::QueryReturnedNoRows => {
                TradingError::Database("Query returned no rows".to_string())
            }
            _ => TradingError::Database(err.to_string()),
        }
    }
}

impl From<reqwest::Error> for TradingError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TradingError::ApiTimeout(err.to_string())
        } else if err.is_decode() {
            TradingError::ApiResponse(err.to_string())
        } else {
            TradingError::ApiConnection(err.to_string())
        }
    }
}

impl From<serde_json::Error> for TradingError {
    fn from(err: serde_json::Error) -> Self {
        TradingError::ApiResponse(format!("JSON parse error: {}", err))
    }
}

impl From<ConfigError> for TradingError {
    fn from(err: ConfigError) -> Self {
        TradingError::Config(err.to_string())
    }
}

/// Result type alias using TradingError
pub type TradingResult<T> = Result<T, TradingError>;
