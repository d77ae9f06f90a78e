// Binance Grid Trading Bot Library
//
// A single-pair spot grid bot: buys below a moving grid, sells above it and
// protects the oldest open position with a stop-loss

pub mod config;
pub mod core;
pub mod db; // SQLite price and wallet history
pub mod error; // Unified error handling
pub mod exchange;
pub mod runner;
pub mod telemetry;
pub mod validation; // Pre-flight validation

// Re-export core trading types
pub use core::{
    Action, GridEngine, GridEvent, GridState, Position, PositionLedger, Thresholds,
    WalletSnapshot, WalletTracker,
};

// Re-export error types
pub use error::{ErrorClass, TradingError, TradingResult};

// Re-export validation types
pub use validation::{PreFlightValidator, ValidationCheck, ValidationLevel, ValidationResult};

// Re-export exchange types
pub use exchange::{
    BinanceClient, ExchangeGateway, OrderConfirmation, OrderSide, PaperExchange, PriceFeed,
    SymbolFilters,
};

// Re-export configuration
pub use config::{Config, ConfigError, Credentials, ExchangeMode, GridConfig, GridSettings};

// Re-export database and telemetry types
pub use db::{profit_series, Database, PriceRecord, ProfitPoint};
pub use telemetry::{NullTelemetry, SqliteTelemetry, TelemetrySink};

pub use runner::{CycleOutcome, GridBot};
