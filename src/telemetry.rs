//! Telemetry sinks for price and wallet history
//!
//! Writes are best effort: the runner logs a failed write and keeps trading.

use std::path::Path;

use tracing::info;

use crate::core::WalletSnapshot;
use crate::db::{Database, PriceRecord};
use crate::error::{TradingError, TradingResult};

pub trait TelemetrySink: Send + Sync {
    fn record_price(&self, record: &PriceRecord) -> TradingResult<()>;

    fn record_wallet(&self, snapshot: &WalletSnapshot) -> TradingResult<()>;
}

/// Appends rows to the SQLite telemetry database
pub struct SqliteTelemetry {
    db: Database,
    symbol: String,
}

impl SqliteTelemetry {
    /// Open the database at `path`, creating parent directories and schema
    pub fn open<P: AsRef<Path>>(path: P, symbol: impl Into<String>) -> TradingResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let db = Database::new(path)?;
        db.run_migrations()?;
        info!(path = %path.display(), "telemetry database ready");

        Ok(Self::with_database(db, symbol))
    }

    pub fn with_database(db: Database, symbol: impl Into<String>) -> Self {
        Self {
            db,
            symbol: symbol.into(),
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

impl TelemetrySink for SqliteTelemetry {
    fn record_price(&self, record: &PriceRecord) -> TradingResult<()> {
        record
            .insert(self.db.get_connection())
            .map(|_| ())
            .map_err(|e| TradingError::Telemetry(format!("price row: {}", e)))
    }

    fn record_wallet(&self, snapshot: &WalletSnapshot) -> TradingResult<()> {
        snapshot
            .insert(self.db.get_connection(), &self.symbol)
            .map(|_| ())
            .map_err(|e| TradingError::Telemetry(format!("wallet row: {}", e)))
    }
}

/// Discards everything; used when telemetry is disabled
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTelemetry;

impl TelemetrySink for NullTelemetry {
    fn record_price(&self, _record: &PriceRecord) -> TradingResult<()> {
        Ok(())
    }

    fn record_wallet(&self, _snapshot: &WalletSnapshot) -> TradingResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;

    #[test]
    fn test_sqlite_sink_creates_nested_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data").join("XRPBUSD.db");
        let sink = SqliteTelemetry::open(&path, "XRPBUSD").unwrap();
        assert!(path.exists());

        sink.record_price(&PriceRecord::new("XRPBUSD", Some(0.5))).unwrap();
        sink.record_wallet(&WalletSnapshot {
            timestamp: Utc::now(),
            stake_balance: 100.0,
            trade_balance: 0.0,
            last_price: Some(0.5),
        })
        .unwrap();

        let conn = sink.database().get_connection();
        assert_eq!(PriceRecord::list_recent(conn.clone(), "XRPBUSD", 5).unwrap().len(), 1);
        assert!(WalletSnapshot::latest(conn, "XRPBUSD").unwrap().is_some());
    }

    #[test]
    fn test_write_failure_is_transient() {
        // No migrations: inserts hit a missing table
        let sink = SqliteTelemetry::with_database(Database::new_in_memory().unwrap(), "XRPBUSD");
        let err = sink.record_price(&PriceRecord::new("XRPBUSD", None)).unwrap_err();
        assert!(matches!(err, TradingError::Telemetry(_)));
        assert!(err.is_retryable());
    }
}
