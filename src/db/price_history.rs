//! Price history rows, one per cycle

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Result as SqlResult, Row};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

use super::{format_timestamp, lock, parse_timestamp};

/// A price observation; `price` is `None` when the fetch failed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub id: Option<i64>,
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub price: Option<f64>,
}

impl PriceRecord {
    pub fn new(symbol: impl Into<String>, price: Option<f64>) -> Self {
        PriceRecord {
            id: None,
            symbol: symbol.into(),
            timestamp: Utc::now(),
            price,
        }
    }

    fn from_row(row: &Row) -> SqlResult<Self> {
        Ok(PriceRecord {
            id: Some(row.get(0)?),
            symbol: row.get(1)?,
            timestamp: parse_timestamp(2, &row.get::<_, String>(2)?)?,
            price: row.get(3)?,
        })
    }

    /// Insert price record into database
    pub fn insert(&self, conn: Arc<Mutex<Connection>>) -> SqlResult<i64> {
        let conn = lock(&conn);
        conn.execute(
            "INSERT INTO price_history (symbol, timestamp, price) VALUES (?1, ?2, ?3)",
            params![self.symbol, format_timestamp(&self.timestamp), self.price],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Most recent records for a symbol, newest first
    pub fn list_recent(
        conn: Arc<Mutex<Connection>>,
        symbol: &str,
        limit: usize,
    ) -> SqlResult<Vec<Self>> {
        let conn = lock(&conn);
        let mut stmt = conn.prepare(
            "SELECT id, symbol, timestamp, price
             FROM price_history WHERE symbol = ?1
             ORDER BY timestamp DESC, id DESC LIMIT ?2",
        )?;

        let rows = stmt.query_map(params![symbol, limit as i64], |row| Self::from_row(row))?;
        rows.collect()
    }
}
