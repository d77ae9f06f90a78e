// Status command: wallet history and unrealized profit from telemetry
use std::path::Path;

use tracing::{info, warn};

use binance_grid_bot::{profit_series, Config, Database, PriceRecord, TradingResult, WalletSnapshot};

pub fn show_status(config: &Config, limit: usize) -> TradingResult<()> {
    let db_path = config.telemetry_db_path();
    let symbol = &config.exchange.symbol;

    info!("📊 Status for {}", symbol);
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    if !Path::new(&db_path).exists() {
        warn!("📁 No telemetry database at {}", db_path);
        warn!("💡 Run: grid-bot run --paper");
        return Ok(());
    }

    let db = Database::new(&db_path)?;
    db.run_migrations()?;

    if let Some(record) = PriceRecord::list_recent(db.get_connection(), symbol, 1)?.first() {
        match record.price {
            Some(price) => info!("💱 Last price: {} at {}", price, record.timestamp.format("%Y-%m-%d %H:%M:%S UTC")),
            None => warn!("💱 Last price fetch failed at {}", record.timestamp.format("%Y-%m-%d %H:%M:%S UTC")),
        }
    }

    // Profit is measured from the very first snapshot, not the first shown
    let history = WalletSnapshot::list_by_symbol(db.get_connection(), symbol, None)?;
    if history.is_empty() {
        info!("💰 No wallet snapshots recorded yet");
        return Ok(());
    }

    let series = profit_series(&history);
    let start = history.len().saturating_sub(limit);

    info!(
        "{:<20} {:>14} {:>14} {:>12} {:>12} {:>9}",
        "time", &config.exchange.quote_asset, &config.exchange.base_asset, "price", "profit", "profit %"
    );
    for (snapshot, point) in history.iter().zip(series.iter()).skip(start) {
        info!(
            "{:<20} {:>14.4} {:>14.4} {:>12} {:>12.4} {:>8.2}%",
            snapshot.timestamp.format("%Y-%m-%d %H:%M:%S"),
            snapshot.stake_balance,
            snapshot.trade_balance,
            snapshot.last_price.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string()),
            point.profit,
            point.profit_percent
        );
    }

    if let Some(last) = series.last() {
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        info!(
            "📈 Unrealized profit: {:.4} {} ({:+.2}%) over {} snapshots",
            last.profit,
            config.exchange.quote_asset,
            last.profit_percent,
            history.len()
        );
    }

    Ok(())
}
