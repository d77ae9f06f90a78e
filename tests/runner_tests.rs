// Integration tests for bootstrapping and the cycle loop

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use binance_grid_bot::{
    Action, Config, GridBot, NullTelemetry, OrderSide, PaperExchange, PriceRecord,
    SqliteTelemetry, TelemetrySink, TradingError, TradingResult, WalletSnapshot,
};
use common::{create_test_config, fine_filters, Failure, MockExchange, SYMBOL};
use tempfile::TempDir;
use tokio::sync::watch;

fn sqlite_sink(config: &Config) -> Arc<SqliteTelemetry> {
    Arc::new(SqliteTelemetry::open(config.telemetry_db_path(), SYMBOL).unwrap())
}

/// Sink whose every write fails
#[derive(Default)]
struct BrokenTelemetry {
    attempts: AtomicUsize,
}

impl TelemetrySink for BrokenTelemetry {
    fn record_price(&self, _record: &PriceRecord) -> TradingResult<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(TradingError::Telemetry("disk full".to_string()))
    }

    fn record_wallet(&self, _snapshot: &WalletSnapshot) -> TradingResult<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(TradingError::Telemetry("disk full".to_string()))
    }
}

#[tokio::test]
async fn test_cycles_trade_and_record_telemetry() {
    let temp_dir = TempDir::new().unwrap();
    let config = create_test_config(temp_dir.path());
    let sink = sqlite_sink(&config);
    let exchange = Arc::new(
        MockExchange::new(1000.0, fine_filters())
            .with_prices(&[Some(100.0), Some(98.9), None, Some(100.0), Some(100.0)]),
    );

    let mut bot = GridBot::bootstrap(config, exchange.clone(), exchange.clone(), sink.clone())
        .await
        .unwrap();
    assert_eq!(bot.engine().state().buy_threshold, 99.0);
    assert_eq!(bot.engine().state().sell_threshold, 101.0);

    let outcome = bot.run_cycle().await.unwrap();
    assert_eq!(outcome.event.as_ref().map(|e| e.action()), Some(Action::Buy));
    assert!(outcome.wallet_audited);

    let err = bot.run_cycle().await.unwrap_err();
    assert!(matches!(err, TradingError::ApiTimeout(_)));
    assert_eq!(bot.engine().active_trades(), 1);

    let outcome = bot.run_cycle().await.unwrap();
    assert_eq!(outcome.event.as_ref().map(|e| e.action()), Some(Action::Sell));
    assert!(bot.engine().ledger().is_empty());

    let outcome = bot.run_cycle().await.unwrap();
    assert!(outcome.event.is_none());
    assert!(!outcome.wallet_audited);
    assert_eq!(bot.cycles(), 4);

    let conn = sink.database().get_connection();
    let prices = PriceRecord::list_recent(conn.clone(), SYMBOL, 10).unwrap();
    assert_eq!(prices.len(), 4);
    assert_eq!(prices.iter().filter(|r| r.price.is_none()).count(), 1);

    // Starting wallet, after the buy, after the sell
    let wallet = WalletSnapshot::list_by_symbol(conn, SYMBOL, None).unwrap();
    assert_eq!(wallet.len(), 3);
    assert_eq!(wallet[0].stake_balance, 1000.0);
    assert_eq!(wallet[0].last_price, None);
    assert!(wallet[1].trade_balance > 0.0);
    assert_eq!(wallet[2].trade_balance, 0.0);
}

#[tokio::test]
async fn test_filters_failure_is_fatal() {
    let temp_dir = TempDir::new().unwrap();
    let config = create_test_config(temp_dir.path());
    let exchange = Arc::new(MockExchange::new(1000.0, fine_filters()).with_prices(&[Some(1.0)]));
    exchange.fail_filters();

    let result = GridBot::bootstrap(config, exchange.clone(), exchange, Arc::new(NullTelemetry)).await;
    let err = result.err().expect("bootstrap must fail");
    assert!(matches!(err, TradingError::SymbolFilters(_)));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_mean_price_centers_grid() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = create_test_config(temp_dir.path());
    config.runner.mean_price_samples = 4;
    let exchange = Arc::new(
        MockExchange::new(1000.0, fine_filters())
            .with_prices(&[Some(99.0), Some(101.0), None, Some(100.0)]),
    );

    let bot = GridBot::bootstrap(config, exchange.clone(), exchange, Arc::new(NullTelemetry))
        .await
        .unwrap();
    assert_eq!(bot.last_price(), Some(100.0));
    assert_eq!(bot.engine().thresholds().buy, 99.0);
}

#[tokio::test]
async fn test_run_stops_on_shutdown_signal() {
    let temp_dir = TempDir::new().unwrap();
    let config = create_test_config(temp_dir.path());
    // After the script runs out every cycle fails transiently
    let exchange = Arc::new(
        MockExchange::new(1000.0, fine_filters()).with_prices(&[Some(100.0), Some(100.5)]),
    );

    let mut bot = GridBot::bootstrap(config, exchange.clone(), exchange, Arc::new(NullTelemetry))
        .await
        .unwrap();

    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let _ = tx.send(true);
    });

    tokio::time::timeout(Duration::from_secs(5), bot.run(rx))
        .await
        .expect("loop must observe shutdown")
        .unwrap();
    assert!(bot.cycles() >= 2);
}

#[tokio::test]
async fn test_run_exits_on_fatal_error() {
    let temp_dir = TempDir::new().unwrap();
    let config = create_test_config(temp_dir.path());
    let exchange = Arc::new(
        MockExchange::new(1000.0, fine_filters()).with_prices(&[Some(100.0), Some(98.0)]),
    );
    exchange.fail_next_order(Failure::Unauthorized);

    let mut bot = GridBot::bootstrap(config, exchange.clone(), exchange.clone(), Arc::new(NullTelemetry))
        .await
        .unwrap();

    let (_tx, rx) = watch::channel(false);
    let err = bot.run(rx).await.unwrap_err();
    assert!(matches!(err, TradingError::ApiAuthentication(_)));
    assert!(bot.engine().ledger().is_empty());
    assert!(exchange.orders().is_empty());
}

#[tokio::test]
async fn test_paper_exchange_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let config = create_test_config(temp_dir.path());
    let feed = MockExchange::new(0.0, fine_filters())
        .with_prices(&[Some(0.5), Some(0.49), Some(0.5)]);
    let paper = Arc::new(PaperExchange::new(feed, &config.exchange, &config.paper));

    let mut bot = GridBot::bootstrap(config, paper.clone(), paper.clone(), Arc::new(NullTelemetry))
        .await
        .unwrap();

    // 1000 * 0.8 / 5 = 160 BUSD -> 327 XRP at 0.49 (whole units)
    let outcome = bot.run_cycle().await.unwrap();
    assert_eq!(outcome.event.map(|e| e.action()), Some(Action::Buy));
    assert_eq!(paper.balance("XRP"), 327.0);

    let outcome = bot.run_cycle().await.unwrap();
    assert_eq!(outcome.event.map(|e| e.action()), Some(Action::Sell));
    assert_eq!(paper.balance("XRP"), 0.0);
    assert!((paper.balance("BUSD") - 1003.27).abs() < 1e-9);
}

#[tokio::test]
async fn test_wallet_audit_failure_after_buy_keeps_position() {
    let temp_dir = TempDir::new().unwrap();
    let config = create_test_config(temp_dir.path());
    let exchange = Arc::new(
        MockExchange::new(1000.0, fine_filters()).with_prices(&[Some(100.0), Some(98.9)]),
    );

    let mut bot = GridBot::bootstrap(config, exchange.clone(), exchange.clone(), Arc::new(NullTelemetry))
        .await
        .unwrap();
    exchange.fail_balance_queries_after_order(1);

    let outcome = bot.run_cycle().await.unwrap();
    assert_eq!(outcome.event.as_ref().map(|e| e.action()), Some(Action::Buy));
    assert!(outcome.wallet_audited);
    assert_eq!(bot.engine().active_trades(), 1);
    assert_eq!(exchange.orders().len(), 1);
}

#[tokio::test]
async fn test_failing_telemetry_does_not_stop_trading() {
    let temp_dir = TempDir::new().unwrap();
    let config = create_test_config(temp_dir.path());
    let sink = Arc::new(BrokenTelemetry::default());
    let exchange = Arc::new(
        MockExchange::new(1000.0, fine_filters())
            .with_prices(&[Some(100.0), Some(98.9), Some(100.0)]),
    );

    let mut bot = GridBot::bootstrap(config, exchange.clone(), exchange.clone(), sink.clone())
        .await
        .unwrap();

    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let _ = tx.send(true);
    });

    tokio::time::timeout(Duration::from_secs(5), bot.run(rx))
        .await
        .expect("loop must observe shutdown")
        .unwrap();

    let sides: Vec<OrderSide> = exchange.orders().iter().map(|(side, _, _)| *side).collect();
    assert_eq!(sides, vec![OrderSide::Buy, OrderSide::Sell]);
    assert!(bot.engine().ledger().is_empty());
    // Starting wallet, two prices, two wallet changes
    assert!(sink.attempts.load(Ordering::SeqCst) >= 5);
}

#[tokio::test]
async fn test_periodic_wallet_audit() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = create_test_config(temp_dir.path());
    config.runner.wallet_audit_every = 2;
    let exchange = Arc::new(
        MockExchange::new(1000.0, fine_filters())
            .with_prices(&[Some(100.0), Some(100.0), Some(100.2), Some(99.8), Some(100.0)]),
    );

    let mut bot = GridBot::bootstrap(config, exchange.clone(), exchange.clone(), Arc::new(NullTelemetry))
        .await
        .unwrap();

    let outcome = bot.run_cycle().await.unwrap();
    assert!(outcome.event.is_none());
    assert!(!outcome.wallet_audited);

    let outcome = bot.run_cycle().await.unwrap();
    assert!(outcome.event.is_none());
    assert!(outcome.wallet_audited);

    let outcome = bot.run_cycle().await.unwrap();
    assert!(!outcome.wallet_audited);

    // A transient failure during a scheduled audit only skips the audit
    exchange.fail_balance_queries(1);
    let outcome = bot.run_cycle().await.unwrap();
    assert!(outcome.event.is_none());
    assert!(outcome.wallet_audited);
    assert!(exchange.orders().is_empty());
}

#[tokio::test]
async fn test_run_stops_on_rejected_order() {
    let temp_dir = TempDir::new().unwrap();
    let config = create_test_config(temp_dir.path());
    let exchange = Arc::new(
        MockExchange::new(1000.0, fine_filters())
            .with_prices(&[Some(100.0), Some(98.0), Some(97.0)]),
    );
    exchange.fail_next_order(Failure::Rejected);

    let mut bot = GridBot::bootstrap(config, exchange.clone(), exchange.clone(), Arc::new(NullTelemetry))
        .await
        .unwrap();

    let (_tx, rx) = watch::channel(false);
    let err = bot.run(rx).await.unwrap_err();
    assert!(matches!(err, TradingError::OrderRejected(_)));
    assert_eq!(bot.cycles(), 1);
    assert!(bot.engine().ledger().is_empty());
}
