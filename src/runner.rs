// Bootstrapping and the trading cycle loop

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::config::{Config, GridConfig};
use crate::core::{round_to, GridEngine, GridEvent, Position, WalletTracker};
use crate::core::types::THRESHOLD_PRECISION;
use crate::db::PriceRecord;
use crate::error::{ErrorClass, TradingError, TradingResult};
use crate::exchange::{ExchangeGateway, PriceFeed};
use crate::telemetry::TelemetrySink;

/// What a single cycle observed and did
#[derive(Debug, Clone, PartialEq)]
pub struct CycleOutcome {
    pub price: f64,
    pub event: Option<GridEvent>,
    pub wallet_audited: bool,
}

pub struct GridBot<F: ?Sized, G: ?Sized, T: ?Sized> {
    config: Config,
    engine: GridEngine,
    wallet: WalletTracker,
    feed: Arc<F>,
    gateway: Arc<G>,
    sink: Arc<T>,
    cycle: u64,
    last_price: Option<f64>,
}

impl<F, G, T> GridBot<F, G, T>
where
    F: PriceFeed + ?Sized,
    G: ExchangeGateway + ?Sized,
    T: TelemetrySink + ?Sized,
{
    /// Prepare the engine: load filters, audit the wallet, center the grid
    pub async fn bootstrap(
        config: Config,
        feed: Arc<F>,
        gateway: Arc<G>,
        sink: Arc<T>,
    ) -> TradingResult<Self> {
        let symbol = config.exchange.symbol.clone();

        let filters = gateway
            .get_symbol_filters(&symbol)
            .await
            .map_err(|e| TradingError::SymbolFilters(format!("{}: {}", symbol, e)))?;
        info!(
            %symbol,
            min_quantity = filters.min_quantity,
            step_size = filters.quantity_step_size,
            "symbol filters loaded"
        );

        let grid_config = GridConfig::new(&config.grid, &config.exchange.quote_asset, filters)?;

        let mut wallet = WalletTracker::new(&config.exchange.quote_asset, &config.exchange.base_asset);
        if let Some(snapshot) = wallet.sample(gateway.as_ref(), None).await? {
            info!(
                stake = snapshot.stake_balance,
                trade = snapshot.trade_balance,
                "💰 starting wallet"
            );
            if let Err(e) = sink.record_wallet(&snapshot) {
                warn!(error = %e, "telemetry write failed");
            }
        }

        let mean_price = mean_price(
            feed.as_ref(),
            config.runner.mean_price_samples,
            Duration::from_millis(config.runner.mean_price_interval_ms),
        )
        .await?;

        let engine = GridEngine::new(grid_config, mean_price);
        let thresholds = engine.thresholds();
        info!(
            %symbol,
            mean_price,
            buy_threshold = thresholds.buy,
            sell_threshold = thresholds.sell,
            stoploss_multiplier = ?engine.config().stoploss_multiplier,
            "🎯 grid initialized"
        );

        Ok(Self {
            config,
            engine,
            wallet,
            feed,
            gateway,
            sink,
            cycle: 0,
            last_price: Some(mean_price),
        })
    }

    pub fn engine(&self) -> &GridEngine {
        &self.engine
    }

    pub fn cycles(&self) -> u64 {
        self.cycle
    }

    pub fn last_price(&self) -> Option<f64> {
        self.last_price
    }

    /// Observe one price and act on it
    pub async fn run_cycle(&mut self) -> TradingResult<CycleOutcome> {
        self.cycle += 1;
        let symbol = &self.config.exchange.symbol;

        let price = match self.feed.get_price().await {
            Ok(price) => price,
            Err(e) => {
                self.record_price(PriceRecord::new(symbol.as_str(), None));
                return Err(e);
            }
        };
        self.record_price(PriceRecord::new(symbol.as_str(), Some(price)));
        self.last_price = Some(price);
        debug!(cycle = self.cycle, price, "price observed");

        let event = self.engine.step(price, self.gateway.as_ref()).await?;
        if let Some(event) = &event {
            log_event(event);
        }

        let traded = event.as_ref().map(GridEvent::traded).unwrap_or(false);
        let audit_every = self.config.runner.wallet_audit_every.max(1);
        let wallet_audited = traded || self.cycle % audit_every == 0;
        if wallet_audited {
            self.audit_wallet().await?;
        }

        Ok(CycleOutcome { price, event, wallet_audited })
    }

    /// Run cycles until `shutdown` flips to true
    ///
    /// The signal is only honored between cycles; a dropped sender also
    /// stops the loop. Transient errors skip the cycle, anything else ends
    /// the run with that error.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> TradingResult<()> {
        let delay = Duration::from_millis(self.config.runner.cycle_delay_ms);
        info!(symbol = %self.config.exchange.symbol, delay_ms = self.config.runner.cycle_delay_ms, "🚀 trading loop started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            if let Err(e) = self.run_cycle().await {
                match e.class() {
                    ErrorClass::Transient => {
                        warn!(cycle = self.cycle, category = e.category(), error = %e, "cycle skipped");
                    }
                    ErrorClass::Fatal => {
                        error!(cycle = self.cycle, category = e.category(), error = %e, "fatal error, stopping");
                        return Err(e);
                    }
                    ErrorClass::ContractViolation => {
                        error!(cycle = self.cycle, error = %e, state = ?self.engine.state(), "contract violated, stopping");
                        return Err(e);
                    }
                }
            }

            tokio::select! {
                _ = sleep(delay) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!(cycles = self.cycle, open_trades = self.engine.active_trades(), "🛑 trading loop stopped");
        Ok(())
    }

    async fn audit_wallet(&mut self) -> TradingResult<()> {
        match self.wallet.sample(self.gateway.as_ref(), self.last_price).await {
            Ok(Some(snapshot)) => {
                info!(
                    stake = snapshot.stake_balance,
                    trade = snapshot.trade_balance,
                    price = ?snapshot.last_price,
                    "💰 wallet changed"
                );
                if let Err(e) = self.sink.record_wallet(&snapshot) {
                    warn!(error = %e, "telemetry write failed");
                }
                Ok(())
            }
            Ok(None) => Ok(()),
            // The action already went through; a missed audit is picked up next time
            Err(e) if e.is_retryable() => {
                warn!(error = %e, "wallet audit failed");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn record_price(&self, record: PriceRecord) {
        if let Err(e) = self.sink.record_price(&record) {
            warn!(error = %e, "telemetry write failed");
        }
    }
}

/// Average of `samples` price fetches, rounded like the thresholds
///
/// Failed fetches are skipped; at least one must succeed.
pub async fn mean_price<F>(feed: &F, samples: usize, interval: Duration) -> TradingResult<f64>
where
    F: PriceFeed + ?Sized,
{
    let mut total = 0.0;
    let mut observed = 0usize;
    let mut last_error = None;

    for i in 0..samples {
        if i > 0 && !interval.is_zero() {
            sleep(interval).await;
        }
        match feed.get_price().await {
            Ok(price) => {
                total += price;
                observed += 1;
            }
            Err(e) => {
                warn!(sample = i + 1, error = %e, "mean price sample failed");
                last_error = Some(e);
            }
        }
    }

    if observed == 0 {
        return Err(last_error.unwrap_or_else(|| {
            TradingError::PriceUnavailable("no mean price samples requested".to_string())
        }));
    }
    Ok(round_to(total / observed as f64, THRESHOLD_PRECISION))
}

fn format_ledger(ledger: &[Position]) -> String {
    let entries: Vec<String> = ledger
        .iter()
        .map(|p| format!("{}@{}", p.amount, p.entry_price))
        .collect();
    format!("[{}]", entries.join(", "))
}

/// Render an engine event for the operator
pub fn log_event(event: &GridEvent) {
    match event {
        GridEvent::PositionOpened { price, position, order, before, after, stoploss_price, ledger } => {
            info!(
                price,
                amount = position.amount,
                order_id = order.order_id,
                buy = %format!("{} -> {}", before.buy, after.buy),
                sell = %format!("{} -> {}", before.sell, after.sell),
                stoploss = stoploss_price,
                open = ledger.len(),
                ledger = %format_ledger(ledger),
                "🟢 BUY"
            );
        }
        GridEvent::PositionClosed { price, position, order, before, after, stoploss_price, ledger } => {
            info!(
                price,
                amount = position.amount,
                entry = position.entry_price,
                order_id = order.order_id,
                buy = %format!("{} -> {}", before.buy, after.buy),
                sell = %format!("{} -> {}", before.sell, after.sell),
                stoploss = stoploss_price,
                open = ledger.len(),
                ledger = %format_ledger(ledger),
                "🔴 SELL"
            );
        }
        GridEvent::StopLossTriggered {
            price,
            position,
            order,
            trigger_price,
            stoploss_price,
            thresholds,
            ledger,
        } => {
            warn!(
                price,
                trigger = trigger_price,
                amount = position.amount,
                entry = position.entry_price,
                order_id = order.order_id,
                buy = thresholds.buy,
                sell = thresholds.sell,
                stoploss = stoploss_price,
                open = ledger.len(),
                ledger = %format_ledger(ledger),
                "🛑 STOP-LOSS"
            );
        }
        GridEvent::GridReset { price, before, after } => {
            info!(
                price,
                buy = %format!("{} -> {}", before.buy, after.buy),
                sell = %format!("{} -> {}", before.sell, after.sell),
                "🔄 grid reset"
            );
        }
    }
}
