// Run and check command implementations
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info, warn};

use binance_grid_bot::{
    BinanceClient, Config, Credentials, ExchangeGateway, ExchangeMode, GridBot, NullTelemetry,
    PaperExchange, PreFlightValidator, PriceFeed, SqliteTelemetry, TelemetrySink, TradingResult,
    ValidationResult,
};

/// Apply `--paper` / `--testnet` on top of the configured mode
pub fn apply_mode_overrides(config: &mut Config, paper: bool, testnet: bool) {
    if paper {
        config.exchange.mode = ExchangeMode::Paper;
    } else if testnet {
        config.exchange.mode = ExchangeMode::Testnet;
    }
}

pub async fn run_bot(mut config: Config, paper: bool, testnet: bool) -> TradingResult<()> {
    apply_mode_overrides(&mut config, paper, testnet);

    match config.exchange.mode {
        ExchangeMode::Paper => info!("🧪 PAPER mode (simulated fills, live prices)"),
        ExchangeMode::Testnet => info!("🧪 TESTNET mode"),
        ExchangeMode::Live => {
            info!("🚀 LIVE TRADING");
            warn!("⚠️  Real money!");
        }
    }

    let validator = PreFlightValidator::new(config.clone());
    let offline = validator.validate_all();
    if !offline.passed {
        offline.display();
        return offline.ensure_passed();
    }

    let sink: Arc<dyn TelemetrySink> = if config.telemetry.enabled {
        Arc::new(SqliteTelemetry::open(config.telemetry_db_path(), &config.exchange.symbol)?)
    } else {
        info!("📴 Telemetry disabled");
        Arc::new(NullTelemetry)
    };

    match config.exchange.mode {
        ExchangeMode::Paper => {
            let client = BinanceClient::from_config(&config.exchange, None)?;
            let exchange = Arc::new(PaperExchange::new(client, &config.exchange, &config.paper));
            trade(config, exchange, sink).await
        }
        ExchangeMode::Live | ExchangeMode::Testnet => {
            let credentials = Credentials::from_config(&config.exchange)?;
            let client = Arc::new(BinanceClient::from_config(&config.exchange, Some(credentials))?);
            let mut validation = validator.validate_for_trading(client.as_ref(), client.as_ref()).await;
            validation.add_check(validator.check_clock_drift(client.as_ref()).await);
            report(&validation)?;
            trade(config, client, sink).await
        }
    }
}

async fn trade<X>(config: Config, exchange: Arc<X>, sink: Arc<dyn TelemetrySink>) -> TradingResult<()>
where
    X: PriceFeed + ExchangeGateway + 'static,
{
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("🛑 Received shutdown signal, finishing current cycle");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => error!("Error setting up signal handler: {}", e),
        }
    });

    let mut bot = GridBot::bootstrap(config, exchange.clone(), exchange, sink).await?;
    info!("🎯 Press Ctrl+C to stop");
    bot.run(shutdown_rx).await?;

    let state = bot.engine().state();
    info!("📊 Final state:");
    info!("   Open trades: {}", state.active_trades);
    info!("   Buy threshold: {}", state.buy_threshold);
    info!("   Sell threshold: {}", state.sell_threshold);
    if let Some(price) = bot.last_price() {
        info!("   Open value: {:.4}", bot.engine().ledger().valuation(price));
    }
    Ok(())
}

fn report(validation: &ValidationResult) -> TradingResult<()> {
    validation.display();
    if !validation.passed {
        error!("");
        error!("❌ Pre-flight validation failed. Cannot proceed.");
    }
    validation.ensure_passed()
}

/// Run every pre-flight check without trading
pub async fn check(mut config: Config, paper: bool, testnet: bool) -> TradingResult<()> {
    apply_mode_overrides(&mut config, paper, testnet);
    let validator = PreFlightValidator::new(config.clone());

    let offline = validator.validate_all();
    if !offline.passed {
        return report(&offline);
    }

    let validation = match config.exchange.mode {
        ExchangeMode::Paper => {
            let client = BinanceClient::from_config(&config.exchange, None)?;
            let exchange = PaperExchange::new(client, &config.exchange, &config.paper);
            validator.validate_for_trading(&exchange, &exchange).await
        }
        ExchangeMode::Live | ExchangeMode::Testnet => {
            let credentials = Credentials::from_config(&config.exchange)?;
            let client = BinanceClient::from_config(&config.exchange, Some(credentials))?;
            let mut validation = validator.validate_for_trading(&client, &client).await;
            validation.add_check(validator.check_clock_drift(&client).await);
            validation
        }
    };

    report(&validation)?;
    info!("✅ Ready to trade {}", config.exchange.symbol);
    Ok(())
}
