// Core trading logic: grid decisions, open positions and wallet auditing

pub mod grid_engine;
pub mod ledger;
pub mod types;
pub mod wallet;

pub use grid_engine::GridEngine;
pub use ledger::PositionLedger;
pub use types::{
    round_to, Action, GridEvent, GridState, Position, Thresholds, WalletSnapshot,
    STOPLOSS_INACTIVE,
};
pub use wallet::WalletTracker;
