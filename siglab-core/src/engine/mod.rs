//! Backtesting engine: position state machine, risk exits, replay loop.
//!
//! The engine consumes chronologically ordered bars carrying precomputed
//! features and runs four steps per bar:
//!
//! 1. Risk exit (stop-loss / take-profit on the close)
//! 2. Predictor query
//! 3. Entry on a confident Buy/Sell while flat
//! 4. Opposite-signal exit

pub mod loop_runner;
pub mod risk;
pub mod state;

pub use loop_runner::{run_backtest, EngineError};
pub use risk::evaluate_exit;
pub use state::{
    ConfigIssue, EngineConfig, EngineState, RunDiagnostics, RunResult, DEFAULT_CONFIDENCE_THRESHOLD,
    DEFAULT_INITIAL_BALANCE, DEFAULT_POSITION_SIZE_PCT, DEFAULT_STOP_LOSS_PCT,
    DEFAULT_TAKE_PROFIT_PCT, DEFAULT_WARMUP_INDEX,
};
