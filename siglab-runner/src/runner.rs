//! Backtest runner: wires together config, data, model, engine and metrics.
//!
//! Two entry points:
//! - `run_single_backtest()`: loads bars and model from the paths in the
//!   config, then runs. Used by the CLI.
//! - `run_backtest_from_data()`: takes pre-loaded bars + predictor, no I/O.
//!   Used by batch sweeps that share one dataset.

use std::sync::atomic::AtomicBool;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use siglab_core::domain::ClosedTrade;
use siglab_core::engine::{run_backtest, EngineConfig, EngineError, RunDiagnostics};
use siglab_core::predictor::Predictor;

use crate::config::{BacktestConfig, ConfigError};
use crate::data_loader::{load_bars_csv, LoadError, LoadedBars};
use crate::metrics::MetricsOutcome;
use crate::model_loader::{load_model, ModelLoadError};

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] LoadError),
    #[error("model error: {0}")]
    Model(#[from] ModelLoadError),
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
}

/// Complete result of a single backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub symbol: String,
    pub interval: String,
    pub model_name: String,
    pub engine: EngineConfig,
    pub outcome: MetricsOutcome,
    /// Closed trades in entry order.
    pub trades: Vec<ClosedTrade>,
    pub diagnostics: RunDiagnostics,
    pub bar_count: usize,
    pub first_bar_time: Option<String>,
    pub last_bar_time: Option<String>,
    pub config_hash: String,
    pub dataset_hash: String,
    /// BLAKE3 over config hash, dataset hash and model name.
    pub run_id: String,
}

impl BacktestResult {
    pub fn has_trades(&self) -> bool {
        !self.trades.is_empty()
    }
}

/// Run a single backtest from a config (loads bars and model from disk).
pub fn run_single_backtest(
    config: &BacktestConfig,
    cancel: Option<&AtomicBool>,
) -> Result<BacktestResult, RunError> {
    config.validate()?;
    let bars = load_bars_csv(&config.bars_path())?;
    let predictor = load_model(&config.model_path())?;
    run_backtest_from_data(config, &bars, predictor.as_ref(), cancel)
}

/// Run a backtest with pre-loaded data, no I/O.
pub fn run_backtest_from_data(
    config: &BacktestConfig,
    data: &LoadedBars,
    predictor: &dyn Predictor,
    cancel: Option<&AtomicBool>,
) -> Result<BacktestResult, RunError> {
    let engine_config = config.to_engine_config();
    let symbol = &config.backtest.symbol;
    let interval = &config.backtest.interval;

    info!(
        symbol = %symbol,
        interval = %interval,
        model = predictor.name(),
        bars = data.bars.len(),
        "running backtest"
    );

    let result = run_backtest(&data.bars, predictor, &engine_config, cancel)?;
    let trades = result.closed_trades();
    let outcome = MetricsOutcome::compute(&trades, result.initial_balance, result.final_balance);

    let config_hash = config.config_hash()?;
    let run_id = compute_run_id(&config_hash, &data.dataset_hash, predictor.name());

    match &outcome {
        MetricsOutcome::Computed(m) => info!(
            symbol = %symbol,
            trades = m.total_trades,
            roi = m.roi,
            win_rate = m.win_rate,
            max_drawdown = m.max_drawdown,
            "backtest complete"
        ),
        MetricsOutcome::NoTrades { .. } => info!(symbol = %symbol, "backtest complete: no trades executed"),
    }

    Ok(BacktestResult {
        symbol: symbol.clone(),
        interval: interval.clone(),
        model_name: predictor.name().to_string(),
        engine: engine_config,
        outcome,
        trades,
        diagnostics: result.diagnostics,
        bar_count: data.bars.len(),
        first_bar_time: result.first_bar_time.map(|t| t.to_string()),
        last_bar_time: result.last_bar_time.map(|t| t.to_string()),
        config_hash,
        dataset_hash: data.dataset_hash.clone(),
        run_id,
    })
}

fn compute_run_id(config_hash: &str, dataset_hash: &str, model_name: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(config_hash.as_bytes());
    hasher.update(dataset_hash.as_bytes());
    hasher.update(model_name.as_bytes());
    hasher.finalize().to_hex().to_string()
}
