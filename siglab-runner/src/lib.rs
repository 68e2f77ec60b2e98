//! SigLab Runner: backtest orchestration, metrics, reports.
//!
//! This crate builds on `siglab-core` to provide:
//! - TOML configuration with defaults and validation
//! - Bar loading from processed CSV exports
//! - Model artifact loading (linear model, threshold rule)
//! - Metrics reduction of the closed-trade ledger
//! - Single and parallel batch runs
//! - JSON report and CSV trade tape export

pub mod batch;
pub mod config;
pub mod data_loader;
pub mod export;
pub mod metrics;
pub mod model_loader;
pub mod runner;

pub use batch::{best_by_roi, run_batch, sweep_thresholds, ThresholdGrid};
pub use config::{BacktestConfig, ConfigError};
pub use data_loader::{load_bars_csv, read_bars, LoadError, LoadedBars};
pub use export::{BacktestReport, SCHEMA_VERSION};
pub use metrics::{MetricsOutcome, PerformanceMetrics};
pub use model_loader::{load_model, ModelArtifact, ModelLoadError};
pub use runner::{run_backtest_from_data, run_single_backtest, BacktestResult, RunError};
