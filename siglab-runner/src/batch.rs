//! Parallel batch runs.
//!
//! Every job gets a fresh engine with its own ledger and balance; nothing is
//! shared between runs except read-only bars and predictors. Results come
//! back in input order regardless of scheduling.

use std::sync::atomic::AtomicBool;

use rayon::prelude::*;
use tracing::info;

use siglab_core::predictor::Predictor;

use crate::config::BacktestConfig;
use crate::data_loader::LoadedBars;
use crate::metrics::MetricsOutcome;
use crate::runner::{run_backtest_from_data, run_single_backtest, BacktestResult, RunError};

/// Run independent configs in parallel, each loading its own bars and model.
///
/// A failing job does not stop the others.
pub fn run_batch(
    configs: &[BacktestConfig],
    cancel: Option<&AtomicBool>,
) -> Vec<Result<BacktestResult, RunError>> {
    info!(jobs = configs.len(), "starting batch");
    configs
        .par_iter()
        .map(|config| run_single_backtest(config, cancel))
        .collect()
}

/// Confidence thresholds to evaluate against one dataset and model.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdGrid {
    pub thresholds: Vec<f64>,
}

impl ThresholdGrid {
    /// `start..=end` in `step` increments.
    pub fn range(start: f64, end: f64, step: f64) -> Self {
        let mut thresholds = Vec::new();
        if step > 0.0 {
            let mut i = 0u32;
            loop {
                let t = start + step * f64::from(i);
                if t > end + 1e-9 {
                    break;
                }
                thresholds.push(t);
                i += 1;
            }
        }
        Self { thresholds }
    }

    pub fn len(&self) -> usize {
        self.thresholds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.thresholds.is_empty()
    }

    /// One config per threshold, everything else copied from `base`.
    pub fn generate_configs(&self, base: &BacktestConfig) -> Vec<BacktestConfig> {
        self.thresholds
            .iter()
            .map(|&t| {
                let mut config = base.clone();
                config.backtest.confidence_threshold = t;
                config
            })
            .collect()
    }
}

impl Default for ThresholdGrid {
    /// 50, 55, ..., 95.
    fn default() -> Self {
        Self::range(50.0, 95.0, 5.0)
    }
}

/// Sweep confidence thresholds over pre-loaded bars and a shared predictor.
///
/// Fails on the first job error (all jobs share inputs, so one failure
/// means all would fail the same way).
pub fn sweep_thresholds(
    base: &BacktestConfig,
    grid: &ThresholdGrid,
    data: &LoadedBars,
    predictor: &dyn Predictor,
    cancel: Option<&AtomicBool>,
) -> Result<Vec<BacktestResult>, RunError> {
    let configs = grid.generate_configs(base);
    info!(
        jobs = configs.len(),
        model = predictor.name(),
        "starting threshold sweep"
    );
    configs
        .par_iter()
        .map(|config| run_backtest_from_data(config, data, predictor, cancel))
        .collect()
}

/// Highest-ROI result among those that traded.
pub fn best_by_roi(results: &[BacktestResult]) -> Option<&BacktestResult> {
    results
        .iter()
        .filter_map(|r| match &r.outcome {
            MetricsOutcome::Computed(m) => Some((r, m.roi)),
            MetricsOutcome::NoTrades { .. } => None,
        })
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(r, _)| r)
}
