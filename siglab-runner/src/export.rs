//! Reporting and export: JSON report, CSV trade tape, console summary.
//!
//! The JSON report carries a `schema_version`; unknown (newer) versions are
//! rejected on load. A run without trades is reported as
//! `{"error": "No trades executed", "initial_balance": .., "final_balance": ..}`
//! next to the run metadata, never as a failure.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use siglab_core::domain::ClosedTrade;
use siglab_core::engine::RunDiagnostics;

use crate::metrics::{MetricsOutcome, PerformanceMetrics};
use crate::runner::BacktestResult;

/// Current schema version for persisted reports.
pub const SCHEMA_VERSION: u32 = 1;

/// Message used in place of metrics when a run closes no trades.
pub const NO_TRADES_MESSAGE: &str = "No trades executed";

/// Persisted form of a [`BacktestResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestReport {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub symbol: String,
    pub interval: String,
    pub model: String,
    pub run_id: String,
    pub config_hash: String,
    pub dataset_hash: String,
    pub confidence_threshold: f64,
    pub first_bar_time: Option<String>,
    pub last_bar_time: Option<String>,
    pub diagnostics: RunDiagnostics,
    #[serde(flatten)]
    pub body: ReportBody,
}

/// Either full metrics with the trade list, or the no-trades marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReportBody {
    Metrics {
        #[serde(flatten)]
        metrics: PerformanceMetrics,
        trades: Vec<ClosedTrade>,
    },
    NoTrades {
        error: String,
        initial_balance: f64,
        final_balance: f64,
    },
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl BacktestReport {
    pub fn from_result(result: &BacktestResult) -> Self {
        let body = match &result.outcome {
            MetricsOutcome::Computed(metrics) => ReportBody::Metrics {
                metrics: metrics.clone(),
                trades: result.trades.clone(),
            },
            MetricsOutcome::NoTrades {
                initial_balance,
                final_balance,
            } => ReportBody::NoTrades {
                error: NO_TRADES_MESSAGE.to_string(),
                initial_balance: *initial_balance,
                final_balance: *final_balance,
            },
        };
        Self {
            schema_version: SCHEMA_VERSION,
            symbol: result.symbol.clone(),
            interval: result.interval.clone(),
            model: result.model_name.clone(),
            run_id: result.run_id.clone(),
            config_hash: result.config_hash.clone(),
            dataset_hash: result.dataset_hash.clone(),
            confidence_threshold: result.engine.confidence_threshold,
            first_bar_time: result.first_bar_time.clone(),
            last_bar_time: result.last_bar_time.clone(),
            diagnostics: result.diagnostics.clone(),
            body,
        }
    }

    pub fn metrics(&self) -> Option<&PerformanceMetrics> {
        match &self.body {
            ReportBody::Metrics { metrics, .. } => Some(metrics),
            ReportBody::NoTrades { .. } => None,
        }
    }
}

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize a report to pretty JSON.
pub fn export_json(report: &BacktestReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize BacktestReport to JSON")
}

/// Deserialize a report from JSON, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<BacktestReport> {
    let report: BacktestReport =
        serde_json::from_str(json).context("failed to deserialize BacktestReport from JSON")?;
    if report.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            report.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(report)
}

/// Write the JSON report for `result` to `path`, creating parent directories.
pub fn write_report(path: &Path, result: &BacktestResult) -> Result<()> {
    let json = export_json(&BacktestReport::from_result(result))?;
    create_parent(path)?;
    std::fs::write(path, json)
        .with_context(|| format!("failed to write report {}", path.display()))
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Export closed trades as CSV.
///
/// Columns: entry_time, exit_time, side, entry_price, exit_price, quantity,
/// confidence, close_reason, pnl, pnl_pct
pub fn export_trades_csv(trades: &[ClosedTrade]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "entry_time",
        "exit_time",
        "side",
        "entry_price",
        "exit_price",
        "quantity",
        "confidence",
        "close_reason",
        "pnl",
        "pnl_pct",
    ])?;

    for t in trades {
        wtr.write_record([
            &t.entry_time.to_string(),
            &t.exit_time.to_string(),
            t.side.as_str(),
            &format!("{:.6}", t.entry_price),
            &format!("{:.6}", t.exit_price),
            &format!("{:.8}", t.quantity),
            &format!("{:.2}", t.confidence),
            t.close_reason.as_str(),
            &format!("{:.4}", t.pnl),
            &format!("{:.4}", t.pnl_pct),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

pub fn write_trades_csv(path: &Path, trades: &[ClosedTrade]) -> Result<()> {
    let csv = export_trades_csv(trades)?;
    create_parent(path)?;
    std::fs::write(path, csv)
        .with_context(|| format!("failed to write trades CSV {}", path.display()))
}

/// One row per run: threshold and headline metrics. Used for sweeps.
pub fn export_sweep_csv(results: &[BacktestResult]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "confidence_threshold",
        "total_trades",
        "roi",
        "win_rate",
        "profit_factor",
        "max_drawdown",
        "sharpe_ratio",
        "final_balance",
    ])?;
    for r in results {
        let threshold = format!("{:.2}", r.engine.confidence_threshold);
        let row = match &r.outcome {
            MetricsOutcome::Computed(m) => [
                threshold,
                m.total_trades.to_string(),
                format!("{:.4}", m.roi),
                format!("{:.2}", m.win_rate),
                format_profit_factor(m.profit_factor),
                format!("{:.4}", m.max_drawdown),
                format!("{:.4}", m.sharpe_ratio),
                format!("{:.2}", m.final_balance),
            ],
            MetricsOutcome::NoTrades { final_balance, .. } => [
                threshold,
                "0".into(),
                "0.0000".into(),
                String::new(),
                String::new(),
                String::new(),
                String::new(),
                format!("{final_balance:.2}"),
            ],
        };
        wtr.write_record(&row)?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Console summary ────────────────────────────────────────────────

/// Human-readable summary block for the terminal.
pub fn render_summary(result: &BacktestResult) -> String {
    let rule = "=".repeat(60);
    let mut out = String::new();
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(
        out,
        "BACKTEST RESULTS  {} {}  (model: {})",
        result.symbol, result.interval, result.model_name
    );
    let _ = writeln!(out, "{rule}");

    match &result.outcome {
        MetricsOutcome::NoTrades {
            initial_balance,
            final_balance,
        } => {
            let _ = writeln!(out, "{NO_TRADES_MESSAGE}");
            let _ = writeln!(out, "Initial balance:   ${initial_balance:.2}");
            let _ = writeln!(out, "Final balance:     ${final_balance:.2}");
        }
        MetricsOutcome::Computed(m) => {
            let _ = writeln!(out, "Initial balance:   ${:.2}", m.initial_balance);
            let _ = writeln!(out, "Final balance:     ${:.2}", m.final_balance);
            let _ = writeln!(out, "Total P&L:         ${:.2}", m.total_pnl);
            let _ = writeln!(out, "ROI:               {:.2}%", m.roi);
            let _ = writeln!(out);
            let _ = writeln!(out, "Total trades:      {}", m.total_trades);
            let _ = writeln!(out, "Winning trades:    {}", m.winning_trades);
            let _ = writeln!(out, "Losing trades:     {}", m.losing_trades);
            let _ = writeln!(out, "Win rate:          {:.2}%", m.win_rate);
            let _ = writeln!(out);
            let _ = writeln!(
                out,
                "Profit factor:     {}",
                format_profit_factor(m.profit_factor)
            );
            let _ = writeln!(out, "Max drawdown:      {:.2}%", m.max_drawdown);
            let _ = writeln!(out, "Sharpe ratio:      {:.2}", m.sharpe_ratio);
            let _ = writeln!(out);
            let _ = writeln!(out, "Average win:       ${:.2}", m.avg_win);
            let _ = writeln!(out, "Average loss:      ${:.2}", m.avg_loss);
        }
    }

    let d = &result.diagnostics;
    if d.missing_feature_substitutions > 0 {
        let names: Vec<&str> = d.missing_features.keys().map(String::as_str).collect();
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "Warning: {} feature values substituted with 0.0 ({})",
            d.missing_feature_substitutions,
            names.join(", ")
        );
    }
    let _ = writeln!(out, "{rule}");
    out
}

fn format_profit_factor(pf: f64) -> String {
    if pf.is_infinite() {
        "inf".to_string()
    } else {
        format!("{pf:.2}")
    }
}

fn create_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }
    Ok(())
}
