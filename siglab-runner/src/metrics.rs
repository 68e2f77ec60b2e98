//! Performance metrics: pure functions over the closed-trade ledger.
//!
//! Every metric is a pure function: trade list and/or equity curve in, scalar
//! out. Percentages are on a 0..=100 scale. Open trades never reach this
//! module; callers pass closed trades only.

use serde::{Deserialize, Serialize};
use siglab_core::domain::ClosedTrade;

/// Result of reducing a run's ledger.
///
/// Zero closed trades is a normal business outcome, not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MetricsOutcome {
    NoTrades {
        initial_balance: f64,
        final_balance: f64,
    },
    Computed(PerformanceMetrics),
}

impl MetricsOutcome {
    /// Reduce `trades` into metrics.
    pub fn compute(trades: &[ClosedTrade], initial_balance: f64, final_balance: f64) -> Self {
        if trades.is_empty() {
            return Self::NoTrades {
                initial_balance,
                final_balance,
            };
        }
        Self::Computed(PerformanceMetrics::compute(
            trades,
            initial_balance,
            final_balance,
        ))
    }

    pub fn metrics(&self) -> Option<&PerformanceMetrics> {
        match self {
            Self::Computed(m) => Some(m),
            Self::NoTrades { .. } => None,
        }
    }

    pub fn final_balance(&self) -> f64 {
        match self {
            Self::Computed(m) => m.final_balance,
            Self::NoTrades { final_balance, .. } => *final_balance,
        }
    }
}

/// Aggregate performance metrics for a single backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub initial_balance: f64,
    pub final_balance: f64,
    pub total_pnl: f64,
    /// Return on initial balance, percent.
    pub roi: f64,
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    /// Winners / total trades, percent.
    pub win_rate: f64,
    /// Gross profit / gross loss; `+inf` when there are no losses.
    #[serde(with = "float_or_infinity")]
    pub profit_factor: f64,
    /// Largest peak-to-trough decline of the trade equity curve, percent.
    pub max_drawdown: f64,
    /// Mean / population std of per-trade `pnl_pct`, unannualized.
    pub sharpe_ratio: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
}

impl PerformanceMetrics {
    /// Compute all metrics from a non-empty closed-trade list.
    pub fn compute(trades: &[ClosedTrade], initial_balance: f64, final_balance: f64) -> Self {
        let curve = equity_curve(trades, initial_balance);
        let returns: Vec<f64> = trades.iter().map(|t| t.pnl_pct).collect();
        Self {
            initial_balance,
            final_balance,
            total_pnl: trades.iter().map(|t| t.pnl).sum(),
            roi: roi(initial_balance, final_balance),
            total_trades: trades.len(),
            winning_trades: trades.iter().filter(|t| t.is_winner()).count(),
            losing_trades: trades.iter().filter(|t| t.is_loser()).count(),
            win_rate: win_rate(trades),
            profit_factor: profit_factor(trades),
            max_drawdown: max_drawdown(&curve),
            sharpe_ratio: sharpe_ratio(&returns),
            avg_win: avg_win(trades),
            avg_loss: avg_loss(trades),
        }
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Balance after each closed trade, starting with `initial_balance`.
///
/// Length is `trades.len() + 1`.
pub fn equity_curve(trades: &[ClosedTrade], initial_balance: f64) -> Vec<f64> {
    let mut curve = Vec::with_capacity(trades.len() + 1);
    let mut balance = initial_balance;
    curve.push(balance);
    for t in trades {
        balance += t.pnl;
        curve.push(balance);
    }
    curve
}

/// Return on investment in percent: (final - initial) / initial * 100.
pub fn roi(initial_balance: f64, final_balance: f64) -> f64 {
    if initial_balance <= 0.0 {
        return 0.0;
    }
    (final_balance - initial_balance) / initial_balance * 100.0
}

/// Win rate in percent. Break-even trades count toward the total only.
pub fn win_rate(trades: &[ClosedTrade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let winners = trades.iter().filter(|t| t.is_winner()).count();
    winners as f64 / trades.len() as f64 * 100.0
}

/// Profit factor: gross profits / gross losses.
///
/// `f64::INFINITY` when there are no losses (including an all-break-even
/// ledger, where gross profit is also zero).
pub fn profit_factor(trades: &[ClosedTrade]) -> f64 {
    let gross_profit: f64 = trades.iter().filter(|t| t.pnl > 0.0).map(|t| t.pnl).sum();
    let gross_loss: f64 = trades
        .iter()
        .filter(|t| t.pnl < 0.0)
        .map(|t| t.pnl.abs())
        .sum();
    if gross_loss == 0.0 {
        return f64::INFINITY;
    }
    gross_profit / gross_loss
}

/// Maximum drawdown in percent (e.g., 15.0 = 15% decline from peak).
///
/// Returns 0.0 for constant or monotonically increasing equity.
pub fn max_drawdown(equity_curve: &[f64]) -> f64 {
    let Some(&first) = equity_curve.first() else {
        return 0.0;
    };
    let mut peak = first;
    let mut max_dd = 0.0_f64;
    for &eq in equity_curve {
        if eq > peak {
            peak = eq;
        }
        if peak > 0.0 {
            max_dd = max_dd.max((peak - eq) / peak * 100.0);
        }
    }
    max_dd
}

/// Trade-level Sharpe ratio: mean / population std of per-trade returns.
///
/// Returns 0.0 when the std is zero, which covers a single trade.
pub fn sharpe_ratio(trade_returns_pct: &[f64]) -> f64 {
    let std = population_std(trade_returns_pct);
    if std == 0.0 || !std.is_finite() {
        return 0.0;
    }
    mean_f64(trade_returns_pct) / std
}

/// Mean P&L of winning trades; 0.0 without winners.
pub fn avg_win(trades: &[ClosedTrade]) -> f64 {
    let wins: Vec<f64> = trades
        .iter()
        .filter(|t| t.is_winner())
        .map(|t| t.pnl)
        .collect();
    mean_f64(&wins)
}

/// Mean P&L of losing trades (negative); 0.0 without losers.
pub fn avg_loss(trades: &[ClosedTrade]) -> f64 {
    let losses: Vec<f64> = trades
        .iter()
        .filter(|t| t.is_loser())
        .map(|t| t.pnl)
        .collect();
    mean_f64(&losses)
}

// ─── Helpers ────────────────────────────────────────────────────────

pub(crate) fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation (divides by `n`).
pub(crate) fn population_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// JSON has no infinity literal; `+inf` travels as the string `"Infinity"`.
pub(crate) mod float_or_infinity {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if *value == f64::INFINITY {
            serializer.serialize_str("Infinity")
        } else {
            serializer.serialize_f64(*value)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Number(v) => Ok(v),
            Repr::Text(s) if s == "Infinity" => Ok(f64::INFINITY),
            Repr::Text(s) => Err(D::Error::custom(format!(
                "expected a number or \"Infinity\", got \"{s}\""
            ))),
        }
    }
}
