//! Engine configuration, mutable position state, and run result types.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::domain::{CloseReason, ClosedTrade, OpenTrade, Position, TradeSide};
use crate::ledger::Ledger;

pub const DEFAULT_INITIAL_BALANCE: f64 = 10_000.0;
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 80.0;
pub const DEFAULT_STOP_LOSS_PCT: f64 = 3.0;
pub const DEFAULT_TAKE_PROFIT_PCT: f64 = 5.0;
pub const DEFAULT_WARMUP_INDEX: usize = 1000;
/// Fraction of the current balance committed to each new position.
pub const DEFAULT_POSITION_SIZE_PCT: f64 = 0.10;

/// Reasons an [`EngineConfig`] is rejected before replay starts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigIssue {
    #[error("initial_balance must be a positive finite number, got {0}")]
    InitialBalance(f64),
    #[error("confidence_threshold must be within 0..=100, got {0}")]
    ConfidenceThreshold(f64),
    #[error("stop_loss_pct must be a positive finite percentage, got {0}")]
    StopLoss(f64),
    #[error("take_profit_pct must be a positive finite percentage, got {0}")]
    TakeProfit(f64),
    #[error("position_size_pct must be within (0, 1], got {0}")]
    PositionSize(f64),
}

/// Immutable parameters of a single backtest run.
///
/// `stop_loss_pct` and `take_profit_pct` are percentages (3.0 = 3%), while
/// `position_size_pct` is a fraction of balance (0.10 = 10%).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub initial_balance: f64,
    /// Minimum predictor confidence (0..=100) required to open a position.
    pub confidence_threshold: f64,
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
    /// First bar index evaluated; earlier bars are indicator warm-up.
    pub warmup_index: usize,
    pub position_size_pct: f64,
    /// Allow the entry rule to reopen on the same bar a stop-loss or
    /// take-profit just closed the position.
    pub allow_same_bar_reentry: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            initial_balance: DEFAULT_INITIAL_BALANCE,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            stop_loss_pct: DEFAULT_STOP_LOSS_PCT,
            take_profit_pct: DEFAULT_TAKE_PROFIT_PCT,
            warmup_index: DEFAULT_WARMUP_INDEX,
            position_size_pct: DEFAULT_POSITION_SIZE_PCT,
            allow_same_bar_reentry: true,
        }
    }
}

impl EngineConfig {
    pub fn new(initial_balance: f64, warmup_index: usize) -> Self {
        Self {
            initial_balance,
            warmup_index,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigIssue> {
        if !(self.initial_balance.is_finite() && self.initial_balance > 0.0) {
            return Err(ConfigIssue::InitialBalance(self.initial_balance));
        }
        if !(0.0..=100.0).contains(&self.confidence_threshold) {
            return Err(ConfigIssue::ConfidenceThreshold(self.confidence_threshold));
        }
        if !(self.stop_loss_pct.is_finite() && self.stop_loss_pct > 0.0) {
            return Err(ConfigIssue::StopLoss(self.stop_loss_pct));
        }
        if !(self.take_profit_pct.is_finite() && self.take_profit_pct > 0.0) {
            return Err(ConfigIssue::TakeProfit(self.take_profit_pct));
        }
        if !(self.position_size_pct > 0.0 && self.position_size_pct <= 1.0) {
            return Err(ConfigIssue::PositionSize(self.position_size_pct));
        }
        Ok(())
    }
}

/// Mutable state of the position state machine: exposure, balance, ledger.
///
/// Transitions: `Flat --open--> Long|Short --close--> Flat`. Opening while
/// not flat and closing while flat are no-ops.
#[derive(Debug, Clone)]
pub struct EngineState {
    position: Position,
    balance: f64,
    position_size_pct: f64,
    ledger: Ledger,
}

impl EngineState {
    pub fn new(initial_balance: f64, position_size_pct: f64) -> Self {
        Self {
            position: Position::flat(),
            balance: initial_balance,
            position_size_pct,
            ledger: Ledger::new(),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.initial_balance, config.position_size_pct)
    }

    /// Open a position sized from the current balance.
    ///
    /// Returns `false` (and changes nothing) if a position is already open.
    pub fn open(
        &mut self,
        side: TradeSide,
        price: f64,
        confidence: f64,
        timestamp: NaiveDateTime,
    ) -> bool {
        if !self.position.is_flat() || price <= 0.0 {
            return false;
        }
        let quantity = self.balance * self.position_size_pct / price;
        let trade = OpenTrade {
            entry_time: timestamp,
            entry_price: price,
            side,
            quantity,
            confidence,
        };
        self.position = trade.position();
        if self.ledger.record_open(trade).is_err() {
            // Flat position with an open ledger entry cannot be reached through
            // this API; refuse rather than stack a second open trade.
            self.position = Position::flat();
            return false;
        }
        true
    }

    /// Close the open position at `price`, crediting the realized P&L.
    ///
    /// Returns the closed trade, or `None` if flat.
    pub fn close(
        &mut self,
        price: f64,
        timestamp: NaiveDateTime,
        reason: CloseReason,
    ) -> Option<ClosedTrade> {
        if self.position.is_flat() {
            return None;
        }
        let closed = self.ledger.close_open(price, timestamp, reason)?.clone();
        self.balance += closed.pnl;
        self.position = Position::flat();
        Some(closed)
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn balance(&self) -> f64 {
        self.balance
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn into_ledger(self) -> Ledger {
        self.ledger
    }

    /// Check the single-position invariant:
    /// at most one open entry, and `Flat ⇔ no open entry ⇔ entry_price == 0`.
    pub fn invariants_hold(&self) -> bool {
        let open = self.ledger.open_count();
        let flat = self.position.is_flat();
        open <= 1 && flat == (open == 0) && flat == (self.position.entry_price == 0.0)
    }
}

/// Counters describing what happened during a replay.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunDiagnostics {
    /// Bars evaluated (from `warmup_index` to the end).
    pub bars_processed: usize,
    pub buy_signals: usize,
    pub sell_signals: usize,
    pub hold_signals: usize,
    /// Buy/Sell signals below the confidence threshold.
    pub low_confidence_signals: usize,
    pub stop_loss_exits: usize,
    pub take_profit_exits: usize,
    pub opposite_signal_exits: usize,
    /// Entries made on the same bar a risk exit fired.
    pub same_bar_reentries: usize,
    /// Entries refused because same-bar re-entry is disabled.
    pub suppressed_reentries: usize,
    /// Total feature values substituted with 0.0.
    pub missing_feature_substitutions: usize,
    /// Substitution count per missing feature name.
    pub missing_features: BTreeMap<String, usize>,
}

/// Result of a complete replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    /// Every trade opened during the run, in entry order. All closed.
    pub ledger: Ledger,
    pub initial_balance: f64,
    pub final_balance: f64,
    pub first_bar_time: Option<NaiveDateTime>,
    pub last_bar_time: Option<NaiveDateTime>,
    pub diagnostics: RunDiagnostics,
}

impl RunResult {
    pub fn closed_trades(&self) -> Vec<ClosedTrade> {
        self.ledger.closed_trades().cloned().collect()
    }
}
