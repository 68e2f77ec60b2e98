//! Position: the single live exposure of a backtest run.

use serde::{Deserialize, Serialize};

use super::trade::TradeSide;

/// Exposure state of the position state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionSide {
    Flat,
    Long,
    Short,
}

impl PositionSide {
    /// Side a trade opened with `side` holds.
    pub fn from_trade_side(side: TradeSide) -> Self {
        match side {
            TradeSide::Buy => Self::Long,
            TradeSide::Sell => Self::Short,
        }
    }
}

/// Current exposure: side, entry price and quantity.
///
/// A flat position always has `entry_price == 0.0` and `quantity == 0.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub side: PositionSide,
    pub entry_price: f64,
    pub quantity: f64,
}

impl Position {
    pub fn flat() -> Self {
        Self {
            side: PositionSide::Flat,
            entry_price: 0.0,
            quantity: 0.0,
        }
    }

    pub fn long(entry_price: f64, quantity: f64) -> Self {
        Self {
            side: PositionSide::Long,
            entry_price,
            quantity,
        }
    }

    pub fn short(entry_price: f64, quantity: f64) -> Self {
        Self {
            side: PositionSide::Short,
            entry_price,
            quantity,
        }
    }

    pub fn is_flat(&self) -> bool {
        self.side == PositionSide::Flat
    }

    /// Realized P&L if closed at `exit_price`. Zero when flat.
    pub fn pnl_at(&self, exit_price: f64) -> f64 {
        match self.side {
            PositionSide::Long => (exit_price - self.entry_price) * self.quantity,
            PositionSide::Short => (self.entry_price - exit_price) * self.quantity,
            PositionSide::Flat => 0.0,
        }
    }

    /// Return in percent (3.0 = 3%) if closed at `exit_price`. Zero when flat.
    pub fn pnl_pct_at(&self, exit_price: f64) -> f64 {
        match self.side {
            PositionSide::Long => (exit_price - self.entry_price) / self.entry_price * 100.0,
            PositionSide::Short => (self.entry_price - exit_price) / self.entry_price * 100.0,
            PositionSide::Flat => 0.0,
        }
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::flat()
    }
}
