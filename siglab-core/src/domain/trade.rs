//! Trade records: the open/closed lifecycle of a single position.
//!
//! A trade is born [`Trade::Open`] when a position opens and becomes
//! [`Trade::Closed`] when it closes. Closing consumes the open value and
//! produces a new closed value; nothing is mutated in place.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::position::{Position, PositionSide};

/// Direction of the entry order that opened a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
        }
    }
}

/// Why a trade was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    StopLoss,
    TakeProfit,
    OppositeSignal,
    EndOfData,
}

impl CloseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StopLoss => "stop_loss",
            Self::TakeProfit => "take_profit",
            Self::OppositeSignal => "opposite_signal",
            Self::EndOfData => "end_of_data",
        }
    }
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A trade whose position is still live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenTrade {
    pub entry_time: NaiveDateTime,
    pub entry_price: f64,
    pub side: TradeSide,
    pub quantity: f64,
    /// Predictor confidence (0..=100) at entry.
    pub confidence: f64,
}

impl OpenTrade {
    /// The position this trade represents.
    pub fn position(&self) -> Position {
        Position {
            side: PositionSide::from_trade_side(self.side),
            entry_price: self.entry_price,
            quantity: self.quantity,
        }
    }

    /// Close the trade at `exit_price`, realizing P&L.
    pub fn close(
        self,
        exit_price: f64,
        exit_time: NaiveDateTime,
        reason: CloseReason,
    ) -> ClosedTrade {
        let position = self.position();
        ClosedTrade {
            pnl: position.pnl_at(exit_price),
            pnl_pct: position.pnl_pct_at(exit_price),
            entry_time: self.entry_time,
            entry_price: self.entry_price,
            side: self.side,
            quantity: self.quantity,
            confidence: self.confidence,
            exit_time,
            exit_price,
            close_reason: reason,
        }
    }
}

/// A completed round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedTrade {
    pub entry_time: NaiveDateTime,
    pub entry_price: f64,
    pub side: TradeSide,
    pub quantity: f64,
    pub confidence: f64,
    pub exit_time: NaiveDateTime,
    pub exit_price: f64,
    pub close_reason: CloseReason,
    pub pnl: f64,
    /// Return in percent of entry price.
    pub pnl_pct: f64,
}

impl ClosedTrade {
    pub fn is_winner(&self) -> bool {
        self.pnl > 0.0
    }

    pub fn is_loser(&self) -> bool {
        self.pnl < 0.0
    }
}

/// Ledger entry, tagged by status when serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Trade {
    Open(OpenTrade),
    Closed(ClosedTrade),
}

impl Trade {
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open(_))
    }

    pub fn as_closed(&self) -> Option<&ClosedTrade> {
        match self {
            Self::Closed(t) => Some(t),
            Self::Open(_) => None,
        }
    }

    pub fn entry_time(&self) -> NaiveDateTime {
        match self {
            Self::Open(t) => t.entry_time,
            Self::Closed(t) => t.entry_time,
        }
    }
}
