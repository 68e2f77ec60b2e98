//! Trade ledger: append-only record of every trade a run opens.
//!
//! Insertion order is chronological entry order. At most one entry is
//! [`Trade::Open`], and when present it is always the last entry: closing
//! replaces that entry with its [`Trade::Closed`] successor.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{CloseReason, ClosedTrade, OpenTrade, Trade};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    #[error("ledger already holds an open trade (entered at {0})")]
    AlreadyOpen(NaiveDateTime),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ledger {
    trades: Vec<Trade>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a newly opened trade. Fails if an open trade already exists.
    pub fn record_open(&mut self, trade: OpenTrade) -> Result<(), LedgerError> {
        if let Some(open) = self.open_trade() {
            return Err(LedgerError::AlreadyOpen(open.entry_time));
        }
        self.trades.push(Trade::Open(trade));
        Ok(())
    }

    /// Close the open trade, if any, replacing it with the closed value.
    pub fn close_open(
        &mut self,
        exit_price: f64,
        exit_time: NaiveDateTime,
        reason: CloseReason,
    ) -> Option<&ClosedTrade> {
        if !matches!(self.trades.last(), Some(Trade::Open(_))) {
            return None;
        }
        let Some(Trade::Open(open)) = self.trades.pop() else {
            return None;
        };
        self.trades
            .push(Trade::Closed(open.close(exit_price, exit_time, reason)));
        self.trades.last().and_then(Trade::as_closed)
    }

    /// The currently open trade.
    pub fn open_trade(&self) -> Option<&OpenTrade> {
        match self.trades.last() {
            Some(Trade::Open(t)) => Some(t),
            _ => None,
        }
    }

    /// Number of open entries (0 or 1 while the ledger is used through this API).
    pub fn open_count(&self) -> usize {
        self.trades.iter().filter(|t| t.is_open()).count()
    }

    pub fn closed_trades(&self) -> impl Iterator<Item = &ClosedTrade> {
        self.trades.iter().filter_map(Trade::as_closed)
    }

    pub fn closed_count(&self) -> usize {
        self.closed_trades().count()
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }
}

impl From<Vec<Trade>> for Ledger {
    fn from(trades: Vec<Trade>) -> Self {
        Self { trades }
    }
}
