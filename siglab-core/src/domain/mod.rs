//! Domain types for SigLab

pub mod bar;
pub mod position;
pub mod trade;

pub use bar::Bar;
pub use position::{Position, PositionSide};
pub use trade::{CloseReason, ClosedTrade, OpenTrade, Trade, TradeSide};
