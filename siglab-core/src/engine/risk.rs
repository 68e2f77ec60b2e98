//! Stop-loss / take-profit evaluation against the bar close.
//!
//! Thresholds are percentages of entry price (3.0 = 3%). The stop-loss
//! check runs first, so a bar can only ever produce one exit reason.

use crate::domain::{CloseReason, Position};

/// Decide whether the live position must be closed at `close`.
///
/// Returns `None` when flat or when neither threshold is crossed.
pub fn evaluate_exit(
    position: &Position,
    close: f64,
    stop_loss_pct: f64,
    take_profit_pct: f64,
) -> Option<CloseReason> {
    if position.is_flat() {
        return None;
    }
    let pnl_pct = position.pnl_pct_at(close);
    if pnl_pct <= -stop_loss_pct {
        Some(CloseReason::StopLoss)
    } else if pnl_pct >= take_profit_pct {
        Some(CloseReason::TakeProfit)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_never_exits() {
        assert_eq!(evaluate_exit(&Position::flat(), 1.0, 3.0, 5.0), None);
    }

    #[test]
    fn long_stop_loss_triggers_past_threshold() {
        let pos = Position::long(100.0, 1.0);
        assert_eq!(evaluate_exit(&pos, 96.9, 3.0, 5.0), Some(CloseReason::StopLoss));
    }

    #[test]
    fn long_inside_band_holds() {
        let pos = Position::long(100.0, 1.0);
        assert_eq!(evaluate_exit(&pos, 97.5, 3.0, 5.0), None);
        assert_eq!(evaluate_exit(&pos, 104.9, 3.0, 5.0), None);
    }

    #[test]
    fn long_stop_loss_is_inclusive() {
        let pos = Position::long(100.0, 1.0);
        assert_eq!(evaluate_exit(&pos, 50.0, 50.0, 80.0), Some(CloseReason::StopLoss));
    }

    #[test]
    fn long_take_profit() {
        let pos = Position::long(100.0, 1.0);
        assert_eq!(evaluate_exit(&pos, 105.0, 3.0, 5.0), Some(CloseReason::TakeProfit));
        assert_eq!(evaluate_exit(&pos, 130.0, 3.0, 5.0), Some(CloseReason::TakeProfit));
    }

    #[test]
    fn short_mirrors_long() {
        let pos = Position::short(100.0, 1.0);
        assert_eq!(evaluate_exit(&pos, 103.5, 3.0, 5.0), Some(CloseReason::StopLoss));
        assert_eq!(evaluate_exit(&pos, 94.0, 3.0, 5.0), Some(CloseReason::TakeProfit));
        assert_eq!(evaluate_exit(&pos, 101.0, 3.0, 5.0), None);
    }

    #[test]
    fn stop_loss_wins_when_both_thresholds_satisfied() {
        // Negative take-profit makes both conditions true; stop-loss is checked first.
        let pos = Position::long(100.0, 1.0);
        assert_eq!(evaluate_exit(&pos, 90.0, 3.0, -50.0), Some(CloseReason::StopLoss));
    }
}
