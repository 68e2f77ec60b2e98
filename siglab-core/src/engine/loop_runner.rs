//! Bar-by-bar replay loop: the heart of the backtesting engine.
//!
//! Four steps per bar, always in this order:
//! 1. Risk exit: stop-loss / take-profit against the bar close
//! 2. Prediction: build the feature vector and query the predictor
//! 3. Entry: open on a confident Buy/Sell when flat
//! 4. Opposite-signal exit: a Sell below the threshold closes a long, a
//!    Buy below the threshold closes a short
//!
//! After the last bar any open position is closed at that bar's close.
//! Zero trades is a normal outcome, not an error.

use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::domain::{Bar, CloseReason, ClosedTrade, PositionSide};
use crate::predictor::{Action, FeatureVector, Predictor};

use super::risk::evaluate_exit;
use super::state::{ConfigIssue, EngineConfig, EngineState, RunDiagnostics, RunResult};

/// Errors from the replay loop.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("invalid engine config: {0}")]
    InvalidConfig(#[from] ConfigIssue),
    #[error("backtest cancelled before bar {bar_index}")]
    Cancelled { bar_index: usize },
}

/// Run a backtest over `bars` with `predictor`.
///
/// Bars must be in chronological order; bars before `config.warmup_index`
/// are skipped. `cancel` is polled between bars.
pub fn run_backtest(
    bars: &[Bar],
    predictor: &dyn Predictor,
    config: &EngineConfig,
    cancel: Option<&AtomicBool>,
) -> Result<RunResult, EngineError> {
    config.validate()?;

    let feature_names = predictor.feature_names();
    let mut state = EngineState::from_config(config);
    let mut diag = RunDiagnostics::default();

    let first_bar_time = bars.get(config.warmup_index).map(|b| b.timestamp);
    let last_bar_time = first_bar_time.and(bars.last().map(|b| b.timestamp));

    if first_bar_time.is_none() {
        warn!(
            bars = bars.len(),
            warmup_index = config.warmup_index,
            "warmup index is past the end of the data; no bars will be evaluated"
        );
    }

    info!(
        predictor = predictor.name(),
        bars = bars.len(),
        warmup_index = config.warmup_index,
        confidence_threshold = config.confidence_threshold,
        stop_loss_pct = config.stop_loss_pct,
        take_profit_pct = config.take_profit_pct,
        "starting replay"
    );

    for (t, bar) in bars.iter().enumerate().skip(config.warmup_index) {
        if cancel.is_some_and(|f| f.load(Ordering::Relaxed)) {
            info!(bar_index = t, "replay cancelled");
            return Err(EngineError::Cancelled { bar_index: t });
        }
        diag.bars_processed += 1;

        // ─── 1. Risk exit ───
        let risk_exit = evaluate_exit(
            state.position(),
            bar.close,
            config.stop_loss_pct,
            config.take_profit_pct,
        );
        if let Some(reason) = risk_exit {
            if let Some(closed) = state.close(bar.close, bar.timestamp, reason) {
                match reason {
                    CloseReason::StopLoss => diag.stop_loss_exits += 1,
                    CloseReason::TakeProfit => diag.take_profit_exits += 1,
                    CloseReason::OppositeSignal | CloseReason::EndOfData => {}
                }
                log_close(t, &closed);
            }
        }

        // ─── 2. Prediction ───
        let features = FeatureVector::build(bar, feature_names);
        if !features.is_complete() {
            record_missing(&mut diag, &features.missing, t);
        }
        let prediction = predictor.predict(&features.values);
        let confidence = prediction.confidence();
        match prediction.action {
            Action::Buy => diag.buy_signals += 1,
            Action::Sell => diag.sell_signals += 1,
            Action::Hold => diag.hold_signals += 1,
        }

        // ─── 3. Entry ───
        let signal_side = prediction.action.trade_side();
        let confident = signal_side.is_some() && confidence >= config.confidence_threshold;
        if let Some(side) = signal_side {
            if !confident {
                diag.low_confidence_signals += 1;
            } else if state.position().is_flat() {
                if risk_exit.is_some() && !config.allow_same_bar_reentry {
                    diag.suppressed_reentries += 1;
                } else if state.open(side, bar.close, confidence, bar.timestamp) {
                    if risk_exit.is_some() {
                        diag.same_bar_reentries += 1;
                    }
                    debug!(
                        bar_index = t,
                        time = %bar.timestamp,
                        ?side,
                        price = bar.close,
                        confidence,
                        quantity = state.position().quantity,
                        "opened position"
                    );
                }
            }
        }

        // ─── 4. Opposite-signal exit ───
        // Only a signal that failed the entry gate can close; a confident
        // reversal leaves the position to the risk exits.
        if !confident {
            let reversal = matches!(
                (state.position().side, prediction.action),
                (PositionSide::Long, Action::Sell) | (PositionSide::Short, Action::Buy)
            );
            if reversal {
                if let Some(closed) =
                    state.close(bar.close, bar.timestamp, CloseReason::OppositeSignal)
                {
                    diag.opposite_signal_exits += 1;
                    log_close(t, &closed);
                }
            }
        }

        debug_assert!(state.invariants_hold(), "single-position invariant violated at bar {t}");
    }

    // Force-close whatever is still open at the final bar.
    if let Some(last) = bars.last() {
        if let Some(closed) = state.close(last.close, last.timestamp, CloseReason::EndOfData) {
            log_close(bars.len() - 1, &closed);
        }
    }

    let final_balance = state.balance();
    let ledger = state.into_ledger();

    info!(
        bars_processed = diag.bars_processed,
        trades = ledger.closed_count(),
        final_balance,
        missing_feature_substitutions = diag.missing_feature_substitutions,
        "replay finished"
    );

    Ok(RunResult {
        ledger,
        initial_balance: config.initial_balance,
        final_balance,
        first_bar_time,
        last_bar_time,
        diagnostics: diag,
    })
}

/// Count substituted features; warn the first time each name goes missing.
fn record_missing(diag: &mut RunDiagnostics, missing: &[&str], bar_index: usize) {
    for &name in missing {
        diag.missing_feature_substitutions += 1;
        let count = diag.missing_features.entry(name.to_string()).or_default();
        if *count == 0 {
            warn!(
                feature = name,
                bar_index,
                "feature missing from bar; substituting 0.0"
            );
        }
        *count += 1;
    }
}

fn log_close(bar_index: usize, trade: &ClosedTrade) {
    debug!(
        bar_index,
        time = %trade.exit_time,
        reason = %trade.close_reason,
        exit_price = trade.exit_price,
        pnl = trade.pnl,
        pnl_pct = trade.pnl_pct,
        "closed position"
    );
}
