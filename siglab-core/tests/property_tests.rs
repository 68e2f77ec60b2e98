//! Property tests for engine invariants.
//!
//! Uses proptest to verify, over arbitrary price paths and signal scripts:
//! 1. Single position: the ledger never holds more than one open trade,
//!    and every trade is closed when the run finishes
//! 2. Balance consistency: final balance == initial + sum of realized P&L
//! 3. Chronology: trades are recorded in entry order, each exit at or after
//!    its entry
//! 4. Risk exits honour their thresholds

use chrono::{NaiveDate, NaiveDateTime};
use proptest::prelude::*;
use siglab_core::domain::{Bar, CloseReason, PositionSide, TradeSide};
use siglab_core::engine::{run_backtest, EngineConfig, EngineState};
use siglab_core::predictor::{Action, Prediction, Predictor};

struct FeatureDriven {
    names: Vec<String>,
}

impl Predictor for FeatureDriven {
    fn name(&self) -> &str {
        "feature_driven"
    }

    fn feature_names(&self) -> &[String] {
        &self.names
    }

    fn predict(&self, features: &[f64]) -> Prediction {
        Prediction::new(Action::from_class(features[0] as i64), Some(features[1]))
    }
}

fn predictor() -> FeatureDriven {
    FeatureDriven {
        names: vec!["signal".into(), "prob".into()],
    }
}

fn ts(i: usize) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2023, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        + chrono::Duration::minutes(15 * i as i64)
}

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_step() -> impl Strategy<Value = (f64, i64, f64)> {
    (-0.06..0.06_f64, -1i64..=1, 0.3..1.0_f64)
}

fn arb_bars() -> impl Strategy<Value = Vec<Bar>> {
    prop::collection::vec(arb_step(), 1..120).prop_map(|steps| {
        let mut close = 100.0;
        steps
            .into_iter()
            .enumerate()
            .map(|(i, (ret, signal, prob))| {
                close *= 1.0 + ret;
                Bar::new(ts(i), close, close, close, close, 1.0)
                    .with_feature("signal", signal as f64)
                    .with_feature("prob", prob)
            })
            .collect()
    })
}

fn arb_config() -> impl Strategy<Value = EngineConfig> {
    (
        50.0..95.0_f64,
        0.5..10.0_f64,
        0.5..10.0_f64,
        0usize..5,
        any::<bool>(),
    )
        .prop_map(|(threshold, sl, tp, warmup, reentry)| EngineConfig {
            confidence_threshold: threshold,
            stop_loss_pct: sl,
            take_profit_pct: tp,
            warmup_index: warmup,
            allow_same_bar_reentry: reentry,
            ..EngineConfig::new(10_000.0, 0)
        })
}

// ── 1. Single Position ───────────────────────────────────────────────

proptest! {
    #[test]
    fn run_ends_with_every_trade_closed(bars in arb_bars(), config in arb_config()) {
        let result = run_backtest(&bars, &predictor(), &config, None).unwrap();
        prop_assert_eq!(result.ledger.open_count(), 0);
        prop_assert_eq!(result.ledger.closed_count(), result.ledger.len());
    }

    #[test]
    fn state_machine_never_stacks_positions(
        ops in prop::collection::vec((any::<bool>(), any::<bool>(), 10.0..200.0_f64), 1..60),
    ) {
        let mut state = EngineState::new(10_000.0, 0.10);
        for (i, (open, buy, price)) in ops.into_iter().enumerate() {
            if open {
                let side = if buy { TradeSide::Buy } else { TradeSide::Sell };
                let was_flat = state.position().is_flat();
                let opened = state.open(side, price, 90.0, ts(i));
                prop_assert_eq!(opened, was_flat);
            } else {
                state.close(price, ts(i), CloseReason::OppositeSignal);
                prop_assert_eq!(state.position().side, PositionSide::Flat);
            }
            prop_assert!(state.invariants_hold());
            prop_assert!(state.ledger().open_count() <= 1);
        }
    }
}

// ── 2. Balance Consistency ───────────────────────────────────────────

proptest! {
    #[test]
    fn final_balance_is_initial_plus_realized_pnl(bars in arb_bars(), config in arb_config()) {
        let result = run_backtest(&bars, &predictor(), &config, None).unwrap();
        let total: f64 = result.ledger.closed_trades().map(|t| t.pnl).sum();
        prop_assert!((result.final_balance - (result.initial_balance + total)).abs() < 1e-6);
        prop_assert!(result.final_balance > 0.0);
    }
}

// ── 3. Chronology ────────────────────────────────────────────────────

proptest! {
    #[test]
    fn trades_are_chronological(bars in arb_bars(), config in arb_config()) {
        let result = run_backtest(&bars, &predictor(), &config, None).unwrap();
        let trades = result.closed_trades();
        for t in &trades {
            prop_assert!(t.exit_time >= t.entry_time);
        }
        for pair in trades.windows(2) {
            prop_assert!(pair[1].entry_time >= pair[0].exit_time);
        }
        if let Some(first) = trades.first() {
            prop_assert!(first.entry_time >= bars[config.warmup_index.min(bars.len() - 1)].timestamp);
        }
    }
}

// ── 4. Risk Exit Thresholds ──────────────────────────────────────────

proptest! {
    #[test]
    fn risk_exits_respect_thresholds(bars in arb_bars(), config in arb_config()) {
        let result = run_backtest(&bars, &predictor(), &config, None).unwrap();
        for t in result.closed_trades() {
            match t.close_reason {
                CloseReason::StopLoss => prop_assert!(t.pnl_pct <= -config.stop_loss_pct + 1e-9),
                CloseReason::TakeProfit => prop_assert!(t.pnl_pct >= config.take_profit_pct - 1e-9),
                _ => {}
            }
            prop_assert!(t.confidence >= config.confidence_threshold);
        }
    }
}
