//! Integration tests for the replay loop.
//!
//! Tests:
//! 1. Position lifecycle: long/short P&L, balance compounding
//! 2. Exit rules: stop-loss, take-profit, opposite signal, end of data
//! 3. Built-in predictors driving the loop end to end
//! 4. Determinism

use chrono::{NaiveDate, NaiveDateTime};
use siglab_core::domain::{Bar, CloseReason, TradeSide};
use siglab_core::engine::{run_backtest, EngineConfig};
use siglab_core::predictor::{
    Action, NullPredictor, Prediction, Predictor, ThresholdRule, ThresholdRuleParams,
};

/// Predictor that reads its action from the `signal` feature
/// (1 buy, -1 sell, anything else hold) and its probability from `prob`.
struct FeatureDriven {
    names: Vec<String>,
}

impl FeatureDriven {
    fn new() -> Self {
        Self {
            names: vec!["signal".into(), "prob".into()],
        }
    }
}

impl Predictor for FeatureDriven {
    fn name(&self) -> &str {
        "feature_driven"
    }

    fn feature_names(&self) -> &[String] {
        &self.names
    }

    fn predict(&self, features: &[f64]) -> Prediction {
        let action = Action::from_class(features[0] as i64);
        let prob = features[1];
        Prediction::new(action, (prob > 0.0).then_some(prob))
    }
}

fn ts(i: usize) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        + chrono::Duration::hours(i as i64)
}

/// Helper: bars from `(close, signal, prob)` triples.
fn scripted_bars(rows: &[(f64, f64, f64)]) -> Vec<Bar> {
    rows.iter()
        .enumerate()
        .map(|(i, &(close, signal, prob))| {
            Bar::new(ts(i), close, close, close, close, 1_000.0)
                .with_feature("signal", signal)
                .with_feature("prob", prob)
        })
        .collect()
}

fn config() -> EngineConfig {
    EngineConfig::new(10_000.0, 0)
}

// ──────────────────────────────────────────────
// Position lifecycle
// ──────────────────────────────────────────────

#[test]
fn long_trade_realizes_pnl_into_balance() {
    // 10% of 10_000 at 100 → 10 units; exit at 104 via a sub-threshold sell → +40
    let bars = scripted_bars(&[(100.0, 1.0, 0.9), (104.0, -1.0, 0.5), (104.0, 0.0, 0.0)]);
    let result = run_backtest(&bars, &FeatureDriven::new(), &config(), None).unwrap();

    let trades = result.closed_trades();
    assert_eq!(trades.len(), 1);
    let t = &trades[0];
    assert_eq!(t.side, TradeSide::Buy);
    assert!((t.quantity - 10.0).abs() < 1e-10);
    assert!((t.pnl - 40.0).abs() < 1e-9);
    assert!((t.pnl_pct - 4.0).abs() < 1e-9);
    assert_eq!(t.close_reason, CloseReason::OppositeSignal);
    assert!((result.final_balance - 10_040.0).abs() < 1e-9);
}

#[test]
fn short_trade_profits_from_falling_price() {
    let bars = scripted_bars(&[(100.0, -1.0, 0.85), (98.0, 0.0, 0.0), (98.0, 1.0, 0.2)]);
    let result = run_backtest(&bars, &FeatureDriven::new(), &config(), None).unwrap();
    let trades = result.closed_trades();
    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].side, TradeSide::Sell);
    assert!((trades[0].pnl - 20.0).abs() < 1e-9);
    assert_eq!(trades[0].close_reason, CloseReason::OppositeSignal);
}

#[test]
fn sizing_compounds_across_trades() {
    // Trade 1: +10% take-profit on 1_000 notional → balance 10_100.
    // Trade 2 opens with 1_010 notional at 101 → 10 units.
    let bars = scripted_bars(&[
        (100.0, 1.0, 0.9),
        (110.0, 0.0, 0.0),
        (101.0, 1.0, 0.9),
        (101.0, 0.0, 0.0),
    ]);
    let result = run_backtest(&bars, &FeatureDriven::new(), &config(), None).unwrap();
    let trades = result.closed_trades();
    assert_eq!(trades.len(), 2);
    assert_eq!(trades[0].close_reason, CloseReason::TakeProfit);
    assert!((trades[1].quantity - 10.0).abs() < 1e-9);
}

#[test]
fn final_balance_equals_initial_plus_pnl() {
    let bars = scripted_bars(&[
        (100.0, 1.0, 0.9),
        (96.0, 0.0, 0.0),
        (96.0, -1.0, 0.95),
        (97.0, 0.0, 0.0),
        (99.0, 1.0, 0.99),
        (99.5, 0.0, 0.0),
    ]);
    let result = run_backtest(&bars, &FeatureDriven::new(), &config(), None).unwrap();
    let total: f64 = result.closed_trades().iter().map(|t| t.pnl).sum();
    assert!((result.final_balance - (result.initial_balance + total)).abs() < 1e-9);
    assert_eq!(result.ledger.open_count(), 0);
}

// ──────────────────────────────────────────────
// Exit rules
// ──────────────────────────────────────────────

#[test]
fn stop_loss_closes_long() {
    let bars = scripted_bars(&[(100.0, 1.0, 0.9), (97.5, 0.0, 0.0), (96.9, 0.0, 0.0)]);
    let result = run_backtest(&bars, &FeatureDriven::new(), &config(), None).unwrap();
    let trades = result.closed_trades();
    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].close_reason, CloseReason::StopLoss);
    assert_eq!(trades[0].exit_time, ts(2));
    assert_eq!(trades[0].exit_price, 96.9);
    assert_eq!(result.diagnostics.stop_loss_exits, 1);
}

#[test]
fn take_profit_closes_short() {
    let bars = scripted_bars(&[(100.0, -1.0, 0.9), (94.0, 0.0, 0.0), (90.0, 0.0, 0.0)]);
    let result = run_backtest(&bars, &FeatureDriven::new(), &config(), None).unwrap();
    let trades = result.closed_trades();
    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].close_reason, CloseReason::TakeProfit);
    assert_eq!(trades[0].exit_price, 94.0);
    assert_eq!(result.diagnostics.take_profit_exits, 1);
}

#[test]
fn hold_never_exits() {
    let bars = scripted_bars(&[(100.0, 1.0, 0.9), (101.0, 0.0, 0.99), (102.0, 0.0, 0.99)]);
    let result = run_backtest(&bars, &FeatureDriven::new(), &config(), None).unwrap();
    let trades = result.closed_trades();
    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].close_reason, CloseReason::EndOfData);
    assert_eq!(result.diagnostics.hold_signals, 2);
}

#[test]
fn same_direction_signal_keeps_position() {
    let bars = scripted_bars(&[(100.0, 1.0, 0.9), (101.0, 1.0, 0.9), (102.0, 1.0, 0.9)]);
    let result = run_backtest(&bars, &FeatureDriven::new(), &config(), None).unwrap();
    assert_eq!(result.ledger.len(), 1);
    assert_eq!(result.diagnostics.buy_signals, 3);
}

#[test]
fn confident_reversal_does_not_close() {
    // A Sell at 0.95 passes the entry gate but cannot open while long, so it
    // neither opens nor closes; the long runs to end of data.
    let bars = scripted_bars(&[(100.0, 1.0, 0.9), (101.0, -1.0, 0.95), (102.0, 0.0, 0.0)]);
    let result = run_backtest(&bars, &FeatureDriven::new(), &config(), None).unwrap();
    let trades = result.closed_trades();
    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].side, TradeSide::Buy);
    assert_eq!(trades[0].close_reason, CloseReason::EndOfData);
    assert_eq!(trades[0].exit_price, 102.0);
    assert_eq!(result.diagnostics.opposite_signal_exits, 0);
}

#[test]
fn risk_exit_then_reversal_entry_on_same_bar() {
    // Long stopped out at 90, then a confident Sell opens a short on the same bar.
    let bars = scripted_bars(&[(100.0, 1.0, 0.9), (90.0, -1.0, 0.9), (90.0, 0.0, 0.0)]);
    let result = run_backtest(&bars, &FeatureDriven::new(), &config(), None).unwrap();
    let trades = result.closed_trades();
    assert_eq!(trades.len(), 2);
    assert_eq!(trades[0].close_reason, CloseReason::StopLoss);
    assert_eq!(trades[1].side, TradeSide::Sell);
    assert_eq!(trades[1].entry_time, ts(1));
    assert_eq!(trades[1].close_reason, CloseReason::EndOfData);
}

// ──────────────────────────────────────────────
// Built-in predictors
// ──────────────────────────────────────────────

#[test]
fn null_predictor_yields_empty_ledger() {
    let bars = scripted_bars(&[(100.0, 1.0, 0.99); 20]);
    let result = run_backtest(&bars, &NullPredictor, &config(), None).unwrap();
    assert!(result.ledger.is_empty());
    assert_eq!(result.final_balance, result.initial_balance);
}

#[test]
fn threshold_rule_uses_default_confidence() {
    let rule = ThresholdRule::from_params(ThresholdRuleParams {
        name: "rsi".into(),
        feature: "rsi".into(),
        buy_below: Some(30.0),
        sell_above: Some(70.0),
    })
    .unwrap();
    let bars: Vec<Bar> = [(100.0, 25.0), (102.0, 50.0), (103.0, 75.0)]
        .iter()
        .enumerate()
        .map(|(i, &(c, rsi))| Bar::new(ts(i), c, c, c, c, 1.0).with_feature("rsi", rsi))
        .collect();

    // Default threshold 80 rejects confidence 75.
    let strict = run_backtest(&bars, &rule, &config(), None).unwrap();
    assert!(strict.ledger.is_empty());

    let loose = EngineConfig {
        confidence_threshold: 75.0,
        ..config()
    };
    let result = run_backtest(&bars, &rule, &loose, None).unwrap();
    let trades = result.closed_trades();
    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].confidence, 75.0);
    // The Sell at rsi 75 clears the 75 threshold, so it does not close the long.
    assert_eq!(trades[0].close_reason, CloseReason::EndOfData);
    assert_eq!(trades[0].exit_price, 103.0);
}

#[test]
fn missing_predictor_features_fall_back_to_zero() {
    // Bars carry no `signal`/`prob` columns → every input is 0.0 → hold.
    let bars: Vec<Bar> = (0..5)
        .map(|i| Bar::new(ts(i), 100.0, 100.0, 100.0, 100.0, 1.0))
        .collect();
    let result = run_backtest(&bars, &FeatureDriven::new(), &config(), None).unwrap();
    assert!(result.ledger.is_empty());
    assert_eq!(result.diagnostics.missing_feature_substitutions, 10);
    assert_eq!(result.diagnostics.missing_features.get("signal"), Some(&5));
    assert_eq!(result.diagnostics.missing_features.get("prob"), Some(&5));
}

// ──────────────────────────────────────────────
// Determinism
// ──────────────────────────────────────────────

#[test]
fn identical_inputs_produce_identical_results() {
    let bars: Vec<Bar> = (0..300)
        .map(|i| {
            let close = 100.0 + (i as f64 * 0.2).sin() * 8.0;
            let signal = ((i as f64 * 0.37).cos() * 1.5).round();
            Bar::new(ts(i), close, close, close, close, 1.0)
                .with_feature("signal", signal)
                .with_feature("prob", 0.8 + (i % 5) as f64 * 0.04)
        })
        .collect();
    let a = run_backtest(&bars, &FeatureDriven::new(), &config(), None).unwrap();
    let b = run_backtest(&bars, &FeatureDriven::new(), &config(), None).unwrap();
    assert_eq!(a, b);
    assert_eq!(
        serde_json::to_string(&a).unwrap(),
        serde_json::to_string(&b).unwrap()
    );
}
