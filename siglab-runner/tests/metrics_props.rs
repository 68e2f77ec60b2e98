//! Property tests for ledger metrics.

use chrono::{NaiveDate, NaiveDateTime};
use proptest::prelude::*;

use siglab_core::domain::{CloseReason, ClosedTrade, TradeSide};
use siglab_runner::metrics::{self, MetricsOutcome};

const INITIAL: f64 = 10_000.0;

fn ts(i: usize) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        + chrono::Duration::hours(i as i64)
}

fn trade(i: usize, pnl: f64) -> ClosedTrade {
    ClosedTrade {
        entry_time: ts(2 * i),
        entry_price: 100.0,
        side: TradeSide::Buy,
        quantity: 10.0,
        confidence: 80.0,
        exit_time: ts(2 * i + 1),
        exit_price: 100.0 + pnl / 10.0,
        close_reason: CloseReason::OppositeSignal,
        pnl,
        pnl_pct: pnl / 10.0,
    }
}

fn ledger(pnls: &[f64]) -> Vec<ClosedTrade> {
    pnls.iter().enumerate().map(|(i, &p)| trade(i, p)).collect()
}

fn arb_pnls() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-100.0..100.0_f64, 1..50)
}

fn final_balance(pnls: &[f64]) -> f64 {
    INITIAL + pnls.iter().sum::<f64>()
}

proptest! {
    #[test]
    fn drawdown_is_a_percentage(pnls in arb_pnls()) {
        let curve = metrics::equity_curve(&ledger(&pnls), INITIAL);
        let dd = metrics::max_drawdown(&curve);
        prop_assert!((0.0..=100.0).contains(&dd));
    }

    #[test]
    fn win_rate_is_a_percentage(pnls in arb_pnls()) {
        let rate = metrics::win_rate(&ledger(&pnls));
        prop_assert!((0.0..=100.0).contains(&rate));
    }

    #[test]
    fn winners_only_gives_infinite_profit_factor(
        pnls in prop::collection::vec(0.01..100.0_f64, 1..20)
    ) {
        let trades = ledger(&pnls);
        prop_assert!(metrics::profit_factor(&trades).is_infinite());
        let curve = metrics::equity_curve(&trades, INITIAL);
        prop_assert_eq!(metrics::max_drawdown(&curve), 0.0);
    }

    #[test]
    fn losers_only_gives_zero_profit_factor(
        pnls in prop::collection::vec(-100.0..-0.01_f64, 1..20)
    ) {
        prop_assert_eq!(metrics::profit_factor(&ledger(&pnls)), 0.0);
        prop_assert_eq!(metrics::win_rate(&ledger(&pnls)), 0.0);
    }

    #[test]
    fn counts_partition_the_ledger(pnls in arb_pnls()) {
        let trades = ledger(&pnls);
        let outcome = MetricsOutcome::compute(&trades, INITIAL, final_balance(&pnls));
        let m = outcome.metrics().unwrap();
        prop_assert_eq!(m.total_trades, pnls.len());
        prop_assert!(m.winning_trades + m.losing_trades <= m.total_trades);
        prop_assert!(m.avg_win >= 0.0);
        prop_assert!(m.avg_loss <= 0.0);
    }

    #[test]
    fn equity_curve_ends_at_final_balance(pnls in arb_pnls()) {
        let curve = metrics::equity_curve(&ledger(&pnls), INITIAL);
        prop_assert_eq!(curve.len(), pnls.len() + 1);
        let last = *curve.last().unwrap();
        prop_assert!((last - final_balance(&pnls)).abs() < 1e-6);
    }
}

#[test]
fn empty_ledger_is_no_trades() {
    let outcome = MetricsOutcome::compute(&[], INITIAL, INITIAL);
    assert!(outcome.metrics().is_none());
    assert_eq!(outcome.final_balance(), INITIAL);
}
