//! SigLab Core: domain types, trade ledger, predictors and the replay engine.
//!
//! This crate contains the heart of the signal backtester:
//! - Domain types (bars with feature maps, positions, open/closed trades)
//! - Append-only trade ledger
//! - Predictor trait with linear-model and threshold-rule implementations
//! - Single-position state machine with stop-loss / take-profit exits
//! - Bar-by-bar replay loop

pub mod domain;
pub mod engine;
pub mod ledger;
pub mod predictor;

pub use engine::{run_backtest, EngineConfig, EngineError, RunResult};
pub use predictor::Predictor;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: core types are Send + Sync so batch runs can
    /// fan out across threads.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<domain::Bar>();
        require_sync::<domain::Bar>();
        require_send::<domain::Position>();
        require_sync::<domain::Position>();
        require_send::<domain::Trade>();
        require_sync::<domain::Trade>();
        require_send::<ledger::Ledger>();
        require_sync::<ledger::Ledger>();

        require_send::<engine::EngineConfig>();
        require_sync::<engine::EngineConfig>();
        require_send::<engine::RunResult>();
        require_sync::<engine::RunResult>();
        require_send::<engine::EngineError>();
        require_sync::<engine::EngineError>();

        require_send::<predictor::LinearModel>();
        require_sync::<predictor::LinearModel>();
        require_send::<predictor::ThresholdRule>();
        require_sync::<predictor::ThresholdRule>();
        require_send::<Box<dyn predictor::Predictor>>();
        require_sync::<Box<dyn predictor::Predictor>>();
    }

    /// Predictors see only the feature vector, never the position or balance.
    #[test]
    fn predictor_trait_has_no_state_parameter() {
        fn _check_trait_object_builds(p: &dyn Predictor, features: &[f64]) -> predictor::Prediction {
            p.predict(features)
        }
    }
}
