//! Predictors: turn a bar's feature snapshot into a trading action.
//!
//! A predictor declares the ordered feature names it was trained on. The
//! engine builds the input vector in that order from the bar's feature map;
//! names the bar does not carry are substituted with `0.0` and reported back
//! so the run can count them. Predictors are stateless: the engine queries
//! them once per bar and never expects side effects.

pub mod linear;
pub mod threshold;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{Bar, TradeSide};

pub use linear::{LinearModel, LinearModelParams};
pub use threshold::{ThresholdRule, ThresholdRuleParams};

/// Confidence reported when a predictor cannot produce a probability.
pub const DEFAULT_CONFIDENCE: f64 = 75.0;

/// Action recommended by a predictor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Buy,
    Sell,
    Hold,
}

impl Action {
    /// Map a classifier label (`-1` sell, `0` hold, `1` buy). Unknown labels hold.
    pub fn from_class(label: i64) -> Self {
        match label {
            1 => Self::Buy,
            -1 => Self::Sell,
            _ => Self::Hold,
        }
    }

    /// Entry side for an actionable signal; `None` for `Hold`.
    pub fn trade_side(&self) -> Option<TradeSide> {
        match self {
            Self::Buy => Some(TradeSide::Buy),
            Self::Sell => Some(TradeSide::Sell),
            Self::Hold => None,
        }
    }
}

/// Output of a single predictor query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub action: Action,
    /// Probability (0..=1) of the chosen class, when the model reports one.
    pub probability: Option<f64>,
}

impl Prediction {
    pub fn new(action: Action, probability: Option<f64>) -> Self {
        Self {
            action,
            probability,
        }
    }

    pub fn hold() -> Self {
        Self::new(Action::Hold, None)
    }

    /// Confidence on a 0..=100 scale; [`DEFAULT_CONFIDENCE`] without a probability.
    pub fn confidence(&self) -> f64 {
        self.probability
            .map(|p| p * 100.0)
            .unwrap_or(DEFAULT_CONFIDENCE)
    }
}

/// Errors raised while constructing a predictor from parameters.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PredictorError {
    #[error("predictor declares no features")]
    NoFeatures,
    #[error("predictor declares no classes")]
    NoClasses,
    #[error("{what}: expected length {expected}, got {actual}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("{0} contains a non-finite value")]
    NonFinite(&'static str),
    #[error("invalid thresholds: buy_below ({buy_below}) must be below sell_above ({sell_above})")]
    InvertedThresholds { buy_below: f64, sell_above: f64 },
    #[error("threshold rule needs at least one of buy_below / sell_above")]
    NoThresholds,
}

/// Trait for predictors.
///
/// `predict` receives the feature vector in exactly the order of
/// `feature_names()`. It must be deterministic for identical inputs.
pub trait Predictor: Send + Sync {
    /// Human-readable name (e.g., "ETHUSDT_1h_logreg").
    fn name(&self) -> &str;

    /// Ordered feature names the model expects.
    fn feature_names(&self) -> &[String];

    fn predict(&self, features: &[f64]) -> Prediction;
}

/// Predictor input assembled from a bar.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector<'a> {
    pub values: Vec<f64>,
    /// Declared names absent from the bar (substituted with 0.0).
    pub missing: Vec<&'a str>,
}

impl<'a> FeatureVector<'a> {
    pub fn build(bar: &Bar, names: &'a [String]) -> Self {
        let mut missing = Vec::new();
        let values = names
            .iter()
            .map(|name| match bar.feature(name) {
                Some(v) => v,
                None => {
                    missing.push(name.as_str());
                    0.0
                }
            })
            .collect();
        Self { values, missing }
    }

    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Null predictor: always holds. Used where no model is wired in.
pub struct NullPredictor;

impl Predictor for NullPredictor {
    fn name(&self) -> &str {
        "null"
    }

    fn feature_names(&self) -> &[String] {
        &[]
    }

    fn predict(&self, _features: &[f64]) -> Prediction {
        Prediction::hold()
    }
}
