//! Single-feature threshold rule (e.g. RSI oversold/overbought).
//!
//! Buys when the feature is strictly below `buy_below`, sells when strictly
//! above `sell_above`, holds otherwise. Reports no probability, so its
//! confidence is always [`super::DEFAULT_CONFIDENCE`].

use serde::{Deserialize, Serialize};

use super::{Action, Prediction, Predictor, PredictorError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdRuleParams {
    pub name: String,
    pub feature: String,
    #[serde(default)]
    pub buy_below: Option<f64>,
    #[serde(default)]
    pub sell_above: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct ThresholdRule {
    name: String,
    feature_names: Vec<String>,
    buy_below: Option<f64>,
    sell_above: Option<f64>,
}

impl ThresholdRule {
    pub fn from_params(params: ThresholdRuleParams) -> Result<Self, PredictorError> {
        match (params.buy_below, params.sell_above) {
            (None, None) => return Err(PredictorError::NoThresholds),
            (Some(buy_below), Some(sell_above)) if buy_below >= sell_above => {
                return Err(PredictorError::InvertedThresholds {
                    buy_below,
                    sell_above,
                })
            }
            _ => {}
        }
        if params.buy_below.is_some_and(|v| !v.is_finite())
            || params.sell_above.is_some_and(|v| !v.is_finite())
        {
            return Err(PredictorError::NonFinite("thresholds"));
        }
        Ok(Self {
            name: params.name,
            feature_names: vec![params.feature],
            buy_below: params.buy_below,
            sell_above: params.sell_above,
        })
    }
}

impl Predictor for ThresholdRule {
    fn name(&self) -> &str {
        &self.name
    }

    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn predict(&self, features: &[f64]) -> Prediction {
        let Some(&value) = features.first() else {
            return Prediction::hold();
        };
        let action = if self.buy_below.is_some_and(|t| value < t) {
            Action::Buy
        } else if self.sell_above.is_some_and(|t| value > t) {
            Action::Sell
        } else {
            Action::Hold
        };
        Prediction::new(action, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predictor::DEFAULT_CONFIDENCE;

    fn rsi_rule() -> ThresholdRule {
        ThresholdRule::from_params(ThresholdRuleParams {
            name: "rsi_30_70".into(),
            feature: "rsi".into(),
            buy_below: Some(30.0),
            sell_above: Some(70.0),
        })
        .unwrap()
    }

    #[test]
    fn oversold_buys_overbought_sells() {
        let rule = rsi_rule();
        assert_eq!(rule.predict(&[25.0]).action, Action::Buy);
        assert_eq!(rule.predict(&[75.0]).action, Action::Sell);
        assert_eq!(rule.predict(&[50.0]).action, Action::Hold);
        assert_eq!(rule.predict(&[30.0]).action, Action::Hold);
    }

    #[test]
    fn confidence_is_default() {
        assert_eq!(rsi_rule().predict(&[10.0]).confidence(), DEFAULT_CONFIDENCE);
    }

    #[test]
    fn declares_single_feature() {
        assert_eq!(rsi_rule().feature_names(), &["rsi".to_string()]);
    }

    #[test]
    fn rejects_inverted_thresholds() {
        let err = ThresholdRule::from_params(ThresholdRuleParams {
            name: "bad".into(),
            feature: "rsi".into(),
            buy_below: Some(70.0),
            sell_above: Some(30.0),
        })
        .unwrap_err();
        assert!(matches!(err, PredictorError::InvertedThresholds { .. }));
    }

    #[test]
    fn rejects_missing_thresholds() {
        let err = ThresholdRule::from_params(ThresholdRuleParams {
            name: "bad".into(),
            feature: "rsi".into(),
            buy_below: None,
            sell_above: None,
        })
        .unwrap_err();
        assert_eq!(err, PredictorError::NoThresholds);
    }

    #[test]
    fn empty_input_holds() {
        assert_eq!(rsi_rule().predict(&[]).action, Action::Hold);
    }
}
