//! Linear softmax classifier behind a standard scaler.
//!
//! Inputs are standardized with per-feature `mean`/`scale`, then each class
//! gets a logit `intercept + coef · z`. The predicted action is the argmax
//! class; its softmax probability becomes the confidence. A zero scale is
//! treated as 1.0, matching how a standard scaler handles constant features.
//!
//! Binary models may ship a single coefficient row for the positive (second)
//! class; the first class then has an all-zero row and zero intercept.

use serde::{Deserialize, Serialize};

use super::{Action, Prediction, Predictor, PredictorError};

/// Serializable parameters of a [`LinearModel`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModelParams {
    pub name: String,
    pub feature_names: Vec<String>,
    pub scaler: ScalerParams,
    /// Class labels in coefficient-row order (`-1` sell, `0` hold, `1` buy).
    pub classes: Vec<i64>,
    /// One row per class, one column per feature.
    pub coefficients: Vec<Vec<f64>>,
    pub intercepts: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerParams {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct LinearModel {
    name: String,
    feature_names: Vec<String>,
    mean: Vec<f64>,
    scale: Vec<f64>,
    classes: Vec<i64>,
    rows: Vec<Vec<f64>>,
    intercepts: Vec<f64>,
}

impl LinearModel {
    pub fn from_params(params: LinearModelParams) -> Result<Self, PredictorError> {
        let n = params.feature_names.len();
        if n == 0 {
            return Err(PredictorError::NoFeatures);
        }
        if params.classes.is_empty() {
            return Err(PredictorError::NoClasses);
        }
        check_len("scaler.mean", n, params.scaler.mean.len())?;
        check_len("scaler.scale", n, params.scaler.scale.len())?;

        let (rows, intercepts) = if params.classes.len() == 2 && params.coefficients.len() == 1 {
            check_len("intercepts", 1, params.intercepts.len())?;
            (
                vec![vec![0.0; n], params.coefficients[0].clone()],
                vec![0.0, params.intercepts[0]],
            )
        } else {
            (params.coefficients, params.intercepts)
        };
        check_len("coefficients", params.classes.len(), rows.len())?;
        check_len("intercepts", params.classes.len(), intercepts.len())?;
        for row in &rows {
            check_len("coefficient row", n, row.len())?;
        }

        check_finite("scaler.mean", &params.scaler.mean)?;
        check_finite("scaler.scale", &params.scaler.scale)?;
        check_finite("intercepts", &intercepts)?;
        for row in &rows {
            check_finite("coefficients", row)?;
        }

        let scale = params
            .scaler
            .scale
            .into_iter()
            .map(|s| if s == 0.0 { 1.0 } else { s })
            .collect();

        Ok(Self {
            name: params.name,
            feature_names: params.feature_names,
            mean: params.scaler.mean,
            scale,
            classes: params.classes,
            rows,
            intercepts,
        })
    }

    /// Softmax class probabilities, aligned with the model's `classes`.
    pub fn probabilities(&self, features: &[f64]) -> Vec<f64> {
        let z: Vec<f64> = features
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(x, (m, s))| (x - m) / s)
            .collect();

        let logits: Vec<f64> = self
            .rows
            .iter()
            .zip(&self.intercepts)
            .map(|(row, b)| b + row.iter().zip(&z).map(|(w, v)| w * v).sum::<f64>())
            .collect();

        let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let exps: Vec<f64> = logits.iter().map(|l| (l - max).exp()).collect();
        let total: f64 = exps.iter().sum();
        exps.into_iter().map(|e| e / total).collect()
    }
}

impl Predictor for LinearModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn predict(&self, features: &[f64]) -> Prediction {
        let probs = self.probabilities(features);
        // First maximum wins on ties.
        let mut best = 0;
        for (i, p) in probs.iter().enumerate() {
            if *p > probs[best] {
                best = i;
            }
        }
        match probs.get(best) {
            Some(p) if p.is_finite() => {
                Prediction::new(Action::from_class(self.classes[best]), Some(*p))
            }
            _ => Prediction::hold(),
        }
    }
}

fn check_len(what: &'static str, expected: usize, actual: usize) -> Result<(), PredictorError> {
    if expected != actual {
        return Err(PredictorError::DimensionMismatch {
            what,
            expected,
            actual,
        });
    }
    Ok(())
}

fn check_finite(what: &'static str, values: &[f64]) -> Result<(), PredictorError> {
    if values.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(PredictorError::NonFinite(what))
    }
}
