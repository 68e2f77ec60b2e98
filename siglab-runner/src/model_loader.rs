//! Model artifact loading.
//!
//! Artifacts are JSON documents tagged by `type`:
//!
//! ```json
//! {"type": "linear", "name": "ETHUSDT_1h", "feature_names": ["rsi", "macd"],
//!  "scaler": {"mean": [50.0, 0.0], "scale": [10.0, 1.0]},
//!  "classes": [-1, 0, 1], "coefficients": [[...], [...], [...]], "intercepts": [0, 0, 0]}
//!
//! {"type": "threshold", "name": "rsi_30_70", "feature": "rsi",
//!  "buy_below": 30.0, "sell_above": 70.0}
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use siglab_core::predictor::{
    LinearModel, LinearModelParams, Predictor, PredictorError, ThresholdRule, ThresholdRuleParams,
};

#[derive(Debug, Error)]
pub enum ModelLoadError {
    #[error("model artifact not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse model artifact: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid model '{name}': {source}")]
    Invalid {
        name: String,
        #[source]
        source: PredictorError,
    },
}

/// On-disk model description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModelArtifact {
    Linear(LinearModelParams),
    Threshold(ThresholdRuleParams),
}

impl ModelArtifact {
    pub fn name(&self) -> &str {
        match self {
            Self::Linear(p) => &p.name,
            Self::Threshold(p) => &p.name,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Linear(_) => "linear",
            Self::Threshold(_) => "threshold",
        }
    }

    /// Declared input features, in model order.
    pub fn feature_names(&self) -> Vec<String> {
        match self {
            Self::Linear(p) => p.feature_names.clone(),
            Self::Threshold(p) => vec![p.feature.clone()],
        }
    }

    /// Validate parameters and build the predictor.
    pub fn into_predictor(self) -> Result<Box<dyn Predictor>, ModelLoadError> {
        let name = self.name().to_string();
        let invalid = |source| ModelLoadError::Invalid {
            name: name.clone(),
            source,
        };
        let predictor: Box<dyn Predictor> = match self {
            Self::Linear(p) => Box::new(LinearModel::from_params(p).map_err(invalid)?),
            Self::Threshold(p) => Box::new(ThresholdRule::from_params(p).map_err(invalid)?),
        };
        Ok(predictor)
    }
}

/// Read and parse an artifact without building the predictor.
pub fn read_artifact(path: &Path) -> Result<ModelArtifact, ModelLoadError> {
    if !path.exists() {
        return Err(ModelLoadError::NotFound(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path).map_err(|source| ModelLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_artifact(&content)
}

pub fn parse_artifact(json: &str) -> Result<ModelArtifact, ModelLoadError> {
    Ok(serde_json::from_str(json)?)
}

/// Load a predictor from an artifact file.
pub fn load_model(path: &Path) -> Result<Box<dyn Predictor>, ModelLoadError> {
    let artifact = read_artifact(path)?;
    info!(
        path = %path.display(),
        model = artifact.name(),
        kind = artifact.kind(),
        features = artifact.feature_names().len(),
        "loaded model"
    );
    artifact.into_predictor()
}
