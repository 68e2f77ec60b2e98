//! Serializable backtest configuration (TOML).
//!
//! ```toml
//! [backtest]
//! symbol = "ETHUSDT"
//! interval = "1h"
//! confidence_threshold = 80.0
//!
//! [data]
//! dir = "data/processed"        # bars read from {dir}/{symbol}_{interval}.csv
//! models_dir = "models"         # model read from {models_dir}/{symbol}_{interval}_model.json
//!
//! [output]
//! report = "backtest_results.json"
//! ```
//!
//! Every field has a default; explicit `data.bars` / `data.model` paths win
//! over the directory conventions.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use siglab_core::engine::state::{
    DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_INITIAL_BALANCE, DEFAULT_POSITION_SIZE_PCT,
    DEFAULT_STOP_LOSS_PCT, DEFAULT_TAKE_PROFIT_PCT, DEFAULT_WARMUP_INDEX,
};
use siglab_core::engine::{ConfigIssue, EngineConfig};

/// Errors from reading or validating a config.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(#[from] ConfigIssue),
    #[error("invalid config: {0}")]
    Field(String),
    #[error("hash config: {0}")]
    Hash(#[source] serde_json::Error),
}

/// Top-level configuration for a single backtest run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    pub backtest: BacktestSection,
    pub data: DataSection,
    pub output: OutputSection,
}

/// `[backtest]`: market and engine parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestSection {
    pub symbol: String,
    pub interval: String,
    pub initial_balance: f64,
    pub confidence_threshold: f64,
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
    pub warmup_index: usize,
    pub position_size_pct: f64,
    pub allow_same_bar_reentry: bool,
}

impl Default for BacktestSection {
    fn default() -> Self {
        Self {
            symbol: "ETHUSDT".into(),
            interval: "1h".into(),
            initial_balance: DEFAULT_INITIAL_BALANCE,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            stop_loss_pct: DEFAULT_STOP_LOSS_PCT,
            take_profit_pct: DEFAULT_TAKE_PROFIT_PCT,
            warmup_index: DEFAULT_WARMUP_INDEX,
            position_size_pct: DEFAULT_POSITION_SIZE_PCT,
            allow_same_bar_reentry: true,
        }
    }
}

/// `[data]`: where bars and the model artifact come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSection {
    pub dir: PathBuf,
    pub models_dir: PathBuf,
    pub bars: Option<PathBuf>,
    pub model: Option<PathBuf>,
}

impl Default for DataSection {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data/processed"),
            models_dir: PathBuf::from("models"),
            bars: None,
            model: None,
        }
    }
}

/// `[output]`: report destinations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSection {
    pub report: Option<PathBuf>,
    pub trades_csv: Option<PathBuf>,
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            report: Some(PathBuf::from("backtest_results.json")),
            trades_csv: None,
        }
    }
}

impl BacktestConfig {
    /// Load a config from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a config from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Config for `symbol`/`interval` with every other field at its default.
    pub fn for_market(symbol: &str, interval: &str) -> Self {
        let mut config = Self::default();
        config.backtest.symbol = symbol.to_string();
        config.backtest.interval = interval.to_string();
        config
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backtest.symbol.trim().is_empty() {
            return Err(ConfigError::Field("backtest.symbol must not be empty".into()));
        }
        if self.backtest.interval.trim().is_empty() {
            return Err(ConfigError::Field("backtest.interval must not be empty".into()));
        }
        self.to_engine_config().validate()?;
        Ok(())
    }

    pub fn to_engine_config(&self) -> EngineConfig {
        let b = &self.backtest;
        EngineConfig {
            initial_balance: b.initial_balance,
            confidence_threshold: b.confidence_threshold,
            stop_loss_pct: b.stop_loss_pct,
            take_profit_pct: b.take_profit_pct,
            warmup_index: b.warmup_index,
            position_size_pct: b.position_size_pct,
            allow_same_bar_reentry: b.allow_same_bar_reentry,
        }
    }

    /// Bars CSV path: explicit `data.bars`, else `{dir}/{symbol}_{interval}.csv`.
    pub fn bars_path(&self) -> PathBuf {
        self.data.bars.clone().unwrap_or_else(|| {
            self.data.dir.join(format!(
                "{}_{}.csv",
                self.backtest.symbol, self.backtest.interval
            ))
        })
    }

    /// Model artifact path: explicit `data.model`, else
    /// `{models_dir}/{symbol}_{interval}_model.json`.
    pub fn model_path(&self) -> PathBuf {
        self.data.model.clone().unwrap_or_else(|| {
            self.data.models_dir.join(format!(
                "{}_{}_model.json",
                self.backtest.symbol, self.backtest.interval
            ))
        })
    }

    /// Deterministic BLAKE3 hash of the full config.
    ///
    /// Fails when a path is not valid UTF-8.
    pub fn config_hash(&self) -> Result<String, ConfigError> {
        let json = serde_json::to_string(self).map_err(ConfigError::Hash)?;
        Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
    }
}
