//! Bar loading from processed CSV files.
//!
//! Expected layout: a header row with `timestamp, open, high, low, close,
//! volume` (any order, case-insensitive) plus any number of numeric indicator
//! columns. Indicator columns become the bar's feature map; empty, `NaN` or
//! infinite cells are left out of the map so predictors fall back to `0.0`.
//!
//! Rows must be sane OHLCV and non-decreasing in time. Any violation fails
//! the whole load: bars are never silently dropped.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use thiserror::Error;
use tracing::{debug, info};

use siglab_core::domain::Bar;

const REQUIRED_COLUMNS: [&str; 6] = ["timestamp", "open", "high", "low", "close", "volume"];

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("data file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("missing required column '{0}'")]
    MissingColumn(&'static str),

    #[error("row {row}: unrecognised timestamp '{value}'")]
    BadTimestamp { row: usize, value: String },

    #[error("row {row}: column '{column}' is not a number: '{value}'")]
    BadNumber {
        row: usize,
        column: String,
        value: String,
    },

    #[error("row {row}: bar at {timestamp} fails the OHLCV sanity check")]
    InsaneBar { row: usize, timestamp: NaiveDateTime },

    #[error("row {row}: timestamp {timestamp} is earlier than the previous row ({previous})")]
    OutOfOrder {
        row: usize,
        timestamp: NaiveDateTime,
        previous: NaiveDateTime,
    },

    #[error("no bars found")]
    Empty,
}

/// Result of loading bars, including provenance.
#[derive(Debug, Clone)]
pub struct LoadedBars {
    pub bars: Vec<Bar>,
    /// Indicator column names in file order.
    pub feature_columns: Vec<String>,
    /// BLAKE3 hash over timestamps, OHLCV and features.
    pub dataset_hash: String,
}

/// Load bars from a CSV file.
pub fn load_bars_csv(path: &Path) -> Result<LoadedBars, LoadError> {
    if !path.exists() {
        return Err(LoadError::NotFound(path.to_path_buf()));
    }
    let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let loaded = read_bars(file)?;
    info!(
        path = %path.display(),
        bars = loaded.bars.len(),
        features = loaded.feature_columns.len(),
        "loaded bars"
    );
    Ok(loaded)
}

/// Parse bars from any CSV reader.
pub fn read_bars<R: Read>(reader: R) -> Result<LoadedBars, LoadError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    // Feature names keep their header spelling; only OHLCV columns match case-insensitively.
    let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();

    let mut required = [0usize; 6];
    for (slot, name) in required.iter_mut().zip(REQUIRED_COLUMNS) {
        *slot = headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(name))
            .ok_or(LoadError::MissingColumn(name))?;
    }
    let [ts_idx, open_idx, high_idx, low_idx, close_idx, volume_idx] = required;

    let feature_idx: Vec<usize> = (0..headers.len())
        .filter(|i| !required.contains(i))
        .collect();
    let feature_columns: Vec<String> = feature_idx.iter().map(|&i| headers[i].clone()).collect();

    let mut bars = Vec::new();
    let mut previous: Option<NaiveDateTime> = None;

    for (i, record) in rdr.records().enumerate() {
        let record = record?;
        // Header is line 1.
        let row = i + 2;
        let cell = |idx: usize| record.get(idx).unwrap_or("");

        let raw_ts = cell(ts_idx);
        let timestamp = parse_timestamp(raw_ts).ok_or_else(|| LoadError::BadTimestamp {
            row,
            value: raw_ts.to_string(),
        })?;

        let number = |idx: usize| -> Result<f64, LoadError> {
            let value = cell(idx);
            value.parse::<f64>().map_err(|_| LoadError::BadNumber {
                row,
                column: headers[idx].clone(),
                value: value.to_string(),
            })
        };

        let mut features = BTreeMap::new();
        for &idx in &feature_idx {
            let value = cell(idx);
            if value.is_empty() {
                continue;
            }
            let v = number(idx)?;
            if v.is_finite() {
                features.insert(headers[idx].clone(), v);
            }
        }

        let bar = Bar {
            timestamp,
            open: number(open_idx)?,
            high: number(high_idx)?,
            low: number(low_idx)?,
            close: number(close_idx)?,
            volume: number(volume_idx)?,
            features,
        };

        if !bar.is_sane() {
            return Err(LoadError::InsaneBar { row, timestamp });
        }
        if let Some(prev) = previous {
            if timestamp < prev {
                return Err(LoadError::OutOfOrder {
                    row,
                    timestamp,
                    previous: prev,
                });
            }
        }
        previous = Some(timestamp);
        bars.push(bar);
    }

    if bars.is_empty() {
        return Err(LoadError::Empty);
    }

    let dataset_hash = compute_dataset_hash(&bars);
    debug!(dataset_hash = %dataset_hash, "hashed dataset");

    Ok(LoadedBars {
        bars,
        feature_columns,
        dataset_hash,
    })
}

/// Parse the timestamp formats found in processed exports.
///
/// Accepts `YYYY-MM-DD HH:MM:SS[.f]`, `YYYY-MM-DDTHH:MM:SS[.f]`, RFC 3339
/// (converted to UTC), `YYYY-MM-DD`, and integer epoch milliseconds.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(ms) = value.parse::<i64>() {
        return DateTime::from_timestamp_millis(ms).map(|dt| dt.naive_utc());
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(ts);
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_utc());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Compute a deterministic BLAKE3 hash over all bar data.
///
/// Features are hashed in `BTreeMap` order so the result does not depend on
/// column order in the file.
pub fn compute_dataset_hash(bars: &[Bar]) -> String {
    let mut hasher = blake3::Hasher::new();
    for bar in bars {
        hasher.update(bar.timestamp.to_string().as_bytes());
        hasher.update(&bar.open.to_le_bytes());
        hasher.update(&bar.high.to_le_bytes());
        hasher.update(&bar.low.to_le_bytes());
        hasher.update(&bar.close.to_le_bytes());
        hasher.update(&bar.volume.to_le_bytes());
        for (name, value) in &bar.features {
            hasher.update(name.as_bytes());
            hasher.update(&value.to_le_bytes());
        }
    }
    hasher.finalize().to_hex().to_string()
}
