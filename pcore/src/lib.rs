// PicSeek — lib.rs
// Public API, error types, configuration, timing wrapper, re-exports.
// Author: d65v <https://github.com/d65v>

pub mod compressor;
pub mod database;
pub mod distance;
pub mod evaluation;
pub mod extractor;
pub mod finder;
pub mod keypoints;
pub mod manifest;
pub mod metrics;

#[cfg(test)]
mod testkit;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use thiserror::Error;

pub use crate::database::{Database, DatabaseEntry};
pub use crate::distance::Metric;
pub use crate::extractor::{build_extractor, Extractor, ExtractorKind, ExtractorSettings};
pub use crate::finder::{Finder, SearchOutput};

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum PicSeekError {
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Manifest error: {0}")]
    Manifest(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PicSeekError>;

/// Fixed-length numeric summary of one image.
pub type FeatureVector = Vec<f32>;

// ── Config ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct PicSeekConfig {
    /// Directory holding the `train.jsonl` / `test.jsonl` manifests
    pub input_path: PathBuf,
    /// Directory of persisted feature databases
    pub feature_path: PathBuf,
    /// Directory the evaluation report is written to
    pub evaluation_path: PathBuf,
    /// Extractor used by single-image search
    pub extractor: ExtractorKind,
    /// Extractors iterated by `build` and `evaluate`
    pub extractors: Vec<ExtractorKind>,
    /// Metric used by single-image search
    pub metric: Metric,
    /// Metrics iterated by `evaluate`
    pub metrics: Vec<Metric>,
    /// Number of results returned per query
    pub depth: usize,
    /// Keypoints kept by keypoint-descriptor extractors
    pub vector_size: usize,
    /// Square input side used by both extractor families
    pub input_size: u32,
    /// Weights file for the `encoder` extractor
    pub encoder_weights: Option<PathBuf>,
}

impl Default for PicSeekConfig {
    fn default() -> Self {
        Self {
            input_path: PathBuf::from("./data"),
            feature_path: PathBuf::from("./features"),
            evaluation_path: PathBuf::from("./outputs"),
            extractor: ExtractorKind::Harris,
            extractors: vec![
                ExtractorKind::Harris,
                ExtractorKind::Fast,
                ExtractorKind::ColorLayout,
            ],
            metric: Metric::Cosine,
            metrics: Metric::ALL.to_vec(),
            depth: 5,
            vector_size: 32,
            input_size: 224,
            encoder_weights: None,
        }
    }
}

impl PicSeekConfig {
    /// Load config from environment variables, falling back to defaults.
    ///
    /// # Errors
    /// Returns `ConfigError` / `InvalidInput` for values that are present but malformed.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let input_path = lookup("PICSEEK_INPUT_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.input_path);
        let feature_path = lookup("PICSEEK_FEATURE_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.feature_path);
        let evaluation_path = lookup("PICSEEK_EVALUATION_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.evaluation_path);

        let extractor = match lookup("PICSEEK_EXTRACTOR") {
            Some(tag) => tag.parse()?,
            None => defaults.extractor,
        };
        let extractors = match lookup("PICSEEK_EXTRACTORS") {
            Some(list) => parse_list(&list)?,
            None => defaults.extractors,
        };
        let metric = match lookup("PICSEEK_METRIC") {
            Some(tag) => tag.parse()?,
            None => defaults.metric,
        };
        let metrics = match lookup("PICSEEK_METRICS") {
            Some(list) => parse_list(&list)?,
            None => defaults.metrics,
        };

        let depth = match lookup("PICSEEK_DEPTH") {
            Some(raw) => parse_depth(&raw)?,
            None => defaults.depth,
        };
        let vector_size = match lookup("PICSEEK_VECTOR_SIZE") {
            Some(raw) => parse_positive("PICSEEK_VECTOR_SIZE", &raw)?,
            None => defaults.vector_size,
        };
        let input_size = match lookup("PICSEEK_INPUT_SIZE") {
            Some(raw) => parse_positive("PICSEEK_INPUT_SIZE", &raw)?,
            None => defaults.input_size,
        };

        let encoder_weights = lookup("PICSEEK_ENCODER_WEIGHTS").map(PathBuf::from);

        Ok(Self {
            input_path,
            feature_path,
            evaluation_path,
            extractor,
            extractors,
            metric,
            metrics,
            depth,
            vector_size,
            input_size,
            encoder_weights,
        })
    }

    /// Settings handed to [`build_extractor`].
    pub fn extractor_settings(&self) -> ExtractorSettings {
        ExtractorSettings {
            vector_size: self.vector_size,
            input_width: self.input_size,
            input_height: self.input_size,
            encoder_weights: self.encoder_weights.clone(),
        }
    }
}

/// Parse a result depth. Negative or non-numeric values are rejected, never coerced.
pub fn parse_depth(raw: &str) -> Result<usize> {
    let value: i64 = raw
        .trim()
        .parse()
        .map_err(|_| PicSeekError::InvalidInput(format!("depth '{}' is not an integer", raw)))?;
    if value < 0 {
        return Err(PicSeekError::InvalidInput(format!(
            "depth must be non-negative, got {}",
            value
        )));
    }
    Ok(value as usize)
}

fn parse_positive<T>(key: &str, raw: &str) -> Result<T>
where
    T: std::str::FromStr + Default + PartialEq,
{
    match raw.trim().parse::<T>() {
        Ok(v) if v != T::default() => Ok(v),
        _ => Err(PicSeekError::ConfigError(format!(
            "{} must be a positive integer in range, got '{}'",
            key, raw
        ))),
    }
}

fn parse_list<T>(raw: &str) -> Result<Vec<T>>
where
    T: std::str::FromStr<Err = PicSeekError>,
{
    let items = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<T>())
        .collect::<Result<Vec<T>>>()?;
    if items.is_empty() {
        return Err(PicSeekError::ConfigError(format!("empty list '{}'", raw)));
    }
    Ok(items)
}

// ── Timing ────────────────────────────────────────────────────────────────────

/// A value together with the wall-clock time it took to produce.
#[derive(Debug, Clone)]
pub struct Timed<T> {
    pub value: T,
    pub duration: Duration,
}

/// Run `f` and measure how long it took.
pub fn timed<T, F>(f: F) -> Timed<T>
where
    F: FnOnce() -> T,
{
    let start = Instant::now();
    let value = f();
    Timed {
        value,
        duration: start.elapsed(),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
