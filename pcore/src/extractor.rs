// PicSeek — extractor.rs
// Extractor variants, shared preprocessing, and the explicit factory.
// Author: d65v <https://github.com/d65v>

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, GrayImage};

use crate::compressor::{
    Compressor, FeatureNetwork, GridPoolNetwork, InputTensor, LinearEncoder, Normalization,
};
use crate::keypoints::{FastDetector, HarrisDetector, KeypointExtractor};
use crate::{FeatureVector, PicSeekError, Result};

// ── Kinds ─────────────────────────────────────────────────────────────────────

/// Every extractor the factory can build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtractorKind {
    /// Harris corners + intensity patch descriptors
    Harris,
    /// FAST-9 corners + intensity patch descriptors
    Fast,
    /// Grid color pooling network
    ColorLayout,
    /// Dense encoder loaded from a weights file
    Encoder,
}

impl ExtractorKind {
    pub const ALL: [ExtractorKind; 4] = [
        ExtractorKind::Harris,
        ExtractorKind::Fast,
        ExtractorKind::ColorLayout,
        ExtractorKind::Encoder,
    ];

    pub fn tag(&self) -> &'static str {
        match self {
            ExtractorKind::Harris => "harris",
            ExtractorKind::Fast => "fast",
            ExtractorKind::ColorLayout => "color-layout",
            ExtractorKind::Encoder => "encoder",
        }
    }

    pub fn is_keypoint(&self) -> bool {
        matches!(self, ExtractorKind::Harris | ExtractorKind::Fast)
    }
}

impl fmt::Display for ExtractorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for ExtractorKind {
    type Err = PicSeekError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        ExtractorKind::ALL
            .iter()
            .copied()
            .find(|k| k.tag() == wanted)
            .ok_or_else(|| {
                let known: Vec<&str> = ExtractorKind::ALL.iter().map(|k| k.tag()).collect();
                PicSeekError::ConfigError(format!(
                    "unknown extractor '{}' (expected one of: {})",
                    s,
                    known.join(" | ")
                ))
            })
    }
}

/// Construction parameters shared by all extractor kinds.
#[derive(Debug, Clone)]
pub struct ExtractorSettings {
    /// Keypoints kept by keypoint-descriptor extractors
    pub vector_size: usize,
    pub input_width: u32,
    pub input_height: u32,
    /// Required by [`ExtractorKind::Encoder`]
    pub encoder_weights: Option<PathBuf>,
}

impl Default for ExtractorSettings {
    fn default() -> Self {
        Self {
            vector_size: 32,
            input_width: 224,
            input_height: 224,
            encoder_weights: None,
        }
    }
}

/// Build the extractor named by `kind`.
///
/// # Errors
/// `ConfigError` when `kind` needs a resource the settings do not provide.
pub fn build_extractor(kind: ExtractorKind, settings: &ExtractorSettings) -> Result<Extractor> {
    if settings.vector_size == 0 {
        return Err(PicSeekError::ConfigError("vector_size must be positive".into()));
    }
    let (w, h) = (settings.input_width, settings.input_height);
    let extractor = match kind {
        ExtractorKind::Harris => Extractor::Keypoint(KeypointExtractor::new(
            Box::new(HarrisDetector::default()),
            settings.vector_size,
            w,
            h,
        )),
        ExtractorKind::Fast => Extractor::Keypoint(KeypointExtractor::new(
            Box::new(FastDetector::default()),
            settings.vector_size,
            w,
            h,
        )),
        ExtractorKind::ColorLayout => Extractor::Compressor(Compressor::new(
            Box::new(GridPoolNetwork::default()),
            Normalization::Unit,
            w,
            h,
        )?),
        ExtractorKind::Encoder => {
            let path = settings.encoder_weights.as_ref().ok_or_else(|| {
                PicSeekError::ConfigError(
                    "encoder extractor needs PICSEEK_ENCODER_WEIGHTS".to_string(),
                )
            })?;
            let encoder = LinearEncoder::load(path)?;
            let normalization = encoder.normalization();
            let (ew, eh) = encoder.input_shape().unwrap_or((w, h));
            Extractor::Compressor(Compressor::new(Box::new(encoder), normalization, ew, eh)?)
        }
    };
    log::debug!("built extractor '{}' (dim={})", kind, extractor.dimension());
    Ok(extractor)
}

// ── Extractor ─────────────────────────────────────────────────────────────────

/// Image after variant-specific preprocessing.
#[derive(Debug, Clone)]
pub enum PreparedImage {
    Gray(GrayImage),
    Tensor(InputTensor),
}

/// Maps an image to a fixed-length vector, or reports that none exists.
pub enum Extractor {
    Keypoint(KeypointExtractor),
    Compressor(Compressor),
}

impl Extractor {
    pub fn name(&self) -> &str {
        match self {
            Extractor::Keypoint(k) => k.detector_name(),
            Extractor::Compressor(c) => c.network_name(),
        }
    }

    /// Length of every vector this extractor produces.
    pub fn dimension(&self) -> usize {
        match self {
            Extractor::Keypoint(k) => k.dimension(),
            Extractor::Compressor(c) => c.dimension(),
        }
    }

    pub fn preprocess(&self, path: &Path) -> Result<PreparedImage> {
        match self {
            Extractor::Keypoint(k) => k.preprocess(path).map(PreparedImage::Gray),
            Extractor::Compressor(c) => c.preprocess(path).map(PreparedImage::Tensor),
        }
    }

    /// `Ok(None)` when the image carries no usable signal.
    pub fn extract(&self, path: &Path) -> Result<Option<FeatureVector>> {
        match self {
            Extractor::Keypoint(k) => k.extract(path),
            Extractor::Compressor(c) => c.extract(path),
        }
    }

    /// Same as [`extract`](Self::extract) for an already decoded image.
    pub fn extract_image(&self, image: &DynamicImage) -> Result<Option<FeatureVector>> {
        match self {
            Extractor::Keypoint(k) => k.describe(&k.prepare(image)),
            Extractor::Compressor(c) => c.compress(&c.prepare(image)).map(Some),
        }
    }
}

// ── Preprocessing ─────────────────────────────────────────────────────────────

/// Center-crop to the target aspect ratio, then resize once to the exact
/// target size. The crop window is computed in source pixels.
pub fn aspect_aware_resize(image: &DynamicImage, width: u32, height: u32) -> DynamicImage {
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 || width == 0 || height == 0 {
        return image.resize_exact(width, height, FilterType::Triangle);
    }

    let (cw, ch) = if w as u64 * height as u64 > h as u64 * width as u64 {
        // wider than the target
        let cw = (h as f64 * width as f64 / height as f64).round().clamp(1.0, w as f64) as u32;
        (cw, h)
    } else {
        let ch = (w as f64 * height as f64 / width as f64).round().clamp(1.0, h as f64) as u32;
        (w, ch)
    };
    let cropped = image.crop_imm((w - cw) / 2, (h - ch) / 2, cw, ch);
    cropped.resize_exact(width, height, FilterType::Triangle)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
