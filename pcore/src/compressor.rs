// PicSeek — compressor.rs
// Compressor extractor family: fixed-shape input tensor, per-network
// normalization, opaque forward pass of a frozen feature network.
// Author: d65v <https://github.com/d65v>

use std::fs;
use std::path::Path;

use image::imageops::FilterType;
use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::{FeatureVector, PicSeekError, Result};

// ── Input ─────────────────────────────────────────────────────────────────────

/// Input normalization applied to RGB pixels before the forward pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Normalization {
    /// BGR order, ImageNet channel means subtracted (VGG family)
    Caffe,
    /// Scaled to [-1, 1] (MobileNet / Inception family)
    Tf,
    /// Scaled to [0, 1], then ImageNet mean/std standardized
    Torch,
    /// Scaled to [0, 1]
    Unit,
}

const IMAGENET_MEAN_BGR: [f32; 3] = [103.939, 116.779, 123.68];
const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

impl Normalization {
    #[inline]
    pub fn apply(&self, rgb: [u8; 3]) -> [f32; 3] {
        let [r, g, b] = rgb.map(|c| c as f32);
        match self {
            Normalization::Caffe => [
                b - IMAGENET_MEAN_BGR[0],
                g - IMAGENET_MEAN_BGR[1],
                r - IMAGENET_MEAN_BGR[2],
            ],
            Normalization::Tf => [r / 127.5 - 1.0, g / 127.5 - 1.0, b / 127.5 - 1.0],
            Normalization::Torch => {
                let mut out = [r / 255.0, g / 255.0, b / 255.0];
                for c in 0..3 {
                    out[c] = (out[c] - IMAGENET_MEAN[c]) / IMAGENET_STD[c];
                }
                out
            }
            Normalization::Unit => [r / 255.0, g / 255.0, b / 255.0],
        }
    }
}

/// Channels-last (HWC) float image fed to a network.
#[derive(Debug, Clone, PartialEq)]
pub struct InputTensor {
    pub width: u32,
    pub height: u32,
    pub channels: usize,
    pub data: Vec<f32>,
}

impl InputTensor {
    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> &[f32] {
        let start = (y as usize * self.width as usize + x as usize) * self.channels;
        &self.data[start..start + self.channels]
    }
}

// ── Network capability ────────────────────────────────────────────────────────

/// A frozen feature network truncated before its classification layer.
/// Treated as an opaque, deterministic function of its input.
pub trait FeatureNetwork: Send + Sync {
    fn name(&self) -> &str;

    /// Length of the flattened activation returned by [`forward`](Self::forward).
    fn output_dim(&self) -> usize;

    /// Fixed input shape `(width, height)`, if the network has one.
    fn input_shape(&self) -> Option<(u32, u32)> {
        None
    }

    /// One forward pass.
    fn forward(&self, input: &InputTensor) -> Result<Vec<f32>>;
}

/// Weightless network averaging each channel over a `grid × grid` layout
/// (a color-layout embedding).
#[derive(Debug, Clone)]
pub struct GridPoolNetwork {
    pub grid: u32,
}

impl Default for GridPoolNetwork {
    fn default() -> Self {
        Self { grid: 4 }
    }
}

impl FeatureNetwork for GridPoolNetwork {
    fn name(&self) -> &str {
        "grid-pool"
    }

    fn output_dim(&self) -> usize {
        (self.grid * self.grid) as usize * 3
    }

    fn forward(&self, input: &InputTensor) -> Result<Vec<f32>> {
        if input.channels != 3 {
            return Err(PicSeekError::DimensionMismatch {
                expected: 3,
                got: input.channels,
            });
        }
        let g = self.grid;
        let mut out = Vec::with_capacity(self.output_dim());
        for cy in 0..g {
            let (y0, y1) = (cy * input.height / g, (cy + 1) * input.height / g);
            for cx in 0..g {
                let (x0, x1) = (cx * input.width / g, (cx + 1) * input.width / g);
                let mut sum = [0.0f32; 3];
                let mut n = 0usize;
                for y in y0..y1 {
                    for x in x0..x1 {
                        for (s, v) in sum.iter_mut().zip(input.pixel(x, y)) {
                            *s += v;
                        }
                        n += 1;
                    }
                }
                let denom = n.max(1) as f32;
                out.extend(sum.iter().map(|s| s / denom));
            }
        }
        Ok(out)
    }
}

/// On-disk weights of a single dense encoder layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncoderWeights {
    pub input_width: u32,
    pub input_height: u32,
    pub output_dim: usize,
    pub normalization: Normalization,
    /// Row-major `output_dim × (input_width · input_height · 3)`
    pub weights: Vec<f32>,
    pub bias: Vec<f32>,
}

/// Dense layer with ReLU: the bottleneck of a pretrained encoder.
#[derive(Debug, Clone)]
pub struct LinearEncoder {
    weights: EncoderWeights,
    input_len: usize,
}

impl LinearEncoder {
    pub fn new(weights: EncoderWeights) -> Result<Self> {
        let input_len = weights.input_width as usize * weights.input_height as usize * 3;
        if input_len == 0 || weights.output_dim == 0 {
            return Err(PicSeekError::ConfigError(
                "encoder input shape and output dimension must be non-zero".to_string(),
            ));
        }
        let expected = weights.output_dim * input_len;
        if weights.weights.len() != expected {
            return Err(PicSeekError::DimensionMismatch {
                expected,
                got: weights.weights.len(),
            });
        }
        if weights.bias.len() != weights.output_dim {
            return Err(PicSeekError::DimensionMismatch {
                expected: weights.output_dim,
                got: weights.bias.len(),
            });
        }
        Ok(Self { weights, input_len })
    }

    /// Load bincode-encoded [`EncoderWeights`].
    ///
    /// # Errors
    /// `ConfigError` when the file is missing or undecodable.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|e| {
            PicSeekError::ConfigError(format!("cannot read encoder weights '{}': {}", path.display(), e))
        })?;
        let weights: EncoderWeights = bincode::deserialize(&bytes).map_err(|e| {
            PicSeekError::ConfigError(format!("invalid encoder weights '{}': {}", path.display(), e))
        })?;
        Self::new(weights)
    }

    pub fn save(weights: &EncoderWeights, path: &Path) -> Result<()> {
        let bytes = bincode::serialize(weights).map_err(|e| PicSeekError::StorageError(e.to_string()))?;
        fs::write(path, bytes)?;
        Ok(())
    }

    pub fn normalization(&self) -> Normalization {
        self.weights.normalization
    }
}

impl FeatureNetwork for LinearEncoder {
    fn name(&self) -> &str {
        "encoder"
    }

    fn output_dim(&self) -> usize {
        self.weights.output_dim
    }

    fn input_shape(&self) -> Option<(u32, u32)> {
        Some((self.weights.input_width, self.weights.input_height))
    }

    fn forward(&self, input: &InputTensor) -> Result<Vec<f32>> {
        if input.data.len() != self.input_len {
            return Err(PicSeekError::DimensionMismatch {
                expected: self.input_len,
                got: input.data.len(),
            });
        }
        let out = self
            .weights
            .weights
            .chunks_exact(self.input_len)
            .zip(self.weights.bias.iter())
            .map(|(row, b)| {
                let z: f32 = row.iter().zip(input.data.iter()).map(|(w, x)| w * x).sum();
                (z + b).max(0.0)
            })
            .collect();
        Ok(out)
    }
}

// ── Extractor ─────────────────────────────────────────────────────────────────

/// Compressor extractor: resize, normalize, forward, flatten.
/// Never misses; every readable image yields a vector.
pub struct Compressor {
    network: Box<dyn FeatureNetwork>,
    normalization: Normalization,
    width: u32,
    height: u32,
}

impl Compressor {
    /// # Errors
    /// `ConfigError` when the network has a fixed input shape different from `width × height`.
    pub fn new(
        network: Box<dyn FeatureNetwork>,
        normalization: Normalization,
        width: u32,
        height: u32,
    ) -> Result<Self> {
        if let Some(shape) = network.input_shape() {
            if shape != (width, height) {
                return Err(PicSeekError::ConfigError(format!(
                    "network '{}' expects {}x{} input, got {}x{}",
                    network.name(),
                    shape.0,
                    shape.1,
                    width,
                    height
                )));
            }
        }
        Ok(Self {
            network,
            normalization,
            width,
            height,
        })
    }

    pub fn network_name(&self) -> &str {
        self.network.name()
    }

    pub fn dimension(&self) -> usize {
        self.network.output_dim()
    }

    pub fn preprocess(&self, path: &Path) -> Result<InputTensor> {
        let image = image::open(path)?;
        Ok(self.prepare(&image))
    }

    pub fn prepare(&self, image: &DynamicImage) -> InputTensor {
        let rgb = image
            .resize_exact(self.width, self.height, FilterType::Triangle)
            .to_rgb8();
        let mut data = Vec::with_capacity(self.width as usize * self.height as usize * 3);
        for px in rgb.pixels() {
            data.extend_from_slice(&self.normalization.apply(px.0));
        }
        InputTensor {
            width: self.width,
            height: self.height,
            channels: 3,
            data,
        }
    }

    pub fn extract(&self, path: &Path) -> Result<Option<FeatureVector>> {
        let tensor = self.preprocess(path)?;
        self.compress(&tensor).map(Some)
    }

    pub fn compress(&self, tensor: &InputTensor) -> Result<FeatureVector> {
        let out = self.network.forward(tensor)?;
        if out.len() != self.dimension() {
            return Err(PicSeekError::DimensionMismatch {
                expected: self.dimension(),
                got: out.len(),
            });
        }
        Ok(out)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
