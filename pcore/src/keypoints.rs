// PicSeek — keypoints.rs
// Keypoint-descriptor extractor family: detector capability, built-in
// Harris / FAST detectors, intensity-patch descriptor, fixed-size packing.
// Author: d65v <https://github.com/d65v>

use std::cmp::Reverse;
use std::path::Path;

use image::{DynamicImage, GrayImage};
use ordered_float::OrderedFloat;

use crate::extractor::aspect_aware_resize;
use crate::{FeatureVector, PicSeekError, Result};

/// Samples per side of the intensity patch descriptor.
const PATCH_GRID: usize = 8;
/// Pixel stride between patch samples.
const PATCH_STEP: i64 = 2;
/// Width of one patch descriptor.
pub const PATCH_WIDTH: usize = PATCH_GRID * PATCH_GRID;
/// Keypoints closer than this to the border are never reported.
const BORDER: u32 = 8;

// ── Keypoints / Descriptors ───────────────────────────────────────────────────

/// A detected 2D keypoint.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyPoint {
    pub x: f32,
    pub y: f32,
    /// Detector-specific strength, bigger is better
    pub response: f32,
}

impl KeyPoint {
    pub fn new(x: f32, y: f32, response: f32) -> Self {
        Self { x, y, response }
    }
}

/// Row-major descriptor matrix, one row per keypoint.
#[derive(Debug, Clone, Default)]
pub struct Descriptors {
    pub data: Vec<f32>,
    /// Values per descriptor
    pub width: usize,
    /// Number of descriptors
    pub count: usize,
}

impl Descriptors {
    pub fn with_width(width: usize) -> Self {
        Self {
            data: Vec::new(),
            width,
            count: 0,
        }
    }

    pub fn push(&mut self, row: &[f32]) {
        debug_assert_eq!(row.len(), self.width);
        self.data.extend_from_slice(row);
        self.count += 1;
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

// ── Detector capability ───────────────────────────────────────────────────────

/// Local feature library seen by the keypoint extractor.
///
/// Implementations must be deterministic: same image in, same keypoints and
/// descriptors out.
pub trait KeypointDetector: Send + Sync {
    fn name(&self) -> &'static str;

    /// Find keypoints in a grayscale image.
    fn detect(&self, image: &GrayImage) -> Vec<KeyPoint>;

    /// Values per descriptor produced by [`compute`](Self::compute).
    fn descriptor_width(&self) -> usize {
        PATCH_WIDTH
    }

    /// Describe the given keypoints. The default is a normalized intensity patch.
    fn compute(&self, image: &GrayImage, keypoints: &[KeyPoint]) -> Descriptors {
        let mut out = Descriptors::with_width(PATCH_WIDTH);
        for kp in keypoints {
            out.push(&patch_descriptor(image, kp));
        }
        out
    }
}

/// 8×8 intensity samples around the keypoint, mean-centred and L2-normalized.
/// A textureless patch yields all zeros.
pub fn patch_descriptor(image: &GrayImage, kp: &KeyPoint) -> [f32; PATCH_WIDTH] {
    let (w, h) = image.dimensions();
    let mut patch = [0.0f32; PATCH_WIDTH];
    if w == 0 || h == 0 {
        return patch;
    }

    let cx = kp.x.round() as i64;
    let cy = kp.y.round() as i64;
    let half = (PATCH_GRID as i64 - 1) * PATCH_STEP / 2;

    for (gy, row) in patch.chunks_exact_mut(PATCH_GRID).enumerate() {
        for (gx, cell) in row.iter_mut().enumerate() {
            let x = (cx - half + gx as i64 * PATCH_STEP).clamp(0, w as i64 - 1);
            let y = (cy - half + gy as i64 * PATCH_STEP).clamp(0, h as i64 - 1);
            *cell = image.get_pixel(x as u32, y as u32)[0] as f32;
        }
    }

    let mean = patch.iter().sum::<f32>() / PATCH_WIDTH as f32;
    patch.iter_mut().for_each(|v| *v -= mean);
    let norm = patch.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm < 1e-6 {
        return [0.0; PATCH_WIDTH];
    }
    patch.iter_mut().for_each(|v| *v /= norm);
    patch
}

// ── Harris ────────────────────────────────────────────────────────────────────

/// Harris corner detector: `det(M) - k·trace(M)²` over a 3×3 window of Sobel
/// gradient products, thresholded relative to the strongest response.
#[derive(Debug, Clone)]
pub struct HarrisDetector {
    pub k: f32,
    /// Fraction of the maximum response a corner must exceed
    pub threshold_ratio: f32,
}

impl Default for HarrisDetector {
    fn default() -> Self {
        Self {
            k: 0.04,
            threshold_ratio: 0.01,
        }
    }
}

impl HarrisDetector {
    fn response_map(&self, image: &GrayImage) -> Option<ScoreMap> {
        let (w, h) = image.dimensions();
        if w < 2 * BORDER + 1 || h < 2 * BORDER + 1 {
            return None;
        }
        let (w, h) = (w as usize, h as usize);
        let px = |x: usize, y: usize| image.get_pixel(x as u32, y as u32)[0] as f32;

        let mut ixx = vec![0.0f32; w * h];
        let mut iyy = vec![0.0f32; w * h];
        let mut ixy = vec![0.0f32; w * h];
        for y in 1..h - 1 {
            for x in 1..w - 1 {
                let gx = (px(x + 1, y - 1) + 2.0 * px(x + 1, y) + px(x + 1, y + 1))
                    - (px(x - 1, y - 1) + 2.0 * px(x - 1, y) + px(x - 1, y + 1));
                let gy = (px(x - 1, y + 1) + 2.0 * px(x, y + 1) + px(x + 1, y + 1))
                    - (px(x - 1, y - 1) + 2.0 * px(x, y - 1) + px(x + 1, y - 1));
                let i = y * w + x;
                ixx[i] = gx * gx;
                iyy[i] = gy * gy;
                ixy[i] = gx * gy;
            }
        }

        let mut scores = ScoreMap::new(w, h);
        for y in 2..h - 2 {
            for x in 2..w - 2 {
                let (mut sxx, mut syy, mut sxy) = (0.0f32, 0.0f32, 0.0f32);
                for wy in y - 1..=y + 1 {
                    for wx in x - 1..=x + 1 {
                        let i = wy * w + wx;
                        sxx += ixx[i];
                        syy += iyy[i];
                        sxy += ixy[i];
                    }
                }
                let det = sxx * syy - sxy * sxy;
                let trace = sxx + syy;
                scores.set(x, y, det - self.k * trace * trace);
            }
        }
        Some(scores)
    }
}

impl KeypointDetector for HarrisDetector {
    fn name(&self) -> &'static str {
        "harris"
    }

    fn detect(&self, image: &GrayImage) -> Vec<KeyPoint> {
        let Some(scores) = self.response_map(image) else {
            return Vec::new();
        };
        let max = scores.max();
        if max <= 0.0 {
            return Vec::new();
        }
        scores.local_maxima(max * self.threshold_ratio)
    }
}

// ── FAST ──────────────────────────────────────────────────────────────────────

/// Bresenham circle of radius 3 used by the segment test.
const FAST_CIRCLE: [(i64, i64); 16] = [
    (0, -3),
    (1, -3),
    (2, -2),
    (3, -1),
    (3, 0),
    (3, 1),
    (2, 2),
    (1, 3),
    (0, 3),
    (-1, 3),
    (-2, 2),
    (-3, 1),
    (-3, 0),
    (-3, -1),
    (-2, -2),
    (-1, -3),
];

/// FAST-9 segment-test detector. A pixel is a corner when at least nine
/// contiguous circle pixels are all brighter or all darker than it by more
/// than `threshold`. Score is the summed excess contrast over the circle.
#[derive(Debug, Clone)]
pub struct FastDetector {
    pub threshold: f32,
    /// Minimum contiguous arc length
    pub arc: usize,
}

impl Default for FastDetector {
    fn default() -> Self {
        Self {
            threshold: 20.0,
            arc: 9,
        }
    }
}

impl FastDetector {
    fn corner_score(&self, image: &GrayImage, x: u32, y: u32) -> Option<f32> {
        let center = image.get_pixel(x, y)[0] as f32;
        let mut ring = [0i8; 16];
        let mut score = 0.0f32;
        for (slot, (dx, dy)) in ring.iter_mut().zip(FAST_CIRCLE.iter()) {
            let v = image.get_pixel((x as i64 + dx) as u32, (y as i64 + dy) as u32)[0] as f32;
            let diff = v - center;
            if diff > self.threshold {
                *slot = 1;
            } else if diff < -self.threshold {
                *slot = -1;
            }
            score += (diff.abs() - self.threshold).max(0.0);
        }

        let has_arc = |sign: i8| {
            let mut run = 0usize;
            for i in 0..16 + self.arc {
                if ring[i % 16] == sign {
                    run += 1;
                    if run >= self.arc {
                        return true;
                    }
                } else {
                    run = 0;
                }
            }
            false
        };

        (has_arc(1) || has_arc(-1)).then_some(score)
    }
}

impl KeypointDetector for FastDetector {
    fn name(&self) -> &'static str {
        "fast"
    }

    fn detect(&self, image: &GrayImage) -> Vec<KeyPoint> {
        let (w, h) = image.dimensions();
        if w < 2 * BORDER + 1 || h < 2 * BORDER + 1 {
            return Vec::new();
        }
        let mut scores = ScoreMap::new(w as usize, h as usize);
        let mut any = false;
        for y in 3..h - 3 {
            for x in 3..w - 3 {
                if let Some(score) = self.corner_score(image, x, y) {
                    scores.set(x as usize, y as usize, score.max(f32::MIN_POSITIVE));
                    any = true;
                }
            }
        }
        if !any {
            return Vec::new();
        }
        scores.local_maxima(0.0)
    }
}

// ── Non-maximum suppression ───────────────────────────────────────────────────

struct ScoreMap {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl ScoreMap {
    fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0.0; width * height],
        }
    }

    #[inline]
    fn get(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.width + x]
    }

    #[inline]
    fn set(&mut self, x: usize, y: usize, v: f32) {
        self.data[y * self.width + x] = v;
    }

    fn max(&self) -> f32 {
        self.data.iter().copied().fold(f32::MIN, f32::max)
    }

    /// 3×3 local maxima strictly above `threshold`, in raster order, inside
    /// the descriptor border. Plateaus keep their first pixel only.
    fn local_maxima(&self, threshold: f32) -> Vec<KeyPoint> {
        let b = BORDER as usize;
        let mut out = Vec::new();
        if self.width <= 2 * b || self.height <= 2 * b {
            return out;
        }
        for y in b..self.height - b {
            for x in b..self.width - b {
                let v = self.get(x, y);
                if v <= threshold {
                    continue;
                }
                let mut is_max = true;
                'window: for ny in y - 1..=y + 1 {
                    for nx in x - 1..=x + 1 {
                        if (nx, ny) == (x, y) {
                            continue;
                        }
                        let n = self.get(nx, ny);
                        // earlier raster neighbours win ties
                        let earlier = (ny, nx) < (y, x);
                        if n > v || (earlier && n == v) {
                            is_max = false;
                            break 'window;
                        }
                    }
                }
                if is_max {
                    out.push(KeyPoint::new(x as f32, y as f32, v));
                }
            }
        }
        out
    }
}

// ── Extractor ─────────────────────────────────────────────────────────────────

/// Keypoint-descriptor extractor producing `vector_size × descriptor_width`
/// values, zero padded when fewer keypoints are found.
pub struct KeypointExtractor {
    detector: Box<dyn KeypointDetector>,
    vector_size: usize,
    width: u32,
    height: u32,
}

impl KeypointExtractor {
    pub fn new(detector: Box<dyn KeypointDetector>, vector_size: usize, width: u32, height: u32) -> Self {
        Self {
            detector,
            vector_size,
            width,
            height,
        }
    }

    pub fn detector_name(&self) -> &'static str {
        self.detector.name()
    }

    pub fn vector_size(&self) -> usize {
        self.vector_size
    }

    pub fn dimension(&self) -> usize {
        self.vector_size * self.detector.descriptor_width()
    }

    /// Load, crop/resize to the working size, convert to grayscale.
    pub fn preprocess(&self, path: &Path) -> Result<GrayImage> {
        let image = image::open(path)?;
        Ok(self.prepare(&image))
    }

    pub fn prepare(&self, image: &DynamicImage) -> GrayImage {
        aspect_aware_resize(image, self.width, self.height).to_luma8()
    }

    pub fn extract(&self, path: &Path) -> Result<Option<FeatureVector>> {
        let gray = self.preprocess(path)?;
        self.describe(&gray)
    }

    /// Detect, keep the strongest `vector_size` keypoints, describe, pad.
    pub fn describe(&self, image: &GrayImage) -> Result<Option<FeatureVector>> {
        let mut keypoints = self.detector.detect(image);
        if keypoints.is_empty() {
            log::debug!("{}: no keypoints detected", self.detector.name());
            return Ok(None);
        }

        // stable: equal responses keep detection order
        keypoints.sort_by_key(|kp| Reverse(OrderedFloat(kp.response)));
        keypoints.truncate(self.vector_size);

        let descriptors = self.detector.compute(image, &keypoints);
        let width = self.detector.descriptor_width();
        if descriptors.width != width {
            return Err(PicSeekError::DimensionMismatch {
                expected: width,
                got: descriptors.width,
            });
        }
        if descriptors.is_empty() {
            return Ok(None);
        }

        let needed = self.dimension();
        let mut vector = descriptors.data;
        if descriptors.count > keypoints.len() || vector.len() != descriptors.count * width {
            return Err(PicSeekError::DimensionMismatch {
                expected: needed,
                got: vector.len(),
            });
        }
        vector.resize(needed, 0.0);
        Ok(Some(vector))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::{bright_square, flat, StubDetector};

    fn gray(image: &DynamicImage) -> GrayImage {
        image.to_luma8()
    }

    #[test]
    fn test_harris_finds_square_corners() {
        let img = gray(&bright_square(96));
        let kps = HarrisDetector::default().detect(&img);
        assert!(!kps.is_empty());
        // strongest response sits near one of the four corners
        let best = kps
            .iter()
            .max_by_key(|k| OrderedFloat(k.response))
            .unwrap();
        let near = |v: f32| (v - 32.0).abs() <= 3.0 || (v - 63.0).abs() <= 3.0;
        assert!(near(best.x) && near(best.y), "best at ({}, {})", best.x, best.y);
    }

    #[test]
    fn test_fast_finds_square_corners() {
        let img = gray(&bright_square(96));
        let kps = FastDetector::default().detect(&img);
        assert!(!kps.is_empty());
        assert!(kps.iter().all(|k| k.response > 0.0));
    }

    #[test]
    fn test_flat_image_has_no_keypoints() {
        let img = gray(&flat(64, 128));
        assert!(HarrisDetector::default().detect(&img).is_empty());
        assert!(FastDetector::default().detect(&img).is_empty());
    }

    #[test]
    fn test_patch_descriptor_is_normalized() {
        let img = gray(&bright_square(96));
        let d = patch_descriptor(&img, &KeyPoint::new(32.0, 32.0, 1.0));
        let norm: f32 = d.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_patch_descriptor_flat_is_zero() {
        let img = gray(&flat(32, 10));
        let d = patch_descriptor(&img, &KeyPoint::new(16.0, 16.0, 1.0));
        assert!(d.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_padding_trailing_zeros() {
        let ex = KeypointExtractor::new(Box::new(StubDetector::new(3)), 32, 64, 64);
        let img = gray(&flat(64, 0));
        let v = ex.describe(&img).unwrap().unwrap();
        assert_eq!(v.len(), 32 * 64);
        assert!(v[..3 * 64].iter().all(|&x| x != 0.0));
        assert!(v[3 * 64..].iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_keeps_strongest_keypoints_in_order() {
        let ex = KeypointExtractor::new(Box::new(StubDetector::new(10)), 4, 64, 64);
        let img = gray(&flat(64, 0));
        let v = ex.describe(&img).unwrap().unwrap();
        assert_eq!(v.len(), 4 * 64);
        // stub descriptors are filled with response + 1; responses are 0..10
        let firsts: Vec<f32> = v.chunks_exact(64).map(|d| d[0]).collect();
        assert_eq!(firsts, vec![10.0, 9.0, 8.0, 7.0]);
    }

    #[test]
    fn test_no_keypoints_is_a_miss() {
        let ex = KeypointExtractor::new(Box::new(StubDetector::new(0)), 32, 64, 64);
        let img = gray(&flat(64, 0));
        assert!(ex.describe(&img).unwrap().is_none());
    }

    #[test]
    fn test_real_detector_dimension() {
        let ex = KeypointExtractor::new(Box::new(HarrisDetector::default()), 32, 96, 96);
        let v = ex.describe(&gray(&bright_square(96))).unwrap().unwrap();
        assert_eq!(v.len(), ex.dimension());
        assert_eq!(ex.dimension(), 32 * PATCH_WIDTH);
    }
}
