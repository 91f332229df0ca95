// PicSeek — testkit.rs
// Shared fixtures for the unit tests: synthetic images and a stub detector.
// Author: d65v <https://github.com/d65v>

use std::path::{Path, PathBuf};

use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};

use crate::keypoints::{Descriptors, KeyPoint, KeypointDetector, KeypointExtractor, PATCH_WIDTH};
use crate::Extractor;

/// Detector returning `count` keypoints with responses `0..count`; each
/// descriptor is filled with `response + 1`.
pub struct StubDetector {
    count: usize,
}

impl StubDetector {
    pub fn new(count: usize) -> Self {
        Self { count }
    }
}

impl KeypointDetector for StubDetector {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&self, _image: &GrayImage) -> Vec<KeyPoint> {
        (0..self.count)
            .map(|i| KeyPoint::new(i as f32, 0.0, i as f32))
            .collect()
    }

    fn compute(&self, _image: &GrayImage, keypoints: &[KeyPoint]) -> Descriptors {
        let mut out = Descriptors::with_width(PATCH_WIDTH);
        for kp in keypoints {
            out.push(&[kp.response + 1.0; PATCH_WIDTH]);
        }
        out
    }
}

/// Keypoint extractor that reports as many keypoints as the image's top-left
/// gray level divided by 10. A black image is an extraction miss.
pub struct BrightnessDetector;

impl KeypointDetector for BrightnessDetector {
    fn name(&self) -> &'static str {
        "brightness"
    }

    fn detect(&self, image: &GrayImage) -> Vec<KeyPoint> {
        let count = image.get_pixel(0, 0)[0] as usize / 10;
        (0..count)
            .map(|i| KeyPoint::new(0.0, 0.0, i as f32))
            .collect()
    }

    fn compute(&self, image: &GrayImage, keypoints: &[KeyPoint]) -> Descriptors {
        let level = image.get_pixel(0, 0)[0] as f32;
        let mut out = Descriptors::with_width(PATCH_WIDTH);
        for _ in keypoints {
            out.push(&[level; PATCH_WIDTH]);
        }
        out
    }
}

pub fn brightness_extractor(vector_size: usize) -> Extractor {
    Extractor::Keypoint(KeypointExtractor::new(
        Box::new(BrightnessDetector),
        vector_size,
        16,
        16,
    ))
}

/// Uniform gray image.
pub fn flat(side: u32, level: u8) -> DynamicImage {
    DynamicImage::ImageLuma8(GrayImage::from_pixel(side, side, Luma([level])))
}

/// Dark background with a bright square covering the middle third.
pub fn bright_square(side: u32) -> DynamicImage {
    let lo = side / 3;
    let hi = 2 * side / 3;
    let img = GrayImage::from_fn(side, side, |x, y| {
        if (lo..hi).contains(&x) && (lo..hi).contains(&y) {
            Luma([220])
        } else {
            Luma([20])
        }
    });
    DynamicImage::ImageLuma8(img)
}

/// `width × height` dark image with a bright square centred on it, side a
/// third of the shorter edge.
pub fn centered_square(width: u32, height: u32) -> DynamicImage {
    let side = width.min(height) / 3;
    let (x0, y0) = ((width - side) / 2, (height - side) / 2);
    let img = GrayImage::from_fn(width, height, |x, y| {
        if (x0..x0 + side).contains(&x) && (y0..y0 + side).contains(&y) {
            Luma([220])
        } else {
            Luma([20])
        }
    });
    DynamicImage::ImageLuma8(img)
}

/// Solid color RGB image.
pub fn solid(width: u32, height: u32, color: [u8; 3]) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(color)))
}

/// Save `image` as PNG under `dir` and return its path.
pub fn write_png(dir: &Path, name: &str, image: &DynamicImage) -> PathBuf {
    let path = dir.join(format!("{}.png", name));
    image.save(&path).unwrap();
    path
}
