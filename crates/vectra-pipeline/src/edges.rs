//! Sobel edge-strength map.
//!
//! Produces a dense per-pixel gradient magnitude in `[0, 1]`, used only by
//! the color mask builder to relax its tolerance near strong edges. The
//! magnitude is normalized by the largest value a 3×3 Sobel operator can
//! produce on 8-bit input, so strengths are comparable across images. The
//! outermost pixel ring is always zero.

use image::Luma;
use imageproc::definitions::Image;
use imageproc::filter::filter_clamped;
use imageproc::kernel;

use crate::types::{Dimensions, RgbImage};

/// Largest possible Sobel gradient magnitude on 8-bit input:
/// `hypot(4 * 255, 4 * 255)`.
pub const MAX_SOBEL_MAGNITUDE: f32 = 1442.498_4;

/// Dense edge-strength map, one `f32` in `[0, 1]` per pixel (row-major).
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeMap {
    width: u32,
    height: u32,
    strength: Vec<f32>,
}

impl EdgeMap {
    /// A map with zero strength everywhere.
    #[must_use]
    pub fn flat(dimensions: Dimensions) -> Self {
        Self::uniform(dimensions, 0.0)
    }

    /// A map with the same strength (clamped to `[0, 1]`) everywhere.
    #[must_use]
    pub fn uniform(dimensions: Dimensions, strength: f32) -> Self {
        let len = dimensions.width as usize * dimensions.height as usize;
        Self {
            width: dimensions.width,
            height: dimensions.height,
            strength: vec![strength.clamp(0.0, 1.0); len],
        }
    }

    /// Map dimensions.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        Dimensions {
            width: self.width,
            height: self.height,
        }
    }

    /// Edge strength at `(x, y)`; zero outside the map.
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> f32 {
        if x >= self.width || y >= self.height {
            return 0.0;
        }
        self.strength[y as usize * self.width as usize + x as usize]
    }

    /// Row-major strengths.
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.strength
    }

    /// Mean strength over all pixels.
    #[must_use]
    pub fn mean(&self) -> f32 {
        if self.strength.is_empty() {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let len = self.strength.len() as f32;
        self.strength.iter().sum::<f32>() / len
    }

    /// Render as an 8-bit grayscale image (for previews and debugging).
    #[must_use]
    pub fn to_gray(&self) -> image::GrayImage {
        image::GrayImage::from_fn(self.width, self.height, |x, y| {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let v = (self.get(x, y) * 255.0).round().clamp(0.0, 255.0) as u8;
            Luma([v])
        })
    }
}

/// Compute the normalized Sobel edge map of `image`.
#[must_use = "returns the edge map"]
pub fn detect_edges(image: &RgbImage) -> EdgeMap {
    let (width, height) = image.dimensions();
    let gray = image::imageops::grayscale(image);
    let gx: Image<Luma<i16>> = filter_clamped(&gray, kernel::SOBEL_HORIZONTAL_3X3);
    let gy: Image<Luma<i16>> = filter_clamped(&gray, kernel::SOBEL_VERTICAL_3X3);

    let mut strength = vec![0.0f32; width as usize * height as usize];
    if width >= 3 && height >= 3 {
        for y in 1..height - 1 {
            for x in 1..width - 1 {
                let h = f32::from(gx.get_pixel(x, y).0[0]);
                let v = f32::from(gy.get_pixel(x, y).0[0]);
                strength[y as usize * width as usize + x as usize] =
                    (h.hypot(v) / MAX_SOBEL_MAGNITUDE).clamp(0.0, 1.0);
            }
        }
    }

    let map = EdgeMap {
        width,
        height,
        strength,
    };
    log::debug!("edge map {width}x{height}: mean strength {:.4}", map.mean());
    map
}
