//! Per-color binary membership masks.
//!
//! A pixel belongs to a palette color when its perceptual distance to that
//! color is within the effective tolerance. The tolerance widens near
//! strong edges (up to `1 + EDGE_TOLERANCE_GAIN` times the base value) so
//! anti-aliased boundary pixels are claimed by a neighboring region
//! instead of falling through every mask.

use rayon::prelude::*;

use crate::edges::EdgeMap;
use crate::palette::PaletteColor;
use crate::types::{GrayImage, RgbImage};

/// Coverage fraction below which a color is treated as negligible.
pub const MIN_COVERAGE: f64 = 0.001;

/// Extra tolerance at full edge strength, as a fraction of the base.
pub const EDGE_TOLERANCE_GAIN: f64 = 0.5;

/// Mask value for member pixels.
pub const ON: u8 = 255;

/// Images with at least this many pixels are masked on the rayon pool.
const PARALLEL_PIXEL_THRESHOLD: usize = 32 * 1024;

/// Weighted RGB distance `sqrt(0.30 dR² + 0.59 dG² + 0.11 dB²)`.
///
/// Weights follow luma sensitivity, so a green shift counts for more
/// than the same shift in blue.
#[must_use]
pub fn perceptual_distance(a: [u8; 3], b: [u8; 3]) -> f64 {
    let d = |i: usize| f64::from(a[i]) - f64::from(b[i]);
    let (dr, dg, db) = (d(0), d(1), d(2));
    (0.11 * db).mul_add(db, (0.30 * dr).mul_add(dr, 0.59 * dg * dg)).sqrt()
}

/// Tolerance after the edge adjustment.
#[must_use]
pub fn effective_tolerance(base: f64, edge_strength: f32) -> f64 {
    base * EDGE_TOLERANCE_GAIN.mul_add(f64::from(edge_strength.clamp(0.0, 1.0)), 1.0)
}

/// A binary mask for one palette color.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorMask {
    /// 0 or [`ON`] per pixel, same dimensions as the source image.
    pub mask: GrayImage,
    /// Number of [`ON`] pixels.
    pub on_pixels: u64,
    /// `on_pixels` over total pixels, in `[0, 1]`.
    pub coverage: f64,
}

impl ColorMask {
    /// Whether the mask covers less than [`MIN_COVERAGE`] of the image.
    #[must_use]
    pub fn is_negligible(&self) -> bool {
        self.coverage < MIN_COVERAGE
    }
}

/// Build the membership mask of `color` over `image`.
///
/// `edges` should match the image dimensions; pixels it does not cover
/// are treated as edge-free.
#[must_use = "returns the color mask"]
pub fn build_mask(
    image: &RgbImage,
    color: &PaletteColor,
    edges: &EdgeMap,
    tolerance: f64,
) -> ColorMask {
    let (width, height) = image.dimensions();
    let mut mask = GrayImage::new(width, height);
    let len = width as usize * height as usize;
    if len == 0 {
        return ColorMask {
            mask,
            on_pixels: 0,
            coverage: 0.0,
        };
    }

    let raw = image.as_raw();
    let row_len = width as usize;
    let fill_row = |(y, row): (usize, &mut [u8])| -> u64 {
        let source = &raw[y * row_len * 3..(y + 1) * row_len * 3];
        let mut on = 0;
        for (x, (out, px)) in row.iter_mut().zip(source.chunks_exact(3)).enumerate() {
            #[allow(clippy::cast_possible_truncation)]
            let edge = edges.get(x as u32, y as u32);
            let distance = perceptual_distance([px[0], px[1], px[2]], color.rgb);
            if distance <= effective_tolerance(tolerance, edge) {
                *out = ON;
                on += 1;
            }
        }
        on
    };

    let buffer: &mut [u8] = &mut mask;
    let on_pixels: u64 = if len >= PARALLEL_PIXEL_THRESHOLD {
        buffer
            .par_chunks_mut(row_len)
            .enumerate()
            .map(fill_row)
            .sum()
    } else {
        buffer.chunks_mut(row_len).enumerate().map(fill_row).sum()
    };

    #[allow(clippy::cast_precision_loss)]
    let coverage = on_pixels as f64 / len as f64;
    ColorMask {
        mask,
        on_pixels,
        coverage,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edges::detect_edges;
    use crate::types::Dimensions;

    fn color(rgb: [u8; 3]) -> PaletteColor {
        PaletteColor::new(0, rgb, 1)
    }

    fn flat_edges(width: u32, height: u32) -> EdgeMap {
        EdgeMap::flat(Dimensions { width, height })
    }

    fn halves(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, _| {
            if x < width / 2 {
                image::Rgb([20, 40, 200])
            } else {
                image::Rgb([240, 240, 240])
            }
        })
    }

    #[test]
    fn distance_is_symmetric_and_weighted() {
        let a = [10, 20, 30];
        let b = [60, 20, 30];
        assert!((perceptual_distance(a, b) - perceptual_distance(b, a)).abs() < 1e-12);
        assert!(perceptual_distance(a, a).abs() < 1e-12);
        let green = perceptual_distance([0, 0, 0], [0, 100, 0]);
        let blue = perceptual_distance([0, 0, 0], [0, 0, 100]);
        assert!(green > blue);
        assert!((perceptual_distance([0, 0, 0], [255, 255, 255]) - 255.0).abs() < 1e-9);
    }

    #[test]
    fn edge_strength_widens_tolerance_up_to_half() {
        assert!((effective_tolerance(40.0, 0.0) - 40.0).abs() < 1e-12);
        assert!((effective_tolerance(40.0, 1.0) - 60.0).abs() < 1e-12);
        assert!((effective_tolerance(40.0, 7.0) - 60.0).abs() < 1e-12);
    }

    #[test]
    fn mask_matches_image_dimensions_and_is_binary() {
        let img = halves(30, 11);
        let m = build_mask(&img, &color([20, 40, 200]), &detect_edges(&img), 20.0);
        assert_eq!(m.mask.dimensions(), (30, 11));
        assert!(m.mask.pixels().all(|p| p.0[0] == 0 || p.0[0] == ON));
    }

    #[test]
    fn mask_selects_matching_half() {
        let img = halves(40, 10);
        let m = build_mask(&img, &color([20, 40, 200]), &flat_edges(40, 10), 20.0);
        assert_eq!(m.on_pixels, 200);
        assert!((m.coverage - 0.5).abs() < 1e-12);
        assert_eq!(m.mask.get_pixel(0, 0).0[0], ON);
        assert_eq!(m.mask.get_pixel(39, 9).0[0], 0);
    }

    #[test]
    fn absent_color_is_negligible() {
        let img = halves(40, 10);
        let m = build_mask(&img, &color([255, 0, 0]), &flat_edges(40, 10), 10.0);
        assert_eq!(m.on_pixels, 0);
        assert!(m.is_negligible());
    }

    #[test]
    fn edges_pull_in_boundary_pixels() {
        // A pixel at distance between the base and widened tolerance is
        // only claimed when the edge map is strong there.
        let img = RgbImage::from_pixel(5, 5, image::Rgb([100, 100, 100]));
        let target = color([100, 130, 100]);
        let d = perceptual_distance([100, 100, 100], target.rgb);
        let base = d / 1.25;
        let without = build_mask(&img, &target, &flat_edges(5, 5), base);
        assert_eq!(without.on_pixels, 0);

        let strong = EdgeMap::uniform(
            Dimensions {
                width: 5,
                height: 5,
            },
            1.0,
        );
        let with = build_mask(&img, &target, &strong, base);
        assert_eq!(with.on_pixels, 25);
    }

    #[test]
    fn parallel_path_matches_serial_result() {
        let big = halves(256, 200);
        let m = build_mask(&big, &color([240, 240, 240]), &flat_edges(256, 200), 15.0);
        assert_eq!(m.on_pixels, 128 * 200);
        let small = halves(256, 20);
        let s = build_mask(&small, &color([240, 240, 240]), &flat_edges(256, 20), 15.0);
        assert_eq!(s.on_pixels, 128 * 20);
    }

    #[test]
    fn coverage_grows_with_tolerance() {
        #[allow(clippy::cast_possible_truncation)]
        let img = RgbImage::from_fn(32, 32, |x, y| image::Rgb([(x * 8) as u8, (y * 8) as u8, 90]));
        let edges = detect_edges(&img);
        let target = color([128, 128, 90]);
        let mut previous = 0;
        for tolerance in [5.0, 10.0, 20.0, 40.0, 80.0, 160.0] {
            let m = build_mask(&img, &target, &edges, tolerance);
            assert!(m.on_pixels >= previous);
            previous = m.on_pixels;
        }
    }
}
