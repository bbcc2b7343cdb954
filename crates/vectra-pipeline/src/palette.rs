//! Palette extraction by K-Means clustering in RGB space.
//!
//! # Algorithm
//!
//! 1. Place `n` centroids evenly around a fixed mid-gray reference point:
//!    angularly in the chroma plane (perpendicular to the gray axis) and
//!    ramped along the gray axis from dark to light. Deterministic and
//!    never produces duplicate starting points.
//! 2. Each round, assign every sample to its nearest centroid (Euclidean
//!    RGB distance, ties to the lower index) and move each centroid to the
//!    mean of its samples. Centroids with no samples stay where they are.
//! 3. Stop after [`MAX_ITERATIONS`] rounds or once the summed centroid
//!    displacement of a round drops below [`CONVERGENCE_THRESHOLD`].
//!
//! The assignment step is split into fixed-size partitions processed on
//! the rayon pool. Each partition produces integer partial sums that are
//! combined serially in partition order, so results do not depend on
//! thread scheduling.
//!
//! The output always holds exactly `n` colors. Collapsed clusters keep
//! their last position and may look like duplicates; callers decide what
//! to do with them (see `population`).

use std::f64::consts::TAU;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::types::RgbImage;

/// Round cap; guarantees termination without convergence.
pub const MAX_ITERATIONS: usize = 50;

/// Summed centroid displacement (0-255 units) below which a round counts
/// as converged.
pub const CONVERGENCE_THRESHOLD: f64 = 1.0;

/// Reference point the initial centroids are spread around.
pub const REFERENCE: [f64; 3] = [128.0, 128.0, 128.0];

/// Radius of the initial centroid ring in the chroma plane.
pub const CHROMA_RADIUS: f64 = 96.0;

/// Distance along the gray axis between the darkest and lightest initial
/// centroid.
pub const LIGHTNESS_SPAN: f64 = 128.0;

/// Samples per assignment partition.
const PARTITION_PIXELS: usize = 16 * 1024;

/// One representative color of the quantized image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaletteColor {
    /// Stable index, matching centroid order (0..n-1).
    pub index: usize,
    /// Red, green, blue.
    pub rgb: [u8; 3],
    /// `#rrggbb`.
    pub hex: String,
    /// Samples assigned to this color in the final round.
    pub population: usize,
}

impl PaletteColor {
    /// Create a palette entry, deriving its hex string.
    #[must_use]
    pub fn new(index: usize, rgb: [u8; 3], population: usize) -> Self {
        Self {
            index,
            rgb,
            hex: to_hex(rgb),
            population,
        }
    }

    /// Perceptual luminance `0.299 R + 0.587 G + 0.114 B`, in 0-255 units.
    #[must_use]
    pub fn luminance(&self) -> f64 {
        let [r, g, b] = self.rgb.map(f64::from);
        0.114f64.mul_add(b, 0.299f64.mul_add(r, 0.587 * g))
    }
}

/// Format an RGB triple as `#rrggbb`.
#[must_use]
pub fn to_hex([r, g, b]: [u8; 3]) -> String {
    format!("#{r:02x}{g:02x}{b:02x}")
}

/// Result of palette extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Palette {
    /// Exactly `n` colors, in centroid order.
    pub colors: Vec<PaletteColor>,
    /// Rounds executed.
    pub iterations: usize,
    /// Whether the displacement threshold was reached before the cap.
    pub converged: bool,
    /// Number of samples clustered.
    pub samples: usize,
}

/// Deterministic initial centroids for `n` clusters.
#[must_use]
pub fn initial_centroids(n: usize) -> Vec<[f64; 3]> {
    let u = [
        std::f64::consts::FRAC_1_SQRT_2,
        -std::f64::consts::FRAC_1_SQRT_2,
        0.0,
    ];
    let inv_sqrt6 = 1.0 / 6.0f64.sqrt();
    let v = [inv_sqrt6, inv_sqrt6, -2.0 * inv_sqrt6];
    let w = [1.0 / 3.0f64.sqrt(); 3];

    (0..n)
        .map(|i| {
            #[allow(clippy::cast_precision_loss)]
            let (theta, t) = (
                TAU * i as f64 / n as f64,
                if n > 1 {
                    i as f64 / (n - 1) as f64
                } else {
                    0.5
                },
            );
            let (sin, cos) = theta.sin_cos();
            let lift = LIGHTNESS_SPAN * (t - 0.5);
            std::array::from_fn(|c| {
                let chroma = CHROMA_RADIUS * cos.mul_add(u[c], sin * v[c]);
                lift.mul_add(w[c], REFERENCE[c] + chroma).clamp(0.0, 255.0)
            })
        })
        .collect()
}

/// Cluster the pixels of `image` into exactly `n` colors.
///
/// `n` is clamped to at least 1.
#[must_use]
pub fn extract_palette(image: &RgbImage, n: usize) -> Palette {
    let n = n.max(1);
    let raw = image.as_raw();
    let samples = raw.len() / 3;
    let mut centroids = initial_centroids(n);
    let mut counts = vec![0u64; n];
    let mut iterations = 0;
    let mut converged = false;

    while iterations < MAX_ITERATIONS {
        iterations += 1;
        let partials: Vec<Partial> = raw
            .par_chunks(PARTITION_PIXELS * 3)
            .map(|chunk| assign_partition(chunk, &centroids))
            .collect();

        let mut total = Partial::new(n);
        for partial in &partials {
            total.absorb(partial);
        }

        let mut displacement = 0.0;
        for (centroid, (sum, &count)) in centroids.iter_mut().zip(total.sums.iter().zip(&total.counts)) {
            if count == 0 {
                continue;
            }
            #[allow(clippy::cast_precision_loss)]
            let next: [f64; 3] = std::array::from_fn(|c| sum[c] as f64 / count as f64);
            displacement += distance(*centroid, next);
            *centroid = next;
        }
        counts = total.counts;

        if displacement < CONVERGENCE_THRESHOLD {
            converged = true;
            break;
        }
    }

    log::debug!(
        "k-means: {n} colors over {samples} samples, {iterations} rounds (converged: {converged})"
    );

    let colors = centroids
        .iter()
        .zip(&counts)
        .enumerate()
        .map(|(index, (centroid, &count))| {
            let population = usize::try_from(count).unwrap_or(usize::MAX);
            PaletteColor::new(index, centroid.map(round_channel), population)
        })
        .collect();

    Palette {
        colors,
        iterations,
        converged,
        samples,
    }
}

/// Per-partition sums for the centroid update.
struct Partial {
    sums: Vec<[u64; 3]>,
    counts: Vec<u64>,
}

impl Partial {
    fn new(n: usize) -> Self {
        Self {
            sums: vec![[0; 3]; n],
            counts: vec![0; n],
        }
    }

    fn absorb(&mut self, other: &Self) {
        for (sum, add) in self.sums.iter_mut().zip(&other.sums) {
            for c in 0..3 {
                sum[c] += add[c];
            }
        }
        for (count, add) in self.counts.iter_mut().zip(&other.counts) {
            *count += add;
        }
    }
}

fn assign_partition(chunk: &[u8], centroids: &[[f64; 3]]) -> Partial {
    let mut partial = Partial::new(centroids.len());
    for px in chunk.chunks_exact(3) {
        let sample = [px[0], px[1], px[2]].map(f64::from);
        let nearest = nearest_centroid(sample, centroids);
        for c in 0..3 {
            partial.sums[nearest][c] += u64::from(px[c]);
        }
        partial.counts[nearest] += 1;
    }
    partial
}

/// Index of the centroid nearest to `sample`; ties go to the lower index.
#[must_use]
pub fn nearest_centroid(sample: [f64; 3], centroids: &[[f64; 3]]) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (i, centroid) in centroids.iter().enumerate() {
        let d = distance_squared(sample, *centroid);
        if d < best_dist {
            best_dist = d;
            best = i;
        }
    }
    best
}

fn distance_squared(a: [f64; 3], b: [f64; 3]) -> f64 {
    let d = [a[0] - b[0], a[1] - b[1], a[2] - b[2]];
    d[2].mul_add(d[2], d[0].mul_add(d[0], d[1] * d[1]))
}

fn distance(a: [f64; 3], b: [f64; 3]) -> f64 {
    distance_squared(a, b).sqrt()
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn round_channel(v: f64) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checkerboard(size: u32, cell: u32) -> RgbImage {
        RgbImage::from_fn(size, size, |x, y| {
            if (x / cell + y / cell) % 2 == 0 {
                image::Rgb([0, 0, 0])
            } else {
                image::Rgb([255, 255, 255])
            }
        })
    }

    #[test]
    fn hex_is_lowercase_six_digits() {
        assert_eq!(to_hex([255, 0, 16]), "#ff0010");
        assert_eq!(PaletteColor::new(0, [1, 2, 3], 0).hex, "#010203");
    }

    #[test]
    fn initial_centroids_are_distinct_and_in_range() {
        for n in 1..=16 {
            let centroids = initial_centroids(n);
            assert_eq!(centroids.len(), n);
            for (i, a) in centroids.iter().enumerate() {
                assert!(a.iter().all(|c| (0.0..=255.0).contains(c)));
                for b in &centroids[i + 1..] {
                    assert!(distance(*a, *b) > 1.0, "duplicate start for n={n}");
                }
            }
        }
    }

    #[test]
    fn initial_centroids_ramp_from_dark_to_light() {
        let centroids = initial_centroids(2);
        let sum = |c: [f64; 3]| c.iter().sum::<f64>();
        assert!(sum(centroids[0]) < sum(centroids[1]));
    }

    #[test]
    fn checkerboard_separates_into_black_and_white() {
        let palette = extract_palette(&checkerboard(64, 16), 2);
        assert_eq!(palette.colors.len(), 2);
        assert!(palette.converged);
        assert_eq!(palette.colors[0].rgb, [0, 0, 0]);
        assert_eq!(palette.colors[1].rgb, [255, 255, 255]);
        assert_eq!(palette.colors[0].population, 64 * 64 / 2);
        assert_eq!(palette.colors[1].population, 64 * 64 / 2);
        assert_eq!(palette.samples, 64 * 64);
    }

    #[test]
    fn single_color_input_still_yields_n_colors() {
        let img = RgbImage::from_pixel(20, 20, image::Rgb([30, 90, 200]));
        let palette = extract_palette(&img, 5);
        assert_eq!(palette.colors.len(), 5);
        let populated: Vec<_> = palette.colors.iter().filter(|c| c.population > 0).collect();
        assert_eq!(populated.len(), 1);
        assert_eq!(populated[0].rgb, [30, 90, 200]);
        assert_eq!(populated[0].population, 400);
    }

    #[test]
    fn indices_are_stable_and_unique() {
        let palette = extract_palette(&checkerboard(32, 4), 6);
        let indices: Vec<usize> = palette.colors.iter().map(|c| c.index).collect();
        assert_eq!(indices, (0..6).collect::<Vec<_>>());
    }

    #[test]
    fn iterations_are_capped() {
        #[allow(clippy::cast_possible_truncation)]
        let img = RgbImage::from_fn(64, 64, |x, y| {
            image::Rgb([(x * 4) as u8, (y * 4) as u8, ((x * y) % 256) as u8])
        });
        let palette = extract_palette(&img, 16);
        assert!(palette.iterations <= MAX_ITERATIONS);
        assert_eq!(palette.colors.len(), 16);
    }

    #[test]
    fn zero_colors_is_clamped_to_one() {
        let img = RgbImage::from_pixel(4, 4, image::Rgb([9, 9, 9]));
        let palette = extract_palette(&img, 0);
        assert_eq!(palette.colors.len(), 1);
        assert_eq!(palette.colors[0].rgb, [9, 9, 9]);
    }

    #[test]
    fn nearest_centroid_prefers_lower_index_on_tie() {
        let centroids = [[0.0, 0.0, 0.0], [2.0, 0.0, 0.0]];
        assert_eq!(nearest_centroid([1.0, 0.0, 0.0], &centroids), 0);
    }

    #[test]
    fn luminance_orders_white_above_black() {
        let white = PaletteColor::new(0, [255, 255, 255], 1);
        let black = PaletteColor::new(1, [0, 0, 0], 1);
        assert!(white.luminance() > black.luminance());
        assert!((white.luminance() - 255.0).abs() < 1e-9);
    }

    #[test]
    fn partitioned_sums_match_large_images() {
        // Larger than one partition so the serial reduction is exercised.
        let img = checkerboard(200, 10);
        let palette = extract_palette(&img, 2);
        assert_eq!(palette.colors[0].population + palette.colors[1].population, 40_000);
        assert_eq!(palette.colors[0].rgb, [0, 0, 0]);
    }
}
