//! Image classification: estimate color cardinality and contrast, then
//! pick a preset.
//!
//! The classifier visits a bounded sample of pixels (a fixed stride in
//! both axes) and measures:
//!
//! - **distinct colors**: the number of occupied coarse color buckets
//!   (each channel split into [`BUCKET_WIDTH`]-wide bins), after trimming
//!   the sparsest buckets that together hold at most [`FRINGE_PERMILLE`]
//!   of the samples,
//! - **average contrast**: the mean absolute luma difference between each
//!   sample and its right/lower neighbor, normalized to `[0, 1]`,
//! - **complexity ratio**: the share of all buckets counted as distinct.
//!
//! Preset selection is a pure function of the resulting
//! [`Classification`] ([`resolve_preset`]), so the threshold rules can be
//! tested without pixels.

use serde::{Deserialize, Serialize};

use crate::preset::Preset;
use crate::types::RgbImage;

/// Upper bound on the number of sampled pixels.
pub const MAX_SAMPLES: u64 = 40_000;

/// Width of a coarse color bucket per channel (8 levels per channel).
pub const BUCKET_WIDTH: u8 = 32;

/// Samples (per thousand) that the sparsest buckets may hold and still
/// be trimmed as anti-aliasing fringe. At least the remaining share is
/// always kept, so a well-spread histogram keeps nearly every bucket.
pub const FRINGE_PERMILLE: u64 = 10;

/// At most this many distinct colors for the logo rule.
pub const LOGO_MAX_COLORS: usize = 8;
/// Minimum average contrast for the logo rule.
pub const LOGO_MIN_CONTRAST: f64 = 0.04;
/// Below this average contrast the image reads as a soft photograph.
pub const LOW_CONTRAST: f64 = 0.015;
/// Complexity ratio (bucket share) above which an image is treated as a
/// detailed photo.
pub const HIGH_COMPLEXITY: f64 = 0.25;
/// At most this many distinct colors for the illustration rule.
pub const ILLUSTRATION_MAX_COLORS: usize = 16;

const BUCKETS_PER_CHANNEL: usize = 256 / BUCKET_WIDTH as usize;
const BUCKET_COUNT: usize = BUCKETS_PER_CHANNEL.pow(3);

/// Content category inferred from the pixel statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImageClass {
    /// Few flat colors with hard edges (or a near-flat image).
    FewColorLogo,
    /// Moderate palette, flat fills.
    Illustration,
    /// Soft, low-contrast content.
    LowFidelityPhoto,
    /// Many colors and fine detail.
    HighFidelityPhoto,
    /// None of the rules matched.
    Inconclusive,
}

/// Summary of the classifier's measurements.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    /// Number of visually distinct coarse colors.
    pub distinct_colors: usize,
    /// Mean absolute neighbor luma difference, in `[0, 1]`.
    pub average_contrast: f64,
    /// Share of coarse color buckets counted as distinct, in `[0, 1]`.
    pub complexity_ratio: f64,
    /// Number of pixels actually sampled.
    pub samples: u64,
    /// Inferred content category.
    pub class: ImageClass,
}

impl Classification {
    /// Name of the preset this classification recommends.
    #[must_use]
    pub const fn recommended_preset(&self) -> &'static str {
        match self.class {
            ImageClass::FewColorLogo => "few-color-logo",
            ImageClass::Illustration => "16-colors",
            ImageClass::LowFidelityPhoto => "low-fidelity-photo",
            ImageClass::HighFidelityPhoto => "high-fidelity-photo",
            ImageClass::Inconclusive => crate::preset::AUTO,
        }
    }
}

/// Sampling stride so that at most [`MAX_SAMPLES`] pixels are visited.
#[must_use]
pub fn sample_stride(width: u32, height: u32) -> u32 {
    let pixels = u64::from(width) * u64::from(height);
    let mut stride = 1u32;
    while pixels / (u64::from(stride) * u64::from(stride)) > MAX_SAMPLES {
        stride += 1;
    }
    stride
}

/// Classify an image. Never fails; an image too small to measure
/// contrast simply reports zero contrast.
#[must_use]
pub fn classify(image: &RgbImage) -> Classification {
    let (width, height) = image.dimensions();
    let stride = sample_stride(width, height);

    let mut buckets = vec![0u32; BUCKET_COUNT];
    let mut samples = 0u64;
    let mut contrast_sum = 0.0f64;
    let mut contrast_pairs = 0u64;

    for y in (0..height).step_by(stride as usize) {
        for x in (0..width).step_by(stride as usize) {
            let px = image.get_pixel(x, y).0;
            buckets[bucket_index(px)] += 1;
            samples += 1;

            let here = luma(px);
            if x + 1 < width {
                contrast_sum += (here - luma(image.get_pixel(x + 1, y).0)).abs();
                contrast_pairs += 1;
            }
            if y + 1 < height {
                contrast_sum += (here - luma(image.get_pixel(x, y + 1).0)).abs();
                contrast_pairs += 1;
            }
        }
    }

    let distinct_colors = distinct_buckets(&buckets, samples);

    #[allow(clippy::cast_precision_loss)]
    let average_contrast = if contrast_pairs == 0 {
        0.0
    } else {
        contrast_sum / contrast_pairs as f64 / 255.0
    };
    #[allow(clippy::cast_precision_loss)]
    let complexity_ratio = distinct_colors as f64 / BUCKET_COUNT as f64;

    let class = infer_class(distinct_colors, average_contrast, complexity_ratio);
    log::debug!(
        "classified {width}x{height} (stride {stride}): {distinct_colors} colors, \
         contrast {average_contrast:.4}, complexity {complexity_ratio:.4} -> {class:?}"
    );

    Classification {
        distinct_colors,
        average_contrast,
        complexity_ratio,
        samples,
        class,
    }
}

/// Threshold rules mapping measurements to a content category.
#[must_use]
pub fn infer_class(distinct_colors: usize, average_contrast: f64, complexity_ratio: f64) -> ImageClass {
    if distinct_colors <= LOGO_MAX_COLORS
        && (average_contrast >= LOGO_MIN_CONTRAST || distinct_colors <= 2)
    {
        ImageClass::FewColorLogo
    } else if average_contrast < LOW_CONTRAST {
        ImageClass::LowFidelityPhoto
    } else if complexity_ratio >= HIGH_COMPLEXITY {
        ImageClass::HighFidelityPhoto
    } else if distinct_colors <= ILLUSTRATION_MAX_COLORS {
        ImageClass::Illustration
    } else {
        ImageClass::Inconclusive
    }
}

/// Map a classification to a concrete preset.
///
/// Pure: the same classification always yields the same preset.
#[must_use]
pub fn resolve_preset(classification: &Classification) -> Preset {
    Preset::named(classification.recommended_preset()).unwrap_or_else(|_| Preset::automatic())
}

/// Occupied buckets minus the sparse fringe; at least 1.
fn distinct_buckets(buckets: &[u32], samples: u64) -> usize {
    let mut occupied: Vec<u64> = buckets
        .iter()
        .filter(|&&count| count > 0)
        .map(|&count| u64::from(count))
        .collect();
    occupied.sort_unstable();

    let budget = samples * FRINGE_PERMILLE / 1000;
    let mut trimmed = 0u64;
    let fringe = occupied
        .iter()
        .take_while(|&&count| {
            trimmed += count;
            trimmed <= budget
        })
        .count();
    (occupied.len() - fringe).max(1)
}

fn bucket_index([r, g, b]: [u8; 3]) -> usize {
    let bin = |c: u8| usize::from(c / BUCKET_WIDTH);
    (bin(r) * BUCKETS_PER_CHANNEL + bin(g)) * BUCKETS_PER_CHANNEL + bin(b)
}

fn luma([r, g, b]: [u8; 3]) -> f64 {
    0.114f64.mul_add(
        f64::from(b),
        0.299f64.mul_add(f64::from(r), 0.587 * f64::from(g)),
    )
}
