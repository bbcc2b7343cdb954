//! Downsampling to a bounded working resolution for palette extraction.
//!
//! K-Means cost is linear in the number of samples per round, so the
//! palette extractor works on a copy whose longest axis is at most the
//! preset's `working_resolution`. Nearest-neighbor resampling is used so
//! the reduced image only contains colors that exist in the source;
//! interpolating filters would invent blended colors along every edge and
//! pull centroids toward them.
//!
//! If the image is already at or below the target resolution, it is
//! returned unchanged.

use image::imageops::FilterType;

use crate::types::RgbImage;

/// Downsample `image` so its longest axis is at most `max_dimension`
/// pixels, preserving aspect ratio.
///
/// Returns the (possibly unchanged) image and whether downsampling was
/// actually applied.
#[must_use]
pub fn downsample(image: &RgbImage, max_dimension: u32) -> (RgbImage, bool) {
    let (w, h) = image.dimensions();
    let long_axis = w.max(h);
    if long_axis <= max_dimension || max_dimension == 0 {
        return (image.clone(), false);
    }

    let scale = f64::from(max_dimension) / f64::from(long_axis);
    let target = |side: u32| -> u32 {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let scaled = (f64::from(side) * scale).round() as u32;
        scaled.clamp(1, max_dimension)
    };
    let resized = image::imageops::resize(image, target(w), target(h), FilterType::Nearest);
    (resized, true)
}
