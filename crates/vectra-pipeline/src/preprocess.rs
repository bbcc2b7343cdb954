//! Gamma/contrast normalization and optional noise suppression.
//!
//! Color adjustments happen in linear light: each channel is decoded with
//! a fixed [`GAMMA`] exponent, adjusted according to the preset's
//! [`ColorMode`], then re-encoded. Photographic presets additionally get
//! a small Gaussian blur followed by an unsharp-mask sharpen, which
//! suppresses sensor noise while keeping region boundaries crisp.
//!
//! Every function here returns a new image of unchanged dimensions.

use image::GrayImage;

use crate::preset::{ColorMode, Preset};
use crate::types::RgbImage;

/// Fixed gamma exponent for linearization.
pub const GAMMA: f32 = 2.2;

/// Brightness multiplier (linear light) for full-color mode.
pub const FULL_COLOR_BRIGHTNESS: f32 = 1.02;
/// Saturation multiplier for full-color mode.
pub const FULL_COLOR_SATURATION: f32 = 1.10;
/// Brightness multiplier (linear light) for grayscale mode.
pub const GRAYSCALE_BRIGHTNESS: f32 = 1.05;

/// Blur sigma for photographic noise suppression.
pub const DENOISE_SIGMA: f32 = 1.0;
/// Unsharp-mask sigma.
pub const SHARPEN_SIGMA: f32 = 1.0;
/// Unsharp-mask strength.
pub const SHARPEN_AMOUNT: f32 = 0.6;

/// Run the preprocessing stage for `preset`.
#[must_use = "returns the preprocessed image"]
pub fn preprocess(image: &RgbImage, preset: &Preset) -> RgbImage {
    let adjusted = match preset.mode {
        ColorMode::FullColor => adjust_color(image, FULL_COLOR_BRIGHTNESS, FULL_COLOR_SATURATION),
        ColorMode::Grayscale => desaturate(image, GRAYSCALE_BRIGHTNESS),
        ColorMode::TwoTone => two_tone_gray(image),
    };
    if preset.photographic {
        let smooth = gaussian_blur_rgb(&adjusted, DENOISE_SIGMA);
        unsharp_mask(&smooth, SHARPEN_SIGMA, SHARPEN_AMOUNT)
    } else {
        adjusted
    }
}

/// Linear-light brightness and saturation adjustment.
///
/// Saturation scales each channel's distance from the pixel's linear
/// luminance; brightness scales the result. Values clamp to `[0, 1]`.
#[must_use = "returns the adjusted image"]
pub fn adjust_color(image: &RgbImage, brightness: f32, saturation: f32) -> RgbImage {
    let lut = decode_lut();
    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b] = image.get_pixel(x, y).0.map(|c| lut[usize::from(c)]);
        let luminance = linear_luminance(r, g, b);
        let adjust = |c: f32| encode(saturation.mul_add(c - luminance, luminance) * brightness);
        image::Rgb([adjust(r), adjust(g), adjust(b)])
    })
}

/// Convert to gray levels (stored in all three channels) with a slight
/// brightness boost.
#[must_use = "returns the desaturated image"]
pub fn desaturate(image: &RgbImage, brightness: f32) -> RgbImage {
    let lut = decode_lut();
    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b] = image.get_pixel(x, y).0.map(|c| lut[usize::from(c)]);
        let v = encode(linear_luminance(r, g, b) * brightness);
        image::Rgb([v, v, v])
    })
}

/// Single-channel grayscale with a min/max histogram stretch, expanded
/// back to three equal channels.
#[must_use = "returns the normalized gray image"]
pub fn two_tone_gray(image: &RgbImage) -> RgbImage {
    let lut = decode_lut();
    let gray = GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b] = image.get_pixel(x, y).0.map(|c| lut[usize::from(c)]);
        image::Luma([encode(linear_luminance(r, g, b))])
    });
    let stretched = stretch_histogram(&gray);
    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let v = stretched.get_pixel(x, y).0[0];
        image::Rgb([v, v, v])
    })
}

/// Linearly map the darkest pixel to 0 and the brightest to 255.
///
/// A flat image (min == max) is returned unchanged.
#[must_use = "returns the stretched image"]
pub fn stretch_histogram(gray: &GrayImage) -> GrayImage {
    let (min, max) = gray
        .pixels()
        .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p.0[0]), hi.max(p.0[0])));
    if min >= max {
        return gray.clone();
    }
    let span = u32::from(max - min);
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let v = u32::from(gray.get_pixel(x, y).0[0] - min);
        let scaled = (v * 255 + span / 2) / span;
        image::Luma([u8::try_from(scaled).unwrap_or(u8::MAX)])
    })
}

/// Apply Gaussian blur to each channel of an RGB image independently.
///
/// Non-positive sigma values return the image unchanged, since
/// `imageproc`'s underlying function panics on `sigma <= 0.0`.
#[must_use = "returns the blurred image"]
pub fn gaussian_blur_rgb(image: &RgbImage, sigma: f32) -> RgbImage {
    if sigma <= 0.0 {
        return image.clone();
    }
    let (w, h) = image.dimensions();
    let blurred: [GrayImage; 3] = std::array::from_fn(|c| {
        let channel = GrayImage::from_fn(w, h, |x, y| image::Luma([image.get_pixel(x, y).0[c]]));
        imageproc::filter::gaussian_blur_f32(&channel, sigma)
    });
    RgbImage::from_fn(w, h, |x, y| {
        image::Rgb([
            blurred[0].get_pixel(x, y).0[0],
            blurred[1].get_pixel(x, y).0[0],
            blurred[2].get_pixel(x, y).0[0],
        ])
    })
}

/// Unsharp mask: `out = in + amount * (in - blur(in))`, clamped.
#[must_use = "returns the sharpened image"]
pub fn unsharp_mask(image: &RgbImage, sigma: f32, amount: f32) -> RgbImage {
    let blurred = gaussian_blur_rgb(image, sigma);
    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let orig = image.get_pixel(x, y).0;
        let soft = blurred.get_pixel(x, y).0;
        image::Rgb(std::array::from_fn(|c| {
            let o = f32::from(orig[c]);
            let detail = o - f32::from(soft[c]);
            to_u8(amount.mul_add(detail, o))
        }))
    })
}

fn decode_lut() -> [f32; 256] {
    std::array::from_fn(|i| {
        #[allow(clippy::cast_precision_loss)]
        let v = i as f32 / 255.0;
        v.powf(GAMMA)
    })
}

fn encode(linear: f32) -> u8 {
    to_u8(linear.clamp(0.0, 1.0).powf(GAMMA.recip()) * 255.0)
}

fn linear_luminance(r: f32, g: f32, b: f32) -> f32 {
    0.0722f32.mul_add(b, 0.2126f32.mul_add(r, 0.7152 * g))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_u8(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(rgb: [u8; 3]) -> RgbImage {
        RgbImage::from_pixel(12, 9, image::Rgb(rgb))
    }

    #[test]
    fn identity_adjustment_round_trips_every_level() {
        #[allow(clippy::cast_possible_truncation)]
        let img = RgbImage::from_fn(256, 1, |x, _| image::Rgb([x as u8, x as u8, x as u8]));
        let out = adjust_color(&img, 1.0, 1.0);
        assert_eq!(out, img);
    }

    #[test]
    fn black_and_white_survive_full_color_mode() {
        let preset = Preset::few_color_logo();
        assert_eq!(preprocess(&flat([0, 0, 0]), &preset), flat([0, 0, 0]));
        assert_eq!(
            preprocess(&flat([255, 255, 255]), &preset),
            flat([255, 255, 255])
        );
    }

    #[test]
    fn dimensions_preserved_for_every_mode() {
        let img = RgbImage::from_fn(17, 31, |x, y| {
            #[allow(clippy::cast_possible_truncation)]
            image::Rgb([(x * 7) as u8, (y * 5) as u8, 90])
        });
        for preset in Preset::catalogue() {
            let out = preprocess(&img, &preset);
            assert_eq!(out.dimensions(), (17, 31), "preset {}", preset.name);
        }
    }

    #[test]
    fn saturation_boost_spreads_channels() {
        let out = adjust_color(&flat([200, 100, 100]), 1.0, 1.5);
        let [r, g, b] = out.get_pixel(0, 0).0;
        assert!(r > 200, "red should grow, got {r}");
        assert!(g < 100 && b < 100, "green/blue should shrink, got {g} {b}");
    }

    #[test]
    fn desaturate_yields_gray() {
        let out = desaturate(&flat([200, 40, 90]), GRAYSCALE_BRIGHTNESS);
        let [r, g, b] = out.get_pixel(3, 3).0;
        assert_eq!(r, g);
        assert_eq!(g, b);
    }

    #[test]
    fn two_tone_stretches_to_full_range() {
        let img = RgbImage::from_fn(10, 1, |x, _| {
            if x < 5 {
                image::Rgb([60, 60, 60])
            } else {
                image::Rgb([150, 150, 150])
            }
        });
        let out = two_tone_gray(&img);
        assert_eq!(out.get_pixel(0, 0).0, [0, 0, 0]);
        assert_eq!(out.get_pixel(9, 0).0, [255, 255, 255]);
    }

    #[test]
    fn stretch_leaves_flat_image_alone() {
        let gray = GrayImage::from_pixel(4, 4, image::Luma([77]));
        assert_eq!(stretch_histogram(&gray), gray);
    }

    #[test]
    fn photographic_pass_keeps_flat_image_flat() {
        let img = flat([120, 130, 140]);
        let preset = Preset::low_fidelity_photo();
        let out = preprocess(&img, &preset);
        let first = out.get_pixel(0, 0).0;
        for p in out.pixels() {
            for c in 0..3 {
                let diff = i16::from(p.0[c]) - i16::from(first[c]);
                assert!(diff.abs() <= 1, "expected near-uniform output, got {p:?}");
            }
        }
    }

    #[test]
    fn unsharp_mask_increases_edge_contrast() {
        let img = RgbImage::from_fn(20, 4, |x, _| {
            if x < 10 {
                image::Rgb([80, 80, 80])
            } else {
                image::Rgb([180, 180, 180])
            }
        });
        let out = unsharp_mask(&img, 1.0, 1.0);
        assert!(out.get_pixel(9, 1).0[0] < 80);
        assert!(out.get_pixel(10, 1).0[0] > 180);
    }

    #[test]
    fn preprocess_is_deterministic() {
        let img = RgbImage::from_fn(32, 32, |x, y| {
            #[allow(clippy::cast_possible_truncation)]
            image::Rgb([(x * 8) as u8, (y * 8) as u8, ((x + y) * 4) as u8])
        });
        let preset = Preset::high_fidelity_photo();
        assert_eq!(preprocess(&img, &preset), preprocess(&img, &preset));
    }
}
