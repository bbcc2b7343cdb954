//! Image decoding.
//!
//! Accepts raw image bytes (PNG, JPEG, BMP, WebP) and produces a
//! [`Bitmap`]. Images with an alpha channel keep it (as RGBA) so the
//! pipeline can composite them over white; everything else becomes RGB.

use crate::types::{Bitmap, VectorizeError};

/// Decode raw image bytes into a bitmap.
///
/// # Errors
///
/// Returns [`VectorizeError::EmptyInput`] if `bytes` is empty and
/// [`VectorizeError::ImageDecode`] if the image format is unrecognized or
/// the data is corrupt.
pub fn decode(bytes: &[u8]) -> Result<Bitmap, VectorizeError> {
    if bytes.is_empty() {
        return Err(VectorizeError::EmptyInput);
    }

    let img = image::load_from_memory(bytes)?;
    log::debug!(
        "decoded {} bytes -> {}x{} {:?}",
        bytes.len(),
        img.width(),
        img.height(),
        img.color()
    );
    let bitmap = if img.color().has_alpha() {
        Bitmap::from_rgba(img.to_rgba8())?
    } else {
        Bitmap::from_rgb(img.to_rgb8())?
    };
    Ok(bitmap)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::Channels;

    fn encode_png<P, C>(img: &image::ImageBuffer<P, C>, color: image::ExtendedColorType) -> Vec<u8>
    where
        P: image::Pixel<Subpixel = u8>,
        C: std::ops::Deref<Target = [u8]>,
    {
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image::ImageEncoder::write_image(encoder, img.as_raw(), img.width(), img.height(), color)
            .unwrap();
        buf
    }

    #[test]
    fn empty_input_returns_error() {
        assert!(matches!(decode(&[]), Err(VectorizeError::EmptyInput)));
    }

    #[test]
    fn corrupt_bytes_returns_image_decode_error() {
        let result = decode(&[0xFF, 0xFE, 0x00, 0x01]);
        assert!(matches!(result, Err(VectorizeError::ImageDecode(_))));
    }

    #[test]
    fn opaque_png_decodes_to_rgb() {
        let img = image::RgbImage::from_pixel(3, 2, image::Rgb([10, 20, 30]));
        let bitmap = decode(&encode_png(&img, image::ExtendedColorType::Rgb8)).unwrap();
        assert_eq!(bitmap.channels(), Channels::Rgb);
        assert_eq!((bitmap.width(), bitmap.height()), (3, 2));
        assert_eq!(&bitmap.data()[..3], &[10, 20, 30]);
    }

    #[test]
    fn transparent_png_keeps_alpha() {
        let img = image::RgbaImage::from_pixel(2, 2, image::Rgba([0, 0, 0, 0]));
        let bitmap = decode(&encode_png(&img, image::ExtendedColorType::Rgba8)).unwrap();
        assert_eq!(bitmap.channels(), Channels::Rgba);
        let rgb = bitmap.into_rgb();
        assert_eq!(rgb.get_pixel(1, 1).0, [255, 255, 255]);
    }
}
