//! Shared types for the vectra tracing pipeline.

use serde::{Deserialize, Serialize};

/// Re-export `GrayImage` so downstream crates can reference masks and
/// intermediate raster data without depending on `image` directly.
pub use image::GrayImage;

/// Re-export `RgbImage` so downstream crates can reference the
/// preprocessed working image without depending on `image` directly.
pub use image::RgbImage;

/// A 2D point in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position (pixels from left edge).
    pub x: f64,
    /// Vertical position (pixels from top edge).
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    ///
    /// Avoids the square root for comparison purposes.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.mul_add(dx, dy * dy)
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        self.distance_squared(other).sqrt()
    }

    /// Midpoint between `self` and `other`.
    #[must_use]
    pub fn midpoint(self, other: Self) -> Self {
        Self::new(f64::midpoint(self.x, other.x), f64::midpoint(self.y, other.y))
    }
}

/// A sequence of connected points. Traced contours are stored as
/// implicitly closed polylines (the last point connects back to the first).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polyline(Vec<Point>);

impl Polyline {
    /// Create a new polyline from a vector of points.
    #[must_use]
    pub const fn new(points: Vec<Point>) -> Self {
        Self(points)
    }

    /// Returns `true` if the polyline has no points.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of points in the polyline.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns a slice of all points.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.0
    }

    /// Consumes the polyline and returns the underlying vector of points.
    #[must_use]
    pub fn into_points(self) -> Vec<Point> {
        self.0
    }
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Total pixel count (`width * height`).
    #[must_use]
    pub const fn pixel_count(self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Pixel layout of a [`Bitmap`] buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Channels {
    /// Three 8-bit channels: red, green, blue.
    Rgb,
    /// Four 8-bit channels: red, green, blue, alpha.
    Rgba,
}

impl Channels {
    /// Number of bytes per pixel.
    #[must_use]
    pub const fn count(self) -> usize {
        match self {
            Self::Rgb => 3,
            Self::Rgba => 4,
        }
    }

    /// Map a raw channel count to a layout.
    ///
    /// # Errors
    ///
    /// Returns [`BitmapError::UnsupportedChannels`] for anything other
    /// than 3 or 4.
    pub const fn from_count(count: u8) -> Result<Self, BitmapError> {
        match count {
            3 => Ok(Self::Rgb),
            4 => Ok(Self::Rgba),
            other => Err(BitmapError::UnsupportedChannels(other)),
        }
    }
}

/// A raw, row-major, 8-bit-per-channel raster image.
///
/// Immutable once constructed; the only constructor validates the buffer
/// against the declared dimensions and channel count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    channels: Channels,
    data: Vec<u8>,
}

impl Bitmap {
    /// Build a bitmap from a raw pixel buffer.
    ///
    /// # Errors
    ///
    /// Returns [`BitmapError::ZeroDimension`] if either dimension is zero,
    /// [`BitmapError::UnsupportedChannels`] if `channels` is not 3 or 4,
    /// and [`BitmapError::BufferLength`] if `data` does not hold exactly
    /// `width * height * channels` bytes.
    pub fn new(width: u32, height: u32, channels: u8, data: Vec<u8>) -> Result<Self, BitmapError> {
        if width == 0 || height == 0 {
            return Err(BitmapError::ZeroDimension { width, height });
        }
        let channels = Channels::from_count(channels)?;
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(channels.count()))
            .ok_or(BitmapError::TooLarge { width, height })?;
        if data.len() != expected {
            return Err(BitmapError::BufferLength {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            channels,
            data,
        })
    }

    /// Build an RGB bitmap from an `image` buffer.
    ///
    /// # Errors
    ///
    /// Returns [`BitmapError::ZeroDimension`] for an empty image.
    pub fn from_rgb(image: RgbImage) -> Result<Self, BitmapError> {
        let (width, height) = image.dimensions();
        Self::new(width, height, 3, image.into_raw())
    }

    /// Build an RGBA bitmap from an `image` buffer.
    ///
    /// # Errors
    ///
    /// Returns [`BitmapError::ZeroDimension`] for an empty image.
    pub fn from_rgba(image: image::RgbaImage) -> Result<Self, BitmapError> {
        let (width, height) = image.dimensions();
        Self::new(width, height, 4, image.into_raw())
    }

    /// Width in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Pixel layout.
    #[must_use]
    pub const fn channels(&self) -> Channels {
        self.channels
    }

    /// The raw pixel buffer.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Image dimensions.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        Dimensions {
            width: self.width,
            height: self.height,
        }
    }

    /// Consume the bitmap into an opaque RGB working image.
    ///
    /// RGBA pixels are composited over white, so fully transparent areas
    /// become background.
    #[must_use]
    pub fn into_rgb(self) -> RgbImage {
        let (width, height) = (self.width, self.height);
        let raw = match self.channels {
            Channels::Rgb => self.data,
            Channels::Rgba => self
                .data
                .chunks_exact(4)
                .flat_map(|px| {
                    let alpha = u16::from(px[3]);
                    let over_white = |c: u8| -> u8 {
                        let blended = (u16::from(c) * alpha + 255 * (255 - alpha) + 127) / 255;
                        u8::try_from(blended).unwrap_or(u8::MAX)
                    };
                    [over_white(px[0]), over_white(px[1]), over_white(px[2])]
                })
                .collect(),
        };
        // Length was validated at construction; fall back to a blank
        // image only if that invariant is somehow broken.
        RgbImage::from_raw(width, height, raw).unwrap_or_else(|| RgbImage::new(width, height))
    }
}

/// Reasons a raw buffer cannot become a [`Bitmap`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BitmapError {
    /// One or both dimensions are zero.
    #[error("bitmap has zero dimension ({width}x{height})")]
    ZeroDimension {
        /// Declared width.
        width: u32,
        /// Declared height.
        height: u32,
    },

    /// Channel count other than 3 (RGB) or 4 (RGBA).
    #[error("unsupported channel count {0} (expected 3 or 4)")]
    UnsupportedChannels(u8),

    /// Buffer length does not match `width * height * channels`.
    #[error("pixel buffer holds {actual} bytes, expected {expected}")]
    BufferLength {
        /// Required byte count.
        expected: usize,
        /// Supplied byte count.
        actual: usize,
    },

    /// Byte size overflows `usize`.
    #[error("bitmap {width}x{height} is too large to address")]
    TooLarge {
        /// Declared width.
        width: u32,
        /// Declared height.
        height: u32,
    },
}

/// Errors that can occur during vectorization.
///
/// Per-color problems (negligible coverage, empty traces, tracer
/// failures) are not errors; they are recorded as
/// [`SkipReason`](crate::SkipReason)s in the diagnostics. Only an
/// entirely empty result escalates to [`VectorizeError::NoLayersProduced`].
#[derive(Debug, thiserror::Error)]
pub enum VectorizeError {
    /// The input bitmap is unusable.
    #[error("invalid input: {0}")]
    InvalidInput(#[from] BitmapError),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The preset name is not in the catalogue.
    #[error("unknown preset {0:?}")]
    UnknownPreset(String),

    /// The preset parameters are out of range.
    #[error("invalid preset: {0}")]
    InvalidPreset(String),

    /// Every palette color was skipped.
    #[error("no layers produced: all {palette_size} palette colors were skipped")]
    NoLayersProduced {
        /// Number of palette colors that were considered.
        palette_size: usize,
    },
}
