//! Contour tracing: turn a cleaned binary mask into closed SVG path data.
//!
//! This module defines the [`ContourTracer`] trait for pluggable tracing
//! algorithms and the [`ContourTracerKind`] enum for selecting the
//! built-in one at runtime.
//!
//! # Built-in tracer
//!
//! [`ContourTracerKind::BorderFollowing`] runs these steps:
//!
//! 1. Binarize at [`TraceParams::threshold`].
//! 2. Resolve ambiguous diagonal 2×2 configurations per [`TurnPolicy`].
//! 3. Suzuki-Abe border following via `imageproc::contours::find_contours`.
//!    Outer borders become paths; hole borders become extra subpaths of
//!    their enclosing outer border so even-odd filling renders them.
//! 4. Move each border from pixel centers out to pixel edges, so regions
//!    of neighboring colors meet without a seam.
//! 5. Drop borders enclosing less than [`TraceParams::min_area`].
//! 6. Simplify with Ramer-Douglas-Peucker at
//!    [`TraceParams::curve_tolerance`].
//! 7. Fit corners and curves: a vertex whose turn is at least
//!    `180° * (1 - corner_bias)` stays a sharp `L` corner; any other vertex
//!    becomes a quadratic `Q` join through the neighboring edge midpoints.
//! 8. Keep the [`TraceParams::path_budget`] largest paths by area.

use geo::{Area, LineString, Polygon};
use image::Luma;
use imageproc::contours::{BorderType, Contour, find_contours};
use serde::{Deserialize, Serialize};
use svg::node::Value;
use svg::node::element::path::Data;

use crate::preset::Preset;
use crate::simplify::simplify_closed;
use crate::types::{GrayImage, Point};

/// How ambiguous diagonal pixel pairs are resolved before tracing.
///
/// An ambiguous configuration is a 2×2 block where exactly two diagonal
/// pixels are on. The tracer either connects the two on-pixels (fills one
/// off pixel) or separates them (clears one on-pixel).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TurnPolicy {
    /// Always connect foreground.
    Black,
    /// Always separate foreground.
    White,
    /// Connect when foreground holds at least half of the surrounding
    /// 4×4 neighborhood. Favors solid regions.
    #[default]
    Majority,
    /// Connect when foreground holds at most half of the surrounding
    /// 4×4 neighborhood. Favors thin detail.
    Minority,
}

/// Parameters for one tracing run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraceParams {
    /// Mask values `>= threshold` are foreground.
    pub threshold: u8,
    /// Diagonal ambiguity resolution.
    pub turn_policy: TurnPolicy,
    /// Borders enclosing less area (square pixels) are discarded.
    pub min_area: f64,
    /// RDP tolerance in pixels.
    pub curve_tolerance: f64,
    /// Corner bias in `[0, 1]`; 1 keeps every vertex sharp.
    pub corner_bias: f64,
    /// Maximum number of paths returned.
    pub path_budget: usize,
}

impl TraceParams {
    /// Derive tracing parameters from a preset.
    #[must_use]
    pub fn from_preset(preset: &Preset) -> Self {
        Self {
            threshold: preset.threshold,
            turn_policy: preset.turn_policy,
            min_area: f64::from(preset.noise_area),
            curve_tolerance: preset.curve_tolerance,
            corner_bias: preset.corners,
            path_budget: preset.path_budget,
        }
    }

    /// Turn angle (degrees) at or above which a vertex stays sharp.
    #[must_use]
    pub fn corner_threshold_degrees(&self) -> f64 {
        180.0 * (1.0 - self.corner_bias)
    }

    fn check(&self) -> Result<(), TraceError> {
        let finite_non_negative = |value: f64| value.is_finite() && value >= 0.0;
        if self.threshold == 0 {
            return Err(TraceError::InvalidParameter {
                name: "threshold",
                value: 0.0,
            });
        }
        if !finite_non_negative(self.min_area) {
            return Err(TraceError::InvalidParameter {
                name: "min_area",
                value: self.min_area,
            });
        }
        if !finite_non_negative(self.curve_tolerance) {
            return Err(TraceError::InvalidParameter {
                name: "curve_tolerance",
                value: self.curve_tolerance,
            });
        }
        if !(0.0..=1.0).contains(&self.corner_bias) {
            return Err(TraceError::InvalidParameter {
                name: "corner_bias",
                value: self.corner_bias,
            });
        }
        Ok(())
    }
}

impl Default for TraceParams {
    fn default() -> Self {
        Self::from_preset(&Preset::default())
    }
}

/// Errors reported by a contour tracer.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TraceError {
    /// A numeric parameter is out of range.
    #[error("trace parameter {name} is out of range: {value}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Offending value.
        value: f64,
    },

    /// The tracer produced geometry it could not serialize.
    #[error("traced geometry is not finite")]
    NonFiniteGeometry,

    /// Tracer-specific failure.
    #[error("{0}")]
    Other(String),
}

/// One closed path: an outer border plus its holes, as SVG path data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TracedPath {
    /// Absolute `M`/`L`/`Q`/`Z` commands, one subpath per ring.
    pub data: String,
    /// Enclosed area (outer minus holes), in square pixels.
    pub area: f64,
    /// Number of hole subpaths.
    pub holes: usize,
}

/// Trait for contour tracing strategies.
///
/// Input: a binary mask (non-zero = member). Output: closed paths,
/// largest first. An empty result is a normal outcome.
pub trait ContourTracer: Sync {
    /// Trace `mask` into closed paths.
    ///
    /// # Errors
    ///
    /// Returns [`TraceError`] when the parameters are unusable or the
    /// tracer fails internally.
    fn trace(&self, mask: &GrayImage, params: &TraceParams) -> Result<Vec<TracedPath>, TraceError>;
}

/// Selects which contour tracing algorithm to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContourTracerKind {
    /// Suzuki-Abe border following with pixel-edge outlines, RDP
    /// simplification and corner/curve fitting.
    #[default]
    BorderFollowing,
}

impl ContourTracer for ContourTracerKind {
    fn trace(&self, mask: &GrayImage, params: &TraceParams) -> Result<Vec<TracedPath>, TraceError> {
        match *self {
            Self::BorderFollowing => trace_border_following(mask, params),
        }
    }
}

/// Half a pixel: distance from a pixel center to its edges.
const HALF_PIXEL: f64 = 0.5;

/// Width of the background frame added before border following.
const FRAME: f64 = 1.0;

/// Offset vertices where the outline doubles back use the plain edge
/// normal instead of a miter.
const MIN_MITER_DENOMINATOR: f64 = 0.125;

fn trace_border_following(
    mask: &GrayImage,
    params: &TraceParams,
) -> Result<Vec<TracedPath>, TraceError> {
    params.check()?;
    let binary = binarize(mask, params.threshold);
    let resolved = resolve_ambiguities(&binary, params.turn_policy);
    // Border following ignores foreground on the outermost row and column.
    let framed = frame(&resolved);
    let contours: Vec<Contour<u32>> = find_contours(&framed);

    let rings: Vec<Option<(Vec<Point>, f64)>> = contours
        .iter()
        .map(|c| {
            let grow = match c.border_type {
                BorderType::Outer => HALF_PIXEL,
                BorderType::Hole => -HALF_PIXEL,
            };
            let ring: Vec<Point> = edge_ring(&framed, &c.points, grow)
                .into_iter()
                .map(|p| Point::new(p.x - FRAME, p.y - FRAME))
                .collect();
            let area = ring_area(&ring).abs();
            (area >= params.min_area && area > 0.0).then_some((ring, area))
        })
        .collect();

    let threshold = params.corner_threshold_degrees();
    let mut paths = Vec::new();
    for (i, contour) in contours.iter().enumerate() {
        if contour.border_type != BorderType::Outer {
            continue;
        }
        let Some((outer, outer_area)) = &rings[i] else {
            continue;
        };

        let mut data = ring_data(Data::new(), outer, params.curve_tolerance, threshold);
        let mut area = *outer_area;
        let mut holes = 0;
        for (j, hole) in contours.iter().enumerate() {
            if hole.border_type != BorderType::Hole || hole.parent != Some(i) {
                continue;
            }
            if let Some((ring, hole_area)) = &rings[j] {
                data = ring_data(data, ring, params.curve_tolerance, threshold);
                area -= hole_area;
                holes += 1;
            }
        }

        let data = String::from(Value::from(data));
        if data.contains("NaN") || data.contains("inf") {
            return Err(TraceError::NonFiniteGeometry);
        }
        paths.push(TracedPath {
            data,
            area: area.max(0.0),
            holes,
        });
    }

    // Stable sort keeps border-following order among equal areas.
    paths.sort_by(|a, b| b.area.total_cmp(&a.area));
    let found = paths.len();
    paths.truncate(params.path_budget);
    log::debug!(
        "traced {} contours into {found} paths, kept {}",
        contours.len(),
        paths.len()
    );
    Ok(paths)
}

/// Copy of `binary` inside a one-pixel background frame.
#[must_use]
pub fn frame(binary: &GrayImage) -> GrayImage {
    let (width, height) = binary.dimensions();
    let mut framed = GrayImage::new(width + 2, height + 2);
    image::imageops::replace(&mut framed, binary, 1, 1);
    framed
}

/// Foreground (255) where `mask >= threshold`, else 0.
#[must_use]
pub fn binarize(mask: &GrayImage, threshold: u8) -> GrayImage {
    GrayImage::from_fn(mask.width(), mask.height(), |x, y| {
        if mask.get_pixel(x, y).0[0] >= threshold {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

/// Rewrite every diagonal-only 2×2 block according to `policy`.
///
/// Decisions read the input and write a copy, so the result does not
/// depend on scan order. Connecting fills the upper off-pixel of the
/// block; separating clears the lower on-pixel.
#[must_use]
pub fn resolve_ambiguities(binary: &GrayImage, policy: TurnPolicy) -> GrayImage {
    let (width, height) = binary.dimensions();
    let mut out = binary.clone();
    if width < 2 || height < 2 {
        return out;
    }
    let on = |x: u32, y: u32| binary.get_pixel(x, y).0[0] != 0;

    for y in 0..height - 1 {
        for x in 0..width - 1 {
            let (tl, tr, bl, br) = (on(x, y), on(x + 1, y), on(x, y + 1), on(x + 1, y + 1));
            // (upper off pixel, lower on pixel) for each diagonal pattern.
            let (fill, clear) = match (tl, tr, bl, br) {
                (true, false, false, true) => ((x + 1, y), (x + 1, y + 1)),
                (false, true, true, false) => ((x, y), (x, y + 1)),
                _ => continue,
            };
            if connects(binary, x, y, policy) {
                out.put_pixel(fill.0, fill.1, Luma([255]));
            } else {
                out.put_pixel(clear.0, clear.1, Luma([0]));
            }
        }
    }
    out
}

/// Whether the ambiguous block at `(x, y)` should connect its foreground.
fn connects(binary: &GrayImage, x: u32, y: u32, policy: TurnPolicy) -> bool {
    let foreground_share = || {
        let (width, height) = binary.dimensions();
        let (mut on, mut total) = (0u32, 0u32);
        for ny in y.saturating_sub(1)..=(y + 2).min(height - 1) {
            for nx in x.saturating_sub(1)..=(x + 2).min(width - 1) {
                total += 1;
                on += u32::from(binary.get_pixel(nx, ny).0[0] != 0);
            }
        }
        (on, total)
    };
    match policy {
        TurnPolicy::Black => true,
        TurnPolicy::White => false,
        TurnPolicy::Majority => {
            let (on, total) = foreground_share();
            on * 2 >= total
        }
        TurnPolicy::Minority => {
            let (on, total) = foreground_share();
            on * 2 <= total
        }
    }
}

/// Convert a border of pixel coordinates into a ring on pixel edges.
///
/// Border following steps diagonally around concave corners. Each such
/// step gets the skipped foreground pixel inserted, so the chain follows
/// pixel cracks; the chain is then moved half a pixel away from the
/// ring's own interior (`grow > 0`) or into it (`grow < 0`). Borders of
/// fewer than three pixels become the box around those pixels.
fn edge_ring(
    binary: &GrayImage,
    points: &[imageproc::point::Point<u32>],
    grow: f64,
) -> Vec<Point> {
    let on = |x: u32, y: u32| binary.get_pixel(x, y).0[0] != 0;
    let center = |x: u32, y: u32| Point::new(f64::from(x) + HALF_PIXEL, f64::from(y) + HALF_PIXEL);

    if points.len() < 3 {
        let Some(first) = points.first() else {
            return Vec::new();
        };
        let (mut x0, mut y0, mut x1, mut y1) = (first.x, first.y, first.x, first.y);
        for p in points {
            x0 = x0.min(p.x);
            y0 = y0.min(p.y);
            x1 = x1.max(p.x);
            y1 = y1.max(p.y);
        }
        let (left, top) = (f64::from(x0), f64::from(y0));
        let (right, bottom) = (f64::from(x1) + 1.0, f64::from(y1) + 1.0);
        return vec![
            Point::new(left, top),
            Point::new(right, top),
            Point::new(right, bottom),
            Point::new(left, bottom),
        ];
    }

    let mut chain = Vec::with_capacity(points.len() * 2);
    for (i, a) in points.iter().enumerate() {
        chain.push(center(a.x, a.y));
        let b = points[(i + 1) % points.len()];
        if a.x != b.x && a.y != b.y {
            let (c, d) = ((a.x, b.y), (b.x, a.y));
            match (on(c.0, c.1), on(d.0, d.1)) {
                (true, false) => chain.push(center(c.0, c.1)),
                (false, true) => chain.push(center(d.0, d.1)),
                _ => {}
            }
        }
    }

    offset_ring(&chain, grow)
}

/// Mitered offset of a closed ring by `distance`, measured away from the
/// ring's interior.
fn offset_ring(ring: &[Point], distance: f64) -> Vec<Point> {
    let orientation = ring_area(ring).signum();
    if orientation == 0.0 {
        return ring.to_vec();
    }
    let n = ring.len();
    let outward_normal = |a: Point, b: Point| {
        let (dx, dy) = (b.x - a.x, b.y - a.y);
        let len = dx.hypot(dy);
        if len == 0.0 {
            (0.0, 0.0)
        } else {
            (orientation * dy / len, -orientation * dx / len)
        }
    };

    (0..n)
        .map(|i| {
            let prev = ring[(i + n - 1) % n];
            let here = ring[i];
            let next = ring[(i + 1) % n];
            let n1 = outward_normal(prev, here);
            let n2 = outward_normal(here, next);
            let denom = 1.0 + n1.0.mul_add(n2.0, n1.1 * n2.1);
            let (ox, oy) = if denom < MIN_MITER_DENOMINATOR {
                n1
            } else {
                ((n1.0 + n2.0) / denom, (n1.1 + n2.1) / denom)
            };
            Point::new(ox.mul_add(distance, here.x), oy.mul_add(distance, here.y))
        })
        .collect()
}

/// Signed shoelace area.
fn ring_area(ring: &[Point]) -> f64 {
    if ring.len() < 3 {
        return 0.0;
    }
    let coords: Vec<(f64, f64)> = ring.iter().map(|p| (p.x, p.y)).collect();
    Polygon::new(LineString::from(coords), vec![]).signed_area()
}

/// Turn at `here`, in degrees: 0 for straight on, 180 for a reversal.
fn turn_degrees(prev: Point, here: Point, next: Point) -> f64 {
    let (ax, ay) = (here.x - prev.x, here.y - prev.y);
    let (bx, by) = (next.x - here.x, next.y - here.y);
    if (ax == 0.0 && ay == 0.0) || (bx == 0.0 && by == 0.0) {
        return 180.0;
    }
    let cross = ax.mul_add(by, -(ay * bx));
    let dot = ax.mul_add(bx, ay * by);
    cross.abs().atan2(dot).to_degrees()
}

/// Append one simplified, corner-fitted ring to `data` as a subpath.
fn ring_data(data: Data, ring: &[Point], tolerance: f64, corner_threshold: f64) -> Data {
    let simplified = simplify_closed(ring, tolerance);
    let n = simplified.len();
    if n < 3 {
        return data;
    }

    let sharp: Vec<bool> = (0..n)
        .map(|i| {
            let turn = turn_degrees(simplified[(i + n - 1) % n], simplified[i], simplified[(i + 1) % n]);
            turn >= corner_threshold
        })
        .collect();

    // Start on a sharp vertex when there is one so the closing `Z` lands
    // on a corner.
    let start = sharp.iter().position(|&s| s).unwrap_or(0);
    let v = |k: usize| simplified[(start + k) % n];
    let is_sharp = |k: usize| sharp[(start + k) % n];
    let mid = |k: usize| v(k).midpoint(v(k + 1));
    let xy = |p: Point| (p.x, p.y);

    let mut data = if is_sharp(0) {
        let mut d = data.move_to(xy(v(0)));
        if !is_sharp(1) {
            d = d.line_to(xy(mid(0)));
        }
        d
    } else {
        data.move_to(xy(mid(n - 1)))
            .quadratic_curve_to((v(0).x, v(0).y, mid(0).x, mid(0).y))
    };
    for k in 1..n {
        if is_sharp(k) {
            data = data.line_to(xy(v(k)));
            if k + 1 < n && !is_sharp(k + 1) {
                data = data.line_to(xy(mid(k)));
            }
        } else {
            data = data.quadratic_curve_to((v(k).x, v(k).y, mid(k).x, mid(k).y));
        }
    }
    data.close()
}
