//! Ramer-Douglas-Peucker simplification for open and closed point chains.
//!
//! Traced outlines arrive as dense pixel staircases. RDP drops every
//! point within `tolerance` pixels of the chord between the points it
//! keeps, leaving only the vertices that carry the shape.

use crate::types::{Point, Polyline};

/// Simplify an open polyline. Both endpoints are always kept.
///
/// A tolerance of 0.0 keeps every point that is not exactly collinear.
#[must_use = "returns the simplified polyline"]
pub fn simplify(polyline: &Polyline, tolerance: f64) -> Polyline {
    Polyline::new(simplify_open(polyline.points(), tolerance))
}

/// Simplify a closed ring (first point not repeated at the end).
///
/// The ring is split at its first point and at the point farthest from
/// it; each half is simplified as an open chain. Rings of three points or
/// fewer are returned unchanged.
#[must_use = "returns the simplified ring"]
pub fn simplify_closed(ring: &[Point], tolerance: f64) -> Vec<Point> {
    if ring.len() <= 3 {
        return ring.to_vec();
    }
    let anchor = ring[0];
    let far = ring
        .iter()
        .enumerate()
        .skip(1)
        .fold((1, -1.0), |(best, best_d), (i, p)| {
            let d = p.distance_squared(anchor);
            if d > best_d { (i, d) } else { (best, best_d) }
        })
        .0;

    let mut first_half = simplify_open(&ring[..=far], tolerance);
    let mut second: Vec<Point> = ring[far..].to_vec();
    second.push(anchor);
    let second_half = simplify_open(&second, tolerance);

    // Drop the shared split point and the repeated anchor.
    first_half.pop();
    first_half.extend_from_slice(&second_half[..second_half.len() - 1]);
    first_half
}

fn simplify_open(points: &[Point], tolerance: f64) -> Vec<Point> {
    if points.len() < 3 {
        return points.to_vec();
    }
    let mut kept = vec![false; points.len()];
    kept[0] = true;
    kept[points.len() - 1] = true;

    // Explicit stack instead of recursion: long staircases can be
    // thousands of points deep.
    let mut stack = vec![(0, points.len() - 1)];
    while let Some((start, end)) = stack.pop() {
        if end <= start + 1 {
            continue;
        }
        let (mut max_dist, mut max_idx) = (0.0, start);
        for (i, &p) in points.iter().enumerate().take(end).skip(start + 1) {
            let d = perpendicular_distance(p, points[start], points[end]);
            if d > max_dist {
                max_dist = d;
                max_idx = i;
            }
        }
        if max_dist > tolerance {
            kept[max_idx] = true;
            stack.push((start, max_idx));
            stack.push((max_idx, end));
        }
    }

    points
        .iter()
        .zip(&kept)
        .filter_map(|(&p, &k)| k.then_some(p))
        .collect()
}

/// Distance from `p` to the infinite line through `a` and `b`, or to `a`
/// when the two coincide.
fn perpendicular_distance(p: Point, a: Point, b: Point) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let length_sq = dx.mul_add(dx, dy * dy);
    if length_sq == 0.0 {
        return p.distance(a);
    }
    let cross = dx.mul_add(a.y - p.y, -(dy * (a.x - p.x)));
    cross.abs() / length_sq.sqrt()
}
