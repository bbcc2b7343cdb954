//! Binary mask cleanup: speckle removal, closing, opening.
//!
//! Structuring elements are squares of side `2r + 1` (an L∞ ball, via
//! `imageproc::morphology`). Distances are measured only to pixels inside
//! the image, so a region touching the border is neither grown nor eaten
//! from outside. Each opening or closing writes into one fresh buffer.

use image::Luma;
use imageproc::distance_transform::Norm;
use imageproc::region_labelling::{Connectivity, connected_components};

use crate::colormask::ON;
use crate::types::GrayImage;

/// Radius of the closing (dilate then erode) element.
pub const CLOSE_RADIUS: u8 = 2;

/// Radius of the opening (erode then dilate) element.
pub const OPEN_RADIUS: u8 = 1;

/// Per-mask cleanup statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CleanupStats {
    /// Regions zeroed by speckle removal.
    pub regions_removed: usize,
    /// On-pixels before cleanup.
    pub on_before: u64,
    /// On-pixels after cleanup.
    pub on_after: u64,
}

/// Full cleanup sequence: speckle removal, closing, opening.
#[must_use = "returns the cleaned mask"]
pub fn clean(mask: &GrayImage, noise_area: u32) -> (GrayImage, CleanupStats) {
    let on_before = count_on(mask);
    let (despeckled, regions_removed) = remove_small_regions(mask, noise_area);
    let closed = close(&despeckled, CLOSE_RADIUS);
    let opened = open(&closed, OPEN_RADIUS);
    let stats = CleanupStats {
        regions_removed,
        on_before,
        on_after: count_on(&opened),
    };
    (opened, stats)
}

/// Zero every 4-connected on-region with fewer than `min_area` pixels.
///
/// Returns the cleaned mask and the number of regions removed.
#[must_use = "returns the mask without small regions"]
pub fn remove_small_regions(mask: &GrayImage, min_area: u32) -> (GrayImage, usize) {
    if min_area <= 1 {
        return (mask.clone(), 0);
    }
    let labels = connected_components(mask, Connectivity::Four, Luma([0u8]));

    // Label 0 is background; foreground labels are 1..=max.
    let max_label = labels.pixels().map(|p| p.0[0]).max().unwrap_or(0);
    let mut areas = vec![0u32; max_label as usize + 1];
    for p in labels.pixels() {
        areas[p.0[0] as usize] += 1;
    }

    let removed = areas
        .iter()
        .skip(1)
        .filter(|&&area| area > 0 && area < min_area)
        .count();
    let cleaned = GrayImage::from_fn(mask.width(), mask.height(), |x, y| {
        let label = labels.get_pixel(x, y).0[0] as usize;
        if label != 0 && areas[label] >= min_area {
            Luma([ON])
        } else {
            Luma([0])
        }
    });
    (cleaned, removed)
}

/// Neighborhood maximum over a `(2r+1)²` square.
#[must_use = "returns the dilated mask"]
pub fn dilate(mask: &GrayImage, radius: u8) -> GrayImage {
    imageproc::morphology::dilate(mask, Norm::LInf, radius)
}

/// Neighborhood minimum over a `(2r+1)²` square.
#[must_use = "returns the eroded mask"]
pub fn erode(mask: &GrayImage, radius: u8) -> GrayImage {
    imageproc::morphology::erode(mask, Norm::LInf, radius)
}

/// Dilate then erode: fills gaps and notches narrower than the element.
#[must_use = "returns the closed mask"]
pub fn close(mask: &GrayImage, radius: u8) -> GrayImage {
    imageproc::morphology::close(mask, Norm::LInf, radius)
}

/// Erode then dilate: removes protrusions and islands narrower than the
/// element.
#[must_use = "returns the opened mask"]
pub fn open(mask: &GrayImage, radius: u8) -> GrayImage {
    imageproc::morphology::open(mask, Norm::LInf, radius)
}

/// Number of non-zero pixels.
#[must_use]
pub fn count_on(mask: &GrayImage) -> u64 {
    mask.as_raw().iter().filter(|&&v| v != 0).count() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect_mask(width: u32, height: u32, x0: u32, y0: u32, x1: u32, y1: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| {
            if (x0..x1).contains(&x) && (y0..y1).contains(&y) {
                Luma([ON])
            } else {
                Luma([0])
            }
        })
    }

    #[test]
    fn opening_then_closing_keeps_clean_rectangle() {
        let mask = rect_mask(40, 30, 10, 8, 30, 22);
        let opened = open(&mask, OPEN_RADIUS);
        assert_eq!(opened, mask);
        assert_eq!(close(&opened, CLOSE_RADIUS), mask);
    }

    #[test]
    fn full_and_empty_masks_are_fixed_points() {
        let full = GrayImage::from_pixel(9, 7, Luma([ON]));
        let empty = GrayImage::new(9, 7);
        for m in [&full, &empty] {
            assert_eq!(&dilate(m, 2), m);
            assert_eq!(&erode(m, 2), m);
        }
    }

    #[test]
    fn border_region_is_not_eroded_from_outside() {
        let mask = rect_mask(20, 20, 0, 0, 8, 20);
        let eroded = erode(&mask, 1);
        assert_eq!(eroded.get_pixel(0, 0).0[0], ON);
        assert_eq!(eroded.get_pixel(7, 10).0[0], 0);
        assert_eq!(eroded.get_pixel(6, 10).0[0], ON);
    }

    #[test]
    fn closing_keeps_regions_flush_with_the_border() {
        let flush = rect_mask(20, 20, 0, 0, 8, 20);
        assert_eq!(close(&flush, CLOSE_RADIUS), flush);
        // Gaps of three or more pixels to the border survive closing.
        let inset = rect_mask(20, 20, 3, 3, 17, 17);
        assert_eq!(close(&inset, CLOSE_RADIUS), inset);
    }

    #[test]
    fn dilate_grows_single_pixel_to_square() {
        let mask = rect_mask(11, 11, 5, 5, 6, 6);
        let grown = dilate(&mask, 2);
        assert_eq!(count_on(&grown), 25);
        assert_eq!(grown.get_pixel(3, 3).0[0], ON);
        assert_eq!(grown.get_pixel(2, 5).0[0], 0);
    }

    #[test]
    fn closing_fills_narrow_gap() {
        let mut mask = rect_mask(30, 10, 2, 2, 28, 8);
        for y in 2..8 {
            mask.put_pixel(15, y, Luma([0]));
        }
        let closed = close(&mask, CLOSE_RADIUS);
        assert_eq!(closed.get_pixel(15, 5).0[0], ON);
    }

    #[test]
    fn opening_removes_thin_line() {
        let mut mask = rect_mask(30, 30, 5, 5, 15, 15);
        for x in 15..28 {
            mask.put_pixel(x, 10, Luma([ON]));
        }
        let opened = open(&mask, OPEN_RADIUS);
        assert_eq!(opened.get_pixel(22, 10).0[0], 0);
        assert_eq!(opened.get_pixel(10, 10).0[0], ON);
    }

    #[test]
    fn small_regions_are_removed_large_kept() {
        let mut mask = rect_mask(40, 40, 5, 5, 25, 25);
        mask.put_pixel(35, 35, Luma([ON]));
        mask.put_pixel(36, 35, Luma([ON]));
        mask.put_pixel(2, 38, Luma([ON]));
        let (cleaned, removed) = remove_small_regions(&mask, 8);
        assert_eq!(removed, 2);
        assert_eq!(count_on(&cleaned), 400);
    }

    #[test]
    fn diagonal_neighbors_are_separate_regions() {
        let mut mask = GrayImage::new(10, 10);
        for i in 0..6 {
            mask.put_pixel(i, i, Luma([ON]));
        }
        let (cleaned, removed) = remove_small_regions(&mask, 2);
        assert_eq!(removed, 6);
        assert_eq!(count_on(&cleaned), 0);
    }

    #[test]
    fn clean_reports_stats() {
        let mut mask = rect_mask(32, 32, 4, 4, 28, 28);
        mask.put_pixel(0, 31, Luma([ON]));
        let (cleaned, stats) = clean(&mask, 4);
        assert_eq!(stats.regions_removed, 1);
        assert_eq!(stats.on_before, 24 * 24 + 1);
        assert_eq!(stats.on_after, count_on(&cleaned));
        assert_eq!(cleaned, rect_mask(32, 32, 4, 4, 28, 28));
    }

    #[test]
    fn cleanup_is_deterministic() {
        let mask = GrayImage::from_fn(48, 48, |x, y| {
            if (x * 7 + y * 13) % 5 < 3 {
                Luma([ON])
            } else {
                Luma([0])
            }
        });
        assert_eq!(clean(&mask, 6), clean(&mask, 6));
    }
}
