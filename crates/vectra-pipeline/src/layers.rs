//! Per-color layer building: mask, clean, trace.
//!
//! Each palette color is an independent task on the rayon pool. Results
//! come back in palette order whatever order the tasks finish in, and
//! every color ends in exactly one [`ColorOutcome`].

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::colormask::{MIN_COVERAGE, build_mask};
use crate::contour::{ContourTracer, TraceParams, TracedPath};
use crate::edges::EdgeMap;
use crate::morphology::{CleanupStats, clean};
use crate::palette::PaletteColor;
use crate::preset::Preset;
use crate::types::{GrayImage, RgbImage};

/// Why a palette color contributes no layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "reason")]
pub enum SkipReason {
    /// No sample was assigned to the color in the final clustering round.
    Unpopulated,
    /// Same rounded RGB as an earlier retained color.
    Duplicate {
        /// Index of the retained color.
        of: usize,
    },
    /// Mask coverage below the minimum fraction.
    Degenerate {
        /// Measured coverage.
        coverage: f64,
    },
    /// The cleaned mask produced no contours.
    EmptyTrace,
    /// The tracer reported an error.
    TracingFailure {
        /// Tracer error message.
        message: String,
    },
}

/// What happened to one palette color.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "outcome")]
pub enum ColorOutcome {
    /// A layer was emitted.
    Layer {
        /// Number of paths in the layer.
        paths: usize,
    },
    /// The color was skipped.
    Skipped(SkipReason),
}

/// Per-color record kept in the diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorReport {
    /// Palette index.
    pub index: usize,
    /// `#rrggbb`.
    pub hex: String,
    /// Clustering population.
    pub population: usize,
    /// Raw mask coverage, if a mask was built.
    pub coverage: Option<f64>,
    /// Speckle regions removed during cleanup.
    pub regions_removed: usize,
    /// Final outcome.
    pub outcome: ColorOutcome,
}

/// Result of processing one palette color.
#[derive(Debug, Clone)]
pub struct ColorResult {
    /// The palette color.
    pub color: PaletteColor,
    /// Cleaned mask, when the color got that far.
    pub mask: Option<GrayImage>,
    /// Traced paths (empty when skipped).
    pub paths: Vec<TracedPath>,
    /// Diagnostics record.
    pub report: ColorReport,
}

impl ColorResult {
    fn skipped(color: PaletteColor, reason: SkipReason, coverage: Option<f64>) -> Self {
        log::info!("skipping palette color {} ({}): {reason:?}", color.index, color.hex);
        let report = ColorReport {
            index: color.index,
            hex: color.hex.clone(),
            population: color.population,
            coverage,
            regions_removed: 0,
            outcome: ColorOutcome::Skipped(reason),
        };
        Self {
            color,
            mask: None,
            paths: Vec::new(),
            report,
        }
    }

    /// Whether this color produced a layer.
    #[must_use]
    pub const fn is_layer(&self) -> bool {
        matches!(self.report.outcome, ColorOutcome::Layer { .. })
    }
}

/// Mark colors that cannot produce a distinct layer.
///
/// Returns one entry per palette color: `None` when the color should be
/// processed, or the reason it is skipped.
#[must_use]
pub fn screen_palette(colors: &[PaletteColor]) -> Vec<Option<SkipReason>> {
    let mut retained: Vec<&PaletteColor> = Vec::with_capacity(colors.len());
    colors
        .iter()
        .map(|color| {
            if color.population == 0 {
                return Some(SkipReason::Unpopulated);
            }
            if let Some(earlier) = retained.iter().find(|c| c.rgb == color.rgb) {
                return Some(SkipReason::Duplicate { of: earlier.index });
            }
            retained.push(color);
            None
        })
        .collect()
}

/// Build, clean and trace the mask of every palette color.
#[must_use = "returns the per-color results"]
pub fn build_layers<T: ContourTracer + ?Sized>(
    image: &RgbImage,
    palette: &[PaletteColor],
    edges: &EdgeMap,
    preset: &Preset,
    tracer: &T,
) -> Vec<ColorResult> {
    let params = TraceParams::from_preset(preset);
    let screened = screen_palette(palette);
    palette
        .par_iter()
        .zip(screened)
        .map(|(color, skip)| match skip {
            Some(reason) => ColorResult::skipped(color.clone(), reason, None),
            None => process_color(image, color, edges, preset, &params, tracer),
        })
        .collect()
}

/// Mask, clean and trace a single palette color.
#[must_use = "returns the color result"]
pub fn process_color<T: ContourTracer + ?Sized>(
    image: &RgbImage,
    color: &PaletteColor,
    edges: &EdgeMap,
    preset: &Preset,
    params: &TraceParams,
    tracer: &T,
) -> ColorResult {
    let raw = build_mask(image, color, edges, preset.tolerance);
    if raw.coverage < MIN_COVERAGE {
        return ColorResult::skipped(
            color.clone(),
            SkipReason::Degenerate {
                coverage: raw.coverage,
            },
            Some(raw.coverage),
        );
    }

    let (cleaned, stats): (GrayImage, CleanupStats) = clean(&raw.mask, preset.noise_area);
    log::debug!(
        "color {} ({}): coverage {:.4}, {} speckles removed, {} -> {} pixels",
        color.index,
        color.hex,
        raw.coverage,
        stats.regions_removed,
        stats.on_before,
        stats.on_after
    );

    let outcome = match tracer.trace(&cleaned, params) {
        Ok(paths) if paths.is_empty() => Err(SkipReason::EmptyTrace),
        Ok(paths) => Ok(paths),
        Err(e) => Err(SkipReason::TracingFailure {
            message: e.to_string(),
        }),
    };

    match outcome {
        Ok(paths) => ColorResult {
            color: color.clone(),
            mask: Some(cleaned),
            report: ColorReport {
                index: color.index,
                hex: color.hex.clone(),
                population: color.population,
                coverage: Some(raw.coverage),
                regions_removed: stats.regions_removed,
                outcome: ColorOutcome::Layer { paths: paths.len() },
            },
            paths,
        },
        Err(reason) => {
            let mut result = ColorResult::skipped(color.clone(), reason, Some(raw.coverage));
            result.report.regions_removed = stats.regions_removed;
            result.mask = Some(cleaned);
            result
        }
    }
}
