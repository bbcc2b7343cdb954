//! Pipeline diagnostics: timing, counts, and per-color outcomes.
//!
//! Every call to [`vectorize_with_diagnostics`](crate::vectorize_with_diagnostics)
//! collects these alongside the document. They are meant for preset
//! tuning: which stage dominates, how quickly K-Means settled, and why a
//! given palette color produced no layer.
//!
//! The library never reads a wall clock itself. Callers supply a
//! [`Clock`]; the bench CLI passes one backed by `std::time::Instant`,
//! tests can pass [`NullClock`].
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::layers::{ColorOutcome, ColorReport};

/// Source of timestamps for stage timing.
pub trait Clock {
    /// Opaque timestamp.
    type Instant;

    /// Current timestamp.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// A clock that never advances. Every duration is zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullClock;

impl Clock for NullClock {
    type Instant = ();

    fn now(&self) -> Self::Instant {}

    fn elapsed(&self, (): &Self::Instant) -> Duration {
        Duration::ZERO
    }
}

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Diagnostics collected from a single pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDiagnostics {
    /// Stage 1: image classification and preset resolution.
    pub classify: StageDiagnostics,
    /// Stage 2: gamma/contrast normalization and denoising.
    pub preprocess: StageDiagnostics,
    /// Stage 3: K-Means palette extraction.
    pub palette: StageDiagnostics,
    /// Stage 4: Sobel edge map.
    pub edges: StageDiagnostics,
    /// Stages 5-7: per-color masks, morphology and tracing.
    pub layers: StageDiagnostics,
    /// Stage 8: document assembly and serialization.
    pub assemble: StageDiagnostics,
    /// One record per palette color, in palette order.
    pub colors: Vec<ColorReport>,
    /// Total wall-clock duration of the entire pipeline (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary counts across all stages.
    pub summary: PipelineSummary,
}

/// Diagnostics for a single pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics.
    pub metrics: StageMetrics,
}

/// Stage-specific metrics that vary by pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Input bitmap, before any processing.
    Source {
        /// Width in pixels.
        width: u32,
        /// Height in pixels.
        height: u32,
        /// Bytes per pixel (3 or 4).
        channels: usize,
    },
    /// Classifier measurements and the preset they led to.
    Classify {
        /// Visually distinct coarse colors.
        distinct_colors: usize,
        /// Mean neighbor luma difference in `[0, 1]`.
        average_contrast: f64,
        /// Distinct colors per sample.
        complexity_ratio: f64,
        /// Resolved preset name.
        preset: String,
    },
    /// Preprocessing metrics.
    Preprocess {
        /// Image width in pixels.
        width: u32,
        /// Image height in pixels.
        height: u32,
        /// Whether blur-then-sharpen ran.
        photographic: bool,
    },
    /// K-Means metrics.
    Palette {
        /// Requested palette size.
        requested: usize,
        /// Samples clustered (after downsampling).
        samples: usize,
        /// Rounds executed.
        iterations: usize,
        /// Whether the run converged before the round cap.
        converged: bool,
    },
    /// Edge map metrics.
    Edges {
        /// Mean normalized edge strength.
        mean_strength: f32,
    },
    /// Per-color processing totals.
    Layers {
        /// Colors that produced a layer.
        emitted: usize,
        /// Colors skipped for any reason.
        skipped: usize,
        /// Speckle regions removed across all masks.
        regions_removed: usize,
        /// Paths traced across all layers.
        path_count: usize,
    },
    /// Assembly metrics.
    Assemble {
        /// Layers in the document.
        layer_count: usize,
        /// SVG serialization size.
        byte_size: usize,
    },
}

/// High-level summary counts for the entire pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Source image width in pixels.
    pub image_width: u32,
    /// Source image height in pixels.
    pub image_height: u32,
    /// Total pixel count.
    pub pixel_count: u64,
    /// Preset the run used.
    pub preset: String,
    /// Layers in the final document.
    pub layer_count: usize,
    /// Paths in the final document.
    pub path_count: usize,
}

impl PipelineDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();
        lines.push(format!("Pipeline Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {}x{} ({} pixels)  Preset: {}",
            self.summary.image_width,
            self.summary.image_height,
            self.summary.pixel_count,
            self.summary.preset,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));
        let total_ms = duration_ms(self.total_duration);
        let stages = [
            ("Classify", &self.classify),
            ("Preprocess", &self.preprocess),
            ("Palette", &self.palette),
            ("Edges", &self.edges),
            ("Layers", &self.layers),
            ("Assemble", &self.assemble),
        ];
        for (name, diag) in &stages {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        lines.push(format!(
            "{:<6} {:<8} {:>10} {:>9}  {}",
            "Index", "Color", "Population", "Coverage", "Outcome"
        ));
        lines.push("-".repeat(80));
        for color in &self.colors {
            let coverage = color
                .coverage
                .map_or_else(|| "-".to_owned(), |c| format!("{:.2}%", c * 100.0));
            lines.push(format!(
                "{:<6} {:<8} {:>10} {coverage:>9}  {}",
                color.index,
                color.hex,
                color.population,
                format_outcome(&color.outcome),
            ));
        }

        lines.push(String::new());
        lines.push(format!(
            "Layers: {}  |  Paths: {}",
            self.summary.layer_count, self.summary.path_count,
        ));
        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Source {
            width,
            height,
            channels,
        } => format!("{width}x{height}x{channels}"),
        StageMetrics::Classify {
            distinct_colors,
            average_contrast,
            complexity_ratio,
            preset,
        } => format!(
            "{distinct_colors} colors, contrast={average_contrast:.3} complexity={complexity_ratio:.4} -> {preset}"
        ),
        StageMetrics::Preprocess {
            width,
            height,
            photographic,
        } => {
            let denoise = if *photographic { " +denoise" } else { "" };
            format!("{width}x{height}{denoise}")
        }
        StageMetrics::Palette {
            requested,
            samples,
            iterations,
            converged,
        } => {
            let state = if *converged { "converged" } else { "capped" };
            format!("n={requested} samples={samples} rounds={iterations} ({state})")
        }
        StageMetrics::Edges { mean_strength } => format!("mean={mean_strength:.4}"),
        StageMetrics::Layers {
            emitted,
            skipped,
            regions_removed,
            path_count,
        } => format!(
            "{emitted} layers, {skipped} skipped, {path_count} paths, {regions_removed} speckles removed"
        ),
        StageMetrics::Assemble {
            layer_count,
            byte_size,
        } => format!("{layer_count} layers, {byte_size} bytes"),
    }
}

fn format_outcome(outcome: &ColorOutcome) -> String {
    match outcome {
        ColorOutcome::Layer { paths } => format!("layer ({paths} paths)"),
        ColorOutcome::Skipped(reason) => format!("skipped: {reason:?}"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::layers::SkipReason;

    fn stage(ms: u64, metrics: StageMetrics) -> StageDiagnostics {
        StageDiagnostics {
            duration: Duration::from_millis(ms),
            metrics,
        }
    }

    fn sample() -> PipelineDiagnostics {
        PipelineDiagnostics {
            classify: stage(
                2,
                StageMetrics::Classify {
                    distinct_colors: 3,
                    average_contrast: 0.12,
                    complexity_ratio: 0.001,
                    preset: "few-color-logo".to_owned(),
                },
            ),
            preprocess: stage(
                5,
                StageMetrics::Preprocess {
                    width: 100,
                    height: 80,
                    photographic: false,
                },
            ),
            palette: stage(
                10,
                StageMetrics::Palette {
                    requested: 3,
                    samples: 8000,
                    iterations: 7,
                    converged: true,
                },
            ),
            edges: stage(3, StageMetrics::Edges { mean_strength: 0.05 }),
            layers: stage(
                25,
                StageMetrics::Layers {
                    emitted: 2,
                    skipped: 1,
                    regions_removed: 4,
                    path_count: 6,
                },
            ),
            assemble: stage(
                5,
                StageMetrics::Assemble {
                    layer_count: 2,
                    byte_size: 1234,
                },
            ),
            colors: vec![
                ColorReport {
                    index: 0,
                    hex: "#102030".to_owned(),
                    population: 5000,
                    coverage: Some(0.6),
                    regions_removed: 4,
                    outcome: ColorOutcome::Layer { paths: 4 },
                },
                ColorReport {
                    index: 1,
                    hex: "#ffffff".to_owned(),
                    population: 0,
                    coverage: None,
                    regions_removed: 0,
                    outcome: ColorOutcome::Skipped(SkipReason::Unpopulated),
                },
            ],
            total_duration: Duration::from_millis(50),
            summary: PipelineSummary {
                image_width: 100,
                image_height: 80,
                pixel_count: 8000,
                preset: "few-color-logo".to_owned(),
                layer_count: 2,
                path_count: 6,
            },
        }
    }

    #[test]
    fn duration_ms_converts_correctly() {
        let d = Duration::from_millis(1234);
        let ms = duration_ms(d);
        assert!((ms - 1234.0).abs() < 0.01);
    }

    #[test]
    fn null_clock_reports_zero() {
        let clock = NullClock;
        let start = clock.now();
        assert_eq!(clock.elapsed(&start), Duration::ZERO);
    }

    #[test]
    fn report_lists_stages_and_colors() {
        let report = sample().report();
        assert!(report.contains("Pipeline Diagnostics Report"));
        assert!(report.contains("Palette"));
        assert!(report.contains("rounds=7 (converged)"));
        assert!(report.contains("#102030"));
        assert!(report.contains("Unpopulated"));
        assert!(report.contains("Layers: 2  |  Paths: 6"));
    }

    #[test]
    fn report_handles_zero_total_duration() {
        let mut diag = sample();
        diag.total_duration = Duration::ZERO;
        assert!(diag.report().contains("0.0%"));
    }

    #[test]
    fn serde_round_trip_keeps_durations_and_outcomes() {
        let diag = sample();
        let json = serde_json::to_string(&diag).unwrap();
        assert!(json.contains("\"total_duration\":0.05"));
        let back: PipelineDiagnostics = serde_json::from_str(&json).unwrap();
        assert_eq!(back.total_duration, diag.total_duration);
        assert_eq!(back.colors, diag.colors);
    }

    #[test]
    fn negative_duration_is_rejected() {
        let mut value = serde_json::to_value(sample()).unwrap();
        value["total_duration"] = serde_json::json!(-1.0);
        assert!(serde_json::from_value::<PipelineDiagnostics>(value).is_err());
    }
}
