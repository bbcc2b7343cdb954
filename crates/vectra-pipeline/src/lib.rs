//! vectra-pipeline: layered raster-to-vector tracing (sans-IO).
//!
//! Converts a bitmap into a layered vector document through:
//! classify -> preprocess -> K-Means palette -> Sobel edges ->
//! per-color mask -> morphology -> contour tracing -> assembly.
//!
//! This crate has **no I/O dependencies**. It operates on in-memory
//! bitmaps (or encoded image bytes) and returns structured data; reading
//! files and writing SVGs lives in `vectra-bench`.

pub mod assemble;
pub mod classify;
pub mod colormask;
pub mod contour;
pub mod decode;
pub mod diagnostics;
pub mod downsample;
pub mod edges;
pub mod layers;
pub mod morphology;
pub mod palette;
pub mod pipeline;
pub mod preprocess;
pub mod preset;
pub mod simplify;
pub mod svg;
pub mod types;

pub use assemble::{DocumentMetadata, VectorDocument, VectorLayer};
pub use classify::{Classification, ImageClass, resolve_preset};
pub use contour::{ContourTracer, ContourTracerKind, TraceError, TraceParams, TurnPolicy};
pub use diagnostics::{Clock, NullClock, PipelineDiagnostics};
pub use layers::{ColorOutcome, ColorReport, SkipReason};
pub use palette::PaletteColor;
pub use pipeline::Pipeline;
pub use preset::{AUTO, ColorCount, ColorMode, PRESET_NAMES, Preset};
pub use types::{Bitmap, BitmapError, Dimensions, Point, Polyline, VectorizeError};

use diagnostics::{PipelineSummary, StageDiagnostics};
use pipeline::{Pending, PipelineStage};

/// Vectorize `bitmap` with a catalogue preset.
///
/// `preset_name` is one of [`PRESET_NAMES`]; `"auto"` lets the
/// classifier choose.
///
/// # Errors
///
/// Returns [`VectorizeError::UnknownPreset`] for a name outside the
/// catalogue and [`VectorizeError::NoLayersProduced`] if every palette
/// color was skipped.
pub fn vectorize(bitmap: Bitmap, preset_name: &str) -> Result<VectorDocument, VectorizeError> {
    Pipeline::new(bitmap, preset_name).complete()
}

/// Vectorize `bitmap` with a caller-built preset.
///
/// A preset named `"auto"` still defers to the classifier.
///
/// # Errors
///
/// Returns [`VectorizeError::InvalidPreset`] if `preset` fails
/// [`Preset::validate`] and [`VectorizeError::NoLayersProduced`] if
/// every palette color was skipped.
pub fn vectorize_with_preset(
    bitmap: Bitmap,
    preset: &Preset,
) -> Result<VectorDocument, VectorizeError> {
    Pipeline::with_preset(bitmap, preset.clone()).complete()
}

/// Decode image bytes (PNG, JPEG, BMP, WebP) and vectorize them.
///
/// # Errors
///
/// Returns [`VectorizeError::EmptyInput`] or
/// [`VectorizeError::ImageDecode`] when decoding fails, plus everything
/// [`vectorize`] can return.
pub fn vectorize_bytes(bytes: &[u8], preset_name: &str) -> Result<VectorDocument, VectorizeError> {
    vectorize(decode::decode(bytes)?, preset_name)
}

/// Vectorize `bitmap` and collect per-stage diagnostics.
///
/// Stage durations come from `clock`; pass [`NullClock`] when timing is
/// irrelevant.
///
/// # Errors
///
/// Same as [`vectorize`].
pub fn vectorize_with_diagnostics<C: Clock>(
    bitmap: Bitmap,
    preset_name: &str,
    clock: &C,
) -> Result<(VectorDocument, PipelineDiagnostics), VectorizeError> {
    run_with_diagnostics(
        Pipeline::new(bitmap, preset_name),
        &ContourTracerKind::default(),
        clock,
    )
}

/// Drive a pending pipeline to completion with an explicit tracer,
/// timing every stage.
///
/// # Errors
///
/// Returns [`VectorizeError`] from preset resolution or assembly.
pub fn run_with_diagnostics<T: ContourTracer + ?Sized, C: Clock>(
    pending: Pending,
    tracer: &T,
    clock: &C,
) -> Result<(VectorDocument, PipelineDiagnostics), VectorizeError> {
    let total_start = clock.now();
    let dimensions = pending.bitmap().dimensions();

    let start = clock.now();
    let classified = pending.classify()?;
    let classify = measure(clock, &start, &classified);

    let start = clock.now();
    let preprocessed = classified.preprocess();
    let preprocess = measure(clock, &start, &preprocessed);

    let start = clock.now();
    let extracted = preprocessed.extract_palette();
    let palette = measure(clock, &start, &extracted);

    let start = clock.now();
    let detected = extracted.detect_edges();
    let edges = measure(clock, &start, &detected);

    let start = clock.now();
    let built = detected.build_layers_with(tracer);
    let layers = measure(clock, &start, &built);
    let colors = built.reports();

    let start = clock.now();
    let assembled = built.assemble()?;
    let assemble = measure(clock, &start, &assembled);

    let document = assembled.into_document();
    let diagnostics = PipelineDiagnostics {
        classify,
        preprocess,
        palette,
        edges,
        layers,
        assemble,
        colors,
        total_duration: clock.elapsed(&total_start),
        summary: PipelineSummary {
            image_width: dimensions.width,
            image_height: dimensions.height,
            pixel_count: dimensions.pixel_count(),
            preset: document.metadata.preset.clone(),
            layer_count: document.layers.len(),
            path_count: document.metadata.path_count,
        },
    };
    Ok((document, diagnostics))
}

fn measure<C: Clock, S: PipelineStage>(
    clock: &C,
    start: &C::Instant,
    stage: &S,
) -> StageDiagnostics {
    StageDiagnostics {
        duration: clock.elapsed(start),
        metrics: stage.metrics(),
    }
}
