//! Incremental pipeline: advance stage-by-stage, inspecting each
//! intermediate result before continuing.
//!
//! Unlike [`crate::vectorize`] which runs the entire pipeline in one
//! call, [`Pipeline`] lets the caller drive execution one step at a time:
//!
//! ```rust
//! # use vectra_pipeline::{Bitmap, Pipeline, VectorizeError};
//! # fn run(bitmap: Bitmap) -> Result<(), VectorizeError> {
//! let layers = Pipeline::new(bitmap, "auto")
//!     .classify()?
//!     .preprocess()
//!     .extract_palette()
//!     .detect_edges()
//!     .build_layers();
//!
//! for result in layers.results() {
//!     println!("{} -> {:?}", result.color.hex, result.report.outcome);
//! }
//! let document = layers.assemble()?.into_document();
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next pipeline state
//! (or `Result` for fallible stages), carrying forward what later stages
//! need. The caller can inspect the current stage's output via accessor
//! methods at any point.

use crate::assemble::VectorDocument;
use crate::classify::Classification;
use crate::contour::{ContourTracer, ContourTracerKind};
use crate::diagnostics::StageMetrics;
use crate::edges::EdgeMap;
use crate::layers::{ColorReport, ColorResult};
use crate::palette::Palette;
use crate::preset::{AUTO, Preset};
use crate::types::{Bitmap, Dimensions, RgbImage, VectorizeError};

/// How the run's preset is chosen.
#[derive(Debug, Clone, PartialEq)]
pub enum PresetSelection {
    /// A catalogue name, or [`AUTO`] to let the classifier decide.
    Named(String),
    /// A caller-built preset, validated before use.
    Custom(Preset),
}

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Pipeline state before any processing has occurred.
///
/// Call [`classify`](Self::classify) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing — call .classify() to continue"]
pub struct Pending {
    bitmap: Bitmap,
    selection: PresetSelection,
}

impl Pending {
    /// The source bitmap.
    #[must_use]
    pub const fn bitmap(&self) -> &Bitmap {
        &self.bitmap
    }

    /// The requested preset.
    #[must_use]
    pub const fn selection(&self) -> &PresetSelection {
        &self.selection
    }

    /// Resolve the preset, classify the image and advance to the
    /// [`Classified`] stage.
    ///
    /// # Errors
    ///
    /// Returns [`VectorizeError::UnknownPreset`] for a name outside the
    /// catalogue and [`VectorizeError::InvalidPreset`] for a custom preset
    /// that fails validation.
    pub fn classify(self) -> Result<Classified, VectorizeError> {
        let requested = match self.selection {
            PresetSelection::Named(name) => Preset::named(&name)?,
            PresetSelection::Custom(preset) => {
                preset.validate()?;
                preset
            }
        };
        let dimensions = self.bitmap.dimensions();
        let image = self.bitmap.into_rgb();
        let classification = crate::classify::classify(&image);
        let preset = if requested.name == AUTO {
            crate::classify::resolve_preset(&classification)
        } else {
            requested
        };
        log::debug!(
            "classified {}x{} as {:?}, using preset {}",
            dimensions.width,
            dimensions.height,
            classification.class,
            preset.name
        );
        Ok(Classified {
            dimensions,
            image,
            classification,
            preset,
        })
    }
}

// ───────────────────────── Stage 1: Classified ───────────────────────

/// Pipeline state after classification and preset resolution.
///
/// Call [`preprocess`](Self::preprocess) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing — call .preprocess() to continue"]
pub struct Classified {
    dimensions: Dimensions,
    image: RgbImage,
    classification: Classification,
    preset: Preset,
}

impl Classified {
    /// The opaque RGB working image.
    #[must_use]
    pub const fn image(&self) -> &RgbImage {
        &self.image
    }

    /// Classifier measurements.
    #[must_use]
    pub const fn classification(&self) -> &Classification {
        &self.classification
    }

    /// The preset the rest of the run uses.
    #[must_use]
    pub const fn preset(&self) -> &Preset {
        &self.preset
    }

    /// Normalize and optionally denoise the image.
    pub fn preprocess(self) -> Preprocessed {
        let preprocessed = crate::preprocess::preprocess(&self.image, &self.preset);
        Preprocessed {
            dimensions: self.dimensions,
            classification: self.classification,
            preset: self.preset,
            preprocessed,
        }
    }
}

// ───────────────────────── Stage 2: Preprocessed ─────────────────────

/// Pipeline state after preprocessing.
///
/// Call [`extract_palette`](Self::extract_palette) to advance to the
/// next stage.
#[must_use = "pipeline stages are consumed by advancing — call .extract_palette() to continue"]
pub struct Preprocessed {
    dimensions: Dimensions,
    classification: Classification,
    preset: Preset,
    preprocessed: RgbImage,
}

impl Preprocessed {
    /// The preprocessed full-resolution image.
    #[must_use]
    pub const fn preprocessed(&self) -> &RgbImage {
        &self.preprocessed
    }

    /// Cluster a working-resolution copy into the palette.
    pub fn extract_palette(self) -> PaletteExtracted {
        let requested = self
            .preset
            .colors
            .resolve(self.classification.distinct_colors);
        let (working, downsampled) =
            crate::downsample::downsample(&self.preprocessed, self.preset.working_resolution);
        let palette = crate::palette::extract_palette(&working, requested);
        log::debug!(
            "palette: {requested} colors from {} samples in {} rounds (downsampled: {downsampled})",
            palette.samples,
            palette.iterations
        );
        PaletteExtracted {
            dimensions: self.dimensions,
            classification: self.classification,
            preset: self.preset,
            preprocessed: self.preprocessed,
            requested,
            palette,
        }
    }
}

// ───────────────────────── Stage 3: PaletteExtracted ─────────────────

/// Pipeline state after K-Means palette extraction.
///
/// Call [`detect_edges`](Self::detect_edges) to advance to the next
/// stage.
#[must_use = "pipeline stages are consumed by advancing — call .detect_edges() to continue"]
pub struct PaletteExtracted {
    dimensions: Dimensions,
    classification: Classification,
    preset: Preset,
    preprocessed: RgbImage,
    requested: usize,
    palette: Palette,
}

impl PaletteExtracted {
    /// The extracted palette (exactly the requested size).
    #[must_use]
    pub const fn palette(&self) -> &Palette {
        &self.palette
    }

    /// Compute the Sobel edge map of the preprocessed image.
    pub fn detect_edges(self) -> EdgesDetected {
        let edges = crate::edges::detect_edges(&self.preprocessed);
        EdgesDetected {
            dimensions: self.dimensions,
            classification: self.classification,
            preset: self.preset,
            preprocessed: self.preprocessed,
            palette: self.palette,
            edges,
        }
    }
}

// ───────────────────────── Stage 4: EdgesDetected ────────────────────

/// Pipeline state after edge detection.
///
/// Call [`build_layers`](Self::build_layers) (or
/// [`build_layers_with`](Self::build_layers_with) for a custom tracer)
/// to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing — call .build_layers() to continue"]
pub struct EdgesDetected {
    dimensions: Dimensions,
    classification: Classification,
    preset: Preset,
    preprocessed: RgbImage,
    palette: Palette,
    edges: EdgeMap,
}

impl EdgesDetected {
    /// The normalized edge-strength map.
    #[must_use]
    pub const fn edges(&self) -> &EdgeMap {
        &self.edges
    }

    /// Mask, clean and trace every palette color with the built-in tracer.
    pub fn build_layers(self) -> LayersBuilt {
        self.build_layers_with(&ContourTracerKind::default())
    }

    /// Mask, clean and trace every palette color with `tracer`.
    pub fn build_layers_with<T: ContourTracer + ?Sized>(self, tracer: &T) -> LayersBuilt {
        let results = crate::layers::build_layers(
            &self.preprocessed,
            &self.palette.colors,
            &self.edges,
            &self.preset,
            tracer,
        );
        LayersBuilt {
            dimensions: self.dimensions,
            classification: self.classification,
            preset: self.preset,
            results,
        }
    }
}

// ───────────────────────── Stage 5: LayersBuilt ──────────────────────

/// Pipeline state after per-color processing.
///
/// Call [`assemble`](Self::assemble) to produce the document.
#[must_use = "pipeline stages are consumed by advancing — call .assemble() to continue"]
pub struct LayersBuilt {
    dimensions: Dimensions,
    classification: Classification,
    preset: Preset,
    results: Vec<ColorResult>,
}

impl LayersBuilt {
    /// One result per palette color, in palette order.
    #[must_use]
    pub fn results(&self) -> &[ColorResult] {
        &self.results
    }

    /// The per-color diagnostics records.
    #[must_use]
    pub fn reports(&self) -> Vec<ColorReport> {
        self.results.iter().map(|r| r.report.clone()).collect()
    }

    /// Order the layers and build the document.
    ///
    /// # Errors
    ///
    /// Returns [`VectorizeError::NoLayersProduced`] if every color was
    /// skipped.
    pub fn assemble(self) -> Result<Assembled, VectorizeError> {
        let document = crate::assemble::assemble(
            self.dimensions,
            self.results,
            &self.preset.name,
            self.classification,
        )?;
        Ok(Assembled { document })
    }
}

// ───────────────────────── Stage 6: Assembled ────────────────────────

/// Final pipeline state.
#[must_use = "call .into_document() to extract the VectorDocument"]
pub struct Assembled {
    document: VectorDocument,
}

impl Assembled {
    /// The finished document.
    #[must_use]
    pub const fn document(&self) -> &VectorDocument {
        &self.document
    }

    /// Consume the pipeline and return the document.
    #[must_use]
    pub fn into_document(self) -> VectorDocument {
        self.document
    }
}

// ──────────────────── PipelineStage trait + Stage enum ────────────────

/// Total number of stages in the pipeline.
pub const STAGE_COUNT: usize = 7;

/// The output produced by a single pipeline stage.
///
/// Each variant borrows the data that the corresponding stage computed.
#[must_use]
pub enum StageOutput<'a> {
    /// Source bitmap (not yet processed).
    Source {
        /// The input bitmap.
        bitmap: &'a Bitmap,
    },
    /// Classification and resolved preset.
    Classified {
        /// Classifier measurements.
        classification: &'a Classification,
        /// Resolved preset.
        preset: &'a Preset,
    },
    /// Preprocessed image.
    Preprocessed {
        /// The preprocessed image.
        image: &'a RgbImage,
    },
    /// Palette extraction result.
    PaletteExtracted {
        /// The palette.
        palette: &'a Palette,
    },
    /// Edge detection result.
    EdgesDetected {
        /// The edge map.
        edges: &'a EdgeMap,
    },
    /// Per-color results.
    LayersBuilt {
        /// One result per palette color.
        results: &'a [ColorResult],
    },
    /// Finished document.
    Assembled {
        /// The document.
        document: &'a VectorDocument,
    },
}

/// Trait implemented by every pipeline stage, enabling uniform iteration.
///
/// # Loop pattern
///
/// ```rust
/// # use vectra_pipeline::{Bitmap, Pipeline, VectorizeError};
/// # use vectra_pipeline::pipeline::{Advance, PipelineStage, Stage};
/// # fn run(bitmap: Bitmap) -> Result<(), VectorizeError> {
/// let mut stage: Stage = Pipeline::new(bitmap, "auto").into();
/// loop {
///     match stage.advance()? {
///         Advance::Next(next) => stage = next,
///         Advance::Complete(done) => { stage = done; break; }
///     }
/// }
/// let document = stage.complete()?;
/// # Ok(())
/// # }
/// ```
pub trait PipelineStage: Sized {
    /// Short name of this stage (e.g. `"source"`, `"palette"`).
    const NAME: &str;

    /// Zero-based index of this stage (`0` for Pending through `6` for
    /// Assembled).
    const INDEX: usize;

    /// The output this stage produced.
    fn output(&self) -> StageOutput<'_>;

    /// Stage-specific metrics for diagnostics.
    fn metrics(&self) -> StageMetrics;

    /// Advance to the next stage.
    ///
    /// Returns `Ok(Some(stage))` on success, `Ok(None)` if already at
    /// the final stage, or `Err` if the stage transition fails.
    ///
    /// # Errors
    ///
    /// Returns [`VectorizeError`] when preset resolution or assembly
    /// fails.
    fn next(self) -> Result<Option<Stage>, VectorizeError>;

    /// Run all remaining stages to completion.
    ///
    /// # Errors
    ///
    /// Returns [`VectorizeError`] if any remaining fallible stage fails.
    fn complete(self) -> Result<VectorDocument, VectorizeError>;
}

impl PipelineStage for Pending {
    const NAME: &str = "source";
    const INDEX: usize = 0;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Source {
            bitmap: &self.bitmap,
        }
    }

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Source {
            width: self.bitmap.width(),
            height: self.bitmap.height(),
            channels: self.bitmap.channels().count(),
        }
    }

    fn next(self) -> Result<Option<Stage>, VectorizeError> {
        Ok(Some(Stage::Classified(self.classify()?)))
    }

    fn complete(self) -> Result<VectorDocument, VectorizeError> {
        self.classify()?.complete()
    }
}

impl PipelineStage for Classified {
    const NAME: &str = "classify";
    const INDEX: usize = 1;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Classified {
            classification: &self.classification,
            preset: &self.preset,
        }
    }

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Classify {
            distinct_colors: self.classification.distinct_colors,
            average_contrast: self.classification.average_contrast,
            complexity_ratio: self.classification.complexity_ratio,
            preset: self.preset.name.clone(),
        }
    }

    fn next(self) -> Result<Option<Stage>, VectorizeError> {
        Ok(Some(Stage::Preprocessed(self.preprocess())))
    }

    fn complete(self) -> Result<VectorDocument, VectorizeError> {
        self.preprocess().complete()
    }
}

impl PipelineStage for Preprocessed {
    const NAME: &str = "preprocess";
    const INDEX: usize = 2;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Preprocessed {
            image: &self.preprocessed,
        }
    }

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Preprocess {
            width: self.dimensions.width,
            height: self.dimensions.height,
            photographic: self.preset.photographic,
        }
    }

    fn next(self) -> Result<Option<Stage>, VectorizeError> {
        Ok(Some(Stage::PaletteExtracted(self.extract_palette())))
    }

    fn complete(self) -> Result<VectorDocument, VectorizeError> {
        self.extract_palette().complete()
    }
}

impl PipelineStage for PaletteExtracted {
    const NAME: &str = "palette";
    const INDEX: usize = 3;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::PaletteExtracted {
            palette: &self.palette,
        }
    }

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Palette {
            requested: self.requested,
            samples: self.palette.samples,
            iterations: self.palette.iterations,
            converged: self.palette.converged,
        }
    }

    fn next(self) -> Result<Option<Stage>, VectorizeError> {
        Ok(Some(Stage::EdgesDetected(self.detect_edges())))
    }

    fn complete(self) -> Result<VectorDocument, VectorizeError> {
        self.detect_edges().complete()
    }
}

impl PipelineStage for EdgesDetected {
    const NAME: &str = "edges";
    const INDEX: usize = 4;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::EdgesDetected { edges: &self.edges }
    }

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Edges {
            mean_strength: self.edges.mean(),
        }
    }

    fn next(self) -> Result<Option<Stage>, VectorizeError> {
        Ok(Some(Stage::LayersBuilt(self.build_layers())))
    }

    fn complete(self) -> Result<VectorDocument, VectorizeError> {
        self.build_layers().complete()
    }
}

impl PipelineStage for LayersBuilt {
    const NAME: &str = "layers";
    const INDEX: usize = 5;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::LayersBuilt {
            results: &self.results,
        }
    }

    fn metrics(&self) -> StageMetrics {
        let emitted = self.results.iter().filter(|r| r.is_layer()).count();
        StageMetrics::Layers {
            emitted,
            skipped: self.results.len() - emitted,
            regions_removed: self.results.iter().map(|r| r.report.regions_removed).sum(),
            path_count: self.results.iter().map(|r| r.paths.len()).sum(),
        }
    }

    fn next(self) -> Result<Option<Stage>, VectorizeError> {
        Ok(Some(Stage::Assembled(self.assemble()?)))
    }

    fn complete(self) -> Result<VectorDocument, VectorizeError> {
        Ok(self.assemble()?.into_document())
    }
}

impl PipelineStage for Assembled {
    const NAME: &str = "assemble";
    const INDEX: usize = 6;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Assembled {
            document: &self.document,
        }
    }

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Assemble {
            layer_count: self.document.layers.len(),
            byte_size: self.document.metadata.byte_size,
        }
    }

    fn next(self) -> Result<Option<Stage>, VectorizeError> {
        Ok(None)
    }

    fn complete(self) -> Result<VectorDocument, VectorizeError> {
        Ok(self.into_document())
    }
}

/// Type-erased pipeline state, for driving the pipeline in a loop.
#[must_use]
pub enum Stage {
    /// See [`Pending`].
    Pending(Pending),
    /// See [`Classified`].
    Classified(Classified),
    /// See [`Preprocessed`].
    Preprocessed(Preprocessed),
    /// See [`PaletteExtracted`].
    PaletteExtracted(PaletteExtracted),
    /// See [`EdgesDetected`].
    EdgesDetected(EdgesDetected),
    /// See [`LayersBuilt`].
    LayersBuilt(LayersBuilt),
    /// See [`Assembled`].
    Assembled(Assembled),
}

/// Compile-time guard: if a [`Stage`] variant is added, this match becomes
/// non-exhaustive and the build fails, flagging [`STAGE_COUNT`].
#[allow(dead_code, clippy::match_same_arms)]
const fn _stage_count_guard(s: &Stage) {
    match s {
        Stage::Pending(_)
        | Stage::Classified(_)
        | Stage::Preprocessed(_)
        | Stage::PaletteExtracted(_)
        | Stage::EdgesDetected(_)
        | Stage::LayersBuilt(_)
        | Stage::Assembled(_) => {}
    }
}

/// Result of [`Stage::advance`]: either the next stage or the
/// completed final stage returned unchanged.
#[must_use]
pub enum Advance {
    /// The pipeline advanced to this next stage.
    Next(Stage),
    /// The pipeline was already at the final stage.
    Complete(Stage),
}

/// Delegate a method call to whichever `Stage` variant is active.
macro_rules! delegate {
    ($self:ident, $method:ident $(, $arg:expr)*) => {
        match $self {
            Self::Pending(s) => s.$method($($arg),*),
            Self::Classified(s) => s.$method($($arg),*),
            Self::Preprocessed(s) => s.$method($($arg),*),
            Self::PaletteExtracted(s) => s.$method($($arg),*),
            Self::EdgesDetected(s) => s.$method($($arg),*),
            Self::LayersBuilt(s) => s.$method($($arg),*),
            Self::Assembled(s) => s.$method($($arg),*),
        }
    };
}

impl Stage {
    /// Short name of the current stage.
    #[must_use]
    pub fn name(&self) -> &'static str {
        delegate!(self, name)
    }

    /// Zero-based index of the current stage.
    #[must_use]
    pub fn index(&self) -> usize {
        delegate!(self, index)
    }

    /// The output this stage produced.
    pub fn output(&self) -> StageOutput<'_> {
        delegate!(self, output)
    }

    /// Stage-specific metrics for diagnostics.
    #[must_use]
    pub fn metrics(&self) -> StageMetrics {
        delegate!(self, metrics)
    }

    /// Whether the pipeline is at the final stage.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        matches!(self, Self::Assembled(_))
    }

    /// Advance to the next stage.
    ///
    /// # Errors
    ///
    /// Returns [`VectorizeError`] if a fallible stage transition fails.
    pub fn next(self) -> Result<Option<Self>, VectorizeError> {
        delegate!(self, next)
    }

    /// Advance to the next stage, returning `self` unchanged if
    /// already complete.
    ///
    /// # Errors
    ///
    /// Returns [`VectorizeError`] if a fallible stage transition fails.
    pub fn advance(self) -> Result<Advance, VectorizeError> {
        if self.is_complete() {
            return Ok(Advance::Complete(self));
        }
        // Non-complete stages always return Ok(Some(_)) from next().
        #[allow(clippy::unreachable)]
        let next = self
            .next()?
            .unwrap_or_else(|| unreachable!("non-complete stage returned None from next()"));
        Ok(Advance::Next(next))
    }

    /// Run all remaining stages to completion.
    ///
    /// # Errors
    ///
    /// Returns [`VectorizeError`] if any remaining fallible stage fails.
    pub fn complete(self) -> Result<VectorDocument, VectorizeError> {
        delegate!(self, complete)
    }
}

// The trait's associated constants aren't callable as `self.NAME`, so the
// delegate macro goes through these.
trait StageMetadata {
    fn name(&self) -> &'static str;
    fn index(&self) -> usize;
}

impl<T: PipelineStage> StageMetadata for T {
    fn name(&self) -> &'static str {
        T::NAME
    }

    fn index(&self) -> usize {
        T::INDEX
    }
}

macro_rules! stage_from {
    ($($variant:ident),*) => {
        $(
            impl From<$variant> for Stage {
                fn from(s: $variant) -> Self {
                    Self::$variant(s)
                }
            }
        )*
    };
}

stage_from!(
    Pending,
    Classified,
    Preprocessed,
    PaletteExtracted,
    EdgesDetected,
    LayersBuilt,
    Assembled
);

// ───────────────────── Pipeline entry point ──────────────────────────

/// Incremental vectorization pipeline.
///
/// Each stage method consumes the current state and returns the next,
/// making it a compile-time error to skip stages or call them out of
/// order.
pub struct Pipeline;

impl Pipeline {
    /// Start a pipeline with a catalogue preset name (or `"auto"`).
    ///
    /// No processing is performed until [`Pending::classify`].
    #[allow(clippy::new_ret_no_self)]
    pub fn new(bitmap: Bitmap, preset_name: &str) -> Pending {
        Pending {
            bitmap,
            selection: PresetSelection::Named(preset_name.to_owned()),
        }
    }

    /// Start a pipeline with a caller-built preset.
    pub const fn with_preset(bitmap: Bitmap, preset: Preset) -> Pending {
        Pending {
            bitmap,
            selection: PresetSelection::Custom(preset),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::layers::{ColorOutcome, SkipReason};

    /// Dark square on a light background.
    fn square_bitmap(size: u32) -> Bitmap {
        let img = RgbImage::from_fn(size, size, |x, y| {
            let band = size / 4..3 * size / 4;
            if band.contains(&x) && band.contains(&y) {
                image::Rgb([20, 30, 120])
            } else {
                image::Rgb([250, 250, 245])
            }
        });
        Bitmap::from_rgb(img).unwrap()
    }

    #[test]
    fn pending_exposes_bitmap_and_selection() {
        let pending = Pipeline::new(square_bitmap(16), "6-colors");
        assert_eq!(pending.bitmap().width(), 16);
        assert_eq!(
            pending.selection(),
            &PresetSelection::Named("6-colors".to_owned())
        );
    }

    #[test]
    fn unknown_preset_fails_at_classify() {
        let result = Pipeline::new(square_bitmap(16), "sepia").classify();
        assert!(matches!(result, Err(VectorizeError::UnknownPreset(name)) if name == "sepia"));
    }

    #[test]
    fn invalid_custom_preset_fails_at_classify() {
        let preset = Preset {
            path_budget: 0,
            ..Preset::default()
        };
        let result = Pipeline::with_preset(square_bitmap(16), preset).classify();
        assert!(matches!(result, Err(VectorizeError::InvalidPreset(_))));
    }

    #[test]
    fn auto_resolves_to_a_concrete_preset() {
        let classified = Pipeline::new(square_bitmap(32), "auto").classify().unwrap();
        assert_ne!(classified.preset().name, AUTO);
        assert_eq!(
            classified.preset().name,
            classified.classification().recommended_preset()
        );
    }

    #[test]
    fn named_preset_is_kept() {
        let classified = Pipeline::new(square_bitmap(32), "black-and-white")
            .classify()
            .unwrap();
        assert_eq!(classified.preset().name, "black-and-white");
    }

    #[test]
    fn chained_stages_expose_intermediates() {
        let palette = Pipeline::new(square_bitmap(40), "3-colors")
            .classify()
            .unwrap()
            .preprocess()
            .extract_palette();
        assert_eq!(palette.palette().colors.len(), 3);
        let edges = palette.detect_edges();
        assert_eq!(edges.edges().dimensions().width, 40);
        let layers = edges.build_layers();
        assert_eq!(layers.results().len(), 3);
        assert_eq!(layers.reports().len(), 3);
        let doc = layers.assemble().unwrap().into_document();
        assert!(doc.layers.len() >= 2);
        assert_eq!((doc.width, doc.height), (40, 40));
    }

    #[test]
    fn custom_tracer_is_used() {
        struct Refusing;
        impl ContourTracer for Refusing {
            fn trace(
                &self,
                _: &crate::types::GrayImage,
                _: &crate::contour::TraceParams,
            ) -> Result<Vec<crate::contour::TracedPath>, crate::contour::TraceError> {
                Ok(Vec::new())
            }
        }
        let layers = Pipeline::new(square_bitmap(40), "3-colors")
            .classify()
            .unwrap()
            .preprocess()
            .extract_palette()
            .detect_edges()
            .build_layers_with(&Refusing);
        assert!(layers.results().iter().all(|r| !r.is_layer()));
        assert!(layers.results().iter().any(|r| {
            r.report.outcome == ColorOutcome::Skipped(SkipReason::EmptyTrace)
        }));
        assert!(matches!(
            layers.assemble(),
            Err(VectorizeError::NoLayersProduced { palette_size: 3 })
        ));
    }

    #[test]
    fn stage_names_and_indices() {
        let mut stage: Stage = Pipeline::new(square_bitmap(24), "3-colors").into();
        let mut seen = vec![(stage.index(), stage.name())];
        loop {
            match stage.advance().unwrap() {
                Advance::Next(next) => {
                    seen.push((next.index(), next.name()));
                    stage = next;
                }
                Advance::Complete(done) => {
                    stage = done;
                    break;
                }
            }
        }
        assert!(stage.is_complete());
        assert_eq!(seen.len(), STAGE_COUNT);
        assert_eq!(
            seen,
            vec![
                (0, "source"),
                (1, "classify"),
                (2, "preprocess"),
                (3, "palette"),
                (4, "edges"),
                (5, "layers"),
                (6, "assemble"),
            ]
        );
    }

    #[test]
    fn loop_to_completion_matches_chained_api() {
        let chained = Pipeline::new(square_bitmap(32), "6-colors")
            .classify()
            .unwrap()
            .preprocess()
            .extract_palette()
            .detect_edges()
            .build_layers()
            .assemble()
            .unwrap()
            .into_document();
        let looped = Stage::from(Pipeline::new(square_bitmap(32), "6-colors"))
            .complete()
            .unwrap();
        assert_eq!(chained, looped);
    }

    #[test]
    fn complete_from_mid_stage() {
        let mid: Stage = Pipeline::new(square_bitmap(32), "3-colors")
            .classify()
            .unwrap()
            .preprocess()
            .into();
        assert_eq!(mid.index(), 2);
        let doc = mid.complete().unwrap();
        assert!(!doc.layers.is_empty());
    }

    #[test]
    fn next_on_assembled_returns_none() {
        let done: Stage = Pipeline::new(square_bitmap(24), "3-colors")
            .classify()
            .unwrap()
            .preprocess()
            .extract_palette()
            .detect_edges()
            .build_layers()
            .assemble()
            .unwrap()
            .into();
        assert!(done.next().unwrap().is_none());
    }

    #[test]
    fn output_variant_matches_stage() {
        let pending = Pipeline::new(square_bitmap(24), "3-colors");
        assert!(matches!(pending.output(), StageOutput::Source { .. }));
        let classified = pending.classify().unwrap();
        assert!(matches!(classified.output(), StageOutput::Classified { .. }));
        let palette = classified.preprocess().extract_palette();
        assert!(matches!(
            palette.output(),
            StageOutput::PaletteExtracted { palette } if palette.colors.len() == 3
        ));
    }

    #[test]
    fn metrics_variant_matches_stage() {
        let pending = Pipeline::new(square_bitmap(24), "3-colors");
        assert!(matches!(
            pending.metrics(),
            StageMetrics::Source {
                width: 24,
                height: 24,
                channels: 3
            }
        ));
        let layers = pending
            .classify()
            .unwrap()
            .preprocess()
            .extract_palette()
            .detect_edges()
            .build_layers();
        assert!(matches!(
            layers.metrics(),
            StageMetrics::Layers { emitted, skipped, .. } if emitted + skipped == 3
        ));
    }
}
