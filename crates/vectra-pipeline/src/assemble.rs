//! Document assembly: order layers and derive the metadata.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::classify::Classification;
use crate::layers::ColorResult;
use crate::palette::PaletteColor;
use crate::types::{Dimensions, VectorizeError};

/// One color's closed paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorLayer {
    /// Fill color.
    pub color: PaletteColor,
    /// Path data strings (absolute `M`/`L`/`Q`/`Z`), largest area first.
    pub paths: Vec<String>,
}

/// Summary carried alongside the layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Name of the preset the run used (the resolved one for `auto`).
    pub preset: String,
    /// Classifier measurements of the source image.
    pub classification: Classification,
    /// Number of layers.
    pub color_count: usize,
    /// Total paths across all layers.
    pub path_count: usize,
    /// Length in bytes of [`VectorDocument::to_svg`].
    pub byte_size: usize,
    /// SipHash-1-3 of [`VectorDocument::to_svg`].
    pub fingerprint: u64,
}

/// A layered vector document, background first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorDocument {
    /// Width in pixels of the source bitmap.
    pub width: u32,
    /// Height in pixels of the source bitmap.
    pub height: u32,
    /// Layers in rendering order.
    pub layers: Vec<VectorLayer>,
    /// Derived metadata.
    pub metadata: DocumentMetadata,
}

impl VectorDocument {
    /// Serialize to SVG markup.
    #[must_use]
    pub fn to_svg(&self) -> String {
        crate::svg::to_svg(self)
    }
}

/// Rendering order: lighter colors first, ties by palette index.
#[must_use]
pub fn layer_order(a: &PaletteColor, b: &PaletteColor) -> Ordering {
    b.luminance()
        .total_cmp(&a.luminance())
        .then(a.index.cmp(&b.index))
}

/// Merge per-color results into a document.
///
/// # Errors
///
/// Returns [`VectorizeError::NoLayersProduced`] if no color produced a
/// layer.
pub fn assemble(
    dimensions: Dimensions,
    results: Vec<ColorResult>,
    preset: &str,
    classification: Classification,
) -> Result<VectorDocument, VectorizeError> {
    let palette_size = results.len();
    let mut layers: Vec<VectorLayer> = results
        .into_iter()
        .filter(ColorResult::is_layer)
        .map(|r| VectorLayer {
            color: r.color,
            paths: r.paths.into_iter().map(|p| p.data).collect(),
        })
        .collect();
    if layers.is_empty() {
        return Err(VectorizeError::NoLayersProduced { palette_size });
    }
    layers.sort_by(|a, b| layer_order(&a.color, &b.color));

    let path_count = layers.iter().map(|l| l.paths.len()).sum();
    let mut document = VectorDocument {
        width: dimensions.width,
        height: dimensions.height,
        metadata: DocumentMetadata {
            preset: preset.to_owned(),
            classification,
            color_count: layers.len(),
            path_count,
            byte_size: 0,
            fingerprint: 0,
        },
        layers,
    };
    let svg = document.to_svg();
    document.metadata.byte_size = svg.len();
    document.metadata.fingerprint = crate::svg::fingerprint(&svg);
    log::debug!(
        "assembled {} layers, {} paths, {} bytes",
        document.metadata.color_count,
        path_count,
        svg.len()
    );
    Ok(document)
}
