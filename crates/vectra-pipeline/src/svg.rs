//! SVG serialization of a [`VectorDocument`].
//!
//! Built with the [`svg`](::svg) crate, which handles attribute
//! formatting and XML escaping. Each layer becomes a `<g>` carrying the
//! fill; its paths are plain `<path d="...">` children. The output is a
//! pure function of the document's geometry, preset name and
//! classification, so identical documents serialize byte-identically.
//!
//! The `byte_size` and `fingerprint` metadata fields are *derived* from
//! this serialization and are therefore not embedded in it.

use std::hash::Hasher;

use ::svg::Document;
use ::svg::node::Text;
use ::svg::node::element::{Description, Group, Path, Title};
use siphasher::sip::SipHasher13;

use crate::assemble::VectorDocument;

/// Fixed SipHash key so fingerprints are stable across runs and builds.
const FINGERPRINT_KEY: (u64, u64) = (0x7665_6374_7261_0001, 0x7376_6764_6f63_0001);

/// Serialize `document` to SVG markup, XML declaration included.
#[must_use]
pub fn to_svg(document: &VectorDocument) -> String {
    let (w, h) = (document.width, document.height);
    let meta = &document.metadata;
    let description = format!(
        "preset={} colors={} paths={} distinct={} contrast={:.4} complexity={:.5}",
        meta.preset,
        meta.color_count,
        meta.path_count,
        meta.classification.distinct_colors,
        meta.classification.average_contrast,
        meta.classification.complexity_ratio,
    );

    let mut doc = Document::new()
        .set("width", w)
        .set("height", h)
        .set("viewBox", (0, 0, w, h))
        .add(Title::new("vectra trace"))
        .add(Description::new().add(Text::new(description)));

    for (i, layer) in document.layers.iter().enumerate() {
        let mut group = Group::new()
            .set("id", format!("layer-{i}"))
            .set("fill", layer.color.hex.as_str())
            .set("stroke", "none")
            .set("fill-rule", "evenodd");
        for d in &layer.paths {
            group = group.add(Path::new().set("d", d.as_str()));
        }
        doc = doc.add(group);
    }

    // The svg crate omits the XML declaration, so we prepend it.
    format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{doc}\n")
}

/// 64-bit SipHash-1-3 content fingerprint of a serialization.
#[must_use]
pub fn fingerprint(serialized: &str) -> u64 {
    let mut hasher = SipHasher13::new_with_keys(FINGERPRINT_KEY.0, FINGERPRINT_KEY.1);
    hasher.write(serialized.as_bytes());
    hasher.finish()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::assemble::{DocumentMetadata, VectorLayer};
    use crate::classify::{Classification, ImageClass};
    use crate::palette::PaletteColor;

    fn document(layers: Vec<VectorLayer>) -> VectorDocument {
        let path_count = layers.iter().map(|l| l.paths.len()).sum();
        VectorDocument {
            width: 40,
            height: 30,
            metadata: DocumentMetadata {
                preset: "few-color-logo".to_owned(),
                classification: Classification {
                    distinct_colors: 2,
                    average_contrast: 0.1,
                    complexity_ratio: 0.002,
                    samples: 1200,
                    class: ImageClass::FewColorLogo,
                },
                color_count: layers.len(),
                path_count,
                byte_size: 0,
                fingerprint: 0,
            },
            layers,
        }
    }

    fn layer(index: usize, rgb: [u8; 3], paths: &[&str]) -> VectorLayer {
        VectorLayer {
            color: PaletteColor::new(index, rgb, 1),
            paths: paths.iter().map(|&p| p.to_owned()).collect(),
        }
    }

    #[test]
    fn svg_has_declaration_and_viewbox() {
        let svg = to_svg(&document(vec![]));
        assert!(svg.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<svg"));
        assert!(svg.contains("viewBox=\"0 0 40 30\""));
        assert!(svg.contains("xmlns=\"http://www.w3.org/2000/svg\""));
        assert!(svg.trim_end().ends_with("</svg>"));
    }

    #[test]
    fn layers_become_filled_groups_in_order() {
        let doc = document(vec![
            layer(1, [255, 255, 255], &["M0,0 L40,0 L40,30 L0,30 Z"]),
            layer(0, [16, 32, 48], &["M5,5 L10,5 L10,10 Z", "M20,20 L25,20 L25,25 Z"]),
        ]);
        let svg = to_svg(&doc);
        let white = svg.find("fill=\"#ffffff\"").unwrap();
        let dark = svg.find("fill=\"#102030\"").unwrap();
        assert!(white < dark, "{svg}");
        assert!(svg.contains("id=\"layer-0\""));
        assert!(svg.contains("id=\"layer-1\""));
        assert_eq!(svg.matches("fill-rule=\"evenodd\"").count(), 2);
        assert_eq!(svg.matches("stroke=\"none\"").count(), 2);
        assert_eq!(svg.matches("<path").count(), 3);
    }

    #[test]
    fn description_carries_preset_and_counts() {
        let svg = to_svg(&document(vec![layer(0, [0, 0, 0], &["M0,0 L1,0 L1,1 Z"])]));
        assert!(svg.contains("<desc>"));
        assert!(svg.contains("preset=few-color-logo colors=1 paths=1"));
    }

    #[test]
    fn serialization_is_deterministic() {
        let doc = document(vec![layer(0, [9, 9, 9], &["M0,0 L1,0 L1,1 Z"])]);
        assert_eq!(to_svg(&doc), to_svg(&doc.clone()));
    }

    #[test]
    fn fingerprint_is_stable_and_content_sensitive() {
        assert_eq!(fingerprint("abc"), fingerprint("abc"));
        assert_ne!(fingerprint("abc"), fingerprint("abd"));
    }
}
