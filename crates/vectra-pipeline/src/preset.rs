//! Named parameter bundles controlling output style.
//!
//! A [`Preset`] gathers every knob the pipeline exposes: color mode,
//! palette size, mask tolerance, speckle threshold, corner bias and
//! tracing parameters. Presets are immutable values selected by name
//! from the built-in catalogue ([`Preset::named`]), inferred from the
//! image ([`crate::classify::resolve_preset`]), or deserialized from
//! JSON for experimentation.

use serde::{Deserialize, Serialize};

use crate::contour::TurnPolicy;
use crate::types::VectorizeError;

/// Name of the generic, classifier-driven preset.
pub const AUTO: &str = "auto";

/// Every catalogue preset name, in display order.
pub const PRESET_NAMES: &[&str] = &[
    AUTO,
    "few-color-logo",
    "black-and-white",
    "3-colors",
    "6-colors",
    "16-colors",
    "shades-of-gray",
    "low-fidelity-photo",
    "high-fidelity-photo",
];

/// How the preprocessor treats color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ColorMode {
    /// Keep full RGB color.
    FullColor,
    /// Desaturate to gray levels.
    Grayscale,
    /// Single-channel grayscale with histogram normalization, split into
    /// two tones.
    TwoTone,
}

/// Target palette size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ColorCount {
    /// Derive from the classifier's distinct-color estimate, clamped to
    /// [`Preset::AUTO_MIN_COLORS`]..=[`Preset::AUTO_MAX_COLORS`].
    Auto,
    /// Exactly this many palette colors.
    Fixed(u8),
}

impl ColorCount {
    /// Resolve to a concrete palette size.
    ///
    /// `distinct_estimate` is the classifier's distinct-color count and is
    /// only consulted for [`ColorCount::Auto`].
    #[must_use]
    pub fn resolve(self, distinct_estimate: usize) -> usize {
        match self {
            Self::Auto => {
                distinct_estimate.clamp(Preset::AUTO_MIN_COLORS, Preset::AUTO_MAX_COLORS)
            }
            Self::Fixed(n) => usize::from(n),
        }
    }
}

/// A named configuration bundle for one tracing style.
///
/// Fields are public for experimentation; call [`validate`](Self::validate)
/// before handing a hand-built preset to the pipeline (the pipeline entry
/// points do this themselves).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    /// Catalogue name (or a user label for custom presets).
    pub name: String,

    /// Color treatment applied by the preprocessor.
    pub mode: ColorMode,

    /// Target palette size.
    pub colors: ColorCount,

    /// Base perceptual-distance tolerance (0-255 units) for mask
    /// membership. Tighter values fragment less-uniform regions; looser
    /// values let neighboring colors bleed together.
    pub tolerance: f64,

    /// Connected regions with fewer pixels than this are speckle and get
    /// removed before tracing. Also the minimum enclosed area of a traced
    /// contour. Any value is accepted; 0 and 1 disable speckle removal.
    pub noise_area: u32,

    /// Corner bias in `[0, 1]`. Higher keeps more vertices as sharp
    /// corners (closer to polygonal output); lower smooths more of them
    /// into curves.
    pub corners: f64,

    /// Maximum number of paths emitted per color layer. The largest paths
    /// by enclosed area win.
    pub path_budget: usize,

    /// Apply blur-then-sharpen noise suppression during preprocessing.
    pub photographic: bool,

    /// How ambiguous diagonal pixel configurations are resolved before
    /// tracing.
    pub turn_policy: TurnPolicy,

    /// Mask binarization threshold used by the tracer, in `1..=255`.
    /// Zero would make every pixel foreground.
    pub threshold: u8,

    /// Curve-optimization tolerance in pixels (Ramer-Douglas-Peucker).
    pub curve_tolerance: f64,

    /// Longest axis (pixels) of the image used for palette extraction.
    pub working_resolution: u32,
}

impl Preset {
    /// Lower clamp for automatic palette sizes.
    pub const AUTO_MIN_COLORS: usize = 3;
    /// Upper clamp for automatic palette sizes.
    pub const AUTO_MAX_COLORS: usize = 16;
    /// Largest accepted fixed palette size.
    pub const MAX_FIXED_COLORS: u8 = 64;
    /// Default working resolution for palette extraction.
    pub const DEFAULT_WORKING_RESOLUTION: u32 = 400;
    /// Default tracer binarization threshold.
    pub const DEFAULT_THRESHOLD: u8 = 128;

    /// Look up a catalogue preset by name.
    ///
    /// Names are matched case-insensitively; underscores and spaces are
    /// accepted in place of hyphens.
    ///
    /// # Errors
    ///
    /// Returns [`VectorizeError::UnknownPreset`] for names not in
    /// [`PRESET_NAMES`].
    pub fn named(name: &str) -> Result<Self, VectorizeError> {
        let key = name.trim().to_ascii_lowercase().replace(['_', ' '], "-");
        let preset = match key.as_str() {
            AUTO => Self::automatic(),
            "few-color-logo" | "logo" => Self::few_color_logo(),
            "black-and-white" | "black-and-white-logo" => Self::black_and_white(),
            "3-colors" => Self::fixed_colors("3-colors", 3, 56.0, 12, 0.6),
            "6-colors" => Self::fixed_colors("6-colors", 6, 44.0, 10, 0.5),
            "16-colors" => Self::fixed_colors("16-colors", 16, 32.0, 6, 0.4),
            "shades-of-gray" => Self::shades_of_gray(),
            "low-fidelity-photo" => Self::low_fidelity_photo(),
            "high-fidelity-photo" => Self::high_fidelity_photo(),
            _ => return Err(VectorizeError::UnknownPreset(name.to_owned())),
        };
        Ok(preset)
    }

    /// All catalogue presets, in [`PRESET_NAMES`] order.
    #[must_use]
    pub fn catalogue() -> Vec<Self> {
        PRESET_NAMES
            .iter()
            .filter_map(|name| Self::named(name).ok())
            .collect()
    }

    /// The generic preset used when classification is inconclusive.
    #[must_use]
    pub fn automatic() -> Self {
        Self {
            name: AUTO.to_owned(),
            mode: ColorMode::FullColor,
            colors: ColorCount::Auto,
            tolerance: 40.0,
            noise_area: 8,
            corners: 0.5,
            path_budget: 2000,
            photographic: false,
            turn_policy: TurnPolicy::Majority,
            threshold: Self::DEFAULT_THRESHOLD,
            curve_tolerance: 1.0,
            working_resolution: Self::DEFAULT_WORKING_RESOLUTION,
        }
    }

    /// Few flat colors with crisp edges.
    #[must_use]
    pub fn few_color_logo() -> Self {
        Self {
            name: "few-color-logo".to_owned(),
            tolerance: 28.0,
            noise_area: 12,
            corners: 0.75,
            path_budget: 500,
            ..Self::automatic()
        }
    }

    /// Two-tone line art and silhouettes.
    #[must_use]
    pub fn black_and_white() -> Self {
        Self {
            name: "black-and-white".to_owned(),
            mode: ColorMode::TwoTone,
            colors: ColorCount::Fixed(2),
            tolerance: 64.0,
            noise_area: 16,
            corners: 0.75,
            path_budget: 500,
            ..Self::automatic()
        }
    }

    /// Gray levels only.
    #[must_use]
    pub fn shades_of_gray() -> Self {
        Self {
            name: "shades-of-gray".to_owned(),
            mode: ColorMode::Grayscale,
            colors: ColorCount::Fixed(8),
            tolerance: 32.0,
            turn_policy: TurnPolicy::Minority,
            corners: 0.4,
            ..Self::automatic()
        }
    }

    /// Posterized photograph: few colors, heavy speckle removal.
    #[must_use]
    pub fn low_fidelity_photo() -> Self {
        Self {
            name: "low-fidelity-photo".to_owned(),
            colors: ColorCount::Fixed(8),
            tolerance: 48.0,
            noise_area: 16,
            corners: 0.25,
            path_budget: 1500,
            photographic: true,
            turn_policy: TurnPolicy::Minority,
            curve_tolerance: 1.5,
            ..Self::automatic()
        }
    }

    /// Detailed photograph: many colors, small features kept.
    #[must_use]
    pub fn high_fidelity_photo() -> Self {
        Self {
            name: "high-fidelity-photo".to_owned(),
            colors: ColorCount::Fixed(16),
            tolerance: 36.0,
            noise_area: 4,
            corners: 0.2,
            path_budget: 5000,
            photographic: true,
            turn_policy: TurnPolicy::Minority,
            curve_tolerance: 0.75,
            ..Self::automatic()
        }
    }

    fn fixed_colors(name: &str, colors: u8, tolerance: f64, noise_area: u32, corners: f64) -> Self {
        Self {
            name: name.to_owned(),
            colors: ColorCount::Fixed(colors),
            tolerance,
            noise_area,
            corners,
            path_budget: 1000 * usize::from(colors).div_ceil(4),
            ..Self::automatic()
        }
    }

    /// Check every parameter against its accepted range.
    ///
    /// # Errors
    ///
    /// Returns [`VectorizeError::InvalidPreset`] naming the first
    /// offending field.
    pub fn validate(&self) -> Result<(), VectorizeError> {
        let invalid = |msg: String| Err(VectorizeError::InvalidPreset(msg));
        if self.name.trim().is_empty() {
            return invalid("name must not be empty".to_owned());
        }
        if let ColorCount::Fixed(n) = self.colors
            && !(1..=Self::MAX_FIXED_COLORS).contains(&n)
        {
            return invalid(format!(
                "colors must be in 1..={}, got {n}",
                Self::MAX_FIXED_COLORS
            ));
        }
        if !self.tolerance.is_finite() || self.tolerance <= 0.0 || self.tolerance > 255.0 {
            return invalid(format!(
                "tolerance must be in (0, 255], got {}",
                self.tolerance
            ));
        }
        if !(0.0..=1.0).contains(&self.corners) {
            return invalid(format!("corners must be in [0, 1], got {}", self.corners));
        }
        if !self.curve_tolerance.is_finite() || self.curve_tolerance < 0.0 {
            return invalid(format!(
                "curve_tolerance must be finite and >= 0, got {}",
                self.curve_tolerance
            ));
        }
        if self.path_budget == 0 {
            return invalid("path_budget must be at least 1".to_owned());
        }
        if self.threshold == 0 {
            return invalid("threshold must be in 1..=255, got 0".to_owned());
        }
        if self.working_resolution == 0 {
            return invalid("working_resolution must be at least 1".to_owned());
        }
        Ok(())
    }
}

impl Default for Preset {
    fn default() -> Self {
        Self::automatic()
    }
}
