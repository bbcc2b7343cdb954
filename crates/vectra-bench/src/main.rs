//! vectra-bench: CLI tool for tracing images and inspecting diagnostics.
//!
//! Runs the vectorization pipeline on a given image file with a catalogue
//! preset (optionally tweaked from the command line), printing detailed
//! per-stage and per-color diagnostics. Useful for:
//!
//! - Comparing presets on the same image
//! - Tuning color tolerance, noise area and corner bias
//! - Measuring per-stage durations to identify bottlenecks
//! - Seeing why a palette color produced no layer
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin vectra-bench -- [OPTIONS] <IMAGE_PATH>
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::Parser;
use vectra_pipeline::diagnostics::{Clock, PipelineDiagnostics};
use vectra_pipeline::{AUTO, ColorCount, ContourTracerKind, Pipeline, Preset};

/// Trace raster images into layered SVG and report diagnostics.
///
/// Runs the vectorization pipeline on a given image with a named preset
/// and prints per-stage timing plus the outcome of every palette color.
#[derive(Parser)]
#[command(name = "vectra-bench", version)]
struct Cli {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    #[arg(required_unless_present = "list_presets")]
    image_path: Option<PathBuf>,

    /// Catalogue preset name, or "auto" to let the classifier choose.
    #[arg(long, default_value = AUTO)]
    preset: String,

    /// Fixed palette size, overriding the preset.
    #[arg(long, value_parser = clap::builder::RangedU64ValueParser::<u8>::new().range(1..=u64::from(Preset::MAX_FIXED_COLORS)))]
    colors: Option<u8>,

    /// Color-distance tolerance, overriding the preset.
    #[arg(long)]
    tolerance: Option<f64>,

    /// Speckle area in pixels, overriding the preset.
    #[arg(long)]
    noise_area: Option<u32>,

    /// Corner bias in [0, 1], overriding the preset.
    #[arg(long)]
    corners: Option<f64>,

    /// Full preset as a JSON string.
    ///
    /// When provided, `--preset` and the override flags are ignored. The
    /// JSON must be a valid `Preset` serialization.
    #[arg(long)]
    preset_json: Option<String>,

    /// Write SVG output to file.
    #[arg(long)]
    svg: Option<PathBuf>,

    /// Number of runs for averaging.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,

    /// Output diagnostics as JSON instead of human-readable report.
    #[arg(long)]
    json: bool,

    /// Print the preset catalogue and exit.
    #[arg(long)]
    list_presets: bool,
}

impl Cli {
    const fn has_overrides(&self) -> bool {
        self.colors.is_some()
            || self.tolerance.is_some()
            || self.noise_area.is_some()
            || self.corners.is_some()
    }
}

/// Build the run's [`Preset`] from CLI arguments.
///
/// If `--preset-json` is provided, the JSON is parsed directly and all
/// other preset flags are ignored. Otherwise the named preset is looked
/// up and the override flags are applied on top of it.
fn preset_from_cli(cli: &Cli) -> Result<Preset, String> {
    if let Some(ref json) = cli.preset_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --preset-json: {e}"));
    }

    let base = Preset::named(&cli.preset).map_err(|e| e.to_string())?;
    if !cli.has_overrides() {
        return Ok(base);
    }
    if base.name == AUTO {
        return Err(
            "Override flags need a concrete --preset; \"auto\" is resolved per image".to_owned(),
        );
    }

    Ok(Preset {
        name: format!("{}-custom", base.name),
        colors: cli.colors.map_or(base.colors, ColorCount::Fixed),
        tolerance: cli.tolerance.unwrap_or(base.tolerance),
        noise_area: cli.noise_area.unwrap_or(base.noise_area),
        corners: cli.corners.unwrap_or(base.corners),
        ..base
    })
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    if cli.list_presets {
        print_catalogue();
        return ExitCode::SUCCESS;
    }
    let Some(ref image_path) = cli.image_path else {
        eprintln!("An image path is required");
        return ExitCode::FAILURE;
    };

    let preset = match preset_from_cli(&cli) {
        Ok(p) => p,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let image_bytes = match std::fs::read(image_path) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Error reading {}: {e}", image_path.display());
            return ExitCode::FAILURE;
        }
    };

    eprintln!(
        "Image: {} ({} bytes)",
        image_path.display(),
        image_bytes.len(),
    );
    eprintln!("Preset: {preset:#?}");
    eprintln!("Runs: {}", cli.runs);
    eprintln!();

    let bitmap = match vectra_pipeline::decode::decode(&image_bytes) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("Error decoding {}: {e}", image_path.display());
            return ExitCode::FAILURE;
        }
    };
    log::info!(
        "decoded {}x{} ({:?})",
        bitmap.width(),
        bitmap.height(),
        bitmap.channels()
    );

    let tracer = ContourTracerKind::default();
    let mut all_diagnostics = Vec::with_capacity(cli.runs);

    for run in 0..cli.runs {
        if cli.runs > 1 {
            eprintln!("--- Run {}/{} ---", run + 1, cli.runs);
        }

        let pending = Pipeline::with_preset(bitmap.clone(), preset.clone());
        match vectra_pipeline::run_with_diagnostics(pending, &tracer, &StdClock) {
            Ok((document, diagnostics)) => {
                if cli.json {
                    match serde_json::to_string_pretty(&diagnostics) {
                        Ok(json) => println!("{json}"),
                        Err(e) => {
                            eprintln!("Error serializing diagnostics: {e}");
                            return ExitCode::FAILURE;
                        }
                    }
                } else {
                    println!("{}", diagnostics.report());
                }

                // Write SVG on the first run only.
                if run == 0
                    && let Some(ref svg_path) = cli.svg
                {
                    let svg = document.to_svg();
                    match std::fs::write(svg_path, &svg) {
                        Ok(()) => {
                            eprintln!(
                                "SVG written to {} ({} bytes, fingerprint {:016x})",
                                svg_path.display(),
                                svg.len(),
                                document.metadata.fingerprint,
                            );
                        }
                        Err(e) => {
                            eprintln!("Error writing SVG to {}: {e}", svg_path.display());
                        }
                    }
                }

                all_diagnostics.push(diagnostics);
            }
            Err(e) => {
                eprintln!("Pipeline error: {e}");
                return ExitCode::FAILURE;
            }
        }

        if cli.runs > 1 {
            eprintln!();
        }
    }

    // Print summary when multiple runs.
    if cli.runs > 1 {
        print_multi_run_summary(&all_diagnostics);
    }

    ExitCode::SUCCESS
}

/// Print one line per catalogue preset.
fn print_catalogue() {
    println!(
        "{:<22} {:<11} {:>7} {:>9} {:>6} {:>8}",
        "Preset", "Mode", "Colors", "Tolerance", "Noise", "Corners"
    );
    println!("{}", "-".repeat(68));
    for preset in Preset::catalogue() {
        let colors = match preset.colors {
            ColorCount::Auto => "auto".to_owned(),
            ColorCount::Fixed(n) => n.to_string(),
        };
        println!(
            "{:<22} {:<11} {:>7} {:>9.1} {:>6} {:>8.2}",
            preset.name,
            format!("{:?}", preset.mode),
            colors,
            preset.tolerance,
            preset.noise_area,
            preset.corners,
        );
    }
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

/// Function pointer type for extracting a stage duration from diagnostics.
type StageExtractor = fn(&PipelineDiagnostics) -> Duration;

/// Print aggregated statistics across multiple runs.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(all_diagnostics: &[PipelineDiagnostics]) {
    debug_assert!(!all_diagnostics.is_empty(), "no diagnostics to summarize");

    println!();
    println!(
        "Summary ({} runs)\n{}",
        all_diagnostics.len(),
        "=".repeat(60),
    );

    if all_diagnostics.is_empty() {
        println!("Warning: no diagnostics to summarize");
        return;
    }

    let durations: Vec<f64> = all_diagnostics
        .iter()
        .map(|d| d.total_duration.as_secs_f64() * 1000.0)
        .collect();

    let min = durations.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = durations.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let mean = durations.iter().sum::<f64>() / durations.len() as f64;

    println!("Total duration: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms");

    // Per-stage means.
    println!();
    println!("{:<24} {:>12}", "Stage", "Mean (ms)");
    println!("{}", "-".repeat(40));

    let stage_extractors: &[(&str, StageExtractor)] = &[
        ("Classify", |d| d.classify.duration),
        ("Preprocess", |d| d.preprocess.duration),
        ("Palette", |d| d.palette.duration),
        ("Edges", |d| d.edges.duration),
        ("Layers", |d| d.layers.duration),
        ("Assemble", |d| d.assemble.duration),
    ];

    for (name, extractor) in stage_extractors {
        let stage_mean = all_diagnostics
            .iter()
            .map(|d| extractor(d).as_secs_f64() * 1000.0)
            .sum::<f64>()
            / all_diagnostics.len() as f64;
        println!("{name:<24} {stage_mean:>10.3}ms");
    }

    // Layer counts should not change between runs.
    let layer_counts: Vec<usize> = all_diagnostics
        .iter()
        .map(|d| d.summary.layer_count)
        .collect();
    if layer_counts.windows(2).any(|w| w[0] != w[1]) {
        println!();
        println!("Warning: layer counts differ between runs: {layer_counts:?}");
    }
}
