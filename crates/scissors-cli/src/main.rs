//! scissors-cli: Headless selection driver.
//!
//! Loads an image, places anchors with the chosen strategy, closes the
//! polygon, optionally drags vertices, and writes the cropped selection as
//! a PNG. Useful for:
//!
//! - Comparing point-to-point and the scissors cost variants on real images
//! - Tuning the search radius
//! - Producing cut-outs from a fixed list of anchors
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin scissors-cli -- [OPTIONS] <IMAGE_PATH> --point X,Y --point X,Y ...
//! ```
//!
//! Set `RUST_LOG=debug` to follow state transitions and searches.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use scissors_select::{
    Point, SelectionEvent, SelectionModel, SelectorConfig, StrategyKind, Topic, decode_image,
};

/// Outline a region of an image and write the cropped selection.
///
/// Anchors are connected in the order given and the polygon is closed back
/// to the first one.
#[derive(Parser)]
#[command(name = "scissors-cli", version)]
struct Cli {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    image_path: PathBuf,

    /// Anchor point as `X,Y`. Repeat for each vertex.
    #[arg(long = "point", value_parser = parse_point, required = true)]
    points: Vec<Point>,

    /// How anchors are connected: `point-to-point`, `CrossGradMono`,
    /// `ColorWeigher` or `LuminanceWeigher`.
    #[arg(long, default_value_t = StrategyKind::default())]
    strategy: StrategyKind,

    /// Chebyshev radius searched around each anchor.
    #[arg(long, default_value_t = SelectorConfig::DEFAULT_SEARCH_RADIUS)]
    search_radius: u32,

    /// Search the whole image from every anchor.
    #[arg(long, conflicts_with = "search_radius")]
    unbounded: bool,

    /// Move a vertex of the finished polygon, as `INDEX:X,Y`. Applied in
    /// order after closing.
    #[arg(long = "move", value_parser = parse_move)]
    moves: Vec<(usize, Point)>,

    /// Write the cropped selection PNG to this file.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Print the finished segments as JSON instead of a summary.
    #[arg(long)]
    json: bool,

    /// Full selector config as a JSON string.
    ///
    /// When provided, `--strategy`, `--search-radius` and `--unbounded`
    /// are ignored. The JSON must be a valid `SelectorConfig`
    /// serialization; missing fields take their defaults.
    #[arg(long)]
    config_json: Option<String>,
}

/// Parse `X,Y`.
fn parse_point(s: &str) -> Result<Point, String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y but got {s:?}"))?;
    let x = x.trim().parse().map_err(|e| format!("bad x in {s:?}: {e}"))?;
    let y = y.trim().parse().map_err(|e| format!("bad y in {s:?}: {e}"))?;
    Ok(Point::new(x, y))
}

/// Parse `INDEX:X,Y`.
fn parse_move(s: &str) -> Result<(usize, Point), String> {
    let (index, point) = s
        .split_once(':')
        .ok_or_else(|| format!("expected INDEX:X,Y but got {s:?}"))?;
    let index = index
        .trim()
        .parse()
        .map_err(|e| format!("bad index in {s:?}: {e}"))?;
    Ok((index, parse_point(point)?))
}

/// Build a [`SelectorConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and the
/// individual flags are ignored.
fn config_from_cli(cli: &Cli) -> Result<SelectorConfig, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    Ok(SelectorConfig {
        strategy: cli.strategy,
        search_radius: (!cli.unbounded).then_some(cli.search_radius),
        ..SelectorConfig::default()
    })
}

/// Place every anchor, close the polygon and apply the moves.
fn run_selection(model: &mut SelectionModel, cli: &Cli) -> Result<(), String> {
    for &p in &cli.points {
        model
            .add_point(p)
            .map_err(|e| format!("Error adding point {p}: {e}"))?;
        model
            .wait_idle()
            .map_err(|e| format!("Search from {p} failed: {e}"))?;
    }
    model
        .finish_selection()
        .map_err(|e| format!("Error closing the selection: {e}"))?;

    for &(index, p) in &cli.moves {
        model
            .move_point(index, p)
            .map_err(|e| format!("Error moving vertex {index} to {p}: {e}"))?;
        model
            .wait_idle()
            .map_err(|e| format!("Search from {p} failed: {e}"))?;
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let image_bytes = match std::fs::read(&cli.image_path) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Error reading {}: {e}", cli.image_path.display());
            return ExitCode::FAILURE;
        }
    };

    let image = match decode_image(&image_bytes) {
        Ok(image) => image,
        Err(e) => {
            eprintln!("Error decoding {}: {e}", cli.image_path.display());
            return ExitCode::FAILURE;
        }
    };

    eprintln!(
        "Image: {} ({}x{})",
        cli.image_path.display(),
        image.width(),
        image.height(),
    );
    eprintln!("Config: {config:#?}");
    eprintln!();

    let mut model = SelectionModel::new(image, config);
    model.subscribe(Topic::State, |event| {
        if let SelectionEvent::State(state) = event {
            log::info!("state: {state}");
        }
    });
    model.subscribe(Topic::Progress, |event| {
        if let SelectionEvent::Progress(percent) = event {
            log::debug!("search progress: {percent}%");
        }
    });

    if let Err(msg) = run_selection(&mut model, &cli) {
        eprintln!("{msg}");
        return ExitCode::FAILURE;
    }

    if cli.json {
        match serde_json::to_string_pretty(model.segments()) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Error serializing segments: {e}");
                return ExitCode::FAILURE;
            }
        }
    } else {
        println!("State: {}", model.state());
        println!("Segments: {}", model.segments().len());
        for (i, segment) in model.segments().iter().enumerate() {
            println!(
                "  {i:>3}: {} -> {} ({} points)",
                segment.start(),
                segment.end(),
                segment.len(),
            );
        }
    }

    if let Some(ref path) = cli.output {
        let written = File::create(path)
            .map_err(scissors_select::SelectionError::from)
            .and_then(|file| model.save_selection(BufWriter::new(file)));
        match written {
            Ok(()) => eprintln!("Selection written to {}", path.display()),
            Err(e) => {
                eprintln!("Error writing selection to {}: {e}", path.display());
                return ExitCode::FAILURE;
            }
        }
    }

    ExitCode::SUCCESS
}
