//! mugshot: standardize a batch of portrait photos from the command line.
//!
//! Finds the face in every input, crops it with padding, optionally
//! resizes, swaps the greenscreen for a background, rotates, converts to
//! grayscale and cuts a circle, then writes `img0.png`, `img1.png`, ... to
//! the output directory.
//!
//! # Usage
//!
//! ```text
//! mugshot -f photos/ -o headshots -s 300 300 -c
//! mugshot -i a.jpg -i b.jpg -b studio.png -g --json
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use mugshot_io::IoError;
use mugshot_pipeline::{CascadeDetector, PipelineConfig, TargetSize, process_batch};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Standardize portrait photos: face crop, resize, greenscreen, rotate,
/// grayscale, circle.
#[derive(Parser, Debug)]
#[command(name = "mugshot", version)]
struct Cli {
    /// Input image (repeatable).
    #[arg(short = 'i', long = "image", value_name = "PATH")]
    images: Vec<PathBuf>,

    /// Folder whose files are all inputs.
    #[arg(short = 'f', long)]
    folder: Option<PathBuf>,

    /// Output directory (created if missing).
    #[arg(short = 'o', long, default_value = "output")]
    output: PathBuf,

    /// Pixels of padding around each face.
    #[arg(short = 'p', long, default_value_t = PipelineConfig::DEFAULT_PADDING)]
    padding: u32,

    /// Background image replacing the greenscreen.
    #[arg(short = 'b', long)]
    background: Option<PathBuf>,

    /// Rotate counter-clockwise by this many degrees.
    #[arg(short = 'r', long, allow_negative_numbers = true)]
    rotation: Option<f32>,

    /// Convert to grayscale.
    #[arg(short = 'g', long)]
    grayscale: bool,

    /// Resize every face to X by Y pixels.
    #[arg(short = 's', long, num_args = 1..=2, value_names = ["X", "Y"])]
    size: Option<Vec<u32>>,

    /// Cut a circle out of each image.
    #[arg(short = 'c', long)]
    circle: bool,

    /// Haar cascade XML used for face detection.
    #[arg(long, default_value = mugshot_io::DEFAULT_CASCADE_PATH)]
    cascade: PathBuf,

    /// Print the batch report as JSON instead of text.
    #[arg(long)]
    json: bool,

    /// Log debug output (overridden by `RUST_LOG`).
    #[arg(short = 'v', long)]
    verbose: bool,
}

/// Build a [`PipelineConfig`] from CLI arguments.
///
/// A `-s` with a single value is reported and the batch runs without
/// resizing. A background that cannot be loaded is an error.
fn config_from_cli(cli: &Cli) -> Result<PipelineConfig, IoError> {
    let mut config = PipelineConfig::default()
        .with_padding(cli.padding)
        .with_grayscale(cli.grayscale)
        .with_circle(cli.circle);

    match TargetSize::from_values(cli.size.as_deref().unwrap_or_default()) {
        Ok(Some(size)) => config = config.with_size(size),
        Ok(None) => {}
        Err(e) => error!("{e}; images will not be resized"),
    }

    if let Some(ref path) = cli.background {
        config = config.with_background(mugshot_io::load_background(path)?);
    }

    if let Some(degrees) = cli.rotation {
        config = config.with_rotation(degrees);
    }

    Ok(config)
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_detector(path: &Path) -> Result<CascadeDetector, IoError> {
    mugshot_io::load_cascade(path).map(CascadeDetector::new)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let detector = match load_detector(&cli.cascade) {
        Ok(detector) => detector,
        Err(e) => {
            error!("cannot load face cascade: {e}");
            return ExitCode::FAILURE;
        }
    };

    let config = match config_from_cli(&cli) {
        Ok(config) => config,
        Err(e) => {
            error!("cannot load background: {e}");
            return ExitCode::FAILURE;
        }
    };

    let batch = mugshot_io::load_batch(&cli.images, cli.folder.as_deref());
    if batch.is_empty() {
        info!(
            issues = batch.issues.len(),
            "no images loaded; nothing to process"
        );
        return ExitCode::SUCCESS;
    }
    let outcome = process_batch(batch.images, &config, &detector);

    if cli.json {
        match serde_json::to_string_pretty(&outcome.report) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Error serializing report: {e}");
                return ExitCode::FAILURE;
            }
        }
    } else {
        println!("{}", outcome.report.report());
    }

    match mugshot_io::save_all(&outcome.images, &cli.output) {
        Ok(summary) => {
            info!(
                written = summary.written.len(),
                output = %cli.output.display(),
                "done"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("cannot create {}: {e}", cli.output.display());
            ExitCode::FAILURE
        }
    }
}
