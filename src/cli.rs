//! Command-line arguments for the `foot-pose` runner.

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "foot-pose", author, version, about = "Foot pose estimation from a still frame", long_about = None)]
pub struct Args {
    /// Image to use as the camera frame
    #[arg(short, long)]
    pub image: PathBuf,

    /// Path to configuration file (YAML format)
    #[arg(short = 'C', long)]
    pub config: Option<PathBuf>,

    /// Foot detector ONNX model (overrides the configuration)
    #[arg(short, long)]
    pub model: Option<PathBuf>,

    /// Crop around the detected foot before segmenting
    #[arg(short, long)]
    pub neural: bool,

    /// Enable debug output and keep diagnostic images
    #[arg(short, long)]
    pub debug: bool,

    /// Directory to write the last capture, mask and overlay to
    #[arg(long)]
    pub debug_dir: Option<PathBuf>,

    /// Number of pipeline runs
    #[arg(short, long, default_value = "1", value_parser = clap::value_parser!(u32).range(1..))]
    pub runs: u32,
}

impl Args {
    /// Whether diagnostic images must be kept; writing them out implies keeping them
    #[must_use]
    pub const fn keeps_diagnostics(&self) -> bool {
        self.debug || self.debug_dir.is_some()
    }
}
