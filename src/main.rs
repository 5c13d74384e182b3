//! Foot pose estimation command-line runner.

use anyhow::{Context, Result};
use clap::Parser;
use foot_pose_estimation::app::FootPoseApp;
use foot_pose_estimation::cli::Args;
use foot_pose_estimation::config::Config;
use foot_pose_estimation::frame_source::ImageFileSource;
use foot_pose_estimation::placement::LoggingPlacementSink;
use log::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.debug {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("debug"));
    } else {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    }

    info!("Foot Pose Estimation {} ({})", env!("CARGO_PKG_VERSION"), env!("BUILD_TARGET"));

    let mut config = if let Some(config_path) = &args.config {
        info!("Loading configuration from: {}", config_path.display());
        match Config::from_file(config_path) {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!("Failed to load config file: {e}. Using defaults.");
                Config::default()
            }
        }
    } else {
        Config::default()
    };

    if let Some(model) = &args.model {
        config.model.detector = Some(model.clone());
    }
    config.pipeline.debug |= args.keeps_diagnostics();
    config.validate().context("Invalid configuration")?;

    let app = FootPoseApp::from_config(config, ImageFileSource::new(&args.image), LoggingPlacementSink::new());
    if args.neural && !app.has_detector() {
        warn!("--neural given but no foot detector is available, segmenting the full frame");
    }

    let mut succeeded = 0;
    for _ in 0..args.runs {
        let report = app.run_pipeline(args.neural).await;
        if report.is_success() {
            succeeded += 1;
        }
    }
    info!("{succeeded}/{} runs produced an estimate", args.runs);

    if let Some(placement) = app.current_placement() {
        println!("{}", serde_yaml::to_string(&placement).context("Failed to format placement")?);
    }

    if let Some(dir) = &args.debug_dir {
        app.diagnostics()
            .save_to_dir(dir)
            .with_context(|| format!("Failed to write diagnostics to {}", dir.display()))?;
    }

    Ok(())
}
