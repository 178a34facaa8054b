//! `run` command implementation.

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::info;

use super::load_blueprint;
use crate::cli::RunArgs;
use crate::pipeline::{Pipeline, PipelineConfig};

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    let mut blueprint = load_blueprint(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    // Apply CLI overrides
    if let Some(index) = args.device_index {
        info!(device_index = index, "Overriding device index from CLI");
        blueprint.device.device_index = index;
    }
    if let Some(bodies) = args.bodies {
        info!(bodies, "Overriding simulated body count from CLI");
        blueprint.mock.body_count = bodies;
    }
    config_loader::ConfigLoader::validate(&blueprint).context("CLI overrides are invalid")?;

    info!(
        fps = blueprint.device.camera_fps.hz(),
        color = ?blueprint.device.color_resolution,
        depth = ?blueprint.device.depth_mode,
        tick_hz = blueprint.consumer.tick_hz,
        "Configuration loaded"
    );

    // Dry run - just validate and exit
    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        return Ok(());
    }

    let pipeline = Pipeline::new(PipelineConfig {
        blueprint,
        max_frames: (args.max_frames != 0).then_some(args.max_frames),
        timeout: (args.timeout != 0).then(|| Duration::from_secs(args.timeout)),
    });

    info!("Starting pipeline...");
    let stats = pipeline
        .run(shutdown_signal())
        .await
        .context("Pipeline execution failed")?;

    info!(
        frames_consumed = stats.frames_consumed,
        frames_published = stats.acquisition.frames_published,
        duration_secs = stats.duration.as_secs_f64(),
        fps = format!("{:.2}", stats.fps()),
        "Pipeline completed successfully"
    );
    stats.print_summary();

    info!("Kinect Stream finished");
    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM
///
/// If a handler cannot be installed that source is ignored.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &contracts::StreamBlueprint) {
    let device = &blueprint.device;
    println!("\n=== Configuration Summary ===\n");
    println!("Device:");
    println!("  Index: {}", device.device_index);
    println!("  Frame rate: {} fps", device.camera_fps.hz());
    println!(
        "  Color: {:?} {:?}",
        device.color_format, device.color_resolution
    );
    println!("  Depth: {:?}", device.depth_mode);
    println!("  Tracker: {:?}", device.tracker.processing_mode);

    println!("\nAcquisition:");
    println!(
        "  Capture timeout: {} ms",
        blueprint.acquisition.capture_timeout_ms
    );
    println!(
        "  Depth -> color: {}",
        blueprint.acquisition.align_depth_to_color
    );
    println!(
        "  Color -> depth: {}",
        blueprint.acquisition.align_color_to_depth
    );

    println!("\nConsumer tick: {} Hz", blueprint.consumer.tick_hz);
    println!(
        "Mock: {} device(s), {} body/bodies",
        blueprint.mock.device_count, blueprint.mock.body_count
    );
    println!();
}
