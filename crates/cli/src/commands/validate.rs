//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{ColorFormat, ColorResolution, StreamBlueprint, TrackerProcessingMode};
use serde::Serialize;
use tracing::info;

use super::load_blueprint;
use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    camera_fps: u32,
    color: String,
    depth: String,
    tracker: String,
    tick_hz: f64,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    match load_blueprint(&args.config) {
        Ok(blueprint) => {
            let warnings = collect_warnings(&blueprint);
            let device = &blueprint.device;
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: (!warnings.is_empty()).then_some(warnings),
                summary: Some(ConfigSummary {
                    version: format!("{:?}", blueprint.version),
                    camera_fps: device.camera_fps.hz(),
                    color: format!("{:?} {:?}", device.color_format, device.color_resolution),
                    depth: format!("{:?}", device.depth_mode),
                    tracker: format!("{:?}", device.tracker.processing_mode),
                    tick_hz: blueprint.consumer.tick_hz,
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &StreamBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();
    let device = &blueprint.device;
    let fps = f64::from(device.camera_fps.hz());

    if blueprint.consumer.tick_hz < fps {
        warnings.push(format!(
            "consumer.tick_hz ({}) is below the camera rate ({fps} fps) - frames will be skipped",
            blueprint.consumer.tick_hz
        ));
    }

    if device.color_format == ColorFormat::Mjpg
        && matches!(
            device.color_resolution,
            ColorResolution::R2160p | ColorResolution::R3072p
        )
    {
        warnings.push(
            "high-resolution MJPG must be decoded on the producer thread every cycle".to_string(),
        );
    }

    if !blueprint.acquisition.align_color_to_depth {
        warnings.push(
            "acquisition.align_color_to_depth is off - background removal is unavailable"
                .to_string(),
        );
    }

    if device.tracker.processing_mode == TrackerProcessingMode::Cpu {
        warnings.push("CPU tracker inference usually lags several frames behind".to_string());
    }

    if blueprint.mock.body_count == 0 {
        warnings.push("mock.body_count is 0 - the simulated scene is empty".to_string());
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Frame rate: {} fps", summary.camera_fps);
            println!("  Color: {}", summary.color);
            println!("  Depth: {}", summary.depth);
            println!("  Tracker: {}", summary.tracker);
            println!("  Consumer tick: {} Hz", summary.tick_hz);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn args(path: PathBuf) -> ValidateArgs {
        ValidateArgs {
            config: path,
            json: true,
        }
    }

    #[test]
    fn test_valid_config_with_warnings() {
        let file = write_config(
            r#"
            [device]
            camera_fps = "fps30"
            color_format = "bgra32"
            color_resolution = "r720p"
            depth_mode = "nfov_binned2x2"

            [consumer]
            tick_hz = 15.0
            "#,
        );
        let result = validate_config(&args(file.path().to_path_buf()));

        assert!(result.valid, "{:?}", result.error);
        let warnings = result.warnings.unwrap();
        assert!(warnings.iter().any(|w| w.contains("tick_hz")));
        assert_eq!(result.summary.unwrap().camera_fps, 30);
    }

    #[test]
    fn test_invalid_mode_reported() {
        let file = write_config(
            r#"
            [device]
            color_format = "nv12"
            color_resolution = "r1080p"
            "#,
        );
        let result = validate_config(&args(file.path().to_path_buf()));
        assert!(!result.valid);
        assert!(result.error.unwrap().contains("720p"));
    }

    #[test]
    fn test_missing_file() {
        let result = validate_config(&args(PathBuf::from("/nonexistent/stream.toml")));
        assert!(!result.valid);
        assert!(result.error.unwrap().contains("not found"));
        assert!(run_validate(&args(PathBuf::from("/nonexistent/stream.toml"))).is_err());
    }
}
