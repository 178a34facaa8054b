//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::{CameraCalibration, StreamBlueprint};
use serde::Serialize;
use tracing::info;

use super::load_blueprint;
use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    device: DeviceInfo,
    acquisition: AcquisitionInfo,
    consumer_tick_hz: f64,
    mock: MockInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    calibration: Option<CalibrationInfo>,
}

#[derive(Serialize)]
struct DeviceInfo {
    index: u32,
    camera_fps: u32,
    color_format: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    color_size: Option<(u32, u32)>,
    depth_mode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    depth_size: Option<(u32, u32)>,
    wired_sync_mode: String,
    synchronized_images_only: bool,
    tracker_processing_mode: String,
    sensor_orientation: String,
}

#[derive(Serialize)]
struct AcquisitionInfo {
    capture_timeout_ms: u64,
    align_depth_to_color: bool,
    align_color_to_depth: bool,
}

#[derive(Serialize)]
struct MockInfo {
    device_count: u32,
    body_count: u32,
    tracker_latency_frames: u32,
}

#[derive(Serialize)]
struct CalibrationInfo {
    depth: CameraInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    color: Option<CameraInfo>,
    depth_to_color_translation_mm: [f32; 3],
}

#[derive(Serialize)]
struct CameraInfo {
    width: u32,
    height: u32,
    fx: f32,
    fy: f32,
    cx: f32,
    cy: f32,
}

impl From<&CameraCalibration> for CameraInfo {
    fn from(camera: &CameraCalibration) -> Self {
        Self {
            width: camera.resolution_width,
            height: camera.resolution_height,
            fx: camera.intrinsics.fx,
            fy: camera.intrinsics.fy,
            cx: camera.intrinsics.cx,
            cy: camera.intrinsics.cy,
        }
    }
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    let blueprint = load_blueprint(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;
    let info = build_config_info(&blueprint, args);

    if args.json {
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&info);
    }

    Ok(())
}

fn build_config_info(blueprint: &StreamBlueprint, args: &InfoArgs) -> ConfigInfo {
    let device = &blueprint.device;

    let calibration = args.calibration.then(|| {
        let calibration = device_session::mock_calibration(device);
        CalibrationInfo {
            depth: CameraInfo::from(&calibration.depth_camera),
            color: calibration
                .color_camera
                .is_enabled()
                .then(|| CameraInfo::from(&calibration.color_camera)),
            depth_to_color_translation_mm: calibration.depth_to_color.translation,
        }
    });

    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        device: DeviceInfo {
            index: device.device_index,
            camera_fps: device.camera_fps.hz(),
            color_format: format!("{:?}", device.color_format),
            color_size: device.color_resolution.dimensions(),
            depth_mode: format!("{:?}", device.depth_mode),
            depth_size: device.depth_mode.dimensions(),
            wired_sync_mode: format!("{:?}", device.wired_sync_mode),
            synchronized_images_only: device.synchronized_images_only,
            tracker_processing_mode: format!("{:?}", device.tracker.processing_mode),
            sensor_orientation: format!("{:?}", device.tracker.sensor_orientation),
        },
        acquisition: AcquisitionInfo {
            capture_timeout_ms: blueprint.acquisition.capture_timeout_ms,
            align_depth_to_color: blueprint.acquisition.align_depth_to_color,
            align_color_to_depth: blueprint.acquisition.align_color_to_depth,
        },
        consumer_tick_hz: blueprint.consumer.tick_hz,
        mock: MockInfo {
            device_count: blueprint.mock.device_count,
            body_count: blueprint.mock.body_count,
            tracker_latency_frames: blueprint.mock.tracker_latency_frames,
        },
        calibration,
    }
}

fn size(dimensions: Option<(u32, u32)>) -> String {
    dimensions
        .map(|(w, h)| format!("{w}x{h}"))
        .unwrap_or_else(|| "off".to_string())
}

fn print_config_info(info: &ConfigInfo) {
    println!("=== Kinect Stream Configuration ===\n");

    let device = &info.device;
    println!("Device");
    println!("   ├─ Version: {}", info.version);
    println!("   ├─ Index: {}", device.index);
    println!("   ├─ Frame rate: {} fps", device.camera_fps);
    println!(
        "   ├─ Color: {} {}",
        device.color_format,
        size(device.color_size)
    );
    println!("   ├─ Depth: {} {}", device.depth_mode, size(device.depth_size));
    println!("   ├─ Wired sync: {}", device.wired_sync_mode);
    println!(
        "   ├─ Synchronized images only: {}",
        device.synchronized_images_only
    );
    println!(
        "   └─ Tracker: {} ({})",
        device.tracker_processing_mode, device.sensor_orientation
    );

    let acquisition = &info.acquisition;
    println!("\nAcquisition");
    println!(
        "   ├─ Capture timeout: {} ms",
        acquisition.capture_timeout_ms
    );
    println!(
        "   ├─ Depth -> color: {}",
        acquisition.align_depth_to_color
    );
    println!(
        "   └─ Color -> depth: {}",
        acquisition.align_color_to_depth
    );

    println!("\nConsumer");
    println!("   └─ Tick: {} Hz", info.consumer_tick_hz);

    println!("\nMock hardware");
    println!("   ├─ Devices: {}", info.mock.device_count);
    println!("   ├─ Bodies: {}", info.mock.body_count);
    println!(
        "   └─ Tracker latency: {} frames",
        info.mock.tracker_latency_frames
    );

    if let Some(ref calibration) = info.calibration {
        println!("\nCalibration (mock)");
        print_camera("Depth", &calibration.depth);
        if let Some(ref color) = calibration.color {
            print_camera("Color", color);
        }
        println!(
            "   └─ Depth -> color translation (mm): {:?}",
            calibration.depth_to_color_translation_mm
        );
    }

    println!();
}

fn print_camera(name: &str, camera: &CameraInfo) {
    println!(
        "   ├─ {name}: {}x{} fx={:.1} fy={:.1} cx={:.1} cy={:.1}",
        camera.width, camera.height, camera.fx, camera.fy, camera.cx, camera.cy
    );
}
