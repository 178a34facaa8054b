//! Mock Stream Example
//!
//! Opens the simulated depth camera, consumes frames on a fixed tick and
//! projects every tracked pelvis into the color image.
//! No hardware required.
//!
//! Run with: cargo run --bin mock_stream [config.toml]

use std::time::Duration;

use acquisition::AssemblerConfig;
use config_loader::ConfigLoader;
use contracts::{
    ColorFormat, ColorResolution, DepthMode, DeviceConfig, JointId, MockSettings, StreamBlueprint,
};
use coordinate_mapper::CoordinateMapper;
use device_session::{
    tick_interval, wait_for_frame, DeviceSession, MockConfig, MockDeviceDriver, MockTrackerEngine,
};
use observability::StreamStatsAggregator;

const FRAMES: u32 = 60;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    tracing::info!("Starting Mock Stream Demo");

    // ==== Stage 1: Use default config or load from file ====
    let blueprint = if let Some(path) = std::env::args().nth(1) {
        tracing::info!(path = %path, "Loading blueprint config");
        ConfigLoader::load_from_path(std::path::Path::new(&path))?
    } else {
        create_demo_blueprint()
    };

    // ==== Stage 2: Open the simulated device ====
    let mock = MockConfig::from(&blueprint.mock);
    let mut session = DeviceSession::new(
        MockDeviceDriver::with_config(mock.clone()),
        MockTrackerEngine::with_config(mock),
    )
    .with_assembler_config(AssemblerConfig::from(&blueprint.acquisition));

    session.start(&blueprint.device)?;
    tracing::info!(
        serial = session.serial_number().unwrap_or("-"),
        "Device session started"
    );

    let Some(calibration) = session.calibration() else {
        session.stop();
        return Err("device reported no calibration".into());
    };
    let mut mapper = CoordinateMapper::new(calibration);

    // ==== Stage 3: Consume ====
    let tick = tick_interval(blueprint.consumer.tick_hz);
    let mut consumer = session.subscribe();
    let mut stats = StreamStatsAggregator::new();

    for _ in 0..FRAMES {
        let Some(frame) = wait_for_frame(&mut consumer, tick, Duration::from_secs(2)).await else {
            tracing::warn!("No frame within 2s");
            break;
        };
        stats.update(&frame);
        mapper.load_frame(&frame);

        for body in &frame.bodies {
            let pelvis = body.joint(JointId::Pelvis);
            match mapper.world_to_color(pelvis.position) {
                Some(pixel) => tracing::info!(
                    body = body.id,
                    timestamp_ms = frame.timestamp.as_millis() as u64,
                    x = format!("{:.1}", pixel.x),
                    y = format!("{:.1}", pixel.y),
                    "Pelvis in color image"
                ),
                None => tracing::info!(body = body.id, "Pelvis outside the color image"),
            }
        }
    }

    // ==== Stage 4: Shutdown ====
    session.stop();
    let metrics = session.metrics();
    tracing::info!(
        cycles = metrics.cycles,
        published = metrics.frames_published,
        timeouts = metrics.capture_timeouts,
        "Device session stopped"
    );
    println!("{}", stats.summary());

    Ok(())
}

fn create_demo_blueprint() -> StreamBlueprint {
    StreamBlueprint {
        device: DeviceConfig {
            color_format: ColorFormat::Bgra32,
            color_resolution: ColorResolution::R720p,
            depth_mode: DepthMode::NfovUnbinned,
            ..Default::default()
        },
        mock: MockSettings {
            body_count: 2,
            ..Default::default()
        },
        ..Default::default()
    }
}
