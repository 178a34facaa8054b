//! Background Removal Example
//!
//! Resamples color into the depth grid, keeps only pixels owned by a tracked
//! body and writes the result as a JPEG over a green backdrop.
//!
//! Run with: cargo run --bin background_removal [output.jpg]

use std::fs::File;
use std::io::BufWriter;
use std::time::Duration;

use acquisition::{compose_foreground, AssemblerConfig};
use contracts::{ColorFormat, ColorImage, ColorResolution, DepthMode, DeviceConfig};
use device_session::{wait_for_frame, DeviceSession, MockConfig, MockDeviceDriver, MockTrackerEngine};
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;

const BACKDROP_RGB: [u8; 3] = [0, 177, 64];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let output = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "foreground.jpg".to_string());

    let mock = MockConfig {
        body_count: 2,
        tracker_latency_frames: 1,
        ..Default::default()
    };
    let mut session = DeviceSession::new(
        MockDeviceDriver::with_config(mock.clone()),
        MockTrackerEngine::with_config(mock),
    )
    .with_assembler_config(AssemblerConfig {
        align_color_to_depth: true,
        ..Default::default()
    });

    session.start(&DeviceConfig {
        color_format: ColorFormat::Mjpg,
        color_resolution: ColorResolution::R720p,
        depth_mode: DepthMode::NfovUnbinned,
        ..Default::default()
    })?;

    // 追踪器有延迟，等到同时带掩码与对齐彩色的帧
    let mut consumer = session.subscribe();
    let mut composed = None;
    while composed.is_none() {
        let Some(frame) =
            wait_for_frame(&mut consumer, Duration::from_millis(10), Duration::from_secs(5)).await
        else {
            break;
        };
        if let (Some(color), Some(mask)) = (&frame.color_in_depth, &frame.body_index) {
            tracing::info!(
                bodies = frame.bodies.len(),
                foreground = mask.foreground_count(),
                "Composing foreground"
            );
            composed = compose_foreground(color, mask);
        }
    }
    session.stop();

    let Some(foreground) = composed else {
        return Err("no frame carried both a body mask and aligned color".into());
    };

    let rgb = over_backdrop(&foreground);
    let mut writer = BufWriter::new(File::create(&output)?);
    JpegEncoder::new_with_quality(&mut writer, 90).encode(
        &rgb,
        foreground.width,
        foreground.height,
        ExtendedColorType::Rgb8,
    )?;
    tracing::info!(path = %output, width = foreground.width, height = foreground.height, "Wrote foreground image");

    Ok(())
}

/// BGRA with alpha -> RGB over the backdrop color
fn over_backdrop(image: &ColorImage) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(image.pixel_count() * 3);
    for px in image.data.chunks_exact(4) {
        let alpha = u16::from(px[3]);
        let [r, g, b] = [px[2], px[1], px[0]];
        for (fg, bg) in [r, g, b].into_iter().zip(BACKDROP_RGB) {
            let mixed = (u16::from(fg) * alpha + u16::from(bg) * (255 - alpha)) / 255;
            rgb.push(mixed as u8);
        }
    }
    rgb
}
