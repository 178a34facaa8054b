//! Mock 场景
//!
//! 为 mock 相机合成一帧固定的深度/彩色数据以及对应的标定。
//! 场景：2 米处的背景墙，前方 1.5 米处站着若干个"人"（竖直长方体）。

use bytes::Bytes;
use contracts::{
    Calibration, CameraCalibration, ColorFormat, DeviceConfig, DeviceError, Extrinsics, Image,
    ImageFormat, Intrinsics, MockSettings,
};
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;

/// 背景墙深度 (mm)
pub const BACKDROP_MM: u16 = 2000;

/// 人体深度 (mm)
pub const PERSON_MM: u16 = 1500;

/// 比这更近的像素算作前景
pub const FOREGROUND_LIMIT_MM: u16 = 1800;

/// 场景中最多能放下的人数
pub const MAX_BODIES: u32 = MockSettings::MAX_BODY_COUNT;

/// 彩色相机水平视场角
const COLOR_FOV_DEG: f32 = 90.0;

/// 深度相机相对彩色相机向下倾斜约 6°
const DEPTH_TILT_DEG: f32 = 6.0;

/// depth → color 平移 (mm)
const DEPTH_TO_COLOR_MM: [f32; 3] = [-32.0, -2.0, 4.0];

/// 给定模式下的 mock 标定
///
/// 针孔模型，无畸变，无 metric radius 限制。
pub fn mock_calibration(config: &DeviceConfig) -> Calibration {
    let depth_camera = config
        .depth_mode
        .dimensions()
        .map(|(w, h)| pinhole_camera(w, h, config.depth_mode.field_of_view_deg()))
        .unwrap_or(CameraCalibration::DISABLED);
    let color_camera = config
        .color_resolution
        .dimensions()
        .map(|(w, h)| pinhole_camera(w, h, COLOR_FOV_DEG))
        .unwrap_or(CameraCalibration::DISABLED);

    let (s, c) = DEPTH_TILT_DEG.to_radians().sin_cos();
    Calibration {
        depth_mode: config.depth_mode,
        color_resolution: config.color_resolution,
        depth_camera,
        color_camera,
        depth_to_color: Extrinsics {
            rotation: [1.0, 0.0, 0.0, 0.0, c, -s, 0.0, s, c],
            translation: DEPTH_TO_COLOR_MM,
        },
    }
}

fn pinhole_camera(width: u32, height: u32, fov_deg: f32) -> CameraCalibration {
    let f = width as f32 / 2.0 / (fov_deg.to_radians() / 2.0).tan();
    CameraCalibration {
        resolution_width: width,
        resolution_height: height,
        intrinsics: Intrinsics::pinhole(
            f,
            f,
            width as f32 / 2.0 - 0.5,
            height as f32 / 2.0 - 0.5,
        ),
        metric_radius: 0.0,
    }
}

/// 预渲染好的原始图像，每次 capture 只克隆 `Bytes`
#[derive(Debug, Clone)]
pub struct MockScene {
    pub depth: Option<Image>,
    pub color: Option<Image>,
}

impl MockScene {
    pub fn render(config: &DeviceConfig, body_count: u32) -> Result<Self, DeviceError> {
        let depth = config
            .depth_mode
            .dimensions()
            .filter(|_| config.depth_mode.produces_depth())
            .map(|(w, h)| render_depth(w, h, body_count.min(MAX_BODIES)));
        let color = config
            .color_resolution
            .dimensions()
            .map(|(w, h)| render_color(config.color_format, w, h))
            .transpose()?;
        Ok(Self { depth, color })
    }
}

/// 第 `i` 个人所占的列范围 [start, end)
pub fn person_columns(width: u32, i: u32, count: u32) -> (u32, u32) {
    let center = width * (i + 1) / (count + 1);
    let half = (width / 16).max(1);
    (center.saturating_sub(half), (center + half).min(width))
}

fn render_depth(width: u32, height: u32, body_count: u32) -> Image {
    let mut depth = vec![BACKDROP_MM; (width * height) as usize];

    for i in 0..body_count {
        let (x0, x1) = person_columns(width, i, body_count);
        for y in height / 5..height {
            let row = (y * width) as usize;
            depth[row + x0 as usize..row + x1 as usize].fill(PERSON_MM);
        }
    }
    // 最左一列无回波
    for y in 0..height {
        depth[(y * width) as usize] = 0;
    }

    let bytes: Vec<u8> = depth.iter().flat_map(|d| d.to_le_bytes()).collect();
    Image {
        format: ImageFormat::Depth16,
        width,
        height,
        stride: width * 2,
        data: Bytes::from(bytes),
    }
}

fn render_color(format: ColorFormat, width: u32, height: u32) -> Result<Image, DeviceError> {
    let gradient = |x: u32, y: u32| -> [u8; 3] {
        [
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            128,
        ]
    };

    let (image_format, stride, data) = match format {
        ColorFormat::Bgra32 => {
            let mut data = Vec::with_capacity((width * height * 4) as usize);
            for y in 0..height {
                for x in 0..width {
                    let [b, g, r] = gradient(x, y);
                    data.extend_from_slice(&[b, g, r, 255]);
                }
            }
            (ImageFormat::Bgra32, width * 4, data)
        }
        ColorFormat::Mjpg => {
            let mut rgb = Vec::with_capacity((width * height * 3) as usize);
            for y in 0..height {
                for x in 0..width {
                    let [b, g, r] = gradient(x, y);
                    rgb.extend_from_slice(&[r, g, b]);
                }
            }
            let mut jpeg = Vec::new();
            JpegEncoder::new_with_quality(&mut jpeg, 85)
                .encode(&rgb, width, height, ExtendedColorType::Rgb8)
                .map_err(|e| DeviceError::hardware(format!("mock jpeg encoder: {e}")))?;
            (ImageFormat::Mjpg, 0, jpeg)
        }
        ColorFormat::Nv12 => {
            let luma = (width * height) as usize;
            let mut data = vec![128u8; luma + luma / 2];
            for y in 0..height {
                for x in 0..width {
                    data[(y * width + x) as usize] = luma_ramp(x, width);
                }
            }
            (ImageFormat::Nv12, width, data)
        }
        ColorFormat::Yuy2 => {
            let mut data = Vec::with_capacity((width * height * 2) as usize);
            for _ in 0..height {
                for x in (0..width).step_by(2) {
                    data.extend_from_slice(&[
                        luma_ramp(x, width),
                        128,
                        luma_ramp(x + 1, width),
                        128,
                    ]);
                }
            }
            (ImageFormat::Yuy2, width * 2, data)
        }
    };

    Ok(Image {
        format: image_format,
        width,
        height,
        stride,
        data: Bytes::from(data),
    })
}

/// studio-range luma ramp from left to right
fn luma_ramp(x: u32, width: u32) -> u8 {
    (16 + x * 219 / width.max(1)) as u8
}
