//! CoordinateMapper - 每周期缓存一次深度到彩色的重投影
//!
//! 世界坐标 = 深度相机坐标系 (米)。所有查询在不可用时返回 `None`
//! (或 `color_to_world` 的零向量)，从不报错。

use contracts::{Calibration, CalibrationType, DepthImage, Frame, Vector2, Vector3};
use tracing::trace;

use crate::Transformation;

const MM_PER_M: f32 = 1000.0;

/// Coordinate mapper session
#[derive(Debug, Clone)]
pub struct CoordinateMapper {
    transformation: Transformation,
    depth_in_color: Option<DepthImage>,
}

impl CoordinateMapper {
    pub fn new(calibration: Calibration) -> Self {
        Self {
            transformation: Transformation::new(calibration),
            depth_in_color: None,
        }
    }

    pub fn transformation(&self) -> &Transformation {
        &self.transformation
    }

    pub fn calibration(&self) -> &Calibration {
        self.transformation.calibration()
    }

    /// 用本周期的深度图刷新缓存 (一次重投影)
    pub fn update(&mut self, depth: &DepthImage) {
        self.depth_in_color = self.transformation.depth_image_to_color_camera(depth);
        trace!(
            cached = self.depth_in_color.is_some(),
            "depth reprojected into color grid"
        );
    }

    /// 采用已发布帧里的重投影结果，没有时自行计算
    pub fn load_frame(&mut self, frame: &Frame) {
        match &frame.depth_in_color {
            Some(aligned) => self.depth_in_color = Some(aligned.clone()),
            None => self.update(&frame.depth),
        }
    }

    /// Depth reprojected into the color grid for the current cycle
    pub fn depth_in_color(&self) -> Option<&DepthImage> {
        self.depth_in_color.as_ref()
    }

    pub fn world_to_color(&self, point_m: Vector3) -> Option<Vector2> {
        self.transformation.transform_3d_to_2d(
            point_m.scale(MM_PER_M),
            CalibrationType::Depth,
            CalibrationType::Color,
        )
    }

    pub fn world_to_depth(&self, point_m: Vector3) -> Option<Vector2> {
        self.transformation.transform_3d_to_2d(
            point_m.scale(MM_PER_M),
            CalibrationType::Depth,
            CalibrationType::Depth,
        )
    }

    /// 彩色像素 -> 世界坐标；该像素无深度时返回零向量
    pub fn color_to_world(&self, point: Vector2) -> Vector3 {
        self.color_depth_mm(point)
            .and_then(|d| {
                self.transformation.transform_2d_to_3d(
                    point,
                    d,
                    CalibrationType::Color,
                    CalibrationType::Depth,
                )
            })
            .map_or(Vector3::ZERO, |p| p.scale(1.0 / MM_PER_M))
    }

    pub fn depth_to_world(&self, point: Vector2, depth_m: f32) -> Option<Vector3> {
        self.transformation
            .transform_2d_to_3d(
                point,
                depth_m * MM_PER_M,
                CalibrationType::Depth,
                CalibrationType::Depth,
            )
            .map(|p| p.scale(1.0 / MM_PER_M))
    }

    pub fn color_to_depth(&self, point: Vector2) -> Option<Vector2> {
        let d = self.color_depth_mm(point)?;
        self.transformation.transform_2d_to_2d(
            point,
            d,
            CalibrationType::Color,
            CalibrationType::Depth,
        )
    }

    pub fn depth_to_color(&self, point: Vector2, depth_m: f32) -> Option<Vector2> {
        self.transformation.transform_2d_to_2d(
            point,
            depth_m * MM_PER_M,
            CalibrationType::Depth,
            CalibrationType::Color,
        )
    }

    /// Cached depth (mm) under a color pixel, `None` if unknown
    fn color_depth_mm(&self, point: Vector2) -> Option<f32> {
        let aligned = self.depth_in_color.as_ref()?;
        if !point.x.is_finite() || !point.y.is_finite() || point.x < -0.5 || point.y < -0.5 {
            return None;
        }
        let d = aligned.depth_at(point.x.round() as u32, point.y.round() as u32);
        (d > 0).then_some(f32::from(d))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{
        CameraCalibration, ColorResolution, DepthMode, Extrinsics, Intrinsics,
    };

    fn camera(w: u32, h: u32, f: f32) -> CameraCalibration {
        CameraCalibration {
            resolution_width: w,
            resolution_height: h,
            intrinsics: Intrinsics::pinhole(f, f, (w as f32 - 1.0) / 2.0, (h as f32 - 1.0) / 2.0),
            metric_radius: 0.0,
        }
    }

    fn identity_calibration() -> Calibration {
        Calibration {
            depth_mode: DepthMode::NfovBinned2x2,
            color_resolution: ColorResolution::R720p,
            depth_camera: camera(40, 30, 36.0),
            color_camera: camera(40, 30, 36.0),
            depth_to_color: Extrinsics::IDENTITY,
        }
    }

    #[test]
    fn test_color_to_world_without_depth_is_zero() {
        let mut mapper = CoordinateMapper::new(identity_calibration());
        // no cache yet
        assert_eq!(mapper.color_to_world(Vector2::new(10.0, 10.0)), Vector3::ZERO);

        mapper.update(&DepthImage::new(40, 30, vec![0u16; 40 * 30]));
        assert_eq!(mapper.color_to_world(Vector2::new(10.0, 10.0)), Vector3::ZERO);
        assert_eq!(mapper.color_to_world(Vector2::new(-50.0, 9e9)), Vector3::ZERO);
    }

    #[test]
    fn test_world_to_color_with_color_off() {
        let mut calibration = identity_calibration();
        calibration.color_resolution = ColorResolution::Off;
        calibration.color_camera = CameraCalibration::DISABLED;
        let mut mapper = CoordinateMapper::new(calibration);
        mapper.update(&DepthImage::new(40, 30, vec![1500u16; 40 * 30]));

        let p = Vector3::new(0.0, 0.0, 1.5);
        assert!(mapper.world_to_color(p).is_none());
        assert!(mapper.world_to_depth(p).is_some());
        assert!(mapper.depth_in_color().is_none());
        assert_eq!(mapper.color_to_world(Vector2::new(5.0, 5.0)), Vector3::ZERO);
    }

    #[test]
    fn test_direct_and_color_aligned_unprojection_agree() {
        let mut mapper = CoordinateMapper::new(identity_calibration());
        mapper.update(&DepthImage::new(40, 30, vec![3000u16; 40 * 30]));

        for p in [
            Vector2::new(7.0, 4.0),
            Vector2::new(19.5, 14.5),
            Vector2::new(33.0, 25.0),
        ] {
            let aligned = mapper.color_to_world(p);
            let direct = mapper.depth_to_world(p, 3.0).unwrap();
            assert!((aligned.x - direct.x).abs() < 0.001, "{p:?}");
            assert!((aligned.y - direct.y).abs() < 0.001, "{p:?}");
            assert!((aligned.z - direct.z).abs() < 0.001, "{p:?}");
            assert!((direct.z - 3.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_world_round_trip() {
        let mapper = CoordinateMapper::new(identity_calibration());
        let px = mapper.world_to_depth(Vector3::new(0.2, -0.1, 2.0)).unwrap();
        let back = mapper.depth_to_world(px, 2.0).unwrap();
        assert!((back.x - 0.2).abs() < 1e-4);
        assert!((back.y + 0.1).abs() < 1e-4);
    }

    #[test]
    fn test_pixel_to_pixel_paths() {
        let mut mapper = CoordinateMapper::new(identity_calibration());
        mapper.update(&DepthImage::new(40, 30, vec![2000u16; 40 * 30]));

        let c = mapper.depth_to_color(Vector2::new(12.0, 8.0), 2.0).unwrap();
        assert!((c.x - 12.0).abs() < 1e-3 && (c.y - 8.0).abs() < 1e-3);

        let d = mapper.color_to_depth(Vector2::new(12.0, 8.0)).unwrap();
        assert!((d.x - 12.0).abs() < 1e-3 && (d.y - 8.0).abs() < 1e-3);
    }

    #[test]
    fn test_load_frame_prefers_published_alignment() {
        let mut mapper = CoordinateMapper::new(identity_calibration());
        let frame = Frame {
            timestamp: std::time::Duration::from_millis(33),
            temperature_c: 30.0,
            color: None,
            depth: DepthImage::new(40, 30, vec![1000u16; 40 * 30]),
            body_index: None,
            depth_in_color: Some(DepthImage::new(40, 30, vec![2500u16; 40 * 30])),
            color_in_depth: None,
            bodies: Vec::new(),
            imu: None,
        };
        mapper.load_frame(&frame);
        assert_eq!(mapper.depth_in_color().unwrap().depth_at(3, 3), 2500);

        let frame = Frame {
            depth_in_color: None,
            ..frame
        };
        mapper.load_frame(&frame);
        assert_eq!(mapper.depth_in_color().unwrap().depth_at(3, 3), 1000);
    }
}
