//! Point and image transforms between the depth and color optical elements.
//!
//! All 3D coordinates here are camera-space millimeters. Every operation
//! returns `Option`: `None` means "unavailable" (stream off, behind the camera,
//! outside the field of view, no depth), never a fault.

use bytes::Bytes;
use contracts::{
    Calibration, CalibrationType, CameraCalibration, ColorImage, DepthImage, Extrinsics,
    Vector2, Vector3,
};
use nalgebra as na;

use crate::lens;

/// Rigid transform `p' = R p + t`
#[derive(Debug, Clone, Copy)]
struct Rigid {
    rotation: na::Matrix3<f32>,
    translation: na::Vector3<f32>,
}

impl Rigid {
    fn from_extrinsics(e: &Extrinsics) -> Self {
        Self {
            rotation: na::Matrix3::from_row_slice(&e.rotation),
            translation: na::Vector3::from_column_slice(&e.translation),
        }
    }

    fn inverse(&self) -> Self {
        let rotation = self.rotation.transpose();
        Self {
            rotation,
            translation: -(rotation * self.translation),
        }
    }

    fn apply(&self, p: &na::Vector3<f32>) -> na::Vector3<f32> {
        self.rotation * p + self.translation
    }
}

/// Precomputed undistorted rays for the depth camera
///
/// `centers` has one entry per pixel, `corners` one per pixel corner
/// (`(w + 1) * (h + 1)`). Entries are `None` where the lens model is invalid.
#[derive(Debug, Clone, Default)]
struct RayTable {
    width: u32,
    height: u32,
    centers: Vec<Option<na::Vector2<f32>>>,
    corners: Vec<Option<na::Vector2<f32>>>,
}

impl RayTable {
    fn build(camera: &CameraCalibration) -> Self {
        if !camera.is_enabled() {
            return Self::default();
        }
        let (w, h) = (camera.resolution_width, camera.resolution_height);

        let centers = (0..h)
            .flat_map(|y| (0..w).map(move |x| (x as f32, y as f32)))
            .map(|(u, v)| pixel_ray(camera, u, v))
            .collect();
        let corners = (0..=h)
            .flat_map(|y| (0..=w).map(move |x| (x as f32 - 0.5, y as f32 - 0.5)))
            .map(|(u, v)| pixel_ray(camera, u, v))
            .collect();

        Self {
            width: w,
            height: h,
            centers,
            corners,
        }
    }

    fn center(&self, x: u32, y: u32) -> Option<na::Vector2<f32>> {
        self.centers[(y * self.width + x) as usize]
    }

    fn corner(&self, x: u32, y: u32) -> Option<na::Vector2<f32>> {
        self.corners[(y * (self.width + 1) + x) as usize]
    }
}

/// Undistorted normalized ray through pixel (u, v), honoring the metric radius
fn pixel_ray(camera: &CameraCalibration, u: f32, v: f32) -> Option<na::Vector2<f32>> {
    let k = &camera.intrinsics;
    let ray = lens::undistort(k, lens::pixel_to_normalized(k, u, v))?;
    within_radius(camera, &ray).then_some(ray)
}

fn within_radius(camera: &CameraCalibration, ray: &na::Vector2<f32>) -> bool {
    camera.metric_radius <= 0.0 || ray.norm_squared() <= camera.metric_radius.powi(2)
}

fn in_image(camera: &CameraCalibration, px: &na::Vector2<f32>) -> bool {
    let w = camera.resolution_width as f32;
    let h = camera.resolution_height as f32;
    px.x >= -0.5 && px.y >= -0.5 && px.x < w - 0.5 && px.y < h - 0.5
}

/// Calibration-backed transform provider
#[derive(Debug, Clone)]
pub struct Transformation {
    calibration: Calibration,
    depth_to_color: Rigid,
    color_to_depth: Rigid,
    depth_rays: RayTable,
}

impl Transformation {
    pub fn new(calibration: Calibration) -> Self {
        let depth_to_color = Rigid::from_extrinsics(&calibration.depth_to_color);
        let depth_rays = RayTable::build(&calibration.depth_camera);
        Self {
            color_to_depth: depth_to_color.inverse(),
            depth_to_color,
            depth_rays,
            calibration,
        }
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    /// Move a 3D point (mm) from `source` camera space to `target` camera space
    pub fn transform_3d_to_3d(
        &self,
        point_mm: Vector3,
        source: CalibrationType,
        target: CalibrationType,
    ) -> Option<Vector3> {
        if !self.calibration.is_enabled(source) || !self.calibration.is_enabled(target) {
            return None;
        }
        let p = to_na(point_mm);
        Some(from_na(&self.move_point(&p, source, target)))
    }

    /// Project a 3D point (mm, `source` space) into `target` pixel space
    pub fn transform_3d_to_2d(
        &self,
        point_mm: Vector3,
        source: CalibrationType,
        target: CalibrationType,
    ) -> Option<Vector2> {
        if !self.calibration.is_enabled(source) {
            return None;
        }
        let p = self.move_point(&to_na(point_mm), source, target);
        let px = self.project(&p, target)?;
        Some(Vector2::new(px.x, px.y))
    }

    /// Unproject a `source` pixel with known depth (mm) into `target` 3D space
    pub fn transform_2d_to_3d(
        &self,
        point: Vector2,
        depth_mm: f32,
        source: CalibrationType,
        target: CalibrationType,
    ) -> Option<Vector3> {
        if !self.calibration.is_enabled(target) || !depth_mm.is_finite() || depth_mm <= 0.0 {
            return None;
        }
        let camera = self.calibration.camera(source);
        if !camera.is_enabled() || !in_image(camera, &na::Vector2::new(point.x, point.y)) {
            return None;
        }
        let ray = pixel_ray(camera, point.x, point.y)?;
        let p = na::Vector3::new(ray.x * depth_mm, ray.y * depth_mm, depth_mm);
        Some(from_na(&self.move_point(&p, source, target)))
    }

    /// Pixel in `source` with known depth (mm) -> pixel in `target`
    pub fn transform_2d_to_2d(
        &self,
        point: Vector2,
        depth_mm: f32,
        source: CalibrationType,
        target: CalibrationType,
    ) -> Option<Vector2> {
        let p = self.transform_2d_to_3d(point, depth_mm, source, source)?;
        self.transform_3d_to_2d(p, source, target)
    }

    /// Reproject a depth image into the color camera's pixel grid
    ///
    /// Each depth pixel is splatted over the color pixels its footprint
    /// covers; overlaps keep the nearest surface. Output values are color
    /// camera z in millimeters.
    pub fn depth_image_to_color_camera(&self, depth: &DepthImage) -> Option<DepthImage> {
        let color = &self.calibration.color_camera;
        if !color.is_enabled() || !self.matches_depth_geometry(depth) {
            return None;
        }
        let (cw, ch) = (color.resolution_width, color.resolution_height);
        let mut out = vec![0u16; cw as usize * ch as usize];

        for y in 0..depth.height {
            for x in 0..depth.width {
                let d = depth.data[(y * depth.width + x) as usize];
                if d == 0 {
                    continue;
                }
                let d = f32::from(d);

                let Some(center) = self.depth_rays.center(x, y) else {
                    continue;
                };
                let z = self
                    .depth_to_color
                    .apply(&na::Vector3::new(center.x * d, center.y * d, d))
                    .z;
                if z <= 0.0 {
                    continue;
                }
                let z = z.round().min(f32::from(u16::MAX)) as u16;

                let Some((min, max)) = self.footprint_in_color(x, y, d) else {
                    continue;
                };
                // pixel centers c with min <= c < max
                let x0 = min.x.ceil().clamp(0.0, cw as f32) as u32;
                let y0 = min.y.ceil().clamp(0.0, ch as f32) as u32;
                let x1 = max.x.ceil().clamp(0.0, cw as f32) as u32;
                let y1 = max.y.ceil().clamp(0.0, ch as f32) as u32;

                for cy in y0..y1 {
                    let row = (cy * cw) as usize;
                    for cx in x0..x1 {
                        let slot = &mut out[row + cx as usize];
                        if *slot == 0 || z < *slot {
                            *slot = z;
                        }
                    }
                }
            }
        }

        Some(DepthImage::new(cw, ch, out))
    }

    /// Resample a BGRA color image into the depth camera's pixel grid
    ///
    /// Pixels without depth, or whose surface falls outside the color field
    /// of view, are transparent black.
    pub fn color_image_to_depth_camera(
        &self,
        depth: &DepthImage,
        color: &ColorImage,
    ) -> Option<ColorImage> {
        let camera = &self.calibration.color_camera;
        if !camera.is_enabled()
            || !self.matches_depth_geometry(depth)
            || color.width != camera.resolution_width
            || color.height != camera.resolution_height
            || color.data.len() < color.pixel_count() * 4
        {
            return None;
        }

        let mut out = vec![0u8; depth.pixel_count() * 4];
        for y in 0..depth.height {
            for x in 0..depth.width {
                let i = (y * depth.width + x) as usize;
                let d = depth.data[i];
                if d == 0 {
                    continue;
                }
                let d = f32::from(d);
                let Some(ray) = self.depth_rays.center(x, y) else {
                    continue;
                };
                let p = self
                    .depth_to_color
                    .apply(&na::Vector3::new(ray.x * d, ray.y * d, d));
                let Some(px) = self.project(&p, CalibrationType::Color) else {
                    continue;
                };
                let (u, v) = (px.x.round() as u32, px.y.round() as u32);
                if let Some(bgra) = color.pixel(u, v) {
                    out[i * 4..i * 4 + 4].copy_from_slice(&bgra);
                }
            }
        }

        Some(ColorImage::new(depth.width, depth.height, Bytes::from(out)))
    }

    /// Metric point cloud (meters, depth camera space) of every valid depth pixel
    pub fn depth_image_to_point_cloud(&self, depth: &DepthImage) -> Option<Vec<Vector3>> {
        if !self.matches_depth_geometry(depth) {
            return None;
        }
        let mut points = Vec::with_capacity(depth.pixel_count() / 2);
        for y in 0..depth.height {
            for x in 0..depth.width {
                let d = depth.data[(y * depth.width + x) as usize];
                if d == 0 {
                    continue;
                }
                if let Some(ray) = self.depth_rays.center(x, y) {
                    let d = f32::from(d);
                    points.push(Vector3::new(ray.x * d, ray.y * d, d).scale(0.001));
                }
            }
        }
        Some(points)
    }

    fn matches_depth_geometry(&self, depth: &DepthImage) -> bool {
        self.depth_rays.width > 0
            && depth.width == self.depth_rays.width
            && depth.height == self.depth_rays.height
            && depth.data.len() >= depth.pixel_count()
    }

    fn move_point(
        &self,
        p: &na::Vector3<f32>,
        source: CalibrationType,
        target: CalibrationType,
    ) -> na::Vector3<f32> {
        match (source, target) {
            (CalibrationType::Depth, CalibrationType::Color) => self.depth_to_color.apply(p),
            (CalibrationType::Color, CalibrationType::Depth) => self.color_to_depth.apply(p),
            _ => *p,
        }
    }

    /// Camera-space point (mm) -> pixel, with lens model and bounds checks
    fn project(&self, p: &na::Vector3<f32>, target: CalibrationType) -> Option<na::Vector2<f32>> {
        let camera = self.calibration.camera(target);
        if !camera.is_enabled() || p.z <= 0.0 {
            return None;
        }
        let ray = na::Vector2::new(p.x / p.z, p.y / p.z);
        if !within_radius(camera, &ray) {
            return None;
        }
        let k = &camera.intrinsics;
        let px = lens::normalized_to_pixel(k, lens::distort(k, ray)?);
        in_image(camera, &px).then_some(px)
    }

    /// Bounding box (color pixels) of depth pixel (x, y)'s footprint at depth `d`
    fn footprint_in_color(
        &self,
        x: u32,
        y: u32,
        d: f32,
    ) -> Option<(na::Vector2<f32>, na::Vector2<f32>)> {
        let color = &self.calibration.color_camera;
        let k = &color.intrinsics;
        let mut min = na::Vector2::new(f32::INFINITY, f32::INFINITY);
        let mut max = na::Vector2::new(f32::NEG_INFINITY, f32::NEG_INFINITY);

        for (cx, cy) in [(x, y), (x + 1, y), (x, y + 1), (x + 1, y + 1)] {
            let ray = self.depth_rays.corner(cx, cy)?;
            let p = self
                .depth_to_color
                .apply(&na::Vector3::new(ray.x * d, ray.y * d, d));
            if p.z <= 0.0 {
                return None;
            }
            let distorted = lens::distort(k, na::Vector2::new(p.x / p.z, p.y / p.z))?;
            let px = lens::normalized_to_pixel(k, distorted);
            min = min.inf(&px);
            max = max.sup(&px);
        }
        Some((min, max))
    }
}

fn to_na(v: Vector3) -> na::Vector3<f32> {
    na::Vector3::new(v.x, v.y, v.z)
}

fn from_na(v: &na::Vector3<f32>) -> Vector3 {
    Vector3::new(v.x, v.y, v.z)
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{ColorResolution, DepthMode, Intrinsics};

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
            depth_camera: camera(32, 24, 30.0),
            color_camera: camera(32, 24, 30.0),
            depth_to_color: Extrinsics::IDENTITY,
        }
    }

    fn offset_calibration() -> Calibration {
        Calibration {
            depth_mode: DepthMode::NfovBinned2x2,
            color_resolution: ColorResolution::R720p,
            depth_camera: camera(32, 24, 30.0),
            color_camera: camera(64, 48, 60.0),
            depth_to_color: Extrinsics {
                rotation: [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
                translation: [-32.0, 0.0, 0.0],
            },
        }
    }

    #[test]
    fn test_3d_round_trip_through_color() {
        let t = Transformation::new(offset_calibration());
        let p = Vector3::new(100.0, -50.0, 2000.0);
        let in_color = t
            .transform_3d_to_3d(p, CalibrationType::Depth, CalibrationType::Color)
            .unwrap();
        assert!((in_color.x - 68.0).abs() < 1e-3);
        let back = t
            .transform_3d_to_3d(in_color, CalibrationType::Color, CalibrationType::Depth)
            .unwrap();
        assert!((back.x - p.x).abs() < 1e-3 && (back.z - p.z).abs() < 1e-3);
    }

    #[test]
    fn test_project_principal_point() {
        let t = Transformation::new(identity_calibration());
        let px = t
            .transform_3d_to_2d(
                Vector3::new(0.0, 0.0, 1000.0),
                CalibrationType::Depth,
                CalibrationType::Depth,
            )
            .unwrap();
        assert!((px.x - 15.5).abs() < 1e-4);
        assert!((px.y - 11.5).abs() < 1e-4);
    }

    #[test]
    fn test_behind_camera_unavailable() {
        let t = Transformation::new(identity_calibration());
        let px = t.transform_3d_to_2d(
            Vector3::new(0.0, 0.0, -1000.0),
            CalibrationType::Depth,
            CalibrationType::Color,
        );
        assert!(px.is_none());
    }

    #[test]
    fn test_outside_field_of_view_unavailable() {
        let t = Transformation::new(identity_calibration());
        let px = t.transform_3d_to_2d(
            Vector3::new(5000.0, 0.0, 1000.0),
            CalibrationType::Depth,
            CalibrationType::Depth,
        );
        assert!(px.is_none());
    }

    #[test]
    fn test_disabled_color_unavailable() {
        let mut calibration = identity_calibration();
        calibration.color_resolution = ColorResolution::Off;
        calibration.color_camera = CameraCalibration::DISABLED;
        let t = Transformation::new(calibration);
        let px = t.transform_3d_to_2d(
            Vector3::new(0.0, 0.0, 1000.0),
            CalibrationType::Depth,
            CalibrationType::Color,
        );
        assert!(px.is_none());
        assert!(t
            .depth_image_to_color_camera(&DepthImage::new(32, 24, vec![1000u16; 32 * 24]))
            .is_none());
    }

    #[test]
    fn test_2d_to_3d_zero_depth_unavailable() {
        let t = Transformation::new(identity_calibration());
        let p = t.transform_2d_to_3d(
            Vector2::new(3.0, 4.0),
            0.0,
            CalibrationType::Depth,
            CalibrationType::Depth,
        );
        assert!(p.is_none());
    }

    #[test]
    fn test_2d_to_2d_depth_to_color_with_baseline() {
        let t = Transformation::new(offset_calibration());
        // depth principal point at 2 m lands left of the color principal point
        let px = t
            .transform_2d_to_2d(
                Vector2::new(15.5, 11.5),
                2000.0,
                CalibrationType::Depth,
                CalibrationType::Color,
            )
            .unwrap();
        let expected_x = 60.0 * (-32.0 / 2000.0) + 31.5;
        assert!((px.x - expected_x).abs() < 1e-3, "got {}", px.x);
        assert!((px.y - 23.5).abs() < 1e-3);
    }

    #[test]
    fn test_depth_to_color_identity_preserves_image() {
        let t = Transformation::new(identity_calibration());
        let mut data = vec![0u16; 32 * 24];
        data[5 * 32 + 7] = 3000;
        data[10 * 32 + 20] = 1500;
        let depth = DepthImage::new(32, 24, data);

        let aligned = t.depth_image_to_color_camera(&depth).unwrap();
        assert_eq!(aligned.width, 32);
        assert_eq!(aligned.depth_at(7, 5), 3000);
        assert_eq!(aligned.depth_at(20, 10), 1500);
        assert_eq!(aligned.depth_at(0, 0), 0);
        let filled = aligned.data.iter().filter(|&&d| d != 0).count();
        assert_eq!(filled, 2);
    }

    #[test]
    fn test_depth_to_color_upsampled_has_no_holes() {
        let t = Transformation::new(Calibration {
            depth_to_color: Extrinsics::IDENTITY,
            ..offset_calibration()
        });
        let depth = DepthImage::new(32, 24, vec![2000u16; 32 * 24]);
        let aligned = t.depth_image_to_color_camera(&depth).unwrap();
        assert_eq!((aligned.width, aligned.height), (64, 48));
        assert!(aligned.data.iter().all(|&d| d == 2000));
    }

    #[test]
    fn test_depth_to_color_keeps_nearest() {
        let mut calibration = offset_calibration();
        calibration.depth_to_color.translation = [32.0, 0.0, 0.0];
        let t = Transformation::new(calibration);
        // with this baseline the near pixel at x=9 and the far one at x=10
        // land on the same color pixels
        let mut data = vec![0u16; 32 * 24];
        data[5 * 32 + 9] = 1000;
        data[5 * 32 + 10] = 4000;
        let aligned = t
            .depth_image_to_color_camera(&DepthImage::new(32, 24, data))
            .unwrap();
        assert_eq!(aligned.depth_at(20, 10), 1000);
        assert_eq!(aligned.depth_at(21, 11), 1000);
        assert!(aligned.data.iter().all(|&d| d != 4000));
    }

    #[test]
    fn test_color_to_depth_image_samples_color() {
        let t = Transformation::new(identity_calibration());
        let mut color = vec![0u8; 32 * 24 * 4];
        let i = (5 * 32 + 7) * 4;
        color[i..i + 4].copy_from_slice(&[10, 20, 30, 255]);
        let color = ColorImage::new(32, 24, Bytes::from(color));

        let mut depth = vec![0u16; 32 * 24];
        depth[5 * 32 + 7] = 1000;
        let depth = DepthImage::new(32, 24, depth);

        let out = t.color_image_to_depth_camera(&depth, &color).unwrap();
        assert_eq!(out.pixel(7, 5), Some([10, 20, 30, 255]));
        // no depth -> transparent
        assert_eq!(out.pixel(0, 0), Some([0, 0, 0, 0]));
    }

    #[test]
    fn test_point_cloud_skips_invalid() {
        let t = Transformation::new(identity_calibration());
        let mut data = vec![0u16; 32 * 24];
        data[11 * 32 + 15] = 2000;
        let cloud = t
            .depth_image_to_point_cloud(&DepthImage::new(32, 24, data))
            .unwrap();
        assert_eq!(cloud.len(), 1);
        assert!((cloud[0].z - 2.0).abs() < 1e-6);
        assert!(cloud[0].x.abs() < 0.04);
    }

    #[test]
    fn test_wrong_depth_geometry_rejected() {
        let t = Transformation::new(identity_calibration());
        let depth = DepthImage::new(10, 10, vec![1000u16; 100]);
        assert!(t.depth_image_to_color_camera(&depth).is_none());
        assert!(t.depth_image_to_point_cloud(&depth).is_none());
    }
}
