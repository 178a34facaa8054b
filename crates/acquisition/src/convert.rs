//! Raw device buffers -> owned frame buffers
//!
//! Every function here copies; nothing returned borrows from the `Capture`.

use bytes::Bytes;
use contracts::{
    Body, BodyIndexMap, ColorImage, DepthImage, Image, ImageFormat, Joint, JointId, Skeleton,
};
use image::ImageFormat as CodecFormat;
use yuv::{
    yuv_nv12_to_rgba, yuyv422_to_rgba, YuvBiPlanarImage, YuvConversionMode, YuvPackedImage,
    YuvRange, YuvStandardMatrix,
};

use crate::error::{AcquisitionError, Result};

const MM_TO_M: f32 = 0.001;

/// Any supported color layout -> BGRA
pub fn color_to_bgra(image: &Image) -> Result<ColorImage> {
    let bgra = match image.format {
        ImageFormat::Bgra32 => copy_rows(image, 4, "color")?,
        ImageFormat::Mjpg => return mjpg_to_bgra(image),
        ImageFormat::Nv12 => nv12_to_bgra(image)?,
        ImageFormat::Yuy2 => yuy2_to_bgra(image)?,
        other => {
            return Err(AcquisitionError::conversion(
                "color",
                format!("unexpected color format {other:?}"),
            ))
        }
    };
    Ok(ColorImage::new(image.width, image.height, Bytes::from(bgra)))
}

/// 16-bit depth -> flat millimeter samples
pub fn depth_to_millimeters(image: &Image) -> Result<DepthImage> {
    if image.format != ImageFormat::Depth16 {
        return Err(AcquisitionError::conversion(
            "depth",
            format!("expected depth16, got {:?}", image.format),
        ));
    }
    let packed = copy_rows(image, 2, "depth")?;
    let samples: Vec<u16> = bytemuck::allocation::pod_collect_to_vec(packed.as_slice());
    Ok(DepthImage::new(image.width, image.height, samples))
}

/// Tracker body-index image -> mask (255 = background)
pub fn body_index_map(image: &Image) -> Result<BodyIndexMap> {
    if image.format != ImageFormat::Custom8 {
        return Err(AcquisitionError::conversion(
            "body_index",
            format!("expected custom8, got {:?}", image.format),
        ));
    }
    let mask = copy_rows(image, 1, "body_index")?;
    Ok(BodyIndexMap::new(image.width, image.height, Bytes::from(mask)))
}

/// Raw tracker skeleton (mm) -> published body (m)
pub fn skeleton_to_body(skeleton: &Skeleton) -> Body {
    let mut body = Body::new(skeleton.body_id);
    for (id, raw) in JointId::ALL.iter().zip(skeleton.joints.iter()) {
        *body.joint_mut(*id) = Joint {
            id: *id,
            confidence: raw.confidence,
            position: raw.position_mm.scale(MM_TO_M),
            orientation: raw.orientation.normalized(),
        };
    }
    body
}

/// Copy `height` rows of `width * bpp` bytes, dropping any stride padding
fn copy_rows(image: &Image, bpp: usize, modality: &'static str) -> Result<Vec<u8>> {
    let row = image.width as usize * bpp;
    let stride = if image.stride == 0 {
        row
    } else {
        image.stride as usize
    };
    let height = image.height as usize;
    if stride < row || height == 0 || image.data.len() < stride * (height - 1) + row {
        return Err(AcquisitionError::conversion(
            modality,
            format!(
                "buffer too small: {} bytes for {}x{} stride {}",
                image.data.len(),
                image.width,
                image.height,
                stride
            ),
        ));
    }

    if stride == row {
        return Ok(image.data[..row * height].to_vec());
    }
    let mut out = Vec::with_capacity(row * height);
    for y in 0..height {
        out.extend_from_slice(&image.data[y * stride..y * stride + row]);
    }
    Ok(out)
}

fn rgba_to_bgra_in_place(pixels: &mut [u8]) {
    for px in pixels.chunks_exact_mut(4) {
        px.swap(0, 2);
    }
}

fn mjpg_to_bgra(image: &Image) -> Result<ColorImage> {
    let decoded = image::load_from_memory_with_format(&image.data, CodecFormat::Jpeg)
        .map_err(|err| AcquisitionError::conversion("color", format!("MJPG decode failed: {err}")))?
        .to_rgba8();
    let (width, height) = decoded.dimensions();
    if (width, height) != (image.width, image.height) {
        return Err(AcquisitionError::conversion(
            "color",
            format!(
                "MJPG is {width}x{height}, capture says {}x{}",
                image.width, image.height
            ),
        ));
    }
    let mut bgra = decoded.into_raw();
    rgba_to_bgra_in_place(&mut bgra);
    Ok(ColorImage::new(width, height, Bytes::from(bgra)))
}

fn nv12_to_bgra(image: &Image) -> Result<Vec<u8>> {
    let (width, height) = (image.width, image.height);
    let stride = if image.stride == 0 { width } else { image.stride };
    let y_len = stride as usize * height as usize;
    let uv_len = stride as usize * height.div_ceil(2) as usize;
    if image.data.len() < y_len + uv_len {
        return Err(AcquisitionError::conversion(
            "color",
            format!(
                "NV12 buffer too small: got {}, expected {}",
                image.data.len(),
                y_len + uv_len
            ),
        ));
    }

    let planes = YuvBiPlanarImage {
        y_plane: &image.data[..y_len],
        y_stride: stride,
        uv_plane: &image.data[y_len..y_len + uv_len],
        uv_stride: stride,
        width,
        height,
    };
    let mut rgba = vec![0u8; width as usize * height as usize * 4];
    yuv_nv12_to_rgba(
        &planes,
        &mut rgba,
        width * 4,
        YuvRange::Full,
        YuvStandardMatrix::Bt709,
        YuvConversionMode::Balanced,
    )
    .map_err(|err| AcquisitionError::conversion("color", format!("NV12 -> RGBA failed: {err:?}")))?;

    rgba_to_bgra_in_place(&mut rgba);
    Ok(rgba)
}

fn yuy2_to_bgra(image: &Image) -> Result<Vec<u8>> {
    let (width, height) = (image.width, image.height);
    let stride = if image.stride == 0 {
        width * 2
    } else {
        image.stride
    };
    let expected = stride as usize * height as usize;
    if image.data.len() < expected {
        return Err(AcquisitionError::conversion(
            "color",
            format!(
                "YUY2 buffer too small: got {}, expected {expected}",
                image.data.len()
            ),
        ));
    }

    let packed = YuvPackedImage {
        yuy: &image.data[..expected],
        yuy_stride: stride,
        width,
        height,
    };
    let mut rgba = vec![0u8; width as usize * height as usize * 4];
    yuyv422_to_rgba(
        &packed,
        &mut rgba,
        width * 4,
        YuvRange::Full,
        YuvStandardMatrix::Bt709,
    )
    .map_err(|err| AcquisitionError::conversion("color", format!("YUY2 -> RGBA failed: {err:?}")))?;

    rgba_to_bgra_in_place(&mut rgba);
    Ok(rgba)
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{ConfidenceLevel, Quaternion, SkeletonJoint, Vector3};
    use image::codecs::jpeg::JpegEncoder;
    use image::ExtendedColorType;

    fn raw(format: ImageFormat, width: u32, height: u32, stride: u32, data: Vec<u8>) -> Image {
        Image {
            format,
            width,
            height,
            stride,
            data: Bytes::from(data),
        }
    }

    #[test]
    fn test_bgra_strips_stride_padding() {
        // 2x2 image, 12-byte rows (4 bytes padding)
        let mut data = Vec::new();
        data.extend_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8, 0, 0, 0, 0]);
        data.extend_from_slice(&[9, 10, 11, 12, 13, 14, 15, 16, 0, 0, 0, 0]);
        let color = color_to_bgra(&raw(ImageFormat::Bgra32, 2, 2, 12, data)).unwrap();
        assert_eq!(color.data.len(), 16);
        assert_eq!(color.pixel(1, 1), Some([13, 14, 15, 16]));
    }

    #[test]
    fn test_depth_samples_little_endian() {
        let data = vec![0xB8, 0x0B, 0x00, 0x00, 0xDC, 0x05, 0x01, 0x00];
        let depth = depth_to_millimeters(&raw(ImageFormat::Depth16, 2, 2, 4, data)).unwrap();
        assert_eq!(&depth.data[..], &[3000, 0, 1500, 1]);
    }

    #[test]
    fn test_depth_short_buffer_rejected() {
        let err = depth_to_millimeters(&raw(ImageFormat::Depth16, 4, 4, 8, vec![0; 10])).unwrap_err();
        assert!(err.to_string().contains("depth"));
    }

    #[test]
    fn test_wrong_format_rejected() {
        assert!(depth_to_millimeters(&raw(ImageFormat::Custom8, 1, 1, 1, vec![0])).is_err());
        assert!(color_to_bgra(&raw(ImageFormat::Depth16, 1, 1, 2, vec![0, 0])).is_err());
        assert!(body_index_map(&raw(ImageFormat::Bgra32, 1, 1, 4, vec![0; 4])).is_err());
    }

    #[test]
    fn test_mjpg_decodes_to_bgra() {
        // solid red 16x8
        let rgb: Vec<u8> = std::iter::repeat([255u8, 0, 0]).take(16 * 8).flatten().collect();
        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, 95)
            .encode(&rgb, 16, 8, ExtendedColorType::Rgb8)
            .unwrap();

        let color = color_to_bgra(&raw(ImageFormat::Mjpg, 16, 8, 0, jpeg)).unwrap();
        let [b, g, r, a] = color.pixel(4, 4).unwrap();
        assert!(r > 200 && g < 40 && b < 40, "got bgra {b} {g} {r}");
        assert_eq!(a, 255);
    }

    #[test]
    fn test_mjpg_garbage_is_conversion_error() {
        let err = color_to_bgra(&raw(ImageFormat::Mjpg, 4, 4, 0, vec![1, 2, 3])).unwrap_err();
        assert!(matches!(err, AcquisitionError::Conversion { modality: "color", .. }));
    }

    #[test]
    fn test_nv12_gray_is_gray() {
        let (w, h) = (4u32, 2u32);
        let mut data = vec![128u8; (w * h) as usize];
        data.extend(vec![128u8; (w * h / 2) as usize]);
        let color = color_to_bgra(&raw(ImageFormat::Nv12, w, h, w, data)).unwrap();
        let [b, g, r, a] = color.pixel(3, 1).unwrap();
        assert!(b.abs_diff(128) <= 2 && g.abs_diff(128) <= 2 && r.abs_diff(128) <= 2);
        assert_eq!(a, 255);
    }

    #[test]
    fn test_yuy2_gray_is_gray() {
        let (w, h) = (4u32, 2u32);
        let data = vec![128u8; (w * h * 2) as usize];
        let color = color_to_bgra(&raw(ImageFormat::Yuy2, w, h, w * 2, data)).unwrap();
        assert_eq!(color.data.len(), (w * h * 4) as usize);
        let [b, _, r, _] = color.pixel(0, 0).unwrap();
        assert!(b.abs_diff(128) <= 2 && r.abs_diff(128) <= 2);
    }

    #[test]
    fn test_skeleton_converted_to_meters() {
        let mut joints = [SkeletonJoint::default(); JointId::COUNT];
        joints[JointId::Head.index()] = SkeletonJoint {
            position_mm: Vector3::new(100.0, -250.0, 2000.0),
            orientation: Quaternion::new(2.0, 0.0, 0.0, 0.0),
            confidence: ConfidenceLevel::High,
        };
        let body = skeleton_to_body(&Skeleton { body_id: 7, joints });

        assert_eq!(body.id, 7);
        let head = body.joint(JointId::Head);
        assert_eq!(head.id, JointId::Head);
        assert!((head.position.z - 2.0).abs() < 1e-6);
        assert!((head.position.y + 0.25).abs() < 1e-6);
        assert!((head.orientation.w - 1.0).abs() < 1e-6);
        assert_eq!(body.joint(JointId::Pelvis).confidence, ConfidenceLevel::None);
        assert_eq!(body.reliable_joints().count(), 1);
    }
}
