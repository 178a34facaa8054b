//! Background removal

use bytes::Bytes;
use contracts::{BodyIndexMap, ColorImage};

/// Keep only pixels owned by a tracked body
///
/// `color_in_depth` and `body_index` share the depth pixel grid. Background
/// pixels (mask 255) become fully transparent; `None` on a size mismatch.
pub fn compose_foreground(color_in_depth: &ColorImage, body_index: &BodyIndexMap) -> Option<ColorImage> {
    if (color_in_depth.width, color_in_depth.height) != (body_index.width, body_index.height) {
        return None;
    }
    let pixels = color_in_depth.pixel_count();
    if color_in_depth.data.len() < pixels * 4 || body_index.data.len() < pixels {
        return None;
    }

    let mut out = vec![0u8; pixels * 4];
    for (i, (dst, src)) in out
        .chunks_exact_mut(4)
        .zip(color_in_depth.data.chunks_exact(4))
        .enumerate()
    {
        if !body_index.is_background(i) {
            dst.copy_from_slice(src);
        }
    }
    Some(ColorImage::new(
        color_in_depth.width,
        color_in_depth.height,
        Bytes::from(out),
    ))
}
