//! Frame - the published, immutable multi-modal snapshot.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use crate::{Body, ImuSample};

/// Body-index value marking a background pixel
pub const BODY_INDEX_BACKGROUND: u8 = 255;

/// BGRA color buffer, `width * height * 4` bytes
#[derive(Debug, Clone, PartialEq)]
pub struct ColorImage {
    pub width: u32,
    pub height: u32,
    pub data: Bytes,
}

impl ColorImage {
    pub fn new(width: u32, height: u32, data: Bytes) -> Self {
        Self {
            width,
            height,
            data,
        }
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// BGRA bytes at (x, y)
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * 4;
        let px = self.data.get(offset..offset + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }
}

/// Depth buffer in millimeters, 0 = no return
#[derive(Debug, Clone, PartialEq)]
pub struct DepthImage {
    pub width: u32,
    pub height: u32,
    pub data: Arc<[u16]>,
}

impl DepthImage {
    pub fn new(width: u32, height: u32, data: impl Into<Arc<[u16]>>) -> Self {
        Self {
            width,
            height,
            data: data.into(),
        }
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Depth at (x, y) in millimeters; out-of-bounds reads as 0
    pub fn depth_at(&self, x: u32, y: u32) -> u16 {
        if x >= self.width || y >= self.height {
            return 0;
        }
        self.data
            .get(y as usize * self.width as usize + x as usize)
            .copied()
            .unwrap_or(0)
    }
}

/// Per-depth-pixel body ownership mask
#[derive(Debug, Clone, PartialEq)]
pub struct BodyIndexMap {
    pub width: u32,
    pub height: u32,
    pub data: Bytes,
}

impl BodyIndexMap {
    pub fn new(width: u32, height: u32, data: Bytes) -> Self {
        Self {
            width,
            height,
            data,
        }
    }

    /// True when pixel `i` is background (or out of range)
    pub fn is_background(&self, i: usize) -> bool {
        self.data
            .get(i)
            .map_or(true, |&v| v == BODY_INDEX_BACKGROUND)
    }

    /// Index of the body owning pixel `i`
    pub fn body_at(&self, i: usize) -> Option<u8> {
        self.data
            .get(i)
            .copied()
            .filter(|&v| v != BODY_INDEX_BACKGROUND)
    }

    /// Number of foreground pixels
    pub fn foreground_count(&self) -> usize {
        self.data
            .iter()
            .filter(|&&v| v != BODY_INDEX_BACKGROUND)
            .count()
    }
}

/// Published snapshot of one acquisition cycle
///
/// Shared with consumers as `Arc<Frame>`; never mutated after construction.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Device timestamp of the source capture
    pub timestamp: Duration,
    /// Device temperature (°C)
    pub temperature_c: f32,
    /// BGRA color; `None` when the color stream is off
    pub color: Option<ColorImage>,
    pub depth: DepthImage,
    /// Present only when a tracker result was ready this cycle
    pub body_index: Option<BodyIndexMap>,
    /// Depth reprojected into the color pixel grid
    pub depth_in_color: Option<DepthImage>,
    /// BGRA color resampled into the depth pixel grid (background removal)
    pub color_in_depth: Option<ColorImage>,
    pub bodies: Vec<Body>,
    pub imu: Option<ImuSample>,
}

impl Frame {
    pub fn has_bodies(&self) -> bool {
        !self.bodies.is_empty()
    }

    pub fn body(&self, id: u32) -> Option<&Body> {
        self.bodies.iter().find(|b| b.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_at_bounds() {
        let depth = DepthImage::new(2, 2, vec![1u16, 2, 3, 4]);
        assert_eq!(depth.depth_at(1, 1), 4);
        assert_eq!(depth.depth_at(2, 0), 0);
        assert_eq!(depth.depth_at(0, 5), 0);
    }

    #[test]
    fn test_body_index_sentinel() {
        let map = BodyIndexMap::new(4, 1, Bytes::from_static(&[255, 0, 1, 255]));
        assert!(map.is_background(0));
        assert!(!map.is_background(1));
        assert_eq!(map.body_at(2), Some(1));
        assert_eq!(map.body_at(3), None);
        assert!(map.is_background(99));
        assert_eq!(map.foreground_count(), 2);
    }

    #[test]
    fn test_color_pixel() {
        let img = ColorImage::new(1, 2, Bytes::from_static(&[1, 2, 3, 4, 5, 6, 7, 8]));
        assert_eq!(img.pixel(0, 1), Some([5, 6, 7, 8]));
        assert_eq!(img.pixel(1, 0), None);
    }
}
