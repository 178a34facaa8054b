//! Brown-Conrady lens model (rational radial + tangential).
//!
//! Works on normalized image-plane coordinates; pixel conversion is the
//! caller's job.

use contracts::Intrinsics;
use nalgebra::Vector2;

const UNDISTORT_ITERATIONS: usize = 20;
const UNDISTORT_TOLERANCE: f32 = 1e-6;

fn radial_and_tangential(k: &Intrinsics, p: &Vector2<f32>) -> Option<(f32, Vector2<f32>)> {
    let r2 = p.x * p.x + p.y * p.y;
    let r4 = r2 * r2;
    let r6 = r4 * r2;

    let numerator = 1.0 + k.k1 * r2 + k.k2 * r4 + k.k3 * r6;
    let denominator = 1.0 + k.k4 * r2 + k.k5 * r4 + k.k6 * r6;
    if denominator.abs() <= f32::EPSILON {
        return None;
    }
    let radial = numerator / denominator;

    let xy = 2.0 * p.x * p.y;
    let tangential = Vector2::new(
        k.p1 * xy + k.p2 * (r2 + 2.0 * p.x * p.x),
        k.p1 * (r2 + 2.0 * p.y * p.y) + k.p2 * xy,
    );

    Some((radial, tangential))
}

/// Undistorted -> distorted normalized coordinates
pub fn distort(k: &Intrinsics, p: Vector2<f32>) -> Option<Vector2<f32>> {
    if !k.has_distortion() {
        return Some(p);
    }
    let (radial, tangential) = radial_and_tangential(k, &p)?;
    Some(p * radial + tangential)
}

/// Distorted -> undistorted normalized coordinates (fixed-point iteration)
///
/// `None` if the iteration diverges.
pub fn undistort(k: &Intrinsics, distorted: Vector2<f32>) -> Option<Vector2<f32>> {
    if !k.has_distortion() {
        return Some(distorted);
    }

    let mut p = distorted;
    for _ in 0..UNDISTORT_ITERATIONS {
        let (radial, tangential) = radial_and_tangential(k, &p)?;
        if radial <= 0.0 {
            return None;
        }
        let next = (distorted - tangential) / radial;
        let step = (next - p).norm();
        p = next;
        if step < UNDISTORT_TOLERANCE {
            break;
        }
    }

    let check = distort(k, p)?;
    ((check - distorted).norm() < 1e-3 && p.x.is_finite() && p.y.is_finite()).then_some(p)
}

/// Pixel -> distorted normalized coordinates
pub fn pixel_to_normalized(k: &Intrinsics, u: f32, v: f32) -> Vector2<f32> {
    Vector2::new((u - k.cx) / k.fx, (v - k.cy) / k.fy)
}

/// Distorted normalized coordinates -> pixel
pub fn normalized_to_pixel(k: &Intrinsics, p: Vector2<f32>) -> Vector2<f32> {
    Vector2::new(p.x * k.fx + k.cx, p.y * k.fy + k.cy)
}
