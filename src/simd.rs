//! Small SIMD helpers shared by the BVH and the packed query scans.
//!
//! Everything operates on 4-wide single-precision lanes. NaN comparisons
//! return false, so a padding lane can never win a `<=` test against a real
//! candidate; the packed scans rely on this.

use std::simd::f32x4;

/// Width of the packed records and BVH leaf packets.
pub(crate) const LANES: usize = 4;

#[inline]
pub(crate) fn dot3(ax: f32x4, ay: f32x4, az: f32x4, bx: f32x4, by: f32x4, bz: f32x4) -> f32x4 {
    ax * bx + ay * by + az * bz
}

#[inline]
pub(crate) fn length_squared3(x: f32x4, y: f32x4, z: f32x4) -> f32x4 {
    x * x + y * y + z * z
}

#[inline]
pub(crate) fn distance_squared3(
    ax: f32x4,
    ay: f32x4,
    az: f32x4,
    bx: f32x4,
    by: f32x4,
    bz: f32x4,
) -> f32x4 {
    length_squared3(ax - bx, ay - by, az - bz)
}

/// Evaluate four planes `(nx, ny, nz, w)` at four points: `n · p + w`.
#[inline]
pub(crate) fn eval_plane4(
    px: f32x4,
    py: f32x4,
    pz: f32x4,
    nx: f32x4,
    ny: f32x4,
    nz: f32x4,
    w: f32x4,
) -> f32x4 {
    px * nx + py * ny + pz * nz + w
}
