// Copyright @yucwang 2026

//! Scalar reference implementation of the kernel backend.

pub mod amr;
pub mod particle;
pub mod structured;
pub mod vdb;

use crate::core::error::Result;
use crate::core::kernel::KernelBackend;
use crate::core::native::NativeVolume;
use crate::math::constants::{Float, Vector3f};

#[derive(Clone, Copy, Debug, Default)]
pub struct CpuKernels;

impl CpuKernels {
    pub fn new() -> Self {
        CpuKernels
    }

    pub fn sample_point(volume: &NativeVolume, p: &Vector3f) -> Float {
        match volume {
            NativeVolume::Structured(s) => structured::sample(s, p),
            NativeVolume::Amr(a) => amr::sample(a, p),
            NativeVolume::Particle(pt) => particle::sample(pt, p),
            NativeVolume::Vdb(v) => vdb::sample(v, p),
        }
    }

    pub fn gradient_point(volume: &NativeVolume, p: &Vector3f) -> Result<Vector3f> {
        match volume {
            NativeVolume::Structured(s) => Ok(structured::gradient(s, p)),
            NativeVolume::Amr(a) => amr::gradient(a, p),
            NativeVolume::Particle(pt) => Ok(particle::gradient(pt, p)),
            NativeVolume::Vdb(v) => Ok(vdb::gradient(v, p)),
        }
    }
}

impl KernelBackend for CpuKernels {
    fn name(&self) -> &str {
        "cpu"
    }

    fn sample(
        &self,
        valid: &[i32],
        volume: &NativeVolume,
        x: &[Float],
        y: &[Float],
        z: &[Float],
        out: &mut [Float],
    ) {
        for lane in 0..valid.len() {
            if valid[lane] == 0 {
                continue;
            }
            let p = Vector3f::new(x[lane], y[lane], z[lane]);
            out[lane] = Self::sample_point(volume, &p);
        }
    }

    fn gradient(
        &self,
        valid: &[i32],
        volume: &NativeVolume,
        x: &[Float],
        y: &[Float],
        z: &[Float],
        gx: &mut [Float],
        gy: &mut [Float],
        gz: &mut [Float],
    ) -> Result<()> {
        for lane in 0..valid.len() {
            if valid[lane] == 0 {
                continue;
            }
            let p = Vector3f::new(x[lane], y[lane], z[lane]);
            let g = Self::gradient_point(volume, &p)?;
            gx[lane] = g.x;
            gy[lane] = g.y;
            gz[lane] = g.z;
        }
        Ok(())
    }
}

/// Trilinear blend of the eight corners `c[z][y][x]`.
#[inline]
pub(crate) fn trilinear(c: &[[[Float; 2]; 2]; 2], t: &Vector3f) -> Float {
    let c00 = c[0][0][0] * (1.0 - t.x) + c[0][0][1] * t.x;
    let c10 = c[0][1][0] * (1.0 - t.x) + c[0][1][1] * t.x;
    let c01 = c[1][0][0] * (1.0 - t.x) + c[1][0][1] * t.x;
    let c11 = c[1][1][0] * (1.0 - t.x) + c[1][1][1] * t.x;

    let c0 = c00 * (1.0 - t.y) + c10 * t.y;
    let c1 = c01 * (1.0 - t.y) + c11 * t.y;

    c0 * (1.0 - t.z) + c1 * t.z
}

/// Derivative of [`trilinear`] with respect to `t`, in lattice units.
#[inline]
pub(crate) fn trilinear_gradient(c: &[[[Float; 2]; 2]; 2], t: &Vector3f) -> Vector3f {
    let lerp = |a: Float, b: Float, s: Float| a * (1.0 - s) + b * s;

    let dx0 = lerp(c[0][0][1] - c[0][0][0], c[0][1][1] - c[0][1][0], t.y);
    let dx1 = lerp(c[1][0][1] - c[1][0][0], c[1][1][1] - c[1][1][0], t.y);
    let dx = lerp(dx0, dx1, t.z);

    let dy0 = lerp(c[0][1][0] - c[0][0][0], c[0][1][1] - c[0][0][1], t.x);
    let dy1 = lerp(c[1][1][0] - c[1][0][0], c[1][1][1] - c[1][0][1], t.x);
    let dy = lerp(dy0, dy1, t.z);

    let dz0 = lerp(c[1][0][0] - c[0][0][0], c[1][0][1] - c[0][0][1], t.x);
    let dz1 = lerp(c[1][1][0] - c[0][1][0], c[1][1][1] - c[0][1][1], t.x);
    let dz = lerp(dz0, dz1, t.y);

    Vector3f::new(dx, dy, dz)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trilinear_matches_linear_field() {
        // f = x + 2y + 3z on the unit cube.
        let mut c = [[[0.0; 2]; 2]; 2];
        for z in 0..2 {
            for y in 0..2 {
                for x in 0..2 {
                    c[z][y][x] = x as Float + 2.0 * y as Float + 3.0 * z as Float;
                }
            }
        }
        let t = Vector3f::new(0.25, 0.5, 0.75);
        assert!((trilinear(&c, &t) - (0.25 + 1.0 + 2.25)).abs() < 1e-6);
        let g = trilinear_gradient(&c, &t);
        assert!((g - Vector3f::new(1.0, 2.0, 3.0)).norm() < 1e-6);
    }
}
