// Copyright @yucwang 2026

use super::{trilinear, trilinear_gradient};
use crate::core::native::StructuredNative;
use crate::math::constants::{Float, Vector3f};

/// Lower corner voxel and fractional offset of `p`, or `None` outside the
/// lattice.
fn locate(volume: &StructuredNative, p: &Vector3f) -> Option<([usize; 3], [usize; 3], Vector3f)> {
    let mut lo = [0usize; 3];
    let mut hi = [0usize; 3];
    let mut t = Vector3f::zeros();
    for axis in 0..3 {
        let n = volume.dims[axis];
        let u = (p[axis] - volume.origin[axis]) / volume.spacing[axis];
        if !(u >= 0.0 && u <= (n - 1) as Float) {
            return None;
        }
        let i0 = (u.floor() as usize).min(n.saturating_sub(2));
        lo[axis] = i0;
        hi[axis] = (i0 + 1).min(n - 1);
        t[axis] = (u - i0 as Float).min(1.0);
    }
    Some((lo, hi, t))
}

fn corners(volume: &StructuredNative, lo: &[usize; 3], hi: &[usize; 3]) -> [[[Float; 2]; 2]; 2] {
    let [nx, ny, _] = volume.dims;
    let fetch = |x: usize, y: usize, z: usize| volume.voxels.scalar((z * ny + y) * nx + x);
    let mut c = [[[0.0; 2]; 2]; 2];
    for (dz, &z) in [lo[2], hi[2]].iter().enumerate() {
        for (dy, &y) in [lo[1], hi[1]].iter().enumerate() {
            for (dx, &x) in [lo[0], hi[0]].iter().enumerate() {
                c[dz][dy][dx] = fetch(x, y, z);
            }
        }
    }
    c
}

pub fn sample(volume: &StructuredNative, p: &Vector3f) -> Float {
    match locate(volume, p) {
        Some((lo, hi, t)) => trilinear(&corners(volume, &lo, &hi), &t),
        None => 0.0,
    }
}

pub fn gradient(volume: &StructuredNative, p: &Vector3f) -> Vector3f {
    match locate(volume, p) {
        Some((lo, hi, t)) => {
            trilinear_gradient(&corners(volume, &lo, &hi), &t).component_div(&volume.spacing)
        }
        None => Vector3f::zeros(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accel::brick_grid::BrickGrid;
    use crate::core::data::{Data, DataBuffer};

    fn ramp(origin: Vector3f, spacing: Vector3f) -> StructuredNative {
        let dims = [5, 4, 3];
        let mut v = Vec::new();
        for z in 0..dims[2] {
            for y in 0..dims[1] {
                for x in 0..dims[0] {
                    v.push((x + 10 * y + 100 * z) as f32);
                }
            }
        }
        let voxels: Data = v.into();
        let bricks = BrickGrid::build(dims, origin, spacing, &voxels);
        StructuredNative { dims, origin, spacing, voxels, bricks }
    }

    #[test]
    fn samples_interpolate_voxels() {
        let volume = ramp(Vector3f::zeros(), Vector3f::new(1.0, 1.0, 1.0));
        assert_eq!(sample(&volume, &Vector3f::new(2.0, 1.0, 1.0)), 112.0);
        assert!((sample(&volume, &Vector3f::new(2.5, 1.5, 0.5)) - 67.5).abs() < 1e-4);
        // Upper faces are inside.
        assert!((sample(&volume, &Vector3f::new(4.0, 3.0, 2.0)) - 234.0).abs() < 1e-4);
        assert_eq!(sample(&volume, &Vector3f::new(4.1, 1.0, 1.0)), 0.0);
        assert_eq!(sample(&volume, &Vector3f::new(-0.1, 1.0, 1.0)), 0.0);
    }

    #[test]
    fn gradient_accounts_for_spacing() {
        let volume = ramp(Vector3f::new(1.0, 1.0, 1.0), Vector3f::new(2.0, 0.5, 1.0));
        let g = gradient(&volume, &Vector3f::new(3.3, 1.7, 2.2));
        assert!((g - Vector3f::new(0.5, 20.0, 100.0)).norm() < 1e-3);
    }

    #[test]
    fn strided_voxels() {
        let dims = [2, 2, 2];
        let mut raw = Vec::new();
        for i in 0..8 {
            raw.push(i as f32);
            raw.push(-100.0);
        }
        let voxels = Data::strided(DataBuffer::Float(raw), 2);
        let bricks = BrickGrid::build(dims, Vector3f::zeros(), Vector3f::new(1.0, 1.0, 1.0), &voxels);
        let volume = StructuredNative {
            dims,
            origin: Vector3f::zeros(),
            spacing: Vector3f::new(1.0, 1.0, 1.0),
            voxels,
            bricks,
        };
        assert!((sample(&volume, &Vector3f::new(0.5, 0.5, 0.5)) - 3.5).abs() < 1e-5);
        assert_eq!(volume.bricks.value_range().lower, 0.0);
    }
}
