// Copyright @yucwang 2026

use crate::core::error::{Result, VklError};
use crate::core::kernel::KernelBackend;
use crate::core::native::NativeVolume;
use crate::core::volume::{Volume, VolumeState};
use crate::math::aabb::AABB;
use crate::math::constants::{Float, Vector3f};
use crate::math::simd::{is_supported_width, LaneMask, VFloat, VVec3f};

/// Point and gradient evaluation bound to one committed volume.
///
/// Holds no mutable state; share it freely between threads.
#[derive(Clone, Copy)]
pub struct Sampler<'a> {
    volume: &'a dyn Volume,
    state: &'a VolumeState,
    kernels: &'a dyn KernelBackend,
}

fn check_width(lanes: usize) -> Result<()> {
    if !is_supported_width(lanes) {
        return Err(VklError::UnsupportedOperation(format!("unsupported lane width {}", lanes)));
    }
    Ok(())
}

impl<'a> Sampler<'a> {
    pub(crate) fn new(volume: &'a dyn Volume, kernels: &'a dyn KernelBackend) -> Result<Self> {
        let state = volume.committed_state()?;
        Ok(Self { volume, state, kernels })
    }

    pub fn volume(&self) -> &'a dyn Volume {
        self.volume
    }

    fn native(&self) -> &'a NativeVolume {
        self.state.handle.native()
    }

    fn bounds(&self) -> &AABB {
        &self.state.bounds
    }

    pub fn compute_sample(&self, p: &Vector3f) -> Float {
        if !self.bounds().contains(p) {
            return 0.0;
        }
        let mut out = [0.0];
        self.kernels.sample(&[1], self.native(), &[p.x], &[p.y], &[p.z], &mut out);
        out[0]
    }

    pub fn compute_gradient(&self, p: &Vector3f) -> Result<Vector3f> {
        if !self.bounds().contains(p) {
            return Ok(Vector3f::zeros());
        }
        let (mut gx, mut gy, mut gz) = ([0.0], [0.0], [0.0]);
        self.kernels.gradient(&[1], self.native(), &[p.x], &[p.y], &[p.z], &mut gx, &mut gy, &mut gz)?;
        Ok(Vector3f::new(gx[0], gy[0], gz[0]))
    }

    /// Lanes with a zero mask entry keep their previous `out` value.
    pub fn compute_sample_v<const W: usize>(
        &self,
        valid: &LaneMask<W>,
        p: &VVec3f<W>,
        out: &mut VFloat<W>,
    ) -> Result<()> {
        check_width(W)?;
        let mut mask = valid.0;
        for lane in 0..W {
            if mask[lane] != 0 && !self.bounds().contains(&p.lane(lane)) {
                out.0[lane] = 0.0;
                mask[lane] = 0;
            }
        }
        self.kernels.sample(&mask, self.native(), &p.x, &p.y, &p.z, &mut out.0);
        Ok(())
    }

    pub fn compute_gradient_v<const W: usize>(
        &self,
        valid: &LaneMask<W>,
        p: &VVec3f<W>,
        out: &mut VVec3f<W>,
    ) -> Result<()> {
        check_width(W)?;
        let mut mask = valid.0;
        for lane in 0..W {
            if mask[lane] != 0 && !self.bounds().contains(&p.lane(lane)) {
                mask[lane] = 0;
            }
        }
        let VVec3f { x, y, z } = out;
        self.kernels.gradient(&mask, self.native(), &p.x, &p.y, &p.z, x, y, z)?;
        for lane in 0..W {
            if valid.0[lane] != 0 && mask[lane] == 0 {
                out.set_lane(lane, Vector3f::zeros());
            }
        }
        Ok(())
    }

    /// Samples an arbitrary number of points.
    pub fn compute_sample_n(&self, points: &[Vector3f]) -> Vec<Float> {
        let mut out = vec![0.0; points.len()];
        let mask: Vec<i32> = points.iter().map(|p| self.bounds().contains(p) as i32).collect();
        let x: Vec<Float> = points.iter().map(|p| p.x).collect();
        let y: Vec<Float> = points.iter().map(|p| p.y).collect();
        let z: Vec<Float> = points.iter().map(|p| p.z).collect();
        self.kernels.sample(&mask, self.native(), &x, &y, &z, &mut out);
        out
    }

    pub fn compute_gradient_n(&self, points: &[Vector3f]) -> Result<Vec<Vector3f>> {
        let n = points.len();
        let mask: Vec<i32> = points.iter().map(|p| self.bounds().contains(p) as i32).collect();
        let x: Vec<Float> = points.iter().map(|p| p.x).collect();
        let y: Vec<Float> = points.iter().map(|p| p.y).collect();
        let z: Vec<Float> = points.iter().map(|p| p.z).collect();
        let (mut gx, mut gy, mut gz) = (vec![0.0; n], vec![0.0; n], vec![0.0; n]);
        self.kernels.gradient(&mask, self.native(), &x, &y, &z, &mut gx, &mut gy, &mut gz)?;
        Ok((0..n).map(|i| Vector3f::new(gx[i], gy[i], gz[i])).collect())
    }
}
