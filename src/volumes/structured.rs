// Copyright @yucwang 2026

use super::check_spacing;
use crate::accel::brick_grid::BrickGrid;
use crate::core::data::Data;
use crate::core::error::{config_error, Result};
use crate::core::native::{NativeVolume, StructuredNative};
use crate::core::volume::{Volume, VolumeState};
use crate::math::constants::Vector3f;

/// Commit parameters of a dense regular grid. Voxels are x fastest and sit
/// on the lattice points `origin + spacing * index`.
#[derive(Clone, Debug)]
pub struct StructuredParams {
    pub dimensions: [usize; 3],
    pub origin: Vector3f,
    pub spacing: Vector3f,
    pub data: Data,
}

impl Default for StructuredParams {
    fn default() -> Self {
        Self {
            dimensions: [0, 0, 0],
            origin: Vector3f::zeros(),
            spacing: Vector3f::new(1.0, 1.0, 1.0),
            data: Vec::<f32>::new().into(),
        }
    }
}

#[derive(Default)]
pub struct StructuredVolume {
    params: StructuredParams,
    state: Option<VolumeState>,
}

impl StructuredVolume {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn committed(params: StructuredParams) -> Result<Self> {
        let mut volume = Self { params, state: None };
        volume.commit()?;
        Ok(volume)
    }

    pub fn params(&self) -> &StructuredParams {
        &self.params
    }

    /// Takes effect at the next commit.
    pub fn set_params(&mut self, params: StructuredParams) {
        self.params = params;
    }

    pub fn commit(&mut self) -> Result<()> {
        self.state = None;

        let params = &self.params;
        let dims = params.dimensions;
        if dims.iter().any(|&d| d == 0) {
            return config_error(format!("structured volume dimensions must be positive, got {:?}", dims));
        }
        check_spacing("gridSpacing", &params.spacing)?;

        let data_type = params.data.data_type();
        if !data_type.is_voxel_type() {
            return config_error(format!("unsupported voxel type {:?}", data_type));
        }
        let expected = match dims.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d)) {
            Some(n) => n,
            None => return config_error(format!("structured volume dimensions {:?} are too large", dims)),
        };
        if params.data.len() != expected {
            return config_error(format!(
                "structured volume expects {} voxels for dimensions {:?}, got {}",
                expected,
                dims,
                params.data.len()
            ));
        }

        let bricks = BrickGrid::build(dims, params.origin, params.spacing, &params.data);
        let bounds = bricks.bounds();
        let value_range = bricks.value_range();
        let nominal_step = bricks.nominal_step();
        let native = NativeVolume::Structured(StructuredNative {
            dims,
            origin: params.origin,
            spacing: params.spacing,
            voxels: params.data.clone(),
            bricks,
        });
        self.state = Some(VolumeState::new(bounds, value_range, nominal_step, native));
        Ok(())
    }
}

impl Volume for StructuredVolume {
    fn type_name(&self) -> &'static str {
        "structuredRegular"
    }

    fn state(&self) -> Option<&VolumeState> {
        self.state.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::context::Context;
    use crate::core::data::DataBuffer;
    use crate::core::error::VklError;
    use crate::math::constants::Float;
    use crate::math::range::Range1f;

    #[test]
    fn rejects_wrong_length_and_type() {
        let mut volume = StructuredVolume::new();
        volume.set_params(StructuredParams { dimensions: [2, 2, 2], data: vec![1.0f32; 7].into(), ..Default::default() });
        assert!(matches!(volume.commit(), Err(VklError::Configuration(_))));
        assert!(!volume.is_committed());

        volume.set_params(StructuredParams { dimensions: [2, 2, 2], data: vec![1i32; 8].into(), ..Default::default() });
        assert!(matches!(volume.commit(), Err(VklError::Configuration(_))));

        volume.set_params(StructuredParams { dimensions: [2, 2, 2], data: vec![1u8; 8].into(), ..Default::default() });
        assert!(volume.commit().is_ok());
        assert_eq!(volume.value_range().unwrap(), Range1f::point(1.0));
    }

    #[test]
    fn overflowing_dimensions_are_rejected() {
        let params = StructuredParams { dimensions: [1 << 22; 3], data: vec![1.0f32; 8].into(), ..Default::default() };
        assert!(matches!(StructuredVolume::committed(params), Err(VklError::Configuration(_))));
    }

    #[test]
    fn failed_recommit_leaves_volume_unusable() {
        let mut volume = StructuredVolume::committed(StructuredParams {
            dimensions: [2, 2, 2],
            data: vec![0.5f64; 8].into(),
            ..Default::default()
        })
        .unwrap();
        assert!(volume.is_committed());
        volume.set_params(StructuredParams { dimensions: [3, 2, 2], ..volume.params().clone() });
        assert!(volume.commit().is_err());
        assert!(volume.bounding_box().is_err());
    }

    #[test]
    fn commit_produces_fresh_handles() {
        let params = StructuredParams { dimensions: [2, 2, 2], data: vec![0.0f32; 8].into(), ..Default::default() };
        let mut volume = StructuredVolume::committed(params).unwrap();
        let first = volume.native_id().unwrap();
        volume.commit().unwrap();
        assert_ne!(first, volume.native_id().unwrap());
    }

    #[test]
    fn samples_stay_inside_value_range() {
        let dims = [9usize, 7, 5];
        let mut raw = Vec::new();
        for i in 0..dims[0] * dims[1] * dims[2] {
            raw.push(((i * 37 % 101) as Float).sin() * 3.0);
            raw.push(0.0);
        }
        let volume = StructuredVolume::committed(StructuredParams {
            dimensions: dims,
            origin: Vector3f::new(-1.0, 0.0, 2.0),
            spacing: Vector3f::new(0.5, 1.0, 0.25),
            data: Data::strided(DataBuffer::Float(raw), 2),
        })
        .unwrap();
        let ctx = Context::default();
        let sampler = ctx.new_sampler(&volume).unwrap();
        let range = volume.value_range().unwrap();
        let bounds = volume.bounding_box().unwrap();
        let d = bounds.diagonal();
        for i in 0..500 {
            let f = |k: usize| ((i * k) % 97) as Float / 96.0;
            let p = bounds.p_min + Vector3f::new(d.x * f(13), d.y * f(29), d.z * f(71));
            let s = sampler.compute_sample(&p);
            assert!(s >= range.lower - 1e-5 && s <= range.upper + 1e-5);
        }
    }
}
