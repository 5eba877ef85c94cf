// Copyright @yucwang 2026

use super::check_spacing;
use crate::accel::vdb_tree::VdbTree;
use crate::core::data::{Data, DataType};
use crate::core::error::{config_error, Result};
use crate::core::native::{NativeVolume, SparseLeaves, VdbNative, VDB_LEAF_DIM, VDB_LEAF_VOXELS};
use crate::core::volume::{Volume, VolumeState};
use crate::math::constants::Vector3f;

/// Commit parameters of a sparse volume made of 8^3 float leaves. Leaf
/// origins are index-space voxel coordinates and must be multiples of 8.
#[derive(Clone, Debug)]
pub struct VdbParams {
    pub origin: Vector3f,
    pub spacing: Vector3f,
    pub leaf_origins: Vec<[i32; 3]>,
    pub leaf_data: Vec<Data>,
}

impl Default for VdbParams {
    fn default() -> Self {
        Self {
            origin: Vector3f::zeros(),
            spacing: Vector3f::new(1.0, 1.0, 1.0),
            leaf_origins: Vec::new(),
            leaf_data: Vec::new(),
        }
    }
}

#[derive(Default)]
pub struct VdbVolume {
    params: VdbParams,
    state: Option<VolumeState>,
}

impl VdbVolume {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn committed(params: VdbParams) -> Result<Self> {
        let mut volume = Self { params, state: None };
        volume.commit()?;
        Ok(volume)
    }

    pub fn params(&self) -> &VdbParams {
        &self.params
    }

    pub fn set_params(&mut self, params: VdbParams) {
        self.params = params;
    }

    /// Copies every leaf into aligned storage.
    fn gather_leaves(&self) -> Result<SparseLeaves> {
        let params = &self.params;
        if params.leaf_origins.is_empty() {
            return config_error("vdb volume needs at least one leaf");
        }
        if params.leaf_origins.len() != params.leaf_data.len() {
            return config_error(format!(
                "{} leaf origins but {} leaf data arrays",
                params.leaf_origins.len(),
                params.leaf_data.len()
            ));
        }

        let dim = VDB_LEAF_DIM as i32;
        let mut leaves = SparseLeaves::new();
        for (origin, data) in params.leaf_origins.iter().zip(&params.leaf_data) {
            if origin.iter().any(|c| c.rem_euclid(dim) != 0) {
                return config_error(format!("leaf origin {:?} is not a multiple of {}", origin, dim));
            }
            if data.data_type() != DataType::Float {
                return config_error(format!("vdb leaf data must be float, got {:?}", data.data_type()));
            }
            if data.len() != VDB_LEAF_VOXELS {
                return config_error(format!("vdb leaf holds {} voxels, expected {}", data.len(), VDB_LEAF_VOXELS));
            }
            if !leaves.insert(*origin, &data.to_f32_vec()) {
                return config_error(format!("duplicate leaf at {:?}", origin));
            }
        }
        Ok(leaves)
    }

    pub fn commit(&mut self) -> Result<()> {
        self.state = None;
        check_spacing("gridSpacing", &self.params.spacing)?;
        let leaves = self.gather_leaves()?;

        let origin = self.params.origin;
        let spacing = self.params.spacing;
        let tree = VdbTree::build(&leaves, origin, spacing);
        log::debug!("vdb: {} leaves, {} tree nodes", leaves.len(), tree.nodes().len());

        let bounds = tree.bounds();
        let value_range = tree.value_range();
        let nominal_step = tree.step();
        let native = NativeVolume::Vdb(VdbNative::new(origin, spacing, leaves, tree));
        self.state = Some(VolumeState::new(bounds, value_range, nominal_step, native));
        Ok(())
    }
}

impl Volume for VdbVolume {
    fn type_name(&self) -> &'static str {
        "vdb"
    }

    fn state(&self) -> Option<&VolumeState> {
        self.state.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::context::Context;
    use crate::core::error::VklError;
    use crate::core::value_selector::ValueSelector;
    use crate::math::constants::Float;
    use crate::math::range::Range1f;

    fn leaf(value: f32) -> Data {
        vec![value; VDB_LEAF_VOXELS].into()
    }

    #[test]
    fn sparse_leaves_sample_and_fall_back_to_zero() {
        let volume = VdbVolume::committed(VdbParams {
            leaf_origins: vec![[0, 0, 0], [64, 0, 0]],
            leaf_data: vec![leaf(2.0), leaf(4.0)],
            ..Default::default()
        })
        .unwrap();
        let ctx = Context::default();
        let sampler = ctx.new_sampler(&volume).unwrap();
        assert!((sampler.compute_sample(&Vector3f::new(3.5, 3.5, 3.5)) - 2.0).abs() < 1e-6);
        assert!((sampler.compute_sample(&Vector3f::new(67.0, 2.0, 2.0)) - 4.0).abs() < 1e-6);
        assert_eq!(sampler.compute_sample(&Vector3f::new(30.0, 2.0, 2.0)), 0.0);
        let g = sampler.compute_gradient(&Vector3f::new(3.5, 3.5, 3.5)).unwrap();
        assert!(g.norm() < 1e-6);

        let r = volume.value_range().unwrap();
        assert!(r.contains(0.0) && r.contains(2.0) && r.contains(4.0));
    }

    #[test]
    fn intervals_only_cover_selected_leaves() {
        let volume = VdbVolume::committed(VdbParams {
            leaf_origins: vec![[0, 0, 0], [64, 0, 0]],
            leaf_data: vec![leaf(2.0), leaf(4.0)],
            ..Default::default()
        })
        .unwrap();
        let ctx = Context::default();
        let mut selector = ValueSelector::with_ranges(&[Range1f::new(3.5, 5.0)]);
        selector.commit();
        let intervals: Vec<_> = ctx
            .init_interval_iterator(
                &volume,
                Vector3f::new(-10.0, 4.0, 4.0),
                Vector3f::new(1.0, 0.0, 0.0),
                Range1f::new(0.0, Float::MAX),
                Some(&selector),
            )
            .unwrap()
            .collect();
        assert!(!intervals.is_empty());
        for interval in &intervals {
            assert!(interval.t_range.lower >= 10.0 + 60.0 - 1e-3);
            assert!(interval.value_range.contains(4.0));
        }
    }

    #[test]
    fn leaf_access_observer_counts_sampled_leaves() {
        let volume = VdbVolume::committed(VdbParams {
            leaf_origins: vec![[0, 0, 0], [64, 0, 0]],
            leaf_data: vec![leaf(2.0), leaf(4.0)],
            ..Default::default()
        })
        .unwrap();
        let ctx = Context::default();
        let observer = ctx.new_observer(&volume, "LeafNodeAccess").unwrap();
        assert_eq!(observer.element_type(), DataType::UInt);
        assert_eq!(observer.num_elements(), 2);
        assert_eq!(observer.read(), vec![0, 0]);

        let sampler = ctx.new_sampler(&volume).unwrap();
        let inside_second = Vector3f::new(67.0, 2.0, 2.0);
        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..25 {
                        sampler.compute_sample(&inside_second);
                    }
                });
            }
        });
        assert_eq!(observer.read(), vec![0, 100]);

        sampler.compute_sample(&Vector3f::new(3.5, 3.5, 3.5));
        assert_eq!(observer.read(), vec![1, 100]);

        assert!(matches!(ctx.new_observer(&volume, "Histogram"), Err(VklError::UnsupportedOperation(_))));
        assert!(ctx.new_observer(&VdbVolume::new(), "LeafNodeAccess").is_err());
    }

    #[test]
    fn rejects_bad_leaves() {
        let bad = |origins: Vec<[i32; 3]>, data: Vec<Data>| {
            VdbVolume::committed(VdbParams { leaf_origins: origins, leaf_data: data, ..Default::default() })
        };
        assert!(matches!(bad(vec![[4, 0, 0]], vec![leaf(1.0)]), Err(VklError::Configuration(_))));
        assert!(matches!(bad(vec![[0, 0, 0], [0, 0, 0]], vec![leaf(1.0), leaf(1.0)]), Err(VklError::Configuration(_))));
        assert!(matches!(bad(vec![[0, 0, 0]], vec![vec![1.0f64; VDB_LEAF_VOXELS].into()]), Err(VklError::Configuration(_))));
        assert!(matches!(bad(vec![[0, 0, 0]], vec![vec![1.0f32; 10].into()]), Err(VklError::Configuration(_))));
        assert!(matches!(bad(vec![[-8, 0, 0]], vec![leaf(1.0)]), Ok(_)));
    }
}
