// Copyright @yucwang 2026

//! Representation handed to the kernel backend at commit.
//!
//! A [`NativeHandle`] is created by a successful commit and owned by its
//! volume; callers only ever see its id.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use crate::accel::brick_grid::BrickGrid;
use crate::accel::bvh::Bvh;
use crate::accel::kdtree::KdTree;
use crate::accel::traversal::{SpanTraversal, TreeTraversal};
use crate::accel::vdb_tree::VdbTree;
use crate::core::data::Data;
use crate::core::value_selector::ValueFilter;
use crate::math::aabb::AABB;
use crate::math::constants::{Float, Vector3f, Vector3i};
use crate::math::ray::Ray3f;

/// Voxels per sparse leaf edge.
pub const VDB_LEAF_DIM: usize = 8;
pub const VDB_LEAF_VOXELS: usize = VDB_LEAF_DIM * VDB_LEAF_DIM * VDB_LEAF_DIM;
/// Minimum alignment of sparse leaf blocks.
pub const VDB_LEAF_ALIGNMENT: usize = 16;

/// One sparse leaf, x fastest.
#[repr(C, align(16))]
#[derive(Clone)]
pub struct LeafBlock(pub [Float; VDB_LEAF_VOXELS]);

impl LeafBlock {
    pub fn from_slice(values: &[Float]) -> Self {
        let mut block = LeafBlock([0.0; VDB_LEAF_VOXELS]);
        block.0.copy_from_slice(&values[..VDB_LEAF_VOXELS]);
        block
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize, z: usize) -> Float {
        self.0[(z * VDB_LEAF_DIM + y) * VDB_LEAF_DIM + x]
    }
}

/// Leaf blocks keyed by their index-space origin. Missing voxels read as 0.
#[derive(Clone, Default)]
pub struct SparseLeaves {
    origins: Vec<[i32; 3]>,
    blocks: Vec<LeafBlock>,
    lookup: HashMap<[i32; 3], usize>,
}

impl SparseLeaves {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when a leaf already exists at `origin`.
    pub fn insert(&mut self, origin: [i32; 3], values: &[Float]) -> bool {
        if self.lookup.contains_key(&origin) {
            return false;
        }
        self.lookup.insert(origin, self.blocks.len());
        self.origins.push(origin);
        self.blocks.push(LeafBlock::from_slice(values));
        true
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn origin(&self, leaf: usize) -> [i32; 3] {
        self.origins[leaf]
    }

    pub fn origins(&self) -> &[[i32; 3]] {
        &self.origins
    }

    pub fn block(&self, leaf: usize) -> &LeafBlock {
        &self.blocks[leaf]
    }

    /// Leaf holding voxel `ijk` and the voxel's value.
    #[inline]
    pub fn leaf_voxel(&self, ijk: [i32; 3]) -> Option<(usize, Float)> {
        let dim = VDB_LEAF_DIM as i32;
        let origin = [
            ijk[0].div_euclid(dim) * dim,
            ijk[1].div_euclid(dim) * dim,
            ijk[2].div_euclid(dim) * dim,
        ];
        let leaf = *self.lookup.get(&origin)?;
        let value = self.blocks[leaf].get(
            (ijk[0] - origin[0]) as usize,
            (ijk[1] - origin[1]) as usize,
            (ijk[2] - origin[2]) as usize,
        );
        Some((leaf, value))
    }

    /// Background voxels read as 0.
    #[inline]
    pub fn voxel(&self, ijk: [i32; 3]) -> Float {
        self.leaf_voxel(ijk).map_or(0.0, |(_, value)| value)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AmrMethod {
    /// Trilinear inside the finest block covering the point.
    Current,
    /// Trilinear on the finest lattice, each corner read from the finest
    /// block covering it.
    Finest,
    /// Like `Finest`, but finer corner data is averaged down to the
    /// current cell width.
    Octant,
}

/// A refinement block in index space; data is cell-centred, x fastest.
#[derive(Clone, Debug)]
pub struct AmrBlock {
    pub lower: Vector3i,
    pub upper: Vector3i,
    pub level: usize,
    pub cell_width: Float,
    pub offset: usize,
}

impl AmrBlock {
    /// Cells per axis; zero on an inverted axis.
    pub fn dims(&self) -> [usize; 3] {
        let mut dims = [0usize; 3];
        for axis in 0..3 {
            let extent = self.upper[axis] as i64 - self.lower[axis] as i64 + 1;
            dims[axis] = extent.max(0) as usize;
        }
        dims
    }

    /// `None` when the cell count does not fit in `usize`.
    pub fn cell_count(&self) -> Option<usize> {
        self.dims().iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
    }

    /// Bounds in AMR space, before the grid transform.
    pub fn amr_bounds(&self) -> AABB {
        let cw = self.cell_width;
        AABB::new(
            self.lower.cast::<Float>() * cw,
            (self.upper.cast::<Float>() + Vector3f::repeat(1.0)) * cw,
        )
    }
}

pub struct StructuredNative {
    pub dims: [usize; 3],
    pub origin: Vector3f,
    pub spacing: Vector3f,
    pub voxels: Data,
    pub bricks: BrickGrid,
}

pub struct AmrNative {
    pub blocks: Vec<AmrBlock>,
    pub voxels: Vec<Float>,
    pub method: AmrMethod,
    pub grid_origin: Vector3f,
    pub grid_spacing: Vector3f,
    pub tree: KdTree,
}

impl AmrNative {
    pub fn to_amr_space(&self, p: &Vector3f) -> Vector3f {
        (p - self.grid_origin).component_div(&self.grid_spacing)
    }
}

pub struct ParticleNative {
    pub positions: Vec<Vector3f>,
    pub radii: Vec<Float>,
    pub weights: Vec<Float>,
    pub radius_support_factor: Float,
    pub clamp_max_cumulative_value: Float,
    pub bvh: Bvh,
}

pub struct VdbNative {
    pub origin: Vector3f,
    pub spacing: Vector3f,
    pub leaves: SparseLeaves,
    pub tree: VdbTree,
    /// Kernel evaluations that read each leaf, indexed like `leaves`.
    access_counts: Vec<AtomicU32>,
}

impl VdbNative {
    pub fn new(origin: Vector3f, spacing: Vector3f, leaves: SparseLeaves, tree: VdbTree) -> Self {
        let access_counts = (0..leaves.len()).map(|_| AtomicU32::new(0)).collect();
        Self { origin, spacing, leaves, tree, access_counts }
    }

    #[inline]
    pub fn record_access(&self, leaf: usize) {
        self.access_counts[leaf].fetch_add(1, Ordering::Relaxed);
    }

    pub fn access_counts(&self) -> &[AtomicU32] {
        &self.access_counts
    }
}

pub enum NativeVolume {
    Structured(StructuredNative),
    Amr(AmrNative),
    Particle(ParticleNative),
    Vdb(VdbNative),
}

impl NativeVolume {
    pub fn kind_name(&self) -> &'static str {
        match self {
            NativeVolume::Structured(_) => "structuredRegular",
            NativeVolume::Amr(_) => "amr",
            NativeVolume::Particle(_) => "particle",
            NativeVolume::Vdb(_) => "vdb",
        }
    }

    /// Accelerator units crossed by `ray`, pruned by `filter`.
    pub fn spans<'a>(&'a self, ray: Ray3f, filter: ValueFilter<'a>) -> Box<dyn SpanTraversal + 'a> {
        match self {
            NativeVolume::Structured(s) => Box::new(s.bricks.traverse(ray, filter)),
            NativeVolume::Amr(a) => Box::new(TreeTraversal::new(&a.tree, ray, filter)),
            NativeVolume::Particle(p) => Box::new(TreeTraversal::new(&p.bvh, ray, filter)),
            NativeVolume::Vdb(v) => Box::new(TreeTraversal::new(&v.tree, ray, filter)),
        }
    }

    pub fn unit_count(&self) -> usize {
        match self {
            NativeVolume::Structured(s) => s.bricks.brick_count(),
            NativeVolume::Amr(a) => a.tree.leaves().len(),
            NativeVolume::Particle(p) => p.bvh.prim_count(),
            NativeVolume::Vdb(v) => v.leaves.len(),
        }
    }
}

static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque, address-stable link between a committed volume and the kernels.
pub struct NativeHandle {
    id: u64,
    native: Box<NativeVolume>,
}

impl NativeHandle {
    pub(crate) fn new(native: NativeVolume) -> Self {
        Self { id: NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed), native: Box::new(native) }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn native(&self) -> &NativeVolume {
        &self.native
    }
}

impl std::fmt::Debug for NativeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NativeHandle({}, {})", self.id, self.native.kind_name())
    }
}
