// Copyright @yucwang 2026

use super::{trilinear, trilinear_gradient};
use crate::core::native::VdbNative;
use crate::math::constants::{Float, Vector3f};

fn corners(volume: &VdbNative, p: &Vector3f) -> Option<([[[Float; 2]; 2]; 2], Vector3f)> {
    if !volume.tree.bounds().contains(p) {
        return None;
    }
    let u = (p - volume.origin).component_div(&volume.spacing);
    let base = [u.x.floor() as i32, u.y.floor() as i32, u.z.floor() as i32];
    let t = Vector3f::new(u.x - base[0] as Float, u.y - base[1] as Float, u.z - base[2] as Float);

    let mut c = [[[0.0; 2]; 2]; 2];
    let mut touched = [usize::MAX; 8];
    let mut touched_len = 0;
    for dz in 0..2 {
        for dy in 0..2 {
            for dx in 0..2 {
                let ijk = [base[0] + dx as i32, base[1] + dy as i32, base[2] + dz as i32];
                if let Some((leaf, value)) = volume.leaves.leaf_voxel(ijk) {
                    c[dz][dy][dx] = value;
                    if !touched[..touched_len].contains(&leaf) {
                        touched[touched_len] = leaf;
                        touched_len += 1;
                    }
                }
            }
        }
    }
    for &leaf in &touched[..touched_len] {
        volume.record_access(leaf);
    }
    Some((c, t))
}

pub fn sample(volume: &VdbNative, p: &Vector3f) -> Float {
    match corners(volume, p) {
        Some((c, t)) => trilinear(&c, &t),
        None => 0.0,
    }
}

pub fn gradient(volume: &VdbNative, p: &Vector3f) -> Vector3f {
    match corners(volume, p) {
        Some((c, t)) => trilinear_gradient(&c, &t).component_div(&volume.spacing),
        None => Vector3f::zeros(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accel::vdb_tree::VdbTree;
    use crate::core::native::{SparseLeaves, VDB_LEAF_DIM, VDB_LEAF_VOXELS};
    use std::sync::atomic::Ordering;

    fn x_ramp_leaf(origin_x: i32) -> Vec<Float> {
        let mut values = vec![0.0; VDB_LEAF_VOXELS];
        for z in 0..VDB_LEAF_DIM {
            for y in 0..VDB_LEAF_DIM {
                for x in 0..VDB_LEAF_DIM {
                    values[(z * VDB_LEAF_DIM + y) * VDB_LEAF_DIM + x] = (origin_x + x as i32) as Float;
                }
            }
        }
        values
    }

    fn volume() -> VdbNative {
        let mut leaves = SparseLeaves::new();
        leaves.insert([0, 0, 0], &x_ramp_leaf(0));
        leaves.insert([8, 0, 0], &x_ramp_leaf(8));
        let origin = Vector3f::zeros();
        let spacing = Vector3f::new(0.5, 0.5, 0.5);
        let tree = VdbTree::build(&leaves, origin, spacing);
        VdbNative::new(origin, spacing, leaves, tree)
    }

    #[test]
    fn samples_across_leaf_boundary() {
        let v = volume();
        // Index 7.5 lies between the two leaves.
        assert!((sample(&v, &Vector3f::new(3.75, 1.0, 1.0)) - 7.5).abs() < 1e-5);
        let g = gradient(&v, &Vector3f::new(3.75, 1.0, 1.0));
        assert!((g - Vector3f::new(2.0, 0.0, 0.0)).norm() < 1e-4);
    }

    #[test]
    fn lookups_count_each_touched_leaf_once() {
        let v = volume();
        sample(&v, &Vector3f::new(1.0, 1.0, 1.0));
        gradient(&v, &Vector3f::new(3.75, 1.0, 1.0));
        let counts: Vec<u32> = v.access_counts().iter().map(|c| c.load(Ordering::Relaxed)).collect();
        assert_eq!(counts, vec![2, 1]);
    }

    #[test]
    fn background_outside_leaves() {
        let v = volume();
        assert_eq!(sample(&v, &Vector3f::new(1.0, 7.0, 1.0)), 0.0);
        assert_eq!(sample(&v, &Vector3f::new(-10.0, 1.0, 1.0)), 0.0);
    }
}
