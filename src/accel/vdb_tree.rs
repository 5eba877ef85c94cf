// Copyright @yucwang 2026

use std::collections::BTreeMap;

use crate::accel::merge_child_ranges;
use crate::accel::traversal::RangeTree;
use crate::core::native::{SparseLeaves, VDB_LEAF_DIM};
use crate::core::parallel::parallel_map;
use crate::math::aabb::AABB;
use crate::math::constants::{Float, Vector3f};
use crate::math::range::Range1f;

/// Leaf slots per upper-node edge.
pub const VDB_UPPER_DIM: usize = 4;

#[derive(Clone, Debug, PartialEq)]
pub enum VdbLevel {
    Root,
    Upper,
    Leaf(usize),
}

#[derive(Clone, Debug)]
pub struct VdbNode {
    pub level: VdbLevel,
    pub bounds: AABB,
    pub value_range: Range1f,
    pub children: Vec<usize>,
}

/// Root -> upper (4^3 leaf slots) -> leaf (8^3 voxels).
///
/// Leaf bounds start one voxel below the leaf origin: that band
/// interpolates against the lower neighbour (or background) and is
/// accounted to this leaf.
pub struct VdbTree {
    nodes: Vec<VdbNode>,
    step: Float,
}

fn index_box(origin: &Vector3f, spacing: &Vector3f, lo: [i32; 3], hi: [i32; 3]) -> AABB {
    let mut p0 = Vector3f::zeros();
    let mut p1 = Vector3f::zeros();
    for axis in 0..3 {
        p0[axis] = origin[axis] + spacing[axis] * lo[axis] as Float;
        p1[axis] = origin[axis] + spacing[axis] * hi[axis] as Float;
    }
    AABB::new(p0, p1)
}

/// Range over index-space voxels `lo..=hi` per axis.
fn voxel_range(leaves: &SparseLeaves, lo: [i32; 3], hi: [i32; 3]) -> Range1f {
    let mut range = Range1f::empty();
    for z in lo[2]..=hi[2] {
        for y in lo[1]..=hi[1] {
            for x in lo[0]..=hi[0] {
                range.extend(leaves.voxel([x, y, z]));
            }
        }
    }
    range
}

impl VdbTree {
    pub fn build(leaves: &SparseLeaves, origin: Vector3f, spacing: Vector3f) -> Self {
        let dim = VDB_LEAF_DIM as i32;
        let upper_dim = dim * VDB_UPPER_DIM as i32;
        let step = spacing.x.min(spacing.y).min(spacing.z);
        let mut tree = Self { nodes: Vec::new(), step };
        if leaves.is_empty() {
            return tree;
        }

        let leaf_ranges = parallel_map(leaves.len(), |leaf| {
            let o = leaves.origin(leaf);
            voxel_range(
                leaves,
                [o[0] - 1, o[1] - 1, o[2] - 1],
                [o[0] + dim, o[1] + dim, o[2] + dim],
            )
        });

        // Deterministic grouping of leaves under their upper node.
        let mut groups: BTreeMap<[i32; 3], Vec<usize>> = BTreeMap::new();
        for (leaf, o) in leaves.origins().iter().enumerate() {
            let key = [
                o[0].div_euclid(upper_dim) * upper_dim,
                o[1].div_euclid(upper_dim) * upper_dim,
                o[2].div_euclid(upper_dim) * upper_dim,
            ];
            groups.entry(key).or_default().push(leaf);
        }

        tree.nodes.push(VdbNode {
            level: VdbLevel::Root,
            bounds: AABB::default(),
            value_range: Range1f::empty(),
            children: Vec::new(),
        });

        let mut root_bounds = AABB::default();
        let mut root_children = Vec::with_capacity(groups.len());
        let mut upper_lo = [i32::MAX; 3];
        let mut upper_hi = [i32::MIN; 3];
        for (key, members) in &groups {
            let upper_idx = tree.nodes.len();
            tree.nodes.push(VdbNode {
                level: VdbLevel::Upper,
                bounds: index_box(
                    &origin,
                    &spacing,
                    [key[0] - 1, key[1] - 1, key[2] - 1],
                    [key[0] + upper_dim, key[1] + upper_dim, key[2] + upper_dim],
                ),
                value_range: Range1f::empty(),
                children: Vec::with_capacity(members.len()),
            });

            let mut child_ranges = Vec::with_capacity(members.len());
            for &leaf in members {
                let o = leaves.origin(leaf);
                let leaf_idx = tree.nodes.len();
                tree.nodes.push(VdbNode {
                    level: VdbLevel::Leaf(leaf),
                    bounds: index_box(
                        &origin,
                        &spacing,
                        [o[0] - 1, o[1] - 1, o[2] - 1],
                        [o[0] + dim, o[1] + dim, o[2] + dim],
                    ),
                    value_range: leaf_ranges[leaf],
                    children: Vec::new(),
                });
                tree.nodes[upper_idx].children.push(leaf_idx);
                child_ranges.push(leaf_ranges[leaf]);
            }

            let full = members.len() == VDB_UPPER_DIM * VDB_UPPER_DIM * VDB_UPPER_DIM;
            tree.nodes[upper_idx].value_range = merge_child_ranges(child_ranges, full);
            root_bounds.expand_by_aabb(&tree.nodes[upper_idx].bounds);
            root_children.push(upper_idx);
            for axis in 0..3 {
                upper_lo[axis] = upper_lo[axis].min(key[axis]);
                upper_hi[axis] = upper_hi[axis].max(key[axis]);
            }
        }

        let mut slots = 1u128;
        for axis in 0..3 {
            slots *= ((upper_hi[axis] as i64 - upper_lo[axis] as i64) / upper_dim as i64 + 1) as u128;
        }
        let root_range = merge_child_ranges(
            root_children.iter().map(|&c| tree.nodes[c].value_range),
            slots == root_children.len() as u128,
        );
        tree.nodes[0].bounds = root_bounds;
        tree.nodes[0].value_range = root_range;
        tree.nodes[0].children = root_children;

        log::debug!(
            "vdb tree: {} leaves under {} upper nodes, range [{}, {}]",
            leaves.len(),
            groups.len(),
            root_range.lower,
            root_range.upper
        );
        tree
    }

    pub fn nodes(&self) -> &[VdbNode] {
        &self.nodes
    }

    pub fn bounds(&self) -> AABB {
        self.nodes.first().map(|n| n.bounds).unwrap_or_default()
    }

    pub fn value_range(&self) -> Range1f {
        self.nodes.first().map(|n| n.value_range).unwrap_or_default()
    }

    pub fn step(&self) -> Float {
        self.step
    }

    pub fn query(&self, region: &AABB) -> Range1f {
        let mut out = Range1f::empty();
        if self.nodes.is_empty() {
            return out;
        }
        if !self.nodes[0].bounds.contains_aabb(region) {
            out.extend(0.0);
        }
        let mut stack = vec![0usize];
        while let Some(idx) = stack.pop() {
            let node = &self.nodes[idx];
            if !node.bounds.overlaps(region) {
                continue;
            }
            if node.children.is_empty() || region.contains_aabb(&node.bounds) {
                out.extend_range(&node.value_range);
            } else {
                // Space between children samples as background.
                if node.level == VdbLevel::Upper || node.level == VdbLevel::Root {
                    out.extend(0.0);
                }
                stack.extend_from_slice(&node.children);
            }
        }
        out
    }
}

impl RangeTree for VdbTree {
    fn root(&self) -> Option<usize> {
        if self.nodes.is_empty() {
            None
        } else {
            Some(0)
        }
    }

    fn node_bounds(&self, node: usize) -> AABB {
        self.nodes[node].bounds
    }

    fn node_value_range(&self, node: usize) -> Range1f {
        self.nodes[node].value_range
    }

    fn node_children(&self, node: usize) -> &[usize] {
        &self.nodes[node].children
    }

    fn leaf_step(&self, _node: usize) -> Float {
        self.step
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accel::traversal::{SpanTraversal, TreeTraversal};
    use crate::core::native::VDB_LEAF_VOXELS;
    use crate::core::value_selector::{ValueFilter, ValueSelector};
    use crate::math::ray::Ray3f;

    fn two_leaves() -> SparseLeaves {
        let mut leaves = SparseLeaves::new();
        leaves.insert([0, 0, 0], &[2.0; VDB_LEAF_VOXELS]);
        leaves.insert([8, 0, 0], &[6.0; VDB_LEAF_VOXELS]);
        leaves
    }

    #[test]
    fn leaf_ranges_see_neighbours_and_background() {
        let tree = VdbTree::build(&two_leaves(), Vector3f::zeros(), Vector3f::new(1.0, 1.0, 1.0));
        let leaves: Vec<&VdbNode> = tree.nodes().iter().filter(|n| matches!(n.level, VdbLevel::Leaf(_))).collect();
        assert_eq!(leaves.len(), 2);
        // Both leaves border empty space, and share a face.
        assert_eq!(leaves[0].value_range, Range1f::new(0.0, 6.0));
        assert_eq!(leaves[1].value_range, Range1f::new(0.0, 6.0));
        assert_eq!(tree.value_range(), Range1f::new(0.0, 6.0));
        assert!(tree.bounds().contains(&Vector3f::new(-1.0, -1.0, -1.0)));
    }

    #[test]
    fn upper_nodes_contain_their_leaves() {
        let tree = VdbTree::build(&two_leaves(), Vector3f::new(1.0, 0.0, 0.0), Vector3f::new(0.5, 0.5, 0.5));
        for node in tree.nodes() {
            for &c in &node.children {
                assert!(node.bounds.contains_aabb(&tree.nodes()[c].bounds));
                assert!(node.value_range.lower <= tree.nodes()[c].value_range.lower);
                assert!(node.value_range.upper >= tree.nodes()[c].value_range.upper);
            }
        }
    }

    #[test]
    fn region_queries_only_see_overlapping_leaves() {
        let mut leaves = SparseLeaves::new();
        leaves.insert([0, 0, 0], &[2.0; VDB_LEAF_VOXELS]);
        leaves.insert([64, 0, 0], &[4.0; VDB_LEAF_VOXELS]);
        let tree = VdbTree::build(&leaves, Vector3f::zeros(), Vector3f::new(1.0, 1.0, 1.0));

        let near = AABB::new(Vector3f::new(2.0, 2.0, 2.0), Vector3f::new(3.0, 3.0, 3.0));
        assert_eq!(tree.query(&near), Range1f::new(0.0, 2.0));
        let far = AABB::new(Vector3f::new(66.0, 2.0, 2.0), Vector3f::new(67.0, 3.0, 3.0));
        assert_eq!(tree.query(&far), Range1f::new(0.0, 4.0));
        let everything = AABB::new(Vector3f::repeat(-100.0), Vector3f::repeat(200.0));
        assert_eq!(tree.query(&everything), tree.value_range());
        let outside = AABB::new(Vector3f::repeat(500.0), Vector3f::repeat(501.0));
        assert_eq!(tree.query(&outside), Range1f::point(0.0));
    }

    #[test]
    fn traversal_clips_overlapping_leaves() {
        let tree = VdbTree::build(&two_leaves(), Vector3f::zeros(), Vector3f::new(1.0, 1.0, 1.0));
        let ray = Ray3f::new(Vector3f::new(-4.0, 3.5, 3.5), Vector3f::new(1.0, 0.0, 0.0), None, None);
        let selector = ValueSelector::with_ranges(&[Range1f::new(-1.0, 10.0)]);
        let mut traversal = TreeTraversal::new(&tree, ray, ValueFilter::Ranges(&selector));
        let a = traversal.next_span().unwrap();
        let b = traversal.next_span().unwrap();
        assert!(traversal.next_span().is_none());
        assert_eq!(a.t, Range1f::new(3.0, 12.0));
        assert_eq!(b.t, Range1f::new(12.0, 20.0));
    }
}
