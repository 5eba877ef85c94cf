// Copyright @yucwang 2026

use crate::accel::merge_child_ranges;
use crate::accel::traversal::RangeTree;
use crate::core::parallel::parallel_map;
use crate::math::aabb::AABB;
use crate::math::constants::{Float, Vector3f};
use crate::math::range::Range1f;

/// Plane tolerance as a fraction of the finest block cell width.
const PLANE_EPSILON: Float = 1e-5;

/// Object-space footprint of one refinement block.
#[derive(Clone, Copy, Debug)]
pub struct KdBlock {
    pub bounds: AABB,
    pub level: usize,
    /// Object-space cell width.
    pub cell_width: Float,
}

#[derive(Clone, Debug)]
pub enum KdNodeKind {
    Inner { axis: usize, split: Float, children: [usize; 2] },
    /// `blocks` covers the whole leaf, sorted coarse to fine.
    Leaf { blocks: Vec<usize>, step: Float },
}

#[derive(Clone, Debug)]
pub struct KdNode {
    pub bounds: AABB,
    pub value_range: Range1f,
    pub kind: KdNodeKind,
}

/// Spatial k-d tree over overlapping refinement blocks.
///
/// Nodes are split on block faces until no face cuts a node, so every leaf
/// is covered completely by each of its blocks (or by none).
pub struct KdTree {
    nodes: Vec<KdNode>,
    blocks: Vec<KdBlock>,
    leaves: Vec<usize>,
    epsilon: Float,
}

fn overlaps_strictly(a: &AABB, b: &AABB, epsilon: Float) -> bool {
    (0..3).all(|axis| a.p_max[axis].min(b.p_max[axis]) - a.p_min[axis].max(b.p_min[axis]) > epsilon)
}

impl KdTree {
    pub fn build(blocks: Vec<KdBlock>) -> Self {
        let finest = blocks.iter().map(|b| b.cell_width).fold(std::f32::INFINITY, Float::min);
        let mut tree = Self { nodes: Vec::new(), blocks, leaves: Vec::new(), epsilon: PLANE_EPSILON * finest };
        if tree.blocks.is_empty() {
            return tree;
        }

        let mut bounds = AABB::default();
        for block in &tree.blocks {
            bounds.expand_by_aabb(&block.bounds);
        }
        let all: Vec<usize> = (0..tree.blocks.len()).collect();
        tree.build_node(bounds, all);

        log::debug!(
            "kd tree: {} blocks, {} nodes, {} leaves",
            tree.blocks.len(),
            tree.nodes.len(),
            tree.leaves.len()
        );
        tree
    }

    fn choose_split(&self, bounds: &AABB, blocks: &[usize]) -> Option<(usize, Float)> {
        let extent = bounds.diagonal();
        let mut axes = [0usize, 1, 2];
        axes.sort_by(|a, b| extent[*b].total_cmp(&extent[*a]));

        for &axis in &axes {
            let lo = bounds.p_min[axis];
            let hi = bounds.p_max[axis];
            let mid = 0.5 * (lo + hi);
            let mut best: Option<Float> = None;
            for &b in blocks {
                let block = &self.blocks[b].bounds;
                for &plane in &[block.p_min[axis], block.p_max[axis]] {
                    if plane <= lo + self.epsilon || plane >= hi - self.epsilon {
                        continue;
                    }
                    let better = match best {
                        Some(current) => (plane - mid).abs() < (current - mid).abs(),
                        None => true,
                    };
                    if better {
                        best = Some(plane);
                    }
                }
            }
            if let Some(split) = best {
                return Some((axis, split));
            }
        }
        None
    }

    fn build_node(&mut self, bounds: AABB, blocks: Vec<usize>) -> usize {
        let node_idx = self.nodes.len();
        match self.choose_split(&bounds, &blocks) {
            None => {
                let mut blocks = blocks;
                let table = &self.blocks;
                blocks.sort_by(|a, b| {
                    table[*a]
                        .level
                        .cmp(&table[*b].level)
                        .then_with(|| table[*b].cell_width.total_cmp(&table[*a].cell_width))
                        .then_with(|| a.cmp(b))
                });
                let step = blocks.last().map(|&b| table[b].cell_width).unwrap_or_else(|| {
                    table.iter().map(|b| b.cell_width).fold(std::f32::INFINITY, Float::min)
                });
                self.nodes.push(KdNode {
                    bounds,
                    value_range: Range1f::empty(),
                    kind: KdNodeKind::Leaf { blocks, step },
                });
                self.leaves.push(node_idx);
            }
            Some((axis, split)) => {
                let mut left_bounds = bounds;
                let mut right_bounds = bounds;
                left_bounds.p_max[axis] = split;
                right_bounds.p_min[axis] = split;

                let epsilon = self.epsilon;
                let left_blocks: Vec<usize> = blocks
                    .iter()
                    .copied()
                    .filter(|&b| overlaps_strictly(&self.blocks[b].bounds, &left_bounds, epsilon))
                    .collect();
                let right_blocks: Vec<usize> = blocks
                    .into_iter()
                    .filter(|&b| overlaps_strictly(&self.blocks[b].bounds, &right_bounds, epsilon))
                    .collect();

                self.nodes.push(KdNode {
                    bounds,
                    value_range: Range1f::empty(),
                    kind: KdNodeKind::Inner { axis, split, children: [0, 0] },
                });
                let left = self.build_node(left_bounds, left_blocks);
                let right = self.build_node(right_bounds, right_blocks);
                if let KdNodeKind::Inner { children, .. } = &mut self.nodes[node_idx].kind {
                    *children = [left, right];
                }
            }
        }
        node_idx
    }

    pub fn nodes(&self) -> &[KdNode] {
        &self.nodes
    }

    pub fn blocks(&self) -> &[KdBlock] {
        &self.blocks
    }

    pub fn leaves(&self) -> &[usize] {
        &self.leaves
    }

    pub fn bounds(&self) -> AABB {
        self.nodes.first().map(|n| n.bounds).unwrap_or_default()
    }

    pub fn leaf_blocks(&self, node: usize) -> &[usize] {
        match &self.nodes[node].kind {
            KdNodeKind::Leaf { blocks, .. } => blocks.as_slice(),
            KdNodeKind::Inner { .. } => &[],
        }
    }

    /// Computes every leaf range in parallel with `leaf_range(bounds, blocks)`,
    /// then propagates upward. Leaves without blocks hold exactly 0.
    pub fn assign_ranges<F>(&mut self, leaf_range: F)
    where
        F: Fn(&AABB, &[usize]) -> Range1f + Sync,
    {
        let ranges = {
            let nodes = &self.nodes;
            let leaves = &self.leaves;
            parallel_map(leaves.len(), |i| {
                let node = &nodes[leaves[i]];
                match &node.kind {
                    KdNodeKind::Leaf { blocks, .. } if !blocks.is_empty() => {
                        let r = leaf_range(&node.bounds, blocks);
                        if r.is_empty() {
                            Range1f::point(0.0)
                        } else {
                            r
                        }
                    }
                    _ => Range1f::point(0.0),
                }
            })
        };
        for (i, range) in ranges.into_iter().enumerate() {
            let leaf = self.leaves[i];
            self.nodes[leaf].value_range = range;
        }

        // Children always follow their parent in the node array.
        for idx in (0..self.nodes.len()).rev() {
            if let KdNodeKind::Inner { children, .. } = self.nodes[idx].kind {
                let range = merge_child_ranges(children.iter().map(|&c| self.nodes[c].value_range), true);
                self.nodes[idx].value_range = range;
            }
        }
    }

    /// Leaf containing `p`; points on a split plane go to the upper side.
    pub fn locate(&self, p: &Vector3f) -> Option<usize> {
        if self.nodes.is_empty() || !self.nodes[0].bounds.contains(p) {
            return None;
        }
        let mut node = 0usize;
        loop {
            match &self.nodes[node].kind {
                KdNodeKind::Leaf { .. } => return Some(node),
                KdNodeKind::Inner { axis, split, children } => {
                    node = if p[*axis] < *split { children[0] } else { children[1] };
                }
            }
        }
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
            match &node.kind {
                KdNodeKind::Leaf { .. } => out.extend_range(&node.value_range),
                KdNodeKind::Inner { children, .. } => {
                    if region.contains_aabb(&node.bounds) {
                        out.extend_range(&node.value_range);
                    } else {
                        stack.extend_from_slice(children);
                    }
                }
            }
        }
        out
    }
}

impl RangeTree for KdTree {
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
        match &self.nodes[node].kind {
            KdNodeKind::Inner { children, .. } => children.as_slice(),
            KdNodeKind::Leaf { .. } => &[],
        }
    }

    fn leaf_step(&self, node: usize) -> Float {
        match &self.nodes[node].kind {
            KdNodeKind::Leaf { step, .. } => *step,
            KdNodeKind::Inner { .. } => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(lo: [Float; 3], hi: [Float; 3], level: usize, cell_width: Float) -> KdBlock {
        KdBlock {
            bounds: AABB::new(Vector3f::new(lo[0], lo[1], lo[2]), Vector3f::new(hi[0], hi[1], hi[2])),
            level,
            cell_width,
        }
    }

    // A coarse 8^3 block with a refined 2^3 corner region.
    fn nested() -> KdTree {
        KdTree::build(vec![
            block([0.0; 3], [8.0; 3], 0, 1.0),
            block([0.0; 3], [2.0; 3], 1, 0.5),
        ])
    }

    #[test]
    fn leaves_are_fully_covered() {
        let tree = nested();
        assert!(!tree.leaves().is_empty());
        for &leaf in tree.leaves() {
            let bounds = tree.nodes()[leaf].bounds;
            for &b in tree.leaf_blocks(leaf) {
                assert!(tree.blocks()[b].bounds.contains_aabb(&bounds));
            }
        }
        let fine = tree.locate(&Vector3f::new(1.0, 1.0, 1.0)).unwrap();
        assert_eq!(tree.leaf_blocks(fine), &[0, 1]);
        assert!((tree.leaf_step(fine) - 0.5).abs() < 1e-6);
        let coarse = tree.locate(&Vector3f::new(5.0, 1.0, 1.0)).unwrap();
        assert_eq!(tree.leaf_blocks(coarse), &[0]);
    }

    #[test]
    fn empty_leaves_hold_zero_and_parents_union() {
        // Two disjoint blocks leave a gap in the middle.
        let mut tree = KdTree::build(vec![
            block([0.0; 3], [2.0, 2.0, 2.0], 0, 1.0),
            block([4.0, 0.0, 0.0], [6.0, 2.0, 2.0], 0, 1.0),
        ]);
        tree.assign_ranges(|_, blocks| Range1f::point(3.0 + blocks[0] as Float));
        let gap = tree.locate(&Vector3f::new(3.0, 1.0, 1.0)).unwrap();
        assert_eq!(tree.nodes()[gap].value_range, Range1f::point(0.0));
        assert_eq!(tree.nodes()[0].value_range, Range1f::new(0.0, 4.0));
        for node in tree.nodes() {
            if let KdNodeKind::Inner { children, .. } = node.kind {
                let expect = merge_child_ranges(children.iter().map(|&c| tree.nodes()[c].value_range), true);
                assert_eq!(node.value_range, expect);
            }
        }
        let q = tree.query(&AABB::new(Vector3f::new(4.5, 0.5, 0.5), Vector3f::new(5.0, 1.0, 1.0)));
        assert_eq!(q, Range1f::point(4.0));
    }

    #[test]
    fn tiny_blocks_still_split() {
        let s = 1e-6;
        let tree = KdTree::build(vec![
            block([0.0; 3], [8.0 * s; 3], 0, s),
            block([0.0; 3], [2.0 * s; 3], 1, 0.5 * s),
        ]);
        assert!(tree.leaves().len() > 1);
        let coarse = tree.locate(&Vector3f::new(5.0 * s, s, s)).unwrap();
        assert_eq!(tree.leaf_blocks(coarse), &[0]);
        let fine = tree.locate(&Vector3f::new(s, s, s)).unwrap();
        assert_eq!(tree.leaf_blocks(fine), &[0, 1]);
    }

    #[test]
    fn points_outside_are_not_located() {
        let tree = nested();
        assert!(tree.locate(&Vector3f::new(-1.0, 1.0, 1.0)).is_none());
    }
}
