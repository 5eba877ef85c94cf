// Copyright @yucwang 2026

use crate::accel::merge_child_ranges;
use crate::accel::traversal::RangeTree;
use crate::math::aabb::AABB;
use crate::math::constants::Float;
use crate::math::range::Range1f;

const SAH_BUCKETS: usize = 12;

#[derive(Clone, Debug, PartialEq)]
pub enum BvhNodeKind {
    Inner { children: [usize; 2] },
    Leaf { prim_id: usize },
}

#[derive(Clone, Debug)]
pub struct BvhNode {
    pub bounds: AABB,
    pub value_range: Range1f,
    /// Sampling length scale; for a leaf this is the primitive's own length.
    pub nominal_length: Float,
    pub kind: BvhNodeKind,
}

impl BvhNode {
    fn leaf(bounds: AABB, prim_id: usize, nominal_length: Float) -> Self {
        Self { bounds, value_range: Range1f::empty(), nominal_length, kind: BvhNodeKind::Leaf { prim_id } }
    }

    fn inner(bounds: AABB, children: [usize; 2], nominal_length: Float) -> Self {
        Self { bounds, value_range: Range1f::empty(), nominal_length, kind: BvhNodeKind::Inner { children } }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, BvhNodeKind::Leaf { .. })
    }
}

/// Binary SAH hierarchy with exactly one primitive per leaf.
///
/// Nodes are stored in pre-order, so every child index is larger than its
/// parent's; bottom-up passes walk the node array backwards.
pub struct Bvh {
    nodes: Vec<BvhNode>,
    indices: Vec<usize>,
    prim_bounds: Vec<AABB>,
    prim_lengths: Vec<Float>,
}

impl Bvh {
    pub fn build(prim_bounds: Vec<AABB>, prim_lengths: Vec<Float>) -> Self {
        debug_assert_eq!(prim_bounds.len(), prim_lengths.len());
        let mut bvh = Self {
            nodes: Vec::with_capacity(prim_bounds.len().saturating_mul(2)),
            indices: (0..prim_bounds.len()).collect(),
            prim_bounds,
            prim_lengths,
        };

        if !bvh.indices.is_empty() {
            let count = bvh.indices.len();
            bvh.build_range(0, count);
        }

        log::debug!("bvh: {} primitives, {} nodes", bvh.prim_bounds.len(), bvh.nodes.len());
        bvh
    }

    pub fn nodes(&self) -> &[BvhNode] {
        &self.nodes
    }

    pub fn node(&self, idx: usize) -> &BvhNode {
        &self.nodes[idx]
    }

    pub fn prim_count(&self) -> usize {
        self.prim_bounds.len()
    }

    pub fn bounds(&self) -> AABB {
        self.nodes.first().map(|n| n.bounds).unwrap_or_default()
    }

    /// Assigns leaf ranges from `leaf_range(prim_id)` and propagates them
    /// upward. Primitives do not tile their parents, so every inner node
    /// also contains 0.
    pub fn assign_ranges<F>(&mut self, leaf_range: F)
    where
        F: Fn(usize) -> Range1f,
    {
        for idx in (0..self.nodes.len()).rev() {
            let range = match self.nodes[idx].kind {
                BvhNodeKind::Leaf { prim_id } => leaf_range(prim_id),
                BvhNodeKind::Inner { children } => merge_child_ranges(
                    children.iter().map(|&c| self.nodes[c].value_range),
                    false,
                ),
            };
            self.nodes[idx].value_range = range;
        }
    }

    /// Sets the same range on every node.
    pub fn assign_uniform_range(&mut self, range: Range1f) {
        for node in self.nodes.iter_mut() {
            node.value_range = range;
        }
    }

    /// Primitives whose bounds overlap `region`.
    pub fn overlapping(&self, region: &AABB, out: &mut Vec<usize>) {
        if self.nodes.is_empty() {
            return;
        }
        let mut stack = vec![0usize];
        while let Some(node_idx) = stack.pop() {
            let node = &self.nodes[node_idx];
            if !node.bounds.overlaps(region) {
                continue;
            }
            match node.kind {
                BvhNodeKind::Leaf { prim_id } => out.push(prim_id),
                BvhNodeKind::Inner { children } => {
                    stack.push(children[1]);
                    stack.push(children[0]);
                }
            }
        }
    }

    /// Conservative value range over `region`.
    pub fn query(&self, region: &AABB) -> Range1f {
        let mut out = Range1f::empty();
        if self.nodes.is_empty() {
            return out;
        }
        let mut stack = vec![0usize];
        while let Some(node_idx) = stack.pop() {
            let node = &self.nodes[node_idx];
            if !node.bounds.overlaps(region) {
                continue;
            }
            if region.contains_aabb(&node.bounds) {
                out.extend_range(&node.value_range);
                continue;
            }
            match node.kind {
                BvhNodeKind::Leaf { .. } => out.extend_range(&node.value_range),
                BvhNodeKind::Inner { children } => {
                    out.extend(0.0);
                    stack.extend_from_slice(&children);
                }
            }
        }
        out
    }

    fn build_range(&mut self, start: usize, end: usize) -> usize {
        let (bounds, centroid_bounds) = self.compute_bounds(start, end);
        let count = end - start;
        if count == 1 {
            let prim_id = self.indices[start];
            let node_idx = self.nodes.len();
            self.nodes.push(BvhNode::leaf(bounds, prim_id, self.prim_lengths[prim_id]));
            return node_idx;
        }

        let mid = match self.sah_partition(start, end, &centroid_bounds) {
            Some(mid) => mid,
            None => {
                // Degenerate centroids; any even split keeps one primitive per leaf.
                start + count / 2
            }
        };

        let node_idx = self.nodes.len();
        self.nodes.push(BvhNode::leaf(bounds, 0, 0.0));
        let left = self.build_range(start, mid);
        let right = self.build_range(mid, end);
        let length = self.nodes[left].nominal_length.min(self.nodes[right].nominal_length);
        self.nodes[node_idx] = BvhNode::inner(bounds, [left, right], length);
        node_idx
    }

    fn bucket_of(&self, prim: usize, axis: usize, axis_min: Float, axis_max: Float) -> usize {
        let c = self.prim_bounds[prim].center()[axis];
        let b = ((c - axis_min) / (axis_max - axis_min) * SAH_BUCKETS as Float) as usize;
        b.min(SAH_BUCKETS - 1)
    }

    /// Partitions `indices[start..end]` at the cheapest bucket boundary.
    fn sah_partition(&mut self, start: usize, end: usize, centroid_bounds: &AABB) -> Option<usize> {
        let axis = centroid_bounds.max_extent() as usize;
        let axis_min = centroid_bounds.p_min[axis];
        let axis_max = centroid_bounds.p_max[axis];
        if (axis_max - axis_min).abs() < 1e-6 {
            return None;
        }

        let mut buckets = [(0usize, AABB::default()); SAH_BUCKETS];
        for i in start..end {
            let idx = self.indices[i];
            let b = self.bucket_of(idx, axis, axis_min, axis_max);
            buckets[b].0 += 1;
            buckets[b].1.expand_by_aabb(&self.prim_bounds[idx]);
        }

        let mut min_cost = std::f32::INFINITY;
        let mut min_split = 0usize;
        for split in 0..(SAH_BUCKETS - 1) {
            let mut b0 = AABB::default();
            let mut b1 = AABB::default();
            let mut count0 = 0usize;
            let mut count1 = 0usize;
            for bucket in &buckets[..=split] {
                count0 += bucket.0;
                b0.expand_by_aabb(&bucket.1);
            }
            for bucket in &buckets[(split + 1)..] {
                count1 += bucket.0;
                b1.expand_by_aabb(&bucket.1);
            }
            if count0 == 0 || count1 == 0 {
                continue;
            }
            let cost = count0 as Float * b0.surface_area() + count1 as Float * b1.surface_area();
            if cost < min_cost {
                min_cost = cost;
                min_split = split;
            }
        }
        if !min_cost.is_finite() {
            return None;
        }

        let mut mid = start;
        for i in start..end {
            let idx = self.indices[i];
            if self.bucket_of(idx, axis, axis_min, axis_max) <= min_split {
                self.indices.swap(i, mid);
                mid += 1;
            }
        }

        if mid == start || mid == end {
            None
        } else {
            Some(mid)
        }
    }

    fn compute_bounds(&self, start: usize, end: usize) -> (AABB, AABB) {
        let mut bounds = AABB::default();
        let mut centroid_bounds = AABB::default();
        for &idx in &self.indices[start..end] {
            bounds.expand_by_aabb(&self.prim_bounds[idx]);
            centroid_bounds.expand_by_point(&self.prim_bounds[idx].center());
        }
        (bounds, centroid_bounds)
    }
}

impl RangeTree for Bvh {
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
            BvhNodeKind::Inner { children } => children.as_slice(),
            BvhNodeKind::Leaf { .. } => &[],
        }
    }

    fn leaf_step(&self, node: usize) -> Float {
        self.nodes[node].nominal_length
    }
}
