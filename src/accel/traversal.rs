// Copyright @yucwang 2026

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::core::value_selector::ValueFilter;
use crate::math::aabb::AABB;
use crate::math::constants::Float;
use crate::math::range::Range1f;
use crate::math::ray::Ray3f;

/// One accelerator unit crossed by a ray.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Span {
    pub t: Range1f,
    pub value_range: Range1f,
    pub nominal_delta_t: Float,
}

/// Yields the accelerator units along a ray, ordered by entry parameter,
/// already pruned against a [`ValueFilter`]. Consecutive spans never overlap.
pub trait SpanTraversal: Send {
    fn next_span(&mut self) -> Option<Span>;
}

/// Read-only view of a hierarchy whose nodes carry bounds and value ranges.
pub trait RangeTree: Sync {
    fn root(&self) -> Option<usize>;
    fn node_bounds(&self, node: usize) -> AABB;
    fn node_value_range(&self, node: usize) -> Range1f;
    /// Empty for leaves.
    fn node_children(&self, node: usize) -> &[usize];
    /// Nominal sampling step inside a leaf, in object units.
    fn leaf_step(&self, node: usize) -> Float;
}

#[derive(Debug, Clone, Copy)]
struct QueueEntry {
    t0: Float,
    t1: Float,
    node: usize,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    // Reversed so that BinaryHeap pops the nearest entry first; ties go to
    // the entry that exits first, then to the lower node index.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .t0
            .total_cmp(&self.t0)
            .then_with(|| other.t1.total_cmp(&self.t1))
            .then_with(|| other.node.cmp(&self.node))
    }
}

/// Front-to-back traversal of a [`RangeTree`]. Nodes are expanded in order
/// of their entry parameter; each emitted leaf span starts where the
/// previous one ended, so overlapping leaves are clipped, never repeated.
pub struct TreeTraversal<'a, T: RangeTree> {
    tree: &'a T,
    ray: Ray3f,
    filter: ValueFilter<'a>,
    queue: BinaryHeap<QueueEntry>,
    t_cur: Option<Float>,
}

impl<'a, T: RangeTree> TreeTraversal<'a, T> {
    pub fn new(tree: &'a T, ray: Ray3f, filter: ValueFilter<'a>) -> Self {
        let mut traversal = Self { tree, ray, filter, queue: BinaryHeap::new(), t_cur: None };
        if let Some(root) = tree.root() {
            traversal.push(root);
        }
        traversal
    }

    fn push(&mut self, node: usize) {
        if !self.filter.accepts(&self.tree.node_value_range(node)) {
            return;
        }
        if let Some((t0, t1)) = self.tree.node_bounds(node).ray_intersect_range(&self.ray) {
            self.queue.push(QueueEntry { t0, t1, node });
        }
    }
}

impl<'a, T: RangeTree> SpanTraversal for TreeTraversal<'a, T> {
    fn next_span(&mut self) -> Option<Span> {
        let tree = self.tree;
        while let Some(entry) = self.queue.pop() {
            if let Some(t_cur) = self.t_cur {
                if entry.t1 <= t_cur {
                    continue;
                }
            }

            let children = tree.node_children(entry.node);
            if children.is_empty() {
                let start = match self.t_cur {
                    Some(t_cur) => entry.t0.max(t_cur),
                    None => entry.t0,
                };
                if entry.t1 <= start {
                    continue;
                }
                self.t_cur = Some(entry.t1);
                return Some(Span {
                    t: Range1f::new(start, entry.t1),
                    value_range: tree.node_value_range(entry.node),
                    nominal_delta_t: self.ray.object_to_t(tree.leaf_step(entry.node)),
                });
            }

            for &child in children {
                self.push(child);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::value_selector::ValueSelector;
    use crate::math::constants::Vector3f;

    // Root with three leaves along x; the middle one overlaps both others.
    struct LineTree {
        bounds: Vec<AABB>,
        ranges: Vec<Range1f>,
        children: Vec<Vec<usize>>,
    }

    fn line_tree() -> LineTree {
        let b = |x0: Float, x1: Float| AABB::new(Vector3f::new(x0, 0.0, 0.0), Vector3f::new(x1, 1.0, 1.0));
        LineTree {
            bounds: vec![b(0.0, 6.0), b(0.0, 2.0), b(1.0, 4.0), b(5.0, 6.0)],
            ranges: vec![Range1f::new(0.0, 3.0), Range1f::new(1.0, 1.0), Range1f::new(2.0, 2.0), Range1f::new(3.0, 3.0)],
            children: vec![vec![1, 2, 3], vec![], vec![], vec![]],
        }
    }

    impl RangeTree for LineTree {
        fn root(&self) -> Option<usize> {
            Some(0)
        }
        fn node_bounds(&self, node: usize) -> AABB {
            self.bounds[node]
        }
        fn node_value_range(&self, node: usize) -> Range1f {
            self.ranges[node]
        }
        fn node_children(&self, node: usize) -> &[usize] {
            &self.children[node]
        }
        fn leaf_step(&self, _node: usize) -> Float {
            0.5
        }
    }

    fn ray() -> Ray3f {
        Ray3f::new(Vector3f::new(-1.0, 0.5, 0.5), Vector3f::new(1.0, 0.0, 0.0), None, None)
    }

    #[test]
    fn spans_are_ordered_and_disjoint() {
        let tree = line_tree();
        let mut traversal = TreeTraversal::new(&tree, ray(), ValueFilter::All);
        let mut spans = Vec::new();
        while let Some(s) = traversal.next_span() {
            spans.push(s);
        }
        assert_eq!(spans.len(), 3);
        assert_eq!(spans[0].t, Range1f::new(1.0, 3.0));
        assert_eq!(spans[1].t, Range1f::new(3.0, 5.0));
        assert_eq!(spans[2].t, Range1f::new(6.0, 7.0));
        assert!((spans[0].nominal_delta_t - 0.5).abs() < 1e-6);
    }

    #[test]
    fn rejected_leaves_are_skipped() {
        let tree = line_tree();
        let selector = ValueSelector::with_ranges(&[Range1f::new(2.5, 3.5)]);
        let mut traversal = TreeTraversal::new(&tree, ray(), ValueFilter::Ranges(&selector));
        let s = traversal.next_span().unwrap();
        assert_eq!(s.t, Range1f::new(6.0, 7.0));
        assert!(traversal.next_span().is_none());
    }
}
