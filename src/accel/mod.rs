// Copyright @yucwang 2026

pub mod brick_grid;
pub mod bvh;
pub mod kdtree;
pub mod traversal;
pub mod vdb_tree;

use crate::math::range::Range1f;

/// Union of child ranges, widened to contain 0 when the children leave part
/// of the parent's extent unfilled (unfilled space samples as 0).
pub fn merge_child_ranges<I>(children: I, children_tile_parent: bool) -> Range1f
where
    I: IntoIterator<Item = Range1f>,
{
    let mut out = Range1f::empty();
    for r in children {
        out.extend_range(&r);
    }
    if !children_tile_parent {
        out.extend(0.0);
    }
    out
}
