// Copyright @yucwang 2026

use crate::accel::traversal::{Span, SpanTraversal};
use crate::core::data::Data;
use crate::core::parallel::parallel_map;
use crate::core::value_selector::ValueFilter;
use crate::math::aabb::AABB;
use crate::math::constants::{Float, Vector3f};
use crate::math::range::Range1f;
use crate::math::ray::Ray3f;

/// Cells per brick edge.
pub const BRICK_CELLS: usize = 8;

/// Min/max summary over fixed-size bricks of a dense voxel lattice.
///
/// A brick covers `BRICK_CELLS^3` cells; its range is taken over the cell
/// corner voxels, which bounds anything trilinear interpolation produces
/// inside it.
pub struct BrickGrid {
    dims: [usize; 3],
    cells: [usize; 3],
    bricks: [usize; 3],
    origin: Vector3f,
    spacing: Vector3f,
    ranges: Vec<Range1f>,
    value_range: Range1f,
}

impl BrickGrid {
    pub fn build(dims: [usize; 3], origin: Vector3f, spacing: Vector3f, voxels: &Data) -> Self {
        let mut cells = [0usize; 3];
        let mut bricks = [0usize; 3];
        for axis in 0..3 {
            cells[axis] = dims[axis].saturating_sub(1);
            bricks[axis] = ((cells[axis] + BRICK_CELLS - 1) / BRICK_CELLS).max(1);
        }

        let brick_count = bricks[0] * bricks[1] * bricks[2];
        let ranges = parallel_map(brick_count, |brick| {
            let bx = brick % bricks[0];
            let by = (brick / bricks[0]) % bricks[1];
            let bz = brick / (bricks[0] * bricks[1]);

            let lo = [bx * BRICK_CELLS, by * BRICK_CELLS, bz * BRICK_CELLS];
            let mut hi = [0usize; 3];
            for axis in 0..3 {
                hi[axis] = (lo[axis] + BRICK_CELLS).min(dims[axis] - 1);
            }

            let mut range = Range1f::empty();
            for z in lo[2]..=hi[2] {
                for y in lo[1]..=hi[1] {
                    let row = (z * dims[1] + y) * dims[0];
                    for x in lo[0]..=hi[0] {
                        range.extend(voxels.scalar(row + x));
                    }
                }
            }
            range
        });

        let mut value_range = Range1f::empty();
        for r in &ranges {
            value_range.extend_range(r);
        }

        log::debug!(
            "brick grid: {}x{}x{} bricks over {}x{}x{} voxels, range [{}, {}]",
            bricks[0], bricks[1], bricks[2], dims[0], dims[1], dims[2],
            value_range.lower, value_range.upper
        );

        Self { dims, cells, bricks, origin, spacing, ranges, value_range }
    }

    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    pub fn brick_counts(&self) -> [usize; 3] {
        self.bricks
    }

    pub fn brick_count(&self) -> usize {
        self.ranges.len()
    }

    pub fn value_range(&self) -> Range1f {
        self.value_range
    }

    fn brick_index(&self, b: [usize; 3]) -> usize {
        (b[2] * self.bricks[1] + b[1]) * self.bricks[0] + b[0]
    }

    pub fn brick_range(&self, b: [usize; 3]) -> Range1f {
        self.ranges[self.brick_index(b)]
    }

    pub fn brick_bounds(&self, b: [usize; 3]) -> AABB {
        let mut lo = Vector3f::zeros();
        let mut hi = Vector3f::zeros();
        for axis in 0..3 {
            let c0 = b[axis] * BRICK_CELLS;
            let c1 = (c0 + BRICK_CELLS).min(self.cells[axis]);
            lo[axis] = self.origin[axis] + self.spacing[axis] * c0 as Float;
            hi[axis] = self.origin[axis] + self.spacing[axis] * c1 as Float;
        }
        AABB::new(lo, hi)
    }

    pub fn bounds(&self) -> AABB {
        let mut hi = self.origin;
        for axis in 0..3 {
            hi[axis] += self.spacing[axis] * self.cells[axis] as Float;
        }
        AABB::new(self.origin, hi)
    }

    /// Union of the ranges of every brick overlapping `region`.
    pub fn query(&self, region: &AABB) -> Range1f {
        let mut out = Range1f::empty();
        for bz in 0..self.bricks[2] {
            for by in 0..self.bricks[1] {
                for bx in 0..self.bricks[0] {
                    let b = [bx, by, bz];
                    if self.brick_bounds(b).overlaps(region) {
                        out.extend_range(&self.brick_range(b));
                    }
                }
            }
        }
        out
    }

    pub fn nominal_step(&self) -> Float {
        self.spacing.x.min(self.spacing.y).min(self.spacing.z)
    }

    pub fn traverse<'a>(&'a self, ray: Ray3f, filter: ValueFilter<'a>) -> BrickTraversal<'a> {
        BrickTraversal::new(self, ray, filter)
    }
}

/// 3D-DDA walk over the bricks a ray crosses.
pub struct BrickTraversal<'a> {
    grid: &'a BrickGrid,
    ray: Ray3f,
    filter: ValueFilter<'a>,
    brick: [i64; 3],
    step: [i64; 3],
    t_max: [Float; 3],
    t_delta: [Float; 3],
    t_cur: Float,
    t_exit: Float,
    done: bool,
}

impl<'a> BrickTraversal<'a> {
    fn new(grid: &'a BrickGrid, ray: Ray3f, filter: ValueFilter<'a>) -> Self {
        let mut traversal = Self {
            grid,
            ray,
            filter,
            brick: [0; 3],
            step: [0; 3],
            t_max: [std::f32::INFINITY; 3],
            t_delta: [std::f32::INFINITY; 3],
            t_cur: 0.0,
            t_exit: 0.0,
            done: true,
        };

        let (t_enter, t_exit) = match grid.bounds().ray_intersect_range(&ray) {
            Some(span) => span,
            None => return traversal,
        };
        if t_exit <= t_enter {
            return traversal;
        }

        let p = ray.at(t_enter);
        let d = ray.dir();
        for axis in 0..3 {
            let brick_size = grid.spacing[axis] * BRICK_CELLS as Float;
            let last = grid.bricks[axis] as i64 - 1;
            let local = if brick_size > 0.0 {
                ((p[axis] - grid.origin[axis]) / brick_size).floor() as i64
            } else {
                0
            };
            let b = local.max(0).min(last);
            traversal.brick[axis] = b;

            if d[axis] > 0.0 {
                traversal.step[axis] = 1;
                let boundary = grid.origin[axis] + brick_size * (b + 1) as Float;
                traversal.t_max[axis] = (boundary - ray.origin()[axis]) / d[axis];
                traversal.t_delta[axis] = brick_size / d[axis];
            } else if d[axis] < 0.0 {
                traversal.step[axis] = -1;
                let boundary = grid.origin[axis] + brick_size * b as Float;
                traversal.t_max[axis] = (boundary - ray.origin()[axis]) / d[axis];
                traversal.t_delta[axis] = -brick_size / d[axis];
            }
        }

        traversal.t_cur = t_enter;
        traversal.t_exit = t_exit;
        traversal.done = false;
        traversal
    }

    fn in_grid(&self) -> bool {
        (0..3).all(|axis| self.brick[axis] >= 0 && self.brick[axis] < self.grid.bricks[axis] as i64)
    }
}

impl<'a> SpanTraversal for BrickTraversal<'a> {
    fn next_span(&mut self) -> Option<Span> {
        while !self.done {
            let mut axis = 0;
            for a in 1..3 {
                if self.t_max[a] < self.t_max[axis] {
                    axis = a;
                }
            }

            let t0 = self.t_cur;
            let t1 = self.t_max[axis].min(self.t_exit);
            let b = [self.brick[0] as usize, self.brick[1] as usize, self.brick[2] as usize];

            self.brick[axis] += self.step[axis];
            self.t_max[axis] += self.t_delta[axis];
            self.t_cur = self.t_cur.max(t1);
            if t1 >= self.t_exit || !self.in_grid() || self.step[axis] == 0 {
                self.done = true;
            }

            if t1 <= t0 {
                continue;
            }
            let value_range = self.grid.brick_range(b);
            if !self.filter.accepts(&value_range) {
                continue;
            }
            return Some(Span {
                t: Range1f::new(t0, t1),
                value_range,
                nominal_delta_t: self.ray.object_to_t(self.grid.nominal_step()),
            });
        }
        None
    }
}
