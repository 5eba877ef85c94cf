// Copyright @yucwang 2026

//! Structure-of-arrays lane buffers shared with the kernel backend.
//!
//! Every buffer is `#[repr(C)]` and aligned to [`LANE_ALIGNMENT`], which
//! covers the widest supported lane group (16 x f32).

use super::constants::{Float, Vector3f};
use super::range::Range1f;

pub const LANE_ALIGNMENT: usize = 64;

/// Lane widths a context can be configured with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SimdWidth {
    W4,
    W8,
    W16,
}

impl SimdWidth {
    pub fn lanes(self) -> usize {
        match self {
            SimdWidth::W4 => 4,
            SimdWidth::W8 => 8,
            SimdWidth::W16 => 16,
        }
    }

    pub fn from_lanes(lanes: usize) -> Option<Self> {
        match lanes {
            4 => Some(SimdWidth::W4),
            8 => Some(SimdWidth::W8),
            16 => Some(SimdWidth::W16),
            _ => None,
        }
    }
}

/// Widths accepted by batched entry points, including the single-item form.
pub fn is_supported_width(lanes: usize) -> bool {
    matches!(lanes, 1 | 4 | 8 | 16)
}

/// Per-lane validity. Non-zero means active.
#[repr(C, align(64))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LaneMask<const W: usize>(pub [i32; W]);

impl<const W: usize> LaneMask<W> {
    pub fn all() -> Self {
        Self([1; W])
    }

    pub fn none() -> Self {
        Self([0; W])
    }

    /// Activates the first `count` lanes.
    pub fn first(count: usize) -> Self {
        let mut mask = [0; W];
        for lane in mask.iter_mut().take(count) {
            *lane = 1;
        }
        Self(mask)
    }

    pub fn from_slice(valid: &[i32]) -> Self {
        let mut mask = [0; W];
        for (dst, src) in mask.iter_mut().zip(valid.iter()) {
            *dst = *src;
        }
        Self(mask)
    }

    pub fn is_active(&self, lane: usize) -> bool {
        self.0[lane] != 0
    }

    pub fn as_slice(&self) -> &[i32] {
        &self.0
    }
}

#[repr(C, align(64))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VFloat<const W: usize>(pub [Float; W]);

impl<const W: usize> Default for VFloat<W> {
    fn default() -> Self {
        Self([0.0; W])
    }
}

impl<const W: usize> VFloat<W> {
    pub fn splat(v: Float) -> Self {
        Self([v; W])
    }

    pub fn as_slice(&self) -> &[Float] {
        &self.0
    }

    pub fn as_mut_slice(&mut self) -> &mut [Float] {
        &mut self.0
    }
}

#[repr(C, align(64))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VVec3f<const W: usize> {
    pub x: [Float; W],
    pub y: [Float; W],
    pub z: [Float; W],
}

impl<const W: usize> Default for VVec3f<W> {
    fn default() -> Self {
        Self { x: [0.0; W], y: [0.0; W], z: [0.0; W] }
    }
}

impl<const W: usize> VVec3f<W> {
    pub fn splat(v: Vector3f) -> Self {
        Self { x: [v.x; W], y: [v.y; W], z: [v.z; W] }
    }

    /// AOS to SOA; missing lanes stay zero.
    pub fn from_points(points: &[Vector3f]) -> Self {
        let mut out = Self::default();
        for (lane, p) in points.iter().take(W).enumerate() {
            out.set_lane(lane, *p);
        }
        out
    }

    pub fn lane(&self, lane: usize) -> Vector3f {
        Vector3f::new(self.x[lane], self.y[lane], self.z[lane])
    }

    pub fn set_lane(&mut self, lane: usize, p: Vector3f) {
        self.x[lane] = p.x;
        self.y[lane] = p.y;
        self.z[lane] = p.z;
    }
}

#[repr(C, align(64))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VRange1f<const W: usize> {
    pub lower: [Float; W],
    pub upper: [Float; W],
}

impl<const W: usize> Default for VRange1f<W> {
    fn default() -> Self {
        Self { lower: [0.0; W], upper: [0.0; W] }
    }
}

impl<const W: usize> VRange1f<W> {
    pub fn splat(r: Range1f) -> Self {
        Self { lower: [r.lower; W], upper: [r.upper; W] }
    }

    pub fn lane(&self, lane: usize) -> Range1f {
        Range1f::new(self.lower[lane], self.upper[lane])
    }

    pub fn set_lane(&mut self, lane: usize, r: Range1f) {
        self.lower[lane] = r.lower;
        self.upper[lane] = r.upper;
    }
}

pub fn is_lane_aligned<T>(ptr: *const T) -> bool {
    (ptr as usize) % LANE_ALIGNMENT == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lane_buffers_are_aligned() {
        let p = VVec3f::<4>::default();
        let s = VFloat::<16>::default();
        let m = LaneMask::<8>::all();
        assert!(is_lane_aligned(p.x.as_ptr()));
        assert!(is_lane_aligned(s.0.as_ptr()));
        assert!(is_lane_aligned(m.0.as_ptr()));
        assert_eq!(std::mem::align_of::<VVec3f<1>>(), LANE_ALIGNMENT);
    }

    #[test]
    fn soa_layout_round_trips_points() {
        let pts = [Vector3f::new(1.0, 2.0, 3.0), Vector3f::new(4.0, 5.0, 6.0)];
        let v = VVec3f::<4>::from_points(&pts);
        assert_eq!(v.x, [1.0, 4.0, 0.0, 0.0]);
        assert_eq!(v.lane(1), pts[1]);
    }

    #[test]
    fn widths() {
        assert_eq!(SimdWidth::from_lanes(8), Some(SimdWidth::W8));
        assert_eq!(SimdWidth::from_lanes(3), None);
        assert!(is_supported_width(1));
        assert!(!is_supported_width(2));
        assert_eq!(LaneMask::<4>::first(2).0, [1, 1, 0, 0]);
    }
}
