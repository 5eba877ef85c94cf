// Copyright 2020 @TwoCookingMice

use super::constants::{Float, Vector3f};
use super::range::Range1f;

/// A ray with an unnormalized direction: `t` is measured in multiples of
/// `dir`, so the parametric ranges handed in by callers keep their meaning.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Ray3f {
    origin: Vector3f,
    dir: Vector3f,
    pub min_t: Float,
    pub max_t: Float
}

impl Ray3f {
    pub fn new(o: Vector3f, d: Vector3f,
               min_t: Option<Float>, max_t: Option<Float>) -> Self {
        Self { origin: o, dir: d,
               min_t: min_t.unwrap_or(0.0),
               max_t: max_t.unwrap_or(std::f32::MAX)}
    }

    pub fn with_range(o: Vector3f, d: Vector3f, t_range: Range1f) -> Self {
        Self::new(o, d, Some(t_range.lower), Some(t_range.upper))
    }

    pub fn origin(&self) -> Vector3f {
        self.origin
    }

    pub fn dir(&self) -> Vector3f {
        self.dir
    }

    pub fn t_range(&self) -> Range1f {
        Range1f::new(self.min_t, self.max_t)
    }

    pub fn at(&self, t: Float) -> Vector3f {
        self.origin + self.dir * t
    }

    /// Converts an object-space step length into ray-parameter units.
    pub fn object_to_t(&self, length: Float) -> Float {
        let n = self.dir.norm();
        if n > 0.0 {
            length / n
        } else {
            length
        }
    }

    pub fn test_segment(&self, t: Float) -> bool {
        t >= self.min_t && t <= self.max_t
    }
}

/* Tests for Ray */

#[cfg(test)]
mod tests {
    use super::Vector3f;
    use super::Ray3f;

    #[test]
    fn test_ray3f() {
        let o = Vector3f::new(0.0, 0.0, 0.0);
        let d = Vector3f::new(2.0, 0.0, 0.0);
        let ray = Ray3f::new(o, d, None, Some(10.0));
        assert_eq!(o, ray.origin());

        let v1 = ray.at(2.0);
        assert!((v1[0] - 4.0).abs() < 1e-6);
        assert!(v1[1].abs() < 1e-6);

        assert!(ray.test_segment(5.0));
        assert!(!ray.test_segment(10.5));
        assert!((ray.object_to_t(1.0) - 0.5).abs() < 1e-6);
    }
}
