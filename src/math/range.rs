// Copyright @yucwang 2026

use super::constants::Float;

/// Inclusive scalar range. `lower > upper` is the empty range.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Range1f {
    pub lower: Float,
    pub upper: Float,
}

impl Default for Range1f {
    fn default() -> Self {
        Self::empty()
    }
}

impl Range1f {
    pub fn new(lower: Float, upper: Float) -> Self {
        Self { lower, upper }
    }

    pub fn empty() -> Self {
        Self { lower: std::f32::INFINITY, upper: std::f32::NEG_INFINITY }
    }

    pub fn point(v: Float) -> Self {
        Self { lower: v, upper: v }
    }

    pub fn is_empty(&self) -> bool {
        !(self.lower <= self.upper)
    }

    pub fn size(&self) -> Float {
        if self.is_empty() {
            0.0
        } else {
            self.upper - self.lower
        }
    }

    pub fn contains(&self, v: Float) -> bool {
        self.lower <= v && v <= self.upper
    }

    pub fn overlaps(&self, other: &Range1f) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.lower <= other.upper
            && other.lower <= self.upper
    }

    pub fn extend(&mut self, v: Float) {
        if v.is_nan() {
            return;
        }
        self.lower = self.lower.min(v);
        self.upper = self.upper.max(v);
    }

    pub fn extend_range(&mut self, other: &Range1f) {
        if other.is_empty() {
            return;
        }
        self.lower = self.lower.min(other.lower);
        self.upper = self.upper.max(other.upper);
    }

    pub fn union(&self, other: &Range1f) -> Range1f {
        let mut out = *self;
        out.extend_range(other);
        out
    }

    pub fn intersection(&self, other: &Range1f) -> Range1f {
        Range1f::new(self.lower.max(other.lower), self.upper.min(other.upper))
    }

    pub fn clamp(&self, v: Float) -> Float {
        v.max(self.lower).min(self.upper)
    }
}

#[cfg(test)]
mod tests {
    use super::Range1f;

    #[test]
    fn range_extend_and_overlap() {
        let mut r = Range1f::empty();
        assert!(r.is_empty());
        r.extend(2.0);
        r.extend(-1.0);
        assert_eq!(r, Range1f::new(-1.0, 2.0));
        assert!(r.overlaps(&Range1f::new(2.0, 3.0)));
        assert!(!r.overlaps(&Range1f::new(2.5, 3.0)));
        assert!(!r.overlaps(&Range1f::empty()));

        r.extend(std::f32::NAN);
        assert_eq!(r, Range1f::new(-1.0, 2.0));
    }

    #[test]
    fn range_intersection_may_be_empty() {
        let a = Range1f::new(0.0, 1.0);
        let b = Range1f::new(2.0, 3.0);
        assert!(a.intersection(&b).is_empty());
        assert_eq!(a.union(&b), Range1f::new(0.0, 3.0));
        assert_eq!(a.intersection(&Range1f::new(0.5, 4.0)), Range1f::new(0.5, 1.0));
    }
}
