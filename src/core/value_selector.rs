// Copyright @yucwang 2026

use crate::core::error::{Result, VklError};
use crate::math::constants::Float;
use crate::math::range::Range1f;

/// Value ranges and isovalues used to prune interval and hit iteration.
#[derive(Clone, Debug, Default)]
pub struct ValueSelector {
    ranges: Vec<Range1f>,
    values: Vec<Float>,
    committed: bool,
}

impl ValueSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ranges(ranges: &[Range1f]) -> Self {
        let mut selector = Self::new();
        selector.ranges = ranges.to_vec();
        selector.committed = true;
        selector
    }

    pub fn with_values(values: &[Float]) -> Self {
        let mut selector = Self::new();
        selector.values = values.to_vec();
        selector.committed = true;
        selector
    }

    /// Replaces the stored ranges.
    pub fn set_ranges(&mut self, ranges: &[Range1f]) -> Result<()> {
        self.ensure_mutable()?;
        self.ranges.clear();
        self.ranges.extend_from_slice(ranges);
        Ok(())
    }

    /// Replaces the stored isovalues.
    pub fn set_values(&mut self, values: &[Float]) -> Result<()> {
        self.ensure_mutable()?;
        self.values.clear();
        self.values.extend_from_slice(values);
        Ok(())
    }

    pub fn commit(&mut self) {
        self.committed = true;
    }

    pub fn is_committed(&self) -> bool {
        self.committed
    }

    pub fn ranges(&self) -> &[Range1f] {
        &self.ranges
    }

    pub fn values(&self) -> &[Float] {
        &self.values
    }

    pub fn is_unrestricted(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn ranges_overlap(&self, candidate: &Range1f) -> bool {
        self.ranges.iter().any(|r| r.overlaps(candidate))
    }

    pub fn values_overlap(&self, candidate: &Range1f) -> bool {
        self.values.iter().any(|v| candidate.contains(*v))
    }

    fn ensure_mutable(&self) -> Result<()> {
        if self.committed {
            return Err(VklError::UnsupportedOperation(
                "value selector is immutable after commit".to_string(),
            ));
        }
        Ok(())
    }
}

/// Pruning predicate handed to accelerator traversal.
#[derive(Clone, Copy, Debug)]
pub enum ValueFilter<'a> {
    All,
    Ranges(&'a ValueSelector),
    Isovalues(&'a ValueSelector),
}

impl<'a> ValueFilter<'a> {
    pub fn accepts(&self, candidate: &Range1f) -> bool {
        match self {
            ValueFilter::All => true,
            ValueFilter::Ranges(selector) => selector.ranges_overlap(candidate),
            ValueFilter::Isovalues(selector) => selector.values_overlap(candidate),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_ranges_replaces_contents() {
        let mut selector = ValueSelector::new();
        selector.set_ranges(&[Range1f::new(0.0, 1.0)]).unwrap();
        selector.set_ranges(&[Range1f::new(4.0, 6.0), Range1f::new(10.0, 20.0)]).unwrap();
        assert_eq!(selector.ranges().len(), 2);
        assert!(selector.ranges_overlap(&Range1f::new(5.0, 5.0)));
        assert!(!selector.ranges_overlap(&Range1f::new(0.5, 0.7)));
        assert!(selector.ranges_overlap(&Range1f::new(6.0, 9.0)));
    }

    #[test]
    fn committed_selector_is_frozen() {
        let mut selector = ValueSelector::new();
        selector.set_values(&[1.0]).unwrap();
        selector.commit();
        assert!(selector.set_values(&[2.0]).is_err());
        assert!(selector.set_ranges(&[]).is_err());
        assert_eq!(selector.values(), &[1.0]);
    }

    #[test]
    fn empty_selector_is_unrestricted() {
        let selector = ValueSelector::new();
        assert!(selector.is_unrestricted());
        assert!(!selector.values_overlap(&Range1f::new(-1e9, 1e9)));
        assert!(ValueFilter::All.accepts(&Range1f::new(0.0, 0.0)));
        assert!(!ValueFilter::Isovalues(&selector).accepts(&Range1f::new(0.0, 1.0)));
    }
}
