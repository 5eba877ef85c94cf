// Copyright @yucwang 2026

use crate::accel::traversal::SpanTraversal;
use crate::core::error::{Result, VklError};
use crate::core::native::{NativeHandle, NativeVolume};
use crate::core::observer::{Observer, ObserverKind};
use crate::core::value_selector::ValueFilter;
use crate::math::aabb::AABB;
use crate::math::constants::Float;
use crate::math::range::Range1f;
use crate::math::ray::Ray3f;

/// Everything a successful commit produces. Replaced wholesale by the next
/// commit, never edited in place.
#[derive(Debug)]
pub struct VolumeState {
    pub bounds: AABB,
    pub value_range: Range1f,
    /// Volume-wide sampling step in object units.
    pub nominal_step: Float,
    pub handle: NativeHandle,
}

impl VolumeState {
    pub fn new(bounds: AABB, value_range: Range1f, nominal_step: Float, native: NativeVolume) -> Self {
        let handle = NativeHandle::new(native);
        log::info!(
            "committed {} volume #{}: bounds [{:?} .. {:?}], value range [{}, {}], {} accelerator units",
            handle.native().kind_name(),
            handle.id(),
            bounds.p_min.as_slice(),
            bounds.p_max.as_slice(),
            value_range.lower,
            value_range.upper,
            handle.native().unit_count()
        );
        Self { bounds, value_range, nominal_step, handle }
    }
}

pub trait Volume: Send + Sync {
    fn type_name(&self) -> &'static str;

    /// `None` until the first successful commit.
    fn state(&self) -> Option<&VolumeState>;

    fn is_committed(&self) -> bool {
        self.state().is_some()
    }

    fn committed_state(&self) -> Result<&VolumeState> {
        self.state().ok_or_else(|| {
            VklError::Configuration(format!("{} volume used before a successful commit", self.type_name()))
        })
    }

    fn bounding_box(&self) -> Result<AABB> {
        Ok(self.committed_state()?.bounds)
    }

    fn value_range(&self) -> Result<Range1f> {
        Ok(self.committed_state()?.value_range)
    }

    fn native_id(&self) -> Result<u64> {
        Ok(self.committed_state()?.handle.id())
    }

    fn new_observer(&self, kind: ObserverKind) -> Result<Observer<'_>> {
        Observer::new(self.committed_state()?.handle.native(), kind)
    }

    /// Accelerator units crossed by `ray`, nearest first.
    fn interval_units<'a>(&'a self, ray: Ray3f, filter: ValueFilter<'a>) -> Result<Box<dyn SpanTraversal + 'a>> {
        Ok(self.committed_state()?.handle.native().spans(ray, filter))
    }
}
