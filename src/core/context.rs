// Copyright @yucwang 2026

use std::sync::Arc;

use crate::core::error::{Result, VklError};
use crate::core::hit_iterator::{HitIterator, HitIteratorV};
use crate::core::iterator::{IntervalIterator, IntervalIteratorV};
use crate::core::kernel::KernelBackend;
use crate::core::observer::{Observer, ObserverKind};
use crate::core::sampler::Sampler;
use crate::core::value_selector::ValueSelector;
use crate::core::volume::Volume;
use crate::kernels::CpuKernels;
use crate::math::constants::Vector3f;
use crate::math::range::Range1f;
use crate::math::simd::{LaneMask, SimdWidth, VRange1f, VVec3f};

/// Engine configuration shared by every entry point: the native lane width
/// batched iterators run at, and the kernel backend used for evaluation.
#[derive(Clone)]
pub struct Context {
    native_width: SimdWidth,
    kernels: Arc<dyn KernelBackend>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new(SimdWidth::W8)
    }
}

impl Context {
    pub fn new(native_width: SimdWidth) -> Self {
        Self::with_backend(native_width, Arc::new(CpuKernels::new()))
    }

    pub fn with_backend(native_width: SimdWidth, kernels: Arc<dyn KernelBackend>) -> Self {
        log::debug!("context: native width {}, kernels '{}'", native_width.lanes(), kernels.name());
        Self { native_width, kernels }
    }

    pub fn native_width(&self) -> SimdWidth {
        self.native_width
    }

    pub fn kernels(&self) -> &dyn KernelBackend {
        self.kernels.as_ref()
    }

    fn check_native_width(&self, lanes: usize) -> Result<()> {
        if lanes != self.native_width.lanes() {
            return Err(VklError::UnsupportedOperation(format!(
                "iterator width {} does not match native width {}",
                lanes,
                self.native_width.lanes()
            )));
        }
        Ok(())
    }

    pub fn new_sampler<'a>(&'a self, volume: &'a dyn Volume) -> Result<Sampler<'a>> {
        Sampler::new(volume, self.kernels())
    }

    /// Observer of the named kind, e.g. `"LeafNodeAccess"` on sparse volumes.
    pub fn new_observer<'a>(&self, volume: &'a dyn Volume, kind: &str) -> Result<Observer<'a>> {
        let observer = volume.new_observer(ObserverKind::parse(kind)?)?;
        log::debug!("{} observer on {} volume: {} elements", kind, volume.type_name(), observer.num_elements());
        Ok(observer)
    }

    pub fn init_interval_iterator<'a>(
        &self,
        volume: &'a dyn Volume,
        origin: Vector3f,
        direction: Vector3f,
        t_range: Range1f,
        selector: Option<&'a ValueSelector>,
    ) -> Result<IntervalIterator<'a>> {
        let mut iterator = IntervalIterator::new();
        iterator.initialize(volume, origin, direction, t_range, selector)?;
        Ok(iterator)
    }

    pub fn init_interval_iterator_v<'a, const W: usize>(
        &self,
        valid: &LaneMask<W>,
        volume: &'a dyn Volume,
        origins: &VVec3f<W>,
        directions: &VVec3f<W>,
        t_ranges: &VRange1f<W>,
        selector: Option<&'a ValueSelector>,
    ) -> Result<IntervalIteratorV<'a, W>> {
        self.check_native_width(W)?;
        IntervalIteratorV::initialize(valid, volume, origins, directions, t_ranges, selector)
    }

    pub fn init_hit_iterator<'a>(
        &'a self,
        volume: &'a dyn Volume,
        origin: Vector3f,
        direction: Vector3f,
        t_range: Range1f,
        selector: Option<&'a ValueSelector>,
    ) -> Result<HitIterator<'a>> {
        HitIterator::initialize(self.new_sampler(volume)?, origin, direction, t_range, selector)
    }

    pub fn init_hit_iterator_v<'a, const W: usize>(
        &'a self,
        valid: &LaneMask<W>,
        volume: &'a dyn Volume,
        origins: &VVec3f<W>,
        directions: &VVec3f<W>,
        t_ranges: &VRange1f<W>,
        selector: Option<&'a ValueSelector>,
    ) -> Result<HitIteratorV<'a, W>> {
        self.check_native_width(W)?;
        HitIteratorV::initialize(valid, self.new_sampler(volume)?, origins, directions, t_ranges, selector)
    }
}
