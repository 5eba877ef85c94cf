// Copyright @yucwang 2026

use crate::accel::traversal::{Span, SpanTraversal};
use crate::core::error::{Result, VklError};
use crate::core::value_selector::{ValueFilter, ValueSelector};
use crate::core::volume::Volume;
use crate::math::constants::{Float, Vector3f};
use crate::math::range::Range1f;
use crate::math::ray::Ray3f;
use crate::math::simd::{LaneMask, VFloat, VRange1f, VVec3f};

/// A ray segment whose samples lie within `value_range`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    pub t_range: Range1f,
    pub value_range: Range1f,
    /// Suggested ray-parameter step for sampling inside the interval.
    pub nominal_delta_t: Float,
}

impl From<Span> for Interval {
    fn from(span: Span) -> Self {
        Self { t_range: span.t, value_range: span.value_range, nominal_delta_t: span.nominal_delta_t }
    }
}

#[repr(C, align(64))]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct VInterval<const W: usize> {
    pub t_range: VRange1f<W>,
    pub value_range: VRange1f<W>,
    pub nominal_delta_t: VFloat<W>,
}

impl<const W: usize> VInterval<W> {
    pub fn lane(&self, lane: usize) -> Interval {
        Interval {
            t_range: self.t_range.lane(lane),
            value_range: self.value_range.lane(lane),
            nominal_delta_t: self.nominal_delta_t.0[lane],
        }
    }

    pub fn set_lane(&mut self, lane: usize, interval: &Interval) {
        self.t_range.set_lane(lane, interval.t_range);
        self.value_range.set_lane(lane, interval.value_range);
        self.nominal_delta_t.0[lane] = interval.nominal_delta_t;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IteratorState {
    Uninitialized,
    Active,
    Exhausted,
}

enum IntervalSource<'a> {
    Done,
    /// Unrestricted selector: the whole clipped ray, once.
    Whole(Option<Interval>),
    Units(Box<dyn SpanTraversal + 'a>),
}

/// Walks a ray through a volume's accelerator and yields one interval per
/// unit whose value range passes the selector.
pub struct IntervalIterator<'a> {
    state: IteratorState,
    source: IntervalSource<'a>,
    last_value_range: Range1f,
}

impl<'a> Default for IntervalIterator<'a> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> IntervalIterator<'a> {
    pub fn new() -> Self {
        Self { state: IteratorState::Uninitialized, source: IntervalSource::Done, last_value_range: Range1f::empty() }
    }

    /// Restarts the iterator on a new ray. `t_range` is in multiples of
    /// `direction`; `None` or a selector without ranges means unrestricted.
    pub fn initialize(
        &mut self,
        volume: &'a dyn Volume,
        origin: Vector3f,
        direction: Vector3f,
        t_range: Range1f,
        selector: Option<&'a ValueSelector>,
    ) -> Result<()> {
        let ray = Ray3f::with_range(origin, direction, t_range);
        match selector {
            Some(selector) if !selector.is_committed() => Err(VklError::Configuration(
                "value selector must be committed before iteration".to_string(),
            )),
            Some(selector) if !selector.is_unrestricted() => {
                self.initialize_filtered(volume, ray, ValueFilter::Ranges(selector))
            }
            _ => self.initialize_whole(volume, ray),
        }
    }

    fn initialize_whole(&mut self, volume: &'a dyn Volume, ray: Ray3f) -> Result<()> {
        let state = volume.committed_state()?;
        let whole = state
            .bounds
            .ray_intersect_range(&ray)
            .filter(|(t0, t1)| t1 > t0)
            .map(|(t0, t1)| Interval {
                t_range: Range1f::new(t0, t1),
                value_range: state.value_range,
                nominal_delta_t: ray.object_to_t(state.nominal_step),
            });
        self.source = IntervalSource::Whole(whole);
        self.state = IteratorState::Active;
        self.last_value_range = Range1f::empty();
        Ok(())
    }

    pub(crate) fn initialize_filtered(
        &mut self,
        volume: &'a dyn Volume,
        ray: Ray3f,
        filter: ValueFilter<'a>,
    ) -> Result<()> {
        let units = volume.interval_units(ray, filter)?;
        self.source = IntervalSource::Units(units);
        self.state = IteratorState::Active;
        self.last_value_range = Range1f::empty();
        Ok(())
    }

    pub fn state(&self) -> IteratorState {
        self.state
    }

    /// Value range of the most recently produced interval.
    pub fn last_value_range(&self) -> Range1f {
        self.last_value_range
    }

    pub fn advance(&mut self) -> Option<Interval> {
        if self.state != IteratorState::Active {
            return None;
        }
        let next = match &mut self.source {
            IntervalSource::Done => None,
            IntervalSource::Whole(slot) => slot.take(),
            IntervalSource::Units(units) => units.next_span().map(Interval::from),
        };
        match next {
            Some(interval) => {
                self.last_value_range = interval.value_range;
                Some(interval)
            }
            None => {
                self.state = IteratorState::Exhausted;
                self.source = IntervalSource::Done;
                None
            }
        }
    }
}

impl<'a> Iterator for IntervalIterator<'a> {
    type Item = Interval;

    fn next(&mut self) -> Option<Interval> {
        self.advance()
    }
}

/// `W` independent interval iterators driven under a lane mask.
pub struct IntervalIteratorV<'a, const W: usize> {
    lanes: Vec<Option<IntervalIterator<'a>>>,
}

impl<'a, const W: usize> IntervalIteratorV<'a, W> {
    pub(crate) fn initialize(
        valid: &LaneMask<W>,
        volume: &'a dyn Volume,
        origins: &VVec3f<W>,
        directions: &VVec3f<W>,
        t_ranges: &VRange1f<W>,
        selector: Option<&'a ValueSelector>,
    ) -> Result<Self> {
        let mut lanes = Vec::with_capacity(W);
        for lane in 0..W {
            if !valid.is_active(lane) {
                lanes.push(None);
                continue;
            }
            let mut iterator = IntervalIterator::new();
            iterator.initialize(volume, origins.lane(lane), directions.lane(lane), t_ranges.lane(lane), selector)?;
            lanes.push(Some(iterator));
        }
        Ok(Self { lanes })
    }

    pub fn lane(&self, lane: usize) -> Option<&IntervalIterator<'a>> {
        self.lanes.get(lane).and_then(|l| l.as_ref())
    }

    /// Advances every active lane. `result[lane]` is 1 when `out` holds a new
    /// interval for that lane, 0 when it is exhausted; inactive lanes keep
    /// their previous `out` and `result` contents.
    pub fn iterate(&mut self, valid: &LaneMask<W>, out: &mut VInterval<W>, result: &mut [i32; W]) {
        for lane in 0..W {
            if !valid.is_active(lane) {
                continue;
            }
            let next = match self.lanes[lane].as_mut() {
                Some(iterator) => iterator.advance(),
                None => None,
            };
            match next {
                Some(interval) => {
                    out.set_lane(lane, &interval);
                    result[lane] = 1;
                }
                None => result[lane] = 0,
            }
        }
    }
}
