// Copyright @yucwang 2026

use std::collections::VecDeque;

use crate::core::error::{Result, VklError};
use crate::core::iterator::{Interval, IntervalIterator, IteratorState};
use crate::core::sampler::Sampler;
use crate::core::value_selector::{ValueFilter, ValueSelector};
use crate::math::constants::{Float, Vector3f, RAY_EPSILON};
use crate::math::range::Range1f;
use crate::math::ray::Ray3f;
use crate::math::simd::{LaneMask, VFloat, VRange1f, VVec3f};

/// Upper bound on march steps inside one interval.
const MAX_MARCH_STEPS: usize = 4096;
const MAX_REFINE_STEPS: usize = 48;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub t: Float,
    pub sample: Float,
    /// Bound on the error of `t`.
    pub epsilon: Float,
}

#[repr(C, align(64))]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct VHit<const W: usize> {
    pub t: VFloat<W>,
    pub sample: VFloat<W>,
    pub epsilon: VFloat<W>,
}

impl<const W: usize> VHit<W> {
    pub fn lane(&self, lane: usize) -> Hit {
        Hit { t: self.t.0[lane], sample: self.sample.0[lane], epsilon: self.epsilon.0[lane] }
    }

    pub fn set_lane(&mut self, lane: usize, hit: &Hit) {
        self.t.0[lane] = hit.t;
        self.sample.0[lane] = hit.sample;
        self.epsilon.0[lane] = hit.epsilon;
    }
}

fn t_epsilon(t: Float) -> Float {
    RAY_EPSILON * t.abs().max(1.0)
}

/// Isovalue crossings along a ray, nearest first.
pub struct HitIterator<'a> {
    intervals: IntervalIterator<'a>,
    sampler: Sampler<'a>,
    ray: Ray3f,
    values: Vec<Float>,
    pending: VecDeque<Hit>,
}

impl<'a> HitIterator<'a> {
    pub(crate) fn initialize(
        sampler: Sampler<'a>,
        origin: Vector3f,
        direction: Vector3f,
        t_range: Range1f,
        selector: Option<&'a ValueSelector>,
    ) -> Result<Self> {
        let ray = Ray3f::with_range(origin, direction, t_range);
        let mut intervals = IntervalIterator::new();
        let values = match selector {
            Some(selector) if !selector.is_committed() => {
                return Err(VklError::Configuration(
                    "value selector must be committed before iteration".to_string(),
                ));
            }
            Some(selector) => {
                intervals.initialize_filtered(sampler.volume(), ray, ValueFilter::Isovalues(selector))?;
                selector.values().to_vec()
            }
            None => {
                // Nothing to find; still reject uncommitted volumes.
                sampler.volume().committed_state()?;
                Vec::new()
            }
        };
        Ok(Self { intervals, sampler, ray, values, pending: VecDeque::new() })
    }

    pub fn state(&self) -> IteratorState {
        if !self.pending.is_empty() {
            IteratorState::Active
        } else {
            match self.intervals.state() {
                IteratorState::Uninitialized => IteratorState::Exhausted,
                state => state,
            }
        }
    }

    pub fn advance(&mut self) -> Option<Hit> {
        loop {
            if let Some(hit) = self.pending.pop_front() {
                return Some(hit);
            }
            let interval = self.intervals.advance()?;
            self.collect_hits(&interval);
        }
    }

    fn sample_at(&self, t: Float) -> Float {
        self.sampler.compute_sample(&self.ray.at(t))
    }

    fn collect_hits(&mut self, interval: &Interval) {
        let isovalues: Vec<Float> =
            self.values.iter().copied().filter(|v| interval.value_range.contains(*v)).collect();
        if isovalues.is_empty() {
            return;
        }

        let t0 = interval.t_range.lower;
        let t1 = interval.t_range.upper;
        let span = t1 - t0;
        let dt = if interval.nominal_delta_t.is_finite() && interval.nominal_delta_t > 0.0 {
            interval.nominal_delta_t
        } else {
            span
        };
        let steps = ((span / dt).ceil() as usize).max(1).min(MAX_MARCH_STEPS);

        let samples: Vec<(Float, Float)> = (0..=steps)
            .map(|k| {
                let t = if k == steps { t1 } else { t0 + span * k as Float / steps as Float };
                (t, self.sample_at(t))
            })
            .collect();

        let mut hits = Vec::new();
        for &iso in &isovalues {
            for pair in samples.windows(2) {
                let (ta, sa) = pair[0];
                let (tb, sb) = pair[1];
                let da = sa - iso;
                let db = sb - iso;
                if da == 0.0 {
                    continue;
                }
                if db == 0.0 {
                    hits.push(Hit { t: tb, sample: sb, epsilon: t_epsilon(tb) });
                } else if (da < 0.0) != (db < 0.0) {
                    hits.push(self.refine(iso, ta, tb, da));
                }
            }
        }

        hits.sort_by(|a, b| a.t.total_cmp(&b.t));
        self.pending.extend(hits);
    }

    /// Bisects a bracketed crossing of `iso` inside `[lo, hi]`.
    fn refine(&self, iso: Float, mut lo: Float, mut hi: Float, mut d_lo: Float) -> Hit {
        for _ in 0..MAX_REFINE_STEPS {
            let mid = 0.5 * (lo + hi);
            if hi - lo <= t_epsilon(mid) {
                break;
            }
            let d_mid = self.sample_at(mid) - iso;
            if d_mid == 0.0 {
                lo = mid;
                hi = mid;
                break;
            }
            if (d_mid < 0.0) == (d_lo < 0.0) {
                lo = mid;
                d_lo = d_mid;
            } else {
                hi = mid;
            }
        }
        let t = 0.5 * (lo + hi);
        Hit { t, sample: self.sample_at(t), epsilon: (0.5 * (hi - lo)).max(t_epsilon(t)) }
    }
}

impl<'a> Iterator for HitIterator<'a> {
    type Item = Hit;

    fn next(&mut self) -> Option<Hit> {
        self.advance()
    }
}

/// `W` independent hit iterators driven under a lane mask.
pub struct HitIteratorV<'a, const W: usize> {
    lanes: Vec<Option<HitIterator<'a>>>,
}

impl<'a, const W: usize> HitIteratorV<'a, W> {
    pub(crate) fn initialize(
        valid: &LaneMask<W>,
        sampler: Sampler<'a>,
        origins: &VVec3f<W>,
        directions: &VVec3f<W>,
        t_ranges: &VRange1f<W>,
        selector: Option<&'a ValueSelector>,
    ) -> Result<Self> {
        let mut lanes = Vec::with_capacity(W);
        for lane in 0..W {
            if valid.is_active(lane) {
                lanes.push(Some(HitIterator::initialize(
                    sampler,
                    origins.lane(lane),
                    directions.lane(lane),
                    t_ranges.lane(lane),
                    selector,
                )?));
            } else {
                lanes.push(None);
            }
        }
        Ok(Self { lanes })
    }

    /// Same contract as the interval form: inactive lanes are untouched.
    pub fn iterate(&mut self, valid: &LaneMask<W>, out: &mut VHit<W>, result: &mut [i32; W]) {
        for lane in 0..W {
            if !valid.is_active(lane) {
                continue;
            }
            match self.lanes[lane].as_mut().and_then(|it| it.advance()) {
                Some(hit) => {
                    out.set_lane(lane, &hit);
                    result[lane] = 1;
                }
                None => result[lane] = 0,
            }
        }
    }
}
