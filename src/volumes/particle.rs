// Copyright @yucwang 2026

use crate::accel::bvh::Bvh;
use crate::core::error::{config_error, Result};
use crate::core::native::{NativeVolume, ParticleNative};
use crate::core::parallel::parallel_map;
use crate::core::volume::{Volume, VolumeState};
use crate::math::aabb::AABB;
use crate::math::constants::{Float, Vector3f};
use crate::math::range::Range1f;

/// Commit parameters of a Gaussian radial basis particle field.
#[derive(Clone, Debug)]
pub struct ParticleParams {
    pub positions: Vec<Vector3f>,
    pub radii: Vec<Float>,
    /// Per-particle weights; every particle weighs 1 when absent.
    pub weights: Option<Vec<Float>>,
    /// A particle contributes within `radius * radius_support_factor`.
    pub radius_support_factor: Float,
    /// Upper clamp on the summed field; 0 disables it.
    pub clamp_max_cumulative_value: Float,
    pub estimate_value_ranges: bool,
}

impl Default for ParticleParams {
    fn default() -> Self {
        Self {
            positions: Vec::new(),
            radii: Vec::new(),
            weights: None,
            radius_support_factor: 3.0,
            clamp_max_cumulative_value: 0.0,
            estimate_value_ranges: true,
        }
    }
}

#[derive(Default)]
pub struct ParticleVolume {
    params: ParticleParams,
    state: Option<VolumeState>,
}

/// `[sum of negative weights, sum of positive weights]`, widened to 0 and
/// clamped like the field itself.
fn weight_bounds<I: IntoIterator<Item = Float>>(weights: I, clamp: Float) -> Range1f {
    let mut range = Range1f::point(0.0);
    let (mut neg, mut pos) = (0.0, 0.0);
    for w in weights {
        if w < 0.0 {
            neg += w;
        } else {
            pos += w;
        }
    }
    range.extend(neg);
    range.extend(pos);
    if clamp > 0.0 {
        range.lower = range.lower.min(clamp);
        range.upper = range.upper.min(clamp);
    }
    range
}

impl ParticleVolume {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn committed(params: ParticleParams) -> Result<Self> {
        let mut volume = Self { params, state: None };
        volume.commit()?;
        Ok(volume)
    }

    pub fn params(&self) -> &ParticleParams {
        &self.params
    }

    pub fn set_params(&mut self, params: ParticleParams) {
        self.params = params;
    }

    fn validate(&self) -> Result<Vec<Float>> {
        let params = &self.params;
        let count = params.positions.len();
        if count == 0 {
            return config_error("particle volume needs at least one particle");
        }
        if params.radii.len() != count {
            return config_error(format!("{} particle positions but {} radii", count, params.radii.len()));
        }
        if let Some(r) = params.radii.iter().find(|r| !(**r > 0.0) || !r.is_finite()) {
            return config_error(format!("particle radius must be positive, got {}", r));
        }
        if !(params.radius_support_factor > 0.0) {
            return config_error(format!(
                "radiusSupportFactor must be positive, got {}",
                params.radius_support_factor
            ));
        }
        match &params.weights {
            Some(w) if w.len() != count => {
                config_error(format!("{} particle positions but {} weights", count, w.len()))
            }
            Some(w) => Ok(w.clone()),
            None => Ok(vec![1.0; count]),
        }
    }

    pub fn commit(&mut self) -> Result<()> {
        self.state = None;
        let weights = self.validate()?;

        let params = &self.params;
        let support = params.radius_support_factor;
        let clamp = params.clamp_max_cumulative_value;
        let prim_bounds: Vec<AABB> =
            params.positions.iter().zip(&params.radii).map(|(p, r)| AABB::around(*p, r * support)).collect();
        let mut bvh = Bvh::build(prim_bounds.clone(), params.radii.clone());

        if params.estimate_value_ranges {
            let ranges = {
                let bvh = &bvh;
                let weights = &weights;
                let prim_bounds = &prim_bounds;
                parallel_map(prim_bounds.len(), |prim| {
                    let mut overlapping = Vec::new();
                    bvh.overlapping(&prim_bounds[prim], &mut overlapping);
                    weight_bounds(overlapping.into_iter().map(|id| weights[id]), clamp)
                })
            };
            bvh.assign_ranges(|prim| ranges[prim]);
        } else {
            bvh.assign_uniform_range(weight_bounds(weights.iter().copied(), clamp));
        }
        log::debug!("particle: {} particles, {} bvh nodes", weights.len(), bvh.nodes().len());

        let bounds = bvh.bounds();
        let value_range = bvh.nodes().first().map(|n| n.value_range).unwrap_or_else(|| Range1f::point(0.0));
        let nominal_step = params.radii.iter().copied().fold(Float::MAX, Float::min);
        let native = NativeVolume::Particle(ParticleNative {
            positions: params.positions.clone(),
            radii: params.radii.clone(),
            weights,
            radius_support_factor: support,
            clamp_max_cumulative_value: clamp,
            bvh,
        });
        self.state = Some(VolumeState::new(bounds, value_range, nominal_step, native));
        Ok(())
    }
}

impl Volume for ParticleVolume {
    fn type_name(&self) -> &'static str {
        "particle"
    }

    fn state(&self) -> Option<&VolumeState> {
        self.state.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::context::Context;
    use crate::core::error::VklError;

    fn cloud() -> ParticleParams {
        ParticleParams {
            positions: vec![
                Vector3f::new(0.0, 0.0, 0.0),
                Vector3f::new(1.0, 0.0, 0.0),
                Vector3f::new(10.0, 0.0, 0.0),
            ],
            radii: vec![1.0, 0.5, 1.0],
            weights: Some(vec![1.0, 2.0, -1.0]),
            ..Default::default()
        }
    }

    #[test]
    fn bounds_follow_support() {
        let volume = ParticleVolume::committed(cloud()).unwrap();
        let b = volume.bounding_box().unwrap();
        assert_eq!(b.p_min, Vector3f::new(-3.0, -3.0, -3.0));
        assert_eq!(b.p_max, Vector3f::new(13.0, 3.0, 3.0));
        let r = volume.value_range().unwrap();
        assert!(r.contains(-1.0) && r.contains(3.0) && r.contains(0.0));
    }

    #[test]
    fn clamp_caps_the_value_range() {
        let mut params = cloud();
        params.clamp_max_cumulative_value = 1.5;
        let volume = ParticleVolume::committed(params).unwrap();
        assert!(volume.value_range().unwrap().upper <= 1.5);
        let ctx = Context::default();
        let sampler = ctx.new_sampler(&volume).unwrap();
        assert!((sampler.compute_sample(&Vector3f::new(1.0, 0.0, 0.0)) - 1.5).abs() < 1e-6);
    }

    #[test]
    fn uniform_ranges_when_not_estimated() {
        let mut params = cloud();
        params.estimate_value_ranges = false;
        let volume = ParticleVolume::committed(params).unwrap();
        let r = volume.value_range().unwrap();
        assert_eq!(r, Range1f::new(-1.0, 3.0));
    }

    #[test]
    fn rejects_mismatched_arrays() {
        let mut params = cloud();
        params.radii.pop();
        assert!(matches!(ParticleVolume::committed(params), Err(VklError::Configuration(_))));

        let mut params = cloud();
        params.weights = Some(vec![1.0]);
        assert!(matches!(ParticleVolume::committed(params), Err(VklError::Configuration(_))));

        let mut params = cloud();
        params.radii[0] = 0.0;
        assert!(matches!(ParticleVolume::committed(params), Err(VklError::Configuration(_))));

        assert!(matches!(ParticleVolume::committed(ParticleParams::default()), Err(VklError::Configuration(_))));
    }

    #[test]
    fn samples_stay_inside_value_range() {
        let volume = ParticleVolume::committed(cloud()).unwrap();
        let ctx = Context::default();
        let sampler = ctx.new_sampler(&volume).unwrap();
        let range = volume.value_range().unwrap();
        for i in 0..300 {
            let x = -3.0 + 16.0 * (i as Float) / 299.0;
            let s = sampler.compute_sample(&Vector3f::new(x, 0.3, -0.2));
            assert!(s >= range.lower - 1e-6 && s <= range.upper + 1e-6);
        }
    }
}
