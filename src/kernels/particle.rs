// Copyright @yucwang 2026

use crate::core::native::ParticleNative;
use crate::math::aabb::AABB;
use crate::math::constants::{Float, Vector3f};

/// Visits every particle whose support contains `p` with its offset and
/// kernel value.
fn for_each_contribution<F>(volume: &ParticleNative, p: &Vector3f, mut f: F)
where
    F: FnMut(usize, &Vector3f, Float),
{
    let mut candidates = Vec::new();
    volume.bvh.overlapping(&AABB::new(*p, *p), &mut candidates);
    for id in candidates {
        let r = volume.radii[id];
        let d = p - volume.positions[id];
        let support = r * volume.radius_support_factor;
        let dist2 = d.norm_squared();
        if dist2 > support * support {
            continue;
        }
        let kernel = (-0.5 * dist2 / (r * r)).exp();
        f(id, &d, kernel);
    }
}

/// Sum of Gaussian radial basis functions, optionally clamped.
pub fn sample(volume: &ParticleNative, p: &Vector3f) -> Float {
    let mut value = 0.0;
    for_each_contribution(volume, p, |id, _, kernel| {
        value += volume.weights[id] * kernel;
    });
    if volume.clamp_max_cumulative_value > 0.0 {
        value = value.min(volume.clamp_max_cumulative_value);
    }
    value
}

/// Analytic gradient; zero wherever the clamp is active.
pub fn gradient(volume: &ParticleNative, p: &Vector3f) -> Vector3f {
    let mut value = 0.0;
    let mut grad = Vector3f::zeros();
    for_each_contribution(volume, p, |id, d, kernel| {
        let r = volume.radii[id];
        let w = volume.weights[id] * kernel;
        value += w;
        grad -= d * (w / (r * r));
    });
    if volume.clamp_max_cumulative_value > 0.0 && value > volume.clamp_max_cumulative_value {
        return Vector3f::zeros();
    }
    grad
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accel::bvh::Bvh;

    fn particles(positions: Vec<Vector3f>, weights: Vec<Float>, clamp: Float) -> ParticleNative {
        let radii = vec![1.0; positions.len()];
        let support = 3.0;
        let bounds = positions.iter().map(|p| AABB::around(*p, support)).collect();
        let bvh = Bvh::build(bounds, radii.clone());
        ParticleNative {
            positions,
            radii,
            weights,
            radius_support_factor: support,
            clamp_max_cumulative_value: clamp,
            bvh,
        }
    }

    #[test]
    fn peak_and_cutoff() {
        let volume = particles(vec![Vector3f::zeros()], vec![1.0], 0.0);
        assert!((sample(&volume, &Vector3f::zeros()) - 1.0).abs() < 1e-6);
        let one = sample(&volume, &Vector3f::new(1.0, 0.0, 0.0));
        assert!((one - (-0.5f32).exp()).abs() < 1e-6);
        assert_eq!(sample(&volume, &Vector3f::new(3.01, 0.0, 0.0)), 0.0);
    }

    #[test]
    fn clamp_limits_sum_and_flattens_gradient() {
        let volume = particles(vec![Vector3f::zeros(), Vector3f::new(0.1, 0.0, 0.0)], vec![1.0, 1.0], 1.5);
        assert!((sample(&volume, &Vector3f::new(0.05, 0.0, 0.0)) - 1.5).abs() < 1e-6);
        assert_eq!(gradient(&volume, &Vector3f::new(0.05, 0.0, 0.0)), Vector3f::zeros());
    }

    #[test]
    fn gradient_matches_finite_difference() {
        let volume = particles(vec![Vector3f::zeros(), Vector3f::new(1.0, 0.5, 0.0)], vec![1.0, -0.5], 0.0);
        let p = Vector3f::new(0.3, 0.2, -0.4);
        let g = gradient(&volume, &p);
        let h = 1e-2;
        for axis in 0..3 {
            let mut e = Vector3f::zeros();
            e[axis] = h;
            let fd = (sample(&volume, &(p + e)) - sample(&volume, &(p - e))) / (2.0 * h);
            assert!((fd - g[axis]).abs() < 1e-3);
        }
    }
}
