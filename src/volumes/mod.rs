// Copyright @yucwang 2026

pub mod amr;
pub mod particle;
pub mod structured;
pub mod vdb;

use crate::core::error::{config_error, Result};
use crate::math::constants::{Float, Vector3f};

pub(crate) fn check_spacing(name: &str, spacing: &Vector3f) -> Result<()> {
    if spacing.iter().any(|s| !(*s > 0.0) || !s.is_finite()) {
        return config_error(format!("{} must be positive, got {:?}", name, spacing.as_slice()));
    }
    Ok(())
}

pub(crate) fn min_component(v: &Vector3f) -> Float {
    v.x.min(v.y).min(v.z)
}
