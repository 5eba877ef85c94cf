// Copyright @yucwang 2026

use crate::core::error::Result;
use crate::core::native::NativeVolume;
use crate::math::constants::Float;

/// Numeric evaluation backend.
///
/// All slices of one call have the same length, the lane count; `x`, `y`,
/// `z` and the outputs are structure-of-arrays lane buffers. Lanes whose
/// `valid` entry is 0 must be left untouched in every output slice.
pub trait KernelBackend: Send + Sync {
    fn name(&self) -> &str;

    fn sample(
        &self,
        valid: &[i32],
        volume: &NativeVolume,
        x: &[Float],
        y: &[Float],
        z: &[Float],
        out: &mut [Float],
    );

    fn gradient(
        &self,
        valid: &[i32],
        volume: &NativeVolume,
        x: &[Float],
        y: &[Float],
        z: &[Float],
        gx: &mut [Float],
        gy: &mut [Float],
        gz: &mut [Float],
    ) -> Result<()>;
}
