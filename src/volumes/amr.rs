// Copyright @yucwang 2026

use super::{check_spacing, min_component};
use crate::accel::kdtree::{KdBlock, KdTree};
use crate::core::data::Data;
use crate::core::error::{config_error, Result};
use crate::core::native::{AmrBlock, AmrMethod, AmrNative, NativeVolume};
use crate::core::volume::{Volume, VolumeState};
use crate::math::aabb::AABB;
use crate::math::constants::{Float, Vector3f, Vector3i};
use crate::math::range::Range1f;

/// Commit parameters of an adaptive mesh refinement volume.
///
/// Blocks are given as parallel arrays. `block_bounds` holds inclusive cell
/// index bounds at the block's own refinement level, and the cell width of
/// a block is `cell_width[refinement_level[block]]`. Block data is
/// cell-centred, x fastest, and must be compact.
#[derive(Clone, Debug)]
pub struct AmrParams {
    pub block_bounds: Vec<(Vector3i, Vector3i)>,
    pub refinement_level: Vec<usize>,
    pub cell_width: Vec<Float>,
    pub block_data: Vec<Data>,
    pub method: AmrMethod,
    pub grid_origin: Vector3f,
    pub grid_spacing: Vector3f,
}

impl Default for AmrParams {
    fn default() -> Self {
        Self {
            block_bounds: Vec::new(),
            refinement_level: Vec::new(),
            cell_width: Vec::new(),
            block_data: Vec::new(),
            method: AmrMethod::Current,
            grid_origin: Vector3f::zeros(),
            grid_spacing: Vector3f::new(1.0, 1.0, 1.0),
        }
    }
}

#[derive(Default)]
pub struct AmrVolume {
    params: AmrParams,
    state: Option<VolumeState>,
}

/// Range of the cells of `block` overlapping the AMR-space `region`.
fn block_cells_range(block: &AmrBlock, voxels: &[Float], region: &AABB) -> Range1f {
    let mut out = Range1f::empty();
    let cw = block.cell_width;
    let dims = block.dims();
    let mut first = [0usize; 3];
    let mut last = [0usize; 3];
    for axis in 0..3 {
        let lo = (region.p_min[axis] / cw).floor() as i64 - block.lower[axis] as i64;
        let hi = (region.p_max[axis] / cw).ceil() as i64 - 1 - block.lower[axis] as i64;
        let lo = lo.max(0);
        let hi = hi.min(dims[axis] as i64 - 1);
        if hi < lo {
            return out;
        }
        first[axis] = lo as usize;
        last[axis] = hi as usize;
    }
    for z in first[2]..=last[2] {
        for y in first[1]..=last[1] {
            let row = block.offset + (z * dims[1] + y) * dims[0];
            for x in first[0]..=last[0] {
                out.extend(voxels[row + x]);
            }
        }
    }
    out
}

impl AmrVolume {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn committed(params: AmrParams) -> Result<Self> {
        let mut volume = Self { params, state: None };
        volume.commit()?;
        Ok(volume)
    }

    pub fn params(&self) -> &AmrParams {
        &self.params
    }

    pub fn set_params(&mut self, params: AmrParams) {
        self.params = params;
    }

    fn build_blocks(&self) -> Result<(Vec<AmrBlock>, Vec<Float>)> {
        let params = &self.params;
        let count = params.block_bounds.len();
        if count == 0 {
            return config_error("amr volume needs at least one block");
        }
        if params.refinement_level.len() != count || params.block_data.len() != count {
            return config_error(format!(
                "amr arrays disagree: {} block bounds, {} refinement levels, {} data arrays",
                count,
                params.refinement_level.len(),
                params.block_data.len()
            ));
        }

        let data_type = params.block_data[0].data_type();
        if !data_type.is_voxel_type() {
            return config_error(format!("unsupported amr voxel type {:?}", data_type));
        }

        let mut blocks = Vec::with_capacity(count);
        let mut voxels = Vec::new();
        for (i, (&(lower, upper), data)) in params.block_bounds.iter().zip(&params.block_data).enumerate() {
            if data.data_type() != data_type {
                return config_error(format!(
                    "amr block {} has element type {:?}, expected {:?}",
                    i,
                    data.data_type(),
                    data_type
                ));
            }
            if !data.is_compact() {
                return config_error(format!("amr block {} data must be compact", i));
            }
            if (0..3).any(|axis| upper[axis] < lower[axis]) {
                return config_error(format!("amr block {} has inverted bounds", i));
            }
            let level = params.refinement_level[i];
            let cell_width = match params.cell_width.get(level) {
                Some(&cw) if cw > 0.0 && cw.is_finite() => cw,
                Some(&cw) => return config_error(format!("cell width {} of level {} must be positive", cw, level)),
                None => return config_error(format!("no cell width for refinement level {}", level)),
            };

            let block = AmrBlock { lower, upper, level, cell_width, offset: voxels.len() };
            let expected = match block.cell_count() {
                Some(n) => n,
                None => return config_error(format!("amr block {} has too many cells: {:?}", i, block.dims())),
            };
            if data.len() != expected {
                return config_error(format!("amr block {} expects {} cells, got {}", i, expected, data.len()));
            }
            voxels.extend(data.to_f32_vec());
            blocks.push(block);
        }
        Ok((blocks, voxels))
    }

    pub fn commit(&mut self) -> Result<()> {
        self.state = None;
        check_spacing("gridSpacing", &self.params.grid_spacing)?;
        let (blocks, voxels) = self.build_blocks()?;

        let origin = self.params.grid_origin;
        let spacing = self.params.grid_spacing;
        let min_spacing = min_component(&spacing);
        let kd_blocks = blocks
            .iter()
            .map(|b| {
                let amr = b.amr_bounds();
                KdBlock {
                    bounds: AABB::new(
                        origin + amr.p_min.component_mul(&spacing),
                        origin + amr.p_max.component_mul(&spacing),
                    ),
                    level: b.level,
                    cell_width: b.cell_width * min_spacing,
                }
            })
            .collect();
        let mut tree = KdTree::build(kd_blocks);

        let coarsest = blocks.iter().map(|b| b.cell_width).fold(0.0, Float::max);
        {
            let blocks = &blocks;
            let voxels = &voxels;
            // Interpolation reaches up to one coarse cell past a leaf.
            let margin = Vector3f::repeat(2.0 * coarsest);
            tree.assign_ranges(|bounds, _| {
                let region = AABB::new(
                    (bounds.p_min - origin).component_div(&spacing) - margin,
                    (bounds.p_max - origin).component_div(&spacing) + margin,
                );
                let mut range = Range1f::empty();
                for block in blocks.iter().filter(|b| b.amr_bounds().overlaps(&region)) {
                    range.extend_range(&block_cells_range(block, voxels, &region));
                }
                range
            });
        }
        log::debug!("amr: {} blocks, {} k-d leaves", blocks.len(), tree.leaves().len());

        let bounds = tree.bounds();
        let value_range = tree.nodes().first().map(|n| n.value_range).unwrap_or_else(|| Range1f::point(0.0));
        let nominal_step = 0.1 * coarsest * min_spacing;
        let native = NativeVolume::Amr(AmrNative {
            blocks,
            voxels,
            method: self.params.method,
            grid_origin: origin,
            grid_spacing: spacing,
            tree,
        });
        self.state = Some(VolumeState::new(bounds, value_range, nominal_step, native));
        Ok(())
    }
}

impl Volume for AmrVolume {
    fn type_name(&self) -> &'static str {
        "amr"
    }

    fn state(&self) -> Option<&VolumeState> {
        self.state.as_ref()
    }
}
