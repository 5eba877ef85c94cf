// Copyright @yucwang 2026

use super::trilinear;
use crate::core::error::{Result, VklError};
use crate::core::native::{AmrBlock, AmrMethod, AmrNative};
use crate::math::constants::{Float, Vector3f};

/// Finest block covering the AMR-space point `q`.
fn finest_block(volume: &AmrNative, q: &Vector3f) -> Option<usize> {
    let p = volume.grid_origin + q.component_mul(&volume.grid_spacing);
    let leaf = volume.tree.locate(&p)?;
    volume.tree.leaf_blocks(leaf).last().copied()
}

#[inline]
fn cell(volume: &AmrNative, block: &AmrBlock, ci: [i64; 3]) -> Float {
    let dims = block.dims();
    let mut idx = [0usize; 3];
    for axis in 0..3 {
        idx[axis] = ci[axis].max(0).min(dims[axis] as i64 - 1) as usize;
    }
    volume.voxels[block.offset + (idx[2] * dims[1] + idx[1]) * dims[0] + idx[0]]
}

/// Cell of `block` containing the AMR-space point `q`, clamped to the block.
fn cell_at(volume: &AmrNative, block: &AmrBlock, q: &Vector3f) -> Float {
    let cw = block.cell_width;
    let ci = [
        (q.x / cw).floor() as i64 - block.lower.x as i64,
        (q.y / cw).floor() as i64 - block.lower.y as i64,
        (q.z / cw).floor() as i64 - block.lower.z as i64,
    ];
    cell(volume, block, ci)
}

/// Mean of the cells of a finer `block` whose centres fall inside the cube
/// `[lo, lo + width)`.
fn restricted(volume: &AmrNative, block: &AmrBlock, lo: &Vector3f, width: Float) -> Option<Float> {
    let cw = block.cell_width;
    let dims = block.dims();
    let mut range = [(0i64, 0i64); 3];
    for axis in 0..3 {
        let first = (lo[axis] / cw - 0.5).ceil() as i64 - block.lower[axis] as i64;
        let last = ((lo[axis] + width) / cw - 0.5).ceil() as i64 - 1 - block.lower[axis] as i64;
        let first = first.max(0);
        let last = last.min(dims[axis] as i64 - 1);
        if last < first {
            return None;
        }
        range[axis] = (first, last);
    }

    let mut sum = 0.0;
    let mut count = 0usize;
    for z in range[2].0..=range[2].1 {
        for y in range[1].0..=range[1].1 {
            for x in range[0].0..=range[0].1 {
                sum += cell(volume, block, [x, y, z]);
                count += 1;
            }
        }
    }
    Some(sum / count as Float)
}

fn sample_current(volume: &AmrNative, block: &AmrBlock, q: &Vector3f) -> Float {
    let cw = block.cell_width;
    let mut base = [0i64; 3];
    let mut t = Vector3f::zeros();
    for axis in 0..3 {
        let u = q[axis] / cw - block.lower[axis] as Float - 0.5;
        let i0 = u.floor();
        base[axis] = i0 as i64;
        t[axis] = u - i0;
    }

    let mut c = [[[0.0; 2]; 2]; 2];
    for dz in 0..2 {
        for dy in 0..2 {
            for dx in 0..2 {
                c[dz][dy][dx] = cell(
                    volume,
                    block,
                    [base[0] + dx as i64, base[1] + dy as i64, base[2] + dz as i64],
                );
            }
        }
    }
    trilinear(&c, &t)
}

fn sample_lattice(volume: &AmrNative, home: usize, q: &Vector3f, octant: bool) -> Float {
    let cw = volume.blocks[home].cell_width;
    let mut base = [0i64; 3];
    let mut t = Vector3f::zeros();
    for axis in 0..3 {
        let u = q[axis] / cw - 0.5;
        let i0 = u.floor();
        base[axis] = i0 as i64;
        t[axis] = u - i0;
    }

    let mut c = [[[0.0; 2]; 2]; 2];
    for dz in 0..2 {
        for dy in 0..2 {
            for dx in 0..2 {
                let corner = [base[0] + dx as i64, base[1] + dy as i64, base[2] + dz as i64];
                let centre = Vector3f::new(
                    (corner[0] as Float + 0.5) * cw,
                    (corner[1] as Float + 0.5) * cw,
                    (corner[2] as Float + 0.5) * cw,
                );
                let owner = finest_block(volume, &centre).unwrap_or(home);
                let block = &volume.blocks[owner];
                let value = if octant && block.cell_width < cw {
                    let lo = Vector3f::new(corner[0] as Float * cw, corner[1] as Float * cw, corner[2] as Float * cw);
                    restricted(volume, block, &lo, cw).unwrap_or_else(|| cell_at(volume, block, &centre))
                } else {
                    cell_at(volume, block, &centre)
                };
                c[dz][dy][dx] = value;
            }
        }
    }
    trilinear(&c, &t)
}

pub fn sample(volume: &AmrNative, p: &Vector3f) -> Float {
    let q = volume.to_amr_space(p);
    let home = match finest_block(volume, &q) {
        Some(b) => b,
        None => return 0.0,
    };
    match volume.method {
        AmrMethod::Current => sample_current(volume, &volume.blocks[home], &q),
        AmrMethod::Finest => sample_lattice(volume, home, &q, false),
        AmrMethod::Octant => sample_lattice(volume, home, &q, true),
    }
}

pub fn gradient(_volume: &AmrNative, _p: &Vector3f) -> Result<Vector3f> {
    Err(VklError::NotImplemented("gradient evaluation for amr volumes".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accel::kdtree::{KdBlock, KdTree};
    use crate::math::constants::Vector3i;

    // Coarse 4^3 block (cw 1) of value 1, refined 2^3 corner (cw 0.5) of value 3.
    fn volume(method: AmrMethod) -> AmrNative {
        let blocks = vec![
            AmrBlock { lower: Vector3i::new(0, 0, 0), upper: Vector3i::new(3, 3, 3), level: 0, cell_width: 1.0, offset: 0 },
            AmrBlock { lower: Vector3i::new(0, 0, 0), upper: Vector3i::new(1, 1, 1), level: 1, cell_width: 0.5, offset: 64 },
        ];
        let mut voxels = vec![1.0; 64];
        voxels.extend(vec![3.0; 8]);
        let kd = blocks
            .iter()
            .map(|b| KdBlock { bounds: b.amr_bounds(), level: b.level, cell_width: b.cell_width })
            .collect();
        AmrNative {
            blocks,
            voxels,
            method,
            grid_origin: Vector3f::zeros(),
            grid_spacing: Vector3f::new(1.0, 1.0, 1.0),
            tree: KdTree::build(kd),
        }
    }

    #[test]
    fn current_reads_the_finest_block_only() {
        let v = volume(AmrMethod::Current);
        assert!((sample(&v, &Vector3f::new(0.9, 0.5, 0.5)) - 3.0).abs() < 1e-6);
        assert!((sample(&v, &Vector3f::new(2.5, 2.5, 2.5)) - 1.0).abs() < 1e-6);
        assert_eq!(sample(&v, &Vector3f::new(4.5, 0.5, 0.5)), 0.0);
    }

    #[test]
    fn finest_blends_across_levels() {
        let v = volume(AmrMethod::Finest);
        // Home cell width is 1: corners at 0.5 (fine) and 1.5 (coarse).
        let s = sample(&v, &Vector3f::new(1.0, 0.5, 0.5));
        assert!((s - 2.0).abs() < 1e-5);
        assert!((sample(&v, &Vector3f::new(2.5, 2.5, 2.5)) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn octant_restricts_fine_data() {
        let v = volume(AmrMethod::Octant);
        // Sampled from the coarse side the fine corner is averaged to width 1.
        let s = sample(&v, &Vector3f::new(1.2, 0.5, 0.5));
        assert!((s - 1.0 - 2.0 * 0.3).abs() < 1e-5);
        assert!(gradient(&v, &Vector3f::zeros()).is_err());
    }
}
