//! Out-of-bounds marker replacement for warp images
//!
//! Registration packages often mark voxels whose deformation points outside
//! the target with a fixed vector, typically (0, 0, 0). This replaces every
//! voxel carrying the marker with (NaN, NaN, NaN) so downstream sampling
//! treats it as undefined.

use std::path::Path;

use glam::DVec3;
use log::{info, warn};
use rayon::prelude::*;

use crate::error::{Result, TrackError};
use crate::nifti_io::{read_nifti_file, save_nifti_to_file};

/// Default match tolerance, single-precision dummy precision
pub const DEFAULT_TOLERANCE: f64 = 1e-5;

/// Corrected warp data and the number of voxels replaced
#[derive(Clone, Debug)]
pub struct WarpCorrection {
    /// Fortran-ordered 3-volume data
    pub data: Vec<f64>,
    pub replaced: usize,
}

/// Build a marker from one value (used for all components) or three
pub fn parse_marker(values: &[f64]) -> Result<DVec3> {
    match values {
        [v] => Ok(DVec3::splat(*v)),
        [x, y, z] => Ok(DVec3::new(*x, *y, *z)),
        _ => Err(TrackError::config(
            "marker",
            format!("requires either a single value or 3 values, got {}", values.len()),
        )),
    }
}

/// Absolute Euclidean match: `|marker - v| <= tolerance`
///
/// Not a relative test scaled by the marker's magnitude, so large markers
/// need a tolerance in the same units as the warp. A NaN marker matches
/// voxels with any NaN component.
fn matches_marker(v: DVec3, marker: DVec3, tolerance: f64) -> bool {
    if marker.is_nan() {
        return v.is_nan();
    }
    (marker - v).length() <= tolerance
}

/// Replace marker voxels in a 3-component warp with NaN
///
/// # Arguments
/// * `data` - Warp data, index = x + y*nx + z*nx*ny + c*nx*ny*nz with 3 volumes
/// * `dims` - Spatial dimensions (nx, ny, nz)
/// * `marker` - Out-of-bounds vector to look for
/// * `tolerance` - Largest Euclidean distance still counted as a match
pub fn correct_warp(
    data: &[f64],
    dims: (usize, usize, usize),
    marker: DVec3,
    tolerance: f64,
) -> Result<WarpCorrection> {
    let n = dims.0 * dims.1 * dims.2;
    if data.len() != 3 * n {
        return Err(TrackError::Image(format!(
            "Warp image must have 3 volumes: {} values for {} voxels",
            data.len(),
            n
        )));
    }

    let hits: Vec<bool> = (0..n)
        .into_par_iter()
        .map(|i| matches_marker(DVec3::new(data[i], data[n + i], data[2 * n + i]), marker, tolerance))
        .collect();
    let replaced = hits.iter().filter(|&&h| h).count();

    let mut out = data.to_vec();
    out.par_chunks_mut(n).for_each(|volume| {
        for (v, &hit) in volume.iter_mut().zip(&hits) {
            if hit {
                *v = f64::NAN;
            }
        }
    });

    if replaced == 0 {
        warn!(
            "no out of bounds voxels found with value ({},{},{})",
            marker.x, marker.y, marker.z
        );
    }
    info!("converted {} out of bounds values", replaced);

    Ok(WarpCorrection { data: out, replaced })
}

/// Read a warp image, correct it and write the result
///
/// Returns the number of voxels replaced.
pub fn correct_warp_file(
    input: &Path,
    output: &Path,
    marker: DVec3,
    tolerance: f64,
) -> Result<usize> {
    let warp = read_nifti_file(input)?;
    if warp.volumes != 3 {
        return Err(TrackError::Image(format!(
            "Expected a 4D warp with 3 volumes, got {}",
            warp.volumes
        )));
    }

    let corrected = correct_warp(&warp.data, warp.dims, marker, tolerance)?;
    save_nifti_to_file(
        output,
        &corrected.data,
        warp.dims,
        warp.volumes,
        warp.voxel_size,
        &warp.affine,
    )?;
    Ok(corrected.replaced)
}
