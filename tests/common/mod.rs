//! Common test utilities for tracto-core integration tests

#![allow(dead_code)]

use std::f64::consts::PI;

use glam::DVec3;
use tracto_core::field::{CoefficientSource, ShImage};
use tracto_core::sh;

/// Coefficients of a direction-independent amplitude
pub fn isotropic_coefs(amplitude: f64, lmax: usize) -> Vec<f64> {
    let mut coefs = vec![0.0; sh::n_for_l(lmax)];
    coefs[0] = amplitude * (4.0 * PI).sqrt();
    coefs
}

/// Coefficients of `a + b * P2(d · axis)`
pub fn p2_coefs(a: f64, b: f64, axis: DVec3) -> Vec<f64> {
    let mut y = vec![0.0; sh::n_for_l(2)];
    sh::basis(axis.normalize(), 2, &mut y);
    let mut coefs: Vec<f64> = y.iter().map(|v| b * (4.0 * PI / 5.0) * v).collect();
    coefs[0] = a * (4.0 * PI).sqrt();
    coefs
}

/// Same coefficients at every position
pub struct UniformField {
    pub coefs: Vec<f64>,
}

impl CoefficientSource for UniformField {
    fn num_coefficients(&self) -> usize {
        self.coefs.len()
    }

    fn coefficients_at(&self, _position: DVec3, out: &mut [f64]) -> bool {
        out.copy_from_slice(&self.coefs);
        true
    }
}

/// Image that is zero everywhere except one voxel holding `coefs`
///
/// Returned as Fortran-ordered 4D data for use with `ShImage` or NIfTI I/O.
pub fn single_voxel_data(
    dims: (usize, usize, usize),
    voxel: (usize, usize, usize),
    coefs: &[f64],
) -> Vec<f64> {
    let (nx, ny, nz) = dims;
    let n = nx * ny * nz;
    let idx = voxel.0 + voxel.1 * nx + voxel.2 * nx * ny;
    let mut data = vec![0.0; n * coefs.len()];
    for (c, &v) in coefs.iter().enumerate() {
        data[c * n + idx] = v;
    }
    data
}

/// Image holding the same coefficients in every voxel
pub fn uniform_image(dims: (usize, usize, usize), coefs: &[f64]) -> ShImage {
    let n = dims.0 * dims.1 * dims.2;
    let mut data = vec![0.0; n * coefs.len()];
    for (c, &v) in coefs.iter().enumerate() {
        data[c * n..(c + 1) * n].fill(v);
    }
    ShImage::from_voxel_grid(&data, dims, coefs.len()).unwrap()
}

/// `E[u^k]` for `u` uniform on `[lo, 1]`
pub fn uniform_moment(lo: f64, k: i32) -> f64 {
    (1.0 - lo.powi(k + 1)) / ((k + 1) as f64 * (1.0 - lo))
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}
