//! SH coefficient image with trilinear interpolation
//!
//! Positions are in scanner coordinates (mm) and mapped to voxel space through
//! the inverse of the image affine. Voxel centres sit at integer voxel
//! coordinates; the sampled domain extends half a voxel beyond the outer
//! centres, where values are clamped to the edge voxels.

use glam::{DAffine3, DMat4, DVec3};

use super::CoefficientSource;
use crate::error::{Result, TrackError};
use crate::nifti_io::NiftiData;

/// 4D image of SH coefficients
pub struct ShImage {
    /// Coefficients stored voxel-major: `values[voxel * n + c]`
    values: Vec<f64>,
    dims: (usize, usize, usize),
    num_coefficients: usize,
    voxel_to_scanner: DAffine3,
    scanner_to_voxel: DAffine3,
}

impl ShImage {
    /// Build from Fortran-ordered 4D data
    ///
    /// # Arguments
    /// * `data` - Volume data, index = x + y*nx + z*nx*ny + c*nx*ny*nz
    /// * `dims` - Spatial dimensions (nx, ny, nz)
    /// * `num_coefficients` - Number of volumes (SH coefficients)
    /// * `affine` - Voxel-to-scanner transform (4x4, row-major)
    pub fn new(
        data: &[f64],
        dims: (usize, usize, usize),
        num_coefficients: usize,
        affine: &[f64; 16],
    ) -> Result<Self> {
        let (nx, ny, nz) = dims;
        let n_voxels = nx * ny * nz;
        if n_voxels == 0 || num_coefficients == 0 {
            return Err(TrackError::Image(format!(
                "Empty SH image: dims {:?}, {} coefficients",
                dims, num_coefficients
            )));
        }
        if data.len() != n_voxels * num_coefficients {
            return Err(TrackError::Image(format!(
                "SH image data has {} values, expected {} ({}x{}x{}x{})",
                data.len(),
                n_voxels * num_coefficients,
                nx, ny, nz, num_coefficients
            )));
        }

        let matrix = DMat4::from_cols_array(affine).transpose();
        let voxel_to_scanner = DAffine3::from_mat4(matrix);
        if voxel_to_scanner.matrix3.determinant().abs() < 1e-12 {
            return Err(TrackError::Image("Image affine is singular".to_string()));
        }
        let scanner_to_voxel = voxel_to_scanner.inverse();

        let mut values = vec![0.0; n_voxels * num_coefficients];
        for c in 0..num_coefficients {
            let volume = &data[c * n_voxels..(c + 1) * n_voxels];
            for (voxel, &v) in volume.iter().enumerate() {
                values[voxel * num_coefficients + c] = v;
            }
        }

        Ok(Self {
            values,
            dims,
            num_coefficients,
            voxel_to_scanner,
            scanner_to_voxel,
        })
    }

    /// Build with voxel coordinates as scanner coordinates
    pub fn from_voxel_grid(
        data: &[f64],
        dims: (usize, usize, usize),
        num_coefficients: usize,
    ) -> Result<Self> {
        let identity = [
            1.0, 0.0, 0.0, 0.0,
            0.0, 1.0, 0.0, 0.0,
            0.0, 0.0, 1.0, 0.0,
            0.0, 0.0, 0.0, 1.0,
        ];
        Self::new(data, dims, num_coefficients, &identity)
    }

    /// Build from a loaded 4D NIfTI image
    pub fn from_nifti(nifti: &NiftiData) -> Result<Self> {
        Self::new(&nifti.data, nifti.dims, nifti.volumes, &nifti.affine)
    }

    pub fn dims(&self) -> (usize, usize, usize) {
        self.dims
    }

    pub fn voxel_to_scanner(&self) -> DAffine3 {
        self.voxel_to_scanner
    }

    /// Scanner position of the centre of voxel `(i, j, k)`
    pub fn voxel_centre(&self, i: usize, j: usize, k: usize) -> DVec3 {
        self.voxel_to_scanner
            .transform_point3(DVec3::new(i as f64, j as f64, k as f64))
    }
}

/// Lower index, upper index and upper weight along one axis
#[inline]
fn axis_weights(v: f64, n: usize) -> Option<(usize, usize, f64)> {
    if !(v >= -0.5 && v <= n as f64 - 0.5) {
        return None;
    }
    let fl = v.floor();
    if fl < 0.0 {
        return Some((0, 0, 0.0));
    }
    let i0 = fl as usize;
    if i0 + 1 >= n {
        return Some((n - 1, n - 1, 0.0));
    }
    Some((i0, i0 + 1, v - fl))
}

impl CoefficientSource for ShImage {
    fn num_coefficients(&self) -> usize {
        self.num_coefficients
    }

    fn coefficients_at(&self, position: DVec3, out: &mut [f64]) -> bool {
        let (nx, ny, nz) = self.dims;
        let v = self.scanner_to_voxel.transform_point3(position);

        let Some((x0, x1, fx)) = axis_weights(v.x, nx) else { return false };
        let Some((y0, y1, fy)) = axis_weights(v.y, ny) else { return false };
        let Some((z0, z1, fz)) = axis_weights(v.z, nz) else { return false };

        let n = self.num_coefficients;
        out[..n].fill(0.0);

        for (k, wz) in [(z0, 1.0 - fz), (z1, fz)] {
            if wz == 0.0 {
                continue;
            }
            for (j, wy) in [(y0, 1.0 - fy), (y1, fy)] {
                if wy == 0.0 {
                    continue;
                }
                for (i, wx) in [(x0, 1.0 - fx), (x1, fx)] {
                    let w = wx * wy * wz;
                    if w == 0.0 {
                        continue;
                    }
                    let voxel = i + j * nx + k * nx * ny;
                    let src = &self.values[voxel * n..(voxel + 1) * n];
                    for (o, &s) in out[..n].iter_mut().zip(src) {
                        *o += w * s;
                    }
                }
            }
        }

        !out[0].is_nan()
    }
}
