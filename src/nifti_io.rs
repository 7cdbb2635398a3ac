//! NIfTI image I/O
//!
//! Loads and saves 3D and 4D NIfTI images from/to byte buffers and files.
//! 4D images hold SH coefficient volumes (fibre orientation distributions)
//! or 3-component warp fields. Data is kept in Fortran order:
//! index = x + y*nx + z*nx*ny + t*nx*ny*nz.

use std::io::{Cursor, Write};
use std::path::Path;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use ndarray::{Array, IxDyn};
use nifti::volume::ndarray::IntoNdArray;
use nifti::{InMemNiftiObject, NiftiHeader, NiftiObject};

/// NIfTI data loaded from bytes
pub struct NiftiData {
    /// Volume data as f64, Fortran order, volumes concatenated
    pub data: Vec<f64>,
    /// Spatial dimensions (nx, ny, nz)
    pub dims: (usize, usize, usize),
    /// Number of volumes along the 4th axis (1 for 3D images)
    pub volumes: usize,
    /// Voxel sizes in mm
    pub voxel_size: (f64, f64, f64),
    /// Affine transformation matrix (4x4, row-major)
    pub affine: [f64; 16],
    /// Data scaling slope
    pub scl_slope: f64,
    /// Data scaling intercept
    pub scl_inter: f64,
}

impl NiftiData {
    /// Number of voxels in one volume
    pub fn voxels(&self) -> usize {
        self.dims.0 * self.dims.1 * self.dims.2
    }

    /// Slice of volume `t`
    pub fn volume(&self, t: usize) -> &[f64] {
        let n = self.voxels();
        &self.data[t * n..(t + 1) * n]
    }
}

/// Check if bytes are gzip compressed
fn is_gzip(bytes: &[u8]) -> bool {
    bytes.len() >= 2 && bytes[0] == 0x1f && bytes[1] == 0x8b
}

/// Get header info for diagnostics
fn get_header_info(bytes: &[u8]) -> String {
    if bytes.len() < 348 {
        return format!("File too small ({} bytes, need at least 348)", bytes.len());
    }

    let sizeof_hdr = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    let magic = String::from_utf8_lossy(&bytes[344..348]).to_string();
    let datatype = i16::from_le_bytes([bytes[70], bytes[71]]);

    format!("sizeof_hdr={}, magic='{}', datatype={}", sizeof_hdr, magic, datatype)
}

fn read_object(bytes: &[u8]) -> Result<InMemNiftiObject, String> {
    if is_gzip(bytes) {
        InMemNiftiObject::from_reader(GzDecoder::new(Cursor::new(bytes))).map_err(|e| {
            let mut decompressed = Vec::new();
            let mut decoder = GzDecoder::new(Cursor::new(bytes));
            let info = if std::io::Read::read_to_end(&mut decoder, &mut decompressed).is_ok() {
                get_header_info(&decompressed)
            } else {
                "Could not decompress".to_string()
            };
            format!("Failed to read gzipped NIfTI: {} ({})", e, info)
        })
    } else {
        let info = get_header_info(bytes);
        InMemNiftiObject::from_reader(Cursor::new(bytes))
            .map_err(|e| format!("Failed to read NIfTI: {} ({})", e, info))
    }
}

/// Load a 3D or 4D NIfTI image from bytes
///
/// Supports both .nii and .nii.gz (gzip is auto-detected). Images with more
/// than four dimensions are rejected.
pub fn load_nifti(bytes: &[u8]) -> Result<NiftiData, String> {
    let obj = read_object(bytes)?;
    let header = obj.header();

    let ndim = header.dim[0] as usize;
    if ndim < 3 {
        return Err(format!("Expected at least 3D volume, got {}D", ndim));
    }

    let pixdim = header.pixdim;
    let voxel_size = (pixdim[1] as f64, pixdim[2] as f64, pixdim[3] as f64);
    let scl_slope = if header.scl_slope == 0.0 { 1.0 } else { header.scl_slope as f64 };
    let scl_inter = header.scl_inter as f64;
    let affine = get_affine(header);

    let array: Array<f64, IxDyn> = obj
        .into_volume()
        .into_ndarray()
        .map_err(|e| format!("Failed to convert to ndarray: {}", e))?;

    // Use the actual array shape (nifti-rs may drop trailing unit dims)
    let shape = array.shape().to_vec();
    let (nx, ny, nz, volumes) = match shape.len() {
        3 => (shape[0], shape[1], shape[2], 1),
        4 => (shape[0], shape[1], shape[2], shape[3]),
        n => return Err(format!("Expected a 3D or 4D array, got {}D", n)),
    };

    let mut data = Vec::with_capacity(nx * ny * nz * volumes);
    for t in 0..volumes {
        for k in 0..nz {
            for j in 0..ny {
                for i in 0..nx {
                    let v = if shape.len() == 3 {
                        array[IxDyn(&[i, j, k])]
                    } else {
                        array[IxDyn(&[i, j, k, t])]
                    };
                    data.push(v);
                }
            }
        }
    }

    Ok(NiftiData {
        data,
        dims: (nx, ny, nz),
        volumes,
        voxel_size,
        affine,
        scl_slope,
        scl_inter,
    })
}

/// Get affine transformation matrix from header
fn get_affine(header: &NiftiHeader) -> [f64; 16] {
    // Prefer sform if available (sform_code > 0)
    if header.sform_code > 0 {
        let s = &header.srow_x;
        let t = &header.srow_y;
        let u = &header.srow_z;
        [
            s[0] as f64, s[1] as f64, s[2] as f64, s[3] as f64,
            t[0] as f64, t[1] as f64, t[2] as f64, t[3] as f64,
            u[0] as f64, u[1] as f64, u[2] as f64, u[3] as f64,
            0.0, 0.0, 0.0, 1.0,
        ]
    } else {
        // Fall back to identity with voxel scaling
        let vsx = header.pixdim[1] as f64;
        let vsy = header.pixdim[2] as f64;
        let vsz = header.pixdim[3] as f64;
        [
            vsx, 0.0, 0.0, 0.0,
            0.0, vsy, 0.0, 0.0,
            0.0, 0.0, vsz, 0.0,
            0.0, 0.0, 0.0, 1.0,
        ]
    }
}

/// Save a 3D (`volumes == 1`) or 4D image as uncompressed NIfTI-1 bytes
pub fn save_nifti(
    data: &[f64],
    dims: (usize, usize, usize),
    volumes: usize,
    voxel_size: (f64, f64, f64),
    affine: &[f64; 16],
) -> Result<Vec<u8>, String> {
    let (nx, ny, nz) = dims;
    let (vsx, vsy, vsz) = voxel_size;
    if data.len() != nx * ny * nz * volumes {
        return Err(format!(
            "Data length {} does not match {}x{}x{}x{}",
            data.len(), nx, ny, nz, volumes
        ));
    }

    let mut header = [0u8; 348];

    // sizeof_hdr = 348
    header[0..4].copy_from_slice(&348i32.to_le_bytes());

    let ndim: i16 = if volumes > 1 { 4 } else { 3 };
    let dim: [i16; 8] = [ndim, nx as i16, ny as i16, nz as i16, volumes as i16, 1, 1, 1];
    for (i, &d) in dim.iter().enumerate() {
        let offset = 40 + i * 2;
        header[offset..offset + 2].copy_from_slice(&d.to_le_bytes());
    }

    // datatype = 16 (FLOAT32), bitpix = 32
    header[70..72].copy_from_slice(&16i16.to_le_bytes());
    header[72..74].copy_from_slice(&32i16.to_le_bytes());

    let pixdim: [f32; 8] = [1.0, vsx as f32, vsy as f32, vsz as f32, 1.0, 1.0, 1.0, 1.0];
    for (i, &p) in pixdim.iter().enumerate() {
        let offset = 76 + i * 4;
        header[offset..offset + 4].copy_from_slice(&p.to_le_bytes());
    }

    // vox_offset = 352 (header + 4 bytes extension)
    header[108..112].copy_from_slice(&352.0f32.to_le_bytes());
    // scl_slope = 1.0, scl_inter = 0.0
    header[112..116].copy_from_slice(&1.0f32.to_le_bytes());
    header[116..120].copy_from_slice(&0.0f32.to_le_bytes());

    // sform_code = 1 (scanner anat)
    header[254..256].copy_from_slice(&1i16.to_le_bytes());

    // srow_x, srow_y, srow_z
    for row in 0..3 {
        for i in 0..4 {
            let offset = 280 + row * 16 + i * 4;
            header[offset..offset + 4].copy_from_slice(&(affine[row * 4 + i] as f32).to_le_bytes());
        }
    }

    // magic = "n+1\0" for NIfTI-1 single file
    header[344..348].copy_from_slice(b"n+1\0");

    let mut buffer = Vec::with_capacity(352 + data.len() * 4);
    buffer.write_all(&header).map_err(|e| format!("Write header failed: {}", e))?;
    buffer.write_all(&[0u8; 4]).map_err(|e| format!("Write extension failed: {}", e))?;
    for &val in data {
        buffer
            .write_all(&(val as f32).to_le_bytes())
            .map_err(|e| format!("Write data failed: {}", e))?;
    }

    Ok(buffer)
}

/// Save as gzipped NIfTI bytes (.nii.gz)
pub fn save_nifti_gz(
    data: &[f64],
    dims: (usize, usize, usize),
    volumes: usize,
    voxel_size: (f64, f64, f64),
    affine: &[f64; 16],
) -> Result<Vec<u8>, String> {
    let uncompressed = save_nifti(data, dims, volumes, voxel_size, affine)?;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(&uncompressed)
        .map_err(|e| format!("Gzip compression failed: {}", e))?;
    encoder.finish().map_err(|e| format!("Gzip finish failed: {}", e))
}

/// Read a NIfTI file from a filesystem path (.nii or .nii.gz)
pub fn read_nifti_file(path: &Path) -> Result<NiftiData, String> {
    let bytes = std::fs::read(path)
        .map_err(|e| format!("Failed to read file '{}': {}", path.display(), e))?;
    load_nifti(&bytes)
}

/// Save an image to a file; `.nii.gz` paths are gzip compressed
pub fn save_nifti_to_file(
    path: &Path,
    data: &[f64],
    dims: (usize, usize, usize),
    volumes: usize,
    voxel_size: (f64, f64, f64),
    affine: &[f64; 16],
) -> Result<(), String> {
    let bytes = if path.to_string_lossy().ends_with(".nii.gz") {
        save_nifti_gz(data, dims, volumes, voxel_size, affine)?
    } else {
        save_nifti(data, dims, volumes, voxel_size, affine)?
    };

    std::fs::write(path, &bytes)
        .map_err(|e| format!("Failed to write file '{}': {}", path.display(), e))
}
