//! tracto-core: probabilistic streamline tractography
//!
//! This crate grows streamlines through fibre orientation distributions
//! stored as spherical harmonic coefficient images.
//!
//! # Modules
//! - `sh`: Even-degree real spherical harmonics (direct and precomputed evaluation)
//! - `field`: Coefficient sources, SH images and amplitude sampling
//! - `tracking`: Arc generation, path probability, rejection-sampling steps,
//!   per-streamline propagation and parallel runs
//! - `config`: Tracking parameters and validated run configuration
//! - `utils`: Warp image out-of-bounds correction
//! - `nifti_io`: NIfTI image I/O

// Core modules
pub mod config;
pub mod error;

// Algorithm modules
pub mod field;
pub mod sh;
pub mod tracking;
pub mod utils;

// I/O modules
pub mod nifti_io;

pub use config::{SharedConfig, TrackingParams};
pub use error::{Result, TrackError};
