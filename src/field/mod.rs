//! Orientation field access
//!
//! - [`CoefficientSource`]: anything that can produce SH coefficients at an
//!   arbitrary position (interpolated image, analytic test field, ...)
//! - [`ShImage`]: 4D SH coefficient image with trilinear interpolation
//! - [`FieldSampler`]: amplitude of the field at a position and direction

mod image;

pub use image::ShImage;

use glam::DVec3;

use crate::error::{Result, TrackError};
use crate::sh::{n_for_l, ShBasis};

/// Provider of SH coefficients at continuous positions
pub trait CoefficientSource: Sync {
    /// Coefficients per position
    fn num_coefficients(&self) -> usize;

    /// Write the coefficients at `position` into `out`
    ///
    /// Returns `false` when the position lies outside the sampled domain or
    /// the data there is undefined; `out` is then unspecified.
    fn coefficients_at(&self, position: DVec3, out: &mut [f64]) -> bool;
}

/// Amplitude queries against a coefficient source
///
/// Owns a scratch buffer for the coefficients, so each propagation context
/// keeps its own sampler. NaN is returned wherever the field is undefined.
pub struct FieldSampler<'a, F: CoefficientSource + ?Sized> {
    field: &'a F,
    basis: &'a dyn ShBasis,
    values: Vec<f64>,
    loaded: bool,
}

impl<'a, F: CoefficientSource + ?Sized> FieldSampler<'a, F> {
    /// Pair `field` with `basis`
    ///
    /// Fails if the field holds fewer coefficients than the basis evaluates.
    pub fn new(field: &'a F, basis: &'a dyn ShBasis) -> Result<Self> {
        let available = field.num_coefficients();
        let required = n_for_l(basis.lmax());
        if available < required {
            return Err(TrackError::config(
                "num_coefficients",
                format!(
                    "field holds {} coefficients, lmax {} needs {}",
                    available,
                    basis.lmax(),
                    required
                ),
            ));
        }
        Ok(Self {
            field,
            basis,
            values: vec![0.0; available],
            loaded: false,
        })
    }

    /// Load the coefficients at `position` for subsequent [`Self::value`] calls
    pub fn fetch(&mut self, position: DVec3) -> bool {
        self.loaded = self.field.coefficients_at(position, &mut self.values);
        self.loaded
    }

    /// Amplitude along `direction` using the last fetched coefficients
    pub fn value(&self, direction: DVec3) -> f64 {
        if !self.loaded {
            return f64::NAN;
        }
        self.basis.amplitude(&self.values, direction)
    }

    /// Amplitude of the field at `position` along `direction`, or NaN
    pub fn amplitude(&mut self, position: DVec3, direction: DVec3) -> f64 {
        if !self.fetch(position) {
            return f64::NAN;
        }
        self.basis.amplitude(&self.values, direction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sh::{basis_for, n_for_l};
    use std::f64::consts::PI;

    /// Isotropic amplitude 1 inside the unit ball, undefined outside
    struct UnitBall;

    impl CoefficientSource for UnitBall {
        fn num_coefficients(&self) -> usize {
            n_for_l(2)
        }

        fn coefficients_at(&self, position: DVec3, out: &mut [f64]) -> bool {
            if position.length() > 1.0 {
                return false;
            }
            out.fill(0.0);
            out[0] = (4.0 * PI).sqrt();
            true
        }
    }

    #[test]
    fn test_amplitude_inside_and_outside() {
        let basis = basis_for(2, true);
        let mut sampler = FieldSampler::new(&UnitBall, basis.as_ref()).unwrap();
        let inside = sampler.amplitude(DVec3::new(0.2, 0.0, 0.1), DVec3::X);
        assert!((inside - 1.0).abs() < 1e-12);
        assert!(sampler.amplitude(DVec3::new(2.0, 0.0, 0.0), DVec3::X).is_nan());
    }

    #[test]
    fn test_value_without_fetch_is_nan() {
        let basis = basis_for(2, false);
        let sampler = FieldSampler::new(&UnitBall, basis.as_ref()).unwrap();
        assert!(sampler.value(DVec3::Z).is_nan());
    }

    #[test]
    fn test_failed_fetch_invalidates_previous() {
        let basis = basis_for(2, false);
        let mut sampler = FieldSampler::new(&UnitBall, basis.as_ref()).unwrap();
        assert!(sampler.fetch(DVec3::ZERO));
        assert!(!sampler.value(DVec3::Z).is_nan());
        assert!(!sampler.fetch(DVec3::splat(5.0)));
        assert!(sampler.value(DVec3::Z).is_nan());
    }

    #[test]
    fn test_rejects_field_with_too_few_coefficients() {
        let basis = basis_for(4, true);
        let err = FieldSampler::new(&UnitBall, basis.as_ref()).err().unwrap();
        assert!(matches!(err, TrackError::Config { field: "num_coefficients", .. }));

        // A higher-degree field is truncated to the basis degree
        let basis = basis_for(0, true);
        let mut sampler = FieldSampler::new(&UnitBall, basis.as_ref()).unwrap();
        assert!((sampler.amplitude(DVec3::ZERO, DVec3::Y) - 1.0).abs() < 1e-12);
    }
}
