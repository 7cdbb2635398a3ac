//! Real spherical harmonics of even degree
//!
//! Coefficients are stored per even degree `l` with orders `m = -l..=l`,
//! at index `l(l+1)/2 + m`. Negative orders carry the `sin(|m|φ)` terms and
//! positive orders the `cos(mφ)` terms. This is the layout used by
//! antipodally-symmetric fibre orientation distributions.
//!
//! Two evaluators implement [`ShBasis`]:
//! - [`DirectBasis`]: recomputes every Legendre coefficient per query
//! - [`PrecomputedBasis`]: reads recurrence factors from a table built once
//!   per run and derives `cos(mφ)`, `sin(mφ)` by recurrence
//!
//! Both agree to within floating-point rounding.

mod legendre;
mod precomputed;

pub use legendre::{plm_sph, MAX_LMAX};
pub use precomputed::{PrecomputedBasis, PrecomputedLegendre};

use std::f64::consts::SQRT_2;
use std::sync::Arc;

use glam::DVec3;

/// Number of coefficients for an even-degree expansion up to `lmax`
pub fn n_for_l(lmax: usize) -> usize {
    (lmax + 1) * (lmax + 2) / 2
}

/// Even degree whose expansion has exactly `n` coefficients
///
/// Returns `None` if `n` is not a valid coefficient count.
pub fn l_for_n(n: usize) -> Option<usize> {
    if n == 0 {
        return None;
    }
    let l = 2 * ((((1.0 + 8.0 * n as f64).sqrt() - 3.0) / 4.0).floor() as usize);
    if n_for_l(l) == n {
        Some(l)
    } else {
        None
    }
}

/// Coefficient index of degree `l`, order `m`
#[inline]
pub fn index(l: usize, m: isize) -> usize {
    ((l * (l + 1) / 2) as isize + m) as usize
}

/// Amplitude of an expansion along a unit direction
pub trait ShBasis: Send + Sync {
    /// Highest degree evaluated
    fn lmax(&self) -> usize;

    /// Evaluate the series `coefs` along `dir`
    ///
    /// `coefs` must hold at least `n_for_l(self.lmax())` values.
    fn amplitude(&self, coefs: &[f64], dir: DVec3) -> f64;
}

/// Evaluator that recomputes the Legendre functions on every query
#[derive(Clone, Copy, Debug)]
pub struct DirectBasis {
    lmax: usize,
}

impl DirectBasis {
    pub fn new(lmax: usize) -> Self {
        Self { lmax }
    }
}

impl ShBasis for DirectBasis {
    fn lmax(&self) -> usize {
        self.lmax
    }

    fn amplitude(&self, coefs: &[f64], dir: DVec3) -> f64 {
        value(coefs, dir, self.lmax)
    }
}

/// Pick the evaluator for a run
pub fn basis_for(lmax: usize, precomputed: bool) -> Arc<dyn ShBasis> {
    if precomputed {
        Arc::new(PrecomputedBasis::new(lmax))
    } else {
        Arc::new(DirectBasis::new(lmax))
    }
}

/// Evaluate an even-degree SH series along a unit direction
///
/// # Arguments
/// * `coefs` - Coefficients, at least `n_for_l(lmax)` long
/// * `dir` - Unit direction
/// * `lmax` - Highest (even) degree, at most [`MAX_LMAX`]
pub fn value(coefs: &[f64], dir: DVec3, lmax: usize) -> f64 {
    debug_assert!(coefs.len() >= n_for_l(lmax));
    let mut al = [0.0f64; MAX_LMAX + 1];
    let phi = dir.y.atan2(dir.x);

    plm_sph(&mut al, lmax, 0, dir.z);
    let mut amplitude = 0.0;
    for l in (0..=lmax).step_by(2) {
        amplitude += al[l] * coefs[index(l, 0)];
    }

    for m in 1..=lmax {
        plm_sph(&mut al, lmax, m, dir.z);
        let (s, c) = (m as f64 * phi).sin_cos();
        let first = if m % 2 == 1 { m + 1 } else { m };
        for l in (first..=lmax).step_by(2) {
            let centre = index(l, 0);
            amplitude += SQRT_2 * al[l] * (c * coefs[centre + m] + s * coefs[centre - m]);
        }
    }

    amplitude
}

/// Evaluate every basis function along `dir`
///
/// `out` receives `n_for_l(lmax)` values in coefficient order, so that
/// `value(c, dir, lmax) == Σ c[i] * out[i]`.
pub fn basis(dir: DVec3, lmax: usize, out: &mut [f64]) {
    let mut al = [0.0f64; MAX_LMAX + 1];
    let phi = dir.y.atan2(dir.x);

    plm_sph(&mut al, lmax, 0, dir.z);
    for l in (0..=lmax).step_by(2) {
        out[index(l, 0)] = al[l];
    }

    for m in 1..=lmax {
        plm_sph(&mut al, lmax, m, dir.z);
        let (s, c) = (m as f64 * phi).sin_cos();
        let first = if m % 2 == 1 { m + 1 } else { m };
        for l in (first..=lmax).step_by(2) {
            let centre = index(l, 0);
            out[centre + m] = SQRT_2 * al[l] * c;
            out[centre - m] = SQRT_2 * al[l] * s;
        }
    }
}

/// Coefficients of a truncated delta function pointing along `dir`
///
/// The resulting lobe peaks along `±dir` with amplitude
/// `Σ_l (2l + 1) / 4π` over the even degrees.
pub fn delta(dir: DVec3, lmax: usize) -> Vec<f64> {
    let mut coefs = vec![0.0; n_for_l(lmax)];
    basis(dir.normalize(), lmax, &mut coefs);
    coefs
}
