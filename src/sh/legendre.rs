//! Normalized associated Legendre functions
//!
//! Values are scaled so that `sqrt(2) * P_l^m(cos θ) * cos(mφ)` and friends
//! form an orthonormal real basis on the unit sphere. No Condon-Shortley
//! phase is applied.

use std::f64::consts::PI;

/// Largest harmonic degree supported by the fixed-size scratch buffers
pub const MAX_LMAX: usize = 30;

/// `sqrt(1 / 4π)`, the value of the normalized `P_0^0`
pub(crate) fn y00() -> f64 {
    (0.25 / PI).sqrt()
}

/// Evaluate normalized `P_l^m(x)` for all `l` in `m..=lmax`
///
/// Writes `out[l]` for `l >= m`; entries below `m` are left untouched.
///
/// # Arguments
/// * `out` - Output buffer of length at least `lmax + 1`
/// * `lmax` - Highest degree to evaluate
/// * `m` - Order (non-negative)
/// * `x` - Argument, `cos θ` in [-1, 1]
pub fn plm_sph(out: &mut [f64], lmax: usize, m: usize, x: f64) {
    if m > lmax {
        return;
    }

    let s = (1.0 - x * x).max(0.0).sqrt();

    let mut pmm = y00();
    for i in 1..=m {
        let fi = i as f64;
        pmm *= s * ((2.0 * fi - 1.0) / (2.0 * fi)).sqrt();
    }
    let fm = m as f64;
    out[m] = pmm * (2.0 * fm + 1.0).sqrt();

    if m == lmax {
        return;
    }
    out[m + 1] = x * (2.0 * fm + 3.0).sqrt() * out[m];

    for l in (m + 2)..=lmax {
        let (a, b) = recurrence(l, m);
        out[l] = a * (x * out[l - 1] - b * out[l - 2]);
    }
}

/// Three-term recurrence coefficients for the normalized functions
///
/// `P_l^m = a * (x * P_{l-1}^m - b * P_{l-2}^m)`, valid for `l >= m + 2`.
pub(crate) fn recurrence(l: usize, m: usize) -> (f64, f64) {
    let fl = l as f64;
    let fm = m as f64;
    let a = ((4.0 * fl * fl - 1.0) / (fl * fl - fm * fm)).sqrt();
    let lm1 = fl - 1.0;
    let b = ((lm1 * lm1 - fm * fm) / (4.0 * lm1 * lm1 - 1.0)).sqrt();
    (a, b)
}

/// Prefactor of the normalized sectoral function: `P_m^m = diag(m) * sin^m θ`
pub(crate) fn sectoral_prefactor(m: usize) -> f64 {
    let mut p = y00();
    for i in 1..=m {
        let fi = i as f64;
        p *= ((2.0 * fi - 1.0) / (2.0 * fi)).sqrt();
    }
    p * (2.0 * m as f64 + 1.0).sqrt()
}
