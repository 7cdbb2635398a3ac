//! Precomputed Legendre recurrence table
//!
//! Holds the sectoral prefactors and three-term recurrence factors for every
//! `(l, m)` up to `lmax`, so an amplitude query needs no square roots or
//! trigonometric calls. Built once per run and shared read-only.

use std::f64::consts::SQRT_2;

use glam::DVec3;

use super::legendre::{recurrence, sectoral_prefactor};
use super::{index, ShBasis, MAX_LMAX};

/// Table of normalized associated Legendre recurrence factors
#[derive(Clone, Debug)]
pub struct PrecomputedLegendre {
    lmax: usize,
    /// `P_m^m = diag[m] * sin^m θ`
    diag: Vec<f64>,
    /// `sqrt(2m + 3)` for the first off-diagonal step
    first: Vec<f64>,
    /// `(a, b)` per `(l, m)`, triangular index `l(l+1)/2 + m`
    recur: Vec<(f64, f64)>,
}

#[inline]
fn tri(l: usize, m: usize) -> usize {
    l * (l + 1) / 2 + m
}

impl PrecomputedLegendre {
    pub fn new(lmax: usize) -> Self {
        let lmax = lmax.min(MAX_LMAX);
        let diag = (0..=lmax).map(sectoral_prefactor).collect();
        let first = (0..=lmax).map(|m| (2.0 * m as f64 + 3.0).sqrt()).collect();
        let mut recur = vec![(0.0, 0.0); tri(lmax, lmax) + 1];
        for l in 2..=lmax {
            for m in 0..=(l - 2) {
                recur[tri(l, m)] = recurrence(l, m);
            }
        }
        Self { lmax, diag, first, recur }
    }

    pub fn lmax(&self) -> usize {
        self.lmax
    }

    /// Same contract as [`super::plm_sph`], given `x = cos θ` and `s = sin θ`
    #[inline]
    fn fill(&self, out: &mut [f64], m: usize, x: f64, s_pow_m: f64) {
        let lmax = self.lmax;
        out[m] = self.diag[m] * s_pow_m;
        if m == lmax {
            return;
        }
        out[m + 1] = x * self.first[m] * out[m];
        for l in (m + 2)..=lmax {
            let (a, b) = self.recur[tri(l, m)];
            out[l] = a * (x * out[l - 1] - b * out[l - 2]);
        }
    }

    /// Evaluate an even-degree series along a unit direction
    pub fn value(&self, coefs: &[f64], dir: DVec3) -> f64 {
        let lmax = self.lmax;
        let mut al = [0.0f64; MAX_LMAX + 1];

        let x = dir.z;
        let s = (1.0 - x * x).max(0.0).sqrt();
        let rho = dir.x.hypot(dir.y);
        let (cos_phi, sin_phi) = if rho > 0.0 {
            (dir.x / rho, dir.y / rho)
        } else {
            (1.0, 0.0)
        };

        self.fill(&mut al, 0, x, 1.0);
        let mut amplitude = 0.0;
        for l in (0..=lmax).step_by(2) {
            amplitude += al[l] * coefs[index(l, 0)];
        }

        let mut s_pow = 1.0;
        let (mut c, mut sn) = (1.0, 0.0);
        for m in 1..=lmax {
            s_pow *= s;
            let next_c = c * cos_phi - sn * sin_phi;
            sn = sn * cos_phi + c * sin_phi;
            c = next_c;

            self.fill(&mut al, m, x, s_pow);
            let first = if m % 2 == 1 { m + 1 } else { m };
            for l in (first..=lmax).step_by(2) {
                let centre = index(l, 0);
                amplitude += SQRT_2 * al[l] * (c * coefs[centre + m] + sn * coefs[centre - m]);
            }
        }

        amplitude
    }
}

/// Evaluator backed by a [`PrecomputedLegendre`] table
#[derive(Clone, Debug)]
pub struct PrecomputedBasis {
    table: PrecomputedLegendre,
}

impl PrecomputedBasis {
    pub fn new(lmax: usize) -> Self {
        Self {
            table: PrecomputedLegendre::new(lmax),
        }
    }
}

impl ShBasis for PrecomputedBasis {
    fn lmax(&self) -> usize {
        self.table.lmax()
    }

    fn amplitude(&self, coefs: &[f64], dir: DVec3) -> f64 {
        self.table.value(coefs, dir)
    }
}
