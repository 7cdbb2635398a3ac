//! Run configuration
//!
//! [`TrackingParams`] carries the user-facing values (with defaults and TOML
//! support). [`SharedConfig`] is the validated, immutable form shared by every
//! streamline of a run, including derived quantities and the SH evaluator.

use std::fmt;
use std::sync::Arc;

use glam::DVec3;
use log::info;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackError};
use crate::sh::{self, ShBasis, MAX_LMAX};

/// User-facing tracking parameters
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingParams {
    /// Highest SH degree to evaluate (None: derived from the coefficient count)
    pub lmax: Option<usize>,
    /// Arc length of one step, in the field's spatial units (mm)
    pub step_size: f64,
    /// Largest turning angle per step, in degrees
    pub max_angle_deg: f64,
    /// Minimum amplitude accepted along a candidate path
    pub threshold: f64,
    /// Minimum amplitude for a seed direction (None: twice `threshold`)
    pub init_threshold: Option<f64>,
    /// Points evaluated along each candidate arc
    pub num_samples: usize,
    /// Trial budget for seeding and for steps in low-probability regions
    pub max_trials: usize,
    /// Use the precomputed Legendre table for amplitude queries
    pub precomputed: bool,
    /// Fixed seed direction (None: random directions are tried)
    pub init_direction: Option<[f64; 3]>,
    /// Candidates drawn to estimate the rejection envelope
    pub probe_count: usize,
    /// Slack applied to the estimated envelope
    pub envelope_multiplier: f64,
    /// Trial budget once a candidate above threshold has been seen
    pub extended_trials: usize,
}

impl Default for TrackingParams {
    fn default() -> Self {
        Self {
            lmax: None,
            step_size: 0.5,
            max_angle_deg: 45.0,
            threshold: 0.1,
            init_threshold: None,
            num_samples: 1,
            max_trials: 100,
            precomputed: true,
            init_direction: None,
            probe_count: 100,
            envelope_multiplier: 1.5,
            extended_trials: 10000,
        }
    }
}

impl TrackingParams {
    /// Parse parameters from a TOML document; missing keys keep their defaults
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Read parameters from a TOML file
    pub fn from_toml_file(path: &std::path::Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}

/// Validated per-run configuration, shared read-only across streamlines
#[derive(Clone)]
pub struct SharedConfig {
    lmax: usize,
    num_coefficients: usize,
    num_samples: usize,
    max_trials: usize,
    step_size: f64,
    max_angle: f64,
    sin_max_angle: f64,
    cos_max_angle: f64,
    versine_max_angle: f64,
    threshold: f64,
    init_threshold: f64,
    prob_threshold: f64,
    init_direction: Option<DVec3>,
    probe_count: usize,
    envelope_multiplier: f64,
    extended_trials: usize,
    basis: Arc<dyn ShBasis>,
}

impl SharedConfig {
    /// Validate `params` against a field holding `num_coefficients` values per voxel
    pub fn new(params: &TrackingParams, num_coefficients: usize) -> Result<Self> {
        let lmax = resolve_lmax(params.lmax, num_coefficients)?;

        if params.num_samples == 0 {
            return Err(TrackError::config("num_samples", "must be at least 1"));
        }
        if !(params.step_size.is_finite() && params.step_size > 0.0) {
            return Err(TrackError::config(
                "step_size",
                format!("must be positive, got {}", params.step_size),
            ));
        }
        let max_angle = params.max_angle_deg.to_radians();
        if !(max_angle.is_finite() && max_angle > 0.0 && max_angle <= std::f64::consts::PI) {
            return Err(TrackError::config(
                "max_angle_deg",
                format!("must lie in (0, 180], got {}", params.max_angle_deg),
            ));
        }
        if !(params.threshold.is_finite() && params.threshold >= 0.0) {
            return Err(TrackError::config(
                "threshold",
                format!("must be non-negative, got {}", params.threshold),
            ));
        }
        let init_threshold = params.init_threshold.unwrap_or(2.0 * params.threshold);
        if !init_threshold.is_finite() {
            return Err(TrackError::config("init_threshold", "must be finite"));
        }
        if params.max_trials == 0 {
            return Err(TrackError::config("max_trials", "must be at least 1"));
        }
        if params.probe_count == 0 {
            return Err(TrackError::config("probe_count", "must be at least 1"));
        }
        if params.extended_trials == 0 {
            return Err(TrackError::config("extended_trials", "must be at least 1"));
        }
        if !(params.envelope_multiplier.is_finite() && params.envelope_multiplier >= 1.0) {
            return Err(TrackError::config(
                "envelope_multiplier",
                format!("must be at least 1, got {}", params.envelope_multiplier),
            ));
        }

        let init_direction = match params.init_direction {
            Some(d) => {
                let v = DVec3::from_array(d);
                let unit = v.try_normalize().ok_or_else(|| {
                    TrackError::config("init_direction", format!("cannot normalize {:?}", d))
                })?;
                Some(unit)
            }
            None => None,
        };

        let (sin_max_angle, cos_max_angle) = max_angle.sin_cos();
        // 1 - cos loses precision for small angles; use sin² / (1 + cos) there
        let versine_max_angle = if cos_max_angle > 0.0 {
            sin_max_angle * sin_max_angle / (1.0 + cos_max_angle)
        } else {
            1.0 - cos_max_angle
        };

        let prob_threshold = params.threshold.powi(params.num_samples as i32);

        info!(
            "minimum radius of curvature = {} mm",
            params.step_size / max_angle
        );

        Ok(Self {
            lmax,
            num_coefficients,
            num_samples: params.num_samples,
            max_trials: params.max_trials,
            step_size: params.step_size,
            max_angle,
            sin_max_angle,
            cos_max_angle,
            versine_max_angle,
            threshold: params.threshold,
            init_threshold,
            prob_threshold,
            init_direction,
            probe_count: params.probe_count,
            envelope_multiplier: params.envelope_multiplier,
            extended_trials: params.extended_trials,
            basis: sh::basis_for(lmax, params.precomputed),
        })
    }

    pub fn lmax(&self) -> usize {
        self.lmax
    }

    /// Coefficients per voxel in the field this config was validated against
    pub fn num_coefficients(&self) -> usize {
        self.num_coefficients
    }

    pub fn num_samples(&self) -> usize {
        self.num_samples
    }

    pub fn max_trials(&self) -> usize {
        self.max_trials
    }

    pub fn step_size(&self) -> f64 {
        self.step_size
    }

    /// Largest turning angle per step, in radians
    pub fn max_angle(&self) -> f64 {
        self.max_angle
    }

    pub fn sin_max_angle(&self) -> f64 {
        self.sin_max_angle
    }

    pub fn cos_max_angle(&self) -> f64 {
        self.cos_max_angle
    }

    /// `1 - cos(max_angle)`, computed without cancellation
    pub fn versine_max_angle(&self) -> f64 {
        self.versine_max_angle
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn init_threshold(&self) -> f64 {
        self.init_threshold
    }

    /// `threshold^num_samples`, the lowest acceptable joint path probability
    pub fn prob_threshold(&self) -> f64 {
        self.prob_threshold
    }

    pub fn init_direction(&self) -> Option<DVec3> {
        self.init_direction
    }

    pub fn probe_count(&self) -> usize {
        self.probe_count
    }

    pub fn envelope_multiplier(&self) -> f64 {
        self.envelope_multiplier
    }

    pub fn extended_trials(&self) -> usize {
        self.extended_trials
    }

    /// SH evaluator selected for this run
    pub fn basis(&self) -> &dyn ShBasis {
        self.basis.as_ref()
    }
}

impl fmt::Debug for SharedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedConfig")
            .field("lmax", &self.lmax)
            .field("num_coefficients", &self.num_coefficients)
            .field("num_samples", &self.num_samples)
            .field("max_trials", &self.max_trials)
            .field("step_size", &self.step_size)
            .field("max_angle", &self.max_angle)
            .field("threshold", &self.threshold)
            .field("init_threshold", &self.init_threshold)
            .field("prob_threshold", &self.prob_threshold)
            .field("init_direction", &self.init_direction)
            .field("probe_count", &self.probe_count)
            .field("envelope_multiplier", &self.envelope_multiplier)
            .field("extended_trials", &self.extended_trials)
            .finish_non_exhaustive()
    }
}

fn resolve_lmax(requested: Option<usize>, num_coefficients: usize) -> Result<usize> {
    let available = sh::l_for_n(num_coefficients).ok_or_else(|| {
        TrackError::config(
            "lmax",
            format!("{} coefficients is not a valid even-degree SH count", num_coefficients),
        )
    })?;

    let lmax = match requested {
        Some(l) if l % 2 == 1 => {
            return Err(TrackError::config("lmax", format!("must be even, got {}", l)));
        }
        Some(l) if l > available => {
            return Err(TrackError::config(
                "lmax",
                format!("{} exceeds the field's maximum degree {}", l, available),
            ));
        }
        Some(l) => l,
        None => available,
    };

    if lmax > MAX_LMAX {
        return Err(TrackError::config(
            "lmax",
            format!("{} exceeds the supported maximum {}", lmax, MAX_LMAX),
        ));
    }
    Ok(lmax)
}
