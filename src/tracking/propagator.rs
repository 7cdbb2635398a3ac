//! Per-streamline propagation state machine
//!
//! `Uninitialized -> Seeded -> Seeded | Terminated`. Seeding picks an initial
//! direction at the seed position; each `advance` runs one rejection-sampling
//! step. `Terminated` is absorbing.

use glam::DVec3;
use log::debug;
use rand::Rng;

use super::direction::random_unit_vector;
use super::path::PathEvaluator;
use super::sampler::{attempt_step, StepOutcome};
use crate::config::SharedConfig;
use crate::error::Result;
use crate::field::CoefficientSource;

/// Lifecycle of a streamline
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PropagatorStatus {
    Uninitialized,
    Seeded,
    Terminated,
}

/// Mutable per-streamline state
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PropagatorState {
    pub position: DVec3,
    /// Current unit direction
    pub direction: DVec3,
    /// Best path probability carried over from the previous step
    pub previous_probability: f64,
    /// Sampling-loop draws summed over accepted steps
    pub trials: u64,
    /// Accepted steps
    pub steps: u64,
}

/// Diagnostics of one streamline, returned by [`StreamlinePropagator::finish`]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PropagationStats {
    /// Random directions tried while seeding
    pub seed_attempts: usize,
    pub trials: u64,
    pub steps: u64,
}

impl PropagationStats {
    /// Mean sampling-loop draws per accepted step (0 if no step was taken)
    pub fn mean_trials_per_step(&self) -> f64 {
        if self.steps == 0 {
            return 0.0;
        }
        self.trials as f64 / self.steps as f64
    }
}

/// Grows one streamline through the field
pub struct StreamlinePropagator<'a, F: CoefficientSource + ?Sized, R: Rng> {
    config: &'a SharedConfig,
    evaluator: PathEvaluator<'a, F>,
    rng: R,
    state: PropagatorState,
    status: PropagatorStatus,
    seed_attempts: usize,
}

impl<'a, F: CoefficientSource + ?Sized, R: Rng> StreamlinePropagator<'a, F, R> {
    /// Create an uninitialized propagator at `seed`
    ///
    /// `rng` is owned by this streamline; independent streamlines need
    /// independent generators. Fails if `field` holds fewer coefficients
    /// than `config` evaluates.
    pub fn new(field: &'a F, config: &'a SharedConfig, seed: DVec3, rng: R) -> Result<Self> {
        Ok(Self {
            config,
            evaluator: PathEvaluator::new(field, config)?,
            rng,
            state: PropagatorState {
                position: seed,
                direction: DVec3::Z,
                previous_probability: 0.0,
                trials: 0,
                steps: 0,
            },
            status: PropagatorStatus::Uninitialized,
            seed_attempts: 0,
        })
    }

    /// Choose the initial direction at the seed position
    ///
    /// With a fixed initial direction its amplitude is checked once;
    /// otherwise up to `max_trials` sphere-uniform directions are tried and
    /// the first whose amplitude exceeds the initialization threshold is
    /// kept. Only valid from `Uninitialized`; other states are returned as is.
    pub fn initialize(&mut self) -> PropagatorStatus {
        if self.status != PropagatorStatus::Uninitialized {
            return self.status;
        }

        let config = self.config;
        let sampler = self.evaluator.sampler();
        self.status = PropagatorStatus::Terminated;

        if !sampler.fetch(self.state.position) {
            debug!("seed {:?} outside the field", self.state.position);
            return self.status;
        }

        match config.init_direction() {
            Some(dir) => {
                let val = sampler.value(dir);
                if val.is_finite() && val > config.init_threshold() {
                    self.state.direction = dir;
                    self.state.previous_probability = val.powi(config.num_samples() as i32);
                    self.status = PropagatorStatus::Seeded;
                }
            }
            None => {
                for _ in 0..config.max_trials() {
                    self.seed_attempts += 1;
                    let dir = random_unit_vector(&mut self.rng);
                    let val = sampler.value(dir);
                    if !val.is_nan() && val > config.init_threshold() {
                        self.state.direction = dir;
                        self.state.previous_probability = val.powi(config.num_samples() as i32);
                        self.status = PropagatorStatus::Seeded;
                        break;
                    }
                }
            }
        }

        if self.status == PropagatorStatus::Terminated {
            debug!(
                "seeding failed at {:?} after {} attempts",
                self.state.position, self.seed_attempts
            );
        }
        self.status
    }

    /// Take one step; only valid from `Seeded`
    ///
    /// Returns the new status. Calls from any other state do nothing.
    pub fn advance(&mut self) -> PropagatorStatus {
        if self.status != PropagatorStatus::Seeded {
            return self.status;
        }

        let outcome = attempt_step(&mut self.state, &mut self.evaluator, self.config, &mut self.rng);
        match outcome {
            StepOutcome::Accepted { .. } => {}
            StepOutcome::EnvelopeTooLow { envelope } => {
                debug!("step {}: envelope {} below threshold", self.state.steps, envelope);
                self.status = PropagatorStatus::Terminated;
            }
            StepOutcome::Exhausted { trials } => {
                debug!("step {}: no acceptance in {} trials", self.state.steps, trials);
                self.status = PropagatorStatus::Terminated;
            }
        }
        self.status
    }

    pub fn status(&self) -> PropagatorStatus {
        self.status
    }

    pub fn position(&self) -> DVec3 {
        self.state.position
    }

    pub fn direction(&self) -> DVec3 {
        self.state.direction
    }

    pub fn state(&self) -> &PropagatorState {
        &self.state
    }

    pub fn stats(&self) -> PropagationStats {
        PropagationStats {
            seed_attempts: self.seed_attempts,
            trials: self.state.trials,
            steps: self.state.steps,
        }
    }

    /// Consume the propagator and report its diagnostics
    pub fn finish(self) -> PropagationStats {
        let stats = self.stats();
        debug!(
            "streamline finished: {} steps, mean number of samples per step = {}",
            stats.steps,
            stats.mean_trials_per_step()
        );
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrackingParams;
    use crate::sh;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    /// Uniform field of a single lobe along x, undefined beyond |x| = 10
    struct Lobe {
        coefs: Vec<f64>,
    }

    impl Lobe {
        fn new() -> Self {
            Self { coefs: sh::delta(DVec3::X, 4) }
        }
    }

    impl CoefficientSource for Lobe {
        fn num_coefficients(&self) -> usize {
            self.coefs.len()
        }

        fn coefficients_at(&self, position: DVec3, out: &mut [f64]) -> bool {
            if position.x.abs() > 10.0 {
                return false;
            }
            out.copy_from_slice(&self.coefs);
            true
        }
    }

    #[test]
    fn test_random_seeding_finds_lobe() {
        let field = Lobe::new();
        let config = SharedConfig::new(&TrackingParams::default(), field.num_coefficients()).unwrap();
        let rng = ChaCha8Rng::seed_from_u64(5);
        let mut p = StreamlinePropagator::new(&field, &config, DVec3::ZERO, rng).unwrap();
        assert_eq!(p.status(), PropagatorStatus::Uninitialized);
        assert_eq!(p.initialize(), PropagatorStatus::Seeded);
        assert!(p.stats().seed_attempts >= 1);
        assert!((p.direction().length() - 1.0).abs() < 1e-12);
        assert!(p.state().previous_probability > config.init_threshold());
    }

    #[test]
    fn test_fixed_direction_below_threshold_terminates() {
        let field = Lobe::new();
        let params = TrackingParams {
            init_direction: Some([0.0, 0.0, 1.0]),
            init_threshold: Some(1.0),
            ..Default::default()
        };
        let config = SharedConfig::new(&params, field.num_coefficients()).unwrap();
        let rng = ChaCha8Rng::seed_from_u64(6);
        let mut p = StreamlinePropagator::new(&field, &config, DVec3::ZERO, rng).unwrap();
        assert_eq!(p.initialize(), PropagatorStatus::Terminated);
        assert_eq!(p.stats(), PropagationStats::default());

        // Terminated is absorbing
        assert_eq!(p.advance(), PropagatorStatus::Terminated);
        assert_eq!(p.initialize(), PropagatorStatus::Terminated);
        assert_eq!(p.position(), DVec3::ZERO);
    }

    #[test]
    fn test_fixed_direction_along_lobe_seeds() {
        let field = Lobe::new();
        let params = TrackingParams {
            init_direction: Some([-1.0, 0.0, 0.0]),
            num_samples: 2,
            ..Default::default()
        };
        let config = SharedConfig::new(&params, field.num_coefficients()).unwrap();
        let rng = ChaCha8Rng::seed_from_u64(6);
        let mut p = StreamlinePropagator::new(&field, &config, DVec3::ZERO, rng).unwrap();
        assert_eq!(p.initialize(), PropagatorStatus::Seeded);
        assert_eq!(p.direction(), -DVec3::X);
        assert_eq!(p.stats().seed_attempts, 0);

        let peak = sh::value(&field.coefs, DVec3::X, 4);
        assert!((p.state().previous_probability - peak * peak).abs() < 1e-9);
    }

    #[test]
    fn test_seed_outside_field_terminates() {
        let field = Lobe::new();
        let config = SharedConfig::new(&TrackingParams::default(), field.num_coefficients()).unwrap();
        let rng = ChaCha8Rng::seed_from_u64(7);
        let seed = DVec3::new(20.0, 0.0, 0.0);
        let mut p = StreamlinePropagator::new(&field, &config, seed, rng).unwrap();
        assert_eq!(p.initialize(), PropagatorStatus::Terminated);
        assert_eq!(p.stats().seed_attempts, 0);
    }

    #[test]
    fn test_advance_before_initialize_is_noop() {
        let field = Lobe::new();
        let config = SharedConfig::new(&TrackingParams::default(), field.num_coefficients()).unwrap();
        let rng = ChaCha8Rng::seed_from_u64(8);
        let mut p = StreamlinePropagator::new(&field, &config, DVec3::ZERO, rng).unwrap();
        assert_eq!(p.advance(), PropagatorStatus::Uninitialized);
        assert_eq!(p.stats().steps, 0);
    }

    #[test]
    fn test_tracks_along_lobe_until_field_ends() {
        let field = Lobe::new();
        let params = TrackingParams {
            init_direction: Some([1.0, 0.0, 0.0]),
            max_angle_deg: 30.0,
            ..Default::default()
        };
        let config = SharedConfig::new(&params, field.num_coefficients()).unwrap();
        let rng = ChaCha8Rng::seed_from_u64(9);
        let mut p = StreamlinePropagator::new(&field, &config, DVec3::ZERO, rng).unwrap();
        p.initialize();

        let mut steps = 0;
        while p.advance() == PropagatorStatus::Seeded {
            steps += 1;
            assert!(steps < 5000, "streamline never left the field");
        }
        let stats = p.finish();
        assert_eq!(stats.steps as usize, steps);
        // 10 mm of field at 0.5 mm per step
        assert!(steps >= 15, "only {} steps", steps);
        assert!(stats.mean_trials_per_step() >= 1.0);
    }
}
