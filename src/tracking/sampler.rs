//! Rejection-sampling step
//!
//! One step draws candidate end directions uniformly within the turning cone
//! and accepts a candidate with probability `p / envelope`, where `p` is its
//! joint path probability. The envelope is estimated per step from a batch of
//! probe candidates, padded by a multiplier, and never drops below the best
//! probability carried over from the previous step.

use log::trace;
use rand::Rng;

use super::direction::random_direction_in_cone;
use super::path::PathEvaluator;
use super::propagator::PropagatorState;
use crate::config::SharedConfig;
use crate::field::CoefficientSource;

/// Result of one step attempt
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum StepOutcome {
    /// A candidate was accepted after `trials` draws
    Accepted { trials: usize, probability: f64 },
    /// The envelope estimate was undefined or below the probability threshold
    EnvelopeTooLow { envelope: f64 },
    /// The trial budget ran out without an acceptance
    Exhausted { trials: usize },
}

impl StepOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, StepOutcome::Accepted { .. })
    }
}

/// Attempt one step from `state`, updating it in place on acceptance
///
/// On acceptance the position, direction (renormalized), carried-over
/// probability and diagnostic counters are updated. On failure only the
/// carried-over probability changes, to the best probe value.
pub fn attempt_step<F, R>(
    state: &mut PropagatorState,
    evaluator: &mut PathEvaluator<'_, F>,
    config: &SharedConfig,
    rng: &mut R,
) -> StepOutcome
where
    F: CoefficientSource + ?Sized,
    R: Rng,
{
    let versine = config.versine_max_angle();
    let prob_threshold = config.prob_threshold();

    let mut max_val_actual = 0.0;
    for _ in 0..config.probe_count() {
        let end = random_direction_in_cone(rng, state.direction, versine);
        let val = evaluator.evaluate(state.position, state.direction, end).probability;
        if val > max_val_actual {
            max_val_actual = val;
        }
    }

    let max_val = state.previous_probability.max(max_val_actual) * config.envelope_multiplier();
    state.previous_probability = max_val_actual;

    if !max_val.is_finite() || max_val < prob_threshold {
        return StepOutcome::EnvelopeTooLow { envelope: max_val };
    }

    let budget = if max_val_actual > prob_threshold {
        config.extended_trials()
    } else {
        config.max_trials()
    };

    for n in 0..budget {
        let end = random_direction_in_cone(rng, state.direction, versine);
        let proposal = evaluator.evaluate(state.position, state.direction, end);
        let val = proposal.probability;

        if val > prob_threshold {
            if val > max_val {
                trace!("max_val exceeded (val = {}, max_val = {})", val, max_val);
            }

            if rng.gen::<f64>() < val / max_val {
                let trials = n + 1;
                state.direction = proposal.direction.normalize();
                state.position = proposal.position;
                state.previous_probability = val;
                state.trials += trials as u64;
                state.steps += 1;
                return StepOutcome::Accepted { trials, probability: val };
            }
        }
    }

    StepOutcome::Exhausted { trials: budget }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrackingParams;
    use crate::sh::{self, ShBasis};
    use glam::DVec3;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::f64::consts::PI;

    /// Isotropic field of constant amplitude
    struct Flat(f64);

    impl CoefficientSource for Flat {
        fn num_coefficients(&self) -> usize {
            1
        }

        fn coefficients_at(&self, _position: DVec3, out: &mut [f64]) -> bool {
            out[0] = self.0 * (4.0 * PI).sqrt();
            true
        }
    }

    fn state(previous_probability: f64) -> PropagatorState {
        PropagatorState {
            position: DVec3::ZERO,
            direction: DVec3::Z,
            previous_probability,
            trials: 0,
            steps: 0,
        }
    }

    #[test]
    fn test_flat_field_accepts() {
        let config = SharedConfig::new(&TrackingParams::default(), 1).unwrap();
        let field = Flat(1.0);
        let mut evaluator = PathEvaluator::new(&field, &config).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut s = state(1.0);

        let outcome = attempt_step(&mut s, &mut evaluator, &config, &mut rng);
        match outcome {
            StepOutcome::Accepted { trials, probability } => {
                assert!(trials >= 1);
                assert!((probability - 1.0).abs() < 1e-12);
            }
            other => panic!("expected acceptance, got {:?}", other),
        }
        assert_eq!(s.steps, 1);
        assert!((s.direction.length() - 1.0).abs() < 1e-12);
        // Chord of an arc of length step_size turning at most 45 degrees
        let chord = s.position.length();
        assert!(chord <= config.step_size() + 1e-9);
        assert!(chord >= 0.97 * config.step_size());
        assert!(s.direction.dot(DVec3::Z) >= config.cos_max_angle() - 1e-9);
    }

    #[test]
    fn test_low_field_without_history_fails_envelope() {
        let config = SharedConfig::new(&TrackingParams::default(), 1).unwrap();
        let field = Flat(0.05);
        let mut evaluator = PathEvaluator::new(&field, &config).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let mut s = state(0.0);

        let outcome = attempt_step(&mut s, &mut evaluator, &config, &mut rng);
        assert!(matches!(outcome, StepOutcome::EnvelopeTooLow { .. }));
        assert_eq!(s.position, DVec3::ZERO);
        assert_eq!(s.steps, 0);
    }

    #[test]
    fn test_history_keeps_envelope_but_budget_stays_short() {
        // Every candidate is below threshold, but the carried-over probability
        // keeps the envelope alive: the short budget is spent and the step fails.
        let config = SharedConfig::new(&TrackingParams::default(), 1).unwrap();
        let field = Flat(0.05);
        let mut evaluator = PathEvaluator::new(&field, &config).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut s = state(1.0);

        let outcome = attempt_step(&mut s, &mut evaluator, &config, &mut rng);
        assert_eq!(outcome, StepOutcome::Exhausted { trials: config.max_trials() });
        assert_eq!(s.previous_probability, 0.0);
        assert_eq!(s.trials, 0);
    }

    #[test]
    fn test_candidate_at_threshold_is_never_accepted() {
        // Pick the threshold as the exact amplitude the basis yields, so every
        // candidate passes the per-sample check but sits on prob_threshold.
        let field = Flat(0.5);
        let probe_config = SharedConfig::new(&TrackingParams::default(), 1).unwrap();
        let amplitude = probe_config.basis().amplitude(&[0.5 * (4.0 * PI).sqrt()], DVec3::Z);
        let params = TrackingParams {
            threshold: amplitude,
            ..Default::default()
        };
        let config = SharedConfig::new(&params, 1).unwrap();
        assert_eq!(config.prob_threshold(), amplitude);

        let mut evaluator = PathEvaluator::new(&field, &config).unwrap();
        let proposal = evaluator.evaluate(DVec3::ZERO, DVec3::Z, DVec3::Z);
        assert_eq!(proposal.probability, amplitude);

        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let mut s = state(1.0);
        let outcome = attempt_step(&mut s, &mut evaluator, &config, &mut rng);
        assert_eq!(outcome, StepOutcome::Exhausted { trials: config.max_trials() });
        assert_eq!(s.position, DVec3::ZERO);
        assert_eq!(s.steps, 0);
    }

    /// `2/3 + P2(d.x) / 3`, i.e. `1/2 + (d.x)^2 / 2`
    struct Band {
        coefs: Vec<f64>,
    }

    impl Band {
        fn new() -> Self {
            let mut coefs = vec![0.0; sh::n_for_l(2)];
            sh::basis(DVec3::X, 2, &mut coefs);
            for c in coefs.iter_mut() {
                *c *= 4.0 * PI / 15.0;
            }
            coefs[0] = 2.0 / 3.0 * (4.0 * PI).sqrt();
            Self { coefs }
        }
    }

    impl CoefficientSource for Band {
        fn num_coefficients(&self) -> usize {
            self.coefs.len()
        }

        fn coefficients_at(&self, _position: DVec3, out: &mut [f64]) -> bool {
            out.copy_from_slice(&self.coefs);
            true
        }
    }

    #[test]
    fn test_field_straddling_threshold_only_accepts_above() {
        let field = Band::new();
        let params = TrackingParams {
            threshold: 0.6,
            max_angle_deg: 60.0,
            ..Default::default()
        };
        let config = SharedConfig::new(&params, field.num_coefficients()).unwrap();
        let mut evaluator = PathEvaluator::new(&field, &config).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(5);

        let mut trials = 0;
        let steps = 200;
        for _ in 0..steps {
            let mut s = state(1.0);
            match attempt_step(&mut s, &mut evaluator, &config, &mut rng) {
                StepOutcome::Accepted { probability, trials: n } => {
                    assert!(probability > config.prob_threshold());
                    let d = s.direction;
                    assert!(0.5 + 0.5 * d.x * d.x > 0.6 - 1e-9, "accepted {:?}", d);
                    trials += n;
                }
                other => panic!("step failed: {:?}", other),
            }
        }
        // Most of the cone lies below threshold, so rejections must occur
        assert!(trials > steps, "{} trials for {} steps", trials, steps);
    }
}
