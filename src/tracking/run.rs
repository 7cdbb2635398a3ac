//! Tracking many streamlines in parallel
//!
//! Streamlines are independent: each gets its own propagator and its own
//! `ChaCha8Rng`, seeded from the run seed plus the seed index, so results do
//! not depend on how rayon schedules the work.

use glam::DVec3;
use log::info;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use super::propagator::{PropagationStats, PropagatorStatus, StreamlinePropagator};
use crate::config::SharedConfig;
use crate::error::Result;
use crate::field::{CoefficientSource, FieldSampler};

/// Orchestration options
#[derive(Clone, Copy, Debug)]
pub struct TrackOptions {
    /// Steps after which a streamline is cut off
    pub max_steps: usize,
    /// Base seed for the per-streamline generators
    pub seed: u64,
}

impl Default for TrackOptions {
    fn default() -> Self {
        Self {
            max_steps: 1000,
            seed: 0,
        }
    }
}

/// Vertices of one streamline, starting at its seed
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Streamline {
    pub points: Vec<DVec3>,
}

/// Aggregated result of a tracking run
#[derive(Clone, Debug, Default)]
pub struct TrackingReport {
    /// Streamlines in seed order; seeds that failed to initialize are skipped
    pub streamlines: Vec<Streamline>,
    pub seeding_failures: usize,
    pub total_trials: u64,
    pub total_steps: u64,
}

impl TrackingReport {
    /// Mean sampling-loop draws per accepted step over the whole run
    pub fn mean_trials_per_step(&self) -> f64 {
        if self.total_steps == 0 {
            return 0.0;
        }
        self.total_trials as f64 / self.total_steps as f64
    }
}

/// Grow a single streamline from `seed` for at most `max_steps` steps
///
/// Returns `None` as the streamline when seeding fails, and an error when
/// the field does not match `config`.
pub fn track_one<F, R>(
    field: &F,
    config: &SharedConfig,
    seed: DVec3,
    rng: R,
    max_steps: usize,
) -> Result<(Option<Streamline>, PropagationStats)>
where
    F: CoefficientSource + ?Sized,
    R: Rng,
{
    let mut propagator = StreamlinePropagator::new(field, config, seed, rng)?;
    if propagator.initialize() != PropagatorStatus::Seeded {
        return Ok((None, propagator.finish()));
    }

    let mut points = vec![seed];
    for _ in 0..max_steps {
        if propagator.advance() != PropagatorStatus::Seeded {
            break;
        }
        points.push(propagator.position());
    }

    Ok((Some(Streamline { points }), propagator.finish()))
}

/// Track one streamline per seed, in parallel
///
/// Fails before any tracking if the field does not match `config`.
pub fn track<F>(
    field: &F,
    config: &SharedConfig,
    seeds: &[DVec3],
    options: &TrackOptions,
) -> Result<TrackingReport>
where
    F: CoefficientSource + ?Sized,
{
    FieldSampler::new(field, config.basis())?;

    let results: Vec<(Option<Streamline>, PropagationStats)> = seeds
        .par_iter()
        .enumerate()
        .map(|(i, &seed)| {
            let rng = ChaCha8Rng::seed_from_u64(options.seed.wrapping_add(i as u64));
            track_one(field, config, seed, rng, options.max_steps)
        })
        .collect::<Result<_>>()?;

    let mut report = TrackingReport::default();
    for (streamline, stats) in results {
        report.total_trials += stats.trials;
        report.total_steps += stats.steps;
        match streamline {
            Some(s) => report.streamlines.push(s),
            None => report.seeding_failures += 1,
        }
    }

    info!(
        "tracked {} streamlines ({} seeding failures), mean number of samples per step = {}",
        report.streamlines.len(),
        report.seeding_failures,
        report.mean_trials_per_step()
    );
    Ok(report)
}
