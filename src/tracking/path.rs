//! Joint probability of a candidate path

use glam::DVec3;

use super::arc::{generate_arc_into, ArcSample};
use crate::config::SharedConfig;
use crate::error::Result;
use crate::field::{CoefficientSource, FieldSampler};

/// Outcome of evaluating one candidate arc
#[derive(Clone, Copy, Debug)]
pub struct PathProposal {
    /// Product of the amplitudes along the arc, NaN if the path is rejected
    pub probability: f64,
    /// Last sample of the arc
    pub position: DVec3,
    pub direction: DVec3,
}

/// Evaluates candidate arcs against the orientation field
///
/// Holds the per-context scratch (coefficients and arc samples), so one
/// evaluator belongs to one streamline at a time.
pub struct PathEvaluator<'a, F: CoefficientSource + ?Sized> {
    sampler: FieldSampler<'a, F>,
    samples: Vec<ArcSample>,
    threshold: f64,
    step_size: f64,
}

impl<'a, F: CoefficientSource + ?Sized> PathEvaluator<'a, F> {
    /// Fails if `field` holds fewer coefficients than `config.lmax()` needs
    pub fn new(field: &'a F, config: &'a SharedConfig) -> Result<Self> {
        Ok(Self {
            sampler: FieldSampler::new(field, config.basis())?,
            samples: vec![ArcSample::default(); config.num_samples()],
            threshold: config.threshold(),
            step_size: config.step_size(),
        })
    }

    /// Field sampler used for the arc samples
    pub fn sampler(&mut self) -> &mut FieldSampler<'a, F> {
        &mut self.sampler
    }

    /// Evaluate the arc from `position`/`direction` ending along `end_direction`
    ///
    /// The probability is NaN as soon as one sample has an undefined amplitude
    /// or one below the amplitude threshold; the remaining samples are skipped.
    pub fn evaluate(
        &mut self,
        position: DVec3,
        direction: DVec3,
        end_direction: DVec3,
    ) -> PathProposal {
        generate_arc_into(position, direction, end_direction, self.step_size, &mut self.samples);

        let mut probability = 1.0;
        for sample in &self.samples {
            let amplitude = self.sampler.amplitude(sample.position, sample.direction);
            // Also rejects NaN and negative lobes
            if !(amplitude >= self.threshold) {
                probability = f64::NAN;
                break;
            }
            probability *= amplitude;
        }

        let end = self.samples[self.samples.len() - 1];
        PathProposal {
            probability,
            position: end.position,
            direction: end.direction,
        }
    }
}
