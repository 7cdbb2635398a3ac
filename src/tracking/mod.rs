//! Probabilistic streamline propagation
//!
//! Second-order integration over fibre orientation distributions: each step
//! proposes a constant-curvature arc, scores it by the product of field
//! amplitudes along it, and accepts it by rejection sampling.
//!
//! - `arc`: arc geometry for a candidate step
//! - `direction`: sphere- and cone-uniform random directions
//! - `path`: joint probability of a candidate arc
//! - `sampler`: the rejection-sampling step
//! - `propagator`: per-streamline state machine
//! - `run`: parallel tracking over many seeds

pub mod arc;
pub mod direction;
pub mod path;
pub mod propagator;
pub mod run;
pub mod sampler;

pub use arc::{generate_arc, generate_arc_into, ArcSample};
pub use direction::{random_direction_in_cone, random_unit_vector};
pub use path::{PathEvaluator, PathProposal};
pub use propagator::{PropagationStats, PropagatorState, PropagatorStatus, StreamlinePropagator};
pub use run::{track, track_one, Streamline, TrackOptions, TrackingReport};
pub use sampler::{attempt_step, StepOutcome};
