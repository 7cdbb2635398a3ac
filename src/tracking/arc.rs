//! Constant-curvature candidate paths
//!
//! A step of length `step_size` bends from the current direction towards an
//! end direction along a circular arc, which keeps the curvature bounded by
//! the turning angle. The arc is sampled at `num_samples` evenly spaced
//! points, the last of which is the proposed next position.

use glam::DVec3;

/// One point along a candidate path
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ArcSample {
    pub position: DVec3,
    /// Unit tangent at `position`
    pub direction: DVec3,
}

impl Default for ArcSample {
    fn default() -> Self {
        Self {
            position: DVec3::ZERO,
            direction: DVec3::Z,
        }
    }
}

/// Sample the arc from `position` along `direction` ending tangent to `end_direction`
///
/// Fills every entry of `out`; `out.len()` is the number of samples. When the
/// end direction equals the current one the path is a straight segment.
///
/// # Arguments
/// * `position` - Start of the step
/// * `direction` - Current unit direction
/// * `end_direction` - Unit tangent at the end of the step
/// * `step_size` - Arc length of the step
/// * `out` - Output samples, ordered from the start
pub fn generate_arc_into(
    position: DVec3,
    direction: DVec3,
    end_direction: DVec3,
    step_size: f64,
    out: &mut [ArcSample],
) {
    let num_samples = out.len();
    if num_samples == 0 {
        return;
    }

    let cos_theta = end_direction.dot(direction).clamp(-1.0, 1.0);
    let theta = cos_theta.acos();

    if theta == 0.0 {
        let spacing = step_size / num_samples as f64;
        for (i, sample) in out.iter_mut().enumerate() {
            *sample = ArcSample {
                position: position + ((i + 1) as f64 * spacing) * direction,
                direction,
            };
        }
        return;
    }

    // In-plane axis orthogonal to the current direction, towards the end
    let curv = (end_direction - cos_theta * direction)
        .try_normalize()
        .unwrap_or_else(|| direction.any_orthonormal_vector());
    let radius = step_size / theta;

    let last = num_samples - 1;
    for (i, sample) in out[..last].iter_mut().enumerate() {
        let a = theta * (i + 1) as f64 / num_samples as f64;
        let (sin_a, cos_a) = a.sin_cos();
        *sample = ArcSample {
            position: position + radius * (sin_a * direction + versine(a) * curv),
            direction: (cos_a * direction + sin_a * curv).normalize(),
        };
    }
    out[last] = ArcSample {
        position: position + radius * (theta.sin() * direction + versine(theta) * curv),
        direction: end_direction,
    };
}

/// `1 - cos(a)` without cancellation for small angles
#[inline]
fn versine(a: f64) -> f64 {
    let h = (0.5 * a).sin();
    2.0 * h * h
}

/// Allocating form of [`generate_arc_into`]
pub fn generate_arc(
    position: DVec3,
    direction: DVec3,
    end_direction: DVec3,
    num_samples: usize,
    step_size: f64,
) -> Vec<ArcSample> {
    let mut out = vec![ArcSample::default(); num_samples];
    generate_arc_into(position, direction, end_direction, step_size, &mut out);
    out
}
