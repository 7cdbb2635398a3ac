//! Random directions on the unit sphere

use std::f64::consts::TAU;

use glam::DVec3;
use rand::Rng;
use rand_distr::StandardNormal;

/// Draw a direction uniformly over the unit sphere
///
/// Uses three normal deviates, which is isotropic by construction.
pub fn random_unit_vector<R: Rng>(rng: &mut R) -> DVec3 {
    loop {
        let v = DVec3::new(
            rng.sample(StandardNormal),
            rng.sample(StandardNormal),
            rng.sample(StandardNormal),
        );
        if let Some(unit) = v.try_normalize() {
            return unit;
        }
    }
}

/// Draw a direction uniformly over the spherical cap around `reference`
///
/// The cap has half-angle `max_angle`, passed as its versine
/// `1 - cos(max_angle)`. The polar offset is drawn with its cosine uniform in
/// `[cos(max_angle), 1]`, which gives equal density per solid angle.
///
/// # Arguments
/// * `reference` - Cap axis (unit vector)
/// * `versine_max_angle` - `1 - cos(max_angle)`, in (0, 2]
pub fn random_direction_in_cone<R: Rng>(
    rng: &mut R,
    reference: DVec3,
    versine_max_angle: f64,
) -> DVec3 {
    let phi = TAU * rng.gen::<f64>();
    let offset = versine_max_angle * rng.gen::<f64>();
    let cos_theta = 1.0 - offset;
    // sin² = (1 - cos)(1 + cos), stable for small offsets
    let sin_theta = (offset * (2.0 - offset)).max(0.0).sqrt();

    let (e1, e2) = reference.any_orthonormal_pair();
    let (sin_phi, cos_phi) = phi.sin_cos();
    (cos_theta * reference + sin_theta * (cos_phi * e1 + sin_phi * e2)).normalize()
}
