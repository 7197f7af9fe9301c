//! Fixed-step time integrator for particles
//!
//! Provides a damped explicit Euler step (`integrate`) plus the timestep
//! guards every caller goes through before stepping

use super::states::Particle;

/// Substituted for a missing, non-finite or non-positive timestep.
pub const DEFAULT_TIMESTEP: f64 = 1.0;

/// Return `dt` if it is usable, otherwise [`DEFAULT_TIMESTEP`].
pub fn effective_timestep(dt: f64) -> f64 {
    if dt.is_finite() && dt > 0.0 {
        dt
    } else {
        tracing::warn!(dt, substitute = DEFAULT_TIMESTEP, "unusable timestep");
        DEFAULT_TIMESTEP
    }
}

/// Timestep for one frame at `fps` frames per second; [`DEFAULT_TIMESTEP`] when
/// the frame rate is not known yet (zero, negative or non-finite).
pub fn timestep_from_frame_rate(fps: f64) -> f64 {
    if fps.is_finite() && fps > 0.0 {
        1.0 / fps
    } else {
        DEFAULT_TIMESTEP
    }
}

/// Advance one particle by `dt` using the accumulated force, then clear it.
///
/// Position moves with the velocity from the start of the step, velocity picks
/// up `acceleration + force / mass`, and the damping factor is applied once per
/// tick as a multiplicative decay. Rotation follows the same scheme with its
/// own accumulator. Forces must be resubmitted every tick.
pub fn integrate(p: &mut Particle, dt: f64) {
    let dt = effective_timestep(dt);
    let damping = p.damping();
    let inv_mass = p.mass().recip();

    // x_n+1 = x_n + v_n dt
    p.position += p.velocity * dt;

    // v_n+1 = (v_n + (a + F/m) dt) * damping
    let accel = p.acceleration + p.force * inv_mass;
    p.velocity += accel * dt;
    p.velocity *= damping;

    p.force.fill(0.0);

    // angular state, independent of the linear state
    p.rotation += p.angular_velocity * dt;
    let angular_accel = p.angular_acceleration + p.torque * inv_mass;
    p.angular_velocity += angular_accel * dt;
    p.angular_velocity *= damping;

    p.torque = 0.0;
}
