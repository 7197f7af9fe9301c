//! Core state types for the particle simulation.
//!
//! Defines the simulated point mass:
//! - `Particle` using `NVec3` (3d), with linear and angular state
//!
//! The craft itself is a single `Particle`; exhaust and debris are short-lived
//! particles owned by emitters.

use nalgebra::Vector3;
pub type NVec3 = Vector3<f64>;

/// Fallback mass substituted for a non-positive or non-finite mass.
pub const DEFAULT_MASS: f64 = 1.0;

/// Smallest damping factor a particle accepts; lower requests are clamped up to it.
pub const MIN_DAMPING: f64 = 1e-6;

#[derive(Debug, Clone)]
pub struct Particle {
    pub position: NVec3, // position
    pub velocity: NVec3, // velocity
    pub acceleration: NVec3, // constant acceleration added on top of forces
    pub force: NVec3, // force accumulator, cleared every tick
    pub rotation: f64, // heading about the vertical axis (degrees)
    pub angular_velocity: f64, // degrees per second
    pub angular_acceleration: f64,
    pub torque: f64, // angular accumulator, cleared every tick
    mass: f64, // > 0
    damping: f64, // (0, 1], per-tick velocity multiplier
    pub radius: f64, // render/collision size
    pub birth: f64, // simulation time of creation
    pub lifespan: f64, // seconds; <= 0 means unbounded
}

impl Default for Particle {
    fn default() -> Self {
        Self {
            position: NVec3::zeros(),
            velocity: NVec3::zeros(),
            acceleration: NVec3::zeros(),
            force: NVec3::zeros(),
            rotation: 0.0,
            angular_velocity: 0.0,
            angular_acceleration: 0.0,
            torque: 0.0,
            mass: DEFAULT_MASS,
            damping: 0.99,
            radius: 0.1,
            birth: 0.0,
            lifespan: 5.0,
        }
    }
}

impl Particle {
    pub fn new(position: NVec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    pub fn with_velocity(mut self, velocity: NVec3) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn with_mass(mut self, mass: f64) -> Self {
        self.set_mass(mass);
        self
    }

    pub fn with_damping(mut self, damping: f64) -> Self {
        self.set_damping(damping);
        self
    }

    pub fn with_radius(mut self, radius: f64) -> Self {
        self.radius = radius;
        self
    }

    pub fn with_lifespan(mut self, lifespan: f64) -> Self {
        self.lifespan = lifespan;
        self
    }

    pub fn mass(&self) -> f64 {
        self.mass
    }

    /// Set the mass; a non-positive or non-finite value is replaced by
    /// [`DEFAULT_MASS`] so `force / mass` stays finite.
    pub fn set_mass(&mut self, mass: f64) {
        if mass.is_finite() && mass > 0.0 {
            self.mass = mass;
        } else {
            tracing::warn!(mass, substitute = DEFAULT_MASS, "invalid particle mass");
            self.mass = DEFAULT_MASS;
        }
    }

    pub fn damping(&self) -> f64 {
        self.damping
    }

    /// Set the per-tick damping factor, clamped into `[MIN_DAMPING, 1]`.
    /// NaN falls back to 1.0 (no decay).
    pub fn set_damping(&mut self, damping: f64) {
        let clamped = if damping.is_nan() { 1.0 } else { damping.clamp(MIN_DAMPING, 1.0) };
        if clamped != damping {
            tracing::warn!(damping, substitute = clamped, "particle damping outside (0, 1]");
        }
        self.damping = clamped;
    }

    pub fn speed(&self) -> f64 {
        self.velocity.norm()
    }

    /// Seconds since birth, measured on the owning system's clock.
    pub fn age(&self, now: f64) -> f64 {
        now - self.birth
    }

    pub fn is_alive(&self, now: f64) -> bool {
        self.lifespan <= 0.0 || self.age(now) < self.lifespan
    }

    /// Seconds left before expiry, `None` for unbounded particles.
    pub fn remaining_life(&self, now: f64) -> Option<f64> {
        (self.lifespan > 0.0).then(|| (self.lifespan - self.age(now)).max(0.0))
    }

    /// Age as a fraction of lifespan in [0, 1]; 0 for unbounded particles.
    /// Presentation uses it for fading.
    pub fn normalized_age(&self, now: f64) -> f64 {
        if self.lifespan <= 0.0 {
            0.0
        } else {
            (self.age(now) / self.lifespan).clamp(0.0, 1.0)
        }
    }
}
