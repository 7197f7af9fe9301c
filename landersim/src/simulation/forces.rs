//! Force contributors for the particle simulation
//!
//! Defines the closed set of force generators (uniform field, thrust, radial
//! impulse, turbulence) and the shared handle systems use to hold them.
//! A force only ever adds to a particle's force accumulator; the integrator
//! turns the accumulated force into motion and clears it.

use std::cell::RefCell;
use std::rc::Rc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::simulation::states::{NVec3, Particle};

/// A force shared between every system it is attached to. Thrust and impulse
/// forces are re-aimed by the application between ticks, so systems hold a
/// handle rather than a copy.
pub type ForceHandle = Rc<RefCell<Force>>;

/// Per-tick force generator.
///
/// [`Force::apply`] is the single dispatch point; new generators are new variants.
#[derive(Debug, Clone)]
pub enum Force {
    /// Uniform acceleration field (gravity). Adds `field * mass`, so every
    /// particle accelerates by `field` whatever its mass.
    ConstantField { field: NVec3 },

    /// Plain force vector, steered from outside. Zero while idle.
    DirectedThrust { thrust: NVec3 },

    /// Outward push away from `origin`, meant to be applied exactly once to a
    /// freshly spawned burst. Applies nothing while disarmed.
    RadialImpulse { magnitude: f64, origin: NVec3, armed: bool },

    /// Random force, each component drawn uniformly between the matching
    /// components of `min` and `max`, fresh every application.
    Turbulence { min: NVec3, max: NVec3, rng: StdRng },
}

impl Force {
    pub fn constant_field(field: NVec3) -> Self {
        Force::ConstantField { field }
    }

    /// Downward gravitational field of strength `g` (along -Y).
    pub fn gravity(g: f64) -> Self {
        Force::ConstantField { field: NVec3::new(0.0, -g, 0.0) }
    }

    pub fn thrust() -> Self {
        Force::DirectedThrust { thrust: NVec3::zeros() }
    }

    /// A disarmed radial impulse of the given magnitude.
    pub fn radial_impulse(magnitude: f64) -> Self {
        Force::RadialImpulse { magnitude, origin: NVec3::zeros(), armed: false }
    }

    /// Turbulence between two corners, with a reproducible random stream.
    pub fn turbulence(a: NVec3, b: NVec3, seed: u64) -> Self {
        Force::Turbulence {
            min: a.inf(&b),
            max: a.sup(&b),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Wrap into a handle that several systems can share.
    pub fn shared(self) -> ForceHandle {
        Rc::new(RefCell::new(self))
    }

    /// Add this force's contribution for the current tick to `p.force`.
    pub fn apply(&mut self, p: &mut Particle) {
        match self {
            Force::ConstantField { field } => {
                p.force += *field * p.mass();
            }
            Force::DirectedThrust { thrust } => {
                p.force += *thrust;
            }
            Force::RadialImpulse { magnitude, origin, armed } => {
                if !*armed {
                    return;
                }
                // freshly spawned particles sit on the origin; push them along
                // their launch velocity instead
                let dir = (p.position - *origin)
                    .try_normalize(1e-9)
                    .or_else(|| p.velocity.try_normalize(1e-9));
                if let Some(dir) = dir {
                    p.force += dir * *magnitude;
                }
            }
            Force::Turbulence { min, max, rng } => {
                let mut sample = NVec3::zeros();
                for k in 0..3 {
                    sample[k] = if min[k] < max[k] {
                        rng.random_range(min[k]..max[k])
                    } else {
                        min[k]
                    };
                }
                p.force += sample;
            }
        }
    }

    /// Re-aim a thrust force. Other variants ignore the call.
    pub fn set_thrust(&mut self, v: NVec3) {
        if let Force::DirectedThrust { thrust } = self {
            *thrust = v;
        }
    }

    /// Current thrust vector, `None` for other variants.
    pub fn thrust_vector(&self) -> Option<NVec3> {
        match self {
            Force::DirectedThrust { thrust } => Some(*thrust),
            _ => None,
        }
    }

    /// Enable a radial impulse centred on `at`.
    pub fn arm(&mut self, at: NVec3) {
        if let Force::RadialImpulse { origin, armed, .. } = self {
            *origin = at;
            *armed = true;
        }
    }

    pub fn disarm(&mut self) {
        if let Force::RadialImpulse { armed, .. } = self {
            *armed = false;
        }
    }

    pub fn is_armed(&self) -> bool {
        matches!(self, Force::RadialImpulse { armed: true, .. })
    }
}
