//! A collection of particles advanced together under a shared set of forces.
//!
//! The system owns its particles and its simulation clock `t`. Forces are held
//! through [`ForceHandle`]s, so the same force (gravity, a thruster) can drive
//! several systems at once.

use crate::simulation::forces::ForceHandle;
use crate::simulation::integrator::{effective_timestep, integrate};
use crate::simulation::states::{NVec3, Particle};

/// What presentation needs to draw one particle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticleSprite {
    pub position: NVec3,
    pub radius: f64,
    pub remaining_life: Option<f64>, // None for unbounded particles
    pub normalized_age: f64, // 0 at birth, 1 at expiry
}

#[derive(Debug, Default)]
pub struct ParticleSystem {
    particles: Vec<Particle>, // live particles, order carries no meaning
    forces: Vec<ForceHandle>, // applied to every particle every tick
    t: f64, // simulation clock
}

impl ParticleSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a particle, stamping its birth with the current clock.
    pub fn add(&mut self, mut particle: Particle) {
        particle.birth = self.t;
        self.particles.push(particle);
    }

    /// Attach a shared force. The same handle may be attached to any number of
    /// systems.
    pub fn add_force(&mut self, force: ForceHandle) {
        self.forces.push(force);
    }

    /// Advance every particle by one tick.
    ///
    /// Each live particle gets every force applied once, is integrated, and is
    /// dropped afterwards if it expired by the end of the tick. A particle that
    /// expires during this tick is still fully integrated in it; it is only
    /// missing from the next one.
    pub fn update(&mut self, dt: f64) {
        let dt = effective_timestep(dt);
        let now = self.t + dt;

        for p in self.particles.iter_mut() {
            for force in &self.forces {
                force.borrow_mut().apply(p);
            }
            integrate(p, dt);
        }

        self.particles.retain(|p| p.is_alive(now));
        self.t = now;
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn particles_mut(&mut self) -> &mut [Particle] {
        &mut self.particles
    }

    pub fn particle(&self, i: usize) -> Option<&Particle> {
        self.particles.get(i)
    }

    pub fn particle_mut(&mut self, i: usize) -> Option<&mut Particle> {
        self.particles.get_mut(i)
    }

    pub fn forces(&self) -> &[ForceHandle] {
        &self.forces
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    /// Remove every particle; forces and clock are kept.
    pub fn clear(&mut self) {
        self.particles.clear();
    }

    pub fn time(&self) -> f64 {
        self.t
    }

    /// Mean particle position, `None` when the system is empty.
    pub fn centroid(&self) -> Option<NVec3> {
        if self.particles.is_empty() {
            return None;
        }
        let sum: NVec3 = self.particles.iter().map(|p| p.position).sum();
        Some(sum / self.particles.len() as f64)
    }

    pub fn render_data(&self) -> Vec<ParticleSprite> {
        self.particles
            .iter()
            .map(|p| ParticleSprite {
                position: p.position,
                radius: p.radius,
                remaining_life: p.remaining_life(self.t),
                normalized_age: p.normalized_age(self.t),
            })
            .collect()
    }
}
