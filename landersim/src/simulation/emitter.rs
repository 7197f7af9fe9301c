//! Particle emitters: spawn cadence on top of a [`ParticleSystem`].
//!
//! An emitter is either continuous (spawns at `rate` emission events per
//! second while running) or one-shot (spawns one burst per activation). The
//! pattern decides what a single emission event produces:
//!
//! - [`EmissionPattern::Directional`]: one particle with the template velocity
//!   (thruster exhaust),
//! - [`EmissionPattern::Radial`]: `group_size` particles fanned out over a cone
//!   around the template direction (explosion debris; a spread of π covers the
//!   whole sphere).
//!
//! Activity is an explicit state machine:
//!
//! ```text
//!   Idle --start()--> Emitting    (continuous)
//!   Idle --start()--> Exhausted   (one-shot, burst emitted during start())
//!   Emitting | Exhausted --stop()--> Idle
//! ```
//!
//! Starting an emitter that is not idle does nothing, so a one-shot emitter
//! bursts once per stop/start cycle however often `start()` is called.

use std::f64::consts::{PI, TAU};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{Error, Result};
use crate::simulation::forces::ForceHandle;
use crate::simulation::integrator::effective_timestep;
use crate::simulation::particle_system::ParticleSystem;
use crate::simulation::states::{NVec3, Particle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmissionPattern {
    Directional,
    Radial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitterState {
    Idle,
    Emitting,
    Exhausted,
}

/// Template for an emitter and the particles it spawns.
#[derive(Debug, Clone)]
pub struct EmitterSettings {
    pub pattern: EmissionPattern,
    pub one_shot: bool,
    pub rate: f64, // emission events per second (continuous mode)
    pub group_size: i64, // particles per radial event / burst
    pub velocity: NVec3, // directional velocity; radial axis direction
    pub speed: f64, // radial launch speed
    pub spread: f64, // radial cone half-angle in radians, PI = full sphere
    pub radius: f64,
    pub lifespan: f64, // <= 0 means unbounded
    pub mass: f64,
    pub damping: f64,
    pub seed: u64,
}

impl Default for EmitterSettings {
    fn default() -> Self {
        Self {
            pattern: EmissionPattern::Directional,
            one_shot: false,
            rate: 1.0,
            group_size: 1,
            velocity: NVec3::zeros(),
            speed: 1.0,
            spread: PI,
            radius: 0.1,
            lifespan: 5.0,
            mass: 1.0,
            damping: 0.99,
            seed: 0,
        }
    }
}

impl EmitterSettings {
    pub fn validate(&self) -> Result<()> {
        if !self.rate.is_finite() || self.rate < 0.0 {
            return Err(Error::config(format!("emitter rate must be finite and >= 0, got {}", self.rate)));
        }
        if self.group_size < 0 {
            return Err(Error::config(format!("emitter group_size must be >= 0, got {}", self.group_size)));
        }
        if !self.spread.is_finite() || self.spread < 0.0 {
            return Err(Error::config(format!("emitter spread must be finite and >= 0, got {}", self.spread)));
        }
        if !self.speed.is_finite() {
            return Err(Error::config("emitter speed must be finite"));
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct ParticleEmitter {
    system: ParticleSystem,
    settings: EmitterSettings,
    group_size: usize,
    position: NVec3,
    state: EmitterState,
    carry: f64, // fractional emission events owed from previous ticks
    rng: StdRng,
    burst_impulse: Option<ForceHandle>,
    impulse_pending: bool, // armed by a burst, released after the next update
    emitted: usize,
}

impl ParticleEmitter {
    /// Build an idle emitter with an empty system of its own.
    ///
    /// Fails with [`Error::InvalidConfiguration`] for a negative rate or group
    /// size.
    pub fn new(settings: EmitterSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            system: ParticleSystem::new(),
            group_size: settings.group_size as usize,
            position: NVec3::zeros(),
            state: EmitterState::Idle,
            carry: 0.0,
            rng: StdRng::seed_from_u64(settings.seed),
            burst_impulse: None,
            impulse_pending: false,
            emitted: 0,
            settings,
        })
    }

    /// Attach a force to the owned system.
    pub fn add_force(&mut self, force: ForceHandle) {
        self.system.add_force(force);
    }

    /// Attach a radial impulse that is armed at every burst (centred on the
    /// emitter) and disarmed again after the following update.
    pub fn set_burst_impulse(&mut self, impulse: ForceHandle) {
        impulse.borrow_mut().disarm();
        self.system.add_force(impulse.clone());
        self.burst_impulse = Some(impulse);
    }

    pub fn start(&mut self) {
        if self.state != EmitterState::Idle {
            return;
        }
        if self.settings.one_shot {
            self.emit_event();
            self.state = EmitterState::Exhausted;
        } else {
            self.carry = 0.0;
            self.state = EmitterState::Emitting;
        }
        tracing::debug!(state = ?self.state, position = ?self.position, "emitter started");
    }

    /// Stop emitting; particles already spawned live on.
    pub fn stop(&mut self) {
        self.state = EmitterState::Idle;
    }

    /// Advance the owned particles, then spawn whatever this tick owes.
    ///
    /// Newly spawned particles start integrating on the next update.
    pub fn update(&mut self, dt: f64) {
        self.system.update(dt);

        if self.impulse_pending {
            if let Some(impulse) = &self.burst_impulse {
                impulse.borrow_mut().disarm();
            }
            self.impulse_pending = false;
        }

        if self.state != EmitterState::Emitting {
            return;
        }

        let dt = effective_timestep(dt);
        self.carry += self.settings.rate * dt;
        let events = self.carry.floor();
        self.carry -= events;
        for _ in 0..events as usize {
            self.emit_event();
        }
    }

    pub fn state(&self) -> EmitterState {
        self.state
    }

    pub fn settings(&self) -> &EmitterSettings {
        &self.settings
    }

    pub fn system(&self) -> &ParticleSystem {
        &self.system
    }

    pub fn system_mut(&mut self) -> &mut ParticleSystem {
        &mut self.system
    }

    pub fn position(&self) -> NVec3 {
        self.position
    }

    /// Move the emitter. Particles already spawned stay where they are.
    pub fn set_position(&mut self, position: NVec3) {
        self.position = position;
    }

    /// Template velocity for directional particles (and radial axis).
    pub fn set_velocity(&mut self, velocity: NVec3) {
        self.settings.velocity = velocity;
    }

    /// Particles spawned since construction.
    pub fn emitted_total(&self) -> usize {
        self.emitted
    }

    // helpers ==============================================================================

    fn emit_event(&mut self) {
        match self.settings.pattern {
            EmissionPattern::Directional => {
                let p = self.spawn(self.settings.velocity);
                self.system.add(p);
                self.emitted += 1;
            }
            EmissionPattern::Radial => {
                let axis = self
                    .settings
                    .velocity
                    .try_normalize(1e-12)
                    .unwrap_or_else(|| NVec3::new(0.0, 1.0, 0.0));
                for _ in 0..self.group_size {
                    let dir = sample_cone(&mut self.rng, axis, self.settings.spread);
                    let p = self.spawn(dir * self.settings.speed);
                    self.system.add(p);
                }
                self.emitted += self.group_size;
                if let Some(impulse) = &self.burst_impulse {
                    impulse.borrow_mut().arm(self.position);
                    self.impulse_pending = true;
                }
            }
        }
    }

    fn spawn(&self, velocity: NVec3) -> Particle {
        Particle::new(self.position)
            .with_velocity(velocity)
            .with_radius(self.settings.radius)
            .with_lifespan(self.settings.lifespan)
            .with_mass(self.settings.mass)
            .with_damping(self.settings.damping)
    }
}

/// Uniform random unit vector within `half_angle` of `axis` (unit length).
fn sample_cone(rng: &mut StdRng, axis: NVec3, half_angle: f64) -> NVec3 {
    let cos_max = half_angle.min(PI).cos();
    // uniform in solid angle: cos(theta) uniform in [cos_max, 1]
    let z = if cos_max < 1.0 { rng.random_range(cos_max..=1.0) } else { 1.0 };
    let phi = rng.random_range(0.0..TAU);
    let r = (1.0 - z * z).max(0.0).sqrt();
    let local = NVec3::new(r * phi.cos(), r * phi.sin(), z);
    rotate_from_z(local, axis)
}

/// Rotate `v` so that +Z maps onto `dir` (unit length).
fn rotate_from_z(v: NVec3, dir: NVec3) -> NVec3 {
    // helper: the world axis least aligned with `dir`, never parallel to it
    let a = dir.abs();
    let helper = if a.x <= a.y && a.x <= a.z {
        NVec3::x()
    } else if a.y <= a.z {
        NVec3::y()
    } else {
        NVec3::z()
    };
    let right = helper.cross(&dir).normalize();
    let up = dir.cross(&right);
    right * v.x + up * v.y + dir * v.z
}
