//! Build a fully-initialized lander run from configuration
//!
//! Takes a `ScenarioConfig` (YAML-facing) and produces the runtime context
//! (`Scenario`) that owns everything a tick touches:
//! - numerical parameters (`Parameters`)
//! - the terrain octree (`SpatialIndex`)
//! - the craft particle and the forces driving it (gravity, thrust)
//! - thrust exhaust and explosion emitters
//! - collision resolver, altitude radar and landing pad
//! - fuel and mission phase
//!
//! A presentation layer reads positions, flags and particle render data from
//! the scenario after each `step`; the headless binary just logs them.

use crate::configuration::config::{vec3, EmitterConfig, PatternConfig, ScenarioConfig, TerrainConfig};
use crate::error::{Error, Result};
use crate::simulation::collision::{AltitudeRadar, CollisionResolver, ContactEvent, ContactThresholds};
use crate::simulation::emitter::{EmissionPattern, EmitterSettings, ParticleEmitter};
use crate::simulation::forces::{Force, ForceHandle};
use crate::simulation::geometry::Aabb;
use crate::simulation::integrator::{effective_timestep, integrate};
use crate::simulation::mesh::Mesh;
use crate::simulation::octree::{IndexSettings, SpatialIndex};
use crate::simulation::params::Parameters;
use crate::simulation::states::{NVec3, Particle};

/// Where the run stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissionPhase {
    /// Built but not launched; the craft is held in place.
    Standby,
    Flying,
    Landed { inside: bool },
    Crashed,
}

impl MissionPhase {
    pub fn is_over(&self) -> bool {
        matches!(self, MissionPhase::Landed { .. } | MissionPhase::Crashed)
    }
}

/// Snapshot returned by [`Scenario::step`].
#[derive(Debug, Clone, Copy)]
pub struct StepReport {
    pub t: f64,
    pub phase: MissionPhase,
    pub event: ContactEvent,
    pub altitude: Option<f64>,
    pub fuel: f64,
    pub position: NVec3,
    pub velocity: NVec3,
}

/// Scripted thrust input, `at` seconds after launch.
#[derive(Debug, Clone, Copy)]
pub struct ThrustCommand {
    pub at: f64,
    pub thrust: NVec3,
}

#[derive(Debug)]
pub struct Scenario {
    pub parameters: Parameters,
    index: SpatialIndex,
    craft: Particle,
    spawn: Particle, // craft state restored by `reset`
    craft_forces: Vec<ForceHandle>, // gravity, thrust
    thrust: ForceHandle,
    thrust_emitter: ParticleEmitter,
    explosion: ParticleEmitter,
    resolver: CollisionResolver,
    radar: AltitudeRadar,
    target_zone: Aabb,
    craft_bounds: Aabb, // relative to the craft position
    fuel: f64,
    command: NVec3, // per-axis thrust in units of `thrust_magnitude`
    schedule: Vec<ThrustCommand>, // sorted by `at`
    next_command: usize,
    phase: MissionPhase,
    flight_time: f64,
    t: f64,
}

impl Scenario {
    pub fn build_scenario(cfg: ScenarioConfig) -> Result<Self> {
        // Parameters (runtime) from ParametersConfig
        let p_cfg = &cfg.parameters;
        let parameters = Parameters {
            t_end: p_cfg.t_end,
            h0: p_cfg.h0,
            gravity: p_cfg.gravity,
            thrust_magnitude: p_cfg.thrust_magnitude,
            fuel: p_cfg.fuel,
            fuel_burn_rate: p_cfg.fuel_burn_rate,
            contact: ContactThresholds {
                contact_epsilon: p_cfg.contact_epsilon,
                crash_speed: p_cfg.crash_speed,
                landing_speed: p_cfg.landing_speed,
                restitution: p_cfg.restitution,
            },
        };
        parameters.validate()?;

        // Terrain and its octree
        let settings = IndexSettings {
            max_depth: cfg.index.max_depth,
            leaf_threshold: cfg.index.leaf_threshold,
            ray_tolerance: cfg.index.ray_tolerance,
        };
        check_terrain_coverage(&cfg.terrain, &parameters.contact, &settings)?;
        let mesh = build_terrain(&cfg.terrain)?;
        let index = SpatialIndex::build(mesh, settings)?;

        // Craft, unbounded lifespan
        let craft = Particle::new(vec3(cfg.craft.position))
            .with_velocity(vec3(cfg.craft.velocity))
            .with_mass(cfg.craft.mass)
            .with_damping(cfg.craft.damping)
            .with_lifespan(0.0);

        let gravity = Force::gravity(parameters.gravity).shared();
        let thrust = Force::thrust().shared();

        // Exhaust plume, jittered by turbulence
        let mut thrust_emitter = ParticleEmitter::new(emitter_settings(&cfg.thrust_emitter))?;
        let turbulence = &cfg.turbulence;
        thrust_emitter.add_force(Force::turbulence(vec3(turbulence.min), vec3(turbulence.max), turbulence.seed).shared());

        // Debris: pushed out once at burst time, then falls
        let mut explosion = ParticleEmitter::new(emitter_settings(&cfg.explosion_emitter))?;
        explosion.set_burst_impulse(Force::radial_impulse(cfg.explosion_impulse).shared());
        explosion.add_force(gravity.clone());

        let resolver = CollisionResolver::new(parameters.contact)?;

        let mut schedule: Vec<ThrustCommand> = cfg
            .thrust_schedule
            .iter()
            .map(|c| ThrustCommand { at: c.at, thrust: vec3(c.thrust) })
            .collect();
        schedule.sort_by(|a, b| a.at.total_cmp(&b.at));

        tracing::info!(
            vertices = index.mesh().len(),
            nodes = index.nodes().len(),
            leaves = index.leaf_count(),
            depth = index.depth_reached(),
            "scenario built"
        );

        Ok(Self {
            fuel: parameters.fuel,
            parameters,
            index,
            spawn: craft.clone(),
            craft,
            craft_forces: vec![gravity, thrust.clone()],
            thrust,
            thrust_emitter,
            explosion,
            resolver,
            radar: AltitudeRadar::new(),
            target_zone: Aabb::new(vec3(cfg.target_zone.min), vec3(cfg.target_zone.max)),
            craft_bounds: Aabb::new(vec3(cfg.craft.bounds_min), vec3(cfg.craft.bounds_max)),
            command: NVec3::zeros(),
            schedule,
            next_command: 0,
            phase: MissionPhase::Standby,
            flight_time: 0.0,
            t: 0.0,
        })
    }

    /// Release the craft. Only leaves `Standby`.
    pub fn launch(&mut self) {
        if self.phase == MissionPhase::Standby {
            self.phase = MissionPhase::Flying;
            tracing::info!(position = ?self.craft.position, fuel = self.fuel, "launch");
        }
    }

    /// Put the craft back at its spawn state with a full tank.
    pub fn reset(&mut self) {
        self.craft = self.spawn.clone();
        self.fuel = self.parameters.fuel;
        self.command = NVec3::zeros();
        self.thrust.borrow_mut().set_thrust(NVec3::zeros());
        self.next_command = 0;
        self.flight_time = 0.0;
        self.resolver.reset();
        self.thrust_emitter.stop();
        self.explosion.stop();
        self.phase = MissionPhase::Standby;
    }

    /// Commanded thrust per axis, in units of `thrust_magnitude`. Takes effect
    /// on the next step while fuel lasts.
    pub fn set_thrust(&mut self, command: NVec3) {
        self.command = command;
    }

    /// Heading rate in degrees per second.
    pub fn set_spin(&mut self, rate: f64) {
        self.craft.angular_velocity = rate;
    }

    /// Advance the run by one tick.
    ///
    /// While flying: scripted commands due by now are applied, fuel is burned,
    /// the craft integrates under gravity and thrust, and contact is resolved
    /// against the terrain (a bounce force lands in the craft's accumulator for
    /// the next tick). Emitters update in every phase so effects play out.
    pub fn step(&mut self, dt: f64) -> StepReport {
        let dt = effective_timestep(dt);
        let mut event = ContactEvent::None;

        if self.phase == MissionPhase::Flying {
            self.apply_due_commands();
            self.burn_fuel(dt);
            self.advance_craft(dt);
            event = self.resolve_contact(dt);
            self.flight_time += dt;
        } else {
            self.thrust_emitter.stop();
        }

        self.thrust_emitter.set_position(self.craft.position);
        self.thrust_emitter.update(dt);
        self.explosion.update(dt);

        let altitude = self.radar.update(&self.index, self.craft.position);
        self.t += dt;

        tracing::trace!(t = self.t, altitude, fuel = self.fuel, phase = ?self.phase, "step");

        StepReport {
            t: self.t,
            phase: self.phase,
            event,
            altitude,
            fuel: self.fuel,
            position: self.craft.position,
            velocity: self.craft.velocity,
        }
    }

    pub fn phase(&self) -> MissionPhase {
        self.phase
    }

    pub fn time(&self) -> f64 {
        self.t
    }

    pub fn flight_time(&self) -> f64 {
        self.flight_time
    }

    pub fn fuel(&self) -> f64 {
        self.fuel
    }

    pub fn altitude(&self) -> Option<f64> {
        self.radar.altitude()
    }

    pub fn craft(&self) -> &Particle {
        &self.craft
    }

    pub fn craft_position(&self) -> NVec3 {
        self.craft.position
    }

    pub fn craft_velocity(&self) -> NVec3 {
        self.craft.velocity
    }

    /// World-space bounding box of the craft.
    pub fn craft_box(&self) -> Aabb {
        self.craft_bounds.translate(self.craft.position)
    }

    /// Move the craft by hand. Only allowed before launch.
    pub fn place_craft(&mut self, position: NVec3) {
        if self.phase == MissionPhase::Standby {
            self.craft.position = position;
            self.spawn.position = position;
        }
    }

    pub fn target_zone(&self) -> Aabb {
        self.target_zone
    }

    pub fn index(&self) -> &SpatialIndex {
        &self.index
    }

    pub fn resolver(&self) -> &CollisionResolver {
        &self.resolver
    }

    pub fn thrust_emitter(&self) -> &ParticleEmitter {
        &self.thrust_emitter
    }

    pub fn explosion_emitter(&self) -> &ParticleEmitter {
        &self.explosion
    }

    // helpers ==============================================================================

    fn apply_due_commands(&mut self) {
        while let Some(cmd) = self.schedule.get(self.next_command) {
            if cmd.at > self.flight_time {
                break;
            }
            tracing::debug!(at = cmd.at, thrust = ?cmd.thrust, "thrust command");
            self.command = cmd.thrust;
            self.next_command += 1;
        }
    }

    fn burn_fuel(&mut self, dt: f64) {
        let thrusting = self.command != NVec3::zeros() && self.fuel > 0.0;
        if thrusting {
            self.fuel = (self.fuel - self.parameters.fuel_burn_rate * dt).max(0.0);
            if self.fuel == 0.0 {
                tracing::info!(t = self.t, "fuel exhausted");
            }
            self.thrust.borrow_mut().set_thrust(self.command * self.parameters.thrust_magnitude);
            self.thrust_emitter.set_position(self.craft.position);
            self.thrust_emitter.start();
        } else {
            self.thrust.borrow_mut().set_thrust(NVec3::zeros());
            self.thrust_emitter.stop();
        }
    }

    fn advance_craft(&mut self, dt: f64) {
        for force in &self.craft_forces {
            force.borrow_mut().apply(&mut self.craft);
        }
        integrate(&mut self.craft, dt);
    }

    fn resolve_contact(&mut self, dt: f64) -> ContactEvent {
        let craft_box = self.craft_box();
        let event = self.resolver.check(&self.index, &craft_box, &mut self.craft, dt, &self.target_zone);
        match event {
            ContactEvent::Destroyed { .. } => {
                self.halt_craft();
                self.explosion.set_position(self.craft.position);
                self.explosion.start();
                self.phase = MissionPhase::Crashed;
            }
            ContactEvent::Landed { inside } => {
                self.halt_craft();
                self.phase = MissionPhase::Landed { inside };
            }
            ContactEvent::Bounced { .. } | ContactEvent::None => {}
        }
        event
    }

    fn halt_craft(&mut self) {
        self.command = NVec3::zeros();
        self.thrust.borrow_mut().set_thrust(NVec3::zeros());
        self.thrust_emitter.stop();
        self.craft.velocity = NVec3::zeros();
        self.craft.angular_velocity = 0.0;
        self.craft.force = NVec3::zeros();
    }
}

/// A heightfield point is at most half a cell diagonal (horizontally) from a
/// vertex. Contact and the altitude ray both look for vertices, so each reach
/// must cover that gap or the craft can pass between vertices unseen.
fn check_terrain_coverage(terrain: &TerrainConfig, contact: &ContactThresholds, index: &IndexSettings) -> Result<()> {
    let TerrainConfig::Heightfield { size, resolution, .. } = terrain else {
        return Ok(());
    };
    if *resolution == 0 {
        return Ok(()); // rejected by the heightfield builder
    }
    let gap = size / *resolution as f64 * std::f64::consts::FRAC_1_SQRT_2;
    if contact.contact_epsilon <= gap {
        return Err(Error::config(format!(
            "contact_epsilon {} must exceed the heightfield gap {gap:.3} (half a cell diagonal)",
            contact.contact_epsilon
        )));
    }
    if index.ray_tolerance < gap {
        return Err(Error::config(format!(
            "ray_tolerance {} must be at least the heightfield gap {gap:.3} (half a cell diagonal)",
            index.ray_tolerance
        )));
    }
    Ok(())
}

fn build_terrain(cfg: &TerrainConfig) -> Result<Mesh> {
    match cfg {
        TerrainConfig::Heightfield { size, resolution, amplitude, frequency } => {
            let (a, f) = (*amplitude, *frequency);
            Mesh::heightfield(*size, *resolution, |x, z| a * (f * x).sin() * (f * z).cos())
        }
        TerrainConfig::Inline { vertices, triangles } => {
            Mesh::new(vertices.iter().copied().map(vec3).collect(), triangles.clone())
        }
    }
}

fn emitter_settings(cfg: &EmitterConfig) -> EmitterSettings {
    EmitterSettings {
        pattern: match cfg.pattern {
            PatternConfig::Directional => EmissionPattern::Directional,
            PatternConfig::Radial => EmissionPattern::Radial,
        },
        one_shot: cfg.one_shot,
        rate: cfg.rate,
        group_size: cfg.group_size,
        velocity: vec3(cfg.velocity),
        speed: cfg.speed,
        spread: cfg.spread,
        radius: cfg.radius,
        lifespan: cfg.lifespan,
        mass: cfg.mass,
        damping: cfg.damping,
        seed: cfg.seed,
    }
}
