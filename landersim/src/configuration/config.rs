//! Configuration types for loading lander scenarios from YAML.
//!
//! This module defines a thin, `serde`-deserializable representation of a
//! scenario. A scenario consists of:
//!
//! - [`IndexConfig`]      – octree build settings for the terrain
//! - [`ParametersConfig`] – step size, physical constants, fuel and contact thresholds
//! - [`CraftConfig`]      – initial state and bounding box of the lander
//! - [`TerrainConfig`]    – procedural heightfield or an inline mesh
//! - [`TargetZoneConfig`] – the landing pad
//! - [`EmitterConfig`]    – thrust exhaust and explosion emitters
//! - [`ScenarioConfig`]   – top-level wrapper used to load a scenario from YAML
//!
//! # YAML format
//!
//! ```yaml
//! index:
//!   max_depth: 8
//!   leaf_threshold: 1
//!   ray_tolerance: 0.75
//!
//! parameters:
//!   t_end: 60.0
//!   h0: 0.016
//!   gravity: 1.62
//!   thrust_magnitude: 100.0
//!   fuel: 2500.0
//!   fuel_burn_rate: 60.0
//!   contact_epsilon: 1.0
//!   crash_speed: 5.0
//!   landing_speed: 0.5
//!   restitution: 0.5
//!
//! craft:
//!   position: [0.0, 50.0, 0.0]
//!   velocity: [0.0, 0.0, 0.0]
//!   mass: 50.0
//!   damping: 0.99
//!   bounds_min: [-1.0, -0.5, -1.0]
//!   bounds_max: [1.0, 1.5, 1.0]
//!
//! terrain:
//!   kind: heightfield
//!   size: 100.0
//!   resolution: 100
//!   amplitude: 0.0
//!   frequency: 0.1
//!
//! target_zone:
//!   min: [-24.6, -1.0, -19.6]
//!   max: [24.6, 1.5, 24.6]
//!
//! thrust_schedule:
//!   - { at: 0.0, thrust: [0.0, 0.7, 0.0] }
//! ```
//!
//! Emitter and turbulence blocks are optional and default to the stock lander
//! effects. The runtime [`crate::Scenario`] is built from this configuration.

use serde::Deserialize;

use crate::simulation::states::NVec3;

/// Octree build settings
#[derive(Deserialize, Debug, Clone)]
pub struct IndexConfig {
    pub max_depth: usize, // deepest level a node may be split to
    pub leaf_threshold: usize, // nodes with at most this many vertices stay leaves
    #[serde(default = "default_ray_tolerance")]
    pub ray_tolerance: f64, // how close a vertex must pass to a ray to count as a hit
}

fn default_ray_tolerance() -> f64 {
    0.5
}

/// Global numerical and physical parameters for a scenario
#[derive(Deserialize, Debug, Clone)]
pub struct ParametersConfig {
    pub t_end: f64, // time end
    pub h0: f64, // time step size
    pub gravity: f64, // downward field strength
    pub thrust_magnitude: f64, // thrust force per commanded axis
    pub fuel: f64, // starting fuel
    pub fuel_burn_rate: f64, // fuel used per second of thrust
    pub contact_epsilon: f64, // nearest-vertex distance that counts as touching
    pub crash_speed: f64, // contact at or above this speed destroys the craft
    pub landing_speed: f64, // contact at or below this speed lands the craft
    pub restitution: f64, // bounce coefficient in [0, 1]
}

/// Initial state of the lander
#[derive(Deserialize, Debug, Clone)]
pub struct CraftConfig {
    pub position: [f64; 3],
    #[serde(default)]
    pub velocity: [f64; 3],
    pub mass: f64,
    pub damping: f64, // per-tick velocity decay factor in (0, 1]
    pub bounds_min: [f64; 3], // bounding box corners relative to the craft position
    pub bounds_max: [f64; 3],
}

/// Terrain mesh source
#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TerrainConfig {
    /// Grid in the XZ plane with `amplitude * sin(frequency x) * cos(frequency z)` heights
    Heightfield {
        size: f64,
        resolution: usize,
        #[serde(default)]
        amplitude: f64,
        #[serde(default)]
        frequency: f64,
    },

    /// Explicit vertices and triangles
    Inline {
        vertices: Vec<[f64; 3]>,
        triangles: Vec<[usize; 3]>,
    },
}

/// Landing pad corners
#[derive(Deserialize, Debug, Clone)]
pub struct TargetZoneConfig {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

/// Which spawn pattern an emitter uses
#[derive(Deserialize, Debug, Clone, Copy)]
pub enum PatternConfig {
    #[serde(rename = "directional")] // one particle per event with the template velocity
    Directional,

    #[serde(rename = "radial")] // group_size particles per event, fanned over a cone
    Radial,
}

/// Particle emitter settings
#[derive(Deserialize, Debug, Clone)]
pub struct EmitterConfig {
    pub pattern: PatternConfig,
    #[serde(default)]
    pub one_shot: bool,
    #[serde(default)]
    pub rate: f64, // emission events per second
    #[serde(default = "default_group_size")]
    pub group_size: i64, // particles per radial event
    #[serde(default)]
    pub velocity: [f64; 3], // directional velocity / radial axis
    #[serde(default = "default_one")]
    pub speed: f64, // radial launch speed
    #[serde(default = "default_spread")]
    pub spread: f64, // radial cone half-angle, radians
    pub radius: f64,
    pub lifespan: f64, // <= 0 means unbounded
    #[serde(default = "default_one")]
    pub mass: f64,
    #[serde(default = "default_damping")]
    pub damping: f64,
    #[serde(default)]
    pub seed: u64,
}

fn default_group_size() -> i64 {
    1
}

fn default_one() -> f64 {
    1.0
}

fn default_spread() -> f64 {
    std::f64::consts::PI
}

fn default_damping() -> f64 {
    0.99
}

impl EmitterConfig {
    /// Exhaust plume: 70 particles per second straight down, short-lived.
    pub fn thrust_exhaust() -> Self {
        Self {
            pattern: PatternConfig::Directional,
            one_shot: false,
            rate: 70.0,
            group_size: 1,
            velocity: [0.0, -15.0, 0.0],
            speed: 1.0,
            spread: default_spread(),
            radius: 0.05,
            lifespan: 0.15,
            mass: 1.0,
            damping: default_damping(),
            seed: 1,
        }
    }

    /// Explosion debris: one burst of 500 particles in every direction.
    pub fn explosion() -> Self {
        Self {
            pattern: PatternConfig::Radial,
            one_shot: true,
            rate: 0.0,
            group_size: 500,
            velocity: [0.0, 1.0, 0.0],
            speed: 1.0,
            spread: default_spread(),
            radius: 0.1,
            lifespan: 3.0,
            mass: 1.0,
            damping: default_damping(),
            seed: 2,
        }
    }
}

/// Random force on the exhaust particles
#[derive(Deserialize, Debug, Clone)]
pub struct TurbulenceConfig {
    pub min: [f64; 3],
    pub max: [f64; 3],
    #[serde(default)]
    pub seed: u64,
}

impl Default for TurbulenceConfig {
    fn default() -> Self {
        Self { min: [-90.0; 3], max: [90.0; 3], seed: 3 }
    }
}

/// Thrust command taking effect at time `at`. `thrust` is per axis in units of
/// `thrust_magnitude`, so `[0, 1, 0]` is full upward thrust.
#[derive(Deserialize, Debug, Clone)]
pub struct ThrustCommandConfig {
    pub at: f64,
    pub thrust: [f64; 3],
}

/// Top-level scenario configuration loaded from YAML.
#[derive(Deserialize, Debug, Clone)]
pub struct ScenarioConfig {
    pub index: IndexConfig, // octree build settings
    pub parameters: ParametersConfig, // global numerical and physical parameters
    pub craft: CraftConfig, // lander initial state
    pub terrain: TerrainConfig, // terrain mesh source
    pub target_zone: TargetZoneConfig, // landing pad
    #[serde(default = "EmitterConfig::thrust_exhaust")]
    pub thrust_emitter: EmitterConfig,
    #[serde(default = "EmitterConfig::explosion")]
    pub explosion_emitter: EmitterConfig,
    #[serde(default = "default_explosion_impulse")]
    pub explosion_impulse: f64, // radial push on the debris at burst time
    #[serde(default)]
    pub turbulence: TurbulenceConfig,
    #[serde(default)]
    pub thrust_schedule: Vec<ThrustCommandConfig>, // scripted input for headless runs
}

fn default_explosion_impulse() -> f64 {
    1000.0
}

impl ScenarioConfig {
    /// Parse a scenario from YAML text.
    pub fn from_yaml_str(text: &str) -> crate::error::Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }
}

pub(crate) fn vec3(a: [f64; 3]) -> NVec3 {
    NVec3::new(a[0], a[1], a[2])
}
