pub mod error;
pub mod simulation;
pub mod configuration;
pub mod benchmark;

pub use error::{Error, Result};

pub use simulation::states::{Particle, NVec3};
pub use simulation::geometry::{Aabb, Ray};
pub use simulation::mesh::Mesh;
pub use simulation::octree::{IndexSettings, NearestPoint, NodeId, RayHit, SpatialIndex, TreeNode};
pub use simulation::forces::{Force, ForceHandle};
pub use simulation::integrator::{effective_timestep, integrate, timestep_from_frame_rate};
pub use simulation::particle_system::{ParticleSprite, ParticleSystem};
pub use simulation::emitter::{EmissionPattern, EmitterSettings, EmitterState, ParticleEmitter};
pub use simulation::collision::{AltitudeRadar, CollisionResolver, ContactEvent, ContactOutcome, ContactThresholds};
pub use simulation::params::Parameters;
pub use simulation::scenario::{MissionPhase, Scenario, StepReport, ThrustCommand};

pub use configuration::config::{
    CraftConfig, EmitterConfig, IndexConfig, ParametersConfig, PatternConfig, ScenarioConfig, TargetZoneConfig,
    TerrainConfig, ThrustCommandConfig, TurbulenceConfig,
};

pub use benchmark::benchmark::{bench_index_build, bench_queries};
