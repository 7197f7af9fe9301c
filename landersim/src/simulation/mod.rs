pub mod states;
pub mod params;
pub mod geometry;
pub mod mesh;
pub mod octree;
pub mod forces;
pub mod integrator;
pub mod particle_system;
pub mod emitter;
pub mod collision;
pub mod scenario;
