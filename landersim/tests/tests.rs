use std::f64::consts::PI;
use std::path::PathBuf;

use landersim::simulation::collision::{AltitudeRadar, CollisionResolver, ContactEvent, ContactOutcome, ContactThresholds};
use landersim::simulation::emitter::{EmissionPattern, EmitterSettings, EmitterState, ParticleEmitter};
use landersim::simulation::forces::Force;
use landersim::simulation::geometry::{Aabb, Ray};
use landersim::simulation::integrator::{integrate, timestep_from_frame_rate};
use landersim::simulation::mesh::Mesh;
use landersim::simulation::octree::{IndexSettings, SpatialIndex};
use landersim::simulation::particle_system::ParticleSystem;
use landersim::simulation::states::{NVec3, Particle, MIN_DAMPING};
use landersim::{Error, MissionPhase, Scenario, ScenarioConfig, TerrainConfig};

/// Flat square terrain at y = 0, one vertex per unit, centered on the origin.
/// The ray tolerance covers a cell center (half diagonal ~0.707).
pub fn flat_index(size: f64) -> SpatialIndex {
    let mesh = Mesh::heightfield(size, size as usize, |_, _| 0.0).unwrap();
    SpatialIndex::build(mesh, IndexSettings { ray_tolerance: 0.75, ..Default::default() }).unwrap()
}

/// Deterministic 3D point cloud (no triangles) spread over a 10 x 10 x 10 cube
pub fn cloud_mesh(n: usize) -> Mesh {
    let vertices = (0..n)
        .map(|i| {
            let i_f = i as f64;
            NVec3::new((i_f * 0.37).sin() * 5.0, (i_f * 0.13).cos() * 5.0, (i_f * 0.07).sin() * 5.0)
        })
        .collect();
    Mesh::new(vertices, Vec::new()).unwrap()
}

/// The single triangle (0,0,0), (1,0,0), (0,1,0)
pub fn triangle_mesh() -> Mesh {
    Mesh::new(
        vec![NVec3::new(0.0, 0.0, 0.0), NVec3::new(1.0, 0.0, 0.0), NVec3::new(0.0, 1.0, 0.0)],
        vec![[0, 1, 2]],
    )
    .unwrap()
}

/// Craft particle with unbounded lifespan and no damping
pub fn craft(position: NVec3, velocity: NVec3, mass: f64) -> Particle {
    Particle::new(position)
        .with_velocity(velocity)
        .with_mass(mass)
        .with_damping(1.0)
        .with_lifespan(0.0)
}

/// Craft box of half-extent 1 around `p`
pub fn craft_box(p: NVec3) -> Aabb {
    Aabb::new(p - NVec3::new(1.0, 1.0, 1.0), p + NVec3::new(1.0, 1.0, 1.0))
}

/// Everything around the origin, used as landing pad
pub fn pad() -> Aabb {
    Aabb::new(NVec3::new(-5.0, -1.0, -5.0), NVec3::new(5.0, 2.0, 5.0))
}

pub fn load_scenario(file_name: &str) -> ScenarioConfig {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("scenarios").join(file_name);
    let text = std::fs::read_to_string(path).unwrap();
    ScenarioConfig::from_yaml_str(&text).unwrap()
}

/// Step until the run ends or `t_end` passes
pub fn fly(scenario: &mut Scenario) {
    let h = scenario.parameters.h0;
    let t_end = scenario.parameters.t_end;
    scenario.launch();
    while scenario.time() < t_end && !scenario.phase().is_over() {
        scenario.step(h);
    }
}

// ==================================================================================
// Spatial index tests
// ==================================================================================

#[test]
fn index_every_vertex_in_exactly_one_leaf() {
    let index = SpatialIndex::build(cloud_mesh(500), IndexSettings::default()).unwrap();

    let mut claimed = vec![0usize; index.mesh().len()];
    for node in index.nodes() {
        if node.is_leaf() {
            for &v in &node.points {
                claimed[v] += 1;
            }
        } else {
            assert!(node.points.is_empty(), "internal node holds points");
        }
    }

    assert!(claimed.iter().all(|&c| c == 1), "vertex owned by zero or several leaves");
}

#[test]
fn index_children_inside_parent_and_contain_their_points() {
    let index = SpatialIndex::build(cloud_mesh(300), IndexSettings::default()).unwrap();

    for node in index.nodes() {
        for &child in node.children.iter().flatten() {
            let c = index.node(child);
            assert!(node.bbox.contains_box(&c.bbox, 1e-12));
            assert_eq!(c.depth, node.depth + 1);
        }
        for &v in &node.points {
            assert!(node.bbox.contains(&index.mesh().vertex(v)));
        }
    }
}

#[test]
fn index_leaves_and_empty_octants_tile_the_root() {
    let index = SpatialIndex::build(cloud_mesh(400), IndexSettings::default()).unwrap();

    let mut covered = 0.0;
    for node in index.nodes() {
        if node.is_leaf() {
            covered += node.bbox.volume();
        } else {
            for (i, child) in node.children.iter().enumerate() {
                if child.is_none() {
                    covered += node.bbox.octant(i).volume();
                }
            }
        }
    }

    let root = index.root_box().volume();
    assert!((covered - root).abs() <= 1e-9 * root, "covered {covered}, root {root}");
}

#[test]
fn index_respects_depth_and_leaf_threshold() {
    let settings = IndexSettings { max_depth: 3, leaf_threshold: 4, ray_tolerance: 0.5 };
    let index = SpatialIndex::build(cloud_mesh(1000), settings).unwrap();

    assert!(index.depth_reached() <= 3);
    for node in index.nodes() {
        if node.is_leaf() && node.depth < 3 {
            assert!(node.points.len() <= 4);
        }
    }
}

#[test]
fn index_rejects_invalid_settings() {
    let zero_leaf = IndexSettings { leaf_threshold: 0, ..Default::default() };
    assert!(matches!(
        SpatialIndex::build(cloud_mesh(10), zero_leaf),
        Err(Error::InvalidConfiguration(_))
    ));

    let too_deep = IndexSettings { max_depth: 33, ..Default::default() };
    assert!(matches!(
        SpatialIndex::build(cloud_mesh(10), too_deep),
        Err(Error::InvalidConfiguration(_))
    ));

    let bad_tol = IndexSettings { ray_tolerance: f64::NAN, ..Default::default() };
    assert!(SpatialIndex::build(cloud_mesh(10), bad_tol).is_err());
}

#[test]
fn mesh_rejects_out_of_range_triangles() {
    let result = Mesh::new(vec![NVec3::zeros(), NVec3::x()], vec![[0, 1, 2]]);
    assert!(matches!(result, Err(Error::InvalidGeometry(_))));
}

#[test]
fn empty_mesh_gives_an_empty_index() {
    let index = SpatialIndex::build(Mesh::default(), IndexSettings::default()).unwrap();

    assert!(index.is_empty());
    assert_eq!(index.leaf_count(), 0);
    assert!(index.ray_intersect(&Ray::down(NVec3::new(0.0, 5.0, 0.0))).is_none());
    assert!(index.box_overlap(&craft_box(NVec3::zeros())).is_empty());
    assert!(index.nearest_point(&craft_box(NVec3::zeros()), &NVec3::zeros()).is_none());
}

#[test]
fn ray_on_single_triangle_reports_closest_vertex() {
    let settings = IndexSettings { max_depth: 4, ..Default::default() };
    let index = SpatialIndex::build(triangle_mesh(), settings).unwrap();
    let ray = Ray::new(NVec3::new(0.2, 0.2, 5.0), NVec3::new(0.0, 0.0, -1.0));

    for _ in 0..3 {
        let hit = index.ray_intersect(&ray).unwrap();
        assert_eq!(hit.vertex, 0);
        assert_eq!(hit.point, NVec3::zeros());
        assert!((hit.t - 5.0).abs() < 1e-12);
    }
}

#[test]
fn ray_through_a_known_vertex_returns_it() {
    let index = SpatialIndex::build(cloud_mesh(200), IndexSettings { ray_tolerance: 1e-6, ..Default::default() }).unwrap();
    let target = 57;
    let p = index.mesh().vertex(target);
    let ray = Ray::new(p + NVec3::new(0.0, 20.0, 0.0), NVec3::new(0.0, -1.0, 0.0));

    let hit = index.ray_intersect(&ray).unwrap();
    // nothing else sits on that vertical line, so the closest is the target
    assert_eq!(hit.vertex, target);
    assert!(hit.distance < 1e-9);
}

#[test]
fn ray_pointing_away_misses() {
    let index = flat_index(10.0);
    let ray = Ray::new(NVec3::new(0.0, 5.0, 0.0), NVec3::new(0.0, 1.0, 0.0));
    assert!(index.ray_intersect(&ray).is_none());
}

#[test]
fn zero_direction_ray_probes_its_origin() {
    let index = SpatialIndex::build(triangle_mesh(), IndexSettings::default()).unwrap();
    let ray = Ray::new(NVec3::new(0.1, 0.0, 0.0), NVec3::zeros());

    assert!(ray.is_degenerate());
    let hit = index.ray_intersect(&ray).unwrap();
    assert_eq!(hit.vertex, 0);
    assert_eq!(hit.t, 0.0);

    let far = Ray::new(NVec3::new(10.0, 10.0, 10.0), NVec3::zeros());
    assert!(index.ray_intersect(&far).is_none());
}

#[test]
fn box_overlap_disjoint_and_root() {
    let index = SpatialIndex::build(cloud_mesh(300), IndexSettings::default()).unwrap();

    let far = Aabb::new(NVec3::new(100.0, 100.0, 100.0), NVec3::new(101.0, 101.0, 101.0));
    assert!(index.box_overlap(&far).is_empty());

    let all = index.box_overlap(&index.root_box());
    assert_eq!(all.len(), index.leaf_count());
    assert_eq!(index.leaf_boxes().len(), index.leaf_count());
}

#[test]
fn nearest_point_matches_brute_force() {
    let index = SpatialIndex::build(cloud_mesh(300), IndexSettings::default()).unwrap();
    let reference = NVec3::new(0.5, -1.0, 2.0);
    let query = Aabb::new(reference - NVec3::new(2.0, 2.0, 2.0), reference + NVec3::new(2.0, 2.0, 2.0));

    let inside = index.points_in_box(&query);
    assert!(!inside.is_empty());
    assert!(inside.windows(2).all(|w| w[0] < w[1]));

    let brute = inside
        .iter()
        .map(|&v| (v, (index.mesh().vertex(v) - reference).norm()))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .unwrap();
    let nearest = index.nearest_point(&query, &reference).unwrap();

    // leaves may reach past the query box, so the tree can only do as well or better
    assert!(nearest.distance <= brute.1 + 1e-12);
    assert_eq!(nearest.point, index.mesh().vertex(nearest.vertex));
}

#[test]
fn boxes_to_depth_starts_at_the_root() {
    let index = SpatialIndex::build(cloud_mesh(300), IndexSettings::default()).unwrap();

    assert!(index.boxes_to_depth(0).is_empty());
    assert_eq!(index.boxes_to_depth(1), vec![index.root_box()]);
    let two = index.boxes_to_depth(2);
    let root_children = index.node(index.root()).children.iter().flatten().count();
    assert_eq!(two.len(), 1 + root_children);
}

// ==================================================================================
// Integrator tests
// ==================================================================================

#[test]
fn zero_state_particle_stays_put() {
    let start = NVec3::new(1.0, 2.0, 3.0);
    let mut p = Particle::new(start);
    for _ in 0..100 {
        integrate(&mut p, 0.01);
    }
    assert_eq!(p.position, start);
    assert_eq!(p.velocity, NVec3::zeros());
}

#[test]
fn constant_force_matches_closed_form() {
    let g = 1.62;
    let dt = 0.01;
    let steps = 200;
    let v0 = NVec3::new(1.0, 0.5, 0.0);

    let mut sys = ParticleSystem::new();
    sys.add(craft(NVec3::zeros(), v0, 3.0));
    sys.add_force(Force::gravity(g).shared());

    for _ in 0..steps {
        sys.update(dt);
    }

    let t = steps as f64;
    let a = NVec3::new(0.0, -g, 0.0);
    let x_expected = v0 * t * dt + a * dt * dt * t * (t - 1.0) / 2.0;
    let v_expected = v0 + a * t * dt;

    let p = sys.particle(0).unwrap();
    assert!((p.position - x_expected).norm() < 1e-9, "x = {:?}, expected {:?}", p.position, x_expected);
    assert!((p.velocity - v_expected).norm() < 1e-9);
    assert!((sys.time() - t * dt).abs() < 1e-9);
}

#[test]
fn damping_slows_the_particle() {
    let mut free = craft(NVec3::zeros(), NVec3::new(2.0, 0.0, 0.0), 1.0);
    let mut damped = free.clone().with_damping(0.95);
    for _ in 0..50 {
        integrate(&mut free, 0.1);
        integrate(&mut damped, 0.1);
    }
    assert!(damped.position.x < free.position.x);
    assert!(damped.speed() < free.speed());
}

#[test]
fn force_accumulator_is_cleared_after_integration() {
    let mut p = craft(NVec3::zeros(), NVec3::zeros(), 2.0);
    p.force = NVec3::new(4.0, 0.0, 0.0);
    integrate(&mut p, 0.5);
    assert_eq!(p.force, NVec3::zeros());
    assert!((p.velocity.x - 1.0).abs() < 1e-12);

    integrate(&mut p, 0.5);
    assert!((p.velocity.x - 1.0).abs() < 1e-12, "force applied twice");
}

#[test]
fn invalid_timestep_mass_and_damping_are_substituted() {
    let mut sys = ParticleSystem::new();
    sys.add(craft(NVec3::zeros(), NVec3::new(1.0, 0.0, 0.0), 1.0));
    sys.update(0.0);
    assert!((sys.time() - 1.0).abs() < 1e-12);
    assert!((sys.particle(0).unwrap().position.x - 1.0).abs() < 1e-12);

    sys.update(f64::NAN);
    assert!((sys.time() - 2.0).abs() < 1e-12);

    assert_eq!(Particle::default().with_mass(0.0).mass(), 1.0);
    assert_eq!(Particle::default().with_mass(-3.0).mass(), 1.0);
    assert_eq!(Particle::default().with_damping(1.5).damping(), 1.0);
    assert_eq!(Particle::default().with_damping(f64::NAN).damping(), 1.0);
    assert_eq!(Particle::default().with_damping(0.0).damping(), MIN_DAMPING);
    assert_eq!(Particle::default().with_damping(-2.0).damping(), MIN_DAMPING);
    assert_eq!(Particle::default().with_damping(0.5).damping(), 0.5);

    assert!((timestep_from_frame_rate(60.0) - 1.0 / 60.0).abs() < 1e-15);
    assert_eq!(timestep_from_frame_rate(0.0), 1.0);
}

#[test]
fn expired_particles_are_removed() {
    let mut sys = ParticleSystem::new();
    sys.add(Particle::new(NVec3::zeros()).with_lifespan(0.25));
    sys.add(Particle::new(NVec3::zeros()).with_lifespan(0.0));

    sys.update(0.1);
    assert_eq!(sys.len(), 2);
    sys.update(0.1);
    sys.update(0.1);
    assert_eq!(sys.len(), 1, "short-lived particle should be gone");
    assert_eq!(sys.render_data()[0].remaining_life, None);
}

// ==================================================================================
// Force tests
// ==================================================================================

#[test]
fn gravity_accelerates_independently_of_mass() {
    let mut light = craft(NVec3::zeros(), NVec3::zeros(), 1.0);
    let mut heavy = craft(NVec3::zeros(), NVec3::zeros(), 50.0);
    let mut gravity = Force::gravity(1.62);

    gravity.apply(&mut light);
    gravity.apply(&mut heavy);
    integrate(&mut light, 1.0);
    integrate(&mut heavy, 1.0);

    assert!((light.velocity - heavy.velocity).norm() < 1e-12);
    assert!((light.velocity.y + 1.62).abs() < 1e-12);
}

#[test]
fn thrust_is_shared_between_systems() {
    let thrust = Force::thrust().shared();
    let mut a = ParticleSystem::new();
    let mut b = ParticleSystem::new();
    a.add(craft(NVec3::zeros(), NVec3::zeros(), 1.0));
    b.add(craft(NVec3::zeros(), NVec3::zeros(), 1.0));
    a.add_force(thrust.clone());
    b.add_force(thrust.clone());

    a.update(1.0);
    assert_eq!(a.particle(0).unwrap().velocity, NVec3::zeros());

    thrust.borrow_mut().set_thrust(NVec3::new(0.0, 2.0, 0.0));
    a.update(1.0);
    b.update(1.0);
    assert_eq!(a.particle(0).unwrap().velocity, NVec3::new(0.0, 2.0, 0.0));
    assert_eq!(b.particle(0).unwrap().velocity, NVec3::new(0.0, 2.0, 0.0));
    assert_eq!(thrust.borrow().thrust_vector(), Some(NVec3::new(0.0, 2.0, 0.0)));
}

#[test]
fn radial_impulse_pushes_outward_only_while_armed() {
    let mut impulse = Force::radial_impulse(10.0);
    let mut p = craft(NVec3::new(0.0, 0.0, 3.0), NVec3::zeros(), 1.0);

    impulse.apply(&mut p);
    assert_eq!(p.force, NVec3::zeros());

    impulse.arm(NVec3::zeros());
    assert!(impulse.is_armed());
    impulse.apply(&mut p);
    assert!((p.force - NVec3::new(0.0, 0.0, 10.0)).norm() < 1e-12);

    // on the origin: pushed along its velocity
    let mut q = craft(NVec3::zeros(), NVec3::new(0.0, 5.0, 0.0), 1.0);
    impulse.apply(&mut q);
    assert!((q.force - NVec3::new(0.0, 10.0, 0.0)).norm() < 1e-12);

    // on the origin and at rest: nothing
    let mut r = craft(NVec3::zeros(), NVec3::zeros(), 1.0);
    impulse.apply(&mut r);
    assert_eq!(r.force, NVec3::zeros());

    impulse.disarm();
    assert!(!impulse.is_armed());
}

#[test]
fn turbulence_is_bounded_and_reproducible_per_seed() {
    let lo = NVec3::new(-1.0, -2.0, -3.0);
    let hi = NVec3::new(1.0, 2.0, 3.0);
    let mut a = Force::turbulence(lo, hi, 42);
    let mut b = Force::turbulence(hi, lo, 42);
    let mut c = Force::turbulence(lo, hi, 7);

    let mut differs = false;
    for _ in 0..100 {
        let mut pa = Particle::default();
        let mut pb = Particle::default();
        let mut pc = Particle::default();
        a.apply(&mut pa);
        b.apply(&mut pb);
        c.apply(&mut pc);

        assert_eq!(pa.force, pb.force);
        for k in 0..3 {
            assert!(pa.force[k] >= lo[k] && pa.force[k] <= hi[k]);
        }
        differs |= pa.force != pc.force;
    }
    assert!(differs, "different seeds produced identical streams");
}

// ==================================================================================
// Emitter tests
// ==================================================================================

pub fn radial_burst(group_size: i64) -> EmitterSettings {
    EmitterSettings {
        pattern: EmissionPattern::Radial,
        one_shot: true,
        group_size,
        speed: 2.0,
        lifespan: 10.0,
        seed: 11,
        ..Default::default()
    }
}

#[test]
fn one_shot_emitter_bursts_exactly_once() {
    let mut e = ParticleEmitter::new(radial_burst(500)).unwrap();
    assert_eq!(e.state(), EmitterState::Idle);

    e.start();
    assert_eq!(e.state(), EmitterState::Exhausted);
    assert_eq!(e.system().len(), 500);

    e.update(0.1);
    e.start();
    e.update(0.1);
    assert_eq!(e.system().len(), 500);
    assert_eq!(e.emitted_total(), 500);

    e.stop();
    assert_eq!(e.state(), EmitterState::Idle);
    assert_eq!(e.system().len(), 500, "stop must keep existing particles");
    e.start();
    assert_eq!(e.emitted_total(), 1000);
}

#[test]
fn continuous_emitter_follows_its_rate() {
    let settings = EmitterSettings { rate: 70.0, lifespan: 0.0, ..Default::default() };
    let mut e = ParticleEmitter::new(settings).unwrap();
    e.start();
    e.start();
    assert_eq!(e.state(), EmitterState::Emitting);

    let dt = 1.0 / 60.0;
    let ticks = 180;
    for _ in 0..ticks {
        e.update(dt);
    }

    let expected = (70.0 * ticks as f64 * dt).floor() as i64;
    let got = e.emitted_total() as i64;
    assert!((got - expected).abs() <= 1, "emitted {got}, expected {expected}");

    e.stop();
    let before = e.emitted_total();
    e.update(dt);
    assert_eq!(e.emitted_total(), before);
}

#[test]
fn directional_particles_carry_template_velocity_and_position() {
    let settings = EmitterSettings {
        rate: 10.0,
        velocity: NVec3::new(0.0, -15.0, 0.0),
        lifespan: 0.0,
        damping: 1.0,
        ..Default::default()
    };
    let mut e = ParticleEmitter::new(settings).unwrap();
    e.set_position(NVec3::new(3.0, 4.0, 5.0));
    e.start();
    e.update(0.1);

    assert_eq!(e.system().len(), 1);
    let p = e.system().particle(0).unwrap();
    assert_eq!(p.position, NVec3::new(3.0, 4.0, 5.0));
    assert_eq!(p.velocity, NVec3::new(0.0, -15.0, 0.0));
}

#[test]
fn radial_particles_stay_within_the_spread_cone() {
    let settings = EmitterSettings {
        velocity: NVec3::new(0.0, 1.0, 0.0),
        spread: 0.2,
        ..radial_burst(64)
    };
    let mut e = ParticleEmitter::new(settings).unwrap();
    e.start();

    for p in e.system().particles() {
        assert!((p.speed() - 2.0).abs() < 1e-9);
        let cos = p.velocity.normalize().dot(&NVec3::y());
        assert!(cos >= 0.2f64.cos() - 1e-9);
    }

    let mut full = ParticleEmitter::new(EmitterSettings { spread: PI, ..radial_burst(200) }).unwrap();
    full.start();
    assert!(full.system().particles().iter().any(|p| p.velocity.y < 0.0));
}

#[test]
fn narrow_cone_around_the_depth_axis_keeps_its_tilt() {
    // an axis a couple of degrees off +Z, narrower than its tilt
    let axis = NVec3::new(0.04, 0.0, 0.9992).normalize();
    let settings = EmitterSettings { velocity: axis, spread: 0.005, ..radial_burst(100) };
    let mut e = ParticleEmitter::new(settings).unwrap();
    e.start();

    for p in e.system().particles() {
        let cos = p.velocity.normalize().dot(&axis);
        assert!(cos >= 0.005f64.cos() - 1e-12, "angle {}", cos.clamp(-1.0, 1.0).acos());
        assert!(p.velocity.x > 0.0);
    }
}

#[test]
fn burst_impulse_is_released_after_one_update() {
    let impulse = Force::radial_impulse(100.0).shared();
    let mut e = ParticleEmitter::new(EmitterSettings { damping: 1.0, ..radial_burst(20) }).unwrap();
    e.set_burst_impulse(impulse.clone());

    e.start();
    assert!(impulse.borrow().is_armed());
    e.update(0.1);
    assert!(!impulse.borrow().is_armed());

    // launch speed 2, plus 100 * 0.1 from the impulse
    for p in e.system().particles() {
        assert!((p.speed() - 12.0).abs() < 1e-9, "speed {}", p.speed());
    }
}

#[test]
fn emitter_rejects_negative_settings() {
    let neg_rate = EmitterSettings { rate: -1.0, ..Default::default() };
    assert!(matches!(ParticleEmitter::new(neg_rate), Err(Error::InvalidConfiguration(_))));
    assert!(ParticleEmitter::new(radial_burst(-5)).is_err());
}

// ==================================================================================
// Collision tests
// ==================================================================================

#[test]
fn destructive_contact_fires_exactly_once() {
    let index = flat_index(10.0);
    let mut resolver = CollisionResolver::new(ContactThresholds::default()).unwrap();
    let mut lander = craft(NVec3::new(0.0, 0.5, 0.0), NVec3::new(0.0, -10.0, 0.0), 50.0);
    let bbox = craft_box(lander.position);

    let first = resolver.check(&index, &bbox, &mut lander, 0.016, &pad());
    assert!(matches!(first, ContactEvent::Destroyed { .. }));

    for _ in 0..3 {
        let again = resolver.check(&index, &bbox, &mut lander, 0.016, &pad());
        assert_eq!(again, ContactEvent::None);
    }
    assert!(resolver.is_destroyed());
    assert_eq!(resolver.outcome(), ContactOutcome::Destroyed);
    assert_eq!(resolver.episodes(), 1);

    resolver.reset();
    let after_reset = resolver.check(&index, &bbox, &mut lander, 0.016, &pad());
    assert!(matches!(after_reset, ContactEvent::Destroyed { .. }));
}

#[test]
fn moderate_contact_bounces_off_the_surface() {
    let index = flat_index(10.0);
    let mut resolver = CollisionResolver::new(ContactThresholds::default()).unwrap();
    let dt = 0.02;
    let mut lander = craft(NVec3::new(0.0, 0.5, 0.0), NVec3::new(0.0, -2.0, 0.0), 50.0);

    let event = resolver.check(&index, &craft_box(lander.position), &mut lander, dt, &pad());
    let ContactEvent::Bounced { force } = event else {
        panic!("expected a bounce, got {event:?}");
    };
    // -(1 + 0.5) * 50 * (-2) / 0.02 along +y
    assert!((force - NVec3::new(0.0, 7500.0, 0.0)).norm() < 1e-6);
    assert_eq!(lander.force, force);

    integrate(&mut lander, dt);
    assert!((lander.velocity.y - 1.0).abs() < 1e-9, "vy = {}", lander.velocity.y);
    assert!(!resolver.is_destroyed());
    assert!(!resolver.is_resting());
}

#[test]
fn slow_contact_lands_and_reports_the_pad() {
    let index = flat_index(10.0);
    let slow = NVec3::new(0.0, -0.2, 0.0);

    let mut on_pad = CollisionResolver::new(ContactThresholds::default()).unwrap();
    let mut lander = craft(NVec3::new(0.0, 0.5, 0.0), slow, 50.0);
    let event = on_pad.check(&index, &craft_box(lander.position), &mut lander, 0.016, &pad());
    assert_eq!(event, ContactEvent::Landed { inside: true });
    assert!(on_pad.is_resting());
    assert_eq!(
        on_pad.check(&index, &craft_box(lander.position), &mut lander, 0.016, &pad()),
        ContactEvent::None
    );

    let elsewhere = Aabb::new(NVec3::new(3.0, -1.0, 3.0), NVec3::new(5.0, 1.0, 5.0));
    let mut off_pad = CollisionResolver::new(ContactThresholds::default()).unwrap();
    let event = off_pad.check(&index, &craft_box(lander.position), &mut lander, 0.016, &elsewhere);
    assert_eq!(event, ContactEvent::Landed { inside: false });
}

#[test]
fn contact_is_found_between_vertices() {
    let index = flat_index(10.0);
    let between = NVec3::new(0.7, 0.4, -1.3);

    let mut hard = CollisionResolver::new(ContactThresholds::default()).unwrap();
    let mut falling = craft(between, NVec3::new(0.0, -10.0, 0.0), 50.0);
    let event = hard.check(&index, &craft_box(between), &mut falling, 0.016, &pad());
    assert!(matches!(event, ContactEvent::Destroyed { .. }), "got {event:?}");

    let mut soft = CollisionResolver::new(ContactThresholds::default()).unwrap();
    let mut settling = craft(between, NVec3::new(0.0, -0.2, 0.0), 50.0);
    let event = soft.check(&index, &craft_box(between), &mut settling, 0.016, &pad());
    assert_eq!(event, ContactEvent::Landed { inside: true });

    // dead center of a cell
    let center = NVec3::new(0.5, 0.3, 0.5);
    let mut centered = CollisionResolver::new(ContactThresholds::default()).unwrap();
    let mut lander = craft(center, NVec3::new(0.0, -0.2, 0.0), 50.0);
    let event = centered.check(&index, &craft_box(center), &mut lander, 0.016, &pad());
    assert_eq!(event, ContactEvent::Landed { inside: true });
}

#[test]
fn no_contact_while_high_above_the_terrain() {
    let index = flat_index(10.0);
    let mut resolver = CollisionResolver::new(ContactThresholds::default()).unwrap();
    let mut lander = craft(NVec3::new(0.0, 10.0, 0.0), NVec3::new(0.0, -20.0, 0.0), 50.0);

    let event = resolver.check(&index, &craft_box(lander.position), &mut lander, 0.016, &pad());
    assert_eq!(event, ContactEvent::None);
    assert!(!resolver.in_contact());
    assert_eq!(resolver.episodes(), 0);
}

#[test]
fn contact_thresholds_are_validated() {
    let bad_eps = ContactThresholds { contact_epsilon: 0.0, ..Default::default() };
    assert!(CollisionResolver::new(bad_eps).is_err());

    let bad_e = ContactThresholds { restitution: 1.5, ..Default::default() };
    assert!(matches!(CollisionResolver::new(bad_e), Err(Error::InvalidConfiguration(_))));
}

#[test]
fn altitude_keeps_last_reading_on_a_miss() {
    let index = flat_index(10.0);
    let mut radar = AltitudeRadar::new();

    assert_eq!(radar.update(&index, NVec3::new(100.0, 5.0, 100.0)), None);

    let alt = radar.update(&index, NVec3::new(0.0, 7.0, 0.0)).unwrap();
    assert!((alt - 7.0).abs() < 1e-12);

    let kept = radar.update(&index, NVec3::new(100.0, 5.0, 100.0)).unwrap();
    assert!((kept - 7.0).abs() < 1e-12);
    assert_eq!(radar.altitude(), Some(kept));
}

#[test]
fn altitude_is_read_between_vertices() {
    let index = flat_index(10.0);
    let mut radar = AltitudeRadar::new();

    let alt = radar.update(&index, NVec3::new(0.5, 6.0, 0.5)).unwrap();
    assert!((alt - 6.0).abs() < 1e-12);

    let alt = radar.update(&index, NVec3::new(0.7, 4.0, -1.3)).unwrap();
    assert!((alt - 4.0).abs() < 1e-12);
}

// ==================================================================================
// Scenario tests
// ==================================================================================

#[test]
fn scenario_files_parse_and_build() {
    for name in ["default.yaml", "free_fall.yaml", "gentle_landing.yaml"] {
        let cfg = load_scenario(name);
        let scenario = Scenario::build_scenario(cfg).unwrap();
        assert_eq!(scenario.phase(), MissionPhase::Standby);
        assert!(!scenario.index().is_empty());
    }
}

#[test]
fn standby_holds_the_craft() {
    let mut scenario = Scenario::build_scenario(load_scenario("free_fall.yaml")).unwrap();
    let start = scenario.craft_position();
    for _ in 0..10 {
        scenario.step(0.016);
    }
    assert_eq!(scenario.craft_position(), start);
    assert!((scenario.altitude().unwrap() - 50.0).abs() < 1e-9);
}

#[test]
fn free_fall_ends_in_a_crash() {
    let mut scenario = Scenario::build_scenario(load_scenario("free_fall.yaml")).unwrap();
    fly(&mut scenario);

    assert_eq!(scenario.phase(), MissionPhase::Crashed);
    assert!(scenario.resolver().is_destroyed());
    assert_eq!(scenario.explosion_emitter().emitted_total(), 500);
    assert_eq!(scenario.fuel(), scenario.parameters.fuel);

    // debris keeps flying after the crash, the craft does not
    let at_crash = scenario.craft_position();
    let debris_before = scenario.explosion_emitter().system().centroid().unwrap();
    scenario.step(0.016);
    assert_eq!(scenario.craft_position(), at_crash);
    assert_ne!(scenario.explosion_emitter().system().centroid().unwrap(), debris_before);
}

#[test]
fn gentle_descent_lands_on_the_pad() {
    let mut scenario = Scenario::build_scenario(load_scenario("gentle_landing.yaml")).unwrap();
    fly(&mut scenario);

    assert_eq!(scenario.phase(), MissionPhase::Landed { inside: true });
    assert!(scenario.fuel() < scenario.parameters.fuel);
    assert!(scenario.fuel() > 0.0);
    assert!(scenario.thrust_emitter().emitted_total() > 0);
    assert_eq!(scenario.thrust_emitter().state(), EmitterState::Idle);
}

#[test]
fn off_vertex_runs_end_like_on_vertex_runs() {
    for spot in [NVec3::new(0.5, 10.0, 0.5), NVec3::new(0.7, 10.0, -1.3)] {
        let mut scenario = Scenario::build_scenario(load_scenario("gentle_landing.yaml")).unwrap();
        scenario.place_craft(spot);
        fly(&mut scenario);
        assert_eq!(scenario.phase(), MissionPhase::Landed { inside: true }, "from {spot:?}");
    }

    let mut scenario = Scenario::build_scenario(load_scenario("free_fall.yaml")).unwrap();
    scenario.place_craft(NVec3::new(0.5, 50.0, 0.5));
    scenario.step(0.016);
    assert!((scenario.altitude().unwrap() - 50.0).abs() < 1e-9);
    fly(&mut scenario);
    assert_eq!(scenario.phase(), MissionPhase::Crashed);
    assert!(scenario.craft_position().y > -1.0, "fell through at {:?}", scenario.craft_position());
}

#[test]
fn empty_tank_gives_no_thrust() {
    let mut cfg = load_scenario("gentle_landing.yaml");
    cfg.parameters.fuel = 0.0;
    let mut scenario = Scenario::build_scenario(cfg).unwrap();
    scenario.launch();
    scenario.set_thrust(NVec3::new(0.0, 1.0, 0.0));
    for _ in 0..50 {
        scenario.step(0.016);
    }
    assert!(scenario.craft_velocity().y < 0.0);
    assert_eq!(scenario.thrust_emitter().emitted_total(), 0);
}

#[test]
fn reset_returns_to_standby_with_a_full_tank() {
    let mut scenario = Scenario::build_scenario(load_scenario("gentle_landing.yaml")).unwrap();
    let spawn = scenario.craft_position();
    scenario.launch();
    scenario.set_spin(30.0);
    for _ in 0..100 {
        scenario.step(0.016);
    }
    assert!(scenario.craft().rotation > 0.0);

    scenario.reset();
    assert_eq!(scenario.phase(), MissionPhase::Standby);
    assert_eq!(scenario.craft_position(), spawn);
    assert_eq!(scenario.fuel(), scenario.parameters.fuel);
}

#[test]
fn invalid_scenario_values_are_rejected() {
    let mut cfg = load_scenario("free_fall.yaml");
    cfg.parameters.crash_speed = 0.1;
    assert!(matches!(Scenario::build_scenario(cfg), Err(Error::InvalidConfiguration(_))));

    let mut cfg = load_scenario("free_fall.yaml");
    cfg.index.leaf_threshold = 0;
    assert!(Scenario::build_scenario(cfg).is_err());

    assert!(matches!(ScenarioConfig::from_yaml_str("index: [1, 2"), Err(Error::Yaml(_))));
}

#[test]
fn non_positive_step_or_end_time_is_rejected() {
    for (h0, t_end) in [(0.0, 20.0), (-0.016, 20.0), (0.016, 0.0), (0.016, -1.0)] {
        let mut cfg = load_scenario("free_fall.yaml");
        cfg.parameters.h0 = h0;
        cfg.parameters.t_end = t_end;
        assert!(
            matches!(Scenario::build_scenario(cfg), Err(Error::InvalidConfiguration(_))),
            "h0 = {h0}, t_end = {t_end}"
        );
    }
}

#[test]
fn heightfield_gaps_must_be_covered() {
    // 2 m spacing leaves cell centers ~1.41 m from every vertex
    let mut coarse = load_scenario("free_fall.yaml");
    coarse.terrain = TerrainConfig::Heightfield { size: 100.0, resolution: 50, amplitude: 0.0, frequency: 0.1 };
    assert!(matches!(Scenario::build_scenario(coarse), Err(Error::InvalidConfiguration(_))));

    let mut short_ray = load_scenario("free_fall.yaml");
    short_ray.index.ray_tolerance = 0.5;
    assert!(matches!(Scenario::build_scenario(short_ray), Err(Error::InvalidConfiguration(_))));

    let mut wide_contact = load_scenario("free_fall.yaml");
    wide_contact.terrain = TerrainConfig::Heightfield { size: 100.0, resolution: 50, amplitude: 0.0, frequency: 0.1 };
    wide_contact.parameters.contact_epsilon = 1.5;
    wide_contact.index.ray_tolerance = 1.5;
    assert!(Scenario::build_scenario(wide_contact).is_ok());
}
