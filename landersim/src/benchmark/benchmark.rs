use std::time::Instant;

use crate::simulation::geometry::{Aabb, Ray};
use crate::simulation::mesh::Mesh;
use crate::simulation::octree::{IndexSettings, SpatialIndex};
use crate::simulation::states::NVec3;

/// Time octree construction for growing terrain sizes.
pub fn bench_index_build() {
    // Cells per side; vertex count is (r + 1)^2
    let resolutions = [16, 32, 64, 128, 256, 512];

    for r in resolutions {
        let Ok(mesh) = make_terrain(r) else {
            continue;
        };
        let n = mesh.len();

        let t0 = Instant::now();
        let Ok(index) = SpatialIndex::build(mesh, IndexSettings::default()) else {
            continue;
        };
        let dt_build = t0.elapsed().as_secs_f64();

        println!(
            "N = {n:7}, build = {:8.6} s, nodes = {:7}, leaves = {:7}, depth = {:2}",
            dt_build,
            index.nodes().len(),
            index.leaf_count(),
            index.depth_reached()
        );
    }
}

/// Octree vs brute-force scan for the per-tick queries (altitude ray and
/// nearest terrain vertex under the craft box).
/// Paste output directly into a spreadsheet to graph
pub fn bench_queries() {
    let resolutions = [16, 32, 64, 128, 256, 512];
    let queries = 200; // probes per terrain size

    println!("N,ray_brute_us,ray_tree_us,nearest_brute_us,nearest_tree_us");

    for r in resolutions {
        let Ok(mesh) = make_terrain(r) else {
            continue;
        };
        let n = mesh.len();
        let Ok(index) = SpatialIndex::build(mesh, IndexSettings::default()) else {
            continue;
        };
        let tol = index.settings().ray_tolerance;
        let probes = make_probes(queries);

        // Altitude ray, brute force
        let t0 = Instant::now();
        let mut hits_brute = 0;
        for p in &probes {
            if brute_ray(index.mesh(), &Ray::down(*p), tol).is_some() {
                hits_brute += 1;
            }
        }
        let ray_brute = t0.elapsed().as_secs_f64() * 1e6 / queries as f64;

        // Altitude ray, octree
        let t1 = Instant::now();
        let mut hits_tree = 0;
        for p in &probes {
            if index.ray_intersect(&Ray::down(*p)).is_some() {
                hits_tree += 1;
            }
        }
        let ray_tree = t1.elapsed().as_secs_f64() * 1e6 / queries as f64;

        // Nearest vertex near the craft, brute force over every vertex
        let t2 = Instant::now();
        for p in &probes {
            let craft_box = craft_box_at(*p);
            let _ = brute_nearest(index.mesh(), &craft_box, p);
        }
        let nearest_brute = t2.elapsed().as_secs_f64() * 1e6 / queries as f64;

        // Nearest vertex, octree broad phase + leaf scan
        let t3 = Instant::now();
        for p in &probes {
            let craft_box = craft_box_at(*p);
            let _ = index.nearest_point(&craft_box, p);
        }
        let nearest_tree = t3.elapsed().as_secs_f64() * 1e6 / queries as f64;

        if hits_brute != hits_tree {
            tracing::warn!(n, hits_brute, hits_tree, "ray hit counts differ");
        }

        println!("{},{:.3},{:.3},{:.3},{:.3}", n, ray_brute, ray_tree, nearest_brute, nearest_tree);
    }
}

/// Helper to build a rolling 100 x 100 terrain with `r` cells per side
fn make_terrain(r: usize) -> crate::error::Result<Mesh> {
    Mesh::heightfield(100.0, r, |x, z| 2.0 * (0.1 * x).sin() * (0.1 * z).cos())
}

/// Helper to spread probe points over the terrain, deterministic
fn make_probes(n: usize) -> Vec<NVec3> {
    (0..n)
        .map(|i| {
            let i_f = i as f64;
            NVec3::new((i_f * 0.37).sin() * 45.0, 1.0 + (i_f * 0.13).cos().abs() * 5.0, (i_f * 0.07).sin() * 45.0)
        })
        .collect()
}

fn craft_box_at(p: NVec3) -> Aabb {
    Aabb::new(p - NVec3::new(1.0, 3.0, 1.0), p + NVec3::new(1.0, 1.0, 1.0))
}

/// Reference ray test over every vertex, same ordering as the octree
fn brute_ray(mesh: &Mesh, ray: &Ray, tol: f64) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64, f64)> = None;
    for (i, v) in mesh.vertices().iter().enumerate() {
        if (v - ray.origin()).dot(&ray.direction()) < 0.0 {
            continue; // behind the origin
        }
        let (t, d) = ray.closest_approach(v);
        if d > tol {
            continue;
        }
        let better = match best {
            None => true,
            Some((_, bt, bd)) => t < bt || (t == bt && d < bd),
        };
        if better {
            best = Some((i, t, d));
        }
    }
    best.map(|(i, t, _)| (i, t))
}

/// Reference nearest vertex among those inside the query box
fn brute_nearest(mesh: &Mesh, query: &Aabb, reference: &NVec3) -> Option<(usize, f64)> {
    mesh.vertices()
        .iter()
        .enumerate()
        .filter(|(_, v)| query.contains(v))
        .map(|(i, v)| (i, (v - reference).norm()))
        .min_by(|a, b| a.1.total_cmp(&b.1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn brute_ray_agrees_with_the_tree_just_above_a_vertex() {
        let mesh = Mesh::heightfield(10.0, 10, |_, _| 0.0).unwrap();
        let index = SpatialIndex::build(mesh, IndexSettings::default()).unwrap();
        let tol = index.settings().ray_tolerance;

        // the vertex under the origin is within tolerance but behind the ray
        let up = Ray::new(NVec3::new(0.0, 0.2, 0.0), NVec3::new(0.0, 1.0, 0.0));
        assert!(brute_ray(index.mesh(), &up, tol).is_none());
        assert!(index.ray_intersect(&up).is_none());

        let down = Ray::down(NVec3::new(0.0, 0.2, 0.0));
        let tree = index.ray_intersect(&down).map(|h| (h.vertex, h.t));
        assert_eq!(brute_ray(index.mesh(), &down, tol), tree);
    }
}
