//! Static terrain mesh handed to the spatial index.
//!
//! Model loading lives outside this crate; a loader builds a [`Mesh`] from its
//! vertex and triangle buffers. [`Mesh::heightfield`] generates a procedural
//! terrain for the demo binary and the tests.

use crate::error::{Error, Result};
use crate::simulation::geometry::Aabb;
use crate::simulation::states::NVec3;

/// Vertex positions, triangle index triples and one normal per vertex.
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    vertices: Vec<NVec3>,
    triangles: Vec<[usize; 3]>,
    normals: Vec<NVec3>,
}

impl Mesh {
    /// Build a mesh and derive per-vertex normals from the triangles
    /// (area-weighted face normals; +Y for vertices no triangle touches).
    ///
    /// Fails with [`Error::InvalidGeometry`] when a triangle references a
    /// vertex that does not exist. An empty mesh is accepted.
    pub fn new(vertices: Vec<NVec3>, triangles: Vec<[usize; 3]>) -> Result<Self> {
        let n = vertices.len();
        for (ti, tri) in triangles.iter().enumerate() {
            if let Some(&bad) = tri.iter().find(|&&v| v >= n) {
                return Err(Error::InvalidGeometry(format!(
                    "triangle {ti} references vertex {bad}, mesh has {n} vertices"
                )));
            }
        }

        let mut acc = vec![NVec3::zeros(); n];
        for tri in &triangles {
            let [a, b, c] = *tri;
            // cross product length is twice the area, so larger faces weigh more
            let face = (vertices[b] - vertices[a]).cross(&(vertices[c] - vertices[a]));
            for &v in tri {
                acc[v] += face;
            }
        }
        let normals = acc
            .into_iter()
            .map(|nrm| nrm.try_normalize(1e-12).unwrap_or_else(|| NVec3::new(0.0, 1.0, 0.0)))
            .collect();

        Ok(Self { vertices, triangles, normals })
    }

    /// Build a mesh with caller-supplied normals (one per vertex).
    pub fn with_normals(vertices: Vec<NVec3>, triangles: Vec<[usize; 3]>, normals: Vec<NVec3>) -> Result<Self> {
        if normals.len() != vertices.len() {
            return Err(Error::InvalidGeometry(format!(
                "{} normals supplied for {} vertices",
                normals.len(),
                vertices.len()
            )));
        }
        let mut mesh = Self::new(vertices, triangles)?;
        mesh.normals = normals
            .into_iter()
            .map(|nrm| nrm.try_normalize(1e-12).unwrap_or_else(|| NVec3::new(0.0, 1.0, 0.0)))
            .collect();
        Ok(mesh)
    }

    /// Regular grid terrain in the XZ plane, centered on the origin, with
    /// heights from `height(x, z)`. `resolution` is the number of cells per side.
    pub fn heightfield<F>(size: f64, resolution: usize, height: F) -> Result<Self>
    where
        F: Fn(f64, f64) -> f64,
    {
        if resolution == 0 {
            return Err(Error::config("heightfield resolution must be >= 1"));
        }
        if !size.is_finite() || size <= 0.0 {
            return Err(Error::config(format!("heightfield size must be finite and > 0, got {size}")));
        }

        let side = resolution + 1;
        let step = size / resolution as f64;
        let half = size * 0.5;

        let mut vertices = Vec::with_capacity(side * side);
        for iz in 0..side {
            for ix in 0..side {
                let x = -half + ix as f64 * step;
                let z = -half + iz as f64 * step;
                vertices.push(NVec3::new(x, height(x, z), z));
            }
        }

        let mut triangles = Vec::with_capacity(resolution * resolution * 2);
        for iz in 0..resolution {
            for ix in 0..resolution {
                let i0 = iz * side + ix;
                let i1 = i0 + 1;
                let i2 = i0 + side;
                let i3 = i2 + 1;
                // wound so the face normals point up (+Y)
                triangles.push([i0, i2, i1]);
                triangles.push([i1, i2, i3]);
            }
        }

        Self::new(vertices, triangles)
    }

    pub fn vertices(&self) -> &[NVec3] {
        &self.vertices
    }

    pub fn triangles(&self) -> &[[usize; 3]] {
        &self.triangles
    }

    pub fn vertex(&self, i: usize) -> NVec3 {
        self.vertices[i]
    }

    pub fn normal(&self, i: usize) -> NVec3 {
        self.normals[i]
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Tight bounding box, `None` for an empty mesh.
    pub fn bounds(&self) -> Option<Aabb> {
        Aabb::from_points(&self.vertices)
    }
}
