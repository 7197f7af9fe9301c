//! # Terrain Octree (3D)
//!
//! This module implements a **3D octree over the vertices of a static mesh**.
//! It answers the three queries the lander needs every tick without scanning
//! every terrain vertex:
//!
//! - ray intersection (altitude radar, picking),
//! - box overlap (broad-phase collision against the craft's bounding box),
//! - nearest vertex inside an overlapping region (narrow-phase contact distance).
//!
//! ## Core Concepts
//!
//! - The mesh bounding box is recursively subdivided into 8 regions (octants).
//! - Each region becomes a node of the octree.
//! - A node holding more than `leaf_threshold` vertices is split, unless it is
//!   already at `max_depth`.
//! - Only leaves hold vertex indices; every vertex index ends up in exactly
//!   one leaf.
//! - Empty octants are never allocated; their child slot stays `None`.
//!
//! Nodes live in one flat `Vec` and refer to their children by index, so the
//! tree has no owning pointers and can be walked, copied or dumped freely.
//! The tree is built once and never mutated afterwards.

use crate::error::{Error, Result};
use crate::simulation::geometry::{Aabb, Ray};
use crate::simulation::mesh::Mesh;
use crate::simulation::states::NVec3;

/// Index of a node inside [`SpatialIndex::nodes`].
pub type NodeId = usize;

/// Deepest tree the builder accepts. Octants at this depth are 2^-32 of the
/// root extent, far below `f64` vertex spacing of any real terrain.
pub const MAX_SUPPORTED_DEPTH: usize = 32;

/// Build parameters for a [`SpatialIndex`].
#[derive(Debug, Clone, Copy)]
pub struct IndexSettings {
    pub max_depth: usize, // deepest level a node may be split to
    pub leaf_threshold: usize, // nodes with at most this many points stay leaves
    pub ray_tolerance: f64, // how close a vertex must pass to a ray to count as a hit
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            max_depth: 8,
            leaf_threshold: 1,
            ray_tolerance: 0.5,
        }
    }
}

impl IndexSettings {
    /// Reject settings that would make the build or the ray test meaningless.
    pub fn validate(&self) -> Result<()> {
        if self.leaf_threshold == 0 {
            return Err(Error::config("leaf_threshold must be >= 1"));
        }
        if self.max_depth > MAX_SUPPORTED_DEPTH {
            return Err(Error::config(format!(
                "max_depth {} exceeds the supported maximum of {MAX_SUPPORTED_DEPTH}",
                self.max_depth
            )));
        }
        if !self.ray_tolerance.is_finite() || self.ray_tolerance < 0.0 {
            return Err(Error::config(format!(
                "ray_tolerance must be finite and >= 0, got {}",
                self.ray_tolerance
            )));
        }
        Ok(())
    }
}

/// A single octree node.
///
/// Each node covers an axis-aligned region of space that is either:
/// - a leaf, holding the (ordered) mesh vertex indices that fall inside it, or
/// - an internal node, holding no indices and up to eight children.
#[derive(Debug, Clone)]
pub struct TreeNode {
    pub bbox: Aabb,
    pub depth: usize,
    pub children: [Option<NodeId>; 8], // indices into SpatialIndex::nodes, by octant
    pub points: Vec<usize>, // vertex indices, leaves only
}

impl TreeNode {
    fn new(bbox: Aabb, depth: usize, points: Vec<usize>) -> Self {
        Self {
            bbox,
            depth,
            children: [None; 8],
            points,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.iter().all(|c| c.is_none())
    }
}

/// Closest vertex along a ray.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub vertex: usize,
    pub point: NVec3,
    pub t: f64, // parametric distance along the ray
    pub distance: f64, // perpendicular distance from the vertex to the ray
}

/// Closest vertex to a reference point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearestPoint {
    pub vertex: usize,
    pub point: NVec3,
    pub distance: f64,
}

/// A complete octree built over a static mesh.
///
/// This structure owns:
/// - the mesh it was built from (`mesh`)
/// - a vector of all octree nodes (`nodes`)
/// - an index into that list representing the root (`root`)
#[derive(Debug, Clone)]
pub struct SpatialIndex {
    mesh: Mesh,
    nodes: Vec<TreeNode>,
    root: NodeId,
    settings: IndexSettings,
    depth_reached: usize,
}

impl SpatialIndex {
    /// Build an octree over every vertex of `mesh`.
    ///
    /// This:
    /// 1. Validates `settings` (fails fast on a zero leaf threshold, an
    ///    unsupported depth or a negative ray tolerance).
    /// 2. Computes the tight bounding box of all vertices.
    /// 3. Creates a root node holding every vertex index.
    /// 4. Recursively splits overfull nodes into octants, handing each index
    ///    to exactly one child.
    ///
    /// An empty mesh is not an error: the index is built with a single empty
    /// root and every query on it returns nothing.
    ///
    /// # Parameters
    /// - `mesh`    : The terrain mesh; the index keeps it for vertex lookups.
    /// - `settings`: Depth limit, leaf threshold and ray tolerance.
    ///
    /// # Returns
    /// A fully constructed [`SpatialIndex`], or [`Error::InvalidConfiguration`].
    pub fn build(mesh: Mesh, settings: IndexSettings) -> Result<Self> {
        settings.validate()?;

        let Some(bbox) = mesh.bounds() else {
            tracing::warn!("spatial index built over an empty mesh, all queries will return nothing");
            return Ok(Self {
                mesh,
                nodes: vec![TreeNode::new(Aabb::new(NVec3::zeros(), NVec3::zeros()), 0, Vec::new())],
                root: 0,
                settings,
                depth_reached: 0,
            });
        };

        let all: Vec<usize> = (0..mesh.len()).collect();
        let mut index = Self {
            mesh,
            nodes: vec![TreeNode::new(bbox, 0, all)],
            root: 0,
            settings,
            depth_reached: 0,
        };
        index.subdivide(index.root);

        tracing::debug!(
            vertices = index.mesh.len(),
            nodes = index.nodes.len(),
            leaves = index.leaf_count(),
            depth = index.depth_reached,
            "spatial index built"
        );
        Ok(index)
    }

    // accessors ============================================================================

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> &TreeNode {
        &self.nodes[id]
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn root_box(&self) -> Aabb {
        self.nodes[self.root].bbox
    }

    pub fn settings(&self) -> IndexSettings {
        self.settings
    }

    /// Deepest level any leaf reached during the build.
    pub fn depth_reached(&self) -> usize {
        self.depth_reached
    }

    /// `true` when the index holds no vertices.
    pub fn is_empty(&self) -> bool {
        self.mesh.is_empty()
    }

    pub fn leaf_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf() && !n.points.is_empty()).count()
    }

    pub fn vertex_normal(&self, vertex: usize) -> NVec3 {
        self.mesh.normal(vertex)
    }

    // queries ==============================================================================

    /// Find the vertex closest along `ray`.
    ///
    /// A vertex counts as hit when it lies in front of the origin and passes
    /// within `ray_tolerance` of the ray. Among hits the smallest parametric
    /// distance wins, then the smallest perpendicular distance, then the lowest
    /// vertex index, so results are reproducible.
    ///
    /// The traversal:
    ///
    /// - skips any node whose box (grown by the tolerance) the ray misses,
    /// - tests every vertex of a reached leaf,
    /// - visits **every** overlapping child of an internal node. A child box
    ///   that starts farther along the ray can still hold the nearest vertex,
    ///   so stopping at the first overlapping child would be wrong.
    ///
    /// # Returns
    /// `Some(RayHit)` for the closest qualifying vertex, `None` when the ray
    /// meets no geometry or the index is empty.
    pub fn ray_intersect(&self, ray: &Ray) -> Option<RayHit> {
        if self.is_empty() {
            return None;
        }
        let mut best: Option<RayHit> = None;
        self.ray_node(self.root, ray, &mut best);
        best
    }

    /// Collect the non-empty leaves whose boxes overlap `query`.
    ///
    /// Pure box pruning: a subtree is skipped as soon as its box misses the
    /// query. Used as the broad phase of collision detection.
    pub fn box_overlap(&self, query: &Aabb) -> Vec<NodeId> {
        let mut out = Vec::new();
        if !self.is_empty() {
            self.box_node(self.root, query, &mut out);
        }
        out
    }

    /// Closest vertex to `reference` among the leaves overlapping `query`.
    ///
    /// Linear scan over the collected leaf point sets, which are small once the
    /// broad phase has pruned the tree. Ties go to the lowest vertex index.
    pub fn nearest_point(&self, query: &Aabb, reference: &NVec3) -> Option<NearestPoint> {
        let mut best: Option<NearestPoint> = None;
        for id in self.box_overlap(query) {
            for &v in &self.nodes[id].points {
                let p = self.mesh.vertex(v);
                let d = (p - reference).norm();
                let closer = match best {
                    None => true,
                    Some(b) => d < b.distance || (d == b.distance && v < b.vertex),
                };
                if closer {
                    best = Some(NearestPoint { vertex: v, point: p, distance: d });
                }
            }
        }
        best
    }

    /// Vertex indices lying inside `query`, in ascending order.
    pub fn points_in_box(&self, query: &Aabb) -> Vec<usize> {
        let mut out: Vec<usize> = self
            .box_overlap(query)
            .into_iter()
            .flat_map(|id| self.nodes[id].points.iter().copied())
            .filter(|&v| query.contains(&self.mesh.vertex(v)))
            .collect();
        out.sort_unstable();
        out
    }

    /// Boxes of every node shallower than `levels`, root first. Meant for
    /// debug drawing of the top of the tree.
    pub fn boxes_to_depth(&self, levels: usize) -> Vec<Aabb> {
        let mut out = Vec::new();
        if levels > 0 {
            self.collect_boxes(self.root, levels, &mut out);
        }
        out
    }

    /// Boxes of all non-empty leaves.
    pub fn leaf_boxes(&self) -> Vec<Aabb> {
        self.nodes
            .iter()
            .filter(|n| n.is_leaf() && !n.points.is_empty())
            .map(|n| n.bbox)
            .collect()
    }

    // helpers ==============================================================================

    /// Recursively split a node until it is small enough or deep enough.
    ///
    /// This function:
    /// - leaves the node alone when it holds at most `leaf_threshold` indices
    ///   or sits at `max_depth` (it becomes a terminal leaf),
    /// - otherwise hands each held index to the octant it falls in (points on
    ///   a split plane go to the upper half, so no index is owned twice),
    /// - allocates a child only for octants that received indices,
    /// - clears the node's own index list and recurses into each new child.
    ///
    /// # Parameters
    /// - `node_idx`: Index of the node in `self.nodes` to split.
    fn subdivide(&mut self, node_idx: NodeId) {
        let depth = self.nodes[node_idx].depth;
        self.depth_reached = self.depth_reached.max(depth);

        if self.nodes[node_idx].points.len() <= self.settings.leaf_threshold
            || depth >= self.settings.max_depth
        {
            return;
        }

        // Take the points out so no borrow of the node is live while recursing
        let bbox = self.nodes[node_idx].bbox;
        let points = std::mem::take(&mut self.nodes[node_idx].points);

        let mut buckets: [Vec<usize>; 8] = Default::default();
        for v in points {
            let octant = bbox.octant_index(&self.mesh.vertex(v));
            buckets[octant].push(v);
        }

        for (octant, bucket) in buckets.into_iter().enumerate() {
            if bucket.is_empty() {
                continue;
            }
            let child_idx = self.nodes.len();
            self.nodes.push(TreeNode::new(bbox.octant(octant), depth + 1, bucket));
            self.nodes[node_idx].children[octant] = Some(child_idx);
            self.subdivide(child_idx);
        }
    }

    /// Recursive step of [`SpatialIndex::ray_intersect`].
    fn ray_node(&self, node_idx: NodeId, ray: &Ray, best: &mut Option<RayHit>) {
        let node = &self.nodes[node_idx];
        let tol = self.settings.ray_tolerance;

        if !node.bbox.inflate(tol).intersect_ray(ray, 0.0, f64::INFINITY) {
            return;
        }

        if node.is_leaf() {
            for &v in &node.points {
                let p = self.mesh.vertex(v);
                if (p - ray.origin()).dot(&ray.direction()) < 0.0 {
                    continue; // behind the origin
                }
                let (t, distance) = ray.closest_approach(&p);
                if distance > tol {
                    continue;
                }
                let hit = RayHit { vertex: v, point: p, t, distance };
                if best.map_or(true, |b| ray_hit_precedes(&hit, &b)) {
                    *best = Some(hit);
                }
            }
            return;
        }

        for child in node.children.iter().flatten() {
            self.ray_node(*child, ray, best);
        }
    }

    /// Recursive step of [`SpatialIndex::box_overlap`].
    fn box_node(&self, node_idx: NodeId, query: &Aabb, out: &mut Vec<NodeId>) {
        let node = &self.nodes[node_idx];
        if !node.bbox.overlaps(query) {
            return;
        }
        if node.is_leaf() {
            if !node.points.is_empty() {
                out.push(node_idx);
            }
            return;
        }
        for child in node.children.iter().flatten() {
            self.box_node(*child, query, out);
        }
    }

    fn collect_boxes(&self, node_idx: NodeId, levels: usize, out: &mut Vec<Aabb>) {
        let node = &self.nodes[node_idx];
        if node.depth >= levels {
            return;
        }
        out.push(node.bbox);
        for child in node.children.iter().flatten() {
            self.collect_boxes(*child, levels, out);
        }
    }
}

/// Ordering of ray hits: parametric distance, then perpendicular distance,
/// then vertex index.
fn ray_hit_precedes(a: &RayHit, b: &RayHit) -> bool {
    (a.t, a.distance, a.vertex)
        .partial_cmp(&(b.t, b.distance, b.vertex))
        .is_some_and(|o| o.is_lt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_order_is_lexicographic() {
        let a = RayHit { vertex: 3, point: NVec3::zeros(), t: 1.0, distance: 0.2 };
        let b = RayHit { vertex: 1, point: NVec3::zeros(), t: 1.0, distance: 0.3 };
        let c = RayHit { vertex: 0, point: NVec3::zeros(), t: 1.0, distance: 0.2 };
        assert!(ray_hit_precedes(&a, &b));
        assert!(ray_hit_precedes(&c, &a));
        assert!(!ray_hit_precedes(&a, &a));
    }

    #[test]
    fn zero_leaf_threshold_is_rejected() {
        let settings = IndexSettings { leaf_threshold: 0, ..Default::default() };
        assert!(matches!(settings.validate(), Err(Error::InvalidConfiguration(_))));
    }
}
