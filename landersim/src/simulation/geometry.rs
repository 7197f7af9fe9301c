//! Geometric primitives shared by the octree, the collision resolver and the
//! particle code: rays and axis-aligned boxes.
//!
//! Vectors are `NVec3` (nalgebra `Vector3<f64>`), see [`crate::simulation::states`].

use crate::simulation::states::NVec3;

/// Below this length a ray direction is treated as zero.
const MIN_DIRECTION_NORM: f64 = 1e-12;

/// A half-line `origin + t * direction`, `t >= 0`.
///
/// The direction is normalized on construction. A zero (or non-finite) direction
/// cannot be normalized; such a ray keeps a zero direction and only probes its
/// own origin, so every test against it stays finite.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    origin: NVec3,
    direction: NVec3,
}

impl Ray {
    pub fn new(origin: NVec3, direction: NVec3) -> Self {
        let norm = direction.norm();
        let direction = if norm.is_finite() && norm > MIN_DIRECTION_NORM {
            direction / norm
        } else {
            tracing::warn!(?direction, "ray direction has zero length, ray degrades to an origin probe");
            NVec3::zeros()
        };
        Self { origin, direction }
    }

    /// Ray pointing straight down (-Y), used for ground clearance.
    pub fn down(origin: NVec3) -> Self {
        Self { origin, direction: NVec3::new(0.0, -1.0, 0.0) }
    }

    pub fn origin(&self) -> NVec3 {
        self.origin
    }

    pub fn direction(&self) -> NVec3 {
        self.direction
    }

    pub fn is_degenerate(&self) -> bool {
        self.direction == NVec3::zeros()
    }

    pub fn point_at(&self, t: f64) -> NVec3 {
        self.origin + self.direction * t
    }

    /// Parametric distance of the projection of `p` onto the ray (clamped to
    /// `t >= 0`) and the distance from `p` to that closest point.
    pub fn closest_approach(&self, p: &NVec3) -> (f64, f64) {
        let t = (p - self.origin).dot(&self.direction).max(0.0);
        let dist = (p - self.point_at(t)).norm();
        (t, dist)
    }
}

/// Axis-aligned bounding box, inclusive on every face.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: NVec3,
    pub max: NVec3,
}

impl Aabb {
    /// Build a box from two corners in any order; the result always has
    /// `min <= max` on every axis.
    pub fn new(a: NVec3, b: NVec3) -> Self {
        Self {
            min: a.inf(&b),
            max: a.sup(&b),
        }
    }

    /// Tight box around a set of points, `None` for an empty set.
    pub fn from_points<'a, I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a NVec3>,
    {
        let mut iter = points.into_iter();
        let first = *iter.next()?;
        let mut bbox = Self { min: first, max: first };
        for p in iter {
            bbox.min = bbox.min.inf(p);
            bbox.max = bbox.max.sup(p);
        }
        Some(bbox)
    }

    pub fn center(&self) -> NVec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> NVec3 {
        self.max - self.min
    }

    pub fn volume(&self) -> f64 {
        let s = self.size();
        s.x * s.y * s.z
    }

    /// Grow by `r` on every side.
    pub fn inflate(&self, r: f64) -> Self {
        let pad = NVec3::new(r, r, r);
        Self::new(self.min - pad, self.max + pad)
    }

    pub fn translate(&self, offset: NVec3) -> Self {
        Self { min: self.min + offset, max: self.max + offset }
    }

    /// Inclusive point containment.
    pub fn contains(&self, p: &NVec3) -> bool {
        (0..3).all(|k| p[k] >= self.min[k] && p[k] <= self.max[k])
    }

    /// `other` lies entirely inside `self`, widened by `tol` per face.
    pub fn contains_box(&self, other: &Aabb, tol: f64) -> bool {
        (0..3).all(|k| other.min[k] >= self.min[k] - tol && other.max[k] <= self.max[k] + tol)
    }

    /// All three axis intervals overlap; touching faces count.
    pub fn overlaps(&self, other: &Aabb) -> bool {
        (0..3).all(|k| self.min[k] <= other.max[k] && self.max[k] >= other.min[k])
    }

    /// Slab test: does the parametric interval `[t_min, t_max]` of `ray`
    /// overlap this box?
    ///
    /// An axis along which the ray does not move cannot be divided by; it is
    /// satisfied for every `t` when the origin lies inside that axis interval and
    /// rejects the ray outright otherwise.
    pub fn intersect_ray(&self, ray: &Ray, t_min: f64, t_max: f64) -> bool {
        let o = ray.origin();
        let d = ray.direction();
        let mut lo = t_min;
        let mut hi = t_max;

        for k in 0..3 {
            if d[k] == 0.0 {
                if o[k] < self.min[k] || o[k] > self.max[k] {
                    return false;
                }
                continue;
            }
            let inv = d[k].recip();
            let mut t0 = (self.min[k] - o[k]) * inv;
            let mut t1 = (self.max[k] - o[k]) * inv;
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }
            lo = lo.max(t0);
            hi = hi.min(t1);
            if lo > hi {
                return false;
            }
        }
        true
    }

    /// Child box for octant `idx` (bit 0: upper x, bit 1: upper y, bit 2: upper z).
    pub fn octant(&self, idx: usize) -> Aabb {
        let center = self.center();
        let mut min = self.min;
        let mut max = self.max;
        for k in 0..3 {
            if idx & (1 << k) == 0 {
                max[k] = center[k];
            } else {
                min[k] = center[k];
            }
        }
        Aabb { min, max }
    }

    pub fn octants(&self) -> [Aabb; 8] {
        std::array::from_fn(|i| self.octant(i))
    }

    /// Octant a point falls in. Points on a split plane go to the upper half,
    /// so every point has exactly one owner.
    pub fn octant_index(&self, p: &NVec3) -> usize {
        let center = self.center();
        let mut idx = 0;
        for k in 0..3 {
            if p[k] >= center[k] {
                idx |= 1 << k;
            }
        }
        idx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box() -> Aabb {
        Aabb::new(NVec3::zeros(), NVec3::new(1.0, 1.0, 1.0))
    }

    #[test]
    fn corners_are_ordered() {
        let b = Aabb::new(NVec3::new(1.0, -2.0, 3.0), NVec3::new(-1.0, 2.0, 0.0));
        assert_eq!(b.min, NVec3::new(-1.0, -2.0, 0.0));
        assert_eq!(b.max, NVec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn axis_parallel_ray_inside_slab_hits() {
        // moves only along z, x and y origin inside the box
        let ray = Ray::new(NVec3::new(0.5, 0.5, 5.0), NVec3::new(0.0, 0.0, -1.0));
        assert!(unit_box().intersect_ray(&ray, 0.0, f64::MAX));
    }

    #[test]
    fn axis_parallel_ray_outside_slab_misses() {
        let ray = Ray::new(NVec3::new(1.5, 0.5, 5.0), NVec3::new(0.0, 0.0, -1.0));
        assert!(!unit_box().intersect_ray(&ray, 0.0, f64::MAX));
    }

    #[test]
    fn ray_pointing_away_misses() {
        let ray = Ray::new(NVec3::new(0.5, 0.5, 5.0), NVec3::new(0.0, 0.0, 1.0));
        assert!(!unit_box().intersect_ray(&ray, 0.0, f64::MAX));
    }

    #[test]
    fn diagonal_ray_hits() {
        let ray = Ray::new(NVec3::new(-1.0, -1.0, -1.0), NVec3::new(1.0, 1.0, 1.0));
        assert!(unit_box().intersect_ray(&ray, 0.0, f64::MAX));
        assert!((ray.direction().norm() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn zero_direction_probes_origin_only() {
        let inside = Ray::new(NVec3::new(0.5, 0.5, 0.5), NVec3::zeros());
        let outside = Ray::new(NVec3::new(2.0, 0.5, 0.5), NVec3::zeros());
        assert!(inside.is_degenerate());
        assert!(unit_box().intersect_ray(&inside, 0.0, f64::MAX));
        assert!(!unit_box().intersect_ray(&outside, 0.0, f64::MAX));
        let (t, d) = inside.closest_approach(&NVec3::new(0.5, 0.5, 1.5));
        assert!(t.is_finite() && (d - 1.0).abs() < 1e-12);
    }

    #[test]
    fn touching_boxes_overlap() {
        let a = unit_box();
        let b = Aabb::new(NVec3::new(1.0, 0.0, 0.0), NVec3::new(2.0, 1.0, 1.0));
        let c = Aabb::new(NVec3::new(1.01, 0.0, 0.0), NVec3::new(2.0, 1.0, 1.0));
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn octants_partition_parent() {
        let b = Aabb::new(NVec3::new(-2.0, 0.0, 1.0), NVec3::new(2.0, 4.0, 3.0));
        let total: f64 = b.octants().iter().map(Aabb::volume).sum();
        assert!((total - b.volume()).abs() < 1e-9);
        for (i, o) in b.octants().iter().enumerate() {
            assert!(b.contains_box(o, 0.0));
            assert_eq!(b.octant_index(&o.center()), i);
        }
        // a point on the center plane belongs to the upper octant
        assert_eq!(b.octant_index(&b.center()), 7);
    }
}
