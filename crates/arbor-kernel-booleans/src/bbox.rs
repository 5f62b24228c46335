//! Axis-aligned bounding box computation and face-pair filtering.
//!
//! Used as a broadphase filter: only face pairs with overlapping AABBs
//! need imprint tests, and disjoint bodies short-circuit the whole
//! boolean.

use arbor_kernel_math::Point3;
use arbor_kernel_topo::{BodyId, FaceId, TopologyModel};

/// Axis-aligned bounding box in 3D.
#[derive(Debug, Clone, Copy)]
pub struct Aabb3 {
    /// Minimum corner.
    pub min: Point3,
    /// Maximum corner.
    pub max: Point3,
}

impl Aabb3 {
    /// Create an empty (inverted) AABB suitable for expansion.
    pub fn empty() -> Self {
        Self {
            min: Point3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
            max: Point3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        }
    }

    /// Expand this AABB to include a point.
    pub fn include_point(&mut self, p: &Point3) {
        self.min.x = self.min.x.min(p.x);
        self.min.y = self.min.y.min(p.y);
        self.min.z = self.min.z.min(p.z);
        self.max.x = self.max.x.max(p.x);
        self.max.y = self.max.y.max(p.y);
        self.max.z = self.max.z.max(p.z);
    }

    /// Merge another AABB into this one.
    pub fn include_aabb(&mut self, other: &Aabb3) {
        self.include_point(&other.min);
        self.include_point(&other.max);
    }

    /// Test if two AABBs overlap (touching counts as overlap).
    pub fn overlaps(&self, other: &Aabb3) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    /// Test if a point lies inside (inclusive).
    pub fn contains_point(&self, p: &Point3) -> bool {
        p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }

    /// Expand the AABB by a tolerance in all directions.
    pub fn expand(&mut self, tol: f64) {
        self.min.x -= tol;
        self.min.y -= tol;
        self.min.z -= tol;
        self.max.x += tol;
        self.max.y += tol;
        self.max.z += tol;
    }

    /// Diagonal length (zero for an empty box).
    pub fn diagonal(&self) -> f64 {
        if self.min.x > self.max.x {
            return 0.0;
        }
        (self.max - self.min).norm()
    }
}

/// AABB of a face from its boundary vertex positions (exact for planar
/// faces).
pub fn face_aabb(model: &TopologyModel, face: FaceId) -> Aabb3 {
    let mut aabb = Aabb3::empty();
    for &loop_id in model.face_loops(face) {
        for p in model.loop_positions(loop_id) {
            aabb.include_point(&p);
        }
    }
    aabb
}

/// AABB of a whole body.
pub fn body_aabb(model: &TopologyModel, body: BodyId) -> Aabb3 {
    let mut aabb = Aabb3::empty();
    for face in model.body_faces(body) {
        aabb.include_aabb(&face_aabb(model, face));
    }
    aabb
}
