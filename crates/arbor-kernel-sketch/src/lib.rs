#![warn(missing_docs)]

//! 2D sketch model for the arbor kernel.
//!
//! A sketch owns a datum plane, points, line/arc entities, and the
//! constraints that position them. Entities may be flagged as
//! construction geometry, which excludes them from profile extraction.
//! The constraint solver lives in `arbor-kernel-constraints`; profile
//! extraction in [`profile`] walks entities into closed loops for sweeps.

use std::collections::BTreeMap;

use arbor_kernel_math::{Dir3, Point2, Point3, Vec3};
use thiserror::Error;

mod constraint;
pub mod profile;

pub use constraint::{Constraint, HvTarget};
pub use profile::{profile_from_sketch, Profile, ProfileLoop};

/// Errors from sketch operations.
#[derive(Debug, Clone, Error)]
pub enum SketchError {
    /// An entity id does not exist in this sketch.
    #[error("unknown sketch entity {0:?}")]
    UnknownEntity(SketchEntityId),

    /// A point id does not exist in this sketch.
    #[error("unknown sketch point {0:?}")]
    UnknownPoint(SketchPointId),

    /// No closed loop could be extracted from the selected entities.
    #[error("no closed profile loop found (unclosed entities: {0:?})")]
    NotClosed(Vec<SketchEntityId>),

    /// A selected entity is degenerate (zero length or radius).
    #[error("degenerate entity {0:?}")]
    DegenerateEntity(SketchEntityId),

    /// The selection contained no usable entities.
    #[error("no profile entities selected")]
    EmptyProfile,
}

/// Identifier of a sketch point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SketchPointId(pub u32);

/// Identifier of a sketch entity (line or arc).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SketchEntityId(pub u32);

/// The datum plane a sketch is drawn on.
#[derive(Debug, Clone)]
pub struct SketchPlane {
    /// Plane origin in model space.
    pub origin: Point3,
    /// Unit vector of the sketch X axis.
    pub x_dir: Dir3,
    /// Unit vector of the sketch Y axis.
    pub y_dir: Dir3,
    /// Unit plane normal (x_dir × y_dir).
    pub normal: Dir3,
}

impl SketchPlane {
    /// Create a plane from an origin and two in-plane directions.
    pub fn new(origin: Point3, x_dir: Vec3, y_dir: Vec3) -> Self {
        let x = Dir3::new_normalize(x_dir);
        let n = Dir3::new_normalize(x_dir.cross(&y_dir));
        let y = Dir3::new_normalize(n.as_ref().cross(x.as_ref()));
        Self {
            origin,
            x_dir: x,
            y_dir: y,
            normal: n,
        }
    }

    /// The XY datum plane.
    pub fn xy() -> Self {
        Self::new(Point3::origin(), Vec3::x(), Vec3::y())
    }

    /// The YZ datum plane (normal +X).
    pub fn yz() -> Self {
        Self::new(Point3::origin(), Vec3::y(), Vec3::z())
    }

    /// The XZ datum plane.
    pub fn xz() -> Self {
        Self::new(Point3::origin(), Vec3::x(), Vec3::z())
    }

    /// Map a 2D sketch point to model space.
    pub fn to_3d(&self, p: Point2) -> Point3 {
        self.origin + p.x * self.x_dir.as_ref() + p.y * self.y_dir.as_ref()
    }

    /// Project a model-space point into sketch coordinates.
    pub fn to_2d(&self, p: Point3) -> Point2 {
        let d = p - self.origin;
        Point2::new(d.dot(self.x_dir.as_ref()), d.dot(self.y_dir.as_ref()))
    }

    /// Convert to the geometry pool's plane surface type.
    pub fn to_plane(&self) -> arbor_kernel_geom::Plane {
        arbor_kernel_geom::Plane::new(
            self.origin,
            *self.x_dir.as_ref(),
            *self.y_dir.as_ref(),
        )
    }
}

/// A sketch point.
#[derive(Debug, Clone)]
pub struct SketchPoint {
    /// Position in sketch coordinates.
    pub position: Point2,
    /// Fixed points are excluded from the solver state vector.
    pub fixed: bool,
    /// Optional persistent reference to external model geometry this
    /// point is attached to (resolved by the kernel facade).
    pub external_ref: Option<String>,
}

/// Geometric kind of a sketch entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SketchEntityKind {
    /// A line segment between two points.
    Line {
        /// Start point.
        start: SketchPointId,
        /// End point.
        end: SketchPointId,
    },
    /// A circular arc. A full circle has `start == end`.
    Arc {
        /// Start point on the arc.
        start: SketchPointId,
        /// End point on the arc.
        end: SketchPointId,
        /// Center point.
        center: SketchPointId,
        /// Counter-clockwise sweep from start to end.
        ccw: bool,
    },
}

/// A sketch entity with its flags.
#[derive(Debug, Clone)]
pub struct SketchEntity {
    /// The entity geometry.
    pub kind: SketchEntityKind,
    /// Construction entities are excluded from profile extraction.
    pub construction: bool,
}

/// A 2D sketch: datum plane, points, entities and constraints.
#[derive(Debug, Clone)]
pub struct Sketch {
    /// The datum plane.
    pub plane: SketchPlane,
    /// Points by id (ordered map for deterministic iteration).
    pub points: BTreeMap<SketchPointId, SketchPoint>,
    /// Entities by id.
    pub entities: BTreeMap<SketchEntityId, SketchEntity>,
    /// Constraints, in insertion order.
    pub constraints: Vec<Constraint>,
    next_point: u32,
    next_entity: u32,
}

impl Sketch {
    /// Create an empty sketch on `plane`.
    pub fn new(plane: SketchPlane) -> Self {
        Self {
            plane,
            points: BTreeMap::new(),
            entities: BTreeMap::new(),
            constraints: Vec::new(),
            next_point: 0,
            next_entity: 0,
        }
    }

    /// Add a free point at `(x, y)`.
    pub fn add_point(&mut self, x: f64, y: f64) -> SketchPointId {
        let id = SketchPointId(self.next_point);
        self.next_point += 1;
        self.points.insert(
            id,
            SketchPoint {
                position: Point2::new(x, y),
                fixed: false,
                external_ref: None,
            },
        );
        id
    }

    /// Add a fixed point at `(x, y)`.
    pub fn add_fixed_point(&mut self, x: f64, y: f64) -> SketchPointId {
        let id = self.add_point(x, y);
        self.points.get_mut(&id).unwrap().fixed = true;
        id
    }

    /// Add a line entity between two existing points.
    pub fn add_line(
        &mut self,
        start: SketchPointId,
        end: SketchPointId,
    ) -> Result<SketchEntityId, SketchError> {
        self.check_point(start)?;
        self.check_point(end)?;
        Ok(self.insert_entity(SketchEntityKind::Line { start, end }))
    }

    /// Add an arc entity.
    pub fn add_arc(
        &mut self,
        start: SketchPointId,
        end: SketchPointId,
        center: SketchPointId,
        ccw: bool,
    ) -> Result<SketchEntityId, SketchError> {
        self.check_point(start)?;
        self.check_point(end)?;
        self.check_point(center)?;
        Ok(self.insert_entity(SketchEntityKind::Arc {
            start,
            end,
            center,
            ccw,
        }))
    }

    /// Add a full circle: an arc whose start and end are the same point.
    pub fn add_circle(
        &mut self,
        center: SketchPointId,
        radius: f64,
    ) -> Result<SketchEntityId, SketchError> {
        self.check_point(center)?;
        let c = self.points[&center].position;
        let rim = self.add_point(c.x + radius, c.y);
        Ok(self.insert_entity(SketchEntityKind::Arc {
            start: rim,
            end: rim,
            center,
            ccw: true,
        }))
    }

    /// Add an axis-aligned rectangle helper: four points and four lines
    /// wound counter-clockwise. Returns `(corners, lines)`.
    pub fn add_rectangle(
        &mut self,
        x0: f64,
        y0: f64,
        x1: f64,
        y1: f64,
    ) -> ([SketchPointId; 4], [SketchEntityId; 4]) {
        let (xa, xb) = if x0 <= x1 { (x0, x1) } else { (x1, x0) };
        let (ya, yb) = if y0 <= y1 { (y0, y1) } else { (y1, y0) };
        let p0 = self.add_point(xa, ya);
        let p1 = self.add_point(xb, ya);
        let p2 = self.add_point(xb, yb);
        let p3 = self.add_point(xa, yb);
        let l0 = self.add_line(p0, p1).unwrap();
        let l1 = self.add_line(p1, p2).unwrap();
        let l2 = self.add_line(p2, p3).unwrap();
        let l3 = self.add_line(p3, p0).unwrap();
        ([p0, p1, p2, p3], [l0, l1, l2, l3])
    }

    /// Flag an entity as construction geometry.
    pub fn set_construction(
        &mut self,
        entity: SketchEntityId,
        construction: bool,
    ) -> Result<(), SketchError> {
        let rec = self
            .entities
            .get_mut(&entity)
            .ok_or(SketchError::UnknownEntity(entity))?;
        rec.construction = construction;
        Ok(())
    }

    /// Attach a point to external model geometry by persistent reference.
    pub fn attach_point(
        &mut self,
        point: SketchPointId,
        reference: String,
    ) -> Result<(), SketchError> {
        let rec = self
            .points
            .get_mut(&point)
            .ok_or(SketchError::UnknownPoint(point))?;
        rec.external_ref = Some(reference);
        Ok(())
    }

    /// Add a constraint.
    pub fn add_constraint(&mut self, constraint: Constraint) {
        self.constraints.push(constraint);
    }

    /// Position of a point.
    pub fn point_position(&self, id: SketchPointId) -> Result<Point2, SketchError> {
        self.points
            .get(&id)
            .map(|p| p.position)
            .ok_or(SketchError::UnknownPoint(id))
    }

    /// Move a point (used by the solver to write results back).
    pub fn set_point_position(&mut self, id: SketchPointId, p: Point2) -> Result<(), SketchError> {
        let rec = self
            .points
            .get_mut(&id)
            .ok_or(SketchError::UnknownPoint(id))?;
        rec.position = p;
        Ok(())
    }

    /// Entity record by id.
    pub fn entity(&self, id: SketchEntityId) -> Result<&SketchEntity, SketchError> {
        self.entities.get(&id).ok_or(SketchError::UnknownEntity(id))
    }

    /// The point ids an entity references (excluding arc centers for lines).
    pub fn entity_points(&self, id: SketchEntityId) -> Result<Vec<SketchPointId>, SketchError> {
        Ok(match self.entity(id)?.kind {
            SketchEntityKind::Line { start, end } => vec![start, end],
            SketchEntityKind::Arc {
                start, end, center, ..
            } => {
                if start == end {
                    vec![start, center]
                } else {
                    vec![start, end, center]
                }
            }
        })
    }

    fn insert_entity(&mut self, kind: SketchEntityKind) -> SketchEntityId {
        let id = SketchEntityId(self.next_entity);
        self.next_entity += 1;
        self.entities.insert(
            id,
            SketchEntity {
                kind,
                construction: false,
            },
        );
        id
    }

    fn check_point(&self, id: SketchPointId) -> Result<(), SketchError> {
        if self.points.contains_key(&id) {
            Ok(())
        } else {
            Err(SketchError::UnknownPoint(id))
        }
    }
}
