#![warn(missing_docs)]

//! Analytic surface and curve geometry for the arbor kernel.
//!
//! Provides the trait-based surface abstraction (planes are the only
//! surface exercised end-to-end by the planar core), 2D and 3D curve
//! types, and the append-only geometry pools that topology entities
//! reference by index.

use std::any::Any;

use arbor_kernel_math::{Dir3, Point2, Point3, Transform, Vec3};

mod curve;
mod pool;

pub use curve::{Curve2, Curve3};
pub use pool::{Curve2Index, Curve3Index, GeometryPool, PCurve, PCurveIndex, SurfaceIndex};

/// The kind of a surface (for match-based dispatch).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceKind {
    /// Infinite plane.
    Plane,
}

/// A parametric surface in 3D space.
///
/// The kind enum is open-ended; the planar boolean core rejects anything
/// that is not a [`Plane`].
pub trait Surface: Send + Sync + std::fmt::Debug {
    /// Evaluate the surface at parameter `(u, v)` to get a 3D point.
    fn evaluate(&self, uv: Point2) -> Point3;

    /// Surface normal at parameter `(u, v)`.
    fn normal(&self, uv: Point2) -> Dir3;

    /// The kind of this surface.
    fn surface_type(&self) -> SurfaceKind;

    /// Clone this surface into a boxed trait object.
    fn clone_box(&self) -> Box<dyn Surface>;

    /// Downcast to a concrete type via `Any`.
    fn as_any(&self) -> &dyn Any;

    /// Apply an affine transform to this surface, returning a new surface.
    fn transform(&self, t: &Transform) -> Box<dyn Surface>;
}

impl Clone for Box<dyn Surface> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

// =============================================================================
// Plane
// =============================================================================

/// An infinite plane defined by an origin point and a coordinate frame.
///
/// Parameterization: `P(u, v) = origin + u * x_dir + v * y_dir`
#[derive(Debug, Clone)]
pub struct Plane {
    /// Origin point on the plane.
    pub origin: Point3,
    /// Unit vector along the u direction.
    pub x_dir: Dir3,
    /// Unit vector along the v direction.
    pub y_dir: Dir3,
    /// Unit normal (x_dir × y_dir).
    pub normal_dir: Dir3,
}

impl Plane {
    /// Create a plane from origin and two orthogonal direction vectors.
    /// The vectors do not need to be normalized.
    pub fn new(origin: Point3, x_dir: Vec3, y_dir: Vec3) -> Self {
        let x = Dir3::new_normalize(x_dir);
        let n = Dir3::new_normalize(x_dir.cross(&y_dir));
        // Re-orthogonalize y so the frame is exactly orthonormal
        let y = Dir3::new_normalize(n.as_ref().cross(x.as_ref()));
        Self {
            origin,
            x_dir: x,
            y_dir: y,
            normal_dir: n,
        }
    }

    /// Create a plane from origin and normal. X/Y directions are chosen arbitrarily.
    pub fn from_normal(origin: Point3, normal: Vec3) -> Self {
        let n = Dir3::new_normalize(normal);
        let arbitrary = if n.as_ref().x.abs() < 0.9 {
            Vec3::x()
        } else {
            Vec3::y()
        };
        let x = Dir3::new_normalize(arbitrary.cross(n.as_ref()));
        let y = Dir3::new_normalize(n.as_ref().cross(x.as_ref()));
        Self {
            origin,
            x_dir: x,
            y_dir: y,
            normal_dir: n,
        }
    }

    /// XY plane at the origin.
    pub fn xy() -> Self {
        Self::new(Point3::origin(), Vec3::x(), Vec3::y())
    }

    /// XZ plane at the origin (normal −Y).
    pub fn xz() -> Self {
        Self::new(Point3::origin(), Vec3::x(), Vec3::z())
    }

    /// YZ plane at the origin (normal +X).
    pub fn yz() -> Self {
        Self::new(Point3::origin(), Vec3::y(), Vec3::z())
    }

    /// Project a 3D point onto this plane's (u, v) parameter space.
    pub fn project(&self, p: &Point3) -> Point2 {
        let d = p - self.origin;
        Point2::new(d.dot(self.x_dir.as_ref()), d.dot(self.y_dir.as_ref()))
    }

    /// Map a (u, v) parameter point to 3D.
    pub fn lift(&self, uv: &Point2) -> Point3 {
        self.origin + uv.x * self.x_dir.as_ref() + uv.y * self.y_dir.as_ref()
    }

    /// Signed distance from a point to this plane.
    pub fn signed_distance(&self, p: &Point3) -> f64 {
        (p - self.origin).dot(self.normal_dir.as_ref())
    }

    /// Return this plane with the normal flipped (x/y swapped so the frame
    /// stays right-handed).
    pub fn flipped(&self) -> Self {
        Self {
            origin: self.origin,
            x_dir: self.y_dir,
            y_dir: self.x_dir,
            normal_dir: Dir3::new_normalize(-self.normal_dir.as_ref()),
        }
    }

    /// Intersect this plane with another.
    ///
    /// Returns the intersection line as `(point, direction)`, or `None`
    /// when the planes are parallel (coplanar or not).
    pub fn intersect_plane(&self, other: &Plane, angular_eps: f64) -> Option<(Point3, Dir3)> {
        let n1 = self.normal_dir.as_ref();
        let n2 = other.normal_dir.as_ref();
        let dir = n1.cross(n2);
        if dir.norm() < angular_eps.max(1e-12) {
            return None;
        }
        let dir = dir.normalize();

        // Solve for a point on both planes: walk from self's origin toward
        // the other plane within self.
        let d2 = other.signed_distance(&self.origin);
        let step = n2 - n2.dot(n1) * n1; // component of n2 within self's plane
        let step_len2 = step.norm_squared();
        if step_len2 < 1e-30 {
            return None;
        }
        let point = self.origin - (d2 / step_len2) * step;
        Some((point, Dir3::new_normalize(dir)))
    }

    /// Check if another plane is coplanar with this one within tolerances.
    pub fn coplanar_with(&self, other: &Plane, length_eps: f64) -> bool {
        let n1 = self.normal_dir.as_ref();
        let n2 = other.normal_dir.as_ref();
        if n1.cross(n2).norm() > 1e-9 {
            return false;
        }
        self.signed_distance(&other.origin).abs() <= length_eps
    }
}

impl Surface for Plane {
    fn evaluate(&self, uv: Point2) -> Point3 {
        self.lift(&uv)
    }

    fn normal(&self, _uv: Point2) -> Dir3 {
        self.normal_dir
    }

    fn surface_type(&self) -> SurfaceKind {
        SurfaceKind::Plane
    }

    fn clone_box(&self) -> Box<dyn Surface> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn transform(&self, t: &Transform) -> Box<dyn Surface> {
        let new_origin = t.apply_point(&self.origin);
        let new_x = t.apply_vec(self.x_dir.as_ref());
        let new_y = t.apply_vec(self.y_dir.as_ref());
        Box::new(Plane::new(new_origin, new_x, new_y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plane_project_lift_roundtrip() {
        let plane = Plane::new(Point3::new(1.0, 2.0, 3.0), Vec3::x(), Vec3::y());
        let uv = Point2::new(4.0, -2.5);
        let p = plane.lift(&uv);
        let back = plane.project(&p);
        assert!((back - uv).norm() < 1e-12);
    }

    #[test]
    fn test_plane_signed_distance() {
        let plane = Plane::xy();
        assert!((plane.signed_distance(&Point3::new(5.0, 5.0, 3.0)) - 3.0).abs() < 1e-12);
        assert!((plane.signed_distance(&Point3::new(5.0, 5.0, -3.0)) + 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_plane_intersection_line() {
        // XY plane and XZ-through-y=2 plane intersect along y=2, z=0
        let a = Plane::xy();
        let b = Plane::new(Point3::new(0.0, 2.0, 0.0), Vec3::x(), Vec3::z());
        let (point, dir) = a.intersect_plane(&b, 1e-12).unwrap();
        assert!(point.z.abs() < 1e-12);
        assert!((point.y - 2.0).abs() < 1e-10);
        // Direction is along ±X
        assert!(dir.as_ref().x.abs() > 0.999);
    }

    #[test]
    fn test_parallel_planes_no_intersection() {
        let a = Plane::xy();
        let b = Plane::new(Point3::new(0.0, 0.0, 5.0), Vec3::x(), Vec3::y());
        assert!(a.intersect_plane(&b, 1e-12).is_none());
        assert!(!a.coplanar_with(&b, 1e-6));
    }

    #[test]
    fn test_coplanar_detection() {
        let a = Plane::xy();
        let b = Plane::new(Point3::new(7.0, -3.0, 1e-9), Vec3::y(), -Vec3::x());
        assert!(a.coplanar_with(&b, 1e-6));
    }

    #[test]
    fn test_flipped_plane() {
        let plane = Plane::xy();
        let flipped = plane.flipped();
        assert!((flipped.normal_dir.as_ref() + plane.normal_dir.as_ref()).norm() < 1e-12);
        // Frame stays right-handed
        let cross = flipped.x_dir.as_ref().cross(flipped.y_dir.as_ref());
        assert!((cross - flipped.normal_dir.as_ref()).norm() < 1e-12);
    }
}
