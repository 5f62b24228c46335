#![warn(missing_docs)]

//! Math types for the arbor B-rep kernel.
//!
//! Thin wrappers around nalgebra providing domain-specific types for 3D
//! CAD geometry: points, vectors, directions, affine transforms, the
//! tolerance context threaded through all geometric predicates, and the
//! 2D predicates shared by profile extraction, booleans and tessellation.

use nalgebra::{Matrix4, Unit, Vector2, Vector3, Vector4};

mod predicates;

pub use predicates::{
    dist_point_segment, is_counter_clockwise, point_in_polygon, point_in_region,
    segment_intersection, signed_area, SegmentHit,
};

/// A point in 3D space.
pub type Point3 = nalgebra::Point3<f64>;

/// A vector in 3D space.
pub type Vec3 = Vector3<f64>;

/// A unit (normalized) direction vector in 3D space.
pub type Dir3 = Unit<Vector3<f64>>;

/// A point in 2D parameter space.
pub type Point2 = nalgebra::Point2<f64>;

/// A vector in 2D space.
pub type Vec2 = Vector2<f64>;

/// A 4x4 affine transformation matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    /// The underlying 4x4 matrix.
    pub matrix: Matrix4<f64>,
}

impl Transform {
    /// Identity transform.
    pub fn identity() -> Self {
        Self {
            matrix: Matrix4::identity(),
        }
    }

    /// Translation by `(dx, dy, dz)`.
    pub fn translation(dx: f64, dy: f64, dz: f64) -> Self {
        let mut m = Matrix4::identity();
        m[(0, 3)] = dx;
        m[(1, 3)] = dy;
        m[(2, 3)] = dz;
        Self { matrix: m }
    }

    /// Rotation about an arbitrary axis through `origin` by `angle` radians.
    ///
    /// Uses Rodrigues' rotation formula.
    pub fn rotation_about_axis(origin: &Point3, axis: &Dir3, angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        let t = 1.0 - c;
        let (x, y, z) = (axis.as_ref().x, axis.as_ref().y, axis.as_ref().z);
        let mut m = Matrix4::identity();
        m[(0, 0)] = t * x * x + c;
        m[(0, 1)] = t * x * y - s * z;
        m[(0, 2)] = t * x * z + s * y;
        m[(1, 0)] = t * x * y + s * z;
        m[(1, 1)] = t * y * y + c;
        m[(1, 2)] = t * y * z - s * x;
        m[(2, 0)] = t * x * z - s * y;
        m[(2, 1)] = t * y * z + s * x;
        m[(2, 2)] = t * z * z + c;
        let rotated_origin = {
            let v = m * Vector4::new(origin.x, origin.y, origin.z, 1.0);
            Vec3::new(v.x, v.y, v.z)
        };
        let shift = origin.coords - rotated_origin;
        m[(0, 3)] = shift.x;
        m[(1, 3)] = shift.y;
        m[(2, 3)] = shift.z;
        Self { matrix: m }
    }

    /// Compose: apply `other` first, then `self`.
    pub fn then(&self, other: &Transform) -> Self {
        Self {
            matrix: self.matrix * other.matrix,
        }
    }

    /// Transform a point.
    pub fn apply_point(&self, p: &Point3) -> Point3 {
        let v = self.matrix * Vector4::new(p.x, p.y, p.z, 1.0);
        Point3::new(v.x, v.y, v.z)
    }

    /// Transform a direction vector (ignores translation).
    pub fn apply_vec(&self, v: &Vec3) -> Vec3 {
        let r = self.matrix * Vector4::new(v.x, v.y, v.z, 0.0);
        Vec3::new(r.x, r.y, r.z)
    }

    /// Transform a normal vector (uses inverse transpose of upper-left 3x3).
    pub fn apply_normal(&self, n: &Vec3) -> Vec3 {
        let m3 = self.matrix.fixed_view::<3, 3>(0, 0);
        if let Some(inv) = m3.try_inverse() {
            inv.transpose() * n
        } else {
            // Degenerate transform — return input unchanged
            *n
        }
    }

    /// Inverse of this transform, if it exists.
    pub fn inverse(&self) -> Option<Self> {
        self.matrix.try_inverse().map(|matrix| Self { matrix })
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

/// Tolerance values for geometric comparisons.
#[derive(Debug, Clone, Copy)]
pub struct Tolerances {
    /// Linear distance tolerance in mm.
    pub length: f64,
    /// Angular tolerance in radians.
    pub angular: f64,
}

impl Tolerances {
    /// Default CAD tolerances (1e-6 mm linear, 1e-9 rad angular).
    pub const DEFAULT: Self = Self {
        length: 1e-6,
        angular: 1e-9,
    };
}

/// Numeric context threaded through all geometric predicates.
///
/// Callers may widen the tolerances for lenient booleans; nothing in the
/// kernel reads a global tolerance.
#[derive(Debug, Clone, Copy)]
pub struct NumericContext {
    /// Tolerance values used by this context.
    pub tol: Tolerances,
}

impl NumericContext {
    /// Context with the default tolerances.
    pub const DEFAULT: Self = Self {
        tol: Tolerances::DEFAULT,
    };

    /// Context with a custom linear tolerance (angular stays at default).
    pub fn with_length_tol(length: f64) -> Self {
        Self {
            tol: Tolerances {
                length,
                angular: Tolerances::DEFAULT.angular,
            },
        }
    }

    /// Check if two 3D points are coincident within tolerance.
    pub fn points_equal(&self, a: &Point3, b: &Point3) -> bool {
        (a - b).norm() < self.tol.length
    }

    /// Check if two 2D points are coincident within tolerance.
    pub fn points2_equal(&self, a: &Point2, b: &Point2) -> bool {
        (a - b).norm() < self.tol.length
    }

    /// Check if a scalar distance is effectively zero.
    pub fn is_zero(&self, d: f64) -> bool {
        d.abs() < self.tol.length
    }

    /// Check if two directions are parallel within angular tolerance.
    pub fn dirs_parallel(&self, a: &Dir3, b: &Dir3) -> bool {
        a.as_ref().cross(b.as_ref()).norm() < self.tol.angular.max(1e-12)
    }
}

impl Default for NumericContext {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_identity_transform() {
        let t = Transform::identity();
        let p = Point3::new(1.0, 2.0, 3.0);
        let result = t.apply_point(&p);
        assert!((result - p).norm() < 1e-12);
    }

    #[test]
    fn test_translation() {
        let t = Transform::translation(10.0, 20.0, 30.0);
        let p = Point3::new(1.0, 2.0, 3.0);
        let result = t.apply_point(&p);
        assert!((result.x - 11.0).abs() < 1e-12);
        assert!((result.y - 22.0).abs() < 1e-12);
        assert!((result.z - 33.0).abs() < 1e-12);
    }

    #[test]
    fn test_rotation_about_axis_through_origin() {
        // Rotate (1,0,0) by 90° about Z axis → (0,1,0)
        let axis = Dir3::new_normalize(Vec3::z());
        let t = Transform::rotation_about_axis(&Point3::origin(), &axis, PI / 2.0);
        let p = Point3::new(1.0, 0.0, 0.0);
        let result = t.apply_point(&p);
        assert!(result.x.abs() < 1e-12);
        assert!((result.y - 1.0).abs() < 1e-12);
        assert!(result.z.abs() < 1e-12);
    }

    #[test]
    fn test_rotation_about_offset_axis() {
        // Axis through (1,0,0) along Z; rotating (2,0,0) by 180° lands on (0,0,0)
        let axis = Dir3::new_normalize(Vec3::z());
        let t = Transform::rotation_about_axis(&Point3::new(1.0, 0.0, 0.0), &axis, PI);
        let result = t.apply_point(&Point3::new(2.0, 0.0, 0.0));
        assert!(result.x.abs() < 1e-12);
        assert!(result.y.abs() < 1e-12);
        assert!(result.z.abs() < 1e-12);
    }

    #[test]
    fn test_inverse_roundtrip() {
        let axis = Dir3::new_normalize(Vec3::new(1.0, 1.0, 0.5));
        let t = Transform::rotation_about_axis(&Point3::new(3.0, -1.0, 2.0), &axis, 0.7)
            .then(&Transform::translation(1.0, 2.0, 3.0));
        let inv = t.inverse().unwrap();
        let p = Point3::new(5.0, 6.0, 7.0);
        let result = inv.apply_point(&t.apply_point(&p));
        assert!((result - p).norm() < 1e-10);
    }

    #[test]
    fn test_context_points_equal() {
        let ctx = NumericContext::DEFAULT;
        let a = Point3::new(1.0, 2.0, 3.0);
        let b = Point3::new(1.0 + 1e-7, 2.0, 3.0);
        assert!(ctx.points_equal(&a, &b));
        let c = Point3::new(1.001, 2.0, 3.0);
        assert!(!ctx.points_equal(&a, &c));
    }

    #[test]
    fn test_widened_context() {
        let ctx = NumericContext::with_length_tol(1e-2);
        let a = Point3::new(1.0, 2.0, 3.0);
        let c = Point3::new(1.001, 2.0, 3.0);
        assert!(ctx.points_equal(&a, &c));
    }
}
