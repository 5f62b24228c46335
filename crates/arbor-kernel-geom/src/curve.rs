//! 2D and 3D curve types.
//!
//! Curves are tagged unions evaluated over `t ∈ [0, 1]`. Arcs store a
//! start/end angle pair; a full circle is an arc sweeping 2π.

use std::f64::consts::PI;

use arbor_kernel_math::{Dir3, Point2, Point3, Vec2, Vec3};

/// A curve in 2D sketch/parameter space.
#[derive(Debug, Clone)]
pub enum Curve2 {
    /// A line segment from `p0` to `p1`.
    Line {
        /// Start point.
        p0: Point2,
        /// End point.
        p1: Point2,
    },
    /// A circular arc around `center`.
    Arc {
        /// Arc center.
        center: Point2,
        /// Arc radius.
        radius: f64,
        /// Angle of the start point, radians.
        start_angle: f64,
        /// Angle of the end point, radians.
        end_angle: f64,
        /// If true, the arc sweeps counter-clockwise from start to end.
        ccw: bool,
    },
}

impl Curve2 {
    /// Build an arc from start/end/center points.
    ///
    /// A start coincident with end (within `eps`) yields a full circle.
    pub fn arc_from_points(start: Point2, end: Point2, center: Point2, ccw: bool, eps: f64) -> Self {
        let radius = (start - center).norm();
        let start_angle = (start.y - center.y).atan2(start.x - center.x);
        let end_angle = if (end - start).norm() < eps {
            start_angle + if ccw { 2.0 * PI } else { -2.0 * PI }
        } else {
            (end.y - center.y).atan2(end.x - center.x)
        };
        Self::Arc {
            center,
            radius,
            start_angle,
            end_angle,
            ccw,
        }
    }

    /// Signed sweep angle of an arc (positive CCW), zero for lines.
    pub fn sweep_angle(&self) -> f64 {
        match self {
            Curve2::Line { .. } => 0.0,
            Curve2::Arc {
                start_angle,
                end_angle,
                ccw,
                ..
            } => {
                let mut sweep = end_angle - start_angle;
                if *ccw {
                    while sweep <= 1e-12 {
                        sweep += 2.0 * PI;
                    }
                } else {
                    while sweep >= -1e-12 {
                        sweep -= 2.0 * PI;
                    }
                }
                sweep
            }
        }
    }

    /// Evaluate the curve at `t ∈ [0, 1]`.
    pub fn point_at(&self, t: f64) -> Point2 {
        match self {
            Curve2::Line { p0, p1 } => p0 + t * (p1 - p0),
            Curve2::Arc {
                center,
                radius,
                start_angle,
                ..
            } => {
                let angle = start_angle + t * self.sweep_angle();
                Point2::new(
                    center.x + radius * angle.cos(),
                    center.y + radius * angle.sin(),
                )
            }
        }
    }

    /// First derivative with respect to `t`.
    pub fn derivative_at(&self, t: f64) -> Vec2 {
        match self {
            Curve2::Line { p0, p1 } => p1 - p0,
            Curve2::Arc {
                radius,
                start_angle,
                ..
            } => {
                let sweep = self.sweep_angle();
                let angle = start_angle + t * sweep;
                Vec2::new(-radius * sweep * angle.sin(), radius * sweep * angle.cos())
            }
        }
    }

    /// Start point (`t = 0`).
    pub fn start(&self) -> Point2 {
        self.point_at(0.0)
    }

    /// End point (`t = 1`).
    pub fn end(&self) -> Point2 {
        self.point_at(1.0)
    }

    /// Arc length.
    pub fn length(&self) -> f64 {
        match self {
            Curve2::Line { p0, p1 } => (p1 - p0).norm(),
            Curve2::Arc { radius, .. } => radius * self.sweep_angle().abs(),
        }
    }

    /// True when the curve closes on itself (full circle).
    pub fn is_closed(&self) -> bool {
        match self {
            Curve2::Line { .. } => false,
            Curve2::Arc { .. } => self.sweep_angle().abs() >= 2.0 * PI - 1e-9,
        }
    }

    /// Reverse the curve direction in place.
    pub fn reverse(&mut self) {
        match self {
            Curve2::Line { p0, p1 } => std::mem::swap(p0, p1),
            Curve2::Arc {
                start_angle,
                end_angle,
                ccw,
                ..
            } => {
                std::mem::swap(start_angle, end_angle);
                *ccw = !*ccw;
            }
        }
    }

    /// Discretize into a polyline with `segments` pieces (lines yield one).
    ///
    /// Returns the `segments + 1` points including both endpoints.
    pub fn polygonize(&self, segments: u32) -> Vec<Point2> {
        match self {
            Curve2::Line { p0, p1 } => vec![*p0, *p1],
            Curve2::Arc { .. } => {
                let n = segments.max(2) as usize;
                (0..=n)
                    .map(|i| self.point_at(i as f64 / n as f64))
                    .collect()
            }
        }
    }
}

/// A curve in 3D model space.
#[derive(Debug, Clone)]
pub enum Curve3 {
    /// A line segment from `p0` to `p1`.
    Line {
        /// Start point.
        p0: Point3,
        /// End point.
        p1: Point3,
    },
    /// A circular arc in the plane spanned by `x_dir`/`y_dir` around `center`.
    Arc {
        /// Arc center.
        center: Point3,
        /// In-plane direction of angle 0.
        x_dir: Dir3,
        /// In-plane direction of angle π/2.
        y_dir: Dir3,
        /// Arc radius.
        radius: f64,
        /// Angle of the start point, radians.
        start_angle: f64,
        /// Signed sweep (positive CCW in the x/y frame).
        sweep: f64,
    },
}

impl Curve3 {
    /// Evaluate the curve at `t ∈ [0, 1]`.
    pub fn point_at(&self, t: f64) -> Point3 {
        match self {
            Curve3::Line { p0, p1 } => p0 + t * (p1 - p0),
            Curve3::Arc {
                center,
                x_dir,
                y_dir,
                radius,
                start_angle,
                sweep,
            } => {
                let angle = start_angle + t * sweep;
                center
                    + *radius * angle.cos() * x_dir.as_ref()
                    + *radius * angle.sin() * y_dir.as_ref()
            }
        }
    }

    /// First derivative with respect to `t`.
    pub fn derivative_at(&self, t: f64) -> Vec3 {
        match self {
            Curve3::Line { p0, p1 } => p1 - p0,
            Curve3::Arc {
                x_dir,
                y_dir,
                radius,
                start_angle,
                sweep,
                ..
            } => {
                let angle = start_angle + t * sweep;
                *radius * *sweep * (-angle.sin() * x_dir.as_ref() + angle.cos() * y_dir.as_ref())
            }
        }
    }

    /// Start point (`t = 0`).
    pub fn start(&self) -> Point3 {
        self.point_at(0.0)
    }

    /// End point (`t = 1`).
    pub fn end(&self) -> Point3 {
        self.point_at(1.0)
    }

    /// Arc length.
    pub fn length(&self) -> f64 {
        match self {
            Curve3::Line { p0, p1 } => (p1 - p0).norm(),
            Curve3::Arc { radius, sweep, .. } => radius * sweep.abs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line2_eval() {
        let c = Curve2::Line {
            p0: Point2::new(0.0, 0.0),
            p1: Point2::new(10.0, 0.0),
        };
        assert!((c.point_at(0.5) - Point2::new(5.0, 0.0)).norm() < 1e-12);
        assert!((c.length() - 10.0).abs() < 1e-12);
        assert!(!c.is_closed());
    }

    #[test]
    fn test_arc2_quarter() {
        let c = Curve2::arc_from_points(
            Point2::new(5.0, 0.0),
            Point2::new(0.0, 5.0),
            Point2::origin(),
            true,
            1e-9,
        );
        assert!((c.sweep_angle() - PI / 2.0).abs() < 1e-12);
        assert!((c.length() - 5.0 * PI / 2.0).abs() < 1e-12);
        let mid = c.point_at(0.5);
        let expected = Point2::new(5.0 * (PI / 4.0).cos(), 5.0 * (PI / 4.0).sin());
        assert!((mid - expected).norm() < 1e-12);
    }

    #[test]
    fn test_arc2_full_circle() {
        let start = Point2::new(3.0, 0.0);
        let c = Curve2::arc_from_points(start, start, Point2::origin(), true, 1e-9);
        assert!(c.is_closed());
        assert!((c.length() - 6.0 * PI).abs() < 1e-10);
        assert!((c.start() - c.end()).norm() < 1e-10);
    }

    #[test]
    fn test_arc2_reverse() {
        let mut c = Curve2::arc_from_points(
            Point2::new(5.0, 0.0),
            Point2::new(0.0, 5.0),
            Point2::origin(),
            true,
            1e-9,
        );
        let start = c.start();
        let end = c.end();
        c.reverse();
        assert!((c.start() - end).norm() < 1e-12);
        assert!((c.end() - start).norm() < 1e-12);
        assert!((c.sweep_angle() + PI / 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_arc2_polygonize_endpoints() {
        let c = Curve2::arc_from_points(
            Point2::new(2.0, 0.0),
            Point2::new(-2.0, 0.0),
            Point2::origin(),
            true,
            1e-9,
        );
        let pts = c.polygonize(8);
        assert_eq!(pts.len(), 9);
        assert!((pts[0] - c.start()).norm() < 1e-12);
        assert!((pts[8] - c.end()).norm() < 1e-12);
    }

    #[test]
    fn test_line3_eval() {
        let c = Curve3::Line {
            p0: Point3::new(0.0, 0.0, 0.0),
            p1: Point3::new(0.0, 0.0, 4.0),
        };
        assert!((c.point_at(0.25) - Point3::new(0.0, 0.0, 1.0)).norm() < 1e-12);
        assert!((c.derivative_at(0.5) - Vec3::new(0.0, 0.0, 4.0)).norm() < 1e-12);
    }

    #[test]
    fn test_arc3_eval() {
        let c = Curve3::Arc {
            center: Point3::origin(),
            x_dir: Dir3::new_normalize(Vec3::x()),
            y_dir: Dir3::new_normalize(Vec3::y()),
            radius: 2.0,
            start_angle: 0.0,
            sweep: PI,
        };
        assert!((c.start() - Point3::new(2.0, 0.0, 0.0)).norm() < 1e-12);
        assert!((c.end() - Point3::new(-2.0, 0.0, 0.0)).norm() < 1e-12);
        assert!((c.length() - 2.0 * PI).abs() < 1e-12);
    }
}
