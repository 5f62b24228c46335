//! 2D geometric predicates shared by profile extraction, booleans and
//! tessellation.

use crate::{Point2, Vec2};

/// Signed area of a polygon (positive for counter-clockwise winding).
pub fn signed_area(points: &[Point2]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for i in 0..n {
        let a = points[i];
        let b = points[(i + 1) % n];
        sum += a.x * b.y - b.x * a.y;
    }
    sum * 0.5
}

/// Check if a polygon winds counter-clockwise.
pub fn is_counter_clockwise(points: &[Point2]) -> bool {
    signed_area(points) > 0.0
}

/// Point-in-polygon test via crossing parity.
///
/// Points on the boundary (within `eps` of an edge) count as inside.
pub fn point_in_polygon(p: &Point2, polygon: &[Point2], eps: f64) -> bool {
    let n = polygon.len();
    if n < 3 {
        return false;
    }

    // Boundary check first so parity ties don't matter
    for i in 0..n {
        let a = polygon[i];
        let b = polygon[(i + 1) % n];
        if dist_point_segment(p, &a, &b) <= eps {
            return true;
        }
    }

    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let a = polygon[i];
        let b = polygon[j];
        if (a.y > p.y) != (b.y > p.y) {
            let x_cross = a.x + (p.y - a.y) / (b.y - a.y) * (b.x - a.x);
            if p.x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Point-in-region test for a face region: inside the outer polygon and
/// outside every hole. Points on any boundary count as inside.
pub fn point_in_region(p: &Point2, outer: &[Point2], holes: &[Vec<Point2>], eps: f64) -> bool {
    if !point_in_polygon(p, outer, eps) {
        return false;
    }
    for hole in holes {
        // On a hole boundary still counts as in the region
        let on_boundary = (0..hole.len()).any(|i| {
            let a = hole[i];
            let b = hole[(i + 1) % hole.len()];
            dist_point_segment(p, &a, &b) <= eps
        });
        if on_boundary {
            continue;
        }
        if point_in_polygon(p, hole, 0.0) {
            return false;
        }
    }
    true
}

/// Distance from a point to a segment.
pub fn dist_point_segment(p: &Point2, a: &Point2, b: &Point2) -> f64 {
    let ab = b - a;
    let len2 = ab.norm_squared();
    if len2 < 1e-30 {
        return (p - a).norm();
    }
    let t = ((p - a).dot(&ab) / len2).clamp(0.0, 1.0);
    let closest = a + t * ab;
    (p - closest).norm()
}

/// Result of a segment-segment intersection test.
#[derive(Debug, Clone, Copy)]
pub struct SegmentHit {
    /// Parameter along the first segment, in `[0, 1]`.
    pub t: f64,
    /// Parameter along the second segment, in `[0, 1]`.
    pub u: f64,
    /// The intersection point.
    pub point: Point2,
}

/// Intersect two segments `a0→a1` and `b0→b1`.
///
/// Returns a hit when the segments cross or touch within `eps` of their
/// endpoints. Collinear overlaps return `None`; callers that care split
/// such segments at shared endpoints instead.
pub fn segment_intersection(
    a0: &Point2,
    a1: &Point2,
    b0: &Point2,
    b1: &Point2,
    eps: f64,
) -> Option<SegmentHit> {
    let r: Vec2 = a1 - a0;
    let s: Vec2 = b1 - b0;
    let denom = r.x * s.y - r.y * s.x;
    let r_len = r.norm();
    let s_len = s.norm();
    if r_len < 1e-30 || s_len < 1e-30 {
        return None;
    }
    if denom.abs() < 1e-12 * r_len * s_len {
        return None; // parallel or collinear
    }
    let qp: Vec2 = b0 - a0;
    let t = (qp.x * s.y - qp.y * s.x) / denom;
    let u = (qp.x * r.y - qp.y * r.x) / denom;

    let t_eps = eps / r_len;
    let u_eps = eps / s_len;
    if t < -t_eps || t > 1.0 + t_eps || u < -u_eps || u > 1.0 + u_eps {
        return None;
    }
    let t = t.clamp(0.0, 1.0);
    let u = u.clamp(0.0, 1.0);
    Some(SegmentHit {
        t,
        u,
        point: a0 + t * r,
    })
}
