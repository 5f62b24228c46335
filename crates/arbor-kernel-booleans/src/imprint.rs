//! Face-face imprinting.
//!
//! Every face of both bodies becomes a [`FaceRegion`]: its boundary
//! loops projected into the effective plane's UV space. For each
//! candidate face pair the supporting planes are intersected; the
//! intersection line is clipped to the portion lying inside both faces'
//! regions, and the surviving intervals are recorded as imprint segments
//! on each face. Faces are then rebuilt into [`FacePiece`]s via the 2D
//! subdivision.

use arbor_kernel_geom::{GeometryPool, Plane, SurfaceKind};
use arbor_kernel_math::{point_in_region, signed_area, NumericContext, Point2, Point3, Vec2};
use arbor_kernel_topo::{BodyId, FaceId, TopologyModel};

use crate::bbox::{face_aabb, Aabb3};
use crate::dcel::Subdivision;
use crate::BooleanError;

/// A face flattened into its effective plane's UV space.
#[derive(Debug, Clone)]
pub struct FaceRegion {
    /// Source face handle.
    pub face: FaceId,
    /// 0 for body A, 1 for body B.
    pub body_tag: u8,
    /// Effective plane: surface plane, flipped when the face is REVERSED.
    pub plane: Plane,
    /// Counter-clockwise outer boundary in UV.
    pub outer: Vec<Point2>,
    /// Clockwise holes in UV.
    pub holes: Vec<Vec<Point2>>,
    /// 3D bounds of the boundary.
    pub aabb: Aabb3,
    /// Imprint segments accumulated from face-face intersections.
    pub imprints: Vec<(Point2, Point2)>,
}

impl FaceRegion {
    /// Lift a UV point back to 3D.
    pub fn lift(&self, p: &Point2) -> Point3 {
        self.plane.lift(p)
    }

    /// Is the UV point inside the face's material (holes excluded)?
    pub fn contains(&self, p: &Point2, eps: f64) -> bool {
        point_in_region(p, &self.outer, &self.holes, eps)
    }
}

/// One classified piece of an imprinted face.
#[derive(Debug, Clone)]
pub struct FacePiece {
    /// The face this piece was cut from.
    pub source_face: FaceId,
    /// 0 for body A, 1 for body B.
    pub source_body: u8,
    /// Effective plane (same frame as the source region).
    pub plane: Plane,
    /// Counter-clockwise outer polygon in UV.
    pub outer: Vec<Point2>,
    /// Clockwise holes in UV.
    pub holes: Vec<Vec<Point2>>,
}

impl FacePiece {
    /// Lift a UV point to 3D.
    pub fn lift(&self, p: &Point2) -> Point3 {
        self.plane.lift(p)
    }

    /// Piece area (outer minus holes).
    pub fn area(&self) -> f64 {
        signed_area(&self.outer) + self.holes.iter().map(|h| signed_area(h)).sum::<f64>()
    }

    /// 3D bounds of the piece.
    pub fn aabb(&self) -> Aabb3 {
        let mut aabb = Aabb3::empty();
        for p in &self.outer {
            aabb.include_point(&self.lift(p));
        }
        aabb
    }
}

/// Flatten every live face of `body` into a [`FaceRegion`].
///
/// Fails with [`BooleanError::NonPlanarFace`] when a face's surface is
/// not a plane.
pub fn extract_regions(
    model: &TopologyModel,
    geom: &GeometryPool,
    body: BodyId,
    body_tag: u8,
) -> Result<Vec<FaceRegion>, BooleanError> {
    let mut regions = Vec::new();
    for face in model.body_faces(body) {
        let surface = geom.surface(model.faces[face].surface);
        if surface.surface_type() != SurfaceKind::Plane {
            return Err(BooleanError::NonPlanarFace);
        }
        let plane = surface
            .as_any()
            .downcast_ref::<Plane>()
            .expect("surface kind checked above")
            .clone();
        let plane = if model.faces[face].reversed {
            plane.flipped()
        } else {
            plane
        };

        let loops = model.face_loops(face);
        if loops.is_empty() {
            continue;
        }
        let project_loop = |loop_id| -> Vec<Point2> {
            model
                .loop_positions(loop_id)
                .iter()
                .map(|p| plane.project(p))
                .collect()
        };
        let mut outer = project_loop(loops[0]);
        if signed_area(&outer) < 0.0 {
            outer.reverse();
        }
        let mut holes = Vec::new();
        for &hole in &loops[1..] {
            let mut ring = project_loop(hole);
            if signed_area(&ring) > 0.0 {
                ring.reverse();
            }
            holes.push(ring);
        }

        regions.push(FaceRegion {
            face,
            body_tag,
            plane,
            outer,
            holes,
            aabb: face_aabb(model, face),
            imprints: Vec::new(),
        });
    }
    Ok(regions)
}

/// Imprint every overlapping face pair of the two region sets.
pub fn imprint_pairs(
    regions_a: &mut [FaceRegion],
    regions_b: &mut [FaceRegion],
    ctx: &NumericContext,
) {
    let tol = ctx.tol.length;
    for ra_idx in 0..regions_a.len() {
        for rb_idx in 0..regions_b.len() {
            let (ra, rb) = (&regions_a[ra_idx], &regions_b[rb_idx]);
            let mut box_a = ra.aabb;
            box_a.expand(tol);
            if !box_a.overlaps(&rb.aabb) {
                continue;
            }

            if ra.plane.coplanar_with(&rb.plane, tol) {
                let (seg_a, seg_b) = coplanar_imprints(ra, rb, ctx);
                regions_a[ra_idx].imprints.extend(seg_a);
                regions_b[rb_idx].imprints.extend(seg_b);
            } else if let Some((point, dir)) = ra.plane.intersect_plane(&rb.plane, 1e-12) {
                let d = *dir.as_ref();
                let intervals = shared_line_intervals(ra, rb, &point, &d, ctx);
                let mut segs_a = Vec::with_capacity(intervals.len());
                let mut segs_b = Vec::with_capacity(intervals.len());
                for (t0, t1) in intervals {
                    let p0 = point + t0 * d;
                    let p1 = point + t1 * d;
                    segs_a.push((ra.plane.project(&p0), ra.plane.project(&p1)));
                    segs_b.push((rb.plane.project(&p0), rb.plane.project(&p1)));
                }
                regions_a[ra_idx].imprints.extend(segs_a);
                regions_b[rb_idx].imprints.extend(segs_b);
            }
        }
    }
}

/// Coplanar case: each face's boundary segments clipped into the other
/// face become imprints on the other face.
fn coplanar_imprints(
    ra: &FaceRegion,
    rb: &FaceRegion,
    ctx: &NumericContext,
) -> (Vec<(Point2, Point2)>, Vec<(Point2, Point2)>) {
    let clip_into = |src: &FaceRegion, dst: &FaceRegion| -> Vec<(Point2, Point2)> {
        let mut out = Vec::new();
        for (s0, s1) in boundary_segments(src) {
            let a3 = src.lift(&s0);
            let b3 = src.lift(&s1);
            let a = dst.plane.project(&a3);
            let b = dst.plane.project(&b3);
            out.extend(clip_segment_to_region(dst, &a, &b, ctx));
        }
        out
    };
    (clip_into(rb, ra), clip_into(ra, rb))
}

/// All boundary segments (outer + holes) of a region in its own UV.
fn boundary_segments(region: &FaceRegion) -> Vec<(Point2, Point2)> {
    let mut segs = Vec::new();
    let mut push_ring = |ring: &[Point2]| {
        for i in 0..ring.len() {
            segs.push((ring[i], ring[(i + 1) % ring.len()]));
        }
    };
    push_ring(&region.outer);
    for hole in &region.holes {
        push_ring(hole);
    }
    segs
}

/// Clip a UV segment to the part lying inside the region's material.
fn clip_segment_to_region(
    region: &FaceRegion,
    a: &Point2,
    b: &Point2,
    ctx: &NumericContext,
) -> Vec<(Point2, Point2)> {
    let d = b - a;
    let len = d.norm();
    if len < ctx.tol.length {
        return Vec::new();
    }
    let mut ts = vec![0.0, 1.0];
    for (s0, s1) in boundary_segments(region) {
        if let Some(t) = line_segment_param(a, &d, &s0, &s1, ctx.tol.length) {
            if t > 0.0 && t < 1.0 {
                ts.push(t);
            }
        }
    }
    ts.sort_by(|x, y| x.partial_cmp(y).unwrap());
    let mut out = Vec::new();
    for w in ts.windows(2) {
        let (t0, t1) = (w[0], w[1]);
        if (t1 - t0) * len < ctx.tol.length {
            continue;
        }
        let mid = a + (t0 + t1) * 0.5 * d;
        if region.contains(&mid, ctx.tol.length) {
            out.push((a + t0 * d, a + t1 * d));
        }
    }
    out
}

/// Intervals of the 3D line `point + t·dir` lying inside both regions.
fn shared_line_intervals(
    ra: &FaceRegion,
    rb: &FaceRegion,
    point: &Point3,
    dir: &arbor_kernel_math::Vec3,
    ctx: &NumericContext,
) -> Vec<(f64, f64)> {
    let dir = *dir;
    let mut ts: Vec<f64> = Vec::new();
    for region in [ra, rb] {
        // The line in this region's UV
        let o2 = region.plane.project(point);
        let d2 = Vec2::new(
            dir.dot(region.plane.x_dir.as_ref()),
            dir.dot(region.plane.y_dir.as_ref()),
        );
        if d2.norm() < 1e-12 {
            return Vec::new();
        }
        for (s0, s1) in boundary_segments(region) {
            if let Some(t) = line_segment_param(&o2, &d2, &s0, &s1, ctx.tol.length) {
                ts.push(t);
            } else {
                // Collinear boundary segment: both endpoints mark stops
                let seg = s1 - s0;
                let denom = d2.x * seg.y - d2.y * seg.x;
                if denom.abs() < 1e-12 * d2.norm() * seg.norm().max(1e-12) {
                    for p in [s0, s1] {
                        let rel = p - o2;
                        let off = (d2.x * rel.y - d2.y * rel.x).abs() / d2.norm();
                        if off < ctx.tol.length {
                            ts.push(rel.dot(&d2) / d2.norm_squared());
                        }
                    }
                }
            }
        }
    }
    if ts.len() < 2 {
        return Vec::new();
    }
    ts.sort_by(|x, y| x.partial_cmp(y).unwrap());
    ts.dedup_by(|x, y| (*x - *y).abs() < 1e-12);

    let mut intervals = Vec::new();
    for w in ts.windows(2) {
        let (t0, t1) = (w[0], w[1]);
        if t1 - t0 < ctx.tol.length {
            continue;
        }
        let mid3 = point + (t0 + t1) * 0.5 * dir;
        let in_a = ra.contains(&ra.plane.project(&mid3), ctx.tol.length);
        let in_b = rb.contains(&rb.plane.project(&mid3), ctx.tol.length);
        if in_a && in_b {
            intervals.push((t0, t1));
        }
    }
    intervals
}

/// Unbounded-line vs segment intersection in 2D.
///
/// Returns the line parameter `t` where `o + t·d` crosses the segment,
/// or `None` when parallel or missing the segment.
fn line_segment_param(o: &Point2, d: &Vec2, s0: &Point2, s1: &Point2, eps: f64) -> Option<f64> {
    let seg = s1 - s0;
    let denom = d.x * seg.y - d.y * seg.x;
    let seg_len = seg.norm();
    if seg_len < 1e-30 || denom.abs() < 1e-12 * d.norm() * seg_len {
        return None;
    }
    let rel = s0 - o;
    let t = (rel.x * seg.y - rel.y * seg.x) / denom;
    let u = (rel.x * d.y - rel.y * d.x) / -denom;
    let u_eps = eps / seg_len;
    if !(-u_eps..=1.0 + u_eps).contains(&u) {
        return None;
    }
    Some(t)
}

/// Cut a region into pieces along its imprints.
pub fn build_pieces(region: &FaceRegion, ctx: &NumericContext) -> Vec<FacePiece> {
    if region.imprints.is_empty() {
        return vec![FacePiece {
            source_face: region.face,
            source_body: region.body_tag,
            plane: region.plane.clone(),
            outer: region.outer.clone(),
            holes: region.holes.clone(),
        }];
    }

    let eps = (ctx.tol.length * 10.0).max(1e-9);
    let mut sub = Subdivision::new(eps);
    sub.add_ring(&region.outer);
    for hole in &region.holes {
        sub.add_ring(hole);
    }
    for (a, b) in &region.imprints {
        sub.add_segment(*a, *b);
    }

    let mut pieces = Vec::new();
    for sub_region in sub.build() {
        // Regions carved out of holes are not material
        let probe = interior_point(&sub_region.outer, &sub_region.holes);
        if !region.contains(&probe, 0.0) {
            continue;
        }
        pieces.push(FacePiece {
            source_face: region.face,
            source_body: region.body_tag,
            plane: region.plane.clone(),
            outer: sub_region.outer,
            holes: sub_region.holes,
        });
    }
    if pieces.is_empty() {
        // Imprints degenerate to nothing; keep the face whole
        pieces.push(FacePiece {
            source_face: region.face,
            source_body: region.body_tag,
            plane: region.plane.clone(),
            outer: region.outer.clone(),
            holes: region.holes.clone(),
        });
    }
    pieces
}

/// A point strictly inside the material of a polygon-with-holes.
///
/// Tries the outer centroid, then inward-shifted edge midpoints, then a
/// triangle-fan centroid, and falls back to the first vertex.
pub fn interior_point(outer: &[Point2], holes: &[Vec<Point2>]) -> Point2 {
    let centroid = {
        let n = outer.len().max(1) as f64;
        let sum = outer
            .iter()
            .fold(Vec2::zeros(), |acc, p| acc + p.coords);
        Point2::from(sum / n)
    };
    if point_in_region(&centroid, outer, holes, 0.0)
        && !on_any_boundary(&centroid, outer, holes, 1e-9)
    {
        return centroid;
    }

    // Inward-shifted edge midpoints
    let n = outer.len();
    for i in 0..n {
        let a = outer[i];
        let b = outer[(i + 1) % n];
        let edge = b - a;
        let len = edge.norm();
        if len < 1e-12 {
            continue;
        }
        // Left of the edge is inside for a CCW outer ring
        let inward = Vec2::new(-edge.y, edge.x) / len;
        for scale in [1e-3, 1e-2, 1e-1] {
            let probe = Point2::from((a.coords + b.coords) * 0.5 + inward * (len * scale));
            if point_in_region(&probe, outer, holes, 0.0)
                && !on_any_boundary(&probe, outer, holes, 1e-9)
            {
                return probe;
            }
        }
    }

    // Triangle-fan centroid of the first non-degenerate fan triangle
    for i in 1..outer.len().saturating_sub(1) {
        let tri = Point2::from((outer[0].coords + outer[i].coords + outer[i + 1].coords) / 3.0);
        if point_in_region(&tri, outer, holes, 0.0) {
            return tri;
        }
    }

    outer.first().copied().unwrap_or_else(Point2::origin)
}

fn on_any_boundary(p: &Point2, outer: &[Point2], holes: &[Vec<Point2>], eps: f64) -> bool {
    let on_ring = |ring: &[Point2]| -> bool {
        (0..ring.len()).any(|i| {
            arbor_kernel_math::dist_point_segment(p, &ring[i], &ring[(i + 1) % ring.len()]) <= eps
        })
    };
    on_ring(outer) || holes.iter().any(|h| on_ring(h))
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_kernel_math::Vec3;

    fn square_region(x0: f64, y0: f64, x1: f64, y1: f64, z: f64) -> FaceRegion {
        let plane = Plane::new(Point3::new(0.0, 0.0, z), Vec3::x(), Vec3::y());
        let outer = vec![
            Point2::new(x0, y0),
            Point2::new(x1, y0),
            Point2::new(x1, y1),
            Point2::new(x0, y1),
        ];
        let mut aabb = Aabb3::empty();
        for p in &outer {
            aabb.include_point(&plane.lift(p));
        }
        FaceRegion {
            face: FaceId::default(),
            body_tag: 0,
            plane,
            outer,
            holes: Vec::new(),
            aabb,
            imprints: Vec::new(),
        }
    }

    fn vertical_region(y: f64, x0: f64, x1: f64, z0: f64, z1: f64) -> FaceRegion {
        // Plane with normal +Y
        let plane = Plane::new(Point3::new(0.0, y, 0.0), Vec3::z(), Vec3::x());
        let outer = vec![
            Point2::new(z0, x0),
            Point2::new(z1, x0),
            Point2::new(z1, x1),
            Point2::new(z0, x1),
        ];
        let mut aabb = Aabb3::empty();
        for p in &outer {
            aabb.include_point(&plane.lift(p));
        }
        FaceRegion {
            face: FaceId::default(),
            body_tag: 1,
            plane,
            outer,
            holes: Vec::new(),
            aabb,
            imprints: Vec::new(),
        }
    }

    #[test]
    fn test_crossing_faces_imprint_both() {
        // Horizontal square z=0 crossed by vertical square at y=2
        let mut a = vec![square_region(0.0, 0.0, 10.0, 10.0, 0.0)];
        let mut b = vec![vertical_region(2.0, 3.0, 8.0, -5.0, 5.0)];
        imprint_pairs(&mut a, &mut b, &NumericContext::DEFAULT);
        assert_eq!(a[0].imprints.len(), 1, "one shared interval expected");
        assert_eq!(b[0].imprints.len(), 1);
        let (p0, p1) = a[0].imprints[0];
        // The shared interval spans x ∈ [3, 8] at y = 2
        assert!((p0.y - 2.0).abs() < 1e-9 && (p1.y - 2.0).abs() < 1e-9);
        let (lo, hi) = (p0.x.min(p1.x), p0.x.max(p1.x));
        assert!((lo - 3.0).abs() < 1e-9, "lo = {lo}");
        assert!((hi - 8.0).abs() < 1e-9, "hi = {hi}");
    }

    #[test]
    fn test_parallel_faces_no_imprint() {
        let mut a = vec![square_region(0.0, 0.0, 10.0, 10.0, 0.0)];
        let mut b = vec![square_region(0.0, 0.0, 10.0, 10.0, 5.0)];
        // AABBs don't overlap anyway, but force the pair through
        b[0].aabb = a[0].aabb;
        imprint_pairs(&mut a, &mut b, &NumericContext::DEFAULT);
        assert!(a[0].imprints.is_empty());
        assert!(b[0].imprints.is_empty());
    }

    #[test]
    fn test_pieces_from_full_crossing() {
        let mut a = vec![square_region(0.0, 0.0, 10.0, 10.0, 0.0)];
        let mut b = vec![vertical_region(2.0, -5.0, 15.0, -5.0, 5.0)];
        imprint_pairs(&mut a, &mut b, &NumericContext::DEFAULT);
        let pieces = build_pieces(&a[0], &NumericContext::DEFAULT);
        assert_eq!(pieces.len(), 2, "square split at y = 2");
        let mut areas: Vec<f64> = pieces.iter().map(|p| p.area()).collect();
        areas.sort_by(|x, y| x.partial_cmp(y).unwrap());
        assert!((areas[0] - 20.0).abs() < 1e-6);
        assert!((areas[1] - 80.0).abs() < 1e-6);
    }

    #[test]
    fn test_piece_without_imprint_is_whole_face() {
        let region = square_region(0.0, 0.0, 4.0, 4.0, 0.0);
        let pieces = build_pieces(&region, &NumericContext::DEFAULT);
        assert_eq!(pieces.len(), 1);
        assert!((pieces[0].area() - 16.0).abs() < 1e-9);
    }

    #[test]
    fn test_interior_point_simple() {
        let outer = vec![
            Point2::new(0.0, 0.0),
            Point2::new(4.0, 0.0),
            Point2::new(4.0, 4.0),
            Point2::new(0.0, 4.0),
        ];
        let p = interior_point(&outer, &[]);
        assert!(point_in_region(&p, &outer, &[], 0.0));
        assert!((p - Point2::new(2.0, 2.0)).norm() < 1e-9);
    }

    #[test]
    fn test_interior_point_avoids_hole() {
        let outer = vec![
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 0.0),
            Point2::new(10.0, 10.0),
            Point2::new(0.0, 10.0),
        ];
        // Centroid sits inside this hole
        let hole = vec![
            Point2::new(4.0, 4.0),
            Point2::new(4.0, 6.0),
            Point2::new(6.0, 6.0),
            Point2::new(6.0, 4.0),
        ];
        let holes = vec![hole];
        let p = interior_point(&outer, &holes);
        assert!(point_in_region(&p, &outer, &holes, 0.0));
    }
}
