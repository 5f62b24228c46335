//! Face-piece classification.
//!
//! Each piece is labeled inside/outside/on-same/on-opposite relative to
//! the other body by ray casting from probe points offset to either side
//! of the piece's plane, with a coplanar-face search deciding the on-*
//! labels. Pieces are independent, so the whole pass runs in parallel
//! and joins before returning.

use arbor_kernel_math::{NumericContext, Point2, Point3, Vec3};
use rayon::prelude::*;

use crate::bbox::Aabb3;
use crate::imprint::{interior_point, FacePiece, FaceRegion};

/// Classification of a piece relative to the other body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PieceLabel {
    /// Strictly inside the other body.
    Inside,
    /// Strictly outside the other body.
    Outside,
    /// On the other body's boundary, normals agree.
    OnSame,
    /// On the other body's boundary, normals oppose.
    OnOpposite,
}

/// Dot-product cutoff for the same-vs-opposite decision.
const COPLANAR_NORMAL_CUTOFF: f64 = 0.9;

/// Ray direction for point-in-body parity tests: slightly off-axis so
/// axis-aligned faces are not hit edge-on.
fn ray_direction() -> Vec3 {
    Vec3::new(1.0, 1.7e-4, 1.3e-4).normalize()
}

/// Parity test: is `p` inside the body described by `regions`?
pub fn point_in_body(p: &Point3, regions: &[FaceRegion], ctx: &NumericContext) -> bool {
    let dir = ray_direction();
    let eps = ctx.tol.length.max(1e-12);
    let mut crossings = 0usize;
    for region in regions {
        let normal = region.plane.normal_dir.as_ref();
        let denom = normal.dot(&dir);
        if denom.abs() < 1e-12 {
            continue;
        }
        let t = -region.plane.signed_distance(p) / denom;
        if t <= eps {
            continue;
        }
        let hit = p + t * dir;
        let mut bb = region.aabb;
        bb.expand(eps * 10.0 + 1e-9);
        if !bb.contains_point(&hit) {
            continue;
        }
        let uv = region.plane.project(&hit);
        if region.contains(&uv, eps) {
            crossings += 1;
        }
    }
    crossings % 2 == 1
}

/// Classify every piece against the other body's regions.
///
/// `other_overlaps` is the AABB-overlap flag between the two bodies,
/// used by the outside→on_same promotion safety net.
pub fn classify_pieces(
    pieces: &[FacePiece],
    other_regions: &[FaceRegion],
    other_aabb: &Aabb3,
    other_overlaps: bool,
    ctx: &NumericContext,
) -> Vec<PieceLabel> {
    pieces
        .par_iter()
        .map(|piece| classify_piece(piece, other_regions, other_aabb, other_overlaps, ctx))
        .collect()
}

fn classify_piece(
    piece: &FacePiece,
    other_regions: &[FaceRegion],
    other_aabb: &Aabb3,
    other_overlaps: bool,
    ctx: &NumericContext,
) -> PieceLabel {
    let samples = sample_points(piece);
    let normal = *piece.plane.normal_dir.as_ref();
    let offset = (piece.aabb().diagonal() * 1e-4).max(ctx.tol.length * 100.0);

    let mut pos_votes = 0usize;
    let mut neg_votes = 0usize;
    for s in &samples {
        let p3 = piece.lift(s);
        if point_in_body(&(p3 + offset * normal), other_regions, ctx) {
            pos_votes += 1;
        }
        if point_in_body(&(p3 - offset * normal), other_regions, ctx) {
            neg_votes += 1;
        }
    }
    let half = samples.len();
    let inside_pos = pos_votes * 2 > half;
    let inside_neg = neg_votes * 2 > half;

    match (inside_pos, inside_neg) {
        (true, true) => PieceLabel::Inside,
        (false, false) => {
            // Safety net: a piece whose plane actually slices the other
            // body's bounds, with a coplanar partner face, is boundary
            // rather than outside.
            if other_overlaps && plane_cuts_aabb(piece, other_aabb, ctx) {
                if let Some(dot) = coplanar_match(piece, &samples[0], other_regions, ctx) {
                    return on_label(dot);
                }
            }
            PieceLabel::Outside
        }
        _ => {
            if let Some(dot) = coplanar_match(piece, &samples[0], other_regions, ctx) {
                return on_label(dot);
            }
            // Boundary without a coplanar partner: break the tie by the
            // total of all samples on both sides
            if pos_votes + neg_votes > half {
                PieceLabel::Inside
            } else {
                PieceLabel::Outside
            }
        }
    }
}

fn on_label(dot: f64) -> PieceLabel {
    if dot >= COPLANAR_NORMAL_CUTOFF {
        PieceLabel::OnSame
    } else if dot <= -COPLANAR_NORMAL_CUTOFF {
        PieceLabel::OnOpposite
    } else if dot >= 0.0 {
        PieceLabel::OnSame
    } else {
        PieceLabel::OnOpposite
    }
}

/// Probe sample set: the interior point plus a few vertices nudged
/// toward it.
fn sample_points(piece: &FacePiece) -> Vec<Point2> {
    let primary = interior_point(&piece.outer, &piece.holes);
    let mut samples = vec![primary];
    let n = piece.outer.len();
    if n >= 3 {
        for k in 0..4usize.min(n) {
            let v = piece.outer[k * n / 4.min(n)];
            let nudged = Point2::from(v.coords + 0.05 * (primary - v));
            samples.push(nudged);
        }
    }
    samples
}

/// Does the piece's supporting plane pass through the other body's AABB?
fn plane_cuts_aabb(piece: &FacePiece, aabb: &Aabb3, ctx: &NumericContext) -> bool {
    if aabb.diagonal() == 0.0 {
        return false;
    }
    let mut min_d = f64::INFINITY;
    let mut max_d = f64::NEG_INFINITY;
    for &x in &[aabb.min.x, aabb.max.x] {
        for &y in &[aabb.min.y, aabb.max.y] {
            for &z in &[aabb.min.z, aabb.max.z] {
                let d = piece.plane.signed_distance(&Point3::new(x, y, z));
                min_d = min_d.min(d);
                max_d = max_d.max(d);
            }
        }
    }
    min_d < -ctx.tol.length && max_d > ctx.tol.length
}

/// Find a face of the other body coplanar with the piece at `sample`,
/// returning the normal dot product.
fn coplanar_match(
    piece: &FacePiece,
    sample: &Point2,
    other_regions: &[FaceRegion],
    ctx: &NumericContext,
) -> Option<f64> {
    let p3 = piece.lift(sample);
    let n = piece.plane.normal_dir.as_ref();
    let eps = ctx.tol.length * 10.0;
    for region in other_regions {
        let dot = n.dot(region.plane.normal_dir.as_ref());
        if dot.abs() < COPLANAR_NORMAL_CUTOFF {
            continue;
        }
        if region.plane.signed_distance(&p3).abs() > eps {
            continue;
        }
        if region.contains(&region.plane.project(&p3), eps) {
            return Some(dot);
        }
    }
    None
}
