//! Profile extraction: walk sketch entities into closed loops.
//!
//! A profile is a set of closed loops on the sketch plane. The walk is a
//! greedy chain: start at any unused curve, extend by endpoint matching
//! (flipping curves when needed), close when the walk returns to its
//! start. Non-closed walks are discarded. The largest loop by positive
//! signed area becomes the outer boundary (CCW); the rest become holes
//! (CW).

use std::f64::consts::PI;

use arbor_kernel_geom::Curve2;
use arbor_kernel_math::{signed_area, Point2};

use crate::{Sketch, SketchEntityId, SketchEntityKind, SketchError, SketchPlane};

/// Endpoint matching tolerance for the chaining walk.
const CHAIN_TOL: f64 = 1e-8;

/// One closed loop of a profile.
#[derive(Debug, Clone)]
pub struct ProfileLoop {
    /// The loop's curves, chained end to start.
    pub curves: Vec<Curve2>,
    /// Source entity id per curve (parallel to `curves`).
    pub entity_ids: Vec<SketchEntityId>,
    /// True for the outer boundary (CCW); holes are CW.
    pub is_outer: bool,
}

impl ProfileLoop {
    /// Discretize into a closed polygon.
    ///
    /// Lines contribute one segment; arcs are split at roughly
    /// `2π / arc_segments` per step. Returns the polygon points (last
    /// point omitted, it equals the first) and the source entity id per
    /// segment.
    pub fn polygonize(&self, arc_segments: u32) -> (Vec<Point2>, Vec<SketchEntityId>) {
        let mut points = Vec::new();
        let mut sources = Vec::new();
        for (curve, &entity) in self.curves.iter().zip(&self.entity_ids) {
            match curve {
                Curve2::Line { p0, .. } => {
                    points.push(*p0);
                    sources.push(entity);
                }
                Curve2::Arc { .. } => {
                    let sweep = curve.sweep_angle().abs();
                    let step = 2.0 * PI / arc_segments.max(4) as f64;
                    let n = ((sweep / step).ceil() as usize).max(2);
                    let pts = curve.polygonize(n as u32);
                    // Skip the final point; the next curve supplies it
                    for p in &pts[..pts.len() - 1] {
                        points.push(*p);
                        sources.push(entity);
                    }
                }
            }
        }
        (points, sources)
    }

    /// Signed area of the polygonized loop.
    pub fn area(&self, arc_segments: u32) -> f64 {
        let (points, _) = self.polygonize(arc_segments);
        signed_area(&points)
    }

    /// Reverse the loop's direction in place.
    pub fn reverse(&mut self) {
        self.curves.reverse();
        self.entity_ids.reverse();
        for c in &mut self.curves {
            c.reverse();
        }
    }
}

/// A set of closed loops on a sketch plane, ready for sweeping.
#[derive(Debug, Clone)]
pub struct Profile {
    /// The plane the loops live on.
    pub plane: SketchPlane,
    /// Loops: exactly one outer, the rest holes.
    pub loops: Vec<ProfileLoop>,
}

impl Profile {
    /// The outer loop.
    pub fn outer(&self) -> &ProfileLoop {
        self.loops
            .iter()
            .find(|l| l.is_outer)
            .expect("profile always has an outer loop")
    }

    /// The hole loops.
    pub fn holes(&self) -> impl Iterator<Item = &ProfileLoop> {
        self.loops.iter().filter(|l| !l.is_outer)
    }
}

/// Extract a profile from a sketch.
///
/// `selection` restricts the entities considered; `None` takes every
/// non-construction entity. Fails when nothing closes into a loop.
pub fn profile_from_sketch(
    sketch: &Sketch,
    selection: Option<&[SketchEntityId]>,
) -> Result<Profile, SketchError> {
    let ids: Vec<SketchEntityId> = match selection {
        Some(sel) => sel.to_vec(),
        None => sketch
            .entities
            .iter()
            .filter(|(_, e)| !e.construction)
            .map(|(&id, _)| id)
            .collect(),
    };
    if ids.is_empty() {
        return Err(SketchError::EmptyProfile);
    }

    // Convert entities to curves; closed curves become loops immediately.
    let mut open: Vec<(SketchEntityId, Curve2)> = Vec::new();
    let mut loops: Vec<ProfileLoop> = Vec::new();
    for id in ids {
        let entity = sketch.entity(id)?;
        match entity.kind {
            SketchEntityKind::Line { start, end } => {
                let p0 = sketch.point_position(start)?;
                let p1 = sketch.point_position(end)?;
                if (p1 - p0).norm() < CHAIN_TOL {
                    return Err(SketchError::DegenerateEntity(id));
                }
                open.push((id, Curve2::Line { p0, p1 }));
            }
            SketchEntityKind::Arc {
                start,
                end,
                center,
                ccw,
            } => {
                let ps = sketch.point_position(start)?;
                let pc = sketch.point_position(center)?;
                if (ps - pc).norm() < CHAIN_TOL {
                    return Err(SketchError::DegenerateEntity(id));
                }
                if start == end {
                    // Full circle: a closed single-curve loop
                    let curve = Curve2::arc_from_points(ps, ps, pc, ccw, CHAIN_TOL);
                    loops.push(ProfileLoop {
                        curves: vec![curve],
                        entity_ids: vec![id],
                        is_outer: false,
                    });
                } else {
                    let pe = sketch.point_position(end)?;
                    open.push((id, Curve2::arc_from_points(ps, pe, pc, ccw, CHAIN_TOL)));
                }
            }
        }
    }

    // Greedy chaining over the open curves.
    let mut used = vec![false; open.len()];
    let mut unclosed: Vec<SketchEntityId> = Vec::new();
    for seed in 0..open.len() {
        if used[seed] {
            continue;
        }
        used[seed] = true;
        let mut walk_curves = vec![open[seed].1.clone()];
        let mut walk_ids = vec![open[seed].0];
        let walk_start = open[seed].1.start();
        let mut walk_end = open[seed].1.end();
        let mut closed = (walk_end - walk_start).norm() < CHAIN_TOL;

        while !closed {
            let mut extended = false;
            for (i, (id, curve)) in open.iter().enumerate() {
                if used[i] {
                    continue;
                }
                let (matches, flip) = if (curve.start() - walk_end).norm() < CHAIN_TOL {
                    (true, false)
                } else if (curve.end() - walk_end).norm() < CHAIN_TOL {
                    (true, true)
                } else {
                    (false, false)
                };
                if matches {
                    used[i] = true;
                    let mut c = curve.clone();
                    if flip {
                        c.reverse();
                    }
                    walk_end = c.end();
                    walk_curves.push(c);
                    walk_ids.push(*id);
                    extended = true;
                    break;
                }
            }
            if (walk_end - walk_start).norm() < CHAIN_TOL {
                closed = true;
            } else if !extended {
                break;
            }
        }

        if closed {
            loops.push(ProfileLoop {
                curves: walk_curves,
                entity_ids: walk_ids,
                is_outer: false,
            });
        } else {
            unclosed.extend(walk_ids);
        }
    }

    if loops.is_empty() {
        return Err(SketchError::NotClosed(unclosed));
    }

    // Orient every loop CCW, find the largest as the outer boundary, then
    // flip the rest into CW holes.
    for l in &mut loops {
        if l.area(32) < 0.0 {
            l.reverse();
        }
    }
    let outer_idx = loops
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| {
            a.area(32)
                .partial_cmp(&b.area(32))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|(i, _)| i)
        .unwrap();
    for (i, l) in loops.iter_mut().enumerate() {
        if i == outer_idx {
            l.is_outer = true;
        } else {
            l.reverse();
        }
    }

    Ok(Profile {
        plane: sketch.plane.clone(),
        loops,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SketchPlane;

    #[test]
    fn test_rectangle_profile() {
        let mut sketch = Sketch::new(SketchPlane::xy());
        sketch.add_rectangle(0.0, 0.0, 10.0, 5.0);
        let profile = profile_from_sketch(&sketch, None).unwrap();
        assert_eq!(profile.loops.len(), 1);
        let outer = profile.outer();
        assert_eq!(outer.curves.len(), 4);
        assert!((outer.area(32) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_rectangle_with_hole() {
        let mut sketch = Sketch::new(SketchPlane::xy());
        sketch.add_rectangle(0.0, 0.0, 10.0, 10.0);
        let c = sketch.add_point(5.0, 5.0);
        sketch.add_circle(c, 2.0).unwrap();

        let profile = profile_from_sketch(&sketch, None).unwrap();
        assert_eq!(profile.loops.len(), 2);
        let outer = profile.outer();
        assert!((outer.area(32) - 100.0).abs() < 1e-9);
        let hole = profile.holes().next().unwrap();
        // Holes wind CW: negative area close to −πr²
        let hole_area = hole.area(64);
        assert!(hole_area < 0.0);
        assert!((hole_area + PI * 4.0).abs() < 0.1);
    }

    #[test]
    fn test_construction_excluded() {
        let mut sketch = Sketch::new(SketchPlane::xy());
        sketch.add_rectangle(0.0, 0.0, 4.0, 4.0);
        let a = sketch.add_point(0.0, 0.0);
        let b = sketch.add_point(4.0, 4.0);
        let diag = sketch.add_line(a, b).unwrap();
        sketch.set_construction(diag, true).unwrap();

        let profile = profile_from_sketch(&sketch, None).unwrap();
        assert_eq!(profile.loops.len(), 1);
        assert_eq!(profile.outer().curves.len(), 4);
    }

    #[test]
    fn test_unclosed_discarded() {
        let mut sketch = Sketch::new(SketchPlane::xy());
        sketch.add_rectangle(0.0, 0.0, 4.0, 4.0);
        // A dangling segment nowhere near closing
        let a = sketch.add_point(20.0, 20.0);
        let b = sketch.add_point(25.0, 20.0);
        sketch.add_line(a, b).unwrap();

        let profile = profile_from_sketch(&sketch, None).unwrap();
        assert_eq!(profile.loops.len(), 1);
    }

    #[test]
    fn test_no_closed_loop_error() {
        let mut sketch = Sketch::new(SketchPlane::xy());
        let a = sketch.add_point(0.0, 0.0);
        let b = sketch.add_point(5.0, 0.0);
        let c = sketch.add_point(5.0, 5.0);
        sketch.add_line(a, b).unwrap();
        sketch.add_line(b, c).unwrap();

        let result = profile_from_sketch(&sketch, None);
        assert!(matches!(result, Err(SketchError::NotClosed(ids)) if ids.len() == 2));
    }

    #[test]
    fn test_chaining_flips_reversed_segments() {
        // Triangle with the second segment drawn backwards
        let mut sketch = Sketch::new(SketchPlane::xy());
        let p0 = sketch.add_point(0.0, 0.0);
        let p1 = sketch.add_point(10.0, 0.0);
        let p2 = sketch.add_point(0.0, 10.0);
        sketch.add_line(p0, p1).unwrap();
        sketch.add_line(p2, p1).unwrap(); // reversed
        sketch.add_line(p2, p0).unwrap();

        let profile = profile_from_sketch(&sketch, None).unwrap();
        assert_eq!(profile.loops.len(), 1);
        assert!((profile.outer().area(32) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_circle_only_profile() {
        let mut sketch = Sketch::new(SketchPlane::xy());
        let c = sketch.add_point(0.0, 0.0);
        sketch.add_circle(c, 5.0).unwrap();
        let profile = profile_from_sketch(&sketch, None).unwrap();
        assert_eq!(profile.loops.len(), 1);
        let area = profile.outer().area(64);
        assert!((area - PI * 25.0).abs() < 0.2);
    }

    #[test]
    fn test_polygonize_sources() {
        let mut sketch = Sketch::new(SketchPlane::xy());
        let (_, lines) = sketch.add_rectangle(0.0, 0.0, 2.0, 2.0);
        let profile = profile_from_sketch(&sketch, None).unwrap();
        let (points, sources) = profile.outer().polygonize(32);
        assert_eq!(points.len(), 4);
        assert_eq!(sources.len(), 4);
        for id in &sources {
            assert!(lines.contains(id));
        }
    }
}
