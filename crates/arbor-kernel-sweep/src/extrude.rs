//! Extrude: sweep a profile along a direction into a closed body.

use std::collections::HashMap;

use arbor_kernel_geom::{Curve2, Curve3, GeometryPool, PCurve, Plane};
use arbor_kernel_math::{Point2, Point3, Vec3};
use arbor_kernel_sketch::{Profile, SketchEntityId};
use arbor_kernel_topo::{Direction, EdgeId, HalfEdgeId, TopologyModel, VertexId};

use crate::{reverse_ring, SweepError, SweepOutput, SweptFace, SweptFaceRole};

/// Parameters for an extrude sweep.
#[derive(Debug, Clone)]
pub struct ExtrudeParams {
    /// Sweep distance in mm (may be negative).
    pub distance: f64,
    /// Direction override; defaults to the profile plane normal.
    pub direction: Option<Vec3>,
    /// Sweep `±distance/2` about the profile plane instead of `0..distance`.
    pub symmetric: bool,
    /// Arc discretization density (segments per full turn).
    pub arc_segments: u32,
}

impl ExtrudeParams {
    /// Plain extrude by `distance` along the plane normal.
    pub fn new(distance: f64) -> Self {
        Self {
            distance,
            direction: None,
            symmetric: false,
            arc_segments: 32,
        }
    }
}

struct Ring {
    /// Original index into `profile.loops`.
    loop_index: usize,
    points: Vec<Point2>,
    sources: Vec<SketchEntityId>,
}

/// Extrude a profile into a closed B-rep body.
///
/// Every profile loop contributes bottom and top cap boundaries and one
/// side wall per polygonized segment. Bottom caps face against the sweep
/// direction, top caps along it, and side walls outward. The resulting
/// shell is closed and twin-linked.
///
/// # Errors
///
/// [`SweepError::ZeroExtrusion`] for zero distance or direction,
/// [`SweepError::DirectionInPlane`] when the direction lies in the
/// profile plane.
pub fn extrude(
    model: &mut TopologyModel,
    geom: &mut GeometryPool,
    profile: &Profile,
    params: &ExtrudeParams,
) -> Result<SweepOutput, SweepError> {
    let dir_vec = params
        .direction
        .unwrap_or_else(|| *profile.plane.normal.as_ref());
    let dir_len = dir_vec.norm();
    if dir_len < 1e-12 || params.distance.abs() < 1e-12 {
        return Err(SweepError::ZeroExtrusion);
    }
    let dir = dir_vec / dir_len;
    let normal = *profile.plane.normal.as_ref();
    if dir.dot(&normal).abs() < 1e-9 {
        return Err(SweepError::DirectionInPlane);
    }

    let total = params.distance * dir;
    let (t0, t1) = if params.symmetric {
        (-total * 0.5, total * 0.5)
    } else {
        (Vec3::zeros(), total)
    };
    let sweep_vec = t1 - t0;
    // True when the sweep advances along the plane normal; otherwise the
    // rings are reversed so the construction below sees a CCW outer loop
    // with respect to the sweep direction.
    let along_normal = sweep_vec.dot(&normal) > 0.0;

    let mut rings = Vec::with_capacity(profile.loops.len());
    let mut order: Vec<usize> = (0..profile.loops.len()).collect();
    // The outer loop's cap loop must be attached first
    order.sort_by_key(|&i| if profile.loops[i].is_outer { 0 } else { 1 });
    let outer_index = order[0];
    for &loop_index in &order {
        let (mut points, mut sources) = profile.loops[loop_index].polygonize(params.arc_segments);
        if points.len() < 3 {
            return Err(SweepError::DegenerateLoop(loop_index));
        }
        if !along_normal {
            reverse_ring(&mut points, &mut sources);
        }
        rings.push(Ring {
            loop_index,
            points,
            sources,
        });
    }

    let body = model.add_body();
    let shell = model.add_shell(true);
    model.add_shell_to_body(body, shell)?;

    let mut faces = Vec::new();
    let mut he_by_edge: HashMap<EdgeId, Vec<HalfEdgeId>> = HashMap::new();
    let record = |map: &mut HashMap<EdgeId, Vec<HalfEdgeId>>, edge: EdgeId, he: HalfEdgeId| {
        map.entry(edge).or_default().push(he);
    };

    // Per-ring topology, kept for the cap loops
    struct RingTopo {
        bottom_edges: Vec<EdgeId>,
        top_edges: Vec<EdgeId>,
        points: Vec<Point2>,
    }
    let mut ring_topos = Vec::with_capacity(rings.len());

    for ring in &rings {
        let k = ring.points.len();
        let bottom_pos: Vec<Point3> = ring
            .points
            .iter()
            .map(|p| profile.plane.to_3d(*p) + t0)
            .collect();
        let top_pos: Vec<Point3> = bottom_pos.iter().map(|p| p + sweep_vec).collect();

        let bottom_verts: Vec<VertexId> =
            bottom_pos.iter().map(|p| model.add_vertex(*p)).collect();
        let top_verts: Vec<VertexId> = top_pos.iter().map(|p| model.add_vertex(*p)).collect();

        let mut bottom_edges = Vec::with_capacity(k);
        let mut top_edges = Vec::with_capacity(k);
        let mut vertical_edges = Vec::with_capacity(k);
        for i in 0..k {
            let j = (i + 1) % k;
            let bc = geom.add_curve3(Curve3::Line {
                p0: bottom_pos[i],
                p1: bottom_pos[j],
            });
            bottom_edges.push(model.add_edge(bottom_verts[i], bottom_verts[j], Some(bc), 0.0, 1.0)?);
            let tc = geom.add_curve3(Curve3::Line {
                p0: top_pos[i],
                p1: top_pos[j],
            });
            top_edges.push(model.add_edge(top_verts[i], top_verts[j], Some(tc), 0.0, 1.0)?);
            let vc = geom.add_curve3(Curve3::Line {
                p0: bottom_pos[i],
                p1: top_pos[i],
            });
            vertical_edges.push(model.add_edge(bottom_verts[i], top_verts[i], Some(vc), 0.0, 1.0)?);
        }

        // Side walls: bottom edge forward, far vertical up, top edge
        // backward, near vertical down. Winding keeps the normal outward
        // for CCW outer rings and CW hole rings alike.
        for i in 0..k {
            let j = (i + 1) % k;
            let h0 = model.add_half_edge(bottom_edges[i], Direction::Forward)?;
            let h1 = model.add_half_edge(vertical_edges[j], Direction::Forward)?;
            let h2 = model.add_half_edge(top_edges[i], Direction::Reversed)?;
            let h3 = model.add_half_edge(vertical_edges[i], Direction::Reversed)?;
            record(&mut he_by_edge, bottom_edges[i], h0);
            record(&mut he_by_edge, vertical_edges[j], h1);
            record(&mut he_by_edge, top_edges[i], h2);
            record(&mut he_by_edge, vertical_edges[i], h3);
            let loop_id = model.add_loop(&[h0, h1, h2, h3])?;
            let surface = geom.add_surface(Box::new(Plane::new(
                bottom_pos[i],
                bottom_pos[j] - bottom_pos[i],
                sweep_vec,
            )));
            // Edge parameterizations in this wall's UV space
            let seg_len = (bottom_pos[j] - bottom_pos[i]).norm();
            let height = sweep_vec.norm();
            let uv_line = |geom: &mut GeometryPool, p0: Point2, p1: Point2| {
                let curve = geom.add_curve2(Curve2::Line { p0, p1 });
                geom.add_pcurve(PCurve { curve, surface })
            };
            model.half_edges[h0].pcurve = Some(uv_line(
                geom,
                Point2::new(0.0, 0.0),
                Point2::new(seg_len, 0.0),
            ));
            model.half_edges[h1].pcurve = Some(uv_line(
                geom,
                Point2::new(seg_len, 0.0),
                Point2::new(seg_len, height),
            ));
            model.half_edges[h2].pcurve = Some(uv_line(
                geom,
                Point2::new(0.0, height),
                Point2::new(seg_len, height),
            ));
            model.half_edges[h3].pcurve = Some(uv_line(
                geom,
                Point2::new(0.0, 0.0),
                Point2::new(0.0, height),
            ));
            let face = model.add_face(surface, false);
            model.add_loop_to_face(face, loop_id)?;
            model.add_face_to_shell(shell, face)?;
            faces.push(SweptFace {
                face,
                role: SweptFaceRole::Side {
                    loop_index: ring.loop_index,
                    entity: ring.sources[i],
                    segment: i,
                },
            });
        }

        ring_topos.push(RingTopo {
            bottom_edges,
            top_edges,
            points: ring.points.clone(),
        });
    }

    // Bottom cap: faces against the sweep; loops traverse each ring in
    // reverse so the outer boundary is CCW for the effective normal.
    let bottom_surface = geom.add_surface(Box::new(Plane::new(
        profile.plane.origin + t0,
        *profile.plane.x_dir.as_ref(),
        *profile.plane.y_dir.as_ref(),
    )));
    let bottom_face = model.add_face(bottom_surface, along_normal);
    for topo in &ring_topos {
        let k = topo.bottom_edges.len();
        let mut hes = Vec::with_capacity(k);
        for i in (0..k).rev() {
            let he = model.add_half_edge(topo.bottom_edges[i], Direction::Reversed)?;
            let curve = geom.add_curve2(Curve2::Line {
                p0: topo.points[i],
                p1: topo.points[(i + 1) % k],
            });
            model.half_edges[he].pcurve = Some(geom.add_pcurve(PCurve {
                curve,
                surface: bottom_surface,
            }));
            record(&mut he_by_edge, topo.bottom_edges[i], he);
            hes.push(he);
        }
        let loop_id = model.add_loop(&hes)?;
        model.add_loop_to_face(bottom_face, loop_id)?;
    }
    model.add_face_to_shell(shell, bottom_face)?;
    faces.push(SweptFace {
        face: bottom_face,
        role: SweptFaceRole::BottomCap {
            loop_index: outer_index,
        },
    });

    // Top cap: faces along the sweep; forward traversal.
    let top_surface = geom.add_surface(Box::new(Plane::new(
        profile.plane.origin + t1,
        *profile.plane.x_dir.as_ref(),
        *profile.plane.y_dir.as_ref(),
    )));
    let top_face = model.add_face(top_surface, !along_normal);
    for topo in &ring_topos {
        let k = topo.top_edges.len();
        let mut hes = Vec::with_capacity(k);
        for (i, &edge) in topo.top_edges.iter().enumerate() {
            let he = model.add_half_edge(edge, Direction::Forward)?;
            let curve = geom.add_curve2(Curve2::Line {
                p0: topo.points[i],
                p1: topo.points[(i + 1) % k],
            });
            model.half_edges[he].pcurve = Some(geom.add_pcurve(PCurve {
                curve,
                surface: top_surface,
            }));
            record(&mut he_by_edge, edge, he);
            hes.push(he);
        }
        let loop_id = model.add_loop(&hes)?;
        model.add_loop_to_face(top_face, loop_id)?;
    }
    model.add_face_to_shell(shell, top_face)?;
    faces.push(SweptFace {
        face: top_face,
        role: SweptFaceRole::TopCap {
            loop_index: outer_index,
        },
    });

    // Twin pass: every edge carries exactly two half-edges by construction.
    for (_, hes) in he_by_edge {
        if hes.len() == 2 {
            model.set_twin(hes[0], hes[1])?;
        }
    }

    let loop_entities = profile
        .loops
        .iter()
        .map(|l| l.entity_ids.clone())
        .collect();

    Ok(SweepOutput {
        body,
        shell,
        faces,
        loop_entities,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_kernel_sketch::{profile_from_sketch, Sketch, SketchPlane};

    fn rect_profile(w: f64, h: f64) -> Profile {
        let mut sketch = Sketch::new(SketchPlane::xy());
        sketch.add_rectangle(0.0, 0.0, w, h);
        profile_from_sketch(&sketch, None).unwrap()
    }

    #[test]
    fn test_extrude_box_counts() {
        let mut model = TopologyModel::new();
        let mut geom = GeometryPool::new();
        let profile = rect_profile(10.0, 10.0);
        let out = extrude(&mut model, &mut geom, &profile, &ExtrudeParams::new(10.0)).unwrap();

        let (v, e, _, _, f, _, _) = model.live_counts();
        assert_eq!(f, 6, "n+2 faces for a 4-gon");
        assert_eq!(e, 12, "3n edges");
        assert_eq!(v, 8, "2n vertices");
        assert_eq!(out.faces.len(), 6);
        // Every half-edge is parameterized on its face
        for (_, he) in &model.half_edges {
            assert!(he.pcurve.is_some());
        }
    }

    #[test]
    fn test_extrude_every_edge_twinned() {
        let mut model = TopologyModel::new();
        let mut geom = GeometryPool::new();
        let profile = rect_profile(10.0, 5.0);
        extrude(&mut model, &mut geom, &profile, &ExtrudeParams::new(7.0)).unwrap();

        for (_, he) in &model.half_edges {
            assert!(he.twin.is_some(), "closed shell requires twin pairing");
        }
        // Both half-edges of an edge have opposite directions
        for (id, he) in &model.half_edges {
            let twin = he.twin.unwrap();
            assert_eq!(model.half_edges[twin].edge, he.edge);
            assert_ne!(model.half_edges[twin].direction, he.direction);
            assert_eq!(model.half_edges[twin].twin, Some(id));
        }
    }

    #[test]
    fn test_extrude_loop_closure() {
        let mut model = TopologyModel::new();
        let mut geom = GeometryPool::new();
        let profile = rect_profile(4.0, 4.0);
        extrude(&mut model, &mut geom, &profile, &ExtrudeParams::new(4.0)).unwrap();

        for (loop_id, l) in &model.loops {
            let hes: Vec<_> = model.loop_half_edges(loop_id).collect();
            assert_eq!(hes.len(), l.half_edge_count);
            let last = *hes.last().unwrap();
            assert_eq!(model.half_edges[last].next, Some(hes[0]));
        }
    }

    #[test]
    fn test_extrude_positive_volume() {
        let mut model = TopologyModel::new();
        let mut geom = GeometryPool::new();
        let profile = rect_profile(10.0, 5.0);
        let out = extrude(&mut model, &mut geom, &profile, &ExtrudeParams::new(20.0)).unwrap();
        let volume = model.shell_signed_volume(out.shell);
        assert!(
            (volume - 1000.0).abs() < 1e-6,
            "expected 10*5*20 volume, got {volume}"
        );
    }

    #[test]
    fn test_extrude_negative_distance_flips() {
        let mut model = TopologyModel::new();
        let mut geom = GeometryPool::new();
        let profile = rect_profile(4.0, 4.0);
        let out = extrude(&mut model, &mut geom, &profile, &ExtrudeParams::new(-3.0)).unwrap();
        // Shell still oriented outward: positive volume
        let volume = model.shell_signed_volume(out.shell);
        assert!(volume > 0.0, "volume {volume}");
        assert!((volume - 48.0).abs() < 1e-6);
        // Every vertex at z in [-3, 0]
        for (_, v) in &model.vertices {
            assert!(v.position.z <= 1e-9 && v.position.z >= -3.0 - 1e-9);
        }
    }

    #[test]
    fn test_extrude_symmetric() {
        let mut model = TopologyModel::new();
        let mut geom = GeometryPool::new();
        let profile = rect_profile(4.0, 4.0);
        let params = ExtrudeParams {
            symmetric: true,
            ..ExtrudeParams::new(6.0)
        };
        extrude(&mut model, &mut geom, &profile, &params).unwrap();
        let mut z_min = f64::INFINITY;
        let mut z_max = f64::NEG_INFINITY;
        for (_, v) in &model.vertices {
            z_min = z_min.min(v.position.z);
            z_max = z_max.max(v.position.z);
        }
        assert!((z_min + 3.0).abs() < 1e-9);
        assert!((z_max - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_extrude_with_hole() {
        let mut sketch = Sketch::new(SketchPlane::xy());
        sketch.add_rectangle(0.0, 0.0, 10.0, 10.0);
        let c = sketch.add_point(5.0, 5.0);
        sketch.add_circle(c, 2.0).unwrap();
        let profile = profile_from_sketch(&sketch, None).unwrap();

        let mut model = TopologyModel::new();
        let mut geom = GeometryPool::new();
        let params = ExtrudeParams {
            arc_segments: 16,
            ..ExtrudeParams::new(5.0)
        };
        let out = extrude(&mut model, &mut geom, &profile, &params).unwrap();

        // 4 outer walls + 16 hole walls + 2 caps
        assert_eq!(out.faces.len(), 4 + 16 + 2);
        // Caps carry two loops each (outer + hole)
        let caps: Vec<_> = out
            .faces
            .iter()
            .filter(|f| {
                matches!(
                    f.role,
                    SweptFaceRole::BottomCap { .. } | SweptFaceRole::TopCap { .. }
                )
            })
            .collect();
        assert_eq!(caps.len(), 2);
        for cap in caps {
            assert_eq!(model.face_loops(cap.face).len(), 2);
        }
        // Volume ≈ 10·10·5 − π·4·5
        let volume = model.shell_signed_volume(out.shell);
        let expected = 500.0 - std::f64::consts::PI * 4.0 * 5.0;
        assert!(
            (volume - expected).abs() < expected * 0.02,
            "volume {volume}, expected ≈ {expected}"
        );
        // Everything twinned
        for (_, he) in &model.half_edges {
            assert!(he.twin.is_some());
        }
    }

    #[test]
    fn test_extrude_zero_distance_fails() {
        let mut model = TopologyModel::new();
        let mut geom = GeometryPool::new();
        let profile = rect_profile(1.0, 1.0);
        let result = extrude(&mut model, &mut geom, &profile, &ExtrudeParams::new(0.0));
        assert!(matches!(result, Err(SweepError::ZeroExtrusion)));
    }

    #[test]
    fn test_extrude_in_plane_direction_fails() {
        let mut model = TopologyModel::new();
        let mut geom = GeometryPool::new();
        let profile = rect_profile(1.0, 1.0);
        let params = ExtrudeParams {
            direction: Some(Vec3::x()),
            ..ExtrudeParams::new(5.0)
        };
        let result = extrude(&mut model, &mut geom, &profile, &params);
        assert!(matches!(result, Err(SweepError::DirectionInPlane)));
    }

    #[test]
    fn test_extrude_cap_orientation() {
        let mut model = TopologyModel::new();
        let mut geom = GeometryPool::new();
        let profile = rect_profile(2.0, 2.0);
        let out = extrude(&mut model, &mut geom, &profile, &ExtrudeParams::new(2.0)).unwrap();

        for swept in &out.faces {
            // Winding (Newell) normal and flag-derived normal must agree
            let n = model.face_newell_normal(swept.face);
            match swept.role {
                SweptFaceRole::BottomCap { .. } => {
                    assert!(n.z < 0.0, "bottom cap faces downward, got {n:?}");
                    assert!(model.faces[swept.face].reversed);
                }
                SweptFaceRole::TopCap { .. } => {
                    assert!(n.z > 0.0, "top cap faces upward, got {n:?}");
                    assert!(!model.faces[swept.face].reversed);
                }
                SweptFaceRole::Side { .. } => {
                    assert!(n.z.abs() < 1e-9, "side walls are vertical");
                }
                _ => unreachable!("extrude emits caps and sides only"),
            }
        }
    }
}
