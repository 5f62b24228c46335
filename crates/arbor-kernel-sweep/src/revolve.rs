//! Revolve: rotate a profile about an axis into a closed body.

use std::collections::HashMap;
use std::f64::consts::PI;

use arbor_kernel_geom::{GeometryPool, Plane};
use arbor_kernel_math::{Dir3, Point3, Transform, Vec3};
use arbor_kernel_sketch::{Profile, SketchEntityId};
use arbor_kernel_topo::{Direction, EdgeId, HalfEdgeId, TopologyModel, VertexId};

use crate::{SweepError, SweepOutput, SweptFace, SweptFaceRole};

/// Parameters for a revolve sweep.
#[derive(Debug, Clone)]
pub struct RevolveParams {
    /// A point on the revolution axis.
    pub axis_origin: Point3,
    /// Axis direction (normalized internally).
    pub axis_dir: Vec3,
    /// Sweep angle in radians, in `(0, 2π]`.
    pub angle: f64,
    /// Angular density: segments per full turn.
    pub arc_segments: u32,
}

impl RevolveParams {
    /// Full revolution about the given axis.
    pub fn full(axis_origin: Point3, axis_dir: Vec3) -> Self {
        Self {
            axis_origin,
            axis_dir,
            angle: 2.0 * PI,
            arc_segments: 32,
        }
    }

    /// Partial revolution by `angle` radians.
    pub fn partial(axis_origin: Point3, axis_dir: Vec3, angle: f64) -> Self {
        Self {
            axis_origin,
            axis_dir,
            angle,
            arc_segments: 32,
        }
    }
}

/// Boundary data one profile loop contributes to the end caps.
struct CapRing {
    start_edges: Vec<EdgeId>,
    end_edges: Vec<EdgeId>,
}

/// Revolve a profile about an axis into a B-rep body.
///
/// The profile is copied at `N + 1` angular steps (N proportional to the
/// angle) and consecutive copies are joined with planar side quads. A
/// full 360° revolve is watertight with the last ring aliased onto the
/// first; a partial revolve gets planar caps at angle 0 and at the sweep
/// angle.
///
/// # Errors
///
/// [`SweepError::ZeroAxis`], [`SweepError::InvalidAngle`], and
/// [`SweepError::AxisIntersection`] when the profile touches or crosses
/// the axis.
pub fn revolve(
    model: &mut TopologyModel,
    geom: &mut GeometryPool,
    profile: &Profile,
    params: &RevolveParams,
) -> Result<SweepOutput, SweepError> {
    if params.axis_dir.norm() < 1e-12 {
        return Err(SweepError::ZeroAxis);
    }
    let axis = Dir3::new_normalize(params.axis_dir);
    if !(params.angle > 1e-9 && params.angle <= 2.0 * PI + 1e-9) {
        return Err(SweepError::InvalidAngle(params.angle));
    }
    let full = params.angle >= 2.0 * PI - 1e-9;
    let angle = params.angle.min(2.0 * PI);
    let steps = (((params.arc_segments.max(4) as f64) * angle / (2.0 * PI)).ceil() as usize).max(2);

    let normal = *profile.plane.normal.as_ref();

    // Polygonize with the outer loop first. Every point must be strictly
    // off-axis and the whole profile on one side of the axis.
    let mut order: Vec<usize> = (0..profile.loops.len()).collect();
    order.sort_by_key(|&i| if profile.loops[i].is_outer { 0 } else { 1 });
    let outer_index = order[0];
    struct Ring {
        loop_index: usize,
        points: Vec<Point3>,
        sources: Vec<SketchEntityId>,
    }
    let mut rings = Vec::with_capacity(order.len());
    let mut side = 0.0f64;
    for &loop_index in &order {
        let (points2, sources) = profile.loops[loop_index].polygonize(params.arc_segments);
        if points2.len() < 3 {
            return Err(SweepError::DegenerateLoop(loop_index));
        }
        let points: Vec<Point3> = points2.iter().map(|p| profile.plane.to_3d(*p)).collect();
        for p3 in &points {
            let rel = p3 - params.axis_origin;
            let radial = rel - rel.dot(axis.as_ref()) * axis.as_ref();
            if radial.norm() < 1e-9 {
                return Err(SweepError::AxisIntersection);
            }
            let s = axis.as_ref().cross(&rel).dot(&normal);
            if s.abs() > 1e-9 {
                if side == 0.0 {
                    side = s.signum();
                } else if side != s.signum() {
                    return Err(SweepError::AxisIntersection);
                }
            }
        }
        rings.push(Ring {
            loop_index,
            points,
            sources,
        });
    }
    if side == 0.0 {
        return Err(SweepError::AxisIntersection);
    }
    // Rotation moves profile points along `side * normal` at angle zero.
    let positive_side = side > 0.0;

    let body = model.add_body();
    let shell = model.add_shell(true);
    model.add_shell_to_body(body, shell)?;

    let ring_count = if full { steps } else { steps + 1 };
    let rotations: Vec<Transform> = (0..ring_count)
        .map(|r| {
            Transform::rotation_about_axis(
                &params.axis_origin,
                &axis,
                angle * r as f64 / steps as f64,
            )
        })
        .collect();
    let end_rotation =
        Transform::rotation_about_axis(&params.axis_origin, &axis, angle);

    let mut faces = Vec::new();
    let mut he_by_edge: HashMap<EdgeId, Vec<HalfEdgeId>> = HashMap::new();
    let mut cap_rings: Vec<CapRing> = Vec::new();

    for ring in &rings {
        let k = ring.points.len();

        let positions: Vec<Vec<Point3>> = rotations
            .iter()
            .map(|t| ring.points.iter().map(|p| t.apply_point(p)).collect())
            .collect();
        let verts: Vec<Vec<VertexId>> = positions
            .iter()
            .map(|ring_pos| ring_pos.iter().map(|p| model.add_vertex(*p)).collect())
            .collect();

        let mut ring_edges: Vec<Vec<EdgeId>> = Vec::with_capacity(ring_count);
        for r in 0..ring_count {
            let mut edges = Vec::with_capacity(k);
            for j in 0..k {
                let jn = (j + 1) % k;
                edges.push(model.add_edge(verts[r][j], verts[r][jn], None, 0.0, 1.0)?);
            }
            ring_edges.push(edges);
        }
        let mut long_edges: Vec<Vec<EdgeId>> = Vec::with_capacity(steps);
        for r in 0..steps {
            let rn = (r + 1) % ring_count;
            let mut edges = Vec::with_capacity(k);
            for j in 0..k {
                edges.push(model.add_edge(verts[r][j], verts[rn][j], None, 0.0, 1.0)?);
            }
            long_edges.push(edges);
        }

        // Side quads. Winding follows the side of the axis: rotation
        // displaces points along ±plane-normal, and the outward wall
        // normal must match the loop's in-plane outward direction.
        for r in 0..steps {
            let rn = (r + 1) % ring_count;
            for j in 0..k {
                let jn = (j + 1) % k;
                let (hes, q0, q1, q3) = if positive_side {
                    (
                        [
                            model.add_half_edge(ring_edges[r][j], Direction::Forward)?,
                            model.add_half_edge(long_edges[r][jn], Direction::Forward)?,
                            model.add_half_edge(ring_edges[rn][j], Direction::Reversed)?,
                            model.add_half_edge(long_edges[r][j], Direction::Reversed)?,
                        ],
                        positions[r][j],
                        positions[r][jn],
                        positions[rn][j],
                    )
                } else {
                    (
                        [
                            model.add_half_edge(long_edges[r][j], Direction::Forward)?,
                            model.add_half_edge(ring_edges[rn][j], Direction::Forward)?,
                            model.add_half_edge(long_edges[r][jn], Direction::Reversed)?,
                            model.add_half_edge(ring_edges[r][j], Direction::Reversed)?,
                        ],
                        positions[r][j],
                        positions[rn][j],
                        positions[r][jn],
                    )
                };
                for he in &hes {
                    let edge = model.half_edges[*he].edge;
                    he_by_edge.entry(edge).or_default().push(*he);
                }
                let loop_id = model.add_loop(&hes)?;
                let surface =
                    geom.add_surface(Box::new(Plane::new(q0, q1 - q0, q3 - q0)));
                let face = model.add_face(surface, false);
                model.add_loop_to_face(face, loop_id)?;
                model.add_face_to_shell(shell, face)?;
                faces.push(SweptFace {
                    face,
                    role: SweptFaceRole::Side {
                        loop_index: ring.loop_index,
                        entity: ring.sources[j],
                        segment: j,
                    },
                });
            }
        }

        if !full {
            cap_rings.push(CapRing {
                start_edges: ring_edges.first().cloned().unwrap_or_default(),
                end_edges: ring_edges.last().cloned().unwrap_or_default(),
            });
        }
    }

    // Planar end caps for partial revolves. The start cap faces against
    // the rotation (−side·normal), the end cap along it.
    if !full {
        let start_surface = geom.add_surface(Box::new(Plane::new(
            profile.plane.origin,
            *profile.plane.x_dir.as_ref(),
            *profile.plane.y_dir.as_ref(),
        )));
        let start_face = model.add_face(start_surface, positive_side);
        for cap in &cap_rings {
            let hes = cap_loop(model, &cap.start_edges, positive_side)?;
            for he in &hes {
                let edge = model.half_edges[*he].edge;
                he_by_edge.entry(edge).or_default().push(*he);
            }
            let loop_id = model.add_loop(&hes)?;
            model.add_loop_to_face(start_face, loop_id)?;
        }
        model.add_face_to_shell(shell, start_face)?;
        faces.push(SweptFace {
            face: start_face,
            role: SweptFaceRole::StartCap {
                loop_index: outer_index,
            },
        });

        let end_surface = geom.add_surface(Box::new(Plane::new(
            end_rotation.apply_point(&profile.plane.origin),
            end_rotation.apply_vec(profile.plane.x_dir.as_ref()),
            end_rotation.apply_vec(profile.plane.y_dir.as_ref()),
        )));
        let end_face = model.add_face(end_surface, !positive_side);
        for cap in &cap_rings {
            let hes = cap_loop(model, &cap.end_edges, !positive_side)?;
            for he in &hes {
                let edge = model.half_edges[*he].edge;
                he_by_edge.entry(edge).or_default().push(*he);
            }
            let loop_id = model.add_loop(&hes)?;
            model.add_loop_to_face(end_face, loop_id)?;
        }
        model.add_face_to_shell(shell, end_face)?;
        faces.push(SweptFace {
            face: end_face,
            role: SweptFaceRole::EndCap {
                loop_index: outer_index,
            },
        });
    }

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

/// Build a cap loop over a boundary ring, reversed or forward.
fn cap_loop(
    model: &mut TopologyModel,
    edges: &[EdgeId],
    reversed: bool,
) -> Result<Vec<HalfEdgeId>, SweepError> {
    let mut hes = Vec::with_capacity(edges.len());
    if reversed {
        for i in (0..edges.len()).rev() {
            hes.push(model.add_half_edge(edges[i], Direction::Reversed)?);
        }
    } else {
        for &edge in edges {
            hes.push(model.add_half_edge(edge, Direction::Forward)?);
        }
    }
    Ok(hes)
}
