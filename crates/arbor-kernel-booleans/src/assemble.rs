//! Reassembly: instantiate the retained face pieces into a new body.
//!
//! Vertices and edges are unified by quantized position so adjacent
//! pieces share topology, then a twin pass links every edge that carries
//! exactly two half-edges. Edges with any other count are reported as
//! non-manifold warnings but do not abort the operation.

use std::collections::HashMap;

use arbor_kernel_geom::GeometryPool;
use arbor_kernel_math::{Point2, Point3};
use arbor_kernel_topo::{BodyId, Direction, EdgeId, FaceId, HalfEdgeId, TopologyModel};

use crate::imprint::FacePiece;
use crate::BooleanError;

/// Quantization key for vertex unification.
type VKey = [i64; 3];

fn quantize(p: &Point3) -> VKey {
    [
        (p.x * 1e9).round() as i64,
        (p.y * 1e9).round() as i64,
        (p.z * 1e9).round() as i64,
    ]
}

/// Build a new body from the retained pieces.
///
/// Returns the body and, per input piece, the new face id (in input
/// order; `None` for pieces dropped as degenerate).
pub fn assemble_pieces(
    model: &mut TopologyModel,
    geom: &mut GeometryPool,
    pieces: &[(FacePiece, bool)],
    warnings: &mut Vec<String>,
) -> Result<(BodyId, Vec<Option<FaceId>>), BooleanError> {
    let body = model.add_body();
    let shell = model.add_shell(true);
    model.add_shell_to_body(body, shell)?;

    let mut vertex_of: HashMap<VKey, arbor_kernel_topo::VertexId> = HashMap::new();
    let mut edge_of: HashMap<(VKey, VKey), EdgeId> = HashMap::new();
    let mut hes_by_edge: HashMap<EdgeId, Vec<HalfEdgeId>> = HashMap::new();
    let mut new_faces = Vec::with_capacity(pieces.len());

    for (piece, flip) in pieces {
        let plane = if *flip {
            piece.plane.flipped()
        } else {
            piece.plane.clone()
        };
        let surface = geom.add_surface(Box::new(plane));
        let face = model.add_face(surface, false);

        let mut rings: Vec<Vec<Point2>> = Vec::with_capacity(1 + piece.holes.len());
        rings.push(piece.outer.clone());
        rings.extend(piece.holes.iter().cloned());
        if *flip {
            for ring in &mut rings {
                ring.reverse();
            }
        }

        let mut face_ok = true;
        for (ring_idx, ring) in rings.iter().enumerate() {
            // 3D positions with consecutive duplicates dropped
            let mut pts: Vec<Point3> = Vec::with_capacity(ring.len());
            for p2 in ring {
                let p3 = piece.lift(p2);
                if pts.last().map_or(true, |last| quantize(last) != quantize(&p3)) {
                    pts.push(p3);
                }
            }
            while pts.len() > 1 && quantize(&pts[0]) == quantize(pts.last().unwrap()) {
                pts.pop();
            }
            if pts.len() < 3 {
                if ring_idx == 0 {
                    face_ok = false;
                }
                continue;
            }

            let mut hes = Vec::with_capacity(pts.len());
            for i in 0..pts.len() {
                let a = pts[i];
                let b = pts[(i + 1) % pts.len()];
                let (ka, kb) = (quantize(&a), quantize(&b));
                let va = *vertex_of
                    .entry(ka)
                    .or_insert_with(|| model.add_vertex(a));
                let vb = *vertex_of
                    .entry(kb)
                    .or_insert_with(|| model.add_vertex(b));
                let canonical = if ka <= kb { (ka, kb) } else { (kb, ka) };
                let edge = match edge_of.get(&canonical) {
                    Some(&e) => e,
                    None => {
                        let e = model.add_edge(va, vb, None, 0.0, 1.0)?;
                        edge_of.insert(canonical, e);
                        e
                    }
                };
                let direction = if model.edges[edge].start == va {
                    Direction::Forward
                } else {
                    Direction::Reversed
                };
                let he = model.add_half_edge(edge, direction)?;
                hes_by_edge.entry(edge).or_default().push(he);
                hes.push(he);
            }
            let loop_id = model.add_loop(&hes)?;
            model.add_loop_to_face(face, loop_id)?;
        }

        if face_ok && !model.face_loops(face).is_empty() {
            model.add_face_to_shell(shell, face)?;
            new_faces.push(Some(face));
        } else {
            model.mark_face_deleted(face);
            new_faces.push(None);
        }
    }

    // Twin pass
    let mut non_manifold = 0usize;
    for (edge, hes) in &hes_by_edge {
        if hes.len() == 2 {
            model.set_twin(hes[0], hes[1])?;
        } else {
            non_manifold += 1;
            let len = model.edge_length(*edge).unwrap_or(0.0);
            log::warn!(
                "non-manifold edge after reassembly: {} half-edges, length {:.6}",
                hes.len(),
                len
            );
        }
    }
    if non_manifold > 0 {
        warnings.push(format!(
            "{non_manifold} non-manifold edges after reassembly"
        ));
    }

    Ok((body, new_faces))
}
