#![warn(missing_docs)]

//! B-rep to triangle mesh tessellation for the arbor kernel.
//!
//! Converts planar faces into an indexed triangle mesh by projecting
//! their loops into the face plane, bridging holes into the outer
//! polygon, and ear-clipping the result. Triangles carry a face map and
//! boundary edges an edge map so consumers can hit-test back to
//! topology.

use arbor_kernel_geom::{GeometryPool, Plane, SurfaceKind};
use arbor_kernel_math::{is_counter_clockwise, point_in_polygon, signed_area, Point2, Point3};
use arbor_kernel_topo::{BodyId, EdgeId, FaceId, TopologyModel};

/// Indexed triangle mesh with face and edge provenance.
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    /// Vertex positions, three f32 per vertex (mm).
    pub positions: Vec<f32>,
    /// Vertex normals, three f32 per vertex.
    pub normals: Vec<f32>,
    /// Triangle indices, three per triangle.
    pub indices: Vec<u32>,
    /// Per-triangle index into [`Mesh::faces`].
    pub face_map: Vec<u32>,
    /// Tessellated faces, indexed by `face_map`.
    pub faces: Vec<FaceId>,
    /// Visible edge endpoint pairs, six f32 per edge segment.
    pub edges: Vec<f32>,
    /// Per-edge-segment index into [`Mesh::edge_handles`].
    pub edge_map: Vec<u32>,
    /// Topology edges, indexed by `edge_map`.
    pub edge_handles: Vec<EdgeId>,
}

impl Mesh {
    /// Number of triangles.
    pub fn num_triangles(&self) -> usize {
        self.indices.len() / 3
    }

    /// Number of vertices.
    pub fn num_vertices(&self) -> usize {
        self.positions.len() / 3
    }

    /// Axis-aligned bounds as `(min, max)`; `None` for an empty mesh.
    pub fn bounding_box(&self) -> Option<(Point3, Point3)> {
        if self.positions.is_empty() {
            return None;
        }
        let mut min = Point3::new(f64::MAX, f64::MAX, f64::MAX);
        let mut max = Point3::new(f64::MIN, f64::MIN, f64::MIN);
        for chunk in self.positions.chunks(3) {
            let p = Point3::new(chunk[0] as f64, chunk[1] as f64, chunk[2] as f64);
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            min.z = min.z.min(p.z);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
            max.z = max.z.max(p.z);
        }
        Some((min, max))
    }

    /// Signed volume via the divergence theorem (positive for outward
    /// winding).
    pub fn signed_volume(&self) -> f64 {
        let mut volume = 0.0;
        for tri in self.indices.chunks(3) {
            let p = |i: u32| -> Point3 {
                let o = i as usize * 3;
                Point3::new(
                    self.positions[o] as f64,
                    self.positions[o + 1] as f64,
                    self.positions[o + 2] as f64,
                )
            };
            let (a, b, c) = (p(tri[0]), p(tri[1]), p(tri[2]));
            volume += a.coords.dot(&b.coords.cross(&c.coords)) / 6.0;
        }
        volume
    }
}

/// Tessellate every live face of a body.
///
/// Non-planar faces are skipped (the planar core never produces them).
pub fn tessellate_body(model: &TopologyModel, geom: &GeometryPool, body: BodyId) -> Mesh {
    let mut mesh = Mesh::default();

    for face in model.body_faces(body).collect::<Vec<_>>() {
        tessellate_face(model, geom, face, &mut mesh);
    }

    // Visible edges: every live edge referenced by the body's loops
    let mut seen = std::collections::BTreeSet::new();
    for face in model.body_faces(body).collect::<Vec<_>>() {
        for &loop_id in model.face_loops(face) {
            for he in model.loop_half_edges(loop_id).collect::<Vec<_>>() {
                let edge = model.half_edges[he].edge;
                if !model.is_edge_live(edge) || !seen.insert(edge) {
                    continue;
                }
                let rec = &model.edges[edge];
                let a = model.vertices[rec.start].position;
                let b = model.vertices[rec.end].position;
                let idx = mesh.edge_handles.len() as u32;
                mesh.edge_handles.push(edge);
                mesh.edges.extend_from_slice(&[
                    a.x as f32, a.y as f32, a.z as f32, b.x as f32, b.y as f32, b.z as f32,
                ]);
                mesh.edge_map.push(idx);
            }
        }
    }

    mesh
}

fn tessellate_face(model: &TopologyModel, geom: &GeometryPool, face: FaceId, mesh: &mut Mesh) {
    let surface = geom.surface(model.faces[face].surface);
    if surface.surface_type() != SurfaceKind::Plane {
        return;
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
    let Some(&outer_loop) = loops.first() else {
        return;
    };
    let project = |loop_id| -> Vec<Point2> {
        model
            .loop_positions(loop_id)
            .iter()
            .map(|p| plane.project(p))
            .collect()
    };
    let mut outer = project(outer_loop);
    if outer.len() < 3 {
        return;
    }
    if !is_counter_clockwise(&outer) {
        outer.reverse();
    }
    let mut holes: Vec<Vec<Point2>> = Vec::new();
    for &hole in &loops[1..] {
        let mut ring = project(hole);
        if ring.len() < 3 {
            continue;
        }
        if is_counter_clockwise(&ring) {
            ring.reverse();
        }
        holes.push(ring);
    }

    let polygon = merge_holes(outer, holes);
    let triangles = ear_clip(&polygon);
    if triangles.is_empty() {
        return;
    }

    let face_index = mesh.faces.len() as u32;
    mesh.faces.push(face);
    let normal = plane.normal_dir.as_ref();
    let base = mesh.num_vertices() as u32;
    for p2 in &polygon {
        let p3 = plane.lift(p2);
        mesh.positions
            .extend_from_slice(&[p3.x as f32, p3.y as f32, p3.z as f32]);
        mesh.normals
            .extend_from_slice(&[normal.x as f32, normal.y as f32, normal.z as f32]);
    }
    for (a, b, c) in triangles {
        mesh.indices
            .extend_from_slice(&[base + a as u32, base + b as u32, base + c as u32]);
        mesh.face_map.push(face_index);
    }
}

/// Merge hole rings into the outer ring via bridge edges, producing one
/// simple polygon.
///
/// Holes are processed right-to-left: the rightmost hole vertex is
/// bridged to a visible outer vertex, the classic approach for
/// ear-clipping with holes.
fn merge_holes(outer: Vec<Point2>, mut holes: Vec<Vec<Point2>>) -> Vec<Point2> {
    let mut polygon = outer;
    // Rightmost hole first
    holes.sort_by(|a, b| {
        let ax = a.iter().map(|p| p.x).fold(f64::NEG_INFINITY, f64::max);
        let bx = b.iter().map(|p| p.x).fold(f64::NEG_INFINITY, f64::max);
        bx.partial_cmp(&ax).unwrap()
    });

    for hole in holes {
        // Rightmost vertex of the hole
        let (m_idx, _) = hole
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.x.partial_cmp(&b.x).unwrap())
            .unwrap();
        let m = hole[m_idx];

        // Candidate bridge target: the polygon vertex visible from m.
        // Prefer the closest vertex to the right of m whose connecting
        // segment crosses no polygon or hole edge.
        let mut best: Option<(usize, f64)> = None;
        for (i, p) in polygon.iter().enumerate() {
            let d2 = (p - m).norm_squared();
            if segment_clear(&m, p, &polygon) && segment_clear(&m, p, &hole) {
                match best {
                    Some((_, best_d2)) if best_d2 <= d2 => {}
                    _ => best = Some((i, d2)),
                }
            }
        }
        // Fall back to the nearest vertex outright
        let bridge_idx = best
            .map(|(i, _)| i)
            .unwrap_or_else(|| {
                polygon
                    .iter()
                    .enumerate()
                    .min_by(|(_, a), (_, b)| {
                        (*a - m)
                            .norm_squared()
                            .partial_cmp(&(*b - m).norm_squared())
                            .unwrap()
                    })
                    .map(|(i, _)| i)
                    .unwrap()
            });

        // Splice: ...polygon[bridge], hole[m..], hole[..m], hole[m],
        // polygon[bridge], ...
        let mut next = Vec::with_capacity(polygon.len() + hole.len() + 2);
        next.extend_from_slice(&polygon[..=bridge_idx]);
        for k in 0..=hole.len() {
            next.push(hole[(m_idx + k) % hole.len()]);
        }
        next.push(polygon[bridge_idx]);
        next.extend_from_slice(&polygon[bridge_idx + 1..]);
        polygon = next;
    }
    polygon
}

/// True when the open segment `a→b` crosses no edge of `ring` (shared
/// endpoints do not count).
fn segment_clear(a: &Point2, b: &Point2, ring: &[Point2]) -> bool {
    let eps = 1e-12;
    for i in 0..ring.len() {
        let c = ring[i];
        let d = ring[(i + 1) % ring.len()];
        if (c - a).norm() < eps || (d - a).norm() < eps || (c - b).norm() < eps || (d - b).norm() < eps
        {
            continue;
        }
        if let Some(hit) = arbor_kernel_math::segment_intersection(a, b, &c, &d, 0.0) {
            if hit.t > 1e-9 && hit.t < 1.0 - 1e-9 {
                return false;
            }
        }
    }
    true
}

/// Ear-clipping triangulation of a CCW simple polygon.
///
/// Returns vertex index triples. Falls back to a fan when no ear can be
/// found (degenerate input).
fn ear_clip(polygon: &[Point2]) -> Vec<(usize, usize, usize)> {
    let n = polygon.len();
    if n < 3 {
        return Vec::new();
    }
    if signed_area(polygon) <= 0.0 {
        // Caller orients CCW; a non-positive area polygon is degenerate
        return Vec::new();
    }

    let mut remaining: Vec<usize> = (0..n).collect();
    let mut triangles = Vec::with_capacity(n - 2);

    let cross = |o: &Point2, a: &Point2, b: &Point2| -> f64 {
        (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
    };

    'outer: while remaining.len() > 3 {
        let m = remaining.len();
        for k in 0..m {
            let ip = remaining[(k + m - 1) % m];
            let ic = remaining[k];
            let inx = remaining[(k + 1) % m];
            let (p, c, nx) = (polygon[ip], polygon[ic], polygon[inx]);
            // Convex corner?
            if cross(&p, &c, &nx) <= 1e-12 {
                continue;
            }
            // No other remaining vertex inside the candidate ear
            let ear = [p, c, nx];
            let mut blocked = false;
            for &other in &remaining {
                if other == ip || other == ic || other == inx {
                    continue;
                }
                let q = polygon[other];
                if (q - p).norm() < 1e-12 || (q - c).norm() < 1e-12 || (q - nx).norm() < 1e-12 {
                    continue;
                }
                if point_in_polygon(&q, &ear, 0.0) {
                    blocked = true;
                    break;
                }
            }
            if blocked {
                continue;
            }
            triangles.push((ip, ic, inx));
            remaining.remove(k);
            continue 'outer;
        }
        // No ear found: fan out the rest
        for k in 1..remaining.len() - 1 {
            triangles.push((remaining[0], remaining[k], remaining[k + 1]));
        }
        remaining.clear();
        return triangles;
    }
    if remaining.len() == 3 {
        triangles.push((remaining[0], remaining[1], remaining[2]));
    }
    triangles
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_kernel_sketch::{profile_from_sketch, Sketch, SketchPlane};
    use arbor_kernel_sweep::{extrude, ExtrudeParams};

    fn make_box(model: &mut TopologyModel, geom: &mut GeometryPool, size: f64) -> BodyId {
        let mut sketch = Sketch::new(SketchPlane::xy());
        sketch.add_rectangle(0.0, 0.0, size, size);
        let profile = profile_from_sketch(&sketch, None).unwrap();
        extrude(model, geom, &profile, &ExtrudeParams::new(size))
            .unwrap()
            .body
    }

    #[test]
    fn test_box_mesh_counts() {
        let mut model = TopologyModel::new();
        let mut geom = GeometryPool::new();
        let body = make_box(&mut model, &mut geom, 10.0);
        let mesh = tessellate_body(&model, &geom, body);

        // 6 quads → 12 triangles
        assert_eq!(mesh.num_triangles(), 12);
        assert_eq!(mesh.face_map.len(), 12);
        assert_eq!(mesh.faces.len(), 6);
        assert_eq!(mesh.edge_handles.len(), 12);
        let (min, max) = mesh.bounding_box().unwrap();
        assert!((min - Point3::new(0.0, 0.0, 0.0)).norm() < 1e-6);
        assert!((max - Point3::new(10.0, 10.0, 10.0)).norm() < 1e-6);
    }

    #[test]
    fn test_box_mesh_volume_positive() {
        let mut model = TopologyModel::new();
        let mut geom = GeometryPool::new();
        let body = make_box(&mut model, &mut geom, 10.0);
        let mesh = tessellate_body(&model, &geom, body);
        let volume = mesh.signed_volume();
        assert!(
            (volume - 1000.0).abs() < 1e-3,
            "volume {volume}, expected 1000"
        );
    }

    #[test]
    fn test_holed_face_triangulation() {
        let mut model = TopologyModel::new();
        let mut geom = GeometryPool::new();
        let mut sketch = Sketch::new(SketchPlane::xy());
        sketch.add_rectangle(0.0, 0.0, 10.0, 10.0);
        let c = sketch.add_point(5.0, 5.0);
        sketch.add_circle(c, 2.0).unwrap();
        let profile = profile_from_sketch(&sketch, None).unwrap();
        let params = ExtrudeParams {
            arc_segments: 16,
            ..ExtrudeParams::new(5.0)
        };
        let body = extrude(&mut model, &mut geom, &profile, &params).unwrap().body;

        let mesh = tessellate_body(&model, &geom, body);
        assert!(mesh.num_triangles() > 0);
        // Volume ≈ 500 − π·4·5; the bridged triangulation must not fill
        // the hole
        let volume = mesh.signed_volume();
        let expected = 500.0 - std::f64::consts::PI * 20.0;
        assert!(
            (volume - expected).abs() < expected * 0.02,
            "volume {volume}, expected ≈ {expected}"
        );
    }

    #[test]
    fn test_normals_unit_length() {
        let mut model = TopologyModel::new();
        let mut geom = GeometryPool::new();
        let body = make_box(&mut model, &mut geom, 4.0);
        let mesh = tessellate_body(&model, &geom, body);
        for n in mesh.normals.chunks(3) {
            let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
            assert!((len - 1.0).abs() < 1e-5, "normal length {len}");
            assert!(n.iter().all(|v| v.is_finite()));
        }
    }

    #[test]
    fn test_ear_clip_square() {
        let square = vec![
            Point2::new(0.0, 0.0),
            Point2::new(4.0, 0.0),
            Point2::new(4.0, 4.0),
            Point2::new(0.0, 4.0),
        ];
        let tris = ear_clip(&square);
        assert_eq!(tris.len(), 2);
        let area: f64 = tris
            .iter()
            .map(|&(a, b, c)| {
                let (pa, pb, pc) = (square[a], square[b], square[c]);
                0.5 * ((pb.x - pa.x) * (pc.y - pa.y) - (pb.y - pa.y) * (pc.x - pa.x))
            })
            .sum();
        assert!((area - 16.0).abs() < 1e-12);
    }

    #[test]
    fn test_ear_clip_concave() {
        // L-shaped polygon
        let poly = vec![
            Point2::new(0.0, 0.0),
            Point2::new(4.0, 0.0),
            Point2::new(4.0, 2.0),
            Point2::new(2.0, 2.0),
            Point2::new(2.0, 4.0),
            Point2::new(0.0, 4.0),
        ];
        let tris = ear_clip(&poly);
        assert_eq!(tris.len(), 4);
        let area: f64 = tris
            .iter()
            .map(|&(a, b, c)| {
                let (pa, pb, pc) = (poly[a], poly[b], poly[c]);
                0.5 * ((pb.x - pa.x) * (pc.y - pa.y) - (pb.y - pa.y) * (pc.x - pa.x))
            })
            .sum();
        assert!((area - 12.0).abs() < 1e-12, "L area {area}");
        // All triangles CCW
        for &(a, b, c) in &tris {
            let (pa, pb, pc) = (poly[a], poly[b], poly[c]);
            let cr = (pb.x - pa.x) * (pc.y - pa.y) - (pb.y - pa.y) * (pc.x - pa.x);
            assert!(cr > 0.0, "triangle must stay CCW");
        }
    }

    #[test]
    fn test_ear_clip_rejects_cw() {
        let cw = vec![
            Point2::new(0.0, 0.0),
            Point2::new(0.0, 4.0),
            Point2::new(4.0, 4.0),
            Point2::new(4.0, 0.0),
        ];
        assert!(ear_clip(&cw).is_empty());
    }
}
