#![warn(missing_docs)]

//! B-rep topology model for the arbor kernel.
//!
//! Seven entity tables (vertex, edge, half-edge, loop, face, shell, body)
//! with branded slotmap handles. Entities are never relocated: deletion
//! sets a `DELETED` flag and decrements a live count, so handles stay
//! valid as identifiers for the life of the model. Geometry lives in the
//! [`arbor_kernel_geom::GeometryPool`] and is referenced by index.

use arbor_kernel_math::{Point3, Vec3};
use arbor_kernel_geom::{Curve3Index, PCurveIndex, SurfaceIndex};
use slotmap::{new_key_type, Key, SlotMap};
use thiserror::Error;

new_key_type! {
    /// Handle to a vertex.
    pub struct VertexId;
    /// Handle to an edge.
    pub struct EdgeId;
    /// Handle to a half-edge.
    pub struct HalfEdgeId;
    /// Handle to a loop.
    pub struct LoopId;
    /// Handle to a face.
    pub struct FaceId;
    /// Handle to a shell.
    pub struct ShellId;
    /// Handle to a body.
    pub struct BodyId;
}

/// Errors from topology operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TopoError {
    /// A handle was null, stale, or refers to a deleted entity.
    #[error("invalid or deleted topology handle")]
    InvalidHandle,

    /// The half-edges supplied to `add_loop` do not form a closed cycle.
    #[error("half-edges do not form a closed loop (break after {0} edges)")]
    NonClosedLoop(usize),
}

/// Per-entity flag bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntityFlags(u32);

impl EntityFlags {
    /// Entity has been soft-deleted.
    pub const DELETED: u32 = 1 << 0;

    /// True when the DELETED bit is set.
    pub fn is_deleted(self) -> bool {
        self.0 & Self::DELETED != 0
    }

    fn set(&mut self, bit: u32) {
        self.0 |= bit;
    }
}

/// Traversal direction of a half-edge along its edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Travels from `edge.start` to `edge.end`.
    Forward,
    /// Travels from `edge.end` to `edge.start`.
    Reversed,
}

impl Direction {
    /// The opposite direction.
    pub fn opposite(self) -> Self {
        match self {
            Direction::Forward => Direction::Reversed,
            Direction::Reversed => Direction::Forward,
        }
    }
}

// =============================================================================
// Entity records
// =============================================================================

/// A topological vertex with a 3D position.
#[derive(Debug, Clone)]
pub struct Vertex {
    /// Position in model space (mm).
    pub position: Point3,
    /// Flag bits.
    pub flags: EntityFlags,
}

/// A topological edge between two vertices.
///
/// The curve parameterization is "same-parameter" for both half-edges;
/// `t_start <= t_end` and the curve endpoints agree with the vertices
/// within tolerance.
#[derive(Debug, Clone)]
pub struct Edge {
    /// Start vertex.
    pub start: VertexId,
    /// End vertex.
    pub end: VertexId,
    /// Supporting 3D curve, if any (straight edges may omit it).
    pub curve3: Option<Curve3Index>,
    /// Curve parameter at the start vertex.
    pub t_start: f64,
    /// Curve parameter at the end vertex.
    pub t_end: f64,
    /// A representative half-edge on this edge.
    pub half_edge: Option<HalfEdgeId>,
    /// Flag bits.
    pub flags: EntityFlags,
}

/// One directed use of an edge by a loop.
#[derive(Debug, Clone)]
pub struct HalfEdge {
    /// The underlying edge.
    pub edge: EdgeId,
    /// Owning loop, once linked into one.
    pub loop_id: Option<LoopId>,
    /// Next half-edge in the loop cycle.
    pub next: Option<HalfEdgeId>,
    /// Previous half-edge in the loop cycle.
    pub prev: Option<HalfEdgeId>,
    /// Twin half-edge on the adjacent face, if paired.
    pub twin: Option<HalfEdgeId>,
    /// Traversal direction along the edge.
    pub direction: Direction,
    /// Optional parameterization of the edge on the owning face.
    pub pcurve: Option<PCurveIndex>,
    /// Flag bits.
    pub flags: EntityFlags,
}

/// A closed cycle of half-edges bounding a face.
#[derive(Debug, Clone)]
pub struct Loop {
    /// Owning face, once attached.
    pub face: Option<FaceId>,
    /// First half-edge of the cycle.
    pub first_half_edge: HalfEdgeId,
    /// Number of half-edges in the cycle.
    pub half_edge_count: usize,
    /// Flag bits.
    pub flags: EntityFlags,
}

/// A face: a surface bounded by one outer loop and zero or more holes.
#[derive(Debug, Clone)]
pub struct Face {
    /// Owning shell, once attached.
    pub shell: Option<ShellId>,
    /// Supporting surface in the geometry pool.
    pub surface: SurfaceIndex,
    /// When set, the face normal is the surface normal flipped.
    pub reversed: bool,
    /// Loops: the first is the outer boundary, the rest are holes.
    pub loops: Vec<LoopId>,
    /// Flag bits.
    pub flags: EntityFlags,
}

/// A connected set of faces.
#[derive(Debug, Clone)]
pub struct Shell {
    /// Owning body, once attached.
    pub body: Option<BodyId>,
    /// A closed shell is a watertight manifold (every edge used twice).
    pub closed: bool,
    /// Faces of this shell.
    pub faces: Vec<FaceId>,
    /// Flag bits.
    pub flags: EntityFlags,
}

/// A solid body: one or more shells.
#[derive(Debug, Clone, Default)]
pub struct Body {
    /// Shells of this body (disjoint solids may carry several).
    pub shells: Vec<ShellId>,
    /// Flag bits.
    pub flags: EntityFlags,
}

// =============================================================================
// Model
// =============================================================================

/// The seven-table topology model.
///
/// All mutation goes through the methods below; handles are the only
/// stable references into the tables. Tables are exclusively owned by
/// one `TopologyModel` value.
#[derive(Debug, Clone, Default)]
pub struct TopologyModel {
    /// Vertex table.
    pub vertices: SlotMap<VertexId, Vertex>,
    /// Edge table.
    pub edges: SlotMap<EdgeId, Edge>,
    /// Half-edge table.
    pub half_edges: SlotMap<HalfEdgeId, HalfEdge>,
    /// Loop table.
    pub loops: SlotMap<LoopId, Loop>,
    /// Face table.
    pub faces: SlotMap<FaceId, Face>,
    /// Shell table.
    pub shells: SlotMap<ShellId, Shell>,
    /// Body table.
    pub bodies: SlotMap<BodyId, Body>,

    live_vertices: usize,
    live_edges: usize,
    live_half_edges: usize,
    live_loops: usize,
    live_faces: usize,
    live_shells: usize,
    live_bodies: usize,
}

impl TopologyModel {
    /// Create an empty model.
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Construction
    // =========================================================================

    /// Add a vertex at `position`.
    pub fn add_vertex(&mut self, position: Point3) -> VertexId {
        self.live_vertices += 1;
        self.vertices.insert(Vertex {
            position,
            flags: EntityFlags::default(),
        })
    }

    /// Add an edge between two live vertices.
    pub fn add_edge(
        &mut self,
        start: VertexId,
        end: VertexId,
        curve3: Option<Curve3Index>,
        t_start: f64,
        t_end: f64,
    ) -> Result<EdgeId, TopoError> {
        self.check_vertex(start)?;
        self.check_vertex(end)?;
        self.live_edges += 1;
        Ok(self.edges.insert(Edge {
            start,
            end,
            curve3,
            t_start,
            t_end,
            half_edge: None,
            flags: EntityFlags::default(),
        }))
    }

    /// Add an unlinked half-edge on `edge` with the given direction.
    pub fn add_half_edge(
        &mut self,
        edge: EdgeId,
        direction: Direction,
    ) -> Result<HalfEdgeId, TopoError> {
        self.check_edge(edge)?;
        self.live_half_edges += 1;
        let he = self.half_edges.insert(HalfEdge {
            edge,
            loop_id: None,
            next: None,
            prev: None,
            twin: None,
            direction,
            pcurve: None,
            flags: EntityFlags::default(),
        });
        let rec = &mut self.edges[edge];
        if rec.half_edge.is_none() {
            rec.half_edge = Some(he);
        }
        Ok(he)
    }

    /// Link two half-edges so `a.next = b` and `b.prev = a`.
    pub fn link_half_edges(&mut self, a: HalfEdgeId, b: HalfEdgeId) -> Result<(), TopoError> {
        self.check_half_edge(a)?;
        self.check_half_edge(b)?;
        self.half_edges[a].next = Some(b);
        self.half_edges[b].prev = Some(a);
        Ok(())
    }

    /// Pair two half-edges as twins (symmetric).
    pub fn set_twin(&mut self, a: HalfEdgeId, b: HalfEdgeId) -> Result<(), TopoError> {
        self.check_half_edge(a)?;
        self.check_half_edge(b)?;
        self.half_edges[a].twin = Some(b);
        self.half_edges[b].twin = Some(a);
        Ok(())
    }

    /// Build a loop from an ordered cycle of half-edges.
    ///
    /// Links the half-edges cyclically and back-references each to the new
    /// loop. Fails with [`TopoError::NonClosedLoop`] when consecutive
    /// half-edges do not share a vertex.
    pub fn add_loop(&mut self, half_edges: &[HalfEdgeId]) -> Result<LoopId, TopoError> {
        if half_edges.is_empty() {
            return Err(TopoError::NonClosedLoop(0));
        }
        for &he in half_edges {
            self.check_half_edge(he)?;
        }
        // Verify the chain closes on itself before mutating anything
        for (i, &he) in half_edges.iter().enumerate() {
            let next = half_edges[(i + 1) % half_edges.len()];
            if self.half_edge_end(he)? != self.half_edge_start(next)? {
                return Err(TopoError::NonClosedLoop(i + 1));
            }
        }

        self.live_loops += 1;
        let loop_id = self.loops.insert(Loop {
            face: None,
            first_half_edge: half_edges[0],
            half_edge_count: half_edges.len(),
            flags: EntityFlags::default(),
        });
        for (i, &he) in half_edges.iter().enumerate() {
            let next = half_edges[(i + 1) % half_edges.len()];
            self.half_edges[he].next = Some(next);
            self.half_edges[next].prev = Some(he);
            self.half_edges[he].loop_id = Some(loop_id);
        }
        Ok(loop_id)
    }

    /// Add a face on `surface` with no loops yet.
    pub fn add_face(&mut self, surface: SurfaceIndex, reversed: bool) -> FaceId {
        self.live_faces += 1;
        self.faces.insert(Face {
            shell: None,
            surface,
            reversed,
            loops: Vec::new(),
            flags: EntityFlags::default(),
        })
    }

    /// Attach a loop to a face. The first loop attached is the outer boundary.
    pub fn add_loop_to_face(&mut self, face: FaceId, loop_id: LoopId) -> Result<(), TopoError> {
        self.check_face(face)?;
        self.check_loop(loop_id)?;
        self.faces[face].loops.push(loop_id);
        self.loops[loop_id].face = Some(face);
        Ok(())
    }

    /// Add a shell.
    pub fn add_shell(&mut self, closed: bool) -> ShellId {
        self.live_shells += 1;
        self.shells.insert(Shell {
            body: None,
            closed,
            faces: Vec::new(),
            flags: EntityFlags::default(),
        })
    }

    /// Attach a face to a shell.
    pub fn add_face_to_shell(&mut self, shell: ShellId, face: FaceId) -> Result<(), TopoError> {
        self.check_shell(shell)?;
        self.check_face(face)?;
        self.shells[shell].faces.push(face);
        self.faces[face].shell = Some(shell);
        Ok(())
    }

    /// Add an empty body.
    pub fn add_body(&mut self) -> BodyId {
        self.live_bodies += 1;
        self.bodies.insert(Body::default())
    }

    /// Attach a shell to a body.
    pub fn add_shell_to_body(&mut self, body: BodyId, shell: ShellId) -> Result<(), TopoError> {
        self.check_body(body)?;
        self.check_shell(shell)?;
        self.bodies[body].shells.push(shell);
        self.shells[shell].body = Some(body);
        Ok(())
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Start vertex of a half-edge (edge start for forward direction).
    pub fn half_edge_start(&self, he: HalfEdgeId) -> Result<VertexId, TopoError> {
        self.check_half_edge(he)?;
        let rec = &self.half_edges[he];
        let edge = &self.edges[rec.edge];
        Ok(match rec.direction {
            Direction::Forward => edge.start,
            Direction::Reversed => edge.end,
        })
    }

    /// End vertex of a half-edge.
    pub fn half_edge_end(&self, he: HalfEdgeId) -> Result<VertexId, TopoError> {
        self.check_half_edge(he)?;
        let rec = &self.half_edges[he];
        let edge = &self.edges[rec.edge];
        Ok(match rec.direction {
            Direction::Forward => edge.end,
            Direction::Reversed => edge.start,
        })
    }

    /// Length of an edge (straight-line distance between its vertices).
    pub fn edge_length(&self, edge: EdgeId) -> Result<f64, TopoError> {
        self.check_edge(edge)?;
        let rec = &self.edges[edge];
        Ok((self.vertices[rec.end].position - self.vertices[rec.start].position).norm())
    }

    /// Iterate the half-edges of a loop in cycle order.
    pub fn loop_half_edges(&self, loop_id: LoopId) -> LoopHalfEdges<'_> {
        let (first, count) = match self.loops.get(loop_id) {
            Some(l) if !l.flags.is_deleted() => (Some(l.first_half_edge), l.half_edge_count),
            _ => (None, 0),
        };
        LoopHalfEdges {
            model: self,
            current: first,
            remaining: count,
        }
    }

    /// Ordered vertex ids around a loop (start vertex of each half-edge).
    pub fn loop_vertices(&self, loop_id: LoopId) -> Vec<VertexId> {
        self.loop_half_edges(loop_id)
            .filter_map(|he| self.half_edge_start(he).ok())
            .collect()
    }

    /// Ordered vertex positions around a loop.
    pub fn loop_positions(&self, loop_id: LoopId) -> Vec<Point3> {
        self.loop_vertices(loop_id)
            .into_iter()
            .map(|v| self.vertices[v].position)
            .collect()
    }

    /// Loops of a face (outer first, then holes).
    pub fn face_loops(&self, face: FaceId) -> &[LoopId] {
        match self.faces.get(face) {
            Some(f) if !f.flags.is_deleted() => &f.loops,
            _ => &[],
        }
    }

    /// Live faces of a shell.
    pub fn shell_faces(&self, shell: ShellId) -> impl Iterator<Item = FaceId> + '_ {
        let faces: &[FaceId] = match self.shells.get(shell) {
            Some(s) if !s.flags.is_deleted() => &s.faces,
            _ => &[],
        };
        faces
            .iter()
            .copied()
            .filter(move |&f| self.is_face_live(f))
    }

    /// Live shells of a body.
    pub fn body_shells(&self, body: BodyId) -> impl Iterator<Item = ShellId> + '_ {
        let shells: &[ShellId] = match self.bodies.get(body) {
            Some(b) if !b.flags.is_deleted() => &b.shells,
            _ => &[],
        };
        shells
            .iter()
            .copied()
            .filter(move |&s| self.shells.get(s).is_some_and(|r| !r.flags.is_deleted()))
    }

    /// Live faces of a body across all its shells.
    pub fn body_faces(&self, body: BodyId) -> impl Iterator<Item = FaceId> + '_ {
        self.body_shells(body)
            .collect::<Vec<_>>()
            .into_iter()
            .flat_map(move |s| self.shell_faces(s).collect::<Vec<_>>())
    }

    /// Iterate all live bodies.
    pub fn live_bodies(&self) -> impl Iterator<Item = BodyId> + '_ {
        self.bodies
            .iter()
            .filter(|(_, b)| !b.flags.is_deleted())
            .map(|(id, _)| id)
    }

    /// True when the face exists and is not deleted.
    pub fn is_face_live(&self, face: FaceId) -> bool {
        self.faces.get(face).is_some_and(|f| !f.flags.is_deleted())
    }

    /// True when the vertex exists and is not deleted.
    pub fn is_vertex_live(&self, v: VertexId) -> bool {
        self.vertices.get(v).is_some_and(|r| !r.flags.is_deleted())
    }

    /// True when the edge exists and is not deleted.
    pub fn is_edge_live(&self, e: EdgeId) -> bool {
        self.edges.get(e).is_some_and(|r| !r.flags.is_deleted())
    }

    /// Live entity counts `(vertices, edges, half_edges, loops, faces, shells, bodies)`.
    pub fn live_counts(&self) -> (usize, usize, usize, usize, usize, usize, usize) {
        (
            self.live_vertices,
            self.live_edges,
            self.live_half_edges,
            self.live_loops,
            self.live_faces,
            self.live_shells,
            self.live_bodies,
        )
    }

    // =========================================================================
    // Soft deletion
    // =========================================================================

    /// Mark a vertex deleted.
    pub fn mark_vertex_deleted(&mut self, id: VertexId) {
        if let Some(r) = self.vertices.get_mut(id) {
            if !r.flags.is_deleted() {
                r.flags.set(EntityFlags::DELETED);
                self.live_vertices -= 1;
            }
        }
    }

    /// Mark an edge deleted.
    pub fn mark_edge_deleted(&mut self, id: EdgeId) {
        if let Some(r) = self.edges.get_mut(id) {
            if !r.flags.is_deleted() {
                r.flags.set(EntityFlags::DELETED);
                self.live_edges -= 1;
            }
        }
    }

    /// Mark a half-edge deleted.
    pub fn mark_half_edge_deleted(&mut self, id: HalfEdgeId) {
        if let Some(r) = self.half_edges.get_mut(id) {
            if !r.flags.is_deleted() {
                r.flags.set(EntityFlags::DELETED);
                self.live_half_edges -= 1;
            }
        }
    }

    /// Mark a loop deleted.
    pub fn mark_loop_deleted(&mut self, id: LoopId) {
        if let Some(r) = self.loops.get_mut(id) {
            if !r.flags.is_deleted() {
                r.flags.set(EntityFlags::DELETED);
                self.live_loops -= 1;
            }
        }
    }

    /// Mark a face deleted.
    pub fn mark_face_deleted(&mut self, id: FaceId) {
        if let Some(r) = self.faces.get_mut(id) {
            if !r.flags.is_deleted() {
                r.flags.set(EntityFlags::DELETED);
                self.live_faces -= 1;
            }
        }
    }

    /// Mark a shell deleted.
    pub fn mark_shell_deleted(&mut self, id: ShellId) {
        if let Some(r) = self.shells.get_mut(id) {
            if !r.flags.is_deleted() {
                r.flags.set(EntityFlags::DELETED);
                self.live_shells -= 1;
            }
        }
    }

    /// Mark a body deleted.
    pub fn mark_body_deleted(&mut self, id: BodyId) {
        if let Some(r) = self.bodies.get_mut(id) {
            if !r.flags.is_deleted() {
                r.flags.set(EntityFlags::DELETED);
                self.live_bodies -= 1;
            }
        }
    }

    // =========================================================================
    // Structural edits
    // =========================================================================

    /// Reverse a loop in place: swap next/prev of every half-edge and flip
    /// each half-edge's direction. The cycle is preserved.
    pub fn reverse_loop(&mut self, loop_id: LoopId) -> Result<(), TopoError> {
        self.check_loop(loop_id)?;
        let hes: Vec<HalfEdgeId> = self.loop_half_edges(loop_id).collect();
        for &he in &hes {
            let rec = &mut self.half_edges[he];
            std::mem::swap(&mut rec.next, &mut rec.prev);
            rec.direction = rec.direction.opposite();
        }
        Ok(())
    }

    /// Flip a face: toggle the REVERSED flag and reverse every loop so the
    /// outer boundary stays counter-clockwise for the effective normal.
    pub fn flip_face(&mut self, face: FaceId) -> Result<(), TopoError> {
        self.check_face(face)?;
        self.faces[face].reversed = !self.faces[face].reversed;
        let loops = self.faces[face].loops.clone();
        for l in loops {
            self.reverse_loop(l)?;
        }
        Ok(())
    }

    /// Geometric normal of a face via Newell's formula over its outer loop,
    /// honoring the REVERSED flag. Zero vector for degenerate loops.
    pub fn face_newell_normal(&self, face: FaceId) -> Vec3 {
        let loops = self.face_loops(face);
        let Some(&outer) = loops.first() else {
            return Vec3::zeros();
        };
        let pts = self.loop_positions(outer);
        let mut n = Vec3::zeros();
        for i in 0..pts.len() {
            let a = pts[i];
            let b = pts[(i + 1) % pts.len()];
            n.x += (a.y - b.y) * (a.z + b.z);
            n.y += (a.z - b.z) * (a.x + b.x);
            n.z += (a.x - b.x) * (a.y + b.y);
        }
        n * 0.5
    }

    /// Signed volume of a shell via summed signed tetrahedra.
    ///
    /// Positive when face normals point outward. Every loop of a face is
    /// fan-summed; hole loops wind opposite and subtract their share.
    pub fn shell_signed_volume(&self, shell: ShellId) -> f64 {
        let mut volume = 0.0;
        for face in self.shell_faces(shell).collect::<Vec<_>>() {
            for &loop_id in self.face_loops(face) {
                let pts = self.loop_positions(loop_id);
                if pts.len() < 3 {
                    continue;
                }
                let p0 = pts[0];
                for i in 1..pts.len() - 1 {
                    let p1 = pts[i];
                    let p2 = pts[i + 1];
                    volume += p0.coords.dot(&(p1.coords.cross(&p2.coords))) / 6.0;
                }
            }
        }
        volume
    }

    /// Deep-copy a shell (faces, loops, half-edges, edges, vertices) into
    /// `target_body`. Surfaces are shared by index; new entities are fresh.
    pub fn clone_shell_into_body(
        &mut self,
        shell: ShellId,
        target_body: BodyId,
    ) -> Result<ShellId, TopoError> {
        self.check_shell(shell)?;
        self.check_body(target_body)?;

        let closed = self.shells[shell].closed;
        let faces: Vec<FaceId> = self.shell_faces(shell).collect();
        let new_shell = self.add_shell(closed);
        self.add_shell_to_body(target_body, new_shell)?;

        let mut vertex_map: std::collections::HashMap<VertexId, VertexId> =
            std::collections::HashMap::new();
        let mut edge_map: std::collections::HashMap<EdgeId, EdgeId> =
            std::collections::HashMap::new();
        let mut he_map: std::collections::HashMap<HalfEdgeId, HalfEdgeId> =
            std::collections::HashMap::new();

        for face in faces {
            let surface = self.faces[face].surface;
            let reversed = self.faces[face].reversed;
            let new_face = self.add_face(surface, reversed);
            self.add_face_to_shell(new_shell, new_face)?;

            for loop_id in self.face_loops(face).to_vec() {
                let hes: Vec<HalfEdgeId> = self.loop_half_edges(loop_id).collect();
                let mut new_hes = Vec::with_capacity(hes.len());
                for he in hes {
                    let rec = self.half_edges[he].clone();
                    let edge = rec.edge;
                    let new_edge = match edge_map.get(&edge) {
                        Some(&e) => e,
                        None => {
                            let old = self.edges[edge].clone();
                            let ns = *vertex_map.entry(old.start).or_insert_with(|| {
                                let pos = self.vertices[old.start].position;
                                self.add_vertex(pos)
                            });
                            let ne = *vertex_map.entry(old.end).or_insert_with(|| {
                                let pos = self.vertices[old.end].position;
                                self.add_vertex(pos)
                            });
                            let e = self.add_edge(ns, ne, old.curve3, old.t_start, old.t_end)?;
                            edge_map.insert(edge, e);
                            e
                        }
                    };
                    let new_he = self.add_half_edge(new_edge, rec.direction)?;
                    self.half_edges[new_he].pcurve = rec.pcurve;
                    he_map.insert(he, new_he);
                    new_hes.push(new_he);
                }
                let new_loop = self.add_loop(&new_hes)?;
                self.add_loop_to_face(new_face, new_loop)?;
            }
        }

        // Re-establish twin links among the copied half-edges
        let pairs: Vec<(HalfEdgeId, HalfEdgeId)> = he_map
            .iter()
            .filter_map(|(&old, &new)| {
                let twin = self.half_edges[old].twin?;
                let new_twin = he_map.get(&twin)?;
                Some((new, *new_twin))
            })
            .collect();
        for (a, b) in pairs {
            if self.half_edges[a].twin.is_none() {
                self.set_twin(a, b)?;
            }
        }

        Ok(new_shell)
    }

    // =========================================================================
    // Handle checks
    // =========================================================================

    fn check_vertex(&self, id: VertexId) -> Result<(), TopoError> {
        if id.is_null() || !self.is_vertex_live(id) {
            return Err(TopoError::InvalidHandle);
        }
        Ok(())
    }

    fn check_edge(&self, id: EdgeId) -> Result<(), TopoError> {
        if id.is_null() || !self.is_edge_live(id) {
            return Err(TopoError::InvalidHandle);
        }
        Ok(())
    }

    fn check_half_edge(&self, id: HalfEdgeId) -> Result<(), TopoError> {
        if id.is_null()
            || !self
                .half_edges
                .get(id)
                .is_some_and(|r| !r.flags.is_deleted())
        {
            return Err(TopoError::InvalidHandle);
        }
        Ok(())
    }

    fn check_loop(&self, id: LoopId) -> Result<(), TopoError> {
        if id.is_null() || !self.loops.get(id).is_some_and(|r| !r.flags.is_deleted()) {
            return Err(TopoError::InvalidHandle);
        }
        Ok(())
    }

    fn check_face(&self, id: FaceId) -> Result<(), TopoError> {
        if id.is_null() || !self.is_face_live(id) {
            return Err(TopoError::InvalidHandle);
        }
        Ok(())
    }

    fn check_shell(&self, id: ShellId) -> Result<(), TopoError> {
        if id.is_null() || !self.shells.get(id).is_some_and(|r| !r.flags.is_deleted()) {
            return Err(TopoError::InvalidHandle);
        }
        Ok(())
    }

    fn check_body(&self, id: BodyId) -> Result<(), TopoError> {
        if id.is_null() || !self.bodies.get(id).is_some_and(|r| !r.flags.is_deleted()) {
            return Err(TopoError::InvalidHandle);
        }
        Ok(())
    }
}

/// Iterator over the half-edges of a loop in cycle order.
pub struct LoopHalfEdges<'a> {
    model: &'a TopologyModel,
    current: Option<HalfEdgeId>,
    remaining: usize,
}

impl Iterator for LoopHalfEdges<'_> {
    type Item = HalfEdgeId;

    fn next(&mut self) -> Option<HalfEdgeId> {
        if self.remaining == 0 {
            return None;
        }
        let current = self.current?;
        self.remaining -= 1;
        self.current = self.model.half_edges.get(current).and_then(|he| he.next);
        Some(current)
    }
}
