#![warn(missing_docs)]

//! Topology healing for the arbor kernel.
//!
//! Repairs a body after boolean operations: merges coincident vertices,
//! collapses short edges, removes degenerate faces, and reorients
//! closed shells whose signed volume came out negative. Passes iterate
//! to a fixed point (bounded by `max_iterations`) and finish with a
//! validation sweep; nothing is retried automatically on validation
//! failures.

use std::collections::{BTreeMap, BTreeSet};

use arbor_kernel_math::{NumericContext, Point3};
use arbor_kernel_topo::{BodyId, EdgeId, FaceId, HalfEdgeId, LoopId, TopologyModel, VertexId};

/// Healing parameters.
#[derive(Debug, Clone, Copy)]
pub struct HealOptions {
    /// Maximum pass iterations before giving up on a fixed point.
    pub max_iterations: usize,
    /// Vertices closer than this merge into one.
    pub vertex_merge_tolerance: f64,
    /// Edges shorter than this collapse.
    pub short_edge_threshold: f64,
    /// Faces with less area than this are removed.
    pub small_face_area_threshold: f64,
}

impl HealOptions {
    /// Defaults derived from a numeric context: merge at the length
    /// tolerance, collapse below 10×, remove faces below (10·tol)².
    pub fn from_context(ctx: &NumericContext) -> Self {
        let tol = ctx.tol.length;
        Self {
            max_iterations: 3,
            vertex_merge_tolerance: tol,
            short_edge_threshold: 10.0 * tol,
            small_face_area_threshold: (10.0 * tol) * (10.0 * tol),
        }
    }
}

/// Counts of one healing iteration (or the totals of all of them).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HealActions {
    /// Vertices merged away.
    pub merged_vertices: usize,
    /// Short edges collapsed.
    pub collapsed_edges: usize,
    /// Degenerate faces removed.
    pub removed_faces: usize,
    /// Shells flipped outward.
    pub reoriented_shells: usize,
}

impl HealActions {
    fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    fn add(&mut self, other: &HealActions) {
        self.merged_vertices += other.merged_vertices;
        self.collapsed_edges += other.collapsed_edges;
        self.removed_faces += other.removed_faces;
        self.reoriented_shells += other.reoriented_shells;
    }
}

/// Final validation result.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    /// Zero-length or self-referential edges, and loops under 3 edges.
    pub degenerate: usize,
    /// Edges of closed shells not used by exactly two half-edges.
    pub non_manifold_edges: usize,
    /// Faces with a pathological area/perimeter ratio.
    pub sliver_faces: usize,
    /// Human-readable issue descriptions.
    pub issues: Vec<String>,
}

impl ValidationReport {
    /// True when any check failed.
    pub fn has_issues(&self) -> bool {
        self.degenerate > 0 || self.non_manifold_edges > 0 || self.sliver_faces > 0
    }
}

/// Result of a healing run.
#[derive(Debug, Clone)]
pub struct HealReport {
    /// Iterations executed (a fixed point stops early).
    pub iterations: usize,
    /// Aggregate action counts.
    pub actions: HealActions,
    /// Per-iteration action counts.
    pub per_iteration: Vec<HealActions>,
    /// Final validation sweep.
    pub validation: ValidationReport,
    /// Set when validation still reports issues after healing.
    pub healing_introduced_errors: bool,
}

/// Heal a body in place.
pub fn heal_body(model: &mut TopologyModel, body: BodyId, options: &HealOptions) -> HealReport {
    let mut per_iteration = Vec::new();
    let mut totals = HealActions::default();

    for _ in 0..options.max_iterations.max(1) {
        let mut actions = HealActions::default();
        actions.merged_vertices = merge_coincident_vertices(model, body, options);
        actions.collapsed_edges = collapse_short_edges(model, body, options);
        actions.removed_faces = remove_small_faces(model, body, options);
        actions.reoriented_shells = reorient_shells(model, body);

        let done = actions.is_empty();
        totals.add(&actions);
        per_iteration.push(actions);
        if done {
            break;
        }
    }

    let validation = validate(model, body, options);
    if validation.has_issues() {
        log::warn!(
            "healing finished with issues: {} degenerate, {} non-manifold, {} slivers",
            validation.degenerate,
            validation.non_manifold_edges,
            validation.sliver_faces
        );
    }
    let healing_introduced_errors = validation.has_issues();

    HealReport {
        iterations: per_iteration.len(),
        actions: totals,
        per_iteration,
        validation,
        healing_introduced_errors,
    }
}

// =============================================================================
// Body traversal helpers
// =============================================================================

fn body_loops(model: &TopologyModel, body: BodyId) -> Vec<LoopId> {
    model
        .body_faces(body)
        .collect::<Vec<_>>()
        .into_iter()
        .flat_map(|f| model.face_loops(f).to_vec())
        .collect()
}

fn body_edges(model: &TopologyModel, body: BodyId) -> BTreeSet<EdgeId> {
    let mut edges = BTreeSet::new();
    for loop_id in body_loops(model, body) {
        for he in model.loop_half_edges(loop_id).collect::<Vec<_>>() {
            edges.insert(model.half_edges[he].edge);
        }
    }
    edges
}

fn body_vertices(model: &TopologyModel, body: BodyId) -> BTreeSet<VertexId> {
    let mut verts = BTreeSet::new();
    for edge in body_edges(model, body) {
        verts.insert(model.edges[edge].start);
        verts.insert(model.edges[edge].end);
    }
    verts
}

// =============================================================================
// Pass 1: vertex merging
// =============================================================================

fn merge_coincident_vertices(
    model: &mut TopologyModel,
    body: BodyId,
    options: &HealOptions,
) -> usize {
    let verts: Vec<VertexId> = body_vertices(model, body)
        .into_iter()
        .filter(|&v| model.is_vertex_live(v))
        .collect();
    let tol2 = options.vertex_merge_tolerance * options.vertex_merge_tolerance;

    // Union-find over pairwise-close vertices
    let mut parent: BTreeMap<VertexId, VertexId> = verts.iter().map(|&v| (v, v)).collect();
    fn find(parent: &mut BTreeMap<VertexId, VertexId>, v: VertexId) -> VertexId {
        let mut root = v;
        while parent[&root] != root {
            root = parent[&root];
        }
        let mut cur = v;
        while parent[&cur] != root {
            let next = parent[&cur];
            parent.insert(cur, root);
            cur = next;
        }
        root
    }
    for i in 0..verts.len() {
        for j in i + 1..verts.len() {
            let pi = model.vertices[verts[i]].position;
            let pj = model.vertices[verts[j]].position;
            if (pi - pj).norm_squared() <= tol2 {
                let ri = find(&mut parent, verts[i]);
                let rj = find(&mut parent, verts[j]);
                if ri != rj {
                    parent.insert(ri, rj);
                }
            }
        }
    }

    let mut groups: BTreeMap<VertexId, Vec<VertexId>> = BTreeMap::new();
    for &v in &verts {
        let root = find(&mut parent, v);
        groups.entry(root).or_default().push(v);
    }

    let mut merged = 0usize;
    let edges: Vec<EdgeId> = body_edges(model, body).into_iter().collect();
    for group in groups.values() {
        if group.len() < 2 {
            continue;
        }
        let survivor = group[0];
        let centroid = {
            let sum = group
                .iter()
                .fold(Point3::origin().coords, |acc, &v| {
                    acc + model.vertices[v].position.coords
                });
            Point3::from(sum / group.len() as f64)
        };
        model.vertices[survivor].position = centroid;
        for &victim in &group[1..] {
            for &edge in &edges {
                let rec = &mut model.edges[edge];
                if rec.start == victim {
                    rec.start = survivor;
                }
                if rec.end == victim {
                    rec.end = survivor;
                }
            }
            model.mark_vertex_deleted(victim);
            merged += 1;
        }
    }
    merged
}

// =============================================================================
// Pass 2: short edge collapse
// =============================================================================

fn collapse_short_edges(model: &mut TopologyModel, body: BodyId, options: &HealOptions) -> usize {
    let mut candidates: Vec<(EdgeId, f64)> = body_edges(model, body)
        .into_iter()
        .filter(|&e| model.is_edge_live(e))
        .filter_map(|e| {
            let len = model.edge_length(e).ok()?;
            (len < options.short_edge_threshold).then_some((e, len))
        })
        .collect();
    candidates.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap());

    let mut collapsed = 0usize;
    let all_edges: Vec<EdgeId> = body_edges(model, body).into_iter().collect();
    for (edge, _) in candidates {
        if !model.is_edge_live(edge) {
            continue;
        }
        let Ok(len) = model.edge_length(edge) else {
            continue;
        };
        if len >= options.short_edge_threshold {
            continue;
        }
        let start = model.edges[edge].start;
        let end = model.edges[edge].end;

        // Relocate the surviving vertex to the midpoint
        let mid = Point3::from(
            (model.vertices[start].position.coords + model.vertices[end].position.coords) * 0.5,
        );
        model.vertices[start].position = mid;

        // Unlink this edge's half-edges from their loops
        let hes: Vec<HalfEdgeId> = model
            .half_edges
            .iter()
            .filter(|(_, he)| !he.flags.is_deleted() && he.edge == edge)
            .map(|(id, _)| id)
            .collect();
        for he in hes {
            unlink_half_edge(model, he);
        }

        // Rewrite every reference to the dropped vertex
        if end != start {
            for &other in &all_edges {
                if other == edge || !model.is_edge_live(other) {
                    continue;
                }
                let rec = &mut model.edges[other];
                if rec.start == end {
                    rec.start = start;
                }
                if rec.end == end {
                    rec.end = start;
                }
            }
            model.mark_vertex_deleted(end);
        }
        model.mark_edge_deleted(edge);
        collapsed += 1;
    }
    collapsed
}

/// Remove a half-edge from its loop's cycle, fixing up the loop record
/// and the partner's twin link.
fn unlink_half_edge(model: &mut TopologyModel, he: HalfEdgeId) {
    let rec = model.half_edges[he].clone();
    if let (Some(prev), Some(next)) = (rec.prev, rec.next) {
        if prev != he {
            model.half_edges[prev].next = Some(next);
            model.half_edges[next].prev = Some(prev);
        }
        if let Some(loop_id) = rec.loop_id {
            let l = &mut model.loops[loop_id];
            if l.first_half_edge == he {
                l.first_half_edge = next;
            }
            l.half_edge_count = l.half_edge_count.saturating_sub(1);
        }
    }
    if let Some(twin) = rec.twin {
        model.half_edges[twin].twin = None;
    }
    model.mark_half_edge_deleted(he);
}

// =============================================================================
// Pass 3: small face removal
// =============================================================================

fn remove_small_faces(model: &mut TopologyModel, body: BodyId, options: &HealOptions) -> usize {
    let faces: Vec<FaceId> = model.body_faces(body).collect();
    let mut removed = 0usize;
    for face in faces {
        let area = model.face_newell_normal(face).norm();
        if area >= options.small_face_area_threshold {
            continue;
        }
        for loop_id in model.face_loops(face).to_vec() {
            for he in model.loop_half_edges(loop_id).collect::<Vec<_>>() {
                if let Some(twin) = model.half_edges[he].twin {
                    model.half_edges[twin].twin = None;
                }
                model.mark_half_edge_deleted(he);
            }
            model.mark_loop_deleted(loop_id);
        }
        if let Some(shell) = model.faces[face].shell {
            let faces_list = &mut model.shells[shell].faces;
            faces_list.retain(|&f| f != face);
        }
        model.mark_face_deleted(face);
        removed += 1;
    }
    removed
}

// =============================================================================
// Pass 4: shell reorientation
// =============================================================================

fn reorient_shells(model: &mut TopologyModel, body: BodyId) -> usize {
    let shells: Vec<_> = model.body_shells(body).collect();
    let mut reoriented = 0usize;
    for shell in shells {
        if !model.shells[shell].closed {
            continue;
        }
        if model.shell_signed_volume(shell) < 0.0 {
            for face in model.shell_faces(shell).collect::<Vec<_>>() {
                let _ = model.flip_face(face);
            }
            reoriented += 1;
        }
    }
    reoriented
}

// =============================================================================
// Validation
// =============================================================================

fn validate(model: &TopologyModel, body: BodyId, options: &HealOptions) -> ValidationReport {
    let mut report = ValidationReport::default();

    // check_degenerate: bad edges and undersized loops
    for edge in body_edges(model, body) {
        if !model.is_edge_live(edge) {
            continue;
        }
        let rec = &model.edges[edge];
        let len = model.edge_length(edge).unwrap_or(0.0);
        if rec.start == rec.end || len < options.vertex_merge_tolerance {
            report.degenerate += 1;
            report
                .issues
                .push(format!("degenerate edge of length {len:.9}"));
        }
    }
    for loop_id in body_loops(model, body) {
        let count = model.loop_half_edges(loop_id).count();
        if count < 3 {
            report.degenerate += 1;
            report.issues.push(format!("loop with {count} half-edges"));
        }
    }

    // check_manifold: closed shells need exactly two uses per edge
    for shell in model.body_shells(body).collect::<Vec<_>>() {
        if !model.shells[shell].closed {
            continue;
        }
        let mut uses: BTreeMap<EdgeId, usize> = BTreeMap::new();
        for face in model.shell_faces(shell).collect::<Vec<_>>() {
            for &loop_id in model.face_loops(face) {
                for he in model.loop_half_edges(loop_id) {
                    *uses.entry(model.half_edges[he].edge).or_default() += 1;
                }
            }
        }
        for (_, count) in uses {
            if count != 2 {
                report.non_manifold_edges += 1;
            }
        }
        if report.non_manifold_edges > 0 {
            report.issues.push(format!(
                "closed shell has {} non-manifold edges",
                report.non_manifold_edges
            ));
        }
    }

    // check_slivers: pathological area vs perimeter
    for face in model.body_faces(body).collect::<Vec<_>>() {
        let loops = model.face_loops(face);
        let Some(&outer) = loops.first() else {
            continue;
        };
        let pts = model.loop_positions(outer);
        if pts.len() < 3 {
            continue;
        }
        let area = model.face_newell_normal(face).norm();
        let perimeter: f64 = (0..pts.len())
            .map(|i| (pts[(i + 1) % pts.len()] - pts[i]).norm())
            .sum();
        if perimeter > 0.0 {
            let ratio = 4.0 * std::f64::consts::PI * area / (perimeter * perimeter);
            if ratio < 1e-4 && area > options.small_face_area_threshold {
                report.sliver_faces += 1;
                report
                    .issues
                    .push(format!("sliver face, isoperimetric ratio {ratio:.2e}"));
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_kernel_geom::GeometryPool;
    use arbor_kernel_math::Vec3;
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

    fn default_options() -> HealOptions {
        HealOptions::from_context(&NumericContext::DEFAULT)
    }

    #[test]
    fn test_heal_clean_box_no_actions() {
        let mut model = TopologyModel::new();
        let mut geom = GeometryPool::new();
        let body = make_box(&mut model, &mut geom, 10.0);
        let report = heal_body(&mut model, body, &default_options());
        assert!(report.actions.is_empty(), "clean box needs no healing");
        assert!(!report.healing_introduced_errors);
        assert!(!report.validation.has_issues());
    }

    #[test]
    fn test_heal_idempotent() {
        let mut model = TopologyModel::new();
        let mut geom = GeometryPool::new();
        let body = make_box(&mut model, &mut geom, 10.0);
        // Nudge one vertex within merge tolerance of another to force work
        let verts: Vec<VertexId> = body_vertices(&model, body).into_iter().collect();
        let target = model.vertices[verts[1]].position;
        model.vertices[verts[0]].position = target + Vec3::new(1e-8, 0.0, 0.0);

        let first = heal_body(&mut model, body, &default_options());
        assert!(first.actions.merged_vertices > 0);
        let second = heal_body(&mut model, body, &default_options());
        assert!(
            second.actions.is_empty(),
            "second heal must report zero actions, got {:?}",
            second.actions
        );
    }

    #[test]
    fn test_merge_rewrites_edges() {
        let mut model = TopologyModel::new();
        let mut geom = GeometryPool::new();
        let body = make_box(&mut model, &mut geom, 10.0);

        let verts: Vec<VertexId> = body_vertices(&model, body).into_iter().collect();
        let survivor_pos = model.vertices[verts[0]].position;
        let victim = verts[1];
        model.vertices[victim].position = survivor_pos + Vec3::new(2e-7, 0.0, 0.0);

        let merged = merge_coincident_vertices(&mut model, body, &default_options());
        assert_eq!(merged, 1);
        assert!(!model.is_vertex_live(victim));
        // No live edge references the deleted vertex anymore
        for edge in body_edges(&model, body) {
            if model.is_edge_live(edge) {
                assert_ne!(model.edges[edge].start, victim);
                assert_ne!(model.edges[edge].end, victim);
            }
        }
    }

    #[test]
    fn test_collapse_short_edge() {
        // Pentagon with one edge far below the collapse threshold
        let mut model = TopologyModel::new();
        let mut geom = GeometryPool::new();
        let pts = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(5.0, 0.0, 0.0),
            Point3::new(5.0 + 5e-6, 2e-6, 0.0),
            Point3::new(5.0, 5.0, 0.0),
            Point3::new(0.0, 5.0, 0.0),
        ];
        let verts: Vec<VertexId> = pts.iter().map(|p| model.add_vertex(*p)).collect();
        let mut hes = Vec::new();
        for i in 0..verts.len() {
            let e = model
                .add_edge(verts[i], verts[(i + 1) % verts.len()], None, 0.0, 1.0)
                .unwrap();
            hes.push(
                model
                    .add_half_edge(e, arbor_kernel_topo::Direction::Forward)
                    .unwrap(),
            );
        }
        let loop_id = model.add_loop(&hes).unwrap();
        let surf = geom.add_surface(Box::new(arbor_kernel_geom::Plane::xy()));
        let face = model.add_face(surf, false);
        model.add_loop_to_face(face, loop_id).unwrap();
        let shell = model.add_shell(false);
        let body = model.add_body();
        model.add_shell_to_body(body, shell).unwrap();
        model.add_face_to_shell(shell, face).unwrap();

        let collapsed = collapse_short_edges(&mut model, body, &default_options());
        assert_eq!(collapsed, 1);
        // Loop shrank to four half-edges but stays a closed cycle
        let remaining: Vec<_> = model.loop_half_edges(loop_id).collect();
        assert_eq!(remaining.len(), 4);
        for i in 0..remaining.len() {
            let next = remaining[(i + 1) % remaining.len()];
            assert_eq!(
                model.half_edge_end(remaining[i]).unwrap(),
                model.half_edge_start(next).unwrap()
            );
        }
    }

    #[test]
    fn test_reorient_flipped_box() {
        let mut model = TopologyModel::new();
        let mut geom = GeometryPool::new();
        let body = make_box(&mut model, &mut geom, 10.0);
        let shell = model.body_shells(body).next().unwrap();

        // Flip every face inward
        for face in model.shell_faces(shell).collect::<Vec<_>>() {
            model.flip_face(face).unwrap();
        }
        assert!(model.shell_signed_volume(shell) < 0.0);

        let report = heal_body(&mut model, body, &default_options());
        assert_eq!(report.actions.reoriented_shells, 1);
        assert!(model.shell_signed_volume(shell) > 0.0);

        // And a second pass does nothing
        let second = heal_body(&mut model, body, &default_options());
        assert_eq!(second.actions.reoriented_shells, 0);
    }

    #[test]
    fn test_validation_reports_open_loop() {
        let mut model = TopologyModel::new();
        let mut geom = GeometryPool::new();
        let body = make_box(&mut model, &mut geom, 10.0);

        // Damage the model: delete one face's half-edges so the shell
        // stops being manifold
        let face = model.body_faces(body).next().unwrap();
        for loop_id in model.face_loops(face).to_vec() {
            for he in model.loop_half_edges(loop_id).collect::<Vec<_>>() {
                if let Some(twin) = model.half_edges[he].twin {
                    model.half_edges[twin].twin = None;
                }
                model.mark_half_edge_deleted(he);
            }
            model.mark_loop_deleted(loop_id);
        }
        if let Some(shell) = model.faces[face].shell {
            model.shells[shell].faces.retain(|&f| f != face);
        }
        model.mark_face_deleted(face);

        let report = heal_body(&mut model, body, &default_options());
        assert!(report.validation.non_manifold_edges > 0);
        assert!(report.healing_introduced_errors);
    }
}
