#![warn(missing_docs)]

//! High-level parametric CAD kernel facade for arbor.
//!
//! [`ModelKernel`] is the single owner of the topology model, the
//! geometry pools, the sketches, and the naming strategy. All mutating
//! operations (sketch edits and solves, sweeps, booleans, healing)
//! run to completion on the owning kernel before the next one begins.
//! Lengths are millimetres throughout; angles cross the boundary in
//! degrees and are converted to radians here.
//!
//! # Example
//!
//! ```
//! use arbor_kernel::{ExtrudeFeature, FeatureOp, MergeScope, ModelKernel};
//! use arbor_kernel_sketch::SketchPlane;
//!
//! let mut kernel = ModelKernel::new();
//! let sketch = kernel.create_sketch(SketchPlane::xy());
//! kernel.sketch_mut(sketch).unwrap().add_rectangle(0.0, 0.0, 10.0, 10.0);
//! let result = kernel
//!     .extrude_feature(&ExtrudeFeature {
//!         sketch,
//!         distance: 10.0,
//!         direction: None,
//!         symmetric: false,
//!         op: FeatureOp::Add,
//!         merge: MergeScope::New,
//!         target: None,
//!     })
//!     .unwrap();
//! let mesh = kernel.tessellate(result.body).unwrap();
//! assert_eq!(mesh.num_triangles(), 12);
//! ```

use std::collections::{BTreeMap, HashMap};

pub use arbor_kernel_booleans;
pub use arbor_kernel_constraints;
pub use arbor_kernel_geom;
pub use arbor_kernel_heal;
pub use arbor_kernel_math;
pub use arbor_kernel_naming;
pub use arbor_kernel_sketch;
pub use arbor_kernel_sweep;
pub use arbor_kernel_tessellate;
pub use arbor_kernel_topo;

use arbor_kernel_booleans::{boolean_op, bbox, BooleanError, BooleanOp, BooleanOutput};
use arbor_kernel_constraints::{
    solve_sketch_driven, AttachmentTarget, SolveOptions, SolveOutcome,
};
use arbor_kernel_geom::GeometryPool;
use arbor_kernel_heal::{heal_body, HealOptions, HealReport};
use arbor_kernel_math::{NumericContext, Point2, Point3, Vec3};
use arbor_kernel_naming::{
    face_fingerprints, EvolutionUpdate, NamingError, NamingStrategy, PersistentRefSet,
    ResolveResult, SubshapeRef, SweepKind,
};
use arbor_kernel_sketch::{
    profile_from_sketch, Profile, Sketch, SketchEntityId, SketchError, SketchPlane, SketchPointId,
};
use arbor_kernel_sweep::{extrude, revolve, ExtrudeParams, RevolveParams, SweepError};
use arbor_kernel_tessellate::{tessellate_body, Mesh};
use arbor_kernel_topo::{BodyId, FaceId, TopoError, TopologyModel};
use serde::Serialize;
use thiserror::Error;

/// Identifier of a sketch owned by the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SketchId(pub u32);

/// Errors surfaced at the kernel boundary.
#[derive(Debug, Error)]
pub enum KernelError {
    /// Unknown sketch id.
    #[error("unknown sketch {0:?}")]
    UnknownSketch(SketchId),

    /// The referenced body does not exist or was consumed.
    #[error("unknown or deleted body")]
    UnknownBody,

    /// A cut feature needs a target body and none was supplied.
    #[error("cut operation requires a target body")]
    NoTargetBody,

    /// Sketch-level failure.
    #[error(transparent)]
    Sketch(#[from] SketchError),

    /// Sweep failure.
    #[error(transparent)]
    Sweep(#[from] SweepError),

    /// Boolean failure.
    #[error(transparent)]
    Boolean(#[from] BooleanError),

    /// Topology failure.
    #[error(transparent)]
    Topo(#[from] TopoError),

    /// Naming failure.
    #[error(transparent)]
    Naming(#[from] NamingError),
}

/// Wire-form result wrapper: no panics or exceptions cross the boundary.
#[derive(Debug, Clone, Serialize)]
pub struct BoundaryResult<T> {
    /// Whether the operation succeeded.
    pub success: bool,
    /// Failure reason when `success` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Non-fatal issues.
    pub warnings: Vec<String>,
    /// The payload when `success` is true.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<T>,
}

impl<T> BoundaryResult<T> {
    /// Successful result with warnings.
    pub fn ok(value: T, warnings: Vec<String>) -> Self {
        Self {
            success: true,
            error: None,
            warnings,
            value: Some(value),
        }
    }

    /// Failed result.
    pub fn err(error: impl std::fmt::Display) -> Self {
        Self {
            success: false,
            error: Some(error.to_string()),
            warnings: Vec::new(),
            value: None,
        }
    }
}

impl<T> From<Result<T, KernelError>> for BoundaryResult<T> {
    fn from(result: Result<T, KernelError>) -> Self {
        match result {
            Ok(value) => Self::ok(value, Vec::new()),
            Err(e) => Self::err(e),
        }
    }
}

/// Whether a sweep adds or removes material.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureOp {
    /// Create material (optionally merged into existing bodies).
    Add,
    /// Remove material from a target body.
    Cut,
}

/// Which bodies an additive sweep merges with.
#[derive(Debug, Clone, PartialEq)]
pub enum MergeScope {
    /// Union with every body whose bounds overlap the new material.
    Auto,
    /// Keep the new material as a disjoint body.
    New,
    /// Union only with the listed bodies.
    Specific(Vec<BodyId>),
}

/// Parameters of an extrude feature.
#[derive(Debug, Clone)]
pub struct ExtrudeFeature {
    /// Source sketch.
    pub sketch: SketchId,
    /// Distance in mm (may be negative).
    pub distance: f64,
    /// Direction override; defaults to the sketch plane normal.
    pub direction: Option<Vec3>,
    /// Sweep symmetric about the sketch plane.
    pub symmetric: bool,
    /// Add or cut.
    pub op: FeatureOp,
    /// Merge scope for additive sweeps.
    pub merge: MergeScope,
    /// Target body for cuts.
    pub target: Option<BodyId>,
}

/// Parameters of a revolve feature.
#[derive(Debug, Clone)]
pub struct RevolveFeature {
    /// Source sketch.
    pub sketch: SketchId,
    /// A point on the revolution axis.
    pub axis_origin: Point3,
    /// Axis direction.
    pub axis_dir: Vec3,
    /// Sweep angle in degrees, in `(0, 360]`.
    pub angle_deg: f64,
    /// Add or cut.
    pub op: FeatureOp,
    /// Merge scope for additive sweeps.
    pub merge: MergeScope,
    /// Target body for cuts.
    pub target: Option<BodyId>,
}

/// Result of a feature execution.
#[derive(Debug, Clone)]
pub struct FeatureResult {
    /// The allocated feature id.
    pub feature_id: String,
    /// The resulting body.
    pub body: BodyId,
    /// Persistent references for the produced subshapes.
    pub refs: Vec<(SubshapeRef, PersistentRefSet)>,
    /// Non-fatal issues from booleans and merging.
    pub warnings: Vec<String>,
}

/// Result of a sketch solve, with attachment resolution notes.
#[derive(Debug, Clone)]
pub struct SketchSolveReport {
    /// Solver outcome.
    pub outcome: SolveOutcome,
    /// Unresolvable external attachments and similar notes.
    pub warnings: Vec<String>,
}

/// The single-owner kernel state.
#[derive(Debug, Default)]
pub struct ModelKernel {
    /// The topology tables.
    pub model: TopologyModel,
    /// The geometry pools.
    pub geom: GeometryPool,
    /// Tolerances threaded through all geometric predicates.
    pub ctx: NumericContext,
    sketches: BTreeMap<SketchId, Sketch>,
    next_sketch: u32,
    naming: NamingStrategy,
}

impl ModelKernel {
    /// Create an empty kernel with default tolerances.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a kernel with a custom numeric context.
    pub fn with_context(ctx: NumericContext) -> Self {
        Self {
            ctx,
            ..Self::default()
        }
    }

    // =========================================================================
    // Sketches
    // =========================================================================

    /// Create a sketch on a datum plane.
    pub fn create_sketch(&mut self, plane: SketchPlane) -> SketchId {
        let id = SketchId(self.next_sketch);
        self.next_sketch += 1;
        self.sketches.insert(id, Sketch::new(plane));
        id
    }

    /// Immutable sketch access.
    pub fn sketch(&self, id: SketchId) -> Result<&Sketch, KernelError> {
        self.sketches.get(&id).ok_or(KernelError::UnknownSketch(id))
    }

    /// Mutable sketch access.
    pub fn sketch_mut(&mut self, id: SketchId) -> Result<&mut Sketch, KernelError> {
        self.sketches
            .get_mut(&id)
            .ok_or(KernelError::UnknownSketch(id))
    }

    /// Solve a sketch's constraints with default options.
    pub fn solve_sketch(&mut self, id: SketchId) -> Result<SketchSolveReport, KernelError> {
        self.solve_sketch_driven(id, &BTreeMap::new())
    }

    /// Solve with driven (dragged) points.
    ///
    /// External attachments are resolved here: each attached point's
    /// persistent reference is looked up and projected into the sketch
    /// plane; unresolvable attachments are reported as warnings and
    /// skipped.
    pub fn solve_sketch_driven(
        &mut self,
        id: SketchId,
        driven: &BTreeMap<SketchPointId, Point2>,
    ) -> Result<SketchSolveReport, KernelError> {
        let mut warnings = Vec::new();
        let attachments = self.resolve_attachments(id, &mut warnings)?;
        let sketch = self
            .sketches
            .get_mut(&id)
            .ok_or(KernelError::UnknownSketch(id))?;
        let outcome = solve_sketch_driven(sketch, &SolveOptions::default(), driven, &attachments);
        Ok(SketchSolveReport { outcome, warnings })
    }

    fn resolve_attachments(
        &self,
        id: SketchId,
        warnings: &mut Vec<String>,
    ) -> Result<Vec<(SketchPointId, AttachmentTarget)>, KernelError> {
        let sketch = self.sketch(id)?;
        let mut attachments = Vec::new();
        for (&point, rec) in &sketch.points {
            let Some(reference) = &rec.external_ref else {
                continue;
            };
            match self.naming.lookup(reference) {
                Some(SubshapeRef::Vertex { vertex, .. })
                    if self.model.is_vertex_live(vertex) =>
                {
                    let pos = self.model.vertices[vertex].position;
                    attachments
                        .push((point, AttachmentTarget::Vertex(sketch.plane.to_2d(pos))));
                }
                Some(SubshapeRef::Edge { edge, .. }) if self.model.is_edge_live(edge) => {
                    let rec = &self.model.edges[edge];
                    let a = self.model.vertices[rec.start].position;
                    let b = self.model.vertices[rec.end].position;
                    attachments.push((
                        point,
                        AttachmentTarget::Edge {
                            a: sketch.plane.to_2d(a),
                            b: sketch.plane.to_2d(b),
                        },
                    ));
                }
                _ => warnings.push(format!(
                    "external attachment of point {point:?} did not resolve"
                )),
            }
        }
        Ok(attachments)
    }

    /// Extract a profile from a sketch.
    pub fn profile_from_sketch(
        &self,
        id: SketchId,
        selection: Option<&[SketchEntityId]>,
    ) -> Result<Profile, KernelError> {
        Ok(profile_from_sketch(self.sketch(id)?, selection)?)
    }

    // =========================================================================
    // Features
    // =========================================================================

    /// Execute an extrude feature.
    pub fn extrude_feature(
        &mut self,
        feature: &ExtrudeFeature,
    ) -> Result<FeatureResult, KernelError> {
        let profile = self.profile_from_sketch(feature.sketch, None)?;
        let params = ExtrudeParams {
            distance: feature.distance,
            direction: feature.direction,
            symmetric: feature.symmetric,
            arc_segments: 32,
        };
        let output = extrude(&mut self.model, &mut self.geom, &profile, &params)?;

        let direction = feature
            .direction
            .map(|d| d.normalize())
            .unwrap_or_else(|| *profile.plane.normal.as_ref())
            * feature.distance.signum();
        let feature_id = self.naming.next_feature_id();
        let mesh = tessellate_body(&self.model, &self.geom, output.body);
        let refs = self.naming.generate_sweep_refs(
            output.body,
            &output,
            &mesh,
            &feature_id,
            SweepKind::Extrude { direction },
        )?;

        self.apply_feature_op(
            feature_id,
            output.body,
            refs,
            feature.op,
            &feature.merge,
            feature.target,
        )
    }

    /// Execute a revolve feature. The angle crosses the boundary in
    /// degrees.
    pub fn revolve_feature(
        &mut self,
        feature: &RevolveFeature,
    ) -> Result<FeatureResult, KernelError> {
        let profile = self.profile_from_sketch(feature.sketch, None)?;
        let params = RevolveParams {
            axis_origin: feature.axis_origin,
            axis_dir: feature.axis_dir,
            angle: feature.angle_deg.to_radians(),
            arc_segments: 32,
        };
        let output = revolve(&mut self.model, &mut self.geom, &profile, &params)?;

        let feature_id = self.naming.next_feature_id();
        let mesh = tessellate_body(&self.model, &self.geom, output.body);
        let refs = self.naming.generate_sweep_refs(
            output.body,
            &output,
            &mesh,
            &feature_id,
            SweepKind::Revolve,
        )?;

        self.apply_feature_op(
            feature_id,
            output.body,
            refs,
            feature.op,
            &feature.merge,
            feature.target,
        )
    }

    fn apply_feature_op(
        &mut self,
        feature_id: String,
        swept: BodyId,
        refs: Vec<(SubshapeRef, PersistentRefSet)>,
        op: FeatureOp,
        merge: &MergeScope,
        target: Option<BodyId>,
    ) -> Result<FeatureResult, KernelError> {
        let mut warnings = Vec::new();
        let body = match op {
            FeatureOp::Cut => {
                let target = target.ok_or(KernelError::NoTargetBody)?;
                self.check_body(target)?;
                self.run_boolean(target, swept, BooleanOp::Subtract, &mut warnings)?
            }
            FeatureOp::Add => match merge {
                MergeScope::New => swept,
                MergeScope::Auto => {
                    let mut current = swept;
                    loop {
                        let current_box = bbox::body_aabb(&self.model, current);
                        let partner = self
                            .model
                            .live_bodies()
                            .filter(|&b| b != current)
                            .find(|&b| current_box.overlaps(&bbox::body_aabb(&self.model, b)));
                        match partner {
                            Some(other) => {
                                current =
                                    self.run_boolean(current, other, BooleanOp::Union, &mut warnings)?;
                            }
                            None => break current,
                        }
                    }
                }
                MergeScope::Specific(bodies) => {
                    let mut current = swept;
                    for &other in bodies {
                        self.check_body(other)?;
                        current = self.run_boolean(current, other, BooleanOp::Union, &mut warnings)?;
                    }
                    current
                }
            },
        };

        // Refs may have evolved through the booleans above
        let refs = refs
            .into_iter()
            .map(|(subshape, set)| {
                let current = set
                    .preferred
                    .as_deref()
                    .and_then(|r| self.naming.lookup(r))
                    .unwrap_or(subshape);
                (current, set)
            })
            .collect();

        Ok(FeatureResult {
            feature_id,
            body,
            refs,
            warnings,
        })
    }

    // =========================================================================
    // Booleans
    // =========================================================================

    /// Boolean two bodies, consuming the inputs (unless the result *is*
    /// an input, as in a disjoint subtract) and updating the naming
    /// strategy's evolution maps.
    pub fn boolean(
        &mut self,
        a: BodyId,
        b: BodyId,
        op: BooleanOp,
    ) -> Result<BooleanOutput, KernelError> {
        self.check_body(a)?;
        self.check_body(b)?;
        let mut warnings = Vec::new();
        let output = self.run_boolean_with_output(a, b, op, &mut warnings)?;
        Ok(BooleanOutput { warnings, ..output })
    }

    fn run_boolean(
        &mut self,
        a: BodyId,
        b: BodyId,
        op: BooleanOp,
        warnings: &mut Vec<String>,
    ) -> Result<BodyId, KernelError> {
        Ok(self.run_boolean_with_output(a, b, op, warnings)?.body)
    }

    fn run_boolean_with_output(
        &mut self,
        a: BodyId,
        b: BodyId,
        op: BooleanOp,
        warnings: &mut Vec<String>,
    ) -> Result<BooleanOutput, KernelError> {
        let output = boolean_op(&mut self.model, &mut self.geom, &self.ctx, a, b, op)?;
        log::debug!(
            "boolean {:?}: {} evolution entries, {} warnings",
            op,
            output.evolution.len(),
            output.warnings.len()
        );
        warnings.extend(output.warnings.iter().cloned());

        // Evolution first, then consume the inputs
        let updates: Vec<EvolutionUpdate> = output
            .evolution
            .iter()
            .map(|entry| EvolutionUpdate {
                old: SubshapeRef::Face {
                    body: if entry.source_body == 0 { a } else { b },
                    face: entry.old_face,
                },
                new: entry
                    .new_faces
                    .iter()
                    .map(|&face| SubshapeRef::Face {
                        body: output.body,
                        face,
                    })
                    .collect(),
            })
            .collect();
        self.naming.apply_evolution(&updates);

        if output.body != a {
            self.model.mark_body_deleted(a);
        }
        if output.body != b {
            self.model.mark_body_deleted(b);
        }
        Ok(output)
    }

    // =========================================================================
    // Healing, tessellation, resolution
    // =========================================================================

    /// Heal a body with defaults derived from the kernel context.
    pub fn heal(&mut self, body: BodyId) -> Result<HealReport, KernelError> {
        self.check_body(body)?;
        let options = HealOptions::from_context(&self.ctx);
        Ok(heal_body(&mut self.model, body, &options))
    }

    /// Tessellate a body into an indexed mesh.
    pub fn tessellate(&self, body: BodyId) -> Result<Mesh, KernelError> {
        self.check_body(body)?;
        Ok(tessellate_body(&self.model, &self.geom, body))
    }

    /// Resolve a persistent reference against the current model.
    pub fn resolve_reference(&self, reference: &str) -> ResolveResult {
        // Fingerprint index over every live body's faces
        let mut face_index: HashMap<FaceId, (BodyId, arbor_kernel_naming::FaceFingerprint)> =
            HashMap::new();
        for body in self.model.live_bodies().collect::<Vec<_>>() {
            let mesh = tessellate_body(&self.model, &self.geom, body);
            for (face, fp) in face_fingerprints(&mesh) {
                face_index.insert(face, (body, fp));
            }
        }
        self.naming.resolve(reference, &face_index)
    }

    /// The naming strategy (for tests and direct reference bookkeeping).
    pub fn naming(&self) -> &NamingStrategy {
        &self.naming
    }

    /// Live bodies in the model.
    pub fn bodies(&self) -> Vec<BodyId> {
        self.model.live_bodies().collect()
    }

    fn check_body(&self, body: BodyId) -> Result<(), KernelError> {
        if self
            .model
            .bodies
            .get(body)
            .map_or(true, |b| b.flags.is_deleted())
        {
            return Err(KernelError::UnknownBody);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn box_feature(kernel: &mut ModelKernel, x0: f64, y0: f64, size: f64) -> FeatureResult {
        let sketch = kernel.create_sketch(SketchPlane::xy());
        kernel
            .sketch_mut(sketch)
            .unwrap()
            .add_rectangle(x0, y0, x0 + size, y0 + size);
        kernel
            .extrude_feature(&ExtrudeFeature {
                sketch,
                distance: size,
                direction: None,
                symmetric: false,
                op: FeatureOp::Add,
                merge: MergeScope::New,
                target: None,
            })
            .unwrap()
    }

    #[test]
    fn test_extrude_feature_produces_refs() {
        let mut kernel = ModelKernel::new();
        let result = box_feature(&mut kernel, 0.0, 0.0, 10.0);
        assert_eq!(result.feature_id, "feature-0");
        // 6 face refs + 12 edge refs
        assert_eq!(result.refs.len(), 18);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_cut_requires_target() {
        let mut kernel = ModelKernel::new();
        let sketch = kernel.create_sketch(SketchPlane::xy());
        kernel
            .sketch_mut(sketch)
            .unwrap()
            .add_rectangle(0.0, 0.0, 4.0, 4.0);
        let result = kernel.extrude_feature(&ExtrudeFeature {
            sketch,
            distance: 4.0,
            direction: None,
            symmetric: false,
            op: FeatureOp::Cut,
            merge: MergeScope::New,
            target: None,
        });
        assert!(matches!(result, Err(KernelError::NoTargetBody)));
    }

    #[test]
    fn test_cut_feature_subtracts() {
        let mut kernel = ModelKernel::new();
        let base = box_feature(&mut kernel, 0.0, 0.0, 10.0);

        let sketch = kernel.create_sketch(SketchPlane::xy());
        kernel
            .sketch_mut(sketch)
            .unwrap()
            .add_rectangle(2.0, 2.0, 6.0, 6.0);
        let cut = kernel
            .extrude_feature(&ExtrudeFeature {
                sketch,
                distance: 30.0,
                direction: None,
                symmetric: true,
                op: FeatureOp::Cut,
                merge: MergeScope::New,
                target: Some(base.body),
            })
            .unwrap();

        // Base body consumed, result is new
        assert_ne!(cut.body, base.body);
        assert_eq!(kernel.bodies(), vec![cut.body]);
        let mesh = kernel.tessellate(cut.body).unwrap();
        let volume = mesh.signed_volume();
        assert!(
            (volume - (1000.0 - 160.0)).abs() < 2.0,
            "cut volume {volume}, expected ≈ 840"
        );
    }

    #[test]
    fn test_merge_auto_unions_overlapping() {
        let mut kernel = ModelKernel::new();
        let _first = box_feature(&mut kernel, 0.0, 0.0, 10.0);

        let sketch = kernel.create_sketch(SketchPlane::xy());
        kernel
            .sketch_mut(sketch)
            .unwrap()
            .add_rectangle(5.0, 5.0, 15.0, 15.0);
        let merged = kernel
            .extrude_feature(&ExtrudeFeature {
                sketch,
                distance: 10.0,
                direction: None,
                symmetric: false,
                op: FeatureOp::Add,
                merge: MergeScope::Auto,
                target: None,
            })
            .unwrap();

        assert_eq!(kernel.bodies(), vec![merged.body]);
        let mesh = kernel.tessellate(merged.body).unwrap();
        let volume = mesh.signed_volume();
        // Two 1000 boxes minus 5×5×10 overlap
        assert!(
            (volume - 1750.0).abs() < 10.0,
            "merged volume {volume}, expected ≈ 1750"
        );
    }

    #[test]
    fn test_merge_new_keeps_disjoint_bodies() {
        let mut kernel = ModelKernel::new();
        let first = box_feature(&mut kernel, 0.0, 0.0, 10.0);
        let second = box_feature(&mut kernel, 100.0, 0.0, 10.0);
        assert_ne!(first.body, second.body);
        assert_eq!(kernel.bodies().len(), 2);
    }

    #[test]
    fn test_boolean_updates_reference_resolution() {
        let mut kernel = ModelKernel::new();
        let base = box_feature(&mut kernel, 0.0, 0.0, 10.0);

        let top_ref = base
            .refs
            .iter()
            .filter_map(|(s, set)| match s {
                SubshapeRef::Face { .. } => set.preferred.clone(),
                _ => None,
            })
            .find(|r| {
                let rec = arbor_kernel_naming::decode_persistent_ref(r).unwrap();
                rec.local_selector.kind == "extrude.topCap"
            })
            .expect("top cap reference");

        // Cut a corner notch; the top face splits or shrinks
        let sketch = kernel.create_sketch(SketchPlane::xy());
        kernel
            .sketch_mut(sketch)
            .unwrap()
            .add_rectangle(-1.0, -1.0, 4.0, 4.0);
        let cut = kernel
            .extrude_feature(&ExtrudeFeature {
                sketch,
                distance: 30.0,
                direction: None,
                symmetric: true,
                op: FeatureOp::Cut,
                merge: MergeScope::New,
                target: Some(base.body),
            })
            .unwrap();

        match kernel.resolve_reference(&top_ref) {
            ResolveResult::Found(SubshapeRef::Face { body, face }) => {
                assert_eq!(body, cut.body);
                assert!(kernel.model.is_face_live(face));
            }
            other => panic!("expected the top cap to resolve after the cut, got {other:?}"),
        }
    }

    #[test]
    fn test_revolve_feature_degrees() {
        let mut kernel = ModelKernel::new();
        let sketch = kernel.create_sketch(SketchPlane::xy());
        kernel
            .sketch_mut(sketch)
            .unwrap()
            .add_rectangle(2.0, 0.0, 4.0, 3.0);
        let result = kernel
            .revolve_feature(&RevolveFeature {
                sketch,
                axis_origin: Point3::origin(),
                axis_dir: Vec3::y(),
                angle_deg: 360.0,
                op: FeatureOp::Add,
                merge: MergeScope::New,
                target: None,
            })
            .unwrap();
        let mesh = kernel.tessellate(result.body).unwrap();
        let volume = mesh.signed_volume().abs();
        let expected = std::f64::consts::PI * 12.0 * 3.0;
        assert!(
            (volume - expected).abs() < expected * 0.02,
            "revolve volume {volume}, expected ≈ {expected}"
        );
    }

    #[test]
    fn test_boundary_result_wire_form() {
        let ok: BoundaryResult<u32> = BoundaryResult::ok(7, vec!["note".to_string()]);
        let json = serde_json::to_value(&ok).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["value"], 7);
        assert_eq!(json["warnings"][0], "note");
        assert!(json.get("error").is_none());

        let err: BoundaryResult<u32> = BoundaryResult::err("boom");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "boom");
        assert!(json.get("value").is_none());
    }

    #[test]
    fn test_heal_after_boolean() {
        let mut kernel = ModelKernel::new();
        let base = box_feature(&mut kernel, 0.0, 0.0, 10.0);
        let sketch = kernel.create_sketch(SketchPlane::xy());
        kernel
            .sketch_mut(sketch)
            .unwrap()
            .add_rectangle(4.0, 4.0, 6.0, 6.0);
        let cut = kernel
            .extrude_feature(&ExtrudeFeature {
                sketch,
                distance: 30.0,
                direction: None,
                symmetric: true,
                op: FeatureOp::Cut,
                merge: MergeScope::New,
                target: Some(base.body),
            })
            .unwrap();

        let first = kernel.heal(cut.body).unwrap();
        let second = kernel.heal(cut.body).unwrap();
        assert_eq!(
            second.actions,
            arbor_kernel_heal::HealActions::default(),
            "healing must be idempotent, first pass was {:?}",
            first.actions
        );
    }
}
