#![warn(missing_docs)]

//! Persistent naming for the arbor kernel.
//!
//! Assigns merge-safe identifiers to faces and edges produced by feature
//! execution so that downstream references ("the top face of this
//! extrude") survive rebuilds and boolean operations. References are
//! canonical-JSON records in the `stref:v1:` wire form; a
//! [`NamingStrategy`] keeps forward and reverse maps between encoded
//! references and live subshapes, updated from boolean evolution
//! mappings, with a fingerprint nearest-match fallback for resolution.

use std::collections::HashMap;

use arbor_kernel_math::Vec3;
use arbor_kernel_sweep::{SweepOutput, SweptFaceRole};
use arbor_kernel_tessellate::Mesh;
use arbor_kernel_topo::{BodyId, EdgeId, FaceId, VertexId};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

mod canonical;
mod fingerprint;
mod loopid;

pub use canonical::{canonical_json, decode_persistent_ref, encode_persistent_ref, STREF_PREFIX};
pub use fingerprint::{
    edge_fingerprints, face_fingerprints, fingerprint_distance, EdgeFingerprint, FaceFingerprint,
};
pub use loopid::compute_loop_id;

/// Errors from naming operations.
#[derive(Debug, Clone, Error)]
pub enum NamingError {
    /// Record serialization failed.
    #[error("failed to encode persistent reference: {0}")]
    Encode(String),

    /// The wire string is not a valid reference.
    #[error("failed to decode persistent reference: {0}")]
    Decode(String),
}

/// The subshape kind a reference expects to resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubshapeType {
    /// A face.
    Face,
    /// An edge.
    Edge,
    /// A vertex.
    Vertex,
}

/// The feature-local selector of a persistent reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalSelector {
    /// Selector kind, e.g. `extrude.topCap`.
    pub kind: String,
    /// Kind-specific payload.
    pub data: serde_json::Value,
}

/// Serialized fingerprint carried inside a reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FingerprintRecord {
    /// Centroid (faces) or midpoint (edges).
    pub centroid: [f64; 3],
    /// Area (faces) or length (edges).
    pub size: f64,
    /// Face normal, when meaningful.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normal: Option<[f64; 3]>,
}

/// The versioned record behind a `stref:v1:` string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistentRecord {
    /// Format version; always 1.
    pub v: u32,
    /// Expected subshape kind.
    #[serde(rename = "expectedType")]
    pub expected_type: SubshapeType,
    /// Feature that created the subshape.
    #[serde(rename = "originFeatureId")]
    pub origin_feature_id: String,
    /// Feature-local selector.
    #[serde(rename = "localSelector")]
    pub local_selector: LocalSelector,
    /// Geometric fallback descriptor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<FingerprintRecord>,
}

/// Multiple selectors pointing at the same subshape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersistentRefSet {
    /// The reference to try first.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred: Option<String>,
    /// All references, in preference order.
    pub candidates: Vec<String>,
}

/// A live subshape handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubshapeRef {
    /// A face of a body.
    Face {
        /// Owning body.
        body: BodyId,
        /// The face.
        face: FaceId,
    },
    /// An edge of a body.
    Edge {
        /// Owning body.
        body: BodyId,
        /// The edge.
        edge: EdgeId,
    },
    /// A vertex of a body.
    Vertex {
        /// Owning body.
        body: BodyId,
        /// The vertex.
        vertex: VertexId,
    },
}

/// Resolution outcome.
#[derive(Debug, Clone)]
pub enum ResolveResult {
    /// Unique match.
    Found(SubshapeRef),
    /// Several candidates within the ambiguity margin.
    Ambiguous(Vec<SubshapeRef>),
    /// No match, with a reason.
    NotFound(String),
}

/// One evolution step: an old subshape carried into zero or more new
/// subshapes (empty means deleted).
#[derive(Debug, Clone)]
pub struct EvolutionUpdate {
    /// The subshape before the operation.
    pub old: SubshapeRef,
    /// Its material in the result.
    pub new: Vec<SubshapeRef>,
}

/// Kind of sweep for selector generation.
#[derive(Debug, Clone, Copy)]
pub enum SweepKind {
    /// Extrusion along a direction.
    Extrude {
        /// The (unit) extrusion direction.
        direction: Vec3,
    },
    /// Revolution about an axis.
    Revolve,
}

/// Relative ambiguity margin of the fingerprint fallback.
const AMBIGUITY_MARGIN: f64 = 1.25;
/// Fingerprint distance beyond which no match is accepted.
const ACCEPT_DISTANCE: f64 = 2.0;

/// Allocates feature/step ids and tracks reference evolution.
#[derive(Debug, Default)]
pub struct NamingStrategy {
    next_feature: u64,
    next_step: u64,
    forward: HashMap<SubshapeRef, Vec<String>>,
    reverse: HashMap<String, SubshapeRef>,
}

impl NamingStrategy {
    /// Create an empty strategy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next feature id.
    pub fn next_feature_id(&mut self) -> String {
        let id = self.next_feature;
        self.next_feature += 1;
        format!("feature-{id}")
    }

    /// Allocate the next step id.
    pub fn next_step_id(&mut self) -> u64 {
        let id = self.next_step;
        self.next_step += 1;
        id
    }

    /// Register a reference for a subshape.
    pub fn record(&mut self, subshape: SubshapeRef, reference: String) {
        self.forward
            .entry(subshape)
            .or_default()
            .push(reference.clone());
        self.reverse.insert(reference, subshape);
    }

    /// Exact topological lookup.
    pub fn lookup(&self, reference: &str) -> Option<SubshapeRef> {
        self.reverse.get(reference).copied()
    }

    /// References registered for a subshape.
    pub fn refs_of(&self, subshape: SubshapeRef) -> &[String] {
        self.forward
            .get(&subshape)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Apply a boolean's evolution mapping: every reference of an old
    /// subshape is re-pointed at its (first) successor, or dropped when
    /// the subshape was deleted.
    pub fn apply_evolution(&mut self, updates: &[EvolutionUpdate]) {
        self.next_step += 1;
        for update in updates {
            let Some(refs) = self.forward.remove(&update.old) else {
                continue;
            };
            match update.new.first() {
                Some(&successor) => {
                    for reference in &refs {
                        self.reverse.insert(reference.clone(), successor);
                    }
                    self.forward
                        .entry(successor)
                        .or_default()
                        .extend(refs);
                }
                None => {
                    for reference in &refs {
                        self.reverse.remove(reference);
                    }
                }
            }
        }
    }

    /// Generate references for every face and edge of a sweep result and
    /// register them.
    ///
    /// Face selectors follow the geometric role: extrude caps by the
    /// normal's dot against the sweep direction (±0.9 cutoff), side
    /// walls with their generating loop id and source entity.
    pub fn generate_sweep_refs(
        &mut self,
        body: BodyId,
        output: &SweepOutput,
        mesh: &Mesh,
        feature_id: &str,
        kind: SweepKind,
    ) -> Result<Vec<(SubshapeRef, PersistentRefSet)>, NamingError> {
        let face_fps = face_fingerprints(mesh);
        let edge_fps = edge_fingerprints(mesh);
        let mut out = Vec::new();

        for swept in &output.faces {
            let fp = face_fps.get(&swept.face);
            let selector = self.sweep_selector(output, swept.role, fp, kind);
            let record = PersistentRecord {
                v: 1,
                expected_type: SubshapeType::Face,
                origin_feature_id: feature_id.to_string(),
                local_selector: selector,
                fingerprint: fp.map(|f| FingerprintRecord {
                    centroid: [f.centroid.x, f.centroid.y, f.centroid.z],
                    size: f.size,
                    normal: Some([f.normal.x, f.normal.y, f.normal.z]),
                }),
            };
            let encoded = encode_persistent_ref(&record)?;
            let subshape = SubshapeRef::Face {
                body,
                face: swept.face,
            };
            self.record(subshape, encoded.clone());
            out.push((
                subshape,
                PersistentRefSet {
                    preferred: Some(encoded.clone()),
                    candidates: vec![encoded],
                },
            ));
        }

        for (&edge, fp) in &edge_fps {
            let record = PersistentRecord {
                v: 1,
                expected_type: SubshapeType::Edge,
                origin_feature_id: feature_id.to_string(),
                local_selector: LocalSelector {
                    kind: "edge.unknown".to_string(),
                    data: json!({}),
                },
                fingerprint: Some(FingerprintRecord {
                    centroid: [fp.midpoint.x, fp.midpoint.y, fp.midpoint.z],
                    size: fp.length,
                    normal: None,
                }),
            };
            let encoded = encode_persistent_ref(&record)?;
            let subshape = SubshapeRef::Edge { body, edge };
            self.record(subshape, encoded.clone());
            out.push((
                subshape,
                PersistentRefSet {
                    preferred: Some(encoded.clone()),
                    candidates: vec![encoded],
                },
            ));
        }

        Ok(out)
    }

    fn sweep_selector(
        &self,
        output: &SweepOutput,
        role: SweptFaceRole,
        fp: Option<&FaceFingerprint>,
        kind: SweepKind,
    ) -> LocalSelector {
        let loop_id_of = |loop_index: usize| -> String {
            output
                .loop_entities
                .get(loop_index)
                .map(|ids| compute_loop_id(ids).to_string())
                .unwrap_or_default()
        };
        match kind {
            SweepKind::Extrude { direction } => {
                let (loop_index, entity, segment) = match role {
                    SweptFaceRole::Side {
                        loop_index,
                        entity,
                        segment,
                    } => (loop_index, Some(entity), Some(segment)),
                    SweptFaceRole::BottomCap { loop_index }
                    | SweptFaceRole::TopCap { loop_index }
                    | SweptFaceRole::StartCap { loop_index }
                    | SweptFaceRole::EndCap { loop_index } => (loop_index, None, None),
                };
                let dot = fp.map(|f| f.normal.dot(&direction)).unwrap_or(0.0);
                let kind_name = if dot > 0.9 {
                    "extrude.topCap"
                } else if dot < -0.9 {
                    "extrude.bottomCap"
                } else {
                    "extrude.side"
                };
                let mut data = json!({ "loopId": loop_id_of(loop_index) });
                if let (Some(entity), Some(segment)) = (entity, segment) {
                    data["entity"] = json!(entity.0);
                    data["segment"] = json!(segment);
                }
                LocalSelector {
                    kind: kind_name.to_string(),
                    data,
                }
            }
            SweepKind::Revolve => match role {
                SweptFaceRole::Side {
                    loop_index,
                    entity,
                    segment,
                } => LocalSelector {
                    kind: "revolve.side".to_string(),
                    data: json!({
                        "loopId": loop_id_of(loop_index),
                        "entity": entity.0,
                        "segment": segment,
                    }),
                },
                SweptFaceRole::StartCap { loop_index } => LocalSelector {
                    kind: "revolve.startCap".to_string(),
                    data: json!({ "loopId": loop_id_of(loop_index) }),
                },
                SweptFaceRole::EndCap { loop_index } => LocalSelector {
                    kind: "revolve.endCap".to_string(),
                    data: json!({ "loopId": loop_id_of(loop_index) }),
                },
                SweptFaceRole::BottomCap { .. } | SweptFaceRole::TopCap { .. } => LocalSelector {
                    kind: "face.unknown".to_string(),
                    data: json!({}),
                },
            },
        }
    }

    /// Resolve a reference against the current model.
    ///
    /// Exact topological lookup first; on a miss, fingerprint
    /// nearest-match over the supplied face index (faces of the origin
    /// feature's body, or of the containing body after merges).
    pub fn resolve(
        &self,
        reference: &str,
        face_index: &HashMap<FaceId, (BodyId, FaceFingerprint)>,
    ) -> ResolveResult {
        if let Some(subshape) = self.lookup(reference) {
            return ResolveResult::Found(subshape);
        }

        let record = match decode_persistent_ref(reference) {
            Ok(r) => r,
            Err(e) => return ResolveResult::NotFound(e.to_string()),
        };
        let Some(fp) = &record.fingerprint else {
            return ResolveResult::NotFound(
                "no topological match and the reference carries no fingerprint".to_string(),
            );
        };
        if record.expected_type != SubshapeType::Face {
            return ResolveResult::NotFound(
                "fingerprint fallback only re-identifies faces".to_string(),
            );
        }
        let target = FaceFingerprint {
            centroid: arbor_kernel_math::Point3::new(fp.centroid[0], fp.centroid[1], fp.centroid[2]),
            size: fp.size,
            normal: fp
                .normal
                .map(|n| Vec3::new(n[0], n[1], n[2]))
                .unwrap_or_else(Vec3::zeros),
        };

        let mut scored: Vec<(f64, SubshapeRef)> = face_index
            .iter()
            .map(|(&face, &(body, ref candidate))| {
                (
                    fingerprint_distance(&target, candidate),
                    SubshapeRef::Face { body, face },
                )
            })
            .collect();
        scored.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());

        match scored.as_slice() {
            [] => ResolveResult::NotFound("no candidate faces".to_string()),
            [(best, subshape)] if *best <= ACCEPT_DISTANCE => ResolveResult::Found(*subshape),
            [(best, _)] => ResolveResult::NotFound(format!(
                "best fingerprint distance {best:.4} beyond acceptance"
            )),
            [(best, subshape), (second, second_shape), ..] => {
                if *best > ACCEPT_DISTANCE {
                    ResolveResult::NotFound(format!(
                        "best fingerprint distance {best:.4} beyond acceptance"
                    ))
                } else if *second <= *best * AMBIGUITY_MARGIN + 1e-12 {
                    ResolveResult::Ambiguous(vec![*subshape, *second_shape])
                } else {
                    ResolveResult::Found(*subshape)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_kernel_geom::GeometryPool;
    use arbor_kernel_sketch::{profile_from_sketch, Sketch, SketchPlane};
    use arbor_kernel_sweep::{extrude, ExtrudeParams};
    use arbor_kernel_tessellate::tessellate_body;
    use arbor_kernel_topo::TopologyModel;

    fn extruded_box() -> (TopologyModel, GeometryPool, SweepOutput) {
        let mut model = TopologyModel::new();
        let mut geom = GeometryPool::new();
        let mut sketch = Sketch::new(SketchPlane::xy());
        sketch.add_rectangle(0.0, 0.0, 10.0, 10.0);
        let profile = profile_from_sketch(&sketch, None).unwrap();
        let output = extrude(&mut model, &mut geom, &profile, &ExtrudeParams::new(10.0)).unwrap();
        (model, geom, output)
    }

    #[test]
    fn test_generate_refs_for_extrude() {
        let (model, geom, output) = extruded_box();
        let mesh = tessellate_body(&model, &geom, output.body);
        let mut strategy = NamingStrategy::new();
        let feature = strategy.next_feature_id();
        let refs = strategy
            .generate_sweep_refs(
                output.body,
                &output,
                &mesh,
                &feature,
                SweepKind::Extrude {
                    direction: Vec3::z(),
                },
            )
            .unwrap();

        // 6 faces + 12 edges
        assert_eq!(refs.len(), 18);

        let mut kinds: Vec<String> = refs
            .iter()
            .filter_map(|(_, set)| set.preferred.as_deref())
            .map(|r| decode_persistent_ref(r).unwrap().local_selector.kind)
            .collect();
        kinds.sort();
        assert_eq!(kinds.iter().filter(|k| *k == "extrude.topCap").count(), 1);
        assert_eq!(
            kinds.iter().filter(|k| *k == "extrude.bottomCap").count(),
            1
        );
        assert_eq!(kinds.iter().filter(|k| *k == "extrude.side").count(), 4);
        assert_eq!(kinds.iter().filter(|k| *k == "edge.unknown").count(), 12);
    }

    #[test]
    fn test_side_faces_share_loop_id() {
        let (model, geom, output) = extruded_box();
        let mesh = tessellate_body(&model, &geom, output.body);
        let mut strategy = NamingStrategy::new();
        let refs = strategy
            .generate_sweep_refs(
                output.body,
                &output,
                &mesh,
                "feature-0",
                SweepKind::Extrude {
                    direction: Vec3::z(),
                },
            )
            .unwrap();

        let loop_ids: Vec<String> = refs
            .iter()
            .filter_map(|(_, set)| set.preferred.as_deref())
            .map(|r| decode_persistent_ref(r).unwrap())
            .filter(|rec| rec.local_selector.kind == "extrude.side")
            .map(|rec| rec.local_selector.data["loopId"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(loop_ids.len(), 4);
        assert!(loop_ids.iter().all(|id| id == &loop_ids[0]));
    }

    #[test]
    fn test_exact_lookup_roundtrip() {
        let (model, geom, output) = extruded_box();
        let mesh = tessellate_body(&model, &geom, output.body);
        let mut strategy = NamingStrategy::new();
        let refs = strategy
            .generate_sweep_refs(
                output.body,
                &output,
                &mesh,
                "feature-0",
                SweepKind::Extrude {
                    direction: Vec3::z(),
                },
            )
            .unwrap();

        for (subshape, set) in &refs {
            let reference = set.preferred.as_deref().unwrap();
            match strategy.resolve(reference, &HashMap::new()) {
                ResolveResult::Found(found) => assert_eq!(found, *subshape),
                other => panic!("expected exact match, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_evolution_repoints_reference() {
        let (model, geom, output) = extruded_box();
        let mesh = tessellate_body(&model, &geom, output.body);
        let mut strategy = NamingStrategy::new();
        let refs = strategy
            .generate_sweep_refs(
                output.body,
                &output,
                &mesh,
                "feature-0",
                SweepKind::Extrude {
                    direction: Vec3::z(),
                },
            )
            .unwrap();
        let (old_subshape, set) = refs
            .iter()
            .find(|(s, _)| matches!(s, SubshapeRef::Face { .. }))
            .unwrap();
        let reference = set.preferred.clone().unwrap();

        // Simulate a boolean replacing the face
        let mut model = model;
        let new_body = model.add_body();
        let new_face = model.add_face(arbor_kernel_geom::SurfaceIndex(0), false);
        let successor = SubshapeRef::Face {
            body: new_body,
            face: new_face,
        };
        strategy.apply_evolution(&[EvolutionUpdate {
            old: *old_subshape,
            new: vec![successor],
        }]);

        match strategy.resolve(&reference, &HashMap::new()) {
            ResolveResult::Found(found) => assert_eq!(found, successor),
            other => panic!("expected repointed match, got {other:?}"),
        }
    }

    #[test]
    fn test_evolution_deletion_falls_back_to_fingerprint() {
        let (model, geom, output) = extruded_box();
        let mesh = tessellate_body(&model, &geom, output.body);
        let mut strategy = NamingStrategy::new();
        let refs = strategy
            .generate_sweep_refs(
                output.body,
                &output,
                &mesh,
                "feature-0",
                SweepKind::Extrude {
                    direction: Vec3::z(),
                },
            )
            .unwrap();
        let (old_subshape, set) = refs
            .iter()
            .find(|(s, _)| matches!(s, SubshapeRef::Face { .. }))
            .unwrap();
        let reference = set.preferred.clone().unwrap();

        // The face evolves to nothing
        strategy.apply_evolution(&[EvolutionUpdate {
            old: *old_subshape,
            new: vec![],
        }]);

        // Build a fingerprint index that still contains the original face
        let face_fps = face_fingerprints(&mesh);
        let face_index: HashMap<FaceId, (BodyId, FaceFingerprint)> = face_fps
            .into_iter()
            .map(|(f, fp)| (f, (output.body, fp)))
            .collect();

        match strategy.resolve(&reference, &face_index) {
            ResolveResult::Found(SubshapeRef::Face { face, .. }) => {
                let SubshapeRef::Face { face: old_face, .. } = old_subshape else {
                    unreachable!()
                };
                assert_eq!(face, *old_face, "fingerprint should find the same face");
            }
            other => panic!("expected fingerprint fallback, got {other:?}"),
        }
    }

    #[test]
    fn test_resolution_ambiguity() {
        let (model, geom, output) = extruded_box();
        let mesh = tessellate_body(&model, &geom, output.body);
        let face_fps = face_fingerprints(&mesh);
        // Duplicate every fingerprint onto a second fake face set: every
        // query becomes ambiguous
        let mut model = model;
        let mut face_index: HashMap<FaceId, (BodyId, FaceFingerprint)> = HashMap::new();
        for (face, fp) in &face_fps {
            face_index.insert(*face, (output.body, *fp));
            let clone = model.add_face(arbor_kernel_geom::SurfaceIndex(0), false);
            face_index.insert(clone, (output.body, *fp));
        }

        let mut strategy = NamingStrategy::new();
        let refs = strategy
            .generate_sweep_refs(
                output.body,
                &output,
                &mesh,
                "feature-0",
                SweepKind::Extrude {
                    direction: Vec3::z(),
                },
            )
            .unwrap();
        let (subshape, set) = refs
            .iter()
            .find(|(s, _)| matches!(s, SubshapeRef::Face { .. }))
            .unwrap();
        let reference = set.preferred.clone().unwrap();
        // Clear the topological map so the fallback runs
        strategy.apply_evolution(&[EvolutionUpdate {
            old: *subshape,
            new: vec![],
        }]);

        match strategy.resolve(&reference, &face_index) {
            ResolveResult::Ambiguous(candidates) => assert_eq!(candidates.len(), 2),
            other => panic!("expected ambiguity, got {other:?}"),
        }
    }

    #[test]
    fn test_resolve_garbage_reference() {
        let strategy = NamingStrategy::new();
        match strategy.resolve("stref:v1:not-base64!!", &HashMap::new()) {
            ResolveResult::NotFound(_) => {}
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_feature_id_allocation_monotonic() {
        let mut strategy = NamingStrategy::new();
        let a = strategy.next_feature_id();
        let b = strategy.next_feature_id();
        assert_ne!(a, b);
        assert_eq!(a, "feature-0");
        assert_eq!(b, "feature-1");
        assert!(strategy.next_step_id() < strategy.next_step_id());
    }

    #[test]
    fn test_fingerprints_of_box() {
        let (model, geom, output) = extruded_box();
        let mesh = tessellate_body(&model, &geom, output.body);
        let fps = face_fingerprints(&mesh);
        assert_eq!(fps.len(), 6);
        for fp in fps.values() {
            assert!((fp.size - 100.0).abs() < 1e-3, "face area {}", fp.size);
            assert!((fp.normal.norm() - 1.0).abs() < 1e-9);
            // Centroid on the box surface
            assert!(fp.centroid.x >= -1e-6 && fp.centroid.x <= 10.0 + 1e-6);
        }
        let efps = edge_fingerprints(&mesh);
        assert_eq!(efps.len(), 12);
        for fp in efps.values() {
            assert!((fp.length - 10.0).abs() < 1e-6);
        }
    }

}
