#![warn(missing_docs)]

//! Planar boolean operations on B-rep bodies for the arbor kernel.
//!
//! Implements union, subtract, and intersect for bodies whose faces all
//! lie on plane surfaces. The pipeline has five stages:
//! 1. **AABB prefilter** — disjoint bodies short-circuit
//! 2. **Imprinting** — face-face intersection segments recorded per face
//! 3. **Classification** — pieces labeled in/out/on via ray casting
//! 4. **Selection** — pieces retained per operation
//! 5. **Reassembly** — retained pieces sewn into a new body

pub mod bbox;
pub mod classify;
pub mod dcel;
pub mod imprint;
pub mod select;

mod assemble;

use arbor_kernel_geom::GeometryPool;
use arbor_kernel_math::NumericContext;
use arbor_kernel_topo::{BodyId, FaceId, TopoError, TopologyModel};
use thiserror::Error;

use bbox::body_aabb;
use classify::classify_pieces;
use imprint::{build_pieces, extract_regions, imprint_pairs, FacePiece};
use select::{keep_from_a, keep_from_b};

/// Debug logging macro - only prints when the debug-boolean feature is on.
#[allow(unused_macros)]
#[cfg(feature = "debug-boolean")]
macro_rules! debug_bool {
    ($($arg:tt)*) => {
        eprintln!($($arg)*)
    };
}

/// No-op version when debug-boolean is disabled.
#[allow(unused_macros)]
#[cfg(not(feature = "debug-boolean"))]
macro_rules! debug_bool {
    ($($arg:tt)*) => {};
}

/// The boolean operation to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BooleanOp {
    /// A ∪ B.
    Union,
    /// A − B.
    Subtract,
    /// A ∩ B.
    Intersect,
}

/// Errors from boolean operations.
#[derive(Debug, Clone, Error)]
pub enum BooleanError {
    /// The result would be empty (e.g. intersect of disjoint bodies).
    #[error("boolean result is empty")]
    EmptyResult,

    /// A face with a non-plane surface was encountered.
    #[error("planar booleans require plane surfaces")]
    NonPlanarFace,

    /// Topology construction failed.
    #[error(transparent)]
    Topo(#[from] TopoError),
}

/// How a source face evolved through the boolean.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvolutionKind {
    /// One retained piece: the face survives with new identity.
    Modified,
    /// Several retained pieces.
    Split,
    /// Merged with pieces of another face (reserved for the naming layer).
    Merged,
    /// No retained pieces.
    Deleted,
}

/// One entry of the evolution mapping consumed by persistent naming.
#[derive(Debug, Clone)]
pub struct EvolutionEntry {
    /// The face of an input body.
    pub old_face: FaceId,
    /// 0 when the face came from A, 1 from B.
    pub source_body: u8,
    /// The faces of the result carrying its material.
    pub new_faces: Vec<FaceId>,
    /// How the face evolved.
    pub kind: EvolutionKind,
}

/// Result of a boolean operation.
#[derive(Debug, Clone)]
pub struct BooleanOutput {
    /// The result body.
    pub body: BodyId,
    /// Non-fatal issues (non-manifold edges and similar).
    pub warnings: Vec<String>,
    /// Face evolution mapping for the naming layer.
    pub evolution: Vec<EvolutionEntry>,
}

/// Perform a boolean operation between two bodies of the same model.
///
/// Both bodies must consist of planar faces only. The inputs are left
/// untouched (soft-deletion of consumed bodies is the caller's call);
/// the result is a new body, except for the disjoint-subtract case
/// which returns body A unchanged.
pub fn boolean_op(
    model: &mut TopologyModel,
    geom: &mut GeometryPool,
    ctx: &NumericContext,
    a: BodyId,
    b: BodyId,
    op: BooleanOp,
) -> Result<BooleanOutput, BooleanError> {
    // Stage 1: AABB prefilter
    let mut aabb_a = body_aabb(model, a);
    let aabb_b = body_aabb(model, b);
    aabb_a.expand(ctx.tol.length);
    let overlaps = aabb_a.overlaps(&aabb_b);
    if !overlaps {
        return disjoint_result(model, a, b, op);
    }

    let mut regions_a = extract_regions(model, geom, a, 0)?;
    let mut regions_b = extract_regions(model, geom, b, 1)?;

    // Stage 2: imprinting and piece extraction
    imprint_pairs(&mut regions_a, &mut regions_b, ctx);
    let pieces_a: Vec<FacePiece> = regions_a
        .iter()
        .flat_map(|r| build_pieces(r, ctx))
        .collect();
    let pieces_b: Vec<FacePiece> = regions_b
        .iter()
        .flat_map(|r| build_pieces(r, ctx))
        .collect();
    debug_bool!(
        "boolean {:?}: {} pieces from A, {} from B",
        op,
        pieces_a.len(),
        pieces_b.len()
    );

    // Stage 3: classification (parallel, joined before return)
    let labels_a = classify_pieces(&pieces_a, &regions_b, &aabb_b, overlaps, ctx);
    let labels_b = classify_pieces(&pieces_b, &regions_a, &aabb_a, overlaps, ctx);

    // Stage 4: selection
    let flip_b = op == BooleanOp::Subtract;
    let mut retained: Vec<(FacePiece, bool)> = Vec::new();
    let mut origin: Vec<(FaceId, u8)> = Vec::new();
    for (piece, label) in pieces_a.iter().zip(&labels_a) {
        if keep_from_a(op, *label) {
            retained.push((piece.clone(), false));
            origin.push((piece.source_face, 0));
        }
    }
    for (piece, label) in pieces_b.iter().zip(&labels_b) {
        if keep_from_b(op, *label) {
            retained.push((piece.clone(), flip_b));
            origin.push((piece.source_face, 1));
        }
    }
    debug_bool!("boolean {:?}: retained {} pieces", op, retained.len());
    if retained.is_empty() {
        return Err(BooleanError::EmptyResult);
    }

    // Stage 5: reassembly
    let mut warnings = Vec::new();
    let (body, new_faces) = assemble::assemble_pieces(model, geom, &retained, &mut warnings)?;

    let evolution = build_evolution(&regions_a, &regions_b, &origin, &new_faces);

    Ok(BooleanOutput {
        body,
        warnings,
        evolution,
    })
}

/// Disjoint-body short circuit: union yields a compound body, subtract
/// returns A unchanged, intersect is empty.
fn disjoint_result(
    model: &mut TopologyModel,
    a: BodyId,
    b: BodyId,
    op: BooleanOp,
) -> Result<BooleanOutput, BooleanError> {
    match op {
        BooleanOp::Union => {
            let compound = model.add_body();
            let mut evolution = Vec::new();
            for (source, tag) in [(a, 0u8), (b, 1u8)] {
                for shell in model.body_shells(source).collect::<Vec<_>>() {
                    let old_faces: Vec<FaceId> = model.shell_faces(shell).collect();
                    let new_shell = model.clone_shell_into_body(shell, compound)?;
                    let cloned: Vec<FaceId> = model.shell_faces(new_shell).collect();
                    for (old, new) in old_faces.into_iter().zip(cloned) {
                        evolution.push(EvolutionEntry {
                            old_face: old,
                            source_body: tag,
                            new_faces: vec![new],
                            kind: EvolutionKind::Modified,
                        });
                    }
                }
            }
            Ok(BooleanOutput {
                body: compound,
                warnings: Vec::new(),
                evolution,
            })
        }
        BooleanOp::Subtract => Ok(BooleanOutput {
            body: a,
            warnings: Vec::new(),
            evolution: Vec::new(),
        }),
        BooleanOp::Intersect => Err(BooleanError::EmptyResult),
    }
}

/// Group retained pieces by source face into evolution entries.
fn build_evolution(
    regions_a: &[imprint::FaceRegion],
    regions_b: &[imprint::FaceRegion],
    origin: &[(FaceId, u8)],
    new_faces: &[Option<FaceId>],
) -> Vec<EvolutionEntry> {
    use std::collections::HashMap;
    let mut by_source: HashMap<(FaceId, u8), Vec<FaceId>> = HashMap::new();
    for ((source, tag), new_face) in origin.iter().zip(new_faces) {
        if let Some(face) = new_face {
            by_source.entry((*source, *tag)).or_default().push(*face);
        }
    }
    let mut evolution = Vec::new();
    for region in regions_a.iter().chain(regions_b) {
        let key = (region.face, region.body_tag);
        let new = by_source.remove(&key).unwrap_or_default();
        let kind = match new.len() {
            0 => EvolutionKind::Deleted,
            1 => EvolutionKind::Modified,
            _ => EvolutionKind::Split,
        };
        evolution.push(EvolutionEntry {
            old_face: region.face,
            source_body: region.body_tag,
            new_faces: new,
            kind,
        });
    }
    evolution
}
