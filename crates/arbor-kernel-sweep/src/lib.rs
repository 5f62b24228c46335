#![warn(missing_docs)]

//! Sweep operations for the arbor kernel.
//!
//! Builds closed B-rep bodies from 2D profiles: [`extrude`] sweeps a
//! profile along a direction, [`revolve`] rotates it about an axis. Both
//! append to an existing [`TopologyModel`]/[`GeometryPool`] pair and
//! report per-face roles that the persistent naming layer turns into
//! selectors.

use arbor_kernel_sketch::SketchEntityId;
use arbor_kernel_topo::{BodyId, FaceId, ShellId, TopoError};
use thiserror::Error;

mod extrude;
mod revolve;

pub use extrude::{extrude, ExtrudeParams};
pub use revolve::{revolve, RevolveParams};

/// Errors from sweep operations.
#[derive(Debug, Clone, Error)]
pub enum SweepError {
    /// Extrusion distance or direction is effectively zero.
    #[error("extrusion is degenerate (zero distance or direction)")]
    ZeroExtrusion,

    /// The extrusion direction lies in the profile plane.
    #[error("extrusion direction is parallel to the profile plane")]
    DirectionInPlane,

    /// Revolution axis has zero length.
    #[error("revolution axis is zero")]
    ZeroAxis,

    /// Revolution angle outside (0, 2π].
    #[error("invalid revolution angle: {0} radians")]
    InvalidAngle(f64),

    /// The profile touches or crosses the revolution axis.
    #[error("profile intersects the revolution axis")]
    AxisIntersection,

    /// A profile loop degenerated to fewer than three polygon points.
    #[error("profile loop {0} is degenerate")]
    DegenerateLoop(usize),

    /// Topology construction failed.
    #[error(transparent)]
    Topo(#[from] TopoError),
}

/// Role of a face produced by a sweep, used for persistent naming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweptFaceRole {
    /// Extrude cap on the profile-plane side.
    BottomCap {
        /// Index of the generating profile loop (the outer loop).
        loop_index: usize,
    },
    /// Extrude cap on the far side.
    TopCap {
        /// Index of the generating profile loop (the outer loop).
        loop_index: usize,
    },
    /// Revolve cap at angle zero.
    StartCap {
        /// Index of the generating profile loop (the outer loop).
        loop_index: usize,
    },
    /// Revolve cap at the sweep angle.
    EndCap {
        /// Index of the generating profile loop (the outer loop).
        loop_index: usize,
    },
    /// A lateral wall.
    Side {
        /// Index of the generating profile loop.
        loop_index: usize,
        /// Sketch entity the wall was swept from.
        entity: SketchEntityId,
        /// Segment index within the polygonized loop.
        segment: usize,
    },
}

/// A face produced by a sweep, tagged with its role.
#[derive(Debug, Clone, Copy)]
pub struct SweptFace {
    /// The face handle.
    pub face: FaceId,
    /// Why the face exists.
    pub role: SweptFaceRole,
}

/// Result of a sweep: the new body plus naming metadata.
#[derive(Debug, Clone)]
pub struct SweepOutput {
    /// The body created by the sweep.
    pub body: BodyId,
    /// Its (single, closed) shell.
    pub shell: ShellId,
    /// Every face with its generating role.
    pub faces: Vec<SweptFace>,
    /// Ordered sketch entity ids per profile loop, for loop-id hashing.
    pub loop_entities: Vec<Vec<SketchEntityId>>,
}

/// Reverse a polygon ring in place, keeping per-segment sources aligned.
///
/// Segment `i` runs from point `i` to point `i + 1` (mod n); after the
/// reversal the segment between the same two geometric points keeps its
/// source entity.
pub(crate) fn reverse_ring<T: Copy>(points: &mut [arbor_kernel_math::Point2], sources: &mut [T]) {
    let n = points.len();
    points.reverse();
    if n < 2 {
        return;
    }
    let old: Vec<T> = sources.to_vec();
    for i in 0..n - 1 {
        sources[i] = old[n - 2 - i];
    }
    sources[n - 1] = old[n - 1];
}
