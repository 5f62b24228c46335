//! Sketch constraints.
//!
//! Constraints are a tagged union: one variant per kind, each carrying
//! the ids it touches and, when dimensional, a scalar value. The solver
//! dispatches on the variant for residual and jacobian evaluation; there
//! is no per-residual dynamic dispatch.

use crate::{Sketch, SketchEntityId, SketchEntityKind, SketchPointId};

/// Target of a horizontal/vertical constraint: a pair of points or a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HvTarget {
    /// Two points aligned along the axis.
    Points(SketchPointId, SketchPointId),
    /// A line whose endpoints align along the axis.
    Line(SketchEntityId),
}

/// A sketch constraint.
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    /// Two points coincide.
    Coincident {
        /// First point.
        a: SketchPointId,
        /// Second point.
        b: SketchPointId,
    },
    /// Points or line endpoints share a y coordinate.
    Horizontal(HvTarget),
    /// Points or line endpoints share an x coordinate.
    Vertical(HvTarget),
    /// Two lines are parallel.
    Parallel {
        /// First line.
        a: SketchEntityId,
        /// Second line.
        b: SketchEntityId,
    },
    /// Two lines are perpendicular.
    Perpendicular {
        /// First line.
        a: SketchEntityId,
        /// Second line.
        b: SketchEntityId,
    },
    /// Two lines have equal length.
    EqualLength {
        /// First line.
        a: SketchEntityId,
        /// Second line.
        b: SketchEntityId,
    },
    /// A line's endpoints lie on another line's infinite extension.
    Collinear {
        /// First line.
        a: SketchEntityId,
        /// Second line.
        b: SketchEntityId,
    },
    /// A line is tangent to an arc, or two arcs are tangent.
    Tangent {
        /// Line or arc.
        a: SketchEntityId,
        /// Arc.
        b: SketchEntityId,
    },
    /// Two arcs have equal radius.
    EqualRadius {
        /// First arc.
        a: SketchEntityId,
        /// Second arc.
        b: SketchEntityId,
    },
    /// Two arcs share a center.
    Concentric {
        /// First arc.
        a: SketchEntityId,
        /// Second arc.
        b: SketchEntityId,
    },
    /// A point is pinned at its current position.
    Fixed {
        /// The pinned point.
        point: SketchPointId,
    },
    /// Distance between two points.
    Distance {
        /// First point.
        a: SketchPointId,
        /// Second point.
        b: SketchPointId,
        /// Target distance in mm.
        value: f64,
    },
    /// Horizontal distance between two points (signed b.x − a.x).
    HorizontalDistance {
        /// First point.
        a: SketchPointId,
        /// Second point.
        b: SketchPointId,
        /// Target distance in mm.
        value: f64,
    },
    /// Vertical distance between two points (signed b.y − a.y).
    VerticalDistance {
        /// First point.
        a: SketchPointId,
        /// Second point.
        b: SketchPointId,
        /// Target distance in mm.
        value: f64,
    },
    /// Angle between two lines.
    Angle {
        /// First line.
        a: SketchEntityId,
        /// Second line.
        b: SketchEntityId,
        /// Target angle in radians.
        value: f64,
    },
    /// Radius of an arc.
    Radius {
        /// The arc.
        arc: SketchEntityId,
        /// Target radius in mm.
        value: f64,
    },
    /// A point lies on a line's infinite extension.
    PointOnLine {
        /// The point.
        point: SketchPointId,
        /// The line.
        line: SketchEntityId,
    },
    /// A point lies on an arc's circle.
    PointOnArc {
        /// The point.
        point: SketchPointId,
        /// The arc.
        arc: SketchEntityId,
    },
    /// A point is the midpoint of a line.
    Midpoint {
        /// The point.
        point: SketchPointId,
        /// The line.
        line: SketchEntityId,
    },
    /// Two points are symmetric about a line.
    Symmetric {
        /// First point.
        a: SketchPointId,
        /// Second point.
        b: SketchPointId,
        /// The mirror line.
        axis: SketchEntityId,
    },
}

impl Constraint {
    /// Every point id this constraint touches (used for graph partitioning).
    pub fn touched_points(&self, sketch: &Sketch) -> Vec<SketchPointId> {
        let entity_pts = |id: SketchEntityId| -> Vec<SketchPointId> {
            match sketch.entities.get(&id).map(|e| e.kind) {
                Some(SketchEntityKind::Line { start, end }) => vec![start, end],
                Some(SketchEntityKind::Arc {
                    start, end, center, ..
                }) => vec![start, end, center],
                None => Vec::new(),
            }
        };
        match self {
            Constraint::Coincident { a, b }
            | Constraint::Distance { a, b, .. }
            | Constraint::HorizontalDistance { a, b, .. }
            | Constraint::VerticalDistance { a, b, .. } => vec![*a, *b],
            Constraint::Horizontal(t) | Constraint::Vertical(t) => match t {
                HvTarget::Points(a, b) => vec![*a, *b],
                HvTarget::Line(l) => entity_pts(*l),
            },
            Constraint::Parallel { a, b }
            | Constraint::Perpendicular { a, b }
            | Constraint::EqualLength { a, b }
            | Constraint::Collinear { a, b }
            | Constraint::Tangent { a, b }
            | Constraint::EqualRadius { a, b }
            | Constraint::Concentric { a, b }
            | Constraint::Angle { a, b, .. } => {
                let mut pts = entity_pts(*a);
                pts.extend(entity_pts(*b));
                pts
            }
            Constraint::Fixed { point } => vec![*point],
            Constraint::Radius { arc, .. } => entity_pts(*arc),
            Constraint::PointOnLine { point, line } => {
                let mut pts = vec![*point];
                pts.extend(entity_pts(*line));
                pts
            }
            Constraint::PointOnArc { point, arc } => {
                let mut pts = vec![*point];
                pts.extend(entity_pts(*arc));
                pts
            }
            Constraint::Midpoint { point, line } => {
                let mut pts = vec![*point];
                pts.extend(entity_pts(*line));
                pts
            }
            Constraint::Symmetric { a, b, axis } => {
                let mut pts = vec![*a, *b];
                pts.extend(entity_pts(*axis));
                pts
            }
        }
    }
}
