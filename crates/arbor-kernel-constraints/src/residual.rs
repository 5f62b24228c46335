//! Residual and jacobian evaluation per constraint kind.
//!
//! Every constraint yields one or more scalar residuals expressed in
//! length units, with analytic gradients with respect to the touched
//! points. Normalization denominators (segment lengths) are treated as
//! locally constant in the gradients; the Gauss-Newton approximation
//! absorbs the difference.

use std::collections::BTreeMap;

use arbor_kernel_math::{Point2, Vec2};
use arbor_kernel_sketch::{Constraint, HvTarget, Sketch, SketchEntityId, SketchEntityKind,
    SketchPointId};

/// A scalar residual with its gradient entries.
#[derive(Debug, Clone)]
pub struct Residual {
    /// Residual value (length units).
    pub value: f64,
    /// Gradient per touched point: `(point, d value / d (x, y))`.
    pub grads: Vec<(SketchPointId, Vec2)>,
    /// Least-squares weight (1 for hard constraints).
    pub weight: f64,
}

impl Residual {
    fn hard(value: f64, grads: Vec<(SketchPointId, Vec2)>) -> Self {
        Self {
            value,
            grads,
            weight: 1.0,
        }
    }
}

/// Positions used during evaluation: solver state overlaid on the sketch.
pub struct EvalPositions<'a> {
    sketch: &'a Sketch,
    overlay: &'a BTreeMap<SketchPointId, Point2>,
}

impl<'a> EvalPositions<'a> {
    /// Wrap a sketch plus the solver's working positions.
    pub fn new(sketch: &'a Sketch, overlay: &'a BTreeMap<SketchPointId, Point2>) -> Self {
        Self { sketch, overlay }
    }

    /// Current position of a point.
    pub fn pos(&self, id: SketchPointId) -> Point2 {
        match self.overlay.get(&id) {
            Some(p) => *p,
            None => self.sketch.points[&id].position,
        }
    }

    fn line_points(&self, id: SketchEntityId) -> Option<(SketchPointId, SketchPointId)> {
        match self.sketch.entities.get(&id)?.kind {
            SketchEntityKind::Line { start, end } => Some((start, end)),
            SketchEntityKind::Arc { .. } => None,
        }
    }

    fn arc_points(&self, id: SketchEntityId) -> Option<(SketchPointId, SketchPointId)> {
        match self.sketch.entities.get(&id)?.kind {
            SketchEntityKind::Arc { start, center, .. } => Some((start, center)),
            SketchEntityKind::Line { .. } => None,
        }
    }
}

const LEN_EPS: f64 = 1e-12;

/// Evaluate a constraint into its residuals at the given positions.
///
/// Constraints that reference entities of the wrong kind (e.g. a radius
/// on a line) evaluate to nothing; the sketch API keeps those out, and
/// the solver treats an empty evaluation as trivially satisfied.
pub fn eval_constraint(p: &EvalPositions<'_>, constraint: &Constraint) -> Vec<Residual> {
    match constraint {
        Constraint::Coincident { a, b } => point_pair_delta(p, *a, *b),
        Constraint::Horizontal(target) => match resolve_hv(p, target) {
            Some((a, b)) => {
                let pa = p.pos(a);
                let pb = p.pos(b);
                vec![Residual::hard(
                    pa.y - pb.y,
                    vec![(a, Vec2::new(0.0, 1.0)), (b, Vec2::new(0.0, -1.0))],
                )]
            }
            None => Vec::new(),
        },
        Constraint::Vertical(target) => match resolve_hv(p, target) {
            Some((a, b)) => {
                let pa = p.pos(a);
                let pb = p.pos(b);
                vec![Residual::hard(
                    pa.x - pb.x,
                    vec![(a, Vec2::new(1.0, 0.0)), (b, Vec2::new(-1.0, 0.0))],
                )]
            }
            None => Vec::new(),
        },
        Constraint::Parallel { a, b } => {
            let (Some((a0, a1)), Some((b0, b1))) = (p.line_points(*a), p.line_points(*b)) else {
                return Vec::new();
            };
            vec![cross_residual(p, a0, a1, b0, b1)]
        }
        Constraint::Perpendicular { a, b } => {
            let (Some((a0, a1)), Some((b0, b1))) = (p.line_points(*a), p.line_points(*b)) else {
                return Vec::new();
            };
            vec![dot_residual(p, a0, a1, b0, b1)]
        }
        Constraint::EqualLength { a, b } => {
            let (Some((a0, a1)), Some((b0, b1))) = (p.line_points(*a), p.line_points(*b)) else {
                return Vec::new();
            };
            let da = p.pos(a1) - p.pos(a0);
            let db = p.pos(b1) - p.pos(b0);
            let la = da.norm().max(LEN_EPS);
            let lb = db.norm().max(LEN_EPS);
            let ua = da / la;
            let ub = db / lb;
            vec![Residual::hard(
                la - lb,
                vec![(a0, -ua), (a1, ua), (b0, ub), (b1, -ub)],
            )]
        }
        Constraint::Collinear { a, b } => {
            let (Some((a0, a1)), Some((b0, b1))) = (p.line_points(*a), p.line_points(*b)) else {
                return Vec::new();
            };
            // Both endpoints of `a` lie on the infinite line of `b`
            vec![
                point_line_residual(p, a0, b0, b1),
                point_line_residual(p, a1, b0, b1),
            ]
        }
        Constraint::Tangent { a, b } => eval_tangent(p, *a, *b),
        Constraint::EqualRadius { a, b } => {
            let (Some((s1, c1)), Some((s2, c2))) = (p.arc_points(*a), p.arc_points(*b)) else {
                return Vec::new();
            };
            let d1 = p.pos(s1) - p.pos(c1);
            let d2 = p.pos(s2) - p.pos(c2);
            let r1 = d1.norm().max(LEN_EPS);
            let r2 = d2.norm().max(LEN_EPS);
            let u1 = d1 / r1;
            let u2 = d2 / r2;
            vec![Residual::hard(
                r1 - r2,
                vec![(s1, u1), (c1, -u1), (s2, -u2), (c2, u2)],
            )]
        }
        Constraint::Concentric { a, b } => {
            let (Some((_, c1)), Some((_, c2))) = (p.arc_points(*a), p.arc_points(*b)) else {
                return Vec::new();
            };
            point_pair_delta(p, c1, c2)
        }
        Constraint::Fixed { point } => {
            // Pins the point at its committed sketch position
            let target = p.sketch.points[point].position;
            let pos = p.pos(*point);
            vec![
                Residual::hard(pos.x - target.x, vec![(*point, Vec2::new(1.0, 0.0))]),
                Residual::hard(pos.y - target.y, vec![(*point, Vec2::new(0.0, 1.0))]),
            ]
        }
        Constraint::Distance { a, b, value } => {
            let d = p.pos(*b) - p.pos(*a);
            let len = d.norm().max(LEN_EPS);
            let u = d / len;
            vec![Residual::hard(len - value, vec![(*a, -u), (*b, u)])]
        }
        Constraint::HorizontalDistance { a, b, value } => {
            let d = p.pos(*b).x - p.pos(*a).x;
            vec![Residual::hard(
                d - value,
                vec![(*a, Vec2::new(-1.0, 0.0)), (*b, Vec2::new(1.0, 0.0))],
            )]
        }
        Constraint::VerticalDistance { a, b, value } => {
            let d = p.pos(*b).y - p.pos(*a).y;
            vec![Residual::hard(
                d - value,
                vec![(*a, Vec2::new(0.0, -1.0)), (*b, Vec2::new(0.0, 1.0))],
            )]
        }
        Constraint::Angle { a, b, value } => {
            let (Some((a0, a1)), Some((b0, b1))) = (p.line_points(*a), p.line_points(*b)) else {
                return Vec::new();
            };
            let da = p.pos(a1) - p.pos(a0);
            let db = p.pos(b1) - p.pos(b0);
            let la = da.norm().max(LEN_EPS);
            let lb = db.norm().max(LEN_EPS);
            let scale = 1.0 / (la * lb);
            let (sin_t, cos_t) = value.sin_cos();
            // r = (cross·cosθ − dot·sinθ) / (|da||db|) = sin(φ − θ)
            let value_r = (cross(&da, &db) * cos_t - da.dot(&db) * sin_t) * scale;
            let d_cross_a0 = Vec2::new(-db.y, db.x) * -1.0;
            let d_cross_a1 = Vec2::new(-db.y, db.x);
            let d_cross_b0 = Vec2::new(da.y, -da.x) * -1.0;
            let d_cross_b1 = Vec2::new(da.y, -da.x);
            let d_dot_a0 = -db;
            let d_dot_a1 = db;
            let d_dot_b0 = -da;
            let d_dot_b1 = da;
            vec![Residual::hard(
                value_r,
                vec![
                    (a0, (d_cross_a0 * cos_t - d_dot_a0 * sin_t) * scale),
                    (a1, (d_cross_a1 * cos_t - d_dot_a1 * sin_t) * scale),
                    (b0, (d_cross_b0 * cos_t - d_dot_b0 * sin_t) * scale),
                    (b1, (d_cross_b1 * cos_t - d_dot_b1 * sin_t) * scale),
                ],
            )]
        }
        Constraint::Radius { arc, value } => {
            let Some((s, c)) = p.arc_points(*arc) else {
                return Vec::new();
            };
            let d = p.pos(s) - p.pos(c);
            let r = d.norm().max(LEN_EPS);
            let u = d / r;
            vec![Residual::hard(r - value, vec![(s, u), (c, -u)])]
        }
        Constraint::PointOnLine { point, line } => {
            let Some((l0, l1)) = p.line_points(*line) else {
                return Vec::new();
            };
            vec![point_line_residual(p, *point, l0, l1)]
        }
        Constraint::PointOnArc { point, arc } => {
            let Some((s, c)) = p.arc_points(*arc) else {
                return Vec::new();
            };
            let radius_vec = p.pos(s) - p.pos(c);
            let radius = radius_vec.norm().max(LEN_EPS);
            let ur = radius_vec / radius;
            let d = p.pos(*point) - p.pos(c);
            let dist = d.norm().max(LEN_EPS);
            let ud = d / dist;
            vec![Residual::hard(
                dist - radius,
                vec![(*point, ud), (c, -ud + ur), (s, -ur)],
            )]
        }
        Constraint::Midpoint { point, line } => {
            let Some((l0, l1)) = p.line_points(*line) else {
                return Vec::new();
            };
            let m = (p.pos(l0).coords + p.pos(l1).coords) * 0.5;
            let pos = p.pos(*point);
            vec![
                Residual::hard(
                    pos.x - m.x,
                    vec![
                        (*point, Vec2::new(1.0, 0.0)),
                        (l0, Vec2::new(-0.5, 0.0)),
                        (l1, Vec2::new(-0.5, 0.0)),
                    ],
                ),
                Residual::hard(
                    pos.y - m.y,
                    vec![
                        (*point, Vec2::new(0.0, 1.0)),
                        (l0, Vec2::new(0.0, -0.5)),
                        (l1, Vec2::new(0.0, -0.5)),
                    ],
                ),
            ]
        }
        Constraint::Symmetric { a, b, axis } => {
            let Some((l0, l1)) = p.line_points(*axis) else {
                return Vec::new();
            };
            let d = p.pos(l1) - p.pos(l0);
            let len = d.norm().max(LEN_EPS);
            let u = d / len;
            let pa = p.pos(*a);
            let pb = p.pos(*b);
            // Midpoint of a,b on the axis line
            let m = Point2::from((pa.coords + pb.coords) * 0.5);
            let mid_on_axis = {
                let rel = m - p.pos(l0);
                let value = cross(&d, &rel) / len;
                let g_pt = Vec2::new(-d.y, d.x) / len;
                Residual::hard(
                    value,
                    vec![
                        (*a, g_pt * 0.5),
                        (*b, g_pt * 0.5),
                        (l1, Vec2::new(rel.y, -rel.x) / len),
                        (l0, Vec2::new(-rel.y + d.y, rel.x - d.x) / len),
                    ],
                )
            };
            // a − b perpendicular to the axis
            let ab = pa - pb;
            let perp = Residual::hard(
                u.dot(&ab),
                vec![(*a, u), (*b, -u)],
            );
            vec![mid_on_axis, perp]
        }
    }
}

/// Two residuals `a − b` in x and y.
fn point_pair_delta(p: &EvalPositions<'_>, a: SketchPointId, b: SketchPointId) -> Vec<Residual> {
    let pa = p.pos(a);
    let pb = p.pos(b);
    vec![
        Residual::hard(
            pa.x - pb.x,
            vec![(a, Vec2::new(1.0, 0.0)), (b, Vec2::new(-1.0, 0.0))],
        ),
        Residual::hard(
            pa.y - pb.y,
            vec![(a, Vec2::new(0.0, 1.0)), (b, Vec2::new(0.0, -1.0))],
        ),
    ]
}

fn resolve_hv(
    p: &EvalPositions<'_>,
    target: &HvTarget,
) -> Option<(SketchPointId, SketchPointId)> {
    match target {
        HvTarget::Points(a, b) => Some((*a, *b)),
        HvTarget::Line(l) => p.line_points(*l),
    }
}

fn cross(a: &Vec2, b: &Vec2) -> f64 {
    a.x * b.y - a.y * b.x
}

/// `cross(d1, d2)` normalized by the longer segment.
fn cross_residual(
    p: &EvalPositions<'_>,
    a0: SketchPointId,
    a1: SketchPointId,
    b0: SketchPointId,
    b1: SketchPointId,
) -> Residual {
    let da = p.pos(a1) - p.pos(a0);
    let db = p.pos(b1) - p.pos(b0);
    let scale = 1.0 / da.norm().max(db.norm()).max(LEN_EPS);
    let value = cross(&da, &db) * scale;
    Residual::hard(
        value,
        vec![
            (a0, Vec2::new(db.y, -db.x) * scale),
            (a1, Vec2::new(-db.y, db.x) * scale),
            (b0, Vec2::new(-da.y, da.x) * scale),
            (b1, Vec2::new(da.y, -da.x) * scale),
        ],
    )
}

/// `dot(d1, d2)` normalized by the longer segment.
fn dot_residual(
    p: &EvalPositions<'_>,
    a0: SketchPointId,
    a1: SketchPointId,
    b0: SketchPointId,
    b1: SketchPointId,
) -> Residual {
    let da = p.pos(a1) - p.pos(a0);
    let db = p.pos(b1) - p.pos(b0);
    let scale = 1.0 / da.norm().max(db.norm()).max(LEN_EPS);
    let value = da.dot(&db) * scale;
    Residual::hard(
        value,
        vec![
            (a0, -db * scale),
            (a1, db * scale),
            (b0, -da * scale),
            (b1, da * scale),
        ],
    )
}

/// Signed distance of `point` from the infinite line `l0→l1`.
fn point_line_residual(
    p: &EvalPositions<'_>,
    point: SketchPointId,
    l0: SketchPointId,
    l1: SketchPointId,
) -> Residual {
    let d = p.pos(l1) - p.pos(l0);
    let len = d.norm().max(LEN_EPS);
    let rel = p.pos(point) - p.pos(l0);
    let value = cross(&d, &rel) / len;
    Residual::hard(
        value,
        vec![
            (point, Vec2::new(-d.y, d.x) / len),
            (l1, Vec2::new(rel.y, -rel.x) / len),
            (l0, Vec2::new(-rel.y + d.y, rel.x - d.x) / len),
        ],
    )
}

fn eval_tangent(p: &EvalPositions<'_>, a: SketchEntityId, b: SketchEntityId) -> Vec<Residual> {
    // line–arc: distance from arc center to the line equals the radius.
    if let (Some((l0, l1)), Some((s, c))) = (p.line_points(a), p.arc_points(b)) {
        return vec![line_arc_tangent(p, l0, l1, s, c)];
    }
    if let (Some((s, c)), Some((l0, l1))) = (p.arc_points(a), p.line_points(b)) {
        return vec![line_arc_tangent(p, l0, l1, s, c)];
    }
    // arc–arc: center distance equals the sum (external tangency) or the
    // difference (internal) of the radii; the branch nearest the current
    // state is the one solved for.
    if let (Some((s1, c1)), Some((s2, c2))) = (p.arc_points(a), p.arc_points(b)) {
        let d = p.pos(c2) - p.pos(c1);
        let dist = d.norm().max(LEN_EPS);
        let ud = d / dist;
        let r1v = p.pos(s1) - p.pos(c1);
        let r2v = p.pos(s2) - p.pos(c2);
        let r1 = r1v.norm().max(LEN_EPS);
        let r2 = r2v.norm().max(LEN_EPS);
        let u1 = r1v / r1;
        let u2 = r2v / r2;
        let external = (dist - (r1 + r2)).abs() <= (dist - (r1 - r2).abs()).abs();
        // value = dist − (s1·r1 + s2·r2) with branch signs s1, s2
        let (sign1, sign2) = if external {
            (1.0, 1.0)
        } else if r1 >= r2 {
            (1.0, -1.0)
        } else {
            (-1.0, 1.0)
        };
        let value = dist - (sign1 * r1 + sign2 * r2);
        return vec![Residual::hard(
            value,
            vec![
                (c1, -ud + sign1 * u1),
                (s1, -sign1 * u1),
                (c2, ud + sign2 * u2),
                (s2, -sign2 * u2),
            ],
        )];
    }
    Vec::new()
}

fn line_arc_tangent(
    p: &EvalPositions<'_>,
    l0: SketchPointId,
    l1: SketchPointId,
    s: SketchPointId,
    c: SketchPointId,
) -> Residual {
    let d = p.pos(l1) - p.pos(l0);
    let len = d.norm().max(LEN_EPS);
    let rel = p.pos(c) - p.pos(l0);
    let signed = cross(&d, &rel) / len;
    let sign = if signed >= 0.0 { 1.0 } else { -1.0 };
    let radius_vec = p.pos(s) - p.pos(c);
    let radius = radius_vec.norm().max(LEN_EPS);
    let ur = radius_vec / radius;

    // value = sign · cross(d, c − l0)/len − |s − c|, len locally constant
    let d_cross_l1 = Vec2::new(rel.y, -rel.x);
    let d_cross_l0 = Vec2::new(-rel.y + d.y, rel.x - d.x);
    let d_cross_c = Vec2::new(-d.y, d.x);
    Residual::hard(
        sign * signed - radius,
        vec![
            (l0, sign * d_cross_l0 / len),
            (l1, sign * d_cross_l1 / len),
            (c, sign * d_cross_c / len + ur),
            (s, -ur),
        ],
    )
}
