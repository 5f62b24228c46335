#![warn(missing_docs)]

//! Sketch constraint solver for the arbor kernel.
//!
//! Treats the (x, y) coordinates of all non-fixed sketch points as the
//! state vector and minimizes the stacked constraint residuals with
//! Levenberg–Marquardt. Before solving, the sketch is partitioned into
//! connected components over a point graph induced by entities and
//! constraints, and each component is solved independently.
//!
//! Driven points (drag targets) and external attachments contribute
//! weighted soft residuals on top of the hard constraints; the solve
//! status is judged on the hard residuals alone.

use std::collections::{BTreeMap, BTreeSet};

use arbor_kernel_math::{Point2, Vec2};
use arbor_kernel_sketch::{Sketch, SketchPointId};
use nalgebra::{DMatrix, DVector};

mod residual;

pub use residual::{eval_constraint, EvalPositions, Residual};

/// Weight applied to driven-point residuals.
pub const DRIVEN_WEIGHT: f64 = 1000.0;
/// Weight applied to vertex attachment residuals (hard pin).
pub const ATTACH_VERTEX_WEIGHT: f64 = 1000.0;
/// Weight applied to edge attachment residuals (point may slide).
pub const ATTACH_EDGE_WEIGHT: f64 = 100.0;

/// Hard-residual bound below which a plateaued solve still counts as solved.
const HARD_ACCEPT: f64 = 1e-8;

/// Solver parameters.
#[derive(Debug, Clone, Copy)]
pub struct SolveOptions {
    /// Maximum Levenberg–Marquardt iterations per component.
    pub max_iterations: usize,
    /// Success when `‖r‖² < residual_tolerance²`.
    pub residual_tolerance: f64,
    /// Initial damping factor λ.
    pub initial_lambda: f64,
    /// Weight for driven-point residuals.
    pub driven_weight: f64,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            residual_tolerance: 1e-10,
            initial_lambda: 1e-3,
            driven_weight: DRIVEN_WEIGHT,
        }
    }
}

/// Diagnostic status of a solve or DOF analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    /// All hard residuals are below tolerance.
    Solved,
    /// The sketch has remaining degrees of freedom (from [`diagnose`]).
    UnderConstrained,
    /// Constraints are redundant for the available freedoms (from [`diagnose`]).
    OverConstrained,
    /// The solve plateaued with conflicting constraints.
    Inconsistent,
    /// The normal equations were singular (or produced non-finite values).
    Singular,
    /// Iteration budget exhausted before convergence.
    NotConverged,
}

/// Result of a sketch solve.
#[derive(Debug, Clone, Copy)]
pub struct SolveOutcome {
    /// Aggregate status over all components.
    pub status: SolveStatus,
    /// Remaining degrees of freedom across the sketch.
    pub dof: usize,
    /// Iterations used by the slowest component.
    pub iterations: usize,
    /// Largest hard-residual magnitude after the solve.
    pub max_residual: f64,
}

/// Projected target of an external attachment, already mapped into the
/// sketch plane by the caller.
#[derive(Debug, Clone, Copy)]
pub enum AttachmentTarget {
    /// Attachment to a model vertex: the point is pinned at the target.
    Vertex(Point2),
    /// Attachment to a model edge: the point stays on the projected edge
    /// line but may slide along it.
    Edge {
        /// Projected edge start.
        a: Point2,
        /// Projected edge end.
        b: Point2,
    },
}

/// Structural DOF analysis result.
#[derive(Debug, Clone, Copy)]
pub struct DofAnalysis {
    /// Fully constrained, under- or over-constrained.
    pub status: SolveStatus,
    /// Remaining degrees of freedom.
    pub dof: usize,
    /// Redundant constraint equations.
    pub redundant: usize,
}

/// Solve the sketch's hard constraints in place.
pub fn solve_sketch(sketch: &mut Sketch, options: &SolveOptions) -> SolveOutcome {
    solve_sketch_driven(sketch, options, &BTreeMap::new(), &[])
}

/// Solve with driven points (drag targets) and external attachments.
///
/// The previous point positions are the initial guess (warm start). On a
/// `Singular` outcome the sketch keeps its previous positions; every
/// other outcome writes back the best iterate.
pub fn solve_sketch_driven(
    sketch: &mut Sketch,
    options: &SolveOptions,
    driven: &BTreeMap<SketchPointId, Point2>,
    attachments: &[(SketchPointId, AttachmentTarget)],
) -> SolveOutcome {
    let components = partition(sketch);

    let mut status = SolveStatus::Solved;
    let mut dof_total = 0usize;
    let mut iterations = 0usize;
    let mut max_residual = 0.0f64;

    for component in &components {
        let outcome = solve_component(sketch, options, component, driven, attachments);
        dof_total += outcome.dof;
        iterations = iterations.max(outcome.iterations);
        max_residual = max_residual.max(outcome.max_residual);
        status = worse_status(status, outcome.status);
    }

    SolveOutcome {
        status,
        dof: dof_total,
        iterations,
        max_residual,
    }
}

/// Structural analysis: degrees of freedom and redundancy over the whole
/// sketch, from the rank of the hard-constraint jacobian at the current
/// positions.
pub fn diagnose(sketch: &Sketch) -> DofAnalysis {
    let free: Vec<SketchPointId> = sketch
        .points
        .iter()
        .filter(|(_, p)| !p.fixed)
        .map(|(&id, _)| id)
        .collect();
    let slots: BTreeMap<SketchPointId, usize> =
        free.iter().enumerate().map(|(i, &id)| (id, i)).collect();
    let n = 2 * free.len();

    let overlay = BTreeMap::new();
    let positions = EvalPositions::new(sketch, &overlay);
    let mut rows: Vec<Residual> = Vec::new();
    for c in &sketch.constraints {
        rows.extend(eval_constraint(&positions, c));
    }
    let m = rows.len();
    if n == 0 {
        return DofAnalysis {
            status: if m == 0 {
                SolveStatus::Solved
            } else {
                SolveStatus::OverConstrained
            },
            dof: 0,
            redundant: m,
        };
    }

    let mut j = DMatrix::<f64>::zeros(m, n);
    for (row, res) in rows.iter().enumerate() {
        for (pt, g) in &res.grads {
            if let Some(&slot) = slots.get(pt) {
                j[(row, 2 * slot)] += g.x;
                j[(row, 2 * slot + 1)] += g.y;
            }
        }
    }
    let rank = jacobian_rank(&j);
    let dof = n - rank;
    let redundant = m.saturating_sub(rank);
    let status = if dof > 0 {
        SolveStatus::UnderConstrained
    } else if redundant > 0 {
        SolveStatus::OverConstrained
    } else {
        SolveStatus::Solved
    };
    DofAnalysis {
        status,
        dof,
        redundant,
    }
}

// =============================================================================
// Partitioning
// =============================================================================

/// Connected components of non-fixed points, linked by entity and
/// constraint co-occurrence.
fn partition(sketch: &Sketch) -> Vec<Vec<SketchPointId>> {
    let free: Vec<SketchPointId> = sketch
        .points
        .iter()
        .filter(|(_, p)| !p.fixed)
        .map(|(&id, _)| id)
        .collect();
    let mut parent: BTreeMap<SketchPointId, SketchPointId> =
        free.iter().map(|&id| (id, id)).collect();

    fn find(parent: &mut BTreeMap<SketchPointId, SketchPointId>, x: SketchPointId) -> SketchPointId {
        let mut root = x;
        while parent[&root] != root {
            root = parent[&root];
        }
        let mut cur = x;
        while parent[&cur] != root {
            let next = parent[&cur];
            parent.insert(cur, root);
            cur = next;
        }
        root
    }

    let union = |parent: &mut BTreeMap<SketchPointId, SketchPointId>,
                 a: SketchPointId,
                 b: SketchPointId| {
        if !parent.contains_key(&a) || !parent.contains_key(&b) {
            return;
        }
        let ra = find(parent, a);
        let rb = find(parent, b);
        if ra != rb {
            parent.insert(ra, rb);
        }
    };

    for id in sketch.entities.keys() {
        let pts = sketch.entity_points(*id).unwrap_or_default();
        for w in pts.windows(2) {
            union(&mut parent, w[0], w[1]);
        }
    }
    for c in &sketch.constraints {
        let pts: Vec<SketchPointId> = c
            .touched_points(sketch)
            .into_iter()
            .filter(|id| parent.contains_key(id))
            .collect();
        for w in pts.windows(2) {
            union(&mut parent, w[0], w[1]);
        }
    }

    let mut groups: BTreeMap<SketchPointId, Vec<SketchPointId>> = BTreeMap::new();
    for &id in &free {
        let root = find(&mut parent, id);
        groups.entry(root).or_default().push(id);
    }
    groups.into_values().collect()
}

// =============================================================================
// Component solve
// =============================================================================

fn solve_component(
    sketch: &mut Sketch,
    options: &SolveOptions,
    component: &[SketchPointId],
    driven: &BTreeMap<SketchPointId, Point2>,
    attachments: &[(SketchPointId, AttachmentTarget)],
) -> SolveOutcome {
    let slots: BTreeMap<SketchPointId, usize> = component
        .iter()
        .enumerate()
        .map(|(i, &id)| (id, i))
        .collect();
    let n = 2 * component.len();

    let in_component: BTreeSet<SketchPointId> = component.iter().copied().collect();
    let constraints: Vec<_> = sketch
        .constraints
        .iter()
        .filter(|c| {
            c.touched_points(sketch)
                .iter()
                .any(|p| in_component.contains(p))
        })
        .cloned()
        .collect();
    let driven: Vec<(SketchPointId, Point2)> = driven
        .iter()
        .filter(|(id, _)| in_component.contains(id))
        .map(|(&id, &target)| (id, target))
        .collect();
    let attachments: Vec<(SketchPointId, AttachmentTarget)> = attachments
        .iter()
        .filter(|(id, _)| in_component.contains(id))
        .copied()
        .collect();

    // Warm start from the current positions
    let mut state = DVector::<f64>::zeros(n);
    for (&id, &slot) in &slots {
        let p = sketch.points[&id].position;
        state[2 * slot] = p.x;
        state[2 * slot + 1] = p.y;
    }

    // Nothing to do for an unconstrained point cluster
    if constraints.is_empty() && driven.is_empty() && attachments.is_empty() {
        return SolveOutcome {
            status: SolveStatus::Solved,
            dof: n,
            iterations: 0,
            max_residual: 0.0,
        };
    }

    let assemble = |state: &DVector<f64>| -> Assembled {
        let mut overlay = BTreeMap::new();
        for (&id, &slot) in &slots {
            overlay.insert(id, Point2::new(state[2 * slot], state[2 * slot + 1]));
        }
        let positions = EvalPositions::new(sketch, &overlay);

        let mut rows: Vec<Residual> = Vec::new();
        for c in &constraints {
            rows.extend(eval_constraint(&positions, c));
        }
        let hard_rows = rows.len();
        for &(id, target) in &driven {
            let pos = positions.pos(id);
            rows.push(Residual {
                value: pos.x - target.x,
                grads: vec![(id, Vec2::new(1.0, 0.0))],
                weight: options.driven_weight,
            });
            rows.push(Residual {
                value: pos.y - target.y,
                grads: vec![(id, Vec2::new(0.0, 1.0))],
                weight: options.driven_weight,
            });
        }
        for &(id, target) in &attachments {
            let pos = positions.pos(id);
            match target {
                AttachmentTarget::Vertex(t) => {
                    rows.push(Residual {
                        value: pos.x - t.x,
                        grads: vec![(id, Vec2::new(1.0, 0.0))],
                        weight: ATTACH_VERTEX_WEIGHT,
                    });
                    rows.push(Residual {
                        value: pos.y - t.y,
                        grads: vec![(id, Vec2::new(0.0, 1.0))],
                        weight: ATTACH_VERTEX_WEIGHT,
                    });
                }
                AttachmentTarget::Edge { a, b } => {
                    // Perpendicular distance to the projected edge line
                    let d = b - a;
                    let len = d.norm().max(1e-12);
                    let rel = pos - a;
                    rows.push(Residual {
                        value: (d.x * rel.y - d.y * rel.x) / len,
                        grads: vec![(id, Vec2::new(-d.y, d.x) / len)],
                        weight: ATTACH_EDGE_WEIGHT,
                    });
                }
            }
        }

        let m = rows.len();
        let mut r = DVector::<f64>::zeros(m);
        let mut j = DMatrix::<f64>::zeros(m, n);
        let mut hard_inf = 0.0f64;
        for (row, res) in rows.iter().enumerate() {
            r[row] = res.value * res.weight;
            for (pt, g) in &res.grads {
                if let Some(&slot) = slots.get(pt) {
                    j[(row, 2 * slot)] += g.x * res.weight;
                    j[(row, 2 * slot + 1)] += g.y * res.weight;
                }
            }
            if row < hard_rows {
                hard_inf = hard_inf.max(res.value.abs());
            }
        }
        Assembled { r, j, hard_inf }
    };

    let tol2 = options.residual_tolerance * options.residual_tolerance;
    let mut current = assemble(&state);
    let mut cost = current.r.norm_squared();
    let mut lambda = options.initial_lambda;
    let mut iterations = 0usize;
    let mut stalled = 0usize;
    let mut singular = false;

    while iterations < options.max_iterations {
        if cost < tol2 {
            break;
        }
        iterations += 1;

        let jt = current.j.transpose();
        let jtj = &jt * &current.j;
        let jtr = &jt * &current.r;

        // Escalate damping until the normal equations factor
        let mut step = None;
        let mut lam = lambda;
        for _ in 0..10 {
            let a = &jtj + DMatrix::<f64>::identity(n, n) * lam;
            if let Some(chol) = a.cholesky() {
                let candidate = chol.solve(&(-&jtr));
                if candidate.iter().all(|v| v.is_finite()) {
                    step = Some(candidate);
                    lambda = lam;
                    break;
                }
            }
            lam *= 10.0;
        }
        let Some(step) = step else {
            singular = true;
            break;
        };

        let trial = &state + &step;
        let trial_assembled = assemble(&trial);
        let trial_cost = trial_assembled.r.norm_squared();
        if trial_cost.is_finite() && trial_cost < cost {
            let improvement = (cost - trial_cost) / cost.max(f64::MIN_POSITIVE);
            state = trial;
            current = trial_assembled;
            cost = trial_cost;
            lambda = (lambda * 0.5).max(1e-15);
            if improvement < 1e-12 {
                stalled += 1;
            } else {
                stalled = 0;
            }
        } else {
            lambda *= 4.0;
            stalled += 1;
        }
        if stalled >= 5 {
            break;
        }
    }

    // Structural freedom estimate: one removed freedom per constraint
    // object touching the component. The exact null-space dimension is
    // available through `diagnose`.
    let dof = n.saturating_sub(constraints.len());

    let status = if singular {
        SolveStatus::Singular
    } else if cost < tol2 || current.hard_inf < HARD_ACCEPT {
        SolveStatus::Solved
    } else if stalled >= 5 {
        SolveStatus::Inconsistent
    } else {
        SolveStatus::NotConverged
    };

    // Singular solves keep the previous positions; everything else gets
    // the best iterate.
    if status != SolveStatus::Singular {
        for (&id, &slot) in &slots {
            let p = Point2::new(state[2 * slot], state[2 * slot + 1]);
            let _ = sketch.set_point_position(id, p);
        }
    }

    SolveOutcome {
        status,
        dof,
        iterations,
        max_residual: current.hard_inf,
    }
}

struct Assembled {
    r: DVector<f64>,
    j: DMatrix<f64>,
    hard_inf: f64,
}

fn worse_status(a: SolveStatus, b: SolveStatus) -> SolveStatus {
    fn severity(s: SolveStatus) -> u8 {
        match s {
            SolveStatus::Solved => 0,
            SolveStatus::UnderConstrained => 1,
            SolveStatus::OverConstrained => 2,
            SolveStatus::NotConverged => 3,
            SolveStatus::Inconsistent => 4,
            SolveStatus::Singular => 5,
        }
    }
    if severity(b) > severity(a) {
        b
    } else {
        a
    }
}

/// Numeric rank of a jacobian via its singular values.
fn jacobian_rank(j: &DMatrix<f64>) -> usize {
    let (m, n) = j.shape();
    if m == 0 || n == 0 {
        return 0;
    }
    let svd = j.clone().svd(false, false);
    let sigma_max = svd.singular_values.iter().cloned().fold(0.0f64, f64::max);
    if sigma_max <= 0.0 {
        return 0;
    }
    let eps = (m.max(n) as f64) * f64::EPSILON * sigma_max;
    svd.singular_values.iter().filter(|&&s| s > eps).count()
}
