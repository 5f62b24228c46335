//! Stage-4 piece selection.
//!
//! After classification, each operation retains pieces per side:
//!
//! | op        | keep from A          | keep from B        | flip B? |
//! |-----------|----------------------|--------------------|---------|
//! | union     | outside, on_same     | outside            | no      |
//! | subtract  | outside, on_opposite | inside, on_same    | yes     |
//! | intersect | inside, on_opposite  | inside, on_same    | no      |
//!
//! Shared-boundary pieces are accounted for on one side only so the
//! result carries the interface exactly once: `on_same` is retained
//! from A on union and from B on subtract and intersect; `on_opposite`
//! belongs to the operator that wants the shared boundary from the
//! right side.

use crate::classify::PieceLabel;
use crate::BooleanOp;

/// Selection table, A side.
pub fn keep_from_a(op: BooleanOp, label: PieceLabel) -> bool {
    match op {
        BooleanOp::Union => matches!(label, PieceLabel::Outside | PieceLabel::OnSame),
        BooleanOp::Subtract => matches!(label, PieceLabel::Outside | PieceLabel::OnOpposite),
        BooleanOp::Intersect => matches!(label, PieceLabel::Inside | PieceLabel::OnOpposite),
    }
}

/// Selection table, B side.
pub fn keep_from_b(op: BooleanOp, label: PieceLabel) -> bool {
    match op {
        BooleanOp::Union => matches!(label, PieceLabel::Outside),
        BooleanOp::Subtract => matches!(label, PieceLabel::Inside | PieceLabel::OnSame),
        BooleanOp::Intersect => matches!(label, PieceLabel::Inside | PieceLabel::OnSame),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LABELS: [PieceLabel; 4] = [
        PieceLabel::Inside,
        PieceLabel::Outside,
        PieceLabel::OnSame,
        PieceLabel::OnOpposite,
    ];

    #[test]
    fn test_union_keeps() {
        let a: Vec<_> = LABELS
            .iter()
            .filter(|&&l| keep_from_a(BooleanOp::Union, l))
            .collect();
        assert_eq!(a, [&PieceLabel::Outside, &PieceLabel::OnSame]);
        let b: Vec<_> = LABELS
            .iter()
            .filter(|&&l| keep_from_b(BooleanOp::Union, l))
            .collect();
        assert_eq!(b, [&PieceLabel::Outside]);
    }

    #[test]
    fn test_subtract_keeps() {
        let a: Vec<_> = LABELS
            .iter()
            .filter(|&&l| keep_from_a(BooleanOp::Subtract, l))
            .collect();
        assert_eq!(a, [&PieceLabel::Outside, &PieceLabel::OnOpposite]);
        let b: Vec<_> = LABELS
            .iter()
            .filter(|&&l| keep_from_b(BooleanOp::Subtract, l))
            .collect();
        assert_eq!(b, [&PieceLabel::Inside, &PieceLabel::OnSame]);
    }

    #[test]
    fn test_intersect_keeps() {
        let a: Vec<_> = LABELS
            .iter()
            .filter(|&&l| keep_from_a(BooleanOp::Intersect, l))
            .collect();
        assert_eq!(a, [&PieceLabel::Inside, &PieceLabel::OnOpposite]);
        let b: Vec<_> = LABELS
            .iter()
            .filter(|&&l| keep_from_b(BooleanOp::Intersect, l))
            .collect();
        assert_eq!(b, [&PieceLabel::Inside, &PieceLabel::OnSame]);
    }

    #[test]
    fn test_on_same_accounted_once_per_op() {
        // Exactly one side retains a shared same-normal boundary
        for op in [BooleanOp::Union, BooleanOp::Subtract, BooleanOp::Intersect] {
            let sides = [
                keep_from_a(op, PieceLabel::OnSame),
                keep_from_b(op, PieceLabel::OnSame),
            ];
            assert_eq!(
                sides.iter().filter(|&&k| k).count(),
                1,
                "on_same must be kept by exactly one side for {op:?}"
            );
        }
    }
}
