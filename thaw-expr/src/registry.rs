//! Operator registries consulted during qualifier classification.
//!
//! Vectorization requires two lookups: a commutator when the constant sits
//! on the left of the comparison, and a vector-predicate entry proving the
//! operator has a batch implementation for the column's element type.

use thaw_types::ElementType;

use crate::CompareOp;

/// Commuted form of a comparison, for rewriting `Const op Var` into
/// `Var op' Const`. Every scan comparison has one.
pub fn commutator(op: CompareOp) -> Option<CompareOp> {
    match op {
        CompareOp::Eq => Some(CompareOp::Eq),
        CompareOp::NotEq => Some(CompareOp::NotEq),
        CompareOp::Lt => Some(CompareOp::Gt),
        CompareOp::LtEq => Some(CompareOp::GtEq),
        CompareOp::Gt => Some(CompareOp::Lt),
        CompareOp::GtEq => Some(CompareOp::LtEq),
    }
}

/// Whether a vectorized implementation exists for `op` over batches of the
/// given element type. Batch predicates run over decoded primitive buffers,
/// so only bulk-capable types are registered.
pub fn vector_predicate_supported(op: CompareOp, ty: ElementType) -> bool {
    let _ = op;
    ty.supports_bulk()
}
