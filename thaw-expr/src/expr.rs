//! Predicate AST for scan qualifiers.
//!
//! Consumers hand the planner a flat AND-list of [`QualNode`]s. The planner
//! classifies each node as vectorizable (evaluated over whole decoded
//! batches) or residual (evaluated row by row after materialization).

use std::cmp::Ordering;

use thaw_types::{Literal, Value};

/// Binary comparison operators the scan understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl CompareOp {
    /// SQL display symbol.
    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::NotEq => "<>",
            CompareOp::Lt => "<",
            CompareOp::LtEq => "<=",
            CompareOp::Gt => ">",
            CompareOp::GtEq => ">=",
        }
    }

    /// All scan comparison operators are strict: a null operand makes the
    /// predicate fail rather than match.
    pub fn is_strict(&self) -> bool {
        true
    }
}

/// One operand of a binary qualifier.
#[derive(Clone, Debug, PartialEq)]
pub enum QualOperand {
    /// Reference to an output column of the decompressed relation, by name.
    Column(String),
    /// A constant known at plan time.
    Literal(Literal),
    /// An external parameter resolved only at run time. Never vectorized.
    Param(u32),
    /// A call to a volatile function, named for diagnostics. Never
    /// vectorized and never constant-folded.
    Volatile(String),
    /// The table-identity pseudo column. Constified to the scanned
    /// relation's id before classification.
    RelationIdentity,
}

/// A qualifier as supplied by the consumer: a binary comparison between two
/// operands. Non-binary shapes are not expressible and therefore always stay
/// residual at the consumer's level.
#[derive(Clone, Debug, PartialEq)]
pub struct QualNode {
    pub lhs: QualOperand,
    pub op: CompareOp,
    pub rhs: QualOperand,
}

impl QualNode {
    pub fn new(lhs: QualOperand, op: CompareOp, rhs: QualOperand) -> Self {
        Self { lhs, op, rhs }
    }

    /// Convenience constructor for the common `column op literal` shape.
    pub fn compare<L: Into<Literal>>(column: &str, op: CompareOp, literal: L) -> Self {
        Self {
            lhs: QualOperand::Column(column.to_string()),
            op,
            rhs: QualOperand::Literal(literal.into()),
        }
    }
}

/// A residual qualifier bound to an output position, evaluated row by row
/// on materialized output rows.
#[derive(Clone, Debug)]
pub struct RowQual {
    pub output_position: usize,
    pub op: CompareOp,
    /// `None` is SQL NULL; strict operators then never match.
    pub constant: Option<Value>,
    pub display: String,
}

impl RowQual {
    /// Strict SQL comparison semantics: a null on either side fails.
    pub fn matches(&self, row_value: Option<&Value>) -> bool {
        let (Some(lhs), Some(rhs)) = (row_value, self.constant.as_ref()) else {
            return false;
        };
        let Some(ordering) = compare_values(lhs, rhs) else {
            return false;
        };
        match self.op {
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::NotEq => ordering != Ordering::Equal,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::LtEq => ordering != Ordering::Greater,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::GtEq => ordering != Ordering::Less,
        }
    }
}

/// Compare two values of the same element type. `None` for incomparable
/// type combinations, which classification prevents from reaching here.
pub(crate) fn compare_values(lhs: &Value, rhs: &Value) -> Option<Ordering> {
    match (lhs, rhs) {
        (Value::Int32(a), Value::Int32(b)) => Some(a.cmp(b)),
        (Value::Int64(a), Value::Int64(b)) => Some(a.cmp(b)),
        (Value::Float32(a), Value::Float32(b)) => Some(a.total_cmp(b)),
        (Value::Float64(a), Value::Float64(b)) => Some(a.total_cmp(b)),
        (Value::Str(a), Value::Str(b)) => Some(a.as_ref().cmp(b.as_ref())),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}
