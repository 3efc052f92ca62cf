//! Qualifier classification: vectorizable vs residual.
//!
//! A qualifier is vectorizable iff it is a binary comparison where, after
//! optional commutation, one operand references a compressed column that
//! supports bulk decompression and the other is a plan-time constant, and
//! the operator is in the vector-predicate registry. Everything else stays
//! residual and is evaluated row by row on materialized output rows.

use thaw_expr::{commutator, vector_predicate_supported, QualNode, QualOperand, RowQual};
use thaw_result::{Error, Result};
use thaw_types::{Literal, RelationId, Value};

use crate::mapping::{ColumnKind, ScanMapping};

/// A qualifier promoted to batch-at-a-time evaluation.
#[derive(Clone, Debug)]
pub struct VectorQual {
    pub output_position: usize,
    pub op: thaw_expr::CompareOp,
    /// The constant, coerced to the column's element type; `None` is SQL
    /// NULL, which under our strict operators filters the whole scan.
    pub constant: Option<Value>,
    pub display: String,
}

/// Result of classifying a scan's qualifier list.
#[derive(Debug, Default)]
pub struct ClassifiedQuals {
    pub vectorized: Vec<VectorQual>,
    pub residual: Vec<RowQual>,
    /// Set when a constant-only qualifier folded to false or NULL; the scan
    /// then emits nothing.
    pub constant_false: bool,
}

/// Classify `quals` against the scan mapping. `vectorize` is false when
/// bulk decompression is off for this scan, which forces everything
/// residual.
pub fn classify_quals(
    quals: Vec<QualNode>,
    mapping: &ScanMapping,
    relation_id: RelationId,
    vectorize: bool,
) -> Result<ClassifiedQuals> {
    let mut out = ClassifiedQuals::default();

    for qual in quals {
        let qual = constify_relation_identity(qual, relation_id);

        // Constant-only comparisons fold at plan time.
        if let (QualOperand::Literal(lhs), QualOperand::Literal(rhs)) = (&qual.lhs, &qual.rhs) {
            if !fold_constant_comparison(lhs, qual.op, rhs)? {
                out.constant_false = true;
            }
            continue;
        }

        match try_vectorize(&qual, mapping, vectorize)? {
            Some(vector_qual) => out.vectorized.push(vector_qual),
            None => out.residual.push(bind_residual(qual, mapping)?),
        }
    }

    Ok(out)
}

/// Replace table-identity references with the scanned relation's id. Any
/// deeper system-column support would need the projection layer to invent
/// attributes the virtual decompressed rows don't have, so it stays
/// restricted to this one pseudo column.
fn constify_relation_identity(mut qual: QualNode, relation_id: RelationId) -> QualNode {
    let constify = |operand: QualOperand| match operand {
        QualOperand::RelationIdentity => QualOperand::Literal(Literal::Int(relation_id as i64)),
        other => other,
    };
    qual.lhs = constify(qual.lhs);
    qual.rhs = constify(qual.rhs);
    qual
}

fn fold_constant_comparison(
    lhs: &Literal,
    op: thaw_expr::CompareOp,
    rhs: &Literal,
) -> Result<bool> {
    // A NULL on either side of a strict comparison folds to "no rows".
    if matches!(lhs, Literal::Null) || matches!(rhs, Literal::Null) {
        return Ok(false);
    }
    // Mixed int/float comparisons fold in floating point.
    let (lhs_value, rhs_value) = match (lhs, rhs) {
        (Literal::Int(a), Literal::Float(b)) => {
            (Some(Value::Float64(*a as f64)), Some(Value::Float64(*b)))
        }
        (Literal::Float(a), Literal::Int(b)) => {
            (Some(Value::Float64(*a)), Some(Value::Float64(*b as f64)))
        }
        _ => (literal_to_untyped_value(lhs)?, literal_to_untyped_value(rhs)?),
    };
    let probe = RowQual {
        output_position: 0,
        op,
        constant: rhs_value,
        display: String::new(),
    };
    Ok(probe.matches(lhs_value.as_ref()))
}

fn literal_to_untyped_value(lit: &Literal) -> Result<Option<Value>> {
    let ty = match lit {
        Literal::Null => return Ok(None),
        Literal::Int(_) => thaw_types::ElementType::Int64,
        Literal::Float(_) => thaw_types::ElementType::Float64,
        Literal::Str(_) => thaw_types::ElementType::Utf8,
        Literal::Bool(_) => thaw_types::ElementType::Bool,
    };
    lit.to_value(ty)
}

/// Try to produce the vectorized form of one qualifier, commuting when the
/// constant sits on the left. `None` means it stays residual.
fn try_vectorize(
    qual: &QualNode,
    mapping: &ScanMapping,
    vectorize: bool,
) -> Result<Option<VectorQual>> {
    if !vectorize {
        return Ok(None);
    }

    let (column, op, literal) = match (&qual.lhs, &qual.rhs) {
        (QualOperand::Column(name), _) => {
            let QualOperand::Literal(lit) = &qual.rhs else {
                // Params, volatile calls, and column-to-column comparisons
                // are not runtime constants.
                return Ok(None);
            };
            (name, qual.op, lit)
        }
        (QualOperand::Literal(lit), QualOperand::Column(name)) => {
            let Some(commuted) = commutator(qual.op) else {
                return Ok(None);
            };
            (name, commuted, lit)
        }
        _ => return Ok(None),
    };

    let Some(output_position) = mapping.output_position(column) else {
        return Err(Error::planner(format!(
            "qualifier references unknown column '{column}'"
        )));
    };
    let Some(descriptor_idx) = mapping.descriptor_for_output(output_position) else {
        return Err(Error::planner(format!(
            "qualifier references column '{column}' that the scan does not decompress"
        )));
    };
    let descriptor = &mapping.descriptors[descriptor_idx];

    if descriptor.kind != ColumnKind::Compressed || !descriptor.bulk_ok {
        return Ok(None);
    }
    if !vector_predicate_supported(op, descriptor.element_type) {
        return Ok(None);
    }

    let constant = literal.to_value(descriptor.element_type)?;
    let display = format!(
        "{} {} {}",
        column,
        op.symbol(),
        constant
            .as_ref()
            .map(Value::format_display)
            .unwrap_or_else(|| "NULL".to_string())
    );

    Ok(Some(VectorQual {
        output_position,
        op,
        constant,
        display,
    }))
}

/// Bind a residual qualifier to an output position for row-wise
/// evaluation. Shapes the operator cannot evaluate itself are rejected at
/// plan time rather than mid-stream.
fn bind_residual(qual: QualNode, mapping: &ScanMapping) -> Result<RowQual> {
    let (column, op, literal) = match (&qual.lhs, &qual.rhs) {
        (QualOperand::Column(name), QualOperand::Literal(lit)) => (name, qual.op, lit),
        (QualOperand::Literal(lit), QualOperand::Column(name)) => {
            let op = commutator(qual.op).ok_or_else(|| {
                Error::NotSupported(format!(
                    "comparison operator {:?} has no commuted form",
                    qual.op
                ))
            })?;
            (name, op, lit)
        }
        _ => {
            return Err(Error::NotSupported(
                "residual qualifiers must compare a column with a constant".into(),
            ));
        }
    };

    let output_position = mapping.output_position(column).ok_or_else(|| {
        Error::planner(format!("qualifier references unknown column '{column}'"))
    })?;
    if mapping.descriptor_for_output(output_position).is_none() {
        return Err(Error::planner(format!(
            "qualifier references column '{column}' that the scan does not decompress"
        )));
    }
    let ty = mapping.output_schema[output_position].ty;
    let constant = literal.to_value(ty)?;
    let display = format!(
        "{} {} {}",
        column,
        op.symbol(),
        constant
            .as_ref()
            .map(Value::format_display)
            .unwrap_or_else(|| "NULL".to_string())
    );

    Ok(RowQual {
        output_position,
        op,
        constant,
        display,
    })
}

/// Output columns referenced by a qualifier list; classification and
/// residual evaluation both require them decompressed.
pub(crate) fn referenced_columns(quals: &[QualNode]) -> Vec<String> {
    let mut names = Vec::new();
    for qual in quals {
        for operand in [&qual.lhs, &qual.rhs] {
            if let QualOperand::Column(name) = operand {
                if !names.contains(name) {
                    names.push(name.clone());
                }
            }
        }
    }
    names
}
