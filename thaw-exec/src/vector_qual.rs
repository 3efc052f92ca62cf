//! Vectorized qualifier evaluation over decoded columnar buffers.
//!
//! Qualifiers arrive from the planner as `column op constant` over
//! bulk-capable compressed columns. Evaluation computes predicate truth for
//! every element of the batch with an Arrow comparison kernel, folds the
//! element validity bitmap in (NULL compares to false under our strict
//! operators), and ANDs successive qualifiers into the batch mask.

use arrow::array::{ArrayRef, BooleanArray, Scalar};
use arrow::compute::kernels::cmp;
use arrow::compute::{and, prep_null_mask_filter};
use thaw_expr::CompareOp;
use thaw_plan::ScanPlan;
use thaw_result::{Error, Result};
use thaw_types::Value;

use crate::batch::BatchState;
use crate::ExecContext;

/// A vectorized qualifier bound to a descriptor with its constant lifted
/// into an Arrow scalar, done once at operator init.
pub(crate) struct BoundVectorQual {
    pub descriptor: usize,
    pub op: CompareOp,
    pub constant: Scalar<ArrayRef>,
    pub display: String,
}

/// Bind the plan's vectorized qualifiers. The returned flag is true when
/// some qualifier can never match (NULL constant under a strict operator),
/// in which case the whole scan emits nothing.
pub(crate) fn bind_vector_quals(plan: &ScanPlan) -> Result<(Vec<BoundVectorQual>, bool)> {
    let mut bound = Vec::with_capacity(plan.vectorized_quals.len());
    let mut constant_false = plan.constant_false_qual;

    for qual in &plan.vectorized_quals {
        let descriptor = plan
            .mapping
            .descriptor_for_output(qual.output_position)
            .ok_or_else(|| {
                Error::Internal("vectorized qualifier over an unmapped column".into())
            })?;
        let element_type = plan.mapping.descriptors[descriptor].element_type;
        // A NULL constant under a strict operator is a contradiction: the
        // whole scan emits nothing and no batch is ever evaluated.
        if qual.constant.is_none() && qual.op.is_strict() {
            constant_false = true;
        }
        let array = Value::to_singleton_array(qual.constant.as_ref(), element_type)?;
        bound.push(BoundVectorQual {
            descriptor,
            op: qual.op,
            constant: Scalar::new(array),
            display: qual.display.clone(),
        });
    }

    Ok((bound, constant_false))
}

/// Evaluate all qualifiers over one batch, leaving the combined mask on the
/// batch state. Returns the number of rows removed.
pub(crate) fn apply_vector_quals(
    state: &mut BatchState,
    quals: &[BoundVectorQual],
    plan: &ScanPlan,
    ctx: &ExecContext,
) -> Result<u64> {
    if quals.is_empty() {
        return Ok(0);
    }

    let total = state.total_rows();
    let mut mask: Option<BooleanArray> = None;

    for qual in quals {
        state.ensure_decoded(qual.descriptor, plan, &ctx.codecs)?;
        let array = state.bulk_array(qual.descriptor)?;
        let passes = match qual.op {
            CompareOp::Eq => cmp::eq(array, &qual.constant)?,
            CompareOp::NotEq => cmp::neq(array, &qual.constant)?,
            CompareOp::Lt => cmp::lt(array, &qual.constant)?,
            CompareOp::LtEq => cmp::lt_eq(array, &qual.constant)?,
            CompareOp::Gt => cmp::gt(array, &qual.constant)?,
            CompareOp::GtEq => cmp::gt_eq(array, &qual.constant)?,
        };
        // NULL elements compare to NULL; fold them to false so the mask is
        // a plain bitmap the inner loops can AND without null checks.
        let passes = prep_null_mask_filter(&passes);
        mask = Some(match mask {
            None => passes,
            Some(current) => and(&current, &passes)?,
        });
    }

    let mask = mask.ok_or_else(|| Error::Internal("qualifier loop produced no mask".into()))?;
    let passing = mask.true_count();
    state.set_mask(mask);
    Ok((total - passing) as u64)
}
