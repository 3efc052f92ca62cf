//! Vectorized partial aggregation: the single-output-row fast path.
//!
//! The operator consumes the whole child scan itself and emits exactly one
//! partial-aggregate tuple, never materializing logical rows. Segmentby
//! inputs contribute `value * passing_rows` per batch; compressed inputs
//! bulk-decompress and sum under the combined validity/qualifier mask.
//!
//! For 4-byte integers the per-batch inner loop needs no overflow checks:
//! with at most 1024 rows per batch the batch sum is bounded by 2^42, well
//! inside the 8-byte accumulator. Only the batch-to-total addition (and the
//! segmentby multiply, which stays in element width) is checked.

use arrow::array::{Array, ArrayRef, BooleanArray, Int32Array, PrimitiveArray};
use arrow::datatypes::{ArrowPrimitiveType, Float32Type, Float64Type};
use thaw_plan::{AggregateFunction, ColumnKind, ScanPlan};
use thaw_result::{Error, Result};
use thaw_types::{ElementType, OutputRow, Value};

use crate::batch::{BatchArray, BatchState};
use crate::scan::ScanMetrics;
use crate::source::CompressedSource;
use crate::vector_qual::{apply_vector_quals, BoundVectorQual};
use crate::ExecContext;

/// Running partial sum, matching the element width of the input.
enum SumAccumulator {
    Int64 { total: i64, saw_value: bool },
    Float32 { total: f32, saw_value: bool },
    Float64 { total: f64, saw_value: bool },
}

impl SumAccumulator {
    fn for_type(ty: ElementType) -> Result<Self> {
        match ty {
            ElementType::Int32 => Ok(SumAccumulator::Int64 {
                total: 0,
                saw_value: false,
            }),
            ElementType::Float32 => Ok(SumAccumulator::Float32 {
                total: 0.0,
                saw_value: false,
            }),
            ElementType::Float64 => Ok(SumAccumulator::Float64 {
                total: 0.0,
                saw_value: false,
            }),
            other => Err(Error::NotSupported(format!(
                "vectorized aggregation for SUM over {other:?} is not supported"
            ))),
        }
    }

    /// NULL when no non-null input contributed.
    fn finish(self) -> Option<Value> {
        match self {
            SumAccumulator::Int64 { total, saw_value } => saw_value.then_some(Value::Int64(total)),
            SumAccumulator::Float32 { total, saw_value } => {
                saw_value.then_some(Value::Float32(total))
            }
            SumAccumulator::Float64 { total, saw_value } => {
                saw_value.then_some(Value::Float64(total))
            }
        }
    }
}

/// Drain the child and produce the single partial-aggregate output row.
pub(crate) fn run_vectorized_sum<S: CompressedSource>(
    child: &mut S,
    plan: &ScanPlan,
    ctx: &ExecContext,
    quals: &[BoundVectorQual],
    batches: &mut BatchArray,
    metrics: &mut ScanMetrics,
) -> Result<OutputRow> {
    let spec = plan
        .aggregate
        .as_ref()
        .ok_or_else(|| Error::Internal("vectorized aggregation without a spec".into()))?;
    debug_assert_eq!(spec.function, AggregateFunction::Sum);

    let desc_idx = plan
        .mapping
        .descriptor_for_output(spec.output_position)
        .ok_or_else(|| Error::Internal("aggregated column is not mapped".into()))?;

    let mut acc = SumAccumulator::for_type(spec.element_type)?;

    while let Some(row) = child.next_row()? {
        ctx.check_cancel().inspect_err(|_| batches.release_all())?;

        let arena = batches.take_arena();
        let mut state = BatchState::new(row, plan, arena, 0)?;
        let removed = apply_vector_quals(&mut state, quals, plan, ctx)?;
        metrics.rows_removed_by_vectorized_filter += removed;
        metrics.batches_opened += 1;

        let descriptor = &plan.mapping.descriptors[desc_idx];
        match descriptor.kind {
            ColumnKind::Segmentby => {
                let passing = passing_rows(&state);
                let value = state.value_at_cursor(desc_idx)?;
                if passing > 0 {
                    if let Some(value) = value {
                        accumulate_segmentby(&mut acc, &value, passing)?;
                    }
                }
            }
            ColumnKind::Compressed => {
                state.ensure_decoded(desc_idx, plan, &ctx.codecs)?;
                let array = state.bulk_array(desc_idx)?;
                accumulate_compressed(&mut acc, array, state.mask())?;
            }
            ColumnKind::MetadataCount | ColumnKind::MetadataSequence => {
                return Err(Error::Internal(
                    "aggregated column resolved to a metadata column".into(),
                ));
            }
        }
        batches.recycle(state);
    }

    Ok(vec![acc.finish()])
}

fn passing_rows(state: &BatchState) -> usize {
    match state.mask() {
        Some(mask) => mask.true_count(),
        None => state.total_rows(),
    }
}

/// Multiply the shared scalar by the number of contributing rows. Integer
/// products are checked in element width; a product outside the element
/// range raises the numeric-range error.
fn accumulate_segmentby(acc: &mut SumAccumulator, value: &Value, passing: usize) -> Result<()> {
    match (acc, value) {
        (SumAccumulator::Int64 { total, saw_value }, Value::Int32(v)) => {
            let batch_sum = v
                .checked_mul(passing as i32)
                .ok_or(Error::NumericValueOutOfRange("bigint"))?;
            *total = total
                .checked_add(batch_sum as i64)
                .ok_or(Error::NumericValueOutOfRange("bigint"))?;
            *saw_value = true;
        }
        (SumAccumulator::Float32 { total, saw_value }, Value::Float32(v)) => {
            *total += v * passing as f32;
            *saw_value = true;
        }
        (SumAccumulator::Float64 { total, saw_value }, Value::Float64(v)) => {
            *total += v * passing as f64;
            *saw_value = true;
        }
        _ => {
            return Err(Error::Internal(
                "aggregate accumulator disagrees with the column type".into(),
            ));
        }
    }
    Ok(())
}

fn accumulate_compressed(
    acc: &mut SumAccumulator,
    array: &ArrayRef,
    mask: Option<&BooleanArray>,
) -> Result<()> {
    match acc {
        SumAccumulator::Int64 { total, saw_value } => {
            let ints = array
                .as_any()
                .downcast_ref::<Int32Array>()
                .ok_or_else(|| {
                    Error::Internal("SUM aggregate expected an int32 column in execution".into())
                })?;
            let mut batch_sum: i64 = 0;
            let mut batch_saw = false;
            for i in 0..ints.len() {
                if ints.is_valid(i) && mask.map_or(true, |m| m.value(i)) {
                    batch_sum += ints.value(i) as i64;
                    batch_saw = true;
                }
            }
            if batch_saw {
                *total = total
                    .checked_add(batch_sum)
                    .ok_or(Error::NumericValueOutOfRange("bigint"))?;
                *saw_value = true;
            }
        }
        SumAccumulator::Float32 { total, saw_value } => {
            let (batch_sum, batch_saw) = masked_sum_float::<Float32Type>(array, mask)?;
            if batch_saw {
                *total += batch_sum;
                *saw_value = true;
            }
        }
        SumAccumulator::Float64 { total, saw_value } => {
            let (batch_sum, batch_saw) = masked_sum_float::<Float64Type>(array, mask)?;
            if batch_saw {
                *total += batch_sum;
                *saw_value = true;
            }
        }
    }
    Ok(())
}

/// Width-generic masked float sum over one decoded batch.
fn masked_sum_float<T: ArrowPrimitiveType>(
    array: &ArrayRef,
    mask: Option<&BooleanArray>,
) -> Result<(T::Native, bool)>
where
    T::Native: std::ops::AddAssign + Default + Copy,
{
    let floats = array
        .as_any()
        .downcast_ref::<PrimitiveArray<T>>()
        .ok_or_else(|| {
            Error::Internal("SUM aggregate expected a float column in execution".into())
        })?;
    let mut sum = T::Native::default();
    let mut saw = false;
    for i in 0..floats.len() {
        if floats.is_valid(i) && mask.map_or(true, |m| m.value(i)) {
            sum += floats.value(i);
            saw = true;
        }
    }
    Ok((sum, saw))
}
