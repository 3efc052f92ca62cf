//! Row-at-a-time decompression baseline.
//!
//! Decodes every batch with the row decoders and expands segmentby scalars,
//! producing the full-width logical rows in storage order. Equivalence
//! tests compare the operator's output against this, projected through the
//! same filters.

use arrow::array::{Array, BinaryArray, UInt32Array};
use thaw_codec::CodecRegistry;
use thaw_plan::{ChildColumnRole, CompressedLayout, OutputColumn};
use thaw_result::{Error, Result};
use thaw_types::{OutputRow, Value};

use crate::source::MemSource;

/// Decompress `source` row by row into full-width output rows.
pub fn baseline_rows(
    layout: &CompressedLayout,
    output_schema: &[OutputColumn],
    source: &MemSource,
) -> Result<Vec<OutputRow>> {
    let codecs = CodecRegistry::new();
    let batch = source.record_batch();

    let count_position = layout
        .columns
        .iter()
        .position(|col| col.role == ChildColumnRole::Count)
        .ok_or_else(|| Error::planner("baseline requires a count column"))?;
    let counts = batch
        .column(count_position)
        .as_any()
        .downcast_ref::<UInt32Array>()
        .ok_or_else(|| Error::planner("count column is not unsigned"))?;

    let mut out = Vec::new();
    for r in 0..batch.num_rows() {
        let count = counts.value(r) as usize;

        // Per output column: either a repeated scalar or a decoded vector.
        let mut columns: Vec<Vec<Option<Value>>> = Vec::with_capacity(output_schema.len());
        for output in output_schema {
            let child = layout.columns.iter().enumerate().find(|(_, col)| {
                matches!(
                    &col.role,
                    ChildColumnRole::Segmentby { output: name }
                    | ChildColumnRole::Compressed { output: name, .. }
                    if *name == output.name
                )
            });
            let values = match child {
                None => vec![None; count],
                Some((position, col)) => match &col.role {
                    ChildColumnRole::Segmentby { .. } => {
                        let scalar = Value::from_array(batch.column(position), r)?;
                        vec![scalar; count]
                    }
                    ChildColumnRole::Compressed { .. } => {
                        let blobs = batch
                            .column(position)
                            .as_any()
                            .downcast_ref::<BinaryArray>()
                            .ok_or_else(|| {
                                Error::planner("compressed column is not binary")
                            })?;
                        let mut decoder = codecs.row_decoder(blobs.value(r), output.ty)?;
                        if decoder.len() != count {
                            return Err(Error::Codec(format!(
                                "baseline: codec declares {} rows for a batch of {}",
                                decoder.len(),
                                count
                            )));
                        }
                        let mut values = Vec::with_capacity(count);
                        for _ in 0..count {
                            values.push(decoder.decode_next()?);
                        }
                        values
                    }
                    _ => vec![None; count],
                },
            };
            columns.push(values);
        }

        for i in 0..count {
            out.push(columns.iter().map(|col| col[i].clone()).collect());
        }
    }
    Ok(out)
}
