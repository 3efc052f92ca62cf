//! The child-scan interface: a pull-based iterator over compressed rows.

use arrow::array::{Array, ArrayRef, BinaryArray, RecordBatch, UInt32Array};
use thaw_result::{Error, Result};
use thaw_types::{Value, BATCH_ROWS_CAP};

/// One compressed input row: a row of the child scan's output batch. Each
/// open [`crate::BatchState`] keeps its row alive for the batch lifetime so
/// blob slices stay borrowable.
#[derive(Clone, Debug)]
pub struct CompressedRow {
    batch: RecordBatch,
    row: usize,
}

impl CompressedRow {
    pub fn new(batch: RecordBatch, row: usize) -> Result<Self> {
        if row >= batch.num_rows() {
            return Err(Error::Internal(format!(
                "compressed row index {row} out of bounds for a batch of {} rows",
                batch.num_rows()
            )));
        }
        Ok(Self { batch, row })
    }

    pub fn column(&self, input_position: usize) -> Result<&ArrayRef> {
        if input_position >= self.batch.num_columns() {
            return Err(Error::planner(format!(
                "compressed scan column {input_position} is missing from the child output"
            )));
        }
        Ok(self.batch.column(input_position))
    }

    pub fn is_null(&self, input_position: usize) -> Result<bool> {
        Ok(self.column(input_position)?.is_null(self.row))
    }

    /// The compressed blob stored in a binary column. A NULL blob for a
    /// column the batch is supposed to carry is corrupt input.
    pub fn blob(&self, input_position: usize) -> Result<&[u8]> {
        let column = self.column(input_position)?;
        let blobs = column
            .as_any()
            .downcast_ref::<BinaryArray>()
            .ok_or_else(|| {
                Error::planner(format!(
                    "compressed scan column {input_position} is not a binary column"
                ))
            })?;
        if blobs.is_null(self.row) {
            return Err(Error::Codec(
                "got unexpected NULL attribute value from compressed batch".into(),
            ));
        }
        Ok(blobs.value(self.row))
    }

    /// A segmentby scalar or metadata value.
    pub fn scalar(&self, input_position: usize) -> Result<Option<Value>> {
        Value::from_array(self.column(input_position)?, self.row)
    }

    /// The mandatory row count of the batch.
    pub fn count(&self, input_position: usize) -> Result<usize> {
        let column = self.column(input_position)?;
        let counts = column
            .as_any()
            .downcast_ref::<UInt32Array>()
            .ok_or_else(|| {
                Error::planner(format!(
                    "count metadata column {input_position} is not an unsigned column"
                ))
            })?;
        if counts.is_null(self.row) {
            return Err(Error::Codec("compressed batch has a NULL row count".into()));
        }
        let count = counts.value(self.row) as usize;
        if count == 0 || count > BATCH_ROWS_CAP {
            return Err(Error::Codec(format!(
                "compressed batch declares {count} rows, outside 1..={BATCH_ROWS_CAP}"
            )));
        }
        Ok(count)
    }
}

/// Pull-based source of compressed rows, presorted on min/max metadata when
/// the plan carries sort info.
pub trait CompressedSource {
    /// The next compressed row, or `None` at end of stream. Must keep
    /// returning `None` once exhausted.
    fn next_row(&mut self) -> Result<Option<CompressedRow>>;

    /// Restart the stream from the beginning with current parameters.
    fn rescan(&mut self) -> Result<()>;
}
