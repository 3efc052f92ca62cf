//! In-memory compressed source with call accounting.

use std::sync::Arc;

use arrow::array::{
    ArrayRef, BinaryArray, BooleanArray, Float32Array, Float64Array, Int32Array, Int64Array,
    RecordBatch, StringArray, UInt32Array,
};
use arrow::datatypes::{Field, Schema};
use thaw_exec::{CompressedRow, CompressedSource, DecompressScan};
use thaw_plan::{ChildColumnRole, CompressedLayout, OutputColumn};
use thaw_result::{Error, Result};
use thaw_types::{ElementType, OutputRow};

/// One cell of a compressed input row, in child column order.
#[derive(Clone, Debug)]
pub enum ChildCell {
    Null,
    Blob(Vec<u8>),
    Int32(i32),
    Int64(i64),
    UInt32(u32),
    Float32(f32),
    Float64(f64),
    Str(String),
    Bool(bool),
}

/// An in-memory child scan yielding pre-built compressed rows in insertion
/// order. Counts `next_row` calls and rescans so tests can assert on the
/// operator's fetch behavior.
pub struct MemSource {
    batch: RecordBatch,
    pos: usize,
    next_calls: usize,
    rescans: usize,
}

impl MemSource {
    /// Build a source from rows of cells parallel to the layout's columns.
    pub fn new(
        layout: &CompressedLayout,
        output_schema: &[OutputColumn],
        rows: Vec<Vec<ChildCell>>,
    ) -> Result<Self> {
        let mut fields = Vec::with_capacity(layout.columns.len());
        let mut arrays: Vec<ArrayRef> = Vec::with_capacity(layout.columns.len());

        for (position, child) in layout.columns.iter().enumerate() {
            let cells: Vec<&ChildCell> = rows
                .iter()
                .map(|row| {
                    row.get(position).ok_or_else(|| {
                        Error::InvalidArgumentError(format!(
                            "row is missing cell for child column '{}'",
                            child.name
                        ))
                    })
                })
                .collect::<Result<_>>()?;

            let array = match &child.role {
                ChildColumnRole::Segmentby { output } => {
                    let ty = output_type(output_schema, output)?;
                    typed_array(&cells, ty)?
                }
                ChildColumnRole::Compressed { .. } => {
                    let blobs: Vec<Option<&[u8]>> = cells
                        .iter()
                        .map(|cell| match cell {
                            ChildCell::Blob(blob) => Some(blob.as_slice()),
                            _ => None,
                        })
                        .collect();
                    Arc::new(BinaryArray::from(blobs)) as ArrayRef
                }
                ChildColumnRole::Count => {
                    let counts: Vec<Option<u32>> = cells
                        .iter()
                        .map(|cell| match cell {
                            ChildCell::UInt32(v) => Some(*v),
                            _ => None,
                        })
                        .collect();
                    Arc::new(UInt32Array::from(counts)) as ArrayRef
                }
                ChildColumnRole::SequenceNum => typed_array(&cells, ElementType::Int64)?,
                ChildColumnRole::MinMetadata { .. } | ChildColumnRole::MaxMetadata { .. } => {
                    typed_array(&cells, infer_type(&cells))?
                }
            };
            fields.push(Field::new(&child.name, array.data_type().clone(), true));
            arrays.push(array);
        }

        let schema = Arc::new(Schema::new(fields));
        let batch = if rows.is_empty() {
            RecordBatch::new_empty(schema)
        } else {
            RecordBatch::try_new(schema, arrays)?
        };

        Ok(Self {
            batch,
            pos: 0,
            next_calls: 0,
            rescans: 0,
        })
    }

    pub fn record_batch(&self) -> &RecordBatch {
        &self.batch
    }

    /// Number of `next_row` calls the operator made, including the one
    /// that observed end-of-stream.
    pub fn next_calls(&self) -> usize {
        self.next_calls
    }

    pub fn rescans(&self) -> usize {
        self.rescans
    }
}

impl CompressedSource for MemSource {
    fn next_row(&mut self) -> Result<Option<CompressedRow>> {
        self.next_calls += 1;
        if self.pos >= self.batch.num_rows() {
            return Ok(None);
        }
        let row = CompressedRow::new(self.batch.clone(), self.pos)?;
        self.pos += 1;
        Ok(Some(row))
    }

    fn rescan(&mut self) -> Result<()> {
        self.pos = 0;
        self.rescans += 1;
        Ok(())
    }
}

/// Pull a scan to completion.
pub fn drain_scan<S: CompressedSource>(scan: &mut DecompressScan<S>) -> Result<Vec<OutputRow>> {
    let mut rows = Vec::new();
    while let Some(row) = scan.next()? {
        rows.push(row);
    }
    Ok(rows)
}

fn output_type(output_schema: &[OutputColumn], name: &str) -> Result<ElementType> {
    output_schema
        .iter()
        .find(|col| col.name == name)
        .map(|col| col.ty)
        .ok_or_else(|| {
            Error::InvalidArgumentError(format!("output column '{name}' not in schema"))
        })
}

fn infer_type(cells: &[&ChildCell]) -> ElementType {
    for cell in cells {
        match cell {
            ChildCell::Int32(_) => return ElementType::Int32,
            ChildCell::Int64(_) => return ElementType::Int64,
            ChildCell::Float32(_) => return ElementType::Float32,
            ChildCell::Float64(_) => return ElementType::Float64,
            ChildCell::Str(_) => return ElementType::Utf8,
            ChildCell::Bool(_) => return ElementType::Bool,
            _ => {}
        }
    }
    ElementType::Int64
}

fn typed_array(cells: &[&ChildCell], ty: ElementType) -> Result<ArrayRef> {
    let mismatch = |cell: &ChildCell| {
        Error::InvalidArgumentError(format!("cell {cell:?} does not match column type {ty:?}"))
    };
    let array: ArrayRef = match ty {
        ElementType::Int32 => {
            let values: Vec<Option<i32>> = cells
                .iter()
                .map(|cell| match cell {
                    ChildCell::Null => Ok(None),
                    ChildCell::Int32(v) => Ok(Some(*v)),
                    other => Err(mismatch(other)),
                })
                .collect::<Result<_>>()?;
            Arc::new(Int32Array::from(values))
        }
        ElementType::Int64 => {
            let values: Vec<Option<i64>> = cells
                .iter()
                .map(|cell| match cell {
                    ChildCell::Null => Ok(None),
                    ChildCell::Int64(v) => Ok(Some(*v)),
                    ChildCell::Int32(v) => Ok(Some(*v as i64)),
                    other => Err(mismatch(other)),
                })
                .collect::<Result<_>>()?;
            Arc::new(Int64Array::from(values))
        }
        ElementType::Float32 => {
            let values: Vec<Option<f32>> = cells
                .iter()
                .map(|cell| match cell {
                    ChildCell::Null => Ok(None),
                    ChildCell::Float32(v) => Ok(Some(*v)),
                    other => Err(mismatch(other)),
                })
                .collect::<Result<_>>()?;
            Arc::new(Float32Array::from(values))
        }
        ElementType::Float64 => {
            let values: Vec<Option<f64>> = cells
                .iter()
                .map(|cell| match cell {
                    ChildCell::Null => Ok(None),
                    ChildCell::Float64(v) => Ok(Some(*v)),
                    other => Err(mismatch(other)),
                })
                .collect::<Result<_>>()?;
            Arc::new(Float64Array::from(values))
        }
        ElementType::Utf8 => {
            let values: Vec<Option<String>> = cells
                .iter()
                .map(|cell| match cell {
                    ChildCell::Null => Ok(None),
                    ChildCell::Str(v) => Ok(Some(v.clone())),
                    other => Err(mismatch(other)),
                })
                .collect::<Result<_>>()?;
            Arc::new(StringArray::from(values))
        }
        ElementType::Bool => {
            let values: Vec<Option<bool>> = cells
                .iter()
                .map(|cell| match cell {
                    ChildCell::Null => Ok(None),
                    ChildCell::Bool(v) => Ok(Some(*v)),
                    other => Err(mismatch(other)),
                })
                .collect::<Result<_>>()?;
            Arc::new(BooleanArray::from(values))
        }
    };
    Ok(array)
}
