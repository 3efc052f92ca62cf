//! Shared identifiers and scalar types for the thaw decompression stack.
//!
//! These types live in `thaw-types` so they can be reused by the planner,
//! the codecs, and the executor without circular dependencies.

use arrow::datatypes::DataType;
use thaw_result::{Error, Result};

mod value;

pub use value::{Literal, Value};

/// Maximum number of logical rows a compressed batch may carry.
///
/// The compressor groups at most this many rows into one batch; the
/// decompression side treats anything larger as corrupt input.
pub const MAX_ROWS_PER_BATCH: usize = 1000;

/// Compile-time bound on decoded batch length used to size buffers.
///
/// Kept a power of two above [`MAX_ROWS_PER_BATCH`] so per-batch loops can
/// assume `len <= BATCH_ROWS_CAP` without rechecking the catalog setting.
pub const BATCH_ROWS_CAP: usize = 1024;

/// Identity of the scanned relation, used to constify table-identity
/// references in qualifiers.
pub type RelationId = u32;

/// Element type of a logical column as seen by the decompression operator.
///
/// Compressed blobs decode to fixed-width primitive arrays; `Utf8` and
/// `Bool` appear only as segmentby scalars.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ElementType {
    Int32,
    Int64,
    Float32,
    Float64,
    Utf8,
    Bool,
}

impl ElementType {
    /// Width in bytes of one element, or `None` for variable-length types.
    pub fn fixed_width(&self) -> Option<usize> {
        match self {
            ElementType::Int32 | ElementType::Float32 => Some(4),
            ElementType::Int64 | ElementType::Float64 => Some(8),
            ElementType::Utf8 => None,
            ElementType::Bool => Some(1),
        }
    }

    /// Whether blobs of this type can be decoded in bulk to a columnar
    /// buffer. Only fixed-width numeric types qualify.
    pub fn supports_bulk(&self) -> bool {
        matches!(
            self,
            ElementType::Int32 | ElementType::Int64 | ElementType::Float32 | ElementType::Float64
        )
    }

    pub fn to_arrow(&self) -> DataType {
        match self {
            ElementType::Int32 => DataType::Int32,
            ElementType::Int64 => DataType::Int64,
            ElementType::Float32 => DataType::Float32,
            ElementType::Float64 => DataType::Float64,
            ElementType::Utf8 => DataType::Utf8,
            ElementType::Bool => DataType::Boolean,
        }
    }

    pub fn from_arrow(dtype: &DataType) -> Result<Self> {
        match dtype {
            DataType::Int32 => Ok(ElementType::Int32),
            DataType::Int64 => Ok(ElementType::Int64),
            DataType::Float32 => Ok(ElementType::Float32),
            DataType::Float64 => Ok(ElementType::Float64),
            DataType::Utf8 => Ok(ElementType::Utf8),
            DataType::Boolean => Ok(ElementType::Bool),
            other => Err(Error::InvalidArgumentError(format!(
                "unsupported column type {other:?}"
            ))),
        }
    }
}

/// One materialized output row: values in output-column order, `None` for
/// SQL NULL and for output positions the scan was asked not to produce.
pub type OutputRow = Vec<Option<Value>>;
