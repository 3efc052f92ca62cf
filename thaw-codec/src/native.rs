//! Fixed-width native value plumbing shared by the codecs.

use std::sync::Arc;

use arrow::array::{ArrayRef, PrimitiveArray};
use arrow::buffer::{BooleanBuffer, Buffer, MutableBuffer, NullBuffer};
use arrow::buffer::ScalarBuffer;
use arrow::datatypes::ArrowPrimitiveType;
use thaw_result::{Error, Result};
use thaw_types::{ElementType, Value};

use crate::arena::BatchArena;
use crate::blob::BlobHeader;

/// Fixed-width element that the codecs can read from little-endian payload
/// bytes and stage in native byte order.
pub(crate) trait NativeValue: Copy {
    const WIDTH: usize;

    fn read_le(bytes: &[u8]) -> Self;
    fn write_native(self, out: &mut Vec<u8>);
    fn to_value(self) -> Value;
}

macro_rules! impl_native_value {
    ($ty:ty, $width:expr, $variant:ident) => {
        impl NativeValue for $ty {
            const WIDTH: usize = $width;

            #[inline]
            fn read_le(bytes: &[u8]) -> Self {
                let mut raw = [0u8; $width];
                raw.copy_from_slice(&bytes[..$width]);
                <$ty>::from_le_bytes(raw)
            }

            #[inline]
            fn write_native(self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_ne_bytes());
            }

            #[inline]
            fn to_value(self) -> Value {
                Value::$variant(self)
            }
        }
    };
}

impl_native_value!(i32, 4, Int32);
impl_native_value!(i64, 8, Int64);
impl_native_value!(f32, 4, Float32);
impl_native_value!(f64, 8, Float64);

/// Freeze a values buffer into a primitive array with the blob's validity.
pub(crate) fn make_array<T: ArrowPrimitiveType>(
    values: MutableBuffer,
    len: usize,
    nulls: Option<NullBuffer>,
) -> ArrayRef {
    let scalars = ScalarBuffer::<T::Native>::new(Buffer::from(values), 0, len);
    Arc::new(PrimitiveArray::<T>::new(scalars, nulls)) as ArrayRef
}

/// Copy the blob's validity bitmap (already Arrow LSB order) into the batch
/// arena and wrap it as a null buffer.
pub(crate) fn make_nulls(
    header: &BlobHeader,
    blob: &[u8],
    arena: &mut BatchArena,
) -> Option<NullBuffer> {
    if !header.has_nulls {
        return None;
    }
    let bits = header.validity(blob);
    let mut buf = arena.alloc(bits.len());
    buf.extend_from_slice(bits);
    let bools = BooleanBuffer::new(Buffer::from(buf), 0, header.n_rows);
    Some(NullBuffer::new(bools))
}

/// Read one little-endian element of `ty` out of `bytes`.
pub(crate) fn read_value(bytes: &[u8], ty: ElementType) -> Result<Value> {
    match ty {
        ElementType::Int32 => Ok(i32::read_le(bytes).to_value()),
        ElementType::Int64 => Ok(i64::read_le(bytes).to_value()),
        ElementType::Float32 => Ok(f32::read_le(bytes).to_value()),
        ElementType::Float64 => Ok(f64::read_le(bytes).to_value()),
        other => Err(Error::Codec(format!(
            "{other:?} is not a fixed-width compressed element type"
        ))),
    }
}

/// Width of `ty` when it is a legal compressed element type.
pub(crate) fn element_width(ty: ElementType) -> Result<usize> {
    ty.fixed_width().filter(|_| ty.supports_bulk()).ok_or_else(|| {
        Error::Codec(format!(
            "{ty:?} columns cannot be stored as compressed blobs"
        ))
    })
}
