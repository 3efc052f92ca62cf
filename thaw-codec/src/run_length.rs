//! Run-length codec: the payload is a sequence of `(run_len: u16, value)`
//! pairs covering every row of the batch, null positions included (their
//! run values are ignored under the validity bitmap).

use arrow::array::ArrayRef;
use arrow::datatypes::{ArrowPrimitiveType, Float32Type, Float64Type, Int32Type, Int64Type};
use thaw_result::{Error, Result};
use thaw_types::{ElementType, Value};

use crate::arena::{BatchArena, ScratchArena};
use crate::blob::BlobHeader;
use crate::native::{element_width, make_array, make_nulls, read_value, NativeValue};
use crate::registry::RowDecoder;

pub(crate) fn decompress_all(
    blob: &[u8],
    ty: ElementType,
    arena: &mut BatchArena,
    scratch: &mut ScratchArena,
) -> Result<ArrayRef> {
    let header = BlobHeader::parse(blob)?;
    match ty {
        ElementType::Int32 => decode::<Int32Type>(blob, &header, arena, scratch),
        ElementType::Int64 => decode::<Int64Type>(blob, &header, arena, scratch),
        ElementType::Float32 => decode::<Float32Type>(blob, &header, arena, scratch),
        ElementType::Float64 => decode::<Float64Type>(blob, &header, arena, scratch),
        other => Err(Error::Codec(format!(
            "run-length codec cannot decode {other:?} columns"
        ))),
    }
}

fn decode<T: ArrowPrimitiveType>(
    blob: &[u8],
    header: &BlobHeader,
    arena: &mut BatchArena,
    scratch: &mut ScratchArena,
) -> Result<ArrayRef>
where
    T::Native: NativeValue,
{
    let width = <T::Native as NativeValue>::WIDTH;
    let payload = header.payload(blob);

    // Expand the runs into scratch first, then move the finished image into
    // the arena-backed buffer in one append.
    scratch.reset();
    let staging = scratch.buffer();
    staging.reserve(header.n_rows * width);

    let mut produced = 0usize;
    let mut offset = 0usize;
    while offset < payload.len() {
        if payload.len() - offset < 2 + width {
            return Err(Error::Codec("run-length payload truncated inside a run".into()));
        }
        let run_len = u16::from_le_bytes([payload[offset], payload[offset + 1]]) as usize;
        if run_len == 0 {
            return Err(Error::Codec("run-length payload contains an empty run".into()));
        }
        offset += 2;
        let value = T::Native::read_le(&payload[offset..]);
        offset += width;
        for _ in 0..run_len {
            value.write_native(staging);
        }
        produced += run_len;
        if produced > header.n_rows {
            break;
        }
    }
    if produced != header.n_rows {
        return Err(Error::Codec(format!(
            "run-length payload expands to {produced} rows, header declares {}",
            header.n_rows
        )));
    }

    let mut values = arena.alloc(header.n_rows * width);
    values.extend_from_slice(staging);
    let nulls = make_nulls(header, blob, arena);
    Ok(make_array::<T>(values, header.n_rows, nulls))
}

pub(crate) fn row_decoder(
    blob: &[u8],
    header: BlobHeader,
    ty: ElementType,
) -> Result<Box<dyn RowDecoder>> {
    element_width(ty)?;
    Ok(Box::new(RunLengthRowDecoder {
        blob: blob.to_vec(),
        header,
        ty,
        offset: 0,
        run_remaining: 0,
        current: None,
        pos: 0,
    }))
}

struct RunLengthRowDecoder {
    blob: Vec<u8>,
    header: BlobHeader,
    ty: ElementType,
    offset: usize,
    run_remaining: usize,
    current: Option<Value>,
    pos: usize,
}

impl RowDecoder for RunLengthRowDecoder {
    fn len(&self) -> usize {
        self.header.n_rows
    }

    fn decode_next(&mut self) -> Result<Option<Value>> {
        if self.pos >= self.header.n_rows {
            return Err(Error::Internal("decoded past the end of a batch".into()));
        }
        if self.run_remaining == 0 {
            let payload = self.header.payload(&self.blob);
            let width = element_width(self.ty)?;
            if payload.len() - self.offset < 2 + width {
                return Err(Error::Codec(
                    "run-length payload exhausted before the declared row count".into(),
                ));
            }
            let run_len =
                u16::from_le_bytes([payload[self.offset], payload[self.offset + 1]]) as usize;
            if run_len == 0 {
                return Err(Error::Codec("run-length payload contains an empty run".into()));
            }
            self.offset += 2;
            self.current = Some(read_value(&payload[self.offset..], self.ty)?);
            self.offset += width;
            self.run_remaining = run_len;
        }
        self.run_remaining -= 1;
        let i = self.pos;
        self.pos += 1;
        if self.header.row_is_valid(&self.blob, i) {
            Ok(self.current.clone())
        } else {
            Ok(None)
        }
    }
}
