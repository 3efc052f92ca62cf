//! Plain codec: values stored back to back in little-endian order, one slot
//! per row (null slots are zero-filled and masked by the validity bitmap).

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
    _scratch: &mut ScratchArena,
) -> Result<ArrayRef> {
    let header = BlobHeader::parse(blob)?;
    match ty {
        ElementType::Int32 => decode::<Int32Type>(blob, &header, arena),
        ElementType::Int64 => decode::<Int64Type>(blob, &header, arena),
        ElementType::Float32 => decode::<Float32Type>(blob, &header, arena),
        ElementType::Float64 => decode::<Float64Type>(blob, &header, arena),
        other => Err(Error::Codec(format!(
            "plain codec cannot decode {other:?} columns"
        ))),
    }
}

fn decode<T: ArrowPrimitiveType>(
    blob: &[u8],
    header: &BlobHeader,
    arena: &mut BatchArena,
) -> Result<ArrayRef>
where
    T::Native: NativeValue,
{
    let width = <T::Native as NativeValue>::WIDTH;
    let payload = header.payload(blob);
    if payload.len() != header.n_rows * width {
        return Err(Error::Codec(format!(
            "plain payload is {} bytes, expected {} for {} rows",
            payload.len(),
            header.n_rows * width,
            header.n_rows
        )));
    }

    let mut values = arena.alloc(header.n_rows * width);
    for chunk in payload.chunks_exact(width) {
        values.push(T::Native::read_le(chunk));
    }
    let nulls = make_nulls(header, blob, arena);
    Ok(make_array::<T>(values, header.n_rows, nulls))
}

pub(crate) fn row_decoder(
    blob: &[u8],
    header: BlobHeader,
    ty: ElementType,
) -> Result<Box<dyn RowDecoder>> {
    let width = element_width(ty)?;
    if header.payload(blob).len() != header.n_rows * width {
        return Err(Error::Codec(
            "plain payload length disagrees with declared row count".into(),
        ));
    }
    Ok(Box::new(PlainRowDecoder {
        blob: blob.to_vec(),
        header,
        ty,
        width,
        pos: 0,
    }))
}

struct PlainRowDecoder {
    blob: Vec<u8>,
    header: BlobHeader,
    ty: ElementType,
    width: usize,
    pos: usize,
}

impl RowDecoder for PlainRowDecoder {
    fn len(&self) -> usize {
        self.header.n_rows
    }

    fn decode_next(&mut self) -> Result<Option<Value>> {
        if self.pos >= self.header.n_rows {
            return Err(Error::Internal("decoded past the end of a batch".into()));
        }
        let i = self.pos;
        self.pos += 1;
        if !self.header.row_is_valid(&self.blob, i) {
            return Ok(None);
        }
        let payload = self.header.payload(&self.blob);
        read_value(&payload[i * self.width..], self.ty).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Array, Int32Array};
    use crate::registry::CodecId;

    fn plain_blob(values: &[Option<i32>]) -> Vec<u8> {
        let mut validity = vec![0u8; values.len().div_ceil(8)];
        let mut any_null = false;
        for (i, v) in values.iter().enumerate() {
            if v.is_some() {
                validity[i / 8] |= 1 << (i % 8);
            } else {
                any_null = true;
            }
        }
        let mut blob = Vec::new();
        let bits = any_null.then_some(validity.as_slice());
        BlobHeader::write(CodecId::Plain, values.len(), bits, &mut blob);
        for v in values {
            blob.extend_from_slice(&v.unwrap_or(0).to_le_bytes());
        }
        blob
    }

    #[test]
    fn bulk_decode_preserves_values_and_validity() {
        let blob = plain_blob(&[Some(10), None, Some(30)]);
        let mut arena = BatchArena::with_target(8192);
        let mut scratch = ScratchArena::default();
        let array =
            decompress_all(&blob, ElementType::Int32, &mut arena, &mut scratch).unwrap();
        let ints = array.as_any().downcast_ref::<Int32Array>().unwrap();
        assert_eq!(ints.len(), 3);
        assert_eq!(ints.value(0), 10);
        assert!(ints.is_null(1));
        assert_eq!(ints.value(2), 30);
        assert!(arena.live_bytes() > 0);
    }

    #[test]
    fn row_decode_matches_bulk() {
        let blob = plain_blob(&[Some(1), Some(2), None]);
        let header = BlobHeader::parse(&blob).unwrap();
        let mut decoder = row_decoder(&blob, header, ElementType::Int32).unwrap();
        assert_eq!(decoder.len(), 3);
        assert_eq!(decoder.decode_next().unwrap(), Some(Value::Int32(1)));
        assert_eq!(decoder.decode_next().unwrap(), Some(Value::Int32(2)));
        assert_eq!(decoder.decode_next().unwrap(), None);
        assert!(decoder.decode_next().is_err());
    }

    #[test]
    fn short_payload_is_rejected() {
        let mut blob = Vec::new();
        BlobHeader::write(CodecId::Plain, 4, None, &mut blob);
        blob.extend_from_slice(&[0u8; 8]);
        let mut arena = BatchArena::with_target(8192);
        let mut scratch = ScratchArena::default();
        assert!(decompress_all(&blob, ElementType::Int32, &mut arena, &mut scratch).is_err());
    }
}
