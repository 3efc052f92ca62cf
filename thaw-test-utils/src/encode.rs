//! Blob encoders matching the framing in `thaw_codec::blob`.

use thaw_codec::{BlobHeader, CodecId};

fn validity_bits<T>(values: &[Option<T>]) -> Option<Vec<u8>> {
    let mut bits = vec![0u8; values.len().div_ceil(8)];
    let mut any_null = false;
    for (i, value) in values.iter().enumerate() {
        if value.is_some() {
            bits[i / 8] |= 1 << (i % 8);
        } else {
            any_null = true;
        }
    }
    any_null.then_some(bits)
}

macro_rules! impl_plain_encoder {
    ($name:ident, $ty:ty) => {
        /// Encode values with the plain codec; `None` is a null row.
        pub fn $name(values: &[Option<$ty>]) -> Vec<u8> {
            let bits = validity_bits(values);
            let mut blob = Vec::new();
            BlobHeader::write(CodecId::Plain, values.len(), bits.as_deref(), &mut blob);
            for value in values {
                blob.extend_from_slice(&value.unwrap_or_default().to_le_bytes());
            }
            blob
        }
    };
}

impl_plain_encoder!(encode_plain_i32, i32);
impl_plain_encoder!(encode_plain_i64, i64);
impl_plain_encoder!(encode_plain_f32, f32);
impl_plain_encoder!(encode_plain_f64, f64);

macro_rules! impl_run_length_encoder {
    ($name:ident, $ty:ty) => {
        /// Encode values with the run-length codec. Null rows carry a zero
        /// storage value; the validity bitmap masks them on decode.
        pub fn $name(values: &[Option<$ty>]) -> Vec<u8> {
            let bits = validity_bits(values);
            let mut blob = Vec::new();
            BlobHeader::write(CodecId::RunLength, values.len(), bits.as_deref(), &mut blob);

            let storage: Vec<$ty> = values.iter().map(|v| v.unwrap_or_default()).collect();
            let mut i = 0usize;
            while i < storage.len() {
                let mut run = 1usize;
                while i + run < storage.len()
                    && storage[i + run] == storage[i]
                    && run < u16::MAX as usize
                {
                    run += 1;
                }
                blob.extend_from_slice(&(run as u16).to_le_bytes());
                blob.extend_from_slice(&storage[i].to_le_bytes());
                i += run;
            }
            blob
        }
    };
}

impl_run_length_encoder!(encode_run_length_i32, i32);
impl_run_length_encoder!(encode_run_length_i64, i64);
