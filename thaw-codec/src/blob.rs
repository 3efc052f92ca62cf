//! Compressed blob framing.
//!
//! Every compressed column value starts with a four-byte header naming the
//! codec, a flags byte, and the decoded row count, optionally followed by a
//! validity bitmap (Arrow LSB bit order, bit i set = row i non-null) and
//! then the codec-specific payload. Everything past the validity bitmap is
//! opaque to the rest of the stack.

use thaw_result::{Error, Result};
use thaw_types::BATCH_ROWS_CAP;

use crate::registry::CodecId;

/// Flags bit: a validity bitmap follows the header.
pub const FLAG_HAS_NULLS: u8 = 0x01;

const HEADER_LEN: usize = 4;

/// Parsed blob header plus the offsets of the sections that follow it.
#[derive(Debug, Clone, Copy)]
pub struct BlobHeader {
    pub codec: CodecId,
    pub has_nulls: bool,
    pub n_rows: usize,
    validity_len: usize,
}

impl BlobHeader {
    pub fn parse(blob: &[u8]) -> Result<Self> {
        if blob.len() < HEADER_LEN {
            return Err(Error::Codec(format!(
                "compressed blob of {} bytes is shorter than the header",
                blob.len()
            )));
        }
        let codec = CodecId::from_u8(blob[0])?;
        let flags = blob[1];
        let n_rows = u16::from_le_bytes([blob[2], blob[3]]) as usize;
        if n_rows == 0 || n_rows > BATCH_ROWS_CAP {
            return Err(Error::Codec(format!(
                "compressed blob declares {n_rows} rows, outside 1..={BATCH_ROWS_CAP}"
            )));
        }
        let has_nulls = flags & FLAG_HAS_NULLS != 0;
        let validity_len = if has_nulls { n_rows.div_ceil(8) } else { 0 };
        if blob.len() < HEADER_LEN + validity_len {
            return Err(Error::Codec(
                "compressed blob truncated inside validity bitmap".into(),
            ));
        }
        Ok(Self {
            codec,
            has_nulls,
            n_rows,
            validity_len,
        })
    }

    /// Validity bitmap bytes, empty when the blob has no nulls.
    pub fn validity<'a>(&self, blob: &'a [u8]) -> &'a [u8] {
        &blob[HEADER_LEN..HEADER_LEN + self.validity_len]
    }

    /// Codec-specific payload following header and validity bitmap.
    pub fn payload<'a>(&self, blob: &'a [u8]) -> &'a [u8] {
        &blob[HEADER_LEN + self.validity_len..]
    }

    /// Row `i` is non-null under this header's validity bitmap.
    pub fn row_is_valid(&self, blob: &[u8], i: usize) -> bool {
        if !self.has_nulls {
            return true;
        }
        let bits = self.validity(blob);
        bits[i / 8] & (1 << (i % 8)) != 0
    }

    /// Write a header (and validity bitmap, when present) to `out`. Shared
    /// with the test-side encoders, which append the payload afterwards.
    pub fn write(codec: CodecId, n_rows: usize, validity: Option<&[u8]>, out: &mut Vec<u8>) {
        let flags = if validity.is_some() { FLAG_HAS_NULLS } else { 0 };
        out.push(codec as u8);
        out.push(flags);
        out.extend_from_slice(&(n_rows as u16).to_le_bytes());
        if let Some(bits) = validity {
            out.extend_from_slice(bits);
        }
    }
}
