//! Codec identifiers and the process-wide codec registry.

use arrow::array::ArrayRef;
use rustc_hash::FxHashSet;
use thaw_result::{Error, Result};
use thaw_types::{ElementType, Value};

use crate::arena::{BatchArena, ScratchArena};
use crate::blob::BlobHeader;
use crate::{plain, run_length};

/// Compression algorithm of a blob, named in its header byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CodecId {
    Plain = 1,
    RunLength = 2,
}

impl CodecId {
    pub fn from_u8(raw: u8) -> Result<Self> {
        match raw {
            1 => Ok(CodecId::Plain),
            2 => Ok(CodecId::RunLength),
            other => Err(Error::Codec(format!("unknown codec id {other}"))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CodecId::Plain => "plain",
            CodecId::RunLength => "run_length",
        }
    }
}

/// Bulk decompression entry point: one call decodes an entire column of one
/// batch into a columnar array (values buffer, validity bitmap, length).
/// Result allocations come from the caller's batch arena; codec-internal
/// staging uses the shared scratch arena, reset between columns.
pub type DecompressAllFn =
    fn(&[u8], ElementType, &mut BatchArena, &mut ScratchArena) -> Result<ArrayRef>;

/// Row-at-a-time decode of one column of one batch. Exactly `len()` calls
/// to [`RowDecoder::decode_next`] are valid; each yields the next datum,
/// `None` for null.
pub trait RowDecoder {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn decode_next(&mut self) -> Result<Option<Value>>;
}

/// Process-wide, read-mostly registry of decode functions.
///
/// Injected into the planner (to decide per-column bulk capability) and the
/// operator (to decode) through their contexts. Bulk support can be masked
/// per codec, which forces the row-at-a-time path for affected columns.
#[derive(Clone, Debug, Default)]
pub struct CodecRegistry {
    bulk_disabled: FxHashSet<CodecId>,
}

impl CodecRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mask bulk support for one codec. Used by tests to exercise the
    /// row-at-a-time fallback.
    pub fn with_bulk_disabled(mut self, codec: CodecId) -> Self {
        self.bulk_disabled.insert(codec);
        self
    }

    /// The bulk decode function for `codec`, or `None` when the codec only
    /// supports row-at-a-time decoding.
    pub fn bulk_decompressor(&self, codec: CodecId) -> Option<DecompressAllFn> {
        if self.bulk_disabled.contains(&codec) {
            return None;
        }
        match codec {
            CodecId::Plain => Some(plain::decompress_all as DecompressAllFn),
            CodecId::RunLength => Some(run_length::decompress_all as DecompressAllFn),
        }
    }

    /// Build a row decoder for `blob`. Always available.
    pub fn row_decoder(&self, blob: &[u8], ty: ElementType) -> Result<Box<dyn RowDecoder>> {
        let header = BlobHeader::parse(blob)?;
        match header.codec {
            CodecId::Plain => plain::row_decoder(blob, header, ty),
            CodecId::RunLength => run_length::row_decoder(blob, header, ty),
        }
    }
}
