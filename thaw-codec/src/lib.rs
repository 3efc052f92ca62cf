//! Compression codecs as seen by the decompression operator.
//!
//! Codecs are black boxes: given an opaque blob and the declared element
//! type they either produce a whole decoded Arrow array in one call (bulk
//! decompression) or a per-row datum iterator. The blob framing in [`blob`]
//! is the only part of the format the rest of the stack knows about.

pub mod arena;
pub mod blob;
mod native;
mod plain;
mod registry;
mod run_length;

pub use arena::{BatchArena, ScratchArena};
pub use blob::{BlobHeader, FLAG_HAS_NULLS};
pub use registry::{CodecId, CodecRegistry, DecompressAllFn, RowDecoder};
