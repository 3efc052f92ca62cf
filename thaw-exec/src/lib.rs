//! Execution operator for transparent batch decompression.
//!
//! The operator pulls compressed input rows from a child scan, turns each
//! one into an open batch (decoded columnar buffers in a per-batch arena),
//! evaluates vectorized qualifiers over the decoded buffers, and emits
//! logical rows either through a one-slot FIFO queue or through an N-way
//! sorted merge heap. A single-partial-aggregate fast path bypasses row
//! materialization entirely.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thaw_codec::CodecRegistry;
use thaw_result::{Error, Result};

mod batch;
mod queue;
mod queue_fifo;
mod queue_heap;
mod scan;
mod sort_key;
mod source;
mod vector_agg;
mod vector_qual;

pub use batch::{arena_target_bytes, BatchArray, BatchState};
pub use scan::{DecompressScan, ScanExplain, ScanMetrics, ScanState};
pub use source::{CompressedRow, CompressedSource};

/// Shared execution context: the codec registry and the cancel flag.
///
/// Both are read-mostly process-wide state injected at operator init; the
/// operator itself never mutates them.
#[derive(Clone)]
pub struct ExecContext {
    pub codecs: Arc<CodecRegistry>,
    cancel: Arc<AtomicBool>,
}

impl ExecContext {
    pub fn new(codecs: Arc<CodecRegistry>) -> Self {
        Self {
            codecs,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Use an externally owned cancel flag, e.g. one shared by every
    /// operator of a query.
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Polled at batch boundaries; a set flag unwinds the scan with a
    /// cancellation error after arenas are released.
    pub fn check_cancel(&self) -> Result<()> {
        if self.cancel.load(Ordering::Relaxed) {
            return Err(Error::Canceled);
        }
        Ok(())
    }
}

impl Default for ExecContext {
    fn default() -> Self {
        Self::new(Arc::new(CodecRegistry::new()))
    }
}
