//! Thaw: transparent decompression for batched columnar time-series storage.
//!
//! A relational store compresses time-series rows into batches of up to a
//! thousand rows, each column encoded independently and segmentby columns
//! stored once per batch. Thaw is the execution operator that reads those
//! batches back and presents a stream of logical rows to the query engine
//! as if the data were never compressed.
//!
//! # Crate Topology
//!
//! The workspace is layered, with Arrow arrays as the interchange format
//! from the codecs up through execution:
//!
//! - [`thaw_plan`] builds the per-scan column descriptor table, classifies
//!   qualifiers into vectorizable and residual lists, and derives the sort
//!   info used for batch sorted merge.
//! - [`thaw_exec`] is the operator: per-batch arenas, bulk decompression
//!   into columnar buffers, vectorized qualifier masks, row emission via a
//!   one-slot FIFO or an N-way sorted merge heap, and a vectorized partial
//!   aggregation fast path that skips row materialization.
//! - [`thaw_codec`] treats compression algorithms as black boxes that
//!   decode one column of one batch, either in bulk to an Arrow array or
//!   row by row.
//! - [`thaw_expr`] holds the qualifier AST and the operator registries
//!   (commutators, vector predicates).
//! - [`thaw_types`] and [`thaw_result`] carry the shared scalar types and
//!   the unified error enum.
//!
//! # Example
//!
//! Plan a scan over a compressed relation and pull its rows:
//!
//! ```ignore
//! use thaw::plan::{build_scan_plan, ScanPlanInput, ScanSettings};
//! use thaw::exec::{DecompressScan, ExecContext};
//!
//! let plan = build_scan_plan(input, &ScanSettings::default(), &codecs)?;
//! let mut scan = DecompressScan::open(plan, child, ExecContext::default())?;
//! while let Some(row) = scan.next()? {
//!     // one logical row, in output-column order
//! }
//! ```

pub use thaw_result::{Error, Result};

pub mod codec {
    pub use thaw_codec::*;
}

pub mod exec {
    pub use thaw_exec::*;
}

pub mod expr {
    pub use thaw_expr::*;
}

pub mod plan {
    pub use thaw_plan::*;
}

pub mod types {
    pub use thaw_types::*;
}
