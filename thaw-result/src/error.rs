use std::fmt;

use thiserror::Error;

/// Unified error type for planning and executing decompression scans.
///
/// Every failure mode is fatal to the running query: the operator never
/// retries, swallows, or degrades to per-row recovery. Errors propagate
/// upward with `?` and are rendered for the user at the engine boundary.
#[derive(Error, Debug)]
pub enum Error {
    /// Arrow error during columnar data operations.
    ///
    /// Raised when building decoded arrays, evaluating comparison kernels,
    /// or assembling record batches from the compressed scan.
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// The plan handed to the operator violates the decompression contract.
    ///
    /// Covers a missing count metadata column, a needed output column that no
    /// child scan column produces, a sequence column that is required but
    /// absent, unsupported system columns, and non-column entries in the
    /// child scan target list. These indicate planner bugs or catalog drift,
    /// not user input problems.
    #[error("planner contract violation: {0}")]
    PlannerContract(String),

    /// A compression codec failed or produced an unexpected shape.
    ///
    /// The batch is atomic: there is no partial-row recovery, so a codec
    /// error aborts the whole query.
    #[error("codec error: {0}")]
    Codec(String),

    /// Numeric overflow while accumulating a vectorized aggregate.
    #[error("{0} out of range")]
    NumericValueOutOfRange(&'static str),

    /// The query was canceled; per-batch arenas have been released.
    #[error("query canceled")]
    Canceled,

    /// A requested capability (e.g. an aggregate function) has no
    /// vectorized implementation. Raised at operator init, never mid-stream.
    #[error("not supported: {0}")]
    NotSupported(String),

    /// Invalid user input or API parameter.
    #[error("invalid argument: {0}")]
    InvalidArgumentError(String),

    /// Internal error indicating a bug or violated invariant.
    #[error("an internal operation failed: {0}")]
    Internal(String),
}

impl Error {
    /// Create a codec error from any displayable error.
    #[inline]
    pub fn codec<E: fmt::Display>(err: E) -> Self {
        Error::Codec(err.to_string())
    }

    /// Create a planner contract violation from any displayable message.
    #[inline]
    pub fn planner<E: fmt::Display>(msg: E) -> Self {
        Error::PlannerContract(msg.to_string())
    }
}
