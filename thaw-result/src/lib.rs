//! Unified error handling for the thaw decompression stack.

mod error;

pub use error::Error;

/// Result alias used across all thaw crates.
pub type Result<T> = std::result::Result<T, Error>;
