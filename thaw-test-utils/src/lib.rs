//! Test-side helpers: compressed-batch encoders, an in-memory child scan,
//! and a row-at-a-time decompression baseline for equivalence checks.
//!
//! The compressor proper is out of scope for the decompression stack, so
//! the encoders live here and only exist to feed tests.

use std::sync::Once;

mod baseline;
mod encode;
mod source;

pub use baseline::baseline_rows;
pub use encode::{
    encode_plain_f32, encode_plain_f64, encode_plain_i32, encode_plain_i64, encode_run_length_i32,
    encode_run_length_i64,
};
pub use source::{drain_scan, ChildCell, MemSource};

static INIT: Once = Once::new();

/// Initialize tracing for test binaries. Safe to call multiple times.
pub fn init_tracing_for_tests() {
    INIT.call_once(|| {
        use tracing_subscriber::filter::EnvFilter;
        use tracing_subscriber::fmt;
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        fmt().with_env_filter(filter).with_target(false).init();
    });
}
