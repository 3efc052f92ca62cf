//! Runtime switches for the decompression operator.

/// Testing gate for qualifier vectorization.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VectorQualMode {
    /// Vectorize what the registry supports, leave the rest residual.
    #[default]
    Allow,
    /// Any vectorized qualifier is an error.
    Forbid,
    /// Any residual qualifier in a scan that vectorized at least one
    /// candidate is an error.
    Require,
}

/// Read-mostly operator configuration, injected at plan time.
#[derive(Clone, Copy, Debug)]
pub struct ScanSettings {
    /// Off disables bulk decompression, vectorized qualifiers, and
    /// vectorized aggregation, forcing row-at-a-time decoding.
    pub enable_bulk_decompression: bool,
    /// Off disables the vectorized aggregation pushdown.
    pub enable_vectorized_aggregation: bool,
    pub require_vector_qual: VectorQualMode,
    /// With this set, a scan that did not pick the heap batch queue raises
    /// an error.
    pub require_batch_sorted_merge: bool,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            enable_bulk_decompression: true,
            enable_vectorized_aggregation: true,
            require_vector_qual: VectorQualMode::Allow,
            require_batch_sorted_merge: false,
        }
    }
}
