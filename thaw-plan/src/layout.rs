//! Catalog-facing description of a compressed relation's physical shape.

use thaw_codec::CodecId;
use thaw_types::ElementType;

/// One column of the logical (decompressed) relation.
#[derive(Clone, Debug)]
pub struct OutputColumn {
    pub name: String,
    pub ty: ElementType,
}

impl OutputColumn {
    pub fn new(name: &str, ty: ElementType) -> Self {
        Self {
            name: name.to_string(),
            ty,
        }
    }
}

/// What one column of the compressed scan's output holds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChildColumnRole {
    /// One scalar shared by every row of the batch; `output` names the
    /// logical column it materializes.
    Segmentby { output: String },
    /// A compressed blob decoding to up to a batch worth of rows.
    Compressed { output: String, codec: CodecId },
    /// Mandatory unsigned count of logical rows in the batch.
    Count,
    /// Monotonic ordering tag within a segmentby group.
    SequenceNum,
    /// Per-batch minimum of ordered-column `key_index` (zero-based).
    MinMetadata { key_index: usize },
    /// Per-batch maximum of ordered-column `key_index`.
    MaxMetadata { key_index: usize },
}

/// One column of the compressed scan's output.
#[derive(Clone, Debug)]
pub struct ChildColumn {
    pub name: String,
    pub role: ChildColumnRole,
}

/// Shape of the compressed scan feeding a decompression operator, in child
/// output order.
#[derive(Clone, Debug, Default)]
pub struct CompressedLayout {
    pub columns: Vec<ChildColumn>,
}

impl CompressedLayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn segmentby(mut self, child_name: &str, output: &str) -> Self {
        self.columns.push(ChildColumn {
            name: child_name.to_string(),
            role: ChildColumnRole::Segmentby {
                output: output.to_string(),
            },
        });
        self
    }

    pub fn compressed(mut self, child_name: &str, output: &str, codec: CodecId) -> Self {
        self.columns.push(ChildColumn {
            name: child_name.to_string(),
            role: ChildColumnRole::Compressed {
                output: output.to_string(),
                codec,
            },
        });
        self
    }

    pub fn count(mut self, child_name: &str) -> Self {
        self.columns.push(ChildColumn {
            name: child_name.to_string(),
            role: ChildColumnRole::Count,
        });
        self
    }

    pub fn sequence_num(mut self, child_name: &str) -> Self {
        self.columns.push(ChildColumn {
            name: child_name.to_string(),
            role: ChildColumnRole::SequenceNum,
        });
        self
    }

    pub fn min_metadata(mut self, child_name: &str, key_index: usize) -> Self {
        self.columns.push(ChildColumn {
            name: child_name.to_string(),
            role: ChildColumnRole::MinMetadata { key_index },
        });
        self
    }

    pub fn max_metadata(mut self, child_name: &str, key_index: usize) -> Self {
        self.columns.push(ChildColumn {
            name: child_name.to_string(),
            role: ChildColumnRole::MaxMetadata { key_index },
        });
        self
    }

    /// Child position of the min (ascending) or max (descending) metadata
    /// column for ordered-column `key_index`.
    pub fn metadata_position(&self, key_index: usize, want_min: bool) -> Option<usize> {
        self.columns.iter().position(|col| match &col.role {
            ChildColumnRole::MinMetadata { key_index: k } => want_min && *k == key_index,
            ChildColumnRole::MaxMetadata { key_index: k } => !want_min && *k == key_index,
            _ => false,
        })
    }
}
