//! Column descriptor table: maps compressed-input columns to logical output
//! columns and classifies each one.
//!
//! The descriptor array is reordered so the compressed kinds occupy a dense
//! prefix `[0, num_compressed)`; the per-batch hot loops iterate only that
//! prefix and touch segmentby/metadata descriptors once per batch.

use rustc_hash::{FxHashMap, FxHashSet};
use thaw_codec::{CodecId, CodecRegistry};
use thaw_result::{Error, Result};
use thaw_types::ElementType;

use crate::layout::{ChildColumnRole, CompressedLayout, OutputColumn};

/// Classification of one compressed-scan column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnKind {
    /// One scalar shared by all rows of a batch.
    Segmentby,
    /// A blob decoding to an array of rows.
    Compressed,
    /// Row count of the batch; consumed by the operator, never emitted.
    MetadataCount,
    /// Ordering tag; consumed by the operator, never emitted.
    MetadataSequence,
}

/// Static per-scan description of one input column.
#[derive(Clone, Debug)]
pub struct ColumnDescriptor {
    /// Position in the compressed scan's output row.
    pub input_position: usize,
    /// Position in the decompressed output row; `None` for metadata kinds.
    pub output_position: Option<usize>,
    pub kind: ColumnKind,
    pub element_type: ElementType,
    /// Element width in bytes, zero for variable-length types.
    pub value_width: usize,
    /// Whether the column's codec has a bulk decompression function for
    /// this element type. Meaningful only for `Compressed` kind.
    pub bulk_ok: bool,
    pub codec: Option<CodecId>,
}

/// Which logical columns the consumer needs produced.
#[derive(Clone, Debug)]
pub enum NeededColumns {
    /// Whole-row reference: every output column becomes needed.
    All,
    /// An explicit set of output column names.
    Named(Vec<String>),
}

impl NeededColumns {
    pub fn named(names: &[&str]) -> Self {
        NeededColumns::Named(names.iter().map(|n| n.to_string()).collect())
    }
}

/// The built descriptor table plus the lookups the executor needs.
#[derive(Clone, Debug)]
pub struct ScanMapping {
    /// All descriptors, compressed kinds first.
    pub descriptors: Vec<ColumnDescriptor>,
    /// Length of the dense compressed prefix.
    pub num_compressed: usize,
    /// The logical relation's full schema; output rows have this width.
    pub output_schema: Vec<OutputColumn>,
    /// Descriptor index of the count metadata column.
    pub count_descriptor: usize,
    /// True if at least one compressed column supports bulk decompression.
    pub have_bulk_columns: bool,
    output_to_descriptor: FxHashMap<usize, usize>,
}

impl ScanMapping {
    /// Build the descriptor table.
    ///
    /// `needed` holds resolved output positions (`None` = whole row). Hard
    /// errors: a needed output column no child column produces, a missing
    /// count column, and a missing sequence column when one is required.
    pub fn build(
        layout: &CompressedLayout,
        output_schema: &[OutputColumn],
        needed: Option<&FxHashSet<usize>>,
        needs_sequence_num: bool,
        codecs: &CodecRegistry,
    ) -> Result<Self> {
        let output_position: FxHashMap<&str, usize> = output_schema
            .iter()
            .enumerate()
            .map(|(pos, col)| (col.name.as_str(), pos))
            .collect();

        let is_needed = |pos: usize| needed.map_or(true, |set| set.contains(&pos));

        let mut compressed = Vec::new();
        let mut rest = Vec::new();
        let mut found_outputs: FxHashSet<usize> = FxHashSet::default();
        let mut missing_count = true;
        let mut missing_sequence = needs_sequence_num;

        for (input_position, child) in layout.columns.iter().enumerate() {
            match &child.role {
                ChildColumnRole::Segmentby { output } => {
                    let pos = resolve_output(&output_position, output)?;
                    if !is_needed(pos) {
                        continue;
                    }
                    found_outputs.insert(pos);
                    let ty = output_schema[pos].ty;
                    rest.push(ColumnDescriptor {
                        input_position,
                        output_position: Some(pos),
                        kind: ColumnKind::Segmentby,
                        element_type: ty,
                        value_width: ty.fixed_width().unwrap_or(0),
                        bulk_ok: false,
                        codec: None,
                    });
                }
                ChildColumnRole::Compressed { output, codec } => {
                    let pos = resolve_output(&output_position, output)?;
                    if !is_needed(pos) {
                        continue;
                    }
                    found_outputs.insert(pos);
                    let ty = output_schema[pos].ty;
                    let bulk_ok =
                        ty.supports_bulk() && codecs.bulk_decompressor(*codec).is_some();
                    compressed.push(ColumnDescriptor {
                        input_position,
                        output_position: Some(pos),
                        kind: ColumnKind::Compressed,
                        element_type: ty,
                        value_width: ty.fixed_width().unwrap_or(0),
                        bulk_ok,
                        codec: Some(*codec),
                    });
                }
                ChildColumnRole::Count => {
                    missing_count = false;
                    rest.push(ColumnDescriptor {
                        input_position,
                        output_position: None,
                        kind: ColumnKind::MetadataCount,
                        element_type: ElementType::Int32,
                        value_width: 4,
                        bulk_ok: false,
                        codec: None,
                    });
                }
                ChildColumnRole::SequenceNum => {
                    if !needs_sequence_num {
                        continue;
                    }
                    missing_sequence = false;
                    rest.push(ColumnDescriptor {
                        input_position,
                        output_position: None,
                        kind: ColumnKind::MetadataSequence,
                        element_type: ElementType::Int64,
                        value_width: 8,
                        bulk_ok: false,
                        codec: None,
                    });
                }
                // Min/max metadata only drives the batch-level presort of
                // the compressed scan; it is not decompressed.
                ChildColumnRole::MinMetadata { .. } | ChildColumnRole::MaxMetadata { .. } => {}
            }
        }

        if missing_count {
            return Err(Error::planner(
                "the count metadata column was not found in the compressed scan output",
            ));
        }
        if missing_sequence {
            return Err(Error::planner(
                "the sequence metadata column was not found in the compressed scan output",
            ));
        }
        // A whole-row reference makes every output column needed.
        let needed_positions: Vec<usize> = match needed {
            Some(set) => set.iter().copied().collect(),
            None => (0..output_schema.len()).collect(),
        };
        for pos in needed_positions {
            if !found_outputs.contains(&pos) {
                return Err(Error::planner(format!(
                    "column '{}' is not produced by the compressed scan",
                    output_schema[pos].name
                )));
            }
        }

        let num_compressed = compressed.len();
        let have_bulk_columns = compressed.iter().any(|d| d.bulk_ok);
        let mut descriptors = compressed;
        descriptors.extend(rest);

        let mut output_to_descriptor = FxHashMap::default();
        let mut count_descriptor = None;
        for (idx, desc) in descriptors.iter().enumerate() {
            if let Some(pos) = desc.output_position {
                output_to_descriptor.insert(pos, idx);
            }
            if desc.kind == ColumnKind::MetadataCount {
                count_descriptor = Some(idx);
            }
        }
        let count_descriptor = count_descriptor
            .ok_or_else(|| Error::Internal("count descriptor vanished during mapping".into()))?;

        Ok(Self {
            descriptors,
            num_compressed,
            output_schema: output_schema.to_vec(),
            count_descriptor,
            have_bulk_columns,
            output_to_descriptor,
        })
    }

    /// Descriptor index producing output position `pos`, if the scan
    /// decompresses it.
    pub fn descriptor_for_output(&self, pos: usize) -> Option<usize> {
        self.output_to_descriptor.get(&pos).copied()
    }

    /// Resolve an output column name to its position in the output schema.
    pub fn output_position(&self, name: &str) -> Option<usize> {
        self.output_schema.iter().position(|col| col.name == name)
    }

    pub fn num_outputs(&self) -> usize {
        self.output_schema.len()
    }
}

fn resolve_output(positions: &FxHashMap<&str, usize>, name: &str) -> Result<usize> {
    positions.get(name).copied().ok_or_else(|| {
        Error::planner(format!(
            "column '{name}' not found in the decompressed relation"
        ))
    })
}
