//! Sort information for batch sorted merge.
//!
//! When the consumer's requested ordering matches the batches' internal
//! ordering, the heap queue merges rows across open batches while the
//! compressed scan is presorted on per-batch min/max metadata: ascending
//! keys presort on the min column, descending keys on the max column.
//! Batches whose windows do not overlap then drain one at a time and only
//! overlapping batches are merged row by row.

use thaw_result::{Error, Result};

use crate::layout::CompressedLayout;
use crate::mapping::ScanMapping;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// One key of the consumer's requested ordering.
#[derive(Clone, Debug)]
pub struct OrderByKey {
    pub column: String,
    pub direction: SortDirection,
    pub nulls_first: bool,
}

impl OrderByKey {
    pub fn asc(column: &str) -> Self {
        Self {
            column: column.to_string(),
            direction: SortDirection::Ascending,
            nulls_first: false,
        }
    }

    pub fn desc(column: &str) -> Self {
        Self {
            column: column.to_string(),
            direction: SortDirection::Descending,
            nulls_first: true,
        }
    }
}

/// A resolved sort key over the decompressed output row.
#[derive(Clone, Copy, Debug)]
pub struct SortKey {
    pub output_position: usize,
    pub direction: SortDirection,
    pub nulls_first: bool,
}

/// The matching per-batch metadata column the compressed scan presorts on.
#[derive(Clone, Copy, Debug)]
pub struct PresortKey {
    pub input_position: usize,
    pub direction: SortDirection,
    pub nulls_first: bool,
}

#[derive(Clone, Debug)]
pub struct SortInfo {
    pub keys: Vec<SortKey>,
    pub presort: Vec<PresortKey>,
}

/// Build heap sort info for the requested ordering.
pub fn build_sort_info(
    order_by: &[OrderByKey],
    mapping: &ScanMapping,
    layout: &CompressedLayout,
) -> Result<SortInfo> {
    let mut keys = Vec::with_capacity(order_by.len());
    let mut presort = Vec::with_capacity(order_by.len());

    for (key_index, key) in order_by.iter().enumerate() {
        let output_position = mapping.output_position(&key.column).ok_or_else(|| {
            Error::planner(format!("sort key '{}' is not an output column", key.column))
        })?;
        if mapping.descriptor_for_output(output_position).is_none() {
            return Err(Error::planner(format!(
                "sort key '{}' is not decompressed by this scan",
                key.column
            )));
        }
        keys.push(SortKey {
            output_position,
            direction: key.direction,
            nulls_first: key.nulls_first,
        });

        let want_min = key.direction == SortDirection::Ascending;
        let input_position = layout.metadata_position(key_index, want_min).ok_or_else(|| {
            Error::planner(format!(
                "couldn't find the {} metadata column for sort key '{}'",
                if want_min { "min" } else { "max" },
                key.column
            ))
        })?;
        presort.push(PresortKey {
            input_position,
            direction: key.direction,
            nulls_first: key.nulls_first,
        });
    }

    Ok(SortInfo { keys, presort })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::OutputColumn;
    use thaw_codec::{CodecId, CodecRegistry};
    use thaw_types::ElementType;

    fn setup() -> (CompressedLayout, ScanMapping) {
        let layout = CompressedLayout::new()
            .compressed("ts", "ts", CodecId::Plain)
            .count("_batch_count")
            .min_metadata("_batch_min_1", 0)
            .max_metadata("_batch_max_1", 0);
        let schema = vec![OutputColumn::new("ts", ElementType::Int64)];
        let mapping =
            ScanMapping::build(&layout, &schema, None, false, &CodecRegistry::new()).unwrap();
        (layout, mapping)
    }

    #[test]
    fn ascending_keys_presort_on_min_metadata() {
        let (layout, mapping) = setup();
        let info = build_sort_info(&[OrderByKey::asc("ts")], &mapping, &layout).unwrap();
        assert_eq!(info.keys.len(), 1);
        assert_eq!(info.presort[0].input_position, 2);
    }

    #[test]
    fn descending_keys_presort_on_max_metadata() {
        let (layout, mapping) = setup();
        let info = build_sort_info(&[OrderByKey::desc("ts")], &mapping, &layout).unwrap();
        assert_eq!(info.presort[0].input_position, 3);
    }

    #[test]
    fn missing_metadata_column_is_a_planner_error() {
        let layout = CompressedLayout::new()
            .compressed("ts", "ts", CodecId::Plain)
            .count("_batch_count");
        let schema = vec![OutputColumn::new("ts", ElementType::Int64)];
        let mapping =
            ScanMapping::build(&layout, &schema, None, false, &CodecRegistry::new()).unwrap();
        assert!(build_sort_info(&[OrderByKey::asc("ts")], &mapping, &layout).is_err());
    }
}
