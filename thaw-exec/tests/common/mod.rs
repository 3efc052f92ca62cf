//! Shared fixtures for the scan integration tests.
#![allow(dead_code)]

use thaw_codec::CodecId;
use thaw_plan::{CompressedLayout, OutputColumn};
use thaw_types::{ElementType, OutputRow, Value};

/// Relation with a segmentby device column and one compressed int column:
/// child shape (device, x_blob, count).
pub fn device_x_fixture() -> (CompressedLayout, Vec<OutputColumn>) {
    let layout = CompressedLayout::new()
        .segmentby("device", "device")
        .compressed("x", "x", CodecId::Plain)
        .count("_batch_count");
    let schema = vec![
        OutputColumn::new("device", ElementType::Utf8),
        OutputColumn::new("x", ElementType::Int32),
    ];
    (layout, schema)
}

/// Relation ordered on a compressed int64 column with min/max metadata:
/// child shape (ts_blob, count, min_1, max_1).
pub fn ordered_ts_fixture() -> (CompressedLayout, Vec<OutputColumn>) {
    let layout = CompressedLayout::new()
        .compressed("ts", "ts", CodecId::Plain)
        .count("_batch_count")
        .min_metadata("_batch_min_1", 0)
        .max_metadata("_batch_max_1", 0);
    let schema = vec![OutputColumn::new("ts", ElementType::Int64)];
    (layout, schema)
}

/// Project one output position out of emitted rows.
pub fn column_values(rows: &[OutputRow], position: usize) -> Vec<Option<Value>> {
    rows.iter().map(|row| row[position].clone()).collect()
}

/// Normalize rows into a sorted multiset for order-insensitive comparison.
pub fn multiset(rows: &[OutputRow]) -> Vec<String> {
    let mut keys: Vec<String> = rows.iter().map(|row| format!("{row:?}")).collect();
    keys.sort();
    keys
}
