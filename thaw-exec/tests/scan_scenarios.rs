//! End-to-end scenarios for the decompression scan operator.

mod common;

use std::sync::atomic::Ordering;

use common::{column_values, device_x_fixture, multiset, ordered_ts_fixture};
use thaw_codec::{CodecId, CodecRegistry};
use thaw_exec::{DecompressScan, ExecContext};
use thaw_expr::{CompareOp, QualNode};
use thaw_plan::{
    build_scan_plan, AggregateFunction, AggregateRequest, CompressedLayout, NeededColumns,
    OrderByKey, OutputColumn, ScanPlanInput, ScanSettings,
};
use thaw_result::Error;
use thaw_test_utils::{
    drain_scan, encode_plain_i32, encode_plain_i64, encode_run_length_i64, ChildCell, MemSource,
};
use thaw_types::{ElementType, Value, MAX_ROWS_PER_BATCH};

fn open_scan(
    layout: &CompressedLayout,
    schema: &[OutputColumn],
    configure: impl FnOnce(&mut ScanPlanInput<'_>),
    settings: &ScanSettings,
    source: MemSource,
) -> DecompressScan<MemSource> {
    let codecs = CodecRegistry::new();
    let mut input = ScanPlanInput::new(1, layout, schema);
    configure(&mut input);
    let plan = build_scan_plan(input, settings, &codecs).unwrap();
    DecompressScan::open(plan, source, ExecContext::default()).unwrap()
}

/// Two batches, `SELECT sum(x)`: 10+20+30 + 100+100 = 260.
#[test]
fn vectorized_sum_over_two_batches() {
    let (layout, schema) = device_x_fixture();
    let source = MemSource::new(
        &layout,
        &schema,
        vec![
            vec![
                ChildCell::Str("a".into()),
                ChildCell::Blob(encode_plain_i32(&[Some(10), Some(20), Some(30)])),
                ChildCell::UInt32(3),
            ],
            vec![
                ChildCell::Str("b".into()),
                ChildCell::Blob(encode_plain_i32(&[Some(100), Some(100)])),
                ChildCell::UInt32(2),
            ],
        ],
    )
    .unwrap();

    let mut scan = open_scan(
        &layout,
        &schema,
        |input| {
            input.needed = NeededColumns::named(&["x"]);
            input.aggregate = Some(AggregateRequest {
                function: AggregateFunction::Sum,
                column: "x".into(),
            });
        },
        &ScanSettings::default(),
        source,
    );

    assert!(scan.explain().vectorized_aggregation);
    let rows = drain_scan(&mut scan).unwrap();
    assert_eq!(rows, vec![vec![Some(Value::Int64(260))]]);
}

/// `SELECT x WHERE x > 15` with the qualifier vectorized.
#[test]
fn vectorized_filter_emits_the_passing_multiset() {
    let (layout, schema) = device_x_fixture();
    let source = MemSource::new(
        &layout,
        &schema,
        vec![
            vec![
                ChildCell::Str("a".into()),
                ChildCell::Blob(encode_plain_i32(&[Some(10), Some(20), Some(30)])),
                ChildCell::UInt32(3),
            ],
            vec![
                ChildCell::Str("b".into()),
                ChildCell::Blob(encode_plain_i32(&[Some(100), Some(100)])),
                ChildCell::UInt32(2),
            ],
        ],
    )
    .unwrap();

    let mut scan = open_scan(
        &layout,
        &schema,
        |input| {
            input.needed = NeededColumns::named(&["x"]);
            input.quals = vec![QualNode::compare("x", CompareOp::Gt, 15i64)];
        },
        &ScanSettings::default(),
        source,
    );

    let rows = drain_scan(&mut scan).unwrap();
    let mut xs = column_values(&rows, 1);
    xs.sort_by_key(|v| match v {
        Some(Value::Int32(x)) => *x,
        _ => i32::MIN,
    });
    assert_eq!(
        xs,
        vec![
            Some(Value::Int32(20)),
            Some(Value::Int32(30)),
            Some(Value::Int32(100)),
            Some(Value::Int32(100)),
        ]
    );

    let explain = scan.explain();
    assert_eq!(explain.vectorized_filters, vec!["x > 15".to_string()]);
    assert!(explain.bulk_decompression);
    assert_eq!(explain.rows_removed_by_vectorized_filter, 1);
}

/// Validity bitmap 0b10110 over [1,2,3,4,5]: rows 1, 2, 4 survive.
/// Sum = 2+3+5 = 10 and three rows are non-null.
#[test]
fn validity_bitmap_masks_values() {
    let (layout, schema) = device_x_fixture();
    let values = [None, Some(2), Some(3), None, Some(5)];
    let rows = vec![vec![
        ChildCell::Str("a".into()),
        ChildCell::Blob(encode_plain_i32(&values)),
        ChildCell::UInt32(5),
    ]];

    let source = MemSource::new(&layout, &schema, rows.clone()).unwrap();
    let mut scan = open_scan(
        &layout,
        &schema,
        |input| {
            input.needed = NeededColumns::named(&["x"]);
            input.aggregate = Some(AggregateRequest {
                function: AggregateFunction::Sum,
                column: "x".into(),
            });
        },
        &ScanSettings::default(),
        source,
    );
    let result = drain_scan(&mut scan).unwrap();
    assert_eq!(result, vec![vec![Some(Value::Int64(10))]]);

    let source = MemSource::new(&layout, &schema, rows).unwrap();
    let mut scan = open_scan(
        &layout,
        &schema,
        |input| input.needed = NeededColumns::named(&["x"]),
        &ScanSettings::default(),
        source,
    );
    let emitted = drain_scan(&mut scan).unwrap();
    assert_eq!(emitted.len(), 5);
    let non_null = column_values(&emitted, 1)
        .into_iter()
        .filter(Option::is_some)
        .count();
    assert_eq!(non_null, 3);
}

/// Sorted merge of overlapping batches [1,4,7] and [2,3,8].
#[test]
fn heap_merges_overlapping_batches_in_order() {
    let (layout, schema) = ordered_ts_fixture();
    let source = MemSource::new(
        &layout,
        &schema,
        vec![
            vec![
                ChildCell::Blob(encode_plain_i64(&[Some(1), Some(4), Some(7)])),
                ChildCell::UInt32(3),
                ChildCell::Int64(1),
                ChildCell::Int64(7),
            ],
            vec![
                ChildCell::Blob(encode_plain_i64(&[Some(2), Some(3), Some(8)])),
                ChildCell::UInt32(3),
                ChildCell::Int64(2),
                ChildCell::Int64(8),
            ],
        ],
    )
    .unwrap();

    let mut scan = open_scan(
        &layout,
        &schema,
        |input| input.order_by = vec![OrderByKey::asc("ts")],
        &ScanSettings::default(),
        source,
    );

    assert!(scan.explain().batch_sorted_merge);
    let rows = drain_scan(&mut scan).unwrap();
    let ts: Vec<i64> = column_values(&rows, 0)
        .into_iter()
        .map(|v| match v {
            Some(Value::Int64(t)) => t,
            other => panic!("unexpected ts {other:?}"),
        })
        .collect();
    assert_eq!(ts, vec![1, 2, 3, 4, 7, 8]);
}

/// Non-overlapping windows: the second batch must stay unopened while the
/// first drains, so at most one batch is open at any point.
#[test]
fn heap_keeps_non_overlapping_batches_unopened() {
    let (layout, schema) = ordered_ts_fixture();
    let source = MemSource::new(
        &layout,
        &schema,
        vec![
            vec![
                ChildCell::Blob(encode_plain_i64(&[Some(1), Some(3), Some(5)])),
                ChildCell::UInt32(3),
                ChildCell::Int64(1),
                ChildCell::Int64(5),
            ],
            vec![
                ChildCell::Blob(encode_plain_i64(&[Some(6), Some(8), Some(9)])),
                ChildCell::UInt32(3),
                ChildCell::Int64(6),
                ChildCell::Int64(9),
            ],
        ],
    )
    .unwrap();

    let mut scan = open_scan(
        &layout,
        &schema,
        |input| input.order_by = vec![OrderByKey::asc("ts")],
        &ScanSettings::default(),
        source,
    );

    let mut ts = Vec::new();
    while let Some(row) = scan.next().unwrap() {
        assert!(
            scan.batch_array().open_batches() <= 1,
            "a non-overlapping batch was opened early"
        );
        match &row[0] {
            Some(Value::Int64(t)) => ts.push(*t),
            other => panic!("unexpected ts {other:?}"),
        }
    }
    assert_eq!(ts, vec![1, 3, 5, 6, 8, 9]);
}

/// Segmentby sum: value times row count, with the product checked in
/// element width.
#[test]
fn segmentby_sum_multiplies_by_count() {
    let layout = CompressedLayout::new()
        .segmentby("x", "x")
        .count("_batch_count");
    let schema = vec![OutputColumn::new("x", ElementType::Int32)];

    let source = MemSource::new(
        &layout,
        &schema,
        vec![vec![ChildCell::Int32(3), ChildCell::UInt32(1000)]],
    )
    .unwrap();
    let mut scan = open_scan(
        &layout,
        &schema,
        |input| {
            input.needed = NeededColumns::named(&["x"]);
            input.aggregate = Some(AggregateRequest {
                function: AggregateFunction::Sum,
                column: "x".into(),
            });
        },
        &ScanSettings::default(),
        source,
    );
    let rows = drain_scan(&mut scan).unwrap();
    assert_eq!(rows, vec![vec![Some(Value::Int64(3000))]]);

    let source = MemSource::new(
        &layout,
        &schema,
        vec![vec![ChildCell::Int32(i32::MAX), ChildCell::UInt32(2)]],
    )
    .unwrap();
    let mut scan = open_scan(
        &layout,
        &schema,
        |input| {
            input.needed = NeededColumns::named(&["x"]);
            input.aggregate = Some(AggregateRequest {
                function: AggregateFunction::Sum,
                column: "x".into(),
            });
        },
        &ScanSettings::default(),
        source,
    );
    assert!(matches!(
        scan.next(),
        Err(Error::NumericValueOutOfRange(_))
    ));
}

/// A batch whose rows all fail the vectorized qualifier never emits and
/// never occupies a queue slot.
#[test]
fn fully_filtered_batches_are_skipped() {
    let (layout, schema) = device_x_fixture();
    let source = MemSource::new(
        &layout,
        &schema,
        vec![vec![
            ChildCell::Str("a".into()),
            ChildCell::Blob(encode_plain_i32(&[Some(1), Some(2), Some(3)])),
            ChildCell::UInt32(3),
        ]],
    )
    .unwrap();

    let mut scan = open_scan(
        &layout,
        &schema,
        |input| {
            input.quals = vec![QualNode::compare("x", CompareOp::Gt, 1000i64)];
        },
        &ScanSettings::default(),
        source,
    );
    let rows = drain_scan(&mut scan).unwrap();
    assert!(rows.is_empty());
    assert_eq!(scan.batch_array().open_batches(), 0);
    assert_eq!(scan.explain().rows_removed_by_vectorized_filter, 3);
}

/// A full-size batch runs through the vectorized path without overrun.
#[test]
fn max_length_batch_decodes_and_filters() {
    let (layout, schema) = device_x_fixture();
    let values: Vec<Option<i32>> = (0..MAX_ROWS_PER_BATCH as i32).map(Some).collect();
    let source = MemSource::new(
        &layout,
        &schema,
        vec![vec![
            ChildCell::Str("a".into()),
            ChildCell::Blob(encode_plain_i32(&values)),
            ChildCell::UInt32(MAX_ROWS_PER_BATCH as u32),
        ]],
    )
    .unwrap();

    let mut scan = open_scan(
        &layout,
        &schema,
        |input| {
            input.quals = vec![QualNode::compare("x", CompareOp::GtEq, 998i64)];
        },
        &ScanSettings::default(),
        source,
    );
    let rows = drain_scan(&mut scan).unwrap();
    assert_eq!(rows.len(), 2);
}

/// All-null input with a non-null count: SUM is NULL, not zero.
#[test]
fn all_null_sum_is_null() {
    let (layout, schema) = device_x_fixture();
    let source = MemSource::new(
        &layout,
        &schema,
        vec![vec![
            ChildCell::Str("a".into()),
            ChildCell::Blob(encode_plain_i32(&[None, None, None])),
            ChildCell::UInt32(3),
        ]],
    )
    .unwrap();

    let mut scan = open_scan(
        &layout,
        &schema,
        |input| {
            input.needed = NeededColumns::named(&["x"]);
            input.aggregate = Some(AggregateRequest {
                function: AggregateFunction::Sum,
                column: "x".into(),
            });
        },
        &ScanSettings::default(),
        source,
    );
    let rows = drain_scan(&mut scan).unwrap();
    assert_eq!(rows, vec![vec![None]]);
}

/// A constant-false qualifier produces zero rows and zero child reads.
#[test]
fn constant_false_qual_short_circuits() {
    let (layout, schema) = device_x_fixture();
    let source = MemSource::new(&layout, &schema, sample_rows()).unwrap();

    let mut scan = open_scan(
        &layout,
        &schema,
        |input| {
            // Strict comparison with a NULL constant can never match.
            input.quals = vec![QualNode::compare(
                "x",
                CompareOp::Gt,
                thaw_types::Literal::Null,
            )];
        },
        &ScanSettings::default(),
        source,
    );

    assert_eq!(scan.next().unwrap(), None);
    assert_eq!(scan.child().next_calls(), 0);
}

/// Residual and vectorized qualifiers combine conjunctively.
#[test]
fn residual_quals_filter_materialized_rows() {
    let (layout, schema) = device_x_fixture();
    let source = MemSource::new(&layout, &schema, sample_rows()).unwrap();

    let mut scan = open_scan(
        &layout,
        &schema,
        |input| {
            input.quals = vec![
                QualNode::compare("x", CompareOp::Gt, 15i64),
                QualNode::compare("device", CompareOp::Eq, "a"),
            ];
        },
        &ScanSettings::default(),
        source,
    );

    let rows = drain_scan(&mut scan).unwrap();
    assert_eq!(
        multiset(&rows),
        multiset(&[
            vec![Some(Value::Str("a".into())), Some(Value::Int32(20))],
            vec![Some(Value::Str("a".into())), Some(Value::Int32(30))],
        ])
    );
    assert_eq!(scan.explain().vectorized_filters.len(), 1);
}

/// With bulk decompression disabled the row-at-a-time path produces the
/// same rows and nothing vectorizes.
#[test]
fn row_at_a_time_mode_matches_bulk_output() {
    let (layout, schema) = device_x_fixture();
    let settings = ScanSettings {
        enable_bulk_decompression: false,
        ..Default::default()
    };

    let source = MemSource::new(&layout, &schema, sample_rows()).unwrap();
    let mut scan = open_scan(
        &layout,
        &schema,
        |input| {
            input.quals = vec![QualNode::compare("x", CompareOp::Gt, 15i64)];
        },
        &settings,
        source,
    );
    let rows = drain_scan(&mut scan).unwrap();

    let explain = scan.explain();
    assert!(!explain.bulk_decompression);
    assert!(explain.vectorized_filters.is_empty());

    let source = MemSource::new(&layout, &schema, sample_rows()).unwrap();
    let mut bulk_scan = open_scan(
        &layout,
        &schema,
        |input| {
            input.quals = vec![QualNode::compare("x", CompareOp::Gt, 15i64)];
        },
        &ScanSettings::default(),
        source,
    );
    let bulk_rows = drain_scan(&mut bulk_scan).unwrap();

    assert_eq!(multiset(&rows), multiset(&bulk_rows));
}

/// Run-length blobs decode through the same scan surface.
#[test]
fn run_length_columns_merge_in_order() {
    let layout = CompressedLayout::new()
        .compressed("ts", "ts", CodecId::RunLength)
        .count("_batch_count")
        .min_metadata("_batch_min_1", 0)
        .max_metadata("_batch_max_1", 0);
    let schema = vec![OutputColumn::new("ts", ElementType::Int64)];

    let source = MemSource::new(
        &layout,
        &schema,
        vec![
            vec![
                ChildCell::Blob(encode_run_length_i64(&[Some(1), Some(1), Some(4)])),
                ChildCell::UInt32(3),
                ChildCell::Int64(1),
                ChildCell::Int64(4),
            ],
            vec![
                ChildCell::Blob(encode_run_length_i64(&[Some(2), Some(2), Some(2)])),
                ChildCell::UInt32(3),
                ChildCell::Int64(2),
                ChildCell::Int64(2),
            ],
        ],
    )
    .unwrap();

    let mut scan = open_scan(
        &layout,
        &schema,
        |input| input.order_by = vec![OrderByKey::asc("ts")],
        &ScanSettings::default(),
        source,
    );
    let rows = drain_scan(&mut scan).unwrap();
    let ts: Vec<i64> = column_values(&rows, 0)
        .into_iter()
        .map(|v| match v {
            Some(Value::Int64(t)) => t,
            other => panic!("unexpected ts {other:?}"),
        })
        .collect();
    assert_eq!(ts, vec![1, 1, 2, 2, 2, 4]);
}

/// Descending order uses the max metadata column and inverted keys.
#[test]
fn heap_merges_descending() {
    let (layout, schema) = ordered_ts_fixture();
    // Presorted descending on max: [9,8,6] then [5,3,1].
    let source = MemSource::new(
        &layout,
        &schema,
        vec![
            vec![
                ChildCell::Blob(encode_plain_i64(&[Some(9), Some(8), Some(6)])),
                ChildCell::UInt32(3),
                ChildCell::Int64(6),
                ChildCell::Int64(9),
            ],
            vec![
                ChildCell::Blob(encode_plain_i64(&[Some(5), Some(3), Some(1)])),
                ChildCell::UInt32(3),
                ChildCell::Int64(1),
                ChildCell::Int64(5),
            ],
        ],
    )
    .unwrap();

    let mut scan = open_scan(
        &layout,
        &schema,
        |input| input.order_by = vec![OrderByKey::desc("ts")],
        &ScanSettings::default(),
        source,
    );
    let rows = drain_scan(&mut scan).unwrap();
    let ts: Vec<i64> = column_values(&rows, 0)
        .into_iter()
        .map(|v| match v {
            Some(Value::Int64(t)) => t,
            other => panic!("unexpected ts {other:?}"),
        })
        .collect();
    assert_eq!(ts, vec![9, 8, 6, 5, 3, 1]);
}

/// Equal sort keys preserve batch admission order (stable merge).
#[test]
fn heap_merge_is_stable_across_equal_keys() {
    let layout = CompressedLayout::new()
        .compressed("ts", "ts", CodecId::Plain)
        .compressed("x", "x", CodecId::Plain)
        .count("_batch_count")
        .min_metadata("_batch_min_1", 0)
        .max_metadata("_batch_max_1", 0);
    let schema = vec![
        OutputColumn::new("ts", ElementType::Int64),
        OutputColumn::new("x", ElementType::Int32),
    ];

    let source = MemSource::new(
        &layout,
        &schema,
        vec![
            vec![
                ChildCell::Blob(encode_plain_i64(&[Some(5), Some(5)])),
                ChildCell::Blob(encode_plain_i32(&[Some(1), Some(2)])),
                ChildCell::UInt32(2),
                ChildCell::Int64(5),
                ChildCell::Int64(5),
            ],
            vec![
                ChildCell::Blob(encode_plain_i64(&[Some(5), Some(5)])),
                ChildCell::Blob(encode_plain_i32(&[Some(3), Some(4)])),
                ChildCell::UInt32(2),
                ChildCell::Int64(5),
                ChildCell::Int64(5),
            ],
        ],
    )
    .unwrap();

    let mut scan = open_scan(
        &layout,
        &schema,
        |input| input.order_by = vec![OrderByKey::asc("ts")],
        &ScanSettings::default(),
        source,
    );
    let rows = drain_scan(&mut scan).unwrap();
    let xs: Vec<i32> = column_values(&rows, 1)
        .into_iter()
        .map(|v| match v {
            Some(Value::Int32(x)) => x,
            other => panic!("unexpected x {other:?}"),
        })
        .collect();
    assert_eq!(xs, vec![1, 2, 3, 4]);
}

/// Rescan releases every batch and replays the child from the start.
#[test]
fn rescan_replays_the_stream() {
    let (layout, schema) = device_x_fixture();
    let source = MemSource::new(&layout, &schema, sample_rows()).unwrap();

    let mut scan = open_scan(
        &layout,
        &schema,
        |input| {
            input.quals = vec![QualNode::compare("x", CompareOp::Gt, 15i64)];
        },
        &ScanSettings::default(),
        source,
    );
    let first = drain_scan(&mut scan).unwrap();
    scan.rescan().unwrap();
    let second = drain_scan(&mut scan).unwrap();

    assert_eq!(first, second);
    assert_eq!(scan.child().rescans(), 1);
    assert_eq!(scan.batch_array().open_batches(), 0);
}

/// Cancellation unwinds with the arenas released.
#[test]
fn cancellation_releases_arenas() {
    let (layout, schema) = device_x_fixture();
    let source = MemSource::new(&layout, &schema, sample_rows()).unwrap();

    let ctx = ExecContext::default();
    let cancel = ctx.cancel_flag();

    let codecs = CodecRegistry::new();
    let mut input = ScanPlanInput::new(1, &layout, &schema);
    input.needed = NeededColumns::named(&["x"]);
    let plan = build_scan_plan(input, &ScanSettings::default(), &codecs).unwrap();
    let mut scan = DecompressScan::open(plan, source, ctx).unwrap();

    cancel.store(true, Ordering::Relaxed);
    assert!(matches!(scan.next(), Err(Error::Canceled)));
    assert_eq!(scan.batch_array().total_live_arena_bytes(), 0);
}

fn sample_rows() -> Vec<Vec<ChildCell>> {
    vec![
        vec![
            ChildCell::Str("a".into()),
            ChildCell::Blob(encode_plain_i32(&[Some(10), Some(20), Some(30)])),
            ChildCell::UInt32(3),
        ],
        vec![
            ChildCell::Str("b".into()),
            ChildCell::Blob(encode_plain_i32(&[Some(100), Some(100)])),
            ChildCell::UInt32(2),
        ],
    ]
}
