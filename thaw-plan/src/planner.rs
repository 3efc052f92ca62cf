//! Top-level plan construction for one decompression scan.

use rustc_hash::FxHashSet;
use thaw_codec::CodecRegistry;
use thaw_expr::{QualNode, RowQual};
use thaw_result::{Error, Result};
use thaw_types::{ElementType, RelationId};

use crate::layout::{CompressedLayout, OutputColumn};
use crate::mapping::{NeededColumns, ScanMapping};
use crate::quals::{classify_quals, referenced_columns, VectorQual};
use crate::settings::{ScanSettings, VectorQualMode};
use crate::sort::{build_sort_info, OrderByKey, SortInfo};

/// Aggregate functions with a vectorized pushdown implementation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AggregateFunction {
    Sum,
}

/// Consumer request to emit a single partial aggregate instead of rows.
#[derive(Clone, Debug)]
pub struct AggregateRequest {
    pub function: AggregateFunction,
    pub column: String,
}

/// Resolved aggregate pushdown.
#[derive(Clone, Debug)]
pub struct AggregateSpec {
    pub function: AggregateFunction,
    pub output_position: usize,
    pub element_type: ElementType,
}

/// A system column the consumer asked to pass through.
#[derive(Clone, Debug)]
pub enum SystemColumnRequest {
    /// Rowid-like table identity; constified at plan time.
    TableIdentity,
    /// Anything else is rejected.
    Other(String),
}

/// Inputs for planning one decompression scan.
#[derive(Clone, Debug)]
pub struct ScanPlanInput<'a> {
    pub relation_id: RelationId,
    pub layout: &'a CompressedLayout,
    pub output_schema: &'a [OutputColumn],
    pub needed: NeededColumns,
    pub system_columns: Vec<SystemColumnRequest>,
    pub quals: Vec<QualNode>,
    pub order_by: Vec<OrderByKey>,
    /// The consumer requires stable ordering within a segmentby group, so
    /// the sequence metadata column becomes mandatory.
    pub needs_sequence_num: bool,
    pub aggregate: Option<AggregateRequest>,
}

impl<'a> ScanPlanInput<'a> {
    pub fn new(
        relation_id: RelationId,
        layout: &'a CompressedLayout,
        output_schema: &'a [OutputColumn],
    ) -> Self {
        Self {
            relation_id,
            layout,
            output_schema,
            needed: NeededColumns::All,
            system_columns: Vec::new(),
            quals: Vec::new(),
            order_by: Vec::new(),
            needs_sequence_num: false,
            aggregate: None,
        }
    }
}

/// Everything the executor needs to run one decompression scan.
#[derive(Clone, Debug)]
pub struct ScanPlan {
    pub relation_id: RelationId,
    pub mapping: ScanMapping,
    pub vectorized_quals: Vec<VectorQual>,
    pub residual_quals: Vec<RowQual>,
    /// A qualifier folded to constant false (or NULL under a strict
    /// operator) at plan time; the scan emits nothing.
    pub constant_false_qual: bool,
    pub sort_info: Option<SortInfo>,
    pub batch_sorted_merge: bool,
    pub enable_bulk_decompression: bool,
    pub aggregate: Option<AggregateSpec>,
    pub settings: ScanSettings,
}

/// Build the plan for one decompression scan.
pub fn build_scan_plan(
    input: ScanPlanInput<'_>,
    settings: &ScanSettings,
    codecs: &CodecRegistry,
) -> Result<ScanPlan> {
    for system in &input.system_columns {
        if let SystemColumnRequest::Other(name) = system {
            return Err(Error::planner(format!(
                "transparent decompression only supports the table-identity system column, got '{name}'"
            )));
        }
    }

    let batch_sorted_merge = !input.order_by.is_empty();
    if settings.require_batch_sorted_merge && !batch_sorted_merge {
        return Err(Error::Internal(
            "batch sorted merge is required but not used".into(),
        ));
    }

    if input.aggregate.is_some() {
        return build_aggregate_plan(input, settings, codecs);
    }

    // Qualifier and sort columns must be decompressed along with whatever
    // the consumer projects.
    let needed = resolve_needed(&input, None)?;
    let mapping = ScanMapping::build(
        input.layout,
        input.output_schema,
        needed.as_ref(),
        input.needs_sequence_num,
        codecs,
    )?;

    let enable_bulk = settings.enable_bulk_decompression && mapping.have_bulk_columns;

    let classified = classify_quals(input.quals, &mapping, input.relation_id, enable_bulk)?;
    enforce_vector_qual_mode(settings.require_vector_qual, &classified)?;

    let sort_info = if batch_sorted_merge {
        Some(build_sort_info(&input.order_by, &mapping, input.layout)?)
    } else {
        None
    };

    Ok(ScanPlan {
        relation_id: input.relation_id,
        mapping,
        vectorized_quals: classified.vectorized,
        residual_quals: classified.residual,
        constant_false_qual: classified.constant_false,
        sort_info,
        batch_sorted_merge,
        enable_bulk_decompression: enable_bulk,
        aggregate: None,
        settings: *settings,
    })
}

/// Aggregation pushdown: the output list is exactly one partial aggregate,
/// the scan produces exactly the aggregated column plus count metadata, and
/// no ordering is requested.
fn build_aggregate_plan(
    input: ScanPlanInput<'_>,
    settings: &ScanSettings,
    codecs: &CodecRegistry,
) -> Result<ScanPlan> {
    let request = input
        .aggregate
        .clone()
        .ok_or_else(|| Error::Internal("aggregate plan without an aggregate request".into()))?;

    if !settings.enable_vectorized_aggregation || !settings.enable_bulk_decompression {
        return Err(Error::NotSupported(
            "vectorized aggregation is disabled".into(),
        ));
    }
    if !input.order_by.is_empty() {
        return Err(Error::NotSupported(
            "vectorized aggregation cannot produce sorted output".into(),
        ));
    }

    let needed = resolve_needed(&input, Some(&request.column))?;
    let mapping = ScanMapping::build(
        input.layout,
        input.output_schema,
        needed.as_ref(),
        input.needs_sequence_num,
        codecs,
    )?;

    let output_position = mapping.output_position(&request.column).ok_or_else(|| {
        Error::planner(format!(
            "aggregated column '{}' not found in the decompressed relation",
            request.column
        ))
    })?;
    let element_type = mapping.output_schema[output_position].ty;

    match (request.function, element_type) {
        (AggregateFunction::Sum, ElementType::Int32)
        | (AggregateFunction::Sum, ElementType::Float32)
        | (AggregateFunction::Sum, ElementType::Float64) => {}
        (AggregateFunction::Sum, other) => {
            return Err(Error::NotSupported(format!(
                "vectorized aggregation for SUM over {other:?} is not supported"
            )));
        }
    }

    let classified = classify_quals(input.quals, &mapping, input.relation_id, true)?;
    if !classified.residual.is_empty() {
        return Err(Error::NotSupported(
            "vectorized aggregation cannot evaluate residual qualifiers".into(),
        ));
    }
    enforce_vector_qual_mode(settings.require_vector_qual, &classified)?;

    Ok(ScanPlan {
        relation_id: input.relation_id,
        mapping,
        vectorized_quals: classified.vectorized,
        residual_quals: Vec::new(),
        constant_false_qual: classified.constant_false,
        sort_info: None,
        batch_sorted_merge: false,
        enable_bulk_decompression: true,
        aggregate: Some(AggregateSpec {
            function: request.function,
            output_position,
            element_type,
        }),
        settings: *settings,
    })
}

fn enforce_vector_qual_mode(
    mode: VectorQualMode,
    classified: &crate::quals::ClassifiedQuals,
) -> Result<()> {
    match mode {
        VectorQualMode::Allow => Ok(()),
        VectorQualMode::Forbid if !classified.vectorized.is_empty() => Err(Error::Internal(
            "encountered vector quals when they are disabled".into(),
        )),
        VectorQualMode::Require
            if !classified.vectorized.is_empty() && !classified.residual.is_empty() =>
        {
            Err(Error::Internal(
                "encountered non-vector quals when only vector quals are allowed".into(),
            ))
        }
        _ => Ok(()),
    }
}

/// Resolve the needed-output set: the consumer's projection plus qualifier
/// and sort-key columns (and the aggregated column, when pushing down).
/// `None` means every output column.
fn resolve_needed(
    input: &ScanPlanInput<'_>,
    aggregate_column: Option<&str>,
) -> Result<Option<FxHashSet<usize>>> {
    let position = |name: &str| -> Result<usize> {
        input
            .output_schema
            .iter()
            .position(|col| col.name == name)
            .ok_or_else(|| {
                Error::planner(format!(
                    "column '{name}' not found in the decompressed relation"
                ))
            })
    };

    if let Some(agg) = aggregate_column {
        // The aggregate path reads exactly one column; a wider projection
        // means the pushdown decision was wrong.
        match &input.needed {
            NeededColumns::Named(names) if names.len() == 1 && names[0] == agg => {}
            NeededColumns::Named(_) | NeededColumns::All => {
                return Err(Error::planner(
                    "vectorized aggregation requires the scan to produce exactly the aggregated column",
                ));
            }
        }
        let mut set = FxHashSet::default();
        set.insert(position(agg)?);
        for name in referenced_columns(&input.quals) {
            set.insert(position(&name)?);
        }
        return Ok(Some(set));
    }

    match &input.needed {
        NeededColumns::All => Ok(None),
        NeededColumns::Named(names) => {
            let mut set = FxHashSet::default();
            for name in names {
                set.insert(position(name)?);
            }
            for name in referenced_columns(&input.quals) {
                set.insert(position(&name)?);
            }
            for key in &input.order_by {
                set.insert(position(&key.column)?);
            }
            Ok(Some(set))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::CompressedLayout;
    use thaw_codec::CodecId;
    use thaw_expr::CompareOp;

    fn schema() -> Vec<OutputColumn> {
        vec![
            OutputColumn::new("device", ElementType::Utf8),
            OutputColumn::new("ts", ElementType::Int64),
            OutputColumn::new("x", ElementType::Int32),
        ]
    }

    fn layout() -> CompressedLayout {
        CompressedLayout::new()
            .segmentby("device", "device")
            .compressed("ts", "ts", CodecId::Plain)
            .compressed("x", "x", CodecId::Plain)
            .count("_batch_count")
            .min_metadata("_batch_min_1", 0)
            .max_metadata("_batch_max_1", 0)
    }

    #[test]
    fn qual_columns_become_needed() {
        let layout = layout();
        let schema = schema();
        let mut input = ScanPlanInput::new(1, &layout, &schema);
        input.needed = NeededColumns::named(&["device"]);
        input.quals = vec![QualNode::compare("x", CompareOp::Gt, 15i64)];
        let plan =
            build_scan_plan(input, &ScanSettings::default(), &CodecRegistry::new()).unwrap();
        assert!(plan.mapping.descriptor_for_output(2).is_some());
        assert_eq!(plan.vectorized_quals.len(), 1);
    }

    #[test]
    fn ordering_selects_the_heap_queue() {
        let layout = layout();
        let schema = schema();
        let mut input = ScanPlanInput::new(1, &layout, &schema);
        input.order_by = vec![OrderByKey::asc("ts")];
        let plan =
            build_scan_plan(input, &ScanSettings::default(), &CodecRegistry::new()).unwrap();
        assert!(plan.batch_sorted_merge);
        assert!(plan.sort_info.is_some());
    }

    #[test]
    fn require_batch_sorted_merge_gate_fires() {
        let layout = layout();
        let schema = schema();
        let input = ScanPlanInput::new(1, &layout, &schema);
        let settings = ScanSettings {
            require_batch_sorted_merge: true,
            ..Default::default()
        };
        assert!(build_scan_plan(input, &settings, &CodecRegistry::new()).is_err());
    }

    #[test]
    fn unsupported_system_column_is_rejected() {
        let layout = layout();
        let schema = schema();
        let mut input = ScanPlanInput::new(1, &layout, &schema);
        input.system_columns = vec![SystemColumnRequest::Other("row_pointer".into())];
        let err =
            build_scan_plan(input, &ScanSettings::default(), &CodecRegistry::new()).unwrap_err();
        assert!(err.to_string().contains("table-identity"));
    }

    #[test]
    fn sum_over_int64_is_not_supported() {
        let layout = layout();
        let schema = schema();
        let mut input = ScanPlanInput::new(1, &layout, &schema);
        input.needed = NeededColumns::named(&["ts"]);
        input.aggregate = Some(AggregateRequest {
            function: AggregateFunction::Sum,
            column: "ts".into(),
        });
        assert!(matches!(
            build_scan_plan(input, &ScanSettings::default(), &CodecRegistry::new()),
            Err(Error::NotSupported(_))
        ));
    }

    #[test]
    fn aggregate_pushdown_resolves_the_column() {
        let layout = layout();
        let schema = schema();
        let mut input = ScanPlanInput::new(1, &layout, &schema);
        input.needed = NeededColumns::named(&["x"]);
        input.aggregate = Some(AggregateRequest {
            function: AggregateFunction::Sum,
            column: "x".into(),
        });
        let plan =
            build_scan_plan(input, &ScanSettings::default(), &CodecRegistry::new()).unwrap();
        let spec = plan.aggregate.unwrap();
        assert_eq!(spec.output_position, 2);
        assert_eq!(spec.element_type, ElementType::Int32);
    }

    #[test]
    fn vector_qual_require_mode_rejects_mixed_quals() {
        let layout = layout();
        let schema = schema();
        let mut input = ScanPlanInput::new(1, &layout, &schema);
        input.quals = vec![
            QualNode::compare("x", CompareOp::Gt, 15i64),
            QualNode::compare("device", CompareOp::Eq, "a"),
        ];
        let settings = ScanSettings {
            require_vector_qual: VectorQualMode::Require,
            ..Default::default()
        };
        assert!(build_scan_plan(input, &settings, &CodecRegistry::new()).is_err());
    }
}
