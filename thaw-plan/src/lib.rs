//! Planner-side construction of decompression scans.
//!
//! The planner maps the compressed scan's output columns onto the logical
//! (decompressed) relation, classifies qualifiers into vectorizable and
//! residual lists, and derives the sort information the heap batch queue
//! needs for batch sorted merge. The executor consumes the resulting
//! [`ScanPlan`] without further catalog access.

mod layout;
mod mapping;
mod planner;
mod quals;
mod settings;
mod sort;

pub use layout::{ChildColumn, ChildColumnRole, CompressedLayout, OutputColumn};
pub use mapping::{ColumnDescriptor, ColumnKind, NeededColumns, ScanMapping};
pub use planner::{
    build_scan_plan, AggregateFunction, AggregateRequest, AggregateSpec, ScanPlan, ScanPlanInput,
    SystemColumnRequest,
};
pub use quals::{ClassifiedQuals, VectorQual};
pub use settings::{ScanSettings, VectorQualMode};
pub use sort::{OrderByKey, PresortKey, SortDirection, SortInfo, SortKey};
