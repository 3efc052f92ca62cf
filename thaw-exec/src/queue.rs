//! The batch queue capability set shared by the FIFO and heap queues.

use thaw_plan::ScanPlan;
use thaw_result::Result;
use thaw_types::OutputRow;

use crate::batch::BatchArray;
use crate::scan::ScanMetrics;
use crate::source::CompressedRow;
use crate::vector_qual::BoundVectorQual;
use crate::ExecContext;

/// Everything a queue touches while servicing one operator call. The
/// operator owns all of it; queues hold only slot indices.
pub(crate) struct QueueRuntime<'a> {
    pub batches: &'a mut BatchArray,
    pub plan: &'a ScanPlan,
    pub ctx: &'a ExecContext,
    pub quals: &'a [BoundVectorQual],
    pub metrics: &'a mut ScanMetrics,
}

/// Queue over open batches. The operator's exec body is generic over this
/// trait and instantiated once per queue kind, so the one-slot FIFO path
/// inlines while the heap path stays outlined.
pub(crate) trait BatchQueue {
    /// True when the queue wants another compressed row before it can
    /// answer `top_row` for the current ordering horizon.
    fn needs_next_batch(&self, batches: &BatchArray) -> bool;

    /// Open a batch from a compressed row: decode what the queue needs,
    /// apply vectorized qualifiers, and admit it unless fully filtered.
    fn push_batch(&mut self, rt: &mut QueueRuntime<'_>, row: CompressedRow) -> Result<()>;

    /// Step past the current top row, releasing its batch when exhausted.
    fn pop(&mut self, rt: &mut QueueRuntime<'_>) -> Result<()>;

    /// Make the top row servable. Returns false when the queue admitted
    /// deferred work (e.g. opened a staged batch) and the caller must
    /// re-check `needs_next_batch` before asking again.
    fn prepare_top(&mut self, _rt: &mut QueueRuntime<'_>) -> Result<bool> {
        Ok(true)
    }

    /// Materialize the current top row, or `None` when the queue is empty.
    fn top_row(&mut self, rt: &mut QueueRuntime<'_>) -> Result<Option<OutputRow>>;

    /// Drop all open batches, e.g. for rescan.
    fn reset(&mut self, batches: &mut BatchArray);
}
