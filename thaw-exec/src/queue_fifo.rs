//! One-slot batch queue for scans without an ordering requirement.
//!
//! At most one batch is open; its rows stream out in storage order, then
//! the slot refills from the child. This is the hot path, kept trivial so
//! the generic exec body inlines it.

use thaw_result::Result;
use thaw_types::OutputRow;

use crate::batch::{BatchArray, BatchState};
use crate::queue::{BatchQueue, QueueRuntime};
use crate::source::CompressedRow;
use crate::vector_qual::apply_vector_quals;

#[derive(Default)]
pub(crate) struct FifoQueue {
    slot: Option<usize>,
}

impl FifoQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }
}

impl BatchQueue for FifoQueue {
    fn needs_next_batch(&self, _batches: &BatchArray) -> bool {
        self.slot.is_none()
    }

    fn push_batch(&mut self, rt: &mut QueueRuntime<'_>, row: CompressedRow) -> Result<()> {
        let arena = rt.batches.take_arena();
        let mut state = BatchState::new(row, rt.plan, arena, 0)?;
        let removed = apply_vector_quals(&mut state, rt.quals, rt.plan, rt.ctx)?;
        rt.metrics.rows_removed_by_vectorized_filter += removed;
        rt.metrics.batches_opened += 1;

        if !state.seek_first() {
            // Fully filtered: never enters the queue.
            rt.batches.recycle(state);
            return Ok(());
        }
        tracing::trace!(rows = state.total_rows(), "opened batch");
        self.slot = Some(rt.batches.insert(state));
        Ok(())
    }

    fn pop(&mut self, rt: &mut QueueRuntime<'_>) -> Result<()> {
        let Some(slot) = self.slot else {
            return Ok(());
        };
        if !rt.batches.get_mut(slot)?.advance() {
            rt.batches.release(slot);
            self.slot = None;
        }
        Ok(())
    }

    fn top_row(&mut self, rt: &mut QueueRuntime<'_>) -> Result<Option<OutputRow>> {
        let Some(slot) = self.slot else {
            return Ok(None);
        };
        let row = rt
            .batches
            .get_mut(slot)?
            .materialize(rt.plan, &rt.ctx.codecs)?;
        Ok(Some(row))
    }

    fn reset(&mut self, batches: &mut BatchArray) {
        if let Some(slot) = self.slot.take() {
            batches.release(slot);
        }
    }
}
