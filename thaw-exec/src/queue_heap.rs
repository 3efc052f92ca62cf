//! Heap batch queue: N-way sorted merge across open batches.
//!
//! Entries are `(normalized key, admission seq, slot)`; the key carries
//! direction and null placement, so a plain min-binary-heap yields rows in
//! the declared order, and the admission sequence makes ties deterministic
//! while preserving each batch's own row order (stable merge).
//!
//! The child delivers compressed rows presorted on min/max metadata for the
//! leading sort key, and every row carries that metadata. The queue keeps
//! one fetched row *staged* without opening it: its min value bounds every
//! future batch, so while the heap's top row sorts strictly before the
//! staged min, rows stream out and the staged batch stays compressed.
//! Batches with non-overlapping windows therefore drain one at a time; only
//! genuinely overlapping batches are open together.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use thaw_result::{Error, Result};
use thaw_types::OutputRow;

use crate::batch::{BatchArray, BatchState};
use crate::queue::{BatchQueue, QueueRuntime};
use crate::sort_key::{extract_key, BatchRowKey, KeyPart};
use crate::source::CompressedRow;
use crate::vector_qual::apply_vector_quals;

struct HeapEntry {
    key: BatchRowKey,
    seq: u64,
    slot: usize,
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap and we want the smallest key
        // (then the earliest admitted batch) on top.
        other
            .key
            .cmp(&self.key)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapEntry {}

/// A compressed row fetched from the child but not yet opened. Its min
/// metadata value for the leading sort key is all the merge needs until
/// the heap's top row catches up with it.
struct StagedBatch {
    row: CompressedRow,
    min_key: KeyPart,
}

pub(crate) struct HeapQueue {
    heap: BinaryHeap<HeapEntry>,
    staged: Option<StagedBatch>,
    /// Leading-key min of the most recent row fetched from the child; no
    /// future batch can start before it.
    watermark: Option<KeyPart>,
    next_seq: u64,
}

impl HeapQueue {
    pub(crate) fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            staged: None,
            watermark: None,
            next_seq: 0,
        }
    }

    fn sort_keys<'a>(rt: &QueueRuntime<'a>) -> Result<&'a [thaw_plan::SortKey]> {
        rt.plan
            .sort_info
            .as_ref()
            .map(|info| info.keys.as_slice())
            .ok_or_else(|| Error::Internal("heap queue without sort info".into()))
    }

    /// Open the staged batch: decode its sort-key columns, apply the
    /// vectorized qualifiers, skip filtered leading rows, and admit it to
    /// the heap unless nothing survives.
    fn open_staged(&mut self, rt: &mut QueueRuntime<'_>) -> Result<()> {
        let Some(StagedBatch { row, .. }) = self.staged.take() else {
            return Ok(());
        };
        let seq = self.next_seq;
        self.next_seq += 1;

        let arena = rt.batches.take_arena();
        let mut state = BatchState::new(row, rt.plan, arena, seq)?;

        let removed = apply_vector_quals(&mut state, rt.quals, rt.plan, rt.ctx)?;
        rt.metrics.rows_removed_by_vectorized_filter += removed;
        rt.metrics.batches_opened += 1;

        if !state.seek_first() {
            rt.batches.recycle(state);
            return Ok(());
        }

        let keys = Self::sort_keys(rt)?;
        let key = extract_key(&mut state, keys, rt.plan, rt.ctx)?;
        tracing::trace!(seq, rows = state.total_rows(), "opened batch for merge");
        let slot = rt.batches.insert(state);
        self.heap.push(HeapEntry { key, seq, slot });
        Ok(())
    }
}

impl BatchQueue for HeapQueue {
    fn needs_next_batch(&self, _batches: &BatchArray) -> bool {
        if self.staged.is_some() {
            return false;
        }
        let Some(HeapEntry { key: top, .. }) = self.heap.peek() else {
            return true;
        };
        match (&self.watermark, top.first()) {
            // The top row's leading value has caught up with the last
            // fetched batch's start; the next unfetched batch could sort
            // at or before it.
            (Some(watermark), Some(leading)) => leading >= watermark,
            _ => true,
        }
    }

    fn push_batch(&mut self, rt: &mut QueueRuntime<'_>, row: CompressedRow) -> Result<()> {
        if self.staged.is_some() {
            return Err(Error::Internal(
                "pushed a compressed row while another is staged".into(),
            ));
        }
        let sort_info = rt
            .plan
            .sort_info
            .as_ref()
            .ok_or_else(|| Error::Internal("heap queue without sort info".into()))?;
        let presort = sort_info
            .presort
            .first()
            .ok_or_else(|| Error::Internal("heap queue without presort metadata".into()))?;
        let leading = sort_info
            .keys
            .first()
            .ok_or_else(|| Error::Internal("heap queue without sort keys".into()))?;

        let min_value = row.scalar(presort.input_position)?;
        let min_key = KeyPart::new(min_value.as_ref(), leading);
        self.watermark = Some(min_key.clone());
        self.staged = Some(StagedBatch { row, min_key });
        Ok(())
    }

    fn pop(&mut self, rt: &mut QueueRuntime<'_>) -> Result<()> {
        let Some(entry) = self.heap.pop() else {
            return Ok(());
        };
        let keys = Self::sort_keys(rt)?;
        let state = rt.batches.get_mut(entry.slot)?;
        if state.advance() {
            let key = extract_key(state, keys, rt.plan, rt.ctx)?;
            self.heap.push(HeapEntry {
                key,
                seq: entry.seq,
                slot: entry.slot,
            });
        } else {
            rt.batches.release(entry.slot);
        }
        Ok(())
    }

    fn prepare_top(&mut self, rt: &mut QueueRuntime<'_>) -> Result<bool> {
        let Some(staged) = &self.staged else {
            return Ok(true);
        };
        let must_open = match self.heap.peek() {
            None => true,
            Some(HeapEntry { key: top, .. }) => top
                .first()
                .map_or(true, |leading| *leading >= staged.min_key),
        };
        if must_open {
            // The staged batch can contribute the next row; open it and
            // have the caller re-check the fetch horizon.
            self.open_staged(rt)?;
            return Ok(false);
        }
        Ok(true)
    }

    fn top_row(&mut self, rt: &mut QueueRuntime<'_>) -> Result<Option<OutputRow>> {
        let Some(HeapEntry { slot, .. }) = self.heap.peek() else {
            return Ok(None);
        };
        let row = rt
            .batches
            .get_mut(*slot)?
            .materialize(rt.plan, &rt.ctx.codecs)?;
        Ok(Some(row))
    }

    fn reset(&mut self, batches: &mut BatchArray) {
        for entry in self.heap.drain() {
            batches.release(entry.slot);
        }
        self.staged = None;
        self.watermark = None;
    }
}
