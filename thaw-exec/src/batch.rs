//! Per-batch state and the slab of open batches.
//!
//! A [`BatchState`] is the life of one compressed input row while it serves
//! as a source of decompressed rows: a private arena, decoded column values
//! (bulk arrays or row decoders), the segmentby scalars, the row cursor,
//! and the validity mask produced by vectorized qualifiers. The
//! [`BatchArray`] slab owns up to K open batches and recycles their arenas
//! on release, so steady-state scans acquire batch memory once.

use arrow::array::{Array, ArrayRef, BooleanArray};
use thaw_codec::{BatchArena, CodecRegistry, RowDecoder, ScratchArena};
use thaw_plan::{ColumnKind, ScanPlan};
use thaw_result::{Error, Result};
use thaw_types::{OutputRow, Value, BATCH_ROWS_CAP};

use crate::source::CompressedRow;

/// Default arena size before any bulk columns are accounted for.
const ARENA_BASE_BYTES: usize = 8 * 1024;
/// Estimated per-array bookkeeping outside the value/validity buffers.
const ARRAY_HEADER_BYTES: usize = 64;
const ARENA_PAGE_BYTES: usize = 4096;
const ARENA_MAX_BYTES: usize = 1024 * 1024;

/// Target size for one batch's arena.
///
/// The goal is one-shot page acquisition per batch: the decoded buffers of
/// every bulk-capable column must fit the first region so the reset-reuse
/// discipline never churns the allocator. Rounded up to a 4 KiB multiple
/// and clamped to 1 MiB.
pub fn arena_target_bytes(plan: &ScanPlan) -> usize {
    let mut bytes = ARENA_BASE_BYTES;
    if plan.enable_bulk_decompression {
        for desc in &plan.mapping.descriptors[..plan.mapping.num_compressed] {
            if desc.bulk_ok {
                // Values buffer with 64 elements of padding, plus the
                // validity bitmap and array bookkeeping.
                bytes += (BATCH_ROWS_CAP + 64) * desc.value_width;
                bytes += BATCH_ROWS_CAP / 64 * 8;
                bytes += ARRAY_HEADER_BYTES;
            }
        }
    }
    let bytes = bytes.div_ceil(ARENA_PAGE_BYTES) * ARENA_PAGE_BYTES;
    bytes.min(ARENA_MAX_BYTES)
}

/// Decoded representation of one input column inside an open batch.
enum ColumnValues {
    /// Compressed column not decoded yet; decoding is on demand so a batch
    /// filtered out by its qualifier columns never decodes the rest.
    Pending,
    /// One scalar shared by every row of the batch.
    Segmentby(Option<Value>),
    /// Bulk-decoded columnar buffer.
    Bulk(ArrayRef),
    /// Row-at-a-time decoder; `current` is the datum at `decoded - 1`.
    Rows {
        decoder: Box<dyn RowDecoder>,
        current: Option<Value>,
        decoded: usize,
    },
    /// Count or sequence metadata; never materialized per row.
    Metadata,
}

/// One open batch.
pub struct BatchState {
    row: CompressedRow,
    arena: BatchArena,
    scratch: ScratchArena,
    columns: Vec<ColumnValues>,
    total_rows: usize,
    cursor: usize,
    mask: Option<BooleanArray>,
    seq: u64,
}

impl BatchState {
    /// Wrap a compressed row: read the count, pick up segmentby scalars,
    /// and leave compressed columns pending.
    pub fn new(
        row: CompressedRow,
        plan: &ScanPlan,
        arena: BatchArena,
        seq: u64,
    ) -> Result<Self> {
        let descriptors = &plan.mapping.descriptors;
        let count_desc = &descriptors[plan.mapping.count_descriptor];
        let total_rows = row.count(count_desc.input_position)?;

        let mut columns = Vec::with_capacity(descriptors.len());
        for desc in descriptors {
            let values = match desc.kind {
                ColumnKind::Compressed => ColumnValues::Pending,
                ColumnKind::Segmentby => ColumnValues::Segmentby(row.scalar(desc.input_position)?),
                ColumnKind::MetadataCount | ColumnKind::MetadataSequence => ColumnValues::Metadata,
            };
            columns.push(values);
        }

        Ok(Self {
            row,
            arena,
            scratch: ScratchArena::default(),
            columns,
            total_rows,
            cursor: 0,
            mask: None,
            seq,
        })
    }

    pub fn total_rows(&self) -> usize {
        self.total_rows
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub(crate) fn set_mask(&mut self, mask: BooleanArray) {
        self.mask = Some(mask);
    }

    pub(crate) fn mask(&self) -> Option<&BooleanArray> {
        self.mask.as_ref()
    }

    fn row_passes(&self, i: usize) -> bool {
        self.mask.as_ref().map_or(true, |m| m.value(i))
    }

    /// Position the cursor on the first row passing the validity mask.
    /// Returns false when every row is filtered out.
    pub(crate) fn seek_first(&mut self) -> bool {
        self.cursor = 0;
        while self.cursor < self.total_rows && !self.row_passes(self.cursor) {
            self.cursor += 1;
        }
        self.cursor < self.total_rows
    }

    /// Advance the cursor past the next mask-set position. Returns false
    /// when the batch is exhausted.
    pub(crate) fn advance(&mut self) -> bool {
        self.cursor += 1;
        while self.cursor < self.total_rows && !self.row_passes(self.cursor) {
            self.cursor += 1;
        }
        self.cursor < self.total_rows
    }

    /// Decode column `desc_idx` if it is still pending. Bulk-capable
    /// columns decode into the batch arena in one call; the rest get a
    /// row-at-a-time decoder.
    pub(crate) fn ensure_decoded(
        &mut self,
        desc_idx: usize,
        plan: &ScanPlan,
        codecs: &CodecRegistry,
    ) -> Result<()> {
        if !matches!(self.columns[desc_idx], ColumnValues::Pending) {
            return Ok(());
        }
        let desc = &plan.mapping.descriptors[desc_idx];
        let BatchState {
            row,
            arena,
            scratch,
            columns,
            total_rows,
            ..
        } = self;
        let blob = row.blob(desc.input_position)?;

        if plan.enable_bulk_decompression && desc.bulk_ok {
            let codec = desc.codec.ok_or_else(|| {
                Error::Internal("compressed descriptor without a codec".into())
            })?;
            let decompress = codecs.bulk_decompressor(codec).ok_or_else(|| {
                Error::Internal("bulk-capable column lost its decompressor".into())
            })?;
            scratch.reset();
            let array = decompress(blob, desc.element_type, arena, scratch)?;
            if array.len() != *total_rows {
                return Err(Error::Codec(format!(
                    "codec produced {} rows for a batch declaring {}",
                    array.len(),
                    total_rows
                )));
            }
            debug_assert!(arena.live_bytes() <= arena.target_bytes());
            columns[desc_idx] = ColumnValues::Bulk(array);
        } else {
            let decoder = codecs.row_decoder(blob, desc.element_type)?;
            if decoder.len() != *total_rows {
                return Err(Error::Codec(format!(
                    "codec declares {} rows for a batch declaring {}",
                    decoder.len(),
                    total_rows
                )));
            }
            columns[desc_idx] = ColumnValues::Rows {
                decoder,
                current: None,
                decoded: 0,
            };
        }
        Ok(())
    }

    /// The bulk-decoded array of a column; vectorized qualifiers require it.
    pub(crate) fn bulk_array(&self, desc_idx: usize) -> Result<&ArrayRef> {
        match &self.columns[desc_idx] {
            ColumnValues::Bulk(array) => Ok(array),
            _ => Err(Error::Internal(
                "vectorized qualifier over a column without a bulk buffer".into(),
            )),
        }
    }

    /// The datum of column `desc_idx` at the current cursor. Row decoders
    /// catch up to the cursor, decoding and discarding filtered rows.
    pub(crate) fn value_at_cursor(&mut self, desc_idx: usize) -> Result<Option<Value>> {
        let cursor = self.cursor;
        match &mut self.columns[desc_idx] {
            ColumnValues::Segmentby(value) => Ok(value.clone()),
            ColumnValues::Bulk(array) => Value::from_array(array, cursor),
            ColumnValues::Rows {
                decoder,
                current,
                decoded,
            } => {
                while *decoded <= cursor {
                    *current = decoder.decode_next()?;
                    *decoded += 1;
                }
                Ok(current.clone())
            }
            ColumnValues::Pending => {
                Err(Error::Internal("reading a column that was never decoded".into()))
            }
            ColumnValues::Metadata => {
                Err(Error::Internal("metadata columns are not materialized".into()))
            }
        }
    }

    /// Materialize the logical row at the cursor: decode whatever output
    /// columns are still pending and project them into an output row.
    pub(crate) fn materialize(
        &mut self,
        plan: &ScanPlan,
        codecs: &CodecRegistry,
    ) -> Result<OutputRow> {
        let mut out = vec![None; plan.mapping.num_outputs()];
        for desc_idx in 0..plan.mapping.descriptors.len() {
            let Some(output_position) = plan.mapping.descriptors[desc_idx].output_position else {
                continue;
            };
            self.ensure_decoded(desc_idx, plan, codecs)?;
            out[output_position] = self.value_at_cursor(desc_idx)?;
        }
        Ok(out)
    }

    fn into_arena(self) -> BatchArena {
        let mut arena = self.arena;
        arena.reset();
        arena
    }

    fn live_arena_bytes(&self) -> usize {
        self.arena.live_bytes()
    }
}

/// Slab of open batch states with arena recycling.
pub struct BatchArray {
    arena_target: usize,
    slots: Vec<Option<BatchState>>,
    free_slots: Vec<usize>,
    spare_arenas: Vec<BatchArena>,
}

impl BatchArray {
    pub fn new(arena_target: usize) -> Self {
        Self {
            arena_target,
            slots: Vec::new(),
            free_slots: Vec::new(),
            spare_arenas: Vec::new(),
        }
    }

    /// An arena for a batch about to open, recycled when possible.
    pub fn take_arena(&mut self) -> BatchArena {
        self.spare_arenas
            .pop()
            .unwrap_or_else(|| BatchArena::with_target(self.arena_target))
    }

    /// Return an arena from a batch that never got inserted (e.g. fully
    /// filtered out by its qualifiers).
    pub(crate) fn recycle(&mut self, state: BatchState) {
        self.spare_arenas.push(state.into_arena());
    }

    pub(crate) fn insert(&mut self, state: BatchState) -> usize {
        match self.free_slots.pop() {
            Some(slot) => {
                self.slots[slot] = Some(state);
                slot
            }
            None => {
                self.slots.push(Some(state));
                self.slots.len() - 1
            }
        }
    }

    pub(crate) fn get_mut(&mut self, slot: usize) -> Result<&mut BatchState> {
        self.slots
            .get_mut(slot)
            .and_then(Option::as_mut)
            .ok_or_else(|| Error::Internal(format!("batch slot {slot} is not open")))
    }

    pub(crate) fn release(&mut self, slot: usize) {
        if let Some(state) = self.slots.get_mut(slot).and_then(Option::take) {
            self.spare_arenas.push(state.into_arena());
            self.free_slots.push(slot);
        }
    }

    pub fn release_all(&mut self) {
        for slot in 0..self.slots.len() {
            self.release(slot);
        }
    }

    pub fn open_batches(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Live bytes across all open batch arenas; bounded by
    /// `open_batches() * arena_target()`.
    pub fn total_live_arena_bytes(&self) -> usize {
        self.slots
            .iter()
            .flatten()
            .map(BatchState::live_arena_bytes)
            .sum()
    }

    pub fn arena_target(&self) -> usize {
        self.arena_target
    }
}
