//! Per-batch and scratch memory arenas.
//!
//! Each open batch owns one [`BatchArena`] sized at operator init so that a
//! full batch of decoded columns fits in a single page-multiple region. The
//! arena tracks live bytes against that target and is reset when the batch
//! is released, so steady-state decompression does not grow the process
//! footprint per batch.
//!
//! Codec-internal staging goes through a separate [`ScratchArena`] that is
//! reset between columns of the same batch and never shared across batches.

use arrow::buffer::MutableBuffer;

/// Accounting arena backing one batch's decoded column buffers.
#[derive(Debug)]
pub struct BatchArena {
    target: usize,
    live: usize,
}

impl BatchArena {
    pub fn with_target(target: usize) -> Self {
        Self { target, live: 0 }
    }

    /// Hand out a buffer with at least `bytes` of capacity, charging the
    /// allocation against this arena.
    pub fn alloc(&mut self, bytes: usize) -> MutableBuffer {
        self.live += bytes;
        MutableBuffer::with_capacity(bytes)
    }

    /// Release everything allocated from this arena. The buffers themselves
    /// are freed when the batch drops its decoded arrays; the arena only
    /// resets its accounting.
    pub fn reset(&mut self) {
        self.live = 0;
    }

    pub fn live_bytes(&self) -> usize {
        self.live
    }

    pub fn target_bytes(&self) -> usize {
        self.target
    }
}

/// Reusable staging buffer for codec-internal work.
///
/// Reset between columns; retains its capacity so repeated decodes of
/// similar batches allocate once.
#[derive(Debug, Default)]
pub struct ScratchArena {
    buf: Vec<u8>,
}

impl ScratchArena {
    pub fn reset(&mut self) {
        self.buf.clear();
    }

    pub fn buffer(&mut self) -> &mut Vec<u8> {
        &mut self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arena_accounts_live_bytes() {
        let mut arena = BatchArena::with_target(8192);
        let _a = arena.alloc(4096);
        let _b = arena.alloc(1024);
        assert_eq!(arena.live_bytes(), 5120);
        arena.reset();
        assert_eq!(arena.live_bytes(), 0);
        assert_eq!(arena.target_bytes(), 8192);
    }

    #[test]
    fn scratch_retains_capacity_across_resets() {
        let mut scratch = ScratchArena::default();
        scratch.buffer().extend_from_slice(&[0u8; 512]);
        let cap = scratch.buffer().capacity();
        scratch.reset();
        assert!(scratch.buffer().is_empty());
        assert!(scratch.buffer().capacity() >= cap.min(512));
    }
}
