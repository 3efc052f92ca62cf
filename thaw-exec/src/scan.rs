//! The decompression scan operator.
//!
//! A pull-based iterator over logical rows. Each `next` call pops the
//! previously returned row, feeds the batch queue from the child scan until
//! its ordering horizon is satisfied, and materializes the queue's top row.
//! The exec body is generic over the queue so the one-slot FIFO path
//! monomorphizes and inlines; the heap path is instantiated separately.

use std::sync::Arc;

use thaw_expr::RowQual;
use thaw_plan::ScanPlan;
use thaw_result::{Error, Result};
use thaw_types::OutputRow;

use crate::batch::{arena_target_bytes, BatchArray};
use crate::queue::{BatchQueue, QueueRuntime};
use crate::queue_fifo::FifoQueue;
use crate::queue_heap::HeapQueue;
use crate::source::CompressedSource;
use crate::vector_agg::run_vectorized_sum;
use crate::vector_qual::{bind_vector_quals, BoundVectorQual};
use crate::ExecContext;

/// Operator lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScanState {
    Init,
    Running,
    Drained,
    Closed,
}

/// Execution counters surfaced through the explain hook.
#[derive(Debug, Default)]
pub struct ScanMetrics {
    pub rows_removed_by_vectorized_filter: u64,
    pub batches_opened: u64,
}

/// Explain output for one decompression scan.
#[derive(Debug)]
pub struct ScanExplain {
    pub vectorized_filters: Vec<String>,
    pub bulk_decompression: bool,
    pub batch_sorted_merge: bool,
    pub vectorized_aggregation: bool,
    pub rows_removed_by_vectorized_filter: u64,
}

enum QueueImpl {
    Fifo(FifoQueue),
    Heap(HeapQueue),
}

/// The operator: transparent decompression of batched columnar storage.
pub struct DecompressScan<S: CompressedSource> {
    child: S,
    plan: Arc<ScanPlan>,
    ctx: ExecContext,
    batches: BatchArray,
    queue: QueueImpl,
    bound_quals: Vec<BoundVectorQual>,
    residual_quals: Vec<RowQual>,
    constant_false: bool,
    child_exhausted: bool,
    aggregate_emitted: bool,
    state: ScanState,
    metrics: ScanMetrics,
}

impl<S: CompressedSource> DecompressScan<S> {
    /// Initialize the operator: bind qualifier constants, size the batch
    /// arena, and pick the queue strategy.
    pub fn open(plan: ScanPlan, child: S, ctx: ExecContext) -> Result<Self> {
        let plan = Arc::new(plan);
        let (bound_quals, constant_false) = bind_vector_quals(&plan)?;
        let arena_target = arena_target_bytes(&plan);
        tracing::debug!(
            arena_target_bytes = arena_target,
            batch_sorted_merge = plan.batch_sorted_merge,
            bulk_decompression = plan.enable_bulk_decompression,
            vectorized_quals = bound_quals.len(),
            "initializing decompression scan"
        );

        let queue = if plan.batch_sorted_merge {
            QueueImpl::Heap(HeapQueue::new())
        } else {
            QueueImpl::Fifo(FifoQueue::new())
        };

        Ok(Self {
            child,
            residual_quals: plan.residual_quals.clone(),
            batches: BatchArray::new(arena_target),
            plan,
            ctx,
            queue,
            bound_quals,
            constant_false,
            child_exhausted: false,
            aggregate_emitted: false,
            state: ScanState::Init,
            metrics: ScanMetrics::default(),
        })
    }

    /// Pull the next logical row, or `None` at end of stream.
    pub fn next(&mut self) -> Result<Option<OutputRow>> {
        match self.state {
            ScanState::Closed => {
                return Err(Error::Internal("decompression scan used after close".into()));
            }
            ScanState::Drained => return Ok(None),
            ScanState::Init | ScanState::Running => {}
        }
        self.state = ScanState::Running;

        if self.plan.aggregate.is_some() {
            return self.next_aggregate();
        }

        if self.constant_false {
            // A qualifier that can never pass: no rows, and no child reads
            // beyond those already consumed.
            self.state = ScanState::Drained;
            return Ok(None);
        }

        let row = match &mut self.queue {
            QueueImpl::Fifo(queue) => exec_impl(
                &mut self.child,
                queue,
                &mut self.child_exhausted,
                &mut self.batches,
                &self.plan,
                &self.ctx,
                &self.bound_quals,
                &mut self.metrics,
                &self.residual_quals,
            )?,
            QueueImpl::Heap(queue) => exec_impl(
                &mut self.child,
                queue,
                &mut self.child_exhausted,
                &mut self.batches,
                &self.plan,
                &self.ctx,
                &self.bound_quals,
                &mut self.metrics,
                &self.residual_quals,
            )?,
        };

        if row.is_none() {
            self.state = ScanState::Drained;
        }
        Ok(row)
    }

    /// Aggregation mode short-circuits the queues entirely and emits one
    /// partial-aggregate tuple.
    fn next_aggregate(&mut self) -> Result<Option<OutputRow>> {
        if self.aggregate_emitted {
            self.state = ScanState::Drained;
            return Ok(None);
        }
        self.aggregate_emitted = true;

        if self.constant_false {
            // Nothing can contribute; the partial sum of zero rows is NULL
            // and the child is never read.
            return Ok(Some(vec![None]));
        }

        let row = run_vectorized_sum(
            &mut self.child,
            &self.plan,
            &self.ctx,
            &self.bound_quals,
            &mut self.batches,
            &mut self.metrics,
        )?;
        self.child_exhausted = true;
        Ok(Some(row))
    }

    /// Release all open batches, reset the queue, and re-request the child.
    pub fn rescan(&mut self) -> Result<()> {
        if self.state == ScanState::Closed {
            return Err(Error::Internal("decompression scan used after close".into()));
        }
        match &mut self.queue {
            QueueImpl::Fifo(queue) => queue.reset(&mut self.batches),
            QueueImpl::Heap(queue) => queue.reset(&mut self.batches),
        }
        self.batches.release_all();
        self.child.rescan()?;
        self.child_exhausted = false;
        self.aggregate_emitted = false;
        self.state = ScanState::Running;
        Ok(())
    }

    /// Release every resource. The operator cannot be used afterwards.
    pub fn close(mut self) {
        match &mut self.queue {
            QueueImpl::Fifo(queue) => queue.reset(&mut self.batches),
            QueueImpl::Heap(queue) => queue.reset(&mut self.batches),
        }
        self.batches.release_all();
        self.state = ScanState::Closed;
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn explain(&self) -> ScanExplain {
        ScanExplain {
            vectorized_filters: self
                .plan
                .vectorized_quals
                .iter()
                .map(|q| q.display.clone())
                .collect(),
            bulk_decompression: self.plan.enable_bulk_decompression,
            batch_sorted_merge: self.plan.batch_sorted_merge,
            vectorized_aggregation: self.plan.aggregate.is_some(),
            rows_removed_by_vectorized_filter: self.metrics.rows_removed_by_vectorized_filter,
        }
    }

    /// The open-batch slab, exposed for arena-discipline checks.
    pub fn batch_array(&self) -> &BatchArray {
        &self.batches
    }

    pub fn child(&self) -> &S {
        &self.child
    }
}

/// One pull through the queue: pop the previous row, satisfy the fetch
/// horizon, and materialize the top. Monomorphized per queue kind.
#[allow(clippy::too_many_arguments)]
fn exec_impl<S: CompressedSource, Q: BatchQueue>(
    child: &mut S,
    queue: &mut Q,
    child_exhausted: &mut bool,
    batches: &mut BatchArray,
    plan: &ScanPlan,
    ctx: &ExecContext,
    quals: &[BoundVectorQual],
    metrics: &mut ScanMetrics,
    residual: &[RowQual],
) -> Result<Option<OutputRow>> {
    loop {
        {
            let mut rt = QueueRuntime {
                batches: &mut *batches,
                plan,
                ctx,
                quals,
                metrics: &mut *metrics,
            };
            queue.pop(&mut rt)?;
        }

        loop {
            while !*child_exhausted && queue.needs_next_batch(batches) {
                // Cancellation is honored at batch boundaries; arenas are
                // released before unwinding.
                ctx.check_cancel().inspect_err(|_| batches.release_all())?;
                match child.next_row()? {
                    None => *child_exhausted = true,
                    Some(row) => {
                        let mut rt = QueueRuntime {
                            batches: &mut *batches,
                            plan,
                            ctx,
                            quals,
                            metrics: &mut *metrics,
                        };
                        queue.push_batch(&mut rt, row)?;
                    }
                }
            }
            let ready = {
                let mut rt = QueueRuntime {
                    batches: &mut *batches,
                    plan,
                    ctx,
                    quals,
                    metrics: &mut *metrics,
                };
                queue.prepare_top(&mut rt)?
            };
            if ready {
                break;
            }
        }

        let top = {
            let mut rt = QueueRuntime {
                batches: &mut *batches,
                plan,
                ctx,
                quals,
                metrics: &mut *metrics,
            };
            queue.top_row(&mut rt)?
        };
        let Some(row) = top else {
            return Ok(None);
        };

        // Residual qualifiers run row by row on the materialized tuple;
        // rows failing them are popped and never surface.
        if residual
            .iter()
            .all(|qual| qual.matches(row[qual.output_position].as_ref()))
        {
            return Ok(Some(row));
        }
    }
}
