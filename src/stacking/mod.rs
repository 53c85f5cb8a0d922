//! # Stack batching
//!
//! This module turns a segmented exposure sequence into **stacking decisions**. Bursts are
//! chunked into fixed-size groups and a group is promoted to the stacking stage only once
//! every member has completed the prerequisite reduction stage.
//!
//! Processing rules
//! -----------------
//! Bursts are visited in ascending id order, always excluding the final burst: the stream
//! is live and append-only, so the highest burst may still be receiving exposures and must
//! never be finalized or subdivided in the current run.
//!
//! For each non-final burst:
//! * A singleton burst, or one longer than `maxseq`, is forwarded whole with
//!   `stage = 4, status = notprocessed`: a lone exposure cannot be co-added and an
//!   over-long run is treated as a data anomaly not worth stacking automatically.
//! * Any other burst is cut into consecutive chunks of up to `nstack` exposures, never
//!   crossing the burst boundary. A chunk whose members are all at stage 3 with status
//!   `completed` or `notprocessed` is promoted under a fresh group id; any other chunk is
//!   left untouched and re-evaluated on a later run, which makes the batcher naturally
//!   resumable: re-running with no newly completed reductions is a no-op.
//!
//! The batcher performs no I/O. It consumes an owned, mutable sequence and produces
//! [`StackBatch`] update intents; the store boundary applies each batch atomically.

use chrono::TimeDelta;
use tracing::debug;

use crate::constants::{Exposures, GroupId, MAXSEQ, MAX_BURST_GAP_SECONDS, NSTACK};
use crate::exposures::sequence_ext::{burst_spans, SequenceExt};
use crate::exposures::ExposureUpdate;
use crate::nightstack_errors::NightstackError;
use crate::stage::{Stage, Status};

/// Why a batch of update intents exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackAction {
    /// Singleton or oversized burst forwarded without co-addition
    PassThrough,
    /// Chunk promoted to stacking under the given fresh group id
    Promote(GroupId),
}

/// One atomic batch of update intents: a promoted stack group or one pass-through burst.
///
/// The store applies every update of a batch in a single transaction, so an interrupted
/// run can never leave a partially promoted stack behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackBatch {
    pub action: StackAction,
    pub updates: Vec<ExposureUpdate>,
}

/// Outcome of planning one partition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StackPlan {
    /// Update batches, in burst order; each is applied atomically
    pub batches: Vec<StackBatch>,
    /// Bursts seen, including the final one that is never touched
    pub bursts: usize,
    /// Chunks promoted into fresh stack groups
    pub promoted: usize,
    /// Bursts forwarded whole as `notprocessed`
    pub passed_through: usize,
    /// Chunks left untouched awaiting reduction
    pub deferred: usize,
}

impl StackPlan {
    /// Total number of record updates across all batches.
    pub fn update_count(&self) -> usize {
        self.batches.iter().map(|b| b.updates.len()).sum()
    }
}

/// Chunking and promotion parameters for one run.
///
/// Use [`StackBatcher::builder`] to customize:
///
/// ```rust
/// use chrono::TimeDelta;
/// use nightstack::stacking::StackBatcher;
///
/// let batcher = StackBatcher::builder()
///     .nstack(3)
///     .maxseq(9)
///     .max_gap(TimeDelta::minutes(20))
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackBatcher {
    nstack: usize,
    maxseq: usize,
    max_gap: TimeDelta,
}

impl Default for StackBatcher {
    fn default() -> Self {
        StackBatcher {
            nstack: NSTACK,
            maxseq: MAXSEQ,
            max_gap: TimeDelta::seconds(MAX_BURST_GAP_SECONDS),
        }
    }
}

/// Fluent builder for [`StackBatcher`]; `build` validates the combination.
#[derive(Debug, Clone)]
pub struct StackBatcherBuilder {
    batcher: StackBatcher,
}

impl StackBatcherBuilder {
    /// Number of exposures combined into a single stack group.
    pub fn nstack(mut self, nstack: usize) -> Self {
        self.batcher.nstack = nstack;
        self
    }

    /// Longest burst still eligible for stacking.
    pub fn maxseq(mut self, maxseq: usize) -> Self {
        self.batcher.maxseq = maxseq;
        self
    }

    /// Maximum gap between consecutive exposures of one burst.
    pub fn max_gap(mut self, max_gap: TimeDelta) -> Self {
        self.batcher.max_gap = max_gap;
        self
    }

    /// Finalize the builder.
    ///
    /// Return
    /// ------
    /// * The validated [`StackBatcher`], or an error when the parameters are degenerate
    ///   (`nstack < 2`, `maxseq < nstack`, or a non-positive gap).
    pub fn build(self) -> Result<StackBatcher, NightstackError> {
        let StackBatcher {
            nstack,
            maxseq,
            max_gap,
        } = &self.batcher;
        if *nstack < 2 {
            return Err(NightstackError::InvalidConfiguration(format!(
                "nstack must be at least 2, got {nstack}"
            )));
        }
        if *maxseq < *nstack {
            return Err(NightstackError::InvalidConfiguration(format!(
                "maxseq ({maxseq}) must be at least nstack ({nstack})"
            )));
        }
        if *max_gap <= TimeDelta::zero() {
            return Err(NightstackError::InvalidConfiguration(
                "max_gap must be positive".to_string(),
            ));
        }
        Ok(self.batcher)
    }
}

impl StackBatcher {
    /// Create a new builder initialized with the default parameters.
    pub fn builder() -> StackBatcherBuilder {
        StackBatcherBuilder {
            batcher: StackBatcher::default(),
        }
    }

    /// Plan the stacking updates for one partition.
    ///
    /// Validates every record, sorts and segments the sequence, then applies the
    /// processing rules above. The input is only reordered; all state changes are
    /// returned as update intents.
    ///
    /// Arguments
    /// ---------
    /// * `exposures`: one grouping-key partition's exposures, in any order.
    ///
    /// Return
    /// ------
    /// * The [`StackPlan`] for this partition, or a [`NightstackError::DataIntegrity`]
    ///   rejecting the whole partition when a record violates the data model.
    pub fn plan(&self, exposures: &mut Exposures) -> Result<StackPlan, NightstackError> {
        let mut plan = StackPlan::default();
        if exposures.is_empty() {
            return Ok(plan);
        }
        for exposure in exposures.iter() {
            exposure.validate()?;
        }

        let ids = exposures.segment_bursts(self.max_gap);
        let spans = burst_spans(&ids);
        plan.bursts = spans.len();
        if spans.len() <= 1 {
            // The only burst is also the final one; data may still be incoming
            return Ok(plan);
        }

        // Fresh group ids must never collide with any id already present
        let mut max_set = exposures
            .iter()
            .map(|e| e.set)
            .max()
            .unwrap_or(0);

        for span in &spans[..spans.len() - 1] {
            let burst = &exposures[span.clone()];

            if burst.len() == 1 || burst.len() > self.maxseq {
                let updates: Vec<ExposureUpdate> = burst
                    .iter()
                    .filter(|e| e.stage < Stage::Stacking)
                    .map(ExposureUpdate::pass_through)
                    .collect();
                plan.passed_through += 1;
                if !updates.is_empty() {
                    plan.batches.push(StackBatch {
                        action: StackAction::PassThrough,
                        updates,
                    });
                }
                continue;
            }

            for chunk in burst.chunks(self.nstack) {
                let ready = chunk.iter().all(|e| {
                    e.stage == Stage::Reduction3
                        && matches!(e.status, Status::Completed | Status::NotProcessed)
                });
                if !ready {
                    plan.deferred += 1;
                    continue;
                }
                max_set += 1;
                let group = max_set;
                plan.promoted += 1;
                plan.batches.push(StackBatch {
                    action: StackAction::Promote(group),
                    updates: chunk
                        .iter()
                        .map(|e| ExposureUpdate::promote(e, group))
                        .collect(),
                });
            }
        }

        debug!(
            bursts = plan.bursts,
            promoted = plan.promoted,
            passed_through = plan.passed_through,
            deferred = plan.deferred,
            updates = plan.update_count(),
            "partition planned"
        );
        Ok(plan)
    }
}
