//! # Pipeline façade
//!
//! [`StackPipeline`] wires the store boundary to the segmentation and batching core. One
//! `run` resolves the requested date window to anchored bounds, reads every grouping-key
//! partition in range, plans the stacking updates per partition, and applies them back
//! through the store.
//!
//! Per-partition outcomes are collected in a [`RunOutcome`] map; a failure in one
//! partition (typically a data-integrity violation) never aborts the others. Independent
//! partitions share no mutable state, so a caller may also shard keys across workers and
//! run them concurrently.

use ahash::RandomState;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::constants::GroupingKey;
use crate::nightstack_errors::NightstackError;
use crate::stacking::StackBatcher;
use crate::store::{DateWindow, ExposureStore};

/// Per-partition processing summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PartitionReport {
    /// Records read for the partition
    pub exposures: usize,
    /// Bursts seen, including the final one that is never touched
    pub bursts: usize,
    /// Chunks promoted into fresh stack groups
    pub promoted: usize,
    /// Bursts forwarded whole as `notprocessed`
    pub passed_through: usize,
    /// Chunks left untouched awaiting reduction
    pub deferred: usize,
    /// Records written back through the store
    pub updated: usize,
}

/// Full run outcome.
///
/// Each entry maps a [`GroupingKey`] to the outcome of processing its partition:
///
/// * `Ok(PartitionReport)` - the partition was segmented, batched and written back.
/// * `Err(NightstackError)` - a failure specific to that partition (does not abort
///   the rest of the run).
pub type RunOutcome = HashMap<GroupingKey, Result<PartitionReport, NightstackError>, RandomState>;

/// Central façade: a validated configuration, a store, and the batcher built from them.
pub struct StackPipeline<S: ExposureStore> {
    store: S,
    batcher: StackBatcher,
}

impl<S: ExposureStore> StackPipeline<S> {
    /// Construct a pipeline from a store and a validated configuration.
    ///
    /// Arguments
    /// ---------
    /// * `store`: the observation store boundary.
    /// * `config`: run configuration; validated here, before any store access.
    ///
    /// Return
    /// ------
    /// * A new [`StackPipeline`], or the first configuration error found.
    pub fn new(store: S, config: &PipelineConfig) -> Result<Self, NightstackError> {
        config.validate()?;
        let batcher = StackBatcher::builder()
            .nstack(config.nstack)
            .maxseq(config.maxseq)
            .max_gap(config.max_gap())
            .build()?;
        Ok(StackPipeline { store, batcher })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Process every grouping-key partition inside the requested window.
    ///
    /// The window bounds are first resolved to fully-reduced anchor records; a bound with
    /// no anchor is dropped. Each partition is then read, segmented, batched and written
    /// back; running again with no newly completed reductions applies no updates.
    ///
    /// Arguments
    /// ---------
    /// * `requested`: raw date bounds for the run; `DateWindow::unbounded()` processes
    ///   the whole stream.
    ///
    /// Return
    /// ------
    /// * The per-partition [`RunOutcome`], or a store-level error that prevented the run
    ///   from starting at all.
    pub fn run(&mut self, requested: &DateWindow) -> Result<RunOutcome, NightstackError> {
        let window = self.store.resolve_window(requested)?;
        debug!(?window, "processing window resolved");

        let keys = self.store.distinct_keys(&window)?;
        let mut outcome = RunOutcome::default();
        for key in keys {
            let result = self.process_partition(&key, &window);
            if let Err(err) = &result {
                warn!(%key, %err, "partition rejected");
            }
            outcome.insert(key, result);
        }

        let updated: usize = outcome
            .values()
            .filter_map(|r| r.as_ref().ok())
            .map(|report| report.updated)
            .sum();
        info!(partitions = outcome.len(), updated, "run finished");
        Ok(outcome)
    }

    fn process_partition(
        &mut self,
        key: &GroupingKey,
        window: &DateWindow,
    ) -> Result<PartitionReport, NightstackError> {
        let mut exposures = self.store.query(key, window)?;
        if exposures.is_empty() {
            return Ok(PartitionReport::default());
        }

        let plan = self.batcher.plan(&mut exposures)?;
        let updated = self.store.apply_updates(&plan.batches)?;
        let report = PartitionReport {
            exposures: exposures.len(),
            bursts: plan.bursts,
            promoted: plan.promoted,
            passed_through: plan.passed_through,
            deferred: plan.deferred,
            updated,
        };
        info!(
            %key,
            exposures = report.exposures,
            bursts = report.bursts,
            promoted = report.promoted,
            passed_through = report.passed_through,
            deferred = report.deferred,
            updated = report.updated,
            "partition processed"
        );
        Ok(report)
    }
}
