//! # Observation store boundary
//!
//! This module defines the interface the segmentation and batching core uses to read and
//! write exposure records, together with the date-window types of the window reader.
//!
//! Date bounds are never used literally: each requested bound is resolved to the timestamp
//! of the nearest record that has completed the last reduction stage, so a run only ever
//! operates on a range anchored to fully-reduced data. A bound with no such anchor record
//! is dropped (unbounded on that side).

pub mod sqlite;

use chrono::NaiveDateTime;

use crate::constants::{ExposureSet, Exposures, GroupingKey};
use crate::nightstack_errors::NightstackError;
use crate::stacking::StackBatch;

/// Which side of a date window an anchor resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorDirection {
    /// Nearest fully-reduced record at or after the bound
    Earliest,
    /// Nearest fully-reduced record at or before the bound
    Latest,
}

/// Optional date bounds for a processing run. Both sides inclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateWindow {
    pub from: Option<NaiveDateTime>,
    pub to: Option<NaiveDateTime>,
}

impl DateWindow {
    /// No bounds: the whole stream.
    pub fn unbounded() -> Self {
        DateWindow::default()
    }

    /// Lower bound only.
    pub fn since(from: NaiveDateTime) -> Self {
        DateWindow {
            from: Some(from),
            to: None,
        }
    }

    /// Upper bound only.
    pub fn until(to: NaiveDateTime) -> Self {
        DateWindow {
            from: None,
            to: Some(to),
        }
    }

    /// Both bounds.
    pub fn between(from: NaiveDateTime, to: NaiveDateTime) -> Self {
        DateWindow {
            from: Some(from),
            to: Some(to),
        }
    }
}

/// Interface to the relational store holding the observation records.
///
/// The core's access pattern is read-then-write per grouping key. New records may arrive
/// concurrently between the read and the write; excluding the final burst from any
/// mutation bounds that staleness window to the most recent incomplete burst.
pub trait ExposureStore {
    /// Find the nearest fully-reduced record's timestamp for one window side.
    ///
    /// Arguments
    /// ---------
    /// * `direction`: which side of the window the bound belongs to.
    /// * `bound`: the requested raw timestamp.
    ///
    /// Return
    /// ------
    /// * The anchor timestamp, or `None` when no record with completed final reduction
    ///   exists on that side (the bound is then dropped, not an error).
    fn resolve_anchor(
        &self,
        direction: AnchorDirection,
        bound: NaiveDateTime,
    ) -> Result<Option<NaiveDateTime>, NightstackError>;

    /// Resolve both sides of a requested window to anchored bounds.
    fn resolve_window(&self, requested: &DateWindow) -> Result<DateWindow, NightstackError> {
        let from = match requested.from {
            Some(bound) => self.resolve_anchor(AnchorDirection::Earliest, bound)?,
            None => None,
        };
        let to = match requested.to {
            Some(bound) => self.resolve_anchor(AnchorDirection::Latest, bound)?,
            None => None,
        };
        Ok(DateWindow { from, to })
    }

    /// All grouping-key partitions with records inside the window.
    fn distinct_keys(&self, window: &DateWindow) -> Result<Vec<GroupingKey>, NightstackError>;

    /// One partition's records inside the window, ordered by `obsdate` ascending.
    ///
    /// An absent key yields an empty sequence, not an error.
    fn query(
        &self,
        key: &GroupingKey,
        window: &DateWindow,
    ) -> Result<Exposures, NightstackError>;

    /// Apply update batches, each batch atomically (all-or-nothing per stack group).
    ///
    /// Return
    /// ------
    /// * The number of records updated.
    fn apply_updates(&mut self, batches: &[StackBatch]) -> Result<usize, NightstackError>;
}

/// Extension trait for [`ExposureSet`] providing store-backed constructors.
pub trait ExposureSetExt: Sized {
    /// Read every partition inside `window` from the store.
    fn new_from_store<S: ExposureStore>(
        store: &S,
        window: &DateWindow,
    ) -> Result<Self, NightstackError>;
}

impl ExposureSetExt for ExposureSet {
    fn new_from_store<S: ExposureStore>(
        store: &S,
        window: &DateWindow,
    ) -> Result<Self, NightstackError> {
        let mut set = ExposureSet::default();
        for key in store.distinct_keys(window)? {
            let exposures = store.query(&key, window)?;
            set.insert(key, exposures);
        }
        Ok(set)
    }
}
