//! # Burst segmentation
//!
//! This module splits one grouping-key partition's ordered exposure sequence into
//! **bursts**: maximal runs of exposures sharing imaging settings, belonging to one
//! originally requested exposure sequence, and taken within a maximum time gap of
//! each other.
//!
//! Algorithm
//! -----------------
//! The sequence is walked pairwise (previous, current). A burst break occurs before
//! `current` when any of:
//!
//! 1. `imagetype`, `target`, `filter` or `exptime` differs between the pair.
//! 2. The previous exposure completed its requested sequence (`iobs == nobs`), a
//!    natural boundary even when the settings happen to repeat.
//! 3. The gap between the pair exceeds the configured maximum (default 30 minutes),
//!    which implies an interruption such as clouds regardless of setting continuity.
//!
//! The burst id is the running count of breaks seen so far. The first exposure of a
//! sequence always starts burst 0 with no break check performed on it, so every
//! record receives exactly one id and ids are contiguous from 0.
//!
//! The segmenter guarantees the `obsdate` ordering itself rather than assuming the
//! store preserves it.

use chrono::TimeDelta;
use itertools::Itertools;
use std::ops::Range;

use crate::constants::{BurstId, Exposures};
use crate::exposures::Exposure;

/// True when a burst boundary falls between `previous` and `current`.
fn burst_break(previous: &Exposure, current: &Exposure, max_gap: TimeDelta) -> bool {
    !current.same_settings(previous)
        || previous.iobs == previous.nobs
        || current.obsdate - previous.obsdate > max_gap
}

/// Extension trait for [`Exposures`] providing the segmentation operations used by
/// the stack batcher.
pub trait SequenceExt {
    /// Sort by `obsdate` ascending, ties broken by record id for a deterministic order.
    fn sort_by_obsdate(&mut self);

    /// Split the sequence into bursts.
    ///
    /// Sorts the sequence first, then assigns one burst id per exposure via a single
    /// monotonically non-decreasing counter.
    ///
    /// Arguments
    /// ---------
    /// * `max_gap`: maximum time between consecutive exposures of one burst.
    ///
    /// Return
    /// ------
    /// * One [`BurstId`] per exposure, in sequence order; empty for an empty sequence.
    fn segment_bursts(&mut self, max_gap: TimeDelta) -> Vec<BurstId>;
}

impl SequenceExt for Exposures {
    fn sort_by_obsdate(&mut self) {
        self.sort_by(|a, b| (a.obsdate, a.id).cmp(&(b.obsdate, b.id)));
    }

    fn segment_bursts(&mut self, max_gap: TimeDelta) -> Vec<BurstId> {
        self.sort_by_obsdate();
        if self.is_empty() {
            return Vec::new();
        }

        let mut ids = Vec::with_capacity(self.len());
        ids.push(0);
        let mut current: BurstId = 0;
        for (previous, exposure) in self.iter().tuple_windows() {
            if burst_break(previous, exposure, max_gap) {
                current += 1;
            }
            ids.push(current);
        }
        ids
    }
}

/// Consecutive index ranges of equal burst id, in ascending burst order.
///
/// The ranges partition `0..ids.len()`; each range is one burst.
pub fn burst_spans(ids: &[BurstId]) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    let mut start = 0;
    for i in 1..ids.len() {
        if ids[i] != ids[i - 1] {
            spans.push(start..i);
            start = i;
        }
    }
    if !ids.is_empty() {
        spans.push(start..ids.len());
    }
    spans
}

#[cfg(test)]
mod test_sequence_ext {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};
    use smallvec::smallvec;

    fn gap() -> TimeDelta {
        TimeDelta::seconds(1800)
    }

    fn at(minute: u32, second: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2018, 9, 9)
            .unwrap()
            .and_hms_opt(20, minute, second)
            .unwrap()
    }

    fn exposure(id: i64, target: &str, minute: u32, iobs: u32, nobs: u32) -> Exposure {
        Exposure::new(id, "SCIENCE", target, "L", 120.0, at(minute, 0), iobs, nobs)
    }

    #[test]
    fn test_single_record_is_one_burst() {
        let mut seq: Exposures = smallvec![exposure(1, "GRB", 0, 1, 3)];
        assert_eq!(seq.segment_bursts(gap()), vec![0]);
    }

    #[test]
    fn test_empty_sequence() {
        let mut seq: Exposures = smallvec![];
        assert!(seq.segment_bursts(gap()).is_empty());
        assert!(burst_spans(&[]).is_empty());
    }

    #[test]
    fn test_setting_change_breaks() {
        let mut seq: Exposures = smallvec![
            exposure(1, "GRB", 0, 1, 4),
            exposure(2, "GRB", 3, 2, 4),
            exposure(3, "Ceph", 6, 1, 2),
        ];
        assert_eq!(seq.segment_bursts(gap()), vec![0, 0, 1]);
    }

    #[test]
    fn test_filter_change_breaks() {
        let mut seq: Exposures = smallvec![
            exposure(1, "GRB", 0, 1, 4),
            exposure(2, "GRB", 3, 2, 4),
        ];
        seq[1].filter = "B".to_string();
        assert_eq!(seq.segment_bursts(gap()), vec![0, 1]);
    }

    #[test]
    fn test_exptime_change_breaks() {
        let mut seq: Exposures = smallvec![
            exposure(1, "GRB", 0, 1, 4),
            exposure(2, "GRB", 3, 2, 4),
        ];
        seq[1].exptime = 60.0;
        assert_eq!(seq.segment_bursts(gap()), vec![0, 1]);
    }

    #[test]
    fn test_completed_sequence_breaks_even_with_same_settings() {
        // Three back-to-back 2-exposure requests of the same target and filter
        let mut seq: Exposures = smallvec![
            exposure(1, "Field88", 0, 1, 2),
            exposure(2, "Field88", 3, 2, 2),
            exposure(3, "Field88", 6, 1, 2),
            exposure(4, "Field88", 9, 2, 2),
            exposure(5, "Field88", 12, 1, 2),
            exposure(6, "Field88", 15, 2, 2),
        ];
        assert_eq!(seq.segment_bursts(gap()), vec![0, 0, 1, 1, 2, 2]);
    }

    #[test]
    fn test_time_gap_breaks() {
        let mut seq: Exposures = smallvec![
            exposure(1, "GW123456", 0, 1, 6),
            exposure(2, "GW123456", 2, 2, 6),
            exposure(3, "GW123456", 40, 3, 6),
        ];
        assert_eq!(seq.segment_bursts(gap()), vec![0, 0, 1]);
    }

    #[test]
    fn test_gap_of_exactly_max_is_not_a_break() {
        let mut seq: Exposures = smallvec![
            exposure(1, "GW123456", 0, 1, 6),
            exposure(2, "GW123456", 30, 2, 6),
        ];
        assert_eq!(seq.segment_bursts(gap()), vec![0, 0]);
    }

    #[test]
    fn test_unsorted_input_is_sorted_first() {
        let mut seq: Exposures = smallvec![
            exposure(3, "Ceph", 6, 1, 2),
            exposure(1, "GRB", 0, 1, 4),
            exposure(2, "GRB", 3, 2, 4),
        ];
        let ids = seq.segment_bursts(gap());
        assert_eq!(
            seq.iter().map(|e| e.id).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert_eq!(ids, vec![0, 0, 1]);
    }

    #[test]
    fn test_every_record_gets_one_contiguous_id() {
        let mut seq: Exposures = smallvec![
            exposure(1, "GRB", 0, 1, 3),
            exposure(2, "GRB", 3, 2, 3),
            exposure(3, "GRB", 6, 3, 3),
            exposure(4, "Ceph", 9, 1, 1),
            exposure(5, "Peg54", 12, 1, 2),
            exposure(6, "Peg54", 15, 2, 2),
        ];
        let ids = seq.segment_bursts(gap());
        assert_eq!(ids.len(), seq.len());
        assert_eq!(ids, vec![0, 0, 0, 1, 2, 2]);

        let spans = burst_spans(&ids);
        assert_eq!(spans, vec![0..3, 3..4, 4..6]);
        assert_eq!(spans.iter().map(|s| s.len()).sum::<usize>(), seq.len());
    }
}
