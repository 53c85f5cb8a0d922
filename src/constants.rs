//! # Constants and type definitions for nightstack
//!
//! This module centralizes the **batching defaults** and **common type definitions** used
//! throughout the `nightstack` library. It also defines the key data structures for
//! organizing exposures into per-partition sequences.
//!
//! ## Overview
//!
//! - Default stacking parameters (`NSTACK`, `MAXSEQ`, maximum burst gap)
//! - Core type aliases used across the crate
//! - Identifiers for grouping-key partitions
//! - Container types for storing exposures and partitioned exposure sets
//!
//! These definitions are used by all main modules, including segmentation, stack batching,
//! and the store layer.

use crate::exposures::Exposure;
use ahash::RandomState;
use smallvec::SmallVec;
use std::collections::HashMap;

// -------------------------------------------------------------------------------------------------
// Batching defaults
// -------------------------------------------------------------------------------------------------

/// Number of exposures combined into a single stack group
pub const NSTACK: usize = 4;

/// Longest burst still eligible for stacking; longer bursts are passed through unstacked
pub const MAXSEQ: usize = 12;

/// Maximum gap between consecutive exposures of one burst, in seconds (30 minutes)
pub const MAX_BURST_GAP_SECONDS: i64 = 1800;

// -------------------------------------------------------------------------------------------------
// Type aliases
// -------------------------------------------------------------------------------------------------

/// Exposure duration in seconds
pub type Second = f64;

/// Store-assigned identifier of a single exposure record
pub type ObsId = i64;

/// Identifier of a burst within one partition, assigned by the segmenter starting at 0
pub type BurstId = u32;

/// Identifier of a stack group; unique within a partition, not globally
pub type GroupId = i64;

// -------------------------------------------------------------------------------------------------
// Identifiers and data containers
// -------------------------------------------------------------------------------------------------

/// Identifier of one grouping-key partition.
///
/// A partition key is the ordered tuple of values of the configured independent
/// columns (e.g. telescope / camera / instrument). The crate is agnostic to the
/// number and order of the components beyond using them as the partition key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupingKey(SmallVec<[String; 3]>);

impl GroupingKey {
    /// Build a key from its component values, in independent-column order.
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        GroupingKey(values.into_iter().map(Into::into).collect())
    }

    /// Component values in independent-column order.
    pub fn values(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for GroupingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.join("/"))
    }
}

impl<S: Into<String>> FromIterator<S> for GroupingKey {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        GroupingKey::new(iter)
    }
}

/// A small, inline-optimized container for the exposures of a single partition.
pub type Exposures = SmallVec<[Exposure; 6]>;

/// All partitions of an observation stream, keyed by [`GroupingKey`].
pub type ExposureSet = HashMap<GroupingKey, Exposures, RandomState>;

#[cfg(test)]
mod test_constants {
    use super::*;

    #[test]
    fn test_grouping_key_display() {
        let key = GroupingKey::new(["GOTO1", "UT1", "CCD1"]);
        assert_eq!(key.to_string(), "GOTO1/UT1/CCD1");
        assert_eq!(key.len(), 3);
        assert!(!key.is_empty());
    }

    #[test]
    fn test_grouping_key_equality() {
        let a = GroupingKey::new(["GOTO1", "UT1"]);
        let b: GroupingKey = ["GOTO1", "UT1"].into_iter().collect();
        let c = GroupingKey::new(["GOTO1", "UT2"]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
