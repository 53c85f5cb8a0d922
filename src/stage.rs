//! # Reduction stages and status vocabulary
//!
//! This module defines the finite set of pipeline stages an exposure moves through and the
//! status values valid within each stage. It is a pure data contract: validation lives here,
//! behavior lives in the segmenter and batcher.
//!
//! ## Stage progression
//!
//! ```text
//! 0 Raw ── 1 Reduction1 ── 2 Reduction2 ── 3 Reduction3 ── 4 Stacking
//! ```
//!
//! Stages 1 to 3 are owned by the external reduction pipeline; their status moves
//! `unknown → processing → completed`. Stage 4 is owned exclusively by this crate and is
//! terminal: a record either enters a stack group (`starting`) or is forwarded without one
//! (`notprocessed`). A stage may only ever advance, never regress.

use std::fmt;
use std::str::FromStr;

use crate::nightstack_errors::NightstackError;

/// An integer milestone in the reduction pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    /// Unprocessed exposure, as ingested
    Raw,
    Reduction1,
    Reduction2,
    Reduction3,
    /// Stacking decision taken; owned by this crate
    Stacking,
}

impl Stage {
    /// Integer value as stored in the `stage` column.
    pub const fn as_i64(self) -> i64 {
        match self {
            Stage::Raw => 0,
            Stage::Reduction1 => 1,
            Stage::Reduction2 => 2,
            Stage::Reduction3 => 3,
            Stage::Stacking => 4,
        }
    }

    /// Parse a stored stage value.
    ///
    /// Return
    /// ------
    /// * The corresponding [`Stage`], or [`NightstackError::InvalidStage`] for
    ///   values outside 0..=4.
    pub fn from_i64(value: i64) -> Result<Self, NightstackError> {
        match value {
            0 => Ok(Stage::Raw),
            1 => Ok(Stage::Reduction1),
            2 => Ok(Stage::Reduction2),
            3 => Ok(Stage::Reduction3),
            4 => Ok(Stage::Stacking),
            other => Err(NightstackError::InvalidStage(other)),
        }
    }

    /// Whether `status` belongs to this stage's vocabulary.
    pub fn allows(self, status: Status) -> bool {
        match self {
            Stage::Raw => matches!(status, Status::Unknown),
            Stage::Reduction1 | Stage::Reduction2 | Stage::Reduction3 => matches!(
                status,
                Status::Unknown | Status::Processing | Status::Completed
            ),
            Stage::Stacking => matches!(status, Status::NotProcessed | Status::Starting),
        }
    }
}

impl TryFrom<i64> for Stage {
    type Error = NightstackError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Stage::from_i64(value)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_i64())
    }
}

/// Processing status of an exposure within its current stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Unknown,
    Processing,
    Completed,
    /// Terminal at stage 4: forwarded without a stack group
    NotProcessed,
    /// Terminal at stage 4: stack group created and handed to a stacking worker
    Starting,
}

impl Status {
    /// String value as stored in the `status` column.
    pub const fn as_str(self) -> &'static str {
        match self {
            Status::Unknown => "unknown",
            Status::Processing => "processing",
            Status::Completed => "completed",
            Status::NotProcessed => "notprocessed",
            Status::Starting => "starting",
        }
    }
}

impl FromStr for Status {
    type Err = NightstackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unknown" => Ok(Status::Unknown),
            "processing" => Ok(Status::Processing),
            "completed" => Ok(Status::Completed),
            "notprocessed" => Ok(Status::NotProcessed),
            "starting" => Ok(Status::Starting),
            other => Err(NightstackError::UnknownStatus(other.to_string())),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod test_stage {
    use super::*;

    #[test]
    fn test_stage_round_trip() {
        for value in 0..=4 {
            let stage = Stage::from_i64(value).unwrap();
            assert_eq!(stage.as_i64(), value);
        }
        assert_eq!(Stage::from_i64(5), Err(NightstackError::InvalidStage(5)));
        assert!(Stage::from_i64(-1).is_err());
    }

    #[test]
    fn test_stage_ordering() {
        assert!(Stage::Raw < Stage::Reduction1);
        assert!(Stage::Reduction3 < Stage::Stacking);
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            Status::Unknown,
            Status::Processing,
            Status::Completed,
            Status::NotProcessed,
            Status::Starting,
        ] {
            assert_eq!(status.as_str().parse::<Status>().unwrap(), status);
        }
        assert!(matches!(
            "failed".parse::<Status>(),
            Err(NightstackError::UnknownStatus(_))
        ));
    }

    #[test]
    fn test_stage_vocabulary() {
        assert!(Stage::Reduction2.allows(Status::Processing));
        assert!(Stage::Reduction3.allows(Status::Completed));
        assert!(!Stage::Reduction3.allows(Status::Starting));
        assert!(Stage::Stacking.allows(Status::NotProcessed));
        assert!(Stage::Stacking.allows(Status::Starting));
        assert!(!Stage::Stacking.allows(Status::Completed));
        assert!(Stage::Raw.allows(Status::Unknown));
        assert!(!Stage::Raw.allows(Status::Completed));
    }
}
