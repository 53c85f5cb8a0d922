pub mod sequence_ext;

use chrono::NaiveDateTime;

use crate::constants::{GroupId, ObsId, Second};
use crate::nightstack_errors::NightstackError;
use crate::stage::{Stage, Status};

/// One exposure record of the observation stream.
///
/// # Fields
///
/// * `id` - store-assigned unique identifier
/// * `imagetype` - frame type (e.g. `SCIENCE`)
/// * `target` - observed target name
/// * `filter` - filter wheel position
/// * `exptime` - exposure duration in seconds
/// * `obsdate` - absolute timestamp of the exposure
/// * `iobs` - 1-based position within the originally requested exposure sequence
/// * `nobs` - declared length of that sequence
/// * `stage` - reduction pipeline milestone (advance-only)
/// * `status` - processing status within the current stage
/// * `set` - stack group id, 0 until a group is assigned; unique within a partition only
#[derive(Debug, Clone, PartialEq)]
pub struct Exposure {
    pub id: ObsId,
    pub imagetype: String,
    pub target: String,
    pub filter: String,
    pub exptime: Second,
    pub obsdate: NaiveDateTime,
    pub iobs: u32,
    pub nobs: u32,
    pub stage: Stage,
    pub status: Status,
    pub set: GroupId,
}

impl Exposure {
    /// Create a new exposure record as ingested: stage 0, status unknown, no group.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: ObsId,
        imagetype: &str,
        target: &str,
        filter: &str,
        exptime: Second,
        obsdate: NaiveDateTime,
        iobs: u32,
        nobs: u32,
    ) -> Self {
        Exposure {
            id,
            imagetype: imagetype.to_string(),
            target: target.to_string(),
            filter: filter.to_string(),
            exptime,
            obsdate,
            iobs,
            nobs,
            stage: Stage::Raw,
            status: Status::Unknown,
            set: 0,
        }
    }

    /// Check the record against the data-model invariants.
    ///
    /// Return
    /// ------
    /// * `Ok(())`, or [`NightstackError::DataIntegrity`] when `iobs` falls outside
    ///   `1..=nobs`. A violation rejects the whole partition rather than letting
    ///   inconsistent data reach the batcher.
    pub fn validate(&self) -> Result<(), NightstackError> {
        if self.iobs == 0 {
            return Err(NightstackError::DataIntegrity {
                id: self.id,
                reason: "iobs is 0, sequence positions are 1-based".to_string(),
            });
        }
        if self.iobs > self.nobs {
            return Err(NightstackError::DataIntegrity {
                id: self.id,
                reason: format!("iobs ({}) exceeds nobs ({})", self.iobs, self.nobs),
            });
        }
        Ok(())
    }

    /// Whether two exposures share the same imaging settings.
    ///
    /// `exptime` is compared exactly: scheduled values are set, not computed, so the
    /// float comparison is reliable.
    pub fn same_settings(&self, other: &Self) -> bool {
        self.imagetype == other.imagetype
            && self.target == other.target
            && self.filter == other.filter
            && self.exptime == other.exptime
    }
}

/// Update intent for a single exposure record.
///
/// Produced by the batcher, applied by the store boundary. The batcher never mutates
/// shared state directly; the intents are the only output side effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExposureUpdate {
    pub id: ObsId,
    pub stage: Stage,
    pub status: Status,
    pub set: GroupId,
}

impl ExposureUpdate {
    /// Forward a singleton or oversized burst member without a stack: stage 4,
    /// `notprocessed`, existing group id left as is.
    pub fn pass_through(exposure: &Exposure) -> Self {
        debug_assert!(exposure.stage < Stage::Stacking);
        ExposureUpdate {
            id: exposure.id,
            stage: Stage::Stacking,
            status: Status::NotProcessed,
            set: exposure.set,
        }
    }

    /// Promote a ready chunk member into a freshly allocated stack group.
    pub fn promote(exposure: &Exposure, group: GroupId) -> Self {
        debug_assert!(exposure.stage == Stage::Reduction3);
        ExposureUpdate {
            id: exposure.id,
            stage: Stage::Stacking,
            status: Status::Starting,
            set: group,
        }
    }
}

#[cfg(test)]
mod test_exposures {
    use super::*;
    use chrono::NaiveDate;

    fn sample(iobs: u32, nobs: u32) -> Exposure {
        let obsdate = NaiveDate::from_ymd_opt(2018, 9, 9)
            .unwrap()
            .and_hms_opt(19, 35, 30)
            .unwrap();
        Exposure::new(1, "SCIENCE", "GRB", "L", 180.0, obsdate, iobs, nobs)
    }

    #[test]
    fn test_new_exposure_is_raw() {
        let exposure = sample(1, 3);
        assert_eq!(exposure.stage, Stage::Raw);
        assert_eq!(exposure.status, Status::Unknown);
        assert_eq!(exposure.set, 0);
        assert!(exposure.validate().is_ok());
    }

    #[test]
    fn test_iobs_bounds() {
        assert!(sample(3, 3).validate().is_ok());
        assert!(matches!(
            sample(4, 3).validate(),
            Err(NightstackError::DataIntegrity { id: 1, .. })
        ));
        assert!(sample(0, 3).validate().is_err());
    }

    #[test]
    fn test_same_settings() {
        let a = sample(1, 3);
        let mut b = sample(2, 3);
        assert!(a.same_settings(&b));

        b.filter = "B".to_string();
        assert!(!a.same_settings(&b));

        let mut c = sample(2, 3);
        c.exptime = 180.5;
        assert!(!a.same_settings(&c));
    }

    #[test]
    fn test_pass_through_keeps_group_id() {
        let mut exposure = sample(1, 1);
        exposure.set = 7;
        let update = ExposureUpdate::pass_through(&exposure);
        assert_eq!(update.stage, Stage::Stacking);
        assert_eq!(update.status, Status::NotProcessed);
        assert_eq!(update.set, 7);
    }

    #[test]
    fn test_promote_assigns_group() {
        let mut exposure = sample(1, 4);
        exposure.stage = Stage::Reduction3;
        exposure.status = Status::Completed;
        let update = ExposureUpdate::promote(&exposure, 5);
        assert_eq!(update.status, Status::Starting);
        assert_eq!(update.set, 5);
    }
}
