//! # Observing-night simulator
//!
//! A deterministic generator of synthetic exposure records, used to exercise the
//! segmentation and batching pipeline against realistic observing patterns: multi-filter
//! target sequences, long monitoring runs, survey fields, and a cloud interruption that
//! aborts a sequence partway and repeats it after the sky clears.
//!
//! The default schedule deliberately includes the shapes the batcher must handle:
//! singleton exposures, a monitoring run longer than `MAXSEQ`, a run of exactly `MAXSEQ`,
//! and back-to-back same-filter requests whose stacks must not cross the individual
//! request borders.

use chrono::{NaiveDateTime, TimeDelta};
use rusqlite::{params, Connection};
use tracing::debug;

use crate::constants::Second;
use crate::nightstack_errors::NightstackError;
use crate::stage::{Stage, Status};
use crate::store::sqlite::format_obsdate;
use crate::store::DateWindow;

/// Detector readout overhead between consecutive exposures, in seconds
pub const READOUT_TIME_SECONDS: i64 = 12;

/// How long a cloud interruption lasts before the sky clears, in seconds
pub const CLOUD_DELAY_SECONDS: i64 = 5400;

/// One scheduled exposure request: `repeats` exposures of one target through one filter.
#[derive(Debug, Clone)]
pub struct ScheduledObs {
    pub filter: String,
    pub exptime: Second,
    pub target: String,
    pub repeats: u32,
}

impl ScheduledObs {
    pub fn new(filter: &str, exptime: Second, target: &str, repeats: u32) -> Self {
        ScheduledObs {
            filter: filter.to_string(),
            exptime,
            target: target.to_string(),
            repeats,
        }
    }
}

/// One camera with its instruments and filter wheel.
#[derive(Debug, Clone)]
pub struct CameraSpec {
    pub name: String,
    pub instruments: Vec<String>,
    pub filters: Vec<String>,
}

impl CameraSpec {
    pub fn new(name: &str, instruments: &[&str], filters: &[&str]) -> Self {
        CameraSpec {
            name: name.to_string(),
            instruments: instruments.iter().map(|s| s.to_string()).collect(),
            filters: filters.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// One telescope with its cameras.
#[derive(Debug, Clone)]
pub struct TelescopeSpec {
    pub name: String,
    pub cameras: Vec<CameraSpec>,
}

impl TelescopeSpec {
    pub fn new(name: &str, cameras: Vec<CameraSpec>) -> Self {
        TelescopeSpec {
            name: name.to_string(),
            cameras,
        }
    }
}

/// The two-telescope observatory layout used by the tests.
pub fn default_observatory() -> Vec<TelescopeSpec> {
    let wide = ["L", "B", "V", "R", "I"];
    let narrow = ["L", "G", "R", "I"];
    vec![
        TelescopeSpec::new(
            "GOTO1",
            vec![
                CameraSpec::new("UT1", &["CCD1"], &wide),
                CameraSpec::new("UT2", &["CCD2"], &wide),
                CameraSpec::new("UT3", &["CCD3"], &wide),
                CameraSpec::new("UT4", &["CCD4"], &wide),
            ],
        ),
        TelescopeSpec::new(
            "GOTO2",
            vec![
                CameraSpec::new("UT1", &["CCD1"], &narrow),
                CameraSpec::new("UT2", &["CCD2"], &narrow),
                CameraSpec::new("UT4", &["CCD4"], &narrow),
            ],
        ),
    ]
}

/// A full night's worth of exposure requests.
pub fn default_schedule() -> Vec<ScheduledObs> {
    let mut schedule = Vec::new();

    for (filter, repeats) in ["L", "B", "V", "G", "R"].iter().zip([3, 1, 1, 1, 1]) {
        schedule.push(ScheduledObs::new(filter, 180.0, "GRB", repeats));
    }
    // Long monitoring run, beyond MAXSEQ
    schedule.push(ScheduledObs::new("R", 15.0, "Ceph", 20));
    for (filter, repeats) in ["L", "B", "G", "V", "R"].iter().zip([6, 2, 2, 2, 2]) {
        schedule.push(ScheduledObs::new(filter, 120.0, "GW123456", repeats));
    }
    for field in [23, 44, 56, 79] {
        let name = format!("Field{field}");
        schedule.push(ScheduledObs::new("L", 120.0, &name, 3));
        schedule.push(ScheduledObs::new("B", 120.0, &name, 1));
        schedule.push(ScheduledObs::new("V", 120.0, &name, 1));
        schedule.push(ScheduledObs::new("G", 120.0, &name, 1));
        schedule.push(ScheduledObs::new("R", 120.0, &name, 1));
    }
    // Exactly MAXSEQ exposures in one request
    schedule.push(ScheduledObs::new("L", 80.0, "And123", 12));
    schedule.push(ScheduledObs::new("L", 120.0, "Peg54", 3));
    schedule.push(ScheduledObs::new("L", 80.0, "Cas54", 4));
    for field in [88, 123, 135, 77] {
        let name = format!("Field{field}");
        // Three back-to-back 2-exposure requests: the resulting stacks must be
        // 2, 2 and 2 images, never 3 and 3 across the request borders.
        for (filter, repeats) in ["L", "L", "L", "B", "V", "G", "R"]
            .iter()
            .zip([2, 2, 2, 1, 1, 1, 1])
        {
            schedule.push(ScheduledObs::new(filter, 120.0, &name, repeats));
        }
    }
    schedule
}

fn insert_exposure(
    conn: &Connection,
    telescope: &str,
    camera: &str,
    instrument: &str,
    obs: &ScheduledObs,
    obsdate: NaiveDateTime,
    iobs: u32,
) -> Result<(), NightstackError> {
    conn.execute(
        "INSERT INTO observations \
         (telescope, camera, instrument, filter, imagetype, target, exptime, obsdate, iobs, nobs) \
         VALUES (?1, ?2, ?3, ?4, 'SCIENCE', ?5, ?6, ?7, ?8, ?9)",
        params![
            telescope,
            camera,
            instrument,
            obs.filter,
            obs.target,
            obs.exptime,
            format_obsdate(&obsdate),
            iobs,
            obs.repeats
        ],
    )?;
    Ok(())
}

/// Simulate one observing night into the `observations` table.
///
/// Every camera starts the schedule at `start`; exposures are spaced by
/// `exptime + READOUT_TIME_SECONDS`. When `cloud` is set and the clock crosses it, the
/// running sequence aborts where it stands, `CLOUD_DELAY_SECONDS` elapse, and the failed
/// sequence is repeated in full before the schedule continues.
///
/// Arguments
/// ---------
/// * `conn`: connection with the `observations` table in place.
/// * `telescopes`: observatory layout; requests for filters a camera lacks are skipped.
/// * `schedule`: the night's exposure requests, in order.
/// * `start`: timestamp of the first exposure for every camera.
/// * `cloud`: optional timestamp of a cloud interruption; triggers once across the run.
///
/// Return
/// ------
/// * The number of records inserted.
pub fn simulate_night(
    conn: &Connection,
    telescopes: &[TelescopeSpec],
    schedule: &[ScheduledObs],
    start: NaiveDateTime,
    cloud: Option<NaiveDateTime>,
) -> Result<usize, NightstackError> {
    let mut inserted = 0;
    let mut cloud_pending = cloud;

    for telescope in telescopes {
        for camera in &telescope.cameras {
            for instrument in &camera.instruments {
                let mut obsdate = start;
                for obs in schedule {
                    if !camera.filters.contains(&obs.filter) {
                        continue;
                    }
                    let step = TimeDelta::seconds(
                        obs.exptime.round() as i64 + READOUT_TIME_SECONDS,
                    );
                    'sequence: for iobs in 1..=obs.repeats {
                        insert_exposure(
                            conn, &telescope.name, &camera.name, instrument, obs, obsdate, iobs,
                        )?;
                        inserted += 1;
                        obsdate += step;

                        if let Some(cloud_at) = cloud_pending {
                            if obsdate > cloud_at {
                                // Abort the sequence, wait out the clouds, repeat it
                                obsdate += TimeDelta::seconds(CLOUD_DELAY_SECONDS);
                                cloud_pending = None;
                                for retry in 1..=obs.repeats {
                                    insert_exposure(
                                        conn,
                                        &telescope.name,
                                        &camera.name,
                                        instrument,
                                        obs,
                                        obsdate,
                                        retry,
                                    )?;
                                    inserted += 1;
                                    obsdate += step;
                                }
                                break 'sequence;
                            }
                        }
                    }
                }
            }
        }
    }
    debug!(inserted, "night simulated");
    Ok(inserted)
}

/// Mark every record inside `window` as having reached `stage` with `status`.
///
/// Stands in for the external reduction pipeline when staging test scenarios; the
/// stacking core itself never writes stages below 4.
pub fn advance_reduction(
    conn: &Connection,
    stage: Stage,
    status: Status,
    window: &DateWindow,
) -> Result<usize, NightstackError> {
    let mut sql = "UPDATE observations SET stage = ?1, status = ?2".to_string();
    let mut args: Vec<String> = Vec::new();
    let mut clauses: Vec<String> = Vec::new();
    if let Some(from) = window.from {
        clauses.push(format!("obsdate >= ?{}", args.len() + 3));
        args.push(format_obsdate(&from));
    }
    if let Some(to) = window.to {
        clauses.push(format!("obsdate <= ?{}", args.len() + 3));
        args.push(format_obsdate(&to));
    }
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }

    let changed = match args.len() {
        0 => conn.execute(&sql, params![stage.as_i64(), status.as_str()])?,
        1 => conn.execute(&sql, params![stage.as_i64(), status.as_str(), args[0]])?,
        _ => conn.execute(
            &sql,
            params![stage.as_i64(), status.as_str(), args[0], args[1]],
        )?,
    };
    Ok(changed)
}
