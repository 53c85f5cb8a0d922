#![allow(dead_code)]

use chrono::NaiveDateTime;

use nightstack::exposures::Exposure;
use nightstack::simulator::{default_observatory, default_schedule, simulate_night};
use nightstack::store::sqlite::SqliteStore;
use nightstack::{Stage, Status};

/// Parse a `%Y-%m-%d %H:%M:%S` timestamp.
pub fn at(value: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S").unwrap()
}

/// The simulated night's first exposure.
pub fn night_start() -> NaiveDateTime {
    at("2018-09-09 19:35:30")
}

/// When the clouds roll in over the simulated night.
pub fn cloud_time() -> NaiveDateTime {
    at("2018-09-09 21:13:00")
}

/// An in-memory store holding one simulated two-telescope night, clouds included.
///
/// Returns the store and the number of records inserted.
pub fn simulated_store() -> (SqliteStore, usize) {
    let store = SqliteStore::open_in_memory(vec![
        "telescope".into(),
        "camera".into(),
        "instrument".into(),
    ])
    .unwrap();
    store.init_schema().unwrap();
    let inserted = simulate_night(
        store.connection(),
        &default_observatory(),
        &default_schedule(),
        night_start(),
        Some(cloud_time()),
    )
    .unwrap();
    (store, inserted)
}

/// A fully reduced exposure, ready for stacking.
pub fn ready_exposure(
    id: i64,
    target: &str,
    filter: &str,
    obsdate: NaiveDateTime,
    iobs: u32,
    nobs: u32,
) -> Exposure {
    let mut exposure = Exposure::new(id, "SCIENCE", target, filter, 120.0, obsdate, iobs, nobs);
    exposure.stage = Stage::Reduction3;
    exposure.status = Status::Completed;
    exposure
}
