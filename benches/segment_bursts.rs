use chrono::{NaiveDate, TimeDelta};
use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use smallvec::SmallVec;

use nightstack::exposures::sequence_ext::SequenceExt;
use nightstack::exposures::Exposure;
use nightstack::Exposures;

const FILTERS: [&str; 5] = ["L", "B", "V", "R", "I"];
const TARGETS: [&str; 4] = ["GRB", "GW123456", "Field23", "And123"];

/// One synthetic night: contiguous requests of 1 to 12 exposures with occasional
/// long interruptions, shuffled settings, and realistic spacing.
fn synthetic_partition(rng: &mut StdRng, records: usize) -> Exposures {
    let mut seq: Exposures = SmallVec::new();
    let mut obsdate = NaiveDate::from_ymd_opt(2018, 9, 9)
        .unwrap()
        .and_hms_opt(19, 35, 30)
        .unwrap();
    let mut id = 0;

    while seq.len() < records {
        let filter = FILTERS[rng.random_range(0..FILTERS.len())];
        let target = TARGETS[rng.random_range(0..TARGETS.len())];
        let exptime = [15.0, 80.0, 120.0, 180.0][rng.random_range(0..4)];
        let nobs = rng.random_range(1..=12u32);
        for iobs in 1..=nobs {
            if seq.len() == records {
                break;
            }
            id += 1;
            seq.push(Exposure::new(
                id, "SCIENCE", target, filter, exptime, obsdate, iobs, nobs,
            ));
            obsdate += TimeDelta::seconds(exptime as i64 + 12);
        }
        // Roughly one interruption per fifty requests
        if rng.random::<f64>() < 0.02 {
            obsdate += TimeDelta::seconds(5400);
        }
    }
    seq
}

fn bench_segment_bursts(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(0xD05E);
    let max_gap = TimeDelta::minutes(30);

    for records in [100usize, 1_000, 10_000] {
        let partition = synthetic_partition(&mut rng, records);
        c.bench_function(&format!("segment_bursts/{records}"), |b| {
            b.iter_batched(
                || partition.clone(),
                |mut seq| seq.segment_bursts(max_gap),
                BatchSize::LargeInput,
            )
        });
    }
}

criterion_group!(benches, bench_segment_bursts);
criterion_main!(benches);
