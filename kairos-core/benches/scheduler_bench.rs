#[macro_use]
extern crate criterion;

use criterion::{black_box, Criterion};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use kairos_core::events::{Calendar, Heap, Scheduled, Scheduler};

#[derive(Clone, Copy)]
struct Entry {
    time: u64,
    seq: u64,
}

impl Scheduled for Entry {
    fn time(&self) -> u64 {
        self.time
    }

    fn seq(&self) -> u64 {
        self.seq
    }
}

/// Classic hold model: keep `size` events queued, pop the earliest and
/// reinsert it a random increment later.
fn hold<S: Scheduler<Entry>>(scheduler: &mut S, size: usize, rounds: usize, rng: &mut SmallRng) {
    let mut seq = 0;
    for _ in 0..size {
        scheduler.insert(Entry {
            time: rng.random_range(0..1_000),
            seq,
        });
        seq += 1;
    }
    for _ in 0..rounds {
        let Ok(first) = scheduler.remove_first() else {
            return;
        };
        scheduler.insert(Entry {
            time: first.time + rng.random_range(1..1_000),
            seq,
        });
        seq += 1;
    }
    black_box(scheduler.len());
}

fn bench_hold_model(c: &mut Criterion) {
    let mut group = c.benchmark_group("scheduler_hold");

    for size in [128, 4096, 65536] {
        group.throughput(criterion::Throughput::Elements(10_000));
        group.bench_function(format!("heap_{size}"), |b| {
            let mut rng = SmallRng::seed_from_u64(7);
            b.iter(|| hold(&mut Heap::new(), size, 10_000, &mut rng));
        });
        group.bench_function(format!("calendar_{size}"), |b| {
            let mut rng = SmallRng::seed_from_u64(7);
            b.iter(|| hold(&mut Calendar::new(16, 1024), size, 10_000, &mut rng));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_hold_model);
criterion_main!(benches);
