#[macro_use]
extern crate criterion;

use criterion::{black_box, BatchSize, Criterion, Throughput};

use kairos_config::{ControllerConfig, SchedulerKind};
use kairos_core::Sim;
use kairos_simulator::scenario::{PingPong, RandomWorkload};
use kairos_simulator::Bootstrap;

const EVENTS: u64 = 20_000;

fn seeded(kind: SchedulerKind, bootstrap: &dyn Bootstrap) -> Sim {
    let mut config = ControllerConfig::default();
    config.scheduler.kind = kind;
    let sim = Sim::from_config(&config);
    if let Err(failure) = bootstrap.seed(&sim) {
        panic!("seed failed: {failure:#}");
    }
    sim
}

fn bench_random_workload(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch_random_workload");
    group.throughput(Throughput::Elements(EVENTS));

    for (label, kind) in [("heap", SchedulerKind::Heap), ("calendar", SchedulerKind::Calendar)] {
        group.bench_function(label, |b| {
            let workload = RandomWorkload::new(42, 256, EVENTS);
            b.iter_batched(
                || seeded(kind, &workload),
                |sim| black_box(sim.run().map(|summary| summary.events)),
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

fn bench_blocking_calls(c: &mut Criterion) {
    let game = PingPong::new(2_000, 1);
    c.bench_function("dispatch_ping_pong_2000", |b| {
        b.iter_batched(
            || seeded(SchedulerKind::Heap, &game),
            |sim| black_box(sim.run().map(|summary| summary.events)),
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, bench_random_workload, bench_blocking_calls);
criterion_main!(benches);
