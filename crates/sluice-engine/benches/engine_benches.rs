//! Criterion benchmarks for sluice-engine hot paths.
//!
//! Covers: stream reconfiguration with a full receiver list, receiving
//! across many matured cycles, and splitting to a maximum-length list.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use sluice_core::constants::{AMT_PER_SEC_MULTIPLIER, MAX_SPLITS_RECEIVERS, MAX_STREAM_RECEIVERS};
use sluice_core::types::{SplitsReceiver, StreamConfig, StreamReceiver};
use sluice_engine::Hub;

const ASSET: u64 = 1;
const SENDER: u64 = 1_000_000;

fn make_stream_receivers(n: u64) -> Vec<StreamReceiver> {
    (0..n)
        .map(|i| StreamReceiver {
            account_id: i + 1,
            config: StreamConfig {
                stream_id: 0,
                amt_per_sec: AMT_PER_SEC_MULTIPLIER,
                start: 0,
                duration: 0,
            },
        })
        .collect()
}

fn make_splits_receivers(n: u64) -> Vec<SplitsReceiver> {
    (0..n).map(|i| SplitsReceiver::new(i + 1, 100)).collect()
}

fn bench_set_streams_full_list(c: &mut Criterion) {
    let receivers = make_stream_receivers(MAX_STREAM_RECEIVERS as u64);
    c.bench_function("set_streams_100_receivers", |b| {
        b.iter(|| {
            let mut hub = Hub::new(604_800);
            hub.set_streams(SENDER, ASSET, &[], 1_000_000_000, black_box(&receivers), &[], 0)
                .unwrap()
        })
    });
}

fn bench_receive_many_cycles(c: &mut Criterion) {
    c.bench_function("receive_streams_1000_cycles", |b| {
        b.iter(|| {
            let mut hub = Hub::new(10);
            hub.set_streams(SENDER, ASSET, &[], 10_000, &[StreamReceiver::new(1, AMT_PER_SEC_MULTIPLIER)], &[], 0)
                .unwrap();
            hub.receive_streams(1, ASSET, u64::MAX, black_box(10_000)).unwrap()
        })
    });
}

fn bench_split_max_receivers(c: &mut Criterion) {
    let receivers = make_splits_receivers(MAX_SPLITS_RECEIVERS as u64);
    c.bench_function("split_200_receivers", |b| {
        b.iter(|| {
            let mut hub = Hub::new(604_800);
            hub.set_splits(SENDER, &[], &receivers).unwrap();
            hub.give(0, SENDER, ASSET, 1_000_000_007).unwrap();
            hub.split(SENDER, ASSET, black_box(&receivers)).unwrap()
        })
    });
}

criterion_group!(
    benches,
    bench_set_streams_full_list,
    bench_receive_many_cycles,
    bench_split_max_receivers,
);
criterion_main!(benches);
