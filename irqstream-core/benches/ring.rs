// SPDX-License-Identifier: Apache-2.0

//! Event ring microbenchmarks.
//!
//! Measures the hot-path cost of the transport: one publish + drain round
//! trip, batch drains at various depths, and the downstream spsc hop.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::ptr::NonNull;
use std::time::Duration;

use irqstream_core::spsc;
use irqstream_core::{EventRing, IrqEvent, RingConsumer, RingProducer};

/// Batch depths to benchmark (records drained per wakeup).
const BATCH_DEPTHS: &[u32] = &[1, 16, 64, 256];

fn event(sequence: u32) -> IrqEvent {
    IrqEvent {
        timestamp_ns: u64::from(sequence) * 1_000,
        sequence,
        pin_state: sequence & 1,
    }
}

/// Benchmark a single publish + drain round trip.
fn bench_publish_drain_roundtrip(c: &mut Criterion) {
    let mut group = c.benchmark_group("ring_roundtrip");
    group.measurement_time(Duration::from_secs(5));
    group.throughput(Throughput::Elements(1));

    group.bench_function("publish_drain_one", |b| {
        let ring = EventRing::new_boxed();
        let ptr = NonNull::from(&*ring);
        // SAFETY: single producer/consumer pair; ring outlives both handles.
        let (mut producer, mut consumer) =
            unsafe { (RingProducer::from_raw(ptr), RingConsumer::from_raw(ptr)) };

        let mut seq = 0u32;
        b.iter(|| {
            seq = seq.wrapping_add(1);
            producer.publish(black_box(event(seq)));
            consumer.drain(|ev| {
                black_box(ev);
            });
        });
    });

    group.finish();
}

/// Benchmark batch drains: the inner loop a wakeup runs after `poll`.
fn bench_batch_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("ring_batch_drain");
    group.measurement_time(Duration::from_secs(5));

    for &depth in BATCH_DEPTHS {
        group.throughput(Throughput::Elements(u64::from(depth)));

        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, &depth| {
            let ring = EventRing::new_boxed();
            let ptr = NonNull::from(&*ring);
            // SAFETY: single producer/consumer pair; ring outlives both.
            let (mut producer, mut consumer) =
                unsafe { (RingProducer::from_raw(ptr), RingConsumer::from_raw(ptr)) };

            let mut seq = 0u32;
            b.iter(|| {
                for _ in 0..depth {
                    seq = seq.wrapping_add(1);
                    producer.publish(event(seq));
                }
                let drained = consumer.drain(|ev| {
                    black_box(ev);
                });
                black_box(drained);
            });
        });
    }

    group.finish();
}

/// Benchmark the downstream decoupling hop a non-blocking callback pays.
fn bench_spsc_hop(c: &mut Criterion) {
    let mut group = c.benchmark_group("spsc_hop");
    group.measurement_time(Duration::from_secs(5));
    group.throughput(Throughput::Elements(1));

    group.bench_function("send_recv_one", |b| {
        let (mut tx, mut rx) = spsc::channel::<IrqEvent>(1024);
        let mut seq = 0u32;
        b.iter(|| {
            seq = seq.wrapping_add(1);
            tx.send(black_box(event(seq)));
            black_box(rx.recv());
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_publish_drain_roundtrip,
    bench_batch_drain,
    bench_spsc_hop,
);

criterion_main!(benches);
