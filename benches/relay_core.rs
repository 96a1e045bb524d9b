//! Core state machine benchmark suite.
//!
//! Benchmarks the sans-IO reducer and the subscription layer without sockets:
//! - Send fan-out across connection counts: 100, 1000
//! - Full drop/retry/restore reconnect cycles
//! - Queue build-up and paced drain at different depths
//! - Subscription-set diffs with half the topics rotated out
//!
//! Run with: cargo bench --bench relay_core
//! Results saved to: target/criterion/

use std::hint::black_box;
use std::sync::Arc;

use criterion::{BatchSize, BenchmarkId, Criterion, criterion_group, criterion_main};
use relink::{
    Command, ContinuationId, Effect, EventCallback, Notification, Reconciler, SocketClient,
    SocketKey, Topic,
};

// ============================================================================
// Benchmark Parameters
// ============================================================================

const CONNECTION_COUNTS: &[usize] = &[100, 1000];
const QUEUE_DEPTHS: &[usize] = &[64, 512];
const TOPIC_COUNTS: &[usize] = &[100, 1000];

// ============================================================================
// Benchmark: Send Fan-Out
// ============================================================================

fn bench_send_fanout(c: &mut Criterion) {
    let mut group = c.benchmark_group("send_fanout");

    for &count in CONNECTION_COUNTS {
        let (mut client, keys) = connected_client(count);
        group.bench_with_input(BenchmarkId::new("send", count), &count, |b, _| {
            b.iter(|| {
                for key in &keys {
                    let effects = client
                        .send(key.clone(), "bench payload")
                        .expect("connected key accepts sends");
                    black_box(effects);
                }
            });
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark: Message Dispatch
// ============================================================================

fn bench_message_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("message_dispatch");

    for &count in CONNECTION_COUNTS {
        let (mut client, keys) = connected_client(count);
        group.bench_with_input(BenchmarkId::new("receive", count), &count, |b, _| {
            b.iter(|| {
                for key in &keys {
                    let effects =
                        client.handle(Notification::message_received(key.clone(), "pong"));
                    black_box(effects);
                }
            });
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark: Reconnect Cycle
// ============================================================================

fn bench_reconnect_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconnect_cycle");

    let (mut client, keys) = connected_client(1);
    let key = keys[0].clone();

    group.bench_function("drop_retry_restore", |b| {
        b.iter(|| {
            let effects =
                client.handle(Notification::closed(key.clone(), 1006, "drop", false, 0));
            let id = find_delay(&effects).expect("retry scheduled");
            let effects = client.handle(Notification::delayed(id));
            black_box(&effects);
            let effects = client.handle(Notification::connected(key.clone(), "bench"));
            black_box(effects);
        });
    });

    group.finish();
}

// ============================================================================
// Benchmark: Queue Drain
// ============================================================================

fn bench_queue_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("queue_drain");

    for &depth in QUEUE_DEPTHS {
        group.bench_with_input(BenchmarkId::new("drain", depth), &depth, |b, &depth| {
            b.iter_batched(
                || parked_client_with_backlog(depth),
                |(mut client, key, retry)| {
                    let effects = client.handle(Notification::delayed(retry));
                    black_box(&effects);
                    let mut effects = client.handle(Notification::connected(key, "bench"));
                    while let Some(id) = find_delay(&effects) {
                        effects = client.handle(Notification::delayed(id));
                    }
                    black_box(client);
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark: Reconcile Diff
// ============================================================================

fn bench_reconcile_diff(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconcile_diff");

    for &count in TOPIC_COUNTS {
        group.bench_with_input(
            BenchmarkId::new("rotate_half", count),
            &count,
            |b, &count| {
                b.iter_batched(
                    || subscribed_reconciler(count),
                    |mut reconciler| {
                        // Drop the first half, keep the second, add as many new.
                        let desired = desired_topics(count / 2, count + count / 2);
                        let messages = reconciler.reconcile(desired);
                        black_box(messages);
                        black_box(reconciler);
                    },
                    BatchSize::SmallInput,
                );
            },
        );
    }

    group.finish();
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Builds a client with `count` established connections.
fn connected_client(count: usize) -> (SocketClient, Vec<SocketKey>) {
    let mut client = SocketClient::new();
    let keys: Vec<SocketKey> = (0..count)
        .map(|i| SocketKey::new(format!("conn-{i}")))
        .collect();
    for key in &keys {
        client
            .open(key.clone(), format!("wss://bench.invalid/{key}"))
            .expect("fresh key opens");
        client.handle(Notification::connected(key.clone(), "bench"));
    }
    (client, keys)
}

/// Builds a client parked in backoff with `depth` queued messages.
fn parked_client_with_backlog(depth: usize) -> (SocketClient, SocketKey, ContinuationId) {
    let mut client = SocketClient::new();
    let key = SocketKey::new("drain");
    client
        .open(key.clone(), "wss://bench.invalid/drain")
        .expect("fresh key opens");
    client.handle(Notification::connected(key.clone(), "bench"));

    let effects = client.handle(Notification::closed(key.clone(), 1006, "drop", false, 0));
    let retry = find_delay(&effects).expect("retry scheduled");

    for i in 0..depth {
        client
            .send(key.clone(), format!("message {i}"))
            .expect("parked key queues sends");
    }
    (client, key, retry)
}

/// Builds a reconciler with `count` acknowledged subscriptions.
fn subscribed_reconciler(count: usize) -> Reconciler {
    let mut reconciler = Reconciler::new();
    reconciler.reconcile(desired_topics(0, count));
    for index in 0..count {
        reconciler.on_subscribed(&bench_topic(index));
    }
    reconciler
}

/// Builds a desired set covering one contiguous topic index range.
fn desired_topics(start: usize, end: usize) -> Vec<(Topic, EventCallback)> {
    (start..end)
        .map(|index| {
            let callback: EventCallback = Arc::new(|_, _| {});
            (bench_topic(index), callback)
        })
        .collect()
}

fn bench_topic(index: usize) -> Topic {
    Topic::new(["bench".to_string(), format!("topic-{index}")])
}

/// Extracts the first scheduled delay id from a batch of effects.
fn find_delay(effects: &[Effect]) -> Option<ContinuationId> {
    effects.iter().find_map(|effect| match effect.as_command() {
        Some(Command::Delay { id, .. }) => Some(*id),
        _ => None,
    })
}

// ============================================================================
// Criterion Setup
// ============================================================================

criterion_group!(
    benches,
    bench_send_fanout,
    bench_message_dispatch,
    bench_reconnect_cycle,
    bench_queue_drain,
    bench_reconcile_diff
);
criterion_main!(benches);
