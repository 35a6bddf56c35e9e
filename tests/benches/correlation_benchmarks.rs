//! # Parley Correlation Benchmarks
//!
//! Hot paths on every request:
//!
//! | Path | Work | Target |
//! |------|------|--------|
//! | `CorrelationKey::generate` | UUID v7 + format | < 1µs |
//! | `CorrelationKey::matches` | prefix compare | < 50ns |
//! | register + claim (exact) | two map ops | < 1µs |
//! | claim by prefix | scan of pending entries | linear in pending |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use pl_01_pending_registry::PendingRequestRegistry;
use shared_types::{ChannelId, CorrelationKey, MessageId, RequestBody};

fn pin_body() -> RequestBody {
    RequestBody::Pin {
        channel: ChannelId::from("general"),
        message_id: MessageId::from("m1"),
    }
}

fn bench_correlation_key(c: &mut Criterion) {
    let mut group = c.benchmark_group("correlation-key");

    group.bench_function("generate", |b| {
        b.iter(|| black_box(CorrelationKey::generate(black_box("history"))))
    });

    let key = CorrelationKey::generate("history");
    let full = key.as_str().to_string();
    group.bench_function("matches_prefix", |b| {
        b.iter(|| black_box(key.matches(black_box("history"))))
    });
    group.bench_function("matches_full_key", |b| {
        b.iter(|| black_box(key.matches(black_box(full.as_str()))))
    });
    group.bench_function("matches_other_kind", |b| {
        b.iter(|| black_box(key.matches(black_box("reactions"))))
    });

    group.finish();
}

fn bench_registry(c: &mut Criterion) {
    let mut group = c.benchmark_group("pending-registry");

    let registry = PendingRequestRegistry::new();
    group.bench_function("register_claim_exact", |b| {
        b.iter(|| {
            let key = CorrelationKey::generate("pin");
            registry.register(key.clone(), pin_body()).ok();
            black_box(registry.claim(key.as_str()))
        })
    });

    for pending in [10usize, 100, 1000] {
        let registry = PendingRequestRegistry::new();
        for _ in 0..pending {
            registry
                .register(CorrelationKey::generate("history"), pin_body())
                .ok();
        }

        group.throughput(Throughput::Elements(pending as u64));
        group.bench_with_input(
            BenchmarkId::new("claim_prefix_refill", pending),
            &pending,
            |b, _| {
                b.iter(|| {
                    let claimed = registry.claim(black_box("history"));
                    if let Some(entry) = claimed {
                        registry.register(entry.key, entry.payload).ok();
                    }
                })
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_correlation_key, bench_registry);
criterion_main!(benches);
