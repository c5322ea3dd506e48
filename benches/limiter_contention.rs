use std::sync::Arc;
use std::thread;
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, SamplingMode};
use tsdb_guard::bench_support::limiter;
use tsdb_guard_admission::Limiter;

fn bench_single_thread(c: &mut Criterion) {
    let mut group = c.benchmark_group("limiter_single_thread");
    group
        .sample_size(500)
        .measurement_time(Duration::from_secs(5))
        .warm_up_time(Duration::from_secs(2))
        .sampling_mode(SamplingMode::Auto);

    group.bench_function(BenchmarkId::new("reserve", "admitted"), |b| {
        let (limiter, _) = limiter(u64::MAX);
        b.iter(|| black_box(limiter.reserve(black_box(1))))
    });

    group.bench_function(BenchmarkId::new("reserve", "unlimited"), |b| {
        let (limiter, _) = limiter(0);
        b.iter(|| black_box(limiter.reserve(black_box(1))))
    });

    group.bench_function(BenchmarkId::new("reserve", "latched"), |b| {
        let (limiter, _) = limiter(1);
        let _ = limiter.reserve(2);
        b.iter(|| black_box(limiter.reserve(black_box(1))))
    });

    group.finish();
}

fn bench_contention(c: &mut Criterion) {
    let mut group = c.benchmark_group("limiter_contention");
    group
        .sample_size(50)
        .measurement_time(Duration::from_secs(10))
        .warm_up_time(Duration::from_secs(2));

    const RESERVATIONS_PER_THREAD: usize = 10_000;

    for threads in [2usize, 4, 8] {
        group.bench_with_input(BenchmarkId::new("threads", threads), &threads, |b, &threads| {
            b.iter(|| {
                let (limiter, counter) = limiter(u64::MAX);
                let handles: Vec<_> = (0..threads)
                    .map(|_| {
                        let limiter = Arc::clone(&limiter);
                        thread::spawn(move || {
                            for _ in 0..RESERVATIONS_PER_THREAD {
                                let _ = limiter.reserve(1);
                            }
                        })
                    })
                    .collect();
                for handle in handles {
                    handle.join().expect("reserve thread panicked");
                }
                black_box((limiter.reserved(), counter.get()))
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_single_thread, bench_contention);
criterion_main!(benches);
