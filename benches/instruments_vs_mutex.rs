use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::thread;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use hedron_instrument::counters::{Counter, CounterRange};

const NUM_THREADS: usize = 8;
const ITERATIONS_PER_THREAD: usize = 100_000;
const RANGE_KEYS: i64 = 16;

fn run_threads<T, F>(shared: &Arc<T>, work: F)
where
    T: Send + Sync + 'static,
    F: Fn(&T, usize) + Send + Sync + Copy + 'static,
{
    let mut handles = vec![];
    for _ in 0..NUM_THREADS {
        let shared = Arc::clone(shared);
        handles.push(thread::spawn(move || {
            for i in 0..ITERATIONS_PER_THREAD {
                work(&shared, i);
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }
}

fn bench_counter(c: &mut Criterion) {
    let mut group = c.benchmark_group("counter_increment");
    let label = format!("{}threads x {}iter", NUM_THREADS, ITERATIONS_PER_THREAD);

    group.bench_function(BenchmarkId::new("Counter (atomic)", &label), |b| {
        b.iter(|| {
            let counter = Arc::new(Counter::new("bench"));
            run_threads(&counter, |counter, _| counter.increment());
            black_box(counter.get())
        })
    });

    group.bench_function(BenchmarkId::new("Mutex<i64>", &label), |b| {
        b.iter(|| {
            let counter = Arc::new(Mutex::new(0i64));
            run_threads(&counter, |counter, _| *counter.lock().unwrap() += 1);
            black_box(*counter.lock().unwrap())
        })
    });

    group.finish();
}

fn bench_counter_range(c: &mut Criterion) {
    let mut group = c.benchmark_group("counter_range_add");
    let label = format!("{}threads x {}iter", NUM_THREADS, ITERATIONS_PER_THREAD);

    group.bench_function(BenchmarkId::new("CounterRange (snapshot CAS)", &label), |b| {
        b.iter(|| {
            let range = Arc::new(CounterRange::new("bench"));
            run_threads(&range, |range, i| range.increment(i as i64 % RANGE_KEYS));
            black_box(range.entries().len())
        })
    });

    group.bench_function(BenchmarkId::new("Mutex<BTreeMap>", &label), |b| {
        b.iter(|| {
            let map = Arc::new(Mutex::new(BTreeMap::<i64, i64>::new()));
            run_threads(&map, |map, i| {
                *map.lock().unwrap().entry(i as i64 % RANGE_KEYS).or_insert(0) += 1;
            });
            black_box(map.lock().unwrap().len())
        })
    });

    group.finish();
}

criterion_group!(benches, bench_counter, bench_counter_range);
criterion_main!(benches);
