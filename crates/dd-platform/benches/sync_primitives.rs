use criterion::{black_box, criterion_group, criterion_main, Criterion};
use dd_platform::{Atomic, AtomicLock, AtomicOps, Event, Mutex, Semaphore};

fn bench_atomics(c: &mut Criterion) {
    let counter = Atomic::new(0);

    c.bench_function("atomic_increment", |b| {
        b.iter(|| black_box(counter.increment()));
    });

    c.bench_function("atomic_add", |b| {
        b.iter(|| black_box(counter.add(black_box(7))));
    });
}

fn bench_locks(c: &mut Criterion) {
    let mut group = c.benchmark_group("uncontended_lock");

    let spin = AtomicLock::new();
    group.bench_function("atomic_lock", |b| {
        b.iter(|| {
            spin.lock();
            spin.unlock().unwrap();
        });
    });

    let mutex = Mutex::new();
    group.bench_function("mutex", |b| {
        b.iter(|| {
            mutex.lock();
            mutex.unlock().unwrap();
        });
    });

    group.finish();
}

fn bench_signals(c: &mut Criterion) {
    let event = Event::new(false);
    c.bench_function("event_signal_wait", |b| {
        b.iter(|| {
            event.signal();
            event.wait(0).unwrap();
            event.clear();
        });
    });

    let semaphore = Semaphore::new(0, 1).unwrap();
    c.bench_function("semaphore_signal_wait", |b| {
        b.iter(|| {
            semaphore.signal().unwrap();
            semaphore.wait(0).unwrap();
        });
    });
}

criterion_group!(benches, bench_atomics, bench_locks, bench_signals);
criterion_main!(benches);
