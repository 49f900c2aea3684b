use std::sync::Arc;
use std::thread;

use criterion::{black_box, criterion_group, criterion_main, Bencher, Criterion};

macro_rules! lock_benches {
    ($name:ident, $mutex:ident) => {
        mod $name {
            use super::*;

            pub fn create(bencher: &mut Bencher) {
                bencher.iter(|| {
                    let value = black_box(0_u32);
                    $mutex::new(value)
                });
            }

            pub fn lock_unlock(bencher: &mut Bencher) {
                let mutex = $mutex::new(0_u32);
                bencher.iter(|| {
                    let mut guard = mutex.lock();
                    *guard = guard.wrapping_add(1);
                    drop(guard);
                });
            }

            pub fn lock_unlock_read_contention(bencher: &mut Bencher) {
                let data = Arc::new($mutex::new(0_u32));

                let thread = thread::spawn({
                    let data = Arc::clone(&data);
                    move || {
                        while Arc::strong_count(&data) > 1 {
                            for _ in 0..1000 {
                                black_box(*data.lock());
                            }
                        }
                    }
                });

                bencher.iter(|| {
                    let mut data = data.lock();
                    *data = data.wrapping_add(1);
                    drop(data);
                });

                drop(data);
                thread.join().unwrap();
            }

            pub fn lock_unlock_write_contention(bencher: &mut Bencher) {
                let data = Arc::new($mutex::new(0_u32));

                let thread = thread::spawn({
                    let data = Arc::clone(&data);
                    move || {
                        while Arc::strong_count(&data) > 1 {
                            for _ in 0..1000 {
                                let mut guard = data.lock();
                                *guard = guard.wrapping_add(1);
                                drop(guard);
                            }
                        }
                    }
                });

                bencher.iter(|| {
                    let mut guard = data.lock();
                    *guard = guard.wrapping_add(1);
                    drop(guard);
                });

                drop(data);
                thread.join().unwrap();
            }
        }
    };
}

type Mcs<T> = bargelock::mcs::spins::Mutex<T>;
type TicketFast<T> = bargelock::ticket::fast::Mutex<T>;
type TicketFair<T> = bargelock::ticket::fair::Mutex<T>;

lock_benches!(mcs, Mcs);
lock_benches!(ticket_fast, TicketFast);
lock_benches!(ticket_fair, TicketFair);

fn mcs_benches(criterion: &mut Criterion) {
    criterion.bench_function("mcs/create", mcs::create);
    criterion.bench_function("mcs/lock_unlock", mcs::lock_unlock);
    criterion.bench_function("mcs/read_contention", mcs::lock_unlock_read_contention);
    criterion.bench_function("mcs/write_contention", mcs::lock_unlock_write_contention);
}

fn ticket_fast_benches(criterion: &mut Criterion) {
    criterion.bench_function("ticket_fast/create", ticket_fast::create);
    criterion.bench_function("ticket_fast/lock_unlock", ticket_fast::lock_unlock);
    criterion.bench_function("ticket_fast/read_contention", ticket_fast::lock_unlock_read_contention);
    criterion.bench_function("ticket_fast/write_contention", ticket_fast::lock_unlock_write_contention);
}

fn ticket_fair_benches(criterion: &mut Criterion) {
    criterion.bench_function("ticket_fair/create", ticket_fair::create);
    criterion.bench_function("ticket_fair/lock_unlock", ticket_fair::lock_unlock);
    criterion.bench_function("ticket_fair/read_contention", ticket_fair::lock_unlock_read_contention);
    criterion.bench_function("ticket_fair/write_contention", ticket_fair::lock_unlock_write_contention);
}

criterion_group!(locks, mcs_benches, ticket_fast_benches, ticket_fair_benches);
criterion_main!(locks);
