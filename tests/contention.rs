//! Cross-thread scenarios exercised against every lock in the crate.

use std::sync::{Arc, Barrier};
use std::thread;

type McsSpins<T> = bargelock::mcs::spins::Mutex<T>;
type McsYields<T> = bargelock::mcs::yields::Mutex<T>;
type TicketFair<T> = bargelock::ticket::fair::Mutex<T>;
type TicketFast<T> = bargelock::ticket::fast::Mutex<T>;

/// Deterministic xorshift values in `[10, 100]`, one per thread.
fn inputs(len: usize, mut seed: u32) -> Vec<u32> {
    let mut values = Vec::with_capacity(len);
    for _ in 0..len {
        seed ^= seed << 13;
        seed ^= seed >> 17;
        seed ^= seed << 5;
        values.push(10 + seed % 91);
    }
    values
}

macro_rules! scenario_tests {
    ($name:ident, $mutex:ident) => {
        mod $name {
            use super::*;

            #[test]
            fn sequential_roundtrip() {
                let mutex = $mutex::new(0_u32);
                for _ in 0..1000 {
                    *mutex.lock() += 1;
                    assert!(!mutex.is_locked());
                }
                assert_eq!(1000, *mutex.lock());
            }

            #[test]
            fn two_writers_lose_no_update() {
                const WRITERS: usize = 2;
                const ITERS: usize = 100_000;

                let mutex = Arc::new($mutex::new(0_i32));
                let handles: Vec<_> = (0..WRITERS)
                    .map(|_| {
                        let mutex = Arc::clone(&mutex);
                        thread::spawn(move || {
                            for _ in 0..ITERS {
                                *mutex.lock() += 1;
                            }
                        })
                    })
                    .collect();
                for handle in handles {
                    handle.join().unwrap();
                }

                assert_eq!((WRITERS * ITERS) as i32, *mutex.lock());
                assert!(!mutex.is_locked());
            }

            #[test]
            fn adder_accumulators_agree() {
                const THREADS: usize = 23;

                let values = inputs(THREADS, 0x9E37_79B9);
                let expected_sum: i64 = values.iter().map(|&v| i64::from(v)).sum();
                let expected_product = values
                    .iter()
                    .fold(4_u128, |acc, &v| acc.wrapping_mul(u128::from(v)));

                // Both accumulators are updated inside one critical section,
                // so they must describe the same multiset of inputs no
                // matter which permutation the lock serializes.
                let acc = Arc::new($mutex::new((0_i64, 4_u128)));
                let handles: Vec<_> = values
                    .into_iter()
                    .map(|value| {
                        let acc = Arc::clone(&acc);
                        thread::spawn(move || {
                            let mut acc = acc.lock();
                            acc.0 += i64::from(value);
                            acc.1 = acc.1.wrapping_mul(u128::from(value));
                        })
                    })
                    .collect();
                for handle in handles {
                    handle.join().unwrap();
                }

                let acc = acc.lock();
                assert_eq!(expected_sum, acc.0);
                assert_eq!(expected_product, acc.1);
            }

            #[test]
            fn acquire_release_storm() {
                const ROUNDS: usize = 10;
                const THREADS: usize = 1000;

                for _ in 0..ROUNDS {
                    let mutex = Arc::new($mutex::new(0_u32));
                    let handles: Vec<_> = (0..THREADS)
                        .map(|_| {
                            let mutex = Arc::clone(&mutex);
                            thread::spawn(move || *mutex.lock() += 1)
                        })
                        .collect();
                    for handle in handles {
                        handle.join().unwrap();
                    }
                    assert_eq!(THREADS as u32, *mutex.lock());
                    assert!(!mutex.is_locked());
                }
            }

            #[test]
            fn simultaneous_arrivals_both_complete() {
                const PAIRS: usize = 100;

                for _ in 0..PAIRS {
                    let mutex = Arc::new($mutex::new(0_u32));
                    let barrier = Arc::new(Barrier::new(2));
                    let handles: Vec<_> = (0..2)
                        .map(|_| {
                            let mutex = Arc::clone(&mutex);
                            let barrier = Arc::clone(&barrier);
                            thread::spawn(move || {
                                barrier.wait();
                                *mutex.lock() += 1;
                            })
                        })
                        .collect();
                    for handle in handles {
                        handle.join().unwrap();
                    }
                    assert_eq!(2, *mutex.lock());
                    assert!(!mutex.is_locked());
                }
            }
        }
    };
}

scenario_tests!(mcs_spins, McsSpins);
scenario_tests!(mcs_yields, McsYields);
scenario_tests!(ticket_fair, TicketFair);
scenario_tests!(ticket_fast, TicketFast);
