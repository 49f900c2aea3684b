//! A family of mutual exclusion synchronizers built around an MCS style
//! linked queue with a fast-path bypass, and ticket locks for strict FIFO
//! hand-off.
//!
//! # Locks
//!
//! The [`mcs`] module provides the main lock of this crate: an unfair mutex
//! whose uncontended acquisitions race a single flag, and whose contended
//! acquisitions join a linked queue of waiters. The front of the queue
//! busy-waits for the hand-off while deeper waiters sleep on a futex, and
//! an outgoing holder pre-wakes its successor before the critical section
//! even ends, overlapping the successor's context-switch restoration with
//! useful work. Queue maintenance is paid by the *incoming* holder, which
//! collapses release latency to a single store.
//!
//! The [`ticket`] module provides two busy-waiting comparison primitives:
//! a strictly FIFO ticket lock and a variant with a lock-free fast path.
//! Neither parks its waiters; both hybridize between spin hints and yields
//! keyed by the waiter's distance to its turn.
//!
//! # Weakly ordered processors
//!
//! The queue protocol runs all of its compare-and-set operations through
//! the [`weak`] module, which absorbs the spurious failures of LL/SC based
//! architectures with an opaque-retry loop and collapses to single strong
//! instructions on strongly ordered targets. The decision is made once per
//! process; targets unknown to the crate can be declared weakly ordered up
//! front with [`weak::set_weakly_ordered`].
//!
//! # Waiting policies
//!
//! Busy-wait loops are parameterized by the policies in [`relax`]: spin
//! hints, yields, or either with exponential backoff. Each lock module
//! exports `spins`, `yields` and `loops` type aliases bound to a policy.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::thread;
//!
//! use bargelock::mcs::spins::Mutex;
//!
//! let data = Arc::new(Mutex::new(0));
//!
//! let handles: Vec<_> = (0..4)
//!     .map(|_| {
//!         let data = Arc::clone(&data);
//!         thread::spawn(move || *data.lock() += 1)
//!     })
//!     .collect();
//! for handle in handles {
//!     handle.join().unwrap();
//! }
//!
//! assert_eq!(*data.lock(), 4);
//! ```
//!
//! # Features
//!
//! - `lock_api`: implements [`lock_api::RawMutex`] for the queue lock and
//!   exports compatible type aliases under [`mod@lock_api`].
//!
//! # Caveats
//!
//! These are plain mutual exclusion primitives: no reentrancy, no
//! poisoning, no condition variables, no reader/writer distinction, and no
//! timed or cancellable acquisitions. A thread that reacquires a lock it
//! already holds deadlocks. The ticket locks are pure busy-waits and
//! collapse under heavy oversubscription; see [`ticket`].
//!
//! [`lock_api::RawMutex`]: https://docs.rs/lock_api/latest/lock_api/trait.RawMutex.html

#![warn(missing_docs)]

mod cfg;
mod parker;

pub mod mcs;
pub mod relax;
pub mod ticket;
pub mod weak;

#[cfg(all(feature = "lock_api", not(loom)))]
pub mod lock_api;

#[cfg(all(loom, test))]
mod loom;

#[cfg(test)]
mod test;
