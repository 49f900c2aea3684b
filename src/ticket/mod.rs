//! Ticket based synchronizers with strict FIFO hand-off.
//!
//! These locks order acquisitions by drawing monotonic tickets and waiting
//! for a shared completion counter to reach the drawn value. Waiting does
//! not rely on reactive signaling from the releasing thread, so these
//! primitives cannot put waiters to sleep; they hybridize between a
//! processor spin hint and yielding the time slice, keyed by how far away
//! the waiter's turn still is.
//!
//! Because waiting is cooperative busy-waiting, scaling collapses around
//! ~1200 concurrent threads: past that point the holder may starve behind
//! the yielding crowd in a runqueue inversion. Workloads with thread counts
//! in that region should prefer the sleeping [`mcs`] lock.
//!
//! Two variants are provided:
//!
//! - [`fair::Mutex`] is strictly FIFO: every acquisition draws a ticket.
//! - [`fast::Mutex`] adds a lock-free fast path that skips the ticket when
//!   the lock is free, trading strict fairness for throughput.
//!
//! [`mcs`]: crate::mcs

pub mod fair;
pub mod fast;

use once_cell::sync::OnceCell;

/// Distance threshold below which a waiter yields instead of spinning.
///
/// Stored negated, like the waiter's gap to its turn: a waiter at gap `-n`
/// has `n` predecessors. With more than half the machine's cores already
/// queued ahead, spinning only steals time from the holder.
pub(crate) fn yield_threshold() -> i32 {
    static THRESHOLD: OnceCell<i32> = OnceCell::new();
    *THRESHOLD.get_or_init(|| -((num_cpus::get() / 2) as i32))
}
