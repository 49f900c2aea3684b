//! Strategies that determine the behaviour of locks when encountering
//! contention.
//!
//! A relax policy runs between failed attempts inside a busy-wait loop. The
//! queue lock applies it while racing for the fast-path flag after being
//! promoted to the front of the queue; waiters further back sleep instead of
//! relaxing.
//!
//! Policies must not panic: a waiter that unwinds out of a waiting loop
//! stops participating in the hand-off and leaves every thread behind it
//! waiting forever.

use crate::cfg::hint;
use crate::cfg::thread;

/// A relax operation to run inside busy-wait loops.
pub trait Relax {
    /// Returns the initial state for this relaxing strategy.
    fn new() -> Self;

    /// Performs the relaxing operation during a period of contention.
    fn relax(&mut self);
}

/// Rapidly spins while informing the CPU that it should power down
/// non-essential components via [`core::hint::spin_loop`].
///
/// Note that spinning is a 'dumb' strategy and most schedulers cannot
/// correctly differentiate it from useful work, thereby misallocating even
/// more CPU time to the spinning process; this is known as priority
/// inversion. If you see signs of it, consider [`Yield`].
pub struct Spin;

impl Relax for Spin {
    #[inline(always)]
    fn new() -> Self {
        Self
    }

    #[inline(always)]
    fn relax(&mut self) {
        hint::spin_loop();
    }
}

/// Yields the current time slice to the scheduler in favour of other
/// threads or processes.
///
/// This is generally the strategy of choice for minimising power consumption
/// and priority inversion when a standard library is available.
pub struct Yield;

impl Relax for Yield {
    #[inline(always)]
    fn new() -> Self {
        Self
    }

    #[inline(always)]
    fn relax(&mut self) {
        thread::yield_now();
    }
}

/// Rapidly spins without telling the CPU to do any powering down.
///
/// You almost certainly do not want to use this; use [`Spin`] instead. It
/// exists for completeness and for targets that miscompile or do not support
/// spin hint intrinsics.
pub struct Loop;

impl Relax for Loop {
    #[inline(always)]
    fn new() -> Self {
        Self
    }

    #[inline(always)]
    fn relax(&mut self) {}
}

/// As [`Spin`], but with bounded exponential backoff between attempts.
///
/// Backing off in spin loops can reduce cache-line traffic under heavy
/// contention; profile before assuming an improvement.
pub struct SpinBackoff {
    inner: Backoff<{ Self::MAX }>,
}

impl SpinBackoff {
    /// The largest value the inner backoff counter can reach.
    const MAX: Uint = DEFAULT_SHIFTS;
}

impl Relax for SpinBackoff {
    #[inline(always)]
    fn new() -> Self {
        Self { inner: Backoff::new() }
    }

    #[inline(always)]
    fn relax(&mut self) {
        self.inner.saturating_spin();
        self.inner.saturating_step();
    }
}

/// As [`Yield`], but spins with exponential backoff up to a threshold
/// before starting to yield back to the OS scheduler.
pub struct YieldBackoff {
    inner: Backoff<{ Self::MAX }>,
}

impl YieldBackoff {
    /// The largest value the inner backoff counter can reach.
    const MAX: Uint = DEFAULT_SHIFTS;
}

impl Relax for YieldBackoff {
    #[inline(always)]
    fn new() -> Self {
        Self { inner: Backoff::new() }
    }

    #[inline(always)]
    fn relax(&mut self) {
        if self.inner.0 < Self::MAX {
            self.inner.saturating_spin();
        } else {
            thread::yield_now();
        }
        self.inner.saturating_step();
    }
}

/// An unsigned integer type used as the inner type for [`Backoff`].
type Uint = u32;

/// The default max number of shifts the inner value of `Backoff` produces.
const DEFAULT_SHIFTS: Uint = 6;

// The maximum number of shifts must stay below the bit width or the spin
// count computation overflows.
const _: () = assert!(DEFAULT_SHIFTS < Uint::BITS);

/// Backoff counter that keeps track of the number of shifts applied, up to
/// `MAX`.
struct Backoff<const MAX: Uint>(Uint);

impl<const MAX: Uint> Backoff<MAX> {
    const fn new() -> Self {
        Self(0)
    }

    /// Runs a bounded spin loop `1 << self.0` times, capped at `1 << MAX`.
    fn saturating_spin(&self) {
        let shifts = self.0.min(MAX);
        for _ in 0..1_u32 << shifts {
            hint::spin_loop();
        }
    }

    /// Increments the inner counter, saturating it at `MAX`.
    fn saturating_step(&mut self) {
        if self.0 < MAX {
            self.0 += 1;
        }
    }
}

#[cfg(all(not(loom), test))]
mod test {
    use super::{Relax, Uint};

    fn returns<R: Relax, const MAX: Uint>() {
        let mut relax = R::new();
        for _ in 0..=MAX.saturating_mul(10) {
            relax.relax();
        }
    }

    #[test]
    fn spins() {
        returns::<super::Spin, 10>();
    }

    #[test]
    fn spins_backoff() {
        use super::SpinBackoff;
        const MAX: Uint = SpinBackoff::MAX;
        returns::<SpinBackoff, MAX>();
    }

    #[test]
    fn yields() {
        returns::<super::Yield, 10>();
    }

    #[test]
    fn yields_backoff() {
        use super::YieldBackoff;
        const MAX: Uint = YieldBackoff::MAX;
        returns::<YieldBackoff, MAX>();
    }

    #[test]
    fn loops() {
        returns::<super::Loop, 10>();
    }
}
