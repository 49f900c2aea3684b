//! An unfair MCS lock with a fast-path bypass and sleeping waiters.
//!
//! Arriving threads first race a single atomic flag for the lock; only when
//! that fails do they append a node to an MCS style waiting queue. Enqueueing
//! spreads its compare-and-set pressure across the individual `next` slots
//! of the queue nodes instead of focusing it on one tail word, so the heavy
//! part of contention dissipates across cache lines.
//!
//! The front of the queue stays semi-awake, busy-waiting on the flag, while
//! nodes from the second position onwards put their threads to sleep. When
//! the front thread finally claims the flag it immediately wakes the node
//! behind it, giving that thread a chance to finish its context-switch
//! restoration while the new holder's critical section is still running.
//! Queue maintenance is paid on the way in, which collapses the release
//! operation to a single store.
//!
//! This lock is not FIFO fair: a thread that has just arrived may claim the
//! flag ahead of threads that have been queued for longer. If the hand-off
//! order matters, see the strict [`ticket`] locks.
//!
//! The lock is held for as long as its associated RAII guard is in scope.
//! Once the guard is dropped, the mutex is freed. Mutex guards are returned
//! by [`lock`] and [`try_lock`], and are also accessible as the closure
//! argument of [`lock_then`] and [`try_lock_then`].
//!
//! The Mutex is generic over the relax policy applied while racing for the
//! flag. Users may choose a policy as long as it implements the [`Relax`]
//! trait; the [`relax`] module provides a number of them. The modules below
//! export type aliases bound to one policy each.
//!
//! [`lock`]: Mutex::lock
//! [`try_lock`]: Mutex::try_lock
//! [`lock_then`]: Mutex::lock_then
//! [`try_lock_then`]: Mutex::try_lock_then
//! [`ticket`]: crate::ticket
//! [`relax`]: crate::relax
//! [`Relax`]: crate::relax::Relax

mod mutex;
pub use mutex::{Mutex, MutexGuard};

/// A queue lock that signals the processor that it is running a busy-wait
/// spin-loop while racing for the fast path.
pub mod spins {
    use super::mutex;
    use crate::relax::Spin;

    /// A [`mcs::Mutex`] that implements the [`Spin`] relax policy.
    ///
    /// # Example
    ///
    /// ```
    /// use bargelock::mcs::spins::Mutex;
    ///
    /// let mutex = Mutex::new(0);
    /// let guard = mutex.lock();
    /// assert_eq!(*guard, 0);
    /// ```
    /// [`mcs::Mutex`]: mutex::Mutex
    pub type Mutex<T> = mutex::Mutex<T, Spin>;

    /// A [`mcs::MutexGuard`] that implements the [`Spin`] relax policy.
    ///
    /// [`mcs::MutexGuard`]: mutex::MutexGuard
    pub type MutexGuard<'a, T> = mutex::MutexGuard<'a, T, Spin>;

    /// A queue lock that performs exponential backoff while spinning for
    /// the fast path.
    pub mod backoff {
        use super::mutex;
        use crate::relax::SpinBackoff;

        /// A [`mcs::Mutex`] that implements the [`SpinBackoff`] relax
        /// policy.
        ///
        /// # Example
        ///
        /// ```
        /// use bargelock::mcs::spins::backoff::Mutex;
        ///
        /// let mutex = Mutex::new(0);
        /// let guard = mutex.lock();
        /// assert_eq!(*guard, 0);
        /// ```
        /// [`mcs::Mutex`]: mutex::Mutex
        pub type Mutex<T> = mutex::Mutex<T, SpinBackoff>;

        /// A [`mcs::MutexGuard`] that implements the [`SpinBackoff`] relax
        /// policy.
        ///
        /// [`mcs::MutexGuard`]: mutex::MutexGuard
        pub type MutexGuard<'a, T> = mutex::MutexGuard<'a, T, SpinBackoff>;
    }
}

/// A queue lock that yields the current time slice to the OS scheduler
/// while racing for the fast path.
pub mod yields {
    use super::mutex;
    use crate::relax::Yield;

    /// A [`mcs::Mutex`] that implements the [`Yield`] relax policy.
    ///
    /// # Example
    ///
    /// ```
    /// use bargelock::mcs::yields::Mutex;
    ///
    /// let mutex = Mutex::new(0);
    /// let guard = mutex.lock();
    /// assert_eq!(*guard, 0);
    /// ```
    /// [`mcs::Mutex`]: mutex::Mutex
    pub type Mutex<T> = mutex::Mutex<T, Yield>;

    /// A [`mcs::MutexGuard`] that implements the [`Yield`] relax policy.
    ///
    /// [`mcs::MutexGuard`]: mutex::MutexGuard
    pub type MutexGuard<'a, T> = mutex::MutexGuard<'a, T, Yield>;

    /// A queue lock that spins with exponential backoff up to a threshold,
    /// then yields back to the OS scheduler.
    pub mod backoff {
        use super::mutex;
        use crate::relax::YieldBackoff;

        /// A [`mcs::Mutex`] that implements the [`YieldBackoff`] relax
        /// policy.
        ///
        /// # Example
        ///
        /// ```
        /// use bargelock::mcs::yields::backoff::Mutex;
        ///
        /// let mutex = Mutex::new(0);
        /// let guard = mutex.lock();
        /// assert_eq!(*guard, 0);
        /// ```
        /// [`mcs::Mutex`]: mutex::Mutex
        pub type Mutex<T> = mutex::Mutex<T, YieldBackoff>;

        /// A [`mcs::MutexGuard`] that implements the [`YieldBackoff`] relax
        /// policy.
        ///
        /// [`mcs::MutexGuard`]: mutex::MutexGuard
        pub type MutexGuard<'a, T> = mutex::MutexGuard<'a, T, YieldBackoff>;
    }
}

/// A queue lock that rapidly spins without telling the CPU to do any power
/// down while racing for the fast path.
pub mod loops {
    use super::mutex;
    use crate::relax::Loop;

    /// A [`mcs::Mutex`] that implements the [`Loop`] relax policy.
    ///
    /// # Example
    ///
    /// ```
    /// use bargelock::mcs::loops::Mutex;
    ///
    /// let mutex = Mutex::new(0);
    /// let guard = mutex.lock();
    /// assert_eq!(*guard, 0);
    /// ```
    /// [`mcs::Mutex`]: mutex::Mutex
    pub type Mutex<T> = mutex::Mutex<T, Loop>;

    /// A [`mcs::MutexGuard`] that implements the [`Loop`] relax policy.
    ///
    /// [`mcs::MutexGuard`]: mutex::MutexGuard
    pub type MutexGuard<'a, T> = mutex::MutexGuard<'a, T, Loop>;
}
