//! Locking interfaces for the queue lock that are compatible with
//! [lock_api].
//!
//! This module exports [`lock_api::Mutex`] and [`lock_api::MutexGuard`] type
//! aliases with a [`mcs::Mutex`] as their raw inner type. The raw type
//! implements the [`lock_api::RawMutex`] trait when this feature is enabled.
//!
//! The Mutex is generic over the relax policy, like the lock it wraps. The
//! modules below export type aliases bound to one policy each.
//!
//! [`mcs::Mutex`]: crate::mcs::Mutex
//! [lock_api]: https://crates.io/crates/lock_api
//! [`lock_api::Mutex`]: https://docs.rs/lock_api/latest/lock_api/struct.Mutex.html
//! [`lock_api::MutexGuard`]: https://docs.rs/lock_api/latest/lock_api/struct.MutexGuard.html
//! [`lock_api::RawMutex`]: https://docs.rs/lock_api/latest/lock_api/trait.RawMutex.html

use crate::mcs;

/// A lock that implements the [`lock_api::RawMutex`] trait over this
/// crate's queue lock.
///
/// [`lock_api::RawMutex`]: https://docs.rs/lock_api/latest/lock_api/trait.RawMutex.html
pub type Mutex<T, R> = lock_api::Mutex<mcs::Mutex<(), R>, T>;

/// A guard produced by [`Mutex`] locking operations.
pub type MutexGuard<'a, T, R> = lock_api::MutexGuard<'a, mcs::Mutex<(), R>, T>;

/// A queue lock that signals the processor that it is running a busy-wait
/// spin-loop, compatible with the `lock_api` crate.
pub mod spins {
    use crate::relax::Spin;

    /// A queue lock that implements the [`Spin`] relax policy and is
    /// compatible with the `lock_api` crate.
    ///
    /// # Example
    ///
    /// ```
    /// use bargelock::lock_api::spins::Mutex;
    ///
    /// let mutex = Mutex::new(0);
    /// let guard = mutex.lock();
    /// assert_eq!(*guard, 0);
    /// ```
    pub type Mutex<T> = super::Mutex<T, Spin>;

    /// A queue lock guard that implements the [`Spin`] relax policy and is
    /// compatible with the `lock_api` crate.
    pub type MutexGuard<'a, T> = super::MutexGuard<'a, T, Spin>;

    /// A `lock_api` compatible queue lock that performs exponential backoff
    /// while spinning.
    pub mod backoff {
        use crate::relax::SpinBackoff;

        /// A queue lock that implements the [`SpinBackoff`] relax policy
        /// and is compatible with the `lock_api` crate.
        ///
        /// # Example
        ///
        /// ```
        /// use bargelock::lock_api::spins::backoff::Mutex;
        ///
        /// let mutex = Mutex::new(0);
        /// let guard = mutex.lock();
        /// assert_eq!(*guard, 0);
        /// ```
        pub type Mutex<T> = crate::lock_api::Mutex<T, SpinBackoff>;

        /// A queue lock guard that implements the [`SpinBackoff`] relax
        /// policy and is compatible with the `lock_api` crate.
        pub type MutexGuard<'a, T> = crate::lock_api::MutexGuard<'a, T, SpinBackoff>;
    }
}

/// A queue lock that yields the current time slice to the OS scheduler,
/// compatible with the `lock_api` crate.
pub mod yields {
    use crate::relax::Yield;

    /// A queue lock that implements the [`Yield`] relax policy and is
    /// compatible with the `lock_api` crate.
    ///
    /// # Example
    ///
    /// ```
    /// use bargelock::lock_api::yields::Mutex;
    ///
    /// let mutex = Mutex::new(0);
    /// let guard = mutex.lock();
    /// assert_eq!(*guard, 0);
    /// ```
    pub type Mutex<T> = super::Mutex<T, Yield>;

    /// A queue lock guard that implements the [`Yield`] relax policy and is
    /// compatible with the `lock_api` crate.
    pub type MutexGuard<'a, T> = super::MutexGuard<'a, T, Yield>;

    /// A `lock_api` compatible queue lock that spins with exponential
    /// backoff up to a threshold, then yields.
    pub mod backoff {
        use crate::relax::YieldBackoff;

        /// A queue lock that implements the [`YieldBackoff`] relax policy
        /// and is compatible with the `lock_api` crate.
        ///
        /// # Example
        ///
        /// ```
        /// use bargelock::lock_api::yields::backoff::Mutex;
        ///
        /// let mutex = Mutex::new(0);
        /// let guard = mutex.lock();
        /// assert_eq!(*guard, 0);
        /// ```
        pub type Mutex<T> = crate::lock_api::Mutex<T, YieldBackoff>;

        /// A queue lock guard that implements the [`YieldBackoff`] relax
        /// policy and is compatible with the `lock_api` crate.
        pub type MutexGuard<'a, T> = crate::lock_api::MutexGuard<'a, T, YieldBackoff>;
    }
}

/// A queue lock that rapidly spins without telling the CPU to do any power
/// down, compatible with the `lock_api` crate.
pub mod loops {
    use crate::relax::Loop;

    /// A queue lock that implements the [`Loop`] relax policy and is
    /// compatible with the `lock_api` crate.
    ///
    /// # Example
    ///
    /// ```
    /// use bargelock::lock_api::loops::Mutex;
    ///
    /// let mutex = Mutex::new(0);
    /// let guard = mutex.lock();
    /// assert_eq!(*guard, 0);
    /// ```
    pub type Mutex<T> = super::Mutex<T, Loop>;

    /// A queue lock guard that implements the [`Loop`] relax policy and is
    /// compatible with the `lock_api` crate.
    pub type MutexGuard<'a, T> = super::MutexGuard<'a, T, Loop>;
}
