//! A strictly fair ticket lock.
//!
//! Every acquisition draws a ticket and enters the critical section in
//! ticket order, so hand-off is 100% FIFO and sequentially consistent with
//! respect to the protected data. See the [module documentation] for the
//! busy-wait limitations shared by the ticket family.
//!
//! [module documentation]: crate::ticket

use core::fmt::{self, Debug, Display, Formatter};
use core::sync::atomic::Ordering::{Acquire, Relaxed, Release};

use crate::cfg::atomic::AtomicU32;
use crate::cfg::cell::{UnsafeCell, WithUnchecked};
use crate::cfg::hint;
use crate::cfg::thread;
use crate::ticket::yield_threshold;

/// A strictly FIFO mutual exclusion primitive useful for protecting shared
/// data.
///
/// Acquisitions are served in arrival order. Waiters do not sleep; they
/// spin-hint while their turn is near and yield the time slice while it is
/// far, which keeps the hand-off latency low at the cost of burning cycles
/// under heavy oversubscription.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use std::thread;
///
/// use bargelock::ticket::fair::Mutex;
///
/// let data = Arc::new(Mutex::new(0));
///
/// let handles: Vec<_> = (0..4)
///     .map(|_| {
///         let data = Arc::clone(&data);
///         thread::spawn(move || *data.lock() += 1)
///     })
///     .collect();
/// for handle in handles {
///     handle.join().unwrap();
/// }
///
/// assert_eq!(*data.lock(), 4);
/// ```
pub struct Mutex<T: ?Sized> {
    /// Next ticket to hand out, incremented by every acquisition.
    ticket: AtomicU32,
    /// Ticket of the most recently completed critical section.
    done: AtomicU32,
    /// The holder's own ticket, written under the lock and consumed by the
    /// matching release.
    current: UnsafeCell<u32>,
    data: UnsafeCell<T>,
}

// SAFETY: A `Mutex` is safe to be sent across thread boundaries as long as
// the protected data `T` is also safe to be sent to other threads.
unsafe impl<T: ?Sized + Send> Send for Mutex<T> {}
// SAFETY: Access and modification of the protected data is serialized by
// ticket order, and the `current` cell is only ever touched by the unique
// thread whose turn it is, between its acquire and its release.
unsafe impl<T: ?Sized + Send> Sync for Mutex<T> {}

impl<T> Mutex<T> {
    /// Creates a new, unlocked mutex (const).
    ///
    /// # Examples
    ///
    /// ```
    /// use bargelock::ticket::fair::Mutex;
    ///
    /// const MUTEX: Mutex<i32> = Mutex::new(0);
    /// ```
    #[cfg(not(all(loom, test)))]
    pub const fn new(value: T) -> Self {
        let ticket = AtomicU32::new(0);
        let done = AtomicU32::new(0);
        let current = UnsafeCell::new(0);
        let data = UnsafeCell::new(value);
        Self { ticket, done, current, data }
    }

    /// Creates a new, unlocked and Loom based mutex (non-const).
    #[cfg(all(loom, test))]
    pub fn new(value: T) -> Self {
        let ticket = AtomicU32::new(0);
        let done = AtomicU32::new(0);
        let current = UnsafeCell::new(0);
        let data = UnsafeCell::new(value);
        Self { ticket, done, current, data }
    }

    /// Consumes this mutex, returning the underlying data.
    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

impl<T: ?Sized> Mutex<T> {
    /// Acquires this mutex, blocking the current thread until its turn
    /// arrives.
    ///
    /// Acquisitions are granted in strict arrival order. Waiting is a
    /// spin/yield busy-wait; the thread is never put to sleep.
    #[must_use]
    #[inline]
    pub fn lock(&self) -> MutexGuard<'_, T> {
        let ticket = self.ticket.fetch_add(1, Relaxed).wrapping_add(1);
        let mut last = None;
        let mut should_yield = false;
        loop {
            let done = self.done.load(Acquire);
            if last != Some(done) {
                last = Some(done);
                let gap = done.wrapping_add(1).wrapping_sub(ticket) as i32;
                if gap == 0 {
                    break;
                }
                should_yield = gap < yield_threshold();
            }
            if should_yield {
                thread::yield_now();
            } else {
                hint::spin_loop();
            }
        }
        // SAFETY: our ticket was drawn, so the cell is ours until release.
        unsafe { self.current.with_mut_unchecked(|current| *current = ticket) };
        MutexGuard::new(self)
    }

    /// Acquires this mutex and then runs the closure against the guard.
    ///
    /// # Examples
    ///
    /// ```
    /// use bargelock::ticket::fair::Mutex;
    ///
    /// let mutex = Mutex::new(0);
    /// let value = mutex.lock_then(|mut guard| {
    ///     *guard += 1;
    ///     *guard
    /// });
    /// assert_eq!(value, 1);
    /// ```
    #[inline]
    pub fn lock_then<F, Ret>(&self, f: F) -> Ret
    where
        F: FnOnce(MutexGuard<'_, T>) -> Ret,
    {
        f(self.lock())
    }

    /// Returns `true` if some acquisition is in flight.
    ///
    /// This function does not guarantee strong ordering, only atomicity,
    /// and it counts waiters as well as the holder.
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.ticket.load(Relaxed) != self.done.load(Relaxed)
    }

    /// Releases the lock: a single release store of the holder's ticket.
    fn unlock(&self) {
        // SAFETY: only the holder reaches this, and it wrote `current`
        // under the lock.
        let ticket = unsafe { self.current.with_unchecked(|current| *current) };
        self.done.store(ticket, Release);
    }

    /// Returns a mutable reference to the underlying data.
    ///
    /// Since this call borrows the `Mutex` mutably, no actual locking needs
    /// to take place.
    #[cfg(not(all(loom, test)))]
    #[inline]
    pub fn get_mut(&mut self) -> &mut T {
        // SAFETY: We hold exclusive access to the Mutex data.
        unsafe { &mut *self.data.get() }
    }
}

impl<T: ?Sized + Default> Default for Mutex<T> {
    /// Creates a `Mutex<T>`, with the `Default` value for `T`.
    fn default() -> Self {
        Self::new(Default::default())
    }
}

impl<T> From<T> for Mutex<T> {
    /// Creates a `Mutex<T>` from an instance of `T`.
    fn from(data: T) -> Self {
        Self::new(data)
    }
}

impl<T: ?Sized + Debug> Debug for Mutex<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        // There is no try_lock on a strict ticket lock, so the data cannot
        // be sampled without taking a turn.
        f.debug_struct("Mutex").finish_non_exhaustive()
    }
}

/// An RAII implementation of a "scoped lock" of a mutex. When this structure
/// is dropped (falls out of scope), the lock will be unlocked.
///
/// The data protected by the mutex can be accessed through this guard via
/// its [`Deref`] and [`DerefMut`] implementations.
///
/// [`Deref`]: core::ops::Deref
/// [`DerefMut`]: core::ops::DerefMut
#[must_use = "if unused the Mutex will immediately unlock"]
pub struct MutexGuard<'a, T: ?Sized> {
    lock: &'a Mutex<T>,
}

// SAFETY: Same argument as the queue lock's guard: the guard owns exclusive
// access to the data for its whole lifetime.
unsafe impl<T: ?Sized + Send> Send for MutexGuard<'_, T> {}
unsafe impl<T: ?Sized + Sync> Sync for MutexGuard<'_, T> {}

impl<'a, T: ?Sized> MutexGuard<'a, T> {
    const fn new(lock: &'a Mutex<T>) -> Self {
        Self { lock }
    }

    /// Runs `f` against a shared reference pointing to the underlying data.
    fn with<F, Ret>(&self, f: F) -> Ret
    where
        F: FnOnce(&T) -> Ret,
    {
        // SAFETY: A guard instance holds the lock locked.
        unsafe { self.lock.data.with_unchecked(f) }
    }
}

impl<T: ?Sized + Debug> Debug for MutexGuard<'_, T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.with(|data| data.fmt(f))
    }
}

impl<T: ?Sized + Display> Display for MutexGuard<'_, T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.with(|data| data.fmt(f))
    }
}

#[cfg(not(all(loom, test)))]
impl<T: ?Sized> core::ops::Deref for MutexGuard<'_, T> {
    type Target = T;

    /// Dereferences the guard to access the underlying data.
    #[inline(always)]
    fn deref(&self) -> &T {
        // SAFETY: A guard instance holds the lock locked.
        unsafe { &*self.lock.data.get() }
    }
}

#[cfg(not(all(loom, test)))]
impl<T: ?Sized> core::ops::DerefMut for MutexGuard<'_, T> {
    /// Mutably dereferences the guard to access the underlying data.
    #[inline(always)]
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: A guard instance holds the lock locked.
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T: ?Sized> Drop for MutexGuard<'_, T> {
    #[inline]
    fn drop(&mut self) {
        self.lock.unlock();
    }
}

#[cfg(all(loom, test))]
// SAFETY: A guard instance holds the lock locked, with exclusive access to
// the underlying data.
unsafe impl<T: ?Sized> crate::loom::Guard for MutexGuard<'_, T> {
    type Target = T;

    fn get(&self) -> &UnsafeCell<Self::Target> {
        &self.lock.data
    }
}

#[cfg(test)]
impl<T: ?Sized> crate::test::LockNew for Mutex<T> {
    type Target = T;

    fn new(value: Self::Target) -> Self
    where
        Self::Target: Sized,
    {
        Self::new(value)
    }
}

#[cfg(test)]
impl<T: ?Sized> crate::test::LockThen for Mutex<T> {
    type Guard<'a>
        = MutexGuard<'a, T>
    where
        Self: 'a,
        Self::Target: 'a;

    fn lock_then<F, Ret>(&self, f: F) -> Ret
    where
        F: FnOnce(MutexGuard<'_, T>) -> Ret,
    {
        self.lock_then(f)
    }
}

#[cfg(all(not(loom), test))]
impl<T: ?Sized> crate::test::LockData for Mutex<T> {
    fn into_inner(self) -> Self::Target
    where
        Self::Target: Sized,
    {
        self.into_inner()
    }

    fn get_mut(&mut self) -> &mut Self::Target {
        self.get_mut()
    }
}

#[cfg(all(not(loom), test))]
mod test {
    use std::sync::mpsc::channel;
    use std::sync::Arc;
    use std::thread;

    use crate::test::tests;

    use super::Mutex;

    #[test]
    fn smoke() {
        tests::smoke::<Mutex<_>>();
    }

    #[test]
    fn lots_and_lots_lock() {
        tests::lots_and_lots_lock::<Mutex<_>>();
    }

    #[test]
    fn test_mutex_default() {
        tests::test_mutex_default::<Mutex<_>>();
    }

    #[test]
    fn test_into_inner() {
        tests::test_into_inner::<Mutex<_>>();
    }

    #[test]
    fn test_into_inner_drop() {
        tests::test_into_inner_drop::<Mutex<_>>();
    }

    #[test]
    fn test_get_mut() {
        tests::test_get_mut::<Mutex<_>>();
    }

    #[test]
    fn test_lock_arc_nested() {
        tests::test_lock_arc_nested::<Mutex<_>, Mutex<_>>();
    }

    #[test]
    fn test_acquire_more_than_one_lock() {
        tests::test_acquire_more_than_one_lock::<Mutex<_>>();
    }

    #[test]
    fn test_lock_arc_access_in_unwind() {
        tests::test_lock_arc_access_in_unwind::<Mutex<_>>();
    }

    #[test]
    fn test_lock_unsized() {
        tests::test_lock_unsized::<Mutex<_>>();
    }

    #[test]
    fn hand_off_is_fifo() {
        const WAITERS: usize = 8;

        let mutex = Arc::new(Mutex::new(()));
        let order = Arc::new(Mutex::new(Vec::new()));
        let gate = mutex.lock();

        let (tx, rx) = channel();
        let handles: Vec<_> = (0..WAITERS)
            .map(|id| {
                let mutex = Arc::clone(&mutex);
                let order = Arc::clone(&order);
                let tx = tx.clone();
                thread::spawn(move || {
                    // Announce before drawing the next ticket so arrival
                    // order below is the ticket order.
                    tx.send(()).unwrap();
                    let _guard = mutex.lock();
                    order.lock().push(id);
                })
            })
            .map(|handle| {
                // One waiter at a time, so tickets are drawn in spawn order.
                rx.recv().unwrap();
                thread::sleep(std::time::Duration::from_millis(10));
                handle
            })
            .collect();

        drop(gate);
        for handle in handles {
            handle.join().unwrap();
        }

        let order = order.lock();
        assert!(order.windows(2).all(|pair| pair[0] < pair[1]), "{order:?}");
    }

    #[test]
    fn state_roundtrip() {
        let mutex = Mutex::new(0);
        for _ in 0..1000 {
            drop(mutex.lock());
            assert!(!mutex.is_locked());
        }
    }
}

#[cfg(all(loom, test))]
mod model {
    use crate::loom::models;

    use super::Mutex;

    #[test]
    fn lock_join() {
        models::lock_join::<Mutex<_>>();
    }
}
