//! A ticket lock with a lock-free fast path.
//!
//! Acquisitions first race a three-state word for the lock; only when that
//! fails do they fall back to drawing a ticket and waiting for their turn.
//! The fast path skips ticket traffic entirely, so this variant is not
//! strictly fair but yields more throughput than its [`fair`] sibling. See
//! the [module documentation] for the busy-wait limitations shared by the
//! ticket family.
//!
//! [`fair`]: crate::ticket::fair
//! [module documentation]: crate::ticket

use core::fmt::{self, Debug, Display, Formatter};
use core::sync::atomic::Ordering::{Acquire, Relaxed, Release};

use crate::cfg::atomic::AtomicU32;
use crate::cfg::cell::{UnsafeCell, WithUnchecked};
use crate::cfg::hint;
use crate::cfg::thread;
use crate::ticket::yield_threshold;

/// Nobody holds the lock.
const FREE: u32 = 0;
/// Held through the fast path; no ticket was drawn.
const FAST: u32 = 1;
/// Held by a waiter that came through the ticket queue; release must also
/// publish its ticket as done.
const TICKETED: u32 = 2;

/// A mostly-fair mutual exclusion primitive useful for protecting shared
/// data.
///
/// A ticket lock with a fast-path bypass: when the lock is observed free,
/// an arriving thread claims it with one compare-and-set and never touches
/// the ticket counters. Contended acquisitions queue by ticket, keeping
/// starvation bounded for everything that reached the slow path. Waiters do
/// not sleep.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use std::thread;
///
/// use bargelock::ticket::fast::Mutex;
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
    /// The fast-path word: [`FREE`], [`FAST`] or [`TICKETED`].
    busy: AtomicU32,
    /// Next ticket to hand out on the slow path.
    ticket: AtomicU32,
    /// Ticket of the most recently completed slow-path critical section.
    done: AtomicU32,
    /// The slow-path holder's own ticket.
    current: UnsafeCell<u32>,
    data: UnsafeCell<T>,
}

// SAFETY: A `Mutex` is safe to be sent across thread boundaries as long as
// the protected data `T` is also safe to be sent to other threads.
unsafe impl<T: ?Sized + Send> Send for Mutex<T> {}
// SAFETY: Access and modification of the protected data is serialized by
// the busy word, and the `current` cell is only ever touched by the unique
// slow-path holder, between its claim of the word and its `done` publish.
unsafe impl<T: ?Sized + Send> Sync for Mutex<T> {}

impl<T> Mutex<T> {
    /// Creates a new, unlocked mutex (const).
    ///
    /// # Examples
    ///
    /// ```
    /// use bargelock::ticket::fast::Mutex;
    ///
    /// const MUTEX: Mutex<i32> = Mutex::new(0);
    /// ```
    #[cfg(not(all(loom, test)))]
    pub const fn new(value: T) -> Self {
        let busy = AtomicU32::new(FREE);
        let ticket = AtomicU32::new(0);
        let done = AtomicU32::new(0);
        let current = UnsafeCell::new(0);
        let data = UnsafeCell::new(value);
        Self { busy, ticket, done, current, data }
    }

    /// Creates a new, unlocked and Loom based mutex (non-const).
    #[cfg(all(loom, test))]
    pub fn new(value: T) -> Self {
        let busy = AtomicU32::new(FREE);
        let ticket = AtomicU32::new(0);
        let done = AtomicU32::new(0);
        let current = UnsafeCell::new(0);
        let data = UnsafeCell::new(value);
        Self { busy, ticket, done, current, data }
    }

    /// Consumes this mutex, returning the underlying data.
    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

impl<T: ?Sized> Mutex<T> {
    /// Acquires this mutex, blocking the current thread until it is able to
    /// do so.
    ///
    /// A free lock is claimed without drawing a ticket; a late arriver may
    /// therefore overtake already queued waiters. Waiting is a spin/yield
    /// busy-wait; the thread is never put to sleep.
    #[must_use]
    #[inline]
    pub fn lock(&self) -> MutexGuard<'_, T> {
        if self.busy.compare_exchange(FREE, FAST, Acquire, Relaxed).is_ok() {
            return MutexGuard::new(self);
        }
        self.lock_contended()
    }

    /// The ticketed half of [`lock`].
    ///
    /// [`lock`]: Mutex::lock
    fn lock_contended(&self) -> MutexGuard<'_, T> {
        let ticket = self.ticket.fetch_add(1, Relaxed).wrapping_add(1);
        let mut last = None;
        let mut should_yield = false;
        loop {
            // An opaque read suffices here: the claim of the busy word
            // below carries the acquire edge for the protected data.
            let done = self.done.load(Relaxed);
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
        // Our turn has come, but fast-path arrivals may still hold or steal
        // the word; claim it as a ticketed holder.
        while self.busy.compare_exchange(FREE, TICKETED, Acquire, Relaxed).is_err() {
            hint::spin_loop();
        }
        // SAFETY: the word is ours, so the cell is ours until release.
        unsafe { self.current.with_mut_unchecked(|current| *current = ticket) };
        MutexGuard::new(self)
    }

    /// Acquires this mutex and then runs the closure against the guard.
    ///
    /// # Examples
    ///
    /// ```
    /// use bargelock::ticket::fast::Mutex;
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

    /// Attempts to acquire this mutex without blocking the thread.
    ///
    /// A single fast-path attempt; never draws a ticket.
    #[must_use]
    #[inline]
    pub fn try_lock(&self) -> Option<MutexGuard<'_, T>> {
        self.busy
            .compare_exchange(FREE, FAST, Acquire, Relaxed)
            .is_ok()
            .then(|| MutexGuard::new(self))
    }

    /// Attempts to acquire this mutex and then runs the closure against the
    /// guard, if any.
    #[inline]
    pub fn try_lock_then<F, Ret>(&self, f: F) -> Ret
    where
        F: FnOnce(Option<MutexGuard<'_, T>>) -> Ret,
    {
        f(self.try_lock())
    }

    /// Returns `true` if the lock is currently held.
    ///
    /// This function does not guarantee strong ordering, only atomicity.
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.busy.load(Relaxed) != FREE
    }

    /// Releases the lock.
    ///
    /// Clears the busy word; a ticketed holder additionally publishes its
    /// ticket so the next waiter in line can leave its wait loop.
    fn unlock(&self) {
        let prev = self.busy.load(Relaxed);
        self.busy.store(FREE, Release);
        if prev == TICKETED {
            // SAFETY: no other thread can become a ticketed holder before
            // this publish, so the cell still belongs to this thread.
            let ticket = unsafe { self.current.with_unchecked(|current| *current) };
            self.done.store(ticket, Release);
        }
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
        let mut d = f.debug_struct("Mutex");
        match self.try_lock() {
            Some(guard) => guard.with(|data| d.field("data", &data)),
            None => d.field("data", &format_args!("<locked>")),
        };
        d.finish()
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

#[cfg(test)]
impl<T: ?Sized> crate::test::TryLockThen for Mutex<T> {
    fn try_lock_then<F, Ret>(&self, f: F) -> Ret
    where
        F: FnOnce(Option<MutexGuard<'_, T>>) -> Ret,
    {
        self.try_lock_then(f)
    }

    fn is_locked(&self) -> bool {
        self.is_locked()
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
    use core::sync::atomic::Ordering::Relaxed;

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
    fn lots_and_lots_try_lock() {
        tests::lots_and_lots_try_lock::<Mutex<_>>();
    }

    #[test]
    fn lots_and_lots_mixed_lock() {
        tests::lots_and_lots_mixed_lock::<Mutex<_>>();
    }

    #[test]
    fn test_guard_debug_display() {
        tests::test_guard_debug_display::<Mutex<_>>();
    }

    #[test]
    fn test_mutex_debug() {
        tests::test_mutex_debug::<Mutex<_>>();
    }

    #[test]
    fn test_mutex_from() {
        tests::test_mutex_from::<Mutex<_>>();
    }

    #[test]
    fn test_mutex_default() {
        tests::test_mutex_default::<Mutex<_>>();
    }

    #[test]
    fn test_try_lock() {
        tests::test_try_lock::<Mutex<_>>();
    }

    #[test]
    fn test_into_inner() {
        tests::test_into_inner::<Mutex<_>>();
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
    fn fast_path_skips_the_ticket() {
        let mutex = Mutex::new(());
        let guard = mutex.lock();
        assert_eq!(0, mutex.ticket.load(Relaxed));
        drop(guard);
        drop(mutex.lock());
        assert_eq!(0, mutex.ticket.load(Relaxed));
        assert!(!mutex.is_locked());
    }

    #[test]
    fn try_lock_fails_while_held() {
        let mutex = Mutex::new(());
        let gate = mutex.lock();
        assert!(mutex.try_lock().is_none());
        drop(gate);
        drop(mutex.lock());
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

    #[test]
    fn try_lock_join() {
        models::try_lock_join::<Mutex<_>>();
    }

    #[test]
    fn mixed_lock_join() {
        models::mixed_lock_join::<Mutex<_>>();
    }
}
