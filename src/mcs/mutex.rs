use core::fmt::{self, Debug, Display, Formatter};
use core::marker::PhantomData;
use core::ptr;
use core::sync::atomic::Ordering::{Acquire, Relaxed, Release, SeqCst};

use crate::cfg::atomic::{fence, AtomicBool, AtomicPtr};
use crate::cfg::cell::{UnsafeCell, WithUnchecked};
use crate::cfg::reclaim;
use crate::parker::Parker;
use crate::relax::Relax;
use crate::weak::{self, Acq, Plain, Rel};

/// A single waiter's per-acquire record.
///
/// Born parked. The owner links it behind the queue tail, sleeps on the
/// parking slot until the predecessor's drain promotes it, and finally
/// evicts it during its own drain. Eviction writes [`removed`] into `next`
/// so that enqueuers holding a stale tail snapshot can detect the node is
/// gone and re-read the tail.
#[derive(Debug)]
struct Waiter {
    parker: Parker,
    next: AtomicPtr<Waiter>,
}

impl Waiter {
    #[cfg(not(all(loom, test)))]
    const fn new() -> Self {
        let parker = Parker::parked();
        let next = AtomicPtr::new(ptr::null_mut());
        Self { parker, next }
    }

    #[cfg(all(loom, test))]
    fn new() -> Self {
        let parker = Parker::parked();
        let next = AtomicPtr::new(ptr::null_mut());
        Self { parker, next }
    }
}

/// Backing storage for the eviction tombstone.
static REMOVED: u8 = 0;

/// The tombstone address stored into an evicted waiter's `next` slot.
///
/// Distinguishable from null and from every live node by address identity.
/// Never dereferenced.
fn removed() -> *mut Waiter {
    ptr::addr_of!(REMOVED).cast_mut().cast()
}

/// How an acquisition entered the critical section candidacy.
enum Entry {
    /// Linked behind a predecessor; the thread must sleep until promoted.
    Queued,
    /// Installed as the sole queue entry; the thread busy-waits at the front.
    Head,
    /// Claimed the fast path mid-enqueue; the node was never published.
    Barged,
}

/// A mutual exclusion primitive useful for protecting shared data.
///
/// An unfair lock built from a fast-path flag and an MCS style waiting
/// queue. Uncontended acquisitions touch only the flag; contended ones
/// queue up, sleep from the second position onwards, and pay the queue
/// maintenance on the way *into* the critical section so that release is a
/// single store. See the [module documentation] for the protocol.
///
/// The data is only accessible through the RAII guards returned from
/// [`lock`] and [`try_lock`], or within the closures passed to
/// [`lock_then`] and [`try_lock_then`].
///
/// # Examples
///
/// ```
/// use std::sync::mpsc::channel;
/// use std::sync::Arc;
/// use std::thread;
///
/// use bargelock::mcs::spins::Mutex;
///
/// const N: usize = 10;
///
/// // Spawn a few threads to increment a shared variable (non-atomically),
/// // and let the main thread know once all increments are done.
/// let data = Arc::new(Mutex::new(0));
///
/// let (tx, rx) = channel();
/// for _ in 0..N {
///     let (data, tx) = (data.clone(), tx.clone());
///     thread::spawn(move || {
///         // The shared state can only be accessed once the lock is held.
///         let mut data = data.lock();
///         *data += 1;
///         if *data == N {
///             tx.send(()).unwrap();
///         }
///         // the lock is unlocked here when `data` goes out of scope.
///     });
/// }
///
/// rx.recv().unwrap();
/// ```
/// [module documentation]: crate::mcs
/// [`lock`]: Mutex::lock
/// [`try_lock`]: Mutex::try_lock
/// [`lock_then`]: Mutex::lock_then
/// [`try_lock_then`]: Mutex::try_lock_then
pub struct Mutex<T: ?Sized, R> {
    /// True exactly while some thread is inside the critical section.
    busy: AtomicBool,
    /// The most recently enqueued waiter, or null when the queue is empty.
    tail: AtomicPtr<Waiter>,
    /// The front of the queue. Mutated only by the serialized holder (or
    /// the unique initial enqueuer), so relaxed accesses suffice.
    top: AtomicPtr<Waiter>,
    marker: PhantomData<R>,
    data: UnsafeCell<T>,
}

// SAFETY: A `Mutex` is safe to be sent across thread boundaries as long as
// the protected data `T` is also safe to be sent to other threads.
unsafe impl<T: ?Sized + Send, R> Send for Mutex<T, R> {}
// SAFETY: A `Mutex` is safe to be shared across thread boundaries since it
// serializes access and modification of the protected data, but only if the
// protected data `T` is safe to be sent to other threads.
unsafe impl<T: ?Sized + Send, R> Sync for Mutex<T, R> {}

impl<T, R> Mutex<T, R> {
    /// Creates a new, unlocked mutex with an empty queue (const).
    ///
    /// # Examples
    ///
    /// ```
    /// use bargelock::mcs::spins::Mutex;
    ///
    /// const MUTEX: Mutex<i32> = Mutex::new(0);
    /// ```
    #[cfg(not(all(loom, test)))]
    pub const fn new(value: T) -> Self {
        let busy = AtomicBool::new(false);
        let tail = AtomicPtr::new(ptr::null_mut());
        let top = AtomicPtr::new(ptr::null_mut());
        let data = UnsafeCell::new(value);
        Self { busy, tail, top, data, marker: PhantomData }
    }

    /// Creates a new, unlocked and Loom based mutex (non-const).
    #[cfg(all(loom, test))]
    pub fn new(value: T) -> Self {
        let busy = AtomicBool::new(false);
        let tail = AtomicPtr::new(ptr::null_mut());
        let top = AtomicPtr::new(ptr::null_mut());
        let data = UnsafeCell::new(value);
        Self { busy, tail, top, data, marker: PhantomData }
    }

    /// Consumes this mutex, returning the underlying data.
    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

impl<T: ?Sized, R: Relax> Mutex<T, R> {
    /// Acquires this mutex, blocking the current thread until it is able to
    /// do so.
    ///
    /// If the lock is free and no thread is queued, the acquisition touches
    /// a single flag and allocates nothing. Otherwise the thread joins the
    /// waiting queue; from the second queue position onwards it sleeps until
    /// its predecessor's hand-off.
    ///
    /// This lock is not FIFO fair and it is not reentrant: a thread calling
    /// `lock` while already holding this mutex deadlocks.
    #[must_use]
    #[inline]
    pub fn lock(&self) -> MutexGuard<'_, T, R> {
        // This snapshot is only ever compared against null; dereferencing
        // it would require the epoch pin taken by the slow path.
        if self.tail.load(Acquire).is_null() && weak::cas::<_, Acq>(&self.busy, false, true) {
            return MutexGuard::new(self);
        }
        self.lock_slow()
    }

    /// Acquires this mutex and then runs the closure against the guard.
    ///
    /// # Examples
    ///
    /// ```
    /// use bargelock::mcs::spins::Mutex;
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
        F: FnOnce(MutexGuard<'_, T, R>) -> Ret,
    {
        f(self.lock())
    }

    /// The queueing half of [`lock`], entered once the fast path is out of
    /// reach.
    ///
    /// [`lock`]: Mutex::lock
    fn lock_slow(&self) -> MutexGuard<'_, T, R> {
        let node = Box::into_raw(Box::new(Waiter::new()));
        let queued = {
            let pin = reclaim::pin();
            // The queue may only be walked while pinned; nodes read from
            // the tail before the pin could already be retired.
            let head = self.tail.load(Acquire);
            // SAFETY: `node` is a fresh allocation this thread owns, and the
            // pin is held for the whole enqueue.
            match unsafe { self.enqueue(head, node, &pin) } {
                Entry::Barged => {
                    // Never published; no other thread could have seen it.
                    drop(unsafe { Box::from_raw(node) });
                    return MutexGuard::new(self);
                }
                Entry::Head => false,
                Entry::Queued => true,
            }
        };
        if queued {
            // The pin is dropped before sleeping so a parked thread never
            // holds an epoch open.
            //
            // SAFETY: this thread owns `node` and retires it only during its
            // own drain below; nothing else frees it before that.
            unsafe { &(*node).parker }.park_loop_relaxed();
        }
        // Race the releaser (and any barging arrival) for the flag. The
        // releaser pre-woke us before leaving its own drain, so this window
        // overlaps our wake-up with the end of its critical section.
        let mut relax = R::new();
        while self.busy.compare_exchange(false, true, SeqCst, Relaxed).is_err() {
            relax.relax();
        }
        let pin = reclaim::pin();
        // SAFETY: we hold the lock and `node` is the current queue front.
        unsafe { self.drain(node, &pin) };
        MutexGuard::new(self)
    }

    /// Links `node` into the waiting queue.
    ///
    /// The first exchange targets the `next` slot of the last observed tail;
    /// a failed exchange hands back the node that won the slot, and the
    /// insertion chases witnesses down the chain instead of hammering one
    /// location. Whenever the tail is observed empty the fast path is tried
    /// once more, since queueing behind nobody is pure waste.
    ///
    /// # Safety
    ///
    /// `node` must be a fresh, unpublished allocation owned by the calling
    /// thread, and the calling thread must stay pinned for the duration.
    unsafe fn enqueue(&self, mut head: *mut Waiter, node: *mut Waiter, _pin: &reclaim::Guard) -> Entry {
        if head.is_null() {
            head = self.install_first(node);
            if head.is_null() {
                return Entry::Head;
            }
        }
        let mut at = head;
        loop {
            // SAFETY: `at` came from the tail or from a witness published by
            // another enqueuer; the epoch pin keeps the allocation alive
            // even if its owner has already dequeued it.
            let witness = weak::xchg::<_, Rel>(unsafe { &(*at).next }, ptr::null_mut(), node);
            if witness.is_null() {
                break;
            }
            if witness != removed() && unsafe { &(*witness).next }.load(Relaxed).is_null() {
                // The node that beat us has no successor yet; try to link
                // in right behind it.
                at = witness;
                continue;
            }
            // `at` was evicted, or the chain already grew past the witness;
            // restart from the current tail.
            head = self.tail.load(Acquire);
            if head.is_null() {
                if weak::cas::<_, Acq>(&self.busy, false, true) {
                    return Entry::Barged;
                }
                head = self.install_first(node);
                if head.is_null() {
                    return Entry::Head;
                }
            }
            at = head;
        }
        // Publish `node` as the tail. The expected value is the last tail
        // this thread *observed*, not the node it linked behind: a racer
        // that linked ahead of us bails out of its own fixup as soon as it
        // sees a successor on its node, leaving the chase to us.
        let mut expected = head;
        loop {
            let witness = weak::xchg::<_, Rel>(&self.tail, expected, node);
            if witness == expected {
                break;
            }
            // SAFETY: `node` is ours and still alive.
            if !unsafe { &(*node).next }.load(Relaxed).is_null() {
                break;
            }
            expected = witness;
        }
        Entry::Queued
    }

    /// Installs `node` as the first queue entry if the queue is empty.
    ///
    /// On success the caller is the sole queue participant, `top` is set,
    /// and null is returned. Otherwise returns the observed tail.
    fn install_first(&self, node: *mut Waiter) -> *mut Waiter {
        let witness = weak::xchg::<_, Rel>(&self.tail, ptr::null_mut(), node);
        if witness.is_null() {
            self.top.store(node, Relaxed);
        }
        witness
    }

    /// Evicts this thread's node from the queue front and pre-wakes the
    /// successor, if any.
    ///
    /// Runs right after the flag was claimed and *before* the critical
    /// section: the incoming holder pays for queue maintenance so the
    /// outgoing holder's release collapses to one store. The woken
    /// successor spins on the flag while this thread's critical section is
    /// still running.
    ///
    /// # Safety
    ///
    /// The calling thread must hold the lock, `node` must be its own queue
    /// entry, currently at the front, and the pin must be held.
    unsafe fn drain(&self, node: *mut Waiter, pin: &reclaim::Guard) {
        let first = self.top.load(Relaxed);
        debug_assert_eq!(first, node, "drain must start at the caller's own node");
        // SAFETY: `first` is the caller's own allocation.
        let first_ref = unsafe { &*first };
        let expected = first_ref.next.load(Acquire);
        let mut next = weak::xchg::<_, Acq>(&first_ref.next, expected, removed());
        if next != expected {
            // A successor linked itself in between the load and the
            // exchange; the witness is that successor. Still tombstone the
            // slot so stale-tail enqueuers see the eviction, and order the
            // store before the promotion below.
            first_ref.next.store(removed(), Relaxed);
            fence(Release);
        } else if next.is_null() {
            if weak::cas::<_, Acq>(&self.tail, first, ptr::null_mut()) {
                // Drained the whole queue. `top` may already point at a
                // newly installed first entry, hence an exchange rather
                // than a store.
                weak::cas::<_, Plain>(&self.top, first, ptr::null_mut());
                // SAFETY: evicted and unreachable from the queue; stale
                // referents are protected by their pins.
                unsafe { reclaim::retire(pin, first) };
                return;
            }
            // The failed exchange synchronizes with the racer's tail
            // update, which happens only after it linked in behind us, so
            // the re-read cannot miss the successor.
            next = first_ref.next.load(Acquire);
            debug_assert!(!next.is_null());
        }
        self.top.store(next, Relaxed);
        // SAFETY: a promoted successor is alive at least until its own
        // drain, which cannot start before this thread releases the flag.
        unsafe { &(*next).parker }.unpark_release();
        // SAFETY: evicted and unreachable from the queue; stale referents
        // are protected by their pins.
        unsafe { reclaim::retire(pin, first) };
    }
}

impl<T: ?Sized, R> Mutex<T, R> {
    /// Attempts to acquire this mutex without blocking the thread.
    ///
    /// A single fast-path attempt: succeeds exactly when the flag was free
    /// at that instant, regardless of how many threads are queued. Never
    /// enqueues, never allocates.
    #[must_use]
    #[inline]
    pub fn try_lock(&self) -> Option<MutexGuard<'_, T, R>> {
        weak::cas::<_, Acq>(&self.busy, false, true).then(|| MutexGuard::new(self))
    }

    /// Attempts to acquire this mutex and then runs the closure against the
    /// guard, if any.
    ///
    /// # Examples
    ///
    /// ```
    /// use bargelock::mcs::spins::Mutex;
    ///
    /// let mutex = Mutex::new(0);
    /// let locked = mutex.try_lock_then(|guard| guard.is_some());
    /// assert!(locked);
    /// ```
    #[inline]
    pub fn try_lock_then<F, Ret>(&self, f: F) -> Ret
    where
        F: FnOnce(Option<MutexGuard<'_, T, R>>) -> Ret,
    {
        f(self.try_lock())
    }

    /// Returns `true` if the lock is currently held.
    ///
    /// This function does not guarantee strong ordering, only atomicity.
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.busy.load(Relaxed)
    }

    /// Releases the lock.
    ///
    /// One release store. The queue was already maintained by this holder
    /// on its way in.
    fn unlock(&self) {
        self.busy.store(false, Release);
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

impl<T: ?Sized + Default, R> Default for Mutex<T, R> {
    /// Creates a `Mutex<T, R>`, with the `Default` value for `T`.
    fn default() -> Self {
        Self::new(Default::default())
    }
}

impl<T, R> From<T> for Mutex<T, R> {
    /// Creates a `Mutex<T, R>` from an instance of `T`.
    fn from(data: T) -> Self {
        Self::new(data)
    }
}

impl<T: ?Sized + Debug, R> Debug for Mutex<T, R> {
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
/// This structure is returned by the [`lock`] and [`try_lock`] methods on
/// [`Mutex`], and is given as the closure argument of [`lock_then`] and
/// [`try_lock_then`].
///
/// [`Deref`]: core::ops::Deref
/// [`DerefMut`]: core::ops::DerefMut
/// [`lock`]: Mutex::lock
/// [`try_lock`]: Mutex::try_lock
/// [`lock_then`]: Mutex::lock_then
/// [`try_lock_then`]: Mutex::try_lock_then
#[must_use = "if unused the Mutex will immediately unlock"]
pub struct MutexGuard<'a, T: ?Sized, R> {
    lock: &'a Mutex<T, R>,
}

// SAFETY: A `MutexGuard` is safe to be sent across thread boundaries as long
// as the referenced protected data `T` is also safe to be sent. Note that
// `std::sync::MutexGuard` is `!Send` only for Pthreads compatibility; this
// lock has no such constraint.
unsafe impl<T: ?Sized + Send, R> Send for MutexGuard<'_, T, R> {}
// SAFETY: A `MutexGuard` is safe to be shared across thread boundaries since
// it owns exclusive access to the data for its whole lifetime.
unsafe impl<T: ?Sized + Sync, R> Sync for MutexGuard<'_, T, R> {}

impl<'a, T: ?Sized, R> MutexGuard<'a, T, R> {
    const fn new(lock: &'a Mutex<T, R>) -> Self {
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

impl<T: ?Sized + Debug, R> Debug for MutexGuard<'_, T, R> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.with(|data| data.fmt(f))
    }
}

impl<T: ?Sized + Display, R> Display for MutexGuard<'_, T, R> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.with(|data| data.fmt(f))
    }
}

#[cfg(not(all(loom, test)))]
impl<T: ?Sized, R> core::ops::Deref for MutexGuard<'_, T, R> {
    type Target = T;

    /// Dereferences the guard to access the underlying data.
    #[inline(always)]
    fn deref(&self) -> &T {
        // SAFETY: A guard instance holds the lock locked.
        unsafe { &*self.lock.data.get() }
    }
}

#[cfg(not(all(loom, test)))]
impl<T: ?Sized, R> core::ops::DerefMut for MutexGuard<'_, T, R> {
    /// Mutably dereferences the guard to access the underlying data.
    #[inline(always)]
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: A guard instance holds the lock locked.
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T: ?Sized, R> Drop for MutexGuard<'_, T, R> {
    #[inline]
    fn drop(&mut self) {
        self.lock.unlock();
    }
}

#[cfg(all(feature = "lock_api", not(loom)))]
// SAFETY: This `Mutex` implementation guarantees serialized access and
// modification of the protected data in a concurrent, multithreaded context.
unsafe impl<R: Relax> lock_api::RawMutex for Mutex<(), R> {
    type GuardMarker = lock_api::GuardSend;

    #[allow(clippy::declare_interior_mutable_const)]
    const INIT: Self = Self::new(());

    #[inline]
    fn lock(&self) {
        core::mem::forget(Self::lock(self));
    }

    #[inline]
    fn try_lock(&self) -> bool {
        Self::try_lock(self).map(core::mem::forget).is_some()
    }

    #[inline]
    unsafe fn unlock(&self) {
        self.unlock();
    }

    #[inline]
    fn is_locked(&self) -> bool {
        self.is_locked()
    }
}

#[cfg(all(loom, test))]
// SAFETY: A guard instance holds the lock locked, with exclusive access to
// the underlying data.
unsafe impl<T: ?Sized, R> crate::loom::Guard for MutexGuard<'_, T, R> {
    type Target = T;

    fn get(&self) -> &UnsafeCell<Self::Target> {
        &self.lock.data
    }
}

#[cfg(test)]
impl<T: ?Sized, R: Relax> crate::test::LockNew for Mutex<T, R> {
    type Target = T;

    fn new(value: Self::Target) -> Self
    where
        Self::Target: Sized,
    {
        Self::new(value)
    }
}

#[cfg(test)]
impl<T: ?Sized, R: Relax> crate::test::LockThen for Mutex<T, R> {
    type Guard<'a>
        = MutexGuard<'a, T, R>
    where
        Self: 'a,
        Self::Target: 'a;

    fn lock_then<F, Ret>(&self, f: F) -> Ret
    where
        F: FnOnce(MutexGuard<'_, T, R>) -> Ret,
    {
        self.lock_then(f)
    }
}

#[cfg(test)]
impl<T: ?Sized, R: Relax> crate::test::TryLockThen for Mutex<T, R> {
    fn try_lock_then<F, Ret>(&self, f: F) -> Ret
    where
        F: FnOnce(Option<MutexGuard<'_, T, R>>) -> Ret,
    {
        self.try_lock_then(f)
    }

    fn is_locked(&self) -> bool {
        self.is_locked()
    }
}

#[cfg(all(not(loom), test))]
impl<T: ?Sized, R: Relax> crate::test::LockData for Mutex<T, R> {
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
    use core::ptr;
    use core::sync::atomic::Ordering::Relaxed;
    use std::sync::Arc;
    use std::thread;

    use crate::relax::Yield;
    use crate::test::tests;

    type Mutex<T> = super::Mutex<T, Yield>;

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
    fn uncontended_lock_skips_the_queue() {
        let mutex = Mutex::new(0);
        let guard = mutex.lock();
        assert!(mutex.tail.load(Relaxed).is_null());
        assert!(mutex.top.load(Relaxed).is_null());
        assert!(mutex.is_locked());
        drop(guard);
        assert!(!mutex.is_locked());
    }

    #[test]
    fn release_restores_initial_state() {
        let mutex = Mutex::new(0);
        for _ in 0..1000 {
            drop(mutex.lock());
            assert!(!mutex.is_locked());
            assert_eq!(ptr::null_mut(), mutex.tail.load(Relaxed));
            assert_eq!(ptr::null_mut(), mutex.top.load(Relaxed));
        }
    }

    #[test]
    fn contended_queue_settles() {
        const THREADS: usize = 8;
        const ITERS: usize = 1000;

        let mutex = Arc::new(Mutex::new(0_usize));
        let handles: Vec<_> = (0..THREADS)
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
        assert_eq!(THREADS * ITERS, *mutex.lock());
        assert_eq!(ptr::null_mut(), mutex.tail.load(Relaxed));
        assert_eq!(ptr::null_mut(), mutex.top.load(Relaxed));
    }

    #[test]
    fn try_lock_fails_while_held() {
        let mutex = Mutex::new(());
        let guard = mutex.lock();
        assert!(mutex.try_lock().is_none());
        drop(guard);
        assert!(mutex.try_lock().is_some());
    }
}

#[cfg(all(loom, test))]
mod model {
    use crate::loom::models;
    use crate::relax::Yield;

    type Mutex<T> = super::Mutex<T, Yield>;

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
