#[cfg(not(loom))]
pub use core::ops::DerefMut as Guard;

#[cfg(loom)]
pub use crate::loom::Guard;

/// A lock type that can be created around a value.
pub trait LockNew {
    /// The type of the protected data.
    type Target: ?Sized;

    /// Creates a new mutex in an unlocked state ready for use.
    fn new(value: Self::Target) -> Self
    where
        Self::Target: Sized;
}

/// A lock type that can run a closure against its guard.
pub trait LockThen: LockNew {
    /// The guard type that holds exclusive access to the underlying data.
    type Guard<'a>: Guard<Target = Self::Target>
    where
        Self: 'a,
        Self::Target: 'a;

    /// Acquires the mutex and then runs the closure against its guard.
    fn lock_then<F, Ret>(&self, f: F) -> Ret
    where
        F: FnOnce(Self::Guard<'_>) -> Ret;
}

/// A lock type that can attempt to run a closure against its guard.
pub trait TryLockThen: LockThen {
    /// Attempts to acquire the mutex and runs the closure against its guard,
    /// if any.
    fn try_lock_then<F, Ret>(&self, f: F) -> Ret
    where
        F: FnOnce(Option<Self::Guard<'_>>) -> Ret;

    /// Returns `true` if the lock is currently held.
    fn is_locked(&self) -> bool;
}

/// A lock type that gives access to the underlying data outside the lock.
pub trait LockData: LockNew {
    /// Consumes the mutex, returning the underlying data.
    fn into_inner(self) -> Self::Target
    where
        Self::Target: Sized;

    /// Returns a mutable reference to the underlying data.
    fn get_mut(&mut self) -> &mut Self::Target;
}

#[cfg(not(loom))]
pub mod tests {
    // Test suite derived from the Rust standard library's Mutex tests, with
    // modifications for this crate's locking interfaces and some additions.
    //
    // Copyright 2014 The Rust Project Developers.
    //
    // Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
    // http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
    // <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
    // option. This file may not be copied, modified, or distributed
    // except according to those terms.

    use core::fmt::{Debug, Display};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc::channel;
    use std::sync::Arc;
    use std::thread;

    use super::{LockData, LockThen, TryLockThen};

    type Int = u32;

    #[derive(Eq, PartialEq, Debug)]
    pub struct NonCopy(Int);

    pub fn smoke<L>()
    where
        L: LockThen<Target = Int>,
    {
        let mutex = L::new(1);
        mutex.lock_then(|guard| drop(guard));
        mutex.lock_then(|guard| drop(guard));
    }

    pub fn lots_and_lots_lock<L>()
    where
        L: LockThen<Target = Int> + Send + Sync + 'static,
    {
        const ITERS: u32 = 1000;
        const CONCURRENCY: u32 = 3;

        fn inc<L: LockThen<Target = Int>>(data: &Arc<L>) {
            for _ in 0..ITERS {
                data.lock_then(|mut guard| *guard += 1);
            }
        }

        let data = Arc::new(L::new(0));
        let (tx, rx) = channel();
        for _ in 0..CONCURRENCY {
            let data1 = Arc::clone(&data);
            let tx2 = tx.clone();
            thread::spawn(move || {
                inc(&data1);
                tx2.send(()).unwrap();
            });
            let data2 = Arc::clone(&data);
            let tx2 = tx.clone();
            thread::spawn(move || {
                inc(&data2);
                tx2.send(()).unwrap();
            });
        }

        drop(tx);
        for _ in 0..2 * CONCURRENCY {
            rx.recv().unwrap();
        }
        let value = data.lock_then(|guard| *guard);
        assert_eq!(value, ITERS * CONCURRENCY * 2);
    }

    pub fn lots_and_lots_try_lock<L>()
    where
        L: TryLockThen<Target = Int> + Send + Sync + 'static,
    {
        const ITERS: u32 = 1000;
        const CONCURRENCY: u32 = 3;

        fn try_inc<L: TryLockThen<Target = Int>>(data: &Arc<L>) {
            for _ in 0..ITERS {
                loop {
                    let incremented = data.try_lock_then(|guard| match guard {
                        Some(mut guard) => {
                            *guard += 1;
                            true
                        }
                        None => false,
                    });
                    if incremented {
                        break;
                    }
                }
            }
        }

        let data = Arc::new(L::new(0));
        let (tx, rx) = channel();
        for _ in 0..CONCURRENCY {
            let data1 = Arc::clone(&data);
            let tx2 = tx.clone();
            thread::spawn(move || {
                try_inc(&data1);
                tx2.send(()).unwrap();
            });
            let data2 = Arc::clone(&data);
            let tx2 = tx.clone();
            thread::spawn(move || {
                try_inc(&data2);
                tx2.send(()).unwrap();
            });
        }

        drop(tx);
        for _ in 0..2 * CONCURRENCY {
            rx.recv().unwrap();
        }
        let value = data.lock_then(|guard| *guard);
        assert_eq!(value, ITERS * CONCURRENCY * 2);
    }

    pub fn lots_and_lots_mixed_lock<L>()
    where
        L: TryLockThen<Target = Int> + Send + Sync + 'static,
    {
        const ITERS: u32 = 1000;
        const CONCURRENCY: u32 = 3;

        fn mixed_inc<L: TryLockThen<Target = Int>>(data: &Arc<L>) {
            for iter in 0..ITERS {
                if iter % 2 == 0 {
                    data.lock_then(|mut guard| *guard += 1);
                    continue;
                }
                loop {
                    let incremented = data.try_lock_then(|guard| match guard {
                        Some(mut guard) => {
                            *guard += 1;
                            true
                        }
                        None => false,
                    });
                    if incremented {
                        break;
                    }
                }
            }
        }

        let data = Arc::new(L::new(0));
        let (tx, rx) = channel();
        for _ in 0..CONCURRENCY {
            let data1 = Arc::clone(&data);
            let tx2 = tx.clone();
            thread::spawn(move || {
                mixed_inc(&data1);
                tx2.send(()).unwrap();
            });
            let data2 = Arc::clone(&data);
            let tx2 = tx.clone();
            thread::spawn(move || {
                mixed_inc(&data2);
                tx2.send(()).unwrap();
            });
        }

        drop(tx);
        for _ in 0..2 * CONCURRENCY {
            rx.recv().unwrap();
        }
        let value = data.lock_then(|guard| *guard);
        assert_eq!(value, ITERS * CONCURRENCY * 2);
    }

    pub fn test_guard_debug_display<L>()
    where
        L: LockThen<Target = Int> + 'static,
        for<'a> L::Guard<'a>: Debug + Display,
    {
        let mutex = L::new(42);
        mutex.lock_then(|guard| {
            assert_eq!("42", format!("{guard:?}"));
            assert_eq!("42", format!("{guard}"));
        });
    }

    pub fn test_mutex_debug<L>()
    where
        L: TryLockThen<Target = Int> + Debug + 'static,
    {
        let mutex = L::new(42);
        assert!(format!("{mutex:?}").contains("42"));
        mutex.lock_then(|_guard| {
            assert!(format!("{mutex:?}").contains("locked"));
        });
    }

    pub fn test_mutex_from<L>()
    where
        L: LockThen<Target = Int> + From<Int>,
    {
        let mutex = L::from(42);
        let value = mutex.lock_then(|guard| *guard);
        assert_eq!(value, 42);
    }

    pub fn test_mutex_default<L>()
    where
        L: LockThen<Target = Int> + Default,
    {
        let mutex = L::default();
        let value = mutex.lock_then(|guard| *guard);
        assert_eq!(value, Int::default());
    }

    pub fn test_try_lock<L>()
    where
        L: TryLockThen<Target = ()>,
    {
        let mutex = L::new(());
        let locked = mutex.try_lock_then(|guard| guard.is_some());
        assert!(locked);
        assert!(!mutex.is_locked());
    }

    pub fn test_into_inner<L>()
    where
        L: LockData<Target = NonCopy>,
    {
        let mutex = L::new(NonCopy(10));
        assert_eq!(mutex.into_inner(), NonCopy(10));
    }

    pub fn test_into_inner_drop<L>()
    where
        L: LockData<Target = Foo>,
    {
        let num_drops = Arc::new(AtomicUsize::new(0));
        let mutex = L::new(Foo(Arc::clone(&num_drops)));
        assert_eq!(num_drops.load(Ordering::SeqCst), 0);
        {
            let _inner = mutex.into_inner();
            assert_eq!(num_drops.load(Ordering::SeqCst), 0);
        }
        assert_eq!(num_drops.load(Ordering::SeqCst), 1);
    }

    pub struct Foo(Arc<AtomicUsize>);

    impl Drop for Foo {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub fn test_get_mut<L>()
    where
        L: LockData<Target = NonCopy>,
    {
        let mut mutex = L::new(NonCopy(10));
        *mutex.get_mut() = NonCopy(20);
        assert_eq!(mutex.into_inner(), NonCopy(20));
    }

    pub fn test_lock_arc_nested<L1, L2>()
    where
        L1: LockThen<Target = Int>,
        L2: LockThen<Target = Arc<L1>> + Send + Sync + 'static,
    {
        // Tests nested locks and access to underlying data.
        let arc = Arc::new(L1::new(1));
        let arc2 = Arc::new(L2::new(arc));
        let (tx, rx) = channel();
        let _t = thread::spawn(move || {
            let val = arc2.lock_then(|arc2| arc2.lock_then(|guard| *guard));
            assert_eq!(val, 1);
            tx.send(()).unwrap();
        });
        rx.recv().unwrap();
    }

    pub fn test_acquire_more_than_one_lock<L>()
    where
        L: LockThen<Target = Int> + Send + Sync + 'static,
    {
        let arc = Arc::new(L::new(1));
        let (tx, rx) = channel();
        for _ in 0..4 {
            let tx2 = tx.clone();
            let c_arc = Arc::clone(&arc);
            let _t = thread::spawn(move || {
                c_arc.lock_then(|_guard| {
                    let mutex = L::new(1);
                    mutex.lock_then(|_guard| ());
                });
                tx2.send(()).unwrap();
            });
        }
        drop(tx);
        rx.recv().unwrap();
    }

    pub fn test_lock_arc_access_in_unwind<L>()
    where
        L: LockThen<Target = Int> + Send + Sync + 'static,
    {
        let arc = Arc::new(L::new(1));
        let arc2 = arc.clone();
        let _ = thread::spawn(move || {
            struct Unwinder<T: LockThen<Target = Int>> {
                i: Arc<T>,
            }
            impl<T: LockThen<Target = Int>> Drop for Unwinder<T> {
                fn drop(&mut self) {
                    self.i.lock_then(|mut guard| *guard += 1);
                }
            }
            let _u = Unwinder { i: arc2 };
            panic!();
        })
        .join();
        let value = arc.lock_then(|guard| *guard);
        assert_eq!(value, 2);
    }

    pub fn test_lock_unsized<L>()
    where
        L: LockThen<Target = [Int; 3]>,
    {
        let lock = L::new([1, 2, 3]);
        lock.lock_then(|mut guard| {
            guard[0] = 4;
            guard[2] = 5;
        });
        let comp = [4, 2, 5];
        lock.lock_then(|guard| assert_eq!(*guard, comp));
    }
}
