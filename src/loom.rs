use crate::cfg::cell::UnsafeCell;

/// A trait for guard types pointing to data backed by Loom's `UnsafeCell`.
///
/// # Safety
///
/// Implementors must guarantee that an instance of the guard holds exclusive
/// access to its underlying data through all its lifetime.
pub(crate) unsafe trait Guard {
    /// The type of the protected data.
    type Target: ?Sized;

    /// Returns the cell storing the protected data.
    fn get(&self) -> &UnsafeCell<Self::Target>;
}

pub(crate) mod models {
    use loom::sync::Arc;
    use loom::{model, thread};

    use super::Guard;
    use crate::test::{LockNew, LockThen, TryLockThen};

    fn incr<L: LockThen<Target = i32>>(lock: &Arc<L>) {
        lock.lock_then(|guard| {
            // SAFETY: the guard holds the lock for the whole closure.
            guard.get().with_mut(|ptr| unsafe { *ptr += 1 });
        });
    }

    fn try_incr<L: TryLockThen<Target = i32>>(lock: &Arc<L>) -> bool {
        lock.try_lock_then(|guard| match guard {
            // SAFETY: the guard holds the lock for the whole closure.
            Some(guard) => {
                guard.get().with_mut(|ptr| unsafe { *ptr += 1 });
                true
            }
            None => false,
        })
    }

    fn read<L: LockThen<Target = i32>>(lock: &Arc<L>) -> i32 {
        // SAFETY: the guard holds the lock for the whole closure.
        lock.lock_then(|guard| guard.get().with(|ptr| unsafe { *ptr }))
    }

    /// Two threads lock and increment; the final value must count both.
    pub fn lock_join<L>()
    where
        L: LockNew<Target = i32> + LockThen<Target = i32> + Send + Sync + 'static,
    {
        model(|| {
            let data = Arc::new(L::new(0));
            let runs = 2;
            let handles: Vec<_> = (0..runs)
                .map(|_| Arc::clone(&data))
                .map(|data| thread::spawn(move || incr(&data)))
                .collect();
            for handle in handles {
                handle.join().unwrap();
            }
            assert_eq!(runs, read(&data));
        });
    }

    /// Two threads try-lock and increment; the final value must count the
    /// successful attempts exactly.
    pub fn try_lock_join<L>()
    where
        L: TryLockThen<Target = i32> + Send + Sync + 'static,
    {
        model(|| {
            let data = Arc::new(L::new(0));
            let handles: Vec<_> = (0..2)
                .map(|_| Arc::clone(&data))
                .map(|data| thread::spawn(move || try_incr(&data)))
                .collect();
            let mut hits = 0;
            for handle in handles {
                if handle.join().unwrap() {
                    hits += 1;
                }
            }
            assert!(hits >= 1);
            assert_eq!(hits, read(&data));
        });
    }

    /// One thread locks while the other try-locks; the increment of the
    /// blocking path must never be lost.
    pub fn mixed_lock_join<L>()
    where
        L: TryLockThen<Target = i32> + Send + Sync + 'static,
    {
        model(|| {
            let data = Arc::new(L::new(0));
            let locker = {
                let data = Arc::clone(&data);
                thread::spawn(move || incr(&data))
            };
            let tryer = {
                let data = Arc::clone(&data);
                thread::spawn(move || try_incr(&data))
            };
            locker.join().unwrap();
            let hit = tryer.join().unwrap();
            assert_eq!(1 + i32::from(hit), read(&data));
        });
    }
}
