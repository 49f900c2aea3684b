pub mod atomic {
    #[cfg(not(all(loom, test)))]
    pub use core::sync::atomic::{fence, AtomicBool, AtomicPtr, AtomicU32};

    #[cfg(all(loom, test))]
    pub use loom::sync::atomic::{fence, AtomicBool, AtomicPtr, AtomicU32};
}

pub mod cell {
    pub use sealed::WithUnchecked;

    #[cfg(not(all(loom, test)))]
    pub use core::cell::UnsafeCell;

    #[cfg(all(loom, test))]
    pub use loom::cell::UnsafeCell;

    #[cfg(not(all(loom, test)))]
    impl<T: ?Sized> WithUnchecked for UnsafeCell<T> {
        type Target = T;

        unsafe fn with_unchecked<F, Ret>(&self, f: F) -> Ret
        where
            F: FnOnce(&Self::Target) -> Ret,
        {
            // SAFETY: Caller must guarantee there are no mutable aliases.
            f(unsafe { &*self.get() })
        }

        unsafe fn with_mut_unchecked<F, Ret>(&self, f: F) -> Ret
        where
            F: FnOnce(&mut Self::Target) -> Ret,
        {
            // SAFETY: Caller must guarantee exclusive access to the data.
            f(unsafe { &mut *self.get() })
        }
    }

    #[cfg(all(loom, test))]
    impl<T: ?Sized> WithUnchecked for UnsafeCell<T> {
        type Target = T;

        unsafe fn with_unchecked<F, Ret>(&self, f: F) -> Ret
        where
            F: FnOnce(&Self::Target) -> Ret,
        {
            // SAFETY: Caller must guarantee there are no mutable aliases.
            self.with(|ptr| f(unsafe { &*ptr }))
        }

        unsafe fn with_mut_unchecked<F, Ret>(&self, f: F) -> Ret
        where
            F: FnOnce(&mut Self::Target) -> Ret,
        {
            // SAFETY: Caller must guarantee exclusive access to the data.
            self.with_mut(|ptr| f(unsafe { &mut *ptr }))
        }
    }

    mod sealed {
        /// A trait that extends [`UnsafeCell`] to allow running closures
        /// against its underlying data.
        ///
        /// [`UnsafeCell`]: super::UnsafeCell
        pub trait WithUnchecked {
            /// The type of the underlying data.
            type Target: ?Sized;

            /// Runs `f` against a shared reference borrowed from the cell.
            ///
            /// # Safety
            ///
            /// Caller must guarantee there are no mutable aliases to the
            /// underlying data.
            unsafe fn with_unchecked<F, Ret>(&self, f: F) -> Ret
            where
                F: FnOnce(&Self::Target) -> Ret;

            /// Runs `f` against a mutable reference borrowed from the cell.
            ///
            /// # Safety
            ///
            /// Caller must guarantee it has exclusive access to the
            /// underlying data.
            unsafe fn with_mut_unchecked<F, Ret>(&self, f: F) -> Ret
            where
                F: FnOnce(&mut Self::Target) -> Ret;
        }
    }
}

pub mod hint {
    #[cfg(not(all(loom, test)))]
    pub use core::hint::spin_loop;

    #[cfg(all(loom, test))]
    pub use loom::hint::spin_loop;
}

pub mod thread {
    #[cfg(not(all(loom, test)))]
    pub use std::thread::yield_now;

    #[cfg(all(loom, test))]
    pub use loom::thread::yield_now;
}

pub mod reclaim {
    #[cfg(not(all(loom, test)))]
    pub use crossbeam_epoch::{pin, Guard};

    /// Schedules the pointed-to allocation for destruction once every thread
    /// pinned at retirement time has dropped its guard.
    ///
    /// # Safety
    ///
    /// `ptr` must have been created by `Box::into_raw` and must not be
    /// retired more than once. Other threads may keep dereferencing it only
    /// for as long as they hold an epoch guard acquired before this call
    /// returns.
    #[cfg(not(all(loom, test)))]
    pub unsafe fn retire<T>(guard: &Guard, ptr: *mut T) {
        // SAFETY: Caller upholds the single-retirement contract above.
        unsafe { guard.defer_destroy(crossbeam_epoch::Shared::from(ptr.cast_const())) }
    }

    /// Loom stand-in for an epoch guard.
    ///
    /// crossbeam-epoch does not run on Loom's atomics, and Loom models are
    /// small and bounded, so retirement degrades to a leak under the model.
    #[cfg(all(loom, test))]
    #[derive(Debug)]
    pub struct Guard(());

    #[cfg(all(loom, test))]
    pub fn pin() -> Guard {
        Guard(())
    }

    #[cfg(all(loom, test))]
    pub unsafe fn retire<T>(_guard: &Guard, _ptr: *mut T) {}
}
