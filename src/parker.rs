//! The bridge between queue waiters and the OS thread sleeping facilities.
//!
//! A [`Parker`] is a one-word rendezvous between a waiter and the one thread
//! that will eventually release it. The waiter loops on [`park_loop_relaxed`]
//! until its predecessor runs [`unpark_release`]; a wake-up that arrives
//! before the waiter ever blocks is kept as a permit and consumed by the
//! next park attempt, so the pair is insensitive to signal/sleep races.
//! Spurious OS wake-ups are re-checked and absorbed by the loop.
//!
//! [`park_loop_relaxed`]: Parker::park_loop_relaxed
//! [`unpark_release`]: Parker::unpark_release

#[cfg(not(all(loom, test)))]
pub(crate) use common::Parker;

#[cfg(all(loom, test))]
pub(crate) use model::Parker;

#[cfg(not(all(loom, test)))]
mod common {
    use core::ptr;
    use core::sync::atomic::AtomicU32;
    use core::sync::atomic::Ordering::{Relaxed, Release};

    use atomic_wait::{wait, wake_one};

    /// A single-use, futex backed parking slot.
    #[derive(Debug)]
    pub struct Parker {
        state: AtomicU32,
    }

    const PARKED: u32 = 1;
    const UNPARKED: u32 = 0;

    impl Parker {
        /// Creates a parker whose owner is considered parked until released.
        pub const fn parked() -> Self {
            let state = AtomicU32::new(PARKED);
            Self { state }
        }

        /// Blocks the current thread until some other thread releases it.
        ///
        /// Returns immediately if the release already happened. The opaque
        /// re-check protects against spurious wake-ups; the pairing acquire
        /// edge is provided by the caller's subsequent lock acquisition.
        pub fn park_loop_relaxed(&self) {
            while self.state.load(Relaxed) == PARKED {
                wait(&self.state, PARKED);
            }
        }

        /// Releases the parked owner, or grants a permit if it has not
        /// parked yet.
        ///
        /// The cleared state is published before the wake so the owner
        /// cannot observe the old value and go back to sleep.
        pub fn unpark_release(&self) {
            let state = &self.state;
            let ptr = ptr::addr_of!(*state);
            state.store(UNPARKED, Release);
            wake_one(ptr);
        }
    }
}

#[cfg(all(loom, test))]
mod model {
    use core::sync::atomic::Ordering::{Relaxed, Release};

    use loom::sync::atomic::AtomicBool;
    use loom::thread;

    /// A Loom stand-in that spins with yields instead of sleeping, since
    /// Loom has no futex model.
    #[derive(Debug)]
    pub struct Parker {
        parked: AtomicBool,
    }

    impl Parker {
        pub fn parked() -> Self {
            let parked = AtomicBool::new(true);
            Self { parked }
        }

        pub fn park_loop_relaxed(&self) {
            while self.parked.load(Relaxed) {
                thread::yield_now();
            }
        }

        pub fn unpark_release(&self) {
            self.parked.store(false, Release);
            thread::yield_now();
        }
    }
}

#[cfg(all(not(loom), test))]
mod test {
    use std::sync::Arc;
    use std::thread;

    use super::Parker;

    #[test]
    fn permit_prevents_sleep() {
        let parker = Parker::parked();
        parker.unpark_release();
        parker.park_loop_relaxed();
    }

    #[test]
    fn wakes_blocked_thread() {
        let parker = Arc::new(Parker::parked());
        let waiter = thread::spawn({
            let parker = Arc::clone(&parker);
            move || parker.park_loop_relaxed()
        });
        parker.unpark_release();
        waiter.join().unwrap();
    }
}
