//! Compare-and-set primitives tuned for weakly ordered processors.
//!
//! LL/SC based architectures implement compare-and-set as a load-linked and
//! store-conditional pair, which is allowed to fail spuriously: the store
//! steps back even though the observed value matched the expected one. A
//! naive `while !weak_cas {}` loop papers over that, but it also loses the
//! ability to tell "the expected value is gone" apart from "retry needed",
//! forcing a fresh ordered load on every attempt.
//!
//! The primitives in this module retry a failed weak exchange only while an
//! opaque re-read of the location still matches the expected value, and
//! otherwise report the witness that displaced it:
//!
//! - [`cas`] returns `true` on success, `false` once the location is known
//!   to hold something else;
//! - [`xchg`] returns the expected value on success, the observed witness
//!   otherwise.
//!
//! On strongly ordered processors the whole dance collapses into a single
//! strong `compare_exchange` at the requested ordering. Which flavour runs
//! is decided once per process: by target architecture where the answer is
//! known, or by [`set_weakly_ordered`] for targets this crate has no opinion
//! on. Orderings are selected at compile time through the [`Order`] marker
//! types, so each monomorphized operation is a single instruction sequence
//! with no dispatch table behind it.
//!
//! A failed operation still acts at least as an opaque access. The `Acq`,
//! `Rel` and `Seq` failure cases additionally synchronize with the store
//! that produced the witness, because callers in this crate chase witness
//! pointers through linked queue nodes.

use core::sync::atomic::Ordering;
use core::sync::atomic::Ordering::{Acquire, Relaxed, Release, SeqCst};

use crate::cfg::atomic::{AtomicBool, AtomicPtr, AtomicU32};

#[cfg(not(all(loom, test)))]
use core::fmt;

#[cfg(not(all(loom, test)))]
use once_cell::sync::OnceCell;

/// A compile-time selected memory ordering for [`cas`] and [`xchg`].
///
/// The failure ordering never exceeds the success ordering in cost and is
/// never weaker than an opaque access.
pub trait Order: sealed::Sealed {
    /// Ordering applied when the exchange succeeds.
    const SUCCESS: Ordering;

    /// Ordering applied to the failed read of the location.
    const FAILURE: Ordering;
}

/// No cross-thread ordering beyond per-location atomicity.
pub struct Plain;

/// Acquire ordering on success and on the failed read.
pub struct Acq;

/// Release ordering on success.
///
/// The failed read is an acquire load: a release-published pointer that
/// beat this operation can be followed immediately.
pub struct Rel;

/// Sequentially consistent ordering on success.
pub struct Seq;

impl Order for Plain {
    const SUCCESS: Ordering = Relaxed;
    const FAILURE: Ordering = Relaxed;
}

impl Order for Acq {
    const SUCCESS: Ordering = Acquire;
    const FAILURE: Ordering = Acquire;
}

impl Order for Rel {
    const SUCCESS: Ordering = Release;
    const FAILURE: Ordering = Acquire;
}

impl Order for Seq {
    const SUCCESS: Ordering = SeqCst;
    const FAILURE: Ordering = Acquire;
}

/// An atomic location the shim knows how to drive.
///
/// Implemented for the atomic types this crate's lock protocols are built
/// from. The methods mirror the standard atomic API and exist so [`cas`] and
/// [`xchg`] can be written once, generically.
pub trait Atom: sealed::Sealed {
    /// The plain value stored in the location.
    type Value: Copy + Eq;

    #[doc(hidden)]
    fn load_ordered(&self, order: Ordering) -> Self::Value;

    #[doc(hidden)]
    fn cmpxchg(
        &self,
        expected: Self::Value,
        desired: Self::Value,
        success: Ordering,
        failure: Ordering,
    ) -> Result<Self::Value, Self::Value>;

    #[doc(hidden)]
    fn cmpxchg_weak(
        &self,
        expected: Self::Value,
        desired: Self::Value,
        success: Ordering,
        failure: Ordering,
    ) -> Result<Self::Value, Self::Value>;
}

impl Atom for AtomicBool {
    type Value = bool;

    fn load_ordered(&self, order: Ordering) -> bool {
        self.load(order)
    }

    fn cmpxchg(&self, exp: bool, new: bool, ok: Ordering, err: Ordering) -> Result<bool, bool> {
        self.compare_exchange(exp, new, ok, err)
    }

    fn cmpxchg_weak(&self, exp: bool, new: bool, ok: Ordering, err: Ordering) -> Result<bool, bool> {
        self.compare_exchange_weak(exp, new, ok, err)
    }
}

impl Atom for AtomicU32 {
    type Value = u32;

    fn load_ordered(&self, order: Ordering) -> u32 {
        self.load(order)
    }

    fn cmpxchg(&self, exp: u32, new: u32, ok: Ordering, err: Ordering) -> Result<u32, u32> {
        self.compare_exchange(exp, new, ok, err)
    }

    fn cmpxchg_weak(&self, exp: u32, new: u32, ok: Ordering, err: Ordering) -> Result<u32, u32> {
        self.compare_exchange_weak(exp, new, ok, err)
    }
}

impl<T> Atom for AtomicPtr<T> {
    type Value = *mut T;

    fn load_ordered(&self, order: Ordering) -> *mut T {
        self.load(order)
    }

    fn cmpxchg(
        &self,
        exp: *mut T,
        new: *mut T,
        ok: Ordering,
        err: Ordering,
    ) -> Result<*mut T, *mut T> {
        self.compare_exchange(exp, new, ok, err)
    }

    fn cmpxchg_weak(
        &self,
        exp: *mut T,
        new: *mut T,
        ok: Ordering,
        err: Ordering,
    ) -> Result<*mut T, *mut T> {
        self.compare_exchange_weak(exp, new, ok, err)
    }
}

mod sealed {
    pub trait Sealed {}

    impl Sealed for super::Plain {}
    impl Sealed for super::Acq {}
    impl Sealed for super::Rel {}
    impl Sealed for super::Seq {}

    impl Sealed for crate::cfg::atomic::AtomicBool {}
    impl Sealed for crate::cfg::atomic::AtomicU32 {}
    impl<T> Sealed for crate::cfg::atomic::AtomicPtr<T> {}
}

/// Compares and sets `atom` from `expected` to `desired`, returning whether
/// the exchange took place.
///
/// Never fails spuriously, regardless of the processor's memory model.
#[inline]
pub fn cas<A: Atom, O: Order>(atom: &A, expected: A::Value, desired: A::Value) -> bool {
    xchg::<A, O>(atom, expected, desired) == expected
}

/// Compares and exchanges `atom` from `expected` to `desired`.
///
/// Returns `expected` on success, and otherwise the witness value that was
/// observed in the location. Never fails spuriously, regardless of the
/// processor's memory model.
#[inline]
pub fn xchg<A: Atom, O: Order>(atom: &A, expected: A::Value, desired: A::Value) -> A::Value {
    if weakly_ordered() {
        xchg_weakly::<A, O>(atom, expected, desired)
    } else {
        match atom.cmpxchg(expected, desired, O::SUCCESS, O::FAILURE) {
            Ok(witness) | Err(witness) => witness,
        }
    }
}

/// The weak exchange with the opaque retry loop.
///
/// A spurious failure is retried for as long as an opaque re-read of the
/// location still matches `expected`; a genuine displacement returns the
/// witness without forcing an ordered load per attempt.
fn xchg_weakly<A: Atom, O: Order>(atom: &A, expected: A::Value, desired: A::Value) -> A::Value {
    if atom.cmpxchg_weak(expected, desired, O::SUCCESS, O::FAILURE).is_ok() {
        return expected;
    }
    let mut observed = atom.load_ordered(Relaxed);
    while observed == expected {
        if atom.cmpxchg_weak(expected, desired, O::SUCCESS, O::FAILURE).is_ok() {
            return expected;
        }
        observed = atom.load_ordered(Relaxed);
    }
    observed
}

/// Returns whether this process treats the target as weakly ordered.
///
/// The answer is computed on first use and then frozen for the lifetime of
/// the process. Known strongly ordered targets (x86, x86_64) always answer
/// `false` and known LL/SC targets always answer `true`; anything else
/// defaults to `false` unless [`set_weakly_ordered`] ran first.
#[cfg(not(all(loom, test)))]
#[inline]
pub fn weakly_ordered() -> bool {
    *WEAKLY_ORDERED.get_or_init(infer)
}

/// Loom already models spurious `compare_exchange_weak` failures, so models
/// run the strong paths.
#[cfg(all(loom, test))]
fn weakly_ordered() -> bool {
    false
}

/// Declares whether the target should be treated as weakly ordered.
///
/// Only consulted for architectures this crate does not recognize; known
/// targets keep their inferred answer. Must run before the first lock
/// operation of the process.
///
/// # Errors
///
/// Returns [`AlreadyInferred`] if the flag was already frozen by an earlier
/// lock operation or [`weakly_ordered`] call.
#[cfg(not(all(loom, test)))]
pub fn set_weakly_ordered(weak: bool) -> Result<(), AlreadyInferred> {
    if WEAKLY_ORDERED.get().is_some() {
        return Err(AlreadyInferred(()));
    }
    let _ = OVERRIDE.set(weak);
    Ok(())
}

/// The weak ordering flag was already inferred and frozen.
///
/// Returned by [`set_weakly_ordered`] when some lock has already run; the
/// flag is process-wide and cannot change once any operation consumed it.
#[cfg(not(all(loom, test)))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlreadyInferred(());

#[cfg(not(all(loom, test)))]
impl fmt::Display for AlreadyInferred {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("weak ordering flag was already inferred for this process")
    }
}

#[cfg(not(all(loom, test)))]
impl std::error::Error for AlreadyInferred {}

#[cfg(not(all(loom, test)))]
static WEAKLY_ORDERED: OnceCell<bool> = OnceCell::new();

#[cfg(not(all(loom, test)))]
static OVERRIDE: OnceCell<bool> = OnceCell::new();

#[cfg(not(all(loom, test)))]
fn infer() -> bool {
    if cfg!(any(target_arch = "x86", target_arch = "x86_64")) {
        false
    } else if cfg!(any(
        target_arch = "arm",
        target_arch = "aarch64",
        target_arch = "powerpc",
        target_arch = "powerpc64",
        target_arch = "riscv32",
        target_arch = "riscv64",
        target_arch = "mips",
        target_arch = "mips64",
        target_arch = "sparc",
        target_arch = "sparc64",
        target_arch = "loongarch64",
    )) {
        true
    } else {
        OVERRIDE.get().copied().unwrap_or(false)
    }
}

#[cfg(all(not(loom), test))]
mod test {
    use core::ptr;
    use core::sync::atomic::{AtomicBool, AtomicPtr};

    use super::{cas, weakly_ordered, Acq, Atom, Order, Plain, Rel, Seq};

    fn exchange<A: Atom, O: Order>(
        weak: bool,
        atom: &A,
        expected: A::Value,
        desired: A::Value,
    ) -> A::Value {
        if weak {
            super::xchg_weakly::<A, O>(atom, expected, desired)
        } else {
            match atom.cmpxchg(expected, desired, O::SUCCESS, O::FAILURE) {
                Ok(witness) | Err(witness) => witness,
            }
        }
    }

    fn bool_witnesses(weak: bool) {
        let atom = AtomicBool::new(false);
        assert_eq!(false, exchange::<_, Acq>(weak, &atom, false, true));
        assert_eq!(true, exchange::<_, Acq>(weak, &atom, false, true));
        assert_eq!(true, exchange::<_, Rel>(weak, &atom, true, false));
        assert_eq!(false, exchange::<_, Seq>(weak, &atom, true, false));
    }

    fn ptr_witnesses(weak: bool) {
        let mut slots = [0u8; 2];
        let (a, b) = (ptr::addr_of_mut!(slots[0]), ptr::addr_of_mut!(slots[1]));
        let atom = AtomicPtr::new(ptr::null_mut());
        assert_eq!(ptr::null_mut(), exchange::<_, Rel>(weak, &atom, ptr::null_mut(), a));
        assert_eq!(a, exchange::<_, Plain>(weak, &atom, ptr::null_mut(), b));
        assert_eq!(a, exchange::<_, Acq>(weak, &atom, a, b));
        assert_eq!(b, atom.load(core::sync::atomic::Ordering::Relaxed));
    }

    #[test]
    fn strong_path_witnesses() {
        bool_witnesses(false);
        ptr_witnesses(false);
    }

    #[test]
    fn weak_path_witnesses() {
        bool_witnesses(true);
        ptr_witnesses(true);
    }

    #[test]
    fn cas_reports_success() {
        let atom = AtomicBool::new(false);
        assert!(cas::<_, Acq>(&atom, false, true));
        assert!(!cas::<_, Acq>(&atom, false, true));
        assert!(cas::<_, Rel>(&atom, true, false));
    }

    #[test]
    fn flag_freezes_on_first_use() {
        let first = weakly_ordered();
        assert_eq!(first, weakly_ordered());
        assert_eq!(Err(super::AlreadyInferred(())), super::set_weakly_ordered(!first));
    }
}
