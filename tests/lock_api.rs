#![cfg(feature = "lock_api")]

// Test suite derived from the Rust standard library's Mutex tests, with
// modifications for the lock_api interfaces.
//
// Copyright 2014 The Rust Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::sync::mpsc::channel;
use std::sync::Arc;
use std::thread;

use bargelock::lock_api::yields::Mutex;

#[derive(Eq, PartialEq, Debug)]
struct NonCopy(i32);

#[test]
fn smoke() {
    let mutex = Mutex::new(());
    drop(mutex.lock());
    drop(mutex.lock());
}

#[test]
fn lots_and_lots() {
    static LOCK: Mutex<u32> = Mutex::new(0);

    const ITERS: u32 = 1000;
    const CONCURRENCY: u32 = 3;

    fn inc() {
        for _ in 0..ITERS {
            let mut guard = LOCK.lock();
            *guard += 1;
        }
    }

    let (tx, rx) = channel();
    for _ in 0..CONCURRENCY {
        let tx2 = tx.clone();
        thread::spawn(move || {
            inc();
            tx2.send(()).unwrap();
        });
        let tx2 = tx.clone();
        thread::spawn(move || {
            inc();
            tx2.send(()).unwrap();
        });
    }

    drop(tx);
    for _ in 0..2 * CONCURRENCY {
        rx.recv().unwrap();
    }
    assert_eq!(*LOCK.lock(), ITERS * CONCURRENCY * 2);
}

#[test]
fn try_lock() {
    let mutex = Mutex::new(());
    *mutex.try_lock().unwrap() = ();
    let guard = mutex.lock();
    assert!(mutex.try_lock().is_none());
    drop(guard);
}

#[test]
fn test_into_inner() {
    let mutex = Mutex::new(NonCopy(10));
    assert_eq!(mutex.into_inner(), NonCopy(10));
}

#[test]
fn test_get_mut() {
    let mut mutex = Mutex::new(NonCopy(10));
    *mutex.get_mut() = NonCopy(20);
    assert_eq!(mutex.into_inner(), NonCopy(20));
}

#[test]
fn test_lock_arc_nested() {
    // Tests nested locks and access to underlying data.
    let arc = Arc::new(Mutex::new(1));
    let arc2 = Arc::new(Mutex::new(arc));
    let (tx, rx) = channel();
    let _t = thread::spawn(move || {
        let lock = arc2.lock();
        let lock2 = lock.lock();
        assert_eq!(*lock2, 1);
        tx.send(()).unwrap();
    });
    rx.recv().unwrap();
}

#[test]
fn test_lock_arc_access_in_unwind() {
    let arc = Arc::new(Mutex::new(1));
    let arc2 = arc.clone();
    let _ = thread::spawn(move || {
        struct Unwinder {
            i: Arc<Mutex<i32>>,
        }
        impl Drop for Unwinder {
            fn drop(&mut self) {
                *self.i.lock() += 1;
            }
        }
        let _u = Unwinder { i: arc2 };
        panic!();
    })
    .join();
    let lock = arc.lock();
    assert_eq!(*lock, 2);
}

#[test]
fn test_lock_unsized() {
    let lock: &Mutex<[i32]> = &Mutex::new([1, 2, 3]);
    {
        let b = &mut *lock.lock();
        b[0] = 4;
        b[2] = 5;
    }
    let comp: &[i32] = &[4, 2, 5];
    assert_eq!(&*lock.lock(), comp);
}
