//! Internal locking.
//!
//! `RawLock` captures the bare acquire/release protocol; `Lock` couples one
//! with the data it guards. Every critical section in this crate is short
//! and runs to completion: a lock is never held across a park, and waiters
//! removed inside one are readied only after the guard drops.

use core::cell::UnsafeCell;
use core::hint::spin_loop;
use core::intrinsics::likely;
use core::ops::{Deref, DerefMut};

use crate::init::ConstInit;

/// Bare mutual-exclusion protocol.
///
/// # Safety
/// `lock` must block until the lock is free and provide acquire ordering;
/// `unlock` must provide release ordering.
pub unsafe trait RawLock {
    fn lock(&self);

    /// # Safety
    /// Only the current holder may release the lock.
    unsafe fn unlock(&self);
}

/// Locks that can fail fast instead of waiting.
pub unsafe trait RawTryLock: RawLock {
    fn try_lock(&self) -> bool;

    fn try_lock_tries(&self, tries: usize) -> bool {
        for _ in 0..tries {
            if likely(self.try_lock()) {
                return true;
            }
            spin_loop();
        }
        false
    }
}

/// Data guarded by a raw lock; accessible only through the RAII guard.
pub struct Lock<L: RawLock, T: ?Sized> {
    lock: L,
    value: UnsafeCell<T>,
}

unsafe impl<L: RawLock + Send, T: Send + ?Sized> Send for Lock<L, T> {}
unsafe impl<L: RawLock + Sync, T: Send + ?Sized> Sync for Lock<L, T> {}

impl<L: RawLock, T> Lock<L, T> {
    pub const fn new(value: T) -> Self
    where
        L: ConstInit,
    {
        Self {
            lock: L::INIT,
            value: UnsafeCell::new(value),
        }
    }
}

impl<L: RawLock, T: ?Sized> Lock<L, T> {
    /// Wait for the lock and enter the critical section.
    #[must_use = "the critical section ends when the guard drops"]
    pub fn lock(&self) -> LockGuard<'_, L, T> {
        self.lock.lock();
        LockGuard { lock: self }
    }

    /// Enter the critical section only if the lock is free right now.
    pub fn try_lock(&self) -> Option<LockGuard<'_, L, T>>
    where
        L: RawTryLock,
    {
        self.lock.try_lock().then(|| LockGuard { lock: self })
    }

    /// Access without locking; the exclusive borrow is the exclusion.
    pub fn get_mut(&mut self) -> &mut T {
        unsafe { &mut *self.value.get() }
    }
}

/// Holds the lock until dropped.
pub struct LockGuard<'a, L: RawLock, T: ?Sized> {
    lock: &'a Lock<L, T>,
}

impl<L: RawLock, T: ?Sized> !Send for LockGuard<'_, L, T> {}
unsafe impl<L: RawLock + Sync, T: ?Sized + Sync> Sync for LockGuard<'_, L, T> {}

impl<L: RawLock, T: ?Sized> Drop for LockGuard<'_, L, T> {
    fn drop(&mut self) {
        unsafe { self.lock.lock.unlock() }
    }
}

impl<L: RawLock, T: ?Sized> Deref for LockGuard<'_, L, T> {
    type Target = T;
    fn deref(&self) -> &Self::Target {
        unsafe { &*self.lock.value.get() }
    }
}

impl<L: RawLock, T: ?Sized> DerefMut for LockGuard<'_, L, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        unsafe { &mut *self.lock.value.get() }
    }
}
