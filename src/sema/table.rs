use core::sync::atomic::{AtomicU32, Ordering};

use intrusive_collections::linked_list::LinkedList;
use intrusive_collections::UnsafeMut;

use super::{Waiter, WaiterAdapter};
use crate::cache::CacheAligned;
use crate::init::ConstInit;
use crate::park::Park;
use crate::sync::Spinlock;

/// Number of buckets in a [`SemaTable`]. Prime, so that caller address
/// strides do not land whole allocations in one bucket.
pub const SEMA_TABLE_SIZE: usize = 251;

struct SemaRoot<P: Park> {
    /// Number of waiters in this bucket. Readable without the lock; written
    /// while holding it.
    nwait: AtomicU32,
    waiters: Spinlock<LinkedList<WaiterAdapter<P>>>,
}

impl<P: Park> ConstInit for SemaRoot<P> {
    const INIT: Self = Self {
        nwait: AtomicU32::new(0),
        waiters: Spinlock::new(LinkedList::new(WaiterAdapter::NEW)),
    };
}

/// Counted semaphore keyed by the address of a caller-owned 32-bit counter.
///
/// The counter itself lives with the caller, which also decrements and
/// increments it on its own fast paths; the table only supplies the
/// sleep/wakeup half. All operations on one counter must go through the same
/// table, and the counter must not move while anyone sleeps on it.
pub struct SemaTable<P: Park> {
    roots: [CacheAligned<SemaRoot<P>>; SEMA_TABLE_SIZE],
}

unsafe impl<P: Park> Send for SemaTable<P> {}
unsafe impl<P: Park> Sync for SemaTable<P> {}

impl<P: Park> ConstInit for SemaTable<P> {
    const INIT: Self = Self {
        roots: ConstInit::INIT,
    };
}

impl<P: Park> SemaTable<P> {
    pub const fn new() -> Self {
        Self::INIT
    }

    fn root_for(&self, addr: usize) -> &SemaRoot<P> {
        &self.roots[(addr >> 3) % SEMA_TABLE_SIZE]
    }

    /// Lock-free decrement attempt; fails only when the counter is 0.
    fn can_acquire(sema: &AtomicU32) -> bool {
        let mut v = sema.load(Ordering::SeqCst);
        while v > 0 {
            match sema.compare_exchange(v, v - 1, Ordering::SeqCst, Ordering::SeqCst) {
                Ok(_) => return true,
                Err(cur) => v = cur,
            }
        }
        false
    }

    /// Decrement the counter at `sema`, parking until a releaser hands over
    /// a slot if it is exhausted.
    pub fn acquire(&self, sema: &AtomicU32, profile: bool) {
        if Self::can_acquire(sema) {
            return;
        }

        let addr = sema.as_ptr() as usize;
        let root = self.root_for(addr);
        let mut waiter = Waiter::new();
        waiter.addr = addr;
        let t0 = waiter.start_profile(profile);
        loop {
            let mut waiters = root.waiters.lock();
            // nwait must be visible before the final counter check below;
            // release increments the counter first and checks nwait second,
            // so at least one side always sees the other.
            root.nwait.fetch_add(1, Ordering::SeqCst);
            if Self::can_acquire(sema) {
                root.nwait.fetch_sub(1, Ordering::SeqCst);
                break;
            }
            waiter.rearm();
            unsafe { waiters.push_back(UnsafeMut::from_raw(&mut waiter)) };
            debug_assert_eq!(
                root.nwait.load(Ordering::SeqCst) as usize,
                waiters.iter().count()
            );
            drop(waiters);
            waiter.block();
            if Self::can_acquire(sema) {
                break;
            }
            // A fast-path acquirer stole the slot between our wakeup and
            // resumption. Queue up again.
        }
        waiter.emit_block_event(t0, 3);
    }

    /// Increment the counter at `sema` and wake one task sleeping on it, if
    /// any. The freed slot is up for grabs: a concurrent fast-path acquirer
    /// may take it before the woken task resumes.
    pub fn release(&self, sema: &AtomicU32) {
        let addr = sema.as_ptr() as usize;
        let root = self.root_for(addr);
        sema.fetch_add(1, Ordering::SeqCst);
        // No sleeper can exist if nwait is 0 here: sleepers bump it before
        // their final counter check, and our increment above came first.
        if root.nwait.load(Ordering::SeqCst) == 0 {
            return;
        }

        let mut waiters = root.waiters.lock();
        if root.nwait.load(Ordering::SeqCst) == 0 {
            return;
        }
        debug_assert_eq!(
            root.nwait.load(Ordering::SeqCst) as usize,
            waiters.iter().count()
        );
        let mut woken = None;
        {
            let mut cursor = waiters.front_mut();
            while let Some(w) = cursor.get() {
                if w.addr == addr {
                    root.nwait.fetch_sub(1, Ordering::SeqCst);
                    woken = cursor.remove();
                    break;
                }
                // Collision: a waiter for another address in this bucket.
                cursor.move_next();
            }
        }
        drop(waiters);
        if let Some(w) = woken {
            Waiter::wake(w);
        }
    }

    #[cfg(test)]
    pub(crate) fn waiter_count(&self, sema: &AtomicU32) -> u32 {
        self.root_for(sema.as_ptr() as usize)
            .nwait
            .load(Ordering::SeqCst)
    }
}
