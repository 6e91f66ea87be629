use core::mem;

use intrusive_collections::linked_list::LinkedList;
use intrusive_collections::UnsafeMut;

use super::{Waiter, WaiterAdapter};
use crate::park::Park;
use crate::sync::Spinlock;

/// Rendezvous semaphore: a releaser hands N tokens directly to N acquirers,
/// with whichever side arrives first parking until the other shows up.
///
/// The wait list never mixes roles. A caller always drains opposite-role
/// waiters before enqueueing itself, so at every lock release the list is
/// all-acquirers or all-releasers.
pub struct SyncSema<P: Park> {
    waiters: Spinlock<LinkedList<WaiterAdapter<P>>>,
}

unsafe impl<P: Park> Send for SyncSema<P> {}
unsafe impl<P: Park> Sync for SyncSema<P> {}

impl<P: Park> SyncSema<P> {
    pub const fn new() -> Self {
        Self {
            waiters: Spinlock::new(LinkedList::new(WaiterAdapter::NEW)),
        }
    }

    /// Take one token, parking until a releaser provides it.
    pub fn acquire(&self) {
        let mut waiters = self.waiters.lock();
        let head_is_releaser = waiters.front().get().map_or(false, |w| w.nrelease > 0);
        if head_is_releaser {
            let mut releaser = waiters
                .front_mut()
                .remove()
                .expect("releaser vanished under the lock");
            releaser.nrelease -= 1;
            if releaser.nrelease == 0 {
                drop(waiters);
                Waiter::wake(releaser);
            } else {
                waiters.push_front(releaser);
                debug_assert!(Self::roles_agree(&waiters));
            }
        } else {
            let mut waiter = Waiter::new();
            waiter.nrelease = -1;
            let t0 = waiter.start_profile(true);
            unsafe { waiters.push_back(UnsafeMut::from_raw(&mut waiter)) };
            debug_assert!(Self::roles_agree(&waiters));
            drop(waiters);
            waiter.block();
            waiter.emit_block_event(t0, 2);
        }
    }

    /// Provide `n` tokens, parking until all of them have been taken.
    pub fn release(&self, n: u32) {
        debug_assert!(n > 0);
        let mut n = n;
        let mut wake = LinkedList::new(WaiterAdapter::NEW);
        let mut waiters = self.waiters.lock();
        while n > 0 {
            let head_is_acquirer = waiters.front().get().map_or(false, |w| w.nrelease < 0);
            if !head_is_acquirer {
                break;
            }
            let acquirer = waiters.pop_front().expect("acquirer vanished under the lock");
            wake.push_back(acquirer);
            n -= 1;
        }
        if n > 0 {
            let mut waiter = Waiter::new();
            waiter.nrelease = n as i32;
            let t0 = waiter.start_profile(true);
            unsafe { waiters.push_back(UnsafeMut::from_raw(&mut waiter)) };
            debug_assert!(Self::roles_agree(&waiters));
            drop(waiters);
            while let Some(w) = wake.pop_front() {
                Waiter::wake(w);
            }
            waiter.block();
            waiter.emit_block_event(t0, 2);
        } else {
            drop(waiters);
            while let Some(w) = wake.pop_front() {
                Waiter::wake(w);
            }
        }
    }

    /// List-consistency invariant: acquirers and releasers never queue
    /// together.
    fn roles_agree(waiters: &LinkedList<WaiterAdapter<P>>) -> bool {
        let mut acquirers = false;
        let mut releasers = false;
        let mut cursor = waiters.front();
        while let Some(w) = cursor.get() {
            if w.nrelease < 0 {
                acquirers = true;
            } else {
                releasers = true;
            }
            cursor.move_next();
        }
        !(acquirers && releasers)
    }

    /// Verify that an opaque mirror of this type declared by a higher layer
    /// matches the real layout. Mismatch is a build contract violation and
    /// fatal.
    pub fn check_layout(size: usize) {
        if size != mem::size_of::<Self>() {
            crate::log::critical!(
                "SyncSema layout mismatch: mirror is {} bytes, runtime type is {}",
                size,
                mem::size_of::<Self>()
            );
            panic!("SyncSema layout mismatch");
        }
    }
}
