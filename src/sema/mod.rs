//! Sleep/wakeup primitives.
//!
//! Everything here follows the same discipline: a task that has to block
//! builds a [`Waiter`] in its own stack frame, publishes it on an intrusive
//! list under a spinlock, drops the lock and parks on its wakeup token. The
//! record stays valid for as long as the task is parked because the frame
//! cannot return until the task is readied. Whoever dequeues a waiter only
//! relinks the list around it, takes the task handle and calls ready outside
//! the lock.

use core::sync::atomic::{AtomicBool, Ordering};

use intrusive_collections::{intrusive_adapter, linked_list, UnsafeMut};

use crate::park::Park;
use crate::profile;

mod notify;
mod rendezvous;
mod table;

pub use notify::NotifyList;
pub use rendezvous::SyncSema;
pub use table::{SemaTable, SEMA_TABLE_SIZE};

/// One blocked task. Lives on the stack of the blocking call; the dequeuer
/// must not touch it after setting `woken`.
pub(crate) struct Waiter<P: Park> {
    link: linked_list::AtomicLink,
    task: Option<P::Task>,
    /// Wakeup token observed by the parked owner.
    woken: AtomicBool,
    /// Address of the counter slept on (counted semaphore only).
    addr: usize,
    /// -1 for an acquirer, remaining token count for a releaser
    /// (rendezvous semaphore only).
    nrelease: i32,
    /// Ticket issued at registration (notification list only).
    ticket: u32,
    /// 0: profiling off. -1: stamp on wakeup. Otherwise the wakeup stamp.
    release_time: i64,
}

intrusive_adapter!(pub(crate) WaiterAdapter<P> = UnsafeMut<Waiter<P>>: Waiter<P> { link: linked_list::AtomicLink } where P: Park);

impl<P: Park> Waiter<P> {
    fn new() -> Self {
        Self {
            link: linked_list::AtomicLink::new(),
            task: Some(P::current()),
            woken: AtomicBool::new(false),
            addr: 0,
            nrelease: 0,
            ticket: 0,
            release_time: 0,
        }
    }

    /// Arm the wakeup stamp if block profiling is on. Returns the park start
    /// time, or 0 when disabled.
    fn start_profile(&mut self, enabled: bool) -> i64 {
        if enabled && profile::block_rate() > 0 {
            self.release_time = -1;
            P::cputicks()
        } else {
            0
        }
    }

    /// Spin on the wakeup token. `Park::park` may return spuriously; only
    /// the token ends the wait.
    fn block(&self) {
        while !self.woken.load(Ordering::Acquire) {
            P::park();
        }
    }

    /// Prepare the record for another parking cycle: a previous wakeup
    /// consumed the task handle, so restore it along with clearing the
    /// token. Owner only.
    fn rearm(&mut self) {
        self.task = Some(P::current());
        self.woken.store(false, Ordering::Relaxed);
    }

    fn emit_block_event(&self, t0: i64, skip: usize) {
        if self.release_time > 0 {
            profile::blockevent(self.release_time - t0, skip);
        }
    }

    /// Hand the wakeup to a dequeued waiter. The record may cease to exist
    /// the moment the token is stored, so the task handle is taken first and
    /// readied last.
    fn wake(mut this: UnsafeMut<Self>) {
        if this.release_time != 0 {
            this.release_time = P::cputicks();
        }
        let task = this.task.take().expect("waiter woken twice");
        this.woken.store(true, Ordering::Release);
        drop(this);
        P::ready(task);
    }
}
