use core::mem;
use core::sync::atomic::{AtomicU32, Ordering};

use intrusive_collections::linked_list::LinkedList;
use intrusive_collections::UnsafeMut;

use super::{Waiter, WaiterAdapter};
use crate::park::Park;
use crate::sync::Spinlock;

/// Ticket order with wrap-around: `a` precedes `b` whenever the unwrapped
/// gap between them is below 2^31.
fn less(a: u32, b: u32) -> bool {
    (a.wrapping_sub(b) as i32) < 0
}

/// Wait/notify registry for condition variables.
///
/// A waiter first draws a ticket with [`add`](NotifyList::add), may then
/// release whatever outer lock it holds, and finally blocks in
/// [`wait`](NotifyList::wait). Notification is by ticket number:
/// `notify_one` always releases the oldest outstanding ticket, so the order
/// of wakeups is the order of registration even though a notified ticket may
/// not have reached the wait list yet.
pub struct NotifyList<P: Park> {
    /// Next ticket to hand out.
    wait: AtomicU32,
    /// Next ticket to notify. Read without the lock, written under it.
    notify: AtomicU32,
    waiters: Spinlock<LinkedList<WaiterAdapter<P>>>,
}

unsafe impl<P: Park> Send for NotifyList<P> {}
unsafe impl<P: Park> Sync for NotifyList<P> {}

impl<P: Park> NotifyList<P> {
    pub const fn new() -> Self {
        Self {
            wait: AtomicU32::new(0),
            notify: AtomicU32::new(0),
            waiters: Spinlock::new(LinkedList::new(WaiterAdapter::NEW)),
        }
    }

    /// Draw a ticket for a later [`wait`](NotifyList::wait). Lock-free, so
    /// callers may hold unrelated locks of their own.
    pub fn add(&self) -> u32 {
        self.wait.fetch_add(1, Ordering::SeqCst)
    }

    /// Block until `ticket` is notified. Returns immediately if it already
    /// was.
    pub fn wait(&self, ticket: u32) {
        let mut waiter = Waiter::new();
        waiter.ticket = ticket;
        let mut waiters = self.waiters.lock();
        let notified = self.notify.load(Ordering::SeqCst);
        debug_assert!(!less(self.wait.load(Ordering::SeqCst), notified));
        if less(ticket, notified) {
            return;
        }
        let t0 = waiter.start_profile(true);
        unsafe { waiters.push_back(UnsafeMut::from_raw(&mut waiter)) };
        drop(waiters);
        waiter.block();
        waiter.emit_block_event(t0, 2);
    }

    /// Notify every ticket drawn so far.
    pub fn notify_all(&self) {
        // No new tickets since the last notification: nobody to wake.
        if self.wait.load(Ordering::SeqCst) == self.notify.load(Ordering::SeqCst) {
            return;
        }

        let mut pending = LinkedList::new(WaiterAdapter::NEW);
        let mut waiters = self.waiters.lock();
        while let Some(w) = waiters.pop_front() {
            pending.push_back(w);
        }
        debug_assert!(!less(
            self.wait.load(Ordering::SeqCst),
            self.notify.load(Ordering::SeqCst)
        ));
        self.notify
            .store(self.wait.load(Ordering::SeqCst), Ordering::SeqCst);
        drop(waiters);
        while let Some(w) = pending.pop_front() {
            Waiter::wake(w);
        }
    }

    /// Notify the oldest outstanding ticket.
    pub fn notify_one(&self) {
        if self.wait.load(Ordering::SeqCst) == self.notify.load(Ordering::SeqCst) {
            return;
        }

        let mut waiters = self.waiters.lock();
        let ticket = self.notify.load(Ordering::SeqCst);
        if ticket == self.wait.load(Ordering::SeqCst) {
            return;
        }
        debug_assert!(!less(self.wait.load(Ordering::SeqCst), ticket));
        self.notify
            .store(ticket.wrapping_add(1), Ordering::SeqCst);
        // The holder of `ticket` may not have enqueued yet. If the scan
        // misses it, it observes the store above on its own final check and
        // never parks.
        let mut woken = None;
        {
            let mut cursor = waiters.front_mut();
            while let Some(w) = cursor.get() {
                if w.ticket == ticket {
                    woken = cursor.remove();
                    break;
                }
                cursor.move_next();
            }
        }
        drop(waiters);
        if let Some(w) = woken {
            Waiter::wake(w);
        }
    }

    /// Verify that an opaque mirror of this type declared by a higher layer
    /// matches the real layout. Mismatch is a build contract violation and
    /// fatal.
    pub fn check_layout(size: usize) {
        if size != mem::size_of::<Self>() {
            crate::log::critical!(
                "NotifyList layout mismatch: mirror is {} bytes, runtime type is {}",
                size,
                mem::size_of::<Self>()
            );
            panic!("NotifyList layout mismatch");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    use super::*;
    use crate::park::ThreadPark;

    type List = NotifyList<ThreadPark>;

    fn wait_until(cond: impl Fn() -> bool) {
        while !cond() {
            thread::yield_now();
        }
    }

    fn queued(list: &List) -> usize {
        let waiters = list.waiters.lock();
        let mut cursor = waiters.front();
        let mut n = 0;
        while cursor.get().is_some() {
            n += 1;
            cursor.move_next();
        }
        n
    }

    #[test]
    fn less_is_wrap_tolerant() {
        assert!(less(0, 1));
        assert!(!less(1, 0));
        assert!(!less(7, 7));
        assert!(less(u32::MAX, 0));
        assert!(less(0xffff_fff0, 0x10));
        assert!(!less(0x10, 0xffff_fff0));
    }

    #[test]
    fn notify_before_wait_short_circuits() {
        let list = List::new();
        let ticket = list.add();
        assert_eq!(ticket, 0);
        list.notify_all();
        // Would park forever if the short-circuit failed.
        list.wait(ticket);
        assert_eq!(list.wait.load(Ordering::SeqCst), 1);
        assert_eq!(list.notify.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn notify_one_skips_a_waiter_not_yet_queued() {
        let list = List::new();
        let ticket = list.add();
        list.notify_one();
        assert_eq!(queued(&list), 0);
        list.wait(ticket);
    }

    #[test]
    fn notify_one_follows_ticket_order() {
        let list = List::new();
        let first = list.add();
        let second = list.add();
        let first_done = AtomicBool::new(false);
        let second_done = AtomicBool::new(false);
        thread::scope(|s| {
            s.spawn(|| {
                list.wait(first);
                first_done.store(true, Ordering::SeqCst);
            });
            s.spawn(|| {
                list.wait(second);
                second_done.store(true, Ordering::SeqCst);
            });
            wait_until(|| queued(&list) == 2);
            list.notify_one();
            wait_until(|| first_done.load(Ordering::SeqCst));
            assert!(!second_done.load(Ordering::SeqCst));
            list.notify_one();
        });
        assert!(first_done.load(Ordering::SeqCst));
        assert!(second_done.load(Ordering::SeqCst));
    }

    #[test]
    fn notify_all_drains_the_list() {
        let list = List::new();
        thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    let ticket = list.add();
                    list.wait(ticket);
                });
            }
            wait_until(|| queued(&list) == 4);
            list.notify_all();
        });
        assert_eq!(
            list.wait.load(Ordering::SeqCst),
            list.notify.load(Ordering::SeqCst)
        );
        assert_eq!(queued(&list), 0);
    }

    #[test]
    fn survives_counter_wraparound() {
        let list = List::new();
        list.wait.store(0xffff_fff0, Ordering::SeqCst);
        list.notify.store(0xffff_fff0, Ordering::SeqCst);
        for _ in 0..0x20 {
            let ticket = list.add();
            thread::scope(|s| {
                let waiter = s.spawn(|| list.wait(ticket));
                wait_until(|| queued(&list) == 1);
                list.notify_one();
                waiter.join().unwrap();
            });
        }
        assert_eq!(list.wait.load(Ordering::SeqCst), 0x10);
        assert_eq!(list.notify.load(Ordering::SeqCst), 0x10);
    }

    #[test]
    fn ticket_order_holds_across_the_wrap() {
        let list = List::new();
        list.wait.store(u32::MAX, Ordering::SeqCst);
        list.notify.store(u32::MAX, Ordering::SeqCst);
        let before_wrap = list.add();
        let after_wrap = list.add();
        assert_eq!(before_wrap, u32::MAX);
        assert_eq!(after_wrap, 0);
        let first_done = AtomicBool::new(false);
        thread::scope(|s| {
            s.spawn(|| {
                list.wait(before_wrap);
                first_done.store(true, Ordering::SeqCst);
            });
            let second = s.spawn(|| list.wait(after_wrap));
            wait_until(|| queued(&list) == 2);
            list.notify_one();
            wait_until(|| first_done.load(Ordering::SeqCst));
            assert!(!second.is_finished());
            list.notify_one();
            second.join().unwrap();
        });
    }

    #[test]
    fn layout_check_accepts_the_real_size() {
        List::check_layout(core::mem::size_of::<List>());
    }

    #[test]
    #[should_panic(expected = "layout mismatch")]
    fn layout_check_rejects_a_mismatch() {
        List::check_layout(usize::MAX);
    }
}
