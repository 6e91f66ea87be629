//! Interface to the scheduler that runs the blocking tasks.

/// Park/ready interface consumed by the sleep/wakeup primitives.
///
/// The implementation must provide one wakeup token per task: a call to
/// [`ready`](Park::ready) stores the token, and [`park`](Park::park) consumes
/// it, returning immediately if it is already stored. This makes the
/// publish-unlock-park sequence race-free; a waker holding a
/// [`Task`](Park::Task) handle may deliver the wakeup before, during or after
/// the suspension without losing it.
///
/// # Safety
/// The no-missed-wakeup property of every primitive in this crate rests on
/// the token contract above. An implementation that can drop a `ready` issued
/// before or during `park` is unsound to use here. `park` is allowed to
/// return spuriously; callers re-check their wakeup condition in a loop.
pub unsafe trait Park {
    /// Handle used to make a parked task runnable again.
    type Task: Send;

    /// Handle for the calling task.
    fn current() -> Self::Task;

    /// Suspend the calling task until its wakeup token is set.
    fn park();

    /// Set `task`'s wakeup token and schedule it if parked.
    fn ready(task: Self::Task);

    /// Monotonic tick source used to stamp block events.
    fn cputicks() -> i64 {
        0
    }
}

#[cfg(any(test, feature = "std"))]
pub use self::thread::ThreadPark;

#[cfg(any(test, feature = "std"))]
mod thread {
    use std::sync::OnceLock;
    use std::thread;
    use std::time::Instant;

    use super::Park;

    /// [`Park`] backend over `std` thread parking. `unpark` stores exactly
    /// the one-token-per-thread wakeup the trait requires.
    pub struct ThreadPark;

    unsafe impl Park for ThreadPark {
        type Task = thread::Thread;

        fn current() -> thread::Thread {
            thread::current()
        }

        fn park() {
            thread::park();
        }

        fn ready(task: thread::Thread) {
            task.unpark();
        }

        fn cputicks() -> i64 {
            static EPOCH: OnceLock<Instant> = OnceLock::new();
            EPOCH.get_or_init(Instant::now).elapsed().as_nanos() as i64
        }
    }
}
