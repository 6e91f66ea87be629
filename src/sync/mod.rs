pub mod lock;
pub mod spin;

pub use lock::{Lock, LockGuard, RawLock, RawTryLock};
pub use spin::{RawSpinLock, Spinlock, SpinlockGuard};
