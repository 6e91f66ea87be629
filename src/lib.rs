//! Sleep/wakeup substrate for user-scheduled tasks.
//!
//! Provides the three primitives a runtime needs to build mutexes, rwlocks,
//! wait groups and condition variables: an address-keyed counted semaphore
//! ([`SemaTable`]), a rendezvous semaphore ([`SyncSema`]) and a ticket
//! notification list ([`NotifyList`]). The scheduler that runs the blocking
//! tasks is consumed through the [`Park`] trait.
#![no_std]
#![feature(core_intrinsics)]
#![feature(decl_macro)]
#![feature(negative_impls)]
#![allow(internal_features)]

pub mod cache;
pub mod init;
pub mod log;
pub mod park;
pub mod profile;
pub mod sema;
pub mod sync;

pub use park::Park;
#[cfg(any(test, feature = "std"))]
pub use park::ThreadPark;
pub use sema::{NotifyList, SemaTable, SyncSema};

#[cfg(any(test, feature = "std"))]
extern crate std;

pub use cfg_if;
