//! # Driver synchronization primitives
//!
//! * [`SpinLock`]: test-and-test-and-set lock for short critical sections.
//! * [`RemoveLock`]: counts in-flight requests and blocks new ones once
//!   device removal has begun.
//! * [`CompletionEvent`]: one-shot signal a forwarding path waits on when a
//!   lower device completes asynchronously.
//! * [`SyncOnceCell`]: write-once cell for process-wide singletons such as the
//!   installed logger.
//!
//! None of these allocate. Only [`RemoveLock::release_and_wait`] and
//! [`CompletionEvent::wait`] ever wait for another party, and neither may be
//! called while a [`SpinLock`] is held.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod completion;
mod remove_lock;
mod spin_lock;
mod sync_once_cell;

pub use completion::CompletionEvent;
pub use remove_lock::{RemoveLock, RemoveLockGuard};
pub use spin_lock::{SpinLock, SpinLockGuard};
pub use sync_once_cell::SyncOnceCell;
