use core::{
    hint::spin_loop,
    sync::atomic::{AtomicBool, Ordering},
};

/// One-shot notification event.
///
/// The party that finishes an operation calls [`signal`](Self::signal); the
/// party that started it calls [`wait`](Self::wait). Once signaled the event
/// stays signaled until [`reset`](Self::reset).
#[derive(Debug, Default)]
pub struct CompletionEvent {
    signaled: AtomicBool,
}

impl CompletionEvent {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            signaled: AtomicBool::new(false),
        }
    }

    /// Mark the operation as finished. Publishes all prior writes to waiters.
    #[inline]
    pub fn signal(&self) {
        self.signaled.store(true, Ordering::Release);
    }

    #[inline]
    #[must_use]
    pub fn is_signaled(&self) -> bool {
        self.signaled.load(Ordering::Acquire)
    }

    /// Wait until signaled.
    ///
    /// Must not be called with a [`SpinLock`](crate::SpinLock) held.
    pub fn wait(&self) {
        while !self.is_signaled() {
            spin_loop();
            #[cfg(test)]
            std::thread::yield_now();
        }
    }

    pub fn reset(&self) {
        self.signaled.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn wait_returns_after_signal_from_other_thread() {
        let event = Arc::new(CompletionEvent::new());
        let signaler = {
            let event = Arc::clone(&event);
            thread::spawn(move || event.signal())
        };
        event.wait();
        assert!(event.is_signaled());
        signaler.join().unwrap();
    }

    #[test]
    fn reset_rearms() {
        let event = CompletionEvent::new();
        event.signal();
        event.wait();
        event.reset();
        assert!(!event.is_signaled());
    }
}
