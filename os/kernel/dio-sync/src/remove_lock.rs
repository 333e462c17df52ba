use core::{
    hint::spin_loop,
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
};

/// Tracks requests that are inside the device so removal can drain them.
///
/// Every request [`acquire`](Self::acquire)s before touching device state and
/// keeps the returned guard until it leaves the device. Removal calls
/// [`release_and_wait`](Self::release_and_wait) exactly once: from then on new
/// acquisitions fail, and the call returns only after every outstanding guard
/// has been dropped.
#[derive(Debug)]
pub struct RemoveLock {
    /// One count for the device itself plus one per live guard.
    outstanding: AtomicUsize,
    removing: AtomicBool,
}

impl Default for RemoveLock {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoveLock {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            outstanding: AtomicUsize::new(1),
            removing: AtomicBool::new(false),
        }
    }

    /// Enter the device. `None` once removal has started.
    #[must_use]
    pub fn acquire(&self) -> Option<RemoveLockGuard<'_>> {
        self.outstanding.fetch_add(1, Ordering::AcqRel);
        if self.removing.load(Ordering::Acquire) {
            self.release();
            return None;
        }
        Some(RemoveLockGuard { lock: self })
    }

    #[inline]
    fn release(&self) {
        self.outstanding.fetch_sub(1, Ordering::AcqRel);
    }

    /// Block new acquisitions, drop the device's own count and wait for the
    /// in-flight requests to leave.
    ///
    /// Returns `false` (without waiting) if removal had already been started.
    pub fn release_and_wait(&self) -> bool {
        if self.removing.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.release();
        while self.outstanding.load(Ordering::Acquire) != 0 {
            spin_loop();
            #[cfg(test)]
            std::thread::yield_now();
        }
        true
    }

    #[inline]
    #[must_use]
    pub fn is_removing(&self) -> bool {
        self.removing.load(Ordering::Acquire)
    }

    /// Requests currently inside the device, excluding the device's own count.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        let outstanding = self.outstanding.load(Ordering::Acquire);
        if self.is_removing() {
            outstanding
        } else {
            outstanding.saturating_sub(1)
        }
    }
}

/// Proof that a request is inside the device. Releases on drop.
#[derive(Debug)]
pub struct RemoveLockGuard<'a> {
    lock: &'a RemoveLock,
}

impl Drop for RemoveLockGuard<'_> {
    fn drop(&mut self) {
        self.lock.release();
    }
}
