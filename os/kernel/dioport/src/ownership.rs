//! Single-slot registry of the process allowed to do port I/O.

use core::fmt;
use core::num::NonZeroU64;
use core::sync::atomic::{AtomicU64, Ordering};
use dio_sync::SpinLock;

/// Identity of a user process. Zero is reserved for "no process".
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct ProcessId(NonZeroU64);

impl ProcessId {
    #[must_use]
    pub const fn new(raw: u64) -> Option<Self> {
        match NonZeroU64::new(raw) {
            Some(id) => Some(Self(id)),
            None => None,
        }
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Debug for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pid:{}", self.0)
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

const NO_OWNER: u64 = 0;

/// Holds at most one owner.
///
/// Mutations are serialized by a spin lock and applied with compare-and-swap;
/// [`is_owned_by`](Self::is_owned_by) and [`owner`](Self::owner) read the slot
/// without locking. Hardware side effects of ownership changes (granting or
/// revoking process I/O permission) are the caller's business and must happen
/// after these calls return.
#[derive(Debug, Default)]
pub struct OwnershipRegistry {
    owner: AtomicU64,
    lock: SpinLock<()>,
}

impl OwnershipRegistry {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            owner: AtomicU64::new(NO_OWNER),
            lock: SpinLock::new(()),
        }
    }

    /// Claim the slot for `pid`. Succeeds if the slot was empty or already
    /// held by `pid`.
    pub fn try_register(&self, pid: ProcessId) -> bool {
        let registered = {
            let _guard = self.lock.lock();
            match self.owner.compare_exchange(
                NO_OWNER,
                pid.get(),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => Some(true),
                Err(current) if current == pid.get() => Some(false),
                Err(_) => None,
            }
        };
        match registered {
            Some(true) => {
                log::info!("process {pid} registered");
                true
            }
            Some(false) => true,
            None => {
                log::debug!("process {pid} refused: device owned by {:?}", self.owner());
                false
            }
        }
    }

    /// Release the slot if `pid` holds it (close/cleanup path).
    pub fn unregister(&self, pid: ProcessId) -> bool {
        let released = self.release(pid);
        if released {
            log::info!("process {pid} unregistered");
        } else {
            log::debug!("process {pid} was not registered");
        }
        released
    }

    /// Release the slot on behalf of an exited process.
    ///
    /// Runs from the process-exit notification; callers must not revoke the
    /// process's hardware I/O permission from that context.
    pub fn force_unregister(&self, pid: ProcessId) -> bool {
        let released = self.release(pid);
        if released {
            log::info!("process {pid} exited while registered; released");
        }
        released
    }

    fn release(&self, pid: ProcessId) -> bool {
        let _guard = self.lock.lock();
        self.owner
            .compare_exchange(pid.get(), NO_OWNER, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    #[inline]
    #[must_use]
    pub fn is_owned_by(&self, pid: ProcessId) -> bool {
        self.owner.load(Ordering::Acquire) == pid.get()
    }

    #[inline]
    #[must_use]
    pub fn owner(&self) -> Option<ProcessId> {
        ProcessId::new(self.owner.load(Ordering::Acquire))
    }

    /// Empty the slot unconditionally (device teardown), returning who held it.
    pub fn clear(&self) -> Option<ProcessId> {
        let previous = {
            let _guard = self.lock.lock();
            self.owner.swap(NO_OWNER, Ordering::AcqRel)
        };
        let previous = ProcessId::new(previous);
        if let Some(pid) = previous {
            log::info!("process {pid} released by teardown");
        }
        previous
    }
}
