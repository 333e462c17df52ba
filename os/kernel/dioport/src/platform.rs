//! Operating-system services the device needs, behind one trait.

use crate::ownership::ProcessId;
use dio_abi::Status;

/// Services provided by the host kernel.
///
/// [`set_io_access_map`](Platform::set_io_access_map) and
/// [`set_process_io_access`](Platform::set_process_io_access) are called with
/// the configuration lock held and must not block.
pub trait Platform: Send + Sync {
    /// # Errors
    /// The host's failure status.
    fn create_symbolic_link(&self, link: &str, target: &str) -> Result<(), Status>;

    fn delete_symbolic_link(&self, link: &str);

    /// Register the device interface (on first enable) and switch it on or off.
    ///
    /// # Errors
    /// The host's failure status.
    fn set_device_interface(&self, enabled: bool) -> Result<(), Status>;

    /// # Errors
    /// The host's failure status; the device cannot be attached.
    fn attach_to_lower(&self) -> Result<(), Status>;

    fn detach_from_lower(&self);

    /// Install an 8192-byte I/O permission bitmap (set bit = denied).
    fn set_io_access_map(&self, map: &[u8]);

    /// Let `pid` use the installed map (`true`) or take port access away.
    fn set_process_io_access(&self, pid: ProcessId, enabled: bool);
}
