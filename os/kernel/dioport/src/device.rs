//! The device context and its non-`ioctl` entry points.

use crate::engine::{PortIoEngine, TransferMode};
use crate::error::DioError;
use crate::lifecycle::{
    DeviceState, Lifecycle, LowerDevice, PnpDeviceStateFlags, PnpOutcome, PnpRequest,
    ResourceDescriptor, forward_and_forget, forward_and_wait, parse_port_resources,
};
use crate::options::{AccessPolicy, DriverOptions};
use crate::ownership::{OwnershipRegistry, ProcessId};
use crate::permission::{self, PermissionMap};
use crate::platform::Platform;
use crate::range::{AccessRules, RangeSet, is_accessible};
use alloc::sync::Arc;
use core::sync::atomic::{AtomicU32, Ordering};
use dio_abi::{ConfigurationBits, DEVICE_LINK_NAME, DEVICE_NAME, PortRange, Status};
use dio_ports::PortBus;
use dio_sync::{RemoveLock, SpinLock};

/// One DIO device instance.
///
/// Lock order: `permission` (the configuration lock), then `available`, then
/// the engine's bus lock. None of them is held across a lower-device call.
pub struct Device<B> {
    pub(crate) options: DriverOptions,
    configuration: AtomicU32,
    pub(crate) lifecycle: Lifecycle,
    pub(crate) remove_lock: RemoveLock,
    pub(crate) ownership: OwnershipRegistry,
    pub(crate) permission: SpinLock<Option<PermissionMap>>,
    pub(crate) available: SpinLock<RangeSet>,
    pub(crate) engine: PortIoEngine<B>,
    pub(crate) platform: Arc<dyn Platform>,
    lower: Arc<dyn LowerDevice>,
}

impl<B: PortBus> core::fmt::Debug for Device<B> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Device")
            .field("state", &self.lifecycle.state())
            .field("owner", &self.ownership.owner())
            .field("configuration", &self.configuration())
            .finish_non_exhaustive()
    }
}

impl<B: PortBus> Device<B> {
    /// Create the device: symbolic link, stack attachment, device interface.
    ///
    /// Whatever was set up before a failing step is undone.
    ///
    /// # Errors
    /// [`DioError::Platform`] with the failing service's status.
    pub fn attach(
        options: DriverOptions,
        bus: B,
        platform: Arc<dyn Platform>,
        lower: Arc<dyn LowerDevice>,
    ) -> Result<Self, DioError> {
        options.log_options();

        platform
            .create_symbolic_link(DEVICE_LINK_NAME, DEVICE_NAME)
            .map_err(DioError::Platform)?;
        if let Err(status) = platform.attach_to_lower() {
            log::warn!("attach to lower device failed: {status}");
            platform.delete_symbolic_link(DEVICE_LINK_NAME);
            return Err(DioError::Platform(status));
        }
        if let Err(status) = platform.set_device_interface(true) {
            log::warn!("device interface registration failed: {status}");
            platform.detach_from_lower();
            platform.delete_symbolic_link(DEVICE_LINK_NAME);
            return Err(DioError::Platform(status));
        }

        let configuration = options.initial_configuration.sanitized();
        dio_trace::set_show_debug_output(configuration.show_debug_output());
        log::info!("{DEVICE_NAME} attached as {DEVICE_LINK_NAME}");

        Ok(Self {
            options,
            configuration: AtomicU32::new(configuration.into_bits()),
            lifecycle: Lifecycle::new(),
            remove_lock: RemoveLock::new(),
            ownership: OwnershipRegistry::new(),
            permission: SpinLock::new(None),
            available: SpinLock::new(RangeSet::new()),
            engine: PortIoEngine::new(bus),
            platform,
            lower,
        })
    }

    #[must_use]
    pub fn options(&self) -> &DriverOptions {
        &self.options
    }

    #[must_use]
    pub fn state(&self) -> DeviceState {
        self.lifecycle.state()
    }

    #[must_use]
    pub fn owner(&self) -> Option<ProcessId> {
        self.ownership.owner()
    }

    #[must_use]
    pub fn configuration(&self) -> ConfigurationBits {
        ConfigurationBits::from_bits(self.configuration.load(Ordering::Acquire))
    }

    pub(crate) fn store_configuration(&self, bits: ConfigurationBits) {
        let bits = bits.sanitized();
        self.configuration.store(bits.into_bits(), Ordering::Release);
        dio_trace::set_show_debug_output(bits.show_debug_output());
        log::info!("configuration set to {bits:?}");
    }

    /// Ports assigned at the last start.
    #[must_use]
    pub fn available_ranges(&self) -> RangeSet {
        self.available.lock().clone()
    }

    /// A copy of the installed permission map, if the device holds one.
    #[must_use]
    pub fn permission_map(&self) -> Option<PermissionMap> {
        self.permission.lock().clone()
    }

    /// Accessibility of `range` under the current policy and map. Callers hold
    /// the configuration lock and the available-range lock.
    pub(crate) fn range_accessible(
        &self,
        range: &PortRange,
        map: Option<&PermissionMap>,
        available: &RangeSet,
    ) -> bool {
        let rules = match self.options.access_policy {
            AccessPolicy::DenyConventional => AccessRules::DenyConventional,
            AccessPolicy::HardwareResources => AccessRules::AllowList(available),
        };
        is_accessible(range, rules)
            && (!self.options.enforce_permission_map || map.is_some_and(|m| m.allows(range)))
    }

    /// Ask the engine whether a transfer over `ranges` would be admitted,
    /// without touching the bus.
    #[must_use]
    pub fn probe(&self, ranges: &[PortRange]) -> bool {
        let map = self.permission.lock();
        let available = self.available.lock();
        let allow_overlap = self.configuration().allow_range_overlap();
        self.engine
            .transfer(
                ranges,
                allow_overlap,
                |r| self.range_accessible(r, map.as_ref(), &available),
                TransferMode::Probe,
            )
            .is_ok()
    }

    #[must_use]
    pub fn is_port_accessible(&self, port: u16) -> bool {
        self.probe(&[PortRange::single(port)])
    }

    /// A handle to the device was opened.
    #[must_use]
    pub fn create(&self, pid: ProcessId) -> Status {
        let Some(_guard) = self.remove_lock.acquire() else {
            return Status::DeviceGone;
        };
        if self.options.register_on_open && !self.ownership.try_register(pid) {
            return Status::AccessDenied;
        }
        Status::Success
    }

    /// The last handle of `pid` is being cleaned up.
    #[must_use]
    pub fn cleanup(&self, pid: ProcessId) -> Status {
        let mut slot = self.permission.lock();
        let released = self.ownership.unregister(pid);
        if released {
            self.deny_all(&mut slot);
        }
        drop(slot);
        if released && self.options.revoke_on_unregister {
            self.platform.set_process_io_access(pid, false);
        }
        Status::Success
    }

    #[must_use]
    #[allow(clippy::unused_self)]
    pub const fn close(&self, _pid: ProcessId) -> Status {
        Status::Success
    }

    /// Process-exit notification. Frees the owner slot without touching the
    /// exiting process's I/O permission.
    #[must_use]
    pub fn process_exited(&self, pid: ProcessId) -> bool {
        let mut slot = self.permission.lock();
        let released = self.ownership.force_unregister(pid);
        if released {
            self.deny_all(&mut slot);
        }
        released
    }

    /// Forward a system-control request and forget it.
    #[must_use]
    pub fn system_control(&self) -> Status {
        let Some(_guard) = self.remove_lock.acquire() else {
            return Status::DeviceGone;
        };
        self.lower.system_control()
    }

    /// Any major function without a handler.
    #[must_use]
    #[allow(clippy::unused_self)]
    pub const fn not_supported(&self) -> Status {
        Status::Unsupported
    }

    /// Driver unload. Releases everything the device still holds.
    pub fn detach(&self) {
        self.remove_lock.release_and_wait();
        self.lifecycle.mark_removed(DeviceState::Removed);
        self.teardown();
    }

    /// Handle one Plug-and-Play minor function.
    #[must_use]
    pub fn pnp(&self, request: &PnpRequest<'_>) -> PnpOutcome {
        log::debug!("pnp minor {:#04x} in {:?}", request.minor(), self.state());
        match request {
            PnpRequest::RemoveDevice => return self.remove(request, false),
            PnpRequest::SurpriseRemoval => return self.remove(request, true),
            _ => {}
        }

        let Some(_guard) = self.remove_lock.acquire() else {
            return PnpOutcome::local(Status::DeviceGone, 0);
        };
        match request {
            PnpRequest::StartDevice { translated } => self.start(request, translated),
            PnpRequest::StopDevice => self.stop(request),
            PnpRequest::QueryStopDevice
            | PnpRequest::QueryRemoveDevice
            | PnpRequest::CancelStopDevice
            | PnpRequest::CancelRemoveDevice => {
                forward_and_forget(self.lower.as_ref(), request);
                PnpOutcome::forgotten(Status::Success)
            }
            PnpRequest::QueryPnpDeviceState => {
                let flags = self.lifecycle.pnp_flags().into_bits();
                PnpOutcome::local(Status::Success, flags as usize)
            }
            r if r.is_pass_through() => {
                forward_and_forget(self.lower.as_ref(), request);
                PnpOutcome::forgotten(Status::Success)
            }
            _ => PnpOutcome::local(Status::Unsupported, 0),
        }
    }

    fn start(&self, request: &PnpRequest<'_>, translated: &[ResourceDescriptor]) -> PnpOutcome {
        if let Err(e) = self
            .lifecycle
            .transition(DeviceState::Stopped, DeviceState::Starting)
        {
            log::warn!("start refused: {e}");
            return PnpOutcome::local(e.into(), 0);
        }

        if let Err(status) = forward_and_wait(self.lower.as_ref(), request) {
            log::warn!("lower device failed start: {status}");
            self.settle(DeviceState::Starting, DeviceState::Stopped);
            return PnpOutcome::waited(status);
        }

        let ranges = parse_port_resources(translated);
        let map = match PermissionMap::try_new() {
            Ok(map) => map,
            Err(e) => {
                log::warn!("start failed: {e}");
                self.settle(DeviceState::Starting, DeviceState::Stopped);
                return PnpOutcome::waited(e.into());
            }
        };
        log::info!("{} port ranges assigned: {ranges:?}", ranges.len());

        {
            let mut slot = self.permission.lock();
            self.platform.set_io_access_map(map.as_bytes());
            *slot = Some(map);
            *self.available.lock() = ranges;
        }
        self.lifecycle.set_pnp_flags(PnpDeviceStateFlags::new());
        self.settle(DeviceState::Starting, DeviceState::Started);
        PnpOutcome::waited(Status::Success)
    }

    fn stop(&self, request: &PnpRequest<'_>) -> PnpOutcome {
        match self
            .lifecycle
            .transition(DeviceState::Started, DeviceState::StopPending)
        {
            Ok(()) => {}
            Err(DioError::WrongState {
                state: DeviceState::Stopped,
            }) => {
                forward_and_forget(self.lower.as_ref(), request);
                return PnpOutcome::forgotten(Status::Success);
            }
            Err(e) => return PnpOutcome::local(e.into(), 0),
        }

        if let Err(status) = forward_and_wait(self.lower.as_ref(), request) {
            log::warn!("lower device failed stop: {status}");
            self.settle(DeviceState::StopPending, DeviceState::Started);
            return PnpOutcome::waited(status);
        }

        self.release_owner();
        let map = self.permission.lock().take();
        drop(map);
        self.settle(DeviceState::StopPending, DeviceState::Stopped);
        PnpOutcome::waited(Status::Success)
    }

    fn remove(&self, request: &PnpRequest<'_>, surprise: bool) -> PnpOutcome {
        if !self.remove_lock.release_and_wait() {
            log::debug!("removal already in progress");
        }
        let target = if surprise {
            DeviceState::SurpriseRemoved
        } else {
            DeviceState::Removed
        };
        self.lifecycle.mark_removed(target);

        let status = forward_and_wait(self.lower.as_ref(), request)
            .err()
            .unwrap_or(Status::Success);
        self.teardown();
        PnpOutcome::waited(status)
    }

    /// Leave a transient state this thread entered. A mismatch means removal
    /// overtook us; it is logged and left alone.
    fn settle(&self, from: DeviceState, to: DeviceState) {
        if let Err(e) = self.lifecycle.transition(from, to) {
            log::warn!("{from:?} -> {to:?} skipped: {e}");
        }
    }

    /// Rebuild the map fully denied and install it. The caller holds the
    /// `permission` lock across the ownership change so that a grant cannot
    /// slip in between.
    fn deny_all(&self, slot: &mut Option<PermissionMap>) {
        if let Some(map) = slot.as_mut()
            && permission::build(map, None).is_ok()
        {
            self.platform.set_io_access_map(map.as_bytes());
        }
    }

    /// Drop the owner, if any, and take its port access away.
    fn release_owner(&self) {
        let mut slot = self.permission.lock();
        let previous = self.ownership.clear();
        if previous.is_some() {
            self.deny_all(&mut slot);
        }
        drop(slot);
        if let Some(pid) = previous {
            self.platform.set_process_io_access(pid, false);
        }
    }

    fn teardown(&self) {
        if !self.lifecycle.claim_teardown() {
            return;
        }
        self.release_owner();
        let map = self.permission.lock().take();
        drop(map);
        self.available.lock().clear();

        self.platform.delete_symbolic_link(DEVICE_LINK_NAME);
        if let Err(status) = self.platform.set_device_interface(false) {
            log::warn!("disabling the device interface failed: {status}");
        }
        self.platform.detach_from_lower();
        log::info!("{DEVICE_NAME} torn down");
    }
}
