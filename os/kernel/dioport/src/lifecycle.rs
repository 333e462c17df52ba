//! Plug-and-Play device lifecycle.
//!
//! ```text
//!            start ok                     stop
//! Stopped ─────────────▶ Starting ──▶ Started ──▶ StopPending ──▶ Stopped
//!    ▲   lower failed        │                        │ lower failed
//!    └───────────────────────┘                        └──────▶ Started
//!
//! any live state ── remove ──▶ Removed
//!                 └ surprise ─▶ SurpriseRemoved
//! ```
//!
//! Requests are only admitted in `Started`. Every minor function is answered
//! with a [`PnpOutcome`] naming how it was handled.

use crate::error::DioError;
use crate::range::RangeSet;
use alloc::sync::Arc;
use bitfield_struct::bitfield;
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use dio_abi::{MAX_PORT_RANGES, PortRange, Status};
use dio_sync::{CompletionEvent, SpinLock};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DeviceState {
    Stopped,
    Starting,
    Started,
    StopPending,
    Removed,
    SurpriseRemoved,
}

/// Flags reported for a device-state query.
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct PnpDeviceStateFlags {
    pub disabled: bool,
    pub dont_display_in_ui: bool,
    pub failed: bool,
    pub removed: bool,
    pub resource_requirements_changed: bool,
    pub not_disableable: bool,
    #[bits(26)]
    __reserved: u32,
}

/// One entry of the translated hardware resource list handed over at start.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ResourceDescriptor {
    Port { start: u64, length: u32 },
    Memory { start: u64, length: u32 },
    Interrupt { vector: u32 },
    Other,
}

/// A Plug-and-Play minor function.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PnpRequest<'a> {
    StartDevice { translated: &'a [ResourceDescriptor] },
    QueryRemoveDevice,
    RemoveDevice,
    CancelRemoveDevice,
    StopDevice,
    QueryStopDevice,
    CancelStopDevice,
    QueryDeviceRelations,
    QueryInterface,
    QueryCapabilities,
    QueryResources,
    QueryResourceRequirements,
    QueryDeviceText,
    FilterResourceRequirements,
    ReadConfig,
    WriteConfig,
    Eject,
    SetLock,
    QueryId,
    QueryPnpDeviceState,
    QueryBusInformation,
    DeviceUsageNotification,
    SurpriseRemoval,
    Other(u8),
}

impl PnpRequest<'_> {
    /// The minor function number.
    #[must_use]
    pub const fn minor(&self) -> u8 {
        match self {
            Self::StartDevice { .. } => 0x00,
            Self::QueryRemoveDevice => 0x01,
            Self::RemoveDevice => 0x02,
            Self::CancelRemoveDevice => 0x03,
            Self::StopDevice => 0x04,
            Self::QueryStopDevice => 0x05,
            Self::CancelStopDevice => 0x06,
            Self::QueryDeviceRelations => 0x07,
            Self::QueryInterface => 0x08,
            Self::QueryCapabilities => 0x09,
            Self::QueryResources => 0x0A,
            Self::QueryResourceRequirements => 0x0B,
            Self::QueryDeviceText => 0x0C,
            Self::FilterResourceRequirements => 0x0D,
            Self::ReadConfig => 0x0F,
            Self::WriteConfig => 0x10,
            Self::Eject => 0x11,
            Self::SetLock => 0x12,
            Self::QueryId => 0x13,
            Self::QueryPnpDeviceState => 0x14,
            Self::QueryBusInformation => 0x15,
            Self::DeviceUsageNotification => 0x16,
            Self::SurpriseRemoval => 0x17,
            Self::Other(minor) => *minor,
        }
    }

    /// Queries that pass through to the lower device untouched.
    #[must_use]
    pub const fn is_pass_through(&self) -> bool {
        matches!(
            self,
            Self::QueryDeviceRelations
                | Self::QueryInterface
                | Self::QueryCapabilities
                | Self::QueryResources
                | Self::QueryResourceRequirements
                | Self::QueryDeviceText
                | Self::FilterResourceRequirements
                | Self::QueryId
                | Self::QueryBusInformation
                | Self::DeviceUsageNotification
        )
    }
}

/// How a minor function was handled.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PnpAction {
    /// Sent down and waited for; `status` is the lower device's answer.
    ForwardAndWait,
    /// Sent down without waiting; `status` is our own answer.
    ForwardAndForget,
    /// Answered here, not forwarded.
    CompleteLocally,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PnpOutcome {
    pub action: PnpAction,
    pub status: Status,
    pub information: usize,
}

impl PnpOutcome {
    #[must_use]
    pub const fn waited(status: Status) -> Self {
        Self {
            action: PnpAction::ForwardAndWait,
            status,
            information: 0,
        }
    }

    #[must_use]
    pub const fn forgotten(status: Status) -> Self {
        Self {
            action: PnpAction::ForwardAndForget,
            status,
            information: 0,
        }
    }

    #[must_use]
    pub const fn local(status: Status, information: usize) -> Self {
        Self {
            action: PnpAction::CompleteLocally,
            status,
            information,
        }
    }
}

/// Completion slot for a lower-device call that went pending.
#[derive(Debug)]
pub struct PendingCompletion {
    event: CompletionEvent,
    result: SpinLock<Result<(), Status>>,
}

impl Default for PendingCompletion {
    fn default() -> Self {
        Self::new()
    }
}

impl PendingCompletion {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            event: CompletionEvent::new(),
            result: SpinLock::new(Ok(())),
        }
    }

    /// Called by the lower device when it finishes.
    pub fn complete(&self, result: Result<(), Status>) {
        *self.result.lock() = result;
        self.event.signal();
    }

    /// Block until [`complete`](Self::complete) ran and return its result.
    pub fn wait(&self) -> Result<(), Status> {
        self.event.wait();
        *self.result.lock()
    }
}

/// Immediate answer of a lower-device call.
#[derive(Debug, Clone)]
pub enum LowerCall {
    Completed(Result<(), Status>),
    Pending(Arc<PendingCompletion>),
}

/// The next device down the stack.
pub trait LowerDevice: Send + Sync {
    fn call(&self, request: &PnpRequest<'_>) -> LowerCall;

    /// Forward a system-control (management instrumentation) request.
    fn system_control(&self) -> Status {
        Status::Success
    }
}

/// Send `request` down and wait for the final answer.
///
/// May block; never call with a spin lock held.
///
/// # Errors
/// The lower device's failure status.
pub fn forward_and_wait(lower: &dyn LowerDevice, request: &PnpRequest<'_>) -> Result<(), Status> {
    match lower.call(request) {
        LowerCall::Completed(result) => result,
        LowerCall::Pending(pending) => {
            log::debug!("minor {:#04x} pending in lower device, waiting", request.minor());
            pending.wait()
        }
    }
}

/// Send `request` down without waiting. A synchronous failure is logged.
pub fn forward_and_forget(lower: &dyn LowerDevice, request: &PnpRequest<'_>) {
    if let LowerCall::Completed(Err(status)) = lower.call(request) {
        log::debug!("lower device answered minor {:#04x} with {status}", request.minor());
    }
}

/// Port ranges from a translated resource list.
///
/// Bases and lengths are truncated to 16 bits; zero-length entries are skipped;
/// ranges running past `0xFFFF` are clipped; entries beyond
/// [`MAX_PORT_RANGES`] are dropped with a warning.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn parse_port_resources(translated: &[ResourceDescriptor]) -> RangeSet {
    let mut ranges = RangeSet::new();
    for descriptor in translated {
        let ResourceDescriptor::Port { start, length } = *descriptor else {
            continue;
        };
        let base = (start & 0xFFFF) as u16;
        let span = (length & 0xFFFF) as u16;
        log::info!("port resource {base:#06x}+{span:#x} (raw {start:#x}+{length:#x})");
        if span == 0 {
            continue;
        }
        let end = base.saturating_add(span - 1);
        if ranges.push(PortRange::new(base, end)).is_err() {
            log::warn!("more than {MAX_PORT_RANGES} port resources; ignoring the rest");
            break;
        }
    }
    ranges
}

/// State of one device instance.
#[derive(Debug)]
pub struct Lifecycle {
    state: SpinLock<DeviceState>,
    pnp_flags: AtomicU32,
    torn_down: AtomicBool,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: SpinLock::new(DeviceState::Stopped),
            pnp_flags: AtomicU32::new(0),
            torn_down: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn state(&self) -> DeviceState {
        *self.state.lock()
    }

    /// Requests are admitted only in this state.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.state() == DeviceState::Started
    }

    /// Move `from -> to` atomically.
    ///
    /// # Errors
    /// [`DioError::WrongState`] with the actual state if it is not `from`.
    pub fn transition(&self, from: DeviceState, to: DeviceState) -> Result<(), DioError> {
        let mut state = self.state.lock();
        if *state != from {
            return Err(DioError::WrongState { state: *state });
        }
        *state = to;
        drop(state);
        log::info!("device {from:?} -> {to:?}");
        Ok(())
    }

    /// Enter a terminal removal state from wherever the device is.
    pub fn mark_removed(&self, to: DeviceState) -> DeviceState {
        let previous = core::mem::replace(&mut *self.state.lock(), to);
        log::info!("device {previous:?} -> {to:?}");
        previous
    }

    /// `true` exactly once: for the caller that gets to release the device's
    /// resources.
    pub fn claim_teardown(&self) -> bool {
        !self.torn_down.swap(true, Ordering::AcqRel)
    }

    #[must_use]
    pub fn pnp_flags(&self) -> PnpDeviceStateFlags {
        PnpDeviceStateFlags::from_bits(self.pnp_flags.load(Ordering::Acquire))
    }

    pub fn set_pnp_flags(&self, flags: PnpDeviceStateFlags) {
        self.pnp_flags.store(flags.into_bits(), Ordering::Release);
    }
}
