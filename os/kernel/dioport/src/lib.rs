//! # dioport: direct I/O port access broker
//!
//! Grants a single user process direct access to a set of I/O port ranges and
//! performs port reads and writes on its behalf, with every request validated
//! before anything is touched.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                 Device (context object)                  │
//! │   create / cleanup / close / process_exited / pnp        │
//! │   device_control ──▶ gates: remove lock, state, code,    │
//! │                      owner, buffer sizes                 │
//! └───────┬───────────────┬───────────────┬──────────────────┘
//!         │               │               │
//! ┌───────▼──────┐ ┌──────▼───────┐ ┌─────▼────────────────┐
//! │ codec        │ │ ownership    │ │ lifecycle            │
//! │ size checks  │ │ one owner,   │ │ Stopped ▸ Started ▸  │
//! │ before reads │ │ CAS slot     │ │ Removed, remove lock │
//! └───────┬──────┘ └──────────────┘ └──────────────────────┘
//!         │
//! ┌───────▼──────────────────┐   ┌──────────────────────────┐
//! │ range + permission       │   │ engine                   │
//! │ deny-list, allow-list,   │──▶│ all-or-nothing transfer  │
//! │ 64 Ki-bit map            │   │ under the bus lock       │
//! └──────────────────────────┘   └────────────┬─────────────┘
//!                                             │
//!                                   dio_ports::PortBus
//! ```
//!
//! ## Host integration
//!
//! The host kernel supplies a [`Platform`] (symbolic link, device interface,
//! stack attachment, process I/O permission) and a [`LowerDevice`] (the next
//! device down the Plug-and-Play stack), and routes its I/O entry points to
//! the matching [`Device`] methods. There is no global state; the host keeps
//! the device in its device extension.
//!
//! ## Features
//!
//! * `io-test-mode`: [`DefaultBus`] is the pattern bus; no port is ever
//!   touched.

#![cfg_attr(not(any(test, doctest)), no_std)]

extern crate alloc;

mod codec;
mod device;
mod dispatch;
mod engine;
mod error;
mod lifecycle;
mod options;
mod ownership;
mod permission;
mod platform;
mod range;

pub use codec::{PortIoPlan, decode_grant, plan_port_io, validate_configuration, validate_control_code};
pub use device::Device;
pub use dispatch::Completion;
pub use engine::{PortIoEngine, TransferMode};
pub use error::{DioError, InvalidReason, TransferError};
pub use lifecycle::{
    DeviceState, Lifecycle, LowerCall, LowerDevice, PendingCompletion, PnpAction,
    PnpDeviceStateFlags, PnpOutcome, PnpRequest, ResourceDescriptor, forward_and_forget,
    forward_and_wait, parse_port_resources,
};
pub use options::{AccessPolicy, DriverOptions};
pub use ownership::{OwnershipRegistry, ProcessId};
pub use permission::{MAP_BYTES, PermissionMap, build as build_permission_map};
pub use platform::Platform;
pub use range::{AccessRules, CONVENTIONAL_DENY_LIST, RangeSet, are_overlapping, is_accessible};

/// The bus the driver uses outside of tests.
#[cfg(feature = "io-test-mode")]
pub type DefaultBus = dio_ports::PatternPortBus;

/// The bus the driver uses outside of tests.
#[cfg(all(
    not(feature = "io-test-mode"),
    any(target_arch = "x86", target_arch = "x86_64")
))]
pub type DefaultBus = dio_ports::X86PortBus;

/// Build the [`DefaultBus`].
///
/// # Safety
/// Without `io-test-mode` this is real hardware: the caller must run with I/O
/// privilege, see [`dio_ports::X86PortBus::new`].
#[cfg(any(
    feature = "io-test-mode",
    any(target_arch = "x86", target_arch = "x86_64")
))]
#[must_use]
pub const unsafe fn default_bus() -> DefaultBus {
    #[cfg(feature = "io-test-mode")]
    {
        dio_ports::PatternPortBus
    }
    #[cfg(not(feature = "io-test-mode"))]
    unsafe {
        dio_ports::X86PortBus::new()
    }
}
