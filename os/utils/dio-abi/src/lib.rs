//! # dioport wire contract
//!
//! Everything a user-mode client and the kernel-side driver must agree on:
//! port ranges, control codes, packet layouts, the runtime configuration
//! block and the completion status set.
//!
//! All multi-byte fields are **little-endian** and packed without padding.
//! Packets are never cast onto memory; they are read and written field by
//! field through the helpers in [`wire`], after their sizes are validated.
//!
//! ## Packet layouts
//!
//! ```text
//! GrantPortAccess     in : [count u32] [PortRange; count]
//!                     out: -
//! ResetPortAccess     in : -
//!                     out: -
//! ReadConfiguration   in : [version u32]
//!                     out: [version u32] [ConfigurationBlock]
//! WriteConfiguration  in : [version u32] [ConfigurationBlock]
//!                     out: [version u32] [ConfigurationBlock]
//! ReadPort            in : [range_count u32] [PortRange; range_count]
//!                     out: [range_count u32] [PortRange; range_count] [data]
//! WritePort           in : [range_count u32] [PortRange; range_count] [data]
//!                     out: [range_count u32] [PortRange; range_count]
//! ```
//!
//! A [`PortRange`] is `[start u16] [end u16]`, both inclusive.

#![cfg_attr(not(any(test, doctest)), no_std)]

mod config;
mod control;
mod range;
mod status;
pub mod wire;

pub use config::{CONFIGURATION_PACKET_SIZE, ConfigurationBits, ConfigurationBlock};
pub use control::{ControlCode, DEVICE_TYPE_DIO, Request, TransferMethod};
pub use range::PortRange;
pub use status::Status;

/// Maximum number of port ranges carried by a single request.
pub const MAX_PORT_RANGES: usize = 256;

/// Upper bound for the data payload of a single port read/write, in bytes.
///
/// This is the size of the whole port address space.
pub const MAX_DATA_LENGTH: usize = 0x1_0000;

/// Size of the `count`/`range_count` prefix of range-carrying packets.
pub const COUNT_PREFIX_SIZE: usize = size_of::<u32>();

/// Size of one encoded [`PortRange`].
pub const PORT_RANGE_SIZE: usize = 2 * size_of::<u16>();

/// The only configuration packet version understood by the driver.
pub const CONFIGURATION_VERSION1: u32 = 1;

/// Kernel name of the function device.
pub const DEVICE_NAME: &str = "\\Device\\Dioport";

/// User-visible alias of [`DEVICE_NAME`].
pub const DEVICE_LINK_NAME: &str = "\\DosDevices\\Dioport";

/// Length of the `[count] [ranges]` header for `count` ranges.
///
/// Returns `None` on arithmetic overflow.
#[inline]
#[must_use]
pub const fn ranges_header_len(count: usize) -> Option<usize> {
    match count.checked_mul(PORT_RANGE_SIZE) {
        Some(ranges) => ranges.checked_add(COUNT_PREFIX_SIZE),
        None => None,
    }
}
