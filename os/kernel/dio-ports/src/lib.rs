//! # I/O port backends
//!
//! The x86 I/O port space is a separate 16-bit address space (`0x0000..=0xFFFF`)
//! reached through the `in`/`out` instructions. The driver core never issues
//! those instructions itself; it moves bytes through a [`PortBus`], which lets
//! the same engine run against real hardware, a deterministic test pattern, or
//! a recording mock.
//!
//! ## Backends
//!
//! * [`X86PortBus`] (x86/x86-64 only): byte-wise `in al, dx` / `out dx, al`.
//! * [`PatternPortBus`]: reads produce a fixed byte pattern, writes are traced
//!   and discarded. Used for bring-up without touching hardware.
//!
//! ## Transfer shape
//!
//! A transfer covers `buf.len()` consecutive port addresses starting at
//! `port`; byte `i` of the buffer belongs to port `port + i`. A span that runs
//! past `0xFFFF` is refused with [`PortFault::OutOfRange`] before any port is
//! touched.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod dump;
mod pattern;
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
mod x86;

pub use dump::{DUMP_LIMIT, HexPreview, dump_bytes};
pub use pattern::{PatternPortBus, pattern_byte};
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
pub use x86::{X86PortBus, inb, outb};

/// Size of the I/O port address space.
pub const PORT_SPACE_SIZE: u32 = 0x1_0000;

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortFault {
    #[error("port span {port:#06x}+{len:#x} exceeds the I/O address space")]
    OutOfRange { port: u16, len: usize },
    #[error("device did not respond at port {port:#06x}")]
    NoResponse { port: u16 },
}

/// Byte-wise access to a contiguous block of I/O ports.
pub trait PortBus {
    /// Fill `buf` from ports `port..port + buf.len()`.
    ///
    /// # Errors
    /// A [`PortFault`] if the span is out of range or the hardware fails.
    fn read(&self, port: u16, buf: &mut [u8]) -> Result<(), PortFault>;

    /// Write `buf` to ports `port..port + buf.len()`.
    ///
    /// # Errors
    /// A [`PortFault`] if the span is out of range or the hardware fails.
    fn write(&self, port: u16, buf: &[u8]) -> Result<(), PortFault>;
}

impl<B: PortBus + ?Sized> PortBus for &B {
    fn read(&self, port: u16, buf: &mut [u8]) -> Result<(), PortFault> {
        (**self).read(port, buf)
    }

    fn write(&self, port: u16, buf: &[u8]) -> Result<(), PortFault> {
        (**self).write(port, buf)
    }
}

/// Refuse spans that would wrap past the top of the port space.
///
/// # Errors
/// [`PortFault::OutOfRange`] if `port + len > 0x10000`.
#[inline]
pub const fn check_span(port: u16, len: usize) -> Result<(), PortFault> {
    let fits = match (port as usize).checked_add(len) {
        Some(end) => end <= PORT_SPACE_SIZE as usize,
        None => false,
    };
    if fits {
        Ok(())
    } else {
        Err(PortFault::OutOfRange { port, len })
    }
}
