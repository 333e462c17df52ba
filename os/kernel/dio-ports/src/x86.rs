use crate::{PortBus, PortFault, check_span};

/// Write one byte to an I/O port (`out dx, al`).
///
/// # Safety
/// - **Privilege:** CPL0, or an I/O permission (IOPL/IO bitmap) covering
///   `port`; otherwise the CPU raises `#GP`.
/// - **Correct port:** writing the wrong register can wedge the device or the
///   machine (PIC, PIT, keyboard controller).
/// - **Ordering:** `out` is ordered against other port I/O only, not against
///   normal memory.
#[inline]
pub unsafe fn outb(port: u16, val: u8) {
    unsafe {
        core::arch::asm!("out dx, al", in("dx") port, in("al") val, options(nomem, nostack, preserves_flags));
    }
}

/// Read one byte from an I/O port (`in al, dx`).
///
/// # Safety
/// Same requirements as [`outb`]; in addition, reading some status registers
/// has side effects on the device.
#[inline]
pub unsafe fn inb(port: u16) -> u8 {
    let mut v: u8;
    unsafe {
        core::arch::asm!("in al, dx", in("dx") port, out("al") v, options(nomem, nostack, preserves_flags));
    }
    v
}

/// Real hardware: one `in`/`out` per byte.
#[derive(Debug)]
pub struct X86PortBus {
    _private: (),
}

impl X86PortBus {
    /// # Safety
    /// The caller must run with I/O privilege for every port that will be
    /// passed to [`PortBus::read`]/[`PortBus::write`], and must have decided
    /// (through the driver's access policy) that touching those ports is
    /// acceptable.
    #[must_use]
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl PortBus for X86PortBus {
    #[allow(clippy::cast_possible_truncation)]
    fn read(&self, port: u16, buf: &mut [u8]) -> Result<(), PortFault> {
        check_span(port, buf.len())?;
        for (i, byte) in buf.iter_mut().enumerate() {
            // Safety: privilege guaranteed by `new`; the span was checked above.
            *byte = unsafe { inb(port + i as u16) };
        }
        Ok(())
    }

    #[allow(clippy::cast_possible_truncation)]
    fn write(&self, port: u16, buf: &[u8]) -> Result<(), PortFault> {
        check_span(port, buf.len())?;
        for (i, &byte) in buf.iter().enumerate() {
            // Safety: see `read`.
            unsafe { outb(port + i as u16, byte) };
        }
        Ok(())
    }
}
