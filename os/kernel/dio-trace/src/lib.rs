//! # dioport tracing
//!
//! A `log::Log` implementation for the driver. Records at `Info` and above are
//! always written; `Debug` and `Trace` records are written only while the
//! runtime "show debug output" switch is on. The switch follows the
//! `show_debug_output` bit of the driver configuration and can be flipped at
//! any time without re-installing the logger.
//!
//! ## Sinks
//!
//! Output goes to a [`Sink`], a plain function receiving pre-formatted
//! arguments, so nothing is allocated on the logging path.
//!
//! * With the `qemu` feature (default) on x86, [`qemu::debug_port_sink`]
//!   writes to QEMU's debug console at port `0x402`
//!   (`qemu-system-x86_64 -debugcon stdio`).
//! * Hosts and tests install their own function through
//!   [`DioLogger::with_sink`].
//!
//! ## Usage
//!
//! ```rust,no_run
//! use dio_trace::DioLogger;
//! use log::LevelFilter;
//!
//! DioLogger::new(LevelFilter::Trace).install().expect("logger installed once");
//! dio_trace::set_show_debug_output(true);
//! log::debug!("now visible");
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod logger;

pub use logger::{DioLogger, Sink, TraceError, set_show_debug_output, show_debug_output};

#[cfg(all(feature = "qemu", any(target_arch = "x86", target_arch = "x86_64")))]
pub mod qemu {
    use core::fmt::{self, Write};

    /// QEMU's `-debugcon` port.
    pub const QEMU_DEBUG_PORT: u16 = 0x402;

    struct DebugPort;

    impl Write for DebugPort {
        #[inline]
        fn write_str(&mut self, s: &str) -> fmt::Result {
            for b in s.bytes() {
                // Safety: the debug console port is write-only and side-effect
                // free on hardware that does not decode it.
                unsafe { dio_ports::outb(QEMU_DEBUG_PORT, b) }
            }
            Ok(())
        }
    }

    /// Best-effort write of `args` to the debug console.
    pub fn debug_port_sink(args: fmt::Arguments<'_>) {
        let _ = fmt::write(&mut DebugPort, args);
    }
}

/// Discards everything. Default sink when no debug console is available.
pub const fn null_sink(_: core::fmt::Arguments<'_>) {}
