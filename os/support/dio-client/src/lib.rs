//! # dioport client
//!
//! Builds the driver's request packets from a set of registered port ranges
//! and moves payloads through XOR masks, so applications deal in plain byte
//! buffers.
//!
//! ```text
//! app buffer ──XOR write mask──▶ [count][ranges][data] ──▶ Transport ──▶ driver
//! app buffer ◀──XOR read mask─── [count][ranges][data] ◀──
//! ```
//!
//! The [`Transport`] is whatever delivers a device-control request to the
//! driver: a handle to the device on a real system, or the driver itself in
//! tests.

#![cfg_attr(not(any(test, doctest)), no_std)]

extern crate alloc;

mod client;

pub use client::{DEFAULT_READ_XOR_MASK, DEFAULT_WRITE_XOR_MASK, DioClient};

use dio_abi::{ControlCode, PortRange, Status, wire::WireError};

/// Delivers one device-control request.
pub trait Transport {
    /// Send `input`, receive into `output`; returns the number of valid bytes
    /// in `output`.
    ///
    /// # Errors
    /// The driver's completion status when it is not success.
    fn control(&mut self, code: ControlCode, input: &[u8], output: &mut [u8])
    -> Result<usize, Status>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn control(
        &mut self,
        code: ControlCode,
        input: &[u8],
        output: &mut [u8],
    ) -> Result<usize, Status> {
        (**self).control(code, input, output)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    #[error("{count} ranges given, at most 256 can be registered")]
    TooManyRanges { count: usize },
    #[error("registered range #{index} {range:?} has start above end")]
    MalformedRange { index: usize, range: PortRange },
    #[error("buffer holds {available} bytes, the registered ranges need {needed}")]
    BufferTooSmall { needed: usize, available: usize },
    #[error("driver answered {returned} bytes, expected {expected}")]
    LengthMismatch { expected: usize, returned: usize },
    #[error("request packet could not be framed: {0}")]
    Framing(#[from] WireError),
    #[error("driver failed the request: {0}")]
    Driver(#[from] Status),
}
