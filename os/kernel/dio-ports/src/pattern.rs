use crate::{PortBus, PortFault, check_span, dump_bytes};

/// The byte a [`PatternPortBus`] read yields at offset `index` of a span.
#[inline]
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub const fn pattern_byte(index: usize) -> u8 {
    let nibble = (index & 0x0F) as u8;
    (nibble << 4) | nibble
}

/// I/O test mode backend. Never touches hardware.
///
/// Reads fill the buffer with `0x00, 0x11, .., 0xFF, 0x00, ..` (restarting at
/// every span); writes are dumped to the debug log and dropped.
#[derive(Debug, Default, Copy, Clone)]
pub struct PatternPortBus;

impl PortBus for PatternPortBus {
    fn read(&self, port: u16, buf: &mut [u8]) -> Result<(), PortFault> {
        check_span(port, buf.len())?;
        for (i, byte) in buf.iter_mut().enumerate() {
            *byte = pattern_byte(i);
        }
        dump_bytes("read", port, buf);
        Ok(())
    }

    fn write(&self, port: u16, buf: &[u8]) -> Result<(), PortFault> {
        check_span(port, buf.len())?;
        dump_bytes("write", port, buf);
        Ok(())
    }
}
