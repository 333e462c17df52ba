use core::fmt;

/// At most this many bytes of a transfer are traced.
pub const DUMP_LIMIT: usize = 16;

/// Formats the first [`DUMP_LIMIT`] bytes of a slice as space-separated hex,
/// with a trailing `..` if the slice was longer.
#[derive(Copy, Clone)]
pub struct HexPreview<'a>(pub &'a [u8]);

impl fmt::Display for HexPreview<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().take(DUMP_LIMIT).enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{byte:02x}")?;
        }
        if self.0.len() > DUMP_LIMIT {
            f.write_str(" ..")?;
        }
        Ok(())
    }
}

/// Trace a port transfer at `debug` level.
pub fn dump_bytes(what: &str, port: u16, bytes: &[u8]) {
    log::debug!(
        "{what} {} bytes at {port:#06x}: {}",
        bytes.len(),
        HexPreview(bytes)
    );
}
