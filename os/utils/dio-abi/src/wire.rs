//! Little-endian field access for request packets.
//!
//! Every accessor is bounds-checked and returns [`WireError`] instead of
//! panicking; callers validate packet sizes first and use these for the actual
//! field reads.

use crate::{COUNT_PREFIX_SIZE, PORT_RANGE_SIZE, PortRange, ranges_header_len};

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error("packet too short: {needed} bytes needed at offset {offset}")]
    Truncated { offset: usize, needed: usize },
}

#[inline]
fn span(buf_len: usize, offset: usize, needed: usize) -> Result<core::ops::Range<usize>, WireError> {
    let end = offset
        .checked_add(needed)
        .ok_or(WireError::Truncated { offset, needed })?;
    if end > buf_len {
        return Err(WireError::Truncated { offset, needed });
    }
    Ok(offset..end)
}

/// # Errors
/// [`WireError::Truncated`] if `buf` does not hold 2 bytes at `offset`.
#[inline]
pub fn read_u16_le(buf: &[u8], offset: usize) -> Result<u16, WireError> {
    let s = &buf[span(buf.len(), offset, 2)?];
    Ok(u16::from_le_bytes([s[0], s[1]]))
}

/// # Errors
/// [`WireError::Truncated`] if `buf` does not hold 4 bytes at `offset`.
#[inline]
pub fn read_u32_le(buf: &[u8], offset: usize) -> Result<u32, WireError> {
    let s = &buf[span(buf.len(), offset, 4)?];
    Ok(u32::from_le_bytes([s[0], s[1], s[2], s[3]]))
}

/// # Errors
/// [`WireError::Truncated`] if `buf` does not hold 4 bytes at `offset`.
#[inline]
pub fn write_u32_le(buf: &mut [u8], offset: usize, value: u32) -> Result<(), WireError> {
    let range = span(buf.len(), offset, 4)?;
    buf[range].copy_from_slice(&value.to_le_bytes());
    Ok(())
}

/// The `[count u32]` prefix of a range-carrying packet.
///
/// # Errors
/// [`WireError::Truncated`] if `buf` is shorter than the prefix.
#[inline]
pub fn read_count(buf: &[u8]) -> Result<u32, WireError> {
    read_u32_le(buf, 0)
}

/// The `index`-th range after the count prefix.
///
/// # Errors
/// [`WireError::Truncated`] if the range lies beyond `buf`.
pub fn read_range(buf: &[u8], index: usize) -> Result<PortRange, WireError> {
    let offset = index
        .checked_mul(PORT_RANGE_SIZE)
        .and_then(|o| o.checked_add(COUNT_PREFIX_SIZE))
        .ok_or(WireError::Truncated {
            offset: usize::MAX,
            needed: PORT_RANGE_SIZE,
        })?;
    let start = read_u16_le(buf, offset)?;
    let end = read_u16_le(buf, offset.saturating_add(2))?;
    Ok(PortRange::new(start, end))
}

/// Write `[count] [ranges]` into the front of `buf`, returning the header length.
///
/// # Errors
/// [`WireError::Truncated`] if `buf` cannot hold the header.
pub fn write_ranges(buf: &mut [u8], ranges: &[PortRange]) -> Result<usize, WireError> {
    let needed = ranges_header_len(ranges.len()).ok_or(WireError::Truncated {
        offset: 0,
        needed: usize::MAX,
    })?;
    let header = span(buf.len(), 0, needed)?;
    let header = &mut buf[header];

    #[allow(clippy::cast_possible_truncation)]
    header[..COUNT_PREFIX_SIZE].copy_from_slice(&(ranges.len() as u32).to_le_bytes());
    for (chunk, range) in header[COUNT_PREFIX_SIZE..]
        .chunks_exact_mut(PORT_RANGE_SIZE)
        .zip(ranges)
    {
        chunk[..2].copy_from_slice(&range.start.to_le_bytes());
        chunk[2..].copy_from_slice(&range.end.to_le_bytes());
    }
    Ok(needed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_are_little_endian() {
        let buf = [0x34, 0x12, 0x78, 0x56];
        assert_eq!(read_u16_le(&buf, 0), Ok(0x1234));
        assert_eq!(read_u32_le(&buf, 0), Ok(0x5678_1234));
    }

    #[test]
    fn short_buffers_are_reported() {
        let buf = [0u8; 3];
        assert_eq!(
            read_u32_le(&buf, 0),
            Err(WireError::Truncated { offset: 0, needed: 4 })
        );
        assert!(read_u16_le(&buf, usize::MAX).is_err());
    }

    #[test]
    fn ranges_follow_the_count() {
        let ranges = [PortRange::new(0x7000, 0x700F), PortRange::new(0x7020, 0x702F)];
        let mut buf = [0u8; 12];
        assert_eq!(write_ranges(&mut buf, &ranges), Ok(12));
        assert_eq!(&buf[..6], &[2, 0, 0, 0, 0x00, 0x70]);
        assert_eq!(read_count(&buf), Ok(2));
        assert_eq!(read_range(&buf, 1), Ok(ranges[1]));
        assert!(read_range(&buf, 2).is_err());
    }

    #[test]
    fn header_must_fit() {
        let ranges = [PortRange::single(0x80)];
        let mut buf = [0u8; 7];
        assert!(write_ranges(&mut buf, &ranges).is_err());
    }
}
