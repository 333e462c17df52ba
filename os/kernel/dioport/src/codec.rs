//! Request validation.
//!
//! Every function here only reads the caller's buffers and returns a plan; it
//! never touches device state. All size arithmetic is checked and completes
//! before any field beyond the fixed prefix is interpreted.

use crate::error::{DioError, InvalidReason};
use crate::range::RangeSet;
use dio_abi::{
    CONFIGURATION_PACKET_SIZE, CONFIGURATION_VERSION1, COUNT_PREFIX_SIZE, ConfigurationBlock,
    ControlCode, MAX_DATA_LENGTH, MAX_PORT_RANGES, PortRange, Request, TransferMethod,
    ranges_header_len, wire,
};

/// The request named by `code`, if it is ours and uses buffered transfer.
///
/// # Errors
/// [`DioError::Unsupported`] otherwise.
pub fn validate_control_code(code: ControlCode) -> Result<Request, DioError> {
    let unsupported = DioError::Unsupported {
        code: code.into_bits(),
    };
    let request = code.request().ok_or(unsupported)?;
    if code.transfer_method() != TransferMethod::Buffered {
        return Err(unsupported);
    }
    Ok(request)
}

#[inline]
const fn need_input(needed: usize, available: usize) -> Result<(), InvalidReason> {
    if needed > available {
        Err(InvalidReason::InputTooShort { needed, available })
    } else {
        Ok(())
    }
}

#[inline]
const fn need_output(needed: usize, available: usize) -> Result<(), InvalidReason> {
    if needed > available {
        Err(InvalidReason::OutputTooShort { needed, available })
    } else {
        Ok(())
    }
}

/// Range count from the prefix, bounded by [`MAX_PORT_RANGES`], and the length
/// of the `[count] [ranges]` header it implies.
fn ranges_header(input: &[u8]) -> Result<(usize, usize), InvalidReason> {
    need_input(COUNT_PREFIX_SIZE, input.len())?;
    let count = wire::read_count(input).map_err(|_| InvalidReason::InputTooShort {
        needed: COUNT_PREFIX_SIZE,
        available: input.len(),
    })?;
    let count = usize::try_from(count).map_err(|_| InvalidReason::Overflow)?;
    if count > MAX_PORT_RANGES {
        return Err(InvalidReason::TooManyRanges { count });
    }
    let header_len = ranges_header_len(count).ok_or(InvalidReason::Overflow)?;
    need_input(header_len, input.len())?;
    Ok((count, header_len))
}

/// Parse a `GrantPortAccess` packet.
///
/// # Errors
/// [`DioError::Invalid`] when the packet is shorter than its count prefix, the
/// count exceeds [`MAX_PORT_RANGES`], or the ranges run past the input.
pub fn decode_grant(input: &[u8]) -> Result<RangeSet, DioError> {
    let (count, _) = ranges_header(input)?;
    Ok(RangeSet::decode(input, count)?)
}

/// Check a configuration request; for a write, return the block to store.
///
/// # Errors
/// [`DioError::Invalid`] on a short buffer or an unknown version tag.
pub fn validate_configuration(
    write: bool,
    input: &[u8],
    output_len: usize,
) -> Result<Option<ConfigurationBlock>, DioError> {
    need_input(size_of::<u32>(), input.len())?;
    let version = wire::read_u32_le(input, 0).map_err(|_| InvalidReason::Overflow)?;
    if version != CONFIGURATION_VERSION1 {
        return Err(InvalidReason::BadVersion { version }.into());
    }
    need_output(CONFIGURATION_PACKET_SIZE, output_len)?;
    if !write {
        return Ok(None);
    }
    need_input(CONFIGURATION_PACKET_SIZE, input.len())?;
    let block = ConfigurationBlock::decode(input).map_err(|_| InvalidReason::InputTooShort {
        needed: CONFIGURATION_PACKET_SIZE,
        available: input.len(),
    })?;
    Ok(Some(block))
}

/// A validated port read/write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortIoPlan {
    pub ranges: RangeSet,
    /// Length of the `[range_count] [ranges]` header.
    pub header_len: usize,
    /// Sum of the spans of the accessible ranges.
    pub data_len: usize,
}

impl PortIoPlan {
    /// Where the payload lives: after the header of the output (read) or the
    /// input (write).
    #[must_use]
    pub const fn data_window(&self) -> core::ops::Range<usize> {
        self.header_len..self.header_len + self.data_len
    }
}

/// Validate a `ReadPort`/`WritePort` packet.
///
/// Inaccessible ranges contribute nothing to the payload length. The request is
/// refused unless all of the following hold:
///
/// 1. the input holds the count prefix,
/// 2. the count is at most [`MAX_PORT_RANGES`],
/// 3. the input holds the full range header,
/// 4. the payload is at most [`MAX_DATA_LENGTH`] bytes,
/// 5. the input holds the header (and, for writes, the payload),
/// 6. the output holds the header (and, for reads, the payload).
///
/// # Errors
/// [`DioError::Invalid`] naming the first violated condition.
pub fn plan_port_io(
    write: bool,
    input: &[u8],
    output_len: usize,
    is_accessible: impl Fn(&PortRange) -> bool,
) -> Result<PortIoPlan, DioError> {
    let (count, header_len) = ranges_header(input)?;
    let ranges = RangeSet::decode(input, count)?;

    let mut data_len = 0usize;
    for range in ranges.iter().filter(|r| is_accessible(r)) {
        let span = usize::try_from(range.len()).map_err(|_| InvalidReason::Overflow)?;
        data_len = data_len.checked_add(span).ok_or(InvalidReason::Overflow)?;
    }
    if data_len > MAX_DATA_LENGTH {
        return Err(InvalidReason::DataTooLong { len: data_len }.into());
    }

    let with_data = header_len.checked_add(data_len).ok_or(InvalidReason::Overflow)?;
    let (input_needed, output_needed) = if write {
        (with_data, header_len)
    } else {
        (header_len, with_data)
    };
    need_input(input_needed, input.len())?;
    need_output(output_needed, output_len)?;

    Ok(PortIoPlan {
        ranges,
        header_len,
        data_len,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use dio_abi::ConfigurationBits;

    fn packet(ranges: &[PortRange], payload: usize) -> Vec<u8> {
        let mut buf = vec![0u8; ranges_header_len(ranges.len()).unwrap() + payload];
        wire::write_ranges(&mut buf, ranges).unwrap();
        buf
    }

    fn everything(_: &PortRange) -> bool {
        true
    }

    #[test]
    fn control_code_must_be_ours_and_buffered() {
        let code = Request::ReadPort.control_code();
        assert_eq!(validate_control_code(code), Ok(Request::ReadPort));
        assert!(matches!(
            validate_control_code(code.with_method(TransferMethod::Neither as u8)),
            Err(DioError::Unsupported { .. })
        ));
        assert!(validate_control_code(code.with_function(0x900)).is_err());
    }

    #[test]
    fn grant_checks_count_and_length() {
        let ranges = [PortRange::new(0x7000, 0x700F)];
        assert_eq!(decode_grant(&packet(&ranges, 0)).unwrap().as_slice(), &ranges);
        assert!(decode_grant(&[1, 0, 0]).is_err());
        let truncated = &packet(&ranges, 0)[..7];
        assert!(decode_grant(truncated).is_err());
        let mut too_many = packet(&[], 0);
        too_many[..4].copy_from_slice(&257u32.to_le_bytes());
        assert_eq!(
            decode_grant(&too_many),
            Err(DioError::Invalid(InvalidReason::TooManyRanges { count: 257 }))
        );
        assert!(decode_grant(&packet(&[], 0)).unwrap().is_empty());
    }

    #[test]
    fn configuration_version_and_sizes() {
        let mut input = [0u8; CONFIGURATION_PACKET_SIZE];
        ConfigurationBlock::new(ConfigurationBits::new().with_allow_range_overlap(true))
            .encode(&mut input)
            .unwrap();
        assert_eq!(validate_configuration(false, &input[..4], 8), Ok(None));
        assert!(validate_configuration(false, &input[..4], 7).is_err());
        let block = validate_configuration(true, &input, 8).unwrap().unwrap();
        assert!(block.configuration_bits.allow_range_overlap());
        assert!(validate_configuration(true, &input[..4], 8).is_err());

        input[0] = 2;
        assert_eq!(
            validate_configuration(false, &input, 8),
            Err(DioError::Invalid(InvalidReason::BadVersion { version: 2 }))
        );
    }

    #[test]
    fn read_plan_sizes_output() {
        let ranges = [PortRange::new(0x7000, 0x700F), PortRange::new(0x7020, 0x702F)];
        let input = packet(&ranges, 0);
        let plan = plan_port_io(false, &input, 12 + 32, everything).unwrap();
        assert_eq!(plan.header_len, 12);
        assert_eq!(plan.data_len, 32);
        assert_eq!(plan.data_window(), 12..44);
        assert!(plan_port_io(false, &input, 12 + 31, everything).is_err());
    }

    #[test]
    fn write_plan_sizes_input() {
        let ranges = [PortRange::new(0x7000, 0x7003)];
        let input = packet(&ranges, 4);
        assert!(plan_port_io(true, &input, 8, everything).is_ok());
        assert!(plan_port_io(true, &input[..11], 8, everything).is_err());
        assert!(plan_port_io(true, &input, 7, everything).is_err());
    }

    #[test]
    fn inaccessible_ranges_carry_no_payload() {
        let ranges = [PortRange::new(0x7000, 0x700F), PortRange::single(0x0060)];
        let input = packet(&ranges, 0);
        let plan = plan_port_io(false, &input, 12 + 16, |r| r.start >= 0x1000).unwrap();
        assert_eq!(plan.data_len, 16);
    }

    #[test]
    fn payload_is_bounded_by_port_space() {
        let ranges = [PortRange::new(0, 0xFFFF), PortRange::single(0x7000)];
        let input = packet(&ranges, 0);
        assert_eq!(
            plan_port_io(false, &input, usize::MAX, everything),
            Err(DioError::Invalid(InvalidReason::DataTooLong { len: 0x1_0001 }))
        );
        let whole = packet(&[PortRange::new(0, 0xFFFF)], 0);
        assert_eq!(
            plan_port_io(false, &whole, usize::MAX, everything)
                .unwrap()
                .data_len,
            0x1_0000
        );
    }
}
