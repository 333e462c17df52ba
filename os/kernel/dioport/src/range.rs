//! Port range accessibility rules and the bounded range set.

use crate::error::InvalidReason;
use core::ops::Deref;
use dio_abi::{MAX_PORT_RANGES, PortRange, wire};

/// Ports of the conventional PC/AT devices. Never granted to a process,
/// whatever it asks for.
pub const CONVENTIONAL_DENY_LIST: [PortRange; 19] = [
    PortRange::new(0x0000, 0x001F), // DMA controller 1
    PortRange::new(0x0020, 0x0021), // PIC 1
    PortRange::new(0x0040, 0x0043), // PIT
    PortRange::new(0x0060, 0x0064), // keyboard controller, system control port B
    PortRange::new(0x0070, 0x0071), // CMOS/RTC
    PortRange::new(0x0080, 0x008F), // DMA page registers
    PortRange::new(0x00A0, 0x00A1), // PIC 2
    PortRange::new(0x00C0, 0x00DF), // DMA controller 2
    PortRange::new(0x00F0, 0x00FF), // math coprocessor
    PortRange::new(0x0170, 0x0177), // IDE secondary
    PortRange::new(0x01F0, 0x01F7), // IDE primary
    PortRange::new(0x02E8, 0x02EF), // COM4
    PortRange::new(0x02F8, 0x02FF), // COM2
    PortRange::new(0x0378, 0x037A), // LPT1
    PortRange::new(0x03B0, 0x03DF), // VGA
    PortRange::new(0x03E8, 0x03EF), // COM3
    PortRange::new(0x03F0, 0x03F7), // floppy controller
    PortRange::new(0x03F8, 0x03FF), // COM1
    PortRange::new(0x0CF8, 0x0CFF), // PCI configuration mechanism #1
];

/// Which rule decides whether a well-formed range is accessible.
#[derive(Debug, Copy, Clone)]
pub enum AccessRules<'a> {
    /// Anything that does not touch [`CONVENTIONAL_DENY_LIST`].
    DenyConventional,
    /// Only ranges lying entirely inside one of the given ranges (the ports
    /// assigned to the device at start).
    AllowList(&'a [PortRange]),
}

#[must_use]
pub fn is_accessible(range: &PortRange, rules: AccessRules<'_>) -> bool {
    if !range.is_well_formed() {
        return false;
    }
    match rules {
        AccessRules::DenyConventional => !CONVENTIONAL_DENY_LIST
            .iter()
            .any(|reserved| reserved.intersects(range)),
        AccessRules::AllowList(available) => available.iter().any(|a| a.encloses(range)),
    }
}

/// `true` iff two distinct entries share a port.
///
/// A malformed entry after the first position also makes the set count as
/// overlapping.
#[must_use]
pub fn are_overlapping(ranges: &[PortRange]) -> bool {
    ranges.iter().enumerate().any(|(i, first)| {
        ranges[i + 1..]
            .iter()
            .any(|later| !later.is_well_formed() || first.intersects(later))
    })
}

/// Up to [`MAX_PORT_RANGES`] ranges stored inline, so the request path never
/// allocates.
#[derive(Clone)]
pub struct RangeSet {
    len: usize,
    ranges: [PortRange; MAX_PORT_RANGES],
}

impl Default for RangeSet {
    fn default() -> Self {
        Self::new()
    }
}

impl RangeSet {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            len: 0,
            ranges: [PortRange::new(0, 0); MAX_PORT_RANGES],
        }
    }

    /// # Errors
    /// [`InvalidReason::TooManyRanges`] if the set is full.
    pub fn push(&mut self, range: PortRange) -> Result<(), InvalidReason> {
        let slot = self
            .ranges
            .get_mut(self.len)
            .ok_or(InvalidReason::TooManyRanges { count: self.len + 1 })?;
        *slot = range;
        self.len += 1;
        Ok(())
    }

    /// # Errors
    /// [`InvalidReason::TooManyRanges`] if `ranges` has more than
    /// [`MAX_PORT_RANGES`] entries.
    pub fn try_from_slice(ranges: &[PortRange]) -> Result<Self, InvalidReason> {
        if ranges.len() > MAX_PORT_RANGES {
            return Err(InvalidReason::TooManyRanges { count: ranges.len() });
        }
        let mut set = Self::new();
        set.ranges[..ranges.len()].copy_from_slice(ranges);
        set.len = ranges.len();
        Ok(set)
    }

    /// Read `count` ranges following the count prefix of `packet`.
    ///
    /// # Errors
    /// [`InvalidReason::TooManyRanges`] or [`InvalidReason::InputTooShort`].
    pub fn decode(packet: &[u8], count: usize) -> Result<Self, InvalidReason> {
        if count > MAX_PORT_RANGES {
            return Err(InvalidReason::TooManyRanges { count });
        }
        let mut set = Self::new();
        for (index, slot) in set.ranges[..count].iter_mut().enumerate() {
            *slot = wire::read_range(packet, index).map_err(|_| InvalidReason::InputTooShort {
                needed: dio_abi::ranges_header_len(count).unwrap_or(usize::MAX),
                available: packet.len(),
            })?;
        }
        set.len = count;
        Ok(set)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[PortRange] {
        &self.ranges[..self.len]
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }
}

impl Deref for RangeSet {
    type Target = [PortRange];

    fn deref(&self) -> &[PortRange] {
        self.as_slice()
    }
}

impl core::fmt::Debug for RangeSet {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}

impl PartialEq for RangeSet {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl Eq for RangeSet {}
