use core::fmt;

/// An inclusive range of I/O port addresses.
///
/// A range is *well-formed* iff `start <= end`. Malformed ranges are not an
/// error at this level; consumers treat them as inaccessible.
#[repr(C)]
#[derive(Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct PortRange {
    /// First port address of the range.
    pub start: u16,
    /// Last port address of the range (inclusive).
    pub end: u16,
}

impl PortRange {
    #[must_use]
    pub const fn new(start: u16, end: u16) -> Self {
        Self { start, end }
    }

    /// A range covering exactly one port.
    #[must_use]
    pub const fn single(port: u16) -> Self {
        Self::new(port, port)
    }

    #[inline]
    #[must_use]
    pub const fn is_well_formed(&self) -> bool {
        self.start <= self.end
    }

    /// Number of ports covered, or `0` for a malformed range.
    ///
    /// The result is `u32` because `0x0000..=0xFFFF` spans 65536 ports.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> u32 {
        if self.is_well_formed() {
            self.end as u32 - self.start as u32 + 1
        } else {
            0
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        !self.is_well_formed()
    }

    #[inline]
    #[must_use]
    pub const fn contains(&self, port: u16) -> bool {
        self.start <= port && port <= self.end
    }

    /// Whether `other` lies entirely inside `self`.
    #[inline]
    #[must_use]
    pub const fn encloses(&self, other: &Self) -> bool {
        other.is_well_formed() && self.start <= other.start && other.end <= self.end
    }

    /// Whether the two ranges share at least one port address.
    #[inline]
    #[must_use]
    pub const fn intersects(&self, other: &Self) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

impl fmt::Debug for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}-{:#06x}", self.start, self.end)
    }
}

impl From<core::ops::RangeInclusive<u16>> for PortRange {
    fn from(value: core::ops::RangeInclusive<u16>) -> Self {
        Self::new(*value.start(), *value.end())
    }
}
