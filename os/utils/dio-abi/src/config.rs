use crate::wire::{self, WireError};
use crate::CONFIGURATION_VERSION1;
use bitfield_struct::bitfield;

/// Runtime feature switches of the driver.
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct ConfigurationBits {
    /// Emit `Debug`/`Trace` log records (bit 0).
    pub show_debug_output: bool,
    /// Permit the ranges of a single port request to overlap (bit 1).
    pub allow_range_overlap: bool,
    /// Reserved (bits 2..31); ignored on write, reported as zero.
    #[bits(30)]
    __reserved: u32,
}

impl ConfigurationBits {
    /// The bits a client may set.
    pub const KNOWN_MASK: u32 = 0b11;

    /// Drop all reserved bits.
    #[must_use]
    pub const fn sanitized(self) -> Self {
        Self::from_bits(self.into_bits() & Self::KNOWN_MASK)
    }
}

/// The versioned configuration block carried by the configuration requests.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct ConfigurationBlock {
    pub configuration_bits: ConfigurationBits,
}

/// `[version u32] [ConfigurationBlock]`.
pub const CONFIGURATION_PACKET_SIZE: usize = size_of::<u32>() + ConfigurationBlock::SIZE;

impl ConfigurationBlock {
    /// Encoded size of the block alone.
    pub const SIZE: usize = size_of::<u32>();

    #[must_use]
    pub const fn new(configuration_bits: ConfigurationBits) -> Self {
        Self { configuration_bits }
    }

    /// Parse the block that follows the version tag of a configuration packet.
    ///
    /// # Errors
    /// [`WireError::Truncated`] if `packet` is shorter than
    /// [`CONFIGURATION_PACKET_SIZE`].
    pub fn decode(packet: &[u8]) -> Result<Self, WireError> {
        let bits = wire::read_u32_le(packet, size_of::<u32>())?;
        Ok(Self::new(ConfigurationBits::from_bits(bits)))
    }

    /// Write `[CONFIGURATION_VERSION1] [block]` into the front of `packet`.
    ///
    /// # Errors
    /// [`WireError::Truncated`] if `packet` is shorter than
    /// [`CONFIGURATION_PACKET_SIZE`].
    pub fn encode(&self, packet: &mut [u8]) -> Result<usize, WireError> {
        wire::write_u32_le(packet, 0, CONFIGURATION_VERSION1)?;
        wire::write_u32_le(
            packet,
            size_of::<u32>(),
            self.configuration_bits.into_bits(),
        )?;
        Ok(CONFIGURATION_PACKET_SIZE)
    }
}
