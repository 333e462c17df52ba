//! The per-port permission bitmap and its builder.
//!
//! Layout matches the x86 TSS I/O permission bitmap: port `p` is bit `p % 8`
//! of byte `p / 8`, and a set bit means the port is **denied**. The byte image
//! ([`PermissionMap::as_bytes`]) can therefore be handed to the platform as the
//! process I/O access map unchanged.

use crate::error::{DioError, InvalidReason};
use crate::range::CONVENTIONAL_DENY_LIST;
use alloc::vec::Vec;
use dio_abi::{MAX_PORT_RANGES, PortRange};

/// Bytes in a full map (65536 ports, one bit each).
pub const MAP_BYTES: usize = 0x1_0000 / 8;

const DENY_ALL: u8 = 0xFF;
const ALLOW_ALL: u8 = 0x00;

#[derive(Clone, PartialEq, Eq)]
pub struct PermissionMap {
    bits: Vec<u8>,
}

impl PermissionMap {
    /// Allocate a fully denied map.
    ///
    /// # Errors
    /// [`DioError::InsufficientResources`] if the allocation fails.
    pub fn try_new() -> Result<Self, DioError> {
        let mut bits = Vec::new();
        bits.try_reserve_exact(MAP_BYTES)
            .map_err(|_| DioError::InsufficientResources {
                what: "permission map",
            })?;
        bits.resize(MAP_BYTES, DENY_ALL);
        Ok(Self { bits })
    }

    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bits
    }

    pub fn deny_all(&mut self) {
        self.bits.fill(DENY_ALL);
    }

    #[must_use]
    pub fn is_fully_denied(&self) -> bool {
        self.bits.iter().all(|&b| b == DENY_ALL)
    }

    #[inline]
    #[must_use]
    pub fn is_allowed(&self, port: u16) -> bool {
        let (byte, bit) = (usize::from(port) / 8, port % 8);
        self.bits[byte] & (1 << bit) == 0
    }

    /// Every port of `range` is allowed. `false` for malformed ranges.
    #[must_use]
    pub fn allows(&self, range: &PortRange) -> bool {
        range.is_well_formed() && (range.start..=range.end).all(|port| self.is_allowed(port))
    }

    pub fn allow(&mut self, range: &PortRange) {
        self.fill(range, false);
    }

    pub fn deny(&mut self, range: &PortRange) {
        self.fill(range, true);
    }

    /// Set or clear the bits of a well-formed range, whole bytes at a time
    /// where possible.
    fn fill(&mut self, range: &PortRange, denied: bool) {
        if !range.is_well_formed() {
            return;
        }
        let (start, end) = (usize::from(range.start), usize::from(range.end));
        let mut port = start;

        while port <= end && port % 8 != 0 {
            self.set_bit(port, denied);
            port += 1;
        }
        let whole_bytes_end = (end + 1) / 8;
        if port / 8 < whole_bytes_end {
            self.bits[port / 8..whole_bytes_end].fill(if denied { DENY_ALL } else { ALLOW_ALL });
            port = whole_bytes_end * 8;
        }
        while port <= end {
            self.set_bit(port, denied);
            port += 1;
        }
    }

    #[inline]
    fn set_bit(&mut self, port: usize, denied: bool) {
        let mask = 1u8 << (port % 8);
        if denied {
            self.bits[port / 8] |= mask;
        } else {
            self.bits[port / 8] &= !mask;
        }
    }
}

impl core::fmt::Debug for PermissionMap {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let allowed = self.bits.iter().map(|b| b.count_zeros()).sum::<u32>();
        f.debug_struct("PermissionMap")
            .field("allowed_ports", &allowed)
            .finish()
    }
}

/// Rebuild `map` from scratch.
///
/// Starts from deny-all, clears the bits of every requested range (malformed
/// entries are skipped with a warning), then sets the conventional deny-list
/// again so it always wins. `None` leaves the map fully denied.
///
/// Not reentrant: callers hold the configuration lock.
///
/// # Errors
/// [`InvalidReason::TooManyRanges`] if more than [`MAX_PORT_RANGES`] ranges
/// are requested; the map is left untouched in that case.
pub fn build(map: &mut PermissionMap, requested: Option<&[PortRange]>) -> Result<(), DioError> {
    if let Some(ranges) = requested
        && ranges.len() > MAX_PORT_RANGES
    {
        return Err(InvalidReason::TooManyRanges {
            count: ranges.len(),
        }
        .into());
    }

    map.deny_all();
    let Some(ranges) = requested else {
        log::debug!("permission map reset to deny-all");
        return Ok(());
    };

    for (index, range) in ranges.iter().enumerate() {
        if range.is_well_formed() {
            map.allow(range);
        } else {
            log::warn!("ignoring malformed range #{index} {range:?}");
        }
    }
    for reserved in &CONVENTIONAL_DENY_LIST {
        map.deny(reserved);
    }
    log::debug!("permission map rebuilt from {} ranges: {map:?}", ranges.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_map_denies_everything() {
        let map = PermissionMap::try_new().unwrap();
        assert_eq!(map.as_bytes().len(), 8192);
        assert!(map.is_fully_denied());
        assert!(!map.is_allowed(0x7000));
    }

    #[test]
    fn fill_handles_unaligned_edges() {
        let mut map = PermissionMap::try_new().unwrap();
        map.allow(&PortRange::new(0x7003, 0x7019));
        assert!(!map.is_allowed(0x7002));
        assert!(map.allows(&PortRange::new(0x7003, 0x7019)));
        assert!(!map.is_allowed(0x701A));

        map.allow(&PortRange::new(0xFFF8, 0xFFFF));
        assert!(map.is_allowed(0xFFFF));
        map.deny(&PortRange::single(0xFFFF));
        assert!(!map.is_allowed(0xFFFF));
        assert!(map.is_allowed(0xFFFE));
    }

    #[test]
    fn deny_list_wins_over_request() {
        let mut map = PermissionMap::try_new().unwrap();
        build(&mut map, Some(&[PortRange::new(0x0000, 0x0FFF)])).unwrap();
        assert!(!map.is_allowed(0x0060));
        assert!(!map.is_allowed(0x0CF8));
        assert!(map.is_allowed(0x0300));
        assert!(!map.is_allowed(0x1000));
    }

    #[test]
    fn malformed_entries_are_skipped() {
        let mut map = PermissionMap::try_new().unwrap();
        let ranges = [PortRange::new(0x7010, 0x7000), PortRange::single(0x7020)];
        build(&mut map, Some(&ranges)).unwrap();
        assert!(!map.is_allowed(0x7005));
        assert!(map.is_allowed(0x7020));
    }

    #[test]
    fn too_many_ranges_leave_map_untouched() {
        let mut map = PermissionMap::try_new().unwrap();
        build(&mut map, Some(&[PortRange::single(0x7000)])).unwrap();
        let before = map.clone();
        let ranges = [PortRange::single(0x7100); MAX_PORT_RANGES + 1];
        assert_eq!(
            build(&mut map, Some(&ranges)),
            Err(DioError::Invalid(InvalidReason::TooManyRanges { count: 257 }))
        );
        assert!(map == before);
    }

    #[test]
    fn rebuilds_are_idempotent() {
        let ranges = [PortRange::new(0x7000, 0x700F), PortRange::new(0x7020, 0x702F)];
        let mut once = PermissionMap::try_new().unwrap();
        build(&mut once, Some(&ranges)).unwrap();
        let mut twice = once.clone();
        build(&mut twice, Some(&ranges)).unwrap();
        assert!(once == twice);

        build(&mut twice, None).unwrap();
        assert!(twice.is_fully_denied());
        build(&mut twice, None).unwrap();
        assert!(twice.is_fully_denied());
    }
}
