use crate::error::{InvalidReason, TransferError};
use crate::range::are_overlapping;
use core::ops::Range;
use dio_abi::{MAX_DATA_LENGTH, MAX_PORT_RANGES, PortRange};
use dio_ports::{PortBus, PortFault};
use dio_sync::SpinLock;

/// What a [`PortIoEngine::transfer`] does with the ranges.
#[derive(Debug)]
pub enum TransferMode<'a> {
    /// Validate only; never touches the bus.
    Probe,
    Read(&'a mut [u8]),
    Write(&'a [u8]),
}

/// Moves bytes between caller buffers and the port bus, one transaction at a
/// time.
///
/// The bus sits behind the engine's spin lock, which is held for the whole
/// per-range loop of a transfer. Two transfers therefore never interleave at
/// byte level.
#[derive(Debug)]
pub struct PortIoEngine<B> {
    bus: SpinLock<B>,
}

impl<B: PortBus> PortIoEngine<B> {
    pub const fn new(bus: B) -> Self {
        Self {
            bus: SpinLock::new(bus),
        }
    }

    /// Transfer `ranges` in order.
    ///
    /// All-or-nothing across ranges for anything detectable up front: too many
    /// ranges, overlap (unless `allow_overlap`), any range failing
    /// `is_accessible`, a data transfer of 64 KiB or more, or a buffer shorter
    /// than the summed spans. A bus fault
    /// mid-loop stops the loop and reports how many bytes the earlier ranges
    /// moved.
    ///
    /// Returns the number of bytes moved; `0` for [`TransferMode::Probe`].
    ///
    /// # Errors
    /// [`TransferError::Invalid`] before any bus access,
    /// [`TransferError::Hardware`] on a bus fault.
    pub fn transfer(
        &self,
        ranges: &[PortRange],
        allow_overlap: bool,
        is_accessible: impl Fn(&PortRange) -> bool,
        mode: TransferMode<'_>,
    ) -> Result<usize, TransferError> {
        if ranges.len() > MAX_PORT_RANGES {
            return Err(InvalidReason::TooManyRanges {
                count: ranges.len(),
            }
            .into());
        }
        if !allow_overlap && are_overlapping(ranges) {
            return Err(InvalidReason::OverlappingRanges.into());
        }
        if let Some(range) = ranges.iter().find(|r| !is_accessible(r)) {
            log::debug!("transfer refused, {range:?} is not accessible");
            return Err(InvalidReason::InaccessibleRange { range: *range }.into());
        }

        let total = ranges
            .iter()
            .try_fold(0usize, |sum, r| {
                usize::try_from(r.len()).ok().and_then(|n| sum.checked_add(n))
            })
            .ok_or(InvalidReason::Overflow)?;
        if !matches!(mode, TransferMode::Probe) && total >= MAX_DATA_LENGTH {
            return Err(InvalidReason::DataTooLong { len: total }.into());
        }

        let short = match &mode {
            TransferMode::Probe => return Ok(0),
            TransferMode::Read(buf) if buf.len() < total => Some(InvalidReason::OutputTooShort {
                needed: total,
                available: buf.len(),
            }),
            TransferMode::Write(buf) if buf.len() < total => Some(InvalidReason::InputTooShort {
                needed: total,
                available: buf.len(),
            }),
            TransferMode::Read(_) | TransferMode::Write(_) => None,
        };
        if let Some(reason) = short {
            return Err(reason.into());
        }

        let bus = self.bus.lock();
        let done = match mode {
            TransferMode::Probe => 0,
            TransferMode::Read(buf) => {
                each_range(ranges, |port, window| bus.read(port, &mut buf[window]))?
            }
            TransferMode::Write(buf) => {
                each_range(ranges, |port, window| bus.write(port, &buf[window]))?
            }
        };
        drop(bus);

        log::debug!("{done} bytes transferred over {} ranges", ranges.len());
        Ok(done)
    }
}

/// Run `op` over consecutive buffer windows, one per range, stopping at the
/// first fault.
fn each_range(
    ranges: &[PortRange],
    mut op: impl FnMut(u16, Range<usize>) -> Result<(), PortFault>,
) -> Result<usize, TransferError> {
    let mut done = 0usize;
    for range in ranges {
        let len = range.len() as usize;
        op(range.start, done..done + len).map_err(|fault| {
            log::warn!("bus fault at {range:?} after {done} bytes: {fault}");
            TransferError::Hardware {
                transferred: done,
                fault,
            }
        })?;
        done += len;
    }
    Ok(done)
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;
    use dio_ports::PatternPortBus;

    struct CountingBus<'a> {
        calls: &'a Cell<usize>,
    }

    impl PortBus for CountingBus<'_> {
        fn read(&self, _port: u16, buf: &mut [u8]) -> Result<(), PortFault> {
            self.calls.set(self.calls.get() + 1);
            buf.fill(0xA5);
            Ok(())
        }

        fn write(&self, _port: u16, _buf: &[u8]) -> Result<(), PortFault> {
            self.calls.set(self.calls.get() + 1);
            Ok(())
        }
    }

    fn all(_: &PortRange) -> bool {
        true
    }

    #[test]
    fn probe_never_touches_the_bus() {
        let calls = Cell::new(0);
        let engine = PortIoEngine::new(CountingBus { calls: &calls });
        let ranges = [PortRange::new(0x7000, 0x700F)];
        assert_eq!(engine.transfer(&ranges, false, all, TransferMode::Probe), Ok(0));
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn reads_fill_consecutive_windows() {
        let engine = PortIoEngine::new(PatternPortBus);
        let ranges = [PortRange::new(0x7000, 0x7001), PortRange::new(0x7010, 0x7012)];
        let mut buf = [0u8; 6];
        let n = engine
            .transfer(&ranges, false, all, TransferMode::Read(&mut buf))
            .unwrap();
        assert_eq!(n, 5);
        assert_eq!(buf, [0x00, 0x11, 0x00, 0x11, 0x22, 0x00]);
    }

    #[test]
    fn overlap_is_gated_by_flag() {
        let calls = Cell::new(0);
        let engine = PortIoEngine::new(CountingBus { calls: &calls });
        let ranges = [PortRange::new(0x7000, 0x7003), PortRange::new(0x7002, 0x7005)];
        let mut buf = [0u8; 8];
        assert_eq!(
            engine.transfer(&ranges, false, all, TransferMode::Read(&mut buf)),
            Err(TransferError::Invalid(InvalidReason::OverlappingRanges))
        );
        assert_eq!(calls.get(), 0);
        assert_eq!(
            engine.transfer(&ranges, true, all, TransferMode::Read(&mut buf)),
            Ok(8)
        );
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn full_port_space_is_too_long_to_move() {
        let calls = Cell::new(0);
        let engine = PortIoEngine::new(CountingBus { calls: &calls });
        let ranges = [PortRange::new(0x0000, 0xFFFF)];
        let mut buf = vec![0u8; MAX_DATA_LENGTH];
        assert_eq!(
            engine.transfer(&ranges, false, all, TransferMode::Read(&mut buf)),
            Err(TransferError::Invalid(InvalidReason::DataTooLong { len: 0x1_0000 }))
        );
        assert_eq!(engine.transfer(&ranges, false, all, TransferMode::Probe), Ok(0));

        let ranges = [PortRange::new(0x0000, 0xFFFE)];
        assert_eq!(
            engine.transfer(&ranges, false, all, TransferMode::Read(&mut buf)),
            Ok(0xFFFF)
        );
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn short_buffer_is_refused() {
        let engine = PortIoEngine::new(PatternPortBus);
        let ranges = [PortRange::new(0x7000, 0x7003)];
        assert!(matches!(
            engine.transfer(&ranges, false, all, TransferMode::Write(&[0; 3])),
            Err(TransferError::Invalid(InvalidReason::InputTooShort { needed: 4, available: 3 }))
        ));
    }
}
