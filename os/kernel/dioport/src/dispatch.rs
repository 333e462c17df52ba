//! Device-control dispatch.
//!
//! Each request runs through the same gates in order: remove lock and device
//! state, control code, ownership, buffer validation. Nothing is changed
//! until all gates have passed.

use crate::codec;
use crate::device::Device;
use crate::engine::TransferMode;
use crate::error::{DioError, InvalidReason, TransferError};
use crate::ownership::ProcessId;
use crate::permission;
use dio_abi::{
    CONFIGURATION_PACKET_SIZE, ConfigurationBlock, ControlCode, PortRange, Request, Status, wire,
};
use dio_ports::PortBus;

/// Result of one device-control request.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Completion {
    pub status: Status,
    /// Bytes of `output` the caller may read.
    pub information: usize,
    /// Bytes moved over the bus; partial after a hardware fault.
    pub transferred: usize,
}

impl Completion {
    #[must_use]
    pub const fn success(information: usize, transferred: usize) -> Self {
        Self {
            status: Status::Success,
            information,
            transferred,
        }
    }

    #[must_use]
    pub const fn failed(status: Status) -> Self {
        Self {
            status,
            information: 0,
            transferred: 0,
        }
    }
}

impl From<DioError> for Completion {
    fn from(value: DioError) -> Self {
        Self::failed(value.into())
    }
}

impl<B: PortBus> Device<B> {
    /// Handle a device-control request from `pid`.
    #[must_use]
    pub fn device_control(
        &self,
        pid: ProcessId,
        code: ControlCode,
        input: &[u8],
        output: &mut [u8],
    ) -> Completion {
        let Some(_guard) = self.remove_lock.acquire() else {
            return Completion::failed(Status::DeviceGone);
        };
        if !self.lifecycle.is_started() {
            return Completion::failed(Status::DeviceGone);
        }

        let completion = match self.dispatch(pid, code, input, output) {
            Ok(completion) => completion,
            Err(e) => {
                log::debug!("control code {:#010x} from {pid:?} failed: {e}", code.into_bits());
                e.into()
            }
        };
        log::debug!(
            "control code {:#010x} from {pid:?}: {} ({} bytes out, {} moved)",
            code.into_bits(),
            completion.status,
            completion.information,
            completion.transferred
        );
        completion
    }

    fn dispatch(
        &self,
        pid: ProcessId,
        code: ControlCode,
        input: &[u8],
        output: &mut [u8],
    ) -> Result<Completion, DioError> {
        let request = codec::validate_control_code(code)?;
        self.check_owner(pid, request)?;

        match request {
            Request::GrantPortAccess => self.grant(pid, input),
            Request::ResetPortAccess => self.reset(pid),
            Request::ReadConfiguration => self.configure(false, input, output),
            Request::WriteConfiguration => self.configure(true, input, output),
            Request::ReadPort => self.port_io(false, input, output),
            Request::WritePort => self.port_io(true, input, output),
        }
    }

    /// Grant is open to the owner and, while unowned, to anyone; everything
    /// else is owner-only.
    fn check_owner(&self, pid: ProcessId, request: Request) -> Result<(), DioError> {
        match self.ownership.owner() {
            Some(owner) if owner == pid => Ok(()),
            Some(owner) if request == Request::GrantPortAccess => {
                Err(DioError::AlreadyOwned { owner })
            }
            None if request == Request::GrantPortAccess => Ok(()),
            _ => Err(DioError::NotOwner { caller: pid }),
        }
    }

    fn grant(&self, pid: ProcessId, input: &[u8]) -> Result<Completion, DioError> {
        let ranges = codec::decode_grant(input)?;

        let mut slot = self.permission.lock();
        let map = slot.as_mut().ok_or(DioError::DeviceGone)?;
        if !self.ownership.try_register(pid) {
            let owner = self.ownership.owner().unwrap_or(pid);
            return Err(DioError::AlreadyOwned { owner });
        }
        permission::build(map, Some(&ranges))?;
        self.platform.set_io_access_map(map.as_bytes());
        self.platform.set_process_io_access(pid, true);
        drop(slot);

        log::info!("process {pid} granted {} ranges: {ranges:?}", ranges.len());
        Ok(Completion::success(0, 0))
    }

    fn reset(&self, pid: ProcessId) -> Result<Completion, DioError> {
        let mut slot = self.permission.lock();
        let map = slot.as_mut().ok_or(DioError::DeviceGone)?;
        permission::build(map, None)?;
        self.platform.set_io_access_map(map.as_bytes());
        self.platform.set_process_io_access(pid, false);
        drop(slot);

        log::info!("process {pid} port access reset");
        Ok(Completion::success(0, 0))
    }

    fn configure(
        &self,
        write: bool,
        input: &[u8],
        output: &mut [u8],
    ) -> Result<Completion, DioError> {
        if let Some(block) = codec::validate_configuration(write, input, output.len())? {
            self.store_configuration(block.configuration_bits);
        }
        let written = ConfigurationBlock::new(self.configuration())
            .encode(output)
            .map_err(|_| InvalidReason::OutputTooShort {
                needed: CONFIGURATION_PACKET_SIZE,
                available: output.len(),
            })?;
        Ok(Completion::success(written, 0))
    }

    fn port_io(&self, write: bool, input: &[u8], output: &mut [u8]) -> Result<Completion, DioError> {
        let map = self.permission.lock();
        let available = self.available.lock();
        let accessible = |r: &PortRange| self.range_accessible(r, map.as_ref(), &available);

        let plan = codec::plan_port_io(write, input, output.len(), accessible)?;
        let header_len = wire::write_ranges(output, &plan.ranges).map_err(|_| {
            InvalidReason::OutputTooShort {
                needed: plan.header_len,
                available: output.len(),
            }
        })?;
        let window = plan.data_window();
        let mode = if write {
            TransferMode::Write(&input[window])
        } else {
            TransferMode::Read(&mut output[window])
        };
        let allow_overlap = self.configuration().allow_range_overlap();
        let result = self
            .engine
            .transfer(&plan.ranges, allow_overlap, accessible, mode);
        drop(available);
        drop(map);

        let payload = |moved: usize| if write { header_len } else { header_len + moved };
        match result {
            Ok(moved) => Ok(Completion::success(payload(moved), moved)),
            Err(TransferError::Hardware { transferred, fault }) => {
                log::warn!("port I/O over {:?} failed: {fault}", plan.ranges);
                Ok(Completion {
                    status: Status::HardwareIoFailure,
                    information: payload(transferred),
                    transferred,
                })
            }
            Err(e @ TransferError::Invalid(_)) => Err(e.into()),
        }
    }
}
