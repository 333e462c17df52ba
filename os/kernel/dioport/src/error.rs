use crate::ownership::ProcessId;
use crate::lifecycle::DeviceState;
use dio_abi::{PortRange, Status};
use dio_ports::PortFault;

/// Why a request was refused as malformed.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidReason {
    #[error("input buffer holds {available} bytes, {needed} required")]
    InputTooShort { needed: usize, available: usize },
    #[error("output buffer holds {available} bytes, {needed} required")]
    OutputTooShort { needed: usize, available: usize },
    #[error("{count} ranges requested, at most 256 allowed")]
    TooManyRanges { count: usize },
    #[error("unsupported configuration version {version}")]
    BadVersion { version: u32 },
    #[error("payload of {len} bytes exceeds the port address space")]
    DataTooLong { len: usize },
    #[error("ranges of one request overlap")]
    OverlappingRanges,
    #[error("range {range:?} is not accessible")]
    InaccessibleRange { range: PortRange },
    #[error("size computation overflowed")]
    Overflow,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DioError {
    #[error("process {caller} is not the registered owner")]
    NotOwner { caller: ProcessId },
    #[error("device is owned by process {owner}")]
    AlreadyOwned { owner: ProcessId },
    #[error("invalid request: {0}")]
    Invalid(#[from] InvalidReason),
    #[error("unsupported control code {code:#010x}")]
    Unsupported { code: u32 },
    #[error("hardware I/O failed after {transferred} bytes: {fault}")]
    Hardware { transferred: usize, fault: PortFault },
    #[error("cannot allocate {what}")]
    InsufficientResources { what: &'static str },
    #[error("device is not started or is being removed")]
    DeviceGone,
    #[error("transition not allowed from {state:?}")]
    WrongState { state: DeviceState },
    #[error("lower device failed: {0}")]
    Lower(Status),
    #[error("platform service failed: {0}")]
    Platform(Status),
}

impl From<DioError> for Status {
    fn from(value: DioError) -> Self {
        match value {
            DioError::NotOwner { .. } | DioError::AlreadyOwned { .. } => Self::AccessDenied,
            DioError::Invalid(_) => Self::InvalidParameter,
            DioError::Unsupported { .. } | DioError::WrongState { .. } => Self::Unsupported,
            DioError::Hardware { .. } => Self::HardwareIoFailure,
            DioError::InsufficientResources { .. } => Self::InsufficientResources,
            DioError::DeviceGone => Self::DeviceGone,
            DioError::Lower(status) | DioError::Platform(status) => status,
        }
    }
}

/// Failure of [`PortIoEngine::transfer`](crate::PortIoEngine::transfer).
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransferError {
    /// Refused before any port was touched.
    #[error("transfer refused: {0}")]
    Invalid(#[from] InvalidReason),
    /// The bus failed mid-loop; `transferred` bytes of earlier ranges are done.
    #[error("bus fault after {transferred} bytes: {fault}")]
    Hardware { transferred: usize, fault: PortFault },
}

impl From<TransferError> for DioError {
    fn from(value: TransferError) -> Self {
        match value {
            TransferError::Invalid(reason) => Self::Invalid(reason),
            TransferError::Hardware { transferred, fault } => Self::Hardware { transferred, fault },
        }
    }
}
