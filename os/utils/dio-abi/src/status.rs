use core::fmt;

/// Completion status of a request, as seen by the caller.
///
/// The numeric values follow the NT status space so that they survive a trip
/// through a platform I/O manager unchanged.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Status {
    Success = 0x0000_0000,
    /// Caller is not the owner, or another process owns the device.
    AccessDenied = 0xC000_0022,
    /// Malformed or oversized request, bad version tag, overlap when disallowed.
    InvalidParameter = 0xC000_000D,
    /// Unknown request code or wrong transfer method.
    Unsupported = 0xC000_00BB,
    /// A port transfer failed in the hardware layer.
    HardwareIoFailure = 0xC000_0001,
    InsufficientResources = 0xC000_009A,
    /// The device is not started, or teardown has begun.
    DeviceGone = 0xC000_0056,
}

impl Status {
    #[must_use]
    pub const fn code(self) -> u32 {
        self as u32
    }

    #[must_use]
    pub const fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            0x0000_0000 => Self::Success,
            0xC000_0022 => Self::AccessDenied,
            0xC000_000D => Self::InvalidParameter,
            0xC000_00BB => Self::Unsupported,
            0xC000_0001 => Self::HardwareIoFailure,
            0xC000_009A => Self::InsufficientResources,
            0xC000_0056 => Self::DeviceGone,
            _ => return None,
        })
    }

    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Success => "success",
            Self::AccessDenied => "access denied",
            Self::InvalidParameter => "invalid parameter",
            Self::Unsupported => "not supported",
            Self::HardwareIoFailure => "hardware I/O failure",
            Self::InsufficientResources => "insufficient resources",
            Self::DeviceGone => "device gone",
        };
        write!(f, "{text} ({:#010x})", self.code())
    }
}

impl core::error::Error for Status {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_distinct_and_recoverable() {
        let all = [
            Status::Success,
            Status::AccessDenied,
            Status::InvalidParameter,
            Status::Unsupported,
            Status::HardwareIoFailure,
            Status::InsufficientResources,
            Status::DeviceGone,
        ];
        for status in all {
            assert_eq!(Status::from_code(status.code()), Some(status));
        }
        assert_eq!(Status::from_code(0x1234), None);
    }

    #[test]
    fn display_includes_code() {
        assert_eq!(
            Status::AccessDenied.to_string(),
            "access denied (0xc0000022)"
        );
    }
}
