use bitfield_struct::bitfield;

/// Device type of the dioport device (`FILE_DEVICE_UNKNOWN`).
pub const DEVICE_TYPE_DIO: u16 = 0x22;

/// A device control code.
///
/// Layout (LSB first): transfer method, function, required access, device type.
#[bitfield(u32)]
#[derive(PartialEq, Eq, Hash)]
pub struct ControlCode {
    /// Buffer transfer method (bits 0..1); see [`TransferMethod`].
    #[bits(2)]
    pub method: u8,
    /// Function number (bits 2..13).
    #[bits(12)]
    pub function: u16,
    /// Required access (bits 14..15); `0` = any access.
    #[bits(2)]
    pub access: u8,
    /// Device type (bits 16..31).
    #[bits(16)]
    pub device_type: u16,
}

/// How the I/O manager hands request buffers to the driver.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum TransferMethod {
    Buffered = 0,
    InDirect = 1,
    OutDirect = 2,
    Neither = 3,
}

impl TransferMethod {
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0 => Self::Buffered,
            1 => Self::InDirect,
            2 => Self::OutDirect,
            _ => Self::Neither,
        }
    }
}

/// The requests understood by the driver.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Request {
    GrantPortAccess = 0x801,
    ResetPortAccess = 0x802,
    ReadConfiguration = 0x803,
    WriteConfiguration = 0x804,
    ReadPort = 0x805,
    WritePort = 0x806,
}

impl Request {
    pub const ALL: [Self; 6] = [
        Self::GrantPortAccess,
        Self::ResetPortAccess,
        Self::ReadConfiguration,
        Self::WriteConfiguration,
        Self::ReadPort,
        Self::WritePort,
    ];

    #[must_use]
    pub const fn from_function(function: u16) -> Option<Self> {
        match function {
            0x801 => Some(Self::GrantPortAccess),
            0x802 => Some(Self::ResetPortAccess),
            0x803 => Some(Self::ReadConfiguration),
            0x804 => Some(Self::WriteConfiguration),
            0x805 => Some(Self::ReadPort),
            0x806 => Some(Self::WritePort),
            _ => None,
        }
    }

    #[must_use]
    pub const fn function(self) -> u16 {
        self as u16
    }

    /// The buffered, any-access control code clients send for this request.
    #[must_use]
    pub const fn control_code(self) -> ControlCode {
        ControlCode::new()
            .with_method(TransferMethod::Buffered as u8)
            .with_function(self.function())
            .with_access(0)
            .with_device_type(DEVICE_TYPE_DIO)
    }
}

impl ControlCode {
    #[must_use]
    pub const fn transfer_method(&self) -> TransferMethod {
        TransferMethod::from_bits(self.method())
    }

    /// The request this code names, if it is one of ours.
    #[must_use]
    pub const fn request(&self) -> Option<Request> {
        if self.device_type() != DEVICE_TYPE_DIO {
            return None;
        }
        Request::from_function(self.function())
    }
}

impl From<Request> for ControlCode {
    fn from(value: Request) -> Self {
        value.control_code()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_classic_layout() {
        // CTL_CODE(0x22, 0x801, METHOD_BUFFERED, FILE_ANY_ACCESS)
        assert_eq!(Request::GrantPortAccess.control_code().into_bits(), 0x0022_2004);
        assert_eq!(Request::ResetPortAccess.control_code().into_bits(), 0x0022_2008);
    }

    #[test]
    fn every_request_round_trips_through_its_code() {
        for request in Request::ALL {
            let code = ControlCode::from(request);
            assert_eq!(code.request(), Some(request));
            assert_eq!(code.transfer_method(), TransferMethod::Buffered);
        }
    }

    #[test]
    fn foreign_device_type_is_not_ours() {
        let code = Request::ReadPort.control_code().with_device_type(0x8000);
        assert_eq!(code.request(), None);
    }
}
