use crate::{ClientError, Transport};
use alloc::vec::Vec;
use dio_abi::{
    CONFIGURATION_PACKET_SIZE, CONFIGURATION_VERSION1, ConfigurationBits, ConfigurationBlock,
    MAX_PORT_RANGES, PortRange, Request, ranges_header_len, wire,
};

/// XOR applied to every byte read from the ports.
pub const DEFAULT_READ_XOR_MASK: u8 = 0x00;

/// XOR applied to every byte written to the ports.
pub const DEFAULT_WRITE_XOR_MASK: u8 = 0xFF;

/// One session with the driver.
///
/// Reads and writes always cover the ranges last passed to
/// [`register_port_ranges`](Self::register_port_ranges), in order.
#[derive(Debug)]
pub struct DioClient<T> {
    transport: T,
    ranges: Vec<PortRange>,
    read_xor_mask: u8,
    write_xor_mask: u8,
    input: Vec<u8>,
    output: Vec<u8>,
}

impl<T: Transport> DioClient<T> {
    pub const fn new(transport: T) -> Self {
        Self {
            transport,
            ranges: Vec::new(),
            read_xor_mask: DEFAULT_READ_XOR_MASK,
            write_xor_mask: DEFAULT_WRITE_XOR_MASK,
            input: Vec::new(),
            output: Vec::new(),
        }
    }

    pub fn into_inner(self) -> T {
        self.transport
    }

    /// Remember `ranges` for the following requests. Nothing is sent.
    ///
    /// # Errors
    /// [`ClientError::TooManyRanges`] above [`MAX_PORT_RANGES`]; the previous
    /// registration is kept.
    pub fn register_port_ranges(&mut self, ranges: &[PortRange]) -> Result<(), ClientError> {
        if ranges.len() > MAX_PORT_RANGES {
            return Err(ClientError::TooManyRanges {
                count: ranges.len(),
            });
        }
        self.ranges.clear();
        self.ranges.extend_from_slice(ranges);
        Ok(())
    }

    #[must_use]
    pub fn registered_ranges(&self) -> &[PortRange] {
        &self.ranges
    }

    #[must_use]
    pub const fn xor_masks(&self) -> (u8, u8) {
        (self.read_xor_mask, self.write_xor_mask)
    }

    pub const fn set_xor_masks(&mut self, read: u8, write: u8) {
        self.read_xor_mask = read;
        self.write_xor_mask = write;
    }

    /// Payload bytes a read or write of the registered ranges carries.
    ///
    /// # Errors
    /// [`ClientError::MalformedRange`] for the first range with start above
    /// end.
    pub fn data_length(&self) -> Result<usize, ClientError> {
        self.ranges
            .iter()
            .enumerate()
            .try_fold(0usize, |sum, (index, range)| {
                if range.is_well_formed() {
                    Ok(sum + range.len() as usize)
                } else {
                    Err(ClientError::MalformedRange {
                        index,
                        range: *range,
                    })
                }
            })
    }

    /// Ask the driver to grant the registered ranges to this process.
    ///
    /// # Errors
    /// [`ClientError::Driver`] with the driver's status, or
    /// [`ClientError::Framing`] when the request packet cannot be laid out.
    pub fn grant_access(&mut self) -> Result<(), ClientError> {
        let header_len = self.frame_ranges(0)?;
        self.send(Request::GrantPortAccess, header_len, 0)?;
        log::info!("granted {} ranges", self.ranges.len());
        Ok(())
    }

    /// Take every port away again; ownership is kept.
    ///
    /// # Errors
    /// [`ClientError::Driver`] with the driver's status.
    pub fn reset_access(&mut self) -> Result<(), ClientError> {
        self.input.clear();
        self.send(Request::ResetPortAccess, 0, 0)?;
        Ok(())
    }

    /// Read the registered ranges into the front of `buf`, unmasked with the
    /// read XOR mask. Returns the number of bytes read.
    ///
    /// # Errors
    /// [`ClientError`] when the registration or `buf` cannot carry the
    /// transfer (nothing is sent then), or when the driver fails or answers
    /// with an unexpected length.
    pub fn read_ports(&mut self, buf: &mut [u8]) -> Result<usize, ClientError> {
        let data_len = self.checked_data_length(buf.len())?;
        let header_len = self.frame_ranges(0)?;
        let expected = header_len + data_len;
        let returned = self.send(Request::ReadPort, header_len, expected)?;
        expect_length(expected, returned)?;

        let mask = self.read_xor_mask;
        for (dst, src) in buf.iter_mut().zip(&self.output[header_len..expected]) {
            *dst = src ^ mask;
        }
        Ok(data_len)
    }

    /// Write the front of `buf` to the registered ranges, masked with the
    /// write XOR mask. Returns the number of bytes written.
    ///
    /// # Errors
    /// As [`read_ports`](Self::read_ports).
    pub fn write_ports(&mut self, buf: &[u8]) -> Result<usize, ClientError> {
        let data_len = self.checked_data_length(buf.len())?;
        let header_len = self.frame_ranges(data_len)?;
        let mask = self.write_xor_mask;
        for (dst, src) in self.input[header_len..].iter_mut().zip(buf) {
            *dst = src ^ mask;
        }
        let returned = self.send(Request::WritePort, header_len + data_len, header_len)?;
        expect_length(header_len, returned)?;
        Ok(data_len)
    }

    /// The driver's runtime configuration.
    ///
    /// # Errors
    /// [`ClientError::Driver`] or [`ClientError::LengthMismatch`].
    pub fn configuration(&mut self) -> Result<ConfigurationBits, ClientError> {
        self.input.clear();
        self.input.extend_from_slice(&CONFIGURATION_VERSION1.to_le_bytes());
        let len = self.input.len();
        let returned = self.send(Request::ReadConfiguration, len, CONFIGURATION_PACKET_SIZE)?;
        expect_length(CONFIGURATION_PACKET_SIZE, returned)?;
        ConfigurationBlock::decode(&self.output)
            .map(|block| block.configuration_bits)
            .map_err(|_| ClientError::LengthMismatch {
                expected: CONFIGURATION_PACKET_SIZE,
                returned,
            })
    }

    /// Replace the driver's runtime configuration.
    ///
    /// # Errors
    /// [`ClientError::Driver`], [`ClientError::Framing`] or
    /// [`ClientError::LengthMismatch`].
    pub fn set_configuration(&mut self, bits: ConfigurationBits) -> Result<(), ClientError> {
        self.input.clear();
        self.input.resize(CONFIGURATION_PACKET_SIZE, 0);
        ConfigurationBlock::new(bits).encode(&mut self.input)?;
        let returned = self.send(
            Request::WriteConfiguration,
            CONFIGURATION_PACKET_SIZE,
            CONFIGURATION_PACKET_SIZE,
        )?;
        expect_length(CONFIGURATION_PACKET_SIZE, returned)
    }

    fn checked_data_length(&self, available: usize) -> Result<usize, ClientError> {
        let needed = self.data_length()?;
        if needed > available {
            return Err(ClientError::BufferTooSmall { needed, available });
        }
        Ok(needed)
    }

    /// Lay out `[count] [ranges]` plus `payload` zero bytes in the input
    /// buffer; returns the header length.
    fn frame_ranges(&mut self, payload: usize) -> Result<usize, ClientError> {
        let header_len = ranges_header_len(self.ranges.len()).unwrap_or(0);
        self.input.clear();
        self.input.resize(header_len + payload, 0);
        Ok(wire::write_ranges(&mut self.input, &self.ranges)?)
    }

    fn send(
        &mut self,
        request: Request,
        input_len: usize,
        output_len: usize,
    ) -> Result<usize, ClientError> {
        self.output.clear();
        self.output.resize(output_len, 0);
        let returned = self.transport.control(
            request.control_code(),
            &self.input[..input_len],
            &mut self.output,
        )?;
        log::debug!("{request:?}: {returned} bytes returned");
        Ok(returned)
    }
}

fn expect_length(expected: usize, returned: usize) -> Result<(), ClientError> {
    if returned == expected {
        Ok(())
    } else {
        log::debug!("length mismatch, {returned} bytes instead of {expected}");
        Err(ClientError::LengthMismatch { expected, returned })
    }
}
