use scursor::{ReadCursor, WriteCursor};

use crate::client::requests::frame_length;
use crate::common::function::FunctionCode;
use crate::decode::PduDecodeLevel;
use crate::error::{AduParseError, RequestError};
use crate::types::{AddressRange, RegisterIterator, RegisterIteratorDisplay};

/// read holding or input registers into a caller-owned buffer
pub(crate) struct ReadRegisters<'a> {
    pub(crate) range: AddressRange,
    output: &'a mut [u16],
}

impl<'a> ReadRegisters<'a> {
    /// `output` must hold exactly `range.count` registers
    pub(crate) fn new(range: AddressRange, output: &'a mut [u16]) -> Self {
        Self { range, output }
    }

    pub(crate) fn serialize(&self, cursor: &mut WriteCursor) -> Result<(), RequestError> {
        cursor.write_u16_be(self.range.start)?;
        cursor.write_u16_be(self.range.count)?;
        Ok(())
    }

    pub(crate) fn handle_response(
        &mut self,
        cursor: &mut ReadCursor,
        function: FunctionCode,
        decode: PduDecodeLevel,
    ) -> Result<(), RequestError> {
        let expected = 2 * self.range.count as usize;
        let byte_count = cursor.read_u8()? as usize;
        if byte_count != expected {
            return Err(AduParseError::RequestByteCountMismatch(expected, byte_count).into());
        }

        if cursor.remaining() != byte_count {
            return Err(AduParseError::LengthMismatch(
                frame_length(1 + byte_count),
                frame_length(1 + cursor.remaining()),
            )
            .into());
        }

        for dest in self.output.iter_mut() {
            *dest = cursor.read_u16_be()?;
        }

        if decode.enabled() {
            tracing::info!(
                "PDU RX - {} {}",
                function,
                RegisterIteratorDisplay::new(decode, RegisterIterator::new(self.output, self.range))
            );
        }

        Ok(())
    }
}
