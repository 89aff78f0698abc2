use scursor::{ReadCursor, WriteCursor};

use crate::client::requests::frame_length;
use crate::common::bits::num_bytes_for_bits;
use crate::common::function::FunctionCode;
use crate::decode::PduDecodeLevel;
use crate::error::{AduParseError, RequestError};
use crate::types::{AddressRange, BitIterator, BitIteratorDisplay};

/// read coils or discrete inputs into a caller-owned buffer of packed bits
pub(crate) struct ReadBits<'a> {
    pub(crate) range: AddressRange,
    output: &'a mut [u8],
}

impl<'a> ReadBits<'a> {
    /// `output` must hold exactly `ceil(range.count / 8)` bytes
    pub(crate) fn new(range: AddressRange, output: &'a mut [u8]) -> Self {
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
        let expected = num_bytes_for_bits(self.range.count);
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

        // the packed bytes are kept verbatim
        let bytes = cursor.read_bytes(byte_count)?;
        for (dest, src) in self.output.iter_mut().zip(bytes) {
            *dest = *src;
        }

        if decode.enabled() {
            tracing::info!(
                "PDU RX - {} {}",
                function,
                BitIteratorDisplay::new(decode, BitIterator::new(self.output, self.range))
            );
        }

        Ok(())
    }
}
