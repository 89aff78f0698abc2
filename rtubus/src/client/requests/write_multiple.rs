use scursor::{ReadCursor, WriteCursor};

use crate::client::requests::frame_length;
use crate::common::bits::{write_packed_bits, write_registers};
use crate::error::{AduParseError, InvalidRequest, RequestError};
use crate::types::AddressRange;

/// Collection of values and starting address
///
/// Used when making write multiple coil/register requests
#[derive(Debug, Copy, Clone)]
pub(crate) struct WriteMultiple<'a, T> {
    /// starting address and count of the values
    pub(crate) range: AddressRange,
    /// vector of values
    pub(crate) values: &'a [T],
}

impl<'a, T> WriteMultiple<'a, T> {
    pub(crate) fn from(start: u16, values: &'a [T], limit: u16) -> Result<Self, InvalidRequest> {
        let count = match u16::try_from(values.len()) {
            Ok(x) => x,
            Err(_) => return Err(InvalidRequest::CountTooBigForU16(values.len())),
        };
        let range = AddressRange::try_from(start, count)?.limited_count(limit)?;
        Ok(Self { range, values })
    }
}

/// payload encoding that follows the byte count
pub(crate) trait MultipleWriteValues {
    fn write_values(&self, cursor: &mut WriteCursor) -> Result<(), RequestError>;
}

impl MultipleWriteValues for WriteMultiple<'_, bool> {
    fn write_values(&self, cursor: &mut WriteCursor) -> Result<(), RequestError> {
        write_packed_bits(cursor, self.values)
    }
}

impl MultipleWriteValues for WriteMultiple<'_, u16> {
    fn write_values(&self, cursor: &mut WriteCursor) -> Result<(), RequestError> {
        write_registers(cursor, self.values)
    }
}

pub(crate) struct MultipleWrite<'a, T> {
    pub(crate) request: WriteMultiple<'a, T>,
}

impl<'a, T> MultipleWrite<'a, T>
where
    WriteMultiple<'a, T>: MultipleWriteValues,
{
    pub(crate) fn new(request: WriteMultiple<'a, T>) -> Self {
        Self { request }
    }

    pub(crate) fn serialize(&self, cursor: &mut WriteCursor) -> Result<(), RequestError> {
        cursor.write_u16_be(self.request.range.start)?;
        cursor.write_u16_be(self.request.range.count)?;
        self.request.write_values(cursor)
    }

    /// the slave echoes the starting address and quantity
    pub(crate) fn handle_response(&self, cursor: &mut ReadCursor) -> Result<(), RequestError> {
        if cursor.remaining() != 4 {
            return Err(AduParseError::LengthMismatch(
                frame_length(4),
                frame_length(cursor.remaining()),
            )
            .into());
        }

        let start = cursor.read_u16_be()?;
        let count = cursor.read_u16_be()?;
        if start != self.request.range.start || count != self.request.range.count {
            return Err(AduParseError::ReplyEchoMismatch.into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::limits::{MAX_WRITE_COILS_COUNT, MAX_WRITE_REGISTERS_COUNT};
    use crate::error::InvalidRange;

    #[test]
    fn serializes_registers_with_byte_count() {
        let values = [0x1234u16, 0x5678];
        let request = MultipleWrite::new(
            WriteMultiple::from(0x10, &values, MAX_WRITE_REGISTERS_COUNT).unwrap(),
        );
        let mut buffer = [0u8; 9];
        let mut cursor = WriteCursor::new(&mut buffer);
        request.serialize(&mut cursor).unwrap();
        assert_eq!(
            buffer,
            [0x00, 0x10, 0x00, 0x02, 0x04, 0x12, 0x34, 0x56, 0x78]
        );
    }

    #[test]
    fn serializes_coils_packed() {
        let values = [
            false, true, false, false, true, false, false, false, // 0x12
            false, false,
        ];
        let request =
            MultipleWrite::new(WriteMultiple::from(0x10, &values, MAX_WRITE_COILS_COUNT).unwrap());
        let mut buffer = [0u8; 7];
        let mut cursor = WriteCursor::new(&mut buffer);
        request.serialize(&mut cursor).unwrap();
        assert_eq!(buffer, [0x00, 0x10, 0x00, 0x0A, 0x02, 0x12, 0x00]);
    }

    #[test]
    fn enforces_the_quantity_limit() {
        let values = [0u16; 124];
        assert!(matches!(
            WriteMultiple::from(0, &values, MAX_WRITE_REGISTERS_COUNT),
            Err(InvalidRequest::BadRange(InvalidRange::CountTooLargeForType(124, 123)))
        ));
        let empty: [bool; 0] = [];
        assert!(matches!(
            WriteMultiple::from(0, &empty, MAX_WRITE_COILS_COUNT),
            Err(InvalidRequest::BadRange(InvalidRange::CountOfZero))
        ));
    }

    #[test]
    fn range_may_not_overflow_the_address_space() {
        let values = [0u16; 2];
        assert!(matches!(
            WriteMultiple::from(0xFFFF, &values, MAX_WRITE_REGISTERS_COUNT),
            Err(InvalidRequest::BadRange(InvalidRange::AddressOverflow(0xFFFF, 2)))
        ));
    }

    #[test]
    fn validates_echo() {
        let values = [0x1234u16, 0x5678];
        let request = MultipleWrite::new(
            WriteMultiple::from(0x10, &values, MAX_WRITE_REGISTERS_COUNT).unwrap(),
        );
        let mut cursor = ReadCursor::new(&[0x00, 0x10, 0x00, 0x02]);
        assert_eq!(request.handle_response(&mut cursor), Ok(()));
        let mut cursor = ReadCursor::new(&[0x00, 0x10, 0x00, 0x03]);
        assert_eq!(
            request.handle_response(&mut cursor),
            Err(AduParseError::ReplyEchoMismatch.into())
        );
    }
}
