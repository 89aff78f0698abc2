use scursor::{ReadCursor, WriteCursor};

use crate::client::requests::frame_length;
use crate::error::{AduParseError, RequestError};
use crate::types::{coil_to_u16, Indexed};

/// value written by a single coil/register request, as it appears on the wire
pub(crate) trait SingleWriteValue: Copy {
    fn to_wire(self) -> u16;
}

impl SingleWriteValue for bool {
    fn to_wire(self) -> u16 {
        coil_to_u16(self)
    }
}

impl SingleWriteValue for u16 {
    fn to_wire(self) -> u16 {
        self
    }
}

pub(crate) struct SingleWrite<T>
where
    T: SingleWriteValue,
{
    pub(crate) request: Indexed<T>,
}

impl<T> SingleWrite<T>
where
    T: SingleWriteValue,
{
    pub(crate) fn new(request: Indexed<T>) -> Self {
        Self { request }
    }

    pub(crate) fn serialize(&self, cursor: &mut WriteCursor) -> Result<(), RequestError> {
        cursor.write_u16_be(self.request.index)?;
        cursor.write_u16_be(self.request.value.to_wire())?;
        Ok(())
    }

    /// the slave echoes the address and value of the request
    pub(crate) fn handle_response(&self, cursor: &mut ReadCursor) -> Result<(), RequestError> {
        if cursor.remaining() != 4 {
            return Err(AduParseError::LengthMismatch(
                frame_length(4),
                frame_length(cursor.remaining()),
            )
            .into());
        }

        let address = cursor.read_u16_be()?;
        let value = cursor.read_u16_be()?;
        if address != self.request.index || value != self.request.value.to_wire() {
            return Err(AduParseError::ReplyEchoMismatch.into());
        }

        Ok(())
    }
}
