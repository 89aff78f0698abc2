use crate::common::function::FunctionCode;
use crate::common::traits::Serialize;
use crate::decode::AduDecodeLevel;
use crate::error::{InternalError, RequestError};
use crate::types::UnitId;

use scursor::WriteCursor;

pub(crate) mod constants {
    pub(crate) const UNIT_ID_LENGTH: usize = 1;
    pub(crate) const CRC_LENGTH: usize = 2;
    /// unit id, function code and CRC
    pub(crate) const MIN_FRAME_LENGTH: usize = 4;
    pub(crate) const MAX_FRAME_LENGTH: usize = 256;
}

/// precomputes the CRC table as a constant!
const CRC: crc::Crc<u16> = crc::Crc::<u16>::new(&crc::CRC_16_MODBUS);

/// Compute the Modbus RTU CRC16 of a byte slice
///
/// The value is appended to a frame low byte first.
pub fn crc16(data: &[u8]) -> u16 {
    CRC.checksum(data)
}

pub(crate) type FrameBuffer = [u8; constants::MAX_FRAME_LENGTH];

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct FrameInfo {
    /// total length of the ADU including the CRC
    pub(crate) len: usize,
    pub(crate) crc: u16,
}

/// Result of checking the bytes accumulated so far for a complete frame
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum FrameStatus {
    /// fewer bytes than the smallest possible frame
    Incomplete,
    /// the trailing two bytes are the CRC of everything before them
    Valid(u16),
    /// received and calculated CRC
    Mismatch(u16, u16),
}

/// writes `[unit][function][body][crc lo][crc hi]` at the start of the buffer
pub(crate) fn format_rtu_pdu(
    buffer: &mut FrameBuffer,
    unit_id: UnitId,
    function: FunctionCode,
    msg: &dyn Serialize,
) -> Result<FrameInfo, RequestError> {
    let end_pdu = {
        let mut cursor = WriteCursor::new(buffer.as_mut_slice());
        cursor.write_u8(unit_id.value)?;
        cursor.write_u8(function.get_value())?;
        msg.serialize(&mut cursor)?;
        cursor.position()
    };

    let len = end_pdu + constants::CRC_LENGTH;
    let crc = match buffer.get(..end_pdu) {
        Some(pdu) => crc16(pdu),
        None => return Err(InternalError::InsufficientWriteSpace.into()),
    };
    match buffer.get_mut(end_pdu..len) {
        Some(dest) => dest.copy_from_slice(&crc.to_le_bytes()),
        None => {
            return Err(InternalError::FrameTooBig(len, constants::MAX_FRAME_LENGTH).into());
        }
    }

    Ok(FrameInfo { len, crc })
}

/// checks whether the accumulated bytes form a CRC-valid frame
pub(crate) fn check_frame(data: &[u8]) -> FrameStatus {
    if data.len() < constants::MIN_FRAME_LENGTH {
        return FrameStatus::Incomplete;
    }

    let (body, crc) = data.split_at(data.len() - constants::CRC_LENGTH);
    let received = match crc {
        [lo, hi] => u16::from_le_bytes([*lo, *hi]),
        _ => return FrameStatus::Incomplete,
    };
    let expected = crc16(body);

    if received == expected {
        FrameStatus::Valid(received)
    } else {
        FrameStatus::Mismatch(received, expected)
    }
}

pub(crate) struct RtuDisplay<'a> {
    level: AduDecodeLevel,
    unit_id: u8,
    payload: &'a [u8],
    crc: u16,
}

impl<'a> RtuDisplay<'a> {
    /// `frame` is the complete ADU including the CRC
    pub(crate) fn new(level: AduDecodeLevel, frame: &'a [u8], crc: u16) -> Self {
        let unit_id = frame.first().copied().unwrap_or_default();
        let end = frame.len().saturating_sub(constants::CRC_LENGTH);
        let payload = frame
            .get(constants::UNIT_ID_LENGTH..end)
            .unwrap_or_default();
        RtuDisplay {
            level,
            unit_id,
            payload,
            crc,
        }
    }
}

impl<'a> std::fmt::Display for RtuDisplay<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "unit: {:#04X} crc: {:#06X} (payload len = {})",
            self.unit_id,
            self.crc,
            self.payload.len(),
        )?;
        if self.level.payload_enabled() {
            crate::common::phys::format_bytes(f, self.payload)?;
        }
        Ok(())
    }
}
