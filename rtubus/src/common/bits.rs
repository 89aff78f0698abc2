use scursor::WriteCursor;

use crate::error::{InternalError, RequestError};

pub(crate) fn num_bytes_for_bits(count: u16) -> usize {
    (count as usize + 7) / 8
}

pub(crate) fn calc_bytes_for_bits(num_bits: usize) -> Result<u8, InternalError> {
    let count = (num_bits + 7) / 8;
    u8::try_from(count).map_err(|_| InternalError::BadByteCount(count))
}

pub(crate) fn calc_bytes_for_registers(num_registers: usize) -> Result<u8, InternalError> {
    let count = 2 * num_registers;
    u8::try_from(count).map_err(|_| InternalError::BadByteCount(count))
}

/// writes the byte count followed by the bits packed LSB first from the lowest address
pub(crate) fn write_packed_bits(
    cursor: &mut WriteCursor,
    bits: &[bool],
) -> Result<(), RequestError> {
    cursor.write_u8(calc_bytes_for_bits(bits.len())?)?;

    for chunk in bits.chunks(8) {
        let mut acc: u8 = 0;
        for (count, bit) in chunk.iter().enumerate() {
            if *bit {
                acc |= 1 << count;
            }
        }
        cursor.write_u8(acc)?;
    }

    Ok(())
}

/// writes the byte count followed by the big-endian registers
pub(crate) fn write_registers(
    cursor: &mut WriteCursor,
    registers: &[u16],
) -> Result<(), RequestError> {
    cursor.write_u8(calc_bytes_for_registers(registers.len())?)?;
    for value in registers {
        cursor.write_u16_be(*value)?;
    }
    Ok(())
}
