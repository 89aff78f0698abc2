pub(crate) mod read_bits;
pub(crate) mod read_registers;
pub(crate) mod write_multiple;
pub(crate) mod write_single;

use crate::serial::frame::constants::{CRC_LENGTH, UNIT_ID_LENGTH};

/// length of an ADU whose body (after the function code) has `body` bytes
pub(crate) fn frame_length(body: usize) -> usize {
    UNIT_ID_LENGTH + 1 + body + CRC_LENGTH
}
