use scursor::{ReadCursor, WriteCursor};

use crate::client::requests::read_bits::ReadBits;
use crate::client::requests::read_registers::ReadRegisters;
use crate::client::requests::write_multiple::MultipleWrite;
use crate::client::requests::write_single::SingleWrite;
use crate::common::function::{FunctionCode, ERROR_FLAG};
use crate::common::traits::Serialize;
use crate::decode::PduDecodeLevel;
use crate::error::{AduParseError, RequestError};
use crate::exception::ExceptionCode;
use crate::types::UnitId;

/// A request kept for every attempt of one transaction
pub(crate) struct Request<'a> {
    pub(crate) unit_id: UnitId,
    pub(crate) details: RequestDetails<'a>,
}

pub(crate) enum RequestDetails<'a> {
    ReadCoils(ReadBits<'a>),
    ReadDiscreteInputs(ReadBits<'a>),
    ReadHoldingRegisters(ReadRegisters<'a>),
    ReadInputRegisters(ReadRegisters<'a>),
    WriteSingleCoil(SingleWrite<bool>),
    WriteSingleRegister(SingleWrite<u16>),
    WriteMultipleCoils(MultipleWrite<'a, bool>),
    WriteMultipleRegisters(MultipleWrite<'a, u16>),
}

impl<'a> Request<'a> {
    pub(crate) fn new(unit_id: UnitId, details: RequestDetails<'a>) -> Self {
        Self { unit_id, details }
    }

    /// validates `frame` (a CRC-valid ADU without its CRC) against this request
    pub(crate) fn handle_response(
        &mut self,
        frame: &[u8],
        decode: PduDecodeLevel,
    ) -> Result<(), RequestError> {
        let mut cursor = ReadCursor::new(frame);

        let unit_id = cursor.read_u8()?;
        if unit_id != self.unit_id.value {
            return Err(AduParseError::UnexpectedUnitId(self.unit_id.value, unit_id).into());
        }

        let function = self.details.function();
        let value = cursor.read_u8()?;

        if value & ERROR_FLAG != 0 {
            let exception = ExceptionCode::from(cursor.read_u8()?);
            if decode.enabled() {
                tracing::info!(
                    "PDU RX - Modbus exception {:?} ({:#04X}) for {}",
                    exception,
                    u8::from(exception),
                    function
                );
            }
            return Err(exception.into());
        }

        if value != function.get_value() {
            return Err(AduParseError::UnknownResponseFunction(
                value,
                function.get_value(),
                function.as_error(),
            )
            .into());
        }

        self.details.handle_response(&mut cursor, function, decode)
    }
}

impl<'a> RequestDetails<'a> {
    pub(crate) fn function(&self) -> FunctionCode {
        match self {
            RequestDetails::ReadCoils(_) => FunctionCode::ReadCoils,
            RequestDetails::ReadDiscreteInputs(_) => FunctionCode::ReadDiscreteInputs,
            RequestDetails::ReadHoldingRegisters(_) => FunctionCode::ReadHoldingRegisters,
            RequestDetails::ReadInputRegisters(_) => FunctionCode::ReadInputRegisters,
            RequestDetails::WriteSingleCoil(_) => FunctionCode::WriteSingleCoil,
            RequestDetails::WriteSingleRegister(_) => FunctionCode::WriteSingleRegister,
            RequestDetails::WriteMultipleCoils(_) => FunctionCode::WriteMultipleCoils,
            RequestDetails::WriteMultipleRegisters(_) => FunctionCode::WriteMultipleRegisters,
        }
    }

    fn handle_response(
        &mut self,
        cursor: &mut ReadCursor,
        function: FunctionCode,
        decode: PduDecodeLevel,
    ) -> Result<(), RequestError> {
        match self {
            RequestDetails::ReadCoils(x) => x.handle_response(cursor, function, decode),
            RequestDetails::ReadDiscreteInputs(x) => x.handle_response(cursor, function, decode),
            RequestDetails::ReadHoldingRegisters(x) => x.handle_response(cursor, function, decode),
            RequestDetails::ReadInputRegisters(x) => x.handle_response(cursor, function, decode),
            RequestDetails::WriteSingleCoil(x) => x.handle_response(cursor),
            RequestDetails::WriteSingleRegister(x) => x.handle_response(cursor),
            RequestDetails::WriteMultipleCoils(x) => x.handle_response(cursor),
            RequestDetails::WriteMultipleRegisters(x) => x.handle_response(cursor),
        }
    }
}

impl<'a> Serialize for RequestDetails<'a> {
    fn serialize(&self, cursor: &mut WriteCursor) -> Result<(), RequestError> {
        match self {
            RequestDetails::ReadCoils(x) => x.serialize(cursor),
            RequestDetails::ReadDiscreteInputs(x) => x.serialize(cursor),
            RequestDetails::ReadHoldingRegisters(x) => x.serialize(cursor),
            RequestDetails::ReadInputRegisters(x) => x.serialize(cursor),
            RequestDetails::WriteSingleCoil(x) => x.serialize(cursor),
            RequestDetails::WriteSingleRegister(x) => x.serialize(cursor),
            RequestDetails::WriteMultipleCoils(x) => x.serialize(cursor),
            RequestDetails::WriteMultipleRegisters(x) => x.serialize(cursor),
        }
    }
}

pub(crate) struct RequestDetailsDisplay<'a, 'b> {
    request: &'a RequestDetails<'b>,
    level: PduDecodeLevel,
}

impl<'a, 'b> RequestDetailsDisplay<'a, 'b> {
    pub(crate) fn new(level: PduDecodeLevel, request: &'a RequestDetails<'b>) -> Self {
        Self { request, level }
    }
}

impl std::fmt::Display for RequestDetailsDisplay<'_, '_> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.request.function())?;

        if self.level.data_headers() {
            match self.request {
                RequestDetails::ReadCoils(x) => write!(f, " {}", x.range)?,
                RequestDetails::ReadDiscreteInputs(x) => write!(f, " {}", x.range)?,
                RequestDetails::ReadHoldingRegisters(x) => write!(f, " {}", x.range)?,
                RequestDetails::ReadInputRegisters(x) => write!(f, " {}", x.range)?,
                RequestDetails::WriteSingleCoil(x) => write!(f, " {}", x.request)?,
                RequestDetails::WriteSingleRegister(x) => write!(f, " {}", x.request)?,
                RequestDetails::WriteMultipleCoils(x) => {
                    write!(f, " {}", x.request.range)?;
                    if self.level.data_values() {
                        for (index, value) in x.request.range.to_std_range().zip(x.request.values)
                        {
                            write!(f, "\nidx: {:#06X} value: {}", index, *value as i32)?;
                        }
                    }
                }
                RequestDetails::WriteMultipleRegisters(x) => {
                    write!(f, " {}", x.request.range)?;
                    if self.level.data_values() {
                        for (index, value) in x.request.range.to_std_range().zip(x.request.values)
                        {
                            write!(f, "\nidx: {:#06X} value: {:#06X}", index, value)?;
                        }
                    }
                }
            }
        }

        Ok(())
    }
}
