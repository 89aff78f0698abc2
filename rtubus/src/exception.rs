use crate::constants::exceptions;

/// Exception codes a slave may return in an exception response
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Ord, Eq)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize, serde::Deserialize))]
pub enum ExceptionCode {
    /// The function code received in the query is not an allowable action for the slave
    IllegalFunction,
    /// The data address received in the query is not an allowable address for the slave
    IllegalDataAddress,
    /// A value contained in the request is not an allowable value for the slave
    IllegalDataValue,
    /// An unrecoverable error occurred while the slave was attempting to perform the requested
    /// action
    SlaveDeviceFailure,
    /// Specialized use in conjunction with programming commands
    ///
    /// The slave has accepted the request and is processing it
    Acknowledge,
    /// Specialized use in conjunction with programming commands
    ///
    /// The slave is engaged in processing a long-duration program command, try again later
    SlaveBusy,
    /// Specialized use in conjunction with gateways.
    ///
    /// Indicates that the gateway was unable to allocate an internal communication path from
    /// the input port to the output port for processing the request. Usually means that the
    /// gateway is mis-configured or overloaded
    GatewayPathUnavailable,
    /// Specialized use in conjunction with gateways.
    ///
    /// Indicates that no response was obtained from the target device. Usually means that the
    /// device is not present on the network.
    GatewayTargetNoResponse,
    /// The exception code received is not one this master recognizes
    Unknown(u8),
}

impl From<u8> for ExceptionCode {
    fn from(value: u8) -> Self {
        match value {
            exceptions::ILLEGAL_FUNCTION => ExceptionCode::IllegalFunction,
            exceptions::ILLEGAL_DATA_ADDRESS => ExceptionCode::IllegalDataAddress,
            exceptions::ILLEGAL_DATA_VALUE => ExceptionCode::IllegalDataValue,
            exceptions::SLAVE_DEVICE_FAILURE => ExceptionCode::SlaveDeviceFailure,
            exceptions::ACKNOWLEDGE => ExceptionCode::Acknowledge,
            exceptions::SLAVE_BUSY => ExceptionCode::SlaveBusy,
            exceptions::GATEWAY_PATH_UNAVAILABLE => ExceptionCode::GatewayPathUnavailable,
            exceptions::GATEWAY_TARGET_NO_RESPONSE => ExceptionCode::GatewayTargetNoResponse,
            _ => ExceptionCode::Unknown(value),
        }
    }
}

impl From<ExceptionCode> for u8 {
    fn from(ex: ExceptionCode) -> Self {
        match ex {
            ExceptionCode::IllegalFunction => exceptions::ILLEGAL_FUNCTION,
            ExceptionCode::IllegalDataAddress => exceptions::ILLEGAL_DATA_ADDRESS,
            ExceptionCode::IllegalDataValue => exceptions::ILLEGAL_DATA_VALUE,
            ExceptionCode::SlaveDeviceFailure => exceptions::SLAVE_DEVICE_FAILURE,
            ExceptionCode::Acknowledge => exceptions::ACKNOWLEDGE,
            ExceptionCode::SlaveBusy => exceptions::SLAVE_BUSY,
            ExceptionCode::GatewayPathUnavailable => exceptions::GATEWAY_PATH_UNAVAILABLE,
            ExceptionCode::GatewayTargetNoResponse => exceptions::GATEWAY_TARGET_NO_RESPONSE,
            ExceptionCode::Unknown(value) => value,
        }
    }
}

impl std::error::Error for ExceptionCode {}

impl std::fmt::Display for ExceptionCode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> Result<(), std::fmt::Error> {
        match self {
            ExceptionCode::IllegalFunction => f.write_str("function code received in the query is not an allowable action for the slave"),
            ExceptionCode::IllegalDataAddress => f.write_str("data address received in the query is not an allowable address for the slave"),
            ExceptionCode::IllegalDataValue => f.write_str("value contained in the request is not an allowable value for the slave"),
            ExceptionCode::SlaveDeviceFailure => f.write_str("unrecoverable error occurred while the slave was attempting to perform the requested action"),
            ExceptionCode::Acknowledge => f.write_str("slave has accepted the request and is processing it"),
            ExceptionCode::SlaveBusy => f.write_str("slave is engaged in processing a long-duration program command, try again later"),
            ExceptionCode::GatewayPathUnavailable => f.write_str("gateway was unable to allocate an internal communication path from the input port to the output port for processing the request"),
            ExceptionCode::GatewayTargetNoResponse => f.write_str("gateway did not receive a response from the target device"),
            ExceptionCode::Unknown(code) => write!(f, "received unknown exception code: {code:#04X}")
        }
    }
}
