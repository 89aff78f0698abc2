use crate::error::RequestError;
use crate::exception::ExceptionCode;

/// Flat status code derived from the result of any operation
///
/// Applications that report outcomes on a display or over another protocol
/// usually want a single code rather than the nested [`RequestError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize, serde::Deserialize))]
pub enum Status {
    /// The operation completed successfully
    Ok,
    /// Unspecified failure, including unknown exception codes
    Error,
    /// An argument or the port configuration was rejected
    InvalidParam,
    /// The port is not initialized
    NotInitialized,
    /// The port is already initialized
    AlreadyInitialized,
    /// The transport did not accept the complete frame
    Busy,
    /// No response before the response timeout
    Timeout,
    /// Bytes were received but never formed a CRC-valid frame
    CrcError,
    /// A CRC-valid frame did not answer the outstanding request
    UnexpectedResponse,
    /// Exception 0x01
    IllegalFunction,
    /// Exception 0x02
    IllegalDataAddress,
    /// Exception 0x03
    IllegalDataValue,
    /// Exception 0x04
    SlaveDeviceFailure,
    /// Exception 0x05
    Acknowledge,
    /// Exception 0x06
    SlaveBusy,
    /// Exception 0x0A
    GatewayPathUnavailable,
    /// Exception 0x0B
    GatewayTargetNoResponse,
}

impl Status {
    /// Derive the status of a completed operation
    pub fn of<T>(result: &Result<T, RequestError>) -> Self {
        match result {
            Ok(_) => Status::Ok,
            Err(err) => err.into(),
        }
    }
}

impl From<&RequestError> for Status {
    fn from(err: &RequestError) -> Self {
        match err {
            RequestError::Io(_) | RequestError::Internal(_) => Status::Error,
            RequestError::Exception(ex) => (*ex).into(),
            RequestError::BadRequest(_) => Status::InvalidParam,
            RequestError::BadFrame(_) => Status::CrcError,
            RequestError::BadResponse(_) => Status::UnexpectedResponse,
            RequestError::ResponseTimeout => Status::Timeout,
            RequestError::Busy => Status::Busy,
            RequestError::NotInitialized => Status::NotInitialized,
            RequestError::AlreadyInitialized => Status::AlreadyInitialized,
        }
    }
}

impl From<RequestError> for Status {
    fn from(err: RequestError) -> Self {
        (&err).into()
    }
}

impl From<ExceptionCode> for Status {
    fn from(ex: ExceptionCode) -> Self {
        match ex {
            ExceptionCode::IllegalFunction => Status::IllegalFunction,
            ExceptionCode::IllegalDataAddress => Status::IllegalDataAddress,
            ExceptionCode::IllegalDataValue => Status::IllegalDataValue,
            ExceptionCode::SlaveDeviceFailure => Status::SlaveDeviceFailure,
            ExceptionCode::Acknowledge => Status::Acknowledge,
            ExceptionCode::SlaveBusy => Status::SlaveBusy,
            ExceptionCode::GatewayPathUnavailable => Status::GatewayPathUnavailable,
            ExceptionCode::GatewayTargetNoResponse => Status::GatewayTargetNoResponse,
            ExceptionCode::Unknown(_) => Status::Error,
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let name = match self {
            Status::Ok => "OK",
            Status::Error => "ERROR",
            Status::InvalidParam => "INVALID_PARAM",
            Status::NotInitialized => "NOT_INITIALIZED",
            Status::AlreadyInitialized => "ALREADY_INITIALIZED",
            Status::Busy => "BUSY",
            Status::Timeout => "TIMEOUT",
            Status::CrcError => "CRC_ERROR",
            Status::UnexpectedResponse => "UNEXPECTED_RESPONSE",
            Status::IllegalFunction => "ILLEGAL_FUNCTION",
            Status::IllegalDataAddress => "ILLEGAL_DATA_ADDRESS",
            Status::IllegalDataValue => "ILLEGAL_DATA_VALUE",
            Status::SlaveDeviceFailure => "SLAVE_DEVICE_FAILURE",
            Status::Acknowledge => "ACKNOWLEDGE",
            Status::SlaveBusy => "SLAVE_BUSY",
            Status::GatewayPathUnavailable => "GATEWAY_PATH_UNAVAILABLE",
            Status::GatewayTargetNoResponse => "GATEWAY_TARGET_NO_RESPONSE",
        };
        f.write_str(name)
    }
}
