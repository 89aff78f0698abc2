use crate::exception::ExceptionCode;
use crate::types::PortId;

/// Top level error type returned by every request and lifecycle operation
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RequestError {
    /// An I/O error occurred on the serial transport
    Io(std::io::ErrorKind),
    /// A Modbus exception was returned by the slave
    Exception(ExceptionCode),
    /// The request or configuration was rejected before touching the bus
    BadRequest(InvalidRequest),
    /// Bytes were received but they never formed a CRC-valid frame
    BadFrame(FrameParseError),
    /// A CRC-valid frame did not answer the outstanding request
    BadResponse(AduParseError),
    /// An internal error occurred in the library itself
    ///
    /// These errors should never happen, but are trapped and reported
    Internal(InternalError),
    /// No bytes were received before the response timeout elapsed
    ResponseTimeout,
    /// The transport did not accept the complete frame
    Busy,
    /// The port has not been initialized (or was de-initialized)
    NotInitialized,
    /// The port was already initialized
    AlreadyInitialized,
}

impl RequestError {
    /// Returns true for transport and framing failures that the executor retries
    ///
    /// Exceptions are valid answers from the slave and argument errors never reached
    /// the bus, so neither is retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            RequestError::Io(_)
            | RequestError::BadFrame(_)
            | RequestError::BadResponse(_)
            | RequestError::ResponseTimeout
            | RequestError::Busy => true,
            RequestError::Exception(_)
            | RequestError::BadRequest(_)
            | RequestError::Internal(_)
            | RequestError::NotInitialized
            | RequestError::AlreadyInitialized => false,
        }
    }
}

impl std::error::Error for RequestError {}

impl std::fmt::Display for RequestError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            RequestError::Io(kind) => write!(f, "I/O error: {kind:?}"),
            RequestError::Exception(err) => write!(f, "Modbus exception: {err}"),
            RequestError::BadRequest(err) => write!(f, "invalid request: {err}"),
            RequestError::BadFrame(err) => write!(f, "bad frame: {err}"),
            RequestError::BadResponse(err) => write!(f, "unexpected response: {err}"),
            RequestError::Internal(err) => write!(f, "internal error: {err}"),
            RequestError::ResponseTimeout => {
                f.write_str("timeout occurred before receiving a response from the slave")
            }
            RequestError::Busy => f.write_str("transport did not accept the complete frame"),
            RequestError::NotInitialized => f.write_str("port is not initialized"),
            RequestError::AlreadyInitialized => f.write_str("port is already initialized"),
        }
    }
}

impl From<std::io::Error> for RequestError {
    fn from(err: std::io::Error) -> Self {
        RequestError::Io(err.kind())
    }
}

impl From<ExceptionCode> for RequestError {
    fn from(err: ExceptionCode) -> Self {
        RequestError::Exception(err)
    }
}

impl From<InvalidRequest> for RequestError {
    fn from(err: InvalidRequest) -> Self {
        RequestError::BadRequest(err)
    }
}

impl From<InvalidRange> for RequestError {
    fn from(err: InvalidRange) -> Self {
        RequestError::BadRequest(InvalidRequest::BadRange(err))
    }
}

impl From<FrameParseError> for RequestError {
    fn from(err: FrameParseError) -> Self {
        RequestError::BadFrame(err)
    }
}

impl From<AduParseError> for RequestError {
    fn from(err: AduParseError) -> Self {
        RequestError::BadResponse(err)
    }
}

impl From<InternalError> for RequestError {
    fn from(err: InternalError) -> Self {
        RequestError::Internal(err)
    }
}

impl From<scursor::WriteError> for RequestError {
    fn from(_: scursor::WriteError) -> Self {
        RequestError::Internal(InternalError::InsufficientWriteSpace)
    }
}

impl From<scursor::ReadError> for RequestError {
    fn from(_: scursor::ReadError) -> Self {
        RequestError::BadResponse(AduParseError::InsufficientBytes)
    }
}

/// Errors that occur while validating an address range
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InvalidRange {
    /// Count of zero not allowed
    CountOfZero,
    /// Address in range overflows u16
    AddressOverflow(u16, u16),
    /// Count too large for type
    CountTooLargeForType(u16, u16), // actual and limit
}

impl std::error::Error for InvalidRange {}

impl std::fmt::Display for InvalidRange {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            InvalidRange::CountOfZero => f.write_str("range contains count == 0"),
            InvalidRange::AddressOverflow(start, count) => write!(
                f,
                "start == {start} and count = {count} would overflow the representation of u16"
            ),
            InvalidRange::CountTooLargeForType(x, y) => write!(
                f,
                "the request count of {x} exceeds maximum allowed count of {y} for this type"
            ),
        }
    }
}

/// Errors that result from a bad request or port configuration
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InvalidRequest {
    /// The address range is invalid for the function
    BadRange(InvalidRange),
    /// Count cannot be represented as a u16
    CountTooBigForU16(usize),
    /// The unit id is broadcast (0) or reserved (248..=255)
    InvalidUnitId(u8),
    /// The caller's output buffer cannot hold the response
    OutputTooSmall(usize, usize), // required and actual
    /// The port id is not part of the registry
    UnknownPort(PortId),
    /// The configured baud rate is not a standard Modbus RTU rate
    UnsupportedBaudRate(u32),
    /// The configured response timeout is zero
    ResponseTimeoutOfZero,
    /// A configured rx/tx buffer cannot hold a full RTU frame
    BufferTooSmall(usize, usize), // configured and required
}

impl From<InvalidRange> for InvalidRequest {
    fn from(err: InvalidRange) -> Self {
        InvalidRequest::BadRange(err)
    }
}

impl std::error::Error for InvalidRequest {}

impl std::fmt::Display for InvalidRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            InvalidRequest::BadRange(err) => write!(f, "{err}"),
            InvalidRequest::CountTooBigForU16(count) => write!(
                f,
                "the requested count of objects exceeds the maximum value of u16: {count}"
            ),
            InvalidRequest::InvalidUnitId(id) => write!(
                f,
                "unit id {id} is not in the addressable range [1, 247]"
            ),
            InvalidRequest::OutputTooSmall(required, actual) => write!(
                f,
                "output buffer of length {actual} cannot hold the {required} values of the response"
            ),
            InvalidRequest::UnknownPort(id) => write!(f, "port {id} is not configured"),
            InvalidRequest::UnsupportedBaudRate(baud) => {
                write!(f, "baud rate {baud} is not supported")
            }
            InvalidRequest::ResponseTimeoutOfZero => f.write_str("response timeout is zero"),
            InvalidRequest::BufferTooSmall(size, required) => write!(
                f,
                "buffer size of {size} is less than the maximum RTU frame size of {required}"
            ),
        }
    }
}

/// Errors that occur while receiving a frame off the serial line
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FrameParseError {
    /// Received bytes whose trailing CRC did not match
    CrcValidationFailure(u16, u16), // received and calculated
    /// Fewer bytes than the minimum frame were received before the timeout
    FrameTooShort(usize),
}

impl std::error::Error for FrameParseError {}

impl std::fmt::Display for FrameParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            FrameParseError::CrcValidationFailure(received, expected) => write!(
                f,
                "received CRC value {received:#06X} does not match calculated value {expected:#06X}"
            ),
            FrameParseError::FrameTooShort(size) => write!(
                f,
                "received {size} bytes which is less than the minimum RTU frame"
            ),
        }
    }
}

/// Errors that occur while decoding a CRC-valid response
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AduParseError {
    /// Response is too short to be valid
    InsufficientBytes,
    /// The response came from a different unit than the one addressed
    UnexpectedUnitId(u8, u8), // expected and received
    /// An unknown response function code was received
    UnknownResponseFunction(u8, u8, u8), // actual, expected, expected error
    /// Byte count doesn't match what is expected based on the request
    RequestByteCountMismatch(usize, usize), // expected and actual
    /// Frame length doesn't match the function's expected length
    LengthMismatch(usize, usize), // expected and actual
    /// A parameter expected to be echoed in the reply did not match
    ReplyEchoMismatch,
}

impl std::error::Error for AduParseError {}

impl std::fmt::Display for AduParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            AduParseError::InsufficientBytes => f.write_str("response is too short to be valid"),
            AduParseError::UnexpectedUnitId(expected, received) => write!(
                f,
                "response from unit {received:#04X} while expecting unit {expected:#04X}"
            ),
            AduParseError::UnknownResponseFunction(actual, expected, error) => write!(
                f,
                "received unknown response function code: {actual:#04X}. Expected {expected:#04X} or {error:#04X}"
            ),
            AduParseError::RequestByteCountMismatch(request, response) => write!(
                f,
                "byte count ({response}) doesn't match what is expected based on request ({request})"
            ),
            AduParseError::LengthMismatch(expected, actual) => write!(
                f,
                "frame length ({actual}) doesn't match the expected length ({expected})"
            ),
            AduParseError::ReplyEchoMismatch => {
                f.write_str("a parameter expected to be echoed in the reply did not match")
            }
        }
    }
}

/// Errors that should only occur if there is a logic error in the library
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InternalError {
    /// Insufficient space for write operation
    InsufficientWriteSpace,
    /// The calculated frame size exceeds what is allowed for an RTU frame
    FrameTooBig(usize, usize), // the size and the limit
    /// Byte count would exceed maximum allowed size in the ADU of u8
    BadByteCount(usize),
}

impl std::error::Error for InternalError {}

impl std::fmt::Display for InternalError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            InternalError::InsufficientWriteSpace => {
                f.write_str("insufficient space for write operation")
            }
            InternalError::FrameTooBig(size, max) => write!(
                f,
                "frame length of {size} exceeds the maximum allowed length of {max}"
            ),
            InternalError::BadByteCount(size) => {
                write!(f, "byte count would exceed maximum size of u8: {size}")
            }
        }
    }
}
