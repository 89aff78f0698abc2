use tokio::time::{Duration, Instant};

use crate::client::message::{Request, RequestDetailsDisplay};
use crate::client::PortConfig;
use crate::common::phys::{calculate_transmit_time, PhysLayer};
use crate::error::{FrameParseError, InternalError, RequestError};
use crate::serial::frame::constants::{CRC_LENGTH, MAX_FRAME_LENGTH};
use crate::serial::frame::{check_frame, format_rtu_pdu, FrameBuffer, FrameStatus, RtuDisplay};
use crate::serial::SerialTransport;

/// added to the time the UART needs to shift out a frame
const DRAIN_MARGIN: Duration = Duration::from_millis(50);

/// How a single attempt ended
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Outcome {
    Success,
    /// a transport or framing failure worth another attempt with the same ADU
    Retryable(RequestError),
    /// an exception or a failure that no retry can fix
    Terminal(RequestError),
}

impl From<Result<(), RequestError>> for Outcome {
    fn from(result: Result<(), RequestError>) -> Self {
        match result {
            Ok(()) => Outcome::Success,
            Err(err) if err.is_retryable() => Outcome::Retryable(err),
            Err(err) => Outcome::Terminal(err),
        }
    }
}

/// Runs one request/response transaction, including its retries, on a locked port
pub(crate) async fn execute<T: SerialTransport>(
    phys: &mut PhysLayer<T>,
    config: &PortConfig,
    request: &mut Request<'_>,
) -> Result<(), RequestError> {
    let mut tx: FrameBuffer = [0; MAX_FRAME_LENGTH];
    let info = format_rtu_pdu(
        &mut tx,
        request.unit_id,
        request.details.function(),
        &request.details,
    )?;
    let adu = match tx.get(..info.len) {
        Some(x) => x,
        None => return Err(InternalError::FrameTooBig(info.len, MAX_FRAME_LENGTH).into()),
    };

    if config.decode.pdu.enabled() {
        tracing::info!(
            "PDU TX - {}",
            RequestDetailsDisplay::new(config.decode.pdu, &request.details)
        );
    }
    if config.decode.adu.enabled() {
        tracing::info!("RTU TX - {}", RtuDisplay::new(config.decode.adu, adu, info.crc));
    }

    let attempts = config.max_retries as usize + 1;
    let mut rx: FrameBuffer = [0; MAX_FRAME_LENGTH];
    let mut attempt = 1;

    loop {
        let outcome: Outcome = run_attempt(phys, config, adu, &mut rx, request)
            .await
            .into();

        match outcome {
            Outcome::Success => return Ok(()),
            Outcome::Terminal(err) => {
                tracing::warn!("request failed: {}", err);
                return Err(err);
            }
            Outcome::Retryable(err) => {
                if attempt >= attempts {
                    tracing::warn!("request failed after {} attempt(s): {}", attempts, err);
                    return Err(err);
                }
                tracing::warn!("attempt {} of {} failed: {}", attempt, attempts, err);
                attempt += 1;
            }
        }
    }
}

async fn run_attempt<T: SerialTransport>(
    phys: &mut PhysLayer<T>,
    config: &PortConfig,
    adu: &[u8],
    rx: &mut FrameBuffer,
    request: &mut Request<'_>,
) -> Result<(), RequestError> {
    phys.wait_for_silence().await;
    // bytes that trickled in during the silence belong to no request
    phys.flush_input()?;

    {
        let mut bus = phys.transmit()?;
        bus.write(adu, config.decode.physical).await?;
        bus.drain(calculate_transmit_time(adu.len(), &config.settings) + DRAIN_MARGIN)
            .await?;
    }

    let len = receive_frame(phys, config, rx).await?;
    let frame = match rx.get(..len - CRC_LENGTH) {
        Some(x) => x,
        None => return Err(FrameParseError::FrameTooShort(len).into()),
    };

    request.handle_response(frame, config.decode.pdu)
}

/// accumulates bytes until they form a CRC-valid frame, returning its length
async fn receive_frame<T: SerialTransport>(
    phys: &mut PhysLayer<T>,
    config: &PortConfig,
    rx: &mut FrameBuffer,
) -> Result<usize, RequestError> {
    let deadline = Instant::now() + config.response_timeout();
    let mut len = 0;
    let mut status = FrameStatus::Incomplete;

    loop {
        let dest = match rx.get_mut(len..) {
            Some(x) if !x.is_empty() => x,
            _ => return Err(InternalError::FrameTooBig(len, MAX_FRAME_LENGTH).into()),
        };

        let count =
            match tokio::time::timeout_at(deadline, phys.read(dest, config.decode.physical)).await
            {
                Ok(result) => result?,
                Err(_) => {
                    return Err(match status {
                        _ if len == 0 => RequestError::ResponseTimeout,
                        FrameStatus::Mismatch(received, expected) => {
                            FrameParseError::CrcValidationFailure(received, expected).into()
                        }
                        _ => FrameParseError::FrameTooShort(len).into(),
                    });
                }
            };

        if count == 0 {
            return Err(RequestError::Io(std::io::ErrorKind::UnexpectedEof));
        }

        // a single read may carry a valid frame followed by line noise
        let start = len;
        len += count;
        for end in (start + 1)..=len {
            let candidate = match rx.get(..end) {
                Some(x) => x,
                None => return Err(InternalError::InsufficientWriteSpace.into()),
            };
            status = check_frame(candidate);
            if let FrameStatus::Valid(crc) = status {
                if config.decode.adu.enabled() {
                    tracing::info!("RTU RX - {}", RtuDisplay::new(config.decode.adu, candidate, crc));
                }
                if end < len {
                    tracing::debug!("discarded {} byte(s) after the response", len - end);
                }
                return Ok(end);
            }
        }

        if let FrameStatus::Mismatch(received, expected) = status {
            if len == MAX_FRAME_LENGTH {
                return Err(FrameParseError::CrcValidationFailure(received, expected).into());
            }
        }
    }
}
