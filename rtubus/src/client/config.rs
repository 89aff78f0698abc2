use std::time::Duration;

use crate::decode::DecodeLevel;
use crate::error::InvalidRequest;
use crate::serial::frame::constants::MAX_FRAME_LENGTH;
use crate::serial::{DirectionControl, SerialSettings};

/// Baud rates accepted by [`PortConfig::validate`]
pub const SUPPORTED_BAUD_RATES: [u32; 8] = [1200, 2400, 4800, 9600, 19200, 38400, 57600, 115200];

/// Immutable configuration of one logical serial port
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize, serde::Deserialize))]
pub struct PortConfig {
    /// Serial device path, e.g. `/dev/ttyUSB0` or `COM3`
    pub path: String,
    /// Optional RS-485 direction control line
    pub direction: Option<DirectionControl>,
    /// Line settings
    pub settings: SerialSettings,
    /// Time to wait for the first byte of a response and for it to complete
    pub response_timeout_ms: u32,
    /// Number of attempts made after the first one fails with a retryable error
    pub max_retries: u8,
    /// Size of the driver receive buffer
    pub rx_buffer_size: usize,
    /// Size of the driver transmit buffer
    pub tx_buffer_size: usize,
    /// Protocol decoding written to the log
    pub decode: DecodeLevel,
}

impl PortConfig {
    /// Default configuration for the given device path
    pub fn new<S: Into<String>>(path: S) -> Self {
        Self {
            path: path.into(),
            direction: None,
            settings: SerialSettings::default(),
            response_timeout_ms: 1000,
            max_retries: 2,
            rx_buffer_size: MAX_FRAME_LENGTH,
            tx_buffer_size: MAX_FRAME_LENGTH,
            decode: DecodeLevel::default(),
        }
    }

    /// Set the line settings
    pub fn with_settings(self, settings: SerialSettings) -> Self {
        Self { settings, ..self }
    }

    /// Enable RS-485 direction control
    pub fn with_direction(self, direction: DirectionControl) -> Self {
        Self {
            direction: Some(direction),
            ..self
        }
    }

    /// Set the response timeout in milliseconds
    pub fn with_response_timeout_ms(self, response_timeout_ms: u32) -> Self {
        Self {
            response_timeout_ms,
            ..self
        }
    }

    /// Set the number of retries
    pub fn with_max_retries(self, max_retries: u8) -> Self {
        Self {
            max_retries,
            ..self
        }
    }

    /// Set the decode level
    pub fn with_decode(self, decode: DecodeLevel) -> Self {
        Self { decode, ..self }
    }

    /// The response timeout as a `Duration`
    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms as u64)
    }

    /// Check the configuration before a port is initialized with it
    pub fn validate(&self) -> Result<(), InvalidRequest> {
        if !SUPPORTED_BAUD_RATES.contains(&self.settings.baud_rate) {
            return Err(InvalidRequest::UnsupportedBaudRate(
                self.settings.baud_rate,
            ));
        }

        if self.response_timeout_ms == 0 {
            return Err(InvalidRequest::ResponseTimeoutOfZero);
        }

        for size in [self.rx_buffer_size, self.tx_buffer_size] {
            if size < MAX_FRAME_LENGTH {
                return Err(InvalidRequest::BufferTooSmall(size, MAX_FRAME_LENGTH));
            }
        }

        Ok(())
    }
}

impl Default for PortConfig {
    fn default() -> Self {
        Self::new("")
    }
}
