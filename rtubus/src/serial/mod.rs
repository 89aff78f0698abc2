use std::future::Future;

use crate::client::PortConfig;

pub(crate) mod frame;
#[cfg(feature = "serial")]
pub(crate) mod port;

#[cfg(feature = "serial")]
pub use port::SerialPortTransport;

/// Number of data bits per character
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize, serde::Deserialize))]
pub enum DataBits {
    /// 7 bits per character
    Seven,
    /// 8 bits per character
    Eight,
}

/// Parity checking modes
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize, serde::Deserialize))]
pub enum Parity {
    /// No parity bit
    None,
    /// Parity bit sets odd number of 1 bits
    Odd,
    /// Parity bit sets even number of 1 bits
    Even,
}

/// Number of stop bits
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize, serde::Deserialize))]
pub enum StopBits {
    /// One stop bit
    One,
    /// Two stop bits
    Two,
}

/// Serial line settings
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize, serde::Deserialize))]
pub struct SerialSettings {
    /// Baud rate of the port
    pub baud_rate: u32,
    /// Number of data bits
    pub data_bits: DataBits,
    /// Parity setting
    pub parity: Parity,
    /// Number of stop bits
    pub stop_bits: StopBits,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
        }
    }
}

impl SerialSettings {
    /// Create the default 8N1 settings at the given baud rate
    pub fn with_baud_rate(baud_rate: u32) -> Self {
        Self {
            baud_rate,
            ..Default::default()
        }
    }

    /// start bit, data bits, optional parity bit and stop bits
    pub(crate) fn bits_per_character(&self) -> u32 {
        let data = match self.data_bits {
            DataBits::Seven => 7,
            DataBits::Eight => 8,
        };
        let parity = match self.parity {
            Parity::None => 0,
            Parity::Odd | Parity::Even => 1,
        };
        let stop = match self.stop_bits {
            StopBits::One => 1,
            StopBits::Two => 2,
        };
        1 + data + parity + stop
    }
}

impl std::fmt::Display for SerialSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let data = match self.data_bits {
            DataBits::Seven => '7',
            DataBits::Eight => '8',
        };
        let parity = match self.parity {
            Parity::None => 'N',
            Parity::Odd => 'O',
            Parity::Even => 'E',
        };
        let stop = match self.stop_bits {
            StopBits::One => '1',
            StopBits::Two => '2',
        };
        write!(f, "{} {data}{parity}{stop}", self.baud_rate)
    }
}

/// Modem control line wired to the RS-485 driver enable (DE/RE) input
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize, serde::Deserialize))]
pub enum ControlLine {
    /// Request To Send
    Rts,
    /// Data Terminal Ready
    Dtr,
}

/// Direction control of a half-duplex transceiver
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize, serde::Deserialize))]
pub struct DirectionControl {
    /// line that drives the transceiver
    pub line: ControlLine,
    /// when true the line is asserted high while transmitting
    pub transmit_level_high: bool,
}

impl DirectionControl {
    /// Create an active-high direction control on the given line
    pub fn new(line: ControlLine) -> Self {
        Self {
            line,
            transmit_level_high: true,
        }
    }

    /// line level for a given bus direction
    pub fn level(&self, direction: Direction) -> bool {
        match direction {
            Direction::Transmit => self.transmit_level_high,
            Direction::Receive => !self.transmit_level_high,
        }
    }
}

/// Bus direction of a half-duplex transceiver
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Direction {
    /// The driver is enabled and the master owns the bus
    Transmit,
    /// The driver is released so that a slave can answer
    Receive,
}

/// Byte-level serial transport consumed by the protocol engine
///
/// The engine owns every timing decision: response timeouts, the inter-frame
/// silence and the bound on transmit drain are applied around these calls with
/// `tokio::time`, so implementations simply wait for I/O to be possible.
pub trait SerialTransport: Send {
    /// Apply the line settings of the port
    ///
    /// Called once when the port is initialized.
    fn configure(&mut self, config: &PortConfig) -> std::io::Result<()>;

    /// Drive the direction control line
    ///
    /// Only called when the port is configured with a [`DirectionControl`]. This call is
    /// synchronous so that the line can be released from a destructor.
    fn set_direction(&mut self, direction: Direction) -> std::io::Result<()>;

    /// Write bytes to the line, returning how many were accepted
    fn write(&mut self, data: &[u8]) -> impl Future<Output = std::io::Result<usize>> + Send;

    /// Wait until the transmitter has shifted out every written byte
    fn wait_tx_complete(&mut self) -> impl Future<Output = std::io::Result<()>> + Send;

    /// Read available bytes, waiting until at least one is available
    ///
    /// Returning 0 indicates that the transport was closed.
    fn read(&mut self, buffer: &mut [u8]) -> impl Future<Output = std::io::Result<usize>> + Send;

    /// Discard any bytes received but not yet read
    fn flush_input(&mut self) -> std::io::Result<()>;
}
