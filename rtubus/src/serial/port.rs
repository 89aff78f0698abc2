use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::{ClearBuffer, SerialPort, SerialPortBuilderExt, SerialStream};

use crate::client::PortConfig;
use crate::serial::{
    ControlLine, DataBits, Direction, DirectionControl, Parity, SerialSettings, SerialTransport,
    StopBits,
};

/// [`SerialTransport`] over a native serial device
///
/// When the port has a [`DirectionControl`], the RTS or DTR modem line drives the RS-485
/// driver enable input of the transceiver.
pub struct SerialPortTransport {
    stream: SerialStream,
    direction: Option<DirectionControl>,
}

impl std::fmt::Debug for SerialPortTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("SerialPortTransport")
            .field("path", &self.stream.name())
            .field("direction", &self.direction)
            .finish()
    }
}

impl SerialPortTransport {
    /// Open the device named by `config.path` with the configured line settings
    pub fn open(config: &PortConfig) -> std::io::Result<Self> {
        let stream = tokio_serial::new(&config.path, config.settings.baud_rate)
            .data_bits(data_bits(config.settings))
            .parity(parity(config.settings))
            .stop_bits(stop_bits(config.settings))
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()?;

        Ok(Self {
            stream,
            direction: config.direction,
        })
    }
}

impl SerialTransport for SerialPortTransport {
    fn configure(&mut self, config: &PortConfig) -> std::io::Result<()> {
        self.stream.set_baud_rate(config.settings.baud_rate)?;
        self.stream.set_data_bits(data_bits(config.settings))?;
        self.stream.set_parity(parity(config.settings))?;
        self.stream.set_stop_bits(stop_bits(config.settings))?;
        self.stream.set_flow_control(tokio_serial::FlowControl::None)?;
        self.direction = config.direction;
        Ok(())
    }

    fn set_direction(&mut self, direction: Direction) -> std::io::Result<()> {
        let control = match self.direction {
            Some(x) => x,
            None => return Ok(()),
        };

        let level = control.level(direction);
        match control.line {
            ControlLine::Rts => self.stream.write_request_to_send(level)?,
            ControlLine::Dtr => self.stream.write_data_terminal_ready(level)?,
        }
        Ok(())
    }

    async fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
        AsyncWriteExt::write(&mut self.stream, data).await
    }

    async fn wait_tx_complete(&mut self) -> std::io::Result<()> {
        AsyncWriteExt::flush(&mut self.stream).await
    }

    async fn read(&mut self, buffer: &mut [u8]) -> std::io::Result<usize> {
        AsyncReadExt::read(&mut self.stream, buffer).await
    }

    fn flush_input(&mut self) -> std::io::Result<()> {
        self.stream.clear(ClearBuffer::Input)?;
        Ok(())
    }
}

fn data_bits(settings: SerialSettings) -> tokio_serial::DataBits {
    match settings.data_bits {
        DataBits::Seven => tokio_serial::DataBits::Seven,
        DataBits::Eight => tokio_serial::DataBits::Eight,
    }
}

fn parity(settings: SerialSettings) -> tokio_serial::Parity {
    match settings.parity {
        Parity::None => tokio_serial::Parity::None,
        Parity::Odd => tokio_serial::Parity::Odd,
        Parity::Even => tokio_serial::Parity::Even,
    }
}

fn stop_bits(settings: SerialSettings) -> tokio_serial::StopBits {
    match settings.stop_bits {
        StopBits::One => tokio_serial::StopBits::One,
        StopBits::Two => tokio_serial::StopBits::Two,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_line_settings() {
        let settings = SerialSettings {
            baud_rate: 19200,
            data_bits: DataBits::Seven,
            parity: Parity::Even,
            stop_bits: StopBits::Two,
        };
        assert_eq!(data_bits(settings), tokio_serial::DataBits::Seven);
        assert_eq!(parity(settings), tokio_serial::Parity::Even);
        assert_eq!(stop_bits(settings), tokio_serial::StopBits::Two);
    }

    #[tokio::test]
    async fn opening_a_missing_device_fails() {
        let config = PortConfig::new("/dev/this-port-does-not-exist");
        assert!(SerialPortTransport::open(&config).is_err());
    }
}
