use std::fmt::Write;

use tokio::time::{Duration, Instant};

use crate::client::PortConfig;
use crate::decode::PhysDecodeLevel;
use crate::error::RequestError;
use crate::serial::{Direction, SerialSettings, SerialTransport};

/// Wraps a transport with the timing rules of the RTU line
pub(crate) struct PhysLayer<T: SerialTransport> {
    io: T,
    direction_control: bool,
    inter_frame_delay: Duration,
    last_activity: Option<Instant>,
}

impl<T: SerialTransport> std::fmt::Debug for PhysLayer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("PhysLayer")
            .field("direction_control", &self.direction_control)
            .field("inter_frame_delay", &self.inter_frame_delay)
            .finish()
    }
}

impl<T: SerialTransport> PhysLayer<T> {
    pub(crate) fn new(io: T, config: &PortConfig) -> Self {
        Self {
            io,
            direction_control: config.direction.is_some(),
            inter_frame_delay: calculate_inter_frame_delay(config.settings.baud_rate),
            last_activity: None,
        }
    }

    pub(crate) fn flush_input(&mut self) -> std::io::Result<()> {
        self.io.flush_input()
    }

    /// waits until the line has been idle for 3.5 character times
    pub(crate) async fn wait_for_silence(&mut self) {
        if let Some(last_activity) = self.last_activity {
            tokio::time::sleep_until(last_activity + self.inter_frame_delay).await;
        }
    }

    /// takes the bus, releasing it when the returned guard is dropped
    pub(crate) fn transmit(&mut self) -> std::io::Result<TransmitGuard<'_, T>> {
        if self.direction_control {
            self.io.set_direction(Direction::Transmit)?;
        }
        Ok(TransmitGuard { phys: self })
    }

    pub(crate) async fn read(
        &mut self,
        buffer: &mut [u8],
        decode_level: PhysDecodeLevel,
    ) -> Result<usize, std::io::Error> {
        let length = self.io.read(buffer).await?;
        self.last_activity = Some(Instant::now());

        if decode_level.enabled() {
            if let Some(x) = buffer.get(0..length) {
                tracing::info!("PHYS RX - {}", PhysDisplay::new(decode_level, x))
            }
        }

        Ok(length)
    }
}

/// Holds the transceiver in transmit until dropped
pub(crate) struct TransmitGuard<'a, T: SerialTransport> {
    phys: &'a mut PhysLayer<T>,
}

impl<'a, T: SerialTransport> TransmitGuard<'a, T> {
    pub(crate) async fn write(
        &mut self,
        data: &[u8],
        decode_level: PhysDecodeLevel,
    ) -> Result<(), RequestError> {
        if decode_level.enabled() {
            tracing::info!("PHYS TX - {}", PhysDisplay::new(decode_level, data));
        }

        let written = self.phys.io.write(data).await?;
        if written != data.len() {
            tracing::warn!(
                "transport accepted {} of {} bytes",
                written,
                data.len()
            );
            return Err(RequestError::Busy);
        }

        Ok(())
    }

    /// a transmitter that never reports completion only costs `bound`
    pub(crate) async fn drain(&mut self, bound: Duration) -> Result<(), RequestError> {
        match tokio::time::timeout(bound, self.phys.io.wait_tx_complete()).await {
            Ok(result) => Ok(result?),
            Err(_) => {
                tracing::warn!(
                    "transmit did not complete within {} ms",
                    bound.as_millis()
                );
                Ok(())
            }
        }
    }
}

impl<'a, T: SerialTransport> Drop for TransmitGuard<'a, T> {
    fn drop(&mut self) {
        self.phys.last_activity = Some(Instant::now());
        if self.phys.direction_control {
            if let Err(err) = self.phys.io.set_direction(Direction::Receive) {
                tracing::warn!("unable to release the bus: {}", err);
            }
        }
    }
}

pub(crate) struct PhysDisplay<'a> {
    level: PhysDecodeLevel,
    data: &'a [u8],
}

impl<'a> PhysDisplay<'a> {
    pub(crate) fn new(level: PhysDecodeLevel, data: &'a [u8]) -> Self {
        PhysDisplay { level, data }
    }
}

impl<'a> std::fmt::Display for PhysDisplay<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{} bytes", self.data.len())?;
        if self.level.data_enabled() {
            format_bytes(f, self.data)?;
        }
        Ok(())
    }
}

pub(crate) fn calculate_inter_frame_delay(baud_rate: u32) -> Duration {
    // Modbus RTU uses 11-bit characters (1 start, 8 data, 1 parity or stop, 1 stop)
    const NUM_BITS_IN_CHAR: u64 = 11;

    // above this rate the delay is fixed
    const MAX_BAUD_RATE: u32 = 19200;
    const MIN_DELAY: Duration = Duration::from_micros(1750);

    match baud_rate {
        0 => MIN_DELAY,
        x if x <= MAX_BAUD_RATE => {
            let character_time = Duration::from_secs(NUM_BITS_IN_CHAR) / x;
            35 * character_time / 10 // multiply by 3.5
        }
        _ => MIN_DELAY,
    }
}

/// time to shift `len` bytes out of the UART at the configured settings
pub(crate) fn calculate_transmit_time(len: usize, settings: &SerialSettings) -> Duration {
    let bits = len as u64 * settings.bits_per_character() as u64;
    Duration::from_micros(bits * 1_000_000 / settings.baud_rate.max(1) as u64)
}

const BYTES_PER_DECODE_LINE: usize = 18;

pub(crate) fn format_bytes(f: &mut std::fmt::Formatter, bytes: &[u8]) -> std::fmt::Result {
    for chunk in bytes.chunks(BYTES_PER_DECODE_LINE) {
        writeln!(f)?;
        let mut first = true;
        for byte in chunk {
            if !first {
                f.write_char(' ')?;
            }
            first = false;
            write!(f, "{byte:02X?}")?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::Event;

    #[test]
    fn inter_frame_delay_is_three_and_a_half_characters() {
        assert_eq!(calculate_inter_frame_delay(9600).as_micros(), 4010);
        assert_eq!(calculate_inter_frame_delay(19200).as_micros(), 2005);
    }

    #[test]
    fn inter_frame_delay_is_fixed_above_19200() {
        assert_eq!(
            calculate_inter_frame_delay(38400),
            Duration::from_micros(1750)
        );
        assert_eq!(
            calculate_inter_frame_delay(115200),
            Duration::from_micros(1750)
        );
    }

    #[test]
    fn transmit_time_follows_character_size() {
        // 8 bytes of 10 bits at 9600 baud
        assert_eq!(
            calculate_transmit_time(8, &SerialSettings::default()).as_micros(),
            8333
        );
    }

    #[test]
    fn dropping_the_guard_releases_the_bus() {
        let (io, mut handle) = crate::mock::mock();
        let config = PortConfig::new("mock").with_direction(crate::serial::DirectionControl::new(
            crate::serial::ControlLine::Rts,
        ));
        let mut phys = PhysLayer::new(io, &config);
        {
            let _guard = phys.transmit().unwrap();
            assert_eq!(
                handle.try_next_event(),
                Some(Event::Direction(Direction::Transmit))
            );
        }
        assert_eq!(
            handle.try_next_event(),
            Some(Event::Direction(Direction::Receive))
        );
        assert!(phys.last_activity.is_some());
    }

    #[test]
    fn no_direction_calls_without_direction_control() {
        let (io, mut handle) = crate::mock::mock();
        let mut phys = PhysLayer::new(io, &PortConfig::new("mock"));
        drop(phys.transmit().unwrap());
        assert_eq!(handle.try_next_event(), None);
    }

    #[test]
    fn formats_bytes_in_rows() {
        let data: Vec<u8> = (0..20).collect();
        let display = PhysDisplay::new(PhysDecodeLevel::Data, &data).to_string();
        let lines: Vec<&str> = display.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "20 bytes");
        assert_eq!(lines[2], "12 13");
    }
}
