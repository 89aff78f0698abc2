use std::error::Error;
use std::time::Duration;

use rtubus::client::{PortConfig, PortRegistry};
use rtubus::*;

const PORT: PortId = PortId(1);

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "/dev/ttyUSB0".to_string());

    let config = PortConfig::new(path)
        .with_settings(SerialSettings::with_baud_rate(19200))
        .with_direction(DirectionControl::new(ControlLine::Rts))
        .with_response_timeout_ms(500)
        .with_max_retries(2)
        .with_decode(DecodeLevel {
            pdu: PduDecodeLevel::DataHeaders,
            adu: AduDecodeLevel::Header,
            physical: PhysDecodeLevel::Nothing,
        });
    let registry: PortRegistry<SerialPortTransport> = PortRegistry::new([(PORT, config)]);
    registry.init_serial(PORT).await?;

    let port = registry.port(PORT)?;
    let mut registers = [0u16; 10];

    // poll some holding registers every 2 seconds
    loop {
        match port
            .read_holding_registers(UnitId::new(1), 0, 10, &mut registers)
            .await
        {
            Ok(values) => {
                for x in values {
                    println!("index: {} value: {}", x.index, x.value)
                }
            }
            Err(err) => println!("error: {err} ({})", Status::from(&err)),
        }

        tokio::time::sleep(Duration::from_secs(2)).await
    }
}
