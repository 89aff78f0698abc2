//! An async implementation of a [Modbus](http://modbus.org/) RTU master for
//! half-duplex serial buses, built on [Tokio](https://docs.rs/tokio).
//!
//! # Features
//!
//! * Panic-free parsing
//! * One transaction in flight per port, any number of callers
//! * Timeouts, retries and the 3.5 character inter-frame silence handled by the library
//! * RS-485 driver enable via RTS or DTR, released even if a request is dropped
//! * Pluggable byte transport through the [`SerialTransport`] trait
//! * Configurable logging of PDUs, RTU frames and raw bytes via [`tracing`](https://docs.rs/tracing)
//!
//! # Supported Functions
//!
//! * Read Coils
//! * Read Discrete Inputs
//! * Read Holding Registers
//! * Read Input Registers
//! * Write Single Coil
//! * Write Single Register
//! * Write Multiple Coils
//! * Write Multiple Registers
//!
//! # Example
//!
//! Read four holding registers from unit 1 on an RS-485 adapter
//!
//! ```no_run
//! use rtubus::client::{PortConfig, PortRegistry};
//! use rtubus::*;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry: PortRegistry<SerialPortTransport> = PortRegistry::new([(
//!         PortId(1),
//!         PortConfig::new("/dev/ttyUSB0")
//!             .with_settings(SerialSettings::with_baud_rate(19200))
//!             .with_direction(DirectionControl::new(ControlLine::Rts)),
//!     )]);
//!
//!     registry.init_serial(PortId(1)).await?;
//!     let port = registry.port(PortId(1))?;
//!
//!     let mut registers = [0u16; 4];
//!     for x in port
//!         .read_holding_registers(UnitId::new(1), 0, 4, &mut registers)
//!         .await?
//!     {
//!         println!("{x}");
//!     }
//!
//!     Ok(())
//! }
//! ```

/// Master API: port configuration, the registry and the request handles
pub mod client;
/// Public constant values related to the Modbus specification
pub mod constants;

mod decode;
mod error;
mod exception;
mod serial;
mod status;
mod types;

// internal modules
mod common;
#[cfg(test)]
mod mock;

pub use crate::decode::*;
pub use crate::error::*;
pub use crate::exception::*;
pub use crate::serial::frame::crc16;
pub use crate::serial::*;
pub use crate::status::*;
pub use crate::types::*;
