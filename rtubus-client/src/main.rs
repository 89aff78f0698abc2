//! Command-line Modbus RTU master

use std::num::ParseIntError;
use std::str::FromStr;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

use rtubus::client::{PortConfig, PortHandle, PortRegistry};
use rtubus::*;

const PORT: PortId = PortId(0);

#[derive(Debug, thiserror::Error)]
enum Error {
    #[error("{0}")]
    BadInt(#[from] ParseIntError),
    #[error("bad character in bit string: {0}")]
    BadCharInBitString(char),
    #[error("{0}")]
    Request(#[from] RequestError),
}

#[derive(Parser)]
#[command(name = "rtubus-client")]
#[command(about = "A command line program for making Modbus RTU requests using the rtubus crate")]
#[command(version)]
struct Cli {
    #[arg(short = 'd', long, help = "The serial device (e.g. /dev/ttyUSB0 or COM3)")]
    device: String,

    #[arg(short = 'b', long, default_value_t = 9600, help = "The baud rate")]
    baud: u32,

    #[arg(long, value_enum, default_value_t = DataBitsArg::Eight, help = "Data bits per character")]
    data_bits: DataBitsArg,

    #[arg(long, value_enum, default_value_t = ParityArg::None, help = "Parity of each character")]
    parity: ParityArg,

    #[arg(long, value_enum, default_value_t = StopBitsArg::One, help = "Stop bits per character")]
    stop_bits: StopBitsArg,

    #[arg(long, value_enum, help = "Modem line driving the RS-485 transceiver, if any")]
    direction: Option<ControlLineArg>,

    #[arg(long, help = "The direction line is asserted low while transmitting")]
    active_low: bool,

    #[arg(short = 'i', long, default_value_t = 1, help = "The unit id of the slave")]
    id: u8,

    #[arg(short = 't', long, default_value_t = 1000, help = "Response timeout in milliseconds")]
    timeout: u32,

    #[arg(short = 'r', long, default_value_t = 2, help = "Retries after a timeout or bad frame")]
    retries: u8,

    #[arg(short = 'p', long, help = "Optional polling period in milliseconds")]
    period: Option<u64>,

    #[arg(long, value_enum, default_value_t = DecodeArg::Values, help = "How much of each request and response to log")]
    decode: DecodeArg,

    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, ValueEnum)]
enum DataBitsArg {
    #[value(name = "7")]
    Seven,
    #[value(name = "8")]
    Eight,
}

#[derive(Copy, Clone, ValueEnum)]
enum ParityArg {
    None,
    Odd,
    Even,
}

#[derive(Copy, Clone, ValueEnum)]
enum StopBitsArg {
    #[value(name = "1")]
    One,
    #[value(name = "2")]
    Two,
}

#[derive(Copy, Clone, ValueEnum)]
enum ControlLineArg {
    Rts,
    Dtr,
}

#[derive(Copy, Clone, ValueEnum)]
enum DecodeArg {
    Nothing,
    Function,
    Headers,
    Values,
    Frames,
    Bytes,
}

#[derive(Subcommand)]
enum Command {
    #[command(name = "rc", about = "read coils")]
    ReadCoils(ReadArgs),

    #[command(name = "rdi", about = "read discrete inputs")]
    ReadDiscreteInputs(ReadArgs),

    #[command(name = "rhr", about = "read holding registers")]
    ReadHoldingRegisters(ReadArgs),

    #[command(name = "rir", about = "read input registers")]
    ReadInputRegisters(ReadArgs),

    #[command(name = "wsc", about = "write single coil")]
    WriteSingleCoil(WriteSingleCoilArgs),

    #[command(name = "wsr", about = "write single register")]
    WriteSingleRegister(WriteSingleRegisterArgs),

    #[command(name = "wmc", about = "write multiple coils")]
    WriteMultipleCoils(WriteMultipleArgs),

    #[command(name = "wmr", about = "write multiple registers")]
    WriteMultipleRegisters(WriteMultipleArgs),
}

#[derive(Args)]
struct ReadArgs {
    #[arg(short = 's', long, help = "the starting address")]
    start: u16,

    #[arg(short = 'q', long, help = "quantity of values")]
    quantity: u16,
}

#[derive(Args)]
struct WriteSingleCoilArgs {
    #[arg(short = 'i', long, help = "the address of the coil")]
    index: u16,

    #[arg(short = 'v', long, action = clap::ArgAction::Set, help = "the value of the coil (true or false)")]
    value: bool,
}

#[derive(Args)]
struct WriteSingleRegisterArgs {
    #[arg(short = 'i', long, help = "the address of the register")]
    index: u16,

    #[arg(short = 'v', long, help = "the value of the register")]
    value: u16,
}

#[derive(Args)]
struct WriteMultipleArgs {
    #[arg(short = 's', long, help = "the starting address")]
    start: u16,

    #[arg(
        short = 'v',
        long,
        help = "coils as a string of 1 and 0 with the first address last (e.g. 10100011), or registers as a comma delimited list (e.g. 1,4,7)"
    )]
    values: String,
}

impl Cli {
    fn port_config(&self) -> PortConfig {
        let settings = SerialSettings {
            baud_rate: self.baud,
            data_bits: match self.data_bits {
                DataBitsArg::Seven => DataBits::Seven,
                DataBitsArg::Eight => DataBits::Eight,
            },
            parity: match self.parity {
                ParityArg::None => Parity::None,
                ParityArg::Odd => Parity::Odd,
                ParityArg::Even => Parity::Even,
            },
            stop_bits: match self.stop_bits {
                StopBitsArg::One => StopBits::One,
                StopBitsArg::Two => StopBits::Two,
            },
        };

        let mut config = PortConfig::new(self.device.as_str())
            .with_settings(settings)
            .with_response_timeout_ms(self.timeout)
            .with_max_retries(self.retries)
            .with_decode(self.decode.into());

        if let Some(line) = self.direction {
            let line = match line {
                ControlLineArg::Rts => ControlLine::Rts,
                ControlLineArg::Dtr => ControlLine::Dtr,
            };
            config = config.with_direction(DirectionControl {
                line,
                transmit_level_high: !self.active_low,
            });
        }

        config
    }
}

impl From<DecodeArg> for DecodeLevel {
    fn from(value: DecodeArg) -> Self {
        let pdu = match value {
            DecodeArg::Nothing => PduDecodeLevel::Nothing,
            DecodeArg::Function => PduDecodeLevel::FunctionCode,
            DecodeArg::Headers => PduDecodeLevel::DataHeaders,
            DecodeArg::Values | DecodeArg::Frames | DecodeArg::Bytes => PduDecodeLevel::DataValues,
        };
        let adu = match value {
            DecodeArg::Frames | DecodeArg::Bytes => AduDecodeLevel::Payload,
            _ => AduDecodeLevel::Nothing,
        };
        let physical = match value {
            DecodeArg::Bytes => PhysDecodeLevel::Data,
            _ => PhysDecodeLevel::Nothing,
        };
        DecodeLevel { pdu, adu, physical }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .init();

    if let Err(ref e) = run().await {
        println!("error: {e}");
    }

    Ok(())
}

async fn run() -> Result<(), Error> {
    let cli = Cli::parse();

    let registry: PortRegistry<SerialPortTransport> =
        PortRegistry::new([(PORT, cli.port_config())]);
    registry.init_serial(PORT).await?;
    let port = registry.port(PORT)?;
    let unit_id = UnitId::new(cli.id);

    match cli.period {
        None => run_command(&cli.command, &port, unit_id).await,
        Some(period_ms) => {
            let period = Duration::from_millis(period_ms);
            loop {
                if let Err(err) = run_command(&cli.command, &port, unit_id).await {
                    tracing::warn!("{err}");
                }
                tokio::time::sleep(period).await
            }
        }
    }
}

async fn run_command(
    command: &Command,
    port: &PortHandle<SerialPortTransport>,
    unit_id: UnitId,
) -> Result<(), Error> {
    match command {
        Command::ReadCoils(args) => {
            let mut output = vec![0u8; bytes_for_bits(args.quantity)];
            for x in port
                .read_coils(unit_id, args.start, args.quantity, &mut output)
                .await?
            {
                println!("index: {} value: {}", x.index, x.value)
            }
        }
        Command::ReadDiscreteInputs(args) => {
            let mut output = vec![0u8; bytes_for_bits(args.quantity)];
            for x in port
                .read_discrete_inputs(unit_id, args.start, args.quantity, &mut output)
                .await?
            {
                println!("index: {} value: {}", x.index, x.value)
            }
        }
        Command::ReadHoldingRegisters(args) => {
            let mut output = vec![0u16; args.quantity as usize];
            for x in port
                .read_holding_registers(unit_id, args.start, args.quantity, &mut output)
                .await?
            {
                println!("index: {} value: {}", x.index, x.value)
            }
        }
        Command::ReadInputRegisters(args) => {
            let mut output = vec![0u16; args.quantity as usize];
            for x in port
                .read_input_registers(unit_id, args.start, args.quantity, &mut output)
                .await?
            {
                println!("index: {} value: {}", x.index, x.value)
            }
        }
        Command::WriteSingleCoil(args) => {
            port.write_single_coil(unit_id, args.index, args.value)
                .await?;
        }
        Command::WriteSingleRegister(args) => {
            port.write_single_register(unit_id, args.index, args.value)
                .await?;
        }
        Command::WriteMultipleCoils(args) => {
            let values = parse_bit_values(&args.values)?;
            port.write_multiple_coils(unit_id, args.start, &values)
                .await?;
        }
        Command::WriteMultipleRegisters(args) => {
            let values = parse_register_values(&args.values)?;
            port.write_multiple_registers(unit_id, args.start, &values)
                .await?;
        }
    }
    Ok(())
}

fn bytes_for_bits(count: u16) -> usize {
    (count as usize + 7) / 8
}

fn parse_bit_values(values_str: &str) -> Result<Vec<bool>, Error> {
    let mut values: Vec<bool> = Vec::new();
    for c in values_str.chars().rev() {
        match c {
            '0' => values.push(false),
            '1' => values.push(true),
            _ => return Err(Error::BadCharInBitString(c)),
        }
    }
    Ok(values)
}

fn parse_register_values(values_str: &str) -> Result<Vec<u16>, ParseIntError> {
    let mut values: Vec<u16> = Vec::new();
    for value in values_str.split(',') {
        values.push(u16::from_str(value.trim())?);
    }
    Ok(values)
}
