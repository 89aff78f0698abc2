use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::Instrument;

use crate::client::message::{Request, RequestDetails};
use crate::client::requests::read_bits::ReadBits;
use crate::client::requests::read_registers::ReadRegisters;
use crate::client::requests::write_multiple::{MultipleWrite, WriteMultiple};
use crate::client::requests::write_single::SingleWrite;
use crate::client::transaction;
use crate::client::PortConfig;
use crate::common::bits::num_bytes_for_bits;
use crate::common::phys::PhysLayer;
use crate::constants::limits::*;
use crate::error::{InvalidRequest, RequestError};
use crate::serial::{Direction, SerialTransport};
use crate::types::{AddressRange, BitIterator, Indexed, PortId, RegisterIterator, UnitId};

/// Runtime state of one configured port
///
/// The mutex is held for the whole of a transaction, retries included, so at most one
/// request is ever in flight on the line.
pub(crate) struct Port<T: SerialTransport> {
    id: PortId,
    config: PortConfig,
    phys: Mutex<Option<PhysLayer<T>>>,
}

impl<T: SerialTransport> Port<T> {
    pub(crate) fn new(id: PortId, config: PortConfig) -> Self {
        Self {
            id,
            config,
            phys: Mutex::new(None),
        }
    }

    pub(crate) async fn init(&self, mut transport: T) -> Result<(), RequestError> {
        let mut phys = self.phys.lock().await;
        if phys.is_some() {
            return Err(RequestError::AlreadyInitialized);
        }

        self.config.validate()?;
        transport.configure(&self.config)?;
        if self.config.direction.is_some() {
            transport.set_direction(Direction::Receive)?;
        }

        *phys = Some(PhysLayer::new(transport, &self.config));
        tracing::info!(
            "port {} initialized: {} {}",
            self.id,
            self.config.path,
            self.config.settings
        );
        Ok(())
    }

    pub(crate) async fn deinit(&self) {
        if self.phys.lock().await.take().is_some() {
            tracing::info!("port {} released", self.id);
        }
    }

    async fn execute(&self, mut request: Request<'_>) -> Result<(), RequestError> {
        let span = tracing::info_span!("Transaction", port = %self.id, unit = %request.unit_id);
        async {
            let mut phys = self.phys.lock().await;
            let phys = match phys.as_mut() {
                Some(x) => x,
                None => return Err(RequestError::NotInitialized),
            };
            transaction::execute(phys, &self.config, &mut request).await
        }
        .instrument(span)
        .await
    }
}

/// Handle used to make requests on one port of a [`PortRegistry`](crate::client::PortRegistry)
///
/// Handles are cheap to clone and may be used from any number of tasks. Each method is `async`
/// and completes once the whole transaction, including its retries, is finished. Arguments are
/// validated before the bus is touched.
pub struct PortHandle<T: SerialTransport> {
    port: Arc<Port<T>>,
}

impl<T: SerialTransport> Clone for PortHandle<T> {
    fn clone(&self) -> Self {
        Self {
            port: self.port.clone(),
        }
    }
}

impl<T: SerialTransport> std::fmt::Debug for PortHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("PortHandle")
            .field("id", &self.port.id)
            .field("path", &self.port.config.path)
            .finish()
    }
}

impl<T: SerialTransport> PortHandle<T> {
    pub(crate) fn new(port: Port<T>) -> Self {
        Self {
            port: Arc::new(port),
        }
    }

    pub(crate) fn port(&self) -> &Port<T> {
        &self.port
    }

    /// Identifier of the port within its registry
    pub fn id(&self) -> PortId {
        self.port.id
    }

    /// Configuration the port was created with
    pub fn config(&self) -> &PortConfig {
        &self.port.config
    }

    /// Read coils from a slave
    ///
    /// The packed bits are written to the start of `output`, which must hold at least
    /// `ceil(count / 8)` bytes. The returned iterator borrows them.
    pub async fn read_coils<'b>(
        &self,
        unit_id: UnitId,
        start: u16,
        count: u16,
        output: &'b mut [u8],
    ) -> Result<BitIterator<'b>, RequestError> {
        let unit_id = unit_id.validate()?;
        let range = AddressRange::try_from(start, count)?.limited_count(MAX_READ_COILS_COUNT)?;
        let output = bits_output(range, output)?;
        self.port
            .execute(Request::new(
                unit_id,
                RequestDetails::ReadCoils(ReadBits::new(range, &mut *output)),
            ))
            .await?;
        Ok(BitIterator::new(output, range))
    }

    /// Read discrete inputs from a slave
    ///
    /// Same buffer rules as [`PortHandle::read_coils`]
    pub async fn read_discrete_inputs<'b>(
        &self,
        unit_id: UnitId,
        start: u16,
        count: u16,
        output: &'b mut [u8],
    ) -> Result<BitIterator<'b>, RequestError> {
        let unit_id = unit_id.validate()?;
        let range = AddressRange::try_from(start, count)?.limited_count(MAX_READ_COILS_COUNT)?;
        let output = bits_output(range, output)?;
        self.port
            .execute(Request::new(
                unit_id,
                RequestDetails::ReadDiscreteInputs(ReadBits::new(range, &mut *output)),
            ))
            .await?;
        Ok(BitIterator::new(output, range))
    }

    /// Read holding registers from a slave
    ///
    /// `output` must hold at least `count` registers.
    pub async fn read_holding_registers<'b>(
        &self,
        unit_id: UnitId,
        start: u16,
        count: u16,
        output: &'b mut [u16],
    ) -> Result<RegisterIterator<'b>, RequestError> {
        let unit_id = unit_id.validate()?;
        let range =
            AddressRange::try_from(start, count)?.limited_count(MAX_READ_REGISTERS_COUNT)?;
        let output = registers_output(range, output)?;
        self.port
            .execute(Request::new(
                unit_id,
                RequestDetails::ReadHoldingRegisters(ReadRegisters::new(range, &mut *output)),
            ))
            .await?;
        Ok(RegisterIterator::new(output, range))
    }

    /// Read input registers from a slave
    pub async fn read_input_registers<'b>(
        &self,
        unit_id: UnitId,
        start: u16,
        count: u16,
        output: &'b mut [u16],
    ) -> Result<RegisterIterator<'b>, RequestError> {
        let unit_id = unit_id.validate()?;
        let range =
            AddressRange::try_from(start, count)?.limited_count(MAX_READ_REGISTERS_COUNT)?;
        let output = registers_output(range, output)?;
        self.port
            .execute(Request::new(
                unit_id,
                RequestDetails::ReadInputRegisters(ReadRegisters::new(range, &mut *output)),
            ))
            .await?;
        Ok(RegisterIterator::new(output, range))
    }

    /// Write a single coil on the slave
    pub async fn write_single_coil(
        &self,
        unit_id: UnitId,
        address: u16,
        value: bool,
    ) -> Result<Indexed<bool>, RequestError> {
        let unit_id = unit_id.validate()?;
        let request = Indexed::new(address, value);
        self.port
            .execute(Request::new(
                unit_id,
                RequestDetails::WriteSingleCoil(SingleWrite::new(request)),
            ))
            .await?;
        Ok(request)
    }

    /// Write a single register on the slave
    pub async fn write_single_register(
        &self,
        unit_id: UnitId,
        address: u16,
        value: u16,
    ) -> Result<Indexed<u16>, RequestError> {
        let unit_id = unit_id.validate()?;
        let request = Indexed::new(address, value);
        self.port
            .execute(Request::new(
                unit_id,
                RequestDetails::WriteSingleRegister(SingleWrite::new(request)),
            ))
            .await?;
        Ok(request)
    }

    /// Write multiple contiguous coils on the slave
    pub async fn write_multiple_coils(
        &self,
        unit_id: UnitId,
        start: u16,
        values: &[bool],
    ) -> Result<AddressRange, RequestError> {
        let unit_id = unit_id.validate()?;
        let request = WriteMultiple::from(start, values, MAX_WRITE_COILS_COUNT)?;
        self.port
            .execute(Request::new(
                unit_id,
                RequestDetails::WriteMultipleCoils(MultipleWrite::new(request)),
            ))
            .await?;
        Ok(request.range)
    }

    /// Write multiple contiguous registers on the slave
    pub async fn write_multiple_registers(
        &self,
        unit_id: UnitId,
        start: u16,
        values: &[u16],
    ) -> Result<AddressRange, RequestError> {
        let unit_id = unit_id.validate()?;
        let request = WriteMultiple::from(start, values, MAX_WRITE_REGISTERS_COUNT)?;
        self.port
            .execute(Request::new(
                unit_id,
                RequestDetails::WriteMultipleRegisters(MultipleWrite::new(request)),
            ))
            .await?;
        Ok(request.range)
    }
}

fn bits_output(range: AddressRange, output: &mut [u8]) -> Result<&mut [u8], InvalidRequest> {
    let required = num_bytes_for_bits(range.count);
    let actual = output.len();
    match output.get_mut(..required) {
        Some(x) => Ok(x),
        None => Err(InvalidRequest::OutputTooSmall(required, actual)),
    }
}

fn registers_output(range: AddressRange, output: &mut [u16]) -> Result<&mut [u16], InvalidRequest> {
    let required = range.count as usize;
    let actual = output.len();
    match output.get_mut(..required) {
        Some(x) => Ok(x),
        None => Err(InvalidRequest::OutputTooSmall(required, actual)),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::error::InvalidRange;
    use crate::exception::ExceptionCode;
    use crate::mock::{mock, Event, Handle, MockTransport};
    use crate::serial::frame::crc16;
    use crate::serial::{ControlLine, DirectionControl, SerialSettings};
    use crate::status::Status;

    const UNIT: UnitId = UnitId { value: 0x2A };

    fn with_crc(body: &[u8]) -> Vec<u8> {
        let mut frame = body.to_vec();
        frame.extend_from_slice(&crc16(body).to_le_bytes());
        frame
    }

    async fn ready_port() -> (PortHandle<MockTransport>, Handle) {
        let (io, mut handle) = mock();
        let port = PortHandle::new(Port::new(
            PortId(1),
            PortConfig::new("mock").with_response_timeout_ms(100),
        ));
        port.port().init(io).await.unwrap();
        assert_eq!(handle.drain_events(), vec![Event::Configure]);
        (port, handle)
    }

    #[tokio::test(start_paused = true)]
    async fn requests_before_init_touch_nothing() {
        let (_io, mut handle) = mock();
        let port: PortHandle<MockTransport> =
            PortHandle::new(Port::new(PortId(1), PortConfig::new("mock")));
        let mut output = [0u16; 1];
        assert_eq!(
            port.read_holding_registers(UNIT, 0, 1, &mut output).await.err(),
            Some(RequestError::NotInitialized)
        );
        assert_eq!(handle.try_next_event(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn second_init_is_rejected() {
        let (port, mut handle) = ready_port().await;
        let (io, mut other) = mock();
        assert_eq!(
            port.port().init(io).await,
            Err(RequestError::AlreadyInitialized)
        );
        assert_eq!(handle.try_next_event(), None);
        assert_eq!(other.try_next_event(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn init_releases_the_bus_when_direction_is_controlled() {
        let (io, mut handle) = mock();
        let port = PortHandle::new(Port::new(
            PortId(1),
            PortConfig::new("mock").with_direction(DirectionControl::new(ControlLine::Dtr)),
        ));
        port.port().init(io).await.unwrap();
        assert_eq!(
            handle.drain_events(),
            vec![Event::Configure, Event::Direction(Direction::Receive)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn init_validates_the_configuration() {
        let (io, mut handle) = mock();
        let port = PortHandle::new(Port::new(
            PortId(1),
            PortConfig::new("mock").with_settings(SerialSettings::with_baud_rate(12345)),
        ));
        assert_eq!(
            port.port().init(io).await,
            Err(InvalidRequest::UnsupportedBaudRate(12345).into())
        );
        assert_eq!(handle.try_next_event(), None);

        let mut output = [0u8; 1];
        assert_eq!(
            port.read_coils(UNIT, 0, 1, &mut output).await.err(),
            Some(RequestError::NotInitialized)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn deinit_returns_the_port_to_uninitialized() {
        let (port, _handle) = ready_port().await;
        port.port().deinit().await;
        port.port().deinit().await;
        assert_eq!(
            port.write_single_coil(UNIT, 0, true).await,
            Err(RequestError::NotInitialized)
        );

        let (io, _) = mock();
        port.port().init(io).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_arguments_never_reach_the_transport() {
        let (port, mut handle) = ready_port().await;
        let mut bits = [0u8; 251];
        let mut registers = [0u16; 126];

        let results = vec![
            port.read_holding_registers(UnitId::new(0), 0, 1, &mut registers)
                .await
                .err(),
            port.read_holding_registers(UnitId::new(248), 0, 1, &mut registers)
                .await
                .err(),
            port.read_holding_registers(UNIT, 0, 0, &mut registers)
                .await
                .err(),
            port.read_holding_registers(UNIT, 0, 126, &mut registers)
                .await
                .err(),
            port.read_input_registers(UNIT, 0xFFFF, 2, &mut registers)
                .await
                .err(),
            port.read_input_registers(UNIT, 0, 10, &mut registers[..9])
                .await
                .err(),
            port.read_coils(UNIT, 0, 0, &mut bits).await.err(),
            port.read_coils(UNIT, 0, 2001, &mut bits).await.err(),
            port.read_discrete_inputs(UNIT, 0, 9, &mut bits[..1])
                .await
                .err(),
            port.write_single_register(UnitId::new(0), 0, 1).await.err(),
            port.write_multiple_coils(UNIT, 0, &[false; 1969]).await.err(),
            port.write_multiple_coils(UNIT, 0, &[]).await.err(),
            port.write_multiple_registers(UNIT, 0, &[0; 124]).await.err(),
            port.write_multiple_registers(UNIT, 0xFFFF, &[0; 2]).await.err(),
        ];

        for result in results {
            assert_eq!(result.map(|x| Status::from(&x)), Some(Status::InvalidParam));
        }
        assert_eq!(handle.try_next_event(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn reports_which_argument_is_invalid() {
        let (port, _handle) = ready_port().await;
        let mut bits = [0u8; 1];
        assert_eq!(
            port.read_coils(UNIT, 0, 9, &mut bits).await.err(),
            Some(InvalidRequest::OutputTooSmall(2, 1).into())
        );
        assert_eq!(
            port.read_coils(UNIT, 0, 2001, &mut bits).await.err(),
            Some(InvalidRange::CountTooLargeForType(2001, 2000).into())
        );
        assert_eq!(
            port.write_single_coil(UnitId::new(0), 0, true).await.err(),
            Some(InvalidRequest::InvalidUnitId(0).into())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn holding_register_quantity_is_encoded_big_endian() {
        let (port, mut handle) = ready_port().await;

        for count in 1u16..=125 {
            let mut response = vec![0x2A, 0x03, (2 * count) as u8];
            response.extend((0..count).flat_map(|x| x.to_be_bytes()));
            let response = with_crc(&response);

            let task = {
                let port = port.clone();
                tokio::spawn(async move {
                    let mut output = [0u16; 125];
                    let values: Vec<Indexed<u16>> = port
                        .read_holding_registers(UNIT, 0x100, count, &mut output)
                        .await?
                        .collect();
                    Ok::<_, RequestError>(values)
                })
            };

            let request = handle.next_write().await;
            assert_eq!(request.len(), 8);
            assert_eq!(request[1], 0x03);
            assert_eq!(&request[4..6], &count.to_be_bytes());
            handle.read(&response);

            let values = task.await.unwrap().unwrap();
            assert_eq!(values.len(), count as usize);
            assert_eq!(values.last(), Some(&Indexed::new(0x100 + count - 1, count - 1)));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn input_registers_use_their_own_function_code() {
        let (port, mut handle) = ready_port().await;

        let task = {
            let port = port.clone();
            tokio::spawn(async move {
                let mut output = [0u16; 2];
                let values: Vec<Indexed<u16>> = port
                    .read_input_registers(UNIT, 0x0008, 2, &mut output)
                    .await?
                    .collect();
                Ok::<_, RequestError>(values)
            })
        };

        assert_eq!(
            handle.next_write().await,
            with_crc(&[0x2A, 0x04, 0x00, 0x08, 0x00, 0x02])
        );
        handle.read(&with_crc(&[0x2A, 0x04, 0x04, 0x00, 0x0A, 0x01, 0x02]));

        assert_eq!(
            task.await.unwrap().unwrap(),
            vec![Indexed::new(0x0008, 0x000A), Indexed::new(0x0009, 0x0102)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn coil_counts_expect_packed_byte_counts() {
        let (port, mut handle) = ready_port().await;

        for (count, bytes) in [(1u16, 1u8), (7, 1), (8, 1), (9, 2), (2000, 250)] {
            let mut response = vec![0x2A, 0x01, bytes];
            response.extend(std::iter::repeat(0xFF).take(bytes as usize));
            let response = with_crc(&response);

            let task = {
                let port = port.clone();
                tokio::spawn(async move {
                    let mut output = [0u8; 250];
                    let on = port
                        .read_coils(UNIT, 0, count, &mut output)
                        .await?
                        .filter(|x| x.value)
                        .count();
                    Ok::<_, RequestError>(on)
                })
            };

            handle.next_write().await;
            handle.read(&response);
            assert_eq!(task.await.unwrap(), Ok(count as usize));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn discrete_inputs_iterate_in_address_order() {
        let (port, mut handle) = ready_port().await;

        let task = {
            let port = port.clone();
            tokio::spawn(async move {
                let mut output = [0u8; 3];
                let values: Vec<bool> = port
                    .read_discrete_inputs(UNIT, 0x10, 19, &mut output)
                    .await?
                    .map(|x| x.value)
                    .collect();
                Ok::<_, RequestError>(values)
            })
        };

        assert_eq!(
            handle.next_write().await,
            vec![0x2A, 0x02, 0x00, 0x10, 0x00, 0x13, 0x3E, 0x19]
        );
        handle.read(&[0x2A, 0x02, 0x03, 0xCD, 0x6B, 0x05, 0x00, 0x99]);

        let values = task.await.unwrap().unwrap();
        assert_eq!(values.len(), 19);
        // 0xCD = 1100 1101, least significant bit first
        assert_eq!(
            &values[..8],
            &[true, false, true, true, false, false, true, true]
        );
        assert_eq!(&values[16..], &[true, false, true]);
    }

    #[tokio::test(start_paused = true)]
    async fn single_coil_uses_the_standard_encoding() {
        let (port, mut handle) = ready_port().await;

        for (value, wire) in [(true, [0xFF, 0x00]), (false, [0x00, 0x00])] {
            let task = {
                let port = port.clone();
                tokio::spawn(async move { port.write_single_coil(UNIT, 0x10, value).await })
            };

            let request = handle.next_write().await;
            assert_eq!(&request[..4], &[0x2A, 0x05, 0x00, 0x10]);
            assert_eq!(&request[4..6], &wire);
            // the slave echoes the request
            handle.read(&request);

            assert_eq!(task.await.unwrap(), Ok(Indexed::new(0x10, value)));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn multiple_writes_return_the_written_range() {
        let (port, mut handle) = ready_port().await;

        let task = {
            let port = port.clone();
            tokio::spawn(async move {
                port.write_multiple_registers(UNIT, 0x10, &[0x1234, 0x5678])
                    .await
            })
        };
        assert_eq!(
            handle.next_write().await,
            with_crc(&[0x2A, 0x10, 0x00, 0x10, 0x00, 0x02, 0x04, 0x12, 0x34, 0x56, 0x78])
        );
        handle.read(&[0x2A, 0x10, 0x00, 0x10, 0x00, 0x02, 0x46, 0x16]);
        assert_eq!(
            task.await.unwrap(),
            Ok(AddressRange::try_from(0x10, 2).unwrap())
        );

        let task = {
            let port = port.clone();
            tokio::spawn(async move {
                port.write_multiple_coils(UNIT, 0x10, &[true; 10]).await
            })
        };
        assert_eq!(
            handle.next_write().await,
            with_crc(&[0x2A, 0x0F, 0x00, 0x10, 0x00, 0x0A, 0x02, 0xFF, 0x03])
        );
        handle.read(&[0x2A, 0x0F, 0x00, 0x10, 0x00, 0x0A, 0xD2, 0x12]);
        assert_eq!(
            task.await.unwrap(),
            Ok(AddressRange::try_from(0x10, 10).unwrap())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn exception_is_returned_after_one_write() {
        let (port, mut handle) = ready_port().await;

        let task = {
            let port = port.clone();
            tokio::spawn(async move {
                let mut output = [0u16; 3];
                port.read_holding_registers(UNIT, 0x10, 3, &mut output)
                    .await
                    .map(|x| x.count())
            })
        };

        handle.next_write().await;
        handle.read(&[0x2A, 0x83, 0x02, 0xB0, 0xF9]);
        let result = task.await.unwrap();
        assert_eq!(
            result,
            Err(RequestError::Exception(ExceptionCode::IllegalDataAddress))
        );
        assert_eq!(Status::of(&result), Status::IllegalDataAddress);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(!handle
            .drain_events()
            .iter()
            .any(|x| matches!(x, Event::Write(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn callers_on_one_port_never_interleave() {
        let (port, mut handle) = ready_port().await;

        let tasks: Vec<_> = (0..2u16)
            .map(|address| {
                let port = port.clone();
                tokio::spawn(async move { port.write_single_register(UNIT, address, 0x1234).await })
            })
            .collect();

        let first = handle.next_write().await;
        // the second caller is parked on the lock until the first response arrives
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(!handle
            .drain_events()
            .iter()
            .any(|x| matches!(x, Event::Write(_))));

        handle.read(&first);
        let second = handle.next_write().await;
        assert_ne!(first, second);
        handle.read(&second);

        for task in tasks {
            assert!(task.await.unwrap().is_ok());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn callers_on_different_ports_overlap() {
        let (a, mut handle_a) = ready_port().await;
        let (b, mut handle_b) = ready_port().await;

        let task_a = tokio::spawn(async move { a.write_single_register(UNIT, 1, 2).await });
        let task_b = tokio::spawn(async move { b.write_single_register(UNIT, 1, 2).await });

        // both requests are on the wire before either slave answers
        let request_a = handle_a.next_write().await;
        let request_b = handle_b.next_write().await;
        handle_a.read(&request_a);
        handle_b.read(&request_b);

        assert_eq!(task_a.await.unwrap(), Ok(Indexed::new(1, 2)));
        assert_eq!(task_b.await.unwrap(), Ok(Indexed::new(1, 2)));
    }
}
