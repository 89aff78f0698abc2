use std::collections::BTreeMap;

use crate::client::port::{Port, PortHandle};
use crate::client::PortConfig;
use crate::error::{InvalidRequest, RequestError};
use crate::serial::SerialTransport;
use crate::types::PortId;

/// Owns every configured port of an application
///
/// Ports are created from their configuration when the registry is built and live as long as
/// the registry does. A port only talks on the line between [`PortRegistry::init`] and
/// [`PortRegistry::deinit`].
pub struct PortRegistry<T: SerialTransport> {
    ports: BTreeMap<PortId, PortHandle<T>>,
}

impl<T: SerialTransport> std::fmt::Debug for PortRegistry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_list().entries(self.ports.values()).finish()
    }
}

impl<T: SerialTransport> PortRegistry<T> {
    /// Create a registry with one uninitialized port per entry
    ///
    /// A later entry with the same id replaces an earlier one.
    pub fn new<I>(configs: I) -> Self
    where
        I: IntoIterator<Item = (PortId, PortConfig)>,
    {
        let ports = configs
            .into_iter()
            .map(|(id, config)| (id, PortHandle::new(Port::new(id, config))))
            .collect();
        Self { ports }
    }

    /// Install `transport` on the port after validating its configuration
    ///
    /// Fails with [`RequestError::AlreadyInitialized`] if the port already has a transport.
    pub async fn init(&self, id: PortId, transport: T) -> Result<(), RequestError> {
        self.get(id)?.port().init(transport).await
    }

    /// Release the transport of the port, doing nothing if it has none
    ///
    /// A transaction in progress on the port completes first.
    pub async fn deinit(&self, id: PortId) -> Result<(), RequestError> {
        self.get(id)?.port().deinit().await;
        Ok(())
    }

    /// Obtain a handle for making requests on the port
    pub fn port(&self, id: PortId) -> Result<PortHandle<T>, RequestError> {
        self.get(id).cloned()
    }

    /// Configuration of the port
    pub fn config(&self, id: PortId) -> Result<&PortConfig, RequestError> {
        Ok(self.get(id)?.config())
    }

    /// Identifiers of every configured port, in ascending order
    pub fn ids(&self) -> impl Iterator<Item = PortId> + '_ {
        self.ports.keys().copied()
    }

    fn get(&self, id: PortId) -> Result<&PortHandle<T>, RequestError> {
        match self.ports.get(&id) {
            Some(x) => Ok(x),
            None => Err(InvalidRequest::UnknownPort(id).into()),
        }
    }
}

#[cfg(feature = "serial")]
impl PortRegistry<crate::serial::SerialPortTransport> {
    /// Open the serial device named in the port configuration and install it
    pub async fn init_serial(&self, id: PortId) -> Result<(), RequestError> {
        let handle = self.get(id)?;
        let transport = crate::serial::SerialPortTransport::open(handle.config())?;
        handle.port().init(transport).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{mock, Event, MockTransport};
    use crate::status::Status;
    use crate::types::UnitId;

    fn registry() -> PortRegistry<MockTransport> {
        PortRegistry::new([
            (PortId(2), PortConfig::new("/dev/ttyS1")),
            (PortId(1), PortConfig::new("/dev/ttyS0")),
        ])
    }

    #[tokio::test]
    async fn unknown_ports_are_invalid() {
        let registry = registry();
        let (io, mut handle) = mock();

        assert_eq!(
            registry.init(PortId(3), io).await,
            Err(InvalidRequest::UnknownPort(PortId(3)).into())
        );
        assert_eq!(
            registry.deinit(PortId(3)).await.map_err(|x| Status::from(&x)),
            Err(Status::InvalidParam)
        );
        assert!(registry.port(PortId(3)).is_err());
        assert!(registry.config(PortId(3)).is_err());
        assert_eq!(handle.try_next_event(), None);
    }

    #[tokio::test]
    async fn ports_are_independent() {
        let registry = registry();
        let (io, mut handle) = mock();

        registry.init(PortId(1), io).await.unwrap();
        assert_eq!(handle.try_next_event(), Some(Event::Configure));

        let mut output = [0u16; 1];
        let result = registry
            .port(PortId(2))
            .unwrap()
            .read_input_registers(UnitId::new(1), 0, 1, &mut output)
            .await
            .map(|x| x.count());
        assert_eq!(result, Err(RequestError::NotInitialized));
        assert_eq!(Status::of(&result), Status::NotInitialized);
    }

    #[tokio::test]
    async fn init_twice_then_deinit() {
        let registry = registry();
        let (first, _first) = mock();
        let (second, _second) = mock();
        let (third, _third) = mock();

        registry.init(PortId(2), first).await.unwrap();
        assert_eq!(
            registry.init(PortId(2), second).await,
            Err(RequestError::AlreadyInitialized)
        );
        registry.deinit(PortId(2)).await.unwrap();
        registry.deinit(PortId(2)).await.unwrap();
        registry.init(PortId(2), third).await.unwrap();
    }

    #[test]
    fn lists_configured_ports() {
        let registry = registry();
        assert_eq!(registry.ids().collect::<Vec<_>>(), vec![PortId(1), PortId(2)]);
        assert_eq!(registry.config(PortId(2)).unwrap().path, "/dev/ttyS1");
        assert_eq!(registry.port(PortId(1)).unwrap().id(), PortId(1));
    }
}
