use std::collections::VecDeque;
use std::io::ErrorKind;

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

use crate::client::PortConfig;
use crate::serial::{Direction, SerialTransport};

pub(crate) fn mock() -> (MockTransport, Handle) {
    let (read_tx, read_rx) = tokio::sync::mpsc::unbounded_channel();
    let (write_tx, write_rx) = tokio::sync::mpsc::unbounded_channel();
    let (drain_tx, drain_rx) = tokio::sync::mpsc::unbounded_channel();
    let (event_tx, event_rx) = tokio::sync::mpsc::unbounded_channel();
    let mock = MockTransport {
        remainder: VecDeque::new(),
        reads: read_rx,
        writes: write_rx,
        stalls: drain_rx,
        events: event_tx,
    };
    let handle = Handle {
        reads: read_tx,
        writes: write_tx,
        stalls: drain_tx,
        events: event_rx,
    };
    (mock, handle)
}

/// Transport driven by a test through a [`Handle`]
pub(crate) struct MockTransport {
    // bytes of a scripted read that did not fit in the caller's buffer
    remainder: VecDeque<u8>,
    reads: UnboundedReceiver<ReadAction>,
    writes: UnboundedReceiver<WriteAction>,
    stalls: UnboundedReceiver<()>,
    // how events get pushed back to the test
    events: UnboundedSender<Event>,
}

pub(crate) struct Handle {
    reads: UnboundedSender<ReadAction>,
    writes: UnboundedSender<WriteAction>,
    stalls: UnboundedSender<()>,
    events: UnboundedReceiver<Event>,
}

#[derive(Debug)]
enum ReadAction {
    Data(Vec<u8>),
    Error(ErrorKind),
}

#[derive(Debug)]
enum WriteAction {
    Partial(usize),
    Error(ErrorKind),
}

/// Everything the engine did to the transport, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Event {
    Configure,
    Flush,
    Direction(Direction),
    Write(Vec<u8>),
    TxComplete,
    Read(usize),
    ReadErr(ErrorKind),
}

impl Handle {
    /// bytes returned by the next read
    pub(crate) fn read(&mut self, data: &[u8]) {
        self.reads.send(ReadAction::Data(data.to_vec())).unwrap()
    }

    pub(crate) fn read_error(&mut self, kind: ErrorKind) {
        self.reads.send(ReadAction::Error(kind)).unwrap()
    }

    /// the next write accepts only `count` bytes
    pub(crate) fn partial_write(&mut self, count: usize) {
        self.writes.send(WriteAction::Partial(count)).unwrap()
    }

    pub(crate) fn write_error(&mut self, kind: ErrorKind) {
        self.writes.send(WriteAction::Error(kind)).unwrap()
    }

    /// the next wait for transmit completion never finishes
    pub(crate) fn stall_drain(&mut self) {
        self.stalls.send(()).unwrap()
    }

    pub(crate) async fn next_event(&mut self) -> Event {
        self.events.recv().await.unwrap()
    }

    pub(crate) fn try_next_event(&mut self) -> Option<Event> {
        self.events.try_recv().ok()
    }

    /// waits for the next write, skipping the other events
    pub(crate) async fn next_write(&mut self) -> Vec<u8> {
        loop {
            if let Event::Write(bytes) = self.next_event().await {
                return bytes;
            }
        }
    }

    /// every event recorded so far
    pub(crate) fn drain_events(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        while let Some(x) = self.try_next_event() {
            events.push(x);
        }
        events
    }
}

impl MockTransport {
    fn event(&self, event: Event) {
        let _ = self.events.send(event);
    }

    fn copy_remainder(&mut self, buffer: &mut [u8]) -> usize {
        let count = buffer.len().min(self.remainder.len());
        for (dest, src) in buffer.iter_mut().zip(self.remainder.drain(..count)) {
            *dest = src;
        }
        count
    }
}

impl SerialTransport for MockTransport {
    fn configure(&mut self, _config: &PortConfig) -> std::io::Result<()> {
        self.event(Event::Configure);
        Ok(())
    }

    fn set_direction(&mut self, direction: Direction) -> std::io::Result<()> {
        self.event(Event::Direction(direction));
        Ok(())
    }

    async fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
        let accepted = match self.writes.try_recv() {
            Ok(WriteAction::Partial(count)) => count.min(data.len()),
            Ok(WriteAction::Error(kind)) => return Err(kind.into()),
            Err(_) => data.len(),
        };
        self.event(Event::Write(data[..accepted].to_vec()));
        Ok(accepted)
    }

    async fn wait_tx_complete(&mut self) -> std::io::Result<()> {
        if self.stalls.try_recv().is_ok() {
            std::future::pending::<()>().await;
        }
        self.event(Event::TxComplete);
        Ok(())
    }

    async fn read(&mut self, buffer: &mut [u8]) -> std::io::Result<usize> {
        if self.remainder.is_empty() {
            match self.reads.recv().await {
                Some(ReadAction::Data(bytes)) => self.remainder.extend(bytes),
                Some(ReadAction::Error(kind)) => {
                    self.event(Event::ReadErr(kind));
                    return Err(kind.into());
                }
                // the test dropped its handle, so the line stays silent
                None => std::future::pending::<()>().await,
            }
        }
        let count = self.copy_remainder(buffer);
        self.event(Event::Read(count));
        Ok(count)
    }

    fn flush_input(&mut self) -> std::io::Result<()> {
        self.remainder.clear();
        while self.reads.try_recv().is_ok() {}
        self.event(Event::Flush);
        Ok(())
    }
}
