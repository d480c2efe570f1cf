//! In-memory pipe for tests and demos
//!
//! A `MockPipe` is a handle: clones share the same simulated device, so a
//! test can keep one clone to script the device while the reader owns
//! another.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;
use tracing::trace;
use ur4rfid_core::{Decoded, Frame};

use crate::{error::*, SerialPipe};

type Responder = Box<dyn FnMut(&[u8]) -> Option<Vec<u8>> + Send>;

/// Scriptable simulated reader
#[derive(Clone, Default)]
pub struct MockPipe {
    state: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    open: bool,
    hung_up: bool,
    fail_writes: bool,
    inbound: VecDeque<u8>,
    written: Vec<Bytes>,
    replies: HashMap<u8, Bytes>,
    responder: Option<Responder>,
}

impl MockPipe {
    /// Create a closed pipe with nothing queued
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue bytes for the host to read
    pub fn push_inbound(&self, bytes: &[u8]) {
        self.state.lock().inbound.extend(bytes);
    }

    /// Queue an encoded frame for the host to read
    pub fn push_frame(&self, frame: &Frame) {
        self.push_inbound(&frame.encode());
    }

    /// Answer every written frame with command `request` by queueing `reply`
    pub fn reply_to(&self, request: impl Into<u8>, reply: &Frame) {
        self.state
            .lock()
            .replies
            .insert(request.into(), reply.encode().freeze());
    }

    /// Install a raw responder called on every write
    ///
    /// Whatever it returns is queued inbound. Runs after `reply_to` matches.
    pub fn respond_with<F>(&self, responder: F)
    where
        F: FnMut(&[u8]) -> Option<Vec<u8>> + Send + 'static,
    {
        self.state.lock().responder = Some(Box::new(responder));
    }

    /// Make subsequent writes fail
    pub fn fail_writes(&self, fail: bool) {
        self.state.lock().fail_writes = fail;
    }

    /// Simulate the device disappearing
    pub fn hang_up(&self) {
        self.state.lock().hung_up = true;
    }

    /// Every write so far, one entry per call
    pub fn written(&self) -> Vec<Bytes> {
        self.state.lock().written.clone()
    }

    /// Commands of every decodable write so far
    pub fn written_commands(&self) -> Vec<u8> {
        self.state
            .lock()
            .written
            .iter()
            .filter_map(|bytes| match Frame::decode(bytes) {
                Decoded::Frame { frame, .. } => Some(frame.command()),
                _ => None,
            })
            .collect()
    }

    /// Bytes still waiting to be read
    pub fn inbound_len(&self) -> usize {
        self.state.lock().inbound.len()
    }
}

impl std::fmt::Debug for MockPipe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MockPipe")
            .field("open", &state.open)
            .field("hung_up", &state.hung_up)
            .field("inbound", &state.inbound.len())
            .field("written", &state.written.len())
            .finish()
    }
}

#[async_trait]
impl SerialPipe for MockPipe {
    async fn open(&mut self) -> Result<()> {
        let mut state = self.state.lock();
        if state.open {
            return Err(Error::AlreadyConnected);
        }
        state.open = true;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.state.lock().open = false;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.state.lock().open
    }

    async fn write(&mut self, data: &[u8]) -> Result<()> {
        let mut state = self.state.lock();
        if !state.open {
            return Err(Error::NotConnected);
        }
        if state.hung_up {
            return Err(Error::ConnectionClosed);
        }
        if state.fail_writes {
            return Err(Error::Io(io::Error::new(io::ErrorKind::BrokenPipe, "mock write failure")));
        }

        trace!("Mock received {} bytes: {:02X?}", data.len(), data);
        state.written.push(Bytes::copy_from_slice(data));

        if let Decoded::Frame { frame, .. } = Frame::decode(data) {
            if let Some(reply) = state.replies.get(&frame.command()).cloned() {
                state.inbound.extend(reply.iter());
            }
        }

        if let Some(reply) = state.responder.as_mut().and_then(|respond| respond(data)) {
            state.inbound.extend(reply);
        }

        Ok(())
    }

    fn bytes_available(&self) -> Result<usize> {
        let state = self.state.lock();
        if !state.open {
            return Err(Error::NotConnected);
        }
        if state.hung_up {
            return Err(Error::ConnectionClosed);
        }
        Ok(state.inbound.len())
    }

    async fn read(&mut self, max: usize) -> Result<BytesMut> {
        let mut state = self.state.lock();
        if !state.open {
            return Err(Error::NotConnected);
        }
        if state.hung_up {
            return Err(Error::ConnectionClosed);
        }

        let n = state.inbound.len().min(max);
        let mut buf = BytesMut::with_capacity(n);
        buf.extend(state.inbound.drain(..n));
        Ok(buf)
    }

    async fn clear_input(&mut self) -> Result<()> {
        self.state.lock().inbound.clear();
        Ok(())
    }

    fn name(&self) -> String {
        "mock".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use ur4rfid_core::{control, Command};

    #[tokio::test]
    async fn test_mock_requires_open() {
        let mut pipe = MockPipe::new();
        assert!(matches!(pipe.write(&[0x01]).await, Err(Error::NotConnected)));

        pipe.open().await.unwrap();
        assert!(matches!(pipe.open().await, Err(Error::AlreadyConnected)));
        assert!(pipe.is_open());
    }

    #[tokio::test]
    async fn test_mock_read_drains_up_to_max() {
        let mut pipe = MockPipe::new();
        pipe.open().await.unwrap();
        pipe.push_inbound(&[1, 2, 3, 4, 5]);

        assert_eq!(pipe.bytes_available().unwrap(), 5);
        assert_eq!(&pipe.read(3).await.unwrap()[..], &[1, 2, 3]);
        assert_eq!(&pipe.read(16).await.unwrap()[..], &[4, 5]);
        assert!(pipe.read(16).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_mock_reply_to_command() {
        let handle = MockPipe::new();
        let reply = Frame::new(Command::SetPowerResponse, vec![0x01]).unwrap();
        handle.reply_to(Command::SetPower, &reply);

        let mut pipe = handle.clone();
        pipe.open().await.unwrap();

        pipe.write(&control::get_power().encode()).await.unwrap();
        assert_eq!(handle.inbound_len(), 0);

        let request = control::set_power(1, 10.0, 10.0, true).unwrap();
        pipe.write(&request.encode()).await.unwrap();
        assert_eq!(&pipe.read(64).await.unwrap()[..], &reply.encode()[..]);

        assert_eq!(
            handle.written_commands(),
            vec![u8::from(Command::GetPower), u8::from(Command::SetPower)]
        );
    }

    #[tokio::test]
    async fn test_mock_failures() {
        let handle = MockPipe::new();
        let mut pipe = handle.clone();
        pipe.open().await.unwrap();

        handle.fail_writes(true);
        assert!(matches!(pipe.write(&[0x00]).await, Err(Error::Io(_))));

        handle.fail_writes(false);
        handle.hang_up();
        assert!(matches!(pipe.read(1).await, Err(Error::ConnectionClosed)));
        assert!(handle.written().is_empty());
    }
}
