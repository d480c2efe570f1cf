//! High-level reader interface

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::{sleep, Instant};
use tracing::{debug, info, trace, warn};

use ur4rfid_core::{control, tag::parse_detection, Command, Frame, Reassembler, Session, SessionState};
use ur4rfid_transport::{SerialPipe, SerialTransport};
use ur4rfid_types::TagDetection;

use crate::config::ReaderConfig;
use crate::error::{Error, Result};

/// UR4 reader
///
/// High-level interface to a UR4 reader over a serial pipe. Cloning is cheap
/// and every clone drives the same reader: an inventory loop can run on one
/// clone while another issues control commands, which transparently pause and
/// resume the inventory.
///
/// # Examples
///
/// ```no_run
/// use ur4rfid::Reader;
///
/// #[tokio::main]
/// async fn main() -> ur4rfid::Result<()> {
///     let reader = Reader::open("/dev/ttyUSB0");
///
///     reader.connect().await?;
///     println!("Reader: {}", reader.get_identity().await?);
///
///     reader.disconnect().await?;
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct Reader {
    inner: Arc<ReaderInner>,
}

struct ReaderInner {
    link: Mutex<Link>,
    session: Session,
    config: ReaderConfig,
    port: String,
}

/// Everything that touches the wire, reachable only through the lock
struct Link {
    pipe: Box<dyn SerialPipe>,
    stream: Reassembler,
}

impl Reader {
    /// Create a reader over any pipe with default timing
    pub fn new(pipe: impl SerialPipe + 'static) -> Self {
        Self::with_config(pipe, ReaderConfig::default())
    }

    /// Create a reader over any pipe
    pub fn with_config(pipe: impl SerialPipe + 'static, config: ReaderConfig) -> Self {
        let port = pipe.name();

        Self {
            inner: Arc::new(ReaderInner {
                link: Mutex::new(Link {
                    pipe: Box::new(pipe),
                    stream: Reassembler::new(),
                }),
                session: Session::new(),
                config,
                port,
            }),
        }
    }

    /// Create a reader on a serial port (115200 8N1)
    pub fn open(path: impl Into<String>) -> Self {
        Self::open_with_config(path, ReaderConfig::default())
    }

    /// Create a reader on a serial port
    pub fn open_with_config(path: impl Into<String>, config: ReaderConfig) -> Self {
        let transport = SerialTransport::new(path).with_baud_rate(config.baud_rate);
        Self::with_config(transport, config)
    }

    /// Port name
    pub fn port_name(&self) -> &str {
        &self.inner.port
    }

    /// Timing in use
    pub fn config(&self) -> &ReaderConfig {
        &self.inner.config
    }

    /// Current session state
    pub fn state(&self) -> SessionState {
        self.inner.session.state()
    }

    /// Check if connected
    pub fn is_connected(&self) -> bool {
        self.inner.session.is_connected()
    }

    /// Check if inventory is running
    pub fn is_streaming(&self) -> bool {
        self.inner.session.is_streaming()
    }

    /// Number of times inventory was paused for a command
    pub fn pause_count(&self) -> u64 {
        self.inner.session.pause_count()
    }

    /// Open the pipe
    ///
    /// Bytes the reader sent before we were listening are discarded.
    ///
    /// # Errors
    ///
    /// Returns `Transport` if the port cannot be opened.
    pub async fn connect(&self) -> Result<()> {
        let mut link = self.inner.link.lock().await;

        if self.is_connected() {
            debug!("Already connected to {}", self.inner.port);
            return Ok(());
        }

        info!("Connecting to {}...", self.inner.port);

        link.pipe.open().await?;
        if let Err(e) = link.pipe.clear_input().await {
            let _ = link.pipe.close().await;
            return Err(e.into());
        }
        link.stream.clear();

        self.inner.session.connect()?;

        info!("Connected to {}", self.inner.port);
        Ok(())
    }

    /// Close the pipe
    ///
    /// The session is marked disconnected before the lock is taken, so a
    /// command waiting for its response gives up on its next poll.
    pub async fn disconnect(&self) -> Result<()> {
        let previous = self.inner.session.close();
        if previous == SessionState::Disconnected {
            return Ok(());
        }

        info!("Disconnecting from {}...", self.inner.port);

        let mut link = self.inner.link.lock().await;

        if matches!(previous, SessionState::Streaming | SessionState::CommandPaused) {
            let stop = control::stop_inventory().encode();
            if let Err(e) = link.pipe.write(&stop).await {
                warn!("Failed to send STOP_INVENTORY: {}", e);
            }
        }

        link.stream.clear();
        link.pipe.close().await?;

        info!("Disconnected");
        Ok(())
    }

    /// Start continuous inventory
    ///
    /// Does nothing if inventory is already running.
    pub async fn start_inventory(&self) -> Result<()> {
        let mut link = self.inner.link.lock().await;

        match self.state() {
            SessionState::Connected => {}
            SessionState::Streaming => return Ok(()),
            _ => return Err(Error::NotConnected),
        }

        debug!("Starting inventory...");

        link.stream.clear();
        self.send(&mut link, &control::start_inventory()).await?;
        sleep(self.inner.config.start_settle).await;
        self.ensure_connected("starting inventory")?;

        self.inner.session.start_streaming()?;
        Ok(())
    }

    /// Stop continuous inventory
    ///
    /// Tags still in flight are discarded. Does nothing if inventory is not
    /// running.
    pub async fn stop_inventory(&self) -> Result<()> {
        let mut link = self.inner.link.lock().await;

        match self.state() {
            SessionState::Streaming => {}
            SessionState::Connected => return Ok(()),
            _ => return Err(Error::NotConnected),
        }

        debug!("Stopping inventory...");

        self.quiesce(&mut link).await?;
        self.inner.session.stop_streaming()?;
        Ok(())
    }

    /// Run one command/response exchange
    ///
    /// If inventory is running it is stopped first and always restarted
    /// afterwards, also when the exchange fails. Frames other than
    /// `expected` are discarded.
    ///
    /// # Errors
    ///
    /// - `NotConnected` if the session is not open
    /// - `CommandTimeout` if no `expected` frame arrives within `timeout`
    /// - `TransportLost` if the pipe fails or the reader is disconnected
    ///   meanwhile
    pub async fn run_command(&self, request: &Frame, expected: Command, timeout: Duration) -> Result<Frame> {
        let mut link = self.inner.link.lock().await;

        let paused = match self.state() {
            SessionState::Connected => false,
            SessionState::Streaming => {
                self.pause(&mut link).await?;
                true
            }
            _ => return Err(Error::NotConnected),
        };

        let result = self.exchange(&mut link, request, expected, timeout).await;

        if paused && self.state() == SessionState::CommandPaused {
            if let Err(e) = self.resume(&mut link).await {
                warn!("Failed to resume inventory after {}: {}", request, e);
                if result.is_ok() {
                    return Err(e);
                }
            }
        }

        result
    }

    /// Run a command with the configured timeout
    pub(crate) async fn command(&self, request: &Frame, expected: Command) -> Result<Frame> {
        self.run_command(request, expected, self.inner.config.command_timeout).await
    }

    /// Collect the tags that arrived since the last poll
    ///
    /// Frames that are not inventory responses, or do not parse, are dropped.
    ///
    /// # Errors
    ///
    /// Returns `NotStreaming` unless inventory is running.
    pub async fn poll_inventory(&self) -> Result<Vec<TagDetection>> {
        let mut link = self.inner.link.lock().await;

        match self.state() {
            SessionState::Streaming => {}
            SessionState::Disconnected => return Err(Error::NotConnected),
            _ => return Err(Error::NotStreaming),
        }

        self.fill(&mut link).await?;

        let now = Utc::now();
        let detections = link
            .stream
            .drain()
            .filter_map(|frame| {
                if !frame.is(Command::InventoryResponse) {
                    debug!("Ignoring {} during inventory", frame);
                    return None;
                }
                match parse_detection(&frame, now) {
                    Ok(detection) => Some(detection),
                    Err(e) => {
                        debug!("Dropping inventory frame: {}", e);
                        None
                    }
                }
            })
            .collect();

        Ok(detections)
    }

    /// Read one tag
    ///
    /// Starts inventory, waits up to `timeout` for the first detection, then
    /// stops inventory again unless it was already running.
    pub async fn read_single(&self, timeout: Duration) -> Result<Option<TagDetection>> {
        let started = match self.state() {
            SessionState::Connected => {
                self.start_inventory().await?;
                true
            }
            SessionState::Disconnected => return Err(Error::NotConnected),
            _ => false,
        };

        let deadline = Instant::now() + timeout;
        let result = loop {
            match self.poll_inventory().await {
                Ok(detections) if !detections.is_empty() => {
                    break Ok(detections.into_iter().next());
                }
                Ok(_) => {}
                Err(e) => break Err(e),
            }

            let now = Instant::now();
            if now >= deadline {
                break Ok(None);
            }
            sleep(self.inner.config.poll_interval.min(deadline - now)).await;
        };

        if started {
            if let Err(e) = self.stop_inventory().await {
                warn!("Failed to stop inventory after single read: {}", e);
                if result.is_ok() {
                    return Err(e);
                }
            }
        }

        result
    }

    // Helper methods

    async fn pause(&self, link: &mut MutexGuard<'_, Link>) -> Result<()> {
        debug!("Pausing inventory for command");

        self.quiesce(link).await?;
        if let Err(e) = self.inner.session.pause() {
            self.ensure_connected("pausing inventory")?;
            return Err(e.into());
        }
        Ok(())
    }

    async fn resume(&self, link: &mut MutexGuard<'_, Link>) -> Result<()> {
        debug!("Resuming inventory");

        self.send(link, &control::start_inventory()).await?;
        sleep(self.inner.config.start_settle).await;
        self.ensure_connected("resuming inventory")?;

        if let Err(e) = self.inner.session.resume() {
            self.ensure_connected("resuming inventory")?;
            return Err(e.into());
        }
        Ok(())
    }

    /// Stop inventory, let the reader settle, drop whatever it sent meanwhile
    async fn quiesce(&self, link: &mut MutexGuard<'_, Link>) -> Result<()> {
        self.send(link, &control::stop_inventory()).await?;
        sleep(self.inner.config.stop_settle).await;
        self.ensure_connected("stopping inventory")?;

        if let Err(e) = link.pipe.clear_input().await {
            return Err(self.lose(link, e).await);
        }
        link.stream.clear();
        Ok(())
    }

    async fn exchange(
        &self,
        link: &mut MutexGuard<'_, Link>,
        request: &Frame,
        expected: Command,
        timeout: Duration,
    ) -> Result<Frame> {
        self.send(link, request).await?;

        let deadline = Instant::now() + timeout;
        loop {
            self.ensure_connected(&format!("waiting for {}", expected))?;

            self.fill(link).await?;

            for frame in link.stream.drain() {
                if frame.is(expected) {
                    trace!("Received: {:?}", frame);
                    return Ok(frame);
                }
                debug!("Discarding {} while waiting for {}", frame, expected);
            }

            let now = Instant::now();
            if now >= deadline {
                warn!("{} timed out after {:?}", request, timeout);
                return Err(Error::CommandTimeout { expected, timeout });
            }
            sleep(self.inner.config.poll_interval.min(deadline - now)).await;
        }
    }

    /// Fail with `TransportLost` once the reader was disconnected under us
    fn ensure_connected(&self, during: &str) -> Result<()> {
        if self.is_connected() {
            return Ok(());
        }
        Err(Error::TransportLost(format!("disconnected while {}", during)))
    }

    async fn send(&self, link: &mut MutexGuard<'_, Link>, frame: &Frame) -> Result<()> {
        trace!("Sending: {:?}", frame);

        match link.pipe.write(&frame.encode()).await {
            Ok(()) => Ok(()),
            Err(e) => Err(self.lose(link, e).await),
        }
    }

    /// Move whatever the pipe has buffered into the reassembler
    async fn fill(&self, link: &mut MutexGuard<'_, Link>) -> Result<usize> {
        match link.pipe.read(self.inner.config.read_chunk).await {
            Ok(bytes) => {
                link.stream.feed(&bytes);
                Ok(bytes.len())
            }
            Err(e) => Err(self.lose(link, e).await),
        }
    }

    /// Close the session after a pipe failure
    async fn lose(&self, link: &mut MutexGuard<'_, Link>, err: ur4rfid_transport::Error) -> Error {
        warn!("Lost {}: {}", self.inner.port, err);

        self.inner.session.close();
        link.stream.clear();
        if let Err(e) = link.pipe.close().await {
            debug!("Failed to close {}: {}", self.inner.port, e);
        }

        Error::TransportLost(err.to_string())
    }
}

impl std::fmt::Debug for Reader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reader")
            .field("port", &self.inner.port)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ur4rfid_transport::MockPipe;

    #[test]
    fn test_reader_create() {
        let reader = Reader::open("/dev/ttyUSB0");
        assert!(!reader.is_connected());
        assert_eq!(reader.port_name(), "/dev/ttyUSB0");
        assert_eq!(reader.state(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn test_connect_discards_stale_input() {
        let pipe = MockPipe::new();
        pipe.push_inbound(&[0xC8, 0x8C, 0x00]);

        let reader = Reader::new(pipe.clone());
        reader.connect().await.unwrap();

        assert_eq!(reader.state(), SessionState::Connected);
        assert_eq!(pipe.inbound_len(), 0);

        reader.disconnect().await.unwrap();
        assert!(!reader.is_connected());
    }

    #[tokio::test]
    async fn test_operations_require_connection() {
        let reader = Reader::new(MockPipe::new());

        assert!(matches!(reader.start_inventory().await, Err(Error::NotConnected)));
        assert!(matches!(reader.poll_inventory().await, Err(Error::NotConnected)));
        assert!(matches!(
            reader.run_command(&control::get_power(), Command::GetPowerResponse, Duration::from_millis(10)).await,
            Err(Error::NotConnected)
        ));
        assert!(reader.disconnect().await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_requires_streaming() {
        let reader = Reader::new(MockPipe::new());
        reader.connect().await.unwrap();

        assert!(matches!(reader.poll_inventory().await, Err(Error::NotStreaming)));

        reader.start_inventory().await.unwrap();
        assert!(reader.poll_inventory().await.unwrap().is_empty());

        reader.stop_inventory().await.unwrap();
        assert_eq!(reader.state(), SessionState::Connected);
    }
}
