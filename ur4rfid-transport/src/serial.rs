//! Serial port transport

use std::io::{self, Read, Write};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use parking_lot::Mutex;
use serialport::{ClearBuffer, DataBits, Parity, SerialPort, StopBits};
use tracing::{debug, trace, warn};
use ur4rfid_core::constants::DEFAULT_BAUD_RATE;

use crate::{error::*, SerialPipe};

type SharedPort = Arc<Mutex<Box<dyn SerialPort>>>;

/// Serial transport for UR4 readers (8N1)
///
/// Blocking port calls are moved onto tokio's blocking pool.
pub struct SerialTransport {
    path: String,
    baud_rate: u32,
    timeout: Duration,
    port: Option<SharedPort>,
}

impl SerialTransport {
    /// Create new serial transport
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            timeout: Duration::from_millis(100),
            port: None,
        }
    }

    /// Set baud rate
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Set per-call port timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Baud rate in use
    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut dyn SerialPort) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let port = self.port.clone().ok_or(Error::NotConnected)?;

        tokio::task::spawn_blocking(move || {
            let mut guard = port.lock();
            f(guard.as_mut())
        })
        .await
        .map_err(|e| Error::Io(io::Error::other(e)))?
    }
}

#[async_trait]
impl SerialPipe for SerialTransport {
    async fn open(&mut self) -> Result<()> {
        if self.is_open() {
            return Err(Error::AlreadyConnected);
        }

        debug!("Opening {} at {} baud (8N1)...", self.path, self.baud_rate);

        let builder = serialport::new(&self.path, self.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .timeout(self.timeout);

        let port = tokio::task::spawn_blocking(move || builder.open())
            .await
            .map_err(|e| Error::Io(io::Error::other(e)))??;

        // Drop whatever the reader sent before we were listening
        if let Err(e) = port.clear(ClearBuffer::All) {
            warn!("Failed to clear {} buffers: {}", self.path, e);
        }

        debug!("Opened {}", self.path);

        self.port = Some(Arc::new(Mutex::new(port)));
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if self.port.take().is_some() {
            debug!("Closed {}", self.path);
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    async fn write(&mut self, data: &[u8]) -> Result<()> {
        trace!("Sending {} bytes: {:02X?}", data.len(), &data[..data.len().min(16)]);

        let data = data.to_vec();
        self.blocking(move |port| {
            port.write_all(&data)?;
            port.flush()?;
            Ok(())
        })
        .await
    }

    fn bytes_available(&self) -> Result<usize> {
        let port = self.port.as_ref().ok_or(Error::NotConnected)?;
        let available = port.lock().bytes_to_read()?;
        Ok(available as usize)
    }

    async fn read(&mut self, max: usize) -> Result<BytesMut> {
        let buf = self
            .blocking(move |port| {
                let available = (port.bytes_to_read()? as usize).min(max);
                let mut buf = BytesMut::zeroed(available);

                if available > 0 {
                    let n = port.read(&mut buf)?;
                    buf.truncate(n);
                }

                Ok(buf)
            })
            .await?;

        if !buf.is_empty() {
            trace!("Received {} bytes: {:02X?}", buf.len(), &buf[..buf.len().min(16)]);
        }

        Ok(buf)
    }

    async fn clear_input(&mut self) -> Result<()> {
        self.blocking(|port| Ok(port.clear(ClearBuffer::Input)?)).await
    }

    fn name(&self) -> String {
        self.path.clone()
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        if self.is_open() {
            warn!("Serial transport {} dropped while still open", self.path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_serial_transport_create() {
        let transport = SerialTransport::new("/dev/ttyUSB0").with_baud_rate(57_600);
        assert!(!transport.is_open());
        assert_eq!(transport.baud_rate(), 57_600);
        assert_eq!(transport.name(), "/dev/ttyUSB0");
    }

    #[tokio::test]
    async fn test_serial_transport_default_baud() {
        let transport = SerialTransport::new("COM3");
        assert_eq!(transport.baud_rate(), DEFAULT_BAUD_RATE);
    }

    #[tokio::test]
    async fn test_serial_transport_missing_port() {
        let mut transport = SerialTransport::new("/dev/ur4rfid-does-not-exist")
            .with_timeout(Duration::from_millis(10));

        assert!(transport.open().await.is_err());
        assert!(!transport.is_open());
    }

    #[tokio::test]
    async fn test_io_requires_open_port() {
        let mut transport = SerialTransport::new("/dev/ttyUSB0");

        assert!(matches!(transport.write(&[0x00]).await, Err(Error::NotConnected)));
        assert!(matches!(transport.read(64).await, Err(Error::NotConnected)));
        assert!(matches!(transport.bytes_available(), Err(Error::NotConnected)));
    }

    // Note: This test requires a real reader on this port
    // #[tokio::test]
    // async fn test_serial_transport_open() {
    //     let mut transport = SerialTransport::new("/dev/ttyUSB0");
    //     transport.open().await.unwrap();
    //     assert!(transport.is_open());
    //     transport.close().await.unwrap();
    //     assert!(!transport.is_open());
    // }
}
