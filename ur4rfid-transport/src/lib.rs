//! Transport layer for UR4 readers
//!
//! Provides the serial byte pipe the protocol engine runs over.

pub mod error;
pub mod mock;
pub mod serial;

pub use error::{Error, Result};
pub use mock::MockPipe;
pub use serial::SerialTransport;

use async_trait::async_trait;
use bytes::BytesMut;

/// Duplex byte pipe to a reader
///
/// Reads never wait for data: they return whatever is buffered, possibly
/// nothing. Once a call fails with anything but `AlreadyConnected` the pipe
/// should be treated as lost.
#[async_trait]
pub trait SerialPipe: Send {
    /// Open the pipe
    async fn open(&mut self) -> Result<()>;
    
    /// Close the pipe
    async fn close(&mut self) -> Result<()>;
    
    /// Check if open
    fn is_open(&self) -> bool;
    
    /// Write raw bytes
    async fn write(&mut self, data: &[u8]) -> Result<()>;
    
    /// Number of bytes ready to read
    fn bytes_available(&self) -> Result<usize>;
    
    /// Read up to `max` buffered bytes without waiting
    async fn read(&mut self, max: usize) -> Result<BytesMut>;
    
    /// Discard buffered inbound bytes
    async fn clear_input(&mut self) -> Result<()>;
    
    /// Port name for logs
    fn name(&self) -> String;
}
