//! Reader configuration

use std::time::Duration;

use ur4rfid_core::constants::{
    DEFAULT_BAUD_RATE, DEFAULT_COMMAND_TIMEOUT, DEFAULT_POLL_INTERVAL, DEFAULT_START_SETTLE,
    DEFAULT_STOP_SETTLE, MAX_FRAME_LEN,
};

/// Timing and sizing of a [`Reader`](crate::Reader)
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use ur4rfid::ReaderConfig;
///
/// let config = ReaderConfig::default()
///     .with_command_timeout(Duration::from_millis(500))
///     .with_poll_interval(Duration::from_millis(5));
/// assert_eq!(config.command_timeout, Duration::from_millis(500));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ReaderConfig {
    /// Baud rate used by [`Reader::open`](crate::Reader::open)
    pub baud_rate: u32,

    /// Default wait for a command response
    pub command_timeout: Duration,

    /// Wait after stopping inventory before the pipe is considered quiet
    pub stop_settle: Duration,

    /// Wait after starting inventory
    pub start_settle: Duration,

    /// Sleep between reads while waiting for a response
    pub poll_interval: Duration,

    /// Most bytes taken from the pipe per read
    pub read_chunk: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            stop_settle: DEFAULT_STOP_SETTLE,
            start_settle: DEFAULT_START_SETTLE,
            poll_interval: DEFAULT_POLL_INTERVAL,
            read_chunk: MAX_FRAME_LEN,
        }
    }
}

impl ReaderConfig {
    /// Set baud rate
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Set command timeout
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Set stop and start settle delays
    pub fn with_settle(mut self, stop: Duration, start: Duration) -> Self {
        self.stop_settle = stop;
        self.start_settle = start;
        self
    }

    /// Set poll interval
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set read chunk size (at least one byte)
    pub fn with_read_chunk(mut self, bytes: usize) -> Self {
        self.read_chunk = bytes.max(1);
        self
    }
}
