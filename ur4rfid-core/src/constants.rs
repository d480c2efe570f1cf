//! Protocol constants

use std::time::Duration;

/// Frame header magic
pub const FRAME_HEADER: [u8; 2] = [0xC8, 0x8C];

/// Frame terminator
pub const FRAME_TRAILER: [u8; 2] = [0x0D, 0x0A];

/// Header + length + command + checksum + trailer
pub const FRAME_OVERHEAD: usize = 8;

/// Smallest length field accepted on decode (empty data)
pub const MIN_FRAME_LEN: usize = FRAME_OVERHEAD;

/// Largest length field accepted on decode
///
/// Anything larger is treated as noise rather than a real frame.
pub const MAX_FRAME_LEN: usize = 4096;

/// Default serial baud rate
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Default timeout for a command/response exchange
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(1);

/// Settle time after stop-inventory before buffered bytes are discarded
pub const DEFAULT_STOP_SETTLE: Duration = Duration::from_millis(80);

/// Settle time after start-inventory
pub const DEFAULT_START_SETTLE: Duration = Duration::from_millis(50);

/// Interval between pipe polls while waiting for bytes
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Response status bytes
pub mod status {
    /// Set-power / set-antenna accepted
    pub const SUCCESS: u8 = 0x01;
}

/// Set-power persistence flag (status byte)
pub const SET_POWER_PERSIST: u8 = 0x02;

/// Set-antenna persistence flag (first data byte)
pub const SET_ANTENNA_PERSIST: u8 = 0x01;

/// Default antenna mapping for the two-antenna portal
pub mod portal {
    /// Antenna at the start of the process
    pub const ENTRY_ANTENNA: u8 = 1;

    /// Antenna at the end of the process
    pub const EXIT_ANTENNA: u8 = 2;
}

/// Tag deduplication defaults
pub mod dedup {
    use std::time::Duration;

    /// Base window between emissions of the same EPC
    pub const WINDOW: Duration = Duration::from_secs(300);

    /// Upper bound for failure backoff
    pub const BACKOFF_CEILING: Duration = Duration::from_secs(60);

    /// Detections beyond which a tag is considered noisy
    pub const NOISY_THRESHOLD: u32 = 10;

    /// Idle multiple of the window after which the detection count decays
    pub const DECAY_FACTOR: u32 = 5;

    /// Idle multiple of the window after which a record is dropped
    pub const EXPIRY_FACTOR: u32 = 10;
}
