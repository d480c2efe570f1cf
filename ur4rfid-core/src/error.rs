//! Error types for ur4rfid-core

/// Result type alias for ur4rfid-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core protocol errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Frame would not fit the 16-bit length field
    #[error("Invalid frame size: {size} bytes (max: {max} bytes)")]
    InvalidFrameSize {
        size: usize,
        max: usize,
    },

    /// Unknown command code
    #[error("Unknown command code: 0x{0:02X}")]
    UnknownCommand(u8),

    /// Transition not allowed from the current session state
    #[error("Invalid session state: {0}")]
    InvalidSessionState(String),

    /// Frame decoded but its data does not match the expected layout
    #[error("Parse failure: {0}")]
    Parse(String),

    /// Parameter rejected before building a request
    #[error("Invalid parameter: {0}")]
    InvalidParameter(#[from] ur4rfid_types::Error),
}

impl Error {
    /// Check if the error was raised before any I/O happened
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::InvalidParameter(_) | Self::InvalidFrameSize { .. })
    }
}
