//! High-level error types

use std::time::Duration;

use ur4rfid_core::Command;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Core protocol error: {0}")]
    Core(ur4rfid_core::Error),
    
    #[error("Transport error: {0}")]
    Transport(#[from] ur4rfid_transport::Error),
    
    #[error("Invalid parameter: {0}")]
    InvalidParameter(#[from] ur4rfid_types::Error),
    
    #[error("Reader not connected")]
    NotConnected,
    
    #[error("Inventory not running")]
    NotStreaming,
    
    #[error("Transport lost: {0}")]
    TransportLost(String),
    
    #[error("No {expected} within {}ms", .timeout.as_millis())]
    CommandTimeout {
        expected: Command,
        timeout: Duration,
    },
    
    #[error("Reader rejected {0}")]
    CommandRejected(Command),
    
    #[error("Invalid response from reader: {0}")]
    InvalidResponse(String),
}

impl From<ur4rfid_core::Error> for Error {
    fn from(err: ur4rfid_core::Error) -> Self {
        match err {
            ur4rfid_core::Error::InvalidParameter(e) => Self::InvalidParameter(e),
            ur4rfid_core::Error::Parse(msg) => Self::InvalidResponse(msg),
            other => Self::Core(other),
        }
    }
}

impl Error {
    /// Check if the reader is still usable after this error
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::InvalidParameter(_)
                | Self::NotStreaming
                | Self::CommandTimeout { .. }
                | Self::CommandRejected(_)
                | Self::InvalidResponse(_)
        )
    }
    
    /// Check if the reader must be reconnected before further use
    pub fn requires_reconnect(&self) -> bool {
        matches!(
            self,
            Self::NotConnected | Self::TransportLost(_) | Self::Transport(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    
    #[test]
    fn test_core_errors_are_lifted() {
        let err: Error = ur4rfid_core::Error::Parse("short".into()).into();
        assert!(matches!(err, Error::InvalidResponse(_)));
        
        let err: Error = ur4rfid_core::Error::InvalidParameter(ur4rfid_types::Error::InvalidAntenna(0)).into();
        assert!(matches!(err, Error::InvalidParameter(_)));
        assert!(err.is_recoverable());
    }
    
    #[test]
    fn test_error_classification() {
        let timeout = Error::CommandTimeout {
            expected: Command::GetPowerResponse,
            timeout: Duration::from_millis(1000),
        };
        assert!(timeout.is_recoverable());
        assert!(!timeout.requires_reconnect());
        assert_eq!(timeout.to_string(), "No GET_POWER_RSP(0x13) within 1000ms");
        
        let lost = Error::TransportLost("write failed".into());
        assert!(lost.requires_reconnect());
        assert!(!lost.is_recoverable());
    }
}
