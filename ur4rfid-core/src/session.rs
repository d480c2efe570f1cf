//! Transport session state machine
//!
//! A session tracks which consumer owns the reader's byte stream:
//! - nobody (`Disconnected`)
//! - the host, idle (`Connected`)
//! - the inventory stream (`Streaming`)
//! - a control command that interrupted the stream (`CommandPaused`)
//!
//! Transitions are explicit and reject invalid source states. The owner of
//! the serial pipe performs them while holding its pipe lock.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::error::{Error, Result};

/// Session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Serial pipe closed
    Disconnected,

    /// Pipe open, inventory not running
    Connected,

    /// Inventory running, inventory processor owns inbound bytes
    Streaming,

    /// Inventory stopped to run one control command
    CommandPaused,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connected => "connected",
            Self::Streaming => "streaming",
            Self::CommandPaused => "command-paused",
        };
        f.write_str(name)
    }
}

/// Session manager
///
/// Thread-safe and can be cloned cheaply (Arc internally).
#[derive(Debug, Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

#[derive(Debug)]
struct SessionInner {
    state: parking_lot::RwLock<SessionState>,

    /// Completed pause/resume cycles
    pauses: AtomicU64,
}

impl Session {
    /// Create a new disconnected session
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SessionInner {
                state: parking_lot::RwLock::new(SessionState::Disconnected),
                pauses: AtomicU64::new(0),
            }),
        }
    }

    /// Get current state
    pub fn state(&self) -> SessionState {
        *self.inner.state.read()
    }

    /// Check if the pipe is open
    pub fn is_connected(&self) -> bool {
        !matches!(self.state(), SessionState::Disconnected)
    }

    /// Check if inventory owns the stream
    pub fn is_streaming(&self) -> bool {
        matches!(self.state(), SessionState::Streaming)
    }

    /// Number of command pauses completed since creation
    pub fn pause_count(&self) -> u64 {
        self.inner.pauses.load(Ordering::Acquire)
    }

    fn transition(&self, from: SessionState, to: SessionState) -> Result<()> {
        let mut state = self.inner.state.write();

        if *state != from {
            return Err(Error::InvalidSessionState(format!(
                "Cannot move to {} from {} (expected {})",
                to, *state, from
            )));
        }

        debug!("Session {} -> {}", from, to);
        *state = to;
        Ok(())
    }

    /// Pipe opened
    pub fn connect(&self) -> Result<()> {
        self.transition(SessionState::Disconnected, SessionState::Connected)
    }

    /// Inventory started
    pub fn start_streaming(&self) -> Result<()> {
        self.transition(SessionState::Connected, SessionState::Streaming)
    }

    /// Inventory stopped by the host
    pub fn stop_streaming(&self) -> Result<()> {
        self.transition(SessionState::Streaming, SessionState::Connected)
    }

    /// Inventory interrupted for a control command
    pub fn pause(&self) -> Result<()> {
        self.transition(SessionState::Streaming, SessionState::CommandPaused)
    }

    /// Inventory resumed after a control command
    pub fn resume(&self) -> Result<()> {
        self.transition(SessionState::CommandPaused, SessionState::Streaming)?;
        self.inner.pauses.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    /// Close session from any state
    ///
    /// Returns the state the session was in.
    pub fn close(&self) -> SessionState {
        let mut state = self.inner.state.write();
        let previous = *state;
        *state = SessionState::Disconnected;

        if previous != SessionState::Disconnected {
            debug!("Session {} -> {}", previous, SessionState::Disconnected);
        }

        previous
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_new() {
        let session = Session::new();
        assert_eq!(session.state(), SessionState::Disconnected);
        assert!(!session.is_connected());
        assert!(!session.is_streaming());
    }

    #[test]
    fn test_full_lifecycle() {
        let session = Session::new();

        session.connect().unwrap();
        assert_eq!(session.state(), SessionState::Connected);

        session.start_streaming().unwrap();
        assert!(session.is_streaming());

        session.pause().unwrap();
        assert_eq!(session.state(), SessionState::CommandPaused);
        assert!(session.is_connected());

        session.resume().unwrap();
        assert!(session.is_streaming());
        assert_eq!(session.pause_count(), 1);

        session.stop_streaming().unwrap();
        assert_eq!(session.state(), SessionState::Connected);

        assert_eq!(session.close(), SessionState::Connected);
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[test]
    fn test_invalid_state_transitions() {
        let session = Session::new();

        // Cannot stream without connecting
        assert!(session.start_streaming().is_err());
        assert!(session.pause().is_err());

        session.connect().unwrap();
        assert!(session.connect().is_err());

        // Pause is only valid while streaming
        assert!(session.pause().is_err());
        assert!(session.resume().is_err());

        session.start_streaming().unwrap();
        assert!(session.start_streaming().is_err());
        assert_eq!(session.pause_count(), 0);
    }

    #[test]
    fn test_close_from_paused() {
        let session = Session::new();
        session.connect().unwrap();
        session.start_streaming().unwrap();
        session.pause().unwrap();

        assert_eq!(session.close(), SessionState::CommandPaused);
        assert!(session.resume().is_err());
    }

    #[test]
    fn test_session_clone() {
        let session1 = Session::new();
        session1.connect().unwrap();

        let session2 = session1.clone();

        // Both share same state
        session1.start_streaming().unwrap();
        assert!(session2.is_streaming());
    }
}
