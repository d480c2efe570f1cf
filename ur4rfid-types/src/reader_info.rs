//! Reader information structures

use std::collections::BTreeMap;
use std::fmt;

use crate::antenna::AntennaPower;

/// Reader information
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReaderInfo {
    /// Serial port the reader is attached to
    pub port: String,

    /// Module identifier (8 hex characters)
    pub serial_number: Option<String>,

    /// Per-antenna power table
    pub antenna_powers: BTreeMap<u8, AntennaPower>,

    /// Active antenna numbers
    pub active_antennas: Vec<u8>,
}

impl ReaderInfo {
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            ..Self::default()
        }
    }

    /// Number of active antennas
    pub fn antenna_count(&self) -> usize {
        self.active_antennas.len()
    }
}

impl fmt::Display for ReaderInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Reader[SN: {}, port: {}, antennas: {:?}]",
            self.serial_number.as_deref().unwrap_or("unknown"),
            self.port,
            self.active_antennas
        )
    }
}
