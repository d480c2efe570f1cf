//! Tag detections and emitted crossing events

use std::fmt;

use chrono::{DateTime, Utc};

/// A single raw read reported by the reader during inventory
#[derive(Debug, Clone, PartialEq)]
pub struct TagDetection {
    /// EPC as uppercase hex
    pub epc: String,

    /// Antenna port the tag was seen on
    pub antenna: u8,

    /// Signal strength in dBm (0.1 dBm resolution)
    pub rssi_dbm: f32,

    /// When the frame was decoded
    pub observed_at: DateTime<Utc>,
}

impl TagDetection {
    /// Turn a detection into the event delivered downstream
    pub fn crossing(&self) -> TagCrossing {
        TagCrossing {
            epc: self.epc.clone(),
            antenna: self.antenna,
            timestamp: self.observed_at,
        }
    }
}

impl fmt::Display for TagDetection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Tag[{}](ant={}, rssi={:.1}dBm)",
            self.epc, self.antenna, self.rssi_dbm
        )
    }
}

/// Deduplicated tag event handed to the tracking application
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagCrossing {
    pub epc: String,
    pub antenna: u8,
    pub timestamp: DateTime<Utc>,
}

impl fmt::Display for TagCrossing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ant={} at {}",
            self.epc,
            self.antenna,
            self.timestamp.format("%d/%m/%Y %H:%M:%S")
        )
    }
}
