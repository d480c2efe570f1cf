//! Antenna numbering, power levels and the active-antenna mask

use std::fmt;

use bitflags::bitflags;

use crate::error::{Error, Result};

/// Highest antenna port addressable by the reader
pub const MAX_ANTENNA: u8 = 16;

/// Highest configurable RF power in dBm
pub const MAX_POWER_DBM: f32 = 33.0;

/// Check that an antenna number is in `1..=16`
pub fn validate_antenna(antenna: u8) -> Result<u8> {
    if (1..=MAX_ANTENNA).contains(&antenna) {
        Ok(antenna)
    } else {
        Err(Error::InvalidAntenna(antenna))
    }
}

/// Read/write RF power of one antenna port
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AntennaPower {
    /// Power used for inventory (dBm)
    pub read_dbm: f32,

    /// Power used for tag writes (dBm)
    pub write_dbm: f32,
}

impl AntennaPower {
    /// Create a validated power pair
    ///
    /// Both values must be within `0.0..=33.0` dBm.
    pub fn new(read_dbm: f32, write_dbm: f32) -> Result<Self> {
        for value in [read_dbm, write_dbm] {
            if !(0.0..=MAX_POWER_DBM).contains(&value) {
                return Err(Error::InvalidPower(value));
            }
        }

        Ok(Self { read_dbm, write_dbm })
    }

    /// Build from the device representation (dBm × 100)
    pub fn from_raw(read: u16, write: u16) -> Self {
        Self {
            read_dbm: f32::from(read) / 100.0,
            write_dbm: f32::from(write) / 100.0,
        }
    }

    /// Device representation (dBm × 100, rounded)
    pub fn to_raw(&self) -> (u16, u16) {
        (
            (self.read_dbm * 100.0).round() as u16,
            (self.write_dbm * 100.0).round() as u16,
        )
    }
}

impl fmt::Display for AntennaPower {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R={:.2}dBm W={:.2}dBm", self.read_dbm, self.write_dbm)
    }
}

bitflags! {
    /// Active antenna mask
    ///
    /// Antenna *n* is active iff bit *n − 1* is set.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AntennaSet: u16 {
        const ANT1 = 1;
        const ANT2 = 1 << 1;
        const ANT3 = 1 << 2;
        const ANT4 = 1 << 3;
        const ANT5 = 1 << 4;
        const ANT6 = 1 << 5;
        const ANT7 = 1 << 6;
        const ANT8 = 1 << 7;
        const ANT9 = 1 << 8;
        const ANT10 = 1 << 9;
        const ANT11 = 1 << 10;
        const ANT12 = 1 << 11;
        const ANT13 = 1 << 12;
        const ANT14 = 1 << 13;
        const ANT15 = 1 << 14;
        const ANT16 = 1 << 15;
    }
}

impl AntennaSet {
    /// Build a mask from antenna numbers
    ///
    /// Fails on an empty list or any number outside `1..=16`.
    pub fn from_antennas(antennas: &[u8]) -> Result<Self> {
        if antennas.is_empty() {
            return Err(Error::EmptyAntennaSet);
        }

        let mut set = Self::empty();
        for &antenna in antennas {
            validate_antenna(antenna)?;
            set |= Self::from_bits_retain(1 << (antenna - 1));
        }

        Ok(set)
    }

    /// Antenna numbers in ascending order
    pub fn antennas(&self) -> Vec<u8> {
        (1..=MAX_ANTENNA)
            .filter(|&n| self.contains_antenna(n))
            .collect()
    }

    /// Check a single antenna number
    pub fn contains_antenna(&self, antenna: u8) -> bool {
        (1..=MAX_ANTENNA).contains(&antenna) && self.bits() & (1 << (antenna - 1)) != 0
    }
}
