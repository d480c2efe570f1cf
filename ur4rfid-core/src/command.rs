//! UR4 protocol command definitions

use std::fmt;

use crate::error::{Error, Result};

/// Protocol command codes
///
/// Requests sent by the host and the response codes the reader answers with.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
    // Identity
    GetModuleId = 0x04,
    GetModuleIdResponse = 0x05,

    // RF power
    SetPower = 0x10,
    SetPowerResponse = 0x11,
    GetPower = 0x12,
    GetPowerResponse = 0x13,

    // Antenna configuration
    SetAntenna = 0x28,
    SetAntennaResponse = 0x29,
    GetAntenna = 0x2A,
    GetAntennaResponse = 0x2B,

    // Continuous inventory
    StartInventory = 0x82,
    InventoryResponse = 0x83,
    StopInventory = 0x8C,
}

impl Command {
    /// Get command name
    pub fn name(self) -> &'static str {
        match self {
            Self::GetModuleId => "GET_MODULE_ID",
            Self::GetModuleIdResponse => "GET_MODULE_ID_RSP",
            Self::SetPower => "SET_POWER",
            Self::SetPowerResponse => "SET_POWER_RSP",
            Self::GetPower => "GET_POWER",
            Self::GetPowerResponse => "GET_POWER_RSP",
            Self::SetAntenna => "SET_ANTENNA",
            Self::SetAntennaResponse => "SET_ANTENNA_RSP",
            Self::GetAntenna => "GET_ANTENNA",
            Self::GetAntennaResponse => "GET_ANTENNA_RSP",
            Self::StartInventory => "START_INVENTORY",
            Self::InventoryResponse => "INVENTORY_RSP",
            Self::StopInventory => "STOP_INVENTORY",
        }
    }
}

impl From<Command> for u8 {
    fn from(cmd: Command) -> u8 {
        cmd as u8
    }
}

impl TryFrom<u8> for Command {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0x04 => Ok(Self::GetModuleId),
            0x05 => Ok(Self::GetModuleIdResponse),
            0x10 => Ok(Self::SetPower),
            0x11 => Ok(Self::SetPowerResponse),
            0x12 => Ok(Self::GetPower),
            0x13 => Ok(Self::GetPowerResponse),
            0x28 => Ok(Self::SetAntenna),
            0x29 => Ok(Self::SetAntennaResponse),
            0x2A => Ok(Self::GetAntenna),
            0x2B => Ok(Self::GetAntennaResponse),
            0x82 => Ok(Self::StartInventory),
            0x83 => Ok(Self::InventoryResponse),
            0x8C => Ok(Self::StopInventory),
            _ => Err(Error::UnknownCommand(value)),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(0x{:02X})", self.name(), *self as u8)
    }
}
