//! Control command requests and response parsing
//!
//! Builders validate their parameters before producing a frame, so an
//! invalid request never reaches the wire.

use std::collections::BTreeMap;

use byteorder::{BigEndian, ByteOrder};
use ur4rfid_types::{antenna::validate_antenna, AntennaPower, AntennaSet};

use crate::{
    command::Command,
    constants::{status, SET_ANTENNA_PERSIST, SET_POWER_PERSIST},
    error::{Error, Result},
    frame::Frame,
};

/// Start continuous inventory
pub fn start_inventory() -> Frame {
    Frame::from_static(Command::StartInventory, &[0x00, 0x00])
}

/// Stop continuous inventory
pub fn stop_inventory() -> Frame {
    Frame::empty(Command::StopInventory)
}

/// Read the power table
pub fn get_power() -> Frame {
    Frame::empty(Command::GetPower)
}

/// Read the active antenna mask
pub fn get_antennas() -> Frame {
    Frame::empty(Command::GetAntenna)
}

/// Read the module identifier
pub fn get_module_id() -> Frame {
    Frame::empty(Command::GetModuleId)
}

/// Set read/write power of one antenna
///
/// # Errors
///
/// Returns `InvalidParameter` if `antenna` is outside `1..=16` or either
/// power is outside `0.0..=33.0` dBm.
pub fn set_power(antenna: u8, read_dbm: f32, write_dbm: f32, persist: bool) -> Result<Frame> {
    let antenna = validate_antenna(antenna)?;
    let (read, write) = AntennaPower::new(read_dbm, write_dbm)?.to_raw();

    let mut data = [0u8; 6];
    data[0] = if persist { SET_POWER_PERSIST } else { 0x00 };
    data[1] = antenna;
    BigEndian::write_u16(&mut data[2..4], read);
    BigEndian::write_u16(&mut data[4..6], write);

    Frame::new(Command::SetPower, data.to_vec())
}

/// Set the active antennas
///
/// # Errors
///
/// Returns `InvalidParameter` for an empty list or any antenna outside `1..=16`.
pub fn set_antennas(antennas: &[u8], persist: bool) -> Result<Frame> {
    let mask = AntennaSet::from_antennas(antennas)?.bits();

    let mut data = [0u8; 3];
    data[0] = if persist { SET_ANTENNA_PERSIST } else { 0x00 };
    BigEndian::write_u16(&mut data[1..3], mask);

    Frame::new(Command::SetAntenna, data.to_vec())
}

fn expect(frame: &Frame, command: Command) -> Result<&[u8]> {
    if !frame.is(command) {
        return Err(Error::Parse(format!("expected {}, got {}", command, frame)));
    }
    Ok(frame.data())
}

/// Parse a get-power response into antenna → power
///
/// Data is a status byte followed by 5-byte records (antenna, read, write).
/// Trailing bytes shorter than a record are ignored.
pub fn parse_power(frame: &Frame) -> Result<BTreeMap<u8, AntennaPower>> {
    let data = expect(frame, Command::GetPowerResponse)?;

    let Some((_status, records)) = data.split_first() else {
        return Err(Error::Parse("power response without status byte".into()));
    };

    Ok(records
        .chunks_exact(5)
        .map(|record| {
            let power = AntennaPower::from_raw(
                BigEndian::read_u16(&record[1..3]),
                BigEndian::read_u16(&record[3..5]),
            );
            (record[0], power)
        })
        .collect())
}

/// Parse a get-antenna response
pub fn parse_antennas(frame: &Frame) -> Result<AntennaSet> {
    let data = expect(frame, Command::GetAntennaResponse)?;

    if data.len() < 2 {
        return Err(Error::Parse(format!("antenna mask too short: {} bytes", data.len())));
    }

    Ok(AntennaSet::from_bits_retain(BigEndian::read_u16(&data[0..2])))
}

/// Parse a get-module-id response into 8 uppercase hex characters
pub fn parse_module_id(frame: &Frame) -> Result<String> {
    let data = expect(frame, Command::GetModuleIdResponse)?;

    if data.len() < 4 {
        return Err(Error::Parse(format!("module id too short: {} bytes", data.len())));
    }

    Ok(hex::encode_upper(&data[..4]))
}

/// Check the explicit success status of a set-power / set-antenna response
pub fn parse_status(frame: &Frame, command: Command) -> Result<bool> {
    let data = expect(frame, command)?;

    match data.first() {
        Some(&code) => Ok(code == status::SUCCESS),
        None => Err(Error::Parse(format!("{} without status byte", command))),
    }
}
