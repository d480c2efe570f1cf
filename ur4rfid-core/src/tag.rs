//! Inventory response parsing
//!
//! Data layout of an `INVENTORY_RSP` (0x83) frame:
//!
//! ```text
//! ┌──────────┬──────────────┬───────────┬─────────┐
//! │    PC    │     EPC      │   RSSI    │ Antenna │
//! │ BE u16   │ 2 × words    │ BE i16    │ 1 byte  │
//! └──────────┴──────────────┴───────────┴─────────┘
//! ```
//!
//! The top five bits of the PC word give the EPC length in 16-bit words.
//! RSSI is in tenths of a dBm.

use byteorder::{BigEndian, ByteOrder};
use chrono::{DateTime, Utc};
use ur4rfid_types::TagDetection;

use crate::{
    command::Command,
    error::{Error, Result},
    frame::Frame,
};

/// EPC length in bytes encoded in a PC word
pub fn epc_len_from_pc(pc: u16) -> usize {
    usize::from((pc >> 11) & 0x1F) * 2
}

/// Parse a tag detection from an inventory response frame
///
/// # Errors
///
/// Returns `Parse` for frames that are not inventory responses, carry an
/// empty EPC, or are too short for the PC-declared EPC length.
pub fn parse_detection(frame: &Frame, observed_at: DateTime<Utc>) -> Result<TagDetection> {
    if !frame.is(Command::InventoryResponse) {
        return Err(Error::Parse(format!("not an inventory response: {}", frame)));
    }

    let data = frame.data();
    if data.len() < 2 {
        return Err(Error::Parse(format!("inventory data too short: {} bytes", data.len())));
    }

    let pc = BigEndian::read_u16(&data[0..2]);
    let epc_len = epc_len_from_pc(pc);
    if epc_len == 0 {
        return Err(Error::Parse(format!("empty EPC (PC=0x{:04X})", pc)));
    }

    let rssi_pos = 2 + epc_len;
    if data.len() < rssi_pos + 3 {
        return Err(Error::Parse(format!(
            "inventory data too short: {} bytes for {}-byte EPC",
            data.len(),
            epc_len
        )));
    }

    let epc = hex::encode_upper(&data[2..rssi_pos]);
    let rssi_raw = BigEndian::read_i16(&data[rssi_pos..rssi_pos + 2]);
    let antenna = data[rssi_pos + 2];

    Ok(TagDetection {
        epc,
        antenna,
        rssi_dbm: f32::from(rssi_raw) / 10.0,
        observed_at,
    })
}
