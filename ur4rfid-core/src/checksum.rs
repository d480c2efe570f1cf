//! UR4 block check character (BCC)
//!
//! The BCC is the XOR of every byte from the length field through the last
//! data byte. Header, BCC itself and trailer are excluded.

use tracing::trace;

/// Calculate the BCC over length + command + data
///
/// # Examples
///
/// ```
/// use ur4rfid_core::checksum;
///
/// // Stop-inventory: length 0x0008, command 0x8C, no data
/// assert_eq!(checksum::calculate(&[0x00, 0x08, 0x8C]), 0x84);
/// ```
pub fn calculate(bytes: &[u8]) -> u8 {
    let bcc = bytes.iter().fold(0u8, |acc, b| acc ^ b);

    trace!(
        len = bytes.len(),
        bcc = format!("0x{:02X}", bcc),
        "Calculated BCC"
    );

    bcc
}
