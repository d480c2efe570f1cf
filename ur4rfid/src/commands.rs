//! Reader configuration commands

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use ur4rfid_core::{control, Command};
use ur4rfid_types::{AntennaPower, AntennaSet, ReaderInfo};

use crate::error::{Error, Result};
use crate::reader::Reader;

/// Physical ports reported when the power table is unavailable
const PHYSICAL_PORTS: u8 = 8;

impl Reader {
    /// Get read/write power of every antenna
    pub async fn get_antenna_power(&self) -> Result<BTreeMap<u8, AntennaPower>> {
        debug!("Getting antenna power...");

        let response = self.command(&control::get_power(), Command::GetPowerResponse).await?;
        let powers = control::parse_power(&response)?;

        debug!("Antenna power: {:?}", powers);
        Ok(powers)
    }

    /// Set read/write power of one antenna
    ///
    /// Parameters are validated before anything is sent. With `persist` the
    /// reader keeps the setting across power cycles.
    ///
    /// # Errors
    ///
    /// - `InvalidParameter` for an antenna outside `1..=16` or a power outside
    ///   `0.0..=33.0` dBm
    /// - `CommandRejected` if the reader answers without success status
    pub async fn set_antenna_power(
        &self,
        antenna: u8,
        read_dbm: f32,
        write_dbm: f32,
        persist: bool,
    ) -> Result<()> {
        let request = control::set_power(antenna, read_dbm, write_dbm, persist)?;

        debug!(
            "Setting antenna {} power to {:.2}/{:.2} dBm (persist={})",
            antenna, read_dbm, write_dbm, persist
        );

        let response = self.command(&request, Command::SetPowerResponse).await?;
        if !control::parse_status(&response, Command::SetPowerResponse)? {
            warn!("Reader rejected power {:.2}/{:.2} dBm on antenna {}", read_dbm, write_dbm, antenna);
            return Err(Error::CommandRejected(Command::SetPower));
        }

        info!("Antenna {} power set to {:.2}/{:.2} dBm", antenna, read_dbm, write_dbm);
        Ok(())
    }

    /// Get the active antennas
    pub async fn get_active_antennas(&self) -> Result<AntennaSet> {
        debug!("Getting active antennas...");

        let response = self.command(&control::get_antennas(), Command::GetAntennaResponse).await?;
        Ok(control::parse_antennas(&response)?)
    }

    /// Set the active antennas
    ///
    /// # Errors
    ///
    /// - `InvalidParameter` for an empty list or an antenna outside `1..=16`
    /// - `CommandRejected` if the reader answers without success status
    pub async fn set_active_antennas(&self, antennas: &[u8], persist: bool) -> Result<()> {
        let request = control::set_antennas(antennas, persist)?;

        debug!("Setting active antennas to {:?} (persist={})", antennas, persist);

        let response = self.command(&request, Command::SetAntennaResponse).await?;
        if !control::parse_status(&response, Command::SetAntennaResponse)? {
            warn!("Reader rejected antenna set {:?}", antennas);
            return Err(Error::CommandRejected(Command::SetAntenna));
        }

        info!("Active antennas set to {:?}", antennas);
        Ok(())
    }

    /// Get the module identifier (8 uppercase hex characters)
    pub async fn get_identity(&self) -> Result<String> {
        debug!("Getting module id...");

        let response = self.command(&control::get_module_id(), Command::GetModuleIdResponse).await?;
        Ok(control::parse_module_id(&response)?)
    }

    /// Get reader information
    ///
    /// Queries identity, power table and antenna mask. A query that fails
    /// without losing the transport leaves its field empty.
    pub async fn get_reader_info(&self) -> Result<ReaderInfo> {
        let mut info = ReaderInfo::new(self.port_name());

        info.serial_number = optional("module id", self.get_identity().await)?;
        info.antenna_powers = optional("antenna power", self.get_antenna_power().await)?.unwrap_or_default();

        info.active_antennas = if info.antenna_powers.is_empty() {
            optional("active antennas", self.get_active_antennas().await)?
                .map(|set| {
                    set.antennas()
                        .into_iter()
                        .filter(|&antenna| antenna <= PHYSICAL_PORTS)
                        .collect()
                })
                .unwrap_or_default()
        } else {
            info.antenna_powers.keys().copied().collect()
        };

        debug!("Reader info: {}", info);
        Ok(info)
    }
}

fn optional<T>(what: &str, result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.requires_reconnect() => Err(e),
        Err(e) => {
            debug!("Failed to get {}: {}", what, e);
            Ok(None)
        }
    }
}
