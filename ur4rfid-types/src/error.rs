pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("Invalid antenna number {0} (expected 1-16)")]
    InvalidAntenna(u8),
    
    #[error("Invalid power {0} dBm (expected 0.0-33.0)")]
    InvalidPower(f32),
    
    #[error("Antenna set is empty")]
    EmptyAntennaSet,
}
