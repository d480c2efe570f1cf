//! Type definitions for ur4rfid

pub mod antenna;
pub mod error;
pub mod reader_info;
pub mod tag;

pub use antenna::{AntennaPower, AntennaSet};
pub use error::{Error, Result};
pub use reader_info::ReaderInfo;
pub use tag::{TagCrossing, TagDetection};
