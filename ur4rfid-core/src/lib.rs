//! # ur4rfid-core
//!
//! Core protocol implementation for UR4 UHF RFID readers.
//!
//! This crate provides the low-level protocol primitives:
//! - Frame structure and encoding/decoding
//! - BCC checksum calculation
//! - Byte-stream reassembly with resynchronisation
//! - Command definitions and control request/response layouts
//! - Inventory response parsing
//! - Session state machine
//! - Protocol constants

pub mod checksum;
pub mod command;
pub mod constants;
pub mod control;
pub mod error;
pub mod frame;
pub mod reassembler;
pub mod session;
pub mod tag;

pub use command::Command;
pub use error::{Error, Result};
pub use frame::{Decoded, Frame};
pub use reassembler::Reassembler;
pub use session::{Session, SessionState};
