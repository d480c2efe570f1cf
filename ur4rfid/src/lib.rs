//! # ur4rfid
//!
//! Rust protocol engine for UR4 UHF RFID readers over a serial line.
//!
//! ## Features
//!
//! - Frame codec with resynchronisation on corrupt input
//! - Async/await API using Tokio
//! - Control commands that transparently pause and resume inventory
//! - Tag deduplication with antenna-crossing detection and retry backoff
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//! use ur4rfid::{DedupConfig, InventoryProcessor, Reader};
//!
//! #[tokio::main]
//! async fn main() -> ur4rfid::Result<()> {
//!     // Connect to reader
//!     let reader = Reader::open("/dev/ttyUSB0");
//!     reader.connect().await?;
//!     
//!     // Stream deduplicated crossings
//!     reader.start_inventory().await?;
//!     let (processor, mut events, _reporter) =
//!         InventoryProcessor::new(reader.clone(), DedupConfig::default(), 256);
//!     tokio::spawn(processor.run_until(tokio::time::sleep(Duration::from_secs(60))));
//!     
//!     while let Some(crossing) = events.recv().await {
//!         println!("{}", crossing);
//!     }
//!     
//!     // Disconnect
//!     reader.disconnect().await?;
//!     
//!     Ok(())
//! }
//! ```

mod commands;
pub mod config;
pub mod dedup;
pub mod error;
pub mod inventory;
pub mod reader;

// Re-exports
pub use config::ReaderConfig;
pub use dedup::{DedupConfig, DedupStats, Decision, Deduplicator, TagRecord};
pub use error::{Error, Result};
pub use inventory::{InventoryProcessor, OutcomeReporter};
pub use reader::Reader;

// Re-export types
pub use ur4rfid_core::{Command, Frame, SessionState};
pub use ur4rfid_transport::{MockPipe, SerialPipe, SerialTransport};
pub use ur4rfid_types::{AntennaPower, AntennaSet, ReaderInfo, TagCrossing, TagDetection};
