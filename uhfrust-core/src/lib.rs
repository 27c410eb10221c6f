//! # uhfrust-core
//!
//! Sans-IO protocol implementation for UHF RFID readers.
//!
//! This crate provides the low-level protocol primitives:
//! - CRC16 checksum calculation
//! - Packet structure and stream framing
//! - Command templates and encoding
//! - The reader session state machine and scan aggregation
//!
//! Nothing here touches a port or a clock; the `uhfrust` crate drives it.

pub mod aggregator;
pub mod checksum;
pub mod command;
pub mod constants;
pub mod error;
pub mod framer;
pub mod packet;
pub mod session;

pub use aggregator::{CatalogMode, ScanAggregator};
pub use command::{CommandCode, Template};
pub use error::{Error, Result};
pub use framer::Framer;
pub use packet::Packet;
pub use session::{Action, ReaderSession, ReaderState, ScanMode, ScanRequest};
