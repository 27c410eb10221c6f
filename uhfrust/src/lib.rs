//! # uhfrust
//!
//! Host-side driver for UHF RFID readers speaking the 0xFF-framed serial
//! protocol.
//!
//! ## Features
//!
//! - Bootloader / application firmware negotiation
//! - Cumulative inventory or one-shot tag reads
//! - Optional catalog filtering and enrichment
//! - Async/await API using Tokio
//!
//! ## Quick Start
//!
//! ```no_run
//! use tokio::sync::mpsc;
//! use uhfrust::{ClientCommand, Reader, ReaderConfig};
//!
//! #[tokio::main]
//! async fn main() -> uhfrust::Result<()> {
//!     let mut reader = Reader::serial("/dev/ttyUSB0", 115_200, ReaderConfig::default());
//!     let mut events = reader.subscribe();
//!     let (commands, rx) = mpsc::channel(8);
//!
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("{}", event.to_json().unwrap_or_default());
//!         }
//!     });
//!
//!     commands.send(ClientCommand::StartInventory).await.ok();
//!     reader.run(rx).await
//! }
//! ```

pub mod config;
pub mod error;
pub mod reader;

// Re-exports
pub use config::ReaderConfig;
pub use error::{Error, Result};
pub use reader::Reader;

// Re-export types
pub use uhfrust_core::{CatalogMode, Packet, ReaderSession, ReaderState, ScanMode};
pub use uhfrust_types::{Catalog, CatalogEntry, ClientCommand, Event, InventoryItem};
