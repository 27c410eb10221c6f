//! Shared data types for uhfrust
//!
//! Everything that crosses the boundary between the protocol core and the
//! outside world lives here: the preloaded catalog, per-tag scan records,
//! and the JSON commands/events exchanged with clients.

pub mod catalog;
pub mod command;
pub mod error;
pub mod event;
pub mod record;

pub use catalog::{Catalog, CatalogEntry};
pub use command::ClientCommand;
pub use error::{Error, Result};
pub use event::Event;
pub use record::{InventoryItem, ScanRecord};
