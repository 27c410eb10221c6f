//! Outbound events published to clients
//!
//! Serialized as JSON objects tagged by `type`:
//!
//! ```text
//! {"type":"rfid-update","payload":[{"id":1,"epc":"E200...","item":"Milk","count":3,...}]}
//! {"type":"rfid-single-tag","epc":"E200..."}
//! {"type":"rfid-error","message":"Reader not ready"}
//! {"type":"rfid-initial-inventory","payload":[...]}
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::error::Result;
use crate::record::InventoryItem;

/// Message sent when a scan command arrives before the reader is ready
pub const READER_NOT_READY: &str = "Reader not ready";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Event {
    /// Cumulative inventory rows
    RfidUpdate { payload: Vec<InventoryItem> },

    /// One-shot tag read
    RfidSingleTag { epc: String },

    /// Command rejected
    RfidError { message: String },

    /// Catalog contents with nothing scanned yet
    RfidInitialInventory { payload: Vec<InventoryItem> },
}

impl Event {
    pub fn reader_not_ready() -> Self {
        Self::RfidError {
            message: READER_NOT_READY.to_string(),
        }
    }

    /// Build the initial inventory listing for a catalog
    pub fn initial_inventory(catalog: &Catalog) -> Self {
        Self::RfidInitialInventory {
            payload: catalog.entries().iter().map(InventoryItem::unscanned).collect(),
        }
    }

    /// Wire name of the event
    pub fn name(&self) -> &'static str {
        match self {
            Self::RfidUpdate { .. } => "rfid-update",
            Self::RfidSingleTag { .. } => "rfid-single-tag",
            Self::RfidError { .. } => "rfid-error",
            Self::RfidInitialInventory { .. } => "rfid-initial-inventory",
        }
    }

    /// Serialize to a single-line JSON string
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RfidUpdate { payload } | Self::RfidInitialInventory { payload } => {
                write!(f, "{}({} items)", self.name(), payload.len())
            }
            Self::RfidSingleTag { epc } => write!(f, "{}({})", self.name(), epc),
            Self::RfidError { message } => write!(f, "{}({})", self.name(), message),
        }
    }
}
