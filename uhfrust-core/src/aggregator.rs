//! Scan aggregation
//!
//! Turns EPC sightings into either one-shot tag events or cumulative
//! per-EPC records, optionally filtered against a preloaded catalog.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::{debug, trace};

use uhfrust_types::{Catalog, Event, InventoryItem, ScanRecord};

use crate::{
    constants::{EPC_PREFIX_LEN, EPC_SUFFIX_LEN},
    session::ScanMode,
};

/// How inventory updates relate to the catalog
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CatalogMode {
    /// Publish every cumulative record; the catalog only filters
    #[default]
    Filter,

    /// Publish only the catalog entry that was just scanned
    Linked,
}

/// Extract the EPC from an inventory payload
///
/// Strips the vendor envelope (5 leading, 2 trailing bytes) and hex-encodes
/// the rest in upper case. Returns `None` if nothing is left.
///
/// # Examples
///
/// ```
/// use uhfrust_core::aggregator::extract_epc;
///
/// let payload = [0x01, 0x02, 0x03, 0x04, 0x05, 0xE2, 0x00, 0xAB, 0x09, 0x09];
/// assert_eq!(extract_epc(&payload).as_deref(), Some("E200AB"));
/// ```
pub fn extract_epc(payload: &[u8]) -> Option<String> {
    if payload.len() <= EPC_PREFIX_LEN + EPC_SUFFIX_LEN {
        return None;
    }

    let epc = &payload[EPC_PREFIX_LEN..payload.len() - EPC_SUFFIX_LEN];
    Some(hex::encode_upper(epc))
}

/// Per-session scan state
#[derive(Debug, Default)]
pub struct ScanAggregator {
    mode: CatalogMode,
    catalog: Option<Catalog>,
    records: Vec<ScanRecord>,
    index: HashMap<String, usize>,
}

impl ScanAggregator {
    pub fn new(mode: CatalogMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn mode(&self) -> CatalogMode {
        self.mode
    }

    /// Currently loaded catalog
    pub fn catalog(&self) -> Option<&Catalog> {
        self.catalog.as_ref()
    }

    /// Replace the catalog
    ///
    /// Existing records are kept, including those for EPCs the new catalog
    /// no longer lists.
    pub fn load_catalog(&mut self, catalog: Catalog) {
        debug!(
            entries = catalog.len(),
            records = self.records.len(),
            "Loading catalog"
        );
        self.catalog = Some(catalog);
    }

    /// Cumulative records in first-seen order
    pub fn records(&self) -> &[ScanRecord] {
        &self.records
    }

    /// Look up the record of one EPC
    pub fn record(&self, epc: &str) -> Option<&ScanRecord> {
        self.index.get(epc).map(|&idx| &self.records[idx])
    }

    /// Process a successful inventory payload
    ///
    /// Returns the event to publish, if any.
    pub fn ingest(&mut self, payload: &[u8], scan_mode: ScanMode, now: DateTime<Utc>) -> Option<Event> {
        let Some(epc) = extract_epc(payload) else {
            debug!(len = payload.len(), "Inventory payload too short for an EPC");
            return None;
        };

        if scan_mode == ScanMode::SingleTagRead {
            debug!(epc = %epc, "Single tag read");
            return Some(Event::RfidSingleTag { epc });
        }

        if let Some(catalog) = &self.catalog {
            if !catalog.contains(&epc) {
                trace!(epc = %epc, "EPC not in catalog, ignoring");
                return None;
            }
        }

        let idx = self.touch(epc, now);
        let record = &self.records[idx];
        let entry = self.catalog.as_ref().and_then(|c| c.get(&record.epc));

        trace!(epc = %record.epc, count = record.count, "Recorded scan");

        match self.mode {
            CatalogMode::Filter => {
                let payload = self
                    .records
                    .iter()
                    .map(|r| {
                        let entry = self.catalog.as_ref().and_then(|c| c.get(&r.epc));
                        InventoryItem::scanned(r, entry)
                    })
                    .collect();
                Some(Event::RfidUpdate { payload })
            }
            CatalogMode::Linked => entry.map(|entry| Event::RfidUpdate {
                payload: vec![InventoryItem::scanned(record, Some(entry))],
            }),
        }
    }

    fn touch(&mut self, epc: String, now: DateTime<Utc>) -> usize {
        let idx = match self.index.get(&epc) {
            Some(&idx) => idx,
            None => {
                let idx = self.records.len();
                self.index.insert(epc.clone(), idx);
                self.records.push(ScanRecord::new(epc, now));
                idx
            }
        };

        self.records[idx].touch(now);
        idx
    }
}
