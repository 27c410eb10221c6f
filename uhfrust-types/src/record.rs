//! Per-tag scan records and their client-facing form

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::CatalogEntry;

/// Cumulative sightings of one EPC during a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRecord {
    /// Upper-case hex EPC
    pub epc: String,

    /// Number of successful inventory reads
    pub count: u32,

    /// Time of the most recent read
    pub last_seen: DateTime<Utc>,
}

impl ScanRecord {
    /// Create a record that has not been counted yet
    pub fn new(epc: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            epc: epc.into(),
            count: 0,
            last_seen: now,
        }
    }

    /// Count one more read at `now`
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.count = self.count.saturating_add(1);
        self.last_seen = now;
    }
}

/// Inventory row sent to clients
///
/// Catalog fields are `None` when the EPC is not in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id: Option<u32>,
    pub epc: String,
    pub item: Option<String>,
    pub count: u32,
    pub timestamp: Option<DateTime<Utc>>,
    pub expiration_date: Option<String>,
}

impl InventoryItem {
    /// Build a row from a scan record, enriched with catalog metadata if any
    pub fn scanned(record: &ScanRecord, entry: Option<&CatalogEntry>) -> Self {
        Self {
            id: entry.and_then(|e| e.id),
            epc: record.epc.clone(),
            item: entry.map(|e| e.item.clone()),
            count: record.count,
            timestamp: Some(record.last_seen),
            expiration_date: entry.and_then(|e| e.expiration_date.clone()),
        }
    }

    /// Build a row for a catalog entry that has not been scanned
    pub fn unscanned(entry: &CatalogEntry) -> Self {
        Self {
            id: entry.id,
            epc: entry.epc.clone(),
            item: Some(entry.item.clone()),
            count: 0,
            timestamp: None,
            expiration_date: entry.expiration_date.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_record_touch() {
        let mut record = ScanRecord::new("E2001", at(10));
        assert_eq!(record.count, 0);

        record.touch(at(11));
        record.touch(at(12));

        assert_eq!(record.count, 2);
        assert_eq!(record.last_seen, at(12));
    }

    #[test]
    fn test_scanned_without_catalog_entry() {
        let mut record = ScanRecord::new("E2001", at(10));
        record.touch(at(10));

        let row = InventoryItem::scanned(&record, None);

        assert_eq!(row.id, None);
        assert_eq!(row.item, None);
        assert_eq!(row.count, 1);
        assert_eq!(row.timestamp, Some(at(10)));
    }

    #[test]
    fn test_scanned_with_catalog_entry() {
        let entry = CatalogEntry {
            id: Some(4),
            epc: "E2001".into(),
            item: "Milk".into(),
            expiration_date: Some("2025-01-31".into()),
        };
        let mut record = ScanRecord::new("E2001", at(10));
        record.touch(at(10));

        let row = InventoryItem::scanned(&record, Some(&entry));

        assert_eq!(row.id, Some(4));
        assert_eq!(row.item.as_deref(), Some("Milk"));
        assert_eq!(row.expiration_date.as_deref(), Some("2025-01-31"));
    }

    #[test]
    fn test_unscanned() {
        let entry = CatalogEntry {
            id: Some(4),
            epc: "E2001".into(),
            item: "Milk".into(),
            expiration_date: None,
        };

        let row = InventoryItem::unscanned(&entry);

        assert_eq!(row.count, 0);
        assert_eq!(row.timestamp, None);
    }
}
