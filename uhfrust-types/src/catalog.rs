//! Preloaded item catalog keyed by EPC
//!
//! The catalog arrives as CSV with a header row. Columns are matched by name,
//! so their order does not matter, and labels may be quoted:
//!
//! ```text
//! id,EPC,item,expiration_date
//! 1,E2801160600002084E2B2C31,Milk,2025-01-31
//! 2,E2801160600002084E2B2C32,"Milk, 2L",
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use csv::{ReaderBuilder, Trim};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Header name of the EPC column
pub const COLUMN_EPC: &str = "EPC";

/// Header name of the item label column
pub const COLUMN_ITEM: &str = "item";

/// Header name of the numeric id column
pub const COLUMN_ID: &str = "id";

/// Header name of the optional expiration column
pub const COLUMN_EXPIRATION: &str = "expiration_date";

/// One known item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Numeric item id (`None` when the cell is blank or not a number)
    pub id: Option<u32>,

    /// Upper-case hex EPC
    pub epc: String,

    /// Human-readable label
    pub item: String,

    /// Free-form expiration date, passed through untouched
    pub expiration_date: Option<String>,
}

/// Set of known EPCs, in file order
///
/// Immutable once built; reloading means building a new `Catalog` and
/// swapping it in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
    index: HashMap<String, usize>,
}

impl Catalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse CSV catalog text
    ///
    /// Cells are trimmed, rows may be short, and rows with an empty EPC are
    /// skipped. A row repeating an earlier EPC replaces that entry in place.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingColumn`] if the header lacks `EPC`, `item` or `id`,
    /// and [`Error::Csv`] for malformed CSV.
    ///
    /// # Examples
    ///
    /// ```
    /// use uhfrust_types::Catalog;
    ///
    /// let catalog = Catalog::parse("EPC,item,id\nE200AB,Milk,7\n").unwrap();
    /// assert_eq!(catalog.len(), 1);
    /// assert_eq!(catalog.get("E200AB").unwrap().id, Some(7));
    /// ```
    pub fn parse(text: &str) -> Result<Self> {
        let mut reader = ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .from_reader(text.as_bytes());

        let headers = reader.headers()?.clone();
        if headers.iter().all(str::is_empty) {
            return Ok(Self::new());
        }

        let column = |name: &'static str| {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or(Error::MissingColumn(name))
        };

        let epc_idx = column(COLUMN_EPC)?;
        let item_idx = column(COLUMN_ITEM)?;
        let id_idx = column(COLUMN_ID)?;
        let expiration_idx = column(COLUMN_EXPIRATION).ok();

        let mut catalog = Self::new();

        for (row, record) in reader.records().enumerate() {
            let record = record?;
            let cell = |idx: usize| record.get(idx).unwrap_or("");

            let epc = cell(epc_idx);
            if epc.is_empty() {
                debug!(row = row + 1, "Skipping catalog row without EPC");
                continue;
            }

            let raw_id = cell(id_idx);
            let id = match raw_id.parse::<u32>() {
                Ok(id) => Some(id),
                Err(_) => {
                    warn!(row = row + 1, id = raw_id, epc, "Catalog row has no usable id");
                    None
                }
            };

            let expiration_date = expiration_idx
                .map(cell)
                .filter(|value| !value.is_empty())
                .map(str::to_owned);

            catalog.insert(CatalogEntry {
                id,
                epc: epc.to_owned(),
                item: cell(item_idx).to_owned(),
                expiration_date,
            });
        }

        debug!(entries = catalog.len(), "Parsed catalog");

        Ok(catalog)
    }

    /// Read and parse a catalog file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| Error::Parse(format!("{}: {}", path.display(), e)))?;

        Self::parse(&text)
    }

    fn insert(&mut self, entry: CatalogEntry) {
        match self.index.get(&entry.epc) {
            Some(&idx) => self.entries[idx] = entry,
            None => {
                self.index.insert(entry.epc.clone(), self.entries.len());
                self.entries.push(entry);
            }
        }
    }

    /// Look up an entry by EPC
    pub fn get(&self, epc: &str) -> Option<&CatalogEntry> {
        self.index.get(epc).map(|&idx| &self.entries[idx])
    }

    /// Check whether an EPC is known
    pub fn contains(&self, epc: &str) -> bool {
        self.index.contains_key(epc)
    }

    /// Entries in file order
    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
