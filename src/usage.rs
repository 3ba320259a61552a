//! Monthly API usage ledger.
//!
//! A flat service -> request-count JSON map covering the current calendar
//! month. When the ledger on disk was last written in a different month it is
//! moved into the archive directory (named with the old month/year) and a
//! fresh ledger takes its place.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, Local};

use crate::config::AppPaths;
use crate::error::{Result, TerrainError};

#[derive(Debug, Clone)]
pub struct UsageLedger {
    ledger_path: PathBuf,
    archive_dir: PathBuf,
}

impl UsageLedger {
    pub fn new(paths: &AppPaths) -> Self {
        Self {
            ledger_path: paths.ledger.clone(),
            archive_dir: paths.archive_dir.clone(),
        }
    }

    /// Add `amount` requests to `service`'s count and return the new total.
    pub fn add(&self, service: &str, amount: u64) -> Result<u64> {
        let mut counts = self.load(Local::now())?;
        let total = counts.entry(service.to_string()).or_insert(0);
        *total += amount;
        let total = *total;
        self.save(&counts)?;
        Ok(total)
    }

    /// Current-month count for `service` (zero if never charged).
    pub fn get(&self, service: &str) -> Result<u64> {
        Ok(self.load(Local::now())?.get(service).copied().unwrap_or(0))
    }

    /// All current-month counts, for reporting.
    pub fn all(&self) -> Result<BTreeMap<String, u64>> {
        self.load(Local::now())
    }

    /// Load the ledger, archiving it first if it belongs to an older month.
    fn load(&self, now: DateTime<Local>) -> Result<BTreeMap<String, u64>> {
        let path = &self.ledger_path;
        if !path.is_file() {
            return Ok(BTreeMap::new());
        }

        let modified = fs::metadata(path)
            .and_then(|m| m.modified())
            .map_err(|e| TerrainError::io(path, e))?;
        let modified: DateTime<Local> = modified.into();

        if (modified.year(), modified.month()) != (now.year(), now.month()) {
            self.archive(modified)?;
            return Ok(BTreeMap::new());
        }

        let text = fs::read_to_string(path).map_err(|e| TerrainError::io(path, e))?;
        serde_json::from_str(&text).map_err(|e| TerrainError::LedgerCorrupt {
            path: path.clone(),
            message: e.to_string(),
        })
    }

    /// Move the stale ledger file into the archive directory, overwriting any
    /// previous archive for the same month.
    fn archive(&self, stale: DateTime<Local>) -> Result<()> {
        let archive_path = self.archive_dir.join(archive_name(
            &self.ledger_path,
            stale.month(),
            stale.year(),
        ));
        fs::create_dir_all(&self.archive_dir)
            .map_err(|e| TerrainError::io(&self.archive_dir, e))?;
        if archive_path.is_file() {
            fs::remove_file(&archive_path).map_err(|e| TerrainError::io(&archive_path, e))?;
        }
        fs::rename(&self.ledger_path, &archive_path)
            .map_err(|e| TerrainError::io(&self.ledger_path, e))?;
        Ok(())
    }

    fn save(&self, counts: &BTreeMap<String, u64>) -> Result<()> {
        let json = serde_json::to_string_pretty(counts).map_err(|e| TerrainError::LedgerCorrupt {
            path: self.ledger_path.clone(),
            message: e.to_string(),
        })?;
        if let Some(parent) = self.ledger_path.parent() {
            fs::create_dir_all(parent).map_err(|e| TerrainError::io(parent, e))?;
        }
        let tmp = self.ledger_path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| TerrainError::io(&tmp, e))?;
        fs::rename(&tmp, &self.ledger_path).map_err(|e| TerrainError::io(&self.ledger_path, e))?;
        Ok(())
    }
}

/// Archive file name: the ledger's stem with a `_MM_YY` suffix before the
/// extension, e.g. `api_tracker_03_26.json`.
fn archive_name(ledger_path: &Path, month: u32, year: i32) -> String {
    let stem = ledger_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("api_tracker");
    format!("{}_{:02}_{:02}.json", stem, month, year % 100)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Months;

    fn ledger_in(dir: &Path) -> UsageLedger {
        UsageLedger::new(&AppPaths::new(dir))
    }

    #[test]
    fn test_add_and_get() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = ledger_in(dir.path());

        assert_eq!(ledger.get("google_elevation").unwrap(), 0);
        assert_eq!(ledger.add("google_elevation", 3).unwrap(), 3);
        assert_eq!(ledger.add("google_elevation", 2).unwrap(), 5);
        assert_eq!(ledger.get("google_elevation").unwrap(), 5);
        // Independent services do not interfere
        assert_eq!(ledger.get("google_satellite").unwrap(), 0);
    }

    #[test]
    fn test_month_rollover_archives() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = ledger_in(dir.path());
        ledger.add("google_elevation", 7).unwrap();

        // The file on disk was written "now"; pretend a month has passed.
        let future = Local::now().checked_add_months(Months::new(1)).unwrap();
        let counts = ledger.load(future).unwrap();
        assert!(counts.is_empty());

        let now = Local::now();
        let archived = dir
            .path()
            .join("Archives")
            .join(archive_name(&ledger.ledger_path, now.month(), now.year()));
        assert!(archived.is_file());

        // The archived content carries the old counts.
        let old: BTreeMap<String, u64> =
            serde_json::from_str(&fs::read_to_string(&archived).unwrap()).unwrap();
        assert_eq!(old.get("google_elevation"), Some(&7));

        // A fresh ledger starts at zero.
        assert_eq!(ledger.get("google_elevation").unwrap(), 0);
    }

    #[test]
    fn test_archive_name_format() {
        let name = archive_name(Path::new("AppAssets/api_tracker.json"), 3, 2026);
        assert_eq!(name, "api_tracker_03_26.json");
    }

    #[test]
    fn test_corrupt_ledger_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = ledger_in(dir.path());
        fs::write(&ledger.ledger_path, "not json").unwrap();

        assert!(matches!(
            ledger.get("google_elevation"),
            Err(TerrainError::LedgerCorrupt { .. })
        ));
    }
}
