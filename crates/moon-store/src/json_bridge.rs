use std::fs;
use std::path::Path;

use moon_core::{export_json, import_json};

use crate::error::{Result, StoreError};
use crate::store::Store;

impl Store {
    /// Import a day export file, upserting every record. Returns the record count.
    pub fn import_json_file(&self, path: &Path) -> Result<usize> {
        let json = fs::read_to_string(path).map_err(|e| {
            StoreError::InvalidData(format!("failed to read {}: {e}", path.display()))
        })?;
        self.import_json_str(&json)
    }

    pub fn import_json_str(&self, json: &str) -> Result<usize> {
        let records =
            import_json(json).map_err(|e| StoreError::InvalidData(format!("invalid JSON: {e}")))?;
        self.save_days(&records)
    }

    pub fn export_json_file(&self, path: &Path) -> Result<usize> {
        let records = self.load_days()?;
        let json = export_json(&records)
            .map_err(|e| StoreError::InvalidData(format!("JSON export failed: {e}")))?;
        fs::write(path, json).map_err(|e| {
            StoreError::InvalidData(format!("failed to write {}: {e}", path.display()))
        })?;
        Ok(records.len())
    }

    /// Export every stored day as a pretty-printed JSON document.
    pub fn export_json_string(&self) -> Result<String> {
        let records = self.load_days()?;
        export_json(&records)
            .map_err(|e| StoreError::InvalidData(format!("JSON export failed: {e}")))
    }
}
