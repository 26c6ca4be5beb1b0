//! Validated-dataset cache keyed by upload content.
//!
//! Identical uploads hash to the same key, so parsing and validation run once
//! per distinct file. Derived views are not cached; callers recompute them
//! from the returned [`Dataset`]. The cache is an ordinary value owned by its
//! caller and only changes through the methods below.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::analyzers::types::Dataset;
use crate::analyzers::validate;
use crate::config::ColumnConfig;
use crate::error::Result;
use crate::ingest::parse_table;

#[derive(Debug, Default)]
pub struct DatasetCache {
    entries: HashMap<String, Arc<Dataset>>,
}

impl DatasetCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lowercase hex SHA-256 of the uploaded bytes.
    pub fn content_key(bytes: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        format!("{:x}", hasher.finalize())
    }

    /// Returns the dataset for `bytes`, decoding and validating on a miss.
    ///
    /// Failed loads are not cached.
    pub fn get_or_load(&mut self, bytes: &[u8], columns: &ColumnConfig) -> Result<Arc<Dataset>> {
        let key = Self::content_key(bytes);
        if let Some(dataset) = self.entries.get(&key) {
            debug!(key = %key, "Dataset cache hit");
            return Ok(Arc::clone(dataset));
        }

        debug!(key = %key, "Dataset cache miss");
        let table = parse_table(bytes)?;
        let dataset = Arc::new(validate(&table, columns)?);
        self.entries.insert(key, Arc::clone(&dataset));
        Ok(dataset)
    }

    pub fn get(&self, key: &str) -> Option<Arc<Dataset>> {
        self.entries.get(key).cloned()
    }

    /// Drops one entry. Returns whether it was present.
    pub fn invalidate(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHEET: &[u8] = "姓名,日期,总分\n张三,2024-01-01,80\n李四,2024-01-01,90\n".as_bytes();

    #[test]
    fn test_content_key_is_sha256_hex() {
        assert_eq!(
            DatasetCache::content_key(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_identical_bytes_hit() {
        let mut cache = DatasetCache::new();
        let columns = ColumnConfig::default();

        let first = cache.get_or_load(SHEET, &columns).unwrap();
        let second = cache.get_or_load(SHEET, &columns).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_invalidate_forces_reload() {
        let mut cache = DatasetCache::new();
        let columns = ColumnConfig::default();
        let key = DatasetCache::content_key(SHEET);

        let first = cache.get_or_load(SHEET, &columns).unwrap();
        assert!(cache.invalidate(&key));
        assert!(!cache.invalidate(&key));
        assert!(cache.get(&key).is_none());

        let second = cache.get_or_load(SHEET, &columns).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(*first, *second);
    }

    #[test]
    fn test_failed_load_is_not_cached() {
        let mut cache = DatasetCache::new();
        let result = cache.get_or_load(b"name,score\nA,1\n", &ColumnConfig::default());
        assert!(result.is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_clear() {
        let mut cache = DatasetCache::new();
        cache.get_or_load(SHEET, &ColumnConfig::default()).unwrap();
        cache.clear();
        assert!(cache.is_empty());
    }
}
