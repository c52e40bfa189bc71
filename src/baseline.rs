use crate::error::Error;
use crate::model::BaselineEntry;
use ahash::AHashMap;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Expected file states keyed by path relative to the primary scan root.
/// Loaded once per session and read-only during the scan, so it is shared
/// across workers without locking.
///
/// Keying by relative path makes overlapping baseline entries structurally
/// impossible; the manifest loader rejects duplicate keys instead of
/// guessing which entry wins.
#[derive(Debug, Default, Clone)]
pub struct Baseline {
    entries: AHashMap<PathBuf, BaselineEntry>,
}

#[derive(Debug, Deserialize)]
struct ManifestRow {
    path: String,
    size: u64,
    #[serde(default)]
    hash: Option<String>,
    #[serde(default)]
    version: Option<String>,
}

impl Baseline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, rel_path: PathBuf, entry: BaselineEntry) -> Result<(), Error> {
        if self.entries.contains_key(&rel_path) {
            return Err(Error::Baseline(format!(
                "duplicate manifest entry for '{}'",
                rel_path.display()
            )));
        }
        self.entries.insert(rel_path, entry);
        Ok(())
    }

    pub fn get(&self, rel_path: &Path) -> Option<&BaselineEntry> {
        self.entries.get(rel_path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PathBuf, &BaselineEntry)> {
        self.entries.iter()
    }

    /// Loads a CSV manifest with a `path,size,hash,version` header. Empty
    /// hash/version cells mean "not tracked". Duplicate paths are an error.
    pub fn from_csv(manifest: &Path) -> Result<Self, Error> {
        let mut reader = csv::Reader::from_path(manifest)?;
        let mut baseline = Self::new();

        for row in reader.deserialize::<ManifestRow>() {
            let row = row?;
            let hash = row.hash.filter(|h| !h.is_empty());
            let version = row.version.filter(|v| !v.is_empty());
            baseline.insert(
                PathBuf::from(row.path),
                BaselineEntry {
                    size: row.size,
                    hash,
                    version,
                },
            )?;
        }

        Ok(baseline)
    }
}
