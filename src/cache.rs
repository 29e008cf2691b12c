//! Incremental compile cache.
//!
//! One JSON entry per document id. An entry is fresh when the hash of
//! `(id, source, options fingerprint)` matches and every recorded dependency
//! still hashes to what it did when the entry was written.

use indexmap::IndexMap;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

use crate::compile::{CompileResult, SourceReader};
use crate::error::CacheError;

const MISSING_DEPENDENCY: &str = "missing";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub hash: String,
    /// Dependency id -> content hash at write time.
    #[serde(default)]
    pub dependency_hashes: IndexMap<String, String>,
    pub result: CompileResult,
}

pub struct IncrementalCache {
    cache_dir: PathBuf,
}

impl IncrementalCache {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let cache_dir = cache_dir.into();
        fs::create_dir_all(&cache_dir)?;
        Ok(Self { cache_dir })
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn compute_hash(parts: &[&str]) -> String {
        let mut hasher = Sha256::new();
        for part in parts {
            hasher.update((part.len() as u64).to_le_bytes());
            hasher.update(part.as_bytes());
        }
        format!("{:x}", hasher.finalize())
    }

    /// Hash of any serializable option set, for use as a fingerprint.
    pub fn fingerprint<T: Serialize>(options: &T) -> String {
        let json = serde_json::to_string(options).unwrap_or_default();
        Self::compute_hash(&[&json])
    }

    fn get_cache_path(&self, id: &str) -> PathBuf {
        let safe_name = id.replace(['/', '\\', ':'], "_");
        self.cache_dir.join(format!("{}.json", safe_name))
    }

    fn dependency_hash(reader: &dyn SourceReader, id: &str) -> String {
        match reader.read_source(id) {
            Ok(source) => Self::compute_hash(&[&source]),
            Err(_) => MISSING_DEPENDENCY.to_string(),
        }
    }

    fn load(&self, path: &Path) -> Result<CacheEntry, CacheError> {
        let data = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    pub fn get(
        &self,
        id: &str,
        source: &str,
        fingerprint: &str,
        reader: &dyn SourceReader,
    ) -> Option<CompileResult> {
        let cache_path = self.get_cache_path(id);
        if !cache_path.exists() {
            return None;
        }

        let entry = match self.load(&cache_path) {
            Ok(entry) => entry,
            Err(CacheError::Json(e)) => {
                warn!("[wxml] corrupt cache entry for {}: {}", id, e);
                fs::remove_file(&cache_path).ok();
                return None;
            }
            Err(e) => {
                debug!("[wxml] cache read failed for {}: {}", id, e);
                return None;
            }
        };

        if entry.hash != Self::compute_hash(&[id, source, fingerprint]) {
            return None;
        }

        let stale = entry
            .dependency_hashes
            .iter()
            .find(|(dep, hash)| Self::dependency_hash(reader, dep) != **hash);
        if let Some((dep, _)) = stale {
            debug!("[wxml] cache for {} is stale: {} changed", id, dep);
            return None;
        }

        debug!("[wxml] cache hit for {}", id);
        Some(entry.result)
    }

    pub fn set(
        &self,
        id: &str,
        source: &str,
        fingerprint: &str,
        result: &CompileResult,
        reader: &dyn SourceReader,
    ) -> Result<(), CacheError> {
        let dependency_hashes = result
            .dependencies
            .iter()
            .map(|dep| (dep.clone(), Self::dependency_hash(reader, dep)))
            .collect();
        let entry = CacheEntry {
            hash: Self::compute_hash(&[id, source, fingerprint]),
            dependency_hashes,
            result: result.clone(),
        };

        let data = serde_json::to_string(&entry)?;
        fs::write(self.get_cache_path(id), data)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::MemoryReader;
    use tempfile::TempDir;

    fn result(deps: &[&str]) -> CompileResult {
        CompileResult {
            code: "export default render;".to_string(),
            dependencies: deps.iter().map(|d| d.to_string()).collect(),
            warnings: Vec::new(),
        }
    }

    #[test]
    fn test_hash_is_stable_and_separated() {
        assert_eq!(
            IncrementalCache::compute_hash(&["a", "b"]),
            IncrementalCache::compute_hash(&["a", "b"])
        );
        assert_ne!(
            IncrementalCache::compute_hash(&["ab", ""]),
            IncrementalCache::compute_hash(&["a", "b"])
        );
    }

    #[test]
    fn test_round_trip_and_source_change() {
        let dir = TempDir::new().unwrap();
        let cache = IncrementalCache::new(dir.path().join("cache")).unwrap();
        let reader = MemoryReader::new();

        cache
            .set("/src/a.wxml", "<view/>", "fp", &result(&[]), &reader)
            .unwrap();
        assert_eq!(
            cache.get("/src/a.wxml", "<view/>", "fp", &reader),
            Some(result(&[]))
        );
        assert!(cache.get("/src/a.wxml", "<text/>", "fp", &reader).is_none());
        assert!(cache.get("/src/a.wxml", "<view/>", "other", &reader).is_none());
    }

    #[test]
    fn test_dependency_change_invalidates() {
        let dir = TempDir::new().unwrap();
        let cache = IncrementalCache::new(dir.path()).unwrap();
        let before = MemoryReader::new().with_source("/src/b.wxml", "<view/>");
        let after = MemoryReader::new().with_source("/src/b.wxml", "<text/>");

        cache
            .set("/src/a.wxml", "src", "fp", &result(&["/src/b.wxml"]), &before)
            .unwrap();
        assert!(cache.get("/src/a.wxml", "src", "fp", &before).is_some());
        assert!(cache.get("/src/a.wxml", "src", "fp", &after).is_none());
    }

    #[test]
    fn test_corrupt_entry_removed() {
        let dir = TempDir::new().unwrap();
        let cache = IncrementalCache::new(dir.path()).unwrap();
        let path = cache.get_cache_path("/src/a.wxml");
        fs::write(&path, "{ not json").unwrap();

        assert!(cache
            .get("/src/a.wxml", "src", "fp", &MemoryReader::new())
            .is_none());
        assert!(!path.exists());
    }
}
