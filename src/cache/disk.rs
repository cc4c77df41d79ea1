//! Optional on-disk copy of modeldef payloads, reused across sessions.

use crate::{Error, Result};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

const FORMAT_VERSION: u32 = 1;
const DEFAULT_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    timestamp: DateTime<Utc>,
    version: u32,
    data: Value,
}

#[derive(Debug, Clone)]
pub struct DiskCache {
    dir: PathBuf,
    base_url: String,
    max_age: Duration,
}

impl DiskCache {
    pub fn new(dir: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            base_url: base_url.into(),
            max_age: DEFAULT_MAX_AGE,
        }
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File for a `controller.class` key. Scoped by base URL so test and
    /// production servers never share entries.
    pub fn path_for(&self, key: &str) -> PathBuf {
        let mut hasher = Sha256::new();
        hasher.update(self.base_url.as_bytes());
        hasher.update(key.as_bytes());
        let hash: String = hasher
            .finalize()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect();
        self.dir.join(format!("predicates-{}.json", &hash[..16]))
    }

    /// Fresh modeldef `data` for `key`, if present. Unreadable, stale or
    /// foreign-version files count as misses.
    pub fn load(&self, key: &str) -> Option<Value> {
        self.load_at(key, Utc::now())
    }

    fn load_at(&self, key: &str, now: DateTime<Utc>) -> Option<Value> {
        let path = self.path_for(key);
        let raw = fs::read(&path).ok()?;
        let file: CacheFile = match serde_json::from_slice(&raw) {
            Ok(file) => file,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Ignoring unreadable predicate cache");
                return None;
            }
        };
        if file.version != FORMAT_VERSION {
            return None;
        }
        let max_age = ChronoDuration::from_std(self.max_age).ok()?;
        if now.signed_duration_since(file.timestamp) > max_age {
            debug!(path = %path.display(), "Predicate cache expired");
            return None;
        }
        Some(file.data)
    }

    /// Persist `data` atomically via a temporary file and rename.
    pub fn store(&self, key: &str, data: &Value) -> Result<()> {
        self.store_at(key, data, Utc::now())
    }

    fn store_at(&self, key: &str, data: &Value, now: DateTime<Utc>) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        let file = CacheFile {
            timestamp: now,
            version: FORMAT_VERSION,
            data: data.clone(),
        };
        let tmp = self
            .dir
            .join(format!(".predicates-{}.tmp", uuid::Uuid::new_v4()));
        fs::write(&tmp, serde_json::to_vec(&file)?)?;
        if let Err(e) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(Error::Io(e));
        }
        debug!(path = %path.display(), "Stored predicate cache");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn store_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path(), "https://www.space-track.org/");
        let data = json!([{"Field": "NORAD_CAT_ID", "Type": "int(10)"}]);

        assert!(cache.load("basicspacedata.gp").is_none());
        cache.store("basicspacedata.gp", &data).unwrap();
        assert_eq!(cache.load("basicspacedata.gp"), Some(data));

        let name = cache.path_for("basicspacedata.gp");
        let name = name.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("predicates-") && name.ends_with(".json"));
        assert_eq!(name.len(), "predicates-".len() + 16 + ".json".len());
    }

    #[test]
    fn entries_are_scoped_by_base_url() {
        let dir = tempfile::tempdir().unwrap();
        let prod = DiskCache::new(dir.path(), "https://www.space-track.org/");
        let test = DiskCache::new(dir.path(), "https://for-testing-only.space-track.org/");
        prod.store("basicspacedata.gp", &json!([])).unwrap();
        assert!(test.load("basicspacedata.gp").is_none());
    }

    #[test]
    fn stale_and_corrupt_files_are_misses() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path(), "https://example.test/");
        let then = Utc::now() - ChronoDuration::days(2);
        cache.store_at("a.b", &json!([]), then).unwrap();
        assert!(cache.load("a.b").is_none());

        fs::write(cache.path_for("c.d"), b"{not json").unwrap();
        assert!(cache.load("c.d").is_none());

        let wrong = json!({"timestamp": Utc::now(), "version": 2, "data": []});
        fs::write(cache.path_for("e.f"), serde_json::to_vec(&wrong).unwrap()).unwrap();
        assert!(cache.load("e.f").is_none());
    }

    #[test]
    fn no_temp_files_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path(), "https://example.test/");
        cache.store("a.b", &json!([1])).unwrap();
        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names.len(), 1);
    }
}
