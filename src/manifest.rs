//! Persistent store for `ppt.json`.
//!
//! Every mutation is a whole-document read-modify-write performed while
//! holding an exclusive lock on `ppt.json.lock`. The document is written to a
//! temporary file in the same directory and renamed over the manifest, so an
//! interrupted write leaves the previous manifest intact.

use crate::error::{PptError, Result};
use crate::types::{Manifest, PackageRecord};
use fs4::fs_std::FileExt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Replaced,
    /// The name was taken and overwriting was not allowed; nothing changed.
    AlreadyExists,
}

#[derive(Debug, Clone)]
pub struct ManifestStore {
    path: PathBuf,
}

/// Held for the duration of a read-modify-write; released on drop.
struct ManifestLock {
    _file: fs::File,
}

impl ManifestStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True only when the manifest file is present and non-empty.
    pub fn exists(&self) -> bool {
        fs::metadata(&self.path)
            .map(|m| m.is_file() && m.len() > 0)
            .unwrap_or(false)
    }

    /// Load the manifest. A missing or empty file is an empty manifest; a file
    /// that does not parse is reported, never reset.
    pub fn load(&self) -> Result<Manifest> {
        if !self.exists() {
            return Ok(Manifest::default());
        }

        let content = fs::read_to_string(&self.path)
            .map_err(|e| PptError::io(format!("Could not read manifest at {}", self.path.display()), e))?;
        if content.trim().is_empty() {
            return Ok(Manifest::default());
        }

        Manifest::from_json(&content).map_err(|reason| PptError::ManifestCorrupt {
            path: self.path.clone(),
            reason,
        })
    }

    pub fn get(&self, name: &str) -> Result<Option<PackageRecord>> {
        Ok(self.load()?.get(name).cloned())
    }

    pub fn upsert(&self, record: PackageRecord, allow_overwrite: bool) -> Result<UpsertOutcome> {
        if let Some(field) = record.first_empty_field() {
            return Err(PptError::InvalidRecord {
                name: record.name,
                field,
            });
        }

        let _lock = self.lock()?;
        let mut manifest = self.load()?;

        if manifest.contains(&record.name) && !allow_overwrite {
            tracing::warn!("Package '{}' already exists. Skipping.", record.name);
            return Ok(UpsertOutcome::AlreadyExists);
        }

        let name = record.name.clone();
        let outcome = match manifest.insert(record) {
            Some(_) => UpsertOutcome::Replaced,
            None => UpsertOutcome::Inserted,
        };
        self.save(&manifest)?;
        tracing::debug!("Recorded '{}' in {} ({:?})", name, self.path.display(), outcome);
        Ok(outcome)
    }

    /// Remove `name`, returning its record. The file is left untouched when
    /// the name is not present.
    pub fn remove(&self, name: &str) -> Result<Option<PackageRecord>> {
        if !self.exists() {
            return Ok(None);
        }

        let _lock = self.lock()?;
        let mut manifest = self.load()?;
        let removed = manifest.remove(name);
        if removed.is_some() {
            self.save(&manifest)?;
        }
        Ok(removed)
    }

    fn lock(&self) -> Result<ManifestLock> {
        let parent = self.parent_dir();
        fs::create_dir_all(parent)
            .map_err(|e| PptError::io(format!("Could not create {}", parent.display()), e))?;

        let lock_path = self.lock_path();
        let file = fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| PptError::io(format!("Could not open lock file {}", lock_path.display()), e))?;
        file.lock_exclusive()
            .map_err(|e| PptError::io(format!("Could not lock {}", lock_path.display()), e))?;
        Ok(ManifestLock { _file: file })
    }

    fn save(&self, manifest: &Manifest) -> Result<()> {
        let parent = self.parent_dir();
        let content = manifest.to_json().map_err(|e| PptError::ManifestCorrupt {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;

        let write_err = |e| PptError::io(format!("Could not write manifest at {}", self.path.display()), e);
        let mut temp = NamedTempFile::new_in(parent).map_err(write_err)?;
        temp.write_all(content.as_bytes()).map_err(write_err)?;
        temp.write_all(b"\n").map_err(write_err)?;
        temp.as_file().sync_all().map_err(write_err)?;
        temp.persist(&self.path).map_err(|e| write_err(e.error))?;
        Ok(())
    }

    fn parent_dir(&self) -> &Path {
        match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        }
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".lock");
        self.parent_dir().join(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(name: &str, version: &str) -> PackageRecord {
        PackageRecord {
            name: name.to_string(),
            owner: "acme".to_string(),
            repo: name.to_string(),
            version: version.to_string(),
            source_url: format!("https://github.com/acme/{}/", name),
            asset_filename: format!("{}.tar.gz", name),
            install_dir: None,
            installed_at: None,
        }
    }

    fn store() -> (TempDir, ManifestStore) {
        let dir = TempDir::new().unwrap();
        let store = ManifestStore::new(dir.path().join("ppt").join("ppt.json"));
        (dir, store)
    }

    #[test]
    fn test_missing_and_empty_manifest_are_absent() {
        let (_dir, store) = store();
        assert!(!store.exists());
        assert!(store.load().unwrap().is_empty());

        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), "").unwrap();
        assert!(!store.exists());
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_manifest_created_lazily_on_first_upsert() {
        let (_dir, store) = store();
        assert!(!store.path().parent().unwrap().exists());

        let outcome = store.upsert(record("tool", "v1.0.0"), false).unwrap();

        assert_eq!(outcome, UpsertOutcome::Inserted);
        assert!(store.exists());
        assert_eq!(store.get("tool").unwrap().unwrap().version, "v1.0.0");
    }

    #[test]
    fn test_corrupt_manifest_is_reported_not_reset() {
        let (_dir, store) = store();
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), "{ not json").unwrap();

        assert!(matches!(store.load(), Err(PptError::ManifestCorrupt { .. })));
        assert!(matches!(
            store.upsert(record("tool", "v1.0.0"), false),
            Err(PptError::ManifestCorrupt { .. })
        ));
        assert_eq!(fs::read_to_string(store.path()).unwrap(), "{ not json");
    }

    #[test]
    fn test_upsert_without_overwrite_keeps_first_record() {
        let (_dir, store) = store();
        store.upsert(record("tool", "v1.0.0"), false).unwrap();
        let before = fs::read_to_string(store.path()).unwrap();

        let outcome = store.upsert(record("tool", "v9.9.9"), false).unwrap();

        assert_eq!(outcome, UpsertOutcome::AlreadyExists);
        assert_eq!(store.get("tool").unwrap().unwrap().version, "v1.0.0");
        assert_eq!(fs::read_to_string(store.path()).unwrap(), before);
    }

    #[test]
    fn test_upsert_with_overwrite_replaces_record() {
        let (_dir, store) = store();
        store.upsert(record("tool", "v1.0.0"), false).unwrap();

        let outcome = store.upsert(record("tool", "v2.0.0"), true).unwrap();

        assert_eq!(outcome, UpsertOutcome::Replaced);
        let manifest = store.load().unwrap();
        assert_eq!(manifest.len(), 1);
        assert_eq!(manifest.get("tool").unwrap().version, "v2.0.0");
    }

    #[test]
    fn test_upsert_rejects_empty_fields() {
        let (_dir, store) = store();
        let mut bad = record("tool", "v1.0.0");
        bad.owner.clear();

        let err = store.upsert(bad, false).unwrap_err();
        assert!(matches!(err, PptError::InvalidRecord { field: "owner", .. }));
        assert!(!store.exists());
    }

    #[test]
    fn test_remove_only_named_entry() {
        let (_dir, store) = store();
        store.upsert(record("a", "1.0.0"), false).unwrap();
        store.upsert(record("b", "2.0.0"), false).unwrap();
        store.upsert(record("c", "3.0.0"), false).unwrap();
        let before = store.load().unwrap();

        let removed = store.remove("b").unwrap().unwrap();

        assert_eq!(removed.version, "2.0.0");
        let after = store.load().unwrap();
        assert_eq!(after.len(), 2);
        assert_eq!(after.get("a"), before.get("a"));
        assert_eq!(after.get("c"), before.get("c"));
    }

    #[test]
    fn test_remove_missing_leaves_file_untouched() {
        let (_dir, store) = store();
        assert_eq!(store.remove("ghost").unwrap(), None);
        assert!(!store.path().exists());

        store.upsert(record("tool", "v1.0.0"), false).unwrap();
        let before = fs::read(store.path()).unwrap();
        let modified = fs::metadata(store.path()).unwrap().modified().unwrap();

        assert_eq!(store.remove("ghost").unwrap(), None);
        assert_eq!(fs::read(store.path()).unwrap(), before);
        assert_eq!(fs::metadata(store.path()).unwrap().modified().unwrap(), modified);
    }

    #[test]
    fn test_round_trip_of_many_records() {
        let (_dir, store) = store();
        for i in 0..25 {
            store.upsert(record(&format!("tool{}", i), &format!("1.{}.0", i)), false).unwrap();
        }

        let reloaded = ManifestStore::new(store.path()).load().unwrap();
        assert_eq!(reloaded.len(), 25);
        for i in 0..25 {
            let name = format!("tool{}", i);
            assert_eq!(reloaded.get(&name), Some(&record(&name, &format!("1.{}.0", i))));
        }
    }

    #[test]
    fn test_written_manifest_is_pretty_printed() {
        let (_dir, store) = store();
        store.upsert(record("tool", "v1.0.0"), false).unwrap();
        let content = fs::read_to_string(store.path()).unwrap();
        assert!(content.starts_with("{\n"));
        assert!(content.contains("  \"tool\": {"));
        assert!(!store.path().with_extension("json.tmp").exists());
    }
}
