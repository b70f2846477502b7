//! Blob storage.
//!
//! Reference tables, snapshot CSVs and exports all live in a key/value
//! blob store. Writes are whole-blob overwrites — a single PUT — so the
//! backing store only ever holds a complete old or complete new
//! snapshot, never a partial one.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing::debug;

pub trait BlobStore {
    /// Read a blob. A missing key is `None`, not an error.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Overwrite a blob in full.
    fn put(&self, key: &str, bytes: &[u8]) -> Result<()>;

    /// Keys under a prefix, sorted.
    fn list(&self, prefix: &str) -> Result<Vec<String>>;
}

// ── Local filesystem store ────────────────────────────────────────────────────

/// Blob store backed by a directory tree; keys are relative paths.
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn open(root: &Path) -> Result<Self> {
        fs::create_dir_all(root)
            .with_context(|| format!("Could not create store root {root:?}"))?;
        Ok(Self { root: root.to_path_buf() })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

impl BlobStore for LocalStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("read blob '{key}'")),
        }
    }

    fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Could not create dir {parent:?}"))?;
        }
        fs::write(&path, bytes).with_context(|| format!("write blob '{key}'"))?;
        debug!("PUT {} ({} bytes)", key, bytes.len());
        Ok(())
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut stack = vec![self.root.clone()];
        while let Some(dir) = stack.pop() {
            let entries = match fs::read_dir(&dir) {
                Ok(e) => e,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e).with_context(|| format!("list {dir:?}")),
            };
            for entry in entries {
                let path = entry?.path();
                if path.is_dir() {
                    stack.push(path);
                } else if let Ok(rel) = path.strip_prefix(&self.root) {
                    let key = rel.to_string_lossy().replace('\\', "/");
                    if key.starts_with(prefix) {
                        keys.push(key);
                    }
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}

// ── In-memory store ───────────────────────────────────────────────────────────

/// In-memory store for tests and dry runs.
#[derive(Default)]
pub struct MemoryStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlobStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.blobs.lock().unwrap().get(key).cloned())
    }

    fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        self.blobs.lock().unwrap().insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self
            .blobs
            .lock()
            .unwrap()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }
}

// ── Export ────────────────────────────────────────────────────────────────────

/// Publishes a finished export to the primary store (under the exports
/// prefix) and, byte-identical, to the mirror store (bare file name).
pub struct Exporter<'a> {
    primary: &'a dyn BlobStore,
    mirror: &'a dyn BlobStore,
    prefix: String,
}

impl<'a> Exporter<'a> {
    pub fn new(primary: &'a dyn BlobStore, mirror: &'a dyn BlobStore, prefix: &str) -> Self {
        Self {
            primary,
            mirror,
            prefix: prefix.trim_end_matches('/').to_string(),
        }
    }

    pub fn publish(&self, file_name: &str, bytes: &[u8]) -> Result<()> {
        self.primary
            .put(&format!("{}/{}", self.prefix, file_name), bytes)
            .with_context(|| format!("export '{file_name}' to primary"))?;
        self.mirror
            .put(file_name, bytes)
            .with_context(|| format!("export '{file_name}' to mirror"))?;
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();
        assert!(store.get("missing.csv").unwrap().is_none());
        store.put("a/b.csv", b"data").unwrap();
        assert_eq!(store.get("a/b.csv").unwrap().unwrap(), b"data");
        assert_eq!(store.list("a/").unwrap(), vec!["a/b.csv"]);
    }

    #[test]
    fn test_local_store_roundtrip() {
        let root = std::env::temp_dir().join(format!("jpstartup-store-{}", std::process::id()));
        let store = LocalStore::open(&root).unwrap();

        assert!(store.get("missing.csv").unwrap().is_none());
        store.put("exports/companies.csv", b"a,b\n1,2\n").unwrap();
        assert_eq!(
            store.get("exports/companies.csv").unwrap().unwrap(),
            b"a,b\n1,2\n"
        );
        assert_eq!(store.list("exports/").unwrap(), vec!["exports/companies.csv"]);

        // overwrite is a full replace
        store.put("exports/companies.csv", b"new").unwrap();
        assert_eq!(store.get("exports/companies.csv").unwrap().unwrap(), b"new");

        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn test_exporter_writes_primary_and_mirror() {
        let primary = MemoryStore::new();
        let mirror = MemoryStore::new();
        let exporter = Exporter::new(&primary, &mirror, "exports");
        exporter.publish("companies.csv", b"csv").unwrap();
        assert_eq!(primary.get("exports/companies.csv").unwrap().unwrap(), b"csv");
        assert_eq!(mirror.get("companies.csv").unwrap().unwrap(), b"csv");
    }
}
