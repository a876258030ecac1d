//! In-memory content store
//!
//! The whole web root is walked and read once. After [`MemoryStore::load`]
//! returns, the map is never mutated, so lookups need no lock.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::{Instant, SystemTime};

use super::{check_root, ContentStore, FileRecord, StoreError, StoreKind};
use crate::path::{url_path_for, INDEX_FILE};

#[derive(Debug, Default)]
pub struct MemoryStore {
    records: HashMap<String, Arc<FileRecord>>,
    total_bytes: u64,
}

impl MemoryStore {
    /// Walk `root` and load every file into memory.
    ///
    /// Every record shares one `last_modified` timestamp: the moment the load
    /// started. Any unreadable entry aborts the whole load.
    pub fn load<P: AsRef<Path>>(root: P) -> Result<Self, StoreError> {
        let root = root.as_ref();
        check_root(root)?;

        let started = Instant::now();
        let loaded_at = SystemTime::now();
        let mut store = MemoryStore::default();

        store.load_dir(root, root, loaded_at)?;

        log::info!(
            "Loaded {} files ({} bytes) from {} in {:?}",
            store.records.len(),
            store.total_bytes,
            root.display(),
            started.elapsed()
        );
        Ok(store)
    }

    /// Build a store from prepared records, keyed by their `url_path`.
    pub fn from_records<I: IntoIterator<Item = FileRecord>>(records: I) -> Self {
        let mut store = MemoryStore::default();
        for record in records {
            store.insert(record);
        }
        store
    }

    fn load_dir(
        &mut self,
        root: &Path,
        dir: &Path,
        loaded_at: SystemTime,
    ) -> Result<(), StoreError> {
        let dir_key = url_path_for(root, dir, true)
            .ok_or_else(|| StoreError::OutsideRoot(dir.to_path_buf()))?;

        let index = dir.join(INDEX_FILE);
        if index.is_file() {
            let content = std::fs::read(&index).map_err(StoreError::io(&index))?;
            // Typed by the index file's name, registered under the directory
            let mut record = FileRecord::new(format!("{dir_key}{INDEX_FILE}"), content, loaded_at);
            record.url_path = dir_key;
            self.insert(record);
        }

        let entries = std::fs::read_dir(dir).map_err(StoreError::io(dir))?;
        for entry in entries {
            let entry = entry.map_err(StoreError::io(dir))?;
            let path = entry.path();
            let file_type = entry.file_type().map_err(StoreError::io(&path))?;

            if file_type.is_dir() {
                self.load_dir(root, &path, loaded_at)?;
                continue;
            }

            // Regular files and symlinks. A link to a directory fails the read.
            let key = url_path_for(root, &path, false)
                .ok_or_else(|| StoreError::OutsideRoot(path.clone()))?;
            let content = std::fs::read(&path).map_err(StoreError::io(&path))?;
            log::debug!("{} ({} bytes)", key, content.len());
            self.insert(FileRecord::new(key, content, loaded_at));
        }
        Ok(())
    }

    fn insert(&mut self, record: FileRecord) {
        self.total_bytes += record.len() as u64;
        let key = record.url_path.clone();
        if let Some(previous) = self.records.insert(key, Arc::new(record)) {
            log::warn!("Duplicate key {}, keeping the last file read", previous.url_path);
            self.total_bytes -= previous.len() as u64;
        }
    }

    pub fn get(&self, key: &str) -> Option<Arc<FileRecord>> {
        self.records.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Sum of all loaded bodies; directory index entries count twice.
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn lookup(&self, key: &str) -> Option<Arc<FileRecord>> {
        self.get(key)
    }

    fn kind(&self) -> StoreKind {
        StoreKind::Memory
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn site() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("index.html"), "<h1>Home</h1>").unwrap();
        fs::create_dir_all(dir.path().join("post")).unwrap();
        fs::write(dir.path().join("post/hello.html"), "<p>Hi</p>").unwrap();
        fs::create_dir_all(dir.path().join("about")).unwrap();
        fs::write(dir.path().join("about/index.html"), "<p>About</p>").unwrap();
        fs::write(dir.path().join("my notes.txt"), "plain").unwrap();
        dir
    }

    #[test]
    fn test_load_registers_files_and_directory_indexes() {
        let dir = site();
        let store = MemoryStore::load(dir.path()).unwrap();

        let mut keys: Vec<&str> = store.keys().collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            vec![
                "/",
                "/about/",
                "/about/index.html",
                "/index.html",
                "/my%20notes.txt",
                "/post/hello.html",
            ]
        );

        let home = store.get("/index.html").unwrap();
        assert_eq!(&home.content[..], b"<h1>Home</h1>");
        assert_eq!(home.content_type, "text/html; charset=utf-8");
        assert_eq!(store.get("/").unwrap().content, home.content);

        // No index.html under post/, so no directory record
        assert!(store.get("/post/").is_none());
    }

    #[test]
    fn test_load_uses_one_timestamp() {
        let dir = site();
        let store = MemoryStore::load(dir.path()).unwrap();
        let first = store.get("/index.html").unwrap().last_modified;
        assert!(store.keys().all(|k| store.get(k).unwrap().last_modified == first));
    }

    #[test]
    fn test_total_bytes() {
        let dir = site();
        let store = MemoryStore::load(dir.path()).unwrap();
        // 13 + 9 + 12 + 5, plus "/" and "/about/" duplicates (13 + 12)
        assert_eq!(store.total_bytes(), 13 + 9 + 12 + 5 + 13 + 12);
        assert_eq!(store.len(), 6);
    }

    #[test]
    fn test_empty_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::load(dir.path()).unwrap();
        assert!(store.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_dangling_symlink_aborts_load() {
        let dir = site();
        std::os::unix::fs::symlink(dir.path().join("gone.html"), dir.path().join("link.html"))
            .unwrap();
        let err = MemoryStore::load(dir.path()).unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
        assert!(err.to_string().contains("link.html"));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_file_is_read_through() {
        let dir = site();
        std::os::unix::fs::symlink(
            dir.path().join("post/hello.html"),
            dir.path().join("hello-link.html"),
        )
        .unwrap();
        let store = MemoryStore::load(dir.path()).unwrap();
        assert_eq!(&store.get("/hello-link.html").unwrap().content[..], b"<p>Hi</p>");
    }

    #[tokio::test]
    async fn test_lookup_through_trait() {
        let store: Arc<dyn ContentStore> = Arc::new(MemoryStore::from_records([FileRecord::new(
            "/feed.xml",
            "<?xml version=\"1.0\"?>",
            SystemTime::now(),
        )]));
        assert!(store.lookup("/feed.xml").await.is_some());
        assert!(store.lookup("/../feed.xml").await.is_none());
        assert_eq!(store.kind(), StoreKind::Memory);
    }
}
