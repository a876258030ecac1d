//! Disk pass-through store
//!
//! Reads the file behind a key on every lookup. Records carry the file's
//! mtime, so validators change when the site is rebuilt.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use super::{check_root, ContentStore, FileRecord, StoreKind, StoreError};
use crate::path::key_to_relative;

#[derive(Debug, Clone)]
pub struct DiskStore {
    root: PathBuf,
}

impl DiskStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self, StoreError> {
        let root = root.as_ref();
        check_root(root)?;
        log::info!("Serving {} from disk", root.display());
        Ok(Self { root: root.to_path_buf() })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn read(&self, key: &str) -> std::io::Result<Option<FileRecord>> {
        let Some(relative) = key_to_relative(key) else {
            return Ok(None);
        };
        let path = self.root.join(relative);
        let meta = tokio::fs::metadata(&path).await?;
        if !meta.is_file() {
            return Ok(None);
        }
        let content = tokio::fs::read(&path).await?;
        let modified = meta.modified().unwrap_or_else(|_| SystemTime::now());
        Ok(Some(FileRecord::new(key, content, modified)))
    }
}

#[async_trait]
impl ContentStore for DiskStore {
    async fn lookup(&self, key: &str) -> Option<Arc<FileRecord>> {
        match self.read(key).await {
            Ok(record) => record.map(Arc::new),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                log::warn!("Failed to read {} from disk: {}", key, e);
                None
            }
        }
    }

    fn kind(&self) -> StoreKind {
        StoreKind::Disk
    }
}
