//! Content store
//!
//! A [`ContentStore`] maps canonical URL paths (see [`crate::path`]) to
//! [`FileRecord`]s. Two implementations exist:
//!
//! - [`MemoryStore`]: the whole web root read into a `HashMap` once at
//!   startup, read-only afterwards, shared through `Arc` without locks.
//! - [`DiskStore`]: reads the file behind a key on every request. Kept as
//!   a fallback mode (`use_memory = false`) for very large trees or for
//!   previewing a site while it is being regenerated.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use memserve_core::store::{ContentStore, MemoryStore};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let store = MemoryStore::load("./public")?;
//! if let Some(record) = store.lookup("/index.html").await {
//!     println!("{} ({} bytes)", record.content_type, record.content.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod disk;
pub mod memory;
pub mod mime;

pub use disk::DiskStore;
pub use memory::MemoryStore;
pub use mime::detect_content_type;

use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::config::ContentConfig;

/// Errors raised while building a store. All of them are fatal at startup.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("web root is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("path escapes the web root: {}", .0.display())]
    OutsideRoot(PathBuf),
}

impl StoreError {
    pub(crate) fn io(path: &Path) -> impl FnOnce(std::io::Error) -> Self + '_ {
        move |source| StoreError::Io { path: path.to_path_buf(), source }
    }
}

/// One servable static asset
#[derive(Debug, Clone)]
pub struct FileRecord {
    pub url_path: String,
    pub content_type: String,
    pub content: Bytes,
    /// Load time for the memory store, filesystem mtime for the disk store
    pub last_modified: SystemTime,
}

impl FileRecord {
    /// Build a record, detecting the content type from the key and bytes.
    pub fn new(
        url_path: impl Into<String>,
        content: impl Into<Bytes>,
        last_modified: SystemTime,
    ) -> Self {
        let url_path = url_path.into();
        let content = content.into();
        let content_type = detect_content_type(&url_path, &content);
        Self { url_path, content_type, content, last_modified }
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Weak validator derived from the load timestamp and the length.
    pub fn etag(&self) -> String {
        let nanos = self.last_modified.duration_since(UNIX_EPOCH).unwrap_or_default().as_nanos();
        format!("W/\"{:x}-{:x}\"", nanos, self.content.len())
    }

    /// `last_modified` truncated to the one-second resolution of HTTP dates
    pub fn modified_seconds(&self) -> SystemTime {
        let secs = self.last_modified.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
        UNIX_EPOCH + Duration::from_secs(secs)
    }

    /// `Last-Modified` header value
    pub fn http_date(&self) -> String {
        httpdate::fmt_http_date(self.last_modified)
    }
}

/// Which strategy backs a store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Memory,
    Disk,
}

impl std::fmt::Display for StoreKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreKind::Memory => write!(f, "memory"),
            StoreKind::Disk => write!(f, "disk"),
        }
    }
}

/// Lookup of canonical URL paths
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Fetch the record registered at `key`, if any.
    async fn lookup(&self, key: &str) -> Option<Arc<FileRecord>>;

    fn kind(&self) -> StoreKind;
}

/// Open the store selected by `use_memory`.
///
/// The memory store walks and reads the whole web root before returning;
/// any error aborts.
pub fn open_store(config: &ContentConfig) -> Result<Arc<dyn ContentStore>, StoreError> {
    if config.use_memory {
        Ok(Arc::new(MemoryStore::load(&config.web_root)?))
    } else {
        Ok(Arc::new(DiskStore::new(&config.web_root)?))
    }
}

/// Ensure `root` exists and is a directory.
pub(crate) fn check_root(root: &Path) -> Result<(), StoreError> {
    let meta = std::fs::metadata(root).map_err(StoreError::io(root))?;
    if !meta.is_dir() {
        return Err(StoreError::NotADirectory(root.to_path_buf()));
    }
    Ok(())
}
