//! Store lifecycle and public API surface.
//!
//! A [`FileStore`] starts **Closed**; [`open`](FileStore::open) brings it
//! **Open** (root directory ensured, catalog schema ready) and
//! [`close`](FileStore::close) returns it to **Closed**, releasing the
//! database connection. Every other operation fails with
//! [`StoreError::NotOpen`] while closed.
//!
//! The lifecycle is guarded by a readers-writer lock; catalog access below
//! it is serialized by the catalog's own connection lock. All operations
//! are synchronous and blocking; none spawn background work.

use crate::blob::BlobStore;
use crate::catalog::{Catalog, FileVersion, VersionRecord};
use crate::error::{Result, StoreError};
use crate::fsutil::ensure_dir;
use chrono::NaiveDateTime;
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use tracing::info;

/// Name of the catalog database file inside the store root.
pub const INDEX_FILE: &str = "index.sqlite3";

/// Store-wide configuration, immutable for the store's lifetime.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreOptions {
    /// Compress blob content with gzip on write, decompress on restore.
    pub compress: bool,
}

/// A local, append-only content-addressable file versioning store.
///
/// ```no_run
/// use verstore::{FileStore, StoreOptions};
///
/// let store = FileStore::new("versions", StoreOptions::default());
/// store.open()?;
/// let record = store.add("notes/report.txt", "quarterly report", "1.0")?;
/// let latest = store.latest("notes/report.txt")?;
/// assert_eq!(latest.id, record.version_id);
/// store.close()?;
/// # Ok::<(), verstore::StoreError>(())
/// ```
pub struct FileStore {
    root: PathBuf,
    options: StoreOptions,
    catalog: RwLock<Option<Catalog>>,
}

impl FileStore {
    /// Create a store handle for the given root directory. Nothing touches
    /// the filesystem until [`open`](FileStore::open). An empty root falls
    /// back to `versions`.
    pub fn new(root: impl Into<PathBuf>, options: StoreOptions) -> Self {
        let root = root.into();
        let root = if root.as_os_str().is_empty() {
            PathBuf::from("versions")
        } else {
            root
        };
        Self {
            root,
            options,
            catalog: RwLock::new(None),
        }
    }

    /// The store root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_open(&self) -> bool {
        self.catalog.read().is_some()
    }

    /// Open the store: create the root directory if absent, open or create
    /// the catalog, ensure the schema. Opening an already-open store is a
    /// no-op; opening an already-initialized root alters no existing data.
    pub fn open(&self) -> Result<()> {
        let mut guard = self.catalog.write();
        if guard.is_some() {
            return Ok(());
        }
        ensure_dir(&self.root)?;
        let blobs = BlobStore::new(self.root.clone(), self.options.compress);
        let catalog = Catalog::open(&self.root.join(INDEX_FILE), blobs)?;
        *guard = Some(catalog);
        info!(
            root = %self.root.display(),
            compress = self.options.compress,
            "filestore opened"
        );
        Ok(())
    }

    /// Close the store and release the catalog connection.
    pub fn close(&self) -> Result<()> {
        let mut guard = self.catalog.write();
        match guard.take() {
            Some(catalog) => {
                catalog.close()?;
                info!(root = %self.root.display(), "filestore closed");
                Ok(())
            }
            None => Err(StoreError::NotOpen),
        }
    }

    fn with_catalog<T>(&self, f: impl FnOnce(&Catalog) -> Result<T>) -> Result<T> {
        let guard = self.catalog.read();
        match guard.as_ref() {
            Some(catalog) => f(catalog),
            None => Err(StoreError::NotOpen),
        }
    }

    /// Add a version of the file at `path` with the given free-text info
    /// string and semantic version tag.
    ///
    /// The content digest is computed first (proportional to file size);
    /// content already stored under the same digest is not written again —
    /// the new version row references the existing blob.
    pub fn add(&self, path: impl AsRef<Path>, info: &str, version: &str) -> Result<VersionRecord> {
        let path = path.as_ref();
        self.with_catalog(|catalog| {
            let checksum = BlobStore::checksum(path)
                .map_err(|e| match e {
                    StoreError::IoDetailed { message, path } => StoreError::IoDetailed {
                        message: format!("checksum failed: {}", message),
                        path,
                    },
                    other => other,
                })?;
            catalog.add_version(path, info, version, &checksum)
        })
    }

    /// Streaming SHA-256 digest of an arbitrary file, hex encoded.
    pub fn checksum(&self, path: impl AsRef<Path>) -> Result<String> {
        BlobStore::checksum(path.as_ref())
    }

    /// True if at least one version of `path` exists. False when the store
    /// is closed.
    pub fn has(&self, path: impl AsRef<Path>) -> bool {
        self.catalog
            .read()
            .as_ref()
            .is_some_and(|catalog| catalog.has(path.as_ref()))
    }

    /// The latest version of `path`, or `NotFound`.
    pub fn latest(&self, path: impl AsRef<Path>) -> Result<FileVersion> {
        self.with_catalog(|catalog| catalog.latest(path.as_ref()))
    }

    /// All versions of `path`, newest first, up to `limit`.
    pub fn history(&self, path: impl AsRef<Path>, limit: u32) -> Result<Vec<FileVersion>> {
        self.with_catalog(|catalog| catalog.history(path.as_ref(), limit))
    }

    /// Versions of `path` stamped strictly after `after`, newest first.
    pub fn history_since(
        &self,
        path: impl AsRef<Path>,
        after: NaiveDateTime,
        limit: u32,
    ) -> Result<Vec<FileVersion>> {
        self.with_catalog(|catalog| catalog.history_since(path.as_ref(), after, limit))
    }

    /// Restore a version's content into `dest_dir`, overwriting any file
    /// with the same base name there.
    pub fn restore(&self, version: &FileVersion, dest_dir: impl AsRef<Path>) -> Result<()> {
        self.with_catalog(|catalog| {
            catalog
                .blobs()
                .restore(&version.local, dest_dir.as_ref(), &version.name)
                .map(|_| ())
        })
    }

    /// Restore a version into the original source location it was added
    /// from, overwriting the file there.
    pub fn restore_at_source(&self, version: &FileVersion) -> Result<()> {
        let dest_dir = match version.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        self.restore(version, dest_dir)
    }

    /// Substring OR-search over info and version fields; oldest first.
    pub fn simple_search(&self, words: &[&str], limit: u32) -> Result<Vec<FileVersion>> {
        self.with_catalog(|catalog| catalog.simple_search(words, limit))
    }

    /// FTS5 search of the raw term over info, version and date; newest
    /// first. The term is not escaped — see
    /// [`escape_match_term`](crate::escape_match_term).
    pub fn full_text_search(&self, term: &str, limit: u32) -> Result<Vec<FileVersion>> {
        self.with_catalog(|catalog| catalog.full_text_search(term, limit))
    }

    /// FTS5 search against the phonetic encoding of the info field, so the
    /// query tolerates spelling variants; newest first.
    pub fn fuzzy_search(&self, term: &str, limit: u32) -> Result<Vec<FileVersion>> {
        self.with_catalog(|catalog| catalog.fuzzy_search(term, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_root_falls_back_to_default() {
        let store = FileStore::new("", StoreOptions::default());
        assert_eq!(store.root(), Path::new("versions"));
    }

    #[test]
    fn test_operations_fail_while_closed() {
        let store = FileStore::new("/tmp/never-opened", StoreOptions::default());
        assert!(!store.is_open());
        assert!(matches!(
            store.latest("x.txt").unwrap_err(),
            StoreError::NotOpen
        ));
        assert!(matches!(
            store.history("x.txt", 10).unwrap_err(),
            StoreError::NotOpen
        ));
        assert!(matches!(
            store.simple_search(&["x"], 10).unwrap_err(),
            StoreError::NotOpen
        ));
        assert!(matches!(store.close().unwrap_err(), StoreError::NotOpen));
        assert!(!store.has("x.txt"));
    }
}
