//! Append-only content-addressable file versioning store.
//!
//! `verstore` accepts a file at a logical path together with a free-text
//! info string and a semantic version tag, stores the content exactly once
//! per unique SHA-256 digest, and records an immutable version entry so any
//! historical version can later be retrieved, restored, or located via
//! exact, substring, full-text, or phonetic-fuzzy search.
//!
//! ## Storage layout
//!
//! ```text
//! root/
//! ├── index.sqlite3            # append-only catalog + FTS5 index
//! ├── a3f2e1d4c5.../           # one directory per unique content digest
//! │   └── report.txt[.gz]      # blob bytes (gzip when compression is on)
//! └── b7e145a3b2.../
//!     └── notes.md[.gz]
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use verstore::{FileStore, StoreOptions};
//!
//! let store = FileStore::new("versions", StoreOptions { compress: true });
//! store.open()?;
//!
//! store.add("docs/report.txt", "report for Smith", "1.0")?;
//! let latest = store.latest("docs/report.txt")?;
//! store.restore(&latest, "/tmp/recovered")?;
//!
//! // Phonetic search finds spelling variants of the indexed info words.
//! let hits = store.fuzzy_search("Smyth", 10)?;
//! assert!(!hits.is_empty());
//!
//! store.close()?;
//! # Ok::<(), verstore::StoreError>(())
//! ```
//!
//! The store is single-process and multi-thread safe: lifecycle changes go
//! through a readers-writer lock and catalog access is serialized on the
//! SQLite connection. All operations are synchronous and blocking.

pub mod blob;
pub mod catalog;
pub mod error;
pub mod phonetic;
pub mod search;
pub mod store;
pub mod timestamp;

mod fsutil;

pub use blob::BlobStore;
pub use catalog::{Catalog, FileVersion, VersionRecord};
pub use error::{Result, StoreError};
pub use search::escape_match_term;
pub use store::{FileStore, StoreOptions, INDEX_FILE};
