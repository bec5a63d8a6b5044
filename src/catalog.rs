//! Append-only version catalog backed by SQLite.
//!
//! The catalog owns the relational record of logical-path versions and the
//! content blobs they reference:
//!
//! - `Files(file_id, checksum)` — one row per distinct content digest,
//!   backed by a unique index on `checksum`.
//! - `Versions(version_id, path, info, fuzzy, version, date, file)` — one
//!   immutable row per [`add_version`](Catalog::add_version) call.
//! - `VersionsFts` — external-content FTS5 index mirroring `info`, `fuzzy`,
//!   `version` and `date`, populated in the same transaction as each
//!   version insert.
//!
//! Rows are only ever appended. Deduplication happens here: a version
//! whose digest is already cataloged reuses the existing blob row, and the
//! blob store is only asked to materialize content for digests never seen
//! before.

use crate::blob::BlobStore;
use crate::error::{Result, StoreError};
use crate::fsutil::{from_slash, to_slash};
use crate::{phonetic, timestamp};
use chrono::NaiveDateTime;
use parking_lot::{Mutex, MutexGuard};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Identity and timestamp of a freshly appended version row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VersionRecord {
    pub version_id: i64,
    pub file_id: i64,
    pub created: NaiveDateTime,
}

/// A particular version of a file, resolved for the caller.
///
/// Not persisted in this shape; constructed on read by joining a version
/// row with its blob row and deriving the on-disk blob location.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileVersion {
    /// Catalog identity of the version row.
    pub id: i64,
    /// Base name of the file, including any suffix.
    pub name: String,
    /// The path from which the version was sourced (platform separators).
    pub path: PathBuf,
    /// Location of the blob content inside the store.
    pub local: PathBuf,
    /// Free-text info string given at add time.
    pub info: String,
    /// Phonetic encoding of the info string, computed once at add time.
    pub fuzzy: String,
    /// Semantic version tag.
    pub version: String,
    /// When this version was added.
    pub from: NaiveDateTime,
    /// Hex SHA-256 digest of the file content.
    pub checksum: String,
}

/// A version row as stored, before timestamp decoding and path resolution.
pub(crate) struct RawVersion {
    pub id: i64,
    pub path: String,
    pub info: String,
    pub fuzzy: String,
    pub version: String,
    pub date: String,
    pub checksum: String,
}

pub(crate) const VERSION_COLUMNS: &str = "Versions.version_id, Versions.path, Versions.info, \
     Versions.fuzzy, Versions.version, Versions.date, Files.checksum";

const SCHEMA: &str = "\
CREATE TABLE IF NOT EXISTS Files (
    file_id INTEGER PRIMARY KEY,
    checksum TEXT NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS Files_Index ON Files(checksum);
CREATE TABLE IF NOT EXISTS Versions (
    version_id INTEGER PRIMARY KEY,
    path TEXT NOT NULL,
    info TEXT NOT NULL,
    fuzzy TEXT NOT NULL,
    version TEXT NOT NULL,
    date TEXT NOT NULL,
    file INTEGER,
    FOREIGN KEY(file) REFERENCES Files(file_id)
);
CREATE VIRTUAL TABLE IF NOT EXISTS VersionsFts USING fts5(
    info, fuzzy, version, date,
    content='Versions', content_rowid='version_id', prefix='2 3 4'
);
";

/// The metadata index. Owns the SQLite connection and the blob store.
pub struct Catalog {
    conn: Mutex<Connection>,
    blobs: BlobStore,
}

impl Catalog {
    /// Open (or create) the catalog database and ensure the schema.
    ///
    /// Bootstrap is idempotent: every table and index is created with
    /// `IF NOT EXISTS`, so reopening an initialized store alters nothing.
    pub fn open(db_path: &Path, blobs: BlobStore) -> Result<Self> {
        let conn = Connection::open(db_path)
            .map_err(|e| StoreError::database("opening catalog database", e))?;

        conn.pragma_update(None, "foreign_keys", true)
            .map_err(|e| StoreError::database("enabling foreign keys", e))?;
        // journal_mode returns the resulting mode as a row.
        let _mode: String = conn
            .query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))
            .map_err(|e| StoreError::database("switching to WAL", e))?;
        conn.pragma_update(None, "synchronous", "NORMAL")
            .map_err(|e| StoreError::database("setting synchronous mode", e))?;

        conn.execute_batch(SCHEMA)
            .map_err(|e| StoreError::database("ensuring catalog schema", e))?;

        debug!(db = %db_path.display(), "catalog opened");
        Ok(Self {
            conn: Mutex::new(conn),
            blobs,
        })
    }

    /// Close the catalog, releasing the database connection.
    pub fn close(self) -> Result<()> {
        let conn = self.conn.into_inner();
        conn.close()
            .map_err(|(_, e)| StoreError::database("closing catalog database", e))
    }

    pub(crate) fn blobs(&self) -> &BlobStore {
        &self.blobs
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock()
    }

    /// Append a version of `src` in one transactional step.
    ///
    /// Looks up the blob row by digest; if absent, materializes the blob on
    /// disk and inserts the row. Then unconditionally appends a version row
    /// (and its FTS mirror) referencing the blob. The catalog rows are
    /// all-or-nothing: a failed blob write rolls everything back, and a
    /// failed row insert after a successful blob write leaves only the blob
    /// behind, which a later add with the same digest reuses.
    pub fn add_version(
        &self,
        src: &Path,
        info: &str,
        version: &str,
        checksum: &str,
    ) -> Result<VersionRecord> {
        let name = base_name(src)?;
        let slash_path = to_slash(src);

        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| StoreError::database("starting add transaction", e))?;

        let existing: Option<i64> = tx
            .query_row(
                "SELECT file_id FROM Files WHERE checksum = ?1",
                [checksum],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| StoreError::database("looking up blob row", e))?;

        let file_id = match existing {
            Some(file_id) => {
                debug!(checksum = %checksum, file_id, "content already stored, reusing blob");
                file_id
            }
            None => {
                self.blobs.write(src, checksum, &name)?;
                tx.execute("INSERT INTO Files(checksum) VALUES (?1)", [checksum])
                    .map_err(|e| StoreError::database("inserting blob row", e))?;
                tx.last_insert_rowid()
            }
        };

        let created = timestamp::now();
        let date = timestamp::encode(created);
        let fuzzy = phonetic::encode(info);

        tx.execute(
            "INSERT INTO Versions(path, info, fuzzy, version, date, file) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![slash_path, info, fuzzy, version, date, file_id],
        )
        .map_err(|e| StoreError::database("inserting version row", e))?;
        let version_id = tx.last_insert_rowid();

        tx.execute(
            "INSERT INTO VersionsFts(rowid, info, fuzzy, version, date) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![version_id, info, fuzzy, version, date],
        )
        .map_err(|e| StoreError::database("indexing version row", e))?;

        tx.commit()
            .map_err(|e| StoreError::database("committing add transaction", e))?;

        info!(version_id, file_id, path = %slash_path, "appended version");
        Ok(VersionRecord {
            version_id,
            file_id,
            created,
        })
    }

    /// True iff at least one version exists for the path.
    pub fn has(&self, path: &Path) -> bool {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT EXISTS (SELECT 1 FROM Versions WHERE path = ?1 LIMIT 1)",
            [to_slash(path)],
            |row| row.get(0),
        )
        .unwrap_or(false)
    }

    /// The most recent version of `path`: maximum date, ties broken by
    /// highest version id (insertion order).
    pub fn latest(&self, path: &Path) -> Result<FileVersion> {
        let slash_path = to_slash(path);
        let conn = self.conn.lock();
        let raw = conn
            .query_row(
                &format!(
                    "SELECT {VERSION_COLUMNS} FROM Versions \
                     INNER JOIN Files ON Versions.file = Files.file_id \
                     WHERE Versions.path = ?1 \
                     ORDER BY Versions.date DESC, Versions.version_id DESC \
                     LIMIT 1"
                ),
                [&slash_path],
                raw_from_row,
            )
            .optional()
            .map_err(|e| StoreError::database("querying latest version", e))?
            .ok_or_else(|| StoreError::not_found(format!("no versions for path {}", slash_path)))?;
        drop(conn);
        self.resolve(raw)
    }

    /// All versions of `path`, newest first, truncated to `limit`.
    pub fn history(&self, path: &Path, limit: u32) -> Result<Vec<FileVersion>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {VERSION_COLUMNS} FROM Versions \
                 INNER JOIN Files ON Versions.file = Files.file_id \
                 WHERE Versions.path = ?1 \
                 ORDER BY Versions.date DESC, Versions.version_id DESC \
                 LIMIT ?2"
            ))
            .map_err(|e| StoreError::database("preparing history query", e))?;
        let raws = collect_raw(stmt.query_map(params![to_slash(path), limit], raw_from_row))?;
        drop(stmt);
        drop(conn);
        self.resolve_all(raws)
    }

    /// Like [`history`](Catalog::history), restricted to versions stamped
    /// strictly after `after`.
    pub fn history_since(
        &self,
        path: &Path,
        after: NaiveDateTime,
        limit: u32,
    ) -> Result<Vec<FileVersion>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {VERSION_COLUMNS} FROM Versions \
                 INNER JOIN Files ON Versions.file = Files.file_id \
                 WHERE Versions.path = ?1 AND Versions.date > ?2 \
                 ORDER BY Versions.date DESC, Versions.version_id DESC \
                 LIMIT ?3"
            ))
            .map_err(|e| StoreError::database("preparing history query", e))?;
        let raws = collect_raw(stmt.query_map(
            params![to_slash(path), timestamp::encode(after), limit],
            raw_from_row,
        ))?;
        drop(stmt);
        drop(conn);
        self.resolve_all(raws)
    }

    /// Project a stored row into the resolved read view.
    ///
    /// A timestamp that fails to decode surfaces as `InvalidDate` instead
    /// of being silently tolerated; it signals index corruption.
    pub(crate) fn resolve(&self, raw: RawVersion) -> Result<FileVersion> {
        let from = timestamp::decode(&raw.date)?;
        let os_path = from_slash(&raw.path);
        let name = base_name(&os_path)?;
        let local = self.blobs.blob_path(&raw.checksum, &name);
        Ok(FileVersion {
            id: raw.id,
            name,
            path: os_path,
            local,
            info: raw.info,
            fuzzy: raw.fuzzy,
            version: raw.version,
            from,
            checksum: raw.checksum,
        })
    }

    pub(crate) fn resolve_all(&self, raws: Vec<RawVersion>) -> Result<Vec<FileVersion>> {
        raws.into_iter().map(|raw| self.resolve(raw)).collect()
    }
}

pub(crate) fn raw_from_row(row: &Row<'_>) -> rusqlite::Result<RawVersion> {
    Ok(RawVersion {
        id: row.get(0)?,
        path: row.get(1)?,
        info: row.get(2)?,
        fuzzy: row.get(3)?,
        version: row.get(4)?,
        date: row.get(5)?,
        checksum: row.get(6)?,
    })
}

pub(crate) fn collect_raw<I>(rows: rusqlite::Result<I>) -> Result<Vec<RawVersion>>
where
    I: Iterator<Item = rusqlite::Result<RawVersion>>,
{
    let rows = rows.map_err(|e| StoreError::database("executing version query", e))?;
    let mut raws = Vec::new();
    for row in rows {
        raws.push(row.map_err(|e| StoreError::database("reading version row", e))?);
    }
    Ok(raws)
}

fn base_name(path: &Path) -> Result<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| {
            StoreError::io_error("path has no file name", Some(path.to_path_buf()))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn catalog_in(dir: &TempDir) -> Catalog {
        let root = dir.path().join("store");
        fs::create_dir_all(&root).unwrap();
        let blobs = BlobStore::new(root.clone(), false);
        Catalog::open(&root.join("index.sqlite3"), blobs).unwrap()
    }

    #[test]
    fn test_schema_bootstrap_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let catalog = catalog_in(&temp_dir);

        let src = temp_dir.path().join("a.txt");
        fs::write(&src, b"content").unwrap();
        let checksum = BlobStore::checksum(&src).unwrap();
        let record = catalog
            .add_version(&src, "first", "1.0", &checksum)
            .unwrap();
        catalog.close().unwrap();

        // Reopening must keep existing rows intact.
        let catalog = catalog_in(&temp_dir);
        let latest = catalog.latest(&src).unwrap();
        assert_eq!(latest.id, record.version_id);
        assert_eq!(latest.info, "first");
        catalog.close().unwrap();
    }

    #[test]
    fn test_add_rolls_back_when_blob_write_fails() {
        let temp_dir = TempDir::new().unwrap();
        let catalog = catalog_in(&temp_dir);

        let missing = temp_dir.path().join("missing.txt");
        let err = catalog
            .add_version(&missing, "info", "1.0", "00ff00ff")
            .unwrap_err();
        assert!(matches!(err, StoreError::IoDetailed { .. }));

        // No blob row and no version row survive the failed add.
        assert!(!catalog.has(&missing));
        let conn = catalog.lock();
        let files: i64 = conn
            .query_row("SELECT COUNT(*) FROM Files", [], |r| r.get(0))
            .unwrap();
        assert_eq!(files, 0);
    }

    #[test]
    fn test_base_name_rejects_bare_root() {
        assert!(base_name(Path::new("/")).is_err());
        assert_eq!(base_name(Path::new("/src/report.txt")).unwrap(), "report.txt");
    }
}
