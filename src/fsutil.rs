//! Filesystem helpers shared by the blob store and the store lifecycle.

use crate::error::{Result, StoreError};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Create a directory (and its parents) at `path` if it does not exist.
///
/// Fails with [`StoreError::DirectoryConflict`] when the path is occupied
/// by a regular file.
pub fn ensure_dir(path: &Path) -> Result<()> {
    match fs::metadata(path) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(StoreError::DirectoryConflict(path.to_path_buf())),
        Err(e) if e.kind() == ErrorKind::NotFound => fs::create_dir_all(path).map_err(|e| {
            StoreError::io_error(
                format!("failed to create directory: {}", e),
                Some(path.to_path_buf()),
            )
        }),
        Err(e) => Err(StoreError::io_error(
            format!("failed to stat directory: {}", e),
            Some(path.to_path_buf()),
        )),
    }
}

/// Normalize a path to forward slashes for catalog storage.
pub fn to_slash(path: &Path) -> String {
    let s = path.to_string_lossy();
    if std::path::MAIN_SEPARATOR == '/' {
        s.into_owned()
    } else {
        s.replace(std::path::MAIN_SEPARATOR, "/")
    }
}

/// Map a stored slash path back to platform separators.
pub fn from_slash(path: &str) -> PathBuf {
    if std::path::MAIN_SEPARATOR == '/' {
        PathBuf::from(path)
    } else {
        PathBuf::from(path.replace('/', std::path::MAIN_SEPARATOR_STR))
    }
}
