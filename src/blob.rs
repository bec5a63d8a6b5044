//! Content-addressed blob store.
//!
//! Blob bytes live on disk under the store root, addressed by the SHA-256
//! digest of their content:
//!
//! ```text
//! root/
//! ├── index.sqlite3                # catalog (owned by catalog.rs)
//! └── <hex-digest>/
//!     └── <base-name>[.gz]         # one blob per unique digest
//! ```
//!
//! Writing the same content twice never stores a second copy; the catalog
//! checks digest existence before delegating here. Blobs are never deleted
//! or mutated by the store.

use crate::error::{Result, StoreError};
use crate::fsutil::ensure_dir;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, BufReader, ErrorKind, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// File name extension appended to blobs when the store compresses.
pub const COMPRESSED_EXT: &str = "gz";

/// Digest-addressed blob storage under a fixed root directory.
///
/// The compression flag is store-wide and immutable for the store's
/// lifetime; it decides both the blob naming scheme and the copy codec.
#[derive(Debug, Clone)]
pub struct BlobStore {
    root: PathBuf,
    compress: bool,
}

impl BlobStore {
    pub fn new(root: PathBuf, compress: bool) -> Self {
        Self { root, compress }
    }

    pub fn compress(&self) -> bool {
        self.compress
    }

    /// Compute the streaming SHA-256 digest of a file.
    ///
    /// Uses an 8 KiB buffer so large files never load fully into memory.
    /// Returns the lowercase hex encoding (64 characters).
    pub fn checksum(path: &Path) -> Result<String> {
        const BUFFER_SIZE: usize = 8 * 1024;

        let file = File::open(path).map_err(|e| {
            StoreError::io_error(
                format!("failed to open file for hashing: {}", e),
                Some(path.to_path_buf()),
            )
        })?;

        let mut reader = BufReader::with_capacity(BUFFER_SIZE, file);
        let mut hasher = Sha256::new();
        let mut buffer = [0u8; BUFFER_SIZE];

        loop {
            let bytes_read = reader.read(&mut buffer).map_err(|e| {
                StoreError::io_error(
                    format!("failed to read file for hashing: {}", e),
                    Some(path.to_path_buf()),
                )
            })?;
            if bytes_read == 0 {
                break;
            }
            hasher.update(&buffer[..bytes_read]);
        }

        Ok(format!("{:x}", hasher.finalize()))
    }

    /// Deterministic on-disk location for a blob: `root/<digest>/<name>`,
    /// with the compression extension when the store compresses.
    pub fn blob_path(&self, checksum: &str, name: &str) -> PathBuf {
        let file_name = if self.compress {
            format!("{}.{}", name, COMPRESSED_EXT)
        } else {
            name.to_string()
        };
        self.root.join(checksum).join(file_name)
    }

    /// Materialize a blob from `src`.
    ///
    /// Creates the digest directory, then copies the source bytes in,
    /// compressing in-stream when the store compresses. A partial write is
    /// removed (best effort) before the error is surfaced, so no reader can
    /// ever observe a half-written blob as valid. Rewriting an existing
    /// digest truncates and rewrites identical bytes, which is harmless.
    pub fn write(&self, src: &Path, checksum: &str, name: &str) -> Result<PathBuf> {
        let dst = self.blob_path(checksum, name);
        if let Some(parent) = dst.parent() {
            ensure_dir(parent)?;
        }

        if let Err(err) = self.copy_in(src, &dst) {
            if let Err(cleanup) = fs::remove_file(&dst) {
                if cleanup.kind() != ErrorKind::NotFound {
                    warn!(
                        blob = %dst.display(),
                        error = %cleanup,
                        "failed to clean up partially written blob"
                    );
                }
            }
            return Err(err);
        }

        info!(
            checksum = %checksum,
            blob = %dst.display(),
            source = %src.display(),
            compressed = self.compress,
            "stored blob"
        );
        Ok(dst)
    }

    fn copy_in(&self, src: &Path, dst: &Path) -> Result<()> {
        let mut fin = File::open(src).map_err(|e| {
            StoreError::io_error(
                format!("failed to open source file: {}", e),
                Some(src.to_path_buf()),
            )
        })?;
        let fout = File::create(dst).map_err(|e| {
            StoreError::io_error(
                format!("failed to create blob file: {}", e),
                Some(dst.to_path_buf()),
            )
        })?;

        if self.compress {
            let mut encoder = GzEncoder::new(fout, Compression::default());
            io::copy(&mut fin, &mut encoder).map_err(|e| {
                StoreError::io_error(
                    format!("failed to compress into blob: {}", e),
                    Some(dst.to_path_buf()),
                )
            })?;
            encoder.finish().map_err(|e| {
                StoreError::io_error(
                    format!("failed to finish compressed blob: {}", e),
                    Some(dst.to_path_buf()),
                )
            })?;
        } else {
            let mut fout = fout;
            io::copy(&mut fin, &mut fout).map_err(|e| {
                StoreError::io_error(
                    format!("failed to copy into blob: {}", e),
                    Some(dst.to_path_buf()),
                )
            })?;
        }
        Ok(())
    }

    /// Copy blob bytes out to `dest_dir/name`, decompressing in-stream when
    /// the store compresses. Overwrites any existing file at the destination.
    pub fn restore(&self, local: &Path, dest_dir: &Path, name: &str) -> Result<PathBuf> {
        ensure_dir(dest_dir)?;
        let dst = dest_dir.join(name);

        let fin = File::open(local).map_err(|e| {
            StoreError::io_error(
                format!("failed to open blob: {}", e),
                Some(local.to_path_buf()),
            )
        })?;
        let mut fout = File::create(&dst).map_err(|e| {
            StoreError::io_error(
                format!("failed to create restore target: {}", e),
                Some(dst.clone()),
            )
        })?;

        if self.compress {
            let mut decoder = GzDecoder::new(fin);
            io::copy(&mut decoder, &mut fout).map_err(|e| {
                StoreError::io_error(
                    format!("failed to decompress blob: {}", e),
                    Some(local.to_path_buf()),
                )
            })?;
        } else {
            let mut fin = fin;
            io::copy(&mut fin, &mut fout).map_err(|e| {
                StoreError::io_error(
                    format!("failed to copy blob out: {}", e),
                    Some(local.to_path_buf()),
                )
            })?;
        }

        debug!(blob = %local.display(), target = %dst.display(), "restored blob");
        Ok(dst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_source(dir: &TempDir, name: &str, content: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_checksum_known_value() {
        let temp_dir = TempDir::new().unwrap();
        let src = write_source(&temp_dir, "empty.txt", b"");
        // SHA-256 of the empty input is a known constant.
        assert_eq!(
            BlobStore::checksum(&src).unwrap(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_checksum_large_file_matches_buffer_boundaries() {
        let temp_dir = TempDir::new().unwrap();
        // Larger than the 8 KiB read buffer.
        let content = vec![b'x'; 20 * 1024];
        let src = write_source(&temp_dir, "large.bin", &content);

        let expected = format!("{:x}", Sha256::digest(&content));
        assert_eq!(BlobStore::checksum(&src).unwrap(), expected);
    }

    #[test]
    fn test_blob_path_scheme() {
        let plain = BlobStore::new(PathBuf::from("/store"), false);
        let path = plain.blob_path("abc123", "report.txt");
        assert_eq!(path, PathBuf::from("/store/abc123/report.txt"));

        let compressed = BlobStore::new(PathBuf::from("/store"), true);
        let path = compressed.blob_path("abc123", "report.txt");
        assert_eq!(path, PathBuf::from("/store/abc123/report.txt.gz"));
    }

    #[test]
    fn test_write_and_restore_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let store = BlobStore::new(temp_dir.path().join("store"), false);
        let content = b"blob round trip content";
        let src = write_source(&temp_dir, "in.txt", content);
        let checksum = BlobStore::checksum(&src).unwrap();

        let blob = store.write(&src, &checksum, "in.txt").unwrap();
        assert!(blob.is_file());

        let out_dir = temp_dir.path().join("out");
        let restored = store.restore(&blob, &out_dir, "in.txt").unwrap();
        assert_eq!(fs::read(restored).unwrap(), content);
    }

    #[test]
    fn test_compressed_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let store = BlobStore::new(temp_dir.path().join("store"), true);
        let content = vec![b'a'; 64 * 1024];
        let src = write_source(&temp_dir, "in.txt", &content);
        let checksum = BlobStore::checksum(&src).unwrap();

        let blob = store.write(&src, &checksum, "in.txt").unwrap();
        assert!(blob.to_string_lossy().ends_with(".gz"));
        // Compressible input should actually shrink on disk.
        assert!(fs::metadata(&blob).unwrap().len() < content.len() as u64);

        let out_dir = temp_dir.path().join("out");
        let restored = store.restore(&blob, &out_dir, "in.txt").unwrap();
        assert_eq!(fs::read(restored).unwrap(), content);
    }

    #[test]
    fn test_restore_overwrites_existing_target() {
        let temp_dir = TempDir::new().unwrap();
        let store = BlobStore::new(temp_dir.path().join("store"), false);
        let src = write_source(&temp_dir, "in.txt", b"new bytes");
        let checksum = BlobStore::checksum(&src).unwrap();
        let blob = store.write(&src, &checksum, "in.txt").unwrap();

        let out_dir = temp_dir.path().join("out");
        fs::create_dir_all(&out_dir).unwrap();
        fs::write(out_dir.join("in.txt"), b"stale bytes to be replaced").unwrap();

        let restored = store.restore(&blob, &out_dir, "in.txt").unwrap();
        assert_eq!(fs::read(restored).unwrap(), b"new bytes");
    }

    #[test]
    fn test_write_failure_leaves_no_partial_blob() {
        let temp_dir = TempDir::new().unwrap();
        let store = BlobStore::new(temp_dir.path().join("store"), false);

        let missing = temp_dir.path().join("does-not-exist.txt");
        let err = store.write(&missing, "deadbeef", "gone.txt").unwrap_err();
        assert!(matches!(err, StoreError::IoDetailed { .. }));
        assert!(!store.blob_path("deadbeef", "gone.txt").exists());
    }

    #[test]
    fn test_rewriting_existing_digest_is_tolerated() {
        let temp_dir = TempDir::new().unwrap();
        let store = BlobStore::new(temp_dir.path().join("store"), false);
        let content = b"same bytes both times";
        let src = write_source(&temp_dir, "in.txt", content);
        let checksum = BlobStore::checksum(&src).unwrap();

        let first = store.write(&src, &checksum, "in.txt").unwrap();
        let second = store.write(&src, &checksum, "in.txt").unwrap();
        assert_eq!(first, second);
        let out = store
            .restore(&second, &temp_dir.path().join("out"), "in.txt")
            .unwrap();
        assert_eq!(fs::read(out).unwrap(), content);
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(64))]

            #[test]
            fn prop_checksum_deterministic(content in prop::collection::vec(any::<u8>(), 0..4096)) {
                let temp_dir = TempDir::new().unwrap();
                let src = temp_dir.path().join("data.bin");
                fs::write(&src, &content).unwrap();

                let first = BlobStore::checksum(&src).unwrap();
                let second = BlobStore::checksum(&src).unwrap();
                prop_assert_eq!(&first, &second);
                prop_assert_eq!(first.len(), 64);
                prop_assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
            }

            #[test]
            fn prop_round_trip_preserves_bytes(
                content in prop::collection::vec(any::<u8>(), 0..4096),
                compress in any::<bool>(),
            ) {
                let temp_dir = TempDir::new().unwrap();
                let store = BlobStore::new(temp_dir.path().join("store"), compress);
                let src = temp_dir.path().join("data.bin");
                fs::write(&src, &content).unwrap();
                let checksum = BlobStore::checksum(&src).unwrap();

                let blob = store.write(&src, &checksum, "data.bin").unwrap();
                let restored = store
                    .restore(&blob, &temp_dir.path().join("out"), "data.bin")
                    .unwrap();
                prop_assert_eq!(fs::read(restored).unwrap(), content);
            }
        }
    }
}
