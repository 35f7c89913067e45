//! File-backed persistence.
//!
//! Layout inside the backend directory:
//! ```text
//! store.meta.json                - schema version
//! rows/
//!   <sha256(key)>.row.cbor.zst   - CBOR+zstd compressed row, self-describing
//! ```
//!
//! Each row file carries its logical key and a SHA-256 of its data, so the
//! key index can be rebuilt on open and corruption is detected on read.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::backend::Backend;
use crate::{PersistError, codec};

/// Current on-disk schema version.
const STORE_SCHEMA_VERSION: u32 = 1;

const ROW_SUFFIX: &str = ".row.cbor.zst";

/// Metadata stored in store.meta.json.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreMeta {
    pub schema_version: u32,
}

/// One row as written to disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RowFile {
    key: String,
    sha256: String,
    data: Vec<u8>,
}

/// Directory-backed [`Backend`] with schema versioning and per-row integrity
/// checks.
#[derive(Debug)]
pub struct FileBackend {
    root: PathBuf,
    meta: StoreMeta,
    index: BTreeMap<String, PathBuf>,
}

impl FileBackend {
    /// Open or create a backend at the given directory.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PersistError> {
        let root = path.as_ref().to_path_buf();
        std::fs::create_dir_all(root.join("rows"))?;

        let meta_path = root.join("store.meta.json");
        let meta = if meta_path.exists() {
            let meta: StoreMeta = serde_json::from_reader(std::fs::File::open(&meta_path)?)?;
            if meta.schema_version != STORE_SCHEMA_VERSION {
                return Err(PersistError::SchemaMismatch {
                    file_version: meta.schema_version,
                    expected_version: STORE_SCHEMA_VERSION,
                });
            }
            meta
        } else {
            let meta = StoreMeta {
                schema_version: STORE_SCHEMA_VERSION,
            };
            serde_json::to_writer_pretty(std::fs::File::create(&meta_path)?, &meta)?;
            meta
        };

        let mut index = BTreeMap::new();
        for entry in std::fs::read_dir(root.join("rows"))? {
            let path = entry?.path();
            let is_row = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(ROW_SUFFIX));
            if !is_row {
                continue;
            }
            match read_row(&path) {
                Ok(row) => {
                    index.insert(row.key, path);
                }
                // Unreadable rows have no recoverable key; leave them on disk
                // for inspection instead of guessing.
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "skipping unreadable row"),
            }
        }
        tracing::debug!(root = %root.display(), rows = index.len(), "opened file backend");

        Ok(Self { root, meta, index })
    }

    /// Get the path to the backend root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn meta(&self) -> &StoreMeta {
        &self.meta
    }

    /// Re-read every indexed row and check its content hash.
    pub fn verify_integrity(&self) -> Result<(), PersistError> {
        for (key, path) in &self.index {
            let row = read_row(path)?;
            verify_row(key, &row)?;
        }
        Ok(())
    }

    fn row_path(&self, key: &str) -> PathBuf {
        self.root
            .join("rows")
            .join(format!("{}{ROW_SUFFIX}", sha256_hex(key.as_bytes())))
    }
}

impl Backend for FileBackend {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, PersistError> {
        let Some(path) = self.index.get(key) else {
            return Ok(None);
        };
        let row = read_row(path)?;
        verify_row(key, &row)?;
        Ok(Some(row.data))
    }

    fn set(&mut self, key: &str, bytes: &[u8]) -> Result<(), PersistError> {
        let row = RowFile {
            key: key.to_string(),
            sha256: sha256_hex(bytes),
            data: bytes.to_vec(),
        };
        let compressed = zstd_compress(&codec::encode(&row)?)?;

        // Write-then-rename so a crash never leaves a torn row behind.
        let path = self.row_path(key);
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, &compressed)?;
        std::fs::rename(&tmp, &path)?;

        self.index.insert(key.to_string(), path);
        Ok(())
    }

    fn del(&mut self, key: &str) -> Result<(), PersistError> {
        if let Some(path) = self.index.remove(key) {
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    fn len(&self) -> usize {
        self.index.len()
    }

    fn keys(&self) -> Vec<String> {
        self.index.keys().cloned().collect()
    }
}

fn read_row(path: &Path) -> Result<RowFile, PersistError> {
    let compressed = std::fs::read(path)?;
    codec::decode(&zstd_decompress(&compressed)?)
}

fn verify_row(key: &str, row: &RowFile) -> Result<(), PersistError> {
    let actual = sha256_hex(&row.data);
    if row.key != key || actual != row.sha256 {
        return Err(PersistError::IntegrityMismatch {
            key: key.to_string(),
            expected: row.sha256.clone(),
            actual,
        });
    }
    Ok(())
}

fn zstd_compress(data: &[u8]) -> Result<Vec<u8>, PersistError> {
    let mut encoder = zstd::Encoder::new(Vec::new(), 3)?;
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

fn zstd_decompress(data: &[u8]) -> Result<Vec<u8>, PersistError> {
    let mut decoder = zstd::Decoder::new(data)?;
    let mut buf = Vec::new();
    decoder.read_to_end(&mut buf)?;
    Ok(buf)
}

fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_creates_layout() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = FileBackend::open(tmp.path().join("state")).unwrap();
        assert!(backend.root().join("rows").is_dir());
        assert!(backend.root().join("store.meta.json").is_file());
        assert_eq!(backend.meta().schema_version, STORE_SCHEMA_VERSION);
        assert!(backend.is_empty());
    }

    #[test]
    fn set_get_del() {
        let tmp = tempfile::tempdir().unwrap();
        let mut backend = FileBackend::open(tmp.path()).unwrap();

        backend.set("/user/name", b"maxence").unwrap();
        assert_eq!(backend.get("/user/name").unwrap().unwrap(), b"maxence");
        assert_eq!(backend.len(), 1);

        backend.del("/user/name").unwrap();
        assert!(backend.get("/user/name").unwrap().is_none());
        assert!(backend.is_empty());
    }

    #[test]
    fn reopen_rebuilds_index() {
        let tmp = tempfile::tempdir().unwrap();
        {
            let mut backend = FileBackend::open(tmp.path()).unwrap();
            backend.set("/a", b"1").unwrap();
            backend.set("/b", b"2").unwrap();
            backend.set("/a", b"3").unwrap();
        }

        let backend = FileBackend::open(tmp.path()).unwrap();
        assert_eq!(backend.keys(), vec!["/a".to_string(), "/b".to_string()]);
        assert_eq!(backend.get("/a").unwrap().unwrap(), b"3");
        backend.verify_integrity().unwrap();
    }

    #[test]
    fn corruption_fails_closed() {
        let tmp = tempfile::tempdir().unwrap();
        let mut backend = FileBackend::open(tmp.path()).unwrap();
        backend.set("/a", b"value").unwrap();

        // Re-encode the row with data that no longer matches its hash.
        let path = backend.row_path("/a");
        let mut row = read_row(&path).unwrap();
        row.data = b"tampered".to_vec();
        let bytes = zstd_compress(&codec::encode(&row).unwrap()).unwrap();
        std::fs::write(&path, bytes).unwrap();

        assert!(matches!(
            backend.get("/a"),
            Err(PersistError::IntegrityMismatch { .. })
        ));
        assert!(backend.verify_integrity().is_err());
    }

    #[test]
    fn unreadable_rows_are_skipped_on_open() {
        let tmp = tempfile::tempdir().unwrap();
        {
            let mut backend = FileBackend::open(tmp.path()).unwrap();
            backend.set("/a", b"1").unwrap();
        }
        std::fs::write(tmp.path().join("rows").join(format!("junk{ROW_SUFFIX}")), b"junk").unwrap();

        let backend = FileBackend::open(tmp.path()).unwrap();
        assert_eq!(backend.len(), 1);
    }

    #[test]
    fn schema_mismatch_fail_closed() {
        let tmp = tempfile::tempdir().unwrap();
        let _backend = FileBackend::open(tmp.path()).unwrap();

        let meta_path = tmp.path().join("store.meta.json");
        let meta = StoreMeta { schema_version: 999 };
        serde_json::to_writer_pretty(std::fs::File::create(&meta_path).unwrap(), &meta).unwrap();

        match FileBackend::open(tmp.path()) {
            Err(PersistError::SchemaMismatch {
                file_version,
                expected_version,
            }) => {
                assert_eq!(file_version, 999);
                assert_eq!(expected_version, STORE_SCHEMA_VERSION);
            }
            Err(e) => panic!("expected SchemaMismatch, got: {e}"),
            Ok(_) => panic!("expected error, got Ok"),
        }
    }
}
