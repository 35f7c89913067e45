//! Persistence for the state store: backends, record format, codec, cipher.
//!
//! # Invariants
//! - A record is written only after the whole encode/encrypt pipeline
//!   succeeded; a failed pipeline writes nothing.
//! - Decryption policy travels with the record (`encrypted` flag), never with
//!   the caller.
//! - The installation identity row is created at most once per backend.

pub mod backend;
pub mod cipher;
pub mod codec;
pub mod file;
pub mod pipeline;
pub mod record;

pub use backend::{Backend, MemoryBackend};
pub use cipher::SecretKey;
pub use file::FileBackend;
pub use pipeline::{DEFAULT_IDENTITY_KEY, Fetch, Pipeline};
pub use record::PersistentRecord;

/// Errors from persistence operations.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CBOR serialization error: {0}")]
    CborEncode(String),
    #[error("CBOR deserialization error: {0}")]
    CborDecode(String),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("encryption failed: {0}")]
    Encrypt(String),
    #[error("decryption failed: {0}")]
    Decrypt(String),
    #[error("integrity check failed for {key}: expected {expected}, got {actual}")]
    IntegrityMismatch {
        key: String,
        expected: String,
        actual: String,
    },
    #[error("schema version mismatch: file has v{file_version}, expected v{expected_version}")]
    SchemaMismatch {
        file_version: u32,
        expected_version: u32,
    },
}
