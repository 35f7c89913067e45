use std::collections::BTreeMap;

use crate::PersistError;

/// Byte-oriented key/value map that outlives the process.
///
/// The store treats implementations as opaque storage: it only ever writes
/// fully encoded records and reads them back whole.
pub trait Backend {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, PersistError>;

    fn set(&mut self, key: &str, bytes: &[u8]) -> Result<(), PersistError>;

    /// Removing a missing key is not an error.
    fn del(&mut self, key: &str) -> Result<(), PersistError>;

    /// Number of stored rows.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All stored keys in ascending order.
    fn keys(&self) -> Vec<String>;
}

/// In-memory backend, used by tests and short-lived hosts.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    rows: BTreeMap<String, Vec<u8>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Backend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, PersistError> {
        Ok(self.rows.get(key).cloned())
    }

    fn set(&mut self, key: &str, bytes: &[u8]) -> Result<(), PersistError> {
        self.rows.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn del(&mut self, key: &str) -> Result<(), PersistError> {
        self.rows.remove(key);
        Ok(())
    }

    fn len(&self) -> usize {
        self.rows.len()
    }

    fn keys(&self) -> Vec<String> {
        self.rows.keys().cloned().collect()
    }
}
