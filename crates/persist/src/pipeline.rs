//! Encode/encrypt/write and read/decrypt as one reversible pipeline.

use std::time::SystemTime;

use crate::backend::Backend;
use crate::cipher::{self, SecretKey};
use crate::record::PersistentRecord;
use crate::{PersistError, codec};

/// Backend row holding the installation identity the payload key derives from.
pub const DEFAULT_IDENTITY_KEY: &str = "/statekeep/installation-id";

/// Outcome of reading one key through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fetch {
    /// No row for the key.
    Missing,
    /// The row had expired; it has been deleted from the backend.
    Expired,
    /// A live record whose payload is already decrypted.
    Found(PersistentRecord),
}

/// Owns the backend and the payload key. Every row the store writes goes
/// through here, so no partially encoded record ever reaches the backend.
#[derive(Debug)]
pub struct Pipeline<B: Backend> {
    backend: B,
    identity_key: String,
    secret: Option<SecretKey>,
}

impl<B: Backend> Pipeline<B> {
    pub fn new(backend: B) -> Self {
        Self::with_identity_key(backend, DEFAULT_IDENTITY_KEY)
    }

    pub fn with_identity_key(backend: B, identity_key: impl Into<String>) -> Self {
        Self {
            backend,
            identity_key: identity_key.into(),
            secret: None,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }

    pub fn identity_key(&self) -> &str {
        &self.identity_key
    }

    /// Number of backend rows, identity row included.
    pub fn len(&self) -> usize {
        self.backend.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backend.is_empty()
    }

    /// Encrypt (when asked) and write one record. Nothing is written unless
    /// every step before the backend write succeeded.
    pub fn write(
        &mut self,
        key: &str,
        payload: Option<Vec<u8>>,
        encrypted: bool,
        expires_at: Option<SystemTime>,
    ) -> Result<(), PersistError> {
        let payload = match payload {
            Some(plain) if encrypted => Some(cipher::encrypt(&self.secret()?, &plain)?),
            other => other,
        };
        let record = PersistentRecord {
            encrypted,
            expires_at,
            payload,
        };
        let bytes = record.to_bytes()?;
        self.backend.set(key, &bytes)?;
        tracing::trace!(key, encrypted, "record written");
        Ok(())
    }

    /// Read one record, purging it if expired at `now` and opening its
    /// payload when the record says it is encrypted.
    pub fn read(&mut self, key: &str, now: SystemTime) -> Result<Fetch, PersistError> {
        let Some(bytes) = self.backend.get(key)? else {
            return Ok(Fetch::Missing);
        };
        let mut record = PersistentRecord::from_bytes(&bytes)?;
        if record.is_expired(now) {
            self.backend.del(key)?;
            tracing::debug!(key, "purged expired record");
            return Ok(Fetch::Expired);
        }
        if record.encrypted
            && let Some(sealed) = record.payload.take()
        {
            record.payload = Some(cipher::decrypt(&self.secret()?, &sealed)?);
        }
        Ok(Fetch::Found(record))
    }

    pub fn delete(&mut self, key: &str) -> Result<(), PersistError> {
        self.backend.del(key)
    }

    /// The payload key, derived once. The identity row is created on first use.
    fn secret(&mut self) -> Result<SecretKey, PersistError> {
        if let Some(secret) = &self.secret {
            return Ok(secret.clone());
        }
        let identity = match self.backend.get(&self.identity_key)? {
            Some(bytes) => codec::decode::<String>(&bytes)?,
            None => {
                let identity = uuid::Uuid::new_v4().to_string();
                self.backend
                    .set(&self.identity_key, &codec::encode(&identity)?)?;
                tracing::debug!(row = %self.identity_key, "created installation identity");
                identity
            }
        };
        let secret = SecretKey::derive(&identity);
        self.secret = Some(secret.clone());
        Ok(secret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use std::time::Duration;

    fn payload(v: i32) -> Option<Vec<u8>> {
        Some(codec::encode(&v).unwrap())
    }

    #[test]
    fn plain_write_read() {
        let mut pipeline = Pipeline::new(MemoryBackend::new());
        pipeline.write("/k", payload(42), false, None).unwrap();
        assert_eq!(pipeline.len(), 1);

        let Fetch::Found(record) = pipeline.read("/k", SystemTime::now()).unwrap() else {
            panic!("expected a record");
        };
        assert!(!record.encrypted);
        assert_eq!(codec::decode::<i32>(&record.payload.unwrap()).unwrap(), 42);
    }

    #[test]
    fn encrypted_write_adds_identity_row_once() {
        let mut pipeline = Pipeline::new(MemoryBackend::new());
        pipeline.write("/a", payload(1), true, None).unwrap();
        pipeline.write("/b", payload(2), true, None).unwrap();
        assert_eq!(pipeline.len(), 3);
        assert!(pipeline.backend().get(DEFAULT_IDENTITY_KEY).unwrap().is_some());

        // The stored payload is sealed.
        let raw = pipeline.backend().get("/a").unwrap().unwrap();
        let sealed = PersistentRecord::from_bytes(&raw).unwrap();
        assert!(sealed.encrypted);
        assert_ne!(sealed.payload, payload(1));

        let Fetch::Found(record) = pipeline.read("/a", SystemTime::now()).unwrap() else {
            panic!("expected a record");
        };
        assert_eq!(record.payload, payload(1));
    }

    #[test]
    fn plain_writes_do_not_create_identity() {
        let mut pipeline = Pipeline::new(MemoryBackend::new());
        pipeline.write("/a", payload(1), false, None).unwrap();
        assert!(pipeline.backend().get(DEFAULT_IDENTITY_KEY).unwrap().is_none());
    }

    #[test]
    fn identity_survives_a_new_pipeline() {
        let mut first = Pipeline::new(MemoryBackend::new());
        first.write("/a", payload(7), true, None).unwrap();

        let mut second = Pipeline::new(first.into_backend());
        let Fetch::Found(record) = second.read("/a", SystemTime::now()).unwrap() else {
            panic!("expected a record");
        };
        assert_eq!(record.payload, payload(7));
        assert_eq!(second.len(), 2);
    }

    #[test]
    fn custom_identity_key() {
        let mut pipeline = Pipeline::with_identity_key(MemoryBackend::new(), "/app/id");
        pipeline.write("/a", payload(1), true, None).unwrap();
        assert_eq!(pipeline.identity_key(), "/app/id");
        assert!(pipeline.backend().get("/app/id").unwrap().is_some());
    }

    #[test]
    fn expired_record_is_purged_on_read() {
        let mut pipeline = Pipeline::new(MemoryBackend::new());
        let past = SystemTime::now() - Duration::from_secs(60);
        pipeline.write("/k", payload(1), false, Some(past)).unwrap();
        assert_eq!(pipeline.len(), 1);

        assert_eq!(pipeline.read("/k", SystemTime::now()).unwrap(), Fetch::Expired);
        assert!(pipeline.is_empty());
    }

    #[test]
    fn missing_key() {
        let mut pipeline = Pipeline::new(MemoryBackend::new());
        assert_eq!(pipeline.read("/k", SystemTime::now()).unwrap(), Fetch::Missing);
    }

    #[test]
    fn empty_payload_is_preserved() {
        let mut pipeline = Pipeline::new(MemoryBackend::new());
        pipeline.write("/k", None, true, None).unwrap();
        let Fetch::Found(record) = pipeline.read("/k", SystemTime::now()).unwrap() else {
            panic!("expected a record");
        };
        assert!(record.payload.is_none());
    }

    #[test]
    fn delete_removes_row() {
        let mut pipeline = Pipeline::new(MemoryBackend::new());
        pipeline.write("/k", payload(1), false, None).unwrap();
        pipeline.delete("/k").unwrap();
        assert!(pipeline.is_empty());
    }
}
