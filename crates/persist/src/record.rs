use serde::{Deserialize, Serialize};
use statekeep_common::is_expired;
use std::time::SystemTime;

use crate::{PersistError, codec};

/// The durable form of one store entry.
///
/// `payload` is the codec output for the value, sealed by the cipher when
/// `encrypted` is set. `None` records an empty value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistentRecord {
    pub encrypted: bool,
    pub expires_at: Option<SystemTime>,
    pub payload: Option<Vec<u8>>,
}

impl PersistentRecord {
    pub fn is_expired(&self, now: SystemTime) -> bool {
        is_expired(self.expires_at, now)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, PersistError> {
        codec::encode(self)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, PersistError> {
        codec::decode(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn record_without_expiration_is_live() {
        assert!(!PersistentRecord::default().is_expired(SystemTime::now()));
    }

    #[test]
    fn record_with_past_deadline_is_expired() {
        let record = PersistentRecord {
            expires_at: Some(SystemTime::now() - Duration::from_secs(60)),
            ..Default::default()
        };
        assert!(record.is_expired(SystemTime::now()));
    }

    #[test]
    fn record_bytes_preserve_fields() {
        let record = PersistentRecord {
            encrypted: true,
            expires_at: Some(SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000)),
            payload: Some(vec![1, 2, 3]),
        };
        let bytes = record.to_bytes().unwrap();
        assert_eq!(PersistentRecord::from_bytes(&bytes).unwrap(), record);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(PersistentRecord::from_bytes(b"\xff\x00not cbor").is_err());
    }
}
