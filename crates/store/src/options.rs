use statekeep_common::deadline_after;
use std::time::{Duration, SystemTime};

/// Per-call policy for [`Store::set_with`](crate::Store::set_with).
///
/// Every set fully describes its policy: options from an earlier set on the
/// same key are not inherited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOption {
    /// Write the value through to the backend.
    Persist,
    /// Seal the persisted payload. Implies [`SetOption::Persist`].
    Encrypt,
    /// Expire the value this long after the set.
    ExpiresIn(Duration),
    /// Expire the value at a fixed time. A time in the past stores a value
    /// that is already expired.
    ExpiresAt(SystemTime),
}

/// Options folded into one policy. The last expiration option wins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Policy {
    pub persist: bool,
    pub encrypt: bool,
    pub expires_at: Option<SystemTime>,
}

impl Policy {
    pub fn resolve(options: &[SetOption], now: SystemTime) -> Self {
        let mut policy = Self::default();
        for option in options {
            match *option {
                SetOption::Persist => policy.persist = true,
                SetOption::Encrypt => {
                    policy.persist = true;
                    policy.encrypt = true;
                }
                SetOption::ExpiresIn(ttl) => policy.expires_at = Some(deadline_after(now, ttl)),
                SetOption::ExpiresAt(at) => policy.expires_at = Some(at),
            }
        }
        policy
    }
}
