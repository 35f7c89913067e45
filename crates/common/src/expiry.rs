use std::time::{Duration, SystemTime};

/// Whether a deadline has passed at `now`. `None` never expires.
///
/// A deadline equal to `now` counts as expired.
pub fn is_expired(expires_at: Option<SystemTime>, now: SystemTime) -> bool {
    match expires_at {
        Some(deadline) => deadline <= now,
        None => false,
    }
}

/// 9999-12-31T23:59:59Z, the clamp for overflowing deadlines.
const FAR_FUTURE_SECS: u64 = 253_402_300_799;

/// Deadline `ttl` from `now`, clamped instead of overflowing.
pub fn deadline_after(now: SystemTime, ttl: Duration) -> SystemTime {
    now.checked_add(ttl)
        .unwrap_or_else(|| SystemTime::UNIX_EPOCH + Duration::from_secs(FAR_FUTURE_SECS))
}
