//! Window and month key derivation.

use chrono::{DateTime, Utc};

/// Purpose label for window counters when the caller does not segregate
/// them further.
pub const DEFAULT_PURPOSE: &str = "default";

const WINDOW_KEY_PREFIX: &str = "rate_limit";
const MONTHLY_KEY_PREFIX: &str = "monthly_calls";

/// Identifies one fixed window's counter for one caller.
///
/// Requests from the same identifier with the same purpose land on the
/// same key for the whole window; the next window yields a fresh key and
/// the old one expires on its own. Because windows are fixed rather than
/// sliding, a caller can spend up to twice the limit in a short span
/// straddling a boundary; that is the documented contract of this scheme,
/// not an accident.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WindowKey {
    /// Rate limit identifier (an IP address, an API key hash, ...)
    pub identifier: String,
    /// What the counter protects; distinct purposes count separately
    pub purpose: String,
    /// Unix time divided by the window length
    pub window_index: u64,
}

impl WindowKey {
    /// Derive the key for the window containing `now_unix`.
    pub fn derive(identifier: &str, purpose: &str, window_seconds: u64, now_unix: i64) -> Self {
        // A zero window would divide by zero; admission rejects it before
        // a key is ever derived, this guard covers direct callers.
        let window_index = (now_unix.max(0) as u64) / window_seconds.max(1);
        Self {
            identifier: identifier.to_string(),
            purpose: purpose.to_string(),
            window_index,
        }
    }

    /// Render the logical store key.
    pub fn to_store_key(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            WINDOW_KEY_PREFIX, self.identifier, self.purpose, self.window_index
        )
    }
}

impl std::fmt::Display for WindowKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_store_key())
    }
}

/// Monthly usage key for a user: `monthly_calls:{user}:{YYYY-MM}`.
///
/// The label is UTC calendar time, so counts roll over at real month
/// boundaries regardless of when the counter was created. The TTL written
/// alongside the counter is garbage collection, not the rollover.
pub fn month_key(user_id: &str, at: DateTime<Utc>) -> String {
    format!("{}:{}:{}", MONTHLY_KEY_PREFIX, user_id, at.format("%Y-%m"))
}
