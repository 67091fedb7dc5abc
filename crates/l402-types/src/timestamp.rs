//! Unix timestamp for L402 proof tokens.
//!
//! Tokens record when they were issued. The value is informational only:
//! the protocol enforces no expiry, so nothing in the verification path reads it.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::time::SystemTime;

/// A Unix timestamp in seconds since the Unix epoch (1970-01-01T00:00:00Z).
///
/// Serialized as a plain JSON integer. A missing value deserializes as
/// [`UnixTimestamp::default`], the epoch itself.
///
/// # Example
///
/// ```
/// use l402_types::timestamp::UnixTimestamp;
///
/// let ts = UnixTimestamp::from_secs(1699999999);
/// assert_eq!(ts.as_secs(), 1699999999);
/// assert!(UnixTimestamp::now() > ts);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Ord, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnixTimestamp(u64);

impl Display for UnixTimestamp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl UnixTimestamp {
    /// Creates a new [`UnixTimestamp`] from a raw seconds value.
    pub fn from_secs(secs: u64) -> Self {
        Self(secs)
    }

    /// Returns the current system time as a [`UnixTimestamp`].
    ///
    /// A clock set before the Unix epoch yields the epoch.
    pub fn now() -> Self {
        let now = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        Self(now)
    }

    /// Returns the timestamp as raw seconds since the Unix epoch.
    pub fn as_secs(&self) -> u64 {
        self.0
    }
}
