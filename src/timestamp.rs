//! Unix timestamps for escrow expiries and ERC-3009 validity windows.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::ops::{Add, Sub};
use std::time::SystemTime;

/// Seconds since the Unix epoch.
///
/// Escrow expiries travel as plain JSON numbers in the facilitator API
/// (`preApprovalExpiry`, `authorizationExpiry`, `refundExpiry`), so unlike the
/// stringified ERC-3009 fields this type serializes transparently as `u64`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Ord, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnixTimestamp(u64);

impl Display for UnixTimestamp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Add<u64> for UnixTimestamp {
    type Output = Self;

    fn add(self, rhs: u64) -> Self::Output {
        UnixTimestamp(self.0.saturating_add(rhs))
    }
}

impl Sub<UnixTimestamp> for UnixTimestamp {
    type Output = u64;

    fn sub(self, rhs: UnixTimestamp) -> Self::Output {
        self.0.saturating_sub(rhs.0)
    }
}

impl From<u64> for UnixTimestamp {
    fn from(value: u64) -> Self {
        UnixTimestamp(value)
    }
}

impl UnixTimestamp {
    pub fn from_secs(secs: u64) -> Self {
        Self(secs)
    }

    /// Returns the current system time.
    ///
    /// A clock set before the epoch is clamped to zero.
    pub fn now() -> Self {
        let now = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        Self(now)
    }

    pub fn as_secs(&self) -> u64 {
        self.0
    }
}

/// Serde adapter for the ERC-3009 fields (`validAfter`, `validBefore`),
/// which travel as decimal strings.
pub mod as_string {
    use super::UnixTimestamp;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &UnixTimestamp, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&ts.0)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<UnixTimestamp, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse::<u64>()
            .map(UnixTimestamp)
            .map_err(|_| serde::de::Error::custom("timestamp must be a non-negative integer string"))
    }
}
