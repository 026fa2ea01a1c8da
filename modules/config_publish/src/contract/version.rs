//! Version tags issued to published configuration

use std::fmt;
use std::str::FromStr;

/// Fixed-width, lexicographically sortable rendering of a store-wide
/// version sequence: `v` followed by 16 lowercase hex digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VersionTag(u64);

impl VersionTag {
    /// Render a sequence issued by the version counter.
    ///
    /// # Panics
    ///
    /// A zero sequence means the counter was bypassed upstream; that is a
    /// sequencing bug, not a runtime condition.
    pub fn format(sequence: u64) -> Self {
        assert!(sequence > 0, "version sequence must be positive, got {sequence}");
        Self(sequence)
    }

    pub fn sequence(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for VersionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{:016x}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid version tag: {0}")]
pub struct InvalidVersionTag(String);

impl FromStr for VersionTag {
    type Err = InvalidVersionTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix('v')
            .filter(|d| d.len() == 16 && d.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')))
            .ok_or_else(|| InvalidVersionTag(s.to_string()))?;
        match u64::from_str_radix(digits, 16) {
            Ok(0) | Err(_) => Err(InvalidVersionTag(s.to_string())),
            Ok(n) => Ok(Self(n)),
        }
    }
}
