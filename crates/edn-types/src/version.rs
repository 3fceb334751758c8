use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// 0-based position of a version within its history.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VersionId(pub u64);

impl VersionId {
    /// The first version of every history.
    pub const INITIAL: Self = Self(0);

    pub fn value(&self) -> u64 {
        self.0
    }

    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for VersionId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Location of a working copy. Only one location exists.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocationId(u32);

impl LocationId {
    /// The single well-known location every working copy lives at.
    pub const DEFAULT: Self = Self(0);

    pub fn value(&self) -> u32 {
        self.0
    }
}

impl Default for LocationId {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Picks one version out of a history.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Selector {
    /// The most recently appended version.
    #[default]
    Latest,
    /// An explicit version number.
    Version(VersionId),
}

impl Selector {
    /// Resolve against a history of `len` versions.
    ///
    /// Returns `None` when the selector points past the end (or the history
    /// is empty).
    pub fn resolve(&self, len: u64) -> Option<VersionId> {
        match self {
            Self::Latest => len.checked_sub(1).map(VersionId),
            Self::Version(v) if v.0 < len => Some(*v),
            Self::Version(_) => None,
        }
    }
}

impl From<u64> for Selector {
    fn from(value: u64) -> Self {
        Self::Version(VersionId(value))
    }
}

impl From<VersionId> for Selector {
    fn from(value: VersionId) -> Self {
        Self::Version(value)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Latest => f.write_str("latest"),
            Self::Version(v) => write!(f, "{v}"),
        }
    }
}

impl FromStr for Selector {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("latest") {
            return Ok(Self::Latest);
        }
        s.parse::<u64>()
            .map(Self::from)
            .map_err(|_| TypeError::InvalidSelector(s.to_string()))
    }
}
