use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Wall-clock seconds since UNIX epoch, as stamped into system metadata.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(pub u64);

impl Timestamp {
    pub fn now() -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        Self(secs)
    }

    pub fn as_secs(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Marker recording when a working object was last modified.
///
/// Combines a physical wall-clock component with a logical counter so that two
/// modifications inside the same millisecond still produce distinct, ordered
/// markers.
///
/// Ordering: `physical_ms` → `logical` (total order).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModificationMarker {
    /// Wall-clock milliseconds since UNIX epoch.
    pub physical_ms: u64,
    /// Logical counter for modifications at the same physical time.
    pub logical: u32,
}

impl ModificationMarker {
    pub fn new(physical_ms: u64, logical: u32) -> Self {
        Self {
            physical_ms,
            logical,
        }
    }

    /// A marker for the current wall-clock time.
    pub fn now() -> Self {
        Self {
            physical_ms: now_ms(),
            logical: 0,
        }
    }

    /// The zero marker, used for objects that were never modified.
    pub const fn zero() -> Self {
        Self {
            physical_ms: 0,
            logical: 0,
        }
    }

    /// Produce a marker strictly after this one.
    pub fn advance(&self) -> Self {
        let now = now_ms();
        if now > self.physical_ms {
            Self::new(now, 0)
        } else if self.logical == u32::MAX {
            Self::new(self.physical_ms.saturating_add(1), 0)
        } else {
            Self::new(self.physical_ms, self.logical + 1)
        }
    }

    pub fn is_after(&self, other: &Self) -> bool {
        self > other
    }
}

impl Default for ModificationMarker {
    fn default() -> Self {
        Self::zero()
    }
}

impl PartialOrd for ModificationMarker {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ModificationMarker {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.physical_ms
            .cmp(&other.physical_ms)
            .then(self.logical.cmp(&other.logical))
    }
}

impl fmt::Debug for ModificationMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ModificationMarker({}ms.{})", self.physical_ms, self.logical)
    }
}

impl fmt::Display for ModificationMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.physical_ms, self.logical)
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
