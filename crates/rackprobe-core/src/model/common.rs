// ── Shared model types ──

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Write priority attached to every discovered fact.
///
/// Each stored field remembers the priority it was last written with. A
/// new write lands only if its priority is at least that high, so a
/// low-confidence source never clobbers data from a better one, while a
/// source re-scanning at its own priority keeps its data fresh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Priority(pub i32);

impl Priority {
    /// Priority used for facts entered by an operator by hand.
    pub const MANUAL: Self = Self(100);

    pub fn value(self) -> i32 {
        self.0
    }

    /// Whether a write at `self` may replace a value stored at `stored`.
    pub fn overrides(self, stored: Option<Self>) -> bool {
        stored.is_none_or(|s| self >= s)
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for Priority {
    fn from(v: i32) -> Self {
        Self(v)
    }
}

/// Firmware facts: section name -> key -> value (e.g. SMBIOS tables).
pub type FirmwareTable = BTreeMap<String, BTreeMap<String, String>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn higher_or_equal_priority_overrides() {
        assert!(Priority(5).overrides(None));
        assert!(Priority(5).overrides(Some(Priority(5))));
        assert!(Priority(5).overrides(Some(Priority(1))));
        assert!(!Priority(5).overrides(Some(Priority(10))));
    }
}
