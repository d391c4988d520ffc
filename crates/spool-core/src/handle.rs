//! Stable particle handles

use serde::{Deserialize, Serialize};
use std::fmt;

/// A stable reference to a particle slot in a chain's arena.
///
/// Unlike a positional index along the rope, a handle never changes when new
/// particles are spliced in ahead of it. Handles are only invalidated by a full
/// chain reset, which drops the whole arena.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticleHandle(pub u32);

impl ParticleHandle {
    /// Create a handle from a raw arena slot (for arena internals/testing)
    pub fn from_raw(slot: u32) -> Self {
        Self(slot)
    }

    pub fn slot(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for ParticleHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ParticleHandle({})", self.0)
    }
}

impl fmt::Display for ParticleHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_raw() {
        let h = ParticleHandle::from_raw(42);
        assert_eq!(h.slot(), 42);
        assert_eq!(format!("{h}"), "#42");
    }
}
