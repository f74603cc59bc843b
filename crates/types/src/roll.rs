//! Roll identifiers.
//!
//! A roll is an indivisible staking unit worth `tokens_per_roll`. Rolls are
//! numbered by a monotonic 32-bit counter and never renumbered; a freed
//! roll goes to the limbo freelist and keeps its id.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An opaque roll id.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Roll(pub u32);

impl Roll {
    /// The first roll ever allocated.
    pub const FIRST: Self = Self(0);

    /// The next roll id after this one.
    pub fn succ(self) -> Self {
        Self(self.0 + 1)
    }

    /// The raw id.
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Roll {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "roll {}", self.0)
    }
}
