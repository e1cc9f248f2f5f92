//! Per-tick resolution of competing steering requests.

use serde::{Deserialize, Serialize};

/// Priority attached to every steering call. Higher wins within a tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MoveWeight(pub i32);

impl MoveWeight {
    pub const DEFAULT: MoveWeight = MoveWeight(100);
    /// Calls issued by the path follower.
    pub const NAVIGATOR: MoveWeight = MoveWeight(1_000);
    pub const DODGE: MoveWeight = MoveWeight(2_000);
    pub const STANDARD_JUMPS: MoveWeight = MoveWeight(10_000);
    pub const COUNTERSTRAFE: MoveWeight = MoveWeight(250_000);
    pub const PRIORITY: MoveWeight = MoveWeight(500_000);
    pub const CRITICAL: MoveWeight = MoveWeight(900_000);
}

impl Default for MoveWeight {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Watermark of the heaviest request honored in the current tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MoveGate {
    last: Option<MoveWeight>,
}

impl MoveGate {
    pub fn reset(&mut self) {
        self.last = None;
    }

    /// Returns true and raises the watermark when `weight` is at least the
    /// heaviest request honored so far this tick.
    pub fn admit(&mut self, weight: MoveWeight) -> bool {
        match self.last {
            Some(last) if weight < last => false,
            _ => {
                self.last = Some(weight);
                true
            }
        }
    }

    pub fn last(&self) -> Option<MoveWeight> {
        self.last
    }
}
