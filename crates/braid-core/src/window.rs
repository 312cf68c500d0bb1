//! Non-ancient event window
//!
//! The moving boundary below which events are no longer tracked. The
//! window only ever advances; the orphan buffer validates monotonicity
//! whenever a replacement window is handed in.

use serde::{Deserialize, Serialize};

use crate::types::{constants, Generation};

/// NonAncientWindow - Immutable value describing the oldest generation
/// still relevant to this node
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NonAncientWindow {
    /// The lowest generation still considered non-ancient
    threshold_generation: Generation,
}

impl NonAncientWindow {
    pub fn new(threshold_generation: Generation) -> Self {
        Self {
            threshold_generation,
        }
    }

    /// The window at node start, before any rounds have completed:
    /// nothing is ancient
    pub fn genesis() -> Self {
        Self {
            threshold_generation: constants::FIRST_GENERATION,
        }
    }

    pub fn threshold_generation(&self) -> Generation {
        self.threshold_generation
    }

    /// An event is ancient when its generation fell below the threshold
    pub fn is_ancient(&self, generation: Generation) -> bool {
        generation < self.threshold_generation
    }
}

impl Default for NonAncientWindow {
    fn default() -> Self {
        Self::genesis()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_genesis_window_nothing_ancient() {
        let window = NonAncientWindow::genesis();
        assert!(!window.is_ancient(constants::FIRST_GENERATION));
        assert!(!window.is_ancient(100));
    }

    #[test]
    fn test_threshold_boundary() {
        let window = NonAncientWindow::new(5);
        assert!(window.is_ancient(4));
        assert!(!window.is_ancient(5));
        assert!(!window.is_ancient(6));
    }
}
