//! Error types for Braid core operations

use crate::types::{EventHash, Generation};
use thiserror::Error;

/// Result type alias for Braid operations
pub type Result<T> = std::result::Result<T, BraidError>;

/// Errors that can occur in Braid core operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BraidError {
    // === Event intake ===
    /// Event lists itself as a parent; upstream validation should have
    /// caught this, so it indicates a caller bug
    #[error("event {0} lists itself as a parent")]
    SelfReferentialParent(EventHash),

    /// Event is structurally incomplete
    #[error("invalid event: {0}")]
    InvalidEvent(String),

    /// The non-ancient window never moves backward; a lower threshold
    /// means a collaborator violated its invariant
    #[error("non-ancient window moved backward: current threshold {current}, requested {requested}")]
    WindowRegression {
        current: Generation,
        requested: Generation,
    },

    // === Pipeline ===
    /// The intake pipeline has shut down and no longer accepts commands
    #[error("intake pipeline is closed")]
    IntakeClosed,
}

impl BraidError {
    /// Errors that indicate a broken collaborator rather than bad input;
    /// the calling sequence cannot meaningfully continue past them
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::WindowRegression { .. })
    }
}
