//! Shared types for the Lectern voice-tutor platform.
//!
//! This crate provides the vocabulary used across all Lectern crates: the
//! observable conversation phase, attachment media types, and the pending
//! attachment held between file selection and send.
//!
//! No crate in the workspace depends on anything *except* `lectern-types`
//! for cross-cutting type definitions. This keeps the dependency graph
//! clean and prevents circular dependencies.

pub mod attachment;

pub use attachment::{AttachmentError, MediaType, PendingAttachment};

use serde::{Deserialize, Serialize};
use std::fmt;

/// The observable phase of a tutoring conversation.
///
/// The session manager collapses its internal lifecycle into these four
/// phases; the front-end renders exactly this model. `Connecting` is not a
/// distinct observable phase — while the peer connection is being
/// negotiated the session reports [`ConversationPhase::Thinking`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationPhase {
    /// No live session.
    Idle,
    /// Session open, waiting for user input.
    Listening,
    /// A response has been requested but no output has arrived yet.
    Thinking,
    /// Output audio is actively arriving.
    Speaking,
}

impl ConversationPhase {
    /// Returns the string label for this phase.
    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Listening => "listening",
            Self::Thinking => "thinking",
            Self::Speaking => "speaking",
        }
    }
}

impl fmt::Display for ConversationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
