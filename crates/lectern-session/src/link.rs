//! Seams between the session manager and its environment.
//!
//! The browser (or embedding runtime) owns the actual WebRTC objects and
//! the token endpoint; the manager only ever talks to them through these
//! two traits. That keeps the state machine testable without a network
//! and pins resource ownership: exactly one [`crate::SessionManager`]
//! owns a [`PeerLink`], and the manager releases it on every exit path.

use crate::error::SessionError;
use async_trait::async_trait;

/// The injected resource context for one peer connection attempt: the
/// microphone capture, the peer connection, the audio sink, and the data
/// channel.
///
/// Implementations wrap the platform's RTC stack. All methods are invoked
/// from the single task driving the manager; no internal locking is
/// required.
#[async_trait]
pub trait PeerLink: Send {
    /// Requests microphone capture.
    ///
    /// # Errors
    ///
    /// [`SessionError::Device`] when permission is denied or no input
    /// device is available.
    async fn acquire_microphone(&mut self) -> Result<(), SessionError>;

    /// Creates the local connection-description offer.
    async fn create_offer(&mut self) -> Result<String, SessionError>;

    /// Applies the remote connection-description answer.
    async fn apply_answer(&mut self, answer: &str) -> Result<(), SessionError>;

    /// Sends one JSON text frame on the data channel, preserving the order
    /// of `send_frame` calls.
    ///
    /// # Errors
    ///
    /// [`SessionError::ChannelClosed`] when the channel is not open.
    fn send_frame(&mut self, frame: &str) -> Result<(), SessionError>;

    /// Whether the data channel is currently open.
    fn channel_open(&self) -> bool;

    /// Tears down the channel, the peer connection, the microphone
    /// capture, and the audio sink. Idempotent.
    fn close(&mut self);
}

/// Mints one ephemeral credential per connect attempt.
///
/// The credential is short-lived, scoped to a single session negotiation,
/// never persisted, and never reused across sessions.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    /// Returns a fresh ephemeral credential.
    ///
    /// # Errors
    ///
    /// [`SessionError::Credential`] when the mint step fails for any
    /// reason.
    async fn mint(&self) -> Result<String, SessionError>;
}
