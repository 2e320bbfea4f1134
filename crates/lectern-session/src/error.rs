use thiserror::Error;

/// Errors surfaced by the session manager.
///
/// Each variant maps to one boundary of the connect/send lifecycle. None
/// of them is retried automatically; the caller converts the message to a
/// short user-facing string and the user retries manually.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Microphone access was denied or the device is unavailable.
    #[error("microphone unavailable: {0}")]
    Device(String),

    /// The ephemeral-credential mint step failed.
    #[error("could not obtain a session credential: {0}")]
    Credential(String),

    /// The connection-description exchange with the remote service failed
    /// or timed out.
    #[error("connection negotiation failed: {0}")]
    Negotiation(String),

    /// A send was attempted while the data channel is not open.
    #[error("message channel is not open")]
    ChannelClosed,

    /// A connect was requested while a session is already live.
    #[error("a session is already live")]
    AlreadyConnected,

    /// A disconnect superseded this connect attempt while it was in
    /// flight; its late-arriving result was discarded.
    #[error("connect attempt superseded by disconnect")]
    Superseded,

    /// The attachment still needs rasterizing (PDF) and cannot go on the
    /// wire as an image.
    #[error("attachment must be rendered to an image before sending")]
    AttachmentNotRenderable,

    /// A wire frame failed to encode.
    #[error("failed to encode frame: {0}")]
    Encode(#[from] serde_json::Error),
}
