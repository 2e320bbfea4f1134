//! Realtime voice-tutor session management.
//!
//! A session is one live peer audio connection to the remote speech AI
//! service plus one auxiliary data channel carrying JSON text frames. This
//! crate owns the full session lifecycle:
//!
//! - [`SessionManager`] — connect, send (text/image/combined), inbound
//!   event dispatch, disconnect, and the four-phase conversation model
//!   ([`lectern_types::ConversationPhase`]).
//! - [`protocol`] — the wire frames exchanged over the data channel.
//! - [`PeerLink`] — the injected resource context owning the microphone,
//!   peer connection, and data channel. Exactly one manager owns a link.
//! - [`CredentialSource`] — mints one ephemeral credential per connect.
//!
//! The manager never retries anything on its own: every failure is
//! surfaced once and requires explicit user action to retry.

pub mod credentials;
pub mod error;
pub mod link;
pub mod manager;
pub mod negotiation;
pub mod protocol;

pub use credentials::MintEndpointCredentials;
pub use error::SessionError;
pub use link::{CredentialSource, PeerLink};
pub use manager::{SessionConfig, SessionManager, SessionUpdate};
