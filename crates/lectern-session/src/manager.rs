//! The session manager: lifecycle, send operations, and event dispatch.

use crate::error::SessionError;
use crate::link::{CredentialSource, PeerLink};
use crate::negotiation;
use crate::protocol::{ClientFrame, ContentPart, ServerEvent};
use lectern_types::{ConversationPhase, PendingAttachment};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

/// Capacity of the session-update broadcast channel.
const UPDATE_BROADCAST_CAPACITY: usize = 256;

/// Message delivered when a remote error event carries no message field.
const FALLBACK_ERROR_MESSAGE: &str = "The tutor hit an unexpected error. Please reconnect.";

/// Remote-service endpoints and session parameters.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Session-creation endpoint the offer is posted to.
    pub negotiation_url: String,
    /// Realtime model requested during negotiation.
    pub model: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            negotiation_url: "https://api.openai.com/v1/realtime/calls".to_string(),
            model: "gpt-realtime".to_string(),
        }
    }
}

/// Observable updates published by the manager.
///
/// Phase changes and transcript fragments drive the UI; `Error` is the
/// single error-delivery path for remote error events, emitted exactly
/// once per event.
#[derive(Debug, Clone)]
pub enum SessionUpdate {
    Phase(ConversationPhase),
    TranscriptDelta(String),
    Error(String),
}

/// Owns at most one live session to the remote realtime service.
///
/// The embedding runtime holds the manager in a `tokio::sync::Mutex` and
/// drives it from transport callbacks: [`SessionManager::connect`] for the
/// connect flow, the send operations, and
/// [`handle_event`](Self::handle_event) for inbound frames, in the order
/// the transport delivers them. Lock acquisitions are brief state
/// mutations that never span `.await` points; the slow connect steps run
/// unlocked, which is exactly why the generation counter exists.
pub struct SessionManager {
    config: SessionConfig,
    credentials: Arc<dyn CredentialSource>,
    http: reqwest::Client,
    link: Option<Box<dyn PeerLink>>,
    phase: ConversationPhase,
    transcript: String,
    /// Bumped on every connect and disconnect. A connect attempt re-checks
    /// this after each await so results arriving after a disconnect tore
    /// the session down are discarded instead of resurrecting it.
    generation: u64,
    update_tx: broadcast::Sender<SessionUpdate>,
}

impl SessionManager {
    pub fn new(config: SessionConfig, credentials: Arc<dyn CredentialSource>) -> Self {
        let (update_tx, _) = broadcast::channel(UPDATE_BROADCAST_CAPACITY);
        Self {
            config,
            credentials,
            http: reqwest::Client::new(),
            link: None,
            phase: ConversationPhase::Idle,
            transcript: String::new(),
            generation: 0,
            update_tx,
        }
    }

    /// Subscribes to phase changes, transcript fragments, and errors.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionUpdate> {
        self.update_tx.subscribe()
    }

    pub fn phase(&self) -> ConversationPhase {
        self.phase
    }

    /// The transcript accumulated for the current response cycle.
    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    /// Establishes a session over the given link.
    ///
    /// Acquires the microphone, mints an ephemeral credential, and
    /// exchanges connection descriptions with the remote service. The
    /// observable phase is `thinking` for the whole of negotiation and
    /// becomes `listening` when [`channel_opened`](Self::channel_opened)
    /// fires, or on return when the channel already opened during
    /// negotiation.
    ///
    /// The manager lock is held only between awaits. A
    /// [`disconnect`](Self::disconnect) issued while a step is in flight
    /// supersedes the attempt: the link is released and
    /// [`SessionError::Superseded`] is returned instead of installing a
    /// session the user already tore down.
    ///
    /// # Errors
    ///
    /// - [`SessionError::AlreadyConnected`] if a session is live
    /// - [`SessionError::Device`] if microphone access fails
    /// - [`SessionError::Credential`] if the mint step fails
    /// - [`SessionError::Negotiation`] if the exchange fails or times out
    /// - [`SessionError::Superseded`] if a disconnect raced this connect
    pub async fn connect(
        manager: &Mutex<Self>,
        mut link: Box<dyn PeerLink>,
    ) -> Result<(), SessionError> {
        let (attempt, config, credentials, http) = {
            let mut m = manager.lock().await;
            if m.link.is_some() {
                return Err(SessionError::AlreadyConnected);
            }
            m.generation += 1;
            m.set_phase(ConversationPhase::Thinking);
            (
                m.generation,
                m.config.clone(),
                m.credentials.clone(),
                m.http.clone(),
            )
        };

        let result = async {
            link.acquire_microphone().await?;
            Self::check_attempt(manager, attempt).await?;

            let token = credentials.mint().await?;
            Self::check_attempt(manager, attempt).await?;

            let offer = link.create_offer().await?;
            Self::check_attempt(manager, attempt).await?;

            let answer = negotiation::exchange_offer(
                &http,
                &config.negotiation_url,
                &config.model,
                &token,
                &offer,
            )
            .await?;
            Self::check_attempt(manager, attempt).await?;

            link.apply_answer(&answer).await?;
            Ok(())
        }
        .await;

        let mut m = manager.lock().await;
        match result {
            Ok(()) if m.generation == attempt => {
                info!(model = %config.model, "session negotiated");
                // The channel may have opened before the link was
                // installed; the open notification fired into a manager
                // that had no link yet and was lost.
                let already_open = link.channel_open();
                m.link = Some(link);
                if already_open {
                    m.set_phase(ConversationPhase::Listening);
                }
                Ok(())
            }
            Ok(()) => {
                // Negotiation finished after a disconnect tore us down.
                link.close();
                Err(SessionError::Superseded)
            }
            Err(e) => {
                link.close();
                if m.generation == attempt {
                    m.set_phase(ConversationPhase::Idle);
                }
                Err(e)
            }
        }
    }

    /// Fails with [`SessionError::Superseded`] when a disconnect has
    /// invalidated the given connect attempt.
    async fn check_attempt(manager: &Mutex<Self>, attempt: u64) -> Result<(), SessionError> {
        if manager.lock().await.generation != attempt {
            Err(SessionError::Superseded)
        } else {
            Ok(())
        }
    }

    /// The data channel opened: the session is ready for input.
    pub fn channel_opened(&mut self) {
        if self.link.is_some() {
            info!("data channel open");
            self.set_phase(ConversationPhase::Listening);
        }
    }

    /// The data channel closed without a disconnect request.
    pub fn channel_closed(&mut self) {
        if self.link.is_some() {
            warn!("data channel closed unexpectedly");
            self.disconnect();
        }
    }

    /// Sends typed text and requests a response.
    pub fn send_text(&mut self, text: &str) -> Result<(), SessionError> {
        self.send_parts(vec![ContentPart::InputText {
            text: text.to_string(),
        }])
    }

    /// Sends an image attachment and requests a response.
    pub fn send_image(&mut self, attachment: &PendingAttachment) -> Result<(), SessionError> {
        self.send_parts(vec![Self::image_part(attachment)?])
    }

    /// Sends typed text together with an image attachment and requests a
    /// response.
    pub fn send_text_with_image(
        &mut self,
        text: &str,
        attachment: &PendingAttachment,
    ) -> Result<(), SessionError> {
        self.send_parts(vec![
            ContentPart::InputText {
                text: text.to_string(),
            },
            Self::image_part(attachment)?,
        ])
    }

    fn image_part(attachment: &PendingAttachment) -> Result<ContentPart, SessionError> {
        let image_url = attachment
            .data_uri()
            .ok_or(SessionError::AttachmentNotRenderable)?;
        Ok(ContentPart::InputImage { image_url })
    }

    /// Composes one `conversation.item.create` then one `response.create`,
    /// in that fixed order, and optimistically moves to `thinking`.
    ///
    /// The phase transition does not wait for any acknowledgment; a later
    /// server event (or error) corrects it. A closed channel is a reported
    /// error, not a silent drop.
    fn send_parts(&mut self, content: Vec<ContentPart>) -> Result<(), SessionError> {
        let link = self.link.as_mut().ok_or(SessionError::ChannelClosed)?;
        if !link.channel_open() {
            return Err(SessionError::ChannelClosed);
        }

        let item = serde_json::to_string(&ClientFrame::user_message(content))?;
        let respond = serde_json::to_string(&ClientFrame::ResponseCreate)?;
        link.send_frame(&item)?;
        link.send_frame(&respond)?;

        self.set_phase(ConversationPhase::Thinking);
        Ok(())
    }

    /// Dispatches one inbound data-channel frame.
    ///
    /// Unrecognized event kinds are ignored; malformed JSON is logged and
    /// ignored. A remote `error` event tears the session down and
    /// publishes exactly one [`SessionUpdate::Error`].
    ///
    /// Frames delivered with no live session are dropped. A channel that
    /// was torn down can still have frames in flight, and a straggler
    /// from the dead session must not move the phase out of `idle` or
    /// tear down a connect attempt that is under way.
    pub fn handle_event(&mut self, raw: &str) {
        if self.link.is_none() {
            debug!("ignoring server frame with no live session");
            return;
        }

        let event: ServerEvent = match serde_json::from_str(raw) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "ignoring malformed server frame");
                return;
            }
        };

        match event {
            ServerEvent::SessionCreated => {
                self.set_phase(ConversationPhase::Listening);
            }
            ServerEvent::SpeechStarted => {
                // Confirmation only: the session was already listening.
                self.set_phase(ConversationPhase::Listening);
            }
            ServerEvent::ResponseCreated => {
                self.transcript.clear();
                self.set_phase(ConversationPhase::Thinking);
            }
            ServerEvent::TranscriptDelta { delta } => {
                self.transcript.push_str(&delta);
                let _ = self.update_tx.send(SessionUpdate::TranscriptDelta(delta));
            }
            ServerEvent::AudioDelta => {
                self.set_phase(ConversationPhase::Speaking);
            }
            ServerEvent::AudioDone | ServerEvent::ResponseDone | ServerEvent::ResponseCancelled => {
                self.set_phase(ConversationPhase::Listening);
            }
            ServerEvent::Error { error } => {
                let message = error
                    .message
                    .unwrap_or_else(|| FALLBACK_ERROR_MESSAGE.to_string());
                warn!(message = %message, "remote service reported an error");
                self.teardown();
                let _ = self.update_tx.send(SessionUpdate::Error(message));
            }
            ServerEvent::Unknown => {
                debug!("ignoring unrecognized server event kind");
            }
        }
    }

    /// Tears the session down and returns to `idle`. Idempotent: calling
    /// it with no live session and no connect in flight does nothing.
    pub fn disconnect(&mut self) {
        if self.link.is_none() && self.phase == ConversationPhase::Idle {
            return;
        }
        info!("disconnecting session");
        self.teardown();
    }

    fn teardown(&mut self) {
        if let Some(mut link) = self.link.take() {
            link.close();
        }
        // Invalidate any connect attempt still in flight.
        self.generation += 1;
        self.set_phase(ConversationPhase::Idle);
    }

    fn set_phase(&mut self, phase: ConversationPhase) {
        if self.phase != phase {
            debug!(from = %self.phase, to = %phase, "phase transition");
            self.phase = phase;
            let _ = self.update_tx.send(SessionUpdate::Phase(phase));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SessionError;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;

    /// Link fake recording every frame sent through it.
    #[derive(Default)]
    struct FakeLink {
        frames: Arc<StdMutex<Vec<String>>>,
        open: bool,
        closed: Arc<StdMutex<u32>>,
        deny_microphone: bool,
        /// When set, the channel opens as soon as the answer is applied,
        /// before `connect` regains the lock.
        open_on_answer: bool,
        /// When set, `create_offer` parks until the sender fires.
        offer_gate: Option<tokio::sync::oneshot::Receiver<()>>,
    }

    impl FakeLink {
        fn recording(frames: Arc<StdMutex<Vec<String>>>) -> Self {
            Self {
                frames,
                open: true,
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl PeerLink for FakeLink {
        async fn acquire_microphone(&mut self) -> Result<(), SessionError> {
            if self.deny_microphone {
                Err(SessionError::Device("permission denied".to_string()))
            } else {
                Ok(())
            }
        }

        async fn create_offer(&mut self) -> Result<String, SessionError> {
            if let Some(gate) = self.offer_gate.take() {
                let _ = gate.await;
            }
            Ok("v=0\r\no=- 0 0 IN IP4 127.0.0.1\r\n".to_string())
        }

        async fn apply_answer(&mut self, _answer: &str) -> Result<(), SessionError> {
            if self.open_on_answer {
                self.open = true;
            }
            Ok(())
        }

        fn send_frame(&mut self, frame: &str) -> Result<(), SessionError> {
            if !self.open {
                return Err(SessionError::ChannelClosed);
            }
            self.frames.lock().unwrap().push(frame.to_string());
            Ok(())
        }

        fn channel_open(&self) -> bool {
            self.open
        }

        fn close(&mut self) {
            self.open = false;
            *self.closed.lock().unwrap() += 1;
        }
    }

    struct FakeCredentials;

    #[async_trait]
    impl CredentialSource for FakeCredentials {
        async fn mint(&self) -> Result<String, SessionError> {
            Ok("ek_test".to_string())
        }
    }

    /// Spawns a stub session-creation endpoint returning a fixed answer
    /// and builds a config pointing at it.
    async fn stub_negotiation_config() -> SessionConfig {
        async fn answer(_offer: String) -> String {
            "v=0\r\no=- 0 0 IN IP4 0.0.0.0\r\n".to_string()
        }

        let app = axum::Router::new().route("/v1/realtime/calls", axum::routing::post(answer));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        SessionConfig {
            negotiation_url: format!("http://{addr}/v1/realtime/calls"),
            model: "gpt-realtime".to_string(),
        }
    }

    /// Builds a manager with a live fake link already installed, skipping
    /// the network-touching connect path.
    fn live_manager() -> (SessionManager, Arc<StdMutex<Vec<String>>>) {
        let frames = Arc::new(StdMutex::new(Vec::new()));
        let mut manager = SessionManager::new(SessionConfig::default(), Arc::new(FakeCredentials));
        manager.link = Some(Box::new(FakeLink::recording(frames.clone())));
        manager.channel_opened();
        (manager, frames)
    }

    #[test]
    fn send_text_transitions_to_thinking_immediately() {
        let (mut manager, frames) = live_manager();
        assert_eq!(manager.phase(), ConversationPhase::Listening);

        manager.send_text("2+2").unwrap();

        assert_eq!(manager.phase(), ConversationPhase::Thinking);
        let frames = frames.lock().unwrap();
        assert_eq!(frames.len(), 2);
    }

    #[test]
    fn send_enqueues_item_create_then_response_create() {
        let (mut manager, frames) = live_manager();
        manager.send_text("2+2").unwrap();

        let frames = frames.lock().unwrap();
        let first: serde_json::Value = serde_json::from_str(&frames[0]).unwrap();
        let second: serde_json::Value = serde_json::from_str(&frames[1]).unwrap();
        assert_eq!(first["type"], "conversation.item.create");
        assert_eq!(first["item"]["content"][0]["text"], "2+2");
        assert_eq!(second["type"], "response.create");
    }

    #[test]
    fn send_on_closed_channel_is_a_reported_error() {
        let mut manager = SessionManager::new(SessionConfig::default(), Arc::new(FakeCredentials));
        let result = manager.send_text("hello");
        assert!(matches!(result, Err(SessionError::ChannelClosed)));
        assert_eq!(manager.phase(), ConversationPhase::Idle);
    }

    #[test]
    fn send_image_composes_data_uri_part() {
        let (mut manager, frames) = live_manager();
        let png = {
            let mut data = vec![137, 80, 78, 71, 13, 10, 26, 10];
            data.extend_from_slice(&[0, 0, 0, 0]);
            data
        };
        let attachment = PendingAttachment::new(png).unwrap();

        manager.send_image(&attachment).unwrap();

        let frames = frames.lock().unwrap();
        let first: serde_json::Value = serde_json::from_str(&frames[0]).unwrap();
        assert_eq!(first["item"]["content"][0]["type"], "input_image");
        let url = first["item"]["content"][0]["image_url"].as_str().unwrap();
        assert!(url.starts_with("data:image/png;base64,"));
    }

    #[test]
    fn send_text_with_image_carries_both_parts() {
        let (mut manager, frames) = live_manager();
        let attachment =
            PendingAttachment::with_mime(vec![0xFF, 0xD8, 0xFF, 0xE0], "image/jpeg").unwrap();

        manager
            .send_text_with_image("what is this?", &attachment)
            .unwrap();

        let frames = frames.lock().unwrap();
        let first: serde_json::Value = serde_json::from_str(&frames[0]).unwrap();
        let content = first["item"]["content"].as_array().unwrap();
        assert_eq!(content.len(), 2);
        assert_eq!(content[0]["type"], "input_text");
        assert_eq!(content[1]["type"], "input_image");
    }

    #[test]
    fn unrendered_pdf_attachment_is_rejected() {
        let (mut manager, _) = live_manager();
        let attachment =
            PendingAttachment::with_mime(b"%PDF-1.4".to_vec(), "application/pdf").unwrap();
        let result = manager.send_image(&attachment);
        assert!(matches!(result, Err(SessionError::AttachmentNotRenderable)));
    }

    #[test]
    fn response_created_resets_transcript() {
        let (mut manager, _) = live_manager();
        manager.handle_event(r#"{"type":"response.output_audio_transcript.delta","delta":"old"}"#);
        assert_eq!(manager.transcript(), "old");

        manager.handle_event(r#"{"type":"response.created"}"#);
        assert_eq!(manager.transcript(), "");
        assert_eq!(manager.phase(), ConversationPhase::Thinking);
    }

    #[test]
    fn audio_delta_moves_to_speaking_and_done_back_to_listening() {
        let (mut manager, _) = live_manager();
        manager.handle_event(r#"{"type":"response.created"}"#);
        manager.handle_event(r#"{"type":"response.output_audio.delta"}"#);
        assert_eq!(manager.phase(), ConversationPhase::Speaking);

        manager.handle_event(r#"{"type":"response.done"}"#);
        assert_eq!(manager.phase(), ConversationPhase::Listening);
    }

    #[test]
    fn cancelled_response_returns_to_listening() {
        let (mut manager, _) = live_manager();
        manager.handle_event(r#"{"type":"response.created"}"#);
        manager.handle_event(r#"{"type":"response.cancelled"}"#);
        assert_eq!(manager.phase(), ConversationPhase::Listening);
    }

    #[test]
    fn error_event_reaches_idle_with_exactly_one_error_update() {
        for setup in [
            r#"{"type":"session.created"}"#,             // listening
            r#"{"type":"response.created"}"#,            // thinking
            r#"{"type":"response.output_audio.delta"}"#, // speaking
        ] {
            let (mut manager, _) = live_manager();
            manager.handle_event(setup);
            let mut rx = manager.subscribe();

            manager.handle_event(r#"{"type":"error","error":{"message":"session expired"}}"#);

            assert_eq!(manager.phase(), ConversationPhase::Idle);
            let mut errors = 0;
            while let Ok(update) = rx.try_recv() {
                if let SessionUpdate::Error(message) = update {
                    assert_eq!(message, "session expired");
                    errors += 1;
                }
            }
            assert_eq!(errors, 1);
        }
    }

    #[test]
    fn error_event_without_message_uses_fallback() {
        let (mut manager, _) = live_manager();
        let mut rx = manager.subscribe();

        manager.handle_event(r#"{"type":"error"}"#);

        let mut saw_fallback = false;
        while let Ok(update) = rx.try_recv() {
            if let SessionUpdate::Error(message) = update {
                assert_eq!(message, FALLBACK_ERROR_MESSAGE);
                saw_fallback = true;
            }
        }
        assert!(saw_fallback);
    }

    #[test]
    fn unknown_event_kinds_are_ignored() {
        let (mut manager, _) = live_manager();
        manager.handle_event(r#"{"type":"rate_limits.updated"}"#);
        manager.handle_event("not json at all");
        assert_eq!(manager.phase(), ConversationPhase::Listening);
    }

    #[test]
    fn straggler_events_with_no_live_session_are_dropped() {
        let mut manager = SessionManager::new(SessionConfig::default(), Arc::new(FakeCredentials));
        let mut rx = manager.subscribe();

        // Frames from a channel that no longer exists must not move the
        // phase or publish anything.
        manager.handle_event(r#"{"type":"session.created"}"#);
        manager.handle_event(r#"{"type":"error","error":{"message":"stale"}}"#);

        assert_eq!(manager.phase(), ConversationPhase::Idle);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn straggler_events_after_disconnect_are_dropped() {
        let (mut manager, _) = live_manager();
        manager.disconnect();
        let mut rx = manager.subscribe();

        manager.handle_event(r#"{"type":"session.created"}"#);
        manager.handle_event(r#"{"type":"response.output_audio_transcript.delta","delta":"x"}"#);

        assert_eq!(manager.phase(), ConversationPhase::Idle);
        assert_eq!(manager.transcript(), "");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn speech_started_is_a_listening_confirmation() {
        let (mut manager, _) = live_manager();
        let mut rx = manager.subscribe();
        manager.handle_event(r#"{"type":"input_audio_buffer.speech_started"}"#);
        assert_eq!(manager.phase(), ConversationPhase::Listening);
        // No phase change was published: the phase did not move.
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn disconnect_is_idempotent() {
        let (mut manager, _) = live_manager();
        manager.disconnect();
        assert_eq!(manager.phase(), ConversationPhase::Idle);

        let mut rx = manager.subscribe();
        manager.disconnect();
        assert_eq!(manager.phase(), ConversationPhase::Idle);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn channel_close_tears_down_session() {
        let (mut manager, _) = live_manager();
        manager.channel_closed();
        assert_eq!(manager.phase(), ConversationPhase::Idle);

        let result = manager.send_text("anyone there?");
        assert!(matches!(result, Err(SessionError::ChannelClosed)));
    }

    #[tokio::test]
    async fn second_connect_while_live_is_rejected() {
        let (manager, _) = live_manager();
        let manager = Mutex::new(manager);
        let result = SessionManager::connect(&manager, Box::new(FakeLink::default())).await;
        assert!(matches!(result, Err(SessionError::AlreadyConnected)));
    }

    #[tokio::test]
    async fn microphone_denial_surfaces_device_error() {
        let manager = Mutex::new(SessionManager::new(
            SessionConfig::default(),
            Arc::new(FakeCredentials),
        ));
        let link = FakeLink {
            deny_microphone: true,
            ..Default::default()
        };
        let closed = link.closed.clone();

        let result = SessionManager::connect(&manager, Box::new(link)).await;

        assert!(matches!(result, Err(SessionError::Device(_))));
        let manager = manager.into_inner();
        assert_eq!(manager.phase(), ConversationPhase::Idle);
        // The link was released on the error path.
        assert_eq!(*closed.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn failed_credential_mint_surfaces_credential_error() {
        struct FailingCredentials;

        #[async_trait]
        impl CredentialSource for FailingCredentials {
            async fn mint(&self) -> Result<String, SessionError> {
                Err(SessionError::Credential("upstream 500".to_string()))
            }
        }

        let manager = Mutex::new(SessionManager::new(
            SessionConfig::default(),
            Arc::new(FailingCredentials),
        ));
        let result = SessionManager::connect(&manager, Box::new(FakeLink::default())).await;

        assert!(matches!(result, Err(SessionError::Credential(_))));
        assert_eq!(manager.into_inner().phase(), ConversationPhase::Idle);
    }

    #[tokio::test]
    async fn disconnect_supersedes_inflight_connect() {
        let manager = Arc::new(Mutex::new(SessionManager::new(
            SessionConfig::default(),
            Arc::new(FakeCredentials),
        )));
        let (gate_tx, gate_rx) = tokio::sync::oneshot::channel();
        let link = FakeLink {
            offer_gate: Some(gate_rx),
            ..Default::default()
        };
        let closed = link.closed.clone();

        let task = tokio::spawn({
            let manager = manager.clone();
            async move { SessionManager::connect(&manager, Box::new(link)).await }
        });

        // Wait until the connect attempt is underway.
        loop {
            if manager.lock().await.phase() == ConversationPhase::Thinking {
                break;
            }
            tokio::task::yield_now().await;
        }

        manager.lock().await.disconnect();
        gate_tx.send(()).unwrap();

        let result = task.await.unwrap();
        assert!(matches!(result, Err(SessionError::Superseded)));
        // The late-arriving connect released its link instead of
        // resurrecting the session.
        assert_eq!(*closed.lock().unwrap(), 1);
        let manager = manager.lock().await;
        assert_eq!(manager.phase(), ConversationPhase::Idle);
        assert!(manager.link.is_none());
    }

    #[tokio::test]
    async fn straggler_error_does_not_supersede_inflight_connect() {
        let manager = Arc::new(Mutex::new(SessionManager::new(
            stub_negotiation_config().await,
            Arc::new(FakeCredentials),
        )));
        let (gate_tx, gate_rx) = tokio::sync::oneshot::channel();
        let link = FakeLink {
            offer_gate: Some(gate_rx),
            ..Default::default()
        };

        let task = tokio::spawn({
            let manager = manager.clone();
            async move { SessionManager::connect(&manager, Box::new(link)).await }
        });

        // Wait until the connect attempt is underway.
        loop {
            if manager.lock().await.phase() == ConversationPhase::Thinking {
                break;
            }
            tokio::task::yield_now().await;
        }

        // A queued error frame from the previous session arrives while
        // the new connect is still negotiating. It belongs to a dead
        // channel and must not tear the attempt down.
        manager
            .lock()
            .await
            .handle_event(r#"{"type":"error","error":{"message":"session expired"}}"#);
        gate_tx.send(()).unwrap();

        task.await.unwrap().unwrap();
        let manager = manager.lock().await;
        assert!(manager.link.is_some());
        assert_eq!(manager.phase(), ConversationPhase::Thinking);
    }

    #[tokio::test]
    async fn connect_reports_listening_when_channel_opens_during_negotiation() {
        let manager = Mutex::new(SessionManager::new(
            stub_negotiation_config().await,
            Arc::new(FakeCredentials),
        ));
        let link = FakeLink {
            open_on_answer: true,
            ..Default::default()
        };

        SessionManager::connect(&manager, Box::new(link)).await.unwrap();

        // The open notification raced the link install and never reached
        // channel_opened; connect itself observed the open channel.
        assert_eq!(manager.into_inner().phase(), ConversationPhase::Listening);
    }
}
