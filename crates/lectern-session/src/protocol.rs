//! Wire protocol for the data channel (JSON text frames).
//!
//! Outbound frames are [`ClientFrame`]; inbound frames are [`ServerEvent`].
//! Both are internally tagged on `type`. The server's event vocabulary is
//! open-ended: kinds this client does not recognize deserialize to
//! [`ServerEvent::Unknown`] and are ignored, so new server releases
//! degrade gracefully instead of breaking dispatch.

use serde::{Deserialize, Serialize};

/// Outbound frames sent over the data channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientFrame {
    /// Appends one user message to the conversation.
    #[serde(rename = "conversation.item.create")]
    ConversationItemCreate { item: ConversationItem },

    /// Asks the remote service to produce a response. Always sent
    /// immediately after a `conversation.item.create`.
    #[serde(rename = "response.create")]
    ResponseCreate,
}

impl ClientFrame {
    /// Builds the item-create frame for one user message.
    pub fn user_message(content: Vec<ContentPart>) -> Self {
        Self::ConversationItemCreate {
            item: ConversationItem {
                kind: "message".to_string(),
                role: "user".to_string(),
                content,
            },
        }
    }
}

/// One conversation item carried by `conversation.item.create`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationItem {
    #[serde(rename = "type")]
    pub kind: String,
    pub role: String,
    pub content: Vec<ContentPart>,
}

/// One content part of a user message: typed text or an image data URI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContentPart {
    #[serde(rename = "input_text")]
    InputText { text: String },
    #[serde(rename = "input_image")]
    InputImage { image_url: String },
}

/// Inbound events from the remote service.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// The session is ready for input.
    #[serde(rename = "session.created")]
    SessionCreated,

    /// The remote voice-activity detector heard the user start speaking.
    #[serde(rename = "input_audio_buffer.speech_started")]
    SpeechStarted,

    /// A response cycle has started; the transcript buffer resets.
    #[serde(rename = "response.created")]
    ResponseCreated,

    /// An incremental transcript fragment of the spoken response.
    #[serde(rename = "response.output_audio_transcript.delta")]
    TranscriptDelta { delta: String },

    /// An output-audio fragment is arriving.
    #[serde(rename = "response.output_audio.delta")]
    AudioDelta,

    /// Output audio for the current response is complete.
    #[serde(rename = "response.output_audio.done")]
    AudioDone,

    /// The response cycle completed.
    #[serde(rename = "response.done")]
    ResponseDone,

    /// The response cycle was cancelled remotely.
    #[serde(rename = "response.cancelled")]
    ResponseCancelled,

    /// The remote service reported a protocol error.
    #[serde(rename = "error")]
    Error {
        #[serde(default)]
        error: ErrorDetail,
    },

    /// Any event kind this client does not recognize.
    #[serde(other)]
    Unknown,
}

/// Payload of a remote `error` event.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorDetail {
    #[serde(default)]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_message_frame_shape() {
        let frame = ClientFrame::user_message(vec![ContentPart::InputText {
            text: "2+2".to_string(),
        }]);
        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(value["type"], "conversation.item.create");
        assert_eq!(value["item"]["type"], "message");
        assert_eq!(value["item"]["role"], "user");
        assert_eq!(value["item"]["content"][0]["type"], "input_text");
        assert_eq!(value["item"]["content"][0]["text"], "2+2");
    }

    #[test]
    fn response_create_frame_shape() {
        let value = serde_json::to_value(&ClientFrame::ResponseCreate).unwrap();
        assert_eq!(value["type"], "response.create");
    }

    #[test]
    fn image_part_carries_data_uri() {
        let frame = ClientFrame::user_message(vec![ContentPart::InputImage {
            image_url: "data:image/png;base64,AAAA".to_string(),
        }]);
        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(value["item"]["content"][0]["type"], "input_image");
        assert_eq!(value["item"]["content"][0]["image_url"], "data:image/png;base64,AAAA");
    }

    #[test]
    fn transcript_delta_parses() {
        let event: ServerEvent = serde_json::from_str(
            r#"{"type":"response.output_audio_transcript.delta","delta":" is 4"}"#,
        )
        .unwrap();
        assert!(matches!(event, ServerEvent::TranscriptDelta { ref delta } if delta == " is 4"));
    }

    #[test]
    fn error_event_parses_with_and_without_message() {
        let event: ServerEvent =
            serde_json::from_str(r#"{"type":"error","error":{"message":"bad frame"}}"#).unwrap();
        match event {
            ServerEvent::Error { error } => assert_eq!(error.message.as_deref(), Some("bad frame")),
            other => panic!("unexpected event: {other:?}"),
        }

        let event: ServerEvent = serde_json::from_str(r#"{"type":"error"}"#).unwrap();
        match event {
            ServerEvent::Error { error } => assert_eq!(error.message, None),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn unrecognized_kind_maps_to_unknown() {
        let event: ServerEvent =
            serde_json::from_str(r#"{"type":"rate_limits.updated","limits":[]}"#).unwrap();
        assert!(matches!(event, ServerEvent::Unknown));
    }

    #[test]
    fn extra_fields_are_ignored() {
        let event: ServerEvent = serde_json::from_str(
            r#"{"type":"response.done","response":{"id":"resp_1","status":"completed"}}"#,
        )
        .unwrap();
        assert!(matches!(event, ServerEvent::ResponseDone));
    }
}
