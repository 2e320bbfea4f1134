//! Attachment media types and the pending-attachment buffer.
//!
//! The file input surface accepts three image formats plus PDF. A PDF is
//! not sent as-is: the front-end rasterizes a single page to PNG before it
//! enters the image path, so [`MediaType::Pdf`] exists only to mark that
//! boundary ([`MediaType::needs_render`]).

use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum attachment size: 10 MiB.
const MAX_ATTACHMENT_BYTES: usize = 10 * 1024 * 1024;

/// Errors produced when constructing a pending attachment.
#[derive(Debug, Error)]
pub enum AttachmentError {
    #[error("attachment exceeds maximum size: {0} bytes (limit: {MAX_ATTACHMENT_BYTES} bytes)")]
    TooLarge(usize),

    #[error("unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("could not detect media type from file contents")]
    UnknownMediaType,
}

/// Media types accepted by the file input surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Png,
    Jpeg,
    Webp,
    Pdf,
}

impl MediaType {
    /// Returns the MIME type string.
    pub fn as_mime(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Webp => "image/webp",
            Self::Pdf => "application/pdf",
        }
    }

    /// Attempts to convert a MIME type string to a `MediaType`.
    ///
    /// Returns `None` if the MIME type is not accepted.
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime {
            "image/png" => Some(Self::Png),
            "image/jpeg" => Some(Self::Jpeg),
            "image/webp" => Some(Self::Webp),
            "application/pdf" => Some(Self::Pdf),
            _ => None,
        }
    }

    /// Detects the media type from the first bytes of a file.
    pub fn detect(data: &[u8]) -> Option<Self> {
        if data.len() >= 8 && data[..8] == [137, 80, 78, 71, 13, 10, 26, 10] {
            Some(Self::Png)
        } else if data.len() >= 2 && data[0] == 0xFF && data[1] == 0xD8 {
            Some(Self::Jpeg)
        } else if data.len() >= 12 && &data[..4] == b"RIFF" && &data[8..12] == b"WEBP" {
            Some(Self::Webp)
        } else if data.len() >= 5 && &data[..5] == b"%PDF-" {
            Some(Self::Pdf)
        } else {
            None
        }
    }

    /// Whether this type must be rasterized before it can be sent.
    ///
    /// True only for PDF: a single page is rendered to PNG upstream of the
    /// attachment surface, after which the file re-enters as `Png`.
    pub fn needs_render(self) -> bool {
        matches!(self, Self::Pdf)
    }
}

/// An in-memory attachment held between file selection and send.
///
/// Cleared on send or explicit removal; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAttachment {
    data: Vec<u8>,
    media_type: MediaType,
}

impl PendingAttachment {
    /// Creates a pending attachment, detecting the media type from the
    /// file contents.
    ///
    /// # Errors
    ///
    /// Returns [`AttachmentError::TooLarge`] above the 10 MiB cap and
    /// [`AttachmentError::UnknownMediaType`] when the contents match no
    /// accepted format.
    pub fn new(data: Vec<u8>) -> Result<Self, AttachmentError> {
        if data.len() > MAX_ATTACHMENT_BYTES {
            return Err(AttachmentError::TooLarge(data.len()));
        }
        let media_type = MediaType::detect(&data).ok_or(AttachmentError::UnknownMediaType)?;
        Ok(Self { data, media_type })
    }

    /// Creates a pending attachment with a caller-supplied MIME type.
    ///
    /// The declared type must be one of the accepted formats; the bytes
    /// are not re-sniffed.
    pub fn with_mime(data: Vec<u8>, mime: &str) -> Result<Self, AttachmentError> {
        if data.len() > MAX_ATTACHMENT_BYTES {
            return Err(AttachmentError::TooLarge(data.len()));
        }
        let media_type = MediaType::from_mime(mime)
            .ok_or_else(|| AttachmentError::UnsupportedMediaType(mime.to_string()))?;
        Ok(Self { data, media_type })
    }

    pub fn media_type(&self) -> MediaType {
        self.media_type
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Encodes the attachment as a `data:` URI for the wire protocol.
    ///
    /// Returns `None` when the media type still needs rendering (PDF) —
    /// such attachments never reach the wire directly.
    pub fn data_uri(&self) -> Option<String> {
        if self.media_type.needs_render() {
            return None;
        }
        let payload = base64::engine::general_purpose::STANDARD.encode(&self.data);
        Some(format!("data:{};base64,{}", self.media_type.as_mime(), payload))
    }
}
