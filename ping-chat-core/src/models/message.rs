//! Chat messages
//!
//! [`Message`] mirrors the chat service's wire format (`_id`, `chatId`,
//! `sender`, `messageType`, ...) so REST responses and realtime
//! `newMessage` payloads decode into the same type.
//!
//! [`OutgoingMessage`] is what the composer produces before the service has
//! assigned an id. It is validated locally: a message needs text, an image,
//! or both (an image may carry a caption).

use crate::{ChatError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{ChatId, UserId};

/// Message identifier as issued by the chat service
pub type MessageId = String;

/// Preview text used for image messages in conversation lists
pub const IMAGE_PREVIEW_TEXT: &str = "📷 Image";

/// Kind of message content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Image,
}

/// Uploaded image reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub url: String,
    #[serde(rename = "publicId", alias = "id")]
    pub id: String,
}

/// A message in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(rename = "_id", alias = "id")]
    pub id: MessageId,

    #[serde(rename = "chatId")]
    pub conversation_id: ChatId,

    #[serde(rename = "sender")]
    pub sender_id: UserId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageRef>,

    #[serde(rename = "messageType")]
    pub kind: MessageKind,

    #[serde(default)]
    pub seen: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seen_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Create a text message
    pub fn text(
        id: impl Into<String>,
        conversation_id: impl Into<String>,
        sender_id: impl Into<String>,
        text: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            conversation_id: conversation_id.into(),
            sender_id: sender_id.into(),
            text: Some(text.into()),
            image: None,
            kind: MessageKind::Text,
            seen: false,
            seen_at: None,
            created_at,
        }
    }

    /// Create an image message with an optional caption
    pub fn image(
        id: impl Into<String>,
        conversation_id: impl Into<String>,
        sender_id: impl Into<String>,
        image: ImageRef,
        caption: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            conversation_id: conversation_id.into(),
            sender_id: sender_id.into(),
            text: caption,
            image: Some(image),
            kind: MessageKind::Image,
            seen: false,
            seen_at: None,
            created_at,
        }
    }

    /// Check that the field matching `kind` is populated
    pub fn validate(&self) -> Result<()> {
        match self.kind {
            MessageKind::Text if self.text.is_none() => Err(ChatError::InvalidEvent(format!(
                "text message {} has no text",
                self.id
            ))),
            MessageKind::Text if self.image.is_some() => Err(ChatError::InvalidEvent(format!(
                "text message {} carries an image",
                self.id
            ))),
            MessageKind::Image if self.image.is_none() => Err(ChatError::InvalidEvent(format!(
                "image message {} has no image",
                self.id
            ))),
            _ => Ok(()),
        }
    }

    /// Whether `user_id` authored this message
    pub fn is_from(&self, user_id: &str) -> bool {
        self.sender_id == user_id
    }

    /// Text shown in conversation previews
    pub fn preview_text(&self) -> String {
        match (self.kind, &self.text) {
            (MessageKind::Image, _) => IMAGE_PREVIEW_TEXT.to_string(),
            (MessageKind::Text, Some(text)) => text.clone(),
            (MessageKind::Text, None) => String::new(),
        }
    }

    /// Mark as seen at `at` unless already seen
    ///
    /// Returns whether the message changed.
    pub fn mark_seen(&mut self, at: DateTime<Utc>) -> bool {
        if self.seen {
            return false;
        }
        self.seen = true;
        self.seen_at = Some(at);
        true
    }
}

/// Image file attached by the composer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl Attachment {
    /// Build an attachment, rejecting anything that is not an image
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Result<Self> {
        let file_name = file_name.into();
        let mime_type = image_mime_type(&file_name).ok_or_else(|| {
            ChatError::InvalidAttachment(format!("{} is not an image", file_name))
        })?;

        if bytes.is_empty() {
            return Err(ChatError::InvalidAttachment(format!(
                "{} is empty",
                file_name
            )));
        }

        Ok(Self {
            file_name,
            mime_type: mime_type.to_string(),
            bytes,
        })
    }

    /// Read an image attachment from disk
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                ChatError::InvalidAttachment(format!("{} has no file name", path.display()))
            })?
            .to_string();

        // Reject before reading so large non-image files are never loaded
        if image_mime_type(&file_name).is_none() {
            return Err(ChatError::InvalidAttachment(format!(
                "{} is not an image",
                file_name
            )));
        }

        let bytes = tokio::fs::read(path).await?;
        Self::new(file_name, bytes)
    }
}

fn image_mime_type(file_name: &str) -> Option<&'static str> {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())?
        .to_ascii_lowercase();

    match extension.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "bmp" => Some("image/bmp"),
        _ => None,
    }
}

/// A message composed locally, not yet accepted by the service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub conversation_id: ChatId,
    pub text: Option<String>,
    pub image: Option<Attachment>,
}

impl OutgoingMessage {
    /// Validate composer input
    ///
    /// Text is trimmed; whitespace-only text counts as absent.
    pub fn new(
        conversation_id: impl Into<String>,
        text: Option<&str>,
        image: Option<Attachment>,
    ) -> Result<Self> {
        let text = text
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(String::from);

        if text.is_none() && image.is_none() {
            return Err(ChatError::EmptyMessage);
        }

        Ok(Self {
            conversation_id: conversation_id.into(),
            text,
            image,
        })
    }
}
