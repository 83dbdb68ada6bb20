use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Message, User, UserId};

/// Conversation identifier as issued by the chat service
pub type ChatId = String;

/// Latest message shown under a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePreview {
    pub text: String,
    pub sender_id: UserId,
}

/// A one-to-one conversation with a counterpart user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    pub id: ChatId,
    /// The other participant
    pub participant: User,
    pub latest_message: Option<MessagePreview>,
    pub updated_at: DateTime<Utc>,
    pub unseen_count: u32,
}

impl Conversation {
    pub fn new(id: impl Into<String>, participant: User, updated_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            participant,
            latest_message: None,
            updated_at,
            unseen_count: 0,
        }
    }

    /// Record `message` as the latest activity
    pub fn record_activity(&mut self, message: &Message) {
        self.latest_message = Some(MessagePreview {
            text: message.preview_text(),
            sender_id: message.sender_id.clone(),
        });
        self.updated_at = message.created_at;
    }

    /// Whether the latest message was sent by `user_id`
    pub fn last_sent_by(&self, user_id: &str) -> bool {
        self.latest_message
            .as_ref()
            .is_some_and(|preview| preview.sender_id == user_id)
    }
}
