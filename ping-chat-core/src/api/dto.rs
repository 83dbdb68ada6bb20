//! Wire DTOs for the user and chat REST services
//!
//! Field names follow the services' JSON (`_id`, `camelCase`). Conversations
//! arrive nested (`{user, chat}`) and are flattened into
//! [`Conversation`](crate::models::Conversation).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{ChatId, Conversation, Message, MessagePreview, User, UserId};

// Login

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
}

/// Body of responses that only carry a human-readable message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

// OTP verification

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyRequest {
    pub email: String,
    pub otp: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub message: String,
    pub token: String,
    pub user: User,
}

// Directory

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsersResponse {
    pub users: Vec<User>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatsResponse {
    pub chats: Vec<ConversationDto>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationDto {
    pub user: User,
    pub chat: ChatDto,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatDto {
    #[serde(rename = "_id", alias = "id")]
    pub id: ChatId,
    #[serde(default)]
    pub users: Vec<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_message: Option<LatestMessageDto>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unseen_count: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatestMessageDto {
    pub text: String,
    pub sender: UserId,
}

impl From<ConversationDto> for Conversation {
    fn from(dto: ConversationDto) -> Self {
        Conversation {
            id: dto.chat.id,
            participant: dto.user,
            latest_message: dto.chat.latest_message.map(|latest| MessagePreview {
                text: latest.text,
                sender_id: latest.sender,
            }),
            updated_at: dto.chat.updated_at,
            unseen_count: dto.chat.unseen_count.unwrap_or(0),
        }
    }
}

// Conversations

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewChatRequest {
    pub target_user_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewChatResponse {
    pub chat_id: ChatId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadResponse {
    pub messages: Vec<Message>,
    pub user: User,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageResponse {
    pub saved_message: Message,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversation_dto_flattening() {
        let json = r#"{
            "chats": [{
                "user": {"_id": "u2", "name": "Bob", "email": "bob@example.com"},
                "chat": {
                    "_id": "c1",
                    "users": ["u1", "u2"],
                    "latestMessage": {"text": "see you", "sender": "u2"},
                    "createdAt": "2024-05-01T09:00:00.000Z",
                    "updatedAt": "2024-05-01T10:00:00.000Z",
                    "unseenCount": 3
                }
            }, {
                "user": {"_id": "u3", "name": "Cy", "email": "cy@example.com"},
                "chat": {
                    "_id": "c2",
                    "users": ["u1", "u3"],
                    "createdAt": "2024-05-01T08:00:00.000Z",
                    "updatedAt": "2024-05-01T08:00:00.000Z"
                }
            }]
        }"#;

        let response: ChatsResponse = serde_json::from_str(json).unwrap();
        let conversations: Vec<Conversation> =
            response.chats.into_iter().map(Conversation::from).collect();

        assert_eq!(conversations[0].id, "c1");
        assert_eq!(conversations[0].participant.name, "Bob");
        assert_eq!(conversations[0].unseen_count, 3);
        assert!(conversations[0].last_sent_by("u2"));

        assert_eq!(conversations[1].unseen_count, 0);
        assert!(conversations[1].latest_message.is_none());
    }

    #[test]
    fn test_new_chat_wire_names() {
        let request = NewChatRequest {
            target_user_id: "u9".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({"targetUserId": "u9"})
        );

        let response: NewChatResponse =
            serde_json::from_str(r#"{"message":"New chat created","chatId":"c7"}"#).unwrap();
        assert_eq!(response.chat_id, "c7");
    }
}
