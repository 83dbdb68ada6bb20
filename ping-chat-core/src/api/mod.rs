//! REST collaborators
//!
//! The client talks to two services: the user service (login, OTP
//! verification, directory) and the chat service (conversations, messages).
//! Both are plain request/response; [`ChatApi`] is the seam the session,
//! directory and app loop depend on, with [`HttpChatApi`] as the real
//! implementation.

pub mod dto;
mod http;

use crate::models::{ChatId, Conversation, Message, OutgoingMessage, User};
use crate::otp::OtpCode;
use crate::Result;
use async_trait::async_trait;

pub use http::{HttpChatApi, ServiceEndpoints};

/// Result of a successful OTP verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedSession {
    /// Message from the service, shown to the user
    pub message: String,
    /// Bearer token for subsequent requests
    pub token: String,
    pub user: User,
}

/// Messages of one conversation plus the counterpart user
#[derive(Debug, Clone, PartialEq)]
pub struct ThreadPage {
    pub messages: Vec<Message>,
    pub user: User,
}

/// Operations offered by the user and chat services
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Set or clear the bearer token attached to authenticated requests
    async fn set_token(&self, token: Option<String>);

    /// Ask the user service to mail a verification code
    ///
    /// Returns the service's confirmation message.
    async fn login(&self, email: &str) -> Result<String>;

    /// Exchange a verification code for a session token
    async fn verify_otp(&self, email: &str, code: &OtpCode) -> Result<VerifiedSession>;

    /// Who am I
    async fn fetch_current_user(&self) -> Result<User>;

    async fn fetch_all_users(&self) -> Result<Vec<User>>;

    async fn fetch_conversations(&self) -> Result<Vec<Conversation>>;

    /// Start (or reuse) a conversation with `target_user_id`
    async fn create_conversation(&self, target_user_id: &str) -> Result<ChatId>;

    async fn fetch_thread(&self, conversation_id: &str) -> Result<ThreadPage>;

    /// Send a message; the returned message carries the server-assigned id
    async fn send_message(&self, message: &OutgoingMessage) -> Result<Message>;
}
