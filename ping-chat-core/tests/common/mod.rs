//! In-memory stand-in for the user and chat services

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use ping_chat_core::{
    ChatApi, ChatError, ChatId, Conversation, Message, OtpCode, OutgoingMessage, Result,
    ThreadPage, User, VerifiedSession,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

pub const VALID_CODE: &str = "123456";
pub const VALID_TOKEN: &str = "tok-valid";

/// Route library logs through the test harness output
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub fn ada() -> User {
    User::new("u1", "Ada Lovelace", "ada@example.com")
}

#[derive(Default)]
pub struct MockApi {
    pub token: Mutex<Option<String>>,
    pub users: Mutex<Vec<User>>,
    pub conversations: Mutex<Vec<Conversation>>,
    pub login_calls: Mutex<Vec<String>>,
    pub offline: AtomicBool,
}

impl MockApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users(self, users: Vec<User>) -> Self {
        *self.users.lock().unwrap() = users;
        self
    }

    pub fn with_conversations(self, conversations: Vec<Conversation>) -> Self {
        *self.conversations.lock().unwrap() = conversations;
        self
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn current_token(&self) -> Option<String> {
        self.token.lock().unwrap().clone()
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            Err(ChatError::NetworkError("connection refused".to_string()))
        } else {
            Ok(())
        }
    }

    fn check_auth(&self) -> Result<()> {
        self.check_online()?;
        match self.token.lock().unwrap().as_deref() {
            Some(VALID_TOKEN) => Ok(()),
            Some(_) => Err(ChatError::Unauthorized("Please login".to_string())),
            None => Err(ChatError::NotAuthenticated),
        }
    }
}

#[async_trait]
impl ChatApi for MockApi {
    async fn set_token(&self, token: Option<String>) {
        *self.token.lock().unwrap() = token;
    }

    async fn login(&self, email: &str) -> Result<String> {
        self.check_online()?;
        self.login_calls.lock().unwrap().push(email.to_string());
        Ok("OTP sent to your mail".to_string())
    }

    async fn verify_otp(&self, email: &str, code: &OtpCode) -> Result<VerifiedSession> {
        self.check_online()?;
        if code.as_str() != VALID_CODE {
            return Err(ChatError::Server {
                status: 400,
                message: "Invalid OTP".to_string(),
            });
        }

        Ok(VerifiedSession {
            message: "User verified".to_string(),
            token: VALID_TOKEN.to_string(),
            user: User::new("u1", "Ada Lovelace", email),
        })
    }

    async fn fetch_current_user(&self) -> Result<User> {
        self.check_auth()?;
        Ok(ada())
    }

    async fn fetch_all_users(&self) -> Result<Vec<User>> {
        self.check_auth()?;
        Ok(self.users.lock().unwrap().clone())
    }

    async fn fetch_conversations(&self) -> Result<Vec<Conversation>> {
        self.check_auth()?;
        Ok(self.conversations.lock().unwrap().clone())
    }

    async fn create_conversation(&self, target_user_id: &str) -> Result<ChatId> {
        self.check_auth()?;
        Ok(format!("chat-{}", target_user_id))
    }

    async fn fetch_thread(&self, conversation_id: &str) -> Result<ThreadPage> {
        self.check_auth()?;
        Ok(ThreadPage {
            messages: Vec::new(),
            user: User::new("u2", "Bob", format!("bob+{}@example.com", conversation_id)),
        })
    }

    async fn send_message(&self, message: &OutgoingMessage) -> Result<Message> {
        self.check_auth()?;
        Ok(Message::text(
            "m-sent",
            message.conversation_id.clone(),
            "u1",
            message.text.clone().unwrap_or_default(),
            Utc::now(),
        ))
    }
}
