//! HTTP implementation of [`ChatApi`]

use async_trait::async_trait;
use reqwest::{multipart, Client, RequestBuilder};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::dto::{
    ChatsResponse, LoginRequest, MessageResponse, NewChatRequest, NewChatResponse,
    SendMessageResponse, ThreadResponse, UsersResponse, VerifyRequest, VerifyResponse,
};
use super::{ChatApi, ThreadPage, VerifiedSession};
use crate::models::{ChatId, Conversation, Message, OutgoingMessage, User};
use crate::otp::OtpCode;
use crate::{ChatError, Result};

/// Default request timeout
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Base URLs of the two services, including their API prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEndpoints {
    /// e.g. `http://localhost:5000/api/v1`
    pub user_service: String,
    /// e.g. `http://localhost:5002/api/v1`
    pub chat_service: String,
}

impl Default for ServiceEndpoints {
    fn default() -> Self {
        Self {
            user_service: "http://localhost:5000/api/v1".to_string(),
            chat_service: "http://localhost:5002/api/v1".to_string(),
        }
    }
}

impl ServiceEndpoints {
    fn user_url(&self, path: &str) -> String {
        join_url(&self.user_service, path)
    }

    fn chat_url(&self, path: &str) -> String {
        join_url(&self.chat_service, path)
    }

    /// `chats/{id}/messages` with the id encoded as a single path segment
    fn thread_url(&self, conversation_id: &str) -> Result<String> {
        let base = self.chat_url("chats");
        let mut url = reqwest::Url::parse(&base).map_err(|e| {
            ChatError::configuration(format!("invalid chat service URL {}: {}", base, e))
        })?;
        url.path_segments_mut()
            .map_err(|_| ChatError::configuration(format!("chat service URL has no path: {}", base)))?
            .push(conversation_id)
            .push("messages");
        Ok(url.into())
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// REST client for the user and chat services
pub struct HttpChatApi {
    client: Client,
    endpoints: ServiceEndpoints,
    token: RwLock<Option<String>>,
}

impl HttpChatApi {
    pub fn new(endpoints: ServiceEndpoints) -> Result<Self> {
        Self::with_timeout(endpoints, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(endpoints: ServiceEndpoints, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChatError::configuration(format!("building HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoints,
            token: RwLock::new(None),
        })
    }

    pub fn endpoints(&self) -> &ServiceEndpoints {
        &self.endpoints
    }

    /// Attach the bearer token, failing if there is none
    async fn authorized(&self, builder: RequestBuilder) -> Result<RequestBuilder> {
        let token = self.token.read().await;
        match token.as_deref() {
            Some(token) => Ok(builder.bearer_auth(token)),
            None => Err(ChatError::NotAuthenticated),
        }
    }

    /// Send a request and decode a JSON body, mapping failures to [`ChatError`]
    async fn execute<T: DeserializeOwned>(&self, builder: RequestBuilder, context: &str) -> Result<T> {
        debug!("HTTP {}", context);

        let response = builder
            .send()
            .await
            .map_err(|e| ChatError::from_http_error(e, context))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ChatError::from_http_error(e, context))?;

        if !status.is_success() {
            warn!("HTTP {} failed with status {}", context, status);
            return Err(ChatError::from_status(status.as_u16(), &body));
        }

        decode_body(&body, context)
    }
}

fn decode_body<T: DeserializeOwned>(body: &str, context: &str) -> Result<T> {
    serde_json::from_str(body).map_err(|e| {
        ChatError::InvalidResponse(format!("{}: unexpected response body: {}", context, e))
    })
}

#[async_trait]
impl ChatApi for HttpChatApi {
    async fn set_token(&self, token: Option<String>) {
        *self.token.write().await = token;
    }

    async fn login(&self, email: &str) -> Result<String> {
        let request = self
            .client
            .post(self.endpoints.user_url("users/login"))
            .json(&LoginRequest {
                email: email.to_string(),
            });

        let response: MessageResponse = self.execute(request, "login").await?;
        Ok(response.message)
    }

    async fn verify_otp(&self, email: &str, code: &OtpCode) -> Result<VerifiedSession> {
        let request = self
            .client
            .post(self.endpoints.user_url("users/verify"))
            .json(&VerifyRequest {
                email: email.to_string(),
                otp: code.as_str().to_string(),
            });

        let response: VerifyResponse = self.execute(request, "verify otp").await?;
        Ok(VerifiedSession {
            message: response.message,
            token: response.token,
            user: response.user,
        })
    }

    async fn fetch_current_user(&self) -> Result<User> {
        let request = self
            .authorized(self.client.get(self.endpoints.user_url("users/me")))
            .await?;
        self.execute(request, "fetch current user").await
    }

    async fn fetch_all_users(&self) -> Result<Vec<User>> {
        let request = self
            .authorized(self.client.get(self.endpoints.user_url("users/all")))
            .await?;
        let response: UsersResponse = self.execute(request, "fetch users").await?;
        Ok(response.users)
    }

    async fn fetch_conversations(&self) -> Result<Vec<Conversation>> {
        let request = self
            .authorized(self.client.get(self.endpoints.chat_url("chats/all")))
            .await?;
        let response: ChatsResponse = self.execute(request, "fetch conversations").await?;
        Ok(response.chats.into_iter().map(Conversation::from).collect())
    }

    async fn create_conversation(&self, target_user_id: &str) -> Result<ChatId> {
        let request = self
            .authorized(
                self.client
                    .post(self.endpoints.chat_url("chats/new"))
                    .json(&NewChatRequest {
                        target_user_id: target_user_id.to_string(),
                    }),
            )
            .await?;
        let response: NewChatResponse = self.execute(request, "create conversation").await?;
        Ok(response.chat_id)
    }

    async fn fetch_thread(&self, conversation_id: &str) -> Result<ThreadPage> {
        let url = self.endpoints.thread_url(conversation_id)?;
        let request = self.authorized(self.client.get(url)).await?;
        let response: ThreadResponse = self.execute(request, "fetch thread").await?;
        Ok(ThreadPage {
            messages: response.messages,
            user: response.user,
        })
    }

    async fn send_message(&self, message: &OutgoingMessage) -> Result<Message> {
        let mut form = multipart::Form::new().text("chatId", message.conversation_id.clone());

        if let Some(text) = &message.text {
            form = form.text("text", text.clone());
        }

        if let Some(image) = &message.image {
            let part = multipart::Part::bytes(image.bytes.clone())
                .file_name(image.file_name.clone())
                .mime_str(&image.mime_type)?;
            form = form.part("image", part);
        }

        let request = self
            .authorized(
                self.client
                    .post(self.endpoints.chat_url("chats/chat/message"))
                    .multipart(form),
            )
            .await?;

        let response: SendMessageResponse = self.execute(request, "send message").await?;
        response
            .saved_message
            .validate()
            .map_err(|e| ChatError::InvalidResponse(format!("send message: {}", e)))?;
        Ok(response.saved_message)
    }
}
