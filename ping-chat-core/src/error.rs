//! Error handling for the Ping chat client
//!
//! Every fallible operation in this crate returns [`Result`], whose error type
//! [`ChatError`] covers the four failure families a chat client meets:
//!
//! - transport failures (HTTP, WebSocket, timeouts)
//! - authentication failures (missing or rejected bearer token)
//! - validation failures (malformed OTP, empty message, bad attachment)
//! - server rejections (non-2xx responses, surfaced with the body's message)
//!
//! Underlying library errors convert automatically through `thiserror`.
//!
//! ## Error Handling Patterns
//!
//! ```rust
//! use ping_chat_core::{ChatError, Result};
//!
//! fn parse_event(text: &str) -> Result<serde_json::Value> {
//!     // serde_json errors convert into ChatError::Json
//!     let value: serde_json::Value = serde_json::from_str(text)?;
//!     Ok(value)
//! }
//!
//! let err = parse_event("{not json").unwrap_err();
//! assert!(matches!(err, ChatError::Json(_)));
//! ```
//!
//! Callers classify errors instead of matching every variant:
//!
//! ```rust
//! use ping_chat_core::ChatError;
//!
//! let error = ChatError::Timeout("fetching conversations".to_string());
//! assert!(error.is_recoverable());
//! assert!(!error.requires_reauth());
//!
//! let error = ChatError::Unauthorized("token expired".to_string());
//! assert!(error.requires_reauth());
//! ```

use thiserror::Error;

/// Result type for chat client operations
pub type Result<T> = std::result::Result<T, ChatError>;

/// Errors that can occur in the chat client
#[derive(Error, Debug)]
pub enum ChatError {
    /// I/O error (token file, attachment reads, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP transport error
    ///
    /// Automatically converted from `reqwest::Error`, except for timeouts and
    /// connection failures which map to [`ChatError::Timeout`] and
    /// [`ChatError::NetworkError`] through [`ChatError::from_http_error`].
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// WebSocket transport error
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Network connection error
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Operation timed out
    #[error("Timeout: {0}")]
    Timeout(String),

    /// The service rejected our credentials
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// No session is established yet
    #[error("Not authenticated")]
    NotAuthenticated,

    /// Server rejected the request
    ///
    /// `message` is taken from the `{"message": ...}` response body when present.
    #[error("Server error ({status}): {message}")]
    Server {
        /// HTTP status code
        status: u16,
        /// Message reported by the service
        message: String,
    },

    /// The email address cannot be used to log in
    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    /// The OTP code is not exactly six digits
    #[error("Invalid verification code: {0}")]
    InvalidOtp(String),

    /// A new code was requested before the countdown ended
    #[error("Resend available in {0}s")]
    ResendTooSoon(u64),

    /// Message has neither text nor image
    #[error("Message is empty")]
    EmptyMessage,

    /// Attachment could not be used
    #[error("Invalid attachment: {0}")]
    InvalidAttachment(String),

    /// Realtime event could not be decoded
    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    /// REST response body did not have the expected shape
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Realtime channel is closed
    #[error("Realtime channel closed")]
    ChannelClosed,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ChatError {
    /// Convert a `reqwest` error into the most specific variant
    ///
    /// ```rust
    /// use ping_chat_core::ChatError;
    ///
    /// let error = ChatError::NetworkError("connection refused".to_string());
    /// assert!(error.is_recoverable());
    /// ```
    pub fn from_http_error(error: reqwest::Error, context: &str) -> Self {
        if error.is_timeout() {
            ChatError::Timeout(format!("{}: {}", context, error))
        } else if error.is_connect() {
            ChatError::NetworkError(format!("{}: {}", context, error))
        } else if error.is_decode() {
            ChatError::InvalidResponse(format!("{}: {}", context, error))
        } else {
            ChatError::Http(error)
        }
    }

    /// Build an error from a non-success HTTP status and its body
    ///
    /// 401 and 403 become [`ChatError::Unauthorized`]; everything else is a
    /// [`ChatError::Server`] carrying the body's `message` field if any.
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
            .unwrap_or_else(|| {
                if body.trim().is_empty() {
                    format!("request failed with status {}", status)
                } else {
                    body.trim().to_string()
                }
            });

        match status {
            401 | 403 => ChatError::Unauthorized(message),
            _ => ChatError::Server { status, message },
        }
    }

    /// Check if this error is transient and the operation may succeed later
    pub fn is_recoverable(&self) -> bool {
        match self {
            ChatError::Timeout(_)
            | ChatError::NetworkError(_)
            | ChatError::WebSocket(_)
            | ChatError::ChannelClosed
            | ChatError::Http(_)
            | ChatError::Io(_) => true,
            ChatError::Server { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Check if the user has to log in again
    pub fn requires_reauth(&self) -> bool {
        matches!(self, ChatError::Unauthorized(_) | ChatError::NotAuthenticated)
    }

    /// Check if the error is a local validation failure (nothing was sent)
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ChatError::InvalidEmail(_)
                | ChatError::InvalidOtp(_)
                | ChatError::ResendTooSoon(_)
                | ChatError::EmptyMessage
                | ChatError::InvalidAttachment(_)
        )
    }

    /// Get a short message suitable for a transient notification
    ///
    /// ```rust
    /// use ping_chat_core::ChatError;
    ///
    /// let error = ChatError::Server { status: 400, message: "Invalid OTP".to_string() };
    /// assert_eq!(error.user_message(), "Invalid OTP");
    /// ```
    pub fn user_message(&self) -> String {
        match self {
            ChatError::Server { message, .. } => message.clone(),
            ChatError::Unauthorized(_) | ChatError::NotAuthenticated => {
                "Session expired. Please log in again.".to_string()
            }
            ChatError::InvalidEmail(msg) => format!("Invalid email: {}", msg),
            ChatError::InvalidOtp(_) => "Please enter a valid 6-digit code".to_string(),
            ChatError::ResendTooSoon(secs) => format!("You can resend the code in {}s", secs),
            ChatError::EmptyMessage => "Type a message or attach an image".to_string(),
            ChatError::InvalidAttachment(msg) => format!("Cannot attach file: {}", msg),
            ChatError::Timeout(_) => "Request timed out. Check your connection.".to_string(),
            ChatError::NetworkError(_) | ChatError::Http(_) => {
                "Network error. Check your connection.".to_string()
            }
            ChatError::WebSocket(_) | ChatError::ChannelClosed => {
                "Realtime connection lost.".to_string()
            }
            ChatError::Json(_) | ChatError::InvalidEvent(_) | ChatError::InvalidResponse(_) => {
                "Received malformed data from the server.".to_string()
            }
            ChatError::Io(e) => format!("I/O error: {}", e),
            ChatError::Configuration(msg) => format!("Configuration error: {}", msg),
        }
    }

    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        ChatError::Configuration(msg.into())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ChatError {
    fn from(error: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error as WsError;

        match error {
            WsError::ConnectionClosed | WsError::AlreadyClosed => ChatError::ChannelClosed,
            WsError::Io(e) => ChatError::NetworkError(e.to_string()),
            other => ChatError::WebSocket(other.to_string()),
        }
    }
}
