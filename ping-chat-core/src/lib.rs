//! Ping Chat Client Core
//!
//! Client-side building blocks for the Ping chat services: the data model,
//! a REST client for the user and chat services, the realtime event channel,
//! and the conversation reconciler that merges REST results, local sends and
//! realtime events into one consistent view.

pub mod api;
pub mod directory;
pub mod models;
pub mod otp;
pub mod realtime;
pub mod reconciler;
pub mod recovery;
pub mod session;
pub mod typing;

mod error;

pub use api::{ChatApi, HttpChatApi, ServiceEndpoints, ThreadPage, VerifiedSession};
pub use directory::DirectoryCache;
pub use error::{ChatError, Result};
pub use models::{
    Attachment, ChatId, Conversation, ImageRef, Message, MessageId, MessageKind, MessagePreview,
    OutgoingMessage, User, UserId, IMAGE_PREVIEW_TEXT,
};
pub use otp::{OtpCode, ResendCountdown, OTP_LENGTH, RESEND_COOLDOWN};
pub use realtime::{
    ChannelEvent, EventKind, HandlerId, IncomingEvent, OutgoingEvent, RealtimeChannel,
    RealtimeConfig, SeenUpdate, Transport, TransportFactory, TypingUpdate,
};
pub use reconciler::{ActiveThread, MessageOutcome, Reconciler, RoomChange};
pub use recovery::ReconnectionStrategy;
pub use session::{SessionStore, TokenStore, TOKEN_LIFETIME_DAYS};
pub use typing::{TypingDebouncer, TYPING_IDLE};
