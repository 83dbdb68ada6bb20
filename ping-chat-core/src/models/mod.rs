//! Chat data model
//!
//! - [`User`]: an account from the user service
//! - [`Conversation`]: one entry per counterpart, with preview and unseen counter
//! - [`Message`]: a text or image message, identified by its id

pub mod conversation;
pub mod message;
pub mod user;

pub use conversation::{ChatId, Conversation, MessagePreview};
pub use message::{
    Attachment, ImageRef, Message, MessageId, MessageKind, OutgoingMessage, IMAGE_PREVIEW_TEXT,
};
pub use user::{User, UserId};
