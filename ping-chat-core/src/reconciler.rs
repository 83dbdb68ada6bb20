//! Conversation reconciler
//!
//! Merges three input streams into one consistent view:
//!
//! - REST results (conversation list, thread fetches)
//! - local sends confirmed by the chat service
//! - realtime events (new messages, seen receipts, typing, presence)
//!
//! Invariants held across every operation:
//!
//! - the conversation list is ordered most-recently-active first
//! - a message id appears at most once in the active thread
//! - unseen counters only grow for messages from other users, and the active
//!   conversation's counter is zero right after selection
//!
//! Operations referencing unknown or stale conversations are no-ops.
//! Callers learn about them through the returned values instead.

use crate::models::{ChatId, Conversation, Message, MessageId, User, UserId};
use crate::realtime::OutgoingEvent;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::{debug, trace};

/// Messages of the selected conversation
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveThread {
    pub conversation_id: ChatId,
    /// Ordered oldest first
    pub messages: Vec<Message>,
    /// Counterpart as returned by the thread fetch
    pub counterpart: Option<User>,
    /// Whether the thread fetch has completed
    pub loaded: bool,
    /// Whether the last thread fetch failed
    pub load_failed: bool,
    /// Whether the counterpart is currently typing
    pub remote_typing: bool,
}

impl ActiveThread {
    fn pending(conversation_id: &str) -> Self {
        Self {
            conversation_id: conversation_id.to_string(),
            messages: Vec::new(),
            counterpart: None,
            loaded: false,
            load_failed: false,
            remote_typing: false,
        }
    }

    pub fn contains(&self, message_id: &str) -> bool {
        self.messages.iter().any(|m| m.id == message_id)
    }

    /// Append unless a message with the same id is already present
    fn push_unique(&mut self, message: Message) -> bool {
        if self.contains(&message.id) {
            trace!("Message {} already in thread", message.id);
            return false;
        }
        self.messages.push(message);
        true
    }
}

/// Realtime rooms to leave and join after a selection change
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoomChange {
    pub leave: Option<ChatId>,
    pub join: Option<ChatId>,
}

impl RoomChange {
    pub fn is_empty(&self) -> bool {
        self.leave.is_none() && self.join.is_none()
    }

    /// Events to emit, leave before join
    pub fn events(&self) -> Vec<OutgoingEvent> {
        let leave = self.leave.iter().map(|chat_id| OutgoingEvent::LeaveChat {
            chat_id: chat_id.clone(),
        });
        let join = self.join.iter().map(|chat_id| OutgoingEvent::JoinChat {
            chat_id: chat_id.clone(),
        });
        leave.chain(join).collect()
    }
}

/// What applying a message did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageOutcome {
    /// The message was appended to the active thread
    pub appended: bool,
    /// The message's conversation is in the list
    pub known_conversation: bool,
}

#[derive(Debug, Clone)]
pub struct Reconciler {
    current_user: UserId,
    conversations: Vec<Conversation>,
    active: Option<ActiveThread>,
    online: HashSet<UserId>,
}

impl Reconciler {
    pub fn new(current_user: impl Into<UserId>) -> Self {
        Self {
            current_user: current_user.into(),
            conversations: Vec::new(),
            active: None,
            online: HashSet::new(),
        }
    }

    pub fn current_user(&self) -> &str {
        &self.current_user
    }

    /// Conversations, most recently active first
    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn conversation(&self, conversation_id: &str) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == conversation_id)
    }

    pub fn active_thread(&self) -> Option<&ActiveThread> {
        self.active.as_ref()
    }

    pub fn active_conversation_id(&self) -> Option<&str> {
        self.active.as_ref().map(|t| t.conversation_id.as_str())
    }

    pub fn is_active(&self, conversation_id: &str) -> bool {
        self.active_conversation_id() == Some(conversation_id)
    }

    fn active_for_mut(&mut self, conversation_id: &str) -> Option<&mut ActiveThread> {
        self.active
            .as_mut()
            .filter(|thread| thread.conversation_id == conversation_id)
    }

    /// Apply a message pushed by the chat service
    ///
    /// Messages from other users in the active conversation are appended to
    /// the thread. The matching conversation always moves to the head of the
    /// list; its unseen counter grows only when `increment_unseen` is set and
    /// the message is from someone else.
    pub fn apply_incoming_message(
        &mut self,
        message: Message,
        increment_unseen: bool,
    ) -> MessageOutcome {
        let from_other = !message.is_from(&self.current_user);
        let known_conversation =
            self.relocate(&message, increment_unseen && from_other);

        let appended = match self.active_for_mut(&message.conversation_id) {
            Some(thread) if from_other => thread.push_unique(message),
            _ => false,
        };

        MessageOutcome {
            appended,
            known_conversation,
        }
    }

    /// Apply a message the current user just sent
    pub fn apply_local_send(&mut self, message: Message) -> MessageOutcome {
        let known_conversation = self.relocate(&message, false);

        let appended = match self.active_for_mut(&message.conversation_id) {
            Some(thread) => thread.push_unique(message),
            None => false,
        };

        MessageOutcome {
            appended,
            known_conversation,
        }
    }

    /// Move the message's conversation to the head and update its preview
    fn relocate(&mut self, message: &Message, increment_unseen: bool) -> bool {
        let Some(index) = self
            .conversations
            .iter()
            .position(|c| c.id == message.conversation_id)
        else {
            debug!(
                "Message {} for unknown conversation {}",
                message.id, message.conversation_id
            );
            return false;
        };

        let mut conversation = self.conversations.remove(index);
        conversation.record_activity(message);
        if increment_unseen {
            conversation.unseen_count = conversation.unseen_count.saturating_add(1);
        }
        self.conversations.insert(0, conversation);
        true
    }

    /// Apply a seen receipt to the active thread
    ///
    /// With `message_ids`, only the current user's messages in that set are
    /// marked. Without, every message from other users is marked. Receipts
    /// from the current user or for other conversations are ignored.
    ///
    /// Returns the number of messages that changed.
    pub fn apply_seen_update(
        &mut self,
        conversation_id: &str,
        seen_by: &str,
        message_ids: Option<&[MessageId]>,
        at: DateTime<Utc>,
    ) -> usize {
        if seen_by == self.current_user {
            return 0;
        }

        let current_user = self.current_user.clone();
        let Some(thread) = self.active_for_mut(conversation_id) else {
            return 0;
        };

        let mut changed = 0;
        for message in &mut thread.messages {
            let eligible = match message_ids {
                Some(ids) => {
                    message.is_from(&current_user) && ids.iter().any(|id| *id == message.id)
                }
                None => !message.is_from(&current_user),
            };

            if eligible && message.mark_seen(at) {
                changed += 1;
            }
        }

        debug!(
            "{} message(s) in {} marked seen by {}",
            changed, conversation_id, seen_by
        );
        changed
    }

    /// Zero the unseen counter of a conversation
    pub fn reset_unseen(&mut self, conversation_id: &str) -> bool {
        match self
            .conversations
            .iter_mut()
            .find(|c| c.id == conversation_id)
        {
            Some(conversation) => {
                conversation.unseen_count = 0;
                true
            }
            None => false,
        }
    }

    /// Make `conversation_id` the active selection
    ///
    /// The thread starts empty and unloaded until [`Reconciler::apply_thread`]
    /// delivers the fetch result. Reselecting the active conversation keeps
    /// its messages for the merge.
    pub fn select_conversation(&mut self, conversation_id: &str) -> RoomChange {
        self.reset_unseen(conversation_id);

        if let Some(thread) = self.active_for_mut(conversation_id) {
            thread.remote_typing = false;
            thread.loaded = false;
            thread.load_failed = false;
            return RoomChange::default();
        }

        let previous = self
            .active
            .replace(ActiveThread::pending(conversation_id))
            .map(|thread| thread.conversation_id);

        debug!("Selected conversation {}", conversation_id);
        RoomChange {
            leave: previous,
            join: Some(conversation_id.to_string()),
        }
    }

    /// Merge a thread fetch into the active selection
    ///
    /// Results for a conversation that is no longer selected are discarded.
    /// Messages that arrived in realtime while the fetch was in flight are
    /// kept when the fetch does not contain them.
    pub fn apply_thread(
        &mut self,
        conversation_id: &str,
        messages: Vec<Message>,
        counterpart: User,
    ) -> bool {
        let Some(thread) = self.active_for_mut(conversation_id) else {
            debug!("Discarding stale thread for {}", conversation_id);
            return false;
        };

        let mut merged: Vec<Message> = Vec::with_capacity(messages.len());
        let mut ids: HashSet<MessageId> = HashSet::with_capacity(messages.len());
        for message in messages {
            if ids.insert(message.id.clone()) {
                merged.push(message);
            }
        }

        for message in std::mem::take(&mut thread.messages) {
            if ids.insert(message.id.clone()) {
                merged.push(message);
            }
        }

        merged.sort_by_key(|m| m.created_at);

        thread.messages = merged;
        thread.counterpart = Some(counterpart);
        thread.loaded = true;
        thread.load_failed = false;
        true
    }

    /// Settle a thread fetch that failed
    ///
    /// Messages already in the thread stay visible. Returns false when the
    /// conversation is no longer selected.
    pub fn fail_thread(&mut self, conversation_id: &str) -> bool {
        let Some(thread) = self.active_for_mut(conversation_id) else {
            return false;
        };
        thread.loaded = true;
        thread.load_failed = true;
        true
    }

    /// Drop the selection, returning the room to leave
    pub fn clear_selection(&mut self) -> RoomChange {
        RoomChange {
            leave: self.active.take().map(|thread| thread.conversation_id),
            join: None,
        }
    }

    /// Replace the list with a REST refresh
    pub fn replace_conversations(&mut self, mut conversations: Vec<Conversation>) {
        let mut seen = HashSet::with_capacity(conversations.len());
        conversations.retain(|c| seen.insert(c.id.clone()));
        conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

        if let Some(active_id) = self.active_conversation_id() {
            if let Some(active) = conversations.iter_mut().find(|c| c.id == active_id) {
                active.unseen_count = 0;
            }
        }

        self.conversations = conversations;
    }

    /// Apply a remote typing notification
    ///
    /// Returns whether the indicator changed.
    pub fn apply_remote_typing(&mut self, conversation_id: &str, user_id: &str, typing: bool) -> bool {
        if user_id == self.current_user {
            return false;
        }

        match self.active_for_mut(conversation_id) {
            Some(thread) if thread.remote_typing != typing => {
                thread.remote_typing = typing;
                true
            }
            _ => false,
        }
    }

    pub fn is_remote_typing(&self) -> bool {
        self.active.as_ref().is_some_and(|t| t.remote_typing)
    }

    /// Replace the presence set
    pub fn set_online_users(&mut self, user_ids: impl IntoIterator<Item = UserId>) {
        self.online = user_ids.into_iter().collect();
    }

    pub fn is_online(&self, user_id: &str) -> bool {
        self.online.contains(user_id)
    }

    pub fn total_unseen(&self) -> u32 {
        self.conversations.iter().map(|c| c.unseen_count).sum()
    }
}
