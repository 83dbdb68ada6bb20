//! Directory cache
//!
//! Holds the full user list for search and the "start a conversation" flow,
//! and refreshes the current user's conversation list into the
//! [`Reconciler`].

use crate::api::ChatApi;
use crate::models::User;
use crate::reconciler::Reconciler;
use crate::Result;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

pub struct DirectoryCache {
    api: Arc<dyn ChatApi>,
    users: Vec<User>,
}

impl DirectoryCache {
    pub fn new(api: Arc<dyn ChatApi>) -> Self {
        Self {
            api,
            users: Vec::new(),
        }
    }

    pub fn users(&self) -> &[User] {
        &self.users
    }

    pub fn user(&self, user_id: &str) -> Option<&User> {
        self.users.iter().find(|u| u.id == user_id)
    }

    /// Replace the cached users with a fetch result
    pub fn replace_users(&mut self, mut users: Vec<User>) {
        let mut ids = HashSet::with_capacity(users.len());
        users.retain(|u| ids.insert(u.id.clone()));
        users.sort_by_cached_key(|u| u.name.to_lowercase());
        debug!("Directory holds {} users", users.len());
        self.users = users;
    }

    /// Users matching `query` by name or email, excluding `current_user_id`
    pub fn search(&self, query: &str, current_user_id: &str) -> Vec<&User> {
        self.users
            .iter()
            .filter(|u| u.id != current_user_id && u.matches(query))
            .collect()
    }

    /// Fetch all users
    pub async fn refresh_users(&mut self) -> Result<usize> {
        let users = self.api.fetch_all_users().await?;
        self.replace_users(users);
        Ok(self.users.len())
    }

    /// Fetch the conversation list into `reconciler`
    ///
    /// On failure the reconciler is left untouched.
    pub async fn refresh_conversations(&self, reconciler: &mut Reconciler) -> Result<usize> {
        let conversations = self.api.fetch_conversations().await?;
        let count = conversations.len();
        reconciler.replace_conversations(conversations);
        Ok(count)
    }
}
