//! Per-participant read markers and unread counts.

use crate::PortalResult;
use chrono::{DateTime, Utc};
use physihome_store::{Conversation, ConversationId, Store, UserId};
use std::sync::Arc;

#[derive(Clone)]
pub struct UnreadTracker {
    store: Arc<dyn Store>,
}

impl UnreadTracker {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Records that `user` has read `conversation` up to `at`.
    ///
    /// The marker is overwritten unconditionally; an earlier `at` moves it backwards.
    pub async fn mark_read(
        &self,
        conversation: ConversationId,
        user: UserId,
        at: DateTime<Utc>,
    ) -> PortalResult<()> {
        self.store.set_last_read(&conversation, &user, at).await?;
        Ok(())
    }

    /// Messages from other participants newer than the user's read marker, or all of them if the
    /// user has never marked the conversation read.
    pub async fn unread_count(
        &self,
        conversation: &Conversation,
        user: &UserId,
    ) -> PortalResult<u64> {
        let since = conversation.last_read_at.get(user).copied();
        Ok(self
            .store
            .count_unread(&conversation.id, user, since)
            .await?)
    }
}
