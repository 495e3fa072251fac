//! Thread list presentation for one viewer.

use crate::conversations::ConversationDirectory;
use crate::messages::{Message, MessageLog};
use crate::policy::AccessPolicy;
use crate::roster::AdminIds;
use crate::unread::UnreadTracker;
use crate::PortalResult;
use chrono::{DateTime, Utc};
use physihome_store::{ConversationId, Store, UserRecord};
use std::sync::Arc;

/// One row of the viewer's inbox.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ThreadSummary {
    pub conversation_id: ConversationId,
    pub display_name: String,
    pub is_admin_thread: bool,
    /// The viewer is restricted and may not open this conversation.
    pub locked: bool,
    pub unread_count: u64,
    pub updated_at: DateTime<Utc>,
    /// Omitted for locked threads.
    pub last_message: Option<Message>,
}

#[derive(Clone)]
pub struct ThreadBuilder {
    store: Arc<dyn Store>,
    policy: AccessPolicy,
    directory: ConversationDirectory,
    tracker: UnreadTracker,
    log: MessageLog,
}

impl ThreadBuilder {
    pub fn new(
        store: Arc<dyn Store>,
        policy: AccessPolicy,
        directory: ConversationDirectory,
        tracker: UnreadTracker,
        log: MessageLog,
    ) -> Self {
        Self {
            store,
            policy,
            directory,
            tracker,
            log,
        }
    }

    /// Every conversation `viewer` participates in, most recently updated first.
    pub async fn build(
        &self,
        viewer: &UserRecord,
        admin_ids: &AdminIds,
    ) -> PortalResult<Vec<ThreadSummary>> {
        let restricted = self.policy.is_restricted(Some(viewer));
        let conversations = self.store.list_conversations_for(&viewer.id).await?;

        let mut threads = Vec::with_capacity(conversations.len());
        for conversation in conversations {
            let label = self
                .directory
                .resolve_counterparty_label(&conversation, &viewer.id, admin_ids)
                .await;
            let locked = restricted
                && !self
                    .policy
                    .can_access(self.store.as_ref(), viewer, &conversation, admin_ids)
                    .await;
            let unread_count = self.tracker.unread_count(&conversation, &viewer.id).await?;
            let last_message = if locked {
                None
            } else {
                self.log.latest(conversation.id).await?
            };

            threads.push(ThreadSummary {
                conversation_id: conversation.id,
                display_name: label.display_name,
                is_admin_thread: label.is_admin_thread,
                locked,
                unread_count,
                updated_at: conversation.updated_at,
                last_message,
            });
        }
        Ok(threads)
    }
}
