//! Conversation directory.
//!
//! Conversations are keyed by their canonical participant sequence (sorted, deduplicated ids),
//! so the same set of people always resolves to the same record regardless of who initiated.
//! Creation relies on the store's uniqueness guarantee for that key rather than on any lock here.

use crate::constants::{ADMIN_THREAD_LABEL, FALLBACK_THREAD_LABEL};
use crate::identity::display_name;
use crate::roster::{AdminIds, AdminRoster};
use crate::PortalResult;
use chrono::Utc;
use physihome_store::{canonical_participants, Conversation, ConversationId, Store, UserId};
use std::sync::Arc;

/// How a conversation is presented to one viewer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CounterpartyLabel {
    pub is_admin_thread: bool,
    pub display_name: String,
}

#[derive(Clone)]
pub struct ConversationDirectory {
    store: Arc<dyn Store>,
    roster: AdminRoster,
}

impl ConversationDirectory {
    pub fn new(store: Arc<dyn Store>, roster: AdminRoster) -> Self {
        Self { store, roster }
    }

    /// Finds or creates the conversation between `a` and `b`. Argument order does not matter.
    pub async fn start_conversation(&self, a: UserId, b: UserId) -> PortalResult<ConversationId> {
        let participants = canonical_participants([a, b]);
        let (conversation, created) = self
            .store
            .find_or_create_conversation(&participants, Utc::now())
            .await?;
        if created {
            tracing::info!("created conversation {}", conversation.id);
        }
        Ok(conversation.id)
    }

    /// Resolves the admin broadcast conversation for `user`, creating it if needed.
    ///
    /// Returns `None` when no admin identity exists. Lookup is by exact canonical sequence first,
    /// then by member set with matching cardinality. Broadcast conversations keyed on an older
    /// admin set are left as they are; a roster change simply resolves to a new conversation.
    pub async fn ensure_admin_conversation(
        &self,
        user: UserId,
    ) -> PortalResult<Option<ConversationId>> {
        let admin_ids = self.roster.admin_identities().await?;
        if admin_ids.is_empty() {
            return Ok(None);
        }
        let participants =
            canonical_participants(std::iter::once(user).chain(admin_ids.iter().copied()));

        if let Some(existing) = self
            .store
            .find_conversation_by_participants(&participants)
            .await?
        {
            return Ok(Some(existing.id));
        }
        if let Some(existing) = self
            .store
            .find_conversation_with_members(&participants)
            .await?
        {
            return Ok(Some(existing.id));
        }

        let (conversation, created) = self
            .store
            .find_or_create_conversation(&participants, Utc::now())
            .await?;
        if created {
            tracing::info!(
                "created admin conversation {} with {} admin(s)",
                conversation.id,
                admin_ids.len()
            );
        }
        Ok(Some(conversation.id))
    }

    /// Labels `conversation` for `viewer`.
    ///
    /// All-admin counterparts are shown as "Admin" without revealing which admin. Otherwise the
    /// single other participant's name is used; any other shape, or a failed lookup, falls back to
    /// a generic label.
    pub async fn resolve_counterparty_label(
        &self,
        conversation: &Conversation,
        viewer: &UserId,
        admin_ids: &AdminIds,
    ) -> CounterpartyLabel {
        let others = conversation.others(viewer);
        if !others.is_empty() && others.iter().all(|id| admin_ids.contains(id)) {
            return CounterpartyLabel {
                is_admin_thread: true,
                display_name: ADMIN_THREAD_LABEL.into(),
            };
        }

        let fallback = CounterpartyLabel {
            is_admin_thread: false,
            display_name: FALLBACK_THREAD_LABEL.into(),
        };
        if conversation.participants.len() != 2 || others.len() != 1 {
            return fallback;
        }

        match self.store.get_user(&others[0]).await {
            Ok(Some(other)) => {
                let name = display_name(&other);
                if other.full_name().is_empty() {
                    fallback
                } else {
                    CounterpartyLabel {
                        is_admin_thread: false,
                        display_name: name,
                    }
                }
            }
            Ok(None) => fallback,
            Err(e) => {
                tracing::warn!("counterparty lookup failed for {}: {}", conversation.id, e);
                fallback
            }
        }
    }
}
