use crate::types::{
    participants_key, Conversation, ConversationId, DoctorDocument, DocumentKind, PendingSignup,
    Role, StoredMessage, UserId, UserRecord,
};
use crate::{Store, StoreError, StoreResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use physihome_types::normalize_email;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

#[derive(Default)]
struct Collections {
    users: HashMap<UserId, UserRecord>,
    pending: HashMap<String, PendingSignup>,
    documents: BTreeMap<(UserId, DocumentKind), DoctorDocument>,
    conversations: HashMap<ConversationId, Conversation>,
    by_participants: HashMap<String, ConversationId>,
    messages: Vec<StoredMessage>,
}

impl Collections {
    fn users_by_email_key(&self, email: &str) -> Vec<UserRecord> {
        let key = normalize_email(email);
        let mut out: Vec<UserRecord> = self
            .users
            .values()
            .filter(|u| normalize_email(&u.email) == key)
            .cloned()
            .collect();
        out.sort_by_key(|u| u.created_at);
        out
    }
}

/// In-process store. Every operation takes the single lock once, so compound operations are
/// atomic.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    // ───────────────────────────── Users ─────────────────────────────

    async fn insert_user(&self, user: &UserRecord) -> StoreResult<()> {
        let mut c = self.inner.write().await;
        if c.users.contains_key(&user.id) {
            return Err(StoreError::AlreadyExists);
        }
        c.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn get_user(&self, id: &UserId) -> StoreResult<Option<UserRecord>> {
        Ok(self.inner.read().await.users.get(id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<UserRecord>> {
        let c = self.inner.read().await;
        Ok(c.users_by_email_key(email).into_iter().next())
    }

    async fn find_users_by_email_key(&self, email: &str) -> StoreResult<Vec<UserRecord>> {
        Ok(self.inner.read().await.users_by_email_key(email))
    }

    async fn find_user_by_phone(&self, phone: &str) -> StoreResult<Option<UserRecord>> {
        let c = self.inner.read().await;
        Ok(c.users
            .values()
            .filter(|u| u.phone.as_deref() == Some(phone))
            .min_by_key(|u| u.created_at)
            .cloned())
    }

    async fn find_user_by_pending_email(&self, email: &str) -> StoreResult<Option<UserRecord>> {
        let key = normalize_email(email);
        let c = self.inner.read().await;
        Ok(c.users
            .values()
            .filter(|u| u.pending_email.as_deref().map(normalize_email).as_deref() == Some(key.as_str()))
            .min_by_key(|u| u.created_at)
            .cloned())
    }

    async fn update_user(&self, user: &UserRecord) -> StoreResult<()> {
        let mut c = self.inner.write().await;
        match c.users.get_mut(&user.id) {
            Some(slot) => {
                *slot = user.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound),
        }
    }

    async fn delete_user(&self, id: &UserId) -> StoreResult<()> {
        let mut c = self.inner.write().await;
        c.users.remove(id).ok_or(StoreError::NotFound)?;
        c.documents.retain(|(user, _), _| user != id);
        Ok(())
    }

    async fn list_admin_candidates(&self, emails: &[String]) -> StoreResult<Vec<UserRecord>> {
        let c = self.inner.read().await;
        let mut out: Vec<UserRecord> = c
            .users
            .values()
            .filter(|u| {
                u.is_admin
                    || u.role == Role::Admin
                    || emails.contains(&normalize_email(&u.email))
            })
            .cloned()
            .collect();
        out.sort_by_key(|u| u.created_at);
        Ok(out)
    }

    async fn ensure_admin_mailbox(&self, user: &UserRecord) -> StoreResult<bool> {
        let mut c = self.inner.write().await;
        if !c.users_by_email_key(&user.email).is_empty() {
            return Ok(false);
        }
        c.users.insert(user.id, user.clone());
        Ok(true)
    }

    async fn list_doctors(&self) -> StoreResult<Vec<UserRecord>> {
        let c = self.inner.read().await;
        let mut out: Vec<UserRecord> = c
            .users
            .values()
            .filter(|u| u.role == Role::Doctor)
            .cloned()
            .collect();
        out.sort_by_key(|u| u.created_at);
        Ok(out)
    }

    // ───────────────────────────── Pending signups ─────────────────────────────

    async fn upsert_pending_signup(&self, pending: &PendingSignup) -> StoreResult<()> {
        let mut c = self.inner.write().await;
        c.pending
            .insert(normalize_email(&pending.email), pending.clone());
        Ok(())
    }

    async fn get_pending_signup(&self, email: &str) -> StoreResult<Option<PendingSignup>> {
        Ok(self
            .inner
            .read()
            .await
            .pending
            .get(&normalize_email(email))
            .cloned())
    }

    async fn find_pending_signup_by_phone(
        &self,
        phone: &str,
    ) -> StoreResult<Option<PendingSignup>> {
        let c = self.inner.read().await;
        Ok(c.pending.values().find(|p| p.phone == phone).cloned())
    }

    async fn delete_pending_signup(&self, email: &str) -> StoreResult<()> {
        self.inner
            .write()
            .await
            .pending
            .remove(&normalize_email(email));
        Ok(())
    }

    // ───────────────────────────── Doctor documents ─────────────────────────────

    async fn upsert_doctor_document(&self, document: &DoctorDocument) -> StoreResult<()> {
        let mut c = self.inner.write().await;
        if !c.users.contains_key(&document.user_id) {
            return Err(StoreError::NotFound);
        }
        c.documents
            .insert((document.user_id, document.kind), document.clone());
        Ok(())
    }

    async fn list_doctor_documents(&self, user: &UserId) -> StoreResult<Vec<DoctorDocument>> {
        let c = self.inner.read().await;
        Ok(c.documents
            .values()
            .filter(|d| d.user_id == *user)
            .cloned()
            .collect())
    }

    // ───────────────────────────── Conversations ─────────────────────────────

    async fn get_conversation(&self, id: &ConversationId) -> StoreResult<Option<Conversation>> {
        Ok(self.inner.read().await.conversations.get(id).cloned())
    }

    async fn find_conversation_by_participants(
        &self,
        participants: &[UserId],
    ) -> StoreResult<Option<Conversation>> {
        let c = self.inner.read().await;
        Ok(c.by_participants
            .get(&participants_key(participants))
            .and_then(|id| c.conversations.get(id))
            .cloned())
    }

    async fn find_conversation_with_members(
        &self,
        members: &[UserId],
    ) -> StoreResult<Option<Conversation>> {
        let c = self.inner.read().await;
        Ok(c.conversations
            .values()
            .filter(|conv| {
                conv.participants.len() == members.len()
                    && members.iter().all(|m| conv.participants.contains(m))
            })
            .min_by_key(|conv| conv.created_at)
            .cloned())
    }

    async fn find_or_create_conversation(
        &self,
        participants: &[UserId],
        now: DateTime<Utc>,
    ) -> StoreResult<(Conversation, bool)> {
        let key = participants_key(participants);
        let mut c = self.inner.write().await;
        if let Some(existing) = c.by_participants.get(&key).and_then(|id| c.conversations.get(id))
        {
            return Ok((existing.clone(), false));
        }
        let conv = Conversation {
            id: ConversationId::new(),
            participants: participants.to_vec(),
            created_at: now,
            updated_at: now,
            last_read_at: BTreeMap::new(),
        };
        c.by_participants.insert(key, conv.id);
        c.conversations.insert(conv.id, conv.clone());
        Ok((conv, true))
    }

    async fn list_conversations_for(&self, user: &UserId) -> StoreResult<Vec<Conversation>> {
        let c = self.inner.read().await;
        let mut out: Vec<Conversation> = c
            .conversations
            .values()
            .filter(|conv| conv.participants.contains(user))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(out)
    }

    async fn touch_conversation(&self, id: &ConversationId, at: DateTime<Utc>) -> StoreResult<()> {
        let mut c = self.inner.write().await;
        let conv = c.conversations.get_mut(id).ok_or(StoreError::NotFound)?;
        conv.updated_at = at;
        Ok(())
    }

    async fn set_last_read(
        &self,
        id: &ConversationId,
        user: &UserId,
        at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let mut c = self.inner.write().await;
        let conv = c.conversations.get_mut(id).ok_or(StoreError::NotFound)?;
        conv.last_read_at.insert(*user, at);
        Ok(())
    }

    // ───────────────────────────── Messages ─────────────────────────────

    async fn insert_message(&self, message: &StoredMessage) -> StoreResult<()> {
        self.inner.write().await.messages.push(message.clone());
        Ok(())
    }

    async fn list_messages(
        &self,
        conversation: &ConversationId,
        after: Option<DateTime<Utc>>,
    ) -> StoreResult<Vec<StoredMessage>> {
        let c = self.inner.read().await;
        let mut out: Vec<StoredMessage> = c
            .messages
            .iter()
            .filter(|m| m.conversation_id == *conversation)
            .filter(|m| after.map_or(true, |t| m.created_at > t))
            .cloned()
            .collect();
        out.sort_by_key(|m| m.created_at);
        Ok(out)
    }

    async fn count_unread(
        &self,
        conversation: &ConversationId,
        viewer: &UserId,
        since: Option<DateTime<Utc>>,
    ) -> StoreResult<u64> {
        let c = self.inner.read().await;
        let n = c
            .messages
            .iter()
            .filter(|m| m.conversation_id == *conversation && m.sender_id != *viewer)
            .filter(|m| since.map_or(true, |t| m.created_at > t))
            .count();
        Ok(n as u64)
    }

    async fn latest_message(
        &self,
        conversation: &ConversationId,
    ) -> StoreResult<Option<StoredMessage>> {
        let c = self.inner.read().await;
        Ok(c.messages
            .iter()
            .filter(|m| m.conversation_id == *conversation)
            .max_by_key(|m| m.created_at)
            .cloned())
    }
}
