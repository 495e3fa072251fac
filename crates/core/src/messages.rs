//! Encrypted message log.
//!
//! Message bodies are sealed with [`MessageCipher`] before they reach the store; plaintext exists
//! only transiently, on the way in and on the way out to an authorised reader.

use crate::{PortalError, PortalResult};
use chrono::{DateTime, Utc};
use physihome_cipher::MessageCipher;
use physihome_store::{ConversationId, MessageId, Store, StoredMessage, UserId};
use std::sync::Arc;

/// A decrypted message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub sender_id: UserId,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct MessageLog {
    store: Arc<dyn Store>,
    cipher: MessageCipher,
}

impl MessageLog {
    pub fn new(store: Arc<dyn Store>, cipher: MessageCipher) -> Self {
        Self { store, cipher }
    }

    /// Encrypts and appends `text`, then bumps the conversation's `updated_at`.
    ///
    /// Whitespace-only text is rejected before anything is written. The text is stored exactly
    /// as submitted and returned as plaintext for the sender's immediate display.
    pub async fn send_message(
        &self,
        conversation_id: ConversationId,
        sender_id: UserId,
        text: &str,
    ) -> PortalResult<Message> {
        if text.trim().is_empty() {
            return Err(PortalError::InvalidInput("empty message".into()));
        }

        let now = Utc::now();
        let stored = StoredMessage {
            id: MessageId::new(),
            conversation_id,
            sender_id,
            ciphertext: self.cipher.encrypt(text)?,
            created_at: now,
        };
        self.store.insert_message(&stored).await?;
        self.store.touch_conversation(&conversation_id, now).await?;

        Ok(Message {
            id: stored.id,
            conversation_id,
            sender_id,
            body: text.to_string(),
            created_at: now,
        })
    }

    /// Messages oldest first, strictly newer than `after` when given.
    ///
    /// A row that fails to decrypt is returned with an empty body instead of failing the read.
    pub async fn read_messages(
        &self,
        conversation_id: ConversationId,
        after: Option<DateTime<Utc>>,
    ) -> PortalResult<Vec<Message>> {
        let rows = self.store.list_messages(&conversation_id, after).await?;
        Ok(rows.into_iter().map(|row| self.open(row)).collect())
    }

    /// Latest message in the conversation, decrypted.
    pub async fn latest(&self, conversation_id: ConversationId) -> PortalResult<Option<Message>> {
        let row = self.store.latest_message(&conversation_id).await?;
        Ok(row.map(|row| self.open(row)))
    }

    fn open(&self, row: StoredMessage) -> Message {
        let body = match self.cipher.decrypt(&row.ciphertext) {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!("message {} could not be decrypted: {}", row.id, e);
                String::new()
            }
        };
        Message {
            id: row.id,
            conversation_id: row.conversation_id,
            sender_id: row.sender_id,
            body,
            created_at: row.created_at,
        }
    }
}
