//! Storage abstraction for PhysiHome.
//!
//! `physihome-core` talks to persistence only through the [`Store`] trait, so services do not
//! depend on a database engine. Two backends are provided:
//!
//! - [`MemoryStore`]: collections behind a single `tokio` lock, used for development and tests.
//! - [`SqliteStore`]: `sqlx` over SQLite with embedded migrations.
//!
//! Both backends give the same two atomicity guarantees that the messaging core relies on:
//! [`Store::find_or_create_conversation`] converges racing callers onto one conversation per
//! canonical participant sequence, and [`Store::ensure_admin_mailbox`] never creates two mailbox
//! users for the same normalised email.

mod memory;
mod sqlite;
mod types;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use types::{
    canonical_participants, participants_key, Conversation, ConversationId, DoctorDocument,
    DocumentKind, MessageId, PendingSignup, Role, StoredMessage, UserId, UserRecord,
    VerificationStatus,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

/// Uniform error type for all storage backends.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found")]
    NotFound,
    #[error("already exists")]
    AlreadyExists,
    #[error("conflict")]
    Conflict,
    #[error("backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait Store: Send + Sync {
    // ───────────────────────────── Users ─────────────────────────────

    async fn insert_user(&self, user: &UserRecord) -> StoreResult<()>;

    async fn get_user(&self, id: &UserId) -> StoreResult<Option<UserRecord>>;

    /// Earliest-created user whose email matches `email` ignoring case and surrounding
    /// whitespace.
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<UserRecord>>;

    /// All users whose email normalises to `email`, oldest first.
    async fn find_users_by_email_key(&self, email: &str) -> StoreResult<Vec<UserRecord>>;

    async fn find_user_by_phone(&self, phone: &str) -> StoreResult<Option<UserRecord>>;

    async fn find_user_by_pending_email(&self, email: &str) -> StoreResult<Option<UserRecord>>;

    /// Replaces the stored record with the same id. `NotFound` if absent.
    async fn update_user(&self, user: &UserRecord) -> StoreResult<()>;

    /// Removes the user and any documents held for them.
    async fn delete_user(&self, id: &UserId) -> StoreResult<()>;

    /// Users flagged admin, with role admin, or whose normalised email is in `emails`.
    async fn list_admin_candidates(&self, emails: &[String]) -> StoreResult<Vec<UserRecord>>;

    /// Inserts `user` unless some user's email already normalises to `user.email`.
    ///
    /// Atomic with respect to concurrent callers. Returns true when the row was inserted.
    async fn ensure_admin_mailbox(&self, user: &UserRecord) -> StoreResult<bool>;

    async fn list_doctors(&self) -> StoreResult<Vec<UserRecord>>;

    // ───────────────────────────── Pending signups ─────────────────────────────

    async fn upsert_pending_signup(&self, pending: &PendingSignup) -> StoreResult<()>;

    async fn get_pending_signup(&self, email: &str) -> StoreResult<Option<PendingSignup>>;

    async fn find_pending_signup_by_phone(&self, phone: &str)
        -> StoreResult<Option<PendingSignup>>;

    async fn delete_pending_signup(&self, email: &str) -> StoreResult<()>;

    // ───────────────────────────── Doctor documents ─────────────────────────────

    /// Replaces any document of the same kind held for the same user.
    async fn upsert_doctor_document(&self, document: &DoctorDocument) -> StoreResult<()>;

    /// Documents held for `user`, ordered by kind.
    async fn list_doctor_documents(&self, user: &UserId) -> StoreResult<Vec<DoctorDocument>>;

    // ───────────────────────────── Conversations ─────────────────────────────

    async fn get_conversation(&self, id: &ConversationId) -> StoreResult<Option<Conversation>>;

    /// Exact match on the canonical participant sequence.
    async fn find_conversation_by_participants(
        &self,
        participants: &[UserId],
    ) -> StoreResult<Option<Conversation>>;

    /// A conversation containing every id in `members` and no others (matching cardinality),
    /// evaluated against the participant rows rather than the canonical key.
    async fn find_conversation_with_members(
        &self,
        members: &[UserId],
    ) -> StoreResult<Option<Conversation>>;

    /// Returns the conversation for `participants` (already canonical), creating it at `now` if
    /// absent. The flag is true when this call created it.
    async fn find_or_create_conversation(
        &self,
        participants: &[UserId],
        now: DateTime<Utc>,
    ) -> StoreResult<(Conversation, bool)>;

    /// Conversations `user` participates in, most recently updated first.
    async fn list_conversations_for(&self, user: &UserId) -> StoreResult<Vec<Conversation>>;

    async fn touch_conversation(&self, id: &ConversationId, at: DateTime<Utc>) -> StoreResult<()>;

    async fn set_last_read(
        &self,
        id: &ConversationId,
        user: &UserId,
        at: DateTime<Utc>,
    ) -> StoreResult<()>;

    // ───────────────────────────── Messages ─────────────────────────────

    async fn insert_message(&self, message: &StoredMessage) -> StoreResult<()>;

    /// Messages oldest first; with `after`, only those strictly newer.
    async fn list_messages(
        &self,
        conversation: &ConversationId,
        after: Option<DateTime<Utc>>,
    ) -> StoreResult<Vec<StoredMessage>>;

    /// Messages not sent by `viewer`, newer than `since` when given.
    async fn count_unread(
        &self,
        conversation: &ConversationId,
        viewer: &UserId,
        since: Option<DateTime<Utc>>,
    ) -> StoreResult<u64>;

    async fn latest_message(
        &self,
        conversation: &ConversationId,
    ) -> StoreResult<Option<StoredMessage>>;
}

/// Opens the configured backend: SQLite when `database_url` is set, otherwise an empty
/// [`MemoryStore`].
pub async fn open_store(database_url: Option<&str>) -> StoreResult<Arc<dyn Store>> {
    match database_url.map(str::trim).filter(|u| !u.is_empty()) {
        Some(url) => {
            tracing::info!("opening sqlite store");
            Ok(Arc::new(SqliteStore::open(url).await?))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using in-memory store");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}
