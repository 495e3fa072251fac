//! Request-level messaging operations.
//!
//! [`MessagingService`] is what the HTTP layer calls. Each operation takes the viewer resolved by
//! the session layer (`None` when unauthenticated) and composes the policy, directory, message
//! log and unread tracker.
//!
//! Gating for a conversation, in order:
//! 1. no viewer: `Unauthenticated`
//! 2. malformed or unknown conversation id: `NotFound`
//! 3. viewer not a participant: `Forbidden`
//! 4. viewer restricted and the policy denies: `RestrictedDoctor` for doctors, else `Forbidden`

use crate::config::CoreConfig;
use crate::conversations::ConversationDirectory;
use crate::messages::{Message, MessageLog};
use crate::policy::AccessPolicy;
use crate::roster::{AdminIds, AdminRoster};
use crate::threads::{ThreadBuilder, ThreadSummary};
use crate::unread::UnreadTracker;
use crate::{PortalError, PortalResult};
use chrono::{DateTime, Utc};
use physihome_cipher::MessageCipher;
use physihome_store::{Conversation, ConversationId, Role, Store, UserId, UserRecord};
use physihome_uuid::CanonicalUuid;
use std::sync::Arc;

/// Messages of one conversation plus how to label it.
#[derive(Clone, Debug)]
pub struct ConversationHistory {
    pub conversation_id: ConversationId,
    pub display_name: String,
    pub is_admin_thread: bool,
    pub messages: Vec<Message>,
}

/// Result of asking to start a conversation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StartOutcome {
    /// The direct conversation with the requested counterpart.
    Direct(ConversationId),
    /// The viewer is restricted and was sent to the admin broadcast conversation instead.
    AdminThread(ConversationId),
    /// The viewer is restricted but no admin exists to talk to.
    NoAdminAvailable,
}

#[derive(Clone)]
pub struct MessagingService {
    store: Arc<dyn Store>,
    policy: AccessPolicy,
    roster: AdminRoster,
    directory: ConversationDirectory,
    log: MessageLog,
    tracker: UnreadTracker,
    threads: ThreadBuilder,
}

impl MessagingService {
    pub fn new(cfg: Arc<CoreConfig>, store: Arc<dyn Store>) -> Self {
        let policy = AccessPolicy::new(cfg.clone());
        let roster = AdminRoster::new(cfg.clone(), store.clone());
        let directory = ConversationDirectory::new(store.clone(), roster.clone());
        let log = MessageLog::new(store.clone(), MessageCipher::from_secret(cfg.secret_key()));
        let tracker = UnreadTracker::new(store.clone());
        let threads = ThreadBuilder::new(
            store.clone(),
            policy.clone(),
            directory.clone(),
            tracker.clone(),
            log.clone(),
        );
        Self {
            store,
            policy,
            roster,
            directory,
            log,
            tracker,
            threads,
        }
    }

    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    pub fn roster(&self) -> &AdminRoster {
        &self.roster
    }

    pub async fn list_threads(
        &self,
        viewer: Option<&UserRecord>,
    ) -> PortalResult<Vec<ThreadSummary>> {
        let viewer = require_viewer(viewer)?;
        let admin_ids = self.roster.admin_identities().await?;
        self.threads.build(viewer, &admin_ids).await
    }

    /// Reads the conversation (optionally only messages newer than `since`) and marks read up to
    /// the newest message returned.
    pub async fn fetch_history(
        &self,
        viewer: Option<&UserRecord>,
        conversation_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> PortalResult<ConversationHistory> {
        let viewer = require_viewer(viewer)?;
        let (conversation, admin_ids) = self.authorize(viewer, conversation_id).await?;

        let messages = self.log.read_messages(conversation.id, since).await?;
        self.mark_seen(&conversation, viewer.id, &messages).await?;

        let label = self
            .directory
            .resolve_counterparty_label(&conversation, &viewer.id, &admin_ids)
            .await;
        Ok(ConversationHistory {
            conversation_id: conversation.id,
            display_name: label.display_name,
            is_admin_thread: label.is_admin_thread,
            messages,
        })
    }

    pub async fn send(
        &self,
        viewer: Option<&UserRecord>,
        conversation_id: &str,
        text: &str,
    ) -> PortalResult<Message> {
        let viewer = require_viewer(viewer)?;
        let (conversation, _) = self.authorize(viewer, conversation_id).await?;
        let message = self.log.send_message(conversation.id, viewer.id, text).await?;
        tracing::debug!("message {} sent in {}", message.id, conversation.id);
        Ok(message)
    }

    pub async fn mark_read(
        &self,
        viewer: Option<&UserRecord>,
        conversation_id: &str,
    ) -> PortalResult<()> {
        let viewer = require_viewer(viewer)?;
        let (conversation, _) = self.authorize(viewer, conversation_id).await?;
        self.tracker
            .mark_read(conversation.id, viewer.id, Utc::now())
            .await
    }

    /// Moves the read marker to the newest of `shown`, never backwards. Messages committed after
    /// the read stay unread.
    async fn mark_seen(
        &self,
        conversation: &Conversation,
        viewer: UserId,
        shown: &[Message],
    ) -> PortalResult<()> {
        let Some(newest) = shown.last().map(|m| m.created_at) else {
            return Ok(());
        };
        if conversation
            .last_read_at
            .get(&viewer)
            .is_some_and(|at| *at >= newest)
        {
            return Ok(());
        }
        self.tracker.mark_read(conversation.id, viewer, newest).await
    }

    /// Starts (or resumes) a conversation with `counterpart_id`.
    ///
    /// Restricted viewers are redirected to the admin broadcast conversation whatever the
    /// requested counterpart.
    pub async fn start_conversation(
        &self,
        viewer: Option<&UserRecord>,
        counterpart_id: &str,
    ) -> PortalResult<StartOutcome> {
        let viewer = require_viewer(viewer)?;

        if self.policy.is_restricted(Some(viewer)) {
            return Ok(match self.directory.ensure_admin_conversation(viewer.id).await? {
                Some(id) => StartOutcome::AdminThread(id),
                None => {
                    tracing::warn!("restricted user {} has no admin to reach", viewer.id);
                    StartOutcome::NoAdminAvailable
                }
            });
        }

        let counterpart = CanonicalUuid::parse(counterpart_id)
            .map(UserId)
            .map_err(|_| PortalError::NotFound("User not found".into()))?;
        if counterpart == viewer.id {
            return Err(PortalError::InvalidInput(
                "Cannot start a conversation with yourself".into(),
            ));
        }
        if self.store.get_user(&counterpart).await?.is_none() {
            return Err(PortalError::NotFound("User not found".into()));
        }

        let id = self.directory.start_conversation(viewer.id, counterpart).await?;
        Ok(StartOutcome::Direct(id))
    }

    /// The viewer's admin broadcast conversation, or `None` when no admin exists.
    pub async fn admin_thread(
        &self,
        viewer: Option<&UserRecord>,
    ) -> PortalResult<Option<ConversationId>> {
        let viewer = require_viewer(viewer)?;
        if self.policy.is_admin(viewer) {
            return Err(PortalError::InvalidInput(
                "Admins cannot open the admin thread".into(),
            ));
        }
        self.directory.ensure_admin_conversation(viewer.id).await
    }

    async fn authorize(
        &self,
        viewer: &UserRecord,
        conversation_id: &str,
    ) -> PortalResult<(Conversation, AdminIds)> {
        let not_found = || PortalError::NotFound("Conversation not found".into());
        let id = CanonicalUuid::parse(conversation_id)
            .map(ConversationId)
            .map_err(|_| not_found())?;
        let conversation = self
            .store
            .get_conversation(&id)
            .await?
            .ok_or_else(not_found)?;

        if !conversation.has_participant(&viewer.id) {
            return Err(PortalError::forbidden());
        }

        let admin_ids = self.roster.admin_identities().await?;
        if self.policy.is_restricted(Some(viewer))
            && !self
                .policy
                .can_access(self.store.as_ref(), viewer, &conversation, &admin_ids)
                .await
        {
            return Err(if viewer.role == Role::Doctor {
                PortalError::RestrictedDoctor
            } else {
                PortalError::forbidden()
            });
        }
        Ok((conversation, admin_ids))
    }
}

fn require_viewer(viewer: Option<&UserRecord>) -> PortalResult<&UserRecord> {
    viewer.ok_or(PortalError::Unauthenticated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Environment;
    use physihome_store::{canonical_participants, MemoryStore, VerificationStatus};

    struct Fixture {
        svc: MessagingService,
        store: Arc<MemoryStore>,
    }

    impl Fixture {
        fn new(admin_emails: &[&str]) -> Self {
            let cfg = CoreConfig::new(
                Environment::Test,
                "test-secret".into(),
                admin_emails.iter().map(|e| e.to_string()).collect(),
            )
            .unwrap();
            let store = Arc::new(MemoryStore::new());
            let svc = MessagingService::new(Arc::new(cfg), store.clone());
            Self { svc, store }
        }

        async fn user(&self, email: &str, role: Role, status: Option<VerificationStatus>) -> UserRecord {
            let mut u = UserRecord::new(email, Utc::now());
            u.first_name = email.split('@').next().unwrap().to_string();
            u.last_name = "Test".into();
            u.role = role;
            u.doctor_verification_status = status;
            u.otp_verified = true;
            self.store.insert_user(&u).await.unwrap();
            u
        }

        async fn unread(&self, conv: ConversationId, user: &UserRecord) -> u64 {
            let conv = self.store.get_conversation(&conv).await.unwrap().unwrap();
            self.svc.tracker.unread_count(&conv, &user.id).await.unwrap()
        }
    }

    fn direct(outcome: StartOutcome) -> ConversationId {
        match outcome {
            StartOutcome::Direct(id) => id,
            other => panic!("expected direct conversation, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn patient_and_verified_doctor_exchange_messages() {
        let f = Fixture::new(&["admin@x.com"]);
        let u = f.user("u@x.com", Role::Patient, None).await;
        let d = f
            .user("d@x.com", Role::Doctor, Some(VerificationStatus::Verified))
            .await;

        let c = direct(f.svc.start_conversation(Some(&u), &d.id.to_string()).await.unwrap());
        let c_again = direct(f.svc.start_conversation(Some(&d), &u.id.to_string()).await.unwrap());
        assert_eq!(c, c_again);
        let cid = c.to_string();

        f.svc.send(Some(&u), &cid, "Hello").await.unwrap();
        assert_eq!(f.unread(c, &d).await, 1);

        f.svc.mark_read(Some(&d), &cid).await.unwrap();
        assert_eq!(f.unread(c, &d).await, 0);

        f.svc.send(Some(&d), &cid, "Hi").await.unwrap();
        assert_eq!(f.unread(c, &u).await, 1);

        let history = f.svc.fetch_history(Some(&u), &cid, None).await.unwrap();
        let bodies: Vec<&str> = history.messages.iter().map(|m| m.body.as_str()).collect();
        assert_eq!(bodies, vec!["Hello", "Hi"]);
        assert_eq!(history.display_name, "Dr. d Test");
        assert_eq!(f.unread(c, &u).await, 0, "viewing history marks read");
    }

    #[tokio::test]
    async fn history_marks_read_only_what_was_returned() {
        let f = Fixture::new(&["admin@x.com"]);
        let u = f.user("u@x.com", Role::Patient, None).await;
        let d = f
            .user("d@x.com", Role::Doctor, Some(VerificationStatus::Verified))
            .await;
        let c = direct(f.svc.start_conversation(Some(&u), &d.id.to_string()).await.unwrap());
        let cid = c.to_string();
        f.svc.send(Some(&d), &cid, "first").await.unwrap();

        let conv = f.store.get_conversation(&c).await.unwrap().unwrap();
        let shown = f.svc.log.read_messages(c, None).await.unwrap();
        f.svc.send(Some(&d), &cid, "second").await.unwrap();
        f.svc.mark_seen(&conv, u.id, &shown).await.unwrap();
        assert_eq!(f.unread(c, &u).await, 1, "message sent after the read stays unread");

        let history = f.svc.fetch_history(Some(&u), &cid, None).await.unwrap();
        assert_eq!(history.messages.len(), 2);
        assert_eq!(f.unread(c, &u).await, 0);

        let newest = history.messages[1].created_at;
        let earlier = history.messages[0].created_at;
        let empty = f
            .svc
            .fetch_history(Some(&u), &cid, Some(newest))
            .await
            .unwrap();
        assert!(empty.messages.is_empty());
        f.svc.fetch_history(Some(&u), &cid, Some(earlier)).await.unwrap();
        let conv = f.store.get_conversation(&c).await.unwrap().unwrap();
        assert_eq!(conv.last_read_at.get(&u.id), Some(&newest));
    }

    #[tokio::test]
    async fn pending_doctor_is_redirected_to_admin_thread() {
        let f = Fixture::new(&["admin@x.com"]);
        let u2 = f.user("u2@x.com", Role::Patient, None).await;
        let d2 = f
            .user("d2@x.com", Role::Doctor, Some(VerificationStatus::Pending))
            .await;

        let outcome = f
            .svc
            .start_conversation(Some(&d2), &u2.id.to_string())
            .await
            .unwrap();
        let StartOutcome::AdminThread(id) = outcome else {
            panic!("expected admin redirect, got {:?}", outcome);
        };

        let admin_ids = f.svc.roster().admin_identities().await.unwrap();
        let conv = f.store.get_conversation(&id).await.unwrap().unwrap();
        let expected = canonical_participants(std::iter::once(d2.id).chain(admin_ids));
        assert_eq!(conv.participants, expected);

        f.svc.send(Some(&d2), &id.to_string(), "Please verify me").await.unwrap();
    }

    #[tokio::test]
    async fn restricted_doctor_is_denied_with_distinct_message() {
        let f = Fixture::new(&["admin@x.com"]);
        let u = f.user("u@x.com", Role::Patient, None).await;
        let mut d = f
            .user("d@x.com", Role::Doctor, Some(VerificationStatus::Verified))
            .await;
        let c = direct(f.svc.start_conversation(Some(&u), &d.id.to_string()).await.unwrap());

        d.doctor_verification_status = Some(VerificationStatus::Pending);
        f.store.update_user(&d).await.unwrap();

        let err = f.svc.send(Some(&d), &c.to_string(), "hi").await.unwrap_err();
        assert!(matches!(err, PortalError::RestrictedDoctor));
        assert_eq!(err.to_string(), "Please wait for admin to verify your account");

        let mut flagged = u.clone();
        flagged.restricted = true;
        f.store.update_user(&flagged).await.unwrap();
        let err = f
            .svc
            .fetch_history(Some(&flagged), &c.to_string(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, PortalError::Forbidden(_)));
    }

    #[tokio::test]
    async fn locked_threads_hide_preview() {
        let f = Fixture::new(&["admin@x.com"]);
        let u = f.user("u@x.com", Role::Patient, None).await;
        let mut d = f
            .user("d@x.com", Role::Doctor, Some(VerificationStatus::Verified))
            .await;
        let c = direct(f.svc.start_conversation(Some(&u), &d.id.to_string()).await.unwrap());
        f.svc.send(Some(&u), &c.to_string(), "Hello").await.unwrap();

        d.doctor_verification_status = Some(VerificationStatus::Pending);
        f.store.update_user(&d).await.unwrap();
        let admin_thread = match f.svc.start_conversation(Some(&d), "ignored").await.unwrap() {
            StartOutcome::AdminThread(id) => id,
            other => panic!("unexpected {:?}", other),
        };
        f.svc
            .send(Some(&d), &admin_thread.to_string(), "waiting")
            .await
            .unwrap();

        let threads = f.svc.list_threads(Some(&d)).await.unwrap();
        assert_eq!(threads.len(), 2);
        assert_eq!(threads[0].conversation_id, admin_thread, "newest first");
        assert!(threads[0].is_admin_thread);
        assert_eq!(threads[0].display_name, "Admin");
        assert!(!threads[0].locked);
        assert_eq!(threads[0].last_message.as_ref().unwrap().body, "waiting");

        assert!(threads[1].locked);
        assert!(threads[1].last_message.is_none());
        assert_eq!(threads[1].unread_count, 1);

        let patient_view = f.svc.list_threads(Some(&u)).await.unwrap();
        assert_eq!(patient_view.len(), 1);
        assert!(!patient_view[0].locked);
        assert_eq!(patient_view[0].last_message.as_ref().unwrap().body, "Hello");
    }

    #[tokio::test]
    async fn gating_errors() {
        let f = Fixture::new(&["admin@x.com"]);
        let u = f.user("u@x.com", Role::Patient, None).await;
        let v = f.user("v@x.com", Role::Patient, None).await;
        let outsider = f.user("o@x.com", Role::Patient, None).await;
        let c = direct(f.svc.start_conversation(Some(&u), &v.id.to_string()).await.unwrap());

        assert!(matches!(
            f.svc.list_threads(None).await,
            Err(PortalError::Unauthenticated)
        ));
        assert!(matches!(
            f.svc.send(None, &c.to_string(), "x").await,
            Err(PortalError::Unauthenticated)
        ));
        assert!(matches!(
            f.svc.send(Some(&outsider), &c.to_string(), "x").await,
            Err(PortalError::Forbidden(_))
        ));
        assert!(matches!(
            f.svc.fetch_history(Some(&u), "not-an-id", None).await,
            Err(PortalError::NotFound(_))
        ));
        assert!(matches!(
            f.svc
                .fetch_history(Some(&u), &ConversationId::new().to_string(), None)
                .await,
            Err(PortalError::NotFound(_))
        ));
        assert!(matches!(
            f.svc.send(Some(&u), &c.to_string(), "   ").await,
            Err(PortalError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn start_conversation_validates_counterpart() {
        let f = Fixture::new(&["admin@x.com"]);
        let u = f.user("u@x.com", Role::Patient, None).await;

        assert!(matches!(
            f.svc.start_conversation(Some(&u), &u.id.to_string()).await,
            Err(PortalError::InvalidInput(_))
        ));
        assert!(matches!(
            f.svc
                .start_conversation(Some(&u), &UserId::new().to_string())
                .await,
            Err(PortalError::NotFound(_))
        ));
        assert!(matches!(
            f.svc.start_conversation(Some(&u), "garbage").await,
            Err(PortalError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn admin_thread_edge_cases() {
        let nobody = Fixture::new(&[]);
        let u = nobody.user("u@x.com", Role::Patient, None).await;
        assert_eq!(nobody.svc.admin_thread(Some(&u)).await.unwrap(), None);

        let d = nobody
            .user("d@x.com", Role::Doctor, Some(VerificationStatus::Pending))
            .await;
        assert_eq!(
            nobody
                .svc
                .start_conversation(Some(&d), &u.id.to_string())
                .await
                .unwrap(),
            StartOutcome::NoAdminAvailable
        );

        let f = Fixture::new(&["admin@x.com"]);
        let admin = f.user("admin@x.com", Role::Patient, None).await;
        assert!(matches!(
            f.svc.admin_thread(Some(&admin)).await,
            Err(PortalError::InvalidInput(_))
        ));
        let u = f.user("u@x.com", Role::Patient, None).await;
        let id = f.svc.admin_thread(Some(&u)).await.unwrap().unwrap();
        let conv = f.store.get_conversation(&id).await.unwrap().unwrap();
        assert_eq!(conv.participants, canonical_participants([u.id, admin.id]));
    }
}
