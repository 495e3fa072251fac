//! Admin roster reconciliation.
//!
//! The admin email list is operator configuration, not a guarantee that matching accounts exist.
//! Conversations with admins are keyed on user ids, so [`AdminRoster::admin_identities`] first
//! makes sure every configured email maps to exactly one user and then returns the admin id set.
//!
//! Reconciliation is idempotent and safe to run concurrently: mailbox creation goes through
//! [`Store::ensure_admin_mailbox`], an atomic insert-if-absent keyed on the normalised email.

use crate::config::CoreConfig;
use crate::constants::ADMIN_MAILBOX_PASSWORD_LEN;
use crate::PortalResult;
use chrono::Utc;
use physihome_cipher::password;
use physihome_store::{Role, Store, StoreError, UserId, UserRecord};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Resolved admin identities.
pub type AdminIds = BTreeSet<UserId>;

#[derive(Clone)]
pub struct AdminRoster {
    cfg: Arc<CoreConfig>,
    store: Arc<dyn Store>,
}

impl AdminRoster {
    pub fn new(cfg: Arc<CoreConfig>, store: Arc<dyn Store>) -> Self {
        Self { cfg, store }
    }

    /// Reconciles the configured admin emails, then returns every admin id.
    ///
    /// For each configured email: several matching users are collapsed onto the earliest-created
    /// one (the rest are deleted and the keeper is flagged admin); no matching user yields a
    /// placeholder mailbox (pre-verified, patient role, random password, admin flag set).
    pub async fn admin_identities(&self) -> PortalResult<AdminIds> {
        for email in self.cfg.admin_emails() {
            let matches = self.store.find_users_by_email_key(email).await?;
            match matches.split_first() {
                None => self.create_mailbox(email).await?,
                Some((keeper, duplicates)) => self.collapse(keeper, duplicates).await?,
            }
        }

        let candidates = self
            .store
            .list_admin_candidates(self.cfg.admin_emails())
            .await?;
        Ok(candidates.into_iter().map(|u| u.id).collect())
    }

    async fn create_mailbox(&self, email: &str) -> PortalResult<()> {
        let mut mailbox = UserRecord::new(email, Utc::now());
        mailbox.first_name = self.cfg.app_name().to_string();
        mailbox.last_name = "Admin".into();
        mailbox.role = Role::Patient;
        mailbox.is_admin = true;
        mailbox.otp_verified = true;
        mailbox.password_hash =
            password::hash_password(&password::random_password(ADMIN_MAILBOX_PASSWORD_LEN))?;

        if self.store.ensure_admin_mailbox(&mailbox).await? {
            tracing::info!("created admin mailbox {} for {}", mailbox.id, email);
        }
        Ok(())
    }

    async fn collapse(&self, keeper: &UserRecord, duplicates: &[UserRecord]) -> PortalResult<()> {
        if duplicates.is_empty() {
            return Ok(());
        }
        for dup in duplicates {
            match self.store.delete_user(&dup.id).await {
                // A concurrent reconciliation got there first.
                Ok(()) | Err(StoreError::NotFound) => {}
                Err(e) => return Err(e.into()),
            }
            tracing::info!("removed duplicate admin account {} (kept {})", dup.id, keeper.id);
        }
        if !keeper.is_admin {
            let mut stamped = keeper.clone();
            stamped.is_admin = true;
            self.store.update_user(&stamped).await?;
        }
        Ok(())
    }
}
