//! Access policy: who counts as an admin, who is restricted, and which conversations a
//! restricted user may still open.

use crate::config::CoreConfig;
use crate::roster::AdminIds;
use physihome_store::{Conversation, Role, Store, UserRecord, VerificationStatus};
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct AccessPolicy {
    cfg: Arc<CoreConfig>,
}

impl AccessPolicy {
    pub fn new(cfg: Arc<CoreConfig>) -> Self {
        Self { cfg }
    }

    /// Admin flag, admin role, or a configured admin email.
    pub fn is_admin(&self, user: &UserRecord) -> bool {
        user.is_admin || user.role == Role::Admin || self.cfg.is_admin_email(&user.email)
    }

    /// Whether messaging is limited to the admin broadcast thread.
    ///
    /// Fails closed: an absent user is restricted. Admins never are. Otherwise the explicit flag,
    /// any verification state other than `verified`, or a doctor with no verification state at
    /// all restricts the user.
    pub fn is_restricted(&self, user: Option<&UserRecord>) -> bool {
        let Some(user) = user else {
            return true;
        };
        if self.is_admin(user) {
            return false;
        }
        if user.restricted {
            return true;
        }
        match &user.doctor_verification_status {
            Some(status) => *status != VerificationStatus::Verified,
            None => user.role == Role::Doctor,
        }
    }

    /// Whether `user` may open `conversation` while restricted.
    ///
    /// Doctors may only reach conversations whose other participants are all in `admin_ids`.
    /// Other users pass the same set check, or else every other participant must resolve to a
    /// user that [`AccessPolicy::is_admin`] accepts; a failed lookup denies.
    pub async fn can_access(
        &self,
        store: &dyn Store,
        user: &UserRecord,
        conversation: &Conversation,
        admin_ids: &AdminIds,
    ) -> bool {
        let others = conversation.others(&user.id);
        if others.is_empty() {
            return false;
        }

        let all_admin_ids = others.iter().all(|id| admin_ids.contains(id));
        if user.role == Role::Doctor {
            return !admin_ids.is_empty() && all_admin_ids;
        }
        if all_admin_ids {
            return true;
        }

        for id in &others {
            match store.get_user(id).await {
                Ok(Some(other)) if self.is_admin(&other) => {}
                Ok(_) => return false,
                Err(e) => {
                    tracing::warn!("access check lookup failed for {}: {}", id, e);
                    return false;
                }
            }
        }
        true
    }
}
