//! # PhysiHome Core
//!
//! Business logic for the PhysiHome patient/doctor portal:
//! - Access policy for restricted (unverified) users
//! - Conversation directory with admin broadcast threads
//! - Encrypted message log and per-participant unread tracking
//! - Account lifecycle (signup, OTP, login, doctor review, credential documents) and doctor search
//!
//! **No API concerns**: HTTP routing, sessions and DTOs belong in `api-rest` and `api-shared`.
//! Services take an `Arc<CoreConfig>` and an `Arc<dyn Store>`; nothing here reads the
//! environment.

pub mod accounts;
pub mod config;
pub mod constants;
pub mod conversations;
pub mod directory;
pub mod error;
pub mod identity;
pub mod mailer;
pub mod messages;
pub mod messaging;
pub mod policy;
pub mod roster;
pub mod threads;
pub mod unread;
pub mod validation;

pub use accounts::{
    AccountService, DoctorDecision, DoctorSignupRequest, DocumentUpload, DocumentsOutcome,
    OtpChallenge, ProfileOutcome, ProfileUpdate, SignupRequest, VerifiedSession,
};
pub use config::{config_from_env_values, CoreConfig, Environment};
pub use conversations::{ConversationDirectory, CounterpartyLabel};
pub use directory::{DoctorDirectory, DoctorEntry, DoctorQuery};
pub use error::{PortalError, PortalResult};
pub use identity::{display_name, LegacyUserDocument};
pub use mailer::{mailer_from_env_values, Attachment, LogMailer, Mailer, SmtpMailer};
pub use messages::{Message, MessageLog};
pub use messaging::{ConversationHistory, MessagingService, StartOutcome};
pub use policy::AccessPolicy;
pub use roster::{AdminIds, AdminRoster};
pub use threads::{ThreadBuilder, ThreadSummary};
pub use unread::UnreadTracker;
