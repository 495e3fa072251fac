use chrono::{DateTime, NaiveDate, Utc};
use physihome_uuid::CanonicalUuid;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Strongly-typed identifiers (avoid mixing ids of different records).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub CanonicalUuid);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(pub CanonicalUuid);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub CanonicalUuid);

impl UserId {
    pub fn new() -> Self {
        Self(CanonicalUuid::new())
    }
}

impl ConversationId {
    pub fn new() -> Self {
        Self(CanonicalUuid::new())
    }
}

impl MessageId {
    pub fn new() -> Self {
        Self(CanonicalUuid::new())
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Account role. Unknown legacy values are kept verbatim rather than coerced.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Patient,
    Doctor,
    Admin,
    #[serde(untagged)]
    Other(String),
}

impl Role {
    /// Case-insensitive parse. `user`, `patient` and the empty string are patients.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "user" | "patient" => Role::Patient,
            "doctor" => Role::Doctor,
            "admin" => Role::Admin,
            other => Role::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Role::Patient => "patient",
            Role::Doctor => "doctor",
            Role::Admin => "admin",
            Role::Other(s) => s,
        }
    }
}

/// Doctor credential review state.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationStatus {
    Pending,
    Verified,
    Rejected,
    #[serde(untagged)]
    Other(String),
}

impl VerificationStatus {
    /// Trimmed, case-insensitive parse. Returns `None` for blank input.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "" => None,
            "pending" => Some(VerificationStatus::Pending),
            "verified" => Some(VerificationStatus::Verified),
            "rejected" => Some(VerificationStatus::Rejected),
            _ => Some(VerificationStatus::Other(normalized)),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            VerificationStatus::Pending => "pending",
            VerificationStatus::Verified => "verified",
            VerificationStatus::Rejected => "rejected",
            VerificationStatus::Other(s) => s,
        }
    }
}

/// A user account as persisted.
///
/// `email` is stored normalised (trimmed, lowercase) for records created by this system; legacy
/// records may not be, which is why lookups compare normalised forms.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: UserId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub gender: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub role: Role,
    pub is_admin: bool,
    pub restricted: bool,
    pub doctor_verification_status: Option<VerificationStatus>,
    pub specialization: Option<String>,
    pub license_number: Option<String>,
    pub city: Option<String>,
    pub preferred_pin: Option<String>,
    pub password_hash: String,
    pub otp_verified: bool,
    pub otp_hash: Option<String>,
    pub otp_expires_at: Option<DateTime<Utc>>,
    pub pending_email: Option<String>,
    pub has_logged_in: bool,
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    /// A blank patient record with a fresh id; callers fill in the rest.
    pub fn new(email: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: UserId::new(),
            email: email.into(),
            first_name: String::new(),
            last_name: String::new(),
            phone: None,
            gender: None,
            date_of_birth: None,
            role: Role::Patient,
            is_admin: false,
            restricted: false,
            doctor_verification_status: None,
            specialization: None,
            license_number: None,
            city: None,
            preferred_pin: None,
            password_hash: String::new(),
            otp_verified: false,
            otp_hash: None,
            otp_expires_at: None,
            pending_email: None,
            has_logged_in: false,
            created_at,
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// A doctor signup awaiting OTP confirmation. Keyed by normalised email.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PendingSignup {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub gender: Option<String>,
    pub date_of_birth: NaiveDate,
    pub password_hash: String,
    pub specialization: String,
    pub license_number: String,
    pub city: String,
    pub preferred_pin: String,
    pub otp_hash: String,
    pub otp_expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Credential document a doctor can upload for review.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    DegreePhoto,
    SelfPhoto,
    VisitingCard,
}

impl DocumentKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "degree_photo" => Some(DocumentKind::DegreePhoto),
            "self_photo" => Some(DocumentKind::SelfPhoto),
            "visiting_card" => Some(DocumentKind::VisitingCard),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DocumentKind::DegreePhoto => "degree_photo",
            DocumentKind::SelfPhoto => "self_photo",
            DocumentKind::VisitingCard => "visiting_card",
        }
    }
}

/// Metadata of a doctor's latest upload of one document kind. File contents are not kept.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoctorDocument {
    pub user_id: UserId,
    pub kind: DocumentKind,
    pub filename: String,
    pub content_type: String,
    pub byte_len: u64,
    pub uploaded_at: DateTime<Utc>,
}

/// A conversation between a canonical (sorted, deduplicated) set of participants.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub participants: Vec<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_read_at: BTreeMap<UserId, DateTime<Utc>>,
}

impl Conversation {
    pub fn has_participant(&self, user: &UserId) -> bool {
        self.participants.binary_search(user).is_ok()
    }

    /// Participants other than `viewer`.
    pub fn others(&self, viewer: &UserId) -> Vec<UserId> {
        self.participants
            .iter()
            .filter(|p| *p != viewer)
            .copied()
            .collect()
    }
}

/// A persisted message. The body exists only as ciphertext.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub sender_id: UserId,
    pub ciphertext: String,
    pub created_at: DateTime<Utc>,
}

/// Sorts and deduplicates participant ids into the canonical sequence.
pub fn canonical_participants(ids: impl IntoIterator<Item = UserId>) -> Vec<UserId> {
    let mut out: Vec<UserId> = ids.into_iter().collect();
    out.sort();
    out.dedup();
    out
}

/// Lookup key for a canonical participant sequence.
pub fn participants_key(participants: &[UserId]) -> String {
    participants
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_participants_sorts_and_dedupes() {
        let a = UserId::new();
        let b = UserId::new();
        let forward = canonical_participants([a, b, a]);
        let backward = canonical_participants([b, a]);
        assert_eq!(forward, backward);
        assert_eq!(forward.len(), 2);
        assert_eq!(participants_key(&forward), participants_key(&backward));
    }

    #[test]
    fn role_parse_is_lenient() {
        assert_eq!(Role::parse(" Doctor "), Role::Doctor);
        assert_eq!(Role::parse("ADMIN"), Role::Admin);
        assert_eq!(Role::parse("user"), Role::Patient);
        assert_eq!(Role::parse(""), Role::Patient);
        assert_eq!(Role::parse("nurse"), Role::Other("nurse".into()));
    }

    #[test]
    fn verification_parse() {
        assert_eq!(
            VerificationStatus::parse(" VERIFIED "),
            Some(VerificationStatus::Verified)
        );
        assert_eq!(VerificationStatus::parse("  "), None);
        assert_eq!(
            VerificationStatus::parse("on hold"),
            Some(VerificationStatus::Other("on hold".into()))
        );
    }

    #[test]
    fn others_excludes_viewer() {
        let a = UserId::new();
        let b = UserId::new();
        let conv = Conversation {
            id: ConversationId::new(),
            participants: canonical_participants([a, b]),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            last_read_at: BTreeMap::new(),
        };
        assert_eq!(conv.others(&a), vec![b]);
        assert!(conv.has_participant(&b));
        assert!(!conv.has_participant(&UserId::new()));
    }
}
