//! Request and response bodies for the PhysiHome HTTP API.
//!
//! Timestamps are RFC 3339 strings and identifiers are canonical 32-hex strings.

use physihome_core::{
    DoctorEntry, DoctorSignupRequest, DocumentsOutcome, Message, OtpChallenge, ProfileUpdate,
    SignupRequest, ThreadSummary, VerifiedSession,
};
use physihome_store::{DoctorDocument, UserId, UserRecord};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

/// Body of every non-2xx response.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorRes {
    pub error: String,
}

// ───── Accounts ─────

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct SignupReq {
    pub first_name: String,
    pub last_name: String,
    /// `YYYY-MM-DD` or `DD-MM-YYYY`.
    pub dob: String,
    #[serde(default)]
    pub dob_backup: Option<String>,
    pub phone: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub gender: Option<String>,
}

impl From<SignupReq> for SignupRequest {
    fn from(req: SignupReq) -> Self {
        SignupRequest {
            first_name: req.first_name,
            last_name: req.last_name,
            date_of_birth: req.dob,
            date_of_birth_fallback: req.dob_backup,
            phone: req.phone,
            email: req.email,
            password: req.password,
            gender: req.gender,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct DoctorSignupReq {
    pub first_name: String,
    pub last_name: String,
    pub dob: String,
    #[serde(default)]
    pub dob_backup: Option<String>,
    pub phone: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub gender: Option<String>,
    pub specialization: String,
    pub license: String,
    pub city: String,
    pub preferred_pin: String,
}

impl From<DoctorSignupReq> for DoctorSignupRequest {
    fn from(req: DoctorSignupReq) -> Self {
        DoctorSignupRequest {
            account: SignupRequest {
                first_name: req.first_name,
                last_name: req.last_name,
                date_of_birth: req.dob,
                date_of_birth_fallback: req.dob_backup,
                phone: req.phone,
                email: req.email,
                password: req.password,
                gender: req.gender,
            },
            specialization: req.specialization,
            license_number: req.license,
            city: req.city,
            preferred_pin: req.preferred_pin,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct EmailReq {
    pub email: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct VerifyOtpReq {
    pub email: String,
    pub otp: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginReq {
    pub email: String,
    pub password: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct OtpChallengeRes {
    pub email: String,
    pub role: String,
    pub email_error: Option<String>,
    /// Present only outside production when the email could not be delivered.
    pub otp_debug: Option<String>,
}

impl From<OtpChallenge> for OtpChallengeRes {
    fn from(c: OtpChallenge) -> Self {
        Self {
            email: c.email,
            role: c.role.as_str().to_string(),
            email_error: c.email_error,
            otp_debug: c.otp_debug,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ProfileRes {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub gender: Option<String>,
    pub dob: Option<String>,
    pub role: String,
    pub is_admin: bool,
    pub doctor_verification_status: Option<String>,
    pub specialization: Option<String>,
    pub license: Option<String>,
    pub city: Option<String>,
    pub preferred_pin: Option<String>,
    pub pending_email: Option<String>,
}

impl From<&UserRecord> for ProfileRes {
    fn from(u: &UserRecord) -> Self {
        Self {
            id: u.id.to_string(),
            email: u.email.clone(),
            first_name: u.first_name.clone(),
            last_name: u.last_name.clone(),
            phone: u.phone.clone(),
            gender: u.gender.clone(),
            dob: u.date_of_birth.map(|d| d.format("%Y-%m-%d").to_string()),
            role: u.role.as_str().to_string(),
            is_admin: u.is_admin,
            doctor_verification_status: u
                .doctor_verification_status
                .as_ref()
                .map(|s| s.as_str().to_string()),
            specialization: u.specialization.clone(),
            license: u.license_number.clone(),
            city: u.city.clone(),
            preferred_pin: u.preferred_pin.clone(),
            pending_email: u.pending_email.clone(),
        }
    }
}

/// A signed-in user and the page the client should show next.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct SessionRes {
    pub user: ProfileRes,
    pub landing: String,
}

impl From<&VerifiedSession> for SessionRes {
    fn from(s: &VerifiedSession) -> Self {
        Self {
            user: ProfileRes::from(&s.user),
            landing: s.landing.clone(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct UpdateProfileReq {
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub email: String,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub preferred_pin: Option<String>,
}

impl From<UpdateProfileReq> for ProfileUpdate {
    fn from(req: UpdateProfileReq) -> Self {
        ProfileUpdate {
            first_name: req.first_name,
            last_name: req.last_name,
            phone: req.phone,
            email: req.email,
            city: req.city,
            preferred_pin: req.preferred_pin,
        }
    }
}

/// Either the updated profile, or an OTP challenge for a new email address.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct UpdateProfileRes {
    pub profile: Option<ProfileRes>,
    pub verify_email: Option<OtpChallengeRes>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct DoctorLocationReq {
    pub city: String,
    pub preferred_pin: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct DoctorLicenseReq {
    pub license: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct DoctorReviewReq {
    pub user_id: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct DoctorReviewRes {
    /// `approved` or `rejected`.
    pub status: String,
}

/// Multipart form for `/api/auth/doctor/update-documents`. Every part is optional, but at
/// least one must carry a non-empty file.
#[derive(ToSchema)]
pub struct DoctorDocumentsForm {
    #[schema(value_type = Option<String>, format = Binary)]
    pub degree_photo: Option<Vec<u8>>,
    #[schema(value_type = Option<String>, format = Binary)]
    pub self_photo: Option<Vec<u8>>,
    #[schema(value_type = Option<String>, format = Binary)]
    pub visiting_card: Option<Vec<u8>>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct DocumentRes {
    /// `degree_photo`, `self_photo` or `visiting_card`.
    pub kind: String,
    pub filename: String,
    pub content_type: String,
    pub byte_len: u64,
    pub uploaded_at: String,
}

impl From<&DoctorDocument> for DocumentRes {
    fn from(d: &DoctorDocument) -> Self {
        Self {
            kind: d.kind.as_str().to_string(),
            filename: d.filename.clone(),
            content_type: d.content_type.clone(),
            byte_len: d.byte_len,
            uploaded_at: d.uploaded_at.to_rfc3339(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct DocumentsRes {
    pub profile: ProfileRes,
    pub documents: Vec<DocumentRes>,
    pub landing: String,
    pub requires_reverification: bool,
}

impl From<DocumentsOutcome> for DocumentsRes {
    fn from(o: DocumentsOutcome) -> Self {
        Self {
            profile: ProfileRes::from(&o.user),
            documents: o.documents.iter().map(DocumentRes::from).collect(),
            landing: o.landing,
            requires_reverification: o.requires_reverification,
        }
    }
}

// ───── Doctor directory ─────

#[derive(Clone, Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DoctorSearchQuery {
    pub pin: Option<String>,
    pub city: Option<String>,
    pub specialization: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct DoctorRes {
    pub id: String,
    pub display_name: String,
    pub specialization: Option<String>,
    pub city: Option<String>,
    pub pin_distance: Option<u64>,
}

impl From<DoctorEntry> for DoctorRes {
    fn from(d: DoctorEntry) -> Self {
        Self {
            id: d.id.to_string(),
            display_name: d.display_name,
            specialization: d.specialization,
            city: d.city,
            pin_distance: d.pin_distance,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct DoctorListRes {
    pub doctors: Vec<DoctorRes>,
}

// ───── Messaging ─────

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageRes {
    pub id: String,
    pub sender_id: String,
    pub body: String,
    pub created_at: String,
    /// Sent by the requesting user.
    pub is_mine: bool,
}

impl MessageRes {
    pub fn for_viewer(message: &Message, viewer: &UserId) -> Self {
        Self {
            id: message.id.to_string(),
            sender_id: message.sender_id.to_string(),
            body: message.body.clone(),
            created_at: message.created_at.to_rfc3339(),
            is_mine: &message.sender_id == viewer,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ThreadRes {
    pub id: String,
    pub display_name: String,
    pub is_admin_thread: bool,
    pub locked: bool,
    pub unread_count: u64,
    pub updated_at: String,
    pub last_message: Option<MessageRes>,
}

impl ThreadRes {
    pub fn for_viewer(thread: &ThreadSummary, viewer: &UserId) -> Self {
        Self {
            id: thread.conversation_id.to_string(),
            display_name: thread.display_name.clone(),
            is_admin_thread: thread.is_admin_thread,
            locked: thread.locked,
            unread_count: thread.unread_count,
            updated_at: thread.updated_at.to_rfc3339(),
            last_message: thread
                .last_message
                .as_ref()
                .map(|m| MessageRes::for_viewer(m, viewer)),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ThreadListRes {
    pub threads: Vec<ThreadRes>,
}

#[derive(Clone, Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HistoryQuery {
    /// Only messages strictly newer than this RFC 3339 timestamp.
    pub since: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct HistoryRes {
    pub conversation_id: String,
    pub display_name: String,
    pub is_admin_thread: bool,
    pub messages: Vec<MessageRes>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct SendMessageReq {
    pub body: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct StartConversationReq {
    pub user_id: String,
}

/// `conversation_id` is absent only when a restricted user has no admin to reach.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ConversationRes {
    pub conversation_id: Option<String>,
    /// The requested counterpart was replaced by the admin thread.
    pub redirected: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct StatusRes {
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use physihome_store::{ConversationId, MessageId, Role, VerificationStatus};

    #[test]
    fn signup_defaults_optional_fields() {
        let req: SignupReq = serde_json::from_value(serde_json::json!({
            "first_name": "A",
            "last_name": "B",
            "dob": "1990-01-01",
            "phone": "1",
            "email": "a@x.com",
            "password": "pw"
        }))
        .unwrap();
        let core: SignupRequest = req.into();
        assert_eq!(core.date_of_birth_fallback, None);
        assert_eq!(core.gender, None);
    }

    #[test]
    fn profile_uses_wire_names() {
        let mut u = UserRecord::new("d@x.com", Utc::now());
        u.role = Role::Doctor;
        u.doctor_verification_status = Some(VerificationStatus::Pending);
        u.license_number = Some("LIC".into());
        let json = serde_json::to_value(ProfileRes::from(&u)).unwrap();
        assert_eq!(json["role"], "doctor");
        assert_eq!(json["doctor_verification_status"], "pending");
        assert_eq!(json["license"], "LIC");
        assert_eq!(json["id"].as_str().unwrap().len(), 32);
    }

    #[test]
    fn message_marks_viewer_as_sender() {
        let me = UserId::new();
        let msg = Message {
            id: MessageId::new(),
            conversation_id: ConversationId::new(),
            sender_id: me,
            body: "hi".into(),
            created_at: Utc::now(),
        };
        assert!(MessageRes::for_viewer(&msg, &me).is_mine);
        assert!(!MessageRes::for_viewer(&msg, &UserId::new()).is_mine);
    }
}
