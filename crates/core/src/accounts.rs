//! Account lifecycle: signup, OTP confirmation, login, profile maintenance and doctor review.
//!
//! Patients become users immediately and stay unverified until their OTP is confirmed. Doctors
//! are held as a [`PendingSignup`] until then, and afterwards still need an admin decision before
//! the access policy lifts their restriction.

use crate::config::CoreConfig;
use crate::constants::{
    DEFAULT_UPLOAD_FILENAME, DOCUMENTS_EMAIL_SUBJECT, OCTET_STREAM, PROFILE_PATH,
};
use crate::mailer::{Attachment, Mailer};
use crate::policy::AccessPolicy;
use crate::validation::{
    normalize_gender, require_date_of_birth, require_location, require_text,
    validate_password_strength,
};
use crate::{PortalError, PortalResult};
use chrono::{DateTime, Utc};
use physihome_cipher::{otp, password};
use physihome_store::{
    DoctorDocument, DocumentKind, PendingSignup, Role, Store, UserId, UserRecord,
    VerificationStatus,
};
use physihome_types::{normalize_email, EmailAddress};
use physihome_uuid::CanonicalUuid;
use std::sync::Arc;

const EMAIL_TAKEN: &str = "An account with this email already exists.";
const PHONE_TAKEN: &str = "An account with this phone number already exists.";

/// Fields shared by both signup forms.
#[derive(Clone, Debug, Default)]
pub struct SignupRequest {
    pub first_name: String,
    pub last_name: String,
    /// `YYYY-MM-DD` or `DD-MM-YYYY`.
    pub date_of_birth: String,
    /// Second date field some clients send when the picker is unavailable.
    pub date_of_birth_fallback: Option<String>,
    pub phone: String,
    pub email: String,
    pub password: String,
    pub gender: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct DoctorSignupRequest {
    pub account: SignupRequest,
    pub specialization: String,
    pub license_number: String,
    pub city: String,
    pub preferred_pin: String,
}

/// An OTP has been issued and the client should prompt for it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OtpChallenge {
    pub email: String,
    pub role: Role,
    /// Delivery failure text, if the email could not be sent.
    pub email_error: Option<String>,
    /// The code itself, only when delivery failed outside production.
    pub otp_debug: Option<String>,
}

/// A user who may now be issued a session, and where to send them.
#[derive(Clone, Debug)]
pub struct VerifiedSession {
    pub user: UserRecord,
    pub landing: String,
}

#[derive(Clone, Debug, Default)]
pub struct ProfileUpdate {
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub email: String,
    pub city: Option<String>,
    pub preferred_pin: Option<String>,
}

#[derive(Clone, Debug)]
pub enum ProfileOutcome {
    Updated(UserRecord),
    /// The email changed; the new address must be confirmed before it replaces the old one.
    EmailChangePending(OtpChallenge),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DoctorDecision {
    Approve,
    Reject,
}

impl DoctorDecision {
    pub fn status(self) -> VerificationStatus {
        match self {
            DoctorDecision::Approve => VerificationStatus::Verified,
            DoctorDecision::Reject => VerificationStatus::Rejected,
        }
    }
}

/// One file from the doctor documents form.
#[derive(Clone, Debug)]
pub struct DocumentUpload {
    pub kind: DocumentKind,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

#[derive(Clone, Debug)]
pub struct DocumentsOutcome {
    pub user: UserRecord,
    /// Every document now held for the doctor, ordered by kind.
    pub documents: Vec<DoctorDocument>,
    pub landing: String,
    /// A new degree document moved a verified doctor back to pending review.
    pub requires_reverification: bool,
}

/// Where an OTP for an email address lives.
enum OtpTarget {
    Pending(PendingSignup),
    /// `by_pending_email` is set when the address is an unconfirmed email change.
    User {
        user: UserRecord,
        by_pending_email: bool,
    },
}

#[derive(Clone)]
pub struct AccountService {
    cfg: Arc<CoreConfig>,
    store: Arc<dyn Store>,
    mailer: Arc<dyn Mailer>,
    policy: AccessPolicy,
}

impl AccountService {
    pub fn new(cfg: Arc<CoreConfig>, store: Arc<dyn Store>, mailer: Arc<dyn Mailer>) -> Self {
        let policy = AccessPolicy::new(cfg.clone());
        Self {
            cfg,
            store,
            mailer,
            policy,
        }
    }

    pub async fn signup_patient(&self, req: SignupRequest) -> PortalResult<OtpChallenge> {
        let email = parse_email(&req.email)?;
        let date_of_birth =
            require_date_of_birth(&req.date_of_birth, req.date_of_birth_fallback.as_deref())?;
        validate_password_strength(&req.password)?;
        let first_name = require_text("First name", &req.first_name)?;
        let last_name = require_text("Last name", &req.last_name)?;
        let phone = require_text("Phone", &req.phone)?;

        let existing = self.store.find_user_by_email(&email).await?;
        if self.store.get_pending_signup(&email).await?.is_some()
            || existing.as_ref().is_some_and(|u| u.otp_verified)
        {
            return Err(PortalError::InvalidInput(EMAIL_TAKEN.into()));
        }

        let phone_holder = self.store.find_user_by_phone(&phone).await?;
        let phone_taken = match (&phone_holder, &existing) {
            (Some(holder), Some(me)) => holder.id != me.id,
            (Some(_), None) => true,
            (None, _) => false,
        };
        if phone_taken || self.store.find_pending_signup_by_phone(&phone).await?.is_some() {
            return Err(PortalError::InvalidInput(PHONE_TAKEN.into()));
        }

        let now = Utc::now();
        let code = otp::generate(self.cfg.otp_length());
        let is_new = existing.is_none();
        let mut user = existing.unwrap_or_else(|| UserRecord::new(email.clone(), now));
        user.first_name = first_name;
        user.last_name = last_name;
        user.date_of_birth = Some(date_of_birth);
        user.phone = Some(phone);
        user.gender = normalize_gender(req.gender.as_deref());
        user.password_hash = password::hash_password(&req.password)?;
        user.role = Role::Patient;
        user.is_admin = self.cfg.is_admin_email(&email);
        user.otp_verified = false;
        user.doctor_verification_status = None;
        user.has_logged_in = false;
        user.otp_hash = Some(otp::digest(self.cfg.secret_key(), &code)?);
        user.otp_expires_at = Some(now + self.cfg.otp_expiry());

        if is_new {
            self.store.insert_user(&user).await?;
            tracing::info!("created patient account {}", user.id);
        } else {
            self.store.update_user(&user).await?;
            tracing::info!("refreshed unverified patient account {}", user.id);
        }

        Ok(self.deliver_otp(&email, &code, Role::Patient).await)
    }

    pub async fn signup_doctor(&self, req: DoctorSignupRequest) -> PortalResult<OtpChallenge> {
        let account = req.account;
        let email = parse_email(&account.email)?;
        let date_of_birth = require_date_of_birth(
            &account.date_of_birth,
            account.date_of_birth_fallback.as_deref(),
        )?;
        let (city, preferred_pin) = require_location(&req.city, &req.preferred_pin)?;
        validate_password_strength(&account.password)?;
        let first_name = require_text("First name", &account.first_name)?;
        let last_name = require_text("Last name", &account.last_name)?;
        let phone = require_text("Phone", &account.phone)?;
        let specialization = require_text("Specialization", &req.specialization)?;
        let license_number = require_text("License", &req.license_number)?;

        if self.store.find_user_by_email(&email).await?.is_some() {
            return Err(PortalError::InvalidInput(EMAIL_TAKEN.into()));
        }
        let pending_phone = self.store.find_pending_signup_by_phone(&phone).await?;
        if self.store.find_user_by_phone(&phone).await?.is_some()
            || pending_phone.is_some_and(|p| p.email != email)
        {
            return Err(PortalError::InvalidInput(PHONE_TAKEN.into()));
        }

        let now = Utc::now();
        let code = otp::generate(self.cfg.otp_length());
        let pending = PendingSignup {
            email: email.clone(),
            first_name,
            last_name,
            phone,
            gender: normalize_gender(account.gender.as_deref()),
            date_of_birth,
            password_hash: password::hash_password(&account.password)?,
            specialization,
            license_number,
            city,
            preferred_pin,
            otp_hash: otp::digest(self.cfg.secret_key(), &code)?,
            otp_expires_at: now + self.cfg.otp_expiry(),
            created_at: now,
        };
        self.store.upsert_pending_signup(&pending).await?;
        tracing::info!("stored pending doctor signup");

        let challenge = self.deliver_otp(&email, &code, Role::Doctor).await;
        self.notify_admins_of_doctor(&email).await;
        Ok(challenge)
    }

    /// Issues a fresh OTP for whichever record is waiting on `email`.
    pub async fn resend_otp(&self, email: &str) -> PortalResult<OtpChallenge> {
        let email = normalize_email(email);
        let now = Utc::now();
        let code = otp::generate(self.cfg.otp_length());
        let digest = otp::digest(self.cfg.secret_key(), &code)?;

        let role = match self.otp_target(&email).await? {
            None => {
                return Err(PortalError::NotFound(
                    "Account not found. Please start over.".into(),
                ))
            }
            Some(OtpTarget::Pending(mut pending)) => {
                pending.otp_hash = digest;
                pending.otp_expires_at = now + self.cfg.otp_expiry();
                self.store.upsert_pending_signup(&pending).await?;
                Role::Doctor
            }
            Some(OtpTarget::User {
                mut user,
                by_pending_email,
            }) => {
                if user.otp_verified && !by_pending_email {
                    return Err(PortalError::InvalidInput(
                        "This account is already verified. Please log in instead.".into(),
                    ));
                }
                user.otp_hash = Some(digest);
                user.otp_expires_at = Some(now + self.cfg.otp_expiry());
                self.store.update_user(&user).await?;
                user.role
            }
        };

        Ok(self.deliver_otp(&email, &code, role).await)
    }

    /// Confirms an OTP. Pending doctors are promoted to users; existing users are marked verified
    /// and any matching pending email becomes their address.
    pub async fn verify_otp(&self, email: &str, code: &str) -> PortalResult<VerifiedSession> {
        let email = normalize_email(email);
        let now = Utc::now();

        let user = match self.otp_target(&email).await? {
            None => {
                return Err(PortalError::NotFound(
                    "Account not found. Please sign up again.".into(),
                ))
            }
            Some(OtpTarget::Pending(pending)) => {
                self.check_otp(code, Some(&pending.otp_hash), Some(pending.otp_expires_at), now)?;
                let user = self.promote_pending(pending);
                self.store.insert_user(&user).await?;
                self.store.delete_pending_signup(&email).await?;
                tracing::info!("doctor account {} confirmed, awaiting review", user.id);
                user
            }
            Some(OtpTarget::User { mut user, .. }) => {
                self.check_otp(code, user.otp_hash.as_deref(), user.otp_expires_at, now)?;
                user.otp_verified = true;
                user.has_logged_in = true;
                user.otp_hash = None;
                user.otp_expires_at = None;
                if user.pending_email.as_deref() == Some(email.as_str()) {
                    user.email = email.clone();
                    user.pending_email = None;
                }
                self.store.update_user(&user).await?;
                tracing::info!("account {} confirmed", user.id);
                user
            }
        };

        let landing = if awaiting_review(&user) {
            format!("{}?pending_verification=1", PROFILE_PATH)
        } else {
            PROFILE_PATH.to_string()
        };
        Ok(VerifiedSession { user, landing })
    }

    pub async fn login(&self, email: &str, password: &str) -> PortalResult<VerifiedSession> {
        let email = normalize_email(email);
        let mut user = match self.store.find_user_by_email(&email).await? {
            Some(user) if password::verify_password(password, &user.password_hash) => user,
            _ => return Err(PortalError::InvalidCredentials),
        };
        if !user.otp_verified {
            return Err(PortalError::Forbidden(
                "Please complete OTP verification before logging in.".into(),
            ));
        }

        if !user.has_logged_in {
            user.has_logged_in = true;
            self.store.update_user(&user).await?;
        }

        let missing_license = user
            .license_number
            .as_deref()
            .map_or(true, |l| l.trim().is_empty());
        let landing = if awaiting_review(&user) {
            format!("{}?pending_verification=1", PROFILE_PATH)
        } else if user.role == Role::Doctor && missing_license {
            format!("{}?require_license=1", PROFILE_PATH)
        } else {
            PROFILE_PATH.to_string()
        };
        Ok(VerifiedSession { user, landing })
    }

    pub async fn update_profile(
        &self,
        user: &UserRecord,
        update: ProfileUpdate,
    ) -> PortalResult<ProfileOutcome> {
        let mut user = user.clone();
        user.first_name = require_text("First name", &update.first_name)?;
        user.last_name = require_text("Last name", &update.last_name)?;
        user.phone = Some(require_text("Phone", &update.phone)?);

        if user.role == Role::Doctor {
            let (city, pin) = require_location(
                update.city.as_deref().unwrap_or_default(),
                update.preferred_pin.as_deref().unwrap_or_default(),
            )?;
            user.city = Some(city);
            user.preferred_pin = Some(pin);
        }

        let new_email = parse_email(&update.email)?;
        if new_email == normalize_email(&user.email) {
            self.store.update_user(&user).await?;
            return Ok(ProfileOutcome::Updated(user));
        }

        if let Some(holder) = self.store.find_user_by_email(&new_email).await? {
            if holder.id != user.id {
                return Err(PortalError::InvalidInput(EMAIL_TAKEN.into()));
            }
        }

        let code = otp::generate(self.cfg.otp_length());
        user.pending_email = Some(new_email.clone());
        user.otp_hash = Some(otp::digest(self.cfg.secret_key(), &code)?);
        user.otp_expires_at = Some(Utc::now() + self.cfg.otp_expiry());
        self.store.update_user(&user).await?;
        tracing::info!("email change requested for {}", user.id);

        Ok(ProfileOutcome::EmailChangePending(
            self.deliver_otp(&new_email, &code, user.role.clone()).await,
        ))
    }

    pub async fn update_doctor_location(
        &self,
        user: &UserRecord,
        city: &str,
        pin: &str,
    ) -> PortalResult<UserRecord> {
        require_doctor(user)?;
        let (city, pin) = require_location(city, pin)?;
        let mut user = user.clone();
        user.city = Some(city);
        user.preferred_pin = Some(pin);
        self.store.update_user(&user).await?;
        Ok(user)
    }

    pub async fn update_doctor_license(
        &self,
        user: &UserRecord,
        license: &str,
    ) -> PortalResult<UserRecord> {
        require_doctor(user)?;
        let mut user = user.clone();
        user.license_number = Some(require_text("License", license)?);
        self.store.update_user(&user).await?;
        Ok(user)
    }

    /// Records the doctor's credential documents and forwards them to the admins.
    ///
    /// Empty files are ignored. A new degree document puts a verified doctor back into review,
    /// which restricts their messaging again until an admin approves.
    pub async fn update_doctor_documents(
        &self,
        user: &UserRecord,
        uploads: Vec<DocumentUpload>,
    ) -> PortalResult<DocumentsOutcome> {
        require_doctor(user)?;
        let uploads: Vec<DocumentUpload> =
            uploads.into_iter().filter(|u| !u.data.is_empty()).collect();
        if uploads.is_empty() {
            return Err(PortalError::InvalidInput(
                "Upload at least one document.".into(),
            ));
        }

        let mut user = self
            .store
            .get_user(&user.id)
            .await?
            .ok_or_else(doctor_not_found)?;
        let now = Utc::now();
        let mut attachments = Vec::with_capacity(uploads.len());
        let mut degree_changed = false;
        for upload in uploads {
            let (kind, file) = upload.into_attachment();
            self.store
                .upsert_doctor_document(&DoctorDocument {
                    user_id: user.id,
                    kind,
                    filename: file.filename.clone(),
                    content_type: file.content_type.clone(),
                    byte_len: file.data.len() as u64,
                    uploaded_at: now,
                })
                .await?;
            degree_changed |= kind == DocumentKind::DegreePhoto;
            attachments.push(file);
        }

        let requires_reverification = degree_changed
            && user.doctor_verification_status == Some(VerificationStatus::Verified);
        if requires_reverification {
            user.doctor_verification_status = Some(VerificationStatus::Pending);
            self.store.update_user(&user).await?;
            tracing::info!("doctor {} sent back to review after a degree update", user.id);
        }

        self.send_documents_to_admins(&user.email, &attachments).await;

        let mut landing = format!("{}?documents_updated=1", PROFILE_PATH);
        if requires_reverification {
            landing.push_str("&pending_verification=1&reverify_notice=1");
        }
        Ok(DocumentsOutcome {
            documents: self.store.list_doctor_documents(&user.id).await?,
            user,
            landing,
            requires_reverification,
        })
    }

    /// Admin review of a doctor account.
    pub async fn set_doctor_verification(
        &self,
        admin: &UserRecord,
        doctor_id: &str,
        decision: DoctorDecision,
    ) -> PortalResult<UserRecord> {
        if !self.policy.is_admin(admin) {
            return Err(PortalError::forbidden());
        }
        let doctor = match CanonicalUuid::parse(doctor_id.trim()) {
            Ok(id) => self.store.get_user(&UserId(id)).await?,
            Err(_) => None,
        };
        let doctor = doctor.ok_or_else(doctor_not_found)?;
        self.apply_doctor_decision(doctor, decision).await
    }

    /// Records `decision` on `doctor` without checking who asked. Used by operator tooling.
    pub async fn apply_doctor_decision(
        &self,
        mut doctor: UserRecord,
        decision: DoctorDecision,
    ) -> PortalResult<UserRecord> {
        if doctor.role != Role::Doctor {
            return Err(doctor_not_found());
        }
        doctor.doctor_verification_status = Some(decision.status());
        self.store.update_user(&doctor).await?;
        tracing::info!(
            "doctor {} marked {}",
            doctor.id,
            decision.status().as_str()
        );
        Ok(doctor)
    }

    async fn otp_target(&self, email: &str) -> PortalResult<Option<OtpTarget>> {
        if let Some(pending) = self.store.get_pending_signup(email).await? {
            return Ok(Some(OtpTarget::Pending(pending)));
        }
        if let Some(user) = self.store.find_user_by_pending_email(email).await? {
            return Ok(Some(OtpTarget::User {
                user,
                by_pending_email: true,
            }));
        }
        Ok(self
            .store
            .find_user_by_email(email)
            .await?
            .map(|user| OtpTarget::User {
                user,
                by_pending_email: false,
            }))
    }

    fn check_otp(
        &self,
        code: &str,
        digest: Option<&str>,
        expires_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> PortalResult<()> {
        let (Some(digest), Some(expires_at)) = (digest, expires_at) else {
            return Err(PortalError::InvalidInput(
                "OTP not found. Please request a new one.".into(),
            ));
        };
        if now > expires_at {
            return Err(PortalError::InvalidInput(
                "OTP expired. Please sign up again.".into(),
            ));
        }
        if !otp::verify(self.cfg.secret_key(), code, digest) {
            return Err(PortalError::InvalidInput("Incorrect OTP. Try again.".into()));
        }
        Ok(())
    }

    fn promote_pending(&self, pending: PendingSignup) -> UserRecord {
        let mut user = UserRecord::new(pending.email, pending.created_at);
        user.is_admin = self.cfg.is_admin_email(&user.email);
        user.first_name = pending.first_name;
        user.last_name = pending.last_name;
        user.phone = Some(pending.phone);
        user.gender = pending.gender;
        user.date_of_birth = Some(pending.date_of_birth);
        user.password_hash = pending.password_hash;
        user.role = Role::Doctor;
        user.doctor_verification_status = Some(VerificationStatus::Pending);
        user.specialization = Some(pending.specialization);
        user.license_number = Some(pending.license_number);
        user.city = Some(pending.city);
        user.preferred_pin = Some(pending.preferred_pin);
        user.otp_verified = true;
        user.has_logged_in = true;
        user
    }

    /// Sends the code; delivery failure is reported in the challenge rather than as an error.
    async fn deliver_otp(&self, email: &str, code: &str, role: Role) -> OtpChallenge {
        let subject = format!("Your {} verification code", self.cfg.app_name());
        let body = format!(
            "Your OTP is {}. It expires in {} minutes.",
            code,
            self.cfg.otp_expiry().num_minutes()
        );

        let email_error = match self.mailer.send(&subject, &body, &[email.to_string()]).await {
            Ok(()) => None,
            Err(e) => {
                tracing::warn!("OTP email not delivered: {}", e);
                Some(e.to_string())
            }
        };
        let otp_debug = match &email_error {
            Some(_) if !self.cfg.environment().is_prod() => Some(code.to_string()),
            _ => None,
        };

        OtpChallenge {
            email: email.to_string(),
            role,
            email_error,
            otp_debug,
        }
    }

    async fn notify_admins_of_doctor(&self, doctor_email: &str) {
        let admins = self.cfg.admin_emails();
        if admins.is_empty() {
            return;
        }
        let body = format!(
            "A doctor completed signup and is awaiting review.\nDoctor email: {}\n",
            doctor_email
        );
        if let Err(e) = self
            .mailer
            .send("New doctor awaiting verification", &body, admins)
            .await
        {
            tracing::warn!("admin notification not delivered: {}", e);
        }
    }

    async fn send_documents_to_admins(&self, doctor_email: &str, files: &[Attachment]) {
        let admins = self.cfg.admin_emails();
        if admins.is_empty() {
            return;
        }
        let body = format!(
            "A doctor uploaded verification documents. Please review the attached files.\n\
             Doctor email: {}\n",
            doctor_email
        );
        if let Err(e) = self
            .mailer
            .send_with_attachments(DOCUMENTS_EMAIL_SUBJECT, &body, admins, files)
            .await
        {
            tracing::warn!("doctor documents not delivered to admins: {}", e);
        }
    }
}

impl DocumentUpload {
    /// Missing names fall back to a fixed filename. Missing or generic types are sniffed from
    /// the bytes.
    fn into_attachment(self) -> (DocumentKind, Attachment) {
        let filename = self
            .filename
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty())
            .unwrap_or_else(|| DEFAULT_UPLOAD_FILENAME.to_string());
        let content_type = self
            .content_type
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty() && t != OCTET_STREAM)
            .or_else(|| infer::get(&self.data).map(|kind| kind.mime_type().to_string()))
            .unwrap_or_else(|| OCTET_STREAM.to_string());
        (
            self.kind,
            Attachment {
                filename,
                content_type,
                data: self.data,
            },
        )
    }
}

fn parse_email(raw: &str) -> PortalResult<String> {
    EmailAddress::parse(raw)
        .map(EmailAddress::into_string)
        .map_err(|e| PortalError::InvalidInput(e.to_string()))
}

fn require_doctor(user: &UserRecord) -> PortalResult<()> {
    if user.role == Role::Doctor {
        Ok(())
    } else {
        Err(PortalError::forbidden())
    }
}

fn doctor_not_found() -> PortalError {
    PortalError::NotFound("Doctor not found".into())
}

fn awaiting_review(user: &UserRecord) -> bool {
    user.role == Role::Doctor
        && user.doctor_verification_status != Some(VerificationStatus::Verified)
}
