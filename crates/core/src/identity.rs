//! Identity normalisation.
//!
//! User documents imported from older deployments vary in shape: the admin flag may be a string,
//! and the doctor verification state may live under any of three field names. This module maps
//! such documents into the typed [`UserRecord`] exactly once, at the boundary, so policy code
//! only ever sees booleans and a single [`VerificationStatus`].

use crate::validation::{normalize_gender, normalize_pin, parse_date_of_birth};
use crate::{PortalError, PortalResult};
use chrono::{DateTime, Utc};
use physihome_store::{Role, UserId, UserRecord, VerificationStatus};
use physihome_types::EmailAddress;
use physihome_uuid::CanonicalUuid;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// A loosely-typed user document as found in legacy exports.
#[derive(Debug, Default, Deserialize)]
pub struct LegacyUserDocument {
    #[serde(default, alias = "_id", deserialize_with = "lenient_string")]
    pub id: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub phone: Option<String>,
    pub gender: Option<String>,
    #[serde(alias = "dob")]
    pub date_of_birth: Option<String>,
    pub role: Option<String>,
    #[serde(default, deserialize_with = "truthy")]
    pub is_admin: bool,
    #[serde(default, deserialize_with = "truthy")]
    pub restricted: bool,
    pub doctor_verification_status: Option<String>,
    pub status: Option<String>,
    pub verification_status: Option<String>,
    pub specialization: Option<String>,
    #[serde(alias = "license")]
    pub license_number: Option<String>,
    pub city: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub preferred_pin: Option<String>,
    pub password_hash: Option<String>,
    #[serde(default, alias = "is_otp_verified", deserialize_with = "truthy")]
    pub otp_verified: bool,
    #[serde(default, deserialize_with = "truthy")]
    pub has_logged_in: bool,
    pub created_at: Option<DateTime<Utc>>,
}

impl LegacyUserDocument {
    /// Verification state carried by the document.
    ///
    /// A present `doctor_verification_status` wins for every role; a blank value still counts as
    /// present and becomes `Pending`. Only doctors fall back to `status`, then
    /// `verification_status`.
    pub fn verification(&self) -> Option<VerificationStatus> {
        if let Some(raw) = &self.doctor_verification_status {
            return Some(VerificationStatus::parse(raw).unwrap_or(VerificationStatus::Pending));
        }
        if Role::parse(self.role.as_deref().unwrap_or("")) != Role::Doctor {
            return None;
        }
        [&self.status, &self.verification_status]
            .into_iter()
            .flatten()
            .find_map(|raw| VerificationStatus::parse(raw))
    }

    /// Converts into a typed record. Ids that are not canonical are replaced with fresh ones.
    pub fn normalize(self, now: DateTime<Utc>) -> PortalResult<UserRecord> {
        let verification = self.verification();
        let raw_email = self
            .email
            .as_deref()
            .ok_or_else(|| PortalError::InvalidInput("email is required".into()))?;
        let email = EmailAddress::parse(raw_email)
            .map_err(|e| PortalError::InvalidInput(e.to_string()))?;

        let id = self
            .id
            .as_deref()
            .and_then(|raw| CanonicalUuid::parse(raw).ok())
            .map(UserId)
            .unwrap_or_default();

        let mut user = UserRecord::new(email.into_string(), self.created_at.unwrap_or(now));
        user.id = id;
        user.first_name = self.first_name.unwrap_or_default().trim().to_string();
        user.last_name = self.last_name.unwrap_or_default().trim().to_string();
        user.phone = self.phone.map(|p| p.trim().to_string()).filter(|p| !p.is_empty());
        user.gender = normalize_gender(self.gender.as_deref());
        user.date_of_birth = self.date_of_birth.as_deref().and_then(parse_date_of_birth);
        user.role = Role::parse(self.role.as_deref().unwrap_or(""));
        user.is_admin = self.is_admin;
        user.restricted = self.restricted;
        user.doctor_verification_status = verification;
        user.specialization = non_blank(self.specialization);
        user.license_number = non_blank(self.license_number);
        user.city = non_blank(self.city);
        user.preferred_pin = self.preferred_pin.as_deref().and_then(normalize_pin);
        user.password_hash = self.password_hash.unwrap_or_default();
        user.otp_verified = self.otp_verified;
        user.has_logged_in = self.has_logged_in;
        Ok(user)
    }
}

/// Display name for a user: `Dr. {first} {last}` for doctors, `{first} {last}` otherwise.
pub fn display_name(user: &UserRecord) -> String {
    let name = user.full_name();
    if user.role == Role::Doctor {
        format!("Dr. {}", name)
    } else {
        name
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Booleans, non-zero numbers and the strings `1`, `true`, `yes`, `y`, `on` are true.
fn truthy<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(b) => b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "y" | "on"
        ),
        _ => false,
    })
}

/// Strings as-is, numbers rendered to text, anything else dropped.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(map) => map
            .get("$oid")
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    })
}
