//! Input validation and normalisation for account data.
//!
//! Rejections carry the user-facing message as `PortalError::InvalidInput`.

use crate::{PortalError, PortalResult};
use chrono::NaiveDate;

const MIN_PASSWORD_LEN: usize = 8;
const MAX_PASSWORD_LEN: usize = 128;
const MIN_PIN_DIGITS: usize = 3;
const MAX_PIN_DIGITS: usize = 6;

/// Validates password strength.
///
/// Requires 8 to 128 characters with at least one lowercase letter, one uppercase letter, one
/// digit and one non-alphanumeric character.
pub fn validate_password_strength(password: &str) -> PortalResult<()> {
    let len = password.chars().count();
    if len < MIN_PASSWORD_LEN {
        return Err(PortalError::InvalidInput(
            "Password must be at least 8 characters long.".into(),
        ));
    }
    if len > MAX_PASSWORD_LEN {
        return Err(PortalError::InvalidInput(
            "Password must be 128 characters or fewer.".into(),
        ));
    }

    let checks: [(fn(&char) -> bool, &str); 4] = [
        (char::is_ascii_lowercase, "one lowercase letter"),
        (char::is_ascii_uppercase, "one uppercase letter"),
        (char::is_ascii_digit, "one number"),
        (|c: &char| !c.is_ascii_alphanumeric(), "one special character"),
    ];
    for (check, description) in checks {
        if !password.chars().any(|c| check(&c)) {
            return Err(PortalError::InvalidInput(format!(
                "Password must include at least {}.",
                description
            )));
        }
    }
    Ok(())
}

/// Parses a date of birth given as `YYYY-MM-DD` or `DD-MM-YYYY`.
pub fn parse_date_of_birth(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    ["%Y-%m-%d", "%d-%m-%Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

/// Resolves the date of birth from the primary field, then the fallback field.
pub fn require_date_of_birth(primary: &str, fallback: Option<&str>) -> PortalResult<NaiveDate> {
    parse_date_of_birth(primary)
        .or_else(|| fallback.and_then(parse_date_of_birth))
        .ok_or_else(|| {
            PortalError::InvalidInput(
                "Enter your date of birth as DD-MM-YYYY or use the picker.".into(),
            )
        })
}

/// Normalises a postal PIN: keeps digits only, requires at least three, truncates to six.
pub fn normalize_pin(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.len() < MIN_PIN_DIGITS {
        return None;
    }
    Some(digits.chars().take(MAX_PIN_DIGITS).collect())
}

/// Validates a doctor's practice location, returning the trimmed city and normalised PIN.
pub fn require_location(city: &str, pin: &str) -> PortalResult<(String, String)> {
    let city = city.trim();
    match (city.is_empty(), normalize_pin(pin)) {
        (false, Some(pin)) => Ok((city.to_string(), pin)),
        _ => Err(PortalError::InvalidInput(
            "City and a valid PIN code are required.".into(),
        )),
    }
}

/// Accepts `male`, `female` or `other` in any case; anything else is dropped.
pub fn normalize_gender(raw: Option<&str>) -> Option<String> {
    let gender = raw?.trim().to_ascii_lowercase();
    matches!(gender.as_str(), "male" | "female" | "other").then_some(gender)
}

/// Trimmed, non-empty text or an `InvalidInput` naming the field.
pub fn require_text(field: &str, value: &str) -> PortalResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(PortalError::InvalidInput(format!("{} is required.", field)));
    }
    Ok(trimmed.to_string())
}
