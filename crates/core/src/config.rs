//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and passed into services as
//! `Arc<CoreConfig>`. Nothing in this crate reads environment variables during request handling;
//! the `*_from_env_value` helpers take already-read values so binaries own the environment.

use crate::constants::{
    DEFAULT_ADMIN_EMAILS, DEFAULT_APP_NAME, DEFAULT_NOTIFY_FROM_EMAIL, DEFAULT_OTP_EXPIRY_MINUTES,
    DEFAULT_OTP_LENGTH, DEFAULT_SESSION_COOKIE_NAME, DEFAULT_SESSION_TTL_MINUTES, DEV_SECRET_KEY,
};
use crate::{PortalError, PortalResult};
use chrono::Duration;
use physihome_types::normalize_email;

/// Deployment environment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Environment {
    Dev,
    Prod,
    Test,
}

impl Environment {
    pub fn is_prod(self) -> bool {
        self == Environment::Prod
    }
}

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    app_name: String,
    environment: Environment,
    secret_key: String,
    admin_emails: Vec<String>,
    session_cookie_name: String,
    session_ttl: Duration,
    otp_length: usize,
    otp_expiry: Duration,
    notify_from_email: String,
}

impl CoreConfig {
    /// Create a new `CoreConfig` with defaults for everything but the secret and admin list.
    ///
    /// Admin emails are normalised (trimmed, lowercased) and deduplicated.
    pub fn new(
        environment: Environment,
        secret_key: String,
        admin_emails: Vec<String>,
    ) -> PortalResult<Self> {
        if secret_key.trim().is_empty() {
            return Err(PortalError::InvalidInput(
                "secret_key cannot be empty".into(),
            ));
        }

        let mut normalized: Vec<String> = admin_emails
            .iter()
            .map(|e| normalize_email(e))
            .filter(|e| !e.is_empty())
            .collect();
        normalized.sort();
        normalized.dedup();

        Ok(Self {
            app_name: DEFAULT_APP_NAME.into(),
            environment,
            secret_key,
            admin_emails: normalized,
            session_cookie_name: DEFAULT_SESSION_COOKIE_NAME.into(),
            session_ttl: Duration::minutes(DEFAULT_SESSION_TTL_MINUTES),
            otp_length: DEFAULT_OTP_LENGTH,
            otp_expiry: Duration::minutes(DEFAULT_OTP_EXPIRY_MINUTES),
            notify_from_email: DEFAULT_NOTIFY_FROM_EMAIL.into(),
        })
    }

    pub fn with_app_name(mut self, app_name: String) -> Self {
        self.app_name = app_name;
        self
    }

    pub fn with_session(mut self, cookie_name: String, ttl_minutes: i64) -> PortalResult<Self> {
        if cookie_name.trim().is_empty() {
            return Err(PortalError::InvalidInput(
                "session cookie name cannot be empty".into(),
            ));
        }
        if ttl_minutes <= 0 {
            return Err(PortalError::InvalidInput(
                "session lifetime must be positive".into(),
            ));
        }
        self.session_cookie_name = cookie_name;
        self.session_ttl = Duration::minutes(ttl_minutes);
        Ok(self)
    }

    pub fn with_otp(mut self, length: usize, expiry_minutes: i64) -> PortalResult<Self> {
        if !(4..=10).contains(&length) {
            return Err(PortalError::InvalidInput(
                "OTP length must be between 4 and 10".into(),
            ));
        }
        if expiry_minutes <= 0 {
            return Err(PortalError::InvalidInput(
                "OTP expiry must be positive".into(),
            ));
        }
        self.otp_length = length;
        self.otp_expiry = Duration::minutes(expiry_minutes);
        Ok(self)
    }

    pub fn with_notify_from(mut self, from: String) -> Self {
        self.notify_from_email = from;
        self
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn secret_key(&self) -> &str {
        &self.secret_key
    }

    pub fn admin_emails(&self) -> &[String] {
        &self.admin_emails
    }

    /// True if `email` (any case, surrounding whitespace ignored) is a configured admin email.
    pub fn is_admin_email(&self, email: &str) -> bool {
        self.admin_emails
            .binary_search(&normalize_email(email))
            .is_ok()
    }

    pub fn session_cookie_name(&self) -> &str {
        &self.session_cookie_name
    }

    pub fn session_ttl(&self) -> Duration {
        self.session_ttl
    }

    pub fn otp_length(&self) -> usize {
        self.otp_length
    }

    pub fn otp_expiry(&self) -> Duration {
        self.otp_expiry
    }

    pub fn notify_from_email(&self) -> &str {
        &self.notify_from_email
    }
}

/// Parse the deployment environment. Missing or blank means `Dev`.
pub fn environment_from_env_value(value: Option<String>) -> PortalResult<Environment> {
    match value.as_deref().map(str::trim).unwrap_or("") {
        "" | "dev" => Ok(Environment::Dev),
        "prod" => Ok(Environment::Prod),
        "test" => Ok(Environment::Test),
        other => Err(PortalError::InvalidInput(format!(
            "unknown environment '{}': expected dev, prod or test",
            other
        ))),
    }
}

/// Resolve the secret key. A missing secret is only tolerated outside `prod`.
pub fn secret_key_from_env_value(
    value: Option<String>,
    environment: Environment,
) -> PortalResult<String> {
    match value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        Some(secret) => Ok(secret),
        None if environment.is_prod() => Err(PortalError::InvalidInput(
            "SECRET_KEY must be set in prod".into(),
        )),
        None => Ok(DEV_SECRET_KEY.into()),
    }
}

/// Parse a comma-separated admin email list, falling back to the defaults when unset.
pub fn admin_emails_from_env_value(value: Option<String>) -> Vec<String> {
    match value.filter(|v| !v.trim().is_empty()) {
        Some(list) => list
            .split(',')
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(str::to_string)
            .collect(),
        None => DEFAULT_ADMIN_EMAILS.iter().map(|e| e.to_string()).collect(),
    }
}

/// Parse an optional number, falling back to `default` when unset or blank.
pub fn number_from_env_value<T: std::str::FromStr>(
    name: &str,
    value: Option<String>,
    default: T,
) -> PortalResult<T> {
    match value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        Some(v) => v
            .parse::<T>()
            .map_err(|_| PortalError::InvalidInput(format!("{} must be a number, got '{}'", name, v))),
        None => Ok(default),
    }
}

/// Build the full configuration from variable lookups.
///
/// `lookup` is called with variable names such as `SECRET_KEY`; binaries pass
/// `|name| std::env::var(name).ok()`.
pub fn config_from_env_values(lookup: impl Fn(&str) -> Option<String>) -> PortalResult<CoreConfig> {
    let environment = environment_from_env_value(lookup("PHYSIHOME_ENV"))?;
    let secret_key = secret_key_from_env_value(lookup("SECRET_KEY"), environment)?;
    let admin_emails = admin_emails_from_env_value(lookup("ADMIN_EMAILS"));

    let mut cfg = CoreConfig::new(environment, secret_key, admin_emails)?;
    if let Some(name) = lookup("APP_NAME").filter(|v| !v.trim().is_empty()) {
        cfg = cfg.with_app_name(name.trim().to_string());
    }
    let cookie = lookup("SESSION_COOKIE_NAME")
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_SESSION_COOKIE_NAME.into());
    let ttl = number_from_env_value(
        "SESSION_TTL_MINUTES",
        lookup("SESSION_TTL_MINUTES"),
        DEFAULT_SESSION_TTL_MINUTES,
    )?;
    cfg = cfg.with_session(cookie, ttl)?;

    let otp_length = number_from_env_value("OTP_LENGTH", lookup("OTP_LENGTH"), DEFAULT_OTP_LENGTH)?;
    let otp_expiry = number_from_env_value(
        "OTP_EXPIRY_MINUTES",
        lookup("OTP_EXPIRY_MINUTES"),
        DEFAULT_OTP_EXPIRY_MINUTES,
    )?;
    cfg = cfg.with_otp(otp_length, otp_expiry)?;

    if let Some(from) = lookup("NOTIFY_FROM_EMAIL").filter(|v| !v.trim().is_empty()) {
        cfg = cfg.with_notify_from(from.trim().to_string());
    }
    Ok(cfg)
}
