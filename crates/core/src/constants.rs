//! Constants used throughout the PhysiHome core crate.

/// Admin mailboxes used when `ADMIN_EMAILS` is not configured.
pub const DEFAULT_ADMIN_EMAILS: &[&str] = &["info@physihome.com"];

/// Default application name shown in outbound email.
pub const DEFAULT_APP_NAME: &str = "PhysiHome";

/// Default name of the session cookie.
pub const DEFAULT_SESSION_COOKIE_NAME: &str = "physihome_session";

/// Default session lifetime in minutes (one day).
pub const DEFAULT_SESSION_TTL_MINUTES: i64 = 60 * 24;

/// Default number of digits in a one-time passcode.
pub const DEFAULT_OTP_LENGTH: usize = 6;

/// Default OTP validity window in minutes.
pub const DEFAULT_OTP_EXPIRY_MINUTES: i64 = 10;

/// Default sender address for notification email.
pub const DEFAULT_NOTIFY_FROM_EMAIL: &str = "no-reply@physihome.com";

/// Secret used outside `prod` when none is configured.
pub const DEV_SECRET_KEY: &str = "CHANGE_ME";

/// Display label for a conversation whose other participants are all admins.
pub const ADMIN_THREAD_LABEL: &str = "Admin";

/// Display label when the counterparty cannot be resolved.
pub const FALLBACK_THREAD_LABEL: &str = "Conversation";

/// User-facing denial for a doctor awaiting credential review.
pub const RESTRICTED_DOCTOR_MESSAGE: &str = "Please wait for admin to verify your account";

/// Length of the random password given to admin mailbox accounts.
pub const ADMIN_MAILBOX_PASSWORD_LEN: usize = 32;

/// Profile landing path after login or OTP verification.
pub const PROFILE_PATH: &str = "/profile";

/// Media type recorded for uploads whose type is neither given nor detectable.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Filename recorded for uploads that arrive without one.
pub const DEFAULT_UPLOAD_FILENAME: &str = "upload";

/// Subject of the admin email carrying a doctor's credential documents.
pub const DOCUMENTS_EMAIL_SUBJECT: &str = "New doctor verification documents";
