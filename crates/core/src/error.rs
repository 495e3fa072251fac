use crate::constants::RESTRICTED_DOCTOR_MESSAGE;
use physihome_cipher::CipherError;
use physihome_store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum PortalError {
    #[error("authentication required")]
    Unauthenticated,
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("{0}")]
    Forbidden(String),
    #[error("{}", RESTRICTED_DOCTOR_MESSAGE)]
    RestrictedDoctor,
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    InvalidInput(String),
    #[error("email delivery failed: {0}")]
    Email(String),
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
    #[error("cipher error: {0}")]
    Cipher(#[from] CipherError),
}

impl PortalError {
    /// Generic access denial.
    pub fn forbidden() -> Self {
        PortalError::Forbidden("Forbidden".into())
    }
}

pub type PortalResult<T> = std::result::Result<T, PortalError>;
