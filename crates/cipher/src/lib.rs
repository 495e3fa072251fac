//! Cryptographic primitives for PhysiHome.
//!
//! - [`MessageCipher`]: authenticated encryption of message bodies at rest.
//! - [`otp`]: one-time passcode generation and keyed digests.
//! - [`password`]: Argon2id password hashing.
//! - [`token`]: HMAC-signed opaque tokens used for sessions.
//!
//! Every keyed primitive here is derived from the single process secret supplied by
//! configuration. Nothing in this crate reads the environment.

pub mod message;
pub mod otp;
pub mod password;
pub mod token;

pub use message::{derive_key, MessageCipher};
pub use token::TokenSigner;

use thiserror::Error;

/// Errors produced by the cipher primitives.
#[derive(Error, Debug)]
pub enum CipherError {
    #[error("encryption failed")]
    Encrypt,
    #[error("decryption failed")]
    Decrypt,
    #[error("malformed ciphertext: {0}")]
    Malformed(String),
    #[error("password hashing failed: {0}")]
    PasswordHash(String),
    #[error("invalid token")]
    InvalidToken,
}

pub type CipherResult<T> = Result<T, CipherError>;
