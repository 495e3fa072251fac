//! Canonical record identifiers.
//!
//! PhysiHome identifies users, conversations and messages with UUIDs in one *canonical*
//! representation: **32 lowercase hexadecimal characters** (no hyphens), for example
//! `550e8400e29b41d4a716446655440000`.
//!
//! Canonical form matters beyond cosmetics. Conversations are looked up by their sorted
//! participant sequence, so every participant id must sort and compare identically no matter
//! where it came from (cookie, URL path, JSON body, database row). Identifiers supplied from
//! outside the process are therefore parsed strictly with [`CanonicalUuid::parse`]; anything
//! hyphenated, uppercase, or the wrong length is rejected rather than silently normalised.

mod canonical;

pub use canonical::{CanonicalUuid, Uuid};

/// Error type for UUID operations.
#[derive(Debug, thiserror::Error)]
pub enum UuidError {
    /// Invalid input provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for UUID operations.
pub type UuidResult<T> = Result<T, UuidError>;
