use crate::{CipherError, CipherResult};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::{distributions::Alphanumeric, Rng};

/// Hashes a password with Argon2id, returning a PHC string.
pub fn hash_password(password: &str) -> CipherResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| CipherError::PasswordHash(e.to_string()))
}

/// Verifies a password against a PHC string. An unparseable hash is treated as a mismatch.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// A random alphanumeric password, used for mailbox accounts nobody logs into directly.
pub fn random_password(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify() {
        let hash = hash_password("Str0ng!pass").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("Str0ng!pass", &hash));
        assert!(!verify_password("wrong", &hash));
    }

    #[test]
    fn unparseable_hash_is_mismatch() {
        assert!(!verify_password("anything", "plaintext-not-a-hash"));
    }

    #[test]
    fn random_password_shape() {
        let a = random_password(32);
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, random_password(32));
    }
}
