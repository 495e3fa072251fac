//! One-time passcodes.
//!
//! Codes are never stored in the clear: only the HMAC-SHA256 digest keyed by the process secret
//! is persisted, and verification recomputes the MAC and compares in constant time.

use crate::{CipherError, CipherResult};
use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Generates a numeric code of `len` digits. Leading zeros are allowed.
pub fn generate(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

/// Hex-encoded HMAC-SHA256 of `code` keyed by `secret`.
pub fn digest(secret: &str, code: &str) -> CipherResult<String> {
    Ok(hex::encode(mac(secret, code)?.finalize().into_bytes()))
}

/// Returns true if `code` matches the stored hex digest.
pub fn verify(secret: &str, code: &str, stored_digest: &str) -> bool {
    let Ok(expected) = hex::decode(stored_digest) else {
        return false;
    };
    match mac(secret, code.trim()) {
        Ok(mac) => mac.verify_slice(&expected).is_ok(),
        Err(_) => false,
    }
}

fn mac(secret: &str, code: &str) -> CipherResult<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| CipherError::Malformed(e.to_string()))?;
    mac.update(code.as_bytes());
    Ok(mac)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_requested_length_digits() {
        for len in [4, 6, 10] {
            let code = generate(len);
            assert_eq!(code.len(), len);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn digest_verifies() {
        let d = digest("secret", "123456").unwrap();
        assert_eq!(d.len(), 64);
        assert!(verify("secret", "123456", &d));
        assert!(verify("secret", " 123456 ", &d));
        assert!(!verify("secret", "654321", &d));
        assert!(!verify("other", "123456", &d));
    }

    #[test]
    fn garbage_digest_never_verifies() {
        assert!(!verify("secret", "123456", "zz"));
        assert!(!verify("secret", "123456", ""));
    }
}
