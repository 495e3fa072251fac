//! Signed tokens of the form `base64url(payload).base64url(hmac)`.
//!
//! The payload is opaque bytes; callers decide its encoding and any expiry semantics.

use crate::{CipherError, CipherResult};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone)]
pub struct TokenSigner {
    key: Vec<u8>,
}

impl TokenSigner {
    pub fn new(secret: &str) -> Self {
        // Domain-separate session signing from OTP digests that share the secret.
        let mut key = b"physihome-session:".to_vec();
        key.extend_from_slice(secret.as_bytes());
        Self { key }
    }

    pub fn sign(&self, payload: &[u8]) -> CipherResult<String> {
        let tag = self.mac(payload)?.finalize().into_bytes();
        Ok(format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(payload),
            URL_SAFE_NO_PAD.encode(tag)
        ))
    }

    /// Returns the payload if the signature is valid.
    pub fn verify(&self, token: &str) -> CipherResult<Vec<u8>> {
        let (payload_b64, tag_b64) = token.split_once('.').ok_or(CipherError::InvalidToken)?;
        let payload = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| CipherError::InvalidToken)?;
        let tag = URL_SAFE_NO_PAD
            .decode(tag_b64)
            .map_err(|_| CipherError::InvalidToken)?;
        self.mac(&payload)?
            .verify_slice(&tag)
            .map_err(|_| CipherError::InvalidToken)?;
        Ok(payload)
    }

    fn mac(&self, payload: &[u8]) -> CipherResult<HmacSha256> {
        let mut mac =
            HmacSha256::new_from_slice(&self.key).map_err(|_| CipherError::InvalidToken)?;
        mac.update(payload);
        Ok(mac)
    }
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner").finish_non_exhaustive()
    }
}
