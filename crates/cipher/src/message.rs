use crate::{CipherError, CipherResult};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    Key, XChaCha20Poly1305, XNonce,
};
use rand::RngCore;
use sha2::{Digest, Sha256};

const NONCE_LEN: usize = 24;

/// Derives the 32-byte message key from the shared secret.
///
/// Deterministic: the same secret always yields the same key. Per-message uniqueness comes from
/// the random nonce, not from the key.
pub fn derive_key(secret: &str) -> [u8; 32] {
    let digest = Sha256::digest(secret.as_bytes());
    let mut key = [0u8; 32];
    key.copy_from_slice(&digest);
    key
}

/// XChaCha20-Poly1305 cipher for message bodies.
///
/// Ciphertexts are encoded as unpadded base64url of `nonce || sealed`, so they can be stored in
/// a text column without further escaping.
#[derive(Clone)]
pub struct MessageCipher {
    key: [u8; 32],
}

impl MessageCipher {
    pub fn from_secret(secret: &str) -> Self {
        Self {
            key: derive_key(secret),
        }
    }

    pub fn encrypt(&self, plaintext: &str) -> CipherResult<String> {
        let cipher = XChaCha20Poly1305::new(Key::from_slice(&self.key));

        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = XNonce::from(nonce_bytes);

        let sealed = cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| CipherError::Encrypt)?;

        let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&sealed);
        Ok(URL_SAFE_NO_PAD.encode(out))
    }

    /// Decrypts a ciphertext produced by [`MessageCipher::encrypt`].
    ///
    /// # Errors
    ///
    /// - [`CipherError::Malformed`] if the text is not base64url or too short to hold a nonce.
    /// - [`CipherError::Decrypt`] if authentication fails (wrong key or tampered bytes), or the
    ///   plaintext is not UTF-8.
    pub fn decrypt(&self, ciphertext: &str) -> CipherResult<String> {
        let raw = URL_SAFE_NO_PAD
            .decode(ciphertext)
            .map_err(|e| CipherError::Malformed(e.to_string()))?;
        if raw.len() < NONCE_LEN {
            return Err(CipherError::Malformed("ciphertext shorter than nonce".into()));
        }
        let (nonce_bytes, sealed) = raw.split_at(NONCE_LEN);

        let cipher = XChaCha20Poly1305::new(Key::from_slice(&self.key));
        let plain = cipher
            .decrypt(XNonce::from_slice(nonce_bytes), sealed)
            .map_err(|_| CipherError::Decrypt)?;

        String::from_utf8(plain).map_err(|_| CipherError::Decrypt)
    }
}

impl std::fmt::Debug for MessageCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageCipher").finish_non_exhaustive()
    }
}
