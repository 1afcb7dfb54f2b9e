use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, AeadCore, KeyInit, OsRng},
};
use thiserror::Error;

const NONCE_SIZE: usize = 12; // AES-GCM standard nonce size
const KEY_SIZE: usize = 32;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CryptoError {
    #[error("Invalid hex: {0}")]
    InvalidHex(String),
    #[error("Encryption key must be 32 bytes (256 bits) long")]
    InvalidKeyLength,
    #[error("Ciphertext is too short to contain a nonce")]
    CiphertextTooShort,
    #[error("Encryption failed")]
    EncryptionFailed,
    #[error("Decryption failed")]
    DecryptionFailed,
    #[error("Invalid UTF-8 sequence: {0}")]
    InvalidUtf8(String),
}

/// Encrypts stored credentials with AES-256-GCM.
///
/// Output layout is `nonce || ciphertext`, hex encoded, so it fits a TEXT column.
#[derive(Clone)]
pub struct TokenCipher {
    key: [u8; KEY_SIZE],
}

impl std::fmt::Debug for TokenCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCipher").finish_non_exhaustive()
    }
}

impl TokenCipher {
    pub fn from_hex(key_hex: &str) -> Result<Self, CryptoError> {
        let key_bytes =
            hex::decode(key_hex.trim()).map_err(|e| CryptoError::InvalidHex(e.to_string()))?;
        let key: [u8; KEY_SIZE] = key_bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidKeyLength)?;
        Ok(Self { key })
    }

    pub fn encrypt(&self, plain_text: &str) -> Result<String, CryptoError> {
        let cipher = Aes256Gcm::new(self.key.as_slice().into());

        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = cipher
            .encrypt(&nonce, plain_text.as_bytes())
            .map_err(|_| CryptoError::EncryptionFailed)?;

        let mut result = nonce.to_vec();
        result.extend_from_slice(&ciphertext);

        Ok(hex::encode(result))
    }

    pub fn decrypt(&self, cipher_hex: &str) -> Result<String, CryptoError> {
        let cipher = Aes256Gcm::new(self.key.as_slice().into());

        let encrypted_data =
            hex::decode(cipher_hex).map_err(|e| CryptoError::InvalidHex(e.to_string()))?;
        if encrypted_data.len() < NONCE_SIZE {
            return Err(CryptoError::CiphertextTooShort);
        }

        let (nonce_bytes, ciphertext) = encrypted_data.split_at(NONCE_SIZE);
        let nonce = Nonce::from_slice(nonce_bytes);

        let decrypted_bytes = cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| CryptoError::DecryptionFailed)?;

        String::from_utf8(decrypted_bytes).map_err(|e| CryptoError::InvalidUtf8(e.to_string()))
    }
}
