//! Key material shared by the signature verifier and the message cipher.
//!
//! WeCom hands out the AES key as a 43-character `EncodingAESKey`. Appending a
//! single `=` and base64-decoding it yields the 32-byte AES-256 key. The same
//! key also supplies the CBC IV (its first 16 bytes).

use base64::{
    alphabet,
    engine::{general_purpose::GeneralPurposeConfig, GeneralPurpose},
    Engine,
};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// AES key length in bytes.
pub const AES_KEY_LEN: usize = 32;

/// Length of the textual `EncodingAESKey`.
pub const ENCODING_AES_KEY_LEN: usize = 43;

/// Upper bound on the callback token length.
pub const MAX_TOKEN_LEN: usize = 32;

// The platform generates keys whose last character carries non-zero trailing
// bits, so the strict standard engine would reject valid keys.
const KEY_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_allow_trailing_bits(true),
);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("token must not be empty")]
    EmptyToken,
    #[error("token must be at most 32 characters, got {0}")]
    TokenTooLong(usize),
    #[error("token must contain only alphanumeric characters")]
    TokenNotAlphanumeric,
    #[error("encoding aes key must be exactly 43 characters, got {0}")]
    EncodingKeyLength(usize),
    #[error("encoding aes key must contain only alphanumeric characters")]
    EncodingKeyNotAlphanumeric,
    #[error("encoding aes key is not valid base64")]
    EncodingKeyDecode,
    #[error("invalid key length: expected 32, got {0}")]
    InvalidKeyLength(usize),
    #[error("corp id must not be empty")]
    EmptyCorpId,
}

/// Returns true when `s` is non-empty and made only of ASCII letters and digits.
///
/// This is the single validator used for both the token and the encoding key.
pub fn is_alphanumeric(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_alphanumeric())
}

/// Validate a callback token: 1..=32 ASCII alphanumeric characters.
pub fn validate_token(token: &str) -> Result<(), KeyError> {
    if token.is_empty() {
        return Err(KeyError::EmptyToken);
    }
    if token.len() > MAX_TOKEN_LEN {
        return Err(KeyError::TokenTooLong(token.len()));
    }
    if !is_alphanumeric(token) {
        return Err(KeyError::TokenNotAlphanumeric);
    }
    Ok(())
}

/// Validate the textual form of an `EncodingAESKey` without decoding it.
pub fn validate_encoding_aes_key(encoding_aes_key: &str) -> Result<(), KeyError> {
    if encoding_aes_key.len() != ENCODING_AES_KEY_LEN {
        return Err(KeyError::EncodingKeyLength(encoding_aes_key.len()));
    }
    if !is_alphanumeric(encoding_aes_key) {
        return Err(KeyError::EncodingKeyNotAlphanumeric);
    }
    Ok(())
}

/// Decode a 43-character `EncodingAESKey` into the raw AES-256 key.
pub fn decode_encoding_aes_key(encoding_aes_key: &str) -> Result<[u8; AES_KEY_LEN], KeyError> {
    let mut padded = String::with_capacity(ENCODING_AES_KEY_LEN + 1);
    padded.push_str(encoding_aes_key);
    padded.push('=');

    let mut decoded = KEY_ENGINE
        .decode(padded.as_bytes())
        .map_err(|_| KeyError::EncodingKeyDecode)?;

    let result = <[u8; AES_KEY_LEN]>::try_from(decoded.as_slice())
        .map_err(|_| KeyError::InvalidKeyLength(decoded.len()));
    decoded.zeroize();
    result
}

/// Token, AES key and corp id for one WeCom application.
///
/// Immutable once built. The AES key is zeroized on drop and never printed.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct KeyMaterial {
    aes_key: [u8; AES_KEY_LEN],
    token: String,
    corp_id: String,
}

impl KeyMaterial {
    /// Build key material from a raw 32-byte AES key.
    pub fn new(
        aes_key: [u8; AES_KEY_LEN],
        token: impl Into<String>,
        corp_id: impl Into<String>,
    ) -> Result<Self, KeyError> {
        let token = token.into();
        let corp_id = corp_id.into();
        validate_token(&token)?;
        if corp_id.is_empty() {
            return Err(KeyError::EmptyCorpId);
        }
        Ok(Self {
            aes_key,
            token,
            corp_id,
        })
    }

    /// Build key material from the `EncodingAESKey` as configured in the admin console.
    pub fn from_encoding_aes_key(
        token: impl Into<String>,
        encoding_aes_key: &str,
        corp_id: impl Into<String>,
    ) -> Result<Self, KeyError> {
        validate_encoding_aes_key(encoding_aes_key)?;
        let aes_key = decode_encoding_aes_key(encoding_aes_key)?;
        Self::new(aes_key, token, corp_id)
    }

    pub fn aes_key(&self) -> &[u8; AES_KEY_LEN] {
        &self.aes_key
    }

    /// CBC initialization vector: the first 16 bytes of the key.
    pub fn iv(&self) -> &[u8] {
        &self.aes_key[..16]
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn corp_id(&self) -> &str {
        &self.corp_id
    }
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("aes_key", &"<redacted>")
            .field("token", &"<redacted>")
            .field("corp_id", &self.corp_id)
            .finish()
    }
}
