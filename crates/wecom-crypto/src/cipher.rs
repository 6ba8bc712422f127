//! AES-256-CBC message cipher for WeCom callback payloads.
//!
//! Plaintext layout inside the cipher:
//!
//! ```text
//! random(16) || msg_len(4, big-endian) || msg || corp_id || pkcs7 padding
//! ```
//!
//! The IV is the first 16 bytes of the AES key. This is fixed by the platform
//! and must be reproduced exactly.

use aes::cipher::{
    block_padding::NoPadding, generic_array::GenericArray, BlockDecryptMut, BlockEncryptMut, KeyIvInit,
};
use base64::{engine::general_purpose::STANDARD, Engine};

use crate::keys::KeyMaterial;
use crate::padding::{self, PaddingError, BLOCK_SIZE};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Bytes of random prefix in every payload.
pub const RANDOM_LEN: usize = 16;

/// Random prefix plus the 4-byte length field.
pub const HEADER_LEN: usize = RANDOM_LEN + 4;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CipherError {
    #[error("base64 decode failed")]
    Decode,
    #[error("ciphertext length {0} is not a positive multiple of the block size")]
    Alignment(usize),
    #[error("invalid padding: {0}")]
    Padding(#[from] PaddingError),
    #[error("plaintext too short: {0} bytes")]
    TooShort(usize),
    #[error("invalid message length {declared} for plaintext of {actual} bytes")]
    LengthMismatch { declared: u32, actual: usize },
    #[error("corp id mismatch")]
    TenantMismatch,
    #[error("message too large: {0} bytes")]
    MessageTooLarge(usize),
    #[error("random source unavailable")]
    Rng,
}

/// Encrypts and decrypts wire payloads for one corp.
///
/// Holds only immutable key material, so a single instance can be shared
/// across concurrent requests.
#[derive(Clone, Debug)]
pub struct MessageCipher {
    keys: KeyMaterial,
}

impl MessageCipher {
    pub fn new(keys: KeyMaterial) -> Self {
        Self { keys }
    }

    /// Decrypt a base64 ciphertext and return the embedded message bytes.
    pub fn decrypt(&self, encrypted: &str) -> Result<Vec<u8>, CipherError> {
        let mut buf = STANDARD
            .decode(encrypted.as_bytes())
            .map_err(|_| CipherError::Decode)?;

        if buf.is_empty() || buf.len() % BLOCK_SIZE != 0 {
            return Err(CipherError::Alignment(buf.len()));
        }

        let len = buf.len();
        let plaintext = Aes256CbcDec::new(GenericArray::from_slice(self.keys.aes_key()), GenericArray::from_slice(self.keys.iv()))
            .decrypt_padded_mut::<NoPadding>(&mut buf)
            .map_err(|_| CipherError::Alignment(len))?;

        let plaintext = padding::unpad(plaintext)?;
        let msg = split_payload(plaintext, self.keys.corp_id().as_bytes())?;
        Ok(msg.to_vec())
    }

    /// Encrypt `msg` with a fresh random prefix and return base64 ciphertext.
    pub fn encrypt(&self, msg: &[u8]) -> Result<String, CipherError> {
        let mut random = [0u8; RANDOM_LEN];
        getrandom::getrandom(&mut random).map_err(|_| CipherError::Rng)?;
        self.encrypt_with_random(&random, msg)
    }

    /// Encrypt with a caller-supplied random prefix. Deterministic; used for
    /// known-answer tests.
    pub fn encrypt_with_random(
        &self,
        random: &[u8; RANDOM_LEN],
        msg: &[u8],
    ) -> Result<String, CipherError> {
        let msg_len = u32::try_from(msg.len()).map_err(|_| CipherError::MessageTooLarge(msg.len()))?;
        let corp_id = self.keys.corp_id().as_bytes();

        let mut buf = Vec::with_capacity(HEADER_LEN + msg.len() + corp_id.len() + BLOCK_SIZE);
        buf.extend_from_slice(random);
        buf.extend_from_slice(&msg_len.to_be_bytes());
        buf.extend_from_slice(msg);
        buf.extend_from_slice(corp_id);
        padding::pad(&mut buf);

        let len = buf.len();
        let ciphertext = Aes256CbcEnc::new(GenericArray::from_slice(self.keys.aes_key()), GenericArray::from_slice(self.keys.iv()))
            .encrypt_padded_mut::<NoPadding>(&mut buf, len)
            .map_err(|_| CipherError::Alignment(len))?;

        Ok(STANDARD.encode(ciphertext))
    }
}

/// Split an unpadded plaintext into its message, checking the trailing corp id.
fn split_payload<'a>(plaintext: &'a [u8], corp_id: &[u8]) -> Result<&'a [u8], CipherError> {
    if plaintext.len() < HEADER_LEN {
        return Err(CipherError::TooShort(plaintext.len()));
    }

    let declared = u32::from_be_bytes([
        plaintext[RANDOM_LEN],
        plaintext[RANDOM_LEN + 1],
        plaintext[RANDOM_LEN + 2],
        plaintext[RANDOM_LEN + 3],
    ]);
    let end = HEADER_LEN
        .checked_add(declared as usize)
        .filter(|&end| end <= plaintext.len())
        .ok_or(CipherError::LengthMismatch {
            declared,
            actual: plaintext.len(),
        })?;

    if &plaintext[end..] != corp_id {
        return Err(CipherError::TenantMismatch);
    }
    Ok(&plaintext[HEADER_LEN..end])
}
