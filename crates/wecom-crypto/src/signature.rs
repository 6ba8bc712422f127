//! Callback signature: `hex(sha1(sort(token, timestamp, nonce, encrypt).concat()))`.

use constant_time_eq::constant_time_eq;
use sha1::{Digest, Sha1};

use crate::keys::KeyMaterial;

/// Computes and checks `msg_signature` values for one token.
#[derive(Clone)]
pub struct SignatureVerifier {
    token: String,
}

impl SignatureVerifier {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    pub fn from_keys(keys: &KeyMaterial) -> Self {
        Self::new(keys.token())
    }

    /// Lowercase hex SHA-1 over the byte-wise sorted, concatenated inputs.
    pub fn sign(&self, timestamp: &str, nonce: &str, encrypt: &str) -> String {
        let mut parts = [self.token.as_str(), timestamp, nonce, encrypt];
        // str ordering is byte-wise lexicographic
        parts.sort_unstable();

        let mut hasher = Sha1::new();
        for part in parts {
            hasher.update(part.as_bytes());
        }
        hex::encode(hasher.finalize())
    }

    /// Exact, case-sensitive comparison of `signature` with the expected value.
    pub fn verify(&self, signature: &str, timestamp: &str, nonce: &str, encrypt: &str) -> bool {
        let expected = self.sign(timestamp, nonce, encrypt);
        constant_time_eq(expected.as_bytes(), signature.as_bytes())
    }
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Published WeCom URL-verification sample.
    const TOKEN: &str = "QDG6eK";
    const TIMESTAMP: &str = "1409659589";
    const NONCE: &str = "263014780";
    const ECHOSTR: &str = "P9nAzCzyDtyTWESHep1vC5X9xho/qYX3Zpb4yKa9SKld1DsH3Iyt3tP3zNdtp+4RPcs8TgAE7OaBO+FZXvnaqQ==";
    const SIGNATURE: &str = "5c45ff5e21c57e6ad56bac8758b79b1d9ac89fd3";

    #[test]
    fn test_sign_matches_known_vector() {
        let v = SignatureVerifier::new(TOKEN);
        assert_eq!(v.sign(TIMESTAMP, NONCE, ECHOSTR), SIGNATURE);
    }

    #[test]
    fn test_verify_known_vector() {
        let v = SignatureVerifier::new(TOKEN);
        assert!(v.verify(SIGNATURE, TIMESTAMP, NONCE, ECHOSTR));
    }

    #[test]
    fn test_verify_is_case_sensitive() {
        let v = SignatureVerifier::new(TOKEN);
        assert!(!v.verify(&SIGNATURE.to_uppercase(), TIMESTAMP, NONCE, ECHOSTR));
    }

    #[test]
    fn test_verify_rejects_altered_nonce() {
        let v = SignatureVerifier::new(TOKEN);
        assert!(!v.verify(SIGNATURE, TIMESTAMP, "263014781", ECHOSTR));
    }

    #[test]
    fn test_verify_rejects_wrong_token() {
        let v = SignatureVerifier::new("OtherToken");
        assert!(!v.verify(SIGNATURE, TIMESTAMP, NONCE, ECHOSTR));
    }

    #[test]
    fn test_sort_is_lexicographic_not_numeric() {
        // "10" < "9" as strings; a numeric sort would order these the other way.
        let v = SignatureVerifier::new("a");
        let expected = {
            let mut h = Sha1::new();
            h.update(b"109ab");
            hex::encode(h.finalize())
        };
        assert_eq!(v.sign("9", "10", "b"), expected);
    }

    #[test]
    fn test_verify_empty_signature() {
        let v = SignatureVerifier::new(TOKEN);
        assert!(!v.verify("", TIMESTAMP, NONCE, ECHOSTR));
    }
}
