//! Signature and cipher combined behind the trait the callback protocol uses.

use crate::cipher::{CipherError, MessageCipher};
use crate::keys::KeyMaterial;
use crate::signature::SignatureVerifier;

/// Crypto operations needed to serve WeCom callbacks.
pub trait CallbackCrypto: Send + Sync {
    /// Check `msg_signature` over `(timestamp, nonce, encrypt)`.
    fn verify_signature(&self, signature: &str, timestamp: &str, nonce: &str, encrypt: &str) -> bool;

    /// Decrypt an `Encrypt` field or `echostr`.
    fn decrypt(&self, encrypted: &str) -> Result<Vec<u8>, CipherError>;

    /// Encrypt a reply payload.
    fn encrypt(&self, plaintext: &[u8]) -> Result<String, CipherError>;
}

/// Production implementation backed by AES-256-CBC and SHA-1 signatures.
#[derive(Clone, Debug)]
pub struct WeComCrypto {
    verifier: SignatureVerifier,
    cipher: MessageCipher,
}

impl WeComCrypto {
    pub fn new(keys: KeyMaterial) -> Self {
        Self {
            verifier: SignatureVerifier::from_keys(&keys),
            cipher: MessageCipher::new(keys),
        }
    }

    pub fn verifier(&self) -> &SignatureVerifier {
        &self.verifier
    }

    /// Encrypt and sign a passive reply.
    pub fn encrypt_reply(
        &self,
        plaintext: &[u8],
        timestamp: &str,
        nonce: &str,
    ) -> Result<ReplyEnvelope, CipherError> {
        let encrypt = self.cipher.encrypt(plaintext)?;
        let msg_signature = self.verifier.sign(timestamp, nonce, &encrypt);
        Ok(ReplyEnvelope {
            encrypt,
            msg_signature,
            timestamp: timestamp.to_string(),
            nonce: nonce.to_string(),
        })
    }
}

impl CallbackCrypto for WeComCrypto {
    fn verify_signature(&self, signature: &str, timestamp: &str, nonce: &str, encrypt: &str) -> bool {
        self.verifier.verify(signature, timestamp, nonce, encrypt)
    }

    fn decrypt(&self, encrypted: &str) -> Result<Vec<u8>, CipherError> {
        self.cipher.decrypt(encrypted)
    }

    fn encrypt(&self, plaintext: &[u8]) -> Result<String, CipherError> {
        self.cipher.encrypt(plaintext)
    }
}

/// An encrypted, signed reply ready to be returned to the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyEnvelope {
    pub encrypt: String,
    pub msg_signature: String,
    pub timestamp: String,
    pub nonce: String,
}

impl ReplyEnvelope {
    /// Render as the XML document WeCom expects for encrypted replies.
    ///
    /// Base64 and hex contain no XML metacharacters; timestamp and nonce are
    /// placed in CDATA where the platform expects text.
    pub fn to_xml(&self) -> String {
        format!(
            "<xml><Encrypt><![CDATA[{}]]></Encrypt><MsgSignature><![CDATA[{}]]></MsgSignature><TimeStamp>{}</TimeStamp><Nonce><![CDATA[{}]]></Nonce></xml>",
            self.encrypt,
            self.msg_signature,
            escape_text(&self.timestamp),
            self.nonce.replace("]]>", "]]]]><![CDATA[>"),
        )
    }
}

fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}
