#![forbid(unsafe_code)]

pub mod keys;
pub mod padding;
pub mod signature;
pub mod cipher;
pub mod callback;

#[cfg(test)]
mod proptests;

pub use callback::{CallbackCrypto, ReplyEnvelope, WeComCrypto};
pub use cipher::{CipherError, MessageCipher};
pub use keys::{KeyError, KeyMaterial};
pub use signature::SignatureVerifier;
