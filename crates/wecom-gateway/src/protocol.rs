//! The two callback modes: URL verification (GET) and message delivery (POST).

use std::sync::Arc;

use tracing::{debug, info, warn};
use wecom_crypto::{CallbackCrypto, CipherError};

use crate::{
    ai::ChatRequest,
    dispatch::{DispatchError, ForwardDispatcher, ForwardJob},
    mention::should_forward,
    message::{parse_envelope, parse_message, CallbackQuery, XmlError},
};

#[derive(Debug, thiserror::Error)]
pub enum CallbackError {
    #[error("signature verification failed")]
    SignatureInvalid,
    #[error("decrypt: {0}")]
    Decrypt(#[from] CipherError),
    #[error("parse envelope: {0}")]
    EnvelopeParse(XmlError),
    #[error("parse message: {0}")]
    MessageParse(XmlError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// Mention found and queued for the assistant.
    Forwarded,
    /// Valid message that does not qualify for forwarding.
    Ignored,
    /// Qualified, but the forward queue refused it.
    Dropped,
}

impl CallbackOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallbackOutcome::Forwarded => "forwarded",
            CallbackOutcome::Ignored => "ignored",
            CallbackOutcome::Dropped => "dropped",
        }
    }
}

pub trait CallbackService: Send + Sync {
    /// URL ownership handshake. Returns the decrypted echo string.
    fn verify_url(&self, query: &CallbackQuery) -> Result<Vec<u8>, CallbackError>;

    /// Encrypted message delivery.
    fn handle_callback(&self, query: &CallbackQuery, body: &[u8]) -> Result<CallbackOutcome, CallbackError>;
}

pub struct CallbackHandler {
    crypto: Arc<dyn CallbackCrypto>,
    dispatcher: ForwardDispatcher,
}

impl CallbackHandler {
    pub fn new(crypto: Arc<dyn CallbackCrypto>, dispatcher: ForwardDispatcher) -> Self {
        Self { crypto, dispatcher }
    }

    fn check_signature(&self, query: &CallbackQuery, encrypt: &str) -> Result<(), CallbackError> {
        if self
            .crypto
            .verify_signature(&query.msg_signature, &query.timestamp, &query.nonce, encrypt)
        {
            Ok(())
        } else {
            warn!(timestamp = %query.timestamp, nonce = %query.nonce, "signature verification failed");
            Err(CallbackError::SignatureInvalid)
        }
    }
}

impl CallbackService for CallbackHandler {
    fn verify_url(&self, query: &CallbackQuery) -> Result<Vec<u8>, CallbackError> {
        let echostr = query.echostr.as_deref().unwrap_or_default();
        self.check_signature(query, echostr)?;

        let plain = self.crypto.decrypt(echostr).map_err(|e| {
            warn!(timestamp = %query.timestamp, nonce = %query.nonce, error = %e, "decrypt echostr failed");
            CallbackError::Decrypt(e)
        })?;

        info!(timestamp = %query.timestamp, nonce = %query.nonce, "callback URL verified");
        Ok(plain)
    }

    fn handle_callback(&self, query: &CallbackQuery, body: &[u8]) -> Result<CallbackOutcome, CallbackError> {
        let envelope = parse_envelope(body).map_err(|e| {
            warn!(timestamp = %query.timestamp, nonce = %query.nonce, error = %e, "malformed callback body");
            CallbackError::EnvelopeParse(e)
        })?;

        self.check_signature(query, &envelope.encrypt)?;

        let plain = self.crypto.decrypt(&envelope.encrypt).map_err(|e| {
            warn!(timestamp = %query.timestamp, nonce = %query.nonce, error = %e, "decrypt message failed");
            CallbackError::Decrypt(e)
        })?;

        let msg = parse_message(&plain).map_err(|e| {
            warn!(timestamp = %query.timestamp, nonce = %query.nonce, error = %e, "malformed decrypted message");
            CallbackError::MessageParse(e)
        })?;

        let msg_type = msg.message_type();
        debug!(
            msg_id = %msg.msg_id,
            msg_type = %msg.msg_type,
            from = %msg.from_user_name,
            "callback message decrypted"
        );

        if !should_forward(&msg_type, &msg.content) {
            return Ok(CallbackOutcome::Ignored);
        }

        let job = ForwardJob {
            msg_id: msg.msg_id,
            request: ChatRequest::from_wework(msg.from_user_name, msg.content),
        };
        match self.dispatcher.submit(job) {
            Ok(()) => Ok(CallbackOutcome::Forwarded),
            Err(DispatchError::QueueFull | DispatchError::Closed) => Ok(CallbackOutcome::Dropped),
        }
    }
}
