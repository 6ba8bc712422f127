//! Decides which messages are relayed to the assistant.

use crate::message::MessageType;

/// True for text messages containing `@`.
///
/// A plain substring test: structured mention markup is not parsed.
pub fn should_forward(msg_type: &MessageType, content: &str) -> bool {
    *msg_type == MessageType::Text && content.contains('@')
}
