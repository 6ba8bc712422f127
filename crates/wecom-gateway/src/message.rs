//! Callback request and message types.

use quick_xml::{events::Event, Reader};
use serde::{Deserialize, Deserializer};

/// Root element of every WeCom callback document.
const ROOT_ELEMENT: &[u8] = b"xml";

/// Query parameters of a callback request.
///
/// Missing parameters deserialize to empty strings; they then fail the
/// signature check instead of being rejected as malformed.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackQuery {
    #[serde(default)]
    pub msg_signature: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub nonce: String,
    /// Only present on URL verification (GET).
    #[serde(default)]
    pub echostr: Option<String>,
}

/// Encrypted POST body: `<xml><ToUserName/><AgentID/><Encrypt/></xml>`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EncryptedEnvelope {
    #[serde(rename = "ToUserName", default)]
    pub to_user_name: String,
    #[serde(rename = "AgentID", default)]
    pub agent_id: String,
    #[serde(rename = "Encrypt", default)]
    pub encrypt: String,
}

/// Decrypted WeCom message.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Message {
    #[serde(rename = "ToUserName", default)]
    pub to_user_name: String,
    #[serde(rename = "FromUserName", default)]
    pub from_user_name: String,
    #[serde(rename = "CreateTime", default, deserialize_with = "lenient_i64")]
    pub create_time: i64,
    #[serde(rename = "MsgType", default)]
    pub msg_type: String,
    #[serde(rename = "Content", default)]
    pub content: String,
    #[serde(rename = "MsgId", default)]
    pub msg_id: String,
    #[serde(rename = "AgentID", default, deserialize_with = "lenient_i64")]
    pub agent_id: i64,
}

impl Message {
    pub fn message_type(&self) -> MessageType {
        MessageType::from(self.msg_type.as_str())
    }
}

/// `MsgType` tag of a decrypted message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageType {
    Text,
    Image,
    Event,
    Other(String),
}

impl From<&str> for MessageType {
    fn from(s: &str) -> Self {
        match s {
            "text" => MessageType::Text,
            "image" => MessageType::Image,
            "event" => MessageType::Event,
            other => MessageType::Other(other.to_string()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum XmlError {
    #[error("body is not valid UTF-8")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("xml: {0}")]
    Xml(#[from] quick_xml::DeError),
    #[error("xml syntax: {0}")]
    Syntax(#[from] quick_xml::Error),
    #[error("root element must be <xml>, found <{0}>")]
    Root(String),
    #[error("document has no root element")]
    MissingRoot,
}

pub fn parse_envelope(body: &[u8]) -> Result<EncryptedEnvelope, XmlError> {
    let text = std::str::from_utf8(body)?;
    check_root(text)?;
    Ok(quick_xml::de::from_str(text)?)
}

pub fn parse_message(plaintext: &[u8]) -> Result<Message, XmlError> {
    let text = std::str::from_utf8(plaintext)?;
    check_root(text)?;
    Ok(quick_xml::de::from_str(text)?)
}

// The serde deserializer ignores the root name, so it is checked up front.
fn check_root(text: &str) -> Result<(), XmlError> {
    let mut reader = Reader::from_str(text);
    reader.trim_text(true);
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) => {
                let name = e.name();
                return if name.as_ref() == ROOT_ELEMENT {
                    Ok(())
                } else {
                    Err(XmlError::Root(String::from_utf8_lossy(name.as_ref()).into_owned()))
                };
            }
            Event::Eof => return Err(XmlError::MissingRoot),
            // Declaration, comments, doctype and processing instructions.
            Event::Decl(_) | Event::Comment(_) | Event::DocType(_) | Event::PI(_) => {}
            // Stray content before the root is left to the deserializer to reject.
            _ => return Ok(()),
        }
    }
}

// Empty numeric elements read as zero.
fn lenient_i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(0);
    }
    trimmed.parse().map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_envelope() {
        let body = b"<xml><ToUserName><![CDATA[wwcorpid0001]]></ToUserName><AgentID><![CDATA[1000002]]></AgentID><Encrypt><![CDATA[abc+/=]]></Encrypt></xml>";
        let env = parse_envelope(body).unwrap();
        assert_eq!(env.to_user_name, "wwcorpid0001");
        assert_eq!(env.agent_id, "1000002");
        assert_eq!(env.encrypt, "abc+/=");
    }

    #[test]
    fn test_parse_envelope_rejects_foreign_root() {
        let err = parse_envelope(b"<foo><Encrypt>abc</Encrypt></foo>").unwrap_err();
        assert!(matches!(err, XmlError::Root(ref name) if name == "foo"));
    }

    #[test]
    fn test_parse_message_rejects_foreign_root() {
        let xml = b"<msg><MsgType>text</MsgType><Content>@bot</Content></msg>";
        assert!(matches!(parse_message(xml), Err(XmlError::Root(_))));
    }

    #[test]
    fn test_parse_accepts_declaration_before_root() {
        let body = b"<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<xml><Encrypt>abc</Encrypt></xml>";
        assert_eq!(parse_envelope(body).unwrap().encrypt, "abc");
    }

    #[test]
    fn test_parse_empty_document() {
        assert!(matches!(parse_envelope(b"   "), Err(XmlError::MissingRoot)));
    }

    #[test]
    fn test_parse_envelope_rejects_garbage() {
        assert!(parse_envelope(b"this is not xml").is_err());
    }

    #[test]
    fn test_parse_envelope_rejects_invalid_utf8() {
        assert!(matches!(parse_envelope(&[0xff, 0xfe, 0x3c]), Err(XmlError::Utf8(_))));
    }

    #[test]
    fn test_parse_text_message() {
        let xml = b"<xml><ToUserName><![CDATA[wwcorpid0001]]></ToUserName><FromUserName><![CDATA[zhangsan]]></FromUserName><CreateTime>1348831860</CreateTime><MsgType><![CDATA[text]]></MsgType><Content><![CDATA[@bot hello]]></Content><MsgId>1234567890123456</MsgId><AgentID>1</AgentID></xml>";
        let msg = parse_message(xml).unwrap();
        assert_eq!(msg.from_user_name, "zhangsan");
        assert_eq!(msg.create_time, 1348831860);
        assert_eq!(msg.message_type(), MessageType::Text);
        assert_eq!(msg.content, "@bot hello");
        assert_eq!(msg.msg_id, "1234567890123456");
        assert_eq!(msg.agent_id, 1);
    }

    #[test]
    fn test_parse_event_without_content() {
        let xml = b"<xml><FromUserName>lisi</FromUserName><MsgType>event</MsgType></xml>";
        let msg = parse_message(xml).unwrap();
        assert_eq!(msg.message_type(), MessageType::Event);
        assert_eq!(msg.content, "");
        assert_eq!(msg.agent_id, 0);
        assert_eq!(msg.create_time, 0);
    }

    #[test]
    fn test_unknown_message_type_preserved() {
        assert_eq!(MessageType::from("voice"), MessageType::Other("voice".into()));
    }
}
