#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use crate::ai::backoff_delay;
    use crate::mention::should_forward;
    use crate::message::{parse_envelope, MessageType};

    proptest! {
        #[test]
        fn test_text_forwarded_iff_at_sign(content in ".{0,64}") {
            prop_assert_eq!(should_forward(&MessageType::Text, &content), content.contains('@'));
        }

        #[test]
        fn test_non_text_never_forwarded(tag in "[a-z]{1,12}", content in ".{0,64}") {
            prop_assume!(tag != "text");
            prop_assert!(!should_forward(&MessageType::from(tag.as_str()), &content));
        }

        // Arbitrary bodies are rejected or accepted, never panic.
        #[test]
        fn test_envelope_parse_total(body in prop::collection::vec(any::<u8>(), 0..256)) {
            let _ = parse_envelope(&body);
        }

        #[test]
        fn test_envelope_encrypt_field_preserved(encrypt in "[A-Za-z0-9+/]{1,128}={0,2}") {
            let body = format!(
                "<xml><ToUserName><![CDATA[corp]]></ToUserName><Encrypt><![CDATA[{encrypt}]]></Encrypt></xml>"
            );
            let env = parse_envelope(body.as_bytes()).unwrap();
            prop_assert_eq!(env.encrypt, encrypt);
        }

        #[test]
        fn test_backoff_non_decreasing(attempt in 0u32..64) {
            prop_assert!(backoff_delay(attempt + 1) >= backoff_delay(attempt));
        }
    }
}
