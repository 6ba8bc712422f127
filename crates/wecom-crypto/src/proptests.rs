#[cfg(test)]
mod tests {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use proptest::prelude::*;

    use crate::cipher::{CipherError, MessageCipher};
    use crate::keys::KeyMaterial;
    use crate::padding::{self, PaddingError, BLOCK_SIZE};
    use crate::signature::SignatureVerifier;

    fn cipher_for(key: [u8; 32], corp_id: &str) -> MessageCipher {
        MessageCipher::new(KeyMaterial::new(key, "token", corp_id).unwrap())
    }

    fn corp_id() -> impl Strategy<Value = String> {
        "[a-z0-9]{1,24}"
    }

    proptest! {
        // decrypt(encrypt(m)) == m for any key, corp id and message.
        #[test]
        fn test_round_trip(
            key in any::<[u8; 32]>(),
            corp in corp_id(),
            msg in prop::collection::vec(any::<u8>(), 0..2048),
        ) {
            let c = cipher_for(key, &corp);
            let ct = c.encrypt(&msg).unwrap();
            prop_assert_eq!(c.decrypt(&ct).unwrap(), msg);
        }

        // Ciphertext is always block aligned and carries the full layout.
        #[test]
        fn test_ciphertext_length(
            corp in corp_id(),
            msg in prop::collection::vec(any::<u8>(), 0..512),
        ) {
            let c = cipher_for([9u8; 32], &corp);
            let raw = STANDARD.decode(c.encrypt(&msg).unwrap()).unwrap();
            let body = 20 + msg.len() + corp.len();
            prop_assert_eq!(raw.len() % BLOCK_SIZE, 0);
            prop_assert!(raw.len() > body);
            prop_assert!(raw.len() <= body + BLOCK_SIZE);
        }

        // A payload for another corp never decrypts, even with valid padding and length.
        #[test]
        fn test_tenant_enforcement(
            key in any::<[u8; 32]>(),
            sender_corp in corp_id(),
            receiver_corp in corp_id(),
            msg in prop::collection::vec(any::<u8>(), 0..256),
        ) {
            prop_assume!(sender_corp != receiver_corp);
            let sender = cipher_for(key, &sender_corp);
            let receiver = cipher_for(key, &receiver_corp);
            let ct = sender.encrypt(&msg).unwrap();
            prop_assert_eq!(receiver.decrypt(&ct), Err(CipherError::TenantMismatch));
        }

        // Any single-bit flip in the final ciphertext block garbles the corp id
        // and padding, so decryption is rejected.
        #[test]
        fn test_tamper_final_block(
            key in any::<[u8; 32]>(),
            msg in prop::collection::vec(any::<u8>(), 0..256),
            bit in 0usize..(BLOCK_SIZE * 8),
        ) {
            let c = cipher_for(key, "wwcorpid0001");
            let mut raw = STANDARD.decode(c.encrypt(&msg).unwrap()).unwrap();
            let idx = raw.len() - BLOCK_SIZE + bit / 8;
            raw[idx] ^= 1 << (bit % 8);

            let result = c.decrypt(&STANDARD.encode(&raw));
            prop_assert!(
                matches!(
                    result,
                    Err(CipherError::Padding(_))
                        | Err(CipherError::TooShort(_))
                        | Err(CipherError::LengthMismatch { .. })
                        | Err(CipherError::TenantMismatch)
                ),
                "tampered ciphertext accepted: {:?}",
                result
            );
        }

        // Last byte zero or above the block size is never valid padding.
        #[test]
        fn test_unpad_rejects_out_of_range(
            mut data in prop::collection::vec(any::<u8>(), 1..64),
            last in prop_oneof![Just(0u8), 17u8..=255u8],
        ) {
            *data.last_mut().unwrap() = last;
            prop_assert_eq!(padding::unpad(&data), Err(PaddingError::InvalidValue(last)));
        }

        // A padding run with one wrong byte is rejected.
        #[test]
        fn test_unpad_rejects_corrupted_run(
            prefix in prop::collection::vec(any::<u8>(), 0..32),
            pad in 2u8..=16u8,
            wrong_at in 0usize..15,
            wrong_value in any::<u8>(),
        ) {
            let wrong_at = wrong_at % (pad as usize - 1);
            prop_assume!(wrong_value != pad);

            let mut data = prefix.clone();
            data.extend(std::iter::repeat(pad).take(pad as usize));
            let start = data.len() - pad as usize;
            data[start + wrong_at] = wrong_value;

            prop_assert_eq!(padding::unpad(&data), Err(PaddingError::InvalidByte(start + wrong_at)));
        }

        // Signing is deterministic, verification accepts exactly what was signed,
        // and changing any single input breaks it.
        #[test]
        fn test_signature_determinism(
            token in "[A-Za-z0-9]{1,32}",
            timestamp in "[0-9]{1,12}",
            nonce in "[0-9a-z]{1,16}",
            encrypt in "[A-Za-z0-9+/=]{0,64}",
            which in 0usize..4,
        ) {
            let v = SignatureVerifier::new(token.clone());
            let sig = v.sign(&timestamp, &nonce, &encrypt);
            prop_assert_eq!(&sig, &v.sign(&timestamp, &nonce, &encrypt));
            prop_assert!(v.verify(&sig, &timestamp, &nonce, &encrypt));

            let mut inputs = [token, timestamp, nonce, encrypt];
            inputs[which].push('x');
            let [token2, timestamp2, nonce2, encrypt2] = inputs;
            let v2 = SignatureVerifier::new(token2);
            prop_assert!(!v2.verify(&sig, &timestamp2, &nonce2, &encrypt2));
        }
    }
}
