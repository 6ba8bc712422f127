//! PKCS#7 padding over 16-byte AES blocks.

/// AES block size in bytes.
pub const BLOCK_SIZE: usize = 16;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PaddingError {
    #[error("empty data")]
    Empty,
    #[error("invalid padding value: {0}")]
    InvalidValue(u8),
    #[error("padding {pad} exceeds data length {len}")]
    ExceedsLength { pad: usize, len: usize },
    #[error("invalid padding byte at position {0}")]
    InvalidByte(usize),
}

/// Append PKCS#7 padding. Block-aligned input receives a full extra block.
pub fn pad(data: &mut Vec<u8>) {
    let pad = BLOCK_SIZE - data.len() % BLOCK_SIZE;
    data.resize(data.len() + pad, pad as u8);
}

/// Strip PKCS#7 padding, checking every padding byte.
pub fn unpad(data: &[u8]) -> Result<&[u8], PaddingError> {
    let last = *data.last().ok_or(PaddingError::Empty)?;
    let pad = last as usize;
    if pad == 0 || pad > BLOCK_SIZE {
        return Err(PaddingError::InvalidValue(last));
    }
    if pad > data.len() {
        return Err(PaddingError::ExceedsLength {
            pad,
            len: data.len(),
        });
    }

    let start = data.len() - pad;
    if let Some(offset) = data[start..].iter().position(|&b| b != last) {
        return Err(PaddingError::InvalidByte(start + offset));
    }
    Ok(&data[..start])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pad_partial_block() {
        let mut data = vec![0xAA; 13];
        pad(&mut data);
        assert_eq!(data.len(), 16);
        assert_eq!(&data[13..], &[3, 3, 3]);
    }

    #[test]
    fn test_pad_aligned_adds_full_block() {
        let mut data = vec![0xAA; 32];
        pad(&mut data);
        assert_eq!(data.len(), 48);
        assert!(data[32..].iter().all(|&b| b == 16));
    }

    #[test]
    fn test_unpad_strips() {
        let mut data = b"hello".to_vec();
        pad(&mut data);
        assert_eq!(unpad(&data).unwrap(), b"hello");
    }

    #[test]
    fn test_unpad_rejects_zero() {
        let data = [1u8, 2, 3, 0];
        assert_eq!(unpad(&data), Err(PaddingError::InvalidValue(0)));
    }

    #[test]
    fn test_unpad_rejects_oversized_value() {
        let data = [17u8; 32];
        assert_eq!(unpad(&data), Err(PaddingError::InvalidValue(17)));
    }

    #[test]
    fn test_unpad_rejects_value_longer_than_data() {
        let data = [4u8, 4, 4];
        assert_eq!(
            unpad(&data),
            Err(PaddingError::ExceedsLength { pad: 4, len: 3 })
        );
    }

    #[test]
    fn test_unpad_rejects_mismatched_bytes() {
        let mut data = vec![0u8; 12];
        data.extend_from_slice(&[4, 4, 9, 4]);
        assert_eq!(unpad(&data), Err(PaddingError::InvalidByte(14)));
    }

    #[test]
    fn test_unpad_empty() {
        assert_eq!(unpad(&[]), Err(PaddingError::Empty));
    }
}
