//! Base32 codec for authenticator secrets.
//!
//! Implements the RFC 4648 alphabet (`A-Z2-7`). Encoding is unpadded because
//! the output is shown to users for manual entry into authenticator apps;
//! decoding is case-insensitive and tolerates trailing `=` padding.

use crate::error::{Result, SeawallError};

const ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

/// Encode bytes as unpadded upper-case Base32.
pub fn encode(input: &[u8]) -> String {
    let mut out = String::with_capacity(input.len().div_ceil(5) * 8);
    let mut buffer: u32 = 0;
    let mut bits: u32 = 0;

    for &byte in input {
        buffer = (buffer << 8) | u32::from(byte);
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            let index = ((buffer >> bits) & 0x1F) as usize;
            out.push(ALPHABET[index] as char);
        }
    }

    if bits > 0 {
        let index = ((buffer << (5 - bits)) & 0x1F) as usize;
        out.push(ALPHABET[index] as char);
    }

    out
}

/// Decode a Base32 string back to bytes.
///
/// Case-insensitive. Trailing `=` padding is accepted and ignored. Any other
/// character outside the alphabet fails with [`SeawallError::InvalidFormat`].
pub fn decode(input: &str) -> Result<Vec<u8>> {
    let trimmed = input.trim_end_matches('=');
    let mut out = Vec::with_capacity(trimmed.len() * 5 / 8);
    let mut buffer: u32 = 0;
    let mut bits: u32 = 0;

    for ch in trimmed.chars() {
        let value = match ch.to_ascii_uppercase() {
            c @ 'A'..='Z' => c as u32 - 'A' as u32,
            c @ '2'..='7' => c as u32 - '2' as u32 + 26,
            other => {
                return Err(SeawallError::InvalidFormat(format!(
                    "invalid base32 character: {other:?}"
                )))
            }
        };
        buffer = (buffer << 5) | value;
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            out.push(((buffer >> bits) & 0xFF) as u8);
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_known_vectors() {
        // RFC 4648 test vectors, minus padding.
        assert_eq!(encode(b""), "");
        assert_eq!(encode(b"f"), "MY");
        assert_eq!(encode(b"fo"), "MZXQ");
        assert_eq!(encode(b"foo"), "MZXW6");
        assert_eq!(encode(b"foob"), "MZXW6YQ");
        assert_eq!(encode(b"fooba"), "MZXW6YTB");
        assert_eq!(encode(b"foobar"), "MZXW6YTBOI");
    }

    #[test]
    fn decode_is_case_insensitive() {
        assert_eq!(decode("mzxw6ytboi").unwrap(), b"foobar");
        assert_eq!(decode("MZXW6YTBOI").unwrap(), b"foobar");
    }

    #[test]
    fn decode_accepts_padding() {
        assert_eq!(decode("MZXW6===").unwrap(), b"foo");
    }

    #[test]
    fn decode_rejects_invalid_characters() {
        assert!(matches!(
            decode("MZXW1"),
            Err(crate::error::SeawallError::InvalidFormat(_))
        ));
        assert!(decode("MZ XW").is_err());
    }

    #[test]
    fn round_trips_all_lengths() {
        for len in 0..64usize {
            let bytes: Vec<u8> = (0..len).map(|i| (i * 37 + 11) as u8).collect();
            let encoded = encode(&bytes);
            assert_eq!(decode(&encoded).unwrap(), bytes, "length {len}");
        }
    }

    #[test]
    fn round_trips_random_bytes() {
        use rand::RngCore;
        let mut rng = rand::rngs::OsRng;
        for _ in 0..32 {
            let mut bytes = vec![0u8; 20];
            rng.fill_bytes(&mut bytes);
            assert_eq!(decode(&encode(&bytes)).unwrap(), bytes);
        }
    }
}
