// https://github.com/bitcoin/bips/blob/master/bip-0173.mediawiki
// https://github.com/nostr-protocol/nips/blob/master/19.md

use hex::FromHexError;
use thiserror::Error as ThisError;

const CHARSET: &[u8; 32] = b"qpzry9x8gf2tvdw0s3jn54khce6mua7l";
const GENERATOR: [u32; 5] = [
    0x3b6a_57b2,
    0x2650_8e6d,
    0x1ea1_19fa,
    0x3d42_33dd,
    0x2a14_62b3,
];
const CHECKSUM_LEN: usize = 6;

// TLV type for the "special" entry, which holds the raw id.
const TLV_SPECIAL: u8 = 0x00;

#[derive(Clone, Debug, PartialEq, ThisError)]
pub enum EncodingError {
    #[error("Failed to decode hex identifier, cause: {0}")]
    Hex(#[from] FromHexError),
    #[error("Identifier is too long for a TLV entry: {len} bytes")]
    TooLong { len: usize },
}

/// Encodes a hex event id as a TLV-wrapped bech32 token, e.g. `nevent1…`.
///
/// The id is wrapped as `(0x00, len, bytes)` before regrouping into 5-bit
/// words, so the same id always yields the same token.
pub fn encode(prefix: &str, hex_id: &str) -> Result<String, EncodingError> {
    let bytes = hex::decode(hex_id)?;
    let len = u8::try_from(bytes.len()).map_err(|_| EncodingError::TooLong { len: bytes.len() })?;

    let mut tlv = Vec::with_capacity(bytes.len() + 2);
    tlv.push(TLV_SPECIAL);
    tlv.push(len);
    tlv.extend_from_slice(&bytes);

    Ok(encode_words(prefix, &to_words(&tlv)))
}

/// Encodes a hex key without TLV wrapping, e.g. `npub1…`.
pub fn encode_bare(prefix: &str, hex_id: &str) -> Result<String, EncodingError> {
    let bytes = hex::decode(hex_id)?;
    Ok(encode_words(prefix, &to_words(&bytes)))
}

fn encode_words(prefix: &str, words: &[u8]) -> String {
    let checksum = create_checksum(prefix, words);

    let mut string = String::with_capacity(prefix.len() + 1 + words.len() + CHECKSUM_LEN);
    string.push_str(prefix);
    string.push('1');
    for word in words.iter().chain(checksum.iter()) {
        string.push(CHARSET[*word as usize] as char);
    }
    string
}

// 8-bit bytes to 5-bit words, zero padded at the end.
fn to_words(bytes: &[u8]) -> Vec<u8> {
    let mut words = Vec::with_capacity((bytes.len() * 8 + 4) / 5);
    let mut acc: u32 = 0;
    let mut bits: u32 = 0;
    for byte in bytes {
        acc = (acc << 8) | u32::from(*byte);
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            words.push(((acc >> bits) & 31) as u8);
        }
    }
    if bits > 0 {
        words.push(((acc << (5 - bits)) & 31) as u8);
    }
    words
}

fn hrp_expand(prefix: &str) -> Vec<u8> {
    let bytes = prefix.as_bytes();
    let mut expanded = Vec::with_capacity(bytes.len() * 2 + 1);
    expanded.extend(bytes.iter().map(|b| b >> 5));
    expanded.push(0);
    expanded.extend(bytes.iter().map(|b| b & 31));
    expanded
}

fn polymod(values: &[u8]) -> u32 {
    let mut chk: u32 = 1;
    for value in values {
        let top = chk >> 25;
        chk = ((chk & 0x01ff_ffff) << 5) ^ u32::from(*value);
        for (i, generator) in GENERATOR.iter().enumerate() {
            if (top >> i) & 1 == 1 {
                chk ^= generator;
            }
        }
    }
    chk
}

fn create_checksum(prefix: &str, words: &[u8]) -> [u8; CHECKSUM_LEN] {
    let mut values = hrp_expand(prefix);
    values.extend_from_slice(words);
    values.extend_from_slice(&[0; CHECKSUM_LEN]);
    let polymod = polymod(&values) ^ 1;

    let mut checksum = [0u8; CHECKSUM_LEN];
    for (i, word) in checksum.iter_mut().enumerate() {
        *word = ((polymod >> (5 * (5 - i))) & 31) as u8;
    }
    checksum
}

#[cfg(test)]
mod tests {
    use super::*;

    const EVENT_ID: &str = "b9f5441e45ca39179320e0031cfb18e34078673dcc3d3e3a3b3a981760aa5696";

    #[test]
    fn test_empty_data_checksum() {
        assert_eq!(encode_words("a", &[]), "a12uel5l");
    }

    #[test]
    fn test_encode_npub() {
        assert_eq!(
            encode_bare(
                "npub",
                "7e7e9c42a91bfef19fa929e5fda1b72e0ebc1a4c1141673e2794234d86addf4e"
            )
            .unwrap(),
            "npub10elfcs4fr0l0r8af98jlmgdh9c8tcxjvz9qkw038js35mp4dma8qzvjptg"
        );
    }

    #[test]
    fn test_encode_nevent() {
        assert_eq!(
            encode("nevent", EVENT_ID).unwrap(),
            "nevent1qqstna2yrezu5wghjvswqqculvvwxsrcvu7uc0f78gan4xqhvz49d9s5p05vw"
        );
    }

    #[test]
    fn test_encode_is_deterministic() {
        assert_eq!(
            encode("nevent", EVENT_ID).unwrap(),
            encode("nevent", EVENT_ID).unwrap()
        );
    }

    #[test]
    fn test_one_hex_char_changes_checksum() {
        let original = encode("nevent", EVENT_ID).unwrap();
        let changed = encode(
            "nevent",
            "a9f5441e45ca39179320e0031cfb18e34078673dcc3d3e3a3b3a981760aa5696",
        )
        .unwrap();
        assert_eq!(
            changed,
            "nevent1qqs2na2yrezu5wghjvswqqculvvwxsrcvu7uc0f78gan4xqhvz49d9sxcqdj4"
        );
        assert_ne!(
            original[original.len() - CHECKSUM_LEN..],
            changed[changed.len() - CHECKSUM_LEN..]
        );
    }

    #[test]
    fn test_short_id_uses_actual_length() {
        assert_eq!(encode("nevent", "abcd").unwrap(), "nevent1qqp2hngdl3rcg");
    }

    #[test]
    fn test_rejects_malformed_hex() {
        assert_eq!(
            encode("nevent", "abc"),
            Err(EncodingError::Hex(FromHexError::OddLength))
        );
        assert!(matches!(
            encode("nevent", "zz"),
            Err(EncodingError::Hex(FromHexError::InvalidHexCharacter { .. }))
        ));
    }

    #[test]
    fn test_rejects_oversized_id() {
        let long = "00".repeat(256);
        assert_eq!(
            encode("nevent", &long),
            Err(EncodingError::TooLong { len: 256 })
        );
    }
}
