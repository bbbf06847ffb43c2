//! Base-58 codec
//!
//! Converts between raw bytes (keys, signatures, transactions) and the
//! human-copyable base-58 form used by Solana wallets.
//!
//! The conversion is a plain arbitrary-precision change of base: the input is
//! treated as one big-endian number and repeatedly multiplied into a
//! little-endian digit buffer, so there is no upper bound on input length.
//! Each leading zero byte maps to exactly one leading `'1'` and vice versa.

use thiserror::Error;

/// The Bitcoin/Solana alphabet (no `0`, `O`, `I`, `l`)
pub const ALPHABET: &[u8; 58] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

const INVALID: u8 = 0xFF;

/// ASCII → digit value, `INVALID` for characters outside the alphabet
const DECODE_MAP: [u8; 128] = build_decode_map();

const fn build_decode_map() -> [u8; 128] {
    let mut map = [INVALID; 128];
    let mut i = 0;
    while i < ALPHABET.len() {
        map[ALPHABET[i] as usize] = i as u8;
        i += 1;
    }
    map
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Base58Error {
    #[error("Invalid base58 character {character:?} at position {index}")]
    InvalidCharacter { character: char, index: usize },
    #[error("Invalid decoded length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

/// Encode bytes as a base-58 string
pub fn encode(input: &[u8]) -> String {
    let zeros = input.iter().take_while(|&&b| b == 0).count();

    // log(256) / log(58) ≈ 1.366
    let mut digits: Vec<u8> = Vec::with_capacity((input.len() - zeros) * 138 / 100 + 1);

    for &byte in &input[zeros..] {
        let mut carry = byte as u32;
        for digit in digits.iter_mut() {
            carry += (*digit as u32) << 8;
            *digit = (carry % 58) as u8;
            carry /= 58;
        }
        while carry > 0 {
            digits.push((carry % 58) as u8);
            carry /= 58;
        }
    }

    let mut out = String::with_capacity(zeros + digits.len());
    out.extend(std::iter::repeat('1').take(zeros));
    out.extend(digits.iter().rev().map(|&d| ALPHABET[d as usize] as char));
    out
}

/// Decode a base-58 string into bytes
///
/// # Errors
/// [`Base58Error::InvalidCharacter`] if any character is outside the alphabet.
pub fn decode(input: &str) -> Result<Vec<u8>, Base58Error> {
    let mut zeros = 0usize;
    let mut leading = true;
    // little-endian base-256
    let mut bytes: Vec<u8> = Vec::with_capacity(input.len() * 733 / 1000 + 1);

    for (index, character) in input.chars().enumerate() {
        let value = digit_value(character).ok_or(Base58Error::InvalidCharacter { character, index })?;

        if leading && value == 0 {
            zeros += 1;
            continue;
        }
        leading = false;

        let mut carry = value as u32;
        for byte in bytes.iter_mut() {
            carry += (*byte as u32) * 58;
            *byte = (carry & 0xFF) as u8;
            carry >>= 8;
        }
        while carry > 0 {
            bytes.push((carry & 0xFF) as u8);
            carry >>= 8;
        }
    }

    bytes.extend(std::iter::repeat(0).take(zeros));
    bytes.reverse();
    Ok(bytes)
}

/// Decode a base-58 string that must yield exactly `N` bytes
/// (public keys, signatures, keypairs).
pub fn decode_exact<const N: usize>(input: &str) -> Result<[u8; N], Base58Error> {
    let bytes = decode(input)?;
    let actual = bytes.len();
    bytes.try_into().map_err(|_| Base58Error::InvalidLength {
        expected: N,
        actual,
    })
}

fn digit_value(character: char) -> Option<u8> {
    let code = character as u32;
    if code >= 128 {
        return None;
    }
    match DECODE_MAP[code as usize] {
        INVALID => None,
        value => Some(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input() {
        assert_eq!(encode(&[]), "");
        assert_eq!(decode("").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_known_vectors() {
        // Vectors from the Bitcoin Core base58 test suite
        let cases: &[(&str, &str)] = &[
            ("61", "2g"),
            ("626262", "a3gV"),
            ("636363", "aPEr"),
            ("73696d706c792061206c6f6e6720737472696e67", "2cFupjhnEsSn59qHXstmK2ffpLv2"),
            ("00eb15231dfceb60925886b67d065299925915aeb172c06647", "1NS17iag9jJgTHD1VXjvLCEnZuQ3rJDE9L"),
            ("516b6fcd0f", "ABnLTmg"),
            ("bf4f89001e670274dd", "3SEo3LWLoPntC"),
            ("572e4794", "3EFU7m"),
            ("ecac89cad93923c02321", "EJDM8drfXA6uyA"),
            ("10c8511e", "Rt5zm"),
            ("00000000000000000000", "1111111111"),
        ];

        for (hex_input, expected) in cases {
            let bytes = hex::decode(hex_input).unwrap();
            assert_eq!(&encode(&bytes), expected, "encode {}", hex_input);
            assert_eq!(decode(expected).unwrap(), bytes, "decode {}", expected);
        }
    }

    #[test]
    fn test_leading_zeros_preserved() {
        for zeros in [0usize, 1, 2, 17] {
            let mut input = vec![0u8; zeros];
            input.extend_from_slice(&[0x01, 0xFF, 0x00, 0x7A]);

            let encoded = encode(&input);
            assert_eq!(
                encoded.chars().take_while(|&c| c == '1').count(),
                zeros,
                "one leading '1' per leading zero byte"
            );
            assert_eq!(decode(&encoded).unwrap(), input);
        }
    }

    #[test]
    fn test_all_zero_input() {
        let input = [0u8; 5];
        assert_eq!(encode(&input), "11111");
        assert_eq!(decode("11111").unwrap(), input.to_vec());
    }

    #[test]
    fn test_matches_reference_implementation() {
        // Lengths well beyond any native integer width: keys, keypairs, transactions
        let mut state: u32 = 0x1234_5678;
        for len in [1usize, 31, 32, 64, 65, 200, 1232] {
            let input: Vec<u8> = (0..len)
                .map(|_| {
                    state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
                    (state >> 16) as u8
                })
                .collect();

            let ours = encode(&input);
            assert_eq!(ours, bs58::encode(&input).into_string());
            assert_eq!(decode(&ours).unwrap(), input);
        }
    }

    #[test]
    fn test_invalid_characters_rejected() {
        for (input, bad, index) in [("0abc", '0', 0), ("abOc", 'O', 2), ("abcI", 'I', 3), ("1l", 'l', 1)] {
            assert_eq!(
                decode(input),
                Err(Base58Error::InvalidCharacter {
                    character: bad,
                    index
                })
            );
        }
        assert!(matches!(
            decode("abc✓"),
            Err(Base58Error::InvalidCharacter { character: '✓', .. })
        ));
        assert!(decode("ab c").is_err());
    }

    #[test]
    fn test_decode_exact() {
        let key = [7u8; 32];
        let encoded = encode(&key);
        assert_eq!(decode_exact::<32>(&encoded).unwrap(), key);
        assert_eq!(
            decode_exact::<64>(&encoded),
            Err(Base58Error::InvalidLength {
                expected: 64,
                actual: 32
            })
        );
    }
}
