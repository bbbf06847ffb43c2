//! Transaction codec and signer
//!
//! Wire layout of a (Solana) transaction:
//!
//! ```text
//! [slot count: compact-u16][count × 64-byte signature][message ...]
//! ```
//!
//! An unsigned transaction carries all-zero signature slots. Signing covers
//! the message bytes verbatim (ed25519 hashes internally) and only ever
//! rewrites one 64-byte slot; the count prefix and message are untouched.

use crate::base58;
use crate::keys::{signing_key_from_secret, KeyError, PUBLIC_KEY_LEN};
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use thiserror::Error;

/// Length of one ed25519 signature slot
pub const SIGNATURE_LEN: usize = 64;

/// Bit marking a versioned message prefix
const VERSION_PREFIX_MASK: u8 = 0x80;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignError {
    #[error(transparent)]
    Key(#[from] KeyError),
    #[error("Malformed transaction: {0}")]
    MalformedTransaction(String),
    #[error("Key {0} is not a required signer of this transaction")]
    SignerNotRequired(String),
}

fn malformed(reason: impl Into<String>) -> SignError {
    SignError::MalformedTransaction(reason.into())
}

/// Decode a compact-u16 ("shortvec") length prefix.
///
/// Returns `(value, bytes consumed)`. Values below 128 occupy one byte.
pub fn decode_compact_u16(bytes: &[u8]) -> Result<(u16, usize), SignError> {
    let mut value: u32 = 0;
    for (i, &byte) in bytes.iter().take(3).enumerate() {
        value |= ((byte & 0x7F) as u32) << (7 * i);
        if byte & 0x80 == 0 {
            // Reject non-canonical trailing zero continuation bytes
            if i > 0 && byte == 0 {
                return Err(malformed("non-canonical length prefix"));
            }
            return u16::try_from(value)
                .map(|v| (v, i + 1))
                .map_err(|_| malformed("length prefix overflows u16"));
        }
    }
    Err(malformed("truncated length prefix"))
}

/// Encode a compact-u16 length prefix
pub fn encode_compact_u16(mut value: u16) -> Vec<u8> {
    let mut out = Vec::with_capacity(3);
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if value == 0 {
            return out;
        }
    }
}

/// A parsed transaction buffer: signature slots followed by the message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    bytes: Vec<u8>,
    slot_count: usize,
    /// Offset of the first signature slot (size of the count prefix)
    slots_offset: usize,
}

impl Transaction {
    /// Parse a transaction, validating that all declared slots are present.
    ///
    /// # Errors
    /// [`SignError::MalformedTransaction`] for a zero slot count or a
    /// buffer too short for the declared slots.
    pub fn parse(bytes: Vec<u8>) -> Result<Self, SignError> {
        let (count, slots_offset) = decode_compact_u16(&bytes)?;
        let slot_count = count as usize;
        if slot_count == 0 {
            return Err(malformed("no signature slots"));
        }

        let message_offset = slots_offset + slot_count * SIGNATURE_LEN;
        if bytes.len() < message_offset {
            return Err(malformed(format!(
                "{} signature slots need {} bytes, buffer has {}",
                slot_count,
                message_offset,
                bytes.len()
            )));
        }

        Ok(Self {
            bytes,
            slot_count,
            slots_offset,
        })
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, SignError> {
        Self::parse(bytes.to_vec())
    }

    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    fn message_offset(&self) -> usize {
        self.slots_offset + self.slot_count * SIGNATURE_LEN
    }

    fn slot_range(&self, index: usize) -> Option<std::ops::Range<usize>> {
        if index >= self.slot_count {
            return None;
        }
        let start = self.slots_offset + index * SIGNATURE_LEN;
        Some(start..start + SIGNATURE_LEN)
    }

    /// The signable message (everything after the signature slots)
    pub fn message(&self) -> &[u8] {
        &self.bytes[self.message_offset()..]
    }

    pub fn signature(&self, index: usize) -> Option<&[u8]> {
        self.slot_range(index).map(|r| &self.bytes[r])
    }

    pub fn signatures(&self) -> impl Iterator<Item = &[u8]> {
        self.bytes[self.slots_offset..self.message_offset()].chunks_exact(SIGNATURE_LEN)
    }

    /// Whether a slot still holds the all-zero placeholder
    pub fn is_slot_empty(&self, index: usize) -> bool {
        self.signature(index)
            .map(|sig| sig.iter().all(|&b| b == 0))
            .unwrap_or(false)
    }

    pub fn is_fully_signed(&self) -> bool {
        (0..self.slot_count).all(|i| !self.is_slot_empty(i))
    }

    /// Write a detached signature into a slot
    pub fn set_signature(
        &mut self,
        index: usize,
        signature: &[u8; SIGNATURE_LEN],
    ) -> Result<(), SignError> {
        let range = self.slot_range(index).ok_or_else(|| {
            malformed(format!(
                "slot {} out of range ({} slots)",
                index, self.slot_count
            ))
        })?;
        self.bytes[range].copy_from_slice(signature);
        Ok(())
    }

    /// Sign the message with `key` and write the signature into `index`
    pub fn sign_slot(&mut self, index: usize, key: &SigningKey) -> Result<(), SignError> {
        let signature = key.sign(self.message()).to_bytes();
        self.set_signature(index, &signature)
    }

    /// Verify the signature in `index` against `public_key`
    pub fn verify_slot(&self, index: usize, public_key: &[u8; PUBLIC_KEY_LEN]) -> bool {
        let Some(sig) = self.signature(index) else {
            return false;
        };
        let Ok(sig) = <[u8; SIGNATURE_LEN]>::try_from(sig) else {
            return false;
        };
        let Ok(verifying_key) = VerifyingKey::from_bytes(public_key) else {
            return false;
        };
        verifying_key
            .verify_strict(self.message(), &Signature::from_bytes(&sig))
            .is_ok()
    }

    /// The transaction id: base-58 of the first signature
    pub fn transaction_id(&self) -> String {
        base58::encode(self.signature(0).unwrap_or_default())
    }

    /// Account keys that must sign, in slot order, read from the message header.
    ///
    /// Supports legacy and version-0 messages.
    pub fn required_signers(&self) -> Result<Vec<[u8; PUBLIC_KEY_LEN]>, SignError> {
        let message = self.message();

        let header_offset = match message.first() {
            None => return Err(malformed("empty message")),
            Some(&prefix) if prefix & VERSION_PREFIX_MASK != 0 => {
                let version = prefix & !VERSION_PREFIX_MASK;
                if version != 0 {
                    return Err(malformed(format!("unsupported message version {}", version)));
                }
                1
            }
            Some(_) => 0,
        };

        // header: [num_required_signatures, num_readonly_signed, num_readonly_unsigned]
        let header = message
            .get(header_offset..header_offset + 3)
            .ok_or_else(|| malformed("truncated message header"))?;
        let required = header[0] as usize;

        let keys_len_offset = header_offset + 3;
        let (key_count, prefix_len) = decode_compact_u16(&message[keys_len_offset..])?;
        let keys_offset = keys_len_offset + prefix_len;
        let key_count = key_count as usize;

        if required > key_count {
            return Err(malformed("more required signers than account keys"));
        }
        let keys = message
            .get(keys_offset..keys_offset + key_count * PUBLIC_KEY_LEN)
            .ok_or_else(|| malformed("truncated account keys"))?;

        Ok(keys
            .chunks_exact(PUBLIC_KEY_LEN)
            .take(required)
            .map(|chunk| {
                let mut key = [0u8; PUBLIC_KEY_LEN];
                key.copy_from_slice(chunk);
                key
            })
            .collect())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Sign an unsigned transaction, writing the signature into the first slot.
///
/// This assumes the local key is the fee payer (first required signer).
/// Use [`sign_as_signer`] for transactions with several signers.
pub fn sign(unsigned: &[u8], secret: &[u8]) -> Result<Vec<u8>, SignError> {
    let key = signing_key_from_secret(secret)?;
    let mut tx = Transaction::from_slice(unsigned)?;
    tx.sign_slot(0, &key)?;
    Ok(tx.into_bytes())
}

/// Sign into the slot whose declared signer key matches the secret's public key.
///
/// # Errors
/// [`SignError::SignerNotRequired`] when the key is not among the message's
/// required signers.
pub fn sign_as_signer(unsigned: &[u8], secret: &[u8]) -> Result<Vec<u8>, SignError> {
    let key = signing_key_from_secret(secret)?;
    let public = key.verifying_key().to_bytes();

    let mut tx = Transaction::from_slice(unsigned)?;
    let signers = tx.required_signers()?;
    if signers.len() != tx.slot_count() {
        return Err(malformed(format!(
            "{} signature slots but {} required signers",
            tx.slot_count(),
            signers.len()
        )));
    }

    let index = signers
        .iter()
        .position(|k| *k == public)
        .ok_or_else(|| SignError::SignerNotRequired(base58::encode(&public)))?;

    tx.sign_slot(index, &key)?;
    Ok(tx.into_bytes())
}
