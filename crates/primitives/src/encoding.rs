use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::FieldElement;

/// The largest claim field, in bytes, that can be encoded without reduction.
///
/// The BN254 scalar modulus is a 254-bit prime, so every 31-byte (248-bit) integer is below it while some
/// 32-byte integers are not. Capping at 31 bytes keeps the encoding injective and bit-identical to the
/// value the circuit receives.
pub const MAX_ENCODED_BYTES: usize = 31;

/// Errors raised when a claim field cannot be encoded as a field element.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum EncodingError {
    /// The UTF-8 representation exceeds [`MAX_ENCODED_BYTES`].
    #[error("claim field is {len} bytes long, at most {MAX_ENCODED_BYTES} bytes can be encoded")]
    TooLong {
        /// The byte length of the rejected value.
        len: usize,
    },
    /// The claim field is empty. An empty field would encode to zero, the ledger's "unset" value.
    #[error("claim field is empty")]
    Empty,
}

/// Encodes a single claim field into a field element.
///
/// The UTF-8 bytes of `value` are read as a big-endian unsigned integer.
///
/// # Errors
/// Returns [`EncodingError::Empty`] for an empty string and [`EncodingError::TooLong`] if the string is longer
/// than [`MAX_ENCODED_BYTES`] bytes.
pub fn encode_claim_field(value: &str) -> Result<FieldElement, EncodingError> {
    let bytes = value.as_bytes();
    if bytes.is_empty() {
        return Err(EncodingError::Empty);
    }
    if bytes.len() > MAX_ENCODED_BYTES {
        return Err(EncodingError::TooLong { len: bytes.len() });
    }
    Ok(FieldElement::from_be_bytes_mod_order(bytes))
}

/// An identity claim as issued by an external identity provider (e.g. the `sub` and `aud` of an OIDC token).
///
/// The raw values never leave the process: only commitments over them are written to the ledger.
/// The claim is wiped from memory on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Claim {
    subject: String,
    audience: String,
}

impl Claim {
    /// Creates a new claim from its subject and audience identifiers.
    #[must_use]
    pub fn new(subject: impl Into<String>, audience: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            audience: audience.into(),
        }
    }

    /// The subject identifier (`sub`).
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// The audience identifier (`aud`).
    #[must_use]
    pub fn audience(&self) -> &str {
        &self.audience
    }

    /// Encodes both fields, returning `(subject, audience)` as field elements.
    ///
    /// # Errors
    /// See [`encode_claim_field`].
    pub fn encode(&self) -> Result<(FieldElement, FieldElement), EncodingError> {
        Ok((
            encode_claim_field(&self.subject)?,
            encode_claim_field(&self.audience)?,
        ))
    }
}

impl fmt::Debug for Claim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Claim")
            .field("subject", &"<redacted>")
            .field("audience", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::U256;

    use super::*;

    #[test]
    fn test_encoding_is_big_endian() {
        let encoded = encode_claim_field("ab").unwrap();
        // 0x61 << 8 | 0x62
        assert_eq!(encoded, FieldElement::from(0x6162u64));
    }

    #[test]
    fn test_scenario_values() {
        let encoded = encode_claim_field("user-123").unwrap();
        let expected = U256::from_be_slice(b"user-123");
        assert_eq!(<U256 as From<FieldElement>>::from(encoded), expected);
    }

    #[test]
    fn test_max_length_is_accepted_and_not_reduced() {
        let value = "\u{7f}".repeat(MAX_ENCODED_BYTES);
        let encoded = encode_claim_field(&value).unwrap();
        assert_eq!(<U256 as From<FieldElement>>::from(encoded), U256::from_be_slice(value.as_bytes()));
    }

    #[test]
    fn test_too_long_is_rejected() {
        let value = "a".repeat(MAX_ENCODED_BYTES + 1);
        assert_eq!(
            encode_claim_field(&value),
            Err(EncodingError::TooLong { len: 32 })
        );
    }

    #[test]
    fn test_multibyte_characters_count_bytes() {
        let value = "é".repeat(16);
        assert!(value.chars().count() < MAX_ENCODED_BYTES);
        assert_eq!(
            encode_claim_field(&value),
            Err(EncodingError::TooLong { len: 32 })
        );
    }

    #[test]
    fn test_empty_is_rejected() {
        assert_eq!(
            encode_claim_field(""),
            Err(EncodingError::Empty)
        );
    }

    #[test]
    fn test_claim_debug_is_redacted() {
        let claim = Claim::new("user-123", "app.example");
        let debug = format!("{claim:?}");
        assert!(!debug.contains("user-123"));
        assert!(!debug.contains("app.example"));
    }

    #[test]
    fn test_claim_encode_rejects_empty_audience() {
        let claim = Claim::new("user-123", "");
        assert_eq!(claim.encode(), Err(EncodingError::Empty));
    }
}
