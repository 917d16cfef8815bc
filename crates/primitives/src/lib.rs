//! This crate contains the raw base types for the Viex account-binding protocol.
//!
//! It implements basic primitives such as field elements, the encoding of identity claims,
//! the Poseidon commitments that bind a claim to an account address, the circuit input and
//! the calldata shape expected by the on-chain verifier.
//!
//! Importantly, this crate does not talk to the ledger and does not generate proofs.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![deny(clippy::all, clippy::nursery)]
#![warn(missing_docs)]
#![allow(clippy::option_if_let_else)]

use alloy_primitives::{Address, U160, U256};
use ark_ff::{AdditiveGroup, BigInt, Field, PrimeField, UniformRand};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de::Error as _};
use std::{fmt, ops::Deref, str::FromStr};
use zeroize::Zeroize;

/// Contains the raw circuit input type for the account-binding circuit.
///
/// This type is used to prepare the witness for the Groth16 circuit.
pub mod circuit_inputs;
pub use circuit_inputs::AccountBindingInput;

/// Poseidon commitments over claims and addresses.
pub mod commitment;
pub use commitment::{AccountBinding, commit_account, commit_id, poseidon_hash2, poseidon_hash3};

/// Contains the global configuration for interacting with the verifier contract.
mod config;
pub use config::Config;

/// Canonical encoding of identity claims into field elements.
pub mod encoding;
pub use encoding::{Claim, EncodingError, MAX_ENCODED_BYTES, encode_claim_field};

/// Contains the public signals and the Solidity calldata of an account proof.
pub mod proof;
pub use proof::{AccountProof, PUBLIC_SIGNAL_COUNT, ProofCalldata, PublicSignals};

/// The scalar field of the BN254 curve, over which the circuit and Poseidon operate.
pub type ScalarField = ark_bn254::Fr;

/// Represents an element of the BN254 scalar field.
///
/// Every commitment in the protocol (`idHash`, `accountHash`) and every circuit signal is one of these.
///
/// This wrapper ensures consistent serialization and deserialization of field elements, where
/// string-based serialization is done with hex encoding and binary serialization is done with byte vectors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct FieldElement(ScalarField);

impl FieldElement {
    /// The additive identity of the field. Also the ledger's "unset" sentinel.
    pub const ZERO: Self = Self(ScalarField::ZERO);
    /// The multiplicative identity of the field.
    pub const ONE: Self = Self(ScalarField::ONE);

    /// Returns the 32-byte big-endian representation of this field element.
    #[must_use]
    pub fn to_be_bytes(&self) -> [u8; 32] {
        <U256 as From<Self>>::from(*self).to_be_bytes()
    }

    /// Constructs a field element from a 32-byte big-endian representation.
    ///
    /// Unlike `from_be_bytes_mod_order`, this rejects values >= the field modulus.
    ///
    /// # Errors
    /// Returns [`PrimitiveError::NotInField`] if the value is >= the field modulus.
    pub fn from_be_bytes(be_bytes: &[u8; 32]) -> Result<Self, PrimitiveError> {
        U256::from_be_bytes(*be_bytes).try_into()
    }

    /// Deserializes a field element from a big-endian byte slice.
    ///
    /// # Warning
    /// This function performs modulo reduction on the input. Callers must bound the input length
    /// themselves if a reduction would be a silent error (see [`encode_claim_field`]).
    #[must_use]
    pub(crate) fn from_be_bytes_mod_order(bytes: &[u8]) -> Self {
        Self(ScalarField::from_be_bytes_mod_order(bytes))
    }

    /// Returns `true` if this is the zero element, i.e. the ledger's "unset" value.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0 == ScalarField::ZERO
    }

    /// Interprets the element as an account address.
    ///
    /// # Errors
    /// Returns [`PrimitiveError::OutOfBounds`] if the element does not fit in 160 bits.
    pub fn to_address(&self) -> Result<Address, PrimitiveError> {
        let value: U256 = (*self).into();
        let narrowed = U160::checked_from_limbs_slice(value.as_limbs()).ok_or(PrimitiveError::OutOfBounds)?;
        Ok(Address::from(narrowed.to_be_bytes::<20>()))
    }

    /// Generates a random field element.
    #[must_use]
    pub fn random<R: rand::CryptoRng + rand::RngCore>(rng: &mut R) -> Self {
        Self(ScalarField::rand(rng))
    }
}

impl Deref for FieldElement {
    type Target = ScalarField;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Zeroize for FieldElement {
    fn zeroize(&mut self) {
        self.0.zeroize();
    }
}

impl FromStr for FieldElement {
    type Err = PrimitiveError;

    /// Parses a field element from a hex string (with optional "0x" prefix).
    ///
    /// The value must be lower than the modulus and proper padding is enforced (strictly 32 bytes), so that
    /// two strings that parse to the same commitment are always identical.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim_start_matches("0x");
        let bytes = hex::decode(s)
            .map_err(|e| PrimitiveError::Deserialization(format!("Invalid hex encoding: {e}")))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| PrimitiveError::Deserialization("expected 32 bytes".to_string()))?;
        Self::from_be_bytes(&bytes)
    }
}

impl fmt::Display for FieldElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.to_be_bytes()))
    }
}

impl From<ScalarField> for FieldElement {
    fn from(value: ScalarField) -> Self {
        Self(value)
    }
}

impl From<FieldElement> for ScalarField {
    fn from(value: FieldElement) -> Self {
        value.0
    }
}

impl TryFrom<U256> for FieldElement {
    type Error = PrimitiveError;
    fn try_from(value: U256) -> Result<Self, Self::Error> {
        ScalarField::from_bigint(BigInt(value.into_limbs()))
            .map(Self)
            .ok_or(PrimitiveError::NotInField)
    }
}

// safe because U160 is guaranteed to be less than the field modulus.
impl From<U160> for FieldElement {
    fn from(value: U160) -> Self {
        let u256 = U256::from(value);
        Self(ScalarField::new(BigInt(u256.into_limbs())))
    }
}

impl From<Address> for FieldElement {
    fn from(value: Address) -> Self {
        Self::from(U160::from_be_bytes(value.into_array()))
    }
}

impl From<FieldElement> for U256 {
    fn from(value: FieldElement) -> Self {
        Self::from_limbs(value.0.into_bigint().0)
    }
}

impl From<u64> for FieldElement {
    fn from(value: u64) -> Self {
        Self(ScalarField::from(value))
    }
}

impl Serialize for FieldElement {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_string())
        } else {
            serializer.serialize_bytes(&self.to_be_bytes())
        }
    }
}

impl<'de> Deserialize<'de> for FieldElement {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            Self::from_str(&s).map_err(D::Error::custom)
        } else {
            let bytes = Vec::<u8>::deserialize(deserializer)?;
            let bytes: [u8; 32] = bytes
                .try_into()
                .map_err(|_| D::Error::custom("expected 32 bytes"))?;
            Self::from_be_bytes(&bytes).map_err(D::Error::custom)
        }
    }
}

/// Generic errors that may occur with basic serialization and deserialization.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum PrimitiveError {
    /// Error that occurs when serializing a value. Generally not expected.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Error that occurs when deserializing a value. This can happen often when not providing valid inputs.
    #[error("Deserialization error: {0}")]
    Deserialization(String),
    /// Number is equal or larger than the target field modulus.
    #[error("Provided value is not in the field")]
    NotInField,
    /// Value does not fit the target type.
    #[error("Provided value is out of bounds")]
    OutOfBounds,
    /// Invalid input provided (e.g., incorrect length, format, etc.)
    #[error("Invalid input at {attribute}: {reason}")]
    InvalidInput {
        /// The attribute that is invalid
        attribute: String,
        /// The reason the input is invalid
        reason: String,
    },
}
