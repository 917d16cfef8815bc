use alloy_primitives::Address;
use light_poseidon::{Poseidon, PoseidonHasher};
use serde::{Deserialize, Serialize};

use crate::{Claim, EncodingError, FieldElement, ScalarField};

/// Circom-compatible Poseidon over two field elements (`circomlib` `Poseidon(2)`).
#[must_use]
pub fn poseidon_hash2(a: FieldElement, b: FieldElement) -> FieldElement {
    poseidon_hash(&[*a, *b])
}

/// Circom-compatible Poseidon over three field elements (`circomlib` `Poseidon(3)`).
#[must_use]
pub fn poseidon_hash3(a: FieldElement, b: FieldElement, c: FieldElement) -> FieldElement {
    poseidon_hash(&[*a, *b, *c])
}

fn poseidon_hash(inputs: &[ScalarField]) -> FieldElement {
    let mut hasher = Poseidon::<ScalarField>::new_circom(inputs.len())
        .expect("circom parameters exist for arity 2 and 3");
    hasher
        .hash(inputs)
        .expect("input count matches the hasher's arity")
        .into()
}

/// Computes the identity commitment `idHash = Poseidon(enc(subject), enc(audience))`.
///
/// This is the key under which the registry stores the bound account address.
///
/// # Errors
/// Returns an [`EncodingError`] if either claim field cannot be encoded.
pub fn commit_id(claim: &Claim) -> Result<FieldElement, EncodingError> {
    let (subject, audience) = claim.encode()?;
    Ok(poseidon_hash2(subject, audience))
}

/// Computes the account commitment `accountHash = Poseidon(enc(subject), enc(audience), address)`.
///
/// # Errors
/// Returns an [`EncodingError`] if either claim field cannot be encoded.
pub fn commit_account(claim: &Claim, address: Address) -> Result<FieldElement, EncodingError> {
    let (subject, audience) = claim.encode()?;
    Ok(poseidon_hash3(subject, audience, address.into()))
}

/// The binding of an account address to its `accountHash`, as stored by the registry keyed by address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountBinding {
    /// The bound account address.
    pub address: Address,
    /// `Poseidon(enc(subject), enc(audience), address)`.
    pub account_hash: FieldElement,
}

impl AccountBinding {
    /// Derives the binding of `claim` to `address`.
    ///
    /// # Errors
    /// Returns an [`EncodingError`] if either claim field cannot be encoded.
    pub fn derive(claim: &Claim, address: Address) -> Result<Self, EncodingError> {
        Ok(Self {
            address,
            account_hash: commit_account(claim, address)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use alloy_primitives::address;

    use super::*;

    #[test]
    fn test_poseidon_matches_circomlib() {
        // circomlibjs `poseidon([1, 2])`
        let expected = FieldElement::from_str(
            "0x115cc0f5e7d690413df64c6b9662e9cf2a3617f2743245519e19607a4417189a",
        )
        .unwrap();
        assert_eq!(
            poseidon_hash2(FieldElement::from(1u64), FieldElement::from(2u64)),
            expected
        );
    }

    #[test]
    fn test_poseidon3_matches_circomlib() {
        // circomlibjs `poseidon([1, 2, 3])`
        let expected = FieldElement::from_str(
            "0x0e7732d89e6939c0ff03d5e58dab6302f3230e269dc5b968f725df34ab36d732",
        )
        .unwrap();
        assert_eq!(
            poseidon_hash3(
                FieldElement::from(1u64),
                FieldElement::from(2u64),
                FieldElement::from(3u64)
            ),
            expected
        );
    }

    #[test]
    fn test_commit_account_is_deterministic() {
        let claim = Claim::new("user-123", "app.example");
        let address = address!("0xabcdabcdabcdabcdabcdabcdabcdabcdabcdabcd");

        let first = commit_account(&claim, address).unwrap();
        let second = commit_account(&claim.clone(), address).unwrap();
        assert_eq!(first, second);
        assert!(!first.is_zero());
    }

    #[test]
    fn test_commit_account_differs_per_address() {
        let claim = Claim::new("user-123", "app.example");
        let one = commit_account(&claim, address!("0x1111111111111111111111111111111111111111")).unwrap();
        let two = commit_account(&claim, address!("0x2222222222222222222222222222222222222222")).unwrap();
        assert_ne!(one, two);
    }

    #[test]
    fn test_commit_id_ignores_address_and_separates_fields() {
        let id = commit_id(&Claim::new("user-123", "app.example")).unwrap();
        let swapped = commit_id(&Claim::new("app.example", "user-123")).unwrap();
        let other_audience = commit_id(&Claim::new("user-123", "app.other")).unwrap();

        assert_ne!(id, swapped);
        assert_ne!(id, other_audience);

        let account = commit_account(&Claim::new("user-123", "app.example"), Address::ZERO).unwrap();
        assert_ne!(id, account);
    }

    #[test]
    fn test_commit_id_matches_field_level_hash() {
        let claim = Claim::new("user-123", "app.example");
        let (sub, aud) = claim.encode().unwrap();
        assert_eq!(commit_id(&claim).unwrap(), poseidon_hash2(sub, aud));
    }

    #[test]
    fn test_commit_rejects_oversized_claim() {
        let claim = Claim::new("x".repeat(40), "app.example");
        assert_eq!(
            commit_id(&claim),
            Err(EncodingError::TooLong { len: 40 })
        );
    }

    #[test]
    fn test_account_binding_json() {
        let binding = AccountBinding {
            address: address!("0x1111111111111111111111111111111111111111"),
            account_hash: FieldElement::ONE,
        };
        let json = serde_json::to_value(binding).unwrap();
        assert_eq!(
            json["accountHash"],
            "0x0000000000000000000000000000000000000000000000000000000000000001"
        );
    }
}
