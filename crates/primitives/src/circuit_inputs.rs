use std::collections::HashMap;

use alloy_primitives::Address;
use groth16_material::circom::ProofInput;
use ruint::aliases::U256;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{Claim, EncodingError, FieldElement};

#[inline]
fn fe_to_u256_vec(f: FieldElement) -> Vec<U256> {
    vec![f.into()]
}

/// The witness of the account-binding circuit.
///
/// `subject` and `audience` are private inputs; `address` and `account_hash` are the public inputs, in that order.
/// The circuit enforces `Poseidon(subject, audience, address) == account_hash`.
///
/// Built fresh for every proof and wiped from memory on drop since it contains the encoded claim.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct AccountBindingInput {
    /// `enc(subject)`. Private.
    pub subject: FieldElement,
    /// `enc(audience)`. Private.
    pub audience: FieldElement,
    /// The account address embedded in the field. Public.
    pub address: FieldElement,
    /// The `accountHash` registered for `address`. Public.
    pub account_hash: FieldElement,
}

impl AccountBindingInput {
    /// Builds the witness from a raw claim, the account address and the `accountHash` to prove against.
    ///
    /// # Errors
    /// Returns an [`EncodingError`] if either claim field cannot be encoded.
    pub fn new(
        claim: &Claim,
        address: Address,
        account_hash: FieldElement,
    ) -> Result<Self, EncodingError> {
        let (subject, audience) = claim.encode()?;
        Ok(Self {
            subject,
            audience,
            address: address.into(),
            account_hash,
        })
    }

    /// The public inputs in the order the circuit declares them: `[address, accountHash]`.
    #[must_use]
    pub const fn public_inputs(&self) -> [FieldElement; 2] {
        [self.address, self.account_hash]
    }
}

impl std::fmt::Debug for AccountBindingInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountBindingInput")
            .field("subject", &"<redacted>")
            .field("audience", &"<redacted>")
            .field("address", &self.address)
            .field("account_hash", &self.account_hash)
            .finish()
    }
}

impl ProofInput for AccountBindingInput {
    fn prepare_input(&self) -> HashMap<String, Vec<U256>> {
        let mut map = HashMap::new();
        map.insert("sub".to_owned(), fe_to_u256_vec(self.subject));
        map.insert("aud".to_owned(), fe_to_u256_vec(self.audience));
        map.insert("address".to_owned(), fe_to_u256_vec(self.address));
        map.insert("accountHash".to_owned(), fe_to_u256_vec(self.account_hash));
        map
    }
}
