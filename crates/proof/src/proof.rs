//! Account proof generation.
//!
//! The workflow for an account proof consists of:
//! 1. Encoding the claim and building the witness
//! 2. Checking the witness against the circuit relation natively (no proving work is wasted on a bad witness)
//! 3. Proving with a [`ProvingBackend`]
//! 4. Parsing the public signals and verifying the fresh proof before handing it out

use alloy_primitives::Address;
use ark_relations::r1cs::SynthesisError;
use groth16_material::Groth16Error;
use rand::{CryptoRng, Rng};
use viex_primitives::{
    AccountBindingInput, AccountProof, Claim, EncodingError, FieldElement, PublicSignals,
    poseidon_hash3,
};

use crate::{ArtifactError, ProvingBackend};

/// Error type for account proof generation.
#[derive(Debug, thiserror::Error)]
pub enum ProofError {
    /// A claim field cannot be encoded into the field.
    #[error(transparent)]
    Encoding(#[from] EncodingError),
    /// The witness does not satisfy the circuit.
    #[error(transparent)]
    Witness(#[from] WitnessError),
    /// The proving material is missing or mismatched.
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
    /// Errors originating from circom Groth16 proof generation or verification.
    #[error(transparent)]
    ZkError(#[from] Groth16Error),
    /// Errors originating from the native constraint system.
    #[error("constraint synthesis failed: {0}")]
    Synthesis(SynthesisError),
    /// The freshly generated proof does not verify under the backend's verifying key.
    #[error("generated proof could not be verified")]
    InvalidProof,
}

impl From<SynthesisError> for ProofError {
    fn from(value: SynthesisError) -> Self {
        Self::Synthesis(value)
    }
}

/// Violations of the account-binding relation, detected before any proving work.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum WitnessError {
    /// The `accountHash` is the zero sentinel, i.e. step two of the registration never happened.
    #[error("the account hash is unset (zero); the account is not fully registered")]
    UnsetAccountHash,
    /// `Poseidon(sub, aud, address)` is not the provided `accountHash`.
    #[error("the account hash {expected} does not commit to the claim and address (computed {computed})")]
    BindingMismatch {
        /// The `accountHash` the proof was requested for.
        expected: FieldElement,
        /// The commitment computed from the witness.
        computed: FieldElement,
    },
    /// The address public input does not fit in 160 bits.
    #[error("the address input is not a valid account address")]
    InvalidAddress,
    /// The native circuit is not satisfied by the witness.
    #[error("the witness does not satisfy the circuit constraints")]
    Unsatisfied,
    /// The circom witness graph could not evaluate the inputs.
    #[error("witness calculation failed: {0}")]
    Calculation(String),
}

/// Checks the witness against the circuit relation `Poseidon(sub, aud, address) == accountHash`.
///
/// This emulates the constraint that is proved in zero knowledge, so a witness that passes here is one the circuit accepts.
///
/// # Errors
/// Returns a [`WitnessError`] describing the first violated condition.
pub fn check_witness(input: &AccountBindingInput) -> Result<(), WitnessError> {
    if input.account_hash.is_zero() {
        return Err(WitnessError::UnsetAccountHash);
    }
    input
        .address
        .to_address()
        .map_err(|_| WitnessError::InvalidAddress)?;

    let computed = poseidon_hash3(input.subject, input.audience, input.address);
    if computed != input.account_hash {
        return Err(WitnessError::BindingMismatch {
            expected: input.account_hash,
            computed,
        });
    }
    Ok(())
}

/// Generates an account proof for `claim` bound to `address` under the registered `account_hash`.
///
/// The witness only lives for the duration of this call and is wiped when it is dropped.
///
/// # Errors
/// - [`ProofError::Encoding`] if the claim cannot be encoded.
/// - [`ProofError::Witness`] if the claim, address and `account_hash` do not satisfy the circuit.
/// - [`ProofError::Artifact`] if the backend returns public signals that do not match the witness.
/// - [`ProofError::InvalidProof`] if the generated proof does not verify.
pub fn generate_account_proof<B: ProvingBackend, R: Rng + CryptoRng>(
    backend: &B,
    rng: &mut R,
    claim: &Claim,
    address: Address,
    account_hash: FieldElement,
) -> Result<AccountProof, ProofError> {
    let input = AccountBindingInput::new(claim, address, account_hash)?;
    check_witness(&input)?;

    let (proof, public) = backend.prove(&input, rng)?;

    let public_signals = PublicSignals::from_slice(&public)
        .map_err(|e| ArtifactError::PublicSignals(e.to_string()))?;
    if [public_signals.address, public_signals.account_hash] != input.public_inputs() {
        return Err(ArtifactError::PublicSignals(
            "signals are not [address, accountHash] of the witness".to_string(),
        )
        .into());
    }

    if !backend.verify(&proof, &public)? {
        tracing::error!(%address, "freshly generated account proof does not verify");
        return Err(ProofError::InvalidProof);
    }

    Ok(AccountProof {
        proof,
        public_signals,
    })
}
