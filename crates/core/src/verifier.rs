//! On-chain verification of account proofs.
//!
//! Verification has two rejection kinds. [`VerificationError::InvalidBinding`] means the public signals do not
//! match the `accountHash` stored for the address, [`VerificationError::InvalidProof`] means the pairing check
//! failed. A reverted call is neither and surfaces as [`VerificationError::ExecutionReverted`].

use std::sync::Arc;

use alloy::primitives::Address;
use viex_primitives::{AccountProof, FieldElement, PrimitiveError, ProofCalldata};

use crate::ledger::{Ledger, LedgerError};

/// Errors from proof verification.
#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    /// The proof is bound to an `accountHash` the ledger does not store for the address.
    #[error("proof is bound to {claimed} but the ledger stores {stored} for {address}")]
    InvalidBinding {
        /// The address in the public signals.
        address: Address,
        /// The `accountHash` in the public signals.
        claimed: FieldElement,
        /// The `accountHash` stored on the ledger, zero if the address is not registered.
        stored: FieldElement,
    },
    /// The proof does not verify under the deployed verifying key.
    #[error("proof rejected by the verifier")]
    InvalidProof,
    /// The verification call reverted.
    #[error("verification call reverted: {reason}")]
    ExecutionReverted {
        /// The revert reason.
        reason: String,
    },
    /// The public signals cannot be interpreted.
    #[error(transparent)]
    MalformedSignals(#[from] PrimitiveError),
    /// The ledger could not be reached.
    #[error(transparent)]
    Ledger(LedgerError),
}

impl From<LedgerError> for VerificationError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Reverted { reason } => Self::ExecutionReverted { reason },
            LedgerError::NotWhitelisted => Self::ExecutionReverted {
                reason: LedgerError::NotWhitelisted.to_string(),
            },
            other => Self::Ledger(other),
        }
    }
}

impl VerificationError {
    /// Whether this is one of the two proof rejection kinds rather than a failed call.
    #[must_use]
    pub const fn is_rejection(&self) -> bool {
        matches!(self, Self::InvalidBinding { .. } | Self::InvalidProof)
    }
}

/// Verifies account proofs against the ledger.
pub struct ProofVerifierClient<L: ?Sized> {
    ledger: Arc<L>,
}

impl<L: ?Sized> Clone for ProofVerifierClient<L> {
    fn clone(&self) -> Self {
        Self {
            ledger: Arc::clone(&self.ledger),
        }
    }
}

impl<L: Ledger + ?Sized> ProofVerifierClient<L> {
    /// Creates a verifier client over `ledger`.
    #[must_use]
    pub const fn new(ledger: Arc<L>) -> Self {
        Self { ledger }
    }

    /// Verifies `proof` on the ledger.
    ///
    /// Returns `Ok(true)` if the proof is accepted and `Ok(false)` if the binding matches but the proof itself
    /// is rejected.
    ///
    /// # Errors
    /// - [`VerificationError::InvalidBinding`] if the ledger stores another `accountHash` for the address.
    /// - [`VerificationError::ExecutionReverted`] if the verification call reverts.
    /// - [`VerificationError::Ledger`] on transport failures.
    pub async fn verify(&self, proof: &AccountProof) -> Result<bool, VerificationError> {
        self.verify_calldata(&proof.calldata()).await
    }

    /// Like [`Self::verify`], for calldata that was serialized elsewhere.
    ///
    /// # Errors
    /// See [`Self::verify`]. Additionally [`VerificationError::MalformedSignals`] if the signals are not a
    /// field element and an address.
    #[tracing::instrument(skip_all)]
    pub async fn verify_calldata(&self, calldata: &ProofCalldata) -> Result<bool, VerificationError> {
        let signals = calldata.public_signals()?;
        let address = signals.address()?;

        let stored = self.ledger.account_hash(address).await?;
        if stored.is_zero() || stored != signals.account_hash {
            tracing::warn!(
                %address,
                claimed = %signals.account_hash,
                %stored,
                "proof references an accountHash the ledger does not store"
            );
            return Err(VerificationError::InvalidBinding {
                address,
                claimed: signals.account_hash,
                stored,
            });
        }

        let valid = self.ledger.verify_proof(calldata).await?;
        if valid {
            tracing::debug!(%address, "proof accepted");
        } else {
            tracing::info!(%address, "proof failed the pairing check");
        }
        Ok(valid)
    }

    /// Verifies `proof`, turning a rejected proof into [`VerificationError::InvalidProof`].
    ///
    /// # Errors
    /// See [`Self::verify`], plus [`VerificationError::InvalidProof`].
    pub async fn verify_or_reject(&self, proof: &AccountProof) -> Result<(), VerificationError> {
        if self.verify(proof).await? {
            Ok(())
        } else {
            Err(VerificationError::InvalidProof)
        }
    }
}
