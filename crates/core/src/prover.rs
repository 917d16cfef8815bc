//! Proof generation for registered claims.

use std::sync::Arc;

use alloy::primitives::Address;
use viex_primitives::{AccountBinding, AccountProof, Claim, EncodingError, commit_id};
use viex_proof::{ProofError, ProvingBackend, generate_account_proof};

use crate::ledger::{Ledger, LedgerError};

/// Errors from [`ClaimProver`].
#[derive(Debug, thiserror::Error)]
pub enum ProverError {
    /// The claim cannot be encoded.
    #[error(transparent)]
    Encoding(#[from] EncodingError),
    /// No address is bound to the claim's `idHash`.
    #[error("no account is registered for this claim")]
    AccountNotRegistered,
    /// The claim is bound to `address` but its `accountHash` was never stored.
    #[error("account {address} is only partially registered: accountHash is unset")]
    PartialRegistration {
        /// The bound address.
        address: Address,
    },
    /// A ledger read failed.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    /// Proof generation failed.
    #[error(transparent)]
    Proof(#[from] ProofError),
    /// The proving task panicked or was cancelled.
    #[error("proving task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Resolves a claim's registration from the ledger and proves it.
pub struct ClaimProver<L: ?Sized, B> {
    ledger: Arc<L>,
    backend: Arc<B>,
}

impl<L: ?Sized, B> Clone for ClaimProver<L, B> {
    fn clone(&self) -> Self {
        Self {
            ledger: Arc::clone(&self.ledger),
            backend: Arc::clone(&self.backend),
        }
    }
}

impl<L, B> ClaimProver<L, B>
where
    L: Ledger + ?Sized,
    B: ProvingBackend + 'static,
{
    /// Creates a prover reading registrations from `ledger` and proving with `backend`.
    #[must_use]
    pub const fn new(ledger: Arc<L>, backend: Arc<B>) -> Self {
        Self { ledger, backend }
    }

    /// Looks up `idHash => address => accountHash` for `claim`.
    ///
    /// # Errors
    /// - [`ProverError::AccountNotRegistered`] if no address is bound.
    /// - [`ProverError::PartialRegistration`] if the stored `accountHash` is the zero sentinel.
    pub async fn resolve_account(&self, claim: &Claim) -> Result<AccountBinding, ProverError> {
        let id_hash = commit_id(claim)?;
        let address = self.ledger.account_address(id_hash).await?;
        if address == Address::ZERO {
            return Err(ProverError::AccountNotRegistered);
        }
        let account_hash = self.ledger.account_hash(address).await?;
        if account_hash.is_zero() {
            tracing::warn!(%address, "account is bound but accountHash is unset");
            return Err(ProverError::PartialRegistration { address });
        }
        Ok(AccountBinding {
            address,
            account_hash,
        })
    }

    /// Resolves the registration of `claim` and proves it.
    ///
    /// # Errors
    /// See [`Self::resolve_account`] and [`Self::prove_binding`].
    #[tracing::instrument(skip_all)]
    pub async fn prove(&self, claim: &Claim) -> Result<AccountProof, ProverError> {
        let binding = self.resolve_account(claim).await?;
        self.prove_binding(claim, binding).await
    }

    /// Proves `claim` against an explicit binding, on the blocking worker pool.
    ///
    /// # Errors
    /// Returns [`ProverError::Proof`] if the witness does not satisfy the circuit or proving fails.
    #[tracing::instrument(skip_all, fields(address = %binding.address))]
    pub async fn prove_binding(
        &self,
        claim: &Claim,
        binding: AccountBinding,
    ) -> Result<AccountProof, ProverError> {
        let backend = Arc::clone(&self.backend);
        let claim = claim.clone();
        let proof = tokio::task::spawn_blocking(move || {
            let mut rng = rand::thread_rng();
            generate_account_proof(
                backend.as_ref(),
                &mut rng,
                &claim,
                binding.address,
                binding.account_hash,
            )
        })
        .await??;
        tracing::info!("account proof generated");
        Ok(proof)
    }
}
