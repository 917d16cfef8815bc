//! Two-step account registration.
//!
//! Registration writes `idHash => address` and then `address => accountHash` as two separate ledger
//! transactions. The second write is only submitted after the first one is included. A failure between the
//! two leaves the account partially registered, which is always reported and can be completed with
//! [`AccountRegistryClient::resume`].

use std::{fmt, sync::Arc, time::Duration};

use alloy::primitives::Address;
use backon::{ExponentialBuilder, Retryable};
use parking_lot::Mutex;
use serde::Serialize;
use viex_primitives::{Claim, EncodingError, FieldElement, commit_account, commit_id};

use crate::{
    gate,
    ledger::{AccessGate, Confirmation, Ledger, LedgerError},
};

/// A stage of the registration pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RegistrationStep {
    /// Step one: `setAccountAddress(idHash, address)`.
    BindAddress,
    /// Step two: `setAccountHash(address, accountHash)`.
    BindAccountHash,
    /// Reading the current registration state before issuing writes.
    ReadState,
}

impl fmt::Display for RegistrationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BindAddress => f.write_str("bind idHash to address"),
            Self::BindAccountHash => f.write_str("bind address to accountHash"),
            Self::ReadState => f.write_str("read registration state"),
        }
    }
}

/// A failed registration step.
#[derive(Debug, thiserror::Error)]
#[error("registration failed at step `{step}` (partially registered: {partial}): {source}")]
pub struct RegistrationError {
    /// The step that failed.
    pub step: RegistrationStep,
    /// `true` when the address binding is on-chain but the `accountHash` binding is not.
    /// The account cannot be proven for until the registration is resumed.
    pub partial: bool,
    /// The underlying ledger error.
    #[source]
    pub source: LedgerError,
}

impl RegistrationError {
    const fn new(step: RegistrationStep, partial: bool, source: LedgerError) -> Self {
        Self {
            step,
            partial,
            source,
        }
    }

    /// Whether retrying with [`AccountRegistryClient::resume`] may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.source.is_retryable()
    }
}

/// Errors of [`AccountRegistryClient::register_claim`].
#[derive(Debug, thiserror::Error)]
pub enum RegisterClaimError {
    /// The claim cannot be committed to. Nothing was submitted.
    #[error(transparent)]
    Encoding(#[from] EncodingError),
    /// A registration step failed.
    #[error(transparent)]
    Registration(#[from] RegistrationError),
}

/// Confirmations of the writes a registration call issued. A step that was already on-chain is `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationResult {
    /// Confirmation of `setAccountAddress`.
    pub address_binding: Option<Confirmation>,
    /// Confirmation of `setAccountHash`.
    pub hash_binding: Option<Confirmation>,
}

/// The registration state of an `(idHash, address, accountHash)` triple on the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "state")]
pub enum RegistrationStatus {
    /// Neither binding exists.
    Unregistered,
    /// `idHash` is bound to the address but the stored `accountHash` is still the zero sentinel.
    AddressBound,
    /// Both bindings match.
    Complete,
    /// The ledger holds other bindings, e.g. `idHash` was re-bound to another address.
    #[serde(rename_all = "camelCase")]
    Diverged {
        /// The address `idHash` is currently bound to.
        bound_address: Address,
        /// The `accountHash` currently stored for the queried address.
        stored_hash: FieldElement,
    },
}

impl RegistrationStatus {
    /// Classifies the two ledger reads for an expected `(address, account_hash)` binding.
    #[must_use]
    pub fn classify(
        address: Address,
        account_hash: FieldElement,
        bound_address: Address,
        stored_hash: FieldElement,
    ) -> Self {
        match (bound_address == address, stored_hash) {
            (true, stored) if stored == account_hash => Self::Complete,
            (true, stored) if stored.is_zero() => Self::AddressBound,
            (false, stored) if bound_address == Address::ZERO && stored.is_zero() => {
                Self::Unregistered
            }
            _ => Self::Diverged {
                bound_address,
                stored_hash,
            },
        }
    }
}

/// Exponential backoff for [`AccountRegistryClient::resume`].
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Delay before the first retry.
    pub min_delay: Duration,
    /// Upper bound for a single delay.
    pub max_delay: Duration,
    /// Growth factor between delays.
    pub factor: f32,
    /// Maximum number of retries.
    pub max_retries: usize,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_millis(800),
            max_delay: Duration::from_secs(30),
            factor: 1.5,
            max_retries: 5,
        }
    }
}

impl RetryConfig {
    /// Build a backon [`ExponentialBuilder`] from this config.
    #[must_use]
    pub fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
            .with_factor(self.factor)
            .with_max_times(self.max_retries)
    }
}

/// Registers accounts on the ledger, gated by the whitelist.
pub struct AccountRegistryClient<L: ?Sized, G: ?Sized> {
    ledger: Arc<L>,
    gate: Arc<G>,
    retry: RetryConfig,
}

impl<L: ?Sized, G: ?Sized> Clone for AccountRegistryClient<L, G> {
    fn clone(&self) -> Self {
        Self {
            ledger: Arc::clone(&self.ledger),
            gate: Arc::clone(&self.gate),
            retry: self.retry.clone(),
        }
    }
}

impl<L, G> AccountRegistryClient<L, G>
where
    L: Ledger + ?Sized,
    G: AccessGate + ?Sized,
{
    /// Creates a client writing to `ledger`, checking the sender against `gate` before every write.
    #[must_use]
    pub fn new(ledger: Arc<L>, gate: Arc<G>) -> Self {
        Self {
            ledger,
            gate,
            retry: RetryConfig::default(),
        }
    }

    /// Overrides the backoff used by [`Self::resume`].
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// The ledger this client writes to.
    #[must_use]
    pub const fn ledger(&self) -> &Arc<L> {
        &self.ledger
    }

    /// Registers `idHash => address` and then `address => accountHash`.
    ///
    /// Each step checks the whitelist first and only submits if the sender is whitelisted. The second step is
    /// submitted after the first is included. Failures are not retried here, see [`Self::resume`].
    ///
    /// # Errors
    /// Returns a [`RegistrationError`] naming the failed step. `partial` is set if the first step is on-chain.
    #[tracing::instrument(skip_all, fields(%address))]
    pub async fn register(
        &self,
        id_hash: FieldElement,
        address: Address,
        account_hash: FieldElement,
    ) -> Result<RegistrationResult, RegistrationError> {
        let address_binding = self.bind_address(id_hash, address).await?;
        let hash_binding = self.bind_account_hash(address, account_hash).await?;
        tracing::info!("account registered");
        Ok(RegistrationResult {
            address_binding: Some(address_binding),
            hash_binding: Some(hash_binding),
        })
    }

    /// Computes `idHash` and `accountHash` for `claim` and registers them for `address`.
    ///
    /// # Errors
    /// Returns [`RegisterClaimError::Encoding`] before any ledger call if the claim cannot be encoded.
    pub async fn register_claim(
        &self,
        claim: &Claim,
        address: Address,
    ) -> Result<RegistrationResult, RegisterClaimError> {
        let id_hash = commit_id(claim)?;
        let account_hash = commit_account(claim, address)?;
        Ok(self.register(id_hash, address, account_hash).await?)
    }

    /// Reads the current registration state of the triple.
    ///
    /// # Errors
    /// Returns a [`LedgerError`] if a read fails.
    pub async fn status(
        &self,
        id_hash: FieldElement,
        address: Address,
        account_hash: FieldElement,
    ) -> Result<RegistrationStatus, LedgerError> {
        let bound_address = self.ledger.account_address(id_hash).await?;
        let stored_hash = self.ledger.account_hash(address).await?;
        Ok(RegistrationStatus::classify(
            address,
            account_hash,
            bound_address,
            stored_hash,
        ))
    }

    /// Completes a registration, issuing only the writes whose bindings are not on-chain yet.
    ///
    /// Every attempt re-reads the ledger before writing, so a transaction that was included after a timeout
    /// is not submitted twice. Transport errors and confirmation timeouts are retried with backoff, gate
    /// rejections and reverts are not.
    ///
    /// # Errors
    /// Returns the [`RegistrationError`] of the last attempt.
    #[tracing::instrument(skip_all, fields(%address))]
    pub async fn resume(
        &self,
        id_hash: FieldElement,
        address: Address,
        account_hash: FieldElement,
    ) -> Result<RegistrationResult, RegistrationError> {
        let progress = Mutex::new(RegistrationResult::default());

        (|| self.resume_once(id_hash, address, account_hash, &progress))
            .retry(self.retry.backoff())
            .when(RegistrationError::is_retryable)
            .notify(|err: &RegistrationError, delay: Duration| {
                tracing::warn!(
                    step = %err.step,
                    ?delay,
                    "registration step failed, retrying: {}",
                    err.source
                );
            })
            .await?;

        let result = *progress.lock();
        tracing::info!(
            address_bound = result.address_binding.is_some(),
            hash_bound = result.hash_binding.is_some(),
            "registration complete"
        );
        Ok(result)
    }

    async fn resume_once(
        &self,
        id_hash: FieldElement,
        address: Address,
        account_hash: FieldElement,
        progress: &Mutex<RegistrationResult>,
    ) -> Result<(), RegistrationError> {
        let read = |e| RegistrationError::new(RegistrationStep::ReadState, false, e);
        let bound_address = self.ledger.account_address(id_hash).await.map_err(read)?;
        let stored_hash = self.ledger.account_hash(address).await.map_err(read)?;

        if bound_address != address {
            let confirmation = self.bind_address(id_hash, address).await?;
            progress.lock().address_binding = Some(confirmation);
        }
        if stored_hash != account_hash {
            let confirmation = self.bind_account_hash(address, account_hash).await?;
            progress.lock().hash_binding = Some(confirmation);
        }
        Ok(())
    }

    async fn bind_address(
        &self,
        id_hash: FieldElement,
        address: Address,
    ) -> Result<Confirmation, RegistrationError> {
        let step = RegistrationStep::BindAddress;
        let fail = |e| RegistrationError::new(step, false, e);

        gate::ensure_whitelisted(self.gate.as_ref(), self.ledger.sender())
            .await
            .map_err(fail)?;
        let confirmation = self
            .ledger
            .set_account_address(id_hash, address)
            .await
            .map_err(|e| {
                tracing::error!(%step, "registration step failed: {e}");
                fail(e)
            })?;
        tracing::info!(%step, tx_hash = %confirmation.tx_hash, "registration step confirmed");
        Ok(confirmation)
    }

    async fn bind_account_hash(
        &self,
        address: Address,
        account_hash: FieldElement,
    ) -> Result<Confirmation, RegistrationError> {
        let step = RegistrationStep::BindAccountHash;
        let fail = |e| RegistrationError::new(step, true, e);

        gate::ensure_whitelisted(self.gate.as_ref(), self.ledger.sender())
            .await
            .map_err(|e| {
                tracing::error!(%step, "account left partially registered: {e}");
                fail(e)
            })?;
        let confirmation = self
            .ledger
            .set_account_hash(address, account_hash)
            .await
            .map_err(|e| {
                tracing::error!(%step, "account left partially registered: {e}");
                fail(e)
            })?;
        tracing::info!(%step, tx_hash = %confirmation.tx_hash, "registration step confirmed");
        Ok(confirmation)
    }
}
