//! The ledger surface the protocol consumes, and its implementation over the `ViexProofVerifier` contract.

use std::time::Duration;

use alloy::{
    network::EthereumWallet,
    primitives::{Address, TxHash, U256},
    providers::{
        DynProvider, PendingTransactionBuilder, PendingTransactionError, Provider, ProviderBuilder,
        WatchTxError,
    },
    signers::local::PrivateKeySigner,
    sol_types::decode_revert_reason,
};
use async_trait::async_trait;
use serde::Serialize;
use viex_primitives::{Config, FieldElement, ProofCalldata};

use crate::contracts::IViexProofVerifier::{self, IViexProofVerifierInstance};

/// Proof that a write was included on the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Confirmation {
    /// Hash of the transaction that carried the write.
    pub tx_hash: TxHash,
    /// Block the transaction was included in, when known.
    pub block_number: Option<u64>,
}

/// Errors from ledger calls.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// The sender is not on the whitelist. Not retryable without administrative action.
    #[error("sender is not whitelisted")]
    NotWhitelisted,
    /// The call reverted for another reason.
    #[error("execution reverted: {reason}")]
    Reverted {
        /// Decoded revert reason, or the raw revert data.
        reason: String,
    },
    /// The RPC could not be reached or returned an error. Retryable after re-reading the ledger state.
    #[error("transport error: {0}")]
    Transport(String),
    /// The transaction was submitted but not confirmed in time. It may still be included.
    #[error("transaction {tx_hash} was not confirmed in time")]
    ConfirmationTimeout {
        /// Hash of the submitted transaction.
        tx_hash: TxHash,
    },
    /// The transaction was included but failed.
    #[error("transaction {tx_hash} failed on-chain")]
    Failed {
        /// Hash of the failed transaction.
        tx_hash: TxHash,
    },
    /// A value read from the ledger is not a valid field element.
    #[error("invalid value returned by the ledger: {0}")]
    InvalidResponse(String),
    /// Configuration is invalid or missing required values.
    #[error("Invalid configuration for {attribute}: {reason}")]
    InvalidConfig {
        /// The config attribute that is invalid.
        attribute: &'static str,
        /// Description of why it is invalid.
        reason: String,
    },
}

impl LedgerError {
    /// Whether the operation may succeed if retried after re-reading the ledger state.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::ConfirmationTimeout { .. })
    }

    /// Classifies a revert reason. Whitelist rejections get their own kind.
    #[must_use]
    pub fn from_revert_reason(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        if reason.to_lowercase().contains("whitelist") {
            Self::NotWhitelisted
        } else {
            Self::Reverted { reason }
        }
    }
}

impl From<alloy::contract::Error> for LedgerError {
    fn from(err: alloy::contract::Error) -> Self {
        if let Some(data) = err.as_revert_data() {
            let reason = decode_revert_reason(&data).unwrap_or_else(|| data.to_string());
            return Self::from_revert_reason(reason);
        }
        let message = err.to_string();
        if message.contains("execution reverted") {
            return Self::from_revert_reason(message);
        }
        Self::Transport(message)
    }
}

/// Read-only whitelist check. Whitelist state can change between calls, so callers must not cache answers.
#[async_trait]
pub trait AccessGate: Send + Sync {
    /// Whether `address` may mutate registry state.
    async fn is_whitelisted(&self, address: Address) -> Result<bool, LedgerError>;
}

/// Whitelist administration.
#[async_trait]
pub trait GateAdmin: Send + Sync {
    /// Adds `address` to the whitelist, resolving once the write is included.
    async fn add_whitelisted(&self, address: Address) -> Result<Confirmation, LedgerError>;
}

/// The registry and verification entry points of the ledger.
///
/// Writes resolve only after the transaction is included, never on submission.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// The account that signs writes.
    fn sender(&self) -> Address;

    /// The address bound to `id_hash`, or [`Address::ZERO`].
    async fn account_address(&self, id_hash: FieldElement) -> Result<Address, LedgerError>;

    /// The `accountHash` stored for `address`, or [`FieldElement::ZERO`].
    async fn account_hash(&self, address: Address) -> Result<FieldElement, LedgerError>;

    /// Binds `id_hash` to `address`. Overwrites a previous binding.
    async fn set_account_address(
        &self,
        id_hash: FieldElement,
        address: Address,
    ) -> Result<Confirmation, LedgerError>;

    /// Stores `account_hash` for `address`.
    async fn set_account_hash(
        &self,
        address: Address,
        account_hash: FieldElement,
    ) -> Result<Confirmation, LedgerError>;

    /// Calls the verification entry point. `Ok(false)` is a rejected proof, a revert is an error.
    async fn verify_proof(&self, calldata: &ProofCalldata) -> Result<bool, LedgerError>;
}

/// [`Ledger`], [`AccessGate`] and [`GateAdmin`] over a deployed `ViexProofVerifier` contract.
#[derive(Clone)]
pub struct ContractLedger {
    contract: IViexProofVerifierInstance<DynProvider>,
    sender: Address,
    confirmation_timeout: Duration,
    required_confirmations: u64,
}

impl ContractLedger {
    /// Connects to the contract in `config` with a wallet for `signer`.
    ///
    /// # Errors
    /// Returns [`LedgerError::InvalidConfig`] if the RPC URL cannot be parsed.
    pub fn connect(config: &Config, signer: PrivateKeySigner) -> Result<Self, LedgerError> {
        let rpc_url = config
            .rpc_url()
            .parse::<url::Url>()
            .map_err(|e| LedgerError::InvalidConfig {
                attribute: "rpc_url",
                reason: e.to_string(),
            })?;
        let sender = signer.address();
        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer))
            .connect_http(rpc_url)
            .erased();

        Ok(Self::new(provider, *config.verifier_address(), sender)
            .with_confirmation_policy(
                Duration::from_secs(config.confirmation_timeout_secs()),
                config.required_confirmations(),
            ))
    }

    /// Wraps an existing provider. `sender` must be the account the provider signs with.
    #[must_use]
    pub fn new(provider: DynProvider, verifier_address: Address, sender: Address) -> Self {
        Self {
            contract: IViexProofVerifier::new(verifier_address, provider),
            sender,
            confirmation_timeout: Duration::from_secs(120),
            required_confirmations: 1,
        }
    }

    /// Sets how long to wait for receipts and how many confirmations count as included.
    #[must_use]
    pub fn with_confirmation_policy(mut self, timeout: Duration, confirmations: u64) -> Self {
        self.confirmation_timeout = timeout;
        self.required_confirmations = confirmations.max(1);
        self
    }

    /// The address of the verifier contract.
    #[must_use]
    pub fn verifier_address(&self) -> &Address {
        self.contract.address()
    }

    /// The owner of the verifier contract.
    ///
    /// # Errors
    /// Returns a [`LedgerError`] if the call fails.
    pub async fn owner(&self) -> Result<Address, LedgerError> {
        Ok(self.contract.owner().call().await?)
    }

    async fn confirm(
        &self,
        action: &'static str,
        pending: PendingTransactionBuilder<alloy::network::Ethereum>,
    ) -> Result<Confirmation, LedgerError> {
        let tx_hash = *pending.tx_hash();
        tracing::debug!(action, %tx_hash, "transaction submitted, awaiting confirmation");

        let receipt = pending
            .with_required_confirmations(self.required_confirmations)
            .with_timeout(Some(self.confirmation_timeout))
            .get_receipt()
            .await
            .map_err(|err| match err {
                PendingTransactionError::TxWatcher(WatchTxError::Timeout) => {
                    tracing::warn!(action, %tx_hash, "confirmation timed out");
                    LedgerError::ConfirmationTimeout { tx_hash }
                }
                other => LedgerError::Transport(other.to_string()),
            })?;

        if !receipt.status() {
            tracing::error!(action, %tx_hash, "transaction failed on-chain");
            return Err(LedgerError::Failed { tx_hash });
        }

        let confirmation = Confirmation {
            tx_hash,
            block_number: receipt.block_number,
        };
        tracing::info!(action, %tx_hash, block = ?confirmation.block_number, "transaction confirmed");
        Ok(confirmation)
    }
}

#[async_trait]
impl Ledger for ContractLedger {
    fn sender(&self) -> Address {
        self.sender
    }

    async fn account_address(&self, id_hash: FieldElement) -> Result<Address, LedgerError> {
        Ok(self.contract.accountAddress(id_hash.into()).call().await?)
    }

    async fn account_hash(&self, address: Address) -> Result<FieldElement, LedgerError> {
        let raw: U256 = self.contract.accountHash(address).call().await?;
        FieldElement::try_from(raw).map_err(|e| LedgerError::InvalidResponse(e.to_string()))
    }

    async fn set_account_address(
        &self,
        id_hash: FieldElement,
        address: Address,
    ) -> Result<Confirmation, LedgerError> {
        let pending = self
            .contract
            .setAccountAddress(id_hash.into(), address)
            .send()
            .await?;
        self.confirm("setAccountAddress", pending).await
    }

    async fn set_account_hash(
        &self,
        address: Address,
        account_hash: FieldElement,
    ) -> Result<Confirmation, LedgerError> {
        let pending = self
            .contract
            .setAccountHash(address, account_hash.into())
            .send()
            .await?;
        self.confirm("setAccountHash", pending).await
    }

    async fn verify_proof(&self, calldata: &ProofCalldata) -> Result<bool, LedgerError> {
        Ok(self
            .contract
            .verifyProof(calldata.a, calldata.b, calldata.c, calldata.public_signals)
            .call()
            .await?)
    }
}

#[async_trait]
impl AccessGate for ContractLedger {
    async fn is_whitelisted(&self, address: Address) -> Result<bool, LedgerError> {
        Ok(self.contract.whitelistAddress(address).call().await?)
    }
}

#[async_trait]
impl GateAdmin for ContractLedger {
    async fn add_whitelisted(&self, address: Address) -> Result<Confirmation, LedgerError> {
        let pending = self.contract.addWhitelistAddress(address).send().await?;
        self.confirm("addWhitelistAddress", pending).await
    }
}
