use std::sync::{Arc, OnceLock};

use alloy::primitives::{Address, address};
use eyre::{Context as _, Result};
use rand::thread_rng;
use viex_core::{
    AccountRegistryClient, ClaimProver, ProofVerifierClient, RegistrationResult, RetryConfig,
};
use viex_primitives::{AccountBinding, Claim, commit_account, commit_id};
use viex_proof::NativeBackend;

use crate::ledger::InMemoryLedger;

/// Owner of the emulated verifier contract.
pub const OWNER: Address = address!("0x00000000000000000000000000000000000000ff");

/// The scenario account.
pub const ACCOUNT: Address = address!("0xabcdabcdabcdabcdabcdabcdabcdabcdabcdabcd");

/// A second account.
pub const OTHER_ACCOUNT: Address = address!("0x1234123412341234123412341234123412341234");

/// The native proving setup, shared across the tests of one binary.
pub fn native_backend() -> Arc<NativeBackend> {
    static BACKEND: OnceLock<Arc<NativeBackend>> = OnceLock::new();
    BACKEND
        .get_or_init(|| {
            Arc::new(NativeBackend::setup(&mut thread_rng()).expect("native setup succeeds"))
        })
        .clone()
}

/// Backoff without real delays.
pub fn fast_retry() -> RetryConfig {
    RetryConfig {
        min_delay: std::time::Duration::from_millis(1),
        max_delay: std::time::Duration::from_millis(5),
        factor: 1.5,
        max_retries: 3,
    }
}

/// An emulated ledger whose owner is whitelisted, with clients wired against it.
pub struct TestContext {
    pub ledger: Arc<InMemoryLedger>,
    pub backend: Arc<NativeBackend>,
    pub registry: AccountRegistryClient<InMemoryLedger, InMemoryLedger>,
    pub prover: ClaimProver<InMemoryLedger, NativeBackend>,
    pub verifier: ProofVerifierClient<InMemoryLedger>,
}

impl TestContext {
    pub fn new() -> Self {
        let backend = native_backend();
        let ledger = Arc::new(InMemoryLedger::new(
            OWNER,
            backend.prepared_verifying_key().clone(),
        ));
        ledger.grant(OWNER);
        Self::with_ledger(ledger, backend)
    }

    /// Clients signing as `sender` on the same ledger.
    pub fn as_sender(&self, sender: Address) -> Self {
        Self::with_ledger(
            Arc::new(self.ledger.as_sender(sender)),
            Arc::clone(&self.backend),
        )
    }

    fn with_ledger(ledger: Arc<InMemoryLedger>, backend: Arc<NativeBackend>) -> Self {
        Self {
            registry: AccountRegistryClient::new(Arc::clone(&ledger), Arc::clone(&ledger))
                .with_retry(fast_retry()),
            prover: ClaimProver::new(Arc::clone(&ledger), Arc::clone(&backend)),
            verifier: ProofVerifierClient::new(Arc::clone(&ledger)),
            ledger,
            backend,
        }
    }

    /// Registers `claim` for `address` and returns its binding.
    pub async fn register(&self, claim: &Claim, address: Address) -> Result<AccountBinding> {
        let result: RegistrationResult = self
            .registry
            .register_claim(claim, address)
            .await
            .wrap_err("registration failed")?;
        eyre::ensure!(
            result.address_binding.is_some() && result.hash_binding.is_some(),
            "registration skipped a step"
        );
        Ok(AccountBinding::derive(claim, address)?)
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// `(idHash, accountHash)` of `claim` for `address`.
pub fn commitments(
    claim: &Claim,
    address: Address,
) -> Result<(viex_primitives::FieldElement, viex_primitives::FieldElement)> {
    Ok((commit_id(claim)?, commit_account(claim, address)?))
}
