use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use alloy::primitives::Address;
use async_trait::async_trait;
use viex_core::{
    AccessGate, AccountRegistryClient, Claim, FieldElement, Ledger as _, LedgerError, ProverError,
    RegisterClaimError, RegistrationStatus, RegistrationStep,
};
use viex_test_utils::{
    Fault, LedgerCall, TestContext,
    fixtures::{ACCOUNT, OTHER_ACCOUNT, commitments, fast_retry},
};

fn claim() -> Claim {
    Claim::new("user-123", "app.example")
}

#[tokio::test]
async fn test_register_binds_both_steps() -> eyre::Result<()> {
    let ctx = TestContext::new();
    let (id_hash, account_hash) = commitments(&claim(), ACCOUNT)?;

    let result = ctx.registry.register(id_hash, ACCOUNT, account_hash).await?;
    let address_binding = result.address_binding.expect("step one confirmed");
    let hash_binding = result.hash_binding.expect("step two confirmed");
    // step two is only issued after step one is included
    assert!(address_binding.block_number < hash_binding.block_number);

    assert_eq!(ctx.registry.ledger().account_address(id_hash).await?, ACCOUNT);
    assert_eq!(ctx.registry.ledger().account_hash(ACCOUNT).await?, account_hash);
    assert_eq!(
        ctx.registry.status(id_hash, ACCOUNT, account_hash).await?,
        RegistrationStatus::Complete
    );
    Ok(())
}

#[tokio::test]
async fn test_not_whitelisted_sender_submits_nothing() -> eyre::Result<()> {
    let ctx = TestContext::new();
    let outsider = ctx.as_sender(OTHER_ACCOUNT);

    let err = outsider
        .registry
        .register_claim(&claim(), OTHER_ACCOUNT)
        .await
        .expect_err("sender is not whitelisted");
    let RegisterClaimError::Registration(err) = err else {
        panic!("expected a registration error");
    };
    assert_eq!(err.step, RegistrationStep::BindAddress);
    assert!(!err.partial);
    assert!(matches!(err.source, LedgerError::NotWhitelisted));
    assert!(!err.is_retryable());

    assert_eq!(ctx.ledger.submissions(LedgerCall::SetAccountAddress), 0);
    assert_eq!(ctx.ledger.submissions(LedgerCall::SetAccountHash), 0);
    Ok(())
}

#[tokio::test]
async fn test_failed_second_step_is_reported_and_resumable() -> eyre::Result<()> {
    let ctx = TestContext::new();
    let (id_hash, account_hash) = commitments(&claim(), ACCOUNT)?;
    ctx.ledger.fail_next(LedgerCall::SetAccountHash, Fault::Transport);

    let err = ctx
        .registry
        .register(id_hash, ACCOUNT, account_hash)
        .await
        .expect_err("step two fails");
    assert_eq!(err.step, RegistrationStep::BindAccountHash);
    assert!(err.partial);
    assert!(err.is_retryable());

    assert_eq!(
        ctx.registry.status(id_hash, ACCOUNT, account_hash).await?,
        RegistrationStatus::AddressBound
    );
    assert!(ctx.registry.ledger().account_hash(ACCOUNT).await?.is_zero());
    assert!(matches!(
        ctx.prover.prove(&claim()).await,
        Err(ProverError::PartialRegistration { address }) if address == ACCOUNT
    ));

    let result = ctx.registry.resume(id_hash, ACCOUNT, account_hash).await?;
    assert!(result.address_binding.is_none());
    assert!(result.hash_binding.is_some());
    assert_eq!(
        ctx.registry.status(id_hash, ACCOUNT, account_hash).await?,
        RegistrationStatus::Complete
    );
    assert_eq!(ctx.ledger.submissions(LedgerCall::SetAccountAddress), 1);
    Ok(())
}

#[tokio::test]
async fn test_resume_does_not_resubmit_included_transaction() -> eyre::Result<()> {
    let ctx = TestContext::new();
    let (id_hash, account_hash) = commitments(&claim(), ACCOUNT)?;
    ctx.ledger
        .fail_next(LedgerCall::SetAccountHash, Fault::TimeoutAfterInclusion);

    let err = ctx
        .registry
        .register(id_hash, ACCOUNT, account_hash)
        .await
        .expect_err("confirmation times out");
    assert!(matches!(err.source, LedgerError::ConfirmationTimeout { .. }));

    let result = ctx.registry.resume(id_hash, ACCOUNT, account_hash).await?;
    assert_eq!(result, Default::default());
    assert_eq!(ctx.ledger.submissions(LedgerCall::SetAccountHash), 1);
    Ok(())
}

#[tokio::test]
async fn test_resume_retries_transient_failures() -> eyre::Result<()> {
    let ctx = TestContext::new();
    let (id_hash, account_hash) = commitments(&claim(), ACCOUNT)?;
    assert_eq!(
        ctx.registry.status(id_hash, ACCOUNT, account_hash).await?,
        RegistrationStatus::Unregistered
    );

    ctx.ledger
        .fail_next(LedgerCall::SetAccountAddress, Fault::Transport);
    ctx.ledger.fail_next(LedgerCall::SetAccountHash, Fault::Transport);

    let result = ctx.registry.resume(id_hash, ACCOUNT, account_hash).await?;
    assert!(result.address_binding.is_some());
    assert!(result.hash_binding.is_some());
    assert_eq!(ctx.ledger.submissions(LedgerCall::SetAccountAddress), 1);
    assert_eq!(ctx.ledger.submissions(LedgerCall::SetAccountHash), 1);
    Ok(())
}

#[tokio::test]
async fn test_resume_stops_on_gate_rejection() -> eyre::Result<()> {
    let ctx = TestContext::new();
    let (id_hash, account_hash) = commitments(&claim(), ACCOUNT)?;
    ctx.ledger.revoke(ctx.ledger.owner());

    let err = ctx
        .registry
        .resume(id_hash, ACCOUNT, account_hash)
        .await
        .expect_err("owner was revoked");
    assert!(matches!(err.source, LedgerError::NotWhitelisted));
    assert_eq!(ctx.ledger.submissions(LedgerCall::SetAccountAddress), 0);
    Ok(())
}

/// Allows the first `allowed` checks, rejects every later one.
struct RevokingGate {
    allowed: usize,
    calls: AtomicUsize,
}

#[async_trait]
impl AccessGate for RevokingGate {
    async fn is_whitelisted(&self, _address: Address) -> Result<bool, LedgerError> {
        Ok(self.calls.fetch_add(1, Ordering::SeqCst) < self.allowed)
    }
}

#[tokio::test]
async fn test_gate_is_queried_before_each_step() -> eyre::Result<()> {
    let ctx = TestContext::new();
    let (id_hash, account_hash) = commitments(&claim(), ACCOUNT)?;
    let gate = Arc::new(RevokingGate {
        allowed: 1,
        calls: AtomicUsize::new(0),
    });
    let registry =
        AccountRegistryClient::new(Arc::clone(&ctx.ledger), Arc::clone(&gate)).with_retry(fast_retry());

    let err = registry
        .register(id_hash, ACCOUNT, account_hash)
        .await
        .expect_err("whitelist revoked between steps");
    assert_eq!(err.step, RegistrationStep::BindAccountHash);
    assert!(err.partial);
    assert!(matches!(err.source, LedgerError::NotWhitelisted));
    assert_eq!(gate.calls.load(Ordering::SeqCst), 2);
    assert_eq!(ctx.ledger.submissions(LedgerCall::SetAccountHash), 0);
    Ok(())
}

#[tokio::test]
async fn test_rebinding_diverges_previous_address() -> eyre::Result<()> {
    let ctx = TestContext::new();
    let first = ctx.register(&claim(), ACCOUNT).await?;
    let second = ctx.register(&claim(), OTHER_ACCOUNT).await?;
    let (id_hash, _) = commitments(&claim(), ACCOUNT)?;

    assert_eq!(
        ctx.registry
            .status(id_hash, ACCOUNT, first.account_hash)
            .await?,
        RegistrationStatus::Diverged {
            bound_address: OTHER_ACCOUNT,
            stored_hash: first.account_hash,
        }
    );
    assert_eq!(
        ctx.registry
            .status(id_hash, OTHER_ACCOUNT, second.account_hash)
            .await?,
        RegistrationStatus::Complete
    );
    Ok(())
}

#[tokio::test]
async fn test_oversized_claim_is_rejected_before_any_call() -> eyre::Result<()> {
    let ctx = TestContext::new();
    let claim = Claim::new("user-123", "a".repeat(32));

    let err = ctx
        .registry
        .register_claim(&claim, ACCOUNT)
        .await
        .expect_err("audience is too long");
    assert!(matches!(err, RegisterClaimError::Encoding(_)));
    assert_eq!(ctx.ledger.submissions(LedgerCall::SetAccountAddress), 0);
    assert_eq!(
        ctx.registry.ledger().account_hash(ACCOUNT).await?,
        FieldElement::ZERO
    );
    Ok(())
}
