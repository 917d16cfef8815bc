use alloy::primitives::U256;
use viex_core::{
    Claim, FieldElement, ProverError, VerificationError,
    primitives::{AccountBinding, AccountProof},
    proof::{ProofError, WitnessError},
};
use viex_test_utils::{
    TestContext,
    fixtures::{ACCOUNT, OTHER_ACCOUNT},
};

fn claim() -> Claim {
    Claim::new("user-123", "app.example")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn test_registered_claim_proves_and_verifies() -> eyre::Result<()> {
    let ctx = TestContext::new();
    let binding = ctx.register(&claim(), ACCOUNT).await?;

    let proof = ctx.prover.prove(&claim()).await?;
    assert_eq!(proof.public_signals.address, FieldElement::from(ACCOUNT));
    assert_eq!(proof.public_signals.account_hash, binding.account_hash);

    assert!(ctx.verifier.verify(&proof).await?);
    ctx.verifier.verify_or_reject(&proof).await?;

    // a fresh proof of the same witness differs but verifies as well
    let again = ctx.prover.prove(&claim()).await?;
    assert!(ctx.verifier.verify(&again).await?);
    Ok(())
}

#[tokio::test]
async fn test_wrong_audience_fails_before_proving() -> eyre::Result<()> {
    let ctx = TestContext::new();
    let binding = ctx.register(&claim(), ACCOUNT).await?;
    let wrong = Claim::new("user-123", "app.other");

    // the registry is untouched, only the witness carries the other audience
    let err = ctx
        .prover
        .prove_binding(&wrong, binding)
        .await
        .expect_err("witness does not match the registered accountHash");
    assert!(matches!(
        err,
        ProverError::Proof(ProofError::Witness(WitnessError::BindingMismatch { expected, .. }))
            if expected == binding.account_hash
    ));

    // resolving through the ledger finds no account for the other claim
    assert!(matches!(
        ctx.prover.prove(&wrong).await,
        Err(ProverError::AccountNotRegistered)
    ));
    Ok(())
}

#[tokio::test]
async fn test_wrong_address_fails_before_proving() -> eyre::Result<()> {
    let ctx = TestContext::new();
    let binding = ctx.register(&claim(), ACCOUNT).await?;
    let moved = AccountBinding {
        address: OTHER_ACCOUNT,
        ..binding
    };

    assert!(matches!(
        ctx.prover.prove_binding(&claim(), moved).await,
        Err(ProverError::Proof(ProofError::Witness(
            WitnessError::BindingMismatch { .. }
        )))
    ));
    Ok(())
}

#[tokio::test]
async fn test_replayed_proof_is_an_invalid_binding() -> eyre::Result<()> {
    let ctx = TestContext::new();
    let first = ctx.register(&claim(), ACCOUNT).await?;
    let other_claim = Claim::new("user-456", "app.example");
    let second = ctx.register(&other_claim, OTHER_ACCOUNT).await?;

    let proof = ctx.prover.prove(&claim()).await?;
    let mut calldata = proof.calldata();
    calldata.public_signals[0] = FieldElement::from(OTHER_ACCOUNT).into();

    let err = ctx
        .verifier
        .verify_calldata(&calldata)
        .await
        .expect_err("accountHash belongs to another address");
    assert!(err.is_rejection());
    assert!(matches!(
        err,
        VerificationError::InvalidBinding { address, claimed, stored }
            if address == OTHER_ACCOUNT
                && claimed == first.account_hash
                && stored == second.account_hash
    ));
    // rejected before the verifier contract is called
    assert_eq!(ctx.ledger.verify_calls(), 0);
    Ok(())
}

#[tokio::test]
async fn test_unregistered_address_is_an_invalid_binding() -> eyre::Result<()> {
    let ctx = TestContext::new();
    let backend = ctx.backend.clone();
    let binding = AccountBinding::derive(&claim(), ACCOUNT)?;

    // proven locally, never registered
    let proof = viex_core::proof::generate_account_proof(
        backend.as_ref(),
        &mut rand::thread_rng(),
        &claim(),
        binding.address,
        binding.account_hash,
    )?;

    assert!(matches!(
        ctx.verifier.verify(&proof).await,
        Err(VerificationError::InvalidBinding { stored, .. }) if stored.is_zero()
    ));
    Ok(())
}

#[tokio::test]
async fn test_tampered_proof_is_rejected() -> eyre::Result<()> {
    let ctx = TestContext::new();
    ctx.register(&claim(), ACCOUNT).await?;

    let proof = ctx.prover.prove(&claim()).await?;
    let other = ctx.prover.prove(&claim()).await?;

    let mut calldata = proof.calldata();
    calldata.a = other.calldata().a;
    assert!(!ctx.verifier.verify_calldata(&calldata).await?);

    let tampered = AccountProof {
        proof: calldata.to_groth16_proof()?,
        public_signals: calldata.public_signals()?,
    };
    assert!(matches!(
        ctx.verifier.verify_or_reject(&tampered).await,
        Err(VerificationError::InvalidProof)
    ));
    Ok(())
}

#[tokio::test]
async fn test_reverted_call_is_not_a_rejection() -> eyre::Result<()> {
    let ctx = TestContext::new();
    ctx.register(&claim(), ACCOUNT).await?;

    let mut calldata = ctx.prover.prove(&claim()).await?.calldata();
    // (1, 3) is not on the curve
    calldata.a = [U256::from(1), U256::from(3)];

    let err = ctx
        .verifier
        .verify_calldata(&calldata)
        .await
        .expect_err("the verifier reverts on invalid points");
    assert!(matches!(err, VerificationError::ExecutionReverted { .. }));
    assert!(!err.is_rejection());
    Ok(())
}

#[tokio::test]
async fn test_partial_registration_cannot_be_proven() -> eyre::Result<()> {
    let ctx = TestContext::new();
    let binding = AccountBinding::derive(&claim(), ACCOUNT)?;
    let id_hash = viex_core::primitives::commit_id(&claim())?;

    // step one only
    viex_core::Ledger::set_account_address(ctx.ledger.as_ref(), id_hash, ACCOUNT).await?;

    assert!(matches!(
        ctx.prover.prove(&claim()).await,
        Err(ProverError::PartialRegistration { address }) if address == ACCOUNT
    ));
    assert!(matches!(
        ctx.prover
            .prove_binding(
                &claim(),
                AccountBinding {
                    account_hash: FieldElement::ZERO,
                    ..binding
                }
            )
            .await,
        Err(ProverError::Proof(ProofError::Witness(
            WitnessError::UnsetAccountHash
        )))
    ));

    // a proof built locally for the intended binding is rejected while step two is missing
    let proof = ctx.prover.prove_binding(&claim(), binding).await?;
    let err = ctx.verifier.verify(&proof).await.unwrap_err();
    assert!(matches!(
        err,
        VerificationError::InvalidBinding { address, stored, .. }
            if address == ACCOUNT && stored.is_zero()
    ));
    assert_eq!(ctx.ledger.verify_calls(), 0);
    Ok(())
}
